//! Serialized document exchange.
//!
//! A document round-trips losslessly through a JSON tree whose attribute
//! names match the exchange format (`sourceId`, `sourceRef`, …). Parsing
//! validates the model invariants so a malformed tree surfaces here as a
//! structured error instead of failing deep inside a stage.

use crate::core::Document;
use anyhow::Context;

/// Serialize a document to the pretty-printed exchange form.
pub fn to_json(document: &Document) -> anyhow::Result<String> {
    serde_json::to_string_pretty(document).context("serializing document")
}

/// Parse and validate a document from its exchange form.
pub fn from_json(json: &str) -> anyhow::Result<Document> {
    let document: Document = serde_json::from_str(json).context("parsing document")?;
    document
        .validate()
        .context("validating parsed document")?;
    Ok(document)
}
