mod file;
mod sqlite;

pub use file::JsonFileStore;
pub use sqlite::SqliteStore;

use crate::error::{CogitateError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::warn;

pub type Document = Map<String, Value>;

/// Holds the `RAW_DATA` key.
pub const RAW_DATA_DOCUMENT: &str = "raw_data_storage";
/// Contributor profiles keyed by identity.
pub const PROFILE_DOCUMENT: &str = "individual_metrics_storage";
/// Issue activity keyed by platform login.
pub const ACTIVITY_DOCUMENT: &str = "contributor_data";
pub const RAW_DATA_KEY: &str = "RAW_DATA";

/// `Merge` replaces only the top-level keys present in the update and never
/// recurses. There is no concurrent-writer protocol; the last writer wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Overwrite,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Json,
    Sqlite,
}

pub trait DocumentStore {
    /// Load a document; a missing one is empty.
    fn load(&self, name: &str) -> Result<Document>;

    /// Replace the whole document.
    fn save(&mut self, name: &str, document: Document) -> Result<()>;

    fn write(&mut self, name: &str, document: Document, mode: WriteMode) -> Result<()> {
        match mode {
            WriteMode::Overwrite => self.save(name, document),
            WriteMode::Merge => {
                let mut current = self.load(name)?;
                merge_shallow(&mut current, document);
                self.save(name, current)
            }
        }
    }
}

pub fn open_store(backend: Backend, dir: &Path) -> Result<Box<dyn DocumentStore>> {
    Ok(match backend {
        Backend::Json => Box::new(JsonFileStore::new(dir)?),
        Backend::Sqlite => Box::new(SqliteStore::new(dir)?),
    })
}

/// Insert every top-level key of `update` into `base`, replacing matches.
pub fn merge_shallow(base: &mut Document, update: Document) {
    for (key, value) in update {
        base.insert(key, value);
    }
}

/// Parse stored text. Anything that is not a JSON object is reported and
/// treated as an empty document so callers re-collect instead of failing.
pub(crate) fn parse_document(name: &str, text: &str) -> Document {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let err = CogitateError::malformed(name, format!("expected an object, found {}", kind(&other)));
            warn!(%err, "ignoring stored document");
            Document::new()
        }
        Err(e) => {
            let err = CogitateError::malformed(name, e.to_string());
            warn!(%err, "ignoring stored document");
            Document::new()
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
