use super::{parse_document, Document, DocumentStore};
use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One pretty-printed `<name>.json` file per document.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, name: &str) -> Result<Document> {
        let path = self.path_for(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(parse_document(name, &text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, name: &str, document: Document) -> Result<()> {
        let path = self.path_for(name);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, &document)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(path = %path.display(), keys = document.len(), "document written");
        Ok(())
    }
}
