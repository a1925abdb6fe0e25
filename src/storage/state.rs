//! The autosaved session file: written after every edit, read back on start.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::document;
use crate::console;
use crate::model::Document;

/// Writes the session file, creating its directory if needed.
pub fn persist(doc: &Document, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    document::save(doc, path)
}

/// The last autosaved session, or the starter document when there is none.
///
/// An unreadable file is reported and skipped. A session saved with no
/// measures comes back with one default measure at its saved tempo.
pub fn restore(path: impl AsRef<Path>) -> Document {
    let path = path.as_ref();
    if !path.exists() {
        return Document::starter();
    }
    match document::open(path) {
        Ok(mut doc) => {
            if doc.measures.is_empty() {
                doc.measures.add_default();
            }
            doc
        }
        Err(e) => {
            console::warn(format!("could not restore the last session: {:#}", e));
            Document::starter()
        }
    }
}
