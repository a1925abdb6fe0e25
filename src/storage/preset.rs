//! Named presets: one JSON document per name in a directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use super::document;
use crate::model::Document;

#[derive(Debug, Clone)]
pub struct PresetStore {
    dir: PathBuf,
}

impl PresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Saves `doc` under `name`, replacing any preset of that name.
    pub fn save(&self, name: &str, doc: &Document) -> Result<()> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        document::save(doc, path)
    }

    /// Preset names, sorted case-insensitively. A missing directory has none.
    pub fn list(&self) -> Result<Vec<String>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.dir.display()))
            }
        };
        let mut names: Vec<String> = read_dir
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort_by_key(|n| n.to_lowercase());
        Ok(names)
    }

    pub fn load(&self, name: &str) -> Result<Document> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            bail!("no preset named {:?}", name.trim());
        }
        document::open(path)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            bail!("no preset named {:?}", name.trim());
        }
        fs::remove_file(&path).with_context(|| format!("deleting {}", path.display()))
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            bail!("preset names cannot be empty");
        }
        if name.starts_with('.') || name.contains(['/', '\\']) {
            bail!("invalid preset name {:?}", name);
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Measure, Sequence, Tempo};

    fn waltz() -> Document {
        Document {
            tempo: Tempo::new(90).unwrap(),
            measures: Sequence::new(vec![Measure::new(3).unwrap()]),
        }
    }

    #[test]
    fn save_list_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::new(dir.path().join("presets"));
        assert!(store.list().unwrap().is_empty());

        store.save("waltz", &waltz()).unwrap();
        store.save("Backbeat", &Document::starter()).unwrap();
        assert_eq!(store.list().unwrap(), vec!["Backbeat", "waltz"]);
        assert_eq!(store.load("waltz").unwrap(), waltz());

        store.delete("waltz").unwrap();
        assert_eq!(store.list().unwrap(), vec!["Backbeat"]);
        assert!(store.load("waltz").unwrap_err().to_string().contains("no preset named"));
        assert!(store.delete("waltz").is_err());
    }

    #[test]
    fn saving_again_replaces_the_preset() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::new(dir.path());
        store.save("groove", &Document::starter()).unwrap();
        store.save("groove", &waltz()).unwrap();
        assert_eq!(store.list().unwrap(), vec!["groove"]);
        assert_eq!(store.load("groove").unwrap(), waltz());
    }

    #[test]
    fn names_must_stay_inside_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::new(dir.path());
        assert!(store.save("", &waltz()).is_err());
        assert!(store.save("../escape", &waltz()).is_err());
        assert!(store.save(".hidden", &waltz()).is_err());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn names_with_spaces_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::new(dir.path());
        store.save("slow blues", &waltz()).unwrap();
        assert_eq!(store.list().unwrap(), vec!["slow blues"]);
        assert_eq!(store.load(" slow blues ").unwrap(), waltz());
    }
}
