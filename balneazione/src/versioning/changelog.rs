//! Journal des changements entre snapshots (`updates.json`)

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::DiffError;

/// Une entrée du journal : la date du snapshot le plus récent et ses différences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub date: String,
    pub diff: Vec<String>,
}

/// Journal en ajout seul
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changelog {
    entries: Vec<ChangelogEntry>,
}

impl Changelog {
    /// Charge le journal ; absent ou vide, il est considéré comme vide
    pub fn load(path: &Path) -> Result<Self, DiffError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(DiffError::io(path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let entries = serde_json::from_str(&content).map_err(|source| DiffError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ChangelogEntry] {
        &self.entries
    }

    /// Date de la dernière entrée enregistrée
    pub fn last_date(&self) -> Option<&str> {
        self.entries.last().map(|e| e.date.as_str())
    }

    /// Vrai si un snapshot daté `date` n'a pas encore été traité
    pub fn accepts(&self, date: &str) -> bool {
        self.last_date().map_or(true, |last| date > last)
    }

    /// Ajoute une entrée si elle est plus récente que la dernière et non vide
    pub fn append(&mut self, entry: ChangelogEntry) -> bool {
        if entry.diff.is_empty() || !self.accepts(&entry.date) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Réécrit le journal de façon atomique (fichier temporaire + rename)
    pub fn save(&self, path: &Path) -> Result<(), DiffError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| DiffError::io(dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| DiffError::io(dir, e))?;
        serde_json::to_writer(&mut tmp, &self.entries).map_err(|source| DiffError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tmp.flush().map_err(|e| DiffError::io(path, e))?;
        tmp.persist(path).map_err(|e| DiffError::io(path, e.error))?;
        Ok(())
    }
}
