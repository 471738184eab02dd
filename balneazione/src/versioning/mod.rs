//! Versioning des snapshots : différences et journal des changements

pub mod changelog;
pub mod diff;

pub use changelog::{Changelog, ChangelogEntry};
pub use diff::{diff_databases, diff_tables, load_table, TableSnapshot};

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::archive::is_snapshot_name;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("Failed to open snapshot {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Table '{0}' not found")]
    MissingTable(String),

    #[error("Table '{0}' has no integer primary key")]
    MissingKey(String),

    #[error("Table '{0}' has different columns in the two snapshots")]
    SchemaMismatch(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid changelog {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DiffError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Issue d'un passage du comparateur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Moins de deux snapshots archivés
    NotEnoughSnapshots { found: usize },
    /// Le snapshot le plus récent est déjà couvert par le journal
    AlreadyRecorded { newer: String, last: String },
    /// Aucune différence entre les deux snapshots
    NoChanges { older: String, newer: String },
    /// Une entrée a été ajoutée au journal
    Appended {
        older: String,
        newer: String,
        statements: usize,
    },
}

/// Noms (sans `.db`) des snapshots archivés, du plus récent au plus ancien
///
/// La base de travail et tout fichier au nom non horodaté sont exclus.
pub fn list_snapshots(archive_dir: &Path, working_db: &str) -> Result<Vec<String>, DiffError> {
    let mut names = Vec::new();
    let entries = std::fs::read_dir(archive_dir).map_err(|e| DiffError::io(archive_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DiffError::io(archive_dir, e))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name == working_db {
            continue;
        }
        if let Some(stem) = file_name.strip_suffix(".db") {
            if is_snapshot_name(stem) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names)
}

/// Compare les deux snapshots les plus récents et alimente le journal
///
/// Idempotent : relancé sur une paire déjà enregistrée, il ne fait rien.
pub fn run_diff(
    archive_dir: &Path,
    working_db: &str,
    changelog_path: &Path,
) -> Result<DiffOutcome, DiffError> {
    let snapshots = list_snapshots(archive_dir, working_db)?;
    let (newer, older) = match snapshots.as_slice() {
        [newer, older, ..] => (newer.clone(), older.clone()),
        _ => {
            return Ok(DiffOutcome::NotEnoughSnapshots {
                found: snapshots.len(),
            })
        }
    };
    info!(older = older.as_str(), newer = newer.as_str(), "Comparing snapshots");

    let mut changelog = Changelog::load(changelog_path)?;
    if !changelog.accepts(&newer) {
        let last = changelog.last_date().unwrap_or_default().to_string();
        info!(last = last.as_str(), "Snapshot already recorded");
        return Ok(DiffOutcome::AlreadyRecorded { newer, last });
    }

    let statements = diff_databases(
        &archive_dir.join(format!("{}.db", older)),
        &archive_dir.join(format!("{}.db", newer)),
    )?;
    let count = statements.len();

    let appended = changelog.append(ChangelogEntry {
        date: newer.clone(),
        diff: statements,
    });
    if !appended {
        info!("No changes between snapshots");
        return Ok(DiffOutcome::NoChanges { older, newer });
    }

    changelog.save(changelog_path)?;
    info!(statements = count, "Changelog entry appended");

    Ok(DiffOutcome::Appended {
        older,
        newer,
        statements: count,
    })
}
