//! Persistance SQLite des snapshots
//!
//! Une seule base de travail, écrite par la seule tâche coordinatrice, dans
//! une seule transaction par exécution.

pub mod schema;
pub mod transaction;

pub use transaction::{SnapshotTransaction, UpsertOutcome};

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info};

/// Erreurs de la base de snapshot
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove working database {path:?}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SQLite error during {operation}: {source}")]
    Sqlite {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    pub(crate) fn sqlite(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Sqlite { operation, source }
    }
}

/// Base SQLite d'un snapshot (tables `areas` et `version`)
#[derive(Debug)]
pub struct SnapshotStore {
    conn: Connection,
    path: PathBuf,
}

impl SnapshotStore {
    /// Ouvre (ou crée) la base et son schéma
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(StoreError::sqlite("open database"))?;
        schema::create_schema(&conn).map_err(StoreError::sqlite("create schema"))?;
        debug!(path = %path.display(), "Snapshot store opened");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Démarre la transaction unique de l'exécution
    pub fn begin(&mut self) -> Result<SnapshotTransaction<'_>, StoreError> {
        SnapshotTransaction::begin(&mut self.conn)
    }

    /// Codes présents dans `areas`, triés
    pub fn area_codes(&self) -> Result<Vec<i64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT CODICE FROM areas ORDER BY CODICE")
            .map_err(StoreError::sqlite("prepare area codes"))?;
        let codes = stmt
            .query_map([], |row| row.get(0))
            .map_err(StoreError::sqlite("query area codes"))?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .map_err(StoreError::sqlite("read area codes"))?;
        Ok(codes)
    }

    /// Nombre de lignes dans `version`
    pub fn version_rows(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM version", [], |row| row.get(0))
            .map_err(StoreError::sqlite("count version rows"))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Horodatage du dernier commit
    pub fn version(&self) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row("SELECT lastUpdate FROM version WHERE rowid = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(StoreError::sqlite("read version"))
    }

    /// Ferme la connexion (nécessaire avant de déplacer le fichier)
    pub fn close(self) -> Result<PathBuf, StoreError> {
        let path = self.path;
        self.conn
            .close()
            .map_err(|(_, source)| StoreError::Sqlite {
                operation: "close database",
                source,
            })?;
        Ok(path)
    }

    /// Ferme et supprime la base de travail (exécution avortée)
    pub fn discard(self) -> Result<(), StoreError> {
        let path = self.close()?;
        Self::remove(&path)?;
        info!(path = %path.display(), "Working database discarded");
        Ok(())
    }

    /// Supprime un fichier de base et son journal, s'ils existent
    pub fn remove(path: &Path) -> Result<(), StoreError> {
        for candidate in [path.to_path_buf(), journal_path(path)] {
            match std::fs::remove_file(&candidate) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StoreError::Remove {
                        path: candidate,
                        source,
                    })
                }
            }
        }
        Ok(())
    }
}

fn journal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push("-journal");
    PathBuf::from(name)
}
