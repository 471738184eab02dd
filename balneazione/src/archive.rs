//! Archivage daté d'un snapshot
//!
//! Le nom horodaté (`%Y-%m-%dT%H:%M:%S`) est la seule clé de correspondance
//! entre l'export JSON et la base archivée. Il se trie lexicographiquement.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::AreaRecord;

/// Format des noms de snapshot
pub const SNAPSHOT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Alias de l'export le plus récent
pub const LATEST_JSON: &str = "latest.json";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Snapshot {0:?} already exists, archived snapshots are immutable")]
    AlreadyExists(PathBuf),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize snapshot {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ArchiveError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Artefacts d'un snapshot archivé
#[derive(Debug, Clone)]
pub struct ArchivedSnapshot {
    pub name: String,
    pub database: PathBuf,
    pub json: PathBuf,
    pub latest_json: PathBuf,
    /// blake3 de la base archivée, en hexadécimal
    pub checksum: String,
}

/// Nom de snapshot pour un instant donné
pub fn snapshot_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(SNAPSHOT_FORMAT).to_string()
}

/// Vrai si `name` (sans extension) est un nom de snapshot
pub fn is_snapshot_name(name: &str) -> bool {
    name.len() == 19 && NaiveDateTime::parse_from_str(name, SNAPSHOT_FORMAT).is_ok()
}

/// Vérifie qu'aucun artefact du snapshot `name` n'existe encore
pub fn ensure_vacant(json_dir: &Path, archive_dir: &Path, name: &str) -> Result<(), ArchiveError> {
    let json = json_dir.join(format!("{}.json", name));
    let database = archive_dir.join(format!("{}.db", name));
    for target in [json, database] {
        if target.exists() {
            return Err(ArchiveError::AlreadyExists(target));
        }
    }
    Ok(())
}

/// Écrit les exports JSON et déplace la base de travail dans l'archive
///
/// La base doit être fermée. Un snapshot existant n'est jamais écrasé.
pub fn archive_snapshot(
    records: &[AreaRecord],
    working_db: &Path,
    json_dir: &Path,
    archive_dir: &Path,
    name: &str,
) -> Result<ArchivedSnapshot, ArchiveError> {
    ensure_vacant(json_dir, archive_dir, name)?;
    std::fs::create_dir_all(json_dir).map_err(ArchiveError::io(json_dir))?;
    std::fs::create_dir_all(archive_dir).map_err(ArchiveError::io(archive_dir))?;

    let json = json_dir.join(format!("{}.json", name));
    let database = archive_dir.join(format!("{}.db", name));

    write_json(&json, records)?;
    let latest_json = json_dir.join(LATEST_JSON);
    std::fs::copy(&json, &latest_json).map_err(ArchiveError::io(&latest_json))?;

    move_file(working_db, &database)?;
    let checksum = file_checksum(&database)?;

    info!(
        snapshot = name,
        database = %database.display(),
        json = %json.display(),
        checksum = checksum.as_str(),
        areas = records.len(),
        "Snapshot archived"
    );

    Ok(ArchivedSnapshot {
        name: name.to_string(),
        database,
        json,
        latest_json,
        checksum,
    })
}

fn write_json(path: &Path, records: &[AreaRecord]) -> Result<(), ArchiveError> {
    let file = File::create(path).map_err(ArchiveError::io(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, records).map_err(|source| ArchiveError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(ArchiveError::io(path))
}

/// `rename`, avec repli copie + suppression entre systèmes de fichiers
fn move_file(from: &Path, to: &Path) -> Result<(), ArchiveError> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    warn!(from = %from.display(), to = %to.display(), "Rename failed, copying instead");
    std::fs::copy(from, to).map_err(ArchiveError::io(to))?;
    std::fs::remove_file(from).map_err(ArchiveError::io(from))
}

/// Checksum blake3 d'un fichier
pub fn file_checksum(path: &Path) -> Result<String, ArchiveError> {
    let mut file = File::open(path).map_err(ArchiveError::io(path))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(ArchiveError::io(path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample_record;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn test_snapshot_name_sortable() {
        let a = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 7, 1)
                .unwrap()
                .and_hms_opt(9, 5, 3)
                .unwrap(),
        );
        let b = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 12, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        assert_eq!(snapshot_name(&a), "2024-07-01T09:05:03");
        assert!(snapshot_name(&a) < snapshot_name(&b));
        assert!(is_snapshot_name(&snapshot_name(&a)));
        assert!(!is_snapshot_name("latest"));
    }

    #[test]
    fn test_archive_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let working = dir.path().join("latest.db");
        std::fs::write(&working, b"sqlite bytes").unwrap();
        let records = vec![sample_record(1), sample_record(2)];

        let snapshot = archive_snapshot(
            &records,
            &working,
            &dir.path().join("json"),
            dir.path(),
            "2024-07-01T09:05:03",
        )
        .unwrap();

        assert!(!working.exists());
        assert_eq!(std::fs::read(&snapshot.database).unwrap(), b"sqlite bytes");
        assert_eq!(
            snapshot.checksum,
            blake3::hash(b"sqlite bytes").to_hex().to_string()
        );

        let dated: Vec<AreaRecord> =
            serde_json::from_slice(&std::fs::read(&snapshot.json).unwrap()).unwrap();
        let latest: Vec<AreaRecord> =
            serde_json::from_slice(&std::fs::read(&snapshot.latest_json).unwrap()).unwrap();
        assert_eq!(dated, records);
        assert_eq!(latest, records);
    }

    #[test]
    fn test_existing_snapshot_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let working = dir.path().join("latest.db");
        std::fs::write(&working, b"new").unwrap();
        std::fs::write(dir.path().join("2024-07-01T09:05:03.db"), b"old").unwrap();

        let err = archive_snapshot(
            &[],
            &working,
            &dir.path().join("json"),
            dir.path(),
            "2024-07-01T09:05:03",
        )
        .unwrap_err();

        assert!(matches!(err, ArchiveError::AlreadyExists(_)));
        assert!(working.exists());
        assert_eq!(
            std::fs::read(dir.path().join("2024-07-01T09:05:03.db")).unwrap(),
            b"old"
        );
    }

    #[test]
    fn test_ensure_vacant_checks_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let json_dir = dir.path().join("json");
        assert!(ensure_vacant(&json_dir, dir.path(), "2024-07-01T09:05:03").is_ok());

        std::fs::create_dir_all(&json_dir).unwrap();
        std::fs::write(json_dir.join("2024-07-01T09:05:03.json"), b"[]").unwrap();

        match ensure_vacant(&json_dir, dir.path(), "2024-07-01T09:05:03") {
            Err(ArchiveError::AlreadyExists(path)) => {
                assert_eq!(path, json_dir.join("2024-07-01T09:05:03.json"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
