//! Transaction atomique d'un snapshot
//!
//! Toutes les zones et la version sont écrites dans la même transaction :
//! si le processus s'arrête avant le commit, la base reste intacte.

use rusqlite::{params, Connection, ErrorCode, Transaction};
use tracing::{info, warn};

use super::schema::upsert_area_sql;
use super::StoreError;
use crate::error::UnitError;
use crate::model::AreaRecord;

/// Résultat d'un upsert de zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Ligne insérée ou remplacée
    Written,
    /// Ligne rejetée par une contrainte, transaction poursuivie
    Skipped,
}

/// Transaction d'écriture d'un snapshot
pub struct SnapshotTransaction<'a> {
    tx: Transaction<'a>,
    written: usize,
    rejected: Vec<UnitError>,
}

impl<'a> SnapshotTransaction<'a> {
    pub(super) fn begin(conn: &'a mut Connection) -> Result<Self, StoreError> {
        let tx = conn
            .transaction()
            .map_err(StoreError::sqlite("begin transaction"))?;
        Ok(Self {
            tx,
            written: 0,
            rejected: Vec::new(),
        })
    }

    /// Insère ou remplace une zone
    ///
    /// Une violation de contrainte est journalisée et la ligne ignorée ;
    /// toute autre erreur SQLite est remontée.
    pub fn upsert_area(&mut self, record: &AreaRecord) -> Result<UpsertOutcome, StoreError> {
        let mut stmt = self
            .tx
            .prepare_cached(&upsert_area_sql())
            .map_err(StoreError::sqlite("prepare area upsert"))?;

        let result = stmt.execute(params![
            record.code,
            record.name,
            record.municipality,
            record.province,
            record.province_abbr,
            record.region,
            record.status,
            record.limit_ei,
            record.limit_ec,
            record.season_start,
            record.season_end,
            record.status_desc,
            record.geometry,
            record.out_of_norm,
            record.last_analysis,
            record.value_ei,
            record.value_ec,
            record.over_limit,
            record.profile,
            record.interdiction,
        ]);

        match result {
            Ok(_) => {
                self.written += 1;
                Ok(UpsertOutcome::Written)
            }
            Err(e) if is_constraint_violation(&e) => {
                warn!(area = record.code, error = %e, "Row rejected by constraint, skipped");
                self.rejected.push(UnitError::Constraint {
                    area: record.code,
                    source: e,
                });
                Ok(UpsertOutcome::Skipped)
            }
            Err(source) => Err(StoreError::Sqlite {
                operation: "upsert area",
                source,
            }),
        }
    }

    /// Enregistre l'horodatage de la version (ligne unique)
    pub fn set_version(&mut self, timestamp: &str) -> Result<(), StoreError> {
        self.tx
            .execute(
                "INSERT OR REPLACE INTO version (rowid, lastUpdate) VALUES (1, ?1)",
                [timestamp],
            )
            .map_err(StoreError::sqlite("upsert version"))?;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Valide la transaction
    ///
    /// Retourne le nombre de lignes écrites et les lignes rejetées.
    pub fn commit(self) -> Result<(usize, Vec<UnitError>), StoreError> {
        self.tx.commit().map_err(StoreError::sqlite("commit"))?;
        info!(
            written = self.written,
            rejected = self.rejected.len(),
            "Snapshot transaction committed"
        );
        Ok((self.written, self.rejected))
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::super::SnapshotStore;
    use super::*;
    use crate::model::sample_record as record;

    #[test]
    fn test_commit_rows_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::open(&dir.path().join("latest.db")).unwrap();

        let mut tx = store.begin().unwrap();
        for code in [3, 1, 2] {
            assert_eq!(tx.upsert_area(&record(code)).unwrap(), UpsertOutcome::Written);
        }
        // Remplacement sur la même clé
        tx.upsert_area(&record(2)).unwrap();
        tx.set_version("2024-07-01T10:00:00").unwrap();
        tx.set_version("2024-07-01T10:00:01").unwrap();
        let (written, rejected) = tx.commit().unwrap();

        assert_eq!(written, 4);
        assert!(rejected.is_empty());
        assert_eq!(store.area_codes().unwrap(), vec![1, 2, 3]);
        assert_eq!(store.version_rows().unwrap(), 1);
        assert_eq!(store.version().unwrap().as_deref(), Some("2024-07-01T10:00:01"));
    }

    #[test]
    fn test_constraint_violation_skips_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::open(&dir.path().join("latest.db")).unwrap();

        let mut bad = record(2);
        bad.province_abbr = "LIV".into();

        let mut tx = store.begin().unwrap();
        tx.upsert_area(&record(1)).unwrap();
        assert_eq!(tx.upsert_area(&bad).unwrap(), UpsertOutcome::Skipped);
        tx.upsert_area(&record(3)).unwrap();
        let (written, rejected) = tx.commit().unwrap();

        assert_eq!(written, 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].area(), Some(2));
        assert_eq!(store.area_codes().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::open(&dir.path().join("latest.db")).unwrap();

        {
            let mut tx = store.begin().unwrap();
            tx.upsert_area(&record(1)).unwrap();
            tx.set_version("2024-07-01T10:00:00").unwrap();
        }

        assert!(store.area_codes().unwrap().is_empty());
        assert_eq!(store.version().unwrap(), None);
    }
}
