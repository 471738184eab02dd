//! Rapport d'exécution avec graceful degradation
//!
//! Chaque erreur non fatale est collectée ici et affichée en fin d'exécution.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::error::{FatalError, Scope, UnitError};

/// Statut global de l'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Snapshot produit sans erreur
    Success,
    /// Snapshot produit, certaines unités en échec
    PartialSuccess,
    /// Exécution interrompue, aucun snapshot
    Failed,
}

/// Catégorie d'erreur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    Network,
    Transform,
    Constraint,
    Fatal,
}

/// Erreur collectée avec son contexte
#[derive(Debug, Clone, Serialize)]
pub struct RunIssue {
    pub kind: IssueKind,
    /// Code de zone concerné
    pub area: Option<i64>,
    /// Code ISTAT de la région concernée
    pub region: Option<String>,
    pub message: String,
}

/// Rapport complet d'une exécution
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub duration_secs: f64,

    /// Le cache simplifié a évité la récolte
    pub cache_hit: bool,
    pub regions_harvested: usize,
    pub regions_failed: usize,
    pub features_harvested: usize,
    pub features_unique: usize,
    /// Features perdues par la simplification (code ou géométrie absents)
    pub features_dropped: usize,

    pub areas_enriched: usize,
    pub areas_skipped: usize,
    /// Zones écartées car résolues vers un code déjà enrichi
    pub areas_duplicated: usize,
    pub rows_written: usize,

    pub snapshot: Option<String>,
    pub checksum: Option<String>,

    pub issues: Vec<RunIssue>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            status: RunStatus::Success,
            duration_secs: 0.0,
            cache_hit: false,
            regions_harvested: 0,
            regions_failed: 0,
            features_harvested: 0,
            features_unique: 0,
            features_dropped: 0,
            areas_enriched: 0,
            areas_skipped: 0,
            areas_duplicated: 0,
            rows_written: 0,
            snapshot: None,
            checksum: None,
            issues: Vec::new(),
        }
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre une erreur non fatale
    pub fn record_unit_error(&mut self, error: &UnitError) {
        let (kind, region) = match error {
            UnitError::Network {
                scope: Scope::Region(istat),
                ..
            } => (IssueKind::Network, Some(istat.clone())),
            UnitError::Network { .. } => (IssueKind::Network, None),
            UnitError::Transform { .. } => (IssueKind::Transform, None),
            UnitError::Constraint { .. } => (IssueKind::Constraint, None),
        };
        self.issues.push(RunIssue {
            kind,
            area: error.area(),
            region,
            message: error.to_string(),
        });
    }

    pub fn record_unit_errors<'a>(&mut self, errors: impl IntoIterator<Item = &'a UnitError>) {
        for error in errors {
            self.record_unit_error(error);
        }
    }

    /// Enregistre l'erreur qui a interrompu l'exécution
    pub fn record_fatal(&mut self, error: &FatalError) {
        let area = match error {
            FatalError::UnknownProvince { area, .. } => Some(*area),
            _ => None,
        };
        self.issues.push(RunIssue {
            kind: IssueKind::Fatal,
            area,
            region: None,
            message: error.to_string(),
        });
    }

    /// Codes des zones en échec, triés
    pub fn failed_areas(&self) -> Vec<i64> {
        let mut codes: Vec<i64> = self
            .issues
            .iter()
            .filter(|i| i.kind != IssueKind::Fatal)
            .filter_map(|i| i.area)
            .collect();
        codes.sort_unstable();
        codes.dedup();
        codes
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let has_fatal = self.issues.iter().any(|i| i.kind == IssueKind::Fatal);
        self.status = if has_fatal || self.snapshot.is_none() {
            RunStatus::Failed
        } else if !self.issues.is_empty() {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        match &self.snapshot {
            Some(name) => println!("UPDATE REPORT - Snapshot {}", name),
            None => println!("UPDATE REPORT - no snapshot"),
        }
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        if self.cache_hit {
            println!("Harvest: skipped (simplified cache present)");
        } else {
            println!(
                "Regions: {} harvested, {} failed",
                self.regions_harvested, self.regions_failed
            );
            println!(
                "Features: {} harvested, {} unique",
                self.features_harvested, self.features_unique
            );
        }
        if self.features_dropped > 0 {
            println!("Features dropped by simplification: {}", self.features_dropped);
        }
        println!(
            "Areas: {} enriched, {} skipped, {} rows written",
            self.areas_enriched, self.areas_skipped, self.rows_written
        );
        if self.areas_duplicated > 0 {
            println!("Duplicate areas dropped: {}", self.areas_duplicated);
        }
        if let Some(checksum) = &self.checksum {
            println!("Checksum: {}", checksum);
        }

        if !self.issues.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.issues.len());
            for issue in self.issues.iter().take(20) {
                let location = match (&issue.region, issue.area) {
                    (Some(r), _) => format!("[region {}]", r),
                    (None, Some(a)) => format!("[area {}]", a),
                    _ => String::new(),
                };
                println!("  {:?} {} {}", issue.kind, location, issue.message);
            }
            if self.issues.len() > 20 {
                println!("  ... and {} more", self.issues.len() - 20);
            }

            let failed = self.failed_areas();
            if !failed.is_empty() {
                let codes: Vec<String> = failed.iter().map(|c| c.to_string()).collect();
                println!("\nFailed areas: {}", codes.join(", "));
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} rows written, {} skipped, {} errors",
            self.snapshot.as_deref().unwrap_or("no snapshot"),
            self.rows_written,
            self.areas_skipped,
            self.issues.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portale::PortaleError;

    fn network(scope: Scope) -> UnitError {
        UnitError::Network {
            scope,
            source: PortaleError::Request {
                url: "https://example.invalid".into(),
                status: 503,
                area: None,
            },
        }
    }

    #[test]
    fn test_report_default() {
        let report = RunReport::default();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.rows_written, 0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_record_unit_errors() {
        let mut report = RunReport::new();
        report.record_unit_errors(&[
            network(Scope::Region("009".into())),
            network(Scope::Area(42)),
            UnitError::transform(7, "missing field `nome`"),
            UnitError::transform(42, "bad geometry"),
        ]);

        assert_eq!(report.issues.len(), 4);
        assert_eq!(report.issues[0].region.as_deref(), Some("009"));
        assert_eq!(report.issues[0].area, None);
        assert_eq!(report.issues[2].kind, IssueKind::Transform);
        assert_eq!(report.failed_areas(), vec![7, 42]);
    }

    #[test]
    fn test_finalize() {
        let mut report = RunReport::new();
        report.snapshot = Some("2024-07-01T10:00:00".into());
        report.finalize();
        assert_eq!(report.status, RunStatus::Success);

        report.record_unit_error(&UnitError::transform(1, "x"));
        report.finalize();
        assert_eq!(report.status, RunStatus::PartialSuccess);

        report.record_fatal(&FatalError::NoAreas { attempted: 3 });
        report.finalize();
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[test]
    fn test_finalize_without_snapshot() {
        let mut report = RunReport::new();
        report.finalize();
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[test]
    fn test_summary_and_save() {
        let mut report = RunReport::new();
        report.snapshot = Some("2024-07-01T10:00:00".into());
        report.rows_written = 12;
        assert_eq!(
            report.summary(),
            "2024-07-01T10:00:00: 12 rows written, 0 skipped, 0 errors"
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.save_to_file(&path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["rows_written"], 12);
        assert_eq!(raw["status"], "Success");
    }
}
