//! # balneazione
//!
//! Snapshots versionnés des zones de baignade publiées par le Portale Acque.
//!
//! ## Features
//!
//! - Récolte parallèle des couches régionales et déduplication des zones
//! - Simplification des géométries (cache persistant `minified.json`)
//! - Enrichissement borné par le détail de chaque zone
//! - Transaction SQLite unique par exécution, version horodatée
//! - Archivage daté (base + export JSON) et journal des différences
//!
//! ## Usage CLI
//!
//! ```bash
//! # Mise à jour complète (commande par défaut)
//! balneazione
//! balneazione update --data-dir ./data --workers 15 --report report.json
//!
//! # Différence entre les deux derniers snapshots archivés
//! balneazione diff --data-dir ./data
//! ```

pub mod archive;
pub mod config;
pub mod enrich;
pub mod error;
pub mod harvest;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod versioning;

pub use config::{Region, RunConfig};
pub use error::{FatalError, RunFailure, Scope, UnitError};
pub use model::AreaRecord;
pub use pipeline::{run_update, run_update_named};
pub use report::{RunReport, RunStatus};
pub use versioning::{run_diff, DiffOutcome};
