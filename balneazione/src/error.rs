//! Types d'erreurs du pipeline
//!
//! Les erreurs unitaires (`UnitError`) sont collectées dans le rapport et
//! n'interrompent jamais l'exécution. Seules les `FatalError` la déroulent.

use std::fmt;
use std::path::PathBuf;

use portale::PortaleError;
use thiserror::Error;

use crate::report::RunReport;
use crate::store::StoreError;

/// Unité de travail concernée par une erreur réseau
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Récolte d'une région (code ISTAT)
    Region(String),
    /// Enrichissement d'une zone
    Area(i64),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Region(code) => write!(f, "region {}", code),
            Scope::Area(code) => write!(f, "area {}", code),
        }
    }
}

/// Erreur non fatale limitée à une unité de travail
#[derive(Debug, Error)]
pub enum UnitError {
    /// Statut non-succès ou échec de transport
    #[error("Network error ({scope}): {source}")]
    Network {
        scope: Scope,
        #[source]
        source: PortaleError,
    },

    /// Réponse reçue mais inexploitable
    #[error("Transform error (area {area}): {reason}")]
    Transform { area: i64, reason: String },

    /// Ligne rejetée par une contrainte SQLite
    #[error("Constraint error (area {area}): {source}")]
    Constraint {
        area: i64,
        #[source]
        source: rusqlite::Error,
    },
}

impl UnitError {
    pub fn transform(area: i64, reason: impl Into<String>) -> Self {
        Self::Transform {
            area,
            reason: reason.into(),
        }
    }

    /// Code de zone concerné, si l'erreur porte sur une zone
    pub fn area(&self) -> Option<i64> {
        match self {
            Self::Network {
                scope: Scope::Area(code),
                ..
            } => Some(*code),
            Self::Network { .. } => None,
            Self::Transform { area, .. } | Self::Constraint { area, .. } => Some(*area),
        }
    }
}

/// Erreur qui interrompt toute l'exécution
#[derive(Debug, Error)]
pub enum FatalError {
    /// Aucune zone enrichie : la source est considérée indisponible
    #[error("No area could be enriched out of {attempted}: upstream source unavailable")]
    NoAreas { attempted: usize },

    /// Sigla absente de la table de correspondance
    #[error("Unknown province abbreviation '{sigla}' (area {area}): region lookup table is incomplete")]
    UnknownProvince { sigla: String, area: i64 },

    /// Table province → région illisible
    #[error("Region lookup table unavailable: {0}")]
    Lookup(String),

    /// Échec de l'outil de simplification
    #[error("Geometry simplification failed: {0}")]
    Simplifier(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Archive(#[from] crate::archive::ArchiveError),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid GeoJSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl FatalError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Échec d'une exécution, avec le rapport des erreurs accumulées jusque-là
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: FatalError,
    pub report: RunReport,
}
