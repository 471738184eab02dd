//! # portale
//!
//! Client pour les données ouvertes du Portale Acque (qualité des eaux de baignade).
//!
//! ## Features
//!
//! - Couche régionale `rest/layer/AB` : features GeoJSON avec le code de zone (`CODICE`)
//! - Détail d'une zone `datiArea.do` : métadonnées, analyses courantes et historiques,
//!   fiche profil, interdictions
//! - Types `serde` explicites, champs optionnels plutôt qu'absence implicite
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portale::{ClientConfig, HttpPortale, PortaleSource};
//!
//! let portale = HttpPortale::new(ClientConfig::default())?;
//! let features = portale.region_features("048017").await?;
//! for feature in &features {
//!     let detail = portale.area_detail(feature.code).await?;
//!     println!("{}: {:?}", feature.code, detail.area.map(|a| a.nome));
//! }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientConfig, HttpPortale, PortaleSource, DEFAULT_BASE_URL};
pub use error::PortaleError;
pub use types::{area_code, Analysis, AreaBean, AreaDetail, ProfileSheet, RawFeature};

/// Chemin de la couche des zones de baignade, par code ISTAT de région
pub const AB_LAYER: &str = "rest/layer/AB";

/// Nom de la propriété portant le code de zone dans les features GeoJSON
pub const CODE_PROPERTY: &str = "CODICE";
