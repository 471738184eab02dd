//! Récolte des zones : couches régionales, déduplication, simplification

pub mod dedup;
pub mod region;
pub mod simplify;

pub use dedup::{deduplicate, to_feature_collection};
pub use region::{harvest_regions, HarvestOutcome};
pub use simplify::{load_simplified, GeometrySimplifier, Mapshaper, SimplifiedLoad};

use geojson::Geometry;

/// Zone simplifiée prête pour l'enrichissement
#[derive(Debug, Clone, PartialEq)]
pub struct AreaFeature {
    pub code: i64,
    pub geometry: Geometry,
}
