//! Récolte parallèle des couches régionales

use futures::stream::{self, StreamExt};
use portale::{PortaleSource, RawFeature};
use tracing::{info, warn};

use crate::config::Region;
use crate::error::{Scope, UnitError};

/// Résultat de la récolte de toutes les régions
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    /// Features concaténées dans l'ordre d'arrivée des régions
    pub features: Vec<RawFeature>,
    /// Régions récoltées avec succès
    pub regions_ok: usize,
    /// Régions en échec (liste vide pour chacune)
    pub failures: Vec<UnitError>,
}

/// Récolte les features de chaque région avec un pool borné
///
/// Une région en échec est journalisée et ne contribue aucune feature ;
/// les autres continuent.
pub async fn harvest_regions<S>(source: &S, regions: &[Region], workers: usize) -> HarvestOutcome
where
    S: PortaleSource + ?Sized,
{
    let results: Vec<(&Region, Result<Vec<RawFeature>, portale::PortaleError>)> =
        stream::iter(regions)
            .map(|region| async move { (region, source.region_features(&region.istat).await) })
            .buffer_unordered(workers.max(1))
            .collect()
            .await;

    let mut outcome = HarvestOutcome::default();
    for (region, result) in results {
        match result {
            Ok(features) => {
                info!(
                    region = region.name.as_str(),
                    istat = region.istat.as_str(),
                    features = features.len(),
                    "Region harvested"
                );
                outcome.regions_ok += 1;
                outcome.features.extend(features);
            }
            Err(e) => {
                warn!(
                    region = region.name.as_str(),
                    istat = region.istat.as_str(),
                    error = %e,
                    "Region harvest failed"
                );
                outcome.failures.push(UnitError::Network {
                    scope: Scope::Region(region.istat.clone()),
                    source: e,
                });
            }
        }
    }

    outcome
}
