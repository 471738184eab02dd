//! Enrichissement des zones par le détail du portail
//!
//! Pool borné : chaque zone est indépendante, les échecs sont collectés et
//! n'affectent pas les autres tâches. Les résultats sont rassemblés dans un
//! seul `Vec` une fois toutes les tâches terminées.

pub mod lookup;
pub mod transform;

pub use lookup::RegionLookup;
pub use transform::{latest_analysis, to_record, AnalysisFields, TransformFailure};

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use portale::PortaleSource;
use tracing::{debug, info, warn};

use crate::error::{Scope, UnitError};
use crate::harvest::AreaFeature;
use crate::model::AreaRecord;

/// Résultat de l'enrichissement
#[derive(Debug, Default)]
pub struct EnrichOutcome {
    /// Enregistrements transformés, dans l'ordre des features
    pub records: Vec<AreaRecord>,
    /// Zones sans bean dans la réponse
    pub skipped: Vec<i64>,
    /// Erreurs réseau et de transformation
    pub failures: Vec<UnitError>,
    /// Sigla inconnues : (code de zone, sigla)
    pub unknown_provinces: Vec<(i64, String)>,
}

enum AreaResult {
    Record(AreaRecord),
    Skipped,
    Failed(UnitError),
    UnknownProvince(String),
}

/// Enrichit toutes les zones avec au plus `workers` requêtes simultanées
pub async fn enrich_areas<S>(
    source: &S,
    features: &[AreaFeature],
    lookup: &RegionLookup,
    workers: usize,
) -> EnrichOutcome
where
    S: PortaleSource + ?Sized,
{
    let total = features.len();
    let mut done = 0usize;

    let mut results: Vec<(usize, i64, AreaResult)> = stream::iter(features.iter().enumerate())
        .map(|(idx, feature)| async move {
            (idx, feature.code, enrich_one(source, feature, lookup).await)
        })
        .buffer_unordered(workers.max(1))
        .inspect(|_| {
            done += 1;
            if done % 100 == 0 || done == total {
                info!(done, total, "Enrichment progress");
            }
        })
        .collect()
        .await;
    // L'ordre d'achèvement dépend du réseau : on revient à l'ordre d'entrée
    results.sort_unstable_by_key(|(idx, _, _)| *idx);

    let mut outcome = EnrichOutcome::default();
    for (_, code, result) in results {
        match result {
            AreaResult::Record(record) => outcome.records.push(record),
            AreaResult::Skipped => outcome.skipped.push(code),
            AreaResult::Failed(e) => outcome.failures.push(e),
            AreaResult::UnknownProvince(sigla) => outcome.unknown_provinces.push((code, sigla)),
        }
    }

    info!(
        enriched = outcome.records.len(),
        skipped = outcome.skipped.len(),
        failed = outcome.failures.len(),
        "Enrichment complete"
    );

    outcome
}

async fn enrich_one<S>(source: &S, feature: &AreaFeature, lookup: &RegionLookup) -> AreaResult
where
    S: PortaleSource + ?Sized,
{
    let code = feature.code;
    let detail = match source.area_detail(code).await {
        Ok(detail) => detail,
        Err(e) if e.is_decode() => {
            warn!(area = code, error = %e, "Unreadable area detail");
            return AreaResult::Failed(UnitError::transform(code, e.to_string()));
        }
        Err(e) => {
            warn!(area = code, error = %e, "Area detail request failed");
            return AreaResult::Failed(UnitError::Network {
                scope: Scope::Area(code),
                source: e,
            });
        }
    };

    match to_record(feature, &detail, lookup) {
        Ok(Some(record)) => {
            debug!(
                area = record.code,
                nome = record.name.as_str(),
                comune = record.municipality.as_str(),
                provincia = record.province.as_str(),
                regione = record.region,
                "Area enriched"
            );
            AreaResult::Record(record)
        }
        Ok(None) => {
            debug!(area = code, "No area payload, skipped");
            AreaResult::Skipped
        }
        Err(TransformFailure::UnknownProvince(sigla)) => AreaResult::UnknownProvince(sigla),
        Err(failure) => {
            warn!(area = code, reason = %failure, "Area transform failed");
            AreaResult::Failed(UnitError::transform(code, failure.to_string()))
        }
    }
}

/// Un enregistrement par code, le premier dans l'ordre des features gagne
///
/// Retourne les enregistrements conservés et les codes des doublons écartés.
pub fn unique_by_code(records: Vec<AreaRecord>) -> (Vec<AreaRecord>, Vec<i64>) {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    let mut duplicates = Vec::new();

    for record in records {
        if seen.insert(record.code) {
            unique.push(record);
        } else {
            duplicates.push(record.code);
        }
    }

    if !duplicates.is_empty() {
        warn!(
            duplicates = duplicates.len(),
            "Several areas resolved to the same code, keeping the first"
        );
    }
    (unique, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample_record;

    #[test]
    fn test_unique_by_code_keeps_first() {
        let mut second = sample_record(7);
        second.geometry = "[2.0,2.0]".into();
        let mut first = sample_record(7);
        first.geometry = "[1.0,1.0]".into();

        let (unique, duplicates) =
            unique_by_code(vec![first.clone(), sample_record(3), second, sample_record(3)]);

        assert_eq!(unique, vec![first, sample_record(3)]);
        assert_eq!(duplicates, vec![7, 3]);
    }

    #[test]
    fn test_unique_by_code_without_duplicates() {
        let records = vec![sample_record(1), sample_record(2)];
        let (unique, duplicates) = unique_by_code(records.clone());
        assert_eq!(unique, records);
        assert!(duplicates.is_empty());
    }
}
