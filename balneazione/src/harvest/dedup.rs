//! Déduplication des features par code de zone
//!
//! Une zone peut apparaître dans plusieurs couches régionales. La première
//! occurrence dans l'ordre de récolte est conservée.

use std::collections::HashMap;

use geojson::{Feature, FeatureCollection, JsonObject};
use portale::{RawFeature, CODE_PROPERTY};

/// Une feature par code, la plus ancienne dans l'ordre d'entrée gagne
///
/// La table est remplie en parcourant l'entrée à l'envers et en écrasant à
/// chaque collision : la dernière écriture est donc la première occurrence.
/// La sortie suit l'ordre des premières occurrences.
pub fn deduplicate(features: Vec<RawFeature>) -> Vec<RawFeature> {
    let mut by_code: HashMap<i64, (usize, RawFeature)> = HashMap::with_capacity(features.len());

    for (idx, feature) in features.into_iter().enumerate().rev() {
        by_code.insert(feature.code, (idx, feature));
    }

    let mut unique: Vec<(usize, RawFeature)> = by_code.into_values().collect();
    unique.sort_unstable_by_key(|(idx, _)| *idx);
    unique.into_iter().map(|(_, f)| f).collect()
}

/// Construit la FeatureCollection transmise au simplificateur
///
/// Seuls le code et la géométrie sont conservés (ni `id`, ni `bbox`, ni
/// membres étrangers).
pub fn to_feature_collection(features: &[RawFeature]) -> FeatureCollection {
    let features = features
        .iter()
        .map(|f| {
            let mut properties = JsonObject::new();
            properties.insert(CODE_PROPERTY.to_string(), f.code.into());
            Feature {
                bbox: None,
                geometry: Some(f.geometry.clone()),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
