//! Désérialisation des réponses réelles du portail

use geojson::{FeatureCollection, Value as GeoValue};
use portale::{AreaDetail, RawFeature};

const DATI_AREA: &str = include_str!("fixtures/dati_area.json");
const LAYER_AB: &str = include_str!("fixtures/layer_ab.json");

#[test]
fn test_area_detail_fixture() {
    let detail: AreaDetail = serde_json::from_str(DATI_AREA).unwrap();

    let area = detail.area.as_ref().unwrap();
    assert_eq!(area.codice, Some(90490010));
    assert_eq!(area.sigla_provincia.as_deref(), Some("PI"));
    assert_eq!(area.limite_ec, Some(500));
    assert_eq!(area.is_fuori_norma, Some(serde_json::Value::Bool(false)));

    assert_eq!(detail.current_analyses.len(), 2);
    assert_eq!(
        detail.current_analyses[0].data_analisi,
        Some(serde_json::json!("2024-07-15"))
    );
    assert!(detail.historical_analyses.is_empty());
    assert_eq!(detail.profiles[0].code(), Some(4411));
    assert!(detail.interdictions.is_empty());
}

#[test]
fn test_area_detail_without_bean() {
    let detail: AreaDetail =
        serde_json::from_str(r#"{"areaBalneazioneBean": null, "analisi": null}"#).unwrap();
    assert!(detail.area.is_none());
    assert!(detail.current_analyses.is_empty());
    assert!(detail.profiles.is_empty());
}

#[test]
fn test_layer_features() {
    let collection: FeatureCollection = serde_json::from_str(LAYER_AB).unwrap();
    let features: Vec<RawFeature> = collection
        .features
        .into_iter()
        .filter_map(|f| RawFeature::from_geojson(f, "009"))
        .collect();

    assert_eq!(features.len(), 2);
    assert_eq!(features[0].code, 90490010);
    assert!(matches!(features[0].geometry.value, GeoValue::Polygon(_)));
    assert_eq!(features[1].code, 90490011);
    assert_eq!(features[1].region, "009");
}
