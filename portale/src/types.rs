//! Types de données renvoyés par le portail

use geojson::{Feature, Geometry};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::CODE_PROPERTY;

/// Feature brute d'une zone de baignade, issue de la couche régionale
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Code unique de la zone
    pub code: i64,

    /// Géométrie (Polygon, MultiPolygon ou Point)
    pub geometry: Geometry,

    /// Code ISTAT de la région interrogée
    pub region: String,
}

impl RawFeature {
    /// Construit une feature brute depuis une feature GeoJSON
    ///
    /// Retourne `None` si le code de zone ou la géométrie manque.
    pub fn from_geojson(feature: Feature, region: &str) -> Option<Self> {
        let code = area_code(&feature)?;
        let geometry = feature.geometry?;
        Some(Self {
            code,
            geometry,
            region: region.to_string(),
        })
    }
}

/// Extrait le code de zone (`CODICE`) d'une feature GeoJSON
///
/// Le portail publie le code en entier, mais une chaîne numérique est tolérée.
pub fn area_code(feature: &Feature) -> Option<i64> {
    match feature.property(CODE_PROPERTY)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Réponse de `datiArea.do`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AreaDetail {
    /// Métadonnées de la zone (absentes si la zone n'est plus publiée)
    #[serde(rename = "areaBalneazioneBean", default)]
    pub area: Option<AreaBean>,

    /// Analyses de la saison courante, la plus récente en tête
    #[serde(rename = "analisi", default, deserialize_with = "null_as_empty")]
    pub current_analyses: Vec<Analysis>,

    /// Analyses des saisons précédentes
    #[serde(rename = "analisiStorico", default, deserialize_with = "null_as_empty")]
    pub historical_analyses: Vec<Analysis>,

    /// Fiche profil de la zone (zéro ou une)
    #[serde(rename = "dettaglioProfiliBean", default, deserialize_with = "null_as_empty")]
    pub profiles: Vec<ProfileSheet>,

    /// Interdictions de baignade en cours (zéro ou une)
    #[serde(rename = "interdizioni", default, deserialize_with = "null_as_empty")]
    pub interdictions: Vec<Value>,
}

/// Métadonnées d'une zone de baignade
///
/// Tous les champs sont optionnels côté désérialisation : c'est la
/// transformation en enregistrement qui décide de ce qui est requis.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaBean {
    pub codice: Option<i64>,
    pub nome: Option<String>,
    pub comune: Option<String>,
    pub provincia: Option<String>,
    pub sigla_provincia: Option<String>,
    pub stato: Option<i64>,
    pub stato_desc: Option<String>,
    pub limite_ei: Option<i64>,
    pub limite_ec: Option<i64>,
    pub data_inizio_stagione_balneare: Option<String>,
    pub data_fine_stagione_balneare: Option<String>,
    pub is_fuori_norma: Option<Value>,
}

/// Une analyse (enterocoques, E. coli)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub data_analisi: Option<Value>,
    pub valore_enterococchi: Option<Value>,
    pub valore_escherichia_coli: Option<Value>,
    pub flag_oltre_limiti: Option<Value>,
}

/// Référence vers la fiche profil d'une zone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileSheet {
    #[serde(default)]
    pub codice: Option<Value>,
}

impl ProfileSheet {
    /// Code numérique de la fiche
    pub fn code(&self) -> Option<i64> {
        match self.codice.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// `null` et absence sont traités comme une liste vide
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(properties: Value) -> Feature {
        serde_json::from_value(json!({
            "type": "Feature",
            "id": "AB.1",
            "properties": properties,
            "geometry": {"type": "Point", "coordinates": [12.5, 41.9]}
        }))
        .unwrap()
    }

    #[test]
    fn test_area_code_number_and_string() {
        assert_eq!(area_code(&feature(json!({"CODICE": 1234}))), Some(1234));
        assert_eq!(area_code(&feature(json!({"CODICE": " 77 "}))), Some(77));
        assert_eq!(area_code(&feature(json!({"CODICE": null}))), None);
        assert_eq!(area_code(&feature(json!({"NOME": "x"}))), None);
    }

    #[test]
    fn test_raw_feature_from_geojson() {
        let raw = RawFeature::from_geojson(feature(json!({"CODICE": 5})), "048017").unwrap();
        assert_eq!(raw.code, 5);
        assert_eq!(raw.region, "048017");
        assert!(matches!(raw.geometry.value, geojson::Value::Point(_)));
    }

    #[test]
    fn test_detail_null_lists() {
        let detail: AreaDetail = serde_json::from_value(json!({
            "areaBalneazioneBean": {"codice": 1, "nome": "Lido"},
            "analisi": null,
            "dettaglioProfiliBean": null,
            "interdizioni": null
        }))
        .unwrap();

        assert!(detail.current_analyses.is_empty());
        assert!(detail.historical_analyses.is_empty());
        assert!(detail.profiles.is_empty());
        assert!(detail.interdictions.is_empty());
        assert_eq!(detail.area.unwrap().nome.as_deref(), Some("Lido"));
    }

    #[test]
    fn test_detail_without_area() {
        let detail: AreaDetail = serde_json::from_value(json!({"analisi": []})).unwrap();
        assert!(detail.area.is_none());
    }

    #[test]
    fn test_profile_code() {
        let sheet = ProfileSheet {
            codice: Some(json!("901")),
        };
        assert_eq!(sheet.code(), Some(901));
        assert_eq!(ProfileSheet::default().code(), None);
    }
}
