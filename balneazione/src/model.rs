//! Enregistrement persistant d'une zone de baignade
//!
//! Les noms sérialisés reprennent les colonnes de la table `areas`, de sorte
//! que l'export JSON et la base partagent le même vocabulaire.

use serde::{Deserialize, Serialize};

/// Une zone de baignade enrichie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaRecord {
    #[serde(rename = "CODICE")]
    pub code: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "comune")]
    pub municipality: String,
    #[serde(rename = "provincia")]
    pub province: String,
    #[serde(rename = "siglaProvincia")]
    pub province_abbr: String,
    #[serde(rename = "regione")]
    pub region: i64,
    #[serde(rename = "stato")]
    pub status: i64,
    #[serde(rename = "limiteEi")]
    pub limit_ei: i64,
    #[serde(rename = "limiteEc")]
    pub limit_ec: i64,
    /// `YYYY-MM-DD` ou chaîne vide
    #[serde(rename = "dataInizioStagioneBalneare")]
    pub season_start: String,
    #[serde(rename = "dataFineStagioneBalneare")]
    pub season_end: String,
    #[serde(rename = "statoDesc")]
    pub status_desc: String,
    /// Coordonnées sérialisées en JSON
    pub geometry: String,
    #[serde(rename = "isFuoriNorma")]
    pub out_of_norm: Option<String>,
    #[serde(rename = "ultimaAnalisi")]
    pub last_analysis: Option<String>,
    #[serde(rename = "valoreEi")]
    pub value_ei: Option<String>,
    #[serde(rename = "valoreEc")]
    pub value_ec: Option<String>,
    #[serde(rename = "flagOltreLimiti")]
    pub over_limit: Option<String>,
    #[serde(rename = "scheda")]
    pub profile: Option<i64>,
    #[serde(rename = "interdizioni")]
    pub interdiction: Option<String>,
}

/// Enregistrement complet pour les tests
#[cfg(test)]
pub(crate) fn sample_record(code: i64) -> AreaRecord {
    AreaRecord {
        code,
        name: format!("Zona {}", code),
        municipality: "Livorno".into(),
        province: "Livorno".into(),
        province_abbr: "LI".into(),
        region: 9,
        status: 1,
        limit_ei: 200,
        limit_ec: 500,
        season_start: "2024-05-01".into(),
        season_end: "2024-09-30".into(),
        status_desc: "Balneabile".into(),
        geometry: "[10.0,43.0]".into(),
        out_of_norm: None,
        last_analysis: Some("2024-07-01".into()),
        value_ei: Some("10".into()),
        value_ec: Some("20".into()),
        over_limit: Some("0".into()),
        profile: None,
        interdiction: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_names() {
        let value = serde_json::to_value(sample_record(7)).unwrap();
        assert_eq!(value["CODICE"], 7);
        assert_eq!(value["siglaProvincia"], "LI");
        assert_eq!(value["dataFineStagioneBalneare"], "2024-09-30");
        assert!(value["interdizioni"].is_null());
        assert_eq!(value.as_object().map(|o| o.len()), Some(20));
    }
}
