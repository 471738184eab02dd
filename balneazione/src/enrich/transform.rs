//! Transformation d'un détail de zone en enregistrement
//!
//! Chaque champ a une étape d'extraction nommée : l'analyse la plus récente
//! vient de la liste courante, sinon de l'historique, sinon tout est `None`.

use geojson::{Geometry, Value as GeoValue};
use portale::{Analysis, AreaBean, AreaDetail};
use serde_json::Value;

use super::lookup::RegionLookup;
use crate::harvest::AreaFeature;
use crate::model::AreaRecord;

/// Raison d'un échec de transformation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformFailure {
    /// Champ requis absent du bean
    MissingField(&'static str),
    /// Sigla inconnue de la table de correspondance (fatal)
    UnknownProvince(String),
    /// Géométrie non sérialisable
    Geometry(String),
}

impl std::fmt::Display for TransformFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing field `{}`", field),
            Self::UnknownProvince(sigla) => write!(f, "unknown province '{}'", sigla),
            Self::Geometry(reason) => write!(f, "invalid geometry: {}", reason),
        }
    }
}

/// Champs d'analyse retenus pour une zone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisFields {
    pub date: Option<String>,
    pub value_ei: Option<String>,
    pub value_ec: Option<String>,
    pub over_limit: Option<String>,
}

/// Construit l'enregistrement d'une zone
///
/// `Ok(None)` si la réponse ne contient pas de bean de zone : la zone est
/// ignorée sans erreur.
pub fn to_record(
    feature: &AreaFeature,
    detail: &AreaDetail,
    lookup: &RegionLookup,
) -> Result<Option<AreaRecord>, TransformFailure> {
    let Some(area) = detail.area.as_ref() else {
        return Ok(None);
    };

    let province_abbr = required(&area.sigla_provincia, "siglaProvincia")?;
    let region = lookup
        .region_for(&province_abbr)
        .ok_or_else(|| TransformFailure::UnknownProvince(province_abbr.clone()))?;
    let analysis = latest_analysis(detail);
    let geometry =
        coordinates_text(&feature.geometry).map_err(|e| TransformFailure::Geometry(e.to_string()))?;

    Ok(Some(AreaRecord {
        code: required(&area.codice, "codice")?,
        name: required(&area.nome, "nome")?,
        municipality: required(&area.comune, "comune")?,
        province: required(&area.provincia, "provincia")?,
        province_abbr,
        region,
        status: required(&area.stato, "stato")?,
        limit_ei: required(&area.limite_ei, "limiteEi")?,
        limit_ec: required(&area.limite_ec, "limiteEc")?,
        season_start: area.data_inizio_stagione_balneare.clone().unwrap_or_default(),
        season_end: area.data_fine_stagione_balneare.clone().unwrap_or_default(),
        status_desc: required(&area.stato_desc, "statoDesc")?,
        geometry,
        out_of_norm: out_of_norm(area),
        last_analysis: analysis.date,
        value_ei: analysis.value_ei,
        value_ec: analysis.value_ec,
        over_limit: analysis.over_limit,
        profile: detail.profiles.first().and_then(|p| p.code()),
        interdiction: interdiction_text(detail),
    }))
}

/// Analyse courante en priorité, sinon historique, sinon rien
pub fn latest_analysis(detail: &AreaDetail) -> AnalysisFields {
    let source: Option<&Analysis> = detail
        .current_analyses
        .first()
        .or_else(|| detail.historical_analyses.first());

    match source {
        Some(a) => AnalysisFields {
            date: value_text(a.data_analisi.as_ref()),
            value_ei: value_text(a.valore_enterococchi.as_ref()),
            value_ec: value_text(a.valore_escherichia_coli.as_ref()),
            over_limit: value_text(a.flag_oltre_limiti.as_ref()),
        },
        None => AnalysisFields::default(),
    }
}

/// Première interdiction non vide, sérialisée en JSON
pub fn interdiction_text(detail: &AreaDetail) -> Option<String> {
    detail
        .interdictions
        .first()
        .filter(|v| !is_empty_value(v))
        .map(Value::to_string)
}

/// Coordonnées seules de la géométrie, en JSON
pub fn coordinates_text(geometry: &Geometry) -> serde_json::Result<String> {
    match &geometry.value {
        GeoValue::Point(c) => serde_json::to_string(c),
        GeoValue::MultiPoint(c) => serde_json::to_string(c),
        GeoValue::LineString(c) => serde_json::to_string(c),
        GeoValue::MultiLineString(c) => serde_json::to_string(c),
        GeoValue::Polygon(c) => serde_json::to_string(c),
        GeoValue::MultiPolygon(c) => serde_json::to_string(c),
        GeoValue::GeometryCollection(geometries) => serde_json::to_string(geometries),
    }
}

fn out_of_norm(area: &AreaBean) -> Option<String> {
    value_text(area.is_fuori_norma.as_ref())
}

/// Représentation texte d'une valeur JSON (chaînes telles quelles)
fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(o) => o.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn required<T: Clone>(field: &Option<T>, name: &'static str) -> Result<T, TransformFailure> {
    field.clone().ok_or(TransformFailure::MissingField(name))
}
