//! Correspondance sigla de province → code région
//!
//! Quatre anciennes provinces sardes et Naples ne figurent pas (ou plus)
//! correctement dans le référentiel des communes : elles sont fixées en dur.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::FatalError;

/// Ligne du référentiel des communes (colonnes utiles seulement)
#[derive(Debug, Deserialize)]
struct ComuneRow {
    sigla: String,
    cod_reg: i64,
}

/// Anciennes provinces sardes (Carbonia-Iglesias, Olbia-Tempio, Medio Campidano, Ogliastra)
pub const SARDINIA_LEGACY: [&str; 4] = ["CI", "OT", "VS", "OG"];

/// Code région de la Sardaigne
pub const SARDINIA_REGION: i64 = 20;

/// Code région de la Campanie (province de Naples)
pub const CAMPANIA_REGION: i64 = 15;

/// Table chargée une fois par exécution
#[derive(Debug, Clone, Default)]
pub struct RegionLookup {
    by_sigla: HashMap<String, i64>,
}

impl RegionLookup {
    /// Construit la table depuis un CSV avec les colonnes `sigla` et `cod_reg`
    ///
    /// Pour une sigla répétée (une ligne par commune), la première ligne gagne.
    pub fn from_csv(content: &str) -> Result<Self, FatalError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| FatalError::Lookup(format!("unreadable header: {}", e)))?;
        for column in ["sigla", "cod_reg"] {
            if !headers.iter().any(|h| h == column) {
                return Err(FatalError::Lookup(format!("missing column '{}'", column)));
            }
        }

        let mut by_sigla = HashMap::new();
        let mut invalid = 0usize;
        for row in reader.deserialize::<ComuneRow>() {
            match row {
                Ok(row) => {
                    by_sigla.entry(row.sigla).or_insert(row.cod_reg);
                }
                Err(_) => invalid += 1,
            }
        }

        if by_sigla.is_empty() {
            return Err(FatalError::Lookup("no usable row".into()));
        }
        if invalid > 0 {
            debug!(invalid, "Lookup rows ignored");
        }

        Ok(Self { by_sigla })
    }

    /// Charge la table depuis un fichier local ou une URL http(s)
    pub async fn load(source: &str, client: &reqwest::Client) -> Result<Self, FatalError> {
        let content = if source.starts_with("http://") || source.starts_with("https://") {
            let response = client
                .get(source)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| FatalError::Lookup(format!("{}: {}", source, e)))?;
            response
                .text()
                .await
                .map_err(|e| FatalError::Lookup(format!("{}: {}", source, e)))?
        } else {
            std::fs::read_to_string(Path::new(source)).map_err(|e| FatalError::io(source, e))?
        };

        let lookup = Self::from_csv(&content)?;
        info!(source = source, provinces = lookup.len(), "Region lookup loaded");
        Ok(lookup)
    }

    /// Code région d'une sigla de province
    ///
    /// Fonction pure : mêmes entrées, même table → même résultat.
    pub fn region_for(&self, sigla: &str) -> Option<i64> {
        if SARDINIA_LEGACY.contains(&sigla) {
            return Some(SARDINIA_REGION);
        }
        if sigla == "NA" {
            return Some(CAMPANIA_REGION);
        }
        self.by_sigla.get(sigla).copied()
    }

    pub fn len(&self) -> usize {
        self.by_sigla.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sigla.is_empty()
    }
}

impl FromIterator<(String, i64)> for RegionLookup {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        let mut by_sigla = HashMap::new();
        for (sigla, region) in iter {
            by_sigla.entry(sigla).or_insert(region);
        }
        Self { by_sigla }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
pro_com_t,comune,den_prov,sigla,cod_reg,den_reg
048017,Firenze,Firenze,FI,9,Toscana
\"049009\",\"Livorno, città\",Livorno,LI,9,Toscana
048001,Bagno a Ripoli,Firenze,FI,99,Toscana
063049,Napoli,Napoli,NA,15,Campania
092009,Cagliari,Cagliari,CA,20,Sardegna
";

    #[test]
    fn test_special_cases() {
        let lookup = RegionLookup::from_csv(CSV).unwrap();
        for sigla in SARDINIA_LEGACY {
            assert_eq!(lookup.region_for(sigla), Some(20));
        }
        assert_eq!(lookup.region_for("NA"), Some(15));
        // Les cas spéciaux ne dépendent pas de la table
        assert_eq!(RegionLookup::default().region_for("OT"), Some(20));
        assert_eq!(RegionLookup::default().region_for("NA"), Some(15));
    }

    #[test]
    fn test_first_row_wins_and_quotes() {
        let lookup = RegionLookup::from_csv(CSV).unwrap();
        assert_eq!(lookup.region_for("FI"), Some(9));
        assert_eq!(lookup.region_for("LI"), Some(9));
        assert_eq!(lookup.region_for("CA"), Some(20));
        assert_eq!(lookup.region_for("ZZ"), None);
    }

    #[test]
    fn test_deterministic() {
        let lookup = RegionLookup::from_csv(CSV).unwrap();
        let first: Vec<_> = ["FI", "LI", "CA", "ZZ", "VS"]
            .iter()
            .map(|s| lookup.region_for(s))
            .collect();
        for _ in 0..10 {
            let again: Vec<_> = ["FI", "LI", "CA", "ZZ", "VS"]
                .iter()
                .map(|s| lookup.region_for(s))
                .collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_missing_column() {
        let err = RegionLookup::from_csv("sigla,regione\nFI,9\n").unwrap_err();
        assert!(err.to_string().contains("cod_reg"));
    }

    #[test]
    fn test_quoted_field_spanning_lines() {
        let csv = "sigla,comune,cod_reg\nGE,\"Genova\nCentro\",7\nSP,\"La \"\"Spezia\"\"\",7\n";
        let lookup = RegionLookup::from_csv(csv).unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.region_for("GE"), Some(7));
        assert_eq!(lookup.region_for("SP"), Some(7));
    }

    #[test]
    fn test_invalid_rows_skipped() {
        let lookup = RegionLookup::from_csv("sigla,cod_reg\nFI,nove\nLI,9\n").unwrap();
        assert_eq!(lookup.region_for("FI"), None);
        assert_eq!(lookup.region_for("LI"), Some(9));
    }
}
