//! Configuration d'une exécution
//!
//! Ordre de priorité : valeurs par défaut → fichier JSON optionnel →
//! variables d'environnement (`.env` compris) → arguments CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// URL du référentiel des communes (colonnes `sigla` et `cod_reg`)
pub const DEFAULT_COMUNI_URL: &str =
    "https://raw.githubusercontent.com/opendatasicilia/comuni-italiani/main/dati/comuni.csv";

/// Nom de la base de travail dans le répertoire de données
pub const WORKING_DB: &str = "latest.db";

/// Cache des géométries simplifiées
pub const SIMPLIFIED_CACHE: &str = "minified.json";

/// Journal des différences entre snapshots
pub const CHANGELOG: &str = "updates.json";

/// Une région administrative interrogée lors de la récolte
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Region {
    pub name: String,
    /// Code ISTAT utilisé par la couche AB
    pub istat: String,
}

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// URL de base du portail
    pub base_url: String,

    /// Chemin local ou URL du CSV province → région
    pub lookup_source: String,

    /// Répertoire de travail (base courante, cache, exports JSON)
    pub data_dir: PathBuf,

    /// Répertoire des bases archivées (défaut : `data_dir`)
    pub archive_dir: Option<PathBuf>,

    /// Régions à récolter, dans l'ordre
    pub regions: Vec<Region>,

    /// Largeur du pool de récolte régionale
    pub harvest_workers: usize,

    /// Largeur du pool d'enrichissement
    pub enrich_workers: usize,

    /// Timeout par requête HTTP, en secondes
    pub request_timeout_secs: u64,

    /// Exécutable de simplification
    pub mapshaper_bin: String,

    /// Pourcentage de simplification pondérée
    pub simplify_percentage: u8,

    /// Certificat racine PEM supplémentaire pour le portail
    pub ca_cert: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: portale::DEFAULT_BASE_URL.into(),
            lookup_source: DEFAULT_COMUNI_URL.into(),
            data_dir: PathBuf::from("./data"),
            archive_dir: None,
            regions: default_regions(),
            harvest_workers: 10,
            enrich_workers: 15,
            request_timeout_secs: 30,
            mapshaper_bin: "mapshaper".into(),
            simplify_percentage: 12,
            ca_cert: None,
        }
    }
}

/// Régions embarquées (les 18 régions côtières ou lacustres)
pub fn default_regions() -> Vec<Region> {
    // Le preset est compilé dans le binaire et vérifié par les tests
    serde_json::from_str(include_str!("presets/regions.json")).unwrap_or_default()
}

impl RunConfig {
    /// Charge une configuration depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Applique les variables d'environnement
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("PORTALE_URL") {
            self.base_url = url;
        }
        if let Ok(source) = std::env::var("COMUNI_URL") {
            self.lookup_source = source;
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("ARCHIVE_DIR") {
            self.archive_dir = Some(PathBuf::from(dir));
        }
        if let Some(n) = env_parse("MAX_WORKERS") {
            self.enrich_workers = n;
        }
        if let Some(n) = env_parse("HARVEST_WORKERS") {
            self.harvest_workers = n;
        }
        if let Some(secs) = env_parse("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = secs;
        }
        if let Ok(bin) = std::env::var("MAPSHAPER_BIN") {
            self.mapshaper_bin = bin;
        }
        if let Some(pct) = env_parse("SIMPLIFY_PERCENTAGE") {
            self.simplify_percentage = pct;
        }
        if let Ok(cert) = std::env::var("PORTALE_CA_CERT") {
            self.ca_cert = Some(PathBuf::from(cert));
        }
        self
    }

    /// Charge la configuration : fichier optionnel puis environnement
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        Ok(base.with_env())
    }

    pub fn working_db_path(&self) -> PathBuf {
        self.data_dir.join(WORKING_DB)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(SIMPLIFIED_CACHE)
    }

    pub fn json_dir(&self) -> PathBuf {
        self.data_dir.join("json")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.clone())
    }

    pub fn changelog_path(&self) -> PathBuf {
        self.data_dir.join(CHANGELOG)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_regions_preset() {
        let regions = default_regions();
        assert_eq!(regions.len(), 18);
        assert_eq!(regions[0].istat, "001272");
        assert_eq!(regions[17].name, "Sardegna");
    }

    #[test]
    fn test_paths() {
        let config = RunConfig {
            data_dir: PathBuf::from("/tmp/bal"),
            ..Default::default()
        };
        assert_eq!(config.working_db_path(), PathBuf::from("/tmp/bal/latest.db"));
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/bal/minified.json"));
        assert_eq!(config.json_dir(), PathBuf::from("/tmp/bal/json"));
        assert_eq!(config.archive_dir(), PathBuf::from("/tmp/bal"));
        assert_eq!(config.changelog_path(), PathBuf::from("/tmp/bal/updates.json"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"enrich_workers": 4, "regions": []}"#).unwrap();
        assert_eq!(config.enrich_workers, 4);
        assert_eq!(config.harvest_workers, 10);
        assert!(config.regions.is_empty());
        assert_eq!(config.simplify_percentage, 12);
    }
}
