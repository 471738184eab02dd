//! Simplification des géométries par un outil externe
//!
//! L'outil est une boîte noire fichier → fichier. Son résultat sert de cache
//! persistant : tant que le fichier existe, la récolte n'est pas relancée.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::process::Command;

use geojson::FeatureCollection;
use tracing::{info, warn};

use super::AreaFeature;
use crate::error::FatalError;

/// Transformation fichier → fichier d'une FeatureCollection
pub trait GeometrySimplifier: Send + Sync {
    fn simplify(&self, input: &Path, output: &Path) -> Result<(), FatalError>;
}

/// Simplification via la CLI `mapshaper`
///
/// `mapshaper -i <in> -snap -simplify weighted <pct>% keep-shapes -o <out>`
#[derive(Debug, Clone)]
pub struct Mapshaper {
    pub program: String,
    pub percentage: u8,
}

impl Default for Mapshaper {
    fn default() -> Self {
        Self {
            program: "mapshaper".into(),
            percentage: 12,
        }
    }
}

impl Mapshaper {
    /// Arguments passés à l'outil
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".into(),
            input.display().to_string(),
            "-snap".into(),
            "-simplify".into(),
            "weighted".into(),
            format!("{}%", self.percentage),
            "keep-shapes".into(),
            "-o".into(),
            output.display().to_string(),
        ]
    }
}

impl GeometrySimplifier for Mapshaper {
    fn simplify(&self, input: &Path, output: &Path) -> Result<(), FatalError> {
        info!(
            program = self.program.as_str(),
            percentage = self.percentage,
            "Simplifying geometries"
        );

        let result = Command::new(&self.program)
            .args(self.args(input, output))
            .output()
            .map_err(|e| FatalError::Simplifier(format!("cannot run {}: {}", self.program, e)))?;

        if !result.status.success() {
            return Err(FatalError::Simplifier(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !output.exists() {
            return Err(FatalError::Simplifier(format!(
                "{} did not produce {}",
                self.program,
                output.display()
            )));
        }

        Ok(())
    }
}

/// Écrit une FeatureCollection en JSON
pub fn write_collection(path: &Path, collection: &FeatureCollection) -> Result<(), FatalError> {
    let file = File::create(path).map_err(|e| FatalError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, collection).map_err(|source| FatalError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|e| FatalError::io(path, e))?;
    Ok(())
}

/// Contenu du cache simplifié
#[derive(Debug, Default)]
pub struct SimplifiedLoad {
    pub features: Vec<AreaFeature>,
    /// Features sans code exploitable
    pub missing_code: usize,
    /// Codes dont la géométrie a disparu à la simplification
    pub missing_geometry: Vec<i64>,
}

/// Charge le cache des géométries simplifiées
pub fn load_simplified(path: &Path) -> Result<SimplifiedLoad, FatalError> {
    let file = File::open(path).map_err(|e| FatalError::io(path, e))?;
    let collection: FeatureCollection = serde_json::from_reader(BufReader::new(file))
        .map_err(|source| FatalError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut load = SimplifiedLoad::default();
    for feature in collection.features {
        let Some(code) = portale::area_code(&feature) else {
            load.missing_code += 1;
            continue;
        };
        match feature.geometry {
            Some(geometry) => load.features.push(AreaFeature { code, geometry }),
            None => load.missing_geometry.push(code),
        }
    }

    if load.missing_code > 0 {
        warn!(count = load.missing_code, "Simplified features without area code");
    }
    info!(
        path = %path.display(),
        features = load.features.len(),
        "Simplified features loaded"
    );

    Ok(load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mapshaper_args() {
        let tool = Mapshaper::default();
        let args = tool.args(&PathBuf::from("in.json"), &PathBuf::from("out.json"));
        assert_eq!(
            args.join(" "),
            "-i in.json -snap -simplify weighted 12% keep-shapes -o out.json"
        );
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Mapshaper {
            program: "definitely-not-a-real-mapshaper".into(),
            percentage: 12,
        };
        let err = tool
            .simplify(&dir.path().join("in.json"), &dir.path().join("out.json"))
            .unwrap_err();
        assert!(matches!(err, FatalError::Simplifier(_)));
    }

    #[test]
    fn test_load_simplified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minified.json");
        std::fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"CODICE":1},"geometry":{"type":"Point","coordinates":[1.0,2.0]}},
                {"type":"Feature","properties":{"CODICE":2},"geometry":null},
                {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[0.0,0.0]}}
            ]}"#,
        )
        .unwrap();

        let load = load_simplified(&path).unwrap();
        assert_eq!(load.features.len(), 1);
        assert_eq!(load.features[0].code, 1);
        assert_eq!(load.missing_geometry, vec![2]);
        assert_eq!(load.missing_code, 1);
    }
}
