//! Orchestration d'une mise à jour complète
//!
//! Récolte → déduplication → simplification (sautée si le cache existe) →
//! enrichissement → transaction unique → archivage.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use portale::PortaleSource;
use tracing::{error, info, warn};

use crate::archive::{self, archive_snapshot, ensure_vacant, ArchivedSnapshot};
use crate::config::{RunConfig, SIMPLIFIED_CACHE};
use crate::enrich::{enrich_areas, unique_by_code, RegionLookup};
use crate::error::{FatalError, RunFailure, UnitError};
use crate::harvest::simplify::write_collection;
use crate::harvest::{
    deduplicate, harvest_regions, load_simplified, to_feature_collection, AreaFeature,
    GeometrySimplifier,
};
use crate::model::AreaRecord;
use crate::report::RunReport;
use crate::store::{SnapshotStore, StoreError, UpsertOutcome};

/// Exécute une mise à jour horodatée à l'instant présent
pub async fn run_update<S>(
    config: &RunConfig,
    source: &S,
    simplifier: Arc<dyn GeometrySimplifier>,
    lookup: &RegionLookup,
) -> Result<RunReport, RunFailure>
where
    S: PortaleSource + ?Sized,
{
    let name = archive::snapshot_name(&Local::now());
    run_update_named(config, source, simplifier, lookup, &name).await
}

/// Exécute une mise à jour sous un nom de snapshot donné
///
/// En cas d'erreur fatale, aucune base de travail ne subsiste et le rapport
/// des erreurs accumulées accompagne l'erreur.
pub async fn run_update_named<S>(
    config: &RunConfig,
    source: &S,
    simplifier: Arc<dyn GeometrySimplifier>,
    lookup: &RegionLookup,
    name: &str,
) -> Result<RunReport, RunFailure>
where
    S: PortaleSource + ?Sized,
{
    let start = Instant::now();
    let mut report = RunReport::new();

    let result = execute(config, source, simplifier, lookup, name, &mut report).await;
    report.set_duration(start.elapsed());

    match result {
        Ok(()) => {
            report.finalize();
            info!(summary = report.summary().as_str(), "Update complete");
            Ok(report)
        }
        Err(e) => {
            error!(error = %e, "Update aborted");
            report.record_fatal(&e);
            report.finalize();
            Err(RunFailure { error: e, report })
        }
    }
}

async fn execute<S>(
    config: &RunConfig,
    source: &S,
    simplifier: Arc<dyn GeometrySimplifier>,
    lookup: &RegionLookup,
    name: &str,
    report: &mut RunReport,
) -> Result<(), FatalError>
where
    S: PortaleSource + ?Sized,
{
    std::fs::create_dir_all(&config.data_dir).map_err(|e| FatalError::io(&config.data_dir, e))?;

    let features = simplified_features(config, source, simplifier, report).await?;

    info!(
        areas = features.len(),
        workers = config.enrich_workers,
        "Enriching areas"
    );
    let enriched = enrich_areas(source, &features, lookup, config.enrich_workers).await;
    report.areas_enriched = enriched.records.len();
    report.areas_skipped = enriched.skipped.len();
    report.record_unit_errors(&enriched.failures);

    if let Some((area, sigla)) = enriched.unknown_provinces.first() {
        for (area, sigla) in &enriched.unknown_provinces {
            error!(area, sigla = sigla.as_str(), "Province missing from region lookup");
        }
        remove_stale(&config.working_db_path())?;
        return Err(FatalError::UnknownProvince {
            sigla: sigla.clone(),
            area: *area,
        });
    }
    if enriched.records.is_empty() {
        remove_stale(&config.working_db_path())?;
        return Err(FatalError::NoAreas {
            attempted: features.len(),
        });
    }

    let target = PersistTarget {
        working_db: config.working_db_path(),
        json_dir: config.json_dir(),
        archive_dir: config.archive_dir(),
        name: name.to_string(),
    };
    let (records, duplicates) = unique_by_code(enriched.records);
    report.areas_duplicated = duplicates.len();
    let persisted = tokio::task::spawn_blocking(move || persist(records, target)).await??;

    report.record_unit_errors(&persisted.rejected);
    report.rows_written = persisted.written;
    report.snapshot = Some(persisted.archived.name);
    report.checksum = Some(persisted.archived.checksum);

    Ok(())
}

/// Géométries simplifiées : depuis le cache, sinon récolte + simplification
async fn simplified_features<S>(
    config: &RunConfig,
    source: &S,
    simplifier: Arc<dyn GeometrySimplifier>,
    report: &mut RunReport,
) -> Result<Vec<AreaFeature>, FatalError>
where
    S: PortaleSource + ?Sized,
{
    let cache = config.cache_path();
    if cache.exists() {
        info!(cache = %cache.display(), "Simplified cache found, skipping harvest");
        report.cache_hit = true;
    } else {
        harvest_and_simplify(config, source, simplifier, &cache, report).await?;
    }

    let loaded = load_simplified(&cache)?;
    if loaded.missing_code > 0 || !loaded.missing_geometry.is_empty() {
        warn!(
            missing_code = loaded.missing_code,
            missing_geometry = loaded.missing_geometry.len(),
            "Features dropped from simplified cache"
        );
    }
    report.features_dropped = loaded.missing_code + loaded.missing_geometry.len();

    Ok(loaded.features)
}

async fn harvest_and_simplify<S>(
    config: &RunConfig,
    source: &S,
    simplifier: Arc<dyn GeometrySimplifier>,
    cache: &Path,
    report: &mut RunReport,
) -> Result<(), FatalError>
where
    S: PortaleSource + ?Sized,
{
    info!(
        regions = config.regions.len(),
        workers = config.harvest_workers,
        "Harvesting regional layers"
    );
    let harvest = harvest_regions(source, &config.regions, config.harvest_workers).await;
    report.regions_harvested = harvest.regions_ok;
    report.regions_failed = harvest.failures.len();
    report.features_harvested = harvest.features.len();
    report.record_unit_errors(&harvest.failures);

    let unique = deduplicate(harvest.features);
    report.features_unique = unique.len();
    info!(
        harvested = report.features_harvested,
        unique = unique.len(),
        "Features deduplicated"
    );

    // Un cache vide bloquerait toutes les exécutions suivantes
    if unique.is_empty() {
        return Err(FatalError::NoAreas { attempted: 0 });
    }

    let collection = to_feature_collection(&unique);
    let input = tempfile::Builder::new()
        .prefix("harvest-")
        .suffix(".json")
        .tempfile_in(&config.data_dir)
        .map_err(|e| FatalError::io(&config.data_dir, e))?;
    write_collection(input.path(), &collection)?;

    let partial = config
        .data_dir
        .join(format!("{}.partial.json", SIMPLIFIED_CACHE.trim_end_matches(".json")));
    if partial.exists() {
        std::fs::remove_file(&partial).map_err(|e| FatalError::io(&partial, e))?;
    }
    let input_path = input.path().to_path_buf();
    let output_path = partial.clone();
    tokio::task::spawn_blocking(move || simplifier.simplify(&input_path, &output_path)).await??;

    std::fs::rename(&partial, cache).map_err(|e| FatalError::io(cache, e))?;
    info!(cache = %cache.display(), "Simplified cache written");

    Ok(())
}

struct PersistTarget {
    working_db: PathBuf,
    json_dir: PathBuf,
    archive_dir: PathBuf,
    name: String,
}

struct Persisted {
    written: usize,
    rejected: Vec<UnitError>,
    archived: ArchivedSnapshot,
}

/// Transaction unique puis archivage ; s'exécute hors du runtime async
fn persist(records: Vec<AreaRecord>, target: PersistTarget) -> Result<Persisted, FatalError> {
    ensure_vacant(&target.json_dir, &target.archive_dir, &target.name)?;
    remove_stale(&target.working_db)?;

    let mut store = SnapshotStore::open(&target.working_db)?;
    let (kept, rejected) = match write_snapshot(&mut store, records, &target.name) {
        Ok(result) => result,
        Err(e) => {
            if let Err(discard) = store.discard() {
                warn!(error = %discard, "Failed to discard working database");
            }
            return Err(e.into());
        }
    };
    let written = kept.len();
    let working_db = store.close()?;

    let archived = match archive_snapshot(
        &kept,
        &working_db,
        &target.json_dir,
        &target.archive_dir,
        &target.name,
    ) {
        Ok(archived) => archived,
        Err(e) => {
            // Une base validée sans paire archivée ne doit pas subsister
            if let Err(remove) = SnapshotStore::remove(&working_db) {
                warn!(error = %remove, "Failed to remove working database");
            }
            return Err(e.into());
        }
    };

    Ok(Persisted {
        written,
        rejected,
        archived,
    })
}

/// Écrit toutes les zones et la version ; retourne les zones effectivement écrites
fn write_snapshot(
    store: &mut SnapshotStore,
    records: Vec<AreaRecord>,
    timestamp: &str,
) -> Result<(Vec<AreaRecord>, Vec<UnitError>), StoreError> {
    let mut tx = store.begin()?;
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        if tx.upsert_area(&record)? == UpsertOutcome::Written {
            kept.push(record);
        }
    }
    tx.set_version(timestamp)?;
    let (_, rejected) = tx.commit()?;
    Ok((kept, rejected))
}

/// Supprime une base de travail laissée par une exécution interrompue
fn remove_stale(working_db: &Path) -> Result<(), FatalError> {
    if !working_db.exists() {
        return Ok(());
    }
    warn!(path = %working_db.display(), "Removing working database left by an aborted run");
    SnapshotStore::remove(working_db)?;
    Ok(())
}
