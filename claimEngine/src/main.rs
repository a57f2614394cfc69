use std::sync::mpsc;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use earthlord::claim::events::ClaimEvent;
use earthlord::claim::path_recorder::SampleDecision;
use earthlord::claim::state_machine::{ClaimEngine, ClaimOutcome, Persistence};
use earthlord::cli::cli::Args;
use earthlord::config::claim_config::ClaimConfig;
use earthlord::data::{poi_loader, track_loader};
use earthlord::geo::coordinate::Coordinate;
use earthlord::poi::catalog::{PoiCatalog, StaticPoiCatalog};
use earthlord::poi::proximity::{self, ProximityCooldown};
use earthlord::storage::json_repository::JsonFileTerritoryRepository;
use earthlord::storage::repository::TerritoryRepository;
use earthlord::utils::clock::SystemClock;
use earthlord::utils::context::{ExecutionContext, Inline, RayonContext};
use earthlord::utils::logging::{self, FileIOType, OperationCategory};

fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_logging(args.enable_timing(), args.verbose())?;

    println!("Earthlord territory claim replay");
    println!("Track: {}, store: {}, owner: {}", args.track(), args.store(), args.owner());

    let config = load_config(&args)?;
    let repository = Arc::new(JsonFileTerritoryRepository::open(args.store())
        .with_context(|| format!("opening territory store {}", args.store()))?);
    let catalog = match args.pois() {
        Some(path) => Some(poi_loader::load_catalog(path)
            .with_context(|| format!("loading POIs from {}", path))?),
        None => None,
    };
    let track = track_loader::load_track(args.track())
        .with_context(|| format!("loading track {}", args.track()))?;

    let mut engine = ClaimEngine::new(
        args.owner(),
        config.clone(),
        repository.clone(),
        Arc::new(SystemClock),
    );
    let events = engine.subscribe();

    engine.start()?;
    if let Some(name) = args.name() {
        engine.set_territory_name(name)?;
    }

    replay(&mut engine, &track, catalog.as_ref(), &config);

    if !engine.is_loop_closed() {
        warn!("Track never returned to its start; validating anyway");
    }

    let mut outcome = if args.background() {
        validate_in_background(&mut engine)?
    } else {
        engine.finish()?
    };

    for _ in 0..args.save_retries() {
        match outcome.failure() {
            Some(reason) if reason.is_retryable() => {
                warn!("Validation could not finish ({}); retrying", reason);
                outcome = engine.retry_finish()?;
            }
            _ => break,
        }
    }

    for event in events.try_iter() {
        match event {
            ClaimEvent::SampleRejected { .. } => {}
            other => debug!(?other, "Claim event"),
        }
    }

    let result = report(outcome, repository.as_ref(), args.save_retries());
    logging::print_timing_report();
    result
}

fn load_config(args: &Args) -> Result<ClaimConfig> {
    let _timing = logging::start_timing("load_config",
        OperationCategory::FileIO { subcategory: FileIOType::ConfigLoad });

    let mut config = match args.config() {
        Some(path) => ClaimConfig::load(path).with_context(|| format!("reading config {}", path))?,
        None => ClaimConfig::default(),
    };

    if let Some(threshold) = args.poi_threshold() {
        config.proximity.threshold_m = threshold;
    }
    if let Some(tolerance) = args.closure_tolerance() {
        config.validation.closure_tolerance_m = tolerance;
    }
    config.validate()?;
    Ok(config)
}

fn replay(engine: &mut ClaimEngine, track: &[Coordinate], catalog: Option<&StaticPoiCatalog>, config: &ClaimConfig) {
    let progress = ProgressBar::new(track.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} samples {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut cooldown = ProximityCooldown::from_secs(config.proximity.prompt_cooldown_secs);
    let mut rejected = 0usize;

    for sample in track {
        progress.inc(1);
        match engine.ingest_sample(sample.clone()) {
            Ok(SampleDecision::Accepted) => {
                if let Some(catalog) = catalog {
                    prompt_nearby(catalog, sample, config, &mut cooldown);
                }
            }
            Ok(SampleDecision::Rejected(reason)) => {
                rejected += 1;
                debug!(%reason, "Sample rejected");
            }
            Err(e) => {
                warn!("Stopped replay: {}", e);
                break;
            }
        }
        progress.set_message(format!("({} rejected)", rejected));
    }

    progress.finish_with_message(format!("({} rejected)", rejected));
    info!(
        accepted = engine.recorder().len(),
        rejected,
        distance_m = engine.recorder().cumulative_distance(),
        "Track replayed"
    );
}

fn prompt_nearby(catalog: &StaticPoiCatalog, position: &Coordinate, config: &ClaimConfig, cooldown: &mut ProximityCooldown) {
    let now = position.timestamp.unwrap_or_else(Utc::now);
    let nearby = match catalog.list_nearby(position, config.proximity.catalog_query_radius_m) {
        Ok(nearby) => nearby,
        Err(e) => {
            warn!("POI lookup failed: {}", e);
            return;
        }
    };

    let events = cooldown.filter(proximity::evaluate(position, &nearby, config.proximity.threshold_m, now));
    for event in events {
        println!(
            "  Near {} ({}, danger {}) at {:.0} m",
            event.name, event.category, event.danger_level.value(), event.distance_m
        );
        // The replay has no player to answer, so every prompt counts as dismissed
        cooldown.dismiss(event.poi_id, now);
    }
}

fn validate_in_background(engine: &mut ClaimEngine) -> Result<ClaimOutcome> {
    let job = engine.begin_validation()?;
    let (tx, rx) = mpsc::channel();
    let deliver_on: Arc<dyn ExecutionContext> = Arc::new(Inline);

    job.dispatch(&RayonContext::global(), deliver_on, move |verdict| {
        let _ = tx.send(verdict);
    });

    let verdict = rx.recv().context("validation worker stopped without a verdict")?;
    Ok(engine.apply_verdict(verdict)?)
}

fn report(outcome: ClaimOutcome, repository: &dyn TerritoryRepository, save_retries: u32) -> Result<()> {
    match outcome {
        ClaimOutcome::Completed { territory, persistence } => {
            println!(
                "Claimed {} \"{}\": {} over {} points, perimeter {:.0} m",
                territory.get_id(),
                territory.get_name(),
                territory.formatted_area(),
                territory.get_point_count(),
                territory.perimeter()
            );

            let mut pending = match persistence {
                Persistence::Saved => return Ok(()),
                Persistence::Pending(pending) => pending,
            };
            for _ in 0..save_retries {
                match pending.retry(repository) {
                    Ok(_) => return Ok(()),
                    Err(still_pending) => pending = still_pending,
                }
            }
            bail!(
                "territory {} validated but could not be saved after {} attempts: {}",
                pending.territory().get_id(),
                pending.attempts(),
                pending.last_error()
            )
        }
        ClaimOutcome::Failed(reason) => {
            println!("Claim failed [{}]: {}", reason.code(), reason);
            Ok(())
        }
    }
}
