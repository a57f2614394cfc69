//! Lifecycle of a territory claim.
//!
//! ```text
//! Idle --start--> Tracking --finish--> Validating --> Completed | Failed
//!                     \--cancel--> Cancelled
//! ```
//!
//! A failure caused by an unreachable repository keeps the committed path, and
//! [`ClaimEngine::retry_validation`] goes back to `Validating` with it.
//! Terminal states return to `Idle` through [`ClaimEngine::reset`]. One engine
//! drives at most one attempt at a time and expects a single writer.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::claim::events::{ClaimEvent, EventBus};
use crate::claim::path_recorder::{PathRecorder, SampleDecision};
use crate::claim::validation::{AttemptVerdict, ValidationFailure, ValidationJob, ValidationVerdict};
use crate::config::claim_config::ClaimConfig;
use crate::geo::coordinate::Coordinate;
use crate::models::territory::{Territory, TerritoryId};
use crate::storage::repository::{RepositoryError, TerritoryRepository};
use crate::utils::clock::Clock;
use crate::utils::logging::{self, OperationCategory, PersistenceType};

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimState {
    Idle,
    Tracking,
    Validating,
    Completed(TerritoryId),
    Failed(ValidationFailure),
    Cancelled,
}

impl ClaimState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimState::Completed(_) | ClaimState::Failed(_) | ClaimState::Cancelled)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClaimState::Idle => "idle",
            ClaimState::Tracking => "tracking",
            ClaimState::Validating => "validating",
            ClaimState::Completed(_) => "completed",
            ClaimState::Failed(_) => "failed",
            ClaimState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimError {
    AttemptAlreadyActive,
    InvalidState { operation: &'static str, state: ClaimState },
    StaleVerdict { expected: u64, received: u64 },
}

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimError::AttemptAlreadyActive => write!(f, "A claim attempt is already active"),
            ClaimError::InvalidState { operation, state } => {
                write!(f, "Cannot {} while {}", operation, state.name())
            }
            ClaimError::StaleVerdict { expected, received } => {
                write!(f, "Verdict for attempt {} does not match active attempt {}", received, expected)
            }
        }
    }
}

impl std::error::Error for ClaimError {}

/// A validated territory whose save has not gone through yet.
///
/// Retrying reuses the territory as validated; the path is never walked or checked again.
#[derive(Debug)]
pub struct PendingSave {
    territory: Territory,
    attempts: u32,
    last_error: RepositoryError,
}

impl PendingSave {
    pub fn territory(&self) -> &Territory {
        &self.territory
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> &RepositoryError {
        &self.last_error
    }

    /// Tries the save again. On failure the pending save comes back for another go.
    pub fn retry(mut self, repository: &dyn TerritoryRepository) -> Result<Territory, PendingSave> {
        let _timing = logging::start_timing("retry_save",
            OperationCategory::Persistence { subcategory: PersistenceType::Save });

        self.attempts += 1;
        match repository.save(&self.territory) {
            Ok(()) => {
                info!(territory_id = %self.territory.get_id(), attempts = self.attempts, "Territory saved on retry");
                Ok(self.territory)
            }
            Err(e) => {
                warn!(territory_id = %self.territory.get_id(), attempts = self.attempts, "Territory save failed again: {}", e);
                self.last_error = e;
                Err(self)
            }
        }
    }

    pub fn into_territory(self) -> Territory {
        self.territory
    }
}

#[derive(Debug)]
pub enum Persistence {
    Saved,
    Pending(PendingSave),
}

#[derive(Debug)]
pub enum ClaimOutcome {
    Completed { territory: Territory, persistence: Persistence },
    Failed(ValidationFailure),
}

impl ClaimOutcome {
    pub fn territory(&self) -> Option<&Territory> {
        match self {
            ClaimOutcome::Completed { territory, .. } => Some(territory),
            ClaimOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            ClaimOutcome::Completed { .. } => None,
            ClaimOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// Metadata of the attempt in progress. The path itself lives in the recorder.
#[derive(Debug, Clone)]
struct ClaimAttempt {
    id: u64,
    started_at: DateTime<Utc>,
    name: Option<String>,
    loop_closed: bool,
    rejected_samples: usize,
    // Path handed to validation, kept so a failed overlap lookup can be re-run
    committed: Vec<Coordinate>,
}

/// Read-only view of the attempt in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSummary {
    pub started_at: DateTime<Utc>,
    pub point_count: usize,
    pub cumulative_distance_m: f64,
    pub running_area_m2: f64,
    pub loop_closed: bool,
    pub rejected_samples: usize,
}

pub struct ClaimEngine {
    owner_id: String,
    config: ClaimConfig,
    repository: Arc<dyn TerritoryRepository>,
    clock: Arc<dyn Clock>,
    state: ClaimState,
    recorder: PathRecorder,
    attempt: Option<ClaimAttempt>,
    next_attempt_id: u64,
    events: EventBus,
}

impl ClaimEngine {
    pub fn new(
        owner_id: impl Into<String>,
        config: ClaimConfig,
        repository: Arc<dyn TerritoryRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let recorder = PathRecorder::new(config.recorder.clone());
        Self {
            owner_id: owner_id.into(),
            config,
            repository,
            clock,
            state: ClaimState::Idle,
            recorder,
            attempt: None,
            next_attempt_id: 1,
            events: EventBus::new(),
        }
    }

    pub fn state(&self) -> &ClaimState {
        &self.state
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn config(&self) -> &ClaimConfig {
        &self.config
    }

    pub fn subscribe(&self) -> Receiver<ClaimEvent> {
        self.events.subscribe()
    }

    pub fn recorder(&self) -> &PathRecorder {
        &self.recorder
    }

    pub fn current_path(&self) -> Vec<Coordinate> {
        self.recorder.current_path()
    }

    pub fn attempt_summary(&self) -> Option<AttemptSummary> {
        self.attempt.as_ref().map(|attempt| AttemptSummary {
            started_at: attempt.started_at,
            point_count: self.recorder.len(),
            cumulative_distance_m: self.recorder.cumulative_distance(),
            running_area_m2: self.recorder.running_area_estimate(),
            loop_closed: attempt.loop_closed,
            rejected_samples: attempt.rejected_samples,
        })
    }

    fn invalid(&self, operation: &'static str) -> ClaimError {
        ClaimError::InvalidState { operation, state: self.state.clone() }
    }

    /// Begins a new attempt. Only allowed from `Idle`.
    pub fn start(&mut self) -> Result<(), ClaimError> {
        if self.state != ClaimState::Idle {
            return Err(ClaimError::AttemptAlreadyActive);
        }

        let started_at = self.clock.now();
        let id = self.next_attempt_id;
        self.next_attempt_id += 1;

        self.recorder.reset();
        self.attempt = Some(ClaimAttempt {
            id,
            started_at,
            name: None,
            loop_closed: false,
            rejected_samples: 0,
            committed: Vec::new(),
        });
        self.state = ClaimState::Tracking;

        info!(owner = %self.owner_id, attempt = id, "Claim tracking started");
        self.events.emit(ClaimEvent::TrackingStarted { started_at });
        Ok(())
    }

    /// Names the territory the current attempt will produce.
    pub fn set_territory_name(&mut self, name: impl Into<String>) -> Result<(), ClaimError> {
        if self.state != ClaimState::Tracking {
            return Err(self.invalid("rename attempt"));
        }
        match self.attempt.as_mut() {
            Some(attempt) => {
                attempt.name = Some(name.into());
                Ok(())
            }
            None => Err(ClaimError::InvalidState { operation: "rename attempt", state: self.state.clone() }),
        }
    }

    /// Feeds one location fix. Samples without a timestamp are stamped with the engine clock.
    pub fn ingest_sample(&mut self, mut sample: Coordinate) -> Result<SampleDecision, ClaimError> {
        let _timing = logging::start_timing("ingest_sample", OperationCategory::Tracking);

        if self.state != ClaimState::Tracking {
            return Err(self.invalid("ingest sample"));
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return Err(ClaimError::InvalidState { operation: "ingest sample", state: self.state.clone() });
        };

        if sample.timestamp.is_none() {
            sample.timestamp = Some(self.clock.now());
        }

        let decision = self.recorder.ingest(sample);
        match &decision {
            SampleDecision::Rejected(reason) => {
                attempt.rejected_samples += 1;
                debug!(attempt = attempt.id, "Sample dropped: {}", reason);
                self.events.emit(ClaimEvent::SampleRejected { reason: reason.clone() });
            }
            SampleDecision::Accepted => {
                let point_count = self.recorder.len();
                let closure = &self.config.validation;
                if !attempt.loop_closed && point_count > closure.min_points {
                    let distance = self
                        .recorder
                        .last()
                        .and_then(|last| self.recorder.distance_to_start(last));
                    if let Some(distance_to_start) = distance.filter(|d| *d <= closure.closure_tolerance_m) {
                        attempt.loop_closed = true;
                        info!(attempt = attempt.id, point_count, "Claim loop closed");
                        self.events.emit(ClaimEvent::LoopClosed { distance_to_start, point_count });
                    }
                }
            }
        }
        Ok(decision)
    }

    /// Whether the walked path has returned to its start.
    pub fn is_loop_closed(&self) -> bool {
        self.attempt.as_ref().map_or(false, |a| a.loop_closed)
    }

    /// Commits the path and validates it on the calling thread.
    pub fn finish(&mut self) -> Result<ClaimOutcome, ClaimError> {
        let job = self.begin_validation()?;
        let verdict = job.run();
        self.apply_verdict(verdict)
    }

    /// Moves to `Validating` and returns the job to run, on any context.
    ///
    /// The engine accepts no samples, cancellation or new attempts until the
    /// verdict comes back through [`ClaimEngine::apply_verdict`].
    pub fn begin_validation(&mut self) -> Result<ValidationJob, ClaimError> {
        if self.state != ClaimState::Tracking || self.attempt.is_none() {
            return Err(self.invalid("finish"));
        }

        let path = self.recorder.take_path();
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.committed = path;
        }
        self.validation_job()
    }

    /// Re-runs validation of the committed path after the overlap lookup failed.
    ///
    /// Only allowed from `Failed(RepositoryUnavailable)`; no samples are needed.
    pub fn retry_validation(&mut self) -> Result<ValidationJob, ClaimError> {
        let retryable = matches!(&self.state, ClaimState::Failed(reason) if reason.is_retryable());
        if !retryable || self.attempt.is_none() {
            return Err(self.invalid("retry validation"));
        }
        self.validation_job()
    }

    /// [`ClaimEngine::retry_validation`] run on the calling thread.
    pub fn retry_finish(&mut self) -> Result<ClaimOutcome, ClaimError> {
        let job = self.retry_validation()?;
        let verdict = job.run();
        self.apply_verdict(verdict)
    }

    fn validation_job(&mut self) -> Result<ValidationJob, ClaimError> {
        let Some(attempt) = self.attempt.as_ref() else {
            return Err(self.invalid("finish"));
        };

        let point_count = attempt.committed.len();
        let name = attempt
            .name
            .clone()
            .unwrap_or_else(|| format!("Territory {}", attempt.started_at.format("%Y-%m-%d %H:%M")));

        let job = ValidationJob::new(
            attempt.id,
            self.owner_id.clone(),
            name,
            attempt.committed.clone(),
            attempt.started_at,
            self.config.validation.clone(),
            Arc::clone(&self.repository),
            Arc::clone(&self.clock),
        );

        info!(attempt = attempt.id, point_count, "Validating claim");
        self.state = ClaimState::Validating;
        self.events.emit(ClaimEvent::Validating { point_count });
        Ok(job)
    }

    /// Applies a verdict produced by the job from [`ClaimEngine::begin_validation`].
    pub fn apply_verdict(&mut self, verdict: AttemptVerdict) -> Result<ClaimOutcome, ClaimError> {
        if self.state != ClaimState::Validating {
            return Err(self.invalid("apply verdict"));
        }
        let expected = self.attempt.as_ref().map_or(0, |a| a.id);
        if verdict.attempt_id != expected {
            return Err(ClaimError::StaleVerdict { expected, received: verdict.attempt_id });
        }

        match verdict.verdict {
            ValidationVerdict::Failed(reason) => {
                if reason.is_retryable() {
                    info!(attempt = expected, "Keeping committed path for a validation retry");
                } else {
                    self.attempt = None;
                }
                self.state = ClaimState::Failed(reason.clone());
                self.events.emit(ClaimEvent::Failed(reason.clone()));
                Ok(ClaimOutcome::Failed(reason))
            }
            ValidationVerdict::Passed(territory) => {
                // The attempt ends here whatever happens to persistence
                self.attempt = None;
                self.state = ClaimState::Completed(territory.get_id().clone());
                self.events.emit(ClaimEvent::Completed(territory.clone()));
                let persistence = self.persist(&territory);
                Ok(ClaimOutcome::Completed { territory, persistence })
            }
        }
    }

    fn persist(&self, territory: &Territory) -> Persistence {
        let territory_id = territory.get_id().clone();
        match self.repository.save(territory) {
            Ok(()) => {
                info!(territory_id = %territory_id, "Territory saved");
                self.events.emit(ClaimEvent::Persisted { territory_id });
                Persistence::Saved
            }
            Err(e) => {
                warn!(territory_id = %territory_id, "Territory save failed: {}", e);
                self.events.emit(ClaimEvent::PersistenceFailed { territory_id, cause: e.to_string() });
                Persistence::Pending(PendingSave {
                    territory: territory.clone(),
                    attempts: 1,
                    last_error: e,
                })
            }
        }
    }

    /// Abandons the attempt in progress. Nothing from it is ever persisted.
    pub fn cancel(&mut self) -> Result<(), ClaimError> {
        if self.state != ClaimState::Tracking {
            return Err(self.invalid("cancel"));
        }

        if let Some(attempt) = self.attempt.take() {
            info!(
                attempt = attempt.id,
                points = self.recorder.len(),
                rejected = attempt.rejected_samples,
                "Claim cancelled"
            );
        }
        self.recorder.reset();
        self.state = ClaimState::Cancelled;
        self.events.emit(ClaimEvent::Cancelled);
        Ok(())
    }

    /// Returns a finished engine to `Idle` so a new attempt can start.
    pub fn reset(&mut self) -> Result<(), ClaimError> {
        match self.state {
            ClaimState::Idle => Ok(()),
            _ if self.state.is_terminal() => {
                self.recorder.reset();
                self.attempt = None;
                self.state = ClaimState::Idle;
                Ok(())
            }
            _ => Err(self.invalid("reset")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::path_recorder::RejectReason;
    use crate::geo::coordinate::destination;
    use crate::storage::repository::InMemoryTerritoryRepository;
    use crate::utils::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
    }

    fn engine() -> (ClaimEngine, Arc<InMemoryTerritoryRepository>, Arc<ManualClock>) {
        let repo = Arc::new(InMemoryTerritoryRepository::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = ClaimEngine::new("player-1", ClaimConfig::default(), repo.clone(), clock.clone());
        (engine, repo, clock)
    }

    fn at(east: f64, north: f64) -> Coordinate {
        let base = Coordinate::new(31.2304, 121.4737);
        destination(&destination(&base, 0.0, north), 90.0, east)
    }

    fn walk(engine: &mut ClaimEngine, clock: &ManualClock, points: &[(f64, f64)]) {
        for (east, north) in points {
            clock.advance(Duration::seconds(20));
            engine.ingest_sample(at(*east, *north)).unwrap();
        }
    }

    #[test]
    fn test_start_only_from_idle() {
        let (mut engine, _, _) = engine();
        engine.start().unwrap();
        assert_eq!(engine.start(), Err(ClaimError::AttemptAlreadyActive));
        assert_eq!(engine.state(), &ClaimState::Tracking);

        engine.cancel().unwrap();
        assert_eq!(engine.start(), Err(ClaimError::AttemptAlreadyActive));
        assert_eq!(engine.state(), &ClaimState::Cancelled);
    }

    #[test]
    fn test_ingest_requires_tracking() {
        let (mut engine, _, _) = engine();
        assert!(matches!(
            engine.ingest_sample(at(0.0, 0.0)),
            Err(ClaimError::InvalidState { operation: "ingest sample", .. })
        ));
    }

    #[test]
    fn test_missing_timestamp_uses_clock() {
        let (mut engine, _, clock) = engine();
        engine.start().unwrap();
        clock.advance(Duration::seconds(5));
        assert!(engine.ingest_sample(at(0.0, 0.0)).unwrap().is_accepted());
        assert_eq!(engine.current_path()[0].timestamp, Some(t0() + Duration::seconds(5)));
    }

    #[test]
    fn test_rejected_sample_emits_event_without_state_change() {
        let (mut engine, _, _) = engine();
        let events = engine.subscribe();
        engine.start().unwrap();
        let noisy = at(0.0, 0.0).with_accuracy(120.0);
        let decision = engine.ingest_sample(noisy).unwrap();
        assert!(!decision.is_accepted());
        assert_eq!(engine.state(), &ClaimState::Tracking);
        assert_eq!(engine.attempt_summary().unwrap().rejected_samples, 1);

        let received: Vec<ClaimEvent> = events.try_iter().collect();
        assert!(matches!(received[0], ClaimEvent::TrackingStarted { .. }));
        assert_eq!(
            received[1],
            ClaimEvent::SampleRejected { reason: RejectReason::InaccurateFix { accuracy: 120.0 } }
        );
    }

    #[test]
    fn test_loop_closed_detected_once() {
        let (mut engine, _, clock) = engine();
        let events = engine.subscribe();
        engine.start().unwrap();
        walk(&mut engine, &clock, &[(0.0, 0.0), (80.0, 0.0), (80.0, 80.0), (0.0, 80.0), (4.0, 3.0), (0.0, 10.0)]);
        assert!(engine.is_loop_closed());
        let closures = events
            .try_iter()
            .filter(|e| matches!(e, ClaimEvent::LoopClosed { .. }))
            .count();
        assert_eq!(closures, 1);
    }

    #[test]
    fn test_square_completes_and_saves() {
        let (mut engine, repo, clock) = engine();
        engine.start().unwrap();
        walk(&mut engine, &clock, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0), (5.0, 5.0)]);

        let outcome = engine.finish().unwrap();
        let territory = outcome.territory().cloned().unwrap();
        assert!(matches!(outcome, ClaimOutcome::Completed { persistence: Persistence::Saved, .. }));
        assert_eq!(territory.get_point_count(), 4);
        assert_eq!(territory.get_owner_id(), "player-1");
        assert_eq!(territory.get_started_at(), t0());
        assert_eq!(engine.state(), &ClaimState::Completed(territory.get_id().clone()));
        assert_eq!(repo.len(), 1);
        assert!(engine.attempt_summary().is_none());
    }

    #[test]
    fn test_finish_from_idle_is_invalid() {
        let (mut engine, _, _) = engine();
        assert!(matches!(engine.finish(), Err(ClaimError::InvalidState { .. })));
    }

    #[test]
    fn test_validating_blocks_other_operations() {
        let (mut engine, _, clock) = engine();
        engine.start().unwrap();
        walk(&mut engine, &clock, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        let job = engine.begin_validation().unwrap();
        assert_eq!(engine.state(), &ClaimState::Validating);
        assert!(engine.cancel().is_err());
        assert!(engine.ingest_sample(at(1.0, 1.0)).is_err());
        assert_eq!(engine.start(), Err(ClaimError::AttemptAlreadyActive));
        assert!(engine.reset().is_err());

        let outcome = engine.apply_verdict(job.run()).unwrap();
        assert!(outcome.territory().is_some());
    }

    #[test]
    fn test_stale_verdict_rejected() {
        let (mut engine, _, clock) = engine();
        engine.start().unwrap();
        walk(&mut engine, &clock, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        let job = engine.begin_validation().unwrap();
        let mut verdict = job.run();
        verdict.attempt_id += 10;
        assert!(matches!(engine.apply_verdict(verdict), Err(ClaimError::StaleVerdict { .. })));
        assert_eq!(engine.state(), &ClaimState::Validating);
    }

    #[test]
    fn test_cancel_clears_path() {
        let (mut engine, repo, clock) = engine();
        let events = engine.subscribe();
        engine.start().unwrap();
        walk(&mut engine, &clock, &[(0.0, 0.0), (50.0, 0.0), (50.0, 50.0)]);
        engine.cancel().unwrap();
        assert_eq!(engine.state(), &ClaimState::Cancelled);
        assert!(engine.recorder().is_empty());
        // The attempt itself is gone, not just flagged
        assert!(engine.attempt_summary().is_none());
        assert!(repo.is_empty());
        assert_eq!(events.try_iter().last(), Some(ClaimEvent::Cancelled));

        engine.reset().unwrap();
        engine.start().unwrap();
        assert!(engine.recorder().is_empty());
        assert_eq!(engine.attempt_summary().unwrap().point_count, 0);
    }

    #[test]
    fn test_save_failure_keeps_completed_and_retries() {
        let (mut engine, repo, clock) = engine();
        repo.fail_next_saves(2);
        engine.start().unwrap();
        walk(&mut engine, &clock, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);

        let pending = match engine.finish().unwrap() {
            ClaimOutcome::Completed { persistence: Persistence::Pending(p), .. } => p,
            other => panic!("unexpected {:?}", other),
        };
        assert!(matches!(engine.state(), ClaimState::Completed(_)));
        assert_eq!(pending.attempts(), 1);

        let pending = pending.retry(repo.as_ref()).unwrap_err();
        assert_eq!(pending.attempts(), 2);
        let expected_id = pending.territory().get_id().clone();
        let saved = pending.retry(repo.as_ref()).unwrap();
        assert_eq!(saved.get_id(), &expected_id);
        assert_eq!(repo.len(), 1);
        assert!(matches!(engine.state(), ClaimState::Completed(_)));
    }

    #[test]
    fn test_overlap_lookup_outage_can_be_retried() {
        let (mut engine, repo, clock) = engine();
        repo.set_queries_unavailable(true);
        engine.start().unwrap();
        walk(&mut engine, &clock, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0), (5.0, 5.0)]);

        let outcome = engine.finish().unwrap();
        assert_eq!(outcome.failure().map(|f| f.code()), Some("repository_unavailable"));
        assert!(matches!(engine.state(), ClaimState::Failed(_)));
        assert!(engine.recorder().is_empty());
        assert_eq!(engine.start(), Err(ClaimError::AttemptAlreadyActive));

        repo.set_queries_unavailable(false);
        let outcome = engine.retry_finish().unwrap();
        let territory = outcome.territory().unwrap();
        assert_eq!(territory.get_point_count(), 4);
        assert_eq!(territory.get_started_at(), t0());
        assert_eq!(repo.len(), 1);
        assert!(engine.attempt_summary().is_none());
    }

    #[test]
    fn test_geometric_failure_cannot_be_retried() {
        let (mut engine, _, clock) = engine();
        engine.start().unwrap();
        walk(&mut engine, &clock, &[(0.0, 0.0), (100.0, 100.0), (100.0, 0.0), (0.0, 100.0), (3.0, 3.0)]);
        assert!(engine.finish().unwrap().failure().is_some());
        assert!(matches!(
            engine.retry_validation(),
            Err(ClaimError::InvalidState { operation: "retry validation", .. })
        ));
        assert!(engine.attempt_summary().is_none());
    }

    #[test]
    fn test_custom_territory_name() {
        let (mut engine, _, clock) = engine();
        engine.start().unwrap();
        engine.set_territory_name("Riverside").unwrap();
        walk(&mut engine, &clock, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        let outcome = engine.finish().unwrap();
        assert_eq!(outcome.territory().unwrap().get_name(), "Riverside");
    }
}
