use lotwatch::error::AppError;
use lotwatch::orchestrator::{Orchestrator, SourceSet, TickOutcome};
use lotwatch::prediction::heuristic_v1::HeuristicV1Model;
use lotwatch::sources::CalendarMode;
use lotwatch::sources::mock::{
    FixedLocationSource, MockBehavior, MockLotSource, MockVenueSource, MockWeatherSource,
    sample_center, sample_lots,
};
use lotwatch::state::{AppState, OccupancyStatus, Snapshot, TickPhase};
use std::sync::{Arc, RwLock};

fn orchestrator(sources: SourceSet) -> Orchestrator {
    Orchestrator::new(
        Arc::new(RwLock::new(AppState::new())),
        Arc::new(HeuristicV1Model::with_defaults()),
        sources,
        CalendarMode::InSession,
        1000,
    )
}

fn default_sources() -> SourceSet {
    SourceSet {
        location: Box::new(FixedLocationSource::new(sample_center())),
        lots: Box::new(MockLotSource::with_sample_lots()),
        weather: Box::new(MockWeatherSource::clear_sky()),
        venues: Box::new(MockVenueSource::with_sample_venues()),
    }
}

fn published_snapshot(orchestrator: &Orchestrator) -> Snapshot {
    let guard = orchestrator.state().read().expect("state lock poisoned");
    guard.snapshot().cloned().expect("snapshot published")
}

#[test]
fn tick_pipeline_publishes_prediction_for_every_lot() -> Result<(), AppError> {
    let orchestrator = orchestrator(default_sources());

    assert_eq!(orchestrator.try_tick(), TickOutcome::Published);

    let snapshot = published_snapshot(&orchestrator);
    assert!(!snapshot.stale);
    assert_eq!(snapshot.center, sample_center());
    assert_eq!(snapshot.lots.len(), sample_lots().len());

    for entry in &snapshot.lots {
        let prediction = &entry.prediction;
        assert!(prediction.occupancy_percent.is_finite());
        assert!((0.0..=100.0).contains(&prediction.occupancy_percent));
        assert_eq!(
            prediction.status,
            OccupancyStatus::classify(prediction.occupancy_percent)
        );
        assert_eq!(prediction.color, prediction.status.color());
        assert!(prediction.factors.time_impact > 0.0);
        assert!(prediction.factors.weather_impact > 0.0);
        assert!(prediction.factors.event_impact >= 1.0);
    }

    let guard = orchestrator
        .state()
        .read()
        .map_err(|_| AppError::StateLock)?;
    assert_eq!(guard.phase(), TickPhase::Published);
    assert_eq!(guard.last_success(), Some(snapshot.timestamp));
    Ok(())
}

#[test]
fn failed_lot_fetch_exposes_stale_snapshot_with_original_timestamp() -> Result<(), AppError> {
    let sources = SourceSet {
        lots: Box::new(MockLotSource::new(
            vec![MockBehavior::Succeed, MockBehavior::Unavailable],
            sample_lots(),
        )),
        ..default_sources()
    };
    let orchestrator = orchestrator(sources);

    assert_eq!(orchestrator.try_tick(), TickOutcome::Published);
    let fresh = published_snapshot(&orchestrator);

    assert_eq!(orchestrator.try_tick(), TickOutcome::Failed);
    let retained = published_snapshot(&orchestrator);

    assert!(retained.stale);
    assert_eq!(retained.timestamp, fresh.timestamp);
    assert_eq!(retained.lots, fresh.lots);

    let guard = orchestrator
        .state()
        .read()
        .map_err(|_| AppError::StateLock)?;
    assert!(guard.last_error().is_some());
    assert_eq!(guard.last_success(), Some(fresh.timestamp));
    Ok(())
}

#[test]
fn missing_weather_degrades_to_neutral_factor() -> Result<(), AppError> {
    let sources = SourceSet {
        weather: Box::new(MockWeatherSource::always_failing()),
        venues: Box::new(MockVenueSource::empty()),
        ..default_sources()
    };
    let orchestrator = orchestrator(sources);

    assert_eq!(orchestrator.try_tick(), TickOutcome::Published);

    let snapshot = published_snapshot(&orchestrator);
    assert!(!snapshot.stale);
    for entry in &snapshot.lots {
        assert_eq!(entry.prediction.factors.weather_impact, 1.0);
        assert_eq!(entry.prediction.factors.event_impact, 1.0);
    }
    Ok(())
}

#[test]
fn recovery_after_failure_clears_staleness() -> Result<(), AppError> {
    let sources = SourceSet {
        lots: Box::new(MockLotSource::new(
            vec![
                MockBehavior::Succeed,
                MockBehavior::Timeout,
                MockBehavior::Succeed,
            ],
            sample_lots(),
        )),
        ..default_sources()
    };
    let orchestrator = orchestrator(sources);

    assert_eq!(orchestrator.try_tick(), TickOutcome::Published);
    assert_eq!(orchestrator.try_tick(), TickOutcome::Failed);
    assert!(published_snapshot(&orchestrator).stale);

    assert_eq!(orchestrator.try_tick(), TickOutcome::Published);
    let recovered = published_snapshot(&orchestrator);
    assert!(!recovered.stale);

    let guard = orchestrator
        .state()
        .read()
        .map_err(|_| AppError::StateLock)?;
    assert!(guard.last_error().is_none());
    Ok(())
}
