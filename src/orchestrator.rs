//! Refresh orchestration: fetch → normalize → predict → classify → publish.
//!
//! One tick runs to completion before the next may start. A tick that fires
//! while another is in flight is skipped outright, not queued, so a slow
//! upstream can never build a backlog. Upstream failure retains the previous
//! snapshot, marked stale with its original timestamp.

use crate::error::AppError;
use crate::prediction::model::OccupancyModel;
use crate::prediction::predict_lots;
use crate::sources::{
    CalendarMode, ContextSnapshot, LocationSource, LotSource, VenueSource, WeatherSource,
};
use crate::state::{AppState, Snapshot, TickPhase};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

pub struct SourceSet {
    pub location: Box<dyn LocationSource>,
    pub lots: Box<dyn LotSource>,
    pub weather: Box<dyn WeatherSource>,
    pub venues: Box<dyn VenueSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Published,
    /// A tick was already in flight; no pipeline work was done.
    Skipped,
    Failed,
}

pub struct Orchestrator {
    state: Arc<RwLock<AppState>>,
    model: Arc<dyn OccupancyModel>,
    sources: SourceSet,
    calendar: CalendarMode,
    radius_m: u32,
    busy: AtomicBool,
    polling: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        state: Arc<RwLock<AppState>>,
        model: Arc<dyn OccupancyModel>,
        sources: SourceSet,
        calendar: CalendarMode,
        radius_m: u32,
    ) -> Self {
        Self {
            state,
            model,
            sources,
            calendar,
            radius_m,
            busy: AtomicBool::new(false),
            polling: AtomicBool::new(true),
        }
    }

    pub fn state(&self) -> &Arc<RwLock<AppState>> {
        &self.state
    }

    pub fn polling_enabled(&self) -> bool {
        self.polling.load(Ordering::Relaxed)
    }

    pub fn start_polling(&self) {
        self.polling.store(true, Ordering::Relaxed);
        info!("Polling started");
    }

    pub fn stop_polling(&self) {
        self.polling.store(false, Ordering::Relaxed);
        info!("Polling stopped");
    }

    /// Run one tick unless one is already in flight.
    pub fn try_tick(&self) -> TickOutcome {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Tick skipped: previous tick still in flight");
            return TickOutcome::Skipped;
        }

        let outcome = match self.tick_inner() {
            Ok(()) => TickOutcome::Published,
            Err(err) => {
                warn!(error = %err, "Tick failed, retaining previous snapshot");
                self.record_failure(&err);
                TickOutcome::Failed
            }
        };
        self.busy.store(false, Ordering::SeqCst);
        outcome
    }

    fn tick_inner(&self) -> Result<(), AppError> {
        self.set_phase(TickPhase::Fetching)?;

        let fix = self.sources.location.current_location()?;
        let center = fix.coordinate;
        if !center.is_valid() {
            return Err(AppError::InvalidCoordinate {
                lat: center.latitude,
                lon: center.longitude,
            });
        }
        if let Some(accuracy) = fix.accuracy_m {
            debug!(accuracy_m = accuracy, "Location fix accuracy (advisory)");
        }

        let lots = self.sources.lots.fetch_lots(center, self.radius_m)?;

        // Weather and venue failures degrade to neutral factors.
        let weather = match self.sources.weather.fetch_weather(center) {
            Ok(observation) => Some(observation),
            Err(err) => {
                warn!(error = %err, "Weather fetch failed, using neutral factor");
                None
            }
        };
        let venues = match self.sources.venues.fetch_venues(center, self.radius_m) {
            Ok(venues) => venues,
            Err(err) => {
                warn!(error = %err, "Venue fetch failed, using neutral factor");
                Vec::new()
            }
        };

        self.set_phase(TickPhase::Computing)?;

        let context = ContextSnapshot {
            timestamp: SystemTime::now(),
            weather,
            venues,
            calendar: self.calendar,
        };
        let predictions = predict_lots(&lots, &context, self.model.as_ref());

        let snapshot = Snapshot {
            center,
            timestamp: context.timestamp,
            stale: false,
            lots: predictions,
        };

        let lot_count = snapshot.lots.len();
        {
            let mut guard = self.state.write().map_err(|_| AppError::StateLock)?;
            guard.set_snapshot(snapshot);
            guard.set_last_success(context.timestamp);
            guard.set_last_error(None);
            guard.set_phase(TickPhase::Published);
        }
        info!(lots = lot_count, "Snapshot published");
        Ok(())
    }

    fn set_phase(&self, phase: TickPhase) -> Result<(), AppError> {
        let mut guard = self.state.write().map_err(|_| AppError::StateLock)?;
        guard.set_phase(phase);
        Ok(())
    }

    fn record_failure(&self, err: &AppError) {
        match self.state.write() {
            Ok(mut guard) => {
                guard.mark_snapshot_stale();
                guard.set_last_error(Some(err.to_string()));
                guard.set_phase(TickPhase::Failed);
                guard.set_phase(TickPhase::Idle);
            }
            Err(_) => {
                warn!("State lock poisoned while recording tick failure");
            }
        }
    }
}

/// Spawn the periodic polling thread driving the tick pipeline.
pub fn spawn_poll_thread(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            if orchestrator.polling_enabled() {
                match orchestrator.try_tick() {
                    TickOutcome::Published => {}
                    TickOutcome::Skipped => {
                        debug!("Scheduled tick skipped");
                    }
                    TickOutcome::Failed => {
                        warn!("Scheduled tick failed");
                    }
                }
            }

            sleep_with_stop(interval, &stop, cycle_start);
        }
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step);
        slept += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::heuristic_v1::HeuristicV1Model;
    use crate::sources::mock::{
        FixedLocationSource, MockBehavior, MockLotSource, MockVenueSource, MockWeatherSource,
        sample_center,
    };
    use crate::sources::{Coordinate, LocationFix, SourceError};

    fn mock_sources() -> SourceSet {
        SourceSet {
            location: Box::new(FixedLocationSource::new(sample_center())),
            lots: Box::new(MockLotSource::with_sample_lots()),
            weather: Box::new(MockWeatherSource::clear_sky()),
            venues: Box::new(MockVenueSource::with_sample_venues()),
        }
    }

    fn orchestrator_with(sources: SourceSet) -> Orchestrator {
        Orchestrator::new(
            Arc::new(RwLock::new(AppState::new())),
            Arc::new(HeuristicV1Model::with_defaults()),
            sources,
            CalendarMode::InSession,
            1000,
        )
    }

    fn read_state<T>(
        orchestrator: &Orchestrator,
        f: impl FnOnce(&AppState) -> T,
    ) -> Result<T, AppError> {
        let guard = orchestrator
            .state()
            .read()
            .map_err(|_| AppError::StateLock)?;
        Ok(f(&guard))
    }

    #[test]
    fn successful_tick_publishes_fresh_snapshot() -> Result<(), AppError> {
        let orchestrator = orchestrator_with(mock_sources());

        assert_eq!(orchestrator.try_tick(), TickOutcome::Published);

        let snapshot = read_state(&orchestrator, |s| s.snapshot().cloned())?
            .expect("snapshot published");
        assert!(!snapshot.stale);
        assert_eq!(snapshot.lots.len(), 2);
        assert_eq!(snapshot.center, sample_center());
        assert_eq!(
            read_state(&orchestrator, |s| s.phase())?,
            TickPhase::Published
        );
        assert_eq!(
            read_state(&orchestrator, |s| s.last_success())?,
            Some(snapshot.timestamp)
        );
        assert!(read_state(&orchestrator, |s| s.last_error().is_none())?);
        Ok(())
    }

    #[test]
    fn lot_fetch_failure_marks_previous_snapshot_stale() -> Result<(), AppError> {
        let sources = SourceSet {
            lots: Box::new(MockLotSource::new(
                vec![MockBehavior::Succeed, MockBehavior::Timeout],
                crate::sources::mock::sample_lots(),
            )),
            ..mock_sources()
        };
        let orchestrator = orchestrator_with(sources);

        assert_eq!(orchestrator.try_tick(), TickOutcome::Published);
        let first = read_state(&orchestrator, |s| s.snapshot().cloned())?
            .expect("first snapshot");

        assert_eq!(orchestrator.try_tick(), TickOutcome::Failed);

        let retained = read_state(&orchestrator, |s| s.snapshot().cloned())?
            .expect("snapshot retained");
        assert!(retained.stale);
        assert_eq!(retained.timestamp, first.timestamp);
        assert_eq!(retained.lots, first.lots);
        assert_eq!(read_state(&orchestrator, |s| s.phase())?, TickPhase::Idle);
        assert!(read_state(&orchestrator, |s| s.last_error().is_some())?);
        Ok(())
    }

    #[test]
    fn first_tick_failure_leaves_no_snapshot() -> Result<(), AppError> {
        let sources = SourceSet {
            lots: Box::new(MockLotSource::always_failing()),
            ..mock_sources()
        };
        let orchestrator = orchestrator_with(sources);

        assert_eq!(orchestrator.try_tick(), TickOutcome::Failed);

        assert!(read_state(&orchestrator, |s| s.snapshot().is_none())?);
        assert!(read_state(&orchestrator, |s| s.last_error().is_some())?);
        Ok(())
    }

    #[test]
    fn weather_failure_degrades_instead_of_failing() -> Result<(), AppError> {
        let sources = SourceSet {
            weather: Box::new(MockWeatherSource::always_failing()),
            ..mock_sources()
        };
        let orchestrator = orchestrator_with(sources);

        assert_eq!(orchestrator.try_tick(), TickOutcome::Published);

        let snapshot = read_state(&orchestrator, |s| s.snapshot().cloned())?
            .expect("snapshot published");
        assert!(!snapshot.stale);
        for entry in &snapshot.lots {
            assert_eq!(entry.prediction.factors.weather_impact, 1.0);
        }
        Ok(())
    }

    #[test]
    fn busy_orchestrator_skips_tick_without_invoking_pipeline() {
        let lots = MockLotSource::with_sample_lots();
        let lots_calls = Arc::new(lots);
        struct CountingLots(Arc<MockLotSource>);
        impl LotSource for CountingLots {
            fn fetch_lots(
                &self,
                center: Coordinate,
                radius_m: u32,
            ) -> Result<Vec<crate::sources::ParkingLot>, SourceError> {
                self.0.fetch_lots(center, radius_m)
            }
        }

        let sources = SourceSet {
            lots: Box::new(CountingLots(Arc::clone(&lots_calls))),
            ..mock_sources()
        };
        let orchestrator = orchestrator_with(sources);

        orchestrator.busy.store(true, Ordering::SeqCst);
        assert_eq!(orchestrator.try_tick(), TickOutcome::Skipped);
        assert_eq!(lots_calls.calls(), 0);

        // Once the in-flight tick clears, the next one runs normally.
        orchestrator.busy.store(false, Ordering::SeqCst);
        assert_eq!(orchestrator.try_tick(), TickOutcome::Published);
        assert_eq!(lots_calls.calls(), 1);
    }

    #[test]
    fn invalid_coordinate_aborts_tick_and_surfaces_error() -> Result<(), AppError> {
        struct BrokenLocation;
        impl LocationSource for BrokenLocation {
            fn current_location(&self) -> Result<LocationFix, SourceError> {
                Ok(LocationFix {
                    coordinate: Coordinate::new(200.0, 0.0),
                    accuracy_m: None,
                })
            }
        }

        let sources = SourceSet {
            location: Box::new(BrokenLocation),
            ..mock_sources()
        };
        let orchestrator = orchestrator_with(sources);

        assert_eq!(orchestrator.try_tick(), TickOutcome::Failed);

        let error = read_state(&orchestrator, |s| s.last_error().map(str::to_string))?
            .expect("error surfaced");
        assert!(error.contains("invalid coordinate"));
        Ok(())
    }

    #[test]
    fn polling_toggle_is_observable() {
        let orchestrator = orchestrator_with(mock_sources());
        assert!(orchestrator.polling_enabled());
        orchestrator.stop_polling();
        assert!(!orchestrator.polling_enabled());
        orchestrator.start_polling();
        assert!(orchestrator.polling_enabled());
    }
}
