use crate::sources::{Coordinate, ParkingLot};
use serde::Serialize;
use std::time::SystemTime;
use tokio::sync::watch;

/// Discrete occupancy band. Boundaries are lower-bound inclusive:
/// exactly 40 is Moderate, exactly 90 is Full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyStatus {
    Available,
    Moderate,
    NearlyFull,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Yellow,
    Orange,
    Red,
}

impl OccupancyStatus {
    /// Total classification of an occupancy percentage into a status band.
    pub fn classify(occupancy_percent: f64) -> Self {
        if occupancy_percent >= 90.0 {
            Self::Full
        } else if occupancy_percent >= 70.0 {
            Self::NearlyFull
        } else if occupancy_percent >= 40.0 {
            Self::Moderate
        } else {
            Self::Available
        }
    }

    pub fn color(self) -> StatusColor {
        match self {
            Self::Available => StatusColor::Green,
            Self::Moderate => StatusColor::Yellow,
            Self::NearlyFull => StatusColor::Orange,
            Self::Full => StatusColor::Red,
        }
    }
}

/// Normalized contextual multipliers for one lot, one tick. All strictly
/// positive and finite; recomputed fresh every tick, never carried over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorSet {
    pub time_impact: f64,
    pub weather_impact: f64,
    pub event_impact: f64,
}

impl FactorSet {
    pub const NEUTRAL: Self = Self {
        time_impact: 1.0,
        weather_impact: 1.0,
        event_impact: 1.0,
    };

    pub fn product(&self) -> f64 {
        self.time_impact * self.weather_impact * self.event_impact
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Clamped to [0, 100]; never NaN.
    pub occupancy_percent: f64,
    pub status: OccupancyStatus,
    pub color: StatusColor,
    pub factors: FactorSet,
    /// Occupancy applied to capacity, only when capacity is known.
    pub estimated_vehicles: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LotPrediction {
    pub lot: ParkingLot,
    pub prediction: PredictionResult,
}

/// Complete result set for one refresh tick. Replaced atomically; a stale
/// snapshot keeps the timestamp of the tick that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub center: Coordinate,
    pub timestamp: SystemTime,
    pub stale: bool,
    pub lots: Vec<LotPrediction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Idle,
    Fetching,
    Computing,
    Published,
    Failed,
}

#[derive(Debug)]
pub struct AppState {
    snapshot: Option<Snapshot>,
    snapshot_tx: watch::Sender<Option<Snapshot>>,
    phase: TickPhase,
    phase_tx: watch::Sender<TickPhase>,
    last_error: Option<String>,
    last_success: Option<SystemTime>,
}

impl AppState {
    pub fn new() -> Self {
        let (snapshot_tx, _snapshot_rx) = watch::channel(None);
        let (phase_tx, _phase_rx) = watch::channel(TickPhase::Idle);
        Self {
            snapshot: None,
            snapshot_tx,
            phase: TickPhase::Idle,
            phase_tx,
            last_error: None,
            last_success: None,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn set_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = Some(snapshot.clone());
        self.snapshot_tx.send_replace(Some(snapshot));
    }

    /// Flag the retained snapshot as stale after a failed tick. The snapshot
    /// timestamp is left untouched so consumers can see the data's true age.
    pub fn mark_snapshot_stale(&mut self) {
        if let Some(snapshot) = self.snapshot.as_mut()
            && !snapshot.stale
        {
            snapshot.stale = true;
            let updated = snapshot.clone();
            self.snapshot_tx.send_replace(Some(updated));
        }
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<TickPhase> {
        self.phase_tx.subscribe()
    }

    pub fn set_phase(&mut self, phase: TickPhase) {
        self.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    pub fn last_success(&self) -> Option<SystemTime> {
        self.last_success
    }

    pub fn set_last_success(&mut self, timestamp: SystemTime) {
        self.last_success = Some(timestamp);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
