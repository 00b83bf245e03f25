use geo::{HaversineDistance, Point};
use serde::Deserialize;
use std::time::SystemTime;
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod places;
pub mod weather;

pub type LotId = String;

pub const DEFAULT_SEARCH_RADIUS_M: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance between two coordinates in meters.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let from = Point::new(a.longitude, a.latitude);
    let to = Point::new(b.longitude, b.latitude);
    from.haversine_distance(&to)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotType {
    Surface,
    Garage,
    Street,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParkingLot {
    pub id: LotId,
    pub name: String,
    pub address: Option<String>,
    pub location: Coordinate,
    pub lot_type: LotType,
    /// Total capacity in vehicles, if known. Unknown capacity never gates prediction.
    pub capacity: Option<u32>,
    pub hours_of_operation: Option<String>,
    pub fee: Option<bool>,
    /// Baseline busyness in [0.0, 1.0]; the scoring default applies when unknown.
    pub base_popularity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precipitation {
    #[default]
    None,
    Light,
    Heavy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub temperature_c: f64,
    pub precipitation: Precipitation,
    pub visibility_m: Option<f64>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyVenue {
    pub name: String,
    pub location: Coordinate,
    /// Venue rating on a 0-5 scale, if the upstream supplies one.
    pub rating: Option<f64>,
    /// Live busyness on a 0-100 scale, if the upstream supplies one.
    pub live_popularity: Option<u8>,
    pub operational: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarMode {
    #[default]
    InSession,
    ExamPeriod,
    Holiday,
    Break,
}

/// Contextual inputs to one prediction tick. Missing pieces degrade to
/// neutral factors rather than failing the tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    pub timestamp: SystemTime,
    pub weather: Option<WeatherObservation>,
    pub venues: Vec<NearbyVenue>,
    pub calendar: CalendarMode,
}

/// Current query coordinate. Accuracy is advisory only and does not
/// participate in prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    pub accuracy_m: Option<f64>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream timeout: {0}")]
    Timeout(String),
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("invalid upstream payload: {0}")]
    InvalidPayload(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

pub trait LocationSource: Send + Sync {
    fn current_location(&self) -> Result<LocationFix, SourceError>;
}

pub trait LotSource: Send + Sync {
    fn fetch_lots(&self, center: Coordinate, radius_m: u32) -> Result<Vec<ParkingLot>, SourceError>;
}

pub trait WeatherSource: Send + Sync {
    fn fetch_weather(&self, at: Coordinate) -> Result<WeatherObservation, SourceError>;
}

pub trait VenueSource: Send + Sync {
    fn fetch_venues(&self, center: Coordinate, radius_m: u32)
    -> Result<Vec<NearbyVenue>, SourceError>;
}
