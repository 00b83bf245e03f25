//! Scripted in-memory sources for tests and for running without upstreams.

use crate::sources::{
    CalendarMode, ContextSnapshot, Coordinate, LocationFix, LocationSource, LotSource, LotType,
    NearbyVenue, ParkingLot, Precipitation, SourceError, VenueSource, WeatherObservation,
    WeatherSource,
};
use std::sync::Mutex;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Succeed,
    Timeout,
    Unavailable,
}

/// Pops scripted behaviors in order, falling back to `exhausted` once the
/// script runs out, and counts every call.
struct BehaviorScript {
    behaviors: Vec<MockBehavior>,
    next_index: usize,
    calls: usize,
    exhausted: MockBehavior,
}

impl BehaviorScript {
    fn new(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            behaviors,
            next_index: 0,
            calls: 0,
            exhausted: MockBehavior::Succeed,
        }
    }

    fn failing_forever() -> Self {
        Self {
            behaviors: Vec::new(),
            next_index: 0,
            calls: 0,
            exhausted: MockBehavior::Unavailable,
        }
    }

    fn next(&mut self, what: &str) -> Result<(), SourceError> {
        self.calls += 1;
        let behavior = self
            .behaviors
            .get(self.next_index)
            .copied()
            .unwrap_or(self.exhausted);
        self.next_index += 1;
        match behavior {
            MockBehavior::Succeed => Ok(()),
            MockBehavior::Timeout => Err(SourceError::Timeout(format!("mock {what} timeout"))),
            MockBehavior::Unavailable => {
                Err(SourceError::Unavailable(format!("mock {what} unavailable")))
            }
        }
    }
}

pub struct MockLotSource {
    script: Mutex<BehaviorScript>,
    fixtures: Vec<ParkingLot>,
}

impl MockLotSource {
    pub fn new(behaviors: Vec<MockBehavior>, fixtures: Vec<ParkingLot>) -> Self {
        Self {
            script: Mutex::new(BehaviorScript::new(behaviors)),
            fixtures,
        }
    }

    pub fn with_sample_lots() -> Self {
        Self::new(Vec::new(), sample_lots())
    }

    pub fn always_failing() -> Self {
        Self {
            script: Mutex::new(BehaviorScript::failing_forever()),
            fixtures: Vec::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.lock().map(|script| script.calls).unwrap_or(0)
    }
}

impl LotSource for MockLotSource {
    fn fetch_lots(
        &self,
        _center: Coordinate,
        _radius_m: u32,
    ) -> Result<Vec<ParkingLot>, SourceError> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| SourceError::Unavailable("mock lot script poisoned".to_string()))?;
        script.next("lot fetch")?;
        Ok(self.fixtures.clone())
    }
}

pub struct MockWeatherSource {
    script: Mutex<BehaviorScript>,
    observation: WeatherObservation,
}

impl MockWeatherSource {
    pub fn new(behaviors: Vec<MockBehavior>, observation: WeatherObservation) -> Self {
        Self {
            script: Mutex::new(BehaviorScript::new(behaviors)),
            observation,
        }
    }

    pub fn clear_sky() -> Self {
        Self::new(Vec::new(), sample_weather())
    }

    pub fn always_failing() -> Self {
        Self {
            script: Mutex::new(BehaviorScript::failing_forever()),
            observation: sample_weather(),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.lock().map(|script| script.calls).unwrap_or(0)
    }
}

impl WeatherSource for MockWeatherSource {
    fn fetch_weather(&self, _at: Coordinate) -> Result<WeatherObservation, SourceError> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| SourceError::Unavailable("mock weather script poisoned".to_string()))?;
        script.next("weather fetch")?;
        Ok(self.observation.clone())
    }
}

pub struct MockVenueSource {
    script: Mutex<BehaviorScript>,
    fixtures: Vec<NearbyVenue>,
}

impl MockVenueSource {
    pub fn new(behaviors: Vec<MockBehavior>, fixtures: Vec<NearbyVenue>) -> Self {
        Self {
            script: Mutex::new(BehaviorScript::new(behaviors)),
            fixtures,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn with_sample_venues() -> Self {
        Self::new(Vec::new(), sample_venues())
    }

    pub fn calls(&self) -> usize {
        self.script.lock().map(|script| script.calls).unwrap_or(0)
    }
}

impl VenueSource for MockVenueSource {
    fn fetch_venues(
        &self,
        _center: Coordinate,
        _radius_m: u32,
    ) -> Result<Vec<NearbyVenue>, SourceError> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| SourceError::Unavailable("mock venue script poisoned".to_string()))?;
        script.next("venue fetch")?;
        Ok(self.fixtures.clone())
    }
}

pub struct FixedLocationSource {
    fix: LocationFix,
}

impl FixedLocationSource {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            fix: LocationFix {
                coordinate,
                accuracy_m: None,
            },
        }
    }
}

impl LocationSource for FixedLocationSource {
    fn current_location(&self) -> Result<LocationFix, SourceError> {
        Ok(self.fix)
    }
}

pub fn sample_center() -> Coordinate {
    Coordinate::new(42.729869, -73.676871)
}

pub fn sample_lots() -> Vec<ParkingLot> {
    vec![
        ParkingLot {
            id: "mock_1".to_string(),
            name: "North Visitor Lot".to_string(),
            address: Some("15 College Ave".to_string()),
            location: Coordinate::new(42.731419, -73.675290),
            lot_type: LotType::Surface,
            capacity: Some(180),
            hours_of_operation: Some("24/7".to_string()),
            fee: Some(true),
            base_popularity: Some(0.6),
        },
        ParkingLot {
            id: "mock_2".to_string(),
            name: "West Garage".to_string(),
            address: Some("2 8th Street".to_string()),
            location: Coordinate::new(42.730760, -73.681901),
            lot_type: LotType::Garage,
            capacity: Some(420),
            hours_of_operation: Some("6 AM - 11 PM".to_string()),
            fee: Some(false),
            base_popularity: None,
        },
    ]
}

pub fn sample_venues() -> Vec<NearbyVenue> {
    vec![
        NearbyVenue {
            name: "Field House".to_string(),
            location: Coordinate::new(42.730100, -73.676500),
            rating: Some(4.5),
            live_popularity: Some(80),
            operational: true,
        },
        NearbyVenue {
            name: "Student Union".to_string(),
            location: Coordinate::new(42.730412, -73.676650),
            rating: Some(4.0),
            live_popularity: None,
            operational: true,
        },
    ]
}

pub fn sample_weather() -> WeatherObservation {
    WeatherObservation {
        temperature_c: 18.0,
        precipitation: Precipitation::None,
        visibility_m: Some(10_000.0),
        condition: Some("Clear".to_string()),
    }
}

pub fn sample_context(timestamp: SystemTime) -> ContextSnapshot {
    ContextSnapshot {
        timestamp,
        weather: Some(sample_weather()),
        venues: sample_venues(),
        calendar: CalendarMode::InSession,
    }
}
