//! Signal normalization: raw contextual inputs to bounded factor multipliers.
//!
//! Each factor is a dimensionless scalar shifting expected occupancy from
//! baseline. The numeric thresholds are tunable policy: they load from the
//! policy file and every entry here is only the shipped default.
//!
//! Weather direction is the campus rule: poor weather *raises* expected
//! occupancy, because fewer people walk or bike and more of them drive.

use crate::sources::{
    CalendarMode, ContextSnapshot, NearbyVenue, ParkingLot, Precipitation, WeatherObservation,
    distance_m,
};
use crate::state::FactorSet;
use serde::Deserialize;
use time::{OffsetDateTime, UtcOffset, Weekday};

pub const TIME_IMPACT_MIN: f64 = 0.5;
pub const TIME_IMPACT_MAX: f64 = 1.5;
pub const WEATHER_IMPACT_MIN: f64 = 0.8;
pub const WEATHER_IMPACT_MAX: f64 = 1.3;
pub const EVENT_IMPACT_MIN: f64 = 1.0;
pub const EVENT_IMPACT_MAX: f64 = 2.0;

/// Numeric policy for the normalizer. Deserialized from the policy file's
/// `params` object; any omitted field keeps its default.
///
/// Time-of-day schedule boundaries (local time via `utc_offset_hours`):
/// weekday peak 08:00-10:00 and 16:00-18:00, midday 10:00-16:00, early
/// 05:00-08:00, evening 18:00-22:00; weekend day 05:00-22:00; night
/// 22:00-05:00 every day.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FactorPolicy {
    pub utc_offset_hours: i8,
    pub weekday_peak: f64,
    pub weekday_midday: f64,
    pub weekday_early: f64,
    pub weekday_evening: f64,
    pub weekend_day: f64,
    pub night: f64,
    pub exam_multiplier: f64,
    pub holiday_multiplier: f64,
    pub break_multiplier: f64,
    pub precip_light: f64,
    pub precip_heavy: f64,
    pub low_visibility: f64,
    pub low_visibility_threshold_m: f64,
    pub extreme_temp: f64,
    pub cold_threshold_c: f64,
    pub hot_threshold_c: f64,
    pub event_radius_m: f64,
    pub event_damping: f64,
}

impl Default for FactorPolicy {
    fn default() -> Self {
        Self {
            utc_offset_hours: -5,
            weekday_peak: 1.2,
            weekday_midday: 1.1,
            weekday_early: 0.9,
            weekday_evening: 0.8,
            weekend_day: 0.6,
            night: 0.5,
            exam_multiplier: 1.25,
            holiday_multiplier: 0.6,
            break_multiplier: 0.7,
            precip_light: 1.1,
            precip_heavy: 1.25,
            low_visibility: 1.05,
            low_visibility_threshold_m: 1000.0,
            extreme_temp: 1.1,
            cold_threshold_c: 0.0,
            hot_threshold_c: 30.0,
            event_radius_m: 1000.0,
            event_damping: 0.5,
        }
    }
}

impl FactorPolicy {
    fn utc_offset(&self) -> UtcOffset {
        UtcOffset::from_hms(self.utc_offset_hours, 0, 0).unwrap_or(UtcOffset::UTC)
    }
}

/// Produce the factor set for one lot under one context. Missing inputs
/// (no weather, no venues) yield the neutral multiplier for that factor;
/// normalization never fails a tick.
pub fn compute_factors(
    lot: &ParkingLot,
    context: &ContextSnapshot,
    policy: &FactorPolicy,
) -> FactorSet {
    FactorSet {
        time_impact: time_impact(context, policy),
        weather_impact: weather_impact(context.weather.as_ref(), policy),
        event_impact: event_impact(lot, &context.venues, policy),
    }
}

fn time_impact(context: &ContextSnapshot, policy: &FactorPolicy) -> f64 {
    let local = OffsetDateTime::from(context.timestamp).to_offset(policy.utc_offset());
    let hour = local.hour();
    let weekend = matches!(local.weekday(), Weekday::Saturday | Weekday::Sunday);

    let schedule = if !(5..22).contains(&hour) {
        policy.night
    } else if weekend {
        policy.weekend_day
    } else {
        match hour {
            5..8 => policy.weekday_early,
            8..10 => policy.weekday_peak,
            10..16 => policy.weekday_midday,
            16..18 => policy.weekday_peak,
            _ => policy.weekday_evening,
        }
    };

    let calendar = match context.calendar {
        CalendarMode::InSession => 1.0,
        CalendarMode::ExamPeriod => policy.exam_multiplier,
        CalendarMode::Holiday => policy.holiday_multiplier,
        CalendarMode::Break => policy.break_multiplier,
    };

    (schedule * calendar).clamp(TIME_IMPACT_MIN, TIME_IMPACT_MAX)
}

fn weather_impact(weather: Option<&WeatherObservation>, policy: &FactorPolicy) -> f64 {
    let Some(observation) = weather else {
        return 1.0;
    };

    let mut factor = 1.0;
    match observation.precipitation {
        Precipitation::None => {}
        Precipitation::Light => factor *= policy.precip_light,
        Precipitation::Heavy => factor *= policy.precip_heavy,
    }
    if let Some(visibility) = observation.visibility_m
        && visibility < policy.low_visibility_threshold_m
    {
        factor *= policy.low_visibility;
    }
    if observation.temperature_c < policy.cold_threshold_c
        || observation.temperature_c > policy.hot_threshold_c
    {
        factor *= policy.extreme_temp;
    }

    factor.clamp(WEATHER_IMPACT_MIN, WEATHER_IMPACT_MAX)
}

fn event_impact(lot: &ParkingLot, venues: &[NearbyVenue], policy: &FactorPolicy) -> f64 {
    if venues.is_empty() {
        return 1.0;
    }

    let mut total_weight = 0.0;
    for venue in venues {
        if !venue.operational {
            continue;
        }
        let distance = distance_m(lot.location, venue.location);
        if distance > policy.event_radius_m {
            continue;
        }
        let proximity = 1.0 - distance / policy.event_radius_m;
        total_weight += venue_popularity(venue) * proximity;
    }

    (1.0 + policy.event_damping * total_weight).clamp(EVENT_IMPACT_MIN, EVENT_IMPACT_MAX)
}

/// Blend live busyness (0-100) and rating (0-5) into a 0-1 popularity score,
/// averaging whichever are present and defaulting to 0.5 when both are absent.
fn venue_popularity(venue: &NearbyVenue) -> f64 {
    let live = venue.live_popularity.map(|p| f64::from(p) / 100.0);
    let rated = venue.rating.map(|r| (r / 5.0).clamp(0.0, 1.0));
    match (live, rated) {
        (Some(live), Some(rated)) => (live + rated) / 2.0,
        (Some(live), None) => live,
        (None, Some(rated)) => rated,
        (None, None) => 0.5,
    }
}
