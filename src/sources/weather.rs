//! HTTP-backed weather observation lookup.
//!
//! The upstream is an OpenWeatherMap-style service answering
//! `GET {endpoint}?lat={}&lon={}` with a JSON observation. Weather failure
//! is never fatal to a tick; callers substitute a neutral factor.

use crate::sources::http::send_http_get;
use crate::sources::{Coordinate, Precipitation, SourceError, WeatherObservation, WeatherSource};
use serde::Deserialize;
use std::time::Duration;

/// Precipitation rate at or above this many mm/h is treated as heavy.
const HEAVY_PRECIPITATION_MM_H: f64 = 2.5;

pub struct HttpWeatherSource {
    endpoint: String,
    timeout: Duration,
}

impl HttpWeatherSource {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }
}

#[derive(Debug, Deserialize)]
struct WeatherPayload {
    temperature_c: f64,
    #[serde(default)]
    precipitation_mm_h: Option<f64>,
    #[serde(default)]
    visibility_m: Option<f64>,
    #[serde(default)]
    condition: Option<String>,
}

fn classify_precipitation(rate_mm_h: Option<f64>) -> Precipitation {
    match rate_mm_h {
        Some(rate) if rate >= HEAVY_PRECIPITATION_MM_H => Precipitation::Heavy,
        Some(rate) if rate > 0.0 => Precipitation::Light,
        _ => Precipitation::None,
    }
}

impl WeatherSource for HttpWeatherSource {
    fn fetch_weather(&self, at: Coordinate) -> Result<WeatherObservation, SourceError> {
        let url = format!("{}?lat={}&lon={}", self.endpoint, at.latitude, at.longitude);
        let body = send_http_get(&url, self.timeout)?;
        let payload: WeatherPayload = serde_json::from_str(&body)
            .map_err(|err| SourceError::InvalidPayload(format!("weather: {err}")))?;

        if !payload.temperature_c.is_finite() {
            return Err(SourceError::InvalidPayload(
                "weather: non-finite temperature".to_string(),
            ));
        }

        Ok(WeatherObservation {
            temperature_c: payload.temperature_c,
            precipitation: classify_precipitation(payload.precipitation_mm_h),
            visibility_m: payload.visibility_m.filter(|v| v.is_finite() && *v >= 0.0),
            condition: payload.condition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precipitation_classes_follow_rate() {
        assert_eq!(classify_precipitation(None), Precipitation::None);
        assert_eq!(classify_precipitation(Some(0.0)), Precipitation::None);
        assert_eq!(classify_precipitation(Some(0.4)), Precipitation::Light);
        assert_eq!(classify_precipitation(Some(2.5)), Precipitation::Heavy);
        assert_eq!(classify_precipitation(Some(10.0)), Precipitation::Heavy);
    }

    #[test]
    fn payload_tolerates_missing_optionals() -> Result<(), serde_json::Error> {
        let body = r#"{"temperature_c": -3.5}"#;
        let payload: WeatherPayload = serde_json::from_str(body)?;

        assert_eq!(payload.temperature_c, -3.5);
        assert_eq!(payload.precipitation_mm_h, None);
        assert_eq!(payload.visibility_m, None);
        assert_eq!(payload.condition, None);
        Ok(())
    }
}
