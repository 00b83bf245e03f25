//! HTTP-backed candidate-lot and nearby-venue lookup.
//!
//! The upstream is any Places-style search service that answers
//! `GET {endpoint}?lat={}&lon={}&radius_m={}` with a JSON body. Partial
//! records are expected: missing fields default at the data-model layer and
//! records with unusable coordinates are dropped, not fatal.

use crate::sources::http::send_http_get;
use crate::sources::{
    Coordinate, LotSource, LotType, NearbyVenue, ParkingLot, SourceError, VenueSource,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

pub struct HttpLotSource {
    endpoint: String,
    timeout: Duration,
}

impl HttpLotSource {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }
}

#[derive(Debug, Deserialize)]
struct LotsPayload {
    lots: Vec<LotRecord>,
}

#[derive(Debug, Deserialize)]
struct LotRecord {
    id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    lot_type: Option<LotType>,
    #[serde(default)]
    capacity: Option<u32>,
    #[serde(default)]
    hours_of_operation: Option<String>,
    #[serde(default)]
    fee: Option<bool>,
    #[serde(default)]
    base_popularity: Option<f64>,
}

impl LotSource for HttpLotSource {
    fn fetch_lots(
        &self,
        center: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<ParkingLot>, SourceError> {
        let url = format!(
            "{}?lat={}&lon={}&radius_m={}",
            self.endpoint, center.latitude, center.longitude, radius_m
        );
        let body = send_http_get(&url, self.timeout)?;
        let payload: LotsPayload = serde_json::from_str(&body)
            .map_err(|err| SourceError::InvalidPayload(format!("lots: {err}")))?;

        let mut lots = Vec::with_capacity(payload.lots.len());
        for record in payload.lots {
            let location = Coordinate::new(record.latitude, record.longitude);
            if !location.is_valid() {
                warn!(
                    lot_id = %record.id,
                    latitude = record.latitude,
                    longitude = record.longitude,
                    "Dropping lot record with invalid coordinate"
                );
                continue;
            }
            lots.push(ParkingLot {
                id: record.id,
                name: record.name,
                address: record.address,
                location,
                lot_type: record.lot_type.unwrap_or_default(),
                capacity: record.capacity.filter(|c| *c > 0),
                hours_of_operation: record.hours_of_operation,
                fee: record.fee,
                base_popularity: record
                    .base_popularity
                    .filter(|p| p.is_finite() && (0.0..=1.0).contains(p)),
            });
        }
        Ok(lots)
    }
}

pub struct HttpVenueSource {
    endpoint: String,
    timeout: Duration,
}

impl HttpVenueSource {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }
}

#[derive(Debug, Deserialize)]
struct VenuesPayload {
    venues: Vec<VenueRecord>,
}

#[derive(Debug, Deserialize)]
struct VenueRecord {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    live_popularity: Option<u8>,
    #[serde(default = "default_operational")]
    operational: bool,
}

fn default_operational() -> bool {
    true
}

impl VenueSource for HttpVenueSource {
    fn fetch_venues(
        &self,
        center: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<NearbyVenue>, SourceError> {
        let url = format!(
            "{}?lat={}&lon={}&radius_m={}",
            self.endpoint, center.latitude, center.longitude, radius_m
        );
        let body = send_http_get(&url, self.timeout)?;
        let payload: VenuesPayload = serde_json::from_str(&body)
            .map_err(|err| SourceError::InvalidPayload(format!("venues: {err}")))?;

        let mut venues = Vec::with_capacity(payload.venues.len());
        for record in payload.venues {
            let location = Coordinate::new(record.latitude, record.longitude);
            if !location.is_valid() {
                warn!(
                    venue = %record.name,
                    "Dropping venue record with invalid coordinate"
                );
                continue;
            }
            venues.push(NearbyVenue {
                name: record.name,
                location,
                rating: record.rating.filter(|r| r.is_finite() && (0.0..=5.0).contains(r)),
                live_popularity: record.live_popularity.filter(|p| *p <= 100),
                operational: record.operational,
            });
        }
        Ok(venues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lot_payload_accepts_partial_records() -> Result<(), serde_json::Error> {
        let body = r#"{
            "lots": [
                {"id": "a", "name": "North Lot", "latitude": 42.73, "longitude": -73.67},
                {"id": "b", "name": "Garage", "latitude": 42.72, "longitude": -73.68,
                 "lot_type": "garage", "capacity": 420, "fee": true, "base_popularity": 0.8}
            ]
        }"#;

        let payload: LotsPayload = serde_json::from_str(body)?;

        assert_eq!(payload.lots.len(), 2);
        assert_eq!(payload.lots[0].capacity, None);
        assert_eq!(payload.lots[0].lot_type, None);
        assert_eq!(payload.lots[1].lot_type, Some(LotType::Garage));
        assert_eq!(payload.lots[1].capacity, Some(420));
        Ok(())
    }

    #[test]
    fn venue_payload_defaults_operational() -> Result<(), serde_json::Error> {
        let body = r#"{
            "venues": [
                {"name": "Field House", "latitude": 42.73, "longitude": -73.67, "rating": 4.5},
                {"name": "Closed Cafe", "latitude": 42.73, "longitude": -73.67, "operational": false}
            ]
        }"#;

        let payload: VenuesPayload = serde_json::from_str(body)?;

        assert!(payload.venues[0].operational);
        assert!(!payload.venues[1].operational);
        assert_eq!(payload.venues[0].rating, Some(4.5));
        Ok(())
    }
}
