//! Heuristic V1 scoring model using multiplicative factor composition.
//!
//! Formula: `occupancy = 100 * clamp(base * time * weather * event / k, 0, 1)`
//! where `k` is the policy's normalization constant. The saturating clamp,
//! not a raw multiply, keeps the result in bounds; the composition is
//! monotonic in every factor.

use crate::factors::FactorPolicy;
use crate::prediction::model::{OccupancyModel, ScoringConfig};
use crate::sources::ParkingLot;
use crate::state::{FactorSet, OccupancyStatus, PredictionResult};

#[derive(Debug)]
pub struct HeuristicV1Model {
    pub policy: FactorPolicy,
    pub scoring: ScoringConfig,
}

impl HeuristicV1Model {
    pub fn new(policy: FactorPolicy, scoring: ScoringConfig) -> Self {
        Self { policy, scoring }
    }

    pub fn with_defaults() -> Self {
        Self::new(FactorPolicy::default(), ScoringConfig::default())
    }
}

impl OccupancyModel for HeuristicV1Model {
    fn predict(&self, lot: &ParkingLot, factors: &FactorSet) -> PredictionResult {
        let base = lot
            .base_popularity
            .unwrap_or(self.scoring.default_base_popularity)
            .clamp(0.0, 1.0);

        let raw = base * factors.product() / self.scoring.normalization_constant;
        let occupancy_percent = 100.0 * raw.clamp(0.0, 1.0);

        let status = OccupancyStatus::classify(occupancy_percent);
        let estimated_vehicles = lot
            .capacity
            .map(|capacity| (f64::from(capacity) * occupancy_percent / 100.0).round() as u32);

        PredictionResult {
            occupancy_percent,
            status,
            color: status.color(),
            factors: *factors,
            estimated_vehicles,
        }
    }

    fn factor_policy(&self) -> &FactorPolicy {
        &self.policy
    }

    fn scoring_config(&self) -> &ScoringConfig {
        &self.scoring
    }
}
