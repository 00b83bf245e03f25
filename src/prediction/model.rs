//! Occupancy model trait for extensible lot scoring.
//!
//! This module defines the `OccupancyModel` trait that all scoring models
//! must implement. Models are selected via the policy file and loaded at
//! startup.

use crate::factors::FactorPolicy;
use crate::sources::ParkingLot;
use crate::state::{FactorSet, PredictionResult};

/// Scoring constants shared by all models, loaded from the policy file.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Divisor applied to the factor product before saturation; the default
    /// keeps the multiplicative scale of the heuristic in [0, 1].
    pub normalization_constant: f64,
    /// Base popularity used for lots that do not report one.
    pub default_base_popularity: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            normalization_constant: 1.0,
            default_base_popularity: 0.5,
        }
    }
}

/// Trait for models that score a lot's occupancy from its normalized factors.
///
/// Implement this trait to add new scoring models. The model is selected via
/// the `model` field in the policy file.
pub trait OccupancyModel: Send + Sync + std::fmt::Debug {
    /// Score one lot under one factor set. Implementations must return a
    /// clamped, finite occupancy percentage in [0, 100].
    fn predict(&self, lot: &ParkingLot, factors: &FactorSet) -> PredictionResult;

    /// The normalization policy this model was loaded with.
    fn factor_policy(&self) -> &FactorPolicy;

    fn scoring_config(&self) -> &ScoringConfig;
}
