use crate::factors::{FactorPolicy, compute_factors};
use crate::sources::{ContextSnapshot, ParkingLot};
use crate::state::{FactorSet, LotPrediction, OccupancyStatus, PredictionResult};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::error;

pub mod heuristic_v1;
pub mod model;

use heuristic_v1::HeuristicV1Model;
use model::{OccupancyModel, ScoringConfig};

// Model factory
pub fn create_model(file: &PolicyFile) -> Result<Box<dyn OccupancyModel>, PolicyError> {
    let scoring = ScoringConfig {
        normalization_constant: file.normalization_constant.unwrap_or(1.0),
        default_base_popularity: file.default_base_popularity.unwrap_or(0.5),
    };

    if !scoring.normalization_constant.is_finite() || scoring.normalization_constant <= 0.0 {
        return Err(PolicyError::Invalid(format!(
            "normalization_constant must be positive, got {}",
            scoring.normalization_constant
        )));
    }
    if !(0.0..=1.0).contains(&scoring.default_base_popularity) {
        return Err(PolicyError::Invalid(format!(
            "default_base_popularity must be in [0, 1], got {}",
            scoring.default_base_popularity
        )));
    }

    match file.model.as_str() {
        "heuristic_v1" => {
            let policy: FactorPolicy = serde_json::from_value(file.params.clone())?;
            Ok(Box::new(HeuristicV1Model::new(policy, scoring)))
        }
        other => Err(PolicyError::Invalid(format!("unknown model: {other}"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct PolicyFile {
    pub model: String,
    pub normalization_constant: Option<f64>,
    pub default_base_popularity: Option<f64>,
    #[serde(default = "default_params")]
    pub params: serde_json::Value,
}

fn default_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse policy file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid policy: {0}")]
    Invalid(String),
}

pub fn load_policy_from_path(
    path: impl AsRef<Path>,
) -> Result<Box<dyn OccupancyModel>, PolicyError> {
    let contents = std::fs::read_to_string(path)?;
    let file: PolicyFile = serde_json::from_str(&contents)?;
    create_model(&file)
}

/// Run normalize → predict → classify over every candidate lot.
///
/// A model output outside [0, 100] or non-finite is an internal defect, not
/// an upstream condition: it is logged and replaced with an empty-lot result
/// so a corrupt value never reaches the snapshot.
pub fn predict_lots(
    lots: &[ParkingLot],
    context: &ContextSnapshot,
    model: &dyn OccupancyModel,
) -> Vec<LotPrediction> {
    lots.iter()
        .map(|lot| {
            let factors = compute_factors(lot, context, model.factor_policy());
            let prediction = model.predict(lot, &factors);
            let prediction = if prediction.occupancy_percent.is_finite()
                && (0.0..=100.0).contains(&prediction.occupancy_percent)
            {
                prediction
            } else {
                error!(
                    lot_id = %lot.id,
                    occupancy = prediction.occupancy_percent,
                    "Model produced out-of-range occupancy, substituting empty"
                );
                fallback_prediction(factors)
            };
            LotPrediction {
                lot: lot.clone(),
                prediction,
            }
        })
        .collect()
}

fn fallback_prediction(factors: FactorSet) -> PredictionResult {
    let status = OccupancyStatus::Available;
    PredictionResult {
        occupancy_percent: 0.0,
        status,
        color: status.color(),
        factors,
        estimated_vehicles: None,
    }
}
