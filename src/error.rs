use crate::sources::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("upstream error: {0}")]
    Upstream(#[from] SourceError),
    #[error("state lock poisoned")]
    StateLock,
}
