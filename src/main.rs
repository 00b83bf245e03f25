use lotwatch::api::{self, ApiContext};
use lotwatch::config::{self, Config, SourceMode};
use lotwatch::orchestrator::{Orchestrator, SourceSet, spawn_poll_thread};
use lotwatch::prediction;
use lotwatch::prediction::heuristic_v1::HeuristicV1Model;
use lotwatch::sources::mock::{
    FixedLocationSource, MockLotSource, MockVenueSource, MockWeatherSource,
};
use lotwatch::sources::places::{HttpLotSource, HttpVenueSource};
use lotwatch::sources::weather::HttpWeatherSource;
use lotwatch::sources::{LotSource, VenueSource, WeatherSource};
use lotwatch::state::AppState;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

fn init_tracing(level: &str) {
    let max_level = level.parse().unwrap_or(tracing::Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(max_level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(&config.logging.level);
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "lotwatch starting"
    );

    // Load scoring policy/model
    let model = match config.policy_path() {
        Some(path) => match prediction::load_policy_from_path(path) {
            Ok(model) => {
                tracing::info!(path = %path.display(), "Scoring policy loaded");
                model
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load policy, using defaults");
                Box::new(HeuristicV1Model::with_defaults())
            }
        },
        None => {
            tracing::info!("No policy path configured, using default model");
            Box::new(HeuristicV1Model::with_defaults())
        }
    };

    let state = Arc::new(RwLock::new(AppState::new()));
    let sources = build_sources(&config);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&state),
        Arc::from(model),
        sources,
        config.calendar_mode(),
        config.search_radius_m(),
    ));

    let stop_flag = Arc::new(AtomicBool::new(false));
    let refresh_interval = config.refresh_interval();
    tracing::info!(
        interval_ms = refresh_interval.as_millis(),
        "Starting refresh poll thread"
    );
    let _poll_handle = spawn_poll_thread(
        Arc::clone(&orchestrator),
        refresh_interval,
        Arc::clone(&stop_flag),
    );

    let app = api::router(ApiContext {
        state: Arc::clone(&state),
        orchestrator,
    });
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    // Signal poll thread to stop
    stop_flag.store(true, std::sync::atomic::Ordering::Relaxed);

    Ok(())
}

/// Build the upstream source set for the configured mode. In http mode a
/// missing endpoint falls back to the built-in fixtures for that source so
/// a partial configuration still produces a working map.
fn build_sources(config: &Config) -> SourceSet {
    let location = Box::new(FixedLocationSource::new(config.search_center()));

    match config.source_mode() {
        SourceMode::Mock => {
            tracing::info!("Using mock sources (no upstreams configured)");
            SourceSet {
                location,
                lots: Box::new(MockLotSource::with_sample_lots()),
                weather: Box::new(MockWeatherSource::clear_sky()),
                venues: Box::new(MockVenueSource::with_sample_venues()),
            }
        }
        SourceMode::Http => {
            let timeout = config.upstream_timeout();

            let lots: Box<dyn LotSource> = match config.lots_endpoint() {
                Some(endpoint) => Box::new(HttpLotSource::new(endpoint.to_string(), timeout)),
                None => {
                    tracing::warn!("http mode without lots_endpoint, using mock lots");
                    Box::new(MockLotSource::with_sample_lots())
                }
            };
            let weather: Box<dyn WeatherSource> = match config.weather_endpoint() {
                Some(endpoint) => Box::new(HttpWeatherSource::new(endpoint.to_string(), timeout)),
                None => {
                    tracing::warn!("http mode without weather_endpoint, using mock weather");
                    Box::new(MockWeatherSource::clear_sky())
                }
            };
            let venues: Box<dyn VenueSource> = match config.venues_endpoint() {
                Some(endpoint) => Box::new(HttpVenueSource::new(endpoint.to_string(), timeout)),
                None => {
                    tracing::warn!("http mode without venues_endpoint, using mock venues");
                    Box::new(MockVenueSource::with_sample_venues())
                }
            };

            SourceSet {
                location,
                lots,
                weather,
                venues,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::config;

    #[test]
    fn default_config_is_valid_toml() -> Result<(), Box<dyn std::error::Error>> {
        let _config = config::load_default()?;
        Ok(())
    }

    #[test]
    fn default_policy_file_loads() -> Result<(), Box<dyn std::error::Error>> {
        let config = config::load_default()?;
        let path = config.policy_path().expect("policy path configured");
        let _model = lotwatch::prediction::load_policy_from_path(path)?;
        Ok(())
    }
}
