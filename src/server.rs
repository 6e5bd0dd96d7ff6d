use crate::config::AppConfig;
use crate::error::EstimateError;
use crate::estimator::{self, Estimator};
use crate::geocoder::{Geocoder, Nominatim};
use crate::penetration::PenetrationTable;
use crate::population::{PopulationSource, RestCountries};
use crate::types::EstimationResult;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

pub type LiveEstimator = Estimator<Nominatim, RestCountries>;

/// Raw strings so malformed values go through our own error taxonomy.
/// Query strings that fail to deserialize at all (repeated keys) are
/// mapped to `EstimateError::BadQuery` in the handler.
#[derive(Debug, Default, Deserialize)]
pub struct EstimateParams {
    address: Option<String>,
    bounds: Option<String>,
    zoom: Option<String>,
}

/// Wires the real geocoder and population service from config.
pub fn build_estimator(config: &AppConfig) -> Result<LiveEstimator> {
    let client = reqwest::Client::builder()
        .user_agent(config.upstream.user_agent.clone())
        .timeout(Duration::from_secs(config.upstream.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    Ok(Estimator::new(
        Nominatim::new(client.clone(), &config.upstream.geocoder_url, &config.upstream.language),
        RestCountries::new(client, &config.upstream.population_url),
        PenetrationTable::from_config(&config.penetration),
        config.estimation.clone(),
    ))
}

pub fn router<G, P>(estimator: Arc<Estimator<G, P>>) -> Router
where
    G: Geocoder + 'static,
    P: PopulationSource + 'static,
{
    Router::new()
        .route("/estimate", get(estimate_handler::<G, P>))
        .route("/health", get(|| async { "ok" }))
        .with_state(estimator)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let estimator = Arc::new(build_estimator(&config)?);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let app = router(estimator)
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

async fn estimate_handler<G: Geocoder, P: PopulationSource>(
    State(estimator): State<Arc<Estimator<G, P>>>,
    params: Result<Query<EstimateParams>, QueryRejection>,
) -> Result<Json<EstimationResult>, EstimateError> {
    let Query(params) = params.map_err(|e| EstimateError::BadQuery(e.body_text()))?;
    let query = estimator::parse_query(
        params.address.as_deref(),
        params.bounds.as_deref(),
        params.zoom.as_deref(),
    )?;
    let result = estimator.estimate(&query).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::tests::{estimator, FakeGeocoder, FakePopulation};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn app(reverse_country: Option<&str>, population: Option<u64>) -> Router {
        let geocoder = FakeGeocoder {
            reverse_country: reverse_country.map(str::to_string),
            ..Default::default()
        };
        router(Arc::new(estimator(geocoder, FakePopulation::with(population))))
    }

    #[tokio::test]
    async fn test_address_payload() {
        let (status, body) = get_json(app(None, Some(100_000)), "/estimate?address=Nairobi%2C%20Kenya").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["area"], "Nairobi, Kenya");
        assert_eq!(body["population"], 100_000);
        assert_eq!(body["rate"], 90.0);
        assert_eq!(body["estimate"], 90_000);
        assert_eq!(body["phonesPerDot"], 100);
        assert_eq!(body["dots"].as_array().unwrap().len(), 900);
        assert!(body["lat"].is_f64() && body["lon"].is_f64());
    }

    #[tokio::test]
    async fn test_bounds_coarse_and_fine() {
        let (status, coarse) = get_json(app(Some("Kenya"), Some(30_000)), "/estimate?bounds=1,1,2,2&zoom=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(coarse["phonesPerDot"], 100);
        assert_eq!(coarse["area"], "Selected Area");
        let dots = coarse["dots"].as_array().unwrap();
        assert_eq!(dots.len(), 270);
        for dot in dots {
            let (lat, lon) = (dot["lat"].as_f64().unwrap(), dot["lon"].as_f64().unwrap());
            assert!((1.0..=2.0).contains(&lat) && (1.0..=2.0).contains(&lon));
        }

        let (_, fine) = get_json(app(Some("Kenya"), Some(30_000)), "/estimate?bounds=1,1,2,2&zoom=15").await;
        assert_eq!(fine["phonesPerDot"], 1);
        assert_eq!(fine["dots"].as_array().unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_missing_location_is_400() {
        let (status, body) = get_json(app(None, Some(1)), "/estimate").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "Address or bounds required" }));
    }

    #[tokio::test]
    async fn test_unknown_address_is_404() {
        let (status, body) = get_json(app(None, Some(1)), "/estimate?address=zzzNoSuchPlace").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Address not found");
    }

    #[tokio::test]
    async fn test_malformed_bounds_is_500() {
        let (status, body) = get_json(app(None, Some(1)), "/estimate?bounds=1,2,oops").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server error");
    }

    #[tokio::test]
    async fn test_repeated_key_is_json_500() {
        let (status, body) = get_json(app(None, Some(1)), "/estimate?bounds=1,1,2,2&bounds=3,3,4,4").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "Server error" }));
    }

    #[tokio::test]
    async fn test_silent_upstreams_time_out_to_fallbacks() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = AppConfig::default();
        config.upstream.timeout_secs = 1;
        config.upstream.geocoder_url = format!("http://{}", addr);
        config.upstream.population_url = format!("http://{}", addr);
        let app = router(Arc::new(build_estimator(&config).unwrap()));

        let started = std::time::Instant::now();
        let (status, body) = get_json(app, "/estimate?bounds=1,1,2,2&zoom=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["population"], 10_000);
        assert_eq!(body["rate"], 100.0);
        assert_eq!(body["dots"].as_array().unwrap().len(), 100);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_population_outage_still_succeeds() {
        let (status, body) = get_json(app(Some("Kenya"), None), "/estimate?bounds=1,1,2,2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["population"], 10_000);
    }

    #[tokio::test]
    async fn test_health() {
        let resp = app(None, None)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_build_estimator_from_defaults() {
        assert!(build_estimator(&AppConfig::default()).is_ok());
    }
}
