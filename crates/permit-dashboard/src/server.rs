use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use permit_processing::DataProfiler;
use permit_processing::types::DatasetProfile;
use polars::prelude::DataFrame;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::pages::bivariate::{self, BivariatePage, BivariateParams};
use crate::pages::exploration::{self, ExplorationPage, ExplorationParams};
use crate::pages::overview::{self, OverviewPage, OverviewParams};
use crate::pages::univariate::{self, UnivariatePage, UnivariateParams};
use crate::shell;
use crate::state::{DashboardState, DatasetChoice};

pub const DEFAULT_ADDR: &str = "127.0.0.1:8501";

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ProfileParams {
    pub dataset: DatasetChoice,
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(|| shell_page("/")))
        .route("/univariate", get(|| shell_page("/univariate")))
        .route("/bivariate", get(|| shell_page("/bivariate")))
        .route("/exploration", get(|| shell_page("/exploration")))
        .route("/api/overview", get(overview_page))
        .route("/api/univariate", get(univariate_page))
        .route("/api/bivariate", get(bivariate_page))
        .route("/api/exploration", get(exploration_page))
        .route("/api/profile", get(profile_page))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: DashboardState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Dashboard listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn shell_page(path: &'static str) -> Html<String> {
    Html(shell::render(path))
}

async fn overview_page(
    State(state): State<DashboardState>,
    query: std::result::Result<Query<OverviewParams>, QueryRejection>,
) -> Result<Json<OverviewPage>> {
    let params = params(query)?;
    render(state, params.dataset, "overview", move |df| {
        overview::build(&df, &params)
    })
    .await
}

async fn univariate_page(
    State(state): State<DashboardState>,
    query: std::result::Result<Query<UnivariateParams>, QueryRejection>,
) -> Result<Json<UnivariatePage>> {
    let params = params(query)?;
    render(state, params.dataset, "univariate", move |df| {
        univariate::build(&df, &params)
    })
    .await
}

async fn bivariate_page(
    State(state): State<DashboardState>,
    query: std::result::Result<Query<BivariateParams>, QueryRejection>,
) -> Result<Json<BivariatePage>> {
    let params = params(query)?;
    render(state, params.dataset, "bivariate", move |df| {
        bivariate::build(&df, &params)
    })
    .await
}

async fn exploration_page(
    State(state): State<DashboardState>,
    query: std::result::Result<Query<ExplorationParams>, QueryRejection>,
) -> Result<Json<ExplorationPage>> {
    let params = params(query)?;
    render(state, params.dataset, "exploration", move |df| {
        exploration::build(&df, &params)
    })
    .await
}

async fn profile_page(
    State(state): State<DashboardState>,
    query: std::result::Result<Query<ProfileParams>, QueryRejection>,
) -> Result<Json<DatasetProfile>> {
    let params = params(query)?;
    render(state, params.dataset, "profile", |df| {
        Ok(DataProfiler::default().profile_dataset(&df)?)
    })
    .await
}

/// Unparseable query strings become a 422 with the usual error body.
fn params<T: DeserializeOwned>(
    query: std::result::Result<Query<T>, QueryRejection>,
) -> Result<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| DashboardError::bad_parameter("query", rejection.body_text()))
}

/// Load the dataset and build the page off the async runtime.
async fn render<T, F>(
    state: DashboardState,
    dataset: DatasetChoice,
    page: &'static str,
    build: F,
) -> Result<Json<T>>
where
    T: Send + 'static,
    F: FnOnce(DataFrame) -> Result<T> + Send + 'static,
{
    let started = Instant::now();
    let model = tokio::task::spawn_blocking(move || {
        let df = state.load(dataset)?;
        build(df)
    })
    .await??;
    debug!(
        "Rendered {} from {:?} in {:.1}ms",
        page,
        dataset,
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(Json(model))
}
