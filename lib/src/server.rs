//! The HTTP surface: an `axum` router with one route per catalogue endpoint.

use crate::api::{Catalogue, ResourceKind};
use crate::builder::Links;
use crate::config::Config;
use crate::consts::PREFIXES;
use crate::errors::{CatalogueError, Result};
use crate::formats::OutputFormat;
use crate::negotiate::{resolve_params, RequestParams};
use crate::serialize::serialize_graph;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{info, warn};
use oxigraph::model::Graph;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

#[derive(Clone)]
pub struct AppState {
    pub catalogue: Arc<Catalogue>,
}

impl AppState {
    pub fn new(catalogue: Catalogue) -> Self {
        Self {
            catalogue: Arc::new(catalogue),
        }
    }
}

/// Everything a handler needs from the request besides its path parameters, resolved before
/// the upstream is contacted.
pub struct RequestContext {
    pub links: Links,
    pub params: RequestParams,
    pub query: HashMap<String, String>,
}

impl RequestContext {
    fn q(&self) -> Option<&str> {
        self.query.get("q").map(String::as_str)
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = CatalogueError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Query(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map_err(|e| CatalogueError::Validation(e.body_text()))?;
        let config = state.catalogue.config();
        let params = resolve_params(&query, config.default_pagesize)?;
        let base = base_url(parts, config)?;
        Ok(RequestContext {
            links: state.catalogue.links(base),
            params,
            query,
        })
    }
}

/// The configured public URL, or the one the client addressed: `Host` (or the request
/// target's authority) with the scheme from `X-Forwarded-Proto`, defaulting to `http`.
pub fn base_url(parts: &Parts, config: &Config) -> Result<Url> {
    if let Some(public) = &config.public_url {
        return Ok(public.clone());
    }
    let host = parts
        .headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .ok_or_else(|| CatalogueError::Validation("request has no Host header".into()))?;
    let scheme = parts
        .headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_ascii_lowercase())
        .filter(|s| s == "http" || s == "https")
        .unwrap_or_else(|| "http".to_string());
    Url::parse(&format!("{scheme}://{host}/"))
        .map_err(|e| CatalogueError::Validation(format!("invalid Host '{host}': {e}")))
}

fn render(graph: &Graph, output: OutputFormat) -> Result<Response> {
    let body = serialize_graph(graph, output, &PREFIXES)?;
    Ok(([(CONTENT_TYPE, output.content_type())], body).into_response())
}

async fn handle_catalogue(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response> {
    let graph = state.catalogue.catalogue(&ctx.links).await?;
    render(&graph, ctx.params.output)
}

async fn handle_artefacts(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response> {
    let graph = state
        .catalogue
        .artefacts(&ctx.links, ctx.params.paging)
        .await?;
    render(&graph, ctx.params.output)
}

async fn handle_artefact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Result<Response> {
    let graph = state.catalogue.artefact(&ctx.links, &id).await?;
    render(&graph, ctx.params.output)
}

async fn handle_distributions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Result<Response> {
    let graph = state
        .catalogue
        .distributions(&ctx.links, &id, ctx.params.paging)
        .await?;
    render(&graph, ctx.params.output)
}

async fn handle_distribution(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, String)>,
    ctx: RequestContext,
) -> Result<Response> {
    let index: usize = index.parse().map_err(|_| {
        CatalogueError::UpstreamNotFound(format!("artefact {id} has no distribution '{index}'"))
    })?;
    let graph = state.catalogue.distribution(&ctx.links, &id, index).await?;
    render(&graph, ctx.params.output)
}

async fn handle_resources(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Result<Response> {
    let graph = state
        .catalogue
        .resources(&ctx.links, &id, ctx.params.paging)
        .await?;
    render(&graph, ctx.params.output)
}

/// Only the `latest` distribution exists; its resources are the artefact's resources.
async fn handle_latest_resources(
    State(state): State<AppState>,
    Path((id, version)): Path<(String, String)>,
    ctx: RequestContext,
) -> Result<Response> {
    if version != "latest" {
        return Err(CatalogueError::UpstreamNotFound(format!(
            "artefact {id} has no distribution '{version}'"
        )));
    }
    let graph = state
        .catalogue
        .resources(&ctx.links, &id, ctx.params.paging)
        .await?;
    render(&graph, ctx.params.output)
}

/// `/artefacts/{id}/resources/{segment}`: a typed sub-collection when `segment` names one,
/// otherwise a single resource whose percent-encoded IRI is `segment`.
async fn handle_resource_segment(
    State(state): State<AppState>,
    Path((id, segment)): Path<(String, String)>,
    ctx: RequestContext,
) -> Result<Response> {
    match ResourceKind::from_segment(&segment) {
        Some(kind) => {
            let graph = state
                .catalogue
                .typed_resources(&ctx.links, &id, kind, ctx.params.paging)
                .await?;
            render(&graph, ctx.params.output)
        }
        None => {
            let fetched = state
                .catalogue
                .resource(&id, &segment, ctx.params.upstream_format)
                .await?;
            if let Some(upstream_type) = &fetched.content_type {
                info!("Passing through {segment} ({upstream_type})");
            }
            let content_type = ctx.params.output.content_type();
            Ok(([(CONTENT_TYPE, content_type)], fetched.body).into_response())
        }
    }
}

async fn handle_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Result<Response> {
    let graph = state.catalogue.record(&ctx.links, &id).await?;
    render(&graph, ctx.params.output)
}

async fn handle_records(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response> {
    let graph = state
        .catalogue
        .records(&ctx.links, ctx.params.paging)
        .await?;
    render(&graph, ctx.params.output)
}

async fn handle_search_content(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response> {
    let graph = state
        .catalogue
        .search_content(&ctx.links, ctx.q(), ctx.params.paging)
        .await?;
    render(&graph, ctx.params.output)
}

async fn handle_search_metadata(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response> {
    let graph = state
        .catalogue
        .search_metadata(&ctx.links, ctx.q(), ctx.params.paging)
        .await?;
    render(&graph, ctx.params.output)
}

pub fn create_router(state: AppState) -> Router {
    let cors = state.catalogue.config().cors;
    let app = Router::new()
        .route("/", get(handle_catalogue))
        .route("/artefacts", get(handle_artefacts))
        .route("/artefacts/{id}", get(handle_artefact))
        .route("/artefacts/{id}/record", get(handle_record))
        .route("/artefacts/{id}/distributions", get(handle_distributions))
        .route(
            "/artefacts/{id}/distributions/{version}/resources",
            get(handle_latest_resources),
        )
        .route(
            "/artefacts/{id}/distributions/{index}",
            get(handle_distribution),
        )
        .route("/artefacts/{id}/resources", get(handle_resources))
        .route(
            "/artefacts/{id}/resources/{segment}",
            get(handle_resource_segment),
        )
        .route("/records", get(handle_records))
        .route("/records/{id}", get(handle_record))
        .route("/search", get(handle_search_content))
        .route("/search/content", get(handle_search_content))
        .route("/search/metadata", get(handle_search_metadata))
        .with_state(state);

    if cors {
        app.layer(tower_http::cors::CorsLayer::permissive())
    } else {
        app
    }
}

/// Serves the catalogue on `config.bind` until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    info!("Proxying {} at {addr}", config.upstream);
    let app = create_router(AppState::new(Catalogue::from_config(config)?));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
