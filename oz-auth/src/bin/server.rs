//! Oz Demo Server
//!
//! HTTP server exposing the Oz endpoints over an in-memory store.

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use anyhow::{Context, Result};
use oz_auth::{
    config::{Settings, SettingsHandle},
    endpoints::{EntityMode, Endpoints, ReissuePayload, RsvpPayload},
    now_millis, Application, Grant, MemoryStore, OzError, Password, Request, Store,
};
use std::sync::Arc;
use tracing::info;

type OzEndpoints = Endpoints<MemoryStore>;

/// Main entry point
#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let settings = match std::env::var("OZ_CONFIG") {
        Ok(path) => Settings::load(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Settings::default(),
    };
    let password = Password::new(
        std::env::var("OZ_PASSWORD").context("OZ_PASSWORD must be set")?,
    )?;
    let bind = std::env::var("OZ_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let store = Arc::new(demo_store().await?);
    let endpoints = Endpoints::new(store, password, SettingsHandle::new(settings)?);

    info!("Starting Oz server on http://{}", bind);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(endpoints.clone()))
            .route("/health", web::get().to(health_check))
            .route("/oz/app", web::post().to(app_ticket))
            .route("/oz/rsvp", web::post().to(rsvp))
            .route("/oz/reissue", web::post().to(reissue))
            .route("/oz/grant/{grant}/rsvp", web::post().to(issue_rsvp))
            .route("/resource", web::get().to(resource))
            .route("/admin", web::get().to(admin))
    })
    .bind(&bind)?
    .run()
    .await?;

    Ok(())
}

/// Seed the store with a delegating client and a second application
async fn demo_store() -> Result<MemoryStore> {
    let store = MemoryStore::new();
    store
        .insert_app(
            Application::new("social", "social-secret", vec!["a".into(), "b".into()])?
                .with_delegation(),
        )
        .await;
    store
        .insert_app(Application::new("network", "network-secret", vec!["a".into()])?)
        .await;

    let grant = Grant::new("social", "john", now_millis() + 24 * 60 * 60 * 1000)?;
    info!(grant = %grant.id, "Seeded demo grant");
    store.insert_grant(grant, None).await;

    Ok(store)
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn app_ticket(
    endpoints: web::Data<OzEndpoints>,
    req: HttpRequest,
) -> Result<HttpResponse, OzError> {
    let ticket = endpoints.app(&Request::from(&req)).await?;
    Ok(HttpResponse::Ok().json(ticket))
}

async fn rsvp(
    endpoints: web::Data<OzEndpoints>,
    req: HttpRequest,
    payload: web::Json<RsvpPayload>,
) -> Result<HttpResponse, OzError> {
    let ticket = endpoints.rsvp(&Request::from(&req), &payload).await?;
    Ok(HttpResponse::Ok().json(ticket))
}

async fn reissue(
    endpoints: web::Data<OzEndpoints>,
    req: HttpRequest,
    payload: Option<web::Json<ReissuePayload>>,
) -> Result<HttpResponse, OzError> {
    let payload = payload.map(web::Json::into_inner).unwrap_or_default();
    let ticket = endpoints.reissue(&Request::from(&req), &payload).await?;
    Ok(HttpResponse::Ok().json(ticket))
}

/// Consent step, stands in for the user-facing approval page
async fn issue_rsvp(
    endpoints: web::Data<OzEndpoints>,
    path: web::Path<String>,
) -> Result<HttpResponse, OzError> {
    let (grant, _) = endpoints
        .store()
        .load_grant(&path.into_inner())
        .await?
        .ok_or_else(|| OzError::InvalidGrant("Grant not found".to_string()))?;
    let rsvp = endpoints.issue_rsvp(&grant).await?;
    Ok(HttpResponse::Ok().json(RsvpPayload { rsvp }))
}

async fn resource(
    endpoints: web::Data<OzEndpoints>,
    req: HttpRequest,
) -> Result<HttpResponse, OzError> {
    let (ticket, attributes) = endpoints
        .authenticate(&Request::from(&req), EntityMode::User)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "user": ticket.user,
        "app": ticket.app,
        "scope": ticket.scope,
        "ext": attributes.ext,
    })))
}

async fn admin(
    endpoints: web::Data<OzEndpoints>,
    req: HttpRequest,
) -> Result<HttpResponse, OzError> {
    let (ticket, _) = endpoints
        .authenticate(&Request::from(&req), EntityMode::App)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "app": ticket.app,
        "scope": ticket.scope,
    })))
}
