//! regalo-srv library - Gift reveal service
//!
//! Assigns each anonymous visitor one phrase and one video variant, exactly
//! once, and walks the visitor through the reveal phases over HTTP + SSE.

use axum::Router;
use regalo_common::events::EventBus;
use regalo_common::time::Clock;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod reveal;
pub mod session;
pub mod share;
pub mod variants;

pub use error::{Error, Result};

use config::GiftSettings;
use engine::AssignmentEngine;
use identity::IdentityProvider;
use session::{SessionRegistry, SessionTiming};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AssignmentEngine>,
    pub identities: Arc<dyn IdentityProvider>,
    pub sessions: Arc<SessionRegistry>,
    pub settings: Arc<GiftSettings>,
    pub events: EventBus,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        engine: Arc<AssignmentEngine>,
        identities: Arc<dyn IdentityProvider>,
        settings: GiftSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            identities,
            sessions: Arc::new(SessionRegistry::new()),
            settings: Arc::new(settings),
            events: EventBus::new(256),
            clock,
        }
    }

    /// Timers applied to new sessions
    pub fn timing(&self) -> SessionTiming {
        SessionTiming {
            opening_delay: self.settings.opening_delay,
            countdown_tick: self.settings.countdown_tick,
            stream_grace: self.settings.stream_grace,
        }
    }
}

/// Build application router
///
/// Anything not matched by a route is looked up in `media_dir`
/// (card image, variant videos and images).
pub fn build_router(state: AppState, media_dir: &Path) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/sessions", post(api::create_session))
        .route(
            "/api/sessions/:id",
            get(api::get_session).delete(api::end_session),
        )
        .route("/api/sessions/:id/open", post(api::open_gift))
        .route("/api/sessions/:id/video-ended", post(api::video_ended))
        .route("/api/sessions/:id/share", post(api::share_phrase))
        .route(
            "/api/sessions/:id/share-failed",
            post(api::report_share_failure),
        )
        .route("/api/sessions/:id/events", get(api::event_stream));

    let ui = Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .merge(api::health_routes());

    Router::new()
        .merge(api)
        .merge(ui)
        .fallback_service(ServeDir::new(media_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
