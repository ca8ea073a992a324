//! Integration tests for regalo-srv API endpoints
//!
//! Tests cover:
//! - Health and build info
//! - Session creation, identity reuse and load failures
//! - Phase triggers and their 409 rejections
//! - Share payload and failure reporting
//! - SSE snapshot, lag resync and session cleanup on disconnect
//! - Media fallback

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use helpers::*;
use http_body_util::BodyExt;
use chrono::{TimeZone, Utc};
use regalo_common::events::{CountdownData, RevealEvent};
use regalo_common::time::{FixedClock, SystemClock};
use regalo_srv::config::{CatalogMissPolicy, VariantPolicy};
use regalo_srv::reveal::Gate;
use regalo_srv::engine::EngineConfig;
use regalo_srv::error::{MSG_CONNECTION_PROBLEM, MSG_CONNECTION_RETRY};
use regalo_srv::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method
use uuid::Uuid;

/// Test helper: app over a fresh database holding phrase 7
async fn setup_app(phrase_draws: &[i64]) -> (TestDb, Router) {
    let db = test_db(&[(7, "Sueña en grande")]).await;
    let settings = fast_settings(VariantPolicy::DerivedFromPhraseId, CatalogMissPolicy::Fallback);
    let state = app_state(
        &db,
        Arc::new(ScriptedDraw::new(phrase_draws, &[0])),
        settings,
        Arc::new(SystemClock),
    );
    let app = build_router(state, db.dir.path());
    (db, app)
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// POST /api/sessions and return the view
async fn create_session(app: &Router, identity: Option<&str>) -> Value {
    let body = match identity {
        Some(id) => json!({ "identity": id }),
        None => json!({}),
    };
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/sessions", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    extract_json(response.into_body()).await
}

async fn session_phase(app: &Router, session_id: &str) -> String {
    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/sessions/{}", session_id)))
        .await
        .unwrap();
    let view = extract_json(response.into_body()).await;
    view["phase"].as_str().unwrap_or_default().to_string()
}

// =============================================================================
// Health / build info
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (_db, app) = setup_app(&[7]).await;

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "regalo-srv");
    assert_eq!(body["active_sessions"], 0);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_buildinfo_endpoint() {
    let (_db, app) = setup_app(&[7]).await;

    let response = app.oneshot(test_request("GET", "/api/buildinfo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert!(body["version"].is_string());
    assert!(body["git_hash"].is_string());
}

#[tokio::test]
async fn test_index_page_served() {
    let (_db, app) = setup_app(&[7]).await;

    let response = app.oneshot(test_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("<html"));
}

// =============================================================================
// Session creation
// =============================================================================

#[tokio::test]
async fn test_create_session_lands_in_idle_with_variant() {
    let (_db, app) = setup_app(&[7]).await;

    let view = create_session(&app, None).await;
    assert_eq!(view["phase"], "idle");
    assert_eq!(view["card_image"], "/Carta.png");
    assert_eq!(view["variant"]["name"], "Vino");
    assert_eq!(view["variant"]["video_asset_path"], "/Vino.mov");
    assert_eq!(view["origin"], "created");
    assert!(view["identity"].is_string());
    // Phrase stays hidden until revealed
    assert!(view["phrase"].is_null());
    assert!(view["error"].is_null());
}

#[tokio::test]
async fn test_returning_identity_gets_same_assignment() {
    let (_db, app) = setup_app(&[7]).await;

    let first = create_session(&app, None).await;
    let identity = first["identity"].as_str().unwrap().to_string();

    let second = create_session(&app, Some(&identity)).await;
    assert_eq!(second["identity"], identity.as_str());
    assert_eq!(second["origin"], "existing");
    assert_eq!(second["variant"], first["variant"]);
    assert_ne!(second["session_id"], first["session_id"]);
}

#[tokio::test]
async fn test_unknown_identity_token_gets_fresh_identity() {
    let (_db, app) = setup_app(&[7]).await;

    let view = create_session(&app, Some("not-a-known-token")).await;
    assert_eq!(view["phase"], "idle");
    assert_ne!(view["identity"], "not-a-known-token");
}

#[tokio::test]
async fn test_catalog_miss_strict_reports_error_phase() {
    let db = test_db(&[(7, "Sueña en grande")]).await;
    let settings = fast_settings(VariantPolicy::DerivedFromPhraseId, CatalogMissPolicy::Fail);
    let state = app_state(
        &db,
        Arc::new(ScriptedDraw::new(&[12], &[0])),
        settings,
        Arc::new(SystemClock),
    );
    let app = build_router(state, db.dir.path());

    let view = create_session(&app, None).await;
    assert_eq!(view["phase"], "error");
    assert_eq!(view["error"], MSG_CONNECTION_RETRY);
    assert!(view["variant"].is_null());
}

#[tokio::test]
async fn test_identity_failure_reports_error_phase() {
    let db = test_db(&[(7, "Sueña en grande")]).await;
    let settings = fast_settings(VariantPolicy::DerivedFromPhraseId, CatalogMissPolicy::Fallback);
    let engine = Arc::new(scripted_engine(
        &db.pool,
        Arc::new(ScriptedDraw::new(&[7], &[0])),
        EngineConfig::from(&settings),
    ));
    let state = AppState::new(engine, Arc::new(DownIdentityProvider), settings, Arc::new(SystemClock));
    let app = build_router(state, db.dir.path());

    let view = create_session(&app, None).await;
    assert_eq!(view["phase"], "error");
    assert_eq!(view["error"], MSG_CONNECTION_PROBLEM);
    assert!(view["identity"].is_null());
}

// =============================================================================
// Phase triggers
// =============================================================================

#[tokio::test]
async fn test_full_reveal_over_http() {
    let (_db, app) = setup_app(&[7]).await;
    let view = create_session(&app, None).await;
    let id = view["session_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(test_request("POST", &format!("/api/sessions/{}/open", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["from"], "idle");
    assert_eq!(body["to"], "opening");

    let playing = eventually(Duration::from_secs(2), || {
        let app = app.clone();
        let id = id.clone();
        async move { session_phase(&app, &id).await == "playing" }
    })
    .await;
    assert!(playing, "opening beat should move the session to playing");

    let response = app
        .clone()
        .oneshot(test_request("POST", &format!("/api/sessions/{}/video-ended", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["to"], "revealed");
    assert_eq!(body["view"]["phrase"], "Sueña en grande");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{}/share", id),
            json!({ "url": "https://regalo.example/" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let share = extract_json(response.into_body()).await;
    assert_eq!(share["title"], "D8 Creative 2026");
    assert!(share["text"].as_str().unwrap().contains("Sueña en grande"));
    assert!(share["clipboard_text"]
        .as_str()
        .unwrap()
        .ends_with("https://regalo.example/"));
}

#[tokio::test]
async fn test_second_open_is_rejected() {
    let (_db, app) = setup_app(&[7]).await;
    let view = create_session(&app, None).await;
    let id = view["session_id"].as_str().unwrap().to_string();
    let uri = format!("/api/sessions/{}/open", id);

    let response = app.clone().oneshot(test_request("POST", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(test_request("POST", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_video_ended_before_playing_is_rejected() {
    let (_db, app) = setup_app(&[7]).await;
    let view = create_session(&app, None).await;
    let id = view["session_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(test_request("POST", &format!("/api/sessions/{}/video-ended", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(session_phase(&app, &id).await, "idle");
}

#[tokio::test]
async fn test_share_before_reveal_is_rejected() {
    let (_db, app) = setup_app(&[7]).await;
    let view = create_session(&app, None).await;
    let id = view["session_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{}/share", id),
            json!({ "url": "https://regalo.example/" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_share_failure_report_accepted() {
    let (_db, app) = setup_app(&[7]).await;
    let view = create_session(&app, None).await;
    let id = view["session_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{}/share-failed", id),
            json!({ "reason": "NotAllowedError" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(session_phase(&app, &id).await, "idle");
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_unknown_session_returns_404() {
    let (_db, app) = setup_app(&[7]).await;
    let uri = format!("/api/sessions/{}", uuid::Uuid::new_v4());

    let response = app.clone().oneshot(test_request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(test_request("POST", &format!("{}/open", uri)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_end_session_removes_it() {
    let (_db, app) = setup_app(&[7]).await;
    let view = create_session(&app, None).await;
    let uri = format!("/api/sessions/{}", view["session_id"].as_str().unwrap());

    let response = app.clone().oneshot(test_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(test_request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(test_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_stream_starts_with_snapshot() {
    let (_db, app) = setup_app(&[7]).await;
    let view = create_session(&app, None).await;
    let id = view["session_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/sessions/{}/events", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("snapshot should arrive promptly")
        .expect("stream should not end")
        .expect("frame should be readable");
    let text = String::from_utf8_lossy(frame.data_ref().expect("data frame")).to_string();
    assert!(text.contains("event: SessionView"));
    assert!(text.contains(id));
}

/// Read SSE frames until one contains every needle
async fn read_until(body: &mut Body, needles: &[&str], max_frames: usize) -> Option<String> {
    for _ in 0..max_frames {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .ok()??
            .ok()?;
        let Some(data) = frame.data_ref() else {
            continue;
        };
        let text = String::from_utf8_lossy(data).to_string();
        if needles.iter().all(|n| text.contains(n)) {
            return Some(text);
        }
    }
    None
}

#[tokio::test]
async fn test_disconnected_streams_release_gated_sessions() {
    let db = test_db(&[(7, "Sueña en grande")]).await;
    let target = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut settings = fast_settings(VariantPolicy::DerivedFromPhraseId, CatalogMissPolicy::Fallback);
    settings.gate = Gate::UntilInstant(target);
    let state = app_state(
        &db,
        Arc::new(ScriptedDraw::new(&[7], &[0])),
        settings,
        Arc::new(FixedClock::new(target - chrono::Duration::days(3))),
    );
    let registry = state.sessions.clone();
    let app = build_router(state, db.dir.path());

    let mut sessions = Vec::new();
    for _ in 0..10 {
        let view = create_session(&app, None).await;
        assert_eq!(view["phase"], "waiting");
        let id: Uuid = view["session_id"].as_str().unwrap().parse().unwrap();

        let response = app
            .clone()
            .oneshot(test_request("GET", &format!("/api/sessions/{}/events", id)))
            .await
            .unwrap();
        let mut body = response.into_body();
        assert!(read_until(&mut body, &["event: SessionView"], 1).await.is_some());

        let session = registry.get(id).await.unwrap();
        assert!(session.countdown_running());
        sessions.push(session);
        // Tab closed
        drop(body);
    }

    let released = eventually(Duration::from_secs(3), || {
        let registry = registry.clone();
        async move { registry.len().await == 0 }
    })
    .await;
    assert!(released, "sessions should leave once their streams are gone");
    assert!(sessions.iter().all(|s| !s.countdown_running()));

    let response = app.clone().oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(extract_json(response.into_body()).await["active_sessions"], 0);

    let response = app
        .oneshot(test_request(
            "GET",
            &format!("/api/sessions/{}", sessions[0].id()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lagging_stream_gets_fresh_view_with_pending_effect() {
    let db = test_db(&[(7, "Sueña en grande")]).await;
    let mut settings = fast_settings(VariantPolicy::DerivedFromPhraseId, CatalogMissPolicy::Fallback);
    // Keep the session in Opening while we look
    settings.opening_delay = Duration::from_secs(10);
    let state = app_state(
        &db,
        Arc::new(ScriptedDraw::new(&[7], &[0])),
        settings,
        Arc::new(SystemClock),
    );
    let events = state.events.clone();
    let app = build_router(state, db.dir.path());

    let view = create_session(&app, None).await;
    let id = view["session_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/sessions/{}/events", id)))
        .await
        .unwrap();
    let mut body = response.into_body();
    assert!(read_until(&mut body, &["event: SessionView", "\"phase\":\"idle\""], 1)
        .await
        .is_some());

    let response = app
        .clone()
        .oneshot(test_request("POST", &format!("/api/sessions/{}/open", id)))
        .await
        .unwrap();
    assert!(response.status().is_success());

    // Other visitors' traffic overruns this client's buffer
    for _ in 0..300 {
        events.emit_lossy(RevealEvent::CountdownTick {
            session_id: Uuid::new_v4(),
            remaining: CountdownData {
                days: 0,
                hours: 0,
                minutes: 0,
                seconds: 5,
            },
            timestamp: Utc::now(),
        });
    }

    let resync = read_until(
        &mut body,
        &[
            "event: SessionView",
            "\"phase\":\"opening\"",
            "\"kind\":\"flourish\"",
        ],
        5,
    )
    .await;
    assert!(resync.is_some(), "lagged client should be resent the current view");
}

#[tokio::test]
async fn test_media_served_from_root_folder() {
    let (db, app) = setup_app(&[7]).await;
    std::fs::write(db.dir.path().join("Carta.png"), b"png-bytes").unwrap();

    let response = app.clone().oneshot(test_request("GET", "/Carta.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(test_request("GET", "/Missing.mov")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
