//! HTTP API handlers for regalo-srv

pub mod buildinfo;
pub mod health;
pub mod sessions;
pub mod sse;
pub mod ui;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use sessions::{
    create_session, end_session, get_session, open_gift, report_share_failure, share_phrase,
    video_ended,
};
pub use sse::event_stream;
pub use ui::{serve_app_js, serve_index};
