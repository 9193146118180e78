//! Embedded live dashboard page.

use axum::response::Html;

/// The dashboard document. Polls `/data` once per second.
pub const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");

/// Polling period of the dashboard, in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 1000;

/// Serve the dashboard.
pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}
