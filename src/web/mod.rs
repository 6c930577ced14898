//! # Companion endpoint
//!
//! Read-only HTTP view of a user's reminders for a companion display, plus a
//! health probe. Every reminder route requires `Authorization: Bearer <token>`.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.2.0
//! - **Toggleable**: true (enabled by `COMPANION_ADDR`)

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use log::{error, info};
use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::features::reminders::{ChatId, Reminder, ReminderRepository};

#[derive(Clone)]
pub struct CompanionState {
    repository: Arc<dyn ReminderRepository>,
    token: Arc<str>,
}

impl CompanionState {
    pub fn new(repository: Arc<dyn ReminderRepository>, token: &str) -> Self {
        Self {
            repository,
            token: Arc::from(token),
        }
    }
}

/// One reminder as the companion display sees it
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReminderView {
    pub id: i64,
    pub medicine: String,
    pub time: String,
    pub course_days: u32,
    pub doses_taken: u32,
}

impl From<&Reminder> for ReminderView {
    fn from(reminder: &Reminder) -> Self {
        Self {
            id: reminder.id,
            medicine: reminder.medicine.clone(),
            time: reminder.time_label(),
            course_days: reminder.course_days,
            doses_taken: reminder.doses_taken,
        }
    }
}

pub fn router(state: CompanionState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users/{id}/reminders", get(user_reminders))
        .with_state(state)
}

/// Serve the companion endpoint on `addr` until the process stops
pub async fn serve(addr: &str, state: CompanionState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("🌐 Companion endpoint listening on http://{local_addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn bearer_is_valid(headers: &HeaderMap, expected: &str) -> bool {
    let candidate = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();
    !expected.is_empty() && bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
}

async fn user_reminders(
    State(state): State<CompanionState>,
    headers: HeaderMap,
    Path(chat_id): Path<ChatId>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !bearer_is_valid(&headers, &state.token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "unauthorized" })),
        );
    }

    match state.repository.list_reminders(chat_id).await {
        Ok(reminders) => {
            let views: Vec<ReminderView> = reminders.iter().map(ReminderView::from).collect();
            (StatusCode::OK, Json(serde_json::json!({ "reminders": views })))
        }
        Err(e) => {
            error!("Companion lookup for {chat_id} failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "storage unavailable" })),
            )
        }
    }
}
