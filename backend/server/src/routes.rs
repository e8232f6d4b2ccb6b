use std::{collections::HashSet, sync::Arc};

use axum::{
    Form, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sheets::records::{AttendanceSummary, PaymentSheet, PlayerDetail};
use tracing::info;

use crate::{
    auth::{Admin, Session},
    error::{ActionError, AppError},
    state::AppState,
    utils::{logout_cookie, session_cookie, string_or_number},
};

#[derive(Deserialize)]
pub struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct PaymentUpdate {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    month: String,
    status: bool,
}

#[derive(Deserialize)]
pub struct AttendanceSubmission {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
pub struct NameQuery {
    name: Option<String>,
}

#[derive(Serialize)]
pub struct RosterEntry {
    id: String,
    name: String,
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let role = state
        .config
        .users
        .verify(&credentials.username, &credentials.password)
        .ok_or(AppError::InvalidCredentials)?;

    info!("{} logged in as {role:?}", credentials.username);

    let token = state.sessions.issue(&credentials.username, role)?;
    let cookie = session_cookie(token, state.sessions.ttl_seconds());

    Ok((
        jar.add(cookie),
        Json(json!({ "success": true, "user": credentials.username, "role": role })),
    ))
}

pub async fn logout_handler(jar: CookieJar) -> impl IntoResponse {
    (jar.add(logout_cookie()), Json(json!({ "success": true })))
}

pub async fn me_handler(session: Session) -> impl IntoResponse {
    Json(json!({
        "user": session.user,
        "role": session.role,
        "is_admin": session.is_admin(),
    }))
}

pub async fn health_handler() -> &'static str {
    "ok"
}

pub async fn payments_handler(
    _: Session,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PaymentSheet>, AppError> {
    Ok(Json(state.ledger.list_payments().await?))
}

pub async fn update_payment_handler(
    Admin(session): Admin,
    State(state): State<Arc<AppState>>,
    Json(update): Json<PaymentUpdate>,
) -> Result<impl IntoResponse, ActionError> {
    state
        .ledger
        .set_payment(&update.id, &update.month, update.status)
        .await?;

    info!("{} set payment {} {} to {}", session.user, update.id, update.month, update.status);
    Ok(Json(json!({ "success": true })))
}

pub async fn roster_handler(
    _: Session,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RosterEntry>>, AppError> {
    let roster = state.ledger.list_roster().await?;

    Ok(Json(
        roster
            .into_iter()
            .map(|name| RosterEntry {
                id: name.clone(),
                name,
            })
            .collect(),
    ))
}

pub async fn attendance_for_date_handler(
    _: Session,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let Some(date) = query.date.filter(|d| !d.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    Ok(Json(state.ledger.present_on(&date).await?))
}

pub async fn submit_attendance_handler(
    Admin(session): Admin,
    State(state): State<Arc<AppState>>,
    Json(submission): Json<AttendanceSubmission>,
) -> Result<impl IntoResponse, ActionError> {
    let date = submission
        .date
        .filter(|d| !d.is_empty())
        .ok_or(AppError::MissingParameter("No date provided"))?;

    let present: HashSet<String> = submission.ids.into_iter().collect();
    let outcome = state.ledger.submit_attendance(&date, &present).await?;

    info!(
        "{} saved attendance for {date}: {} present, column created: {}",
        session.user,
        present.len(),
        outcome.column_created
    );

    Ok(Json(json!({
        "success": true,
        "message": format!("Attendance saved for {date}"),
        "outcome": outcome,
    })))
}

pub async fn history_handler(
    _: Session,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AttendanceSummary>, AppError> {
    Ok(Json(state.ledger.history().await?))
}

pub async fn player_details_handler(
    _: Session,
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
) -> Result<Json<PlayerDetail>, AppError> {
    let name = query
        .name
        .filter(|n| !n.is_empty())
        .ok_or(AppError::MissingParameter("No name provided"))?;

    Ok(Json(state.ledger.player_detail(&name).await?))
}
