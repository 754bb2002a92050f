use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::workflows::arrears::{DebtorRecord, RawRow};

use super::clock::Clock;
use super::domain::{
    BalanceUpdate, LetterFilter, LetterRequest, NewProperty, Period, PropertyUpdate,
};
use super::repository::{CollectionsStore, RepositoryError};
use super::service::{
    parse_channel, parse_letter_type, parse_status, CollectionsError, CollectionsService,
};

type SharedService<S, C> = State<Arc<CollectionsService<S, C>>>;

/// Router builder exposing the property, snapshot, ledger and analytics endpoints.
pub fn collections_router<S, C>(service: Arc<CollectionsService<S, C>>) -> Router
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route(
            "/api/v1/properties",
            post(create_property_handler::<S, C>).get(list_properties_handler::<S, C>),
        )
        .route(
            "/api/v1/properties/:property_id",
            get(get_property_handler::<S, C>)
                .put(update_property_handler::<S, C>)
                .delete(delete_property_handler::<S, C>),
        )
        .route(
            "/api/v1/properties/:property_id/imports/preview",
            post(preview_handler::<S, C>),
        )
        .route(
            "/api/v1/properties/:property_id/reports",
            post(ingest_handler::<S, C>).get(list_reports_handler::<S, C>),
        )
        .route(
            "/api/v1/properties/:property_id/reports/:period",
            get(get_report_handler::<S, C>),
        )
        .route("/api/v1/reports/:report_id", delete(delete_report_handler::<S, C>))
        .route(
            "/api/v1/balances/:balance_id",
            put(update_balance_handler::<S, C>).delete(delete_balance_handler::<S, C>),
        )
        .route(
            "/api/v1/properties/:property_id/letters",
            get(list_letters_handler::<S, C>)
                .post(generate_letter_handler::<S, C>)
                .delete(reset_letters_handler::<S, C>),
        )
        .route(
            "/api/v1/properties/:property_id/letters/next/:letter_type",
            get(next_consecutive_handler::<S, C>),
        )
        .route(
            "/api/v1/properties/:property_id/letters/bulk",
            post(bulk_letters_handler::<S, C>),
        )
        .route(
            "/api/v1/letters/:letter_id",
            delete(delete_letter_handler::<S, C>),
        )
        .route(
            "/api/v1/letters/:letter_id/status",
            put(letter_status_handler::<S, C>),
        )
        .route(
            "/api/v1/letters/:letter_id/follow-up",
            put(letter_follow_up_handler::<S, C>),
        )
        .route(
            "/api/v1/properties/:property_id/effectiveness",
            get(effectiveness_handler::<S, C>),
        )
        .route(
            "/api/v1/properties/:property_id/comparison",
            get(comparison_handler::<S, C>),
        )
        .with_state(service)
}

/// Rows to stage or store. `csv` takes precedence over `rows`; `debtors` skips
/// normalization and is only honoured on confirm.
#[derive(Debug, Deserialize)]
pub struct ImportPayload {
    pub period: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub rows: Vec<RawRow>,
    #[serde(default)]
    pub csv: Option<String>,
    #[serde(default)]
    pub debtors: Option<Vec<DebtorRecord>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LetterQuery {
    pub unit: Option<String>,
    pub letter_type: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkPayload {
    pub period: String,
    #[serde(default)]
    pub letter_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    pub status: String,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FollowUpPayload {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub payment_commitment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComparisonQuery {
    pub base: String,
    pub compare: String,
}

pub(crate) async fn create_property_handler<S, C>(
    State(service): SharedService<S, C>,
    Json(payload): Json<NewProperty>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| service.create_property(payload)).await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_properties_handler<S, C>(State(service): SharedService<S, C>) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, |service| service.list_properties()).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn get_property_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| service.get_property(&property_id)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn update_property_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
    Json(payload): Json<PropertyUpdate>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        service.update_property(&property_id, payload)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_property_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    no_content(run_blocking(service, move |service| service.delete_property(&property_id)).await)
}

pub(crate) async fn preview_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
    Json(payload): Json<ImportPayload>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        let period = Period::parse(&payload.period)?;
        match &payload.csv {
            Some(csv) => service.preview_csv(&property_id, &period, csv.as_bytes()),
            None => service.preview(&property_id, &period, &payload.rows),
        }
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn ingest_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
    Json(payload): Json<ImportPayload>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let ImportPayload {
        period,
        label,
        rows,
        csv,
        debtors,
    } = payload;

    let result = run_blocking(service, move |service| {
        let period = Period::parse(&period)?;
        let label = label.as_deref();
        match (csv, debtors) {
            (Some(csv), _) => service.ingest_csv(&property_id, &period, label, csv.as_bytes()),
            (None, Some(debtors)) => service.ingest(&property_id, &period, label, debtors),
            (None, None) => service.ingest_rows(&property_id, &period, label, &rows),
        }
    })
    .await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_reports_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| service.list_reports(&property_id)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn get_report_handler<S, C>(
    State(service): SharedService<S, C>,
    Path((property_id, period)): Path<(String, String)>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        service.get_report(&property_id, &Period::parse(&period)?)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_report_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(report_id): Path<String>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    no_content(run_blocking(service, move |service| service.delete_report(&report_id)).await)
}

pub(crate) async fn update_balance_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(balance_id): Path<String>,
    Json(payload): Json<BalanceUpdate>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        service.update_balance(&balance_id, payload)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_balance_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(balance_id): Path<String>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    no_content(run_blocking(service, move |service| service.delete_balance(&balance_id)).await)
}

pub(crate) async fn list_letters_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
    Query(query): Query<LetterQuery>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        service.list_letters(&property_id, &letter_filter(query)?)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn generate_letter_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
    Json(request): Json<LetterRequest>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        service.generate_letter(&property_id, request)
    })
    .await;
    match result {
        Ok(issued) if issued.created => (StatusCode::CREATED, Json(issued)).into_response(),
        Ok(issued) => (StatusCode::OK, Json(issued)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reset_letters_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| service.reset_letters(&property_id))
        .await
        .map(|removed| json!({ "removed": removed }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn next_consecutive_handler<S, C>(
    State(service): SharedService<S, C>,
    Path((property_id, letter_type)): Path<(String, String)>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        let letter_type = parse_letter_type(&letter_type)?;
        service
            .next_consecutive(&property_id, letter_type)
            .map(|consecutive| json!({ "letter_type": letter_type, "consecutive": consecutive }))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn bulk_letters_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
    Json(payload): Json<BulkPayload>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        let period = Period::parse(&payload.period)?;
        let letter_types = payload
            .letter_types
            .iter()
            .map(|raw| parse_letter_type(raw))
            .collect::<Result<Vec<_>, _>>()?;
        service.generate_bulk(&property_id, &period, &letter_types)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_letter_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(letter_id): Path<String>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    no_content(run_blocking(service, move |service| service.delete_letter(&letter_id)).await)
}

pub(crate) async fn letter_status_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(letter_id): Path<String>,
    Json(payload): Json<StatusPayload>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        let status = parse_status(&payload.status)?;
        let channel = payload.channel.as_deref().map(parse_channel).transpose()?;
        service.update_status(&letter_id, status, channel)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn letter_follow_up_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(letter_id): Path<String>,
    Json(payload): Json<FollowUpPayload>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        service.update_follow_up(&letter_id, payload.notes, payload.payment_commitment)
    })
    .await;
    respond(StatusCode::OK, result)
}

/// Responds `null` until the property has reports for two periods.
pub(crate) async fn effectiveness_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| service.effectiveness(&property_id)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn comparison_handler<S, C>(
    State(service): SharedService<S, C>,
    Path(property_id): Path<String>,
    Query(query): Query<ComparisonQuery>,
) -> Response
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    let result = run_blocking(service, move |service| {
        let base = Period::parse(&query.base)?;
        let compare = Period::parse(&query.compare)?;
        service.compare(&property_id, &base, &compare)
    })
    .await;
    respond(StatusCode::OK, result)
}

/// Runs a service call on the blocking pool; store calls may wait on the SQLite
/// write lock for up to the configured busy timeout.
async fn run_blocking<S, C, T, F>(
    service: Arc<CollectionsService<S, C>>,
    work: F,
) -> Result<T, CollectionsError>
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
    T: Send + 'static,
    F: FnOnce(&CollectionsService<S, C>) -> Result<T, CollectionsError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&service))
        .await
        .map_err(|err| CollectionsError::Worker(err.to_string()))?
}

fn letter_filter(query: LetterQuery) -> Result<LetterFilter, CollectionsError> {
    Ok(LetterFilter {
        unit: query.unit.filter(|unit| !unit.trim().is_empty()),
        letter_type: query
            .letter_type
            .as_deref()
            .map(parse_letter_type)
            .transpose()?,
        period: query.period.as_deref().map(Period::parse).transpose()?,
    })
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, CollectionsError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

fn no_content(result: Result<(), CollectionsError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn error_response(error: CollectionsError) -> Response {
    let status = match &error {
        error if error.is_not_found() => StatusCode::NOT_FOUND,
        error if error.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
        CollectionsError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
        CollectionsError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %error, "collections request failed");
    }

    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}
