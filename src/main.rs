use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod activity;
mod config;
mod error;
mod export;
mod import;
mod lookup;
mod models;
mod projections;
mod store;

#[cfg(test)]
mod tests;

use activity::parse_activity;
use config::Config;
use error::AppError;
use lookup::LookupKind;
use models::{ActivityQuery, ApiResponse, Booking, BookingInput, MonthlySchedule, ParsedActivity, ScheduleTable};
use projections::{build_monthly_schedule, parse_period};
use store::{BookingStore, StoreError};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Booking schedule HTTP API.
/// Bookings are stored raw; names, activity facts and schedules are
/// derived on every read.
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<BookingStore>>,
}

impl AppState {
    fn new(store: BookingStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` against the shared store on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&mut BookingStore) -> Result<T, AppError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut guard = store
                .lock()
                .map_err(|_| AppError::Internal("booking store lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = Config::from_env();
    let store = BookingStore::open(&config.db_path)?;
    info!(db = %config.db_path.display(), "booking store ready");

    let app = app(AppState::new(store));

    let addr = config.addr();
    info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/bookings", post(create_booking))
        .route("/bookings", get(list_bookings))
        .route("/import/bookings", post(import_bookings))
        .route("/import/lookups/:kind", post(import_lookup))
        .route("/activity/parse", post(handle_parse))
        .route("/schedule/:year/:month", get(get_schedule))
        .route("/schedule/:year/:month/table", get(get_schedule_table))
        .route("/schedule/:year/:month/csv", get(get_schedule_csv))
        .route("/schedule/:year/:month/xlsx", get(get_schedule_xlsx))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Dive Schedule API v0.1.0"
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Store one booking row and return it enriched
async fn create_booking(
    State(state): State<AppState>,
    Json(input): Json<BookingInput>,
) -> Result<Json<ApiResponse>, AppError> {
    let (booking, imported_at) = state
        .with_store(move |store| {
            let id = store.insert_booking(&input)?;
            let booking = store.resolver()?.enrich(Some(id), &input);
            Ok((booking, store.imported_at(id)?))
        })
        .await?;

    info!(id = ?booking.id, guest = %booking.guest_key(), activity = %booking.activity_type, "booking stored");

    Ok(Json(ApiResponse::success(
        format!("Booking stored: {}", booking.guest_key().trim()),
        serde_json::json!({
            "booking": booking,
            "imported_at": imported_at.map(|t| t.to_rfc3339()),
        }),
    )))
}

/// List all bookings (resolved)
async fn list_bookings(State(state): State<AppState>) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state.with_store(|store| Ok(store.bookings()?)).await?;
    Ok(Json(bookings))
}

/// Bulk import of a booking export (CSV body)
async fn import_bookings(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ApiResponse>, AppError> {
    let rows = import::read_bookings(body.as_bytes())?;
    let count = state
        .with_store(move |store| Ok(store.insert_bookings(&rows)?))
        .await?;
    info!(count, "booking export imported");

    Ok(Json(ApiResponse::success(
        format!("Imported {} bookings", count),
        serde_json::json!({ "imported": count }),
    )))
}

/// Replace one lookup table from a CSV body
async fn import_lookup(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: String,
) -> Result<Json<ApiResponse>, AppError> {
    let kind = LookupKind::from_slug(&kind).ok_or(StoreError::UnknownLookup(kind))?;
    let entries = import::read_lookup(kind, body.as_bytes())?;
    if entries.is_empty() {
        return Err(AppError::BadRequest(format!(
            "no entries found for {}",
            kind.slug()
        )));
    }

    let (count, distinct) = state
        .with_store(move |store| {
            let count = store.replace_lookup(kind, &entries)?;
            Ok((count, store.lookup_table(kind)?.len()))
        })
        .await?;
    info!(table = kind.table_name(), count, distinct, "lookup table replaced");

    Ok(Json(ApiResponse::success(
        format!("Imported {} {}", count, kind.slug()),
        serde_json::json!({ "imported": count, "distinct": distinct }),
    )))
}

async fn handle_parse(Json(query): Json<ActivityQuery>) -> Json<ParsedActivity> {
    Json(parse_activity(query.code.as_deref()))
}

async fn schedule_for(
    state: &AppState,
    year: &str,
    month: &str,
) -> Result<MonthlySchedule, AppError> {
    let (year, month) = parse_period(year, month)?;
    let bookings = state.with_store(|store| Ok(store.bookings()?)).await?;
    let schedule = build_monthly_schedule(&bookings, year, month)?;
    info!(year, month, guests = schedule.guests.len(), "schedule built");
    Ok(schedule)
}

async fn get_schedule(
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
) -> Result<Json<MonthlySchedule>, AppError> {
    Ok(Json(schedule_for(&state, &year, &month).await?))
}

async fn get_schedule_table(
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
) -> Result<Json<ScheduleTable>, AppError> {
    Ok(Json(schedule_for(&state, &year, &month).await?.to_table()))
}

async fn get_schedule_csv(
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let table = schedule_for(&state, &year, &month).await?.to_table();
    let body = export::schedule_csv_string(&table)?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body))
}

async fn get_schedule_xlsx(
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let schedule = schedule_for(&state, &year, &month).await?;
    let body = export::write_schedule_xlsx(&schedule.to_table())?;
    let disposition = format!(
        "attachment; filename=\"diving-schedule-{}-{:02}.xlsx\"",
        schedule.year, schedule.month
    );
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
