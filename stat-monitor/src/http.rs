/**
 * API HTTP - Surface de lecture du moniteur
 *
 * RÔLE : Expose en JSON le dernier état poussé dans le `DisplayBoard` par le
 * dispatcher. Lecture seule : aucune route ne modifie le store.
 *
 * ROUTES :
 * - /health              => "ok"
 * - /status              => texte de connexion + compteurs d'ingestion
 * - /display             => toutes les sections batterie + panneau système
 * - /display/{source}    => une section ("Daly BMS", "Unified Battery"...)
 * - /system              => panneau système
 */

use crate::connection::{ConnectionTracker, IngestStats};
use crate::display::{ConnectionDisplay, DisplayModel, SystemDisplayModel};
use crate::models::SourceId;
use crate::sink::{BoardView, DisplayBoard};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Clone)]
pub struct AppState {
    pub board: DisplayBoard,
    pub connection: ConnectionTracker,
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub connection: Option<ConnectionDisplay>,
    pub stats: IngestStats,
    pub sources: Vec<SourceId>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(get_status))
        .route("/display", get(get_display))
        .route("/display/{source}", get(get_source))
        .route("/system", get(get_system))
        .with_state(app_state)
}

// GET /status
async fn get_status(State(app): State<AppState>) -> Json<StatusView> {
    Json(StatusView {
        connection: app.board.connection(),
        stats: app.connection.stats(),
        sources: app.board.allocated(),
    })
}

// GET /display
async fn get_display(State(app): State<AppState>) -> Json<BoardView> {
    Json(app.board.view())
}

// GET /display/{source}
async fn get_source(
    State(app): State<AppState>,
    Path(source): Path<String>,
) -> Result<Json<DisplayModel>, StatusCode> {
    let id = SourceId::from_name(&source).ok_or(StatusCode::NOT_FOUND)?;
    app.board.section(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

// GET /system
async fn get_system(State(app): State<AppState>) -> Result<Json<SystemDisplayModel>, StatusCode> {
    app.board.system().map(Json).ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{source_model, system_model};
    use crate::models::{Fields, SourceState};
    use crate::sink::PresentationSink;
    use time::OffsetDateTime;

    fn app() -> AppState {
        AppState { board: DisplayBoard::new(), connection: ConnectionTracker::new() }
    }

    #[tokio::test]
    async fn unknown_or_unrendered_source_is_404() {
        let app = app();
        let err = get_source(State(app.clone()), Path("Victron".into())).await.unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);

        let err = get_source(State(app), Path("Daly BMS".into())).await.unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rendered_source_is_served_by_name() {
        let app = app();
        let state = SourceState::new(SourceId::DalyBms, OffsetDateTime::now_utc());
        app.board.allocate_section(SourceId::DalyBms).unwrap();
        app.board.render_source(&source_model(&state)).unwrap();

        let Json(model) = get_source(State(app.clone()), Path("Daly BMS".into())).await.unwrap();
        assert_eq!(model.caption, "Daly BMS");

        let Json(view) = get_display(State(app)).await;
        assert_eq!(view.sections.len(), 1);
        assert!(view.system.is_none());
    }

    #[tokio::test]
    async fn status_reports_counters() {
        let app = app();
        app.connection.record_message(OffsetDateTime::now_utc());
        app.connection.record_decode_failure();

        let Json(status) = get_status(State(app)).await;
        assert_eq!(status.stats.messages_received, 1);
        assert_eq!(status.stats.decode_failures, 1);
        assert!(status.connection.is_none());
        assert!(status.sources.is_empty());
    }

    #[tokio::test]
    async fn system_panel_after_first_render() {
        let app = app();
        assert_eq!(get_system(State(app.clone())).await.unwrap_err(), StatusCode::NOT_FOUND);

        app.board.render_system(&system_model(&Fields::new())).unwrap();
        let Json(system) = get_system(State(app)).await.unwrap();
        assert_eq!(system.memory_text, "0.0%");
    }
}
