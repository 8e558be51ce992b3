use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::{ApiError, ErrorBody, ErrorContext};
use crate::models::*;
use crate::session_gate::{self, SessionVerifier};
use crate::study_service::StudyService;
use crate::views::{self, MonthRef, QuestionFilter};
use crate::{log_api_start, log_api_success};

#[derive(Clone)]
pub struct AppState {
    pub service: StudyService,
    pub session_verifier: Option<Arc<dyn SessionVerifier>>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

type ErrorResponse = (StatusCode, Json<ErrorBody>);

fn reject(error: ApiError, context: ErrorContext) -> ErrorResponse {
    error.to_response_with_context(context)
}

// GET /
async fn root() -> Json<Value> {
    Json(json!({
        "service": "jornada-academica",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /health
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.service.store_healthy().await {
        (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "database": "disconnected" })),
        )
    }
}

// GET /api/estudos
async fn list_studies(
    State(state): State<AppState>,
) -> Result<Json<Vec<StudyItemView>>, ErrorResponse> {
    log_api_start!("list_studies");
    let items = state
        .service
        .list_studies()
        .await
        .map_err(|e| reject(e, ErrorContext::new("list_studies", "estudo")))?;

    let today = today();
    let views: Vec<StudyItemView> = items
        .into_iter()
        .map(|item| StudyItemView::new(item, today))
        .collect();
    log_api_success!("list_studies", count = views.len(), "studies listed");
    Ok(Json(views))
}

// POST /api/estudos
async fn create_study(
    State(state): State<AppState>,
    Json(request): Json<CreateStudyRequest>,
) -> Result<(StatusCode, Json<StudyItemView>), ErrorResponse> {
    log_api_start!("create_study");
    let item = state
        .service
        .create_study(request)
        .await
        .map_err(|e| reject(e, ErrorContext::new("create_study", "estudo")))?;

    log_api_success!("create_study", estudo_id = item.id, "study created");
    Ok((
        StatusCode::CREATED,
        Json(StudyItemView::new(item, today())),
    ))
}

// GET /api/estudos/:id
async fn get_study(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StudyItemView>, ErrorResponse> {
    log_api_start!("get_study", estudo_id = id);
    let context = ErrorContext::new("get_study", "estudo").with_id(id.to_string());
    let item = state
        .service
        .get_study(id)
        .await
        .map_err(|e| reject(e, context.clone()))?
        .ok_or_else(|| reject(ApiError::NotFound("estudo não encontrado".to_string()), context))?;
    Ok(Json(StudyItemView::new(item, today())))
}

// PUT /api/estudos/:id
async fn update_study(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStudyRequest>,
) -> Result<Json<StudyItemView>, ErrorResponse> {
    log_api_start!("update_study", estudo_id = id);
    let context = ErrorContext::new("update_study", "estudo").with_id(id.to_string());
    let item = state
        .service
        .update_study(id, request)
        .await
        .map_err(|e| reject(e, context.clone()))?
        .ok_or_else(|| reject(ApiError::NotFound("estudo não encontrado".to_string()), context))?;

    log_api_success!("update_study", estudo_id = id, "study replaced");
    Ok(Json(StudyItemView::new(item, today())))
}

// PATCH /api/estudos/:id
async fn patch_study(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PatchStudyRequest>,
) -> Result<Json<StudyItemView>, ErrorResponse> {
    log_api_start!("patch_study", estudo_id = id);
    let context = ErrorContext::new("patch_study", "estudo").with_id(id.to_string());
    let item = state
        .service
        .patch_study(id, request)
        .await
        .map_err(|e| reject(e, context.clone()))?
        .ok_or_else(|| reject(ApiError::NotFound("estudo não encontrado".to_string()), context))?;

    log_api_success!("patch_study", estudo_id = id, "study patched");
    Ok(Json(StudyItemView::new(item, today())))
}

// DELETE /api/estudos/:id
async fn delete_study(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ErrorResponse> {
    log_api_start!("delete_study", estudo_id = id);
    let context = ErrorContext::new("delete_study", "estudo").with_id(id.to_string());
    let deleted = state
        .service
        .delete_study(id)
        .await
        .map_err(|e| reject(e, context.clone()))?;

    if deleted {
        log_api_success!("delete_study", estudo_id = id, "study deleted");
        Ok(Json(json!({ "ok": true })))
    } else {
        Err(reject(
            ApiError::NotFound("estudo não encontrado".to_string()),
            context,
        ))
    }
}

// POST /api/estudos/:id/revisoes
async fn schedule_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ScheduleReviewRequest>,
) -> Result<(StatusCode, Json<StudyItemView>), ErrorResponse> {
    log_api_start!("schedule_review", estudo_id = id);
    let context = ErrorContext::new("schedule_review", "revisao").with_id(id.to_string());
    let item = state
        .service
        .schedule_review(id, request)
        .await
        .map_err(|e| reject(e, context.clone()))?
        .ok_or_else(|| reject(ApiError::NotFound("estudo não encontrado".to_string()), context))?;

    log_api_success!("schedule_review", estudo_id = id, "review scheduled");
    Ok((
        StatusCode::CREATED,
        Json(StudyItemView::new(item, today())),
    ))
}

// POST /api/estudos/:id/revisoes/:seq/feita
async fn complete_review(
    State(state): State<AppState>,
    Path((id, seq)): Path<(Uuid, u32)>,
) -> Result<Json<StudyItemView>, ErrorResponse> {
    log_api_start!("complete_review", estudo_id = id);
    let context = ErrorContext::new("complete_review", "revisao").with_id(id.to_string());
    let item = state
        .service
        .complete_review(id, seq)
        .await
        .map_err(|e| reject(e, context.clone()))?
        .ok_or_else(|| reject(ApiError::NotFound("estudo não encontrado".to_string()), context))?;

    log_api_success!("complete_review", estudo_id = id, "review completed");
    Ok(Json(StudyItemView::new(item, today())))
}

// POST /api/estudos/:id/questoes
async fn add_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddQuestionRequest>,
) -> Result<(StatusCode, Json<StudyItemView>), ErrorResponse> {
    log_api_start!("add_question", estudo_id = id);
    let context = ErrorContext::new("add_question", "questao").with_id(id.to_string());
    let item = state
        .service
        .add_question(id, request)
        .await
        .map_err(|e| reject(e, context.clone()))?
        .ok_or_else(|| reject(ApiError::NotFound("estudo não encontrado".to_string()), context))?;

    log_api_success!("add_question", estudo_id = id, "question added");
    Ok((
        StatusCode::CREATED,
        Json(StudyItemView::new(item, today())),
    ))
}

// POST /api/estudos/:id/questoes/:seq/feita
async fn complete_question(
    State(state): State<AppState>,
    Path((id, seq)): Path<(Uuid, u32)>,
) -> Result<Json<StudyItemView>, ErrorResponse> {
    log_api_start!("complete_question", estudo_id = id);
    let context = ErrorContext::new("complete_question", "questao").with_id(id.to_string());
    let item = state
        .service
        .complete_question(id, seq)
        .await
        .map_err(|e| reject(e, context.clone()))?
        .ok_or_else(|| reject(ApiError::NotFound("estudo não encontrado".to_string()), context))?;

    log_api_success!("complete_question", estudo_id = id, "question completed");
    Ok(Json(StudyItemView::new(item, today())))
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    mes: Option<u32>,
    ano: Option<i32>,
}

// GET /api/dashboard?mes=&ano=
async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<views::DashboardCounters>, ErrorResponse> {
    log_api_start!("dashboard");
    let items = state
        .service
        .list_studies()
        .await
        .map_err(|e| reject(e, ErrorContext::new("dashboard", "estudo")))?;

    let today = today();
    let current = MonthRef::containing(today);
    let month = MonthRef {
        ano: query.ano.unwrap_or(current.ano),
        mes: query.mes.unwrap_or(current.mes),
    };
    if !(1..=12).contains(&month.mes) {
        return Err(reject(
            ApiError::BadRequest("mes deve estar entre 1 e 12".to_string()),
            ErrorContext::new("dashboard", "estudo"),
        ));
    }

    Ok(Json(views::dashboard_counters(&items, month, today)))
}

// GET /api/revisoes
async fn list_reviews(
    State(state): State<AppState>,
) -> Result<Json<Vec<views::ReviewEntry>>, ErrorResponse> {
    log_api_start!("list_reviews");
    let items = state
        .service
        .list_studies()
        .await
        .map_err(|e| reject(e, ErrorContext::new("list_reviews", "revisao")))?;
    Ok(Json(views::all_reviews(&items)))
}

#[derive(Debug, Default, Deserialize)]
struct QuestionQuery {
    q: Option<String>,
    curso: Option<String>,
    status: Option<QuestionStatus>,
}

// GET /api/questoes
async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionQuery>,
) -> Result<Json<Vec<views::QuestionEntry>>, ErrorResponse> {
    log_api_start!("list_questions");
    let items = state
        .service
        .list_studies()
        .await
        .map_err(|e| reject(e, ErrorContext::new("list_questions", "questao")))?;

    let filter = QuestionFilter {
        query: query.q,
        curso: query.curso,
        status: query.status,
    };
    Ok(Json(views::question_bank(&items, &filter)))
}

pub fn create_router(state: AppState) -> Router {
    let mut api = Router::new()
        .route("/estudos", get(list_studies).post(create_study))
        .route(
            "/estudos/:id",
            get(get_study)
                .put(update_study)
                .patch(patch_study)
                .delete(delete_study),
        )
        .route("/estudos/:id/revisoes", post(schedule_review))
        .route("/estudos/:id/revisoes/:seq/feita", post(complete_review))
        .route("/estudos/:id/questoes", post(add_question))
        .route("/estudos/:id/questoes/:seq/feita", post(complete_question))
        .route("/dashboard", get(dashboard))
        .route("/revisoes", get(list_reviews))
        .route("/questoes", get(list_questions));

    if let Some(verifier) = state.session_verifier.clone() {
        api = api.layer(middleware::from_fn_with_state(
            verifier,
            session_gate::require_session,
        ));
    }

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
}
