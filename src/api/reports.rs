use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::api::state::AppState;
use crate::api::{done, with_data};
use crate::db::{CommentRepository, PostRepository, Report, ReportRepository, ReportStatus};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub reason: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status_filter: Option<ReportStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub new_status: ReportStatus,
}

async fn load_report(state: &AppState, report_id: i64) -> Result<Report, AppError> {
    ReportRepository::get_by_id(&state.db, report_id)
        .await?
        .ok_or_else(|| AppError::not_found("Report"))
}

/// POST /reports
pub async fn create_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreateReportRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if req.post_id.is_none() && req.comment_id.is_none() {
        return Err(AppError::BadRequest("Must report either a post or comment".to_string()));
    }

    if let Some(post_id) = req.post_id {
        PostRepository::get_by_id(&state.db, post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;
    }
    if let Some(comment_id) = req.comment_id {
        CommentRepository::get_by_id(&state.db, comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;
    }

    let report = ReportRepository::create(
        &state.db,
        user.id,
        req.post_id,
        req.comment_id,
        &req.reason,
        req.description.as_deref(),
    )
    .await?;
    tracing::info!(report_id = report.id, reporter_id = user.id, "Report filed");

    Ok((StatusCode::CREATED, with_data("Successfully created report", report)))
}

/// GET /reports?status_filter=
pub async fn list_reports(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Report>>, AppError> {
    Ok(Json(ReportRepository::list(&state.db, query.status_filter).await?))
}

/// GET /reports/{report_id}
pub async fn get_report(
    State(state): State<AppState>,
    ApiPath(report_id): ApiPath<i64>,
) -> Result<Json<Report>, AppError> {
    Ok(Json(load_report(&state, report_id).await?))
}

/// PUT /reports/{report_id}/review?new_status=
pub async fn review_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(report_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<ReviewQuery>,
) -> Result<Json<Value>, AppError> {
    load_report(&state, report_id).await?;

    let report = ReportRepository::set_status(&state.db, report_id, query.new_status).await?;
    tracing::info!(report_id, reviewer_id = user.id, status = ?query.new_status, "Report reviewed");

    Ok(with_data("Successfully reviewed report", report))
}

/// DELETE /reports/{report_id}
pub async fn delete_report(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiPath(report_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    load_report(&state, report_id).await?;
    ReportRepository::delete(&state.db, report_id).await?;

    Ok(done("Successfully deleted report"))
}
