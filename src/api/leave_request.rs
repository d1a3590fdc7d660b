use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{parse_param, today};
use crate::auth::auth::AuthUser;
use crate::error::LeaveError;
use crate::leave::LeaveServices;
use crate::leave::workflow::{BulkDecision, Decision, SubmitLeave};
use crate::model::leave_request::{LeaveRequest, LeaveRequestFilter};
use crate::store::{LeaveStore, page_window};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by employee ID (ignored for employees, who only see their own requests)
    #[param(example = 1000)]
    pub employee_id: Option<u64>,
    /// Filter by leave type ID
    pub leave_id: Option<u64>,
    /// Filter by leave status
    #[param(example = "PENDING")]
    pub status: Option<String>,
    /// Requests ending on or after this date
    #[param(value_type = Option<String>, format = Date, example = "2026-01-01")]
    pub from: Option<NaiveDate>,
    /// Requests starting on or before this date
    #[param(value_type = Option<String>, format = Date, example = "2026-12-31")]
    pub to: Option<NaiveDate>,
    /// Pagination page number (start with 1)
    #[param(example = 1)]
    pub page: Option<u32>,
    /// Pagination per page number
    #[param(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

fn decision(body: Option<web::Json<Decision>>) -> Decision {
    body.map(web::Json::into_inner).unwrap_or_default()
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = SubmitLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted (PENDING, or APPROVED when auto-approved)", body = LeaveRequest),
        (status = 400, description = "Invalid dates or inactive leave type", body = crate::api::ErrorBody),
        (status = 403, description = "Submitting for someone else", body = crate::api::ErrorBody),
        (status = 404, description = "Unknown leave type", body = crate::api::ErrorBody),
        (status = 422, description = "Policy violation, overlap or insufficient balance", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    payload: web::Json<SubmitLeave>,
) -> Result<HttpResponse, LeaveError> {
    let created = services
        .workflow
        .submit(&auth.actor(), payload.into_inner(), today())
        .await?;
    Ok(HttpResponse::Created().json(created))
}

/* =========================
List leave requests
========================= */
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated list of leave requests", body = LeaveListResponse),
        (status = 400, description = "Invalid filter", body = crate::api::ErrorBody),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, LeaveError> {
    let query = query.into_inner();
    let (page, per_page, _) = page_window(query.page.unwrap_or(1), query.per_page.unwrap_or(10));
    let filter = LeaveRequestFilter {
        organization_id: auth.organization_id,
        employee_id: query.employee_id,
        leave_id: query.leave_id,
        status: parse_param("status", query.status.as_deref())?,
        from: query.from,
        to: query.to,
        page,
        per_page,
    };

    let (data, total) = services.workflow.list(&auth.actor(), filter).await?;
    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/leave/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave request", body = LeaveRequest),
        (status = 403, description = "Another employee's request", body = crate::api::ErrorBody),
        (status = 404, description = "Leave request not found", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<u64>,
) -> Result<HttpResponse, LeaveError> {
    let request = services
        .workflow
        .get(&auth.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Approve leave request
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{id}/approve",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body(content = Decision, description = "Optional comments", content_type = "application/json"),
    responses(
        (status = 200, description = "Leave approved and days debited", body = LeaveRequest),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody),
        (status = 404, description = "Leave request not found", body = crate::api::ErrorBody),
        (status = 409, description = "Request is not PENDING", body = crate::api::ErrorBody),
        (status = 422, description = "Insufficient balance", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<u64>,
    body: Option<web::Json<Decision>>,
) -> Result<HttpResponse, LeaveError> {
    let approved = services
        .workflow
        .approve(&auth.actor(), path.into_inner(), decision(body), today())
        .await?;
    Ok(HttpResponse::Ok().json(approved))
}

/* =========================
Reject leave request
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{id}/reject",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body(content = Decision, description = "Optional comments", content_type = "application/json"),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody),
        (status = 404, description = "Leave request not found", body = crate::api::ErrorBody),
        (status = 409, description = "Request is not PENDING", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<u64>,
    body: Option<web::Json<Decision>>,
) -> Result<HttpResponse, LeaveError> {
    let rejected = services
        .workflow
        .reject(&auth.actor(), path.into_inner(), decision(body))
        .await?;
    Ok(HttpResponse::Ok().json(rejected))
}

#[utoipa::path(
    put,
    path = "/api/leave/{id}/cancel",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body(content = Decision, description = "Optional comments", content_type = "application/json"),
    responses(
        (status = 200, description = "Leave cancelled; approved days are credited back", body = LeaveRequest),
        (status = 403, description = "Neither the owner nor HR/Admin", body = crate::api::ErrorBody),
        (status = 404, description = "Leave request not found", body = crate::api::ErrorBody),
        (status = 409, description = "Request already closed", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<u64>,
    body: Option<web::Json<Decision>>,
) -> Result<HttpResponse, LeaveError> {
    let cancelled = services
        .workflow
        .cancel(&auth.actor(), path.into_inner(), decision(body), today())
        .await?;
    Ok(HttpResponse::Ok().json(cancelled))
}

/// Each id is decided independently; one failure does not stop the batch.
#[utoipa::path(
    post,
    path = "/api/leave/bulk-approve",
    request_body(content = BulkDecision, content_type = "application/json"),
    responses(
        (status = 200, description = "Per-request outcome", body = crate::leave::workflow::BulkOutcome),
        (status = 400, description = "Empty or oversized batch", body = crate::api::ErrorBody),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn bulk_approve<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    payload: web::Json<BulkDecision>,
) -> Result<HttpResponse, LeaveError> {
    let outcome = services
        .workflow
        .bulk_approve(&auth.actor(), payload.into_inner(), today())
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/leave/bulk-reject",
    request_body(content = BulkDecision, content_type = "application/json"),
    responses(
        (status = 200, description = "Per-request outcome", body = crate::leave::workflow::BulkOutcome),
        (status = 400, description = "Empty or oversized batch", body = crate::api::ErrorBody),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn bulk_reject<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    payload: web::Json<BulkDecision>,
) -> Result<HttpResponse, LeaveError> {
    let outcome = services
        .workflow
        .bulk_reject(&auth.actor(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}
