use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::today;
use crate::auth::auth::AuthUser;
use crate::error::LeaveError;
use crate::leave::LeaveServices;
use crate::model::leave_balance::{BalanceFilter, BalanceKey, EmployeeLeaveBalance, LedgerEntry};
use crate::store::{LeaveStore, page_window};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    /// Filter by employee ID (ignored for employees, who only see their own rows)
    #[param(example = 1000)]
    pub employee_id: Option<u64>,
    /// Filter by leave type ID
    pub leave_id: Option<u64>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Pagination per page number
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JournalQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct BalanceListResponse {
    pub data: Vec<EmployeeLeaveBalance>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct JournalResponse {
    /// Oldest movement first.
    pub data: Vec<LedgerEntry>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct OpenBalance {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 7)]
    pub leave_id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct EncashRequest {
    #[schema(example = 2.0)]
    pub days: f64,
}

fn key_from(path: web::Path<(u64, u64)>) -> BalanceKey {
    let (employee_id, leave_id) = path.into_inner();
    BalanceKey {
        employee_id,
        leave_id,
    }
}

#[utoipa::path(
    get,
    path = "/api/leave-balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Ledger rows visible to the caller", body = BalanceListResponse),
        (status = 403, description = "Caller has no employee profile", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Balances"
)]
pub async fn list_balances<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    query: web::Query<BalanceQuery>,
) -> Result<HttpResponse, LeaveError> {
    let query = query.into_inner();
    let (page, per_page, _) = page_window(query.page.unwrap_or(1), query.per_page.unwrap_or(10));
    let filter = BalanceFilter {
        organization_id: auth.organization_id,
        employee_id: query.employee_id,
        leave_id: query.leave_id,
        page,
        per_page,
    };

    let (data, total) = services.ledger.list(&auth.actor(), filter).await?;
    Ok(HttpResponse::Ok().json(BalanceListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Opens a row at the policy's initial balance. Rows are also opened lazily on
/// the first leave request.
#[utoipa::path(
    post,
    path = "/api/leave-balances",
    request_body(content = OpenBalance, content_type = "application/json"),
    responses(
        (status = 201, description = "Ledger row opened", body = EmployeeLeaveBalance),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody),
        (status = 404, description = "Unknown employee or leave type", body = crate::api::ErrorBody),
        (status = 409, description = "Row already open", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Balances"
)]
pub async fn open_balance<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    payload: web::Json<OpenBalance>,
) -> Result<HttpResponse, LeaveError> {
    let key = BalanceKey {
        employee_id: payload.employee_id,
        leave_id: payload.leave_id,
    };
    let row = services.ledger.open(&auth.actor(), key, today()).await?;
    Ok(HttpResponse::Created().json(row))
}

#[utoipa::path(
    get,
    path = "/api/leave-balances/{employee_id}/{leave_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee id"),
        ("leave_id" = u64, Path, description = "Leave type id")
    ),
    responses(
        (status = 200, description = "Ledger row", body = EmployeeLeaveBalance),
        (status = 403, description = "Another employee's row", body = crate::api::ErrorBody),
        (status = 404, description = "No row for this employee and leave type", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Balances"
)]
pub async fn get_balance<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<(u64, u64)>,
) -> Result<HttpResponse, LeaveError> {
    let row = services.ledger.get(&auth.actor(), key_from(path)).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[utoipa::path(
    get,
    path = "/api/leave-balances/{employee_id}/{leave_id}/journal",
    params(
        ("employee_id" = u64, Path, description = "Employee id"),
        ("leave_id" = u64, Path, description = "Leave type id"),
        JournalQuery
    ),
    responses(
        (status = 200, description = "Balance movements", body = JournalResponse),
        (status = 403, description = "Another employee's row", body = crate::api::ErrorBody),
        (status = 404, description = "No row for this employee and leave type", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Balances"
)]
pub async fn balance_journal<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<(u64, u64)>,
    query: web::Query<JournalQuery>,
) -> Result<HttpResponse, LeaveError> {
    let (page, per_page, _) = page_window(query.page.unwrap_or(1), query.per_page.unwrap_or(10));
    let (data, total) = services
        .ledger
        .journal(&auth.actor(), key_from(path), page, per_page)
        .await?;
    Ok(HttpResponse::Ok().json(JournalResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    post,
    path = "/api/leave-balances/{employee_id}/{leave_id}/encash",
    params(
        ("employee_id" = u64, Path, description = "Employee id"),
        ("leave_id" = u64, Path, description = "Leave type id")
    ),
    request_body(content = EncashRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Days converted to pay", body = crate::leave::ledger::EncashmentQuote),
        (status = 400, description = "Non-positive days", body = crate::api::ErrorBody),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody),
        (status = 422, description = "Policy forbids encashment or balance too low", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Balances"
)]
pub async fn encash_balance<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<(u64, u64)>,
    payload: web::Json<EncashRequest>,
) -> Result<HttpResponse, LeaveError> {
    let quote = services
        .ledger
        .encash(&auth.actor(), key_from(path), payload.days, today())
        .await?;
    Ok(HttpResponse::Ok().json(quote))
}
