use actix_web::{HttpResponse, web};

use super::today;
use crate::auth::auth::AuthUser;
use crate::error::LeaveError;
use crate::leave::accrual_job::AccrualJob;
use crate::store::LeaveStore;

/// Runs the accrual job now instead of waiting for the next tick.
#[utoipa::path(
    post,
    path = "/api/leave-accruals/run",
    responses(
        (status = 200, description = "Summary of the run", body = crate::leave::accrual_job::AccrualReport),
        (status = 403, description = "Admin only", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Balances"
)]
pub async fn run_accruals<S: LeaveStore + 'static>(
    auth: AuthUser,
    job: web::Data<AccrualJob<S>>,
) -> Result<HttpResponse, LeaveError> {
    let report = job.run_for(&auth.actor(), today()).await?;
    Ok(HttpResponse::Ok().json(report))
}
