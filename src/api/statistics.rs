use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::error::LeaveError;
use crate::leave::LeaveServices;
use crate::model::leave_request::StatisticsFilter;
use crate::store::LeaveStore;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatisticsQuery {
    /// Requests starting on or after this date
    #[param(value_type = Option<String>, format = Date, example = "2026-01-01")]
    pub from: Option<NaiveDate>,
    /// Requests starting on or before this date
    #[param(value_type = Option<String>, format = Date, example = "2026-12-31")]
    pub to: Option<NaiveDate>,
    pub department_id: Option<u64>,
    pub leave_id: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/leave/statistics",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Request counts and days per status", body = crate::leave::statistics::LeaveStatistics),
        (status = 400, description = "from is after to", body = crate::api::ErrorBody),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_statistics<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse, LeaveError> {
    let query = query.into_inner();
    let filter = StatisticsFilter {
        organization_id: auth.organization_id,
        from: query.from,
        to: query.to,
        department_id: query.department_id,
        leave_id: query.leave_id,
    };
    let stats = services.statistics.summarize(&auth.actor(), filter).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::Value;

    use crate::model::role::Role;
    use crate::test_utils::{ALICE, bearer, leave_api, seeded_store};

    #[actix_web::test]
    async fn statistics_route_is_not_shadowed_by_request_ids() {
        let app = leave_api!(seeded_store());

        let req = test::TestRequest::get()
            .uri("/api/leave/statistics")
            .insert_header(("Authorization", bearer(Role::Hr, None)))
            .to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["total_requests"], 0);
        assert_eq!(stats["approved_days"], 0.0);

        let req = test::TestRequest::get()
            .uri("/api/leave/statistics")
            .insert_header(("Authorization", bearer(Role::Employee, Some(ALICE))))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/api/leave/statistics?from=2026-05-01&to=2026-04-01")
            .insert_header(("Authorization", bearer(Role::Admin, None)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
