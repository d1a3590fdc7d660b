use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use super::parse_param;
use crate::auth::auth::AuthUser;
use crate::error::LeaveError;
use crate::leave::LeaveServices;
use crate::leave::catalog::{CreateLeaveType, UpdateLeaveType};
use crate::model::leave_type::{LeaveType, LeaveTypeFilter};
use crate::store::{LeaveStore, page_window};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveTypeQuery {
    /// Only active (`true`) or inactive (`false`) types
    pub active: Option<bool>,
    /// Category such as `ANNUAL` or `SICK`
    #[param(example = "ANNUAL")]
    pub category: Option<String>,
    /// Matches code or name
    pub search: Option<String>,
    /// Pagination page number (start with 1)
    #[param(example = 1)]
    pub page: Option<u32>,
    /// Pagination per page number
    #[param(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveTypeListResponse {
    pub data: Vec<LeaveType>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct SetActive {
    #[schema(example = false)]
    pub active: bool,
}

/* =========================
List leave types
========================= */
#[utoipa::path(
    get,
    path = "/api/leave-types",
    params(LeaveTypeQuery),
    responses(
        (status = 200, description = "Leave types of the caller's organization", body = LeaveTypeListResponse),
        (status = 400, description = "Invalid filter", body = crate::api::ErrorBody),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Types"
)]
pub async fn list_leave_types<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    query: web::Query<LeaveTypeQuery>,
) -> Result<HttpResponse, LeaveError> {
    let query = query.into_inner();
    let (page, per_page, _) = page_window(query.page.unwrap_or(1), query.per_page.unwrap_or(10));
    let filter = LeaveTypeFilter {
        organization_id: auth.organization_id,
        active: query.active,
        category: parse_param("category", query.category.as_deref())?,
        search: query.search.filter(|s| !s.trim().is_empty()),
        page,
        per_page,
    };

    let (data, total) = services.catalog.list(&auth.actor(), filter).await?;
    Ok(HttpResponse::Ok().json(LeaveTypeListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/* =========================
Create leave type
========================= */
#[utoipa::path(
    post,
    path = "/api/leave-types",
    request_body(content = CreateLeaveType, content_type = "application/json"),
    responses(
        (status = 201, description = "Leave type created", body = LeaveType),
        (status = 400, description = "Invalid policy", body = crate::api::ErrorBody),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody),
        (status = 409, description = "Code already used in the organization", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Types"
)]
pub async fn create_leave_type<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    payload: web::Json<CreateLeaveType>,
) -> Result<HttpResponse, LeaveError> {
    let created = services
        .catalog
        .create(&auth.actor(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/leave-types/{id}",
    params(("id" = u64, Path, description = "Leave type id")),
    responses(
        (status = 200, description = "Leave type", body = LeaveType),
        (status = 404, description = "Unknown or deleted leave type", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Types"
)]
pub async fn get_leave_type<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<u64>,
) -> Result<HttpResponse, LeaveError> {
    let leave_type = services
        .catalog
        .get(&auth.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(leave_type))
}

#[utoipa::path(
    put,
    path = "/api/leave-types/{id}",
    params(("id" = u64, Path, description = "Leave type id")),
    request_body(content = UpdateLeaveType, content_type = "application/json"),
    responses(
        (status = 200, description = "Updated leave type", body = LeaveType),
        (status = 400, description = "Invalid policy", body = crate::api::ErrorBody),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody),
        (status = 404, description = "Unknown or deleted leave type", body = crate::api::ErrorBody),
        (status = 409, description = "Code already used in the organization", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Types"
)]
pub async fn update_leave_type<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeaveType>,
) -> Result<HttpResponse, LeaveError> {
    let updated = services
        .catalog
        .update(&auth.actor(), path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    put,
    path = "/api/leave-types/{id}/active",
    params(("id" = u64, Path, description = "Leave type id")),
    request_body(content = SetActive, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave type with the new activation state", body = LeaveType),
        (status = 403, description = "HR/Admin only", body = crate::api::ErrorBody),
        (status = 404, description = "Unknown or deleted leave type", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Types"
)]
pub async fn set_leave_type_active<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<u64>,
    payload: web::Json<SetActive>,
) -> Result<HttpResponse, LeaveError> {
    let updated = services
        .catalog
        .set_active(&auth.actor(), path.into_inner(), payload.active)
        .await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Soft delete; balances and requests keep pointing at the row.
#[utoipa::path(
    delete,
    path = "/api/leave-types/{id}",
    params(("id" = u64, Path, description = "Leave type id")),
    responses(
        (status = 200, description = "Leave type deleted"),
        (status = 403, description = "Admin only", body = crate::api::ErrorBody),
        (status = 404, description = "Unknown or deleted leave type", body = crate::api::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Types"
)]
pub async fn delete_leave_type<S: LeaveStore + 'static>(
    auth: AuthUser,
    services: web::Data<LeaveServices<S>>,
    path: web::Path<u64>,
) -> Result<HttpResponse, LeaveError> {
    let leave_id = path.into_inner();
    services.catalog.soft_delete(&auth.actor(), leave_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave type deleted",
        "id": leave_id
    })))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{Value, json};

    use crate::model::role::Role;
    use crate::test_utils::{bearer, leave_api, seeded_store};

    fn annual_leave() -> Value {
        json!({
            "code": "al",
            "name": "Annual leave",
            "category": "ANNUAL",
            "accrual_method": "MONTHLY",
            "accrual_rate": 1.5,
            "initial_balance": 10,
            "max_balance": 30
        })
    }

    #[actix_web::test]
    async fn requests_without_token_are_unauthorized() {
        let app = leave_api!(seeded_store());
        let req = test::TestRequest::get().uri("/api/leave-types").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "unauthorized");
    }

    #[actix_web::test]
    async fn hr_creates_and_employee_reads() {
        let app = leave_api!(seeded_store());

        let req = test::TestRequest::post()
            .uri("/api/leave-types")
            .insert_header(("Authorization", bearer(Role::Hr, None)))
            .set_json(annual_leave())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["code"], "AL");
        let id = created["id"].as_u64().expect("id");

        let req = test::TestRequest::get()
            .uri(&format!("/api/leave-types/{id}"))
            .insert_header(("Authorization", bearer(Role::Employee, Some(1000))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/leave-types?category=annual&active=true")
            .insert_header(("Authorization", bearer(Role::Employee, Some(1000))))
            .to_request();
        let list: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list["total"], 1);
        assert_eq!(list["per_page"], 10);
    }

    #[actix_web::test]
    async fn error_kinds_map_to_status_codes() {
        let app = leave_api!(seeded_store());
        let hr = bearer(Role::Hr, None);

        let req = test::TestRequest::post()
            .uri("/api/leave-types")
            .insert_header(("Authorization", bearer(Role::Employee, Some(1000))))
            .set_json(annual_leave())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let mut invalid = annual_leave();
        invalid["accrual_method"] = json!("FORTNIGHTLY");
        let req = test::TestRequest::post()
            .uri("/api/leave-types")
            .insert_header(("Authorization", hr.clone()))
            .set_json(invalid)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "validation_error");

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let req = test::TestRequest::post()
                .uri("/api/leave-types")
                .insert_header(("Authorization", hr.clone()))
                .set_json(annual_leave())
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), expected);
        }

        let req = test::TestRequest::get()
            .uri("/api/leave-types/999")
            .insert_header(("Authorization", hr.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/leave-types?category=holiday")
            .insert_header(("Authorization", hr))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn deactivate_then_delete() {
        let app = leave_api!(seeded_store());
        let req = test::TestRequest::post()
            .uri("/api/leave-types")
            .insert_header(("Authorization", bearer(Role::Hr, None)))
            .set_json(annual_leave())
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_u64().expect("id");

        let req = test::TestRequest::put()
            .uri(&format!("/api/leave-types/{id}/active"))
            .insert_header(("Authorization", bearer(Role::Hr, None)))
            .set_json(json!({ "active": false }))
            .to_request();
        let updated: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated["active_flag"], false);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/leave-types/{id}"))
            .insert_header(("Authorization", bearer(Role::Hr, None)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/leave-types/{id}"))
            .insert_header(("Authorization", bearer(Role::Admin, None)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri(&format!("/api/leave-types/{id}"))
            .insert_header(("Authorization", bearer(Role::Admin, None)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
