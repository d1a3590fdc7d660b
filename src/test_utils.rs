//! Fixtures shared by the unit and HTTP tests.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};

use crate::leave::Actor;
use crate::leave::ledger::add_months;
use crate::model::employee::Employee;
use crate::model::leave_balance::EmployeeLeaveBalance;
use crate::model::leave_type::{AccrualMethod, LeaveCategory, LeaveType, LeaveTypeDraft};
use crate::model::role::Role;
use crate::store::LeaveStore;
use crate::store::memory::MemoryStore;

pub const ORG: u64 = 1;
pub const OTHER_ORG: u64 = 2;
pub const ALICE: u64 = 1000;
pub const BOB: u64 = 1001;
pub const HR_USER: u64 = 9;
pub const TEST_SECRET: &str = "test-secret";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Monthly policy with no caps, no carry-forward and single-level approval.
pub fn policy() -> LeaveType {
    policy_draft("AL").into_leave_type(7, Utc::now())
}

pub fn policy_draft(code: &str) -> LeaveTypeDraft {
    LeaveTypeDraft {
        organization_id: ORG,
        code: code.to_string(),
        name: format!("{code} leave"),
        description: None,
        category: LeaveCategory::Annual,
        is_paid: true,
        accrual_method: AccrualMethod::Monthly,
        accrual_rate: 1.0,
        initial_balance: 0.0,
        min_balance: 0.0,
        max_balance: None,
        allow_carry_forward: false,
        carry_forward_limit: None,
        carry_forward_expiry_months: None,
        allow_encashment: false,
        encashment_rate: None,
        requires_approval: true,
        approval_levels: 1,
        auto_approve_for_days: 0.0,
        requires_documentation: false,
        required_documents: Vec::new(),
        min_service_months: 0,
        min_advance_notice_days: 0,
        max_consecutive_days: None,
        blackout_dates: Vec::new(),
        active_flag: true,
    }
}

pub fn balance_row(policy: &LeaveType, balance: f64, opened_on: NaiveDate) -> EmployeeLeaveBalance {
    EmployeeLeaveBalance {
        employee_id: ALICE,
        leave_id: policy.id,
        organization_id: policy.organization_id,
        balance,
        total_accrued: 0.0,
        total_consumed: 0.0,
        last_accrual_date: None,
        next_accrual_date: Some(add_months(opened_on, 1)),
        carried_forward: 0.0,
        carry_forward_expires_on: None,
        balance_year: opened_on.year(),
        updated_at: Utc::now(),
    }
}

pub fn employee(id: u64, organization_id: u64, department_id: Option<u64>) -> Employee {
    Employee {
        id,
        organization_id,
        employee_code: format!("EMP-{id}"),
        first_name: "Test".to_string(),
        last_name: format!("Employee {id}"),
        department_id,
        hire_date: date(2024, 1, 1),
        status: "active".to_string(),
    }
}

pub fn hr_actor() -> Actor {
    Actor {
        user_id: HR_USER,
        organization_id: ORG,
        employee_id: None,
        role: Role::Hr,
    }
}

pub fn admin_actor() -> Actor {
    Actor {
        role: Role::Admin,
        ..hr_actor()
    }
}

pub fn employee_actor(employee_id: u64) -> Actor {
    Actor {
        user_id: employee_id + 5000,
        organization_id: ORG,
        employee_id: Some(employee_id),
        role: Role::Employee,
    }
}

pub fn system_actor() -> Actor {
    Actor {
        user_id: 1,
        organization_id: ORG,
        employee_id: None,
        role: Role::System,
    }
}

/// Store with Alice (department 10) and Bob (department 20) in `ORG` and one
/// employee of another organization.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::default();
    store.insert_employee(employee(ALICE, ORG, Some(10)));
    store.insert_employee(employee(BOB, ORG, Some(20)));
    store.insert_employee(employee(2000, OTHER_ORG, Some(10)));
    Arc::new(store)
}

pub async fn add_policy(store: &MemoryStore, draft: LeaveTypeDraft) -> LeaveType {
    store.insert_leave_type(draft).await.expect("leave type")
}

/// Bearer header value for a token signed with [`TEST_SECRET`].
pub fn bearer(role: Role, employee_id: Option<u64>) -> String {
    let token = crate::auth::jwt::generate_access_token(
        employee_id.map_or(HR_USER, |e| e + 5000),
        role,
        ORG,
        employee_id,
        TEST_SECRET,
        900,
    )
    .expect("token");
    format!("Bearer {token}")
}

pub fn test_config() -> crate::config::Config {
    crate::config::Config {
        database_url: "mysql://unused".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        server_addr: "127.0.0.1:0".to_string(),
        rate_protected_per_min: 1000,
        api_prefix: "/api".to_string(),
        log_dir: "logs".to_string(),
        log_level: tracing::Level::DEBUG,
        accrual_enabled: false,
        accrual_interval_secs: 3600,
        policy_cache_ttl_secs: 60,
    }
}

/// Initializes the leave API over an in-memory store, behind the auth
/// middleware but without the rate limiter (test requests carry no peer address).
macro_rules! leave_api {
    ($store:expr) => {{
        let store: std::sync::Arc<crate::store::memory::MemoryStore> = $store;
        let services =
            crate::leave::LeaveServices::new(store.clone(), std::time::Duration::from_secs(60));
        let job = crate::leave::accrual_job::AccrualJob::new(store, services.ledger.clone());
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(crate::test_utils::test_config()))
                .app_data(actix_web::web::Data::new(services))
                .app_data(actix_web::web::Data::new(job))
                .service(
                    actix_web::web::scope("/api")
                        .wrap(actix_web::middleware::from_fn(
                            crate::auth::middleware::auth_middleware,
                        ))
                        .configure(crate::routes::configure_api::<crate::store::memory::MemoryStore>),
                ),
        )
        .await
    }};
}
pub(crate) use leave_api;
