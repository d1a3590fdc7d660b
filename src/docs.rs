use crate::api::ErrorBody;
use crate::api::leave_balance::{
    BalanceListResponse, EncashRequest, JournalResponse, OpenBalance,
};
use crate::api::leave_request::LeaveListResponse;
use crate::api::leave_type::{LeaveTypeListResponse, SetActive};
use crate::leave::accrual_job::AccrualReport;
use crate::leave::catalog::{CreateLeaveType, UpdateLeaveType};
use crate::leave::ledger::EncashmentQuote;
use crate::leave::statistics::LeaveStatistics;
use crate::leave::workflow::{BulkDecision, BulkItemOutcome, BulkOutcome, Decision, SubmitLeave};
use crate::model::leave_balance::{EmployeeLeaveBalance, LedgerEntry, MovementKind};
use crate::model::leave_request::{
    ApprovalDecision, ApprovalEntry, Attachment, LeaveRequest, LeaveStatus,
};
use crate::model::leave_type::{AccrualMethod, LeaveCategory, LeaveType};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Leave API",
        version = "1.0.0",
        description = r#"
## Leave Management

Leave policy, balances and the request workflow of the **HRM** system.

### 🔹 Key Features
- **Leave Types**
  - Per-organization policies: accrual, caps, carry-forward, encashment, approval rules
- **Leave Balances**
  - Ledger rows per employee and leave type with an append-only journal
- **Leave Requests**
  - Submit, approve, reject and cancel; bulk decisions; statistics
- **Accrual Job**
  - Periodic accrual, year-end rollover and carry-forward expiry

### 🔐 Security
All endpoints require **JWT Bearer authentication**.
Policy management and decisions are limited to **HR** and **Admin**.

### 📦 Response Format
- JSON-based RESTful responses
- Errors as `{"error": "<kind>", "message": "..."}`
- Pagination supported for list endpoints
"#,
    ),
    paths(
        crate::api::leave_type::list_leave_types,
        crate::api::leave_type::create_leave_type,
        crate::api::leave_type::get_leave_type,
        crate::api::leave_type::update_leave_type,
        crate::api::leave_type::set_leave_type_active,
        crate::api::leave_type::delete_leave_type,

        crate::api::leave_balance::list_balances,
        crate::api::leave_balance::open_balance,
        crate::api::leave_balance::get_balance,
        crate::api::leave_balance::balance_journal,
        crate::api::leave_balance::encash_balance,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,
        crate::api::leave_request::bulk_approve,
        crate::api::leave_request::bulk_reject,
        crate::api::statistics::leave_statistics,

        crate::api::accrual::run_accruals
    ),
    components(
        schemas(
            ErrorBody,
            LeaveType,
            LeaveCategory,
            AccrualMethod,
            CreateLeaveType,
            UpdateLeaveType,
            SetActive,
            LeaveTypeListResponse,
            EmployeeLeaveBalance,
            LedgerEntry,
            MovementKind,
            OpenBalance,
            EncashRequest,
            EncashmentQuote,
            BalanceListResponse,
            JournalResponse,
            LeaveRequest,
            LeaveStatus,
            ApprovalEntry,
            ApprovalDecision,
            Attachment,
            SubmitLeave,
            Decision,
            BulkDecision,
            BulkItemOutcome,
            BulkOutcome,
            LeaveListResponse,
            LeaveStatistics,
            AccrualReport
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Leave Types", description = "Leave policy management APIs"),
        (name = "Leave Balances", description = "Leave ledger APIs"),
        (name = "Leave", description = "Leave request APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
