use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub const ALL: [LeaveStatus; 4] = [
        LeaveStatus::Pending,
        LeaveStatus::Approved,
        LeaveStatus::Rejected,
        LeaveStatus::Cancelled,
    ];

    /// REJECTED and CANCELLED accept no further transitions.
    pub fn is_closed(self) -> bool {
        matches!(self, LeaveStatus::Rejected | LeaveStatus::Cancelled)
    }

    /// Requests in these states hold (or may soon hold) days on the calendar.
    pub fn blocks_calendar(self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    AutoApproved,
}

/// One approver decision. The list on a request is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApprovalEntry {
    pub level: u32,
    /// `None` for system decisions (auto-approval).
    pub approver_id: Option<u64>,
    pub decision: ApprovalDecision,
    pub comments: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Attachment {
    /// Document kind, matched against a leave type's `required_documents`.
    #[schema(example = "medical_certificate")]
    pub kind: String,
    #[schema(example = "certificate.pdf")]
    pub file_name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 7)]
    pub leave_id: u64,
    #[schema(example = 1)]
    pub organization_id: u64,
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = 3.0)]
    pub total_days: f64,
    pub is_half_day: bool,
    pub status: LeaveStatus,

    pub reason: Option<String>,
    pub comments: Option<String>,
    pub approver_comments: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub cancelled_at: Option<DateTime<Utc>>,

    pub work_handover_to: Option<u64>,
    pub handover_notes: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,

    pub attachments: Vec<Attachment>,
    pub approvals: Vec<ApprovalEntry>,
    /// Days the ledger holds against this request; credit-back returns exactly this.
    pub debited_days: f64,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }

    pub(crate) fn next_approval_level(&self) -> u32 {
        self.approvals.len() as u32 + 1
    }
}

/// List filter for leave requests.
#[derive(Debug, Clone, Default)]
pub struct LeaveRequestFilter {
    pub organization_id: u64,
    pub employee_id: Option<u64>,
    pub leave_id: Option<u64>,
    pub status: Option<LeaveStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: u32,
    pub per_page: u32,
}

/// Filter for the statistics rollup. Dates bound `start_date`, inclusive.
#[derive(Debug, Clone, Default)]
pub struct StatisticsFilter {
    pub organization_id: u64,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub department_id: Option<u64>,
    pub leave_id: Option<u64>,
}

/// Per-status aggregate as returned by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTotal {
    pub status: LeaveStatus,
    pub requests: i64,
    pub days: f64,
}
