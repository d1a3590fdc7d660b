use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AccrualMethod {
    Monthly,
    Quarterly,
    Yearly,
    None,
}

impl AccrualMethod {
    /// Length of one accrual period in months; `None` never accrues.
    pub fn period_months(self) -> Option<u32> {
        match self {
            AccrualMethod::Monthly => Some(1),
            AccrualMethod::Quarterly => Some(3),
            AccrualMethod::Yearly => Some(12),
            AccrualMethod::None => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LeaveCategory {
    Annual,
    Sick,
    Casual,
    Maternity,
    Paternity,
    Compensatory,
    Unpaid,
    Other,
}

/// Leave policy for one organization. Balances and requests reference it by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaveType {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = 1)]
    pub organization_id: u64,
    #[schema(example = "AL")]
    pub code: String,
    #[schema(example = "Annual leave")]
    pub name: String,
    pub description: Option<String>,
    pub category: LeaveCategory,
    pub is_paid: bool,

    pub accrual_method: AccrualMethod,
    /// Days credited per accrual period.
    #[schema(example = 1.5)]
    pub accrual_rate: f64,

    pub initial_balance: f64,
    pub min_balance: f64,
    /// `None` means unbounded.
    pub max_balance: Option<f64>,

    pub allow_carry_forward: bool,
    pub carry_forward_limit: Option<f64>,
    pub carry_forward_expiry_months: Option<u32>,

    pub allow_encashment: bool,
    /// Currency paid per encashed day.
    pub encashment_rate: Option<f64>,

    pub requires_approval: bool,
    #[schema(example = 1)]
    pub approval_levels: u32,
    /// Requests of at most this many days skip approval. `0` disables it.
    pub auto_approve_for_days: f64,
    pub requires_documentation: bool,
    #[schema(example = json!(["medical_certificate"]))]
    pub required_documents: Vec<String>,

    pub min_service_months: u32,
    pub min_advance_notice_days: u32,
    pub max_consecutive_days: Option<f64>,
    #[schema(value_type = Vec<String>, example = json!(["2026-12-25"]))]
    pub blackout_dates: Vec<NaiveDate>,

    pub active_flag: bool,
    pub delete_flag: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl LeaveType {
    /// Whether a request of `total_days` goes straight to APPROVED.
    pub fn auto_approves(&self, total_days: f64) -> bool {
        !self.requires_approval || total_days <= self.auto_approve_for_days
    }

    pub fn is_usable(&self) -> bool {
        self.active_flag && !self.delete_flag
    }

    pub fn is_blackout(&self, day: NaiveDate) -> bool {
        self.blackout_dates.contains(&day)
    }
}

/// Validated input for a new leave type; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveTypeDraft {
    pub organization_id: u64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: LeaveCategory,
    pub is_paid: bool,
    pub accrual_method: AccrualMethod,
    pub accrual_rate: f64,
    pub initial_balance: f64,
    pub min_balance: f64,
    pub max_balance: Option<f64>,
    pub allow_carry_forward: bool,
    pub carry_forward_limit: Option<f64>,
    pub carry_forward_expiry_months: Option<u32>,
    pub allow_encashment: bool,
    pub encashment_rate: Option<f64>,
    pub requires_approval: bool,
    pub approval_levels: u32,
    pub auto_approve_for_days: f64,
    pub requires_documentation: bool,
    pub required_documents: Vec<String>,
    pub min_service_months: u32,
    pub min_advance_notice_days: u32,
    pub max_consecutive_days: Option<f64>,
    pub blackout_dates: Vec<NaiveDate>,
    pub active_flag: bool,
}

impl LeaveTypeDraft {
    pub fn into_leave_type(self, id: u64, now: DateTime<Utc>) -> LeaveType {
        LeaveType {
            id,
            organization_id: self.organization_id,
            code: self.code,
            name: self.name,
            description: self.description,
            category: self.category,
            is_paid: self.is_paid,
            accrual_method: self.accrual_method,
            accrual_rate: self.accrual_rate,
            initial_balance: self.initial_balance,
            min_balance: self.min_balance,
            max_balance: self.max_balance,
            allow_carry_forward: self.allow_carry_forward,
            carry_forward_limit: self.carry_forward_limit,
            carry_forward_expiry_months: self.carry_forward_expiry_months,
            allow_encashment: self.allow_encashment,
            encashment_rate: self.encashment_rate,
            requires_approval: self.requires_approval,
            approval_levels: self.approval_levels,
            auto_approve_for_days: self.auto_approve_for_days,
            requires_documentation: self.requires_documentation,
            required_documents: self.required_documents,
            min_service_months: self.min_service_months,
            min_advance_notice_days: self.min_advance_notice_days,
            max_consecutive_days: self.max_consecutive_days,
            blackout_dates: self.blackout_dates,
            active_flag: self.active_flag,
            delete_flag: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// List filter for the catalog.
#[derive(Debug, Clone, Default)]
pub struct LeaveTypeFilter {
    pub organization_id: u64,
    pub active: Option<bool>,
    pub category: Option<LeaveCategory>,
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
}
