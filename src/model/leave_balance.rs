use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct BalanceKey {
    pub employee_id: u64,
    pub leave_id: u64,
}

/// Ledger row: running balance of one employee for one leave type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeLeaveBalance {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 7)]
    pub leave_id: u64,
    #[schema(example = 1)]
    pub organization_id: u64,
    #[schema(example = 12.5)]
    pub balance: f64,
    pub total_accrued: f64,
    pub total_consumed: f64,
    #[schema(value_type = Option<String>, format = "date")]
    pub last_accrual_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub next_accrual_date: Option<NaiveDate>,
    /// Days retained at the last rollover that have not been used or expired yet.
    pub carried_forward: f64,
    #[schema(value_type = Option<String>, format = "date")]
    pub carry_forward_expires_on: Option<NaiveDate>,
    /// Calendar year the balance belongs to; rollover moves it forward.
    #[schema(example = 2026)]
    pub balance_year: i32,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl EmployeeLeaveBalance {
    pub fn key(&self) -> BalanceKey {
        BalanceKey {
            employee_id: self.employee_id,
            leave_id: self.leave_id,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Opening,
    Accrual,
    AccrualCapForfeit,
    Usage,
    Reversal,
    CarryForwardForfeit,
    CarryForwardExpiry,
    Encashment,
}

/// A balance change not yet written to the journal.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerMovement {
    pub kind: MovementKind,
    /// Signed: credits are positive, debits negative.
    pub days: f64,
    pub balance_after: f64,
    pub request_id: Option<u64>,
    pub effective_date: NaiveDate,
}

/// Journal row. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    pub id: u64,
    pub employee_id: u64,
    pub leave_id: u64,
    pub request_id: Option<u64>,
    pub kind: MovementKind,
    #[schema(example = -2.0)]
    pub days: f64,
    pub balance_after: f64,
    #[schema(value_type = String, format = "date")]
    pub effective_date: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct BalanceFilter {
    pub organization_id: u64,
    pub employee_id: Option<u64>,
    pub leave_id: Option<u64>,
    pub page: u32,
    pub per_page: u32,
}
