//! Persistence boundary for the leave domain.
//!
//! Every mutation of a ledger row goes through one of the `*_with` methods. The
//! store locks the affected rows, hands copies to the closure, and writes the
//! copies back (plus any journal movements) only when the closure succeeds. A
//! failed closure leaves the store untouched.

#[cfg(test)]
pub mod memory;
pub mod mysql;

use chrono::NaiveDate;

use crate::error::LeaveError;
use crate::leave::ledger::LedgerTxn;
use crate::model::employee::Employee;
use crate::model::leave_balance::{
    BalanceFilter, BalanceKey, EmployeeLeaveBalance, LedgerEntry, LedgerMovement,
};
use crate::model::leave_request::{LeaveRequest, LeaveRequestFilter, StatisticsFilter, StatusTotal};
use crate::model::leave_type::{LeaveType, LeaveTypeDraft, LeaveTypeFilter};

#[allow(async_fn_in_trait)]
pub trait LeaveStore {
    async fn fetch_employee(&self, employee_id: u64) -> Result<Option<Employee>, LeaveError>;

    /// Fails with `Conflict` when the code is taken in the organization.
    async fn insert_leave_type(&self, draft: LeaveTypeDraft) -> Result<LeaveType, LeaveError>;
    /// Fails with `Conflict` when the code is taken by another leave type.
    async fn update_leave_type(&self, leave_type: &LeaveType) -> Result<(), LeaveError>;
    async fn fetch_leave_type(&self, leave_id: u64) -> Result<Option<LeaveType>, LeaveError>;
    async fn list_leave_types(
        &self,
        filter: &LeaveTypeFilter,
    ) -> Result<(Vec<LeaveType>, i64), LeaveError>;

    /// Fails with `Conflict` when the row already exists.
    async fn insert_balance(
        &self,
        balance: EmployeeLeaveBalance,
        opening: LedgerMovement,
    ) -> Result<EmployeeLeaveBalance, LeaveError>;
    async fn fetch_balance(
        &self,
        key: BalanceKey,
    ) -> Result<Option<EmployeeLeaveBalance>, LeaveError>;
    async fn list_balances(
        &self,
        filter: &BalanceFilter,
    ) -> Result<(Vec<EmployeeLeaveBalance>, i64), LeaveError>;
    /// Rows with an accrual, rollover, or carry-forward expiry due on `today`.
    async fn due_balances(&self, today: NaiveDate) -> Result<Vec<BalanceKey>, LeaveError>;
    async fn list_journal(
        &self,
        key: BalanceKey,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<LedgerEntry>, i64), LeaveError>;
    async fn update_balance_with<T, F>(&self, key: BalanceKey, f: F) -> Result<T, LeaveError>
    where
        F: FnOnce(&mut LedgerTxn) -> Result<T, LeaveError>;

    async fn fetch_request(&self, request_id: u64) -> Result<Option<LeaveRequest>, LeaveError>;
    async fn list_requests(
        &self,
        filter: &LeaveRequestFilter,
    ) -> Result<(Vec<LeaveRequest>, i64), LeaveError>;
    /// PENDING or APPROVED requests of the employee intersecting `[start, end]`.
    async fn overlapping_requests(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, LeaveError>;
    /// Persists `request` together with whatever the closure does to its ledger
    /// row. Movements recorded by the closure are attributed to the new request.
    async fn insert_request_with<F>(
        &self,
        request: LeaveRequest,
        f: F,
    ) -> Result<LeaveRequest, LeaveError>
    where
        F: FnOnce(&mut LeaveRequest, &mut LedgerTxn) -> Result<(), LeaveError>;
    async fn update_request_with<T, F>(&self, request_id: u64, f: F) -> Result<T, LeaveError>
    where
        F: FnOnce(&mut LeaveRequest, &mut LedgerTxn) -> Result<T, LeaveError>;
    async fn status_totals(
        &self,
        filter: &StatisticsFilter,
    ) -> Result<Vec<StatusTotal>, LeaveError>;
}

/// Normalizes pagination input the way every list endpoint does.
pub(crate) fn page_window(page: u32, per_page: u32) -> (u32, u32, u32) {
    let per_page = if per_page == 0 { 10 } else { per_page.min(100) };
    let page = page.max(1);
    (page, per_page, (page - 1) * per_page)
}
