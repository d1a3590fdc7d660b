//! In-process store used by the unit and HTTP tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{Datelike, NaiveDate, Utc};

use super::{LeaveStore, page_window};
use crate::error::LeaveError;
use crate::leave::ledger::LedgerTxn;
use crate::model::employee::Employee;
use crate::model::leave_balance::{
    BalanceFilter, BalanceKey, EmployeeLeaveBalance, LedgerEntry, LedgerMovement,
};
use crate::model::leave_request::{
    LeaveRequest, LeaveRequestFilter, LeaveStatus, StatisticsFilter, StatusTotal,
};
use crate::model::leave_type::{LeaveType, LeaveTypeDraft, LeaveTypeFilter};

#[derive(Default)]
struct State {
    employees: HashMap<u64, Employee>,
    leave_types: BTreeMap<u64, LeaveType>,
    balances: BTreeMap<(u64, u64), EmployeeLeaveBalance>,
    journal: Vec<LedgerEntry>,
    requests: BTreeMap<u64, LeaveRequest>,
    next_leave_type_id: u64,
    next_request_id: u64,
}

impl State {
    fn code_taken(&self, organization_id: u64, code: &str, except: Option<u64>) -> bool {
        self.leave_types.values().any(|t| {
            t.organization_id == organization_id
                && !t.delete_flag
                && t.code == code
                && Some(t.id) != except
        })
    }

    fn append_journal(&mut self, key: BalanceKey, movements: Vec<LedgerMovement>) {
        let now = Utc::now();
        for m in movements {
            let id = self.journal.len() as u64 + 1;
            self.journal.push(LedgerEntry {
                id,
                employee_id: key.employee_id,
                leave_id: key.leave_id,
                request_id: m.request_id,
                kind: m.kind,
                days: m.days,
                balance_after: m.balance_after,
                effective_date: m.effective_date,
                created_at: now,
            });
        }
    }

    fn open_txn(&self, key: BalanceKey) -> Result<LedgerTxn, LeaveError> {
        let row = self
            .balances
            .get(&(key.employee_id, key.leave_id))
            .cloned()
            .ok_or_else(|| LeaveError::not_found("leave balance"))?;
        let policy = self
            .leave_types
            .get(&key.leave_id)
            .cloned()
            .ok_or_else(|| LeaveError::not_found(format!("leave type {}", key.leave_id)))?;
        Ok(LedgerTxn::new(policy, row))
    }

    fn commit_txn(&mut self, txn: LedgerTxn, request_id: Option<u64>) {
        let (mut row, mut movements) = txn.into_parts();
        row.updated_at = Utc::now();
        let key = row.key();
        if request_id.is_some() {
            for m in movements.iter_mut().filter(|m| m.request_id.is_none()) {
                m.request_id = request_id;
            }
        }
        self.balances.insert((key.employee_id, key.leave_id), row);
        self.append_journal(key, movements);
    }
}

fn page<T: Clone>(items: Vec<&T>, page: u32, per_page: u32) -> (Vec<T>, i64) {
    let (_, per_page, offset) = page_window(page, per_page);
    let total = items.len() as i64;
    let rows = items
        .into_iter()
        .skip(offset as usize)
        .take(per_page as usize)
        .cloned()
        .collect();
    (rows, total)
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store poisoned")
    }

    pub fn insert_employee(&self, employee: Employee) {
        self.state().employees.insert(employee.id, employee);
    }

    pub fn journal_len(&self) -> usize {
        self.state().journal.len()
    }
}

impl LeaveStore for MemoryStore {
    async fn fetch_employee(&self, employee_id: u64) -> Result<Option<Employee>, LeaveError> {
        Ok(self.state().employees.get(&employee_id).cloned())
    }

    async fn insert_leave_type(&self, draft: LeaveTypeDraft) -> Result<LeaveType, LeaveError> {
        let mut state = self.state();
        if state.code_taken(draft.organization_id, &draft.code, None) {
            return Err(LeaveError::Conflict(format!(
                "leave type code {} already exists",
                draft.code
            )));
        }
        state.next_leave_type_id += 1;
        let leave_type = draft.into_leave_type(state.next_leave_type_id, Utc::now());
        state.leave_types.insert(leave_type.id, leave_type.clone());
        Ok(leave_type)
    }

    async fn update_leave_type(&self, leave_type: &LeaveType) -> Result<(), LeaveError> {
        let mut state = self.state();
        if !state.leave_types.contains_key(&leave_type.id) {
            return Err(LeaveError::not_found(format!("leave type {}", leave_type.id)));
        }
        if !leave_type.delete_flag
            && state.code_taken(leave_type.organization_id, &leave_type.code, Some(leave_type.id))
        {
            return Err(LeaveError::Conflict(format!(
                "leave type code {} already exists",
                leave_type.code
            )));
        }
        state.leave_types.insert(leave_type.id, leave_type.clone());
        Ok(())
    }

    async fn fetch_leave_type(&self, leave_id: u64) -> Result<Option<LeaveType>, LeaveError> {
        Ok(self.state().leave_types.get(&leave_id).cloned())
    }

    async fn list_leave_types(
        &self,
        filter: &LeaveTypeFilter,
    ) -> Result<(Vec<LeaveType>, i64), LeaveError> {
        let state = self.state();
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let matching = state
            .leave_types
            .values()
            .filter(|t| t.organization_id == filter.organization_id && !t.delete_flag)
            .filter(|t| filter.active.is_none_or(|a| t.active_flag == a))
            .filter(|t| filter.category.is_none_or(|c| t.category == c))
            .filter(|t| {
                search.as_ref().is_none_or(|s| {
                    t.name.to_lowercase().contains(s) || t.code.to_lowercase().contains(s)
                })
            })
            .collect();
        Ok(page(matching, filter.page, filter.per_page))
    }

    async fn insert_balance(
        &self,
        balance: EmployeeLeaveBalance,
        opening: LedgerMovement,
    ) -> Result<EmployeeLeaveBalance, LeaveError> {
        let mut state = self.state();
        let key = balance.key();
        if state.balances.contains_key(&(key.employee_id, key.leave_id)) {
            return Err(LeaveError::Conflict("leave balance already open".to_string()));
        }
        state
            .balances
            .insert((key.employee_id, key.leave_id), balance.clone());
        state.append_journal(key, vec![opening]);
        Ok(balance)
    }

    async fn fetch_balance(
        &self,
        key: BalanceKey,
    ) -> Result<Option<EmployeeLeaveBalance>, LeaveError> {
        Ok(self
            .state()
            .balances
            .get(&(key.employee_id, key.leave_id))
            .cloned())
    }

    async fn list_balances(
        &self,
        filter: &BalanceFilter,
    ) -> Result<(Vec<EmployeeLeaveBalance>, i64), LeaveError> {
        let state = self.state();
        let matching = state
            .balances
            .values()
            .filter(|b| b.organization_id == filter.organization_id)
            .filter(|b| filter.employee_id.is_none_or(|e| b.employee_id == e))
            .filter(|b| filter.leave_id.is_none_or(|l| b.leave_id == l))
            .collect();
        Ok(page(matching, filter.page, filter.per_page))
    }

    async fn due_balances(&self, today: NaiveDate) -> Result<Vec<BalanceKey>, LeaveError> {
        Ok(self
            .state()
            .balances
            .values()
            .filter(|b| {
                b.next_accrual_date.is_some_and(|d| d <= today)
                    || b.balance_year < today.year()
                    || b.carry_forward_expires_on.is_some_and(|d| d <= today)
            })
            .map(EmployeeLeaveBalance::key)
            .collect())
    }

    async fn list_journal(
        &self,
        key: BalanceKey,
        page_no: u32,
        per_page: u32,
    ) -> Result<(Vec<LedgerEntry>, i64), LeaveError> {
        let state = self.state();
        let matching = state
            .journal
            .iter()
            .filter(|e| e.employee_id == key.employee_id && e.leave_id == key.leave_id)
            .collect();
        Ok(page(matching, page_no, per_page))
    }

    async fn update_balance_with<T, F>(&self, key: BalanceKey, f: F) -> Result<T, LeaveError>
    where
        F: FnOnce(&mut LedgerTxn) -> Result<T, LeaveError>,
    {
        let mut state = self.state();
        let mut txn = state.open_txn(key)?;
        let out = f(&mut txn)?;
        state.commit_txn(txn, None);
        Ok(out)
    }

    async fn fetch_request(&self, request_id: u64) -> Result<Option<LeaveRequest>, LeaveError> {
        Ok(self.state().requests.get(&request_id).cloned())
    }

    async fn list_requests(
        &self,
        filter: &LeaveRequestFilter,
    ) -> Result<(Vec<LeaveRequest>, i64), LeaveError> {
        let state = self.state();
        let matching = state
            .requests
            .values()
            .rev()
            .filter(|r| r.organization_id == filter.organization_id)
            .filter(|r| filter.employee_id.is_none_or(|e| r.employee_id == e))
            .filter(|r| filter.leave_id.is_none_or(|l| r.leave_id == l))
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| filter.from.is_none_or(|d| r.end_date >= d))
            .filter(|r| filter.to.is_none_or(|d| r.start_date <= d))
            .collect();
        Ok(page(matching, filter.page, filter.per_page))
    }

    async fn overlapping_requests(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, LeaveError> {
        Ok(self
            .state()
            .requests
            .values()
            .filter(|r| r.employee_id == employee_id)
            .filter(|r| r.status.blocks_calendar() && r.overlaps(start, end))
            .cloned()
            .collect())
    }

    async fn insert_request_with<F>(
        &self,
        mut request: LeaveRequest,
        f: F,
    ) -> Result<LeaveRequest, LeaveError>
    where
        F: FnOnce(&mut LeaveRequest, &mut LedgerTxn) -> Result<(), LeaveError>,
    {
        let mut state = self.state();
        let id = state.next_request_id + 1;
        request.id = id;
        let mut txn = state.open_txn(BalanceKey {
            employee_id: request.employee_id,
            leave_id: request.leave_id,
        })?;
        f(&mut request, &mut txn)?;

        state.next_request_id = id;
        state.commit_txn(txn, Some(id));
        state.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn update_request_with<T, F>(&self, request_id: u64, f: F) -> Result<T, LeaveError>
    where
        F: FnOnce(&mut LeaveRequest, &mut LedgerTxn) -> Result<T, LeaveError>,
    {
        let mut state = self.state();
        let mut request = state
            .requests
            .get(&request_id)
            .cloned()
            .ok_or_else(|| LeaveError::not_found(format!("leave request {request_id}")))?;
        let mut txn = state.open_txn(BalanceKey {
            employee_id: request.employee_id,
            leave_id: request.leave_id,
        })?;
        let out = f(&mut request, &mut txn)?;

        state.commit_txn(txn, Some(request_id));
        state.requests.insert(request_id, request);
        Ok(out)
    }

    async fn status_totals(
        &self,
        filter: &StatisticsFilter,
    ) -> Result<Vec<StatusTotal>, LeaveError> {
        let state = self.state();
        let mut totals: HashMap<LeaveStatus, (i64, f64)> = HashMap::new();
        for r in state.requests.values() {
            if r.organization_id != filter.organization_id
                || filter.leave_id.is_some_and(|l| r.leave_id != l)
                || filter.from.is_some_and(|d| r.start_date < d)
                || filter.to.is_some_and(|d| r.start_date > d)
            {
                continue;
            }
            if let Some(department) = filter.department_id {
                let in_department = state
                    .employees
                    .get(&r.employee_id)
                    .is_some_and(|e| e.department_id == Some(department));
                if !in_department {
                    continue;
                }
            }
            let entry = totals.entry(r.status).or_default();
            entry.0 += 1;
            entry.1 += r.total_days;
        }
        Ok(totals
            .into_iter()
            .map(|(status, (requests, days))| StatusTotal {
                status,
                requests,
                days,
            })
            .collect())
    }
}
