//! Leave balance ledger.
//!
//! [`LedgerTxn`] holds the arithmetic for one locked ledger row: accrual,
//! year-end rollover, carry-forward expiry, debits and credit-backs. It never
//! persists anything itself; stores apply the resulting row and journal
//! movements when the surrounding transaction commits. [`LeaveBalanceLedger`]
//! is the service the API and the accrual job talk to.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::Actor;
use crate::error::LeaveError;
use crate::model::employee::Employee;
use crate::model::leave_balance::{
    BalanceFilter, BalanceKey, EmployeeLeaveBalance, LedgerEntry, LedgerMovement, MovementKind,
};
use crate::model::leave_type::LeaveType;
use crate::store::LeaveStore;

/// Ledger arithmetic is kept to two decimals so that repeated credits and
/// debits of the same amount cancel exactly.
pub(crate) fn round_days(days: f64) -> f64 {
    (days * 100.0).round() / 100.0
}

pub(crate) fn add_months(day: NaiveDate, months: u32) -> NaiveDate {
    day.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Builds a fresh ledger row for `employee` under `policy` and its OPENING movement.
pub fn opening_row(
    employee: &Employee,
    policy: &LeaveType,
    opened_on: NaiveDate,
    now: DateTime<Utc>,
) -> (EmployeeLeaveBalance, LedgerMovement) {
    let balance = round_days(policy.initial_balance);
    let row = EmployeeLeaveBalance {
        employee_id: employee.id,
        leave_id: policy.id,
        organization_id: policy.organization_id,
        balance,
        total_accrued: 0.0,
        total_consumed: 0.0,
        last_accrual_date: None,
        next_accrual_date: policy
            .accrual_method
            .period_months()
            .map(|months| add_months(opened_on, months)),
        carried_forward: 0.0,
        carry_forward_expires_on: None,
        balance_year: opened_on.year(),
        updated_at: now,
    };
    let opening = LedgerMovement {
        kind: MovementKind::Opening,
        days: balance,
        balance_after: balance,
        request_id: None,
        effective_date: opened_on,
    };
    (row, opening)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AccrualOutcome {
    Applied { credited: f64, forfeited: f64 },
    NotDue,
    AlreadyApplied,
    NotAccruing,
}

impl AccrualOutcome {
    /// Sums two applications; otherwise keeps whichever one did something.
    pub fn merge(self, other: AccrualOutcome) -> AccrualOutcome {
        match (self, other) {
            (
                AccrualOutcome::Applied { credited: c1, forfeited: f1 },
                AccrualOutcome::Applied { credited: c2, forfeited: f2 },
            ) => AccrualOutcome::Applied {
                credited: round_days(c1 + c2),
                forfeited: round_days(f1 + f2),
            },
            (applied @ AccrualOutcome::Applied { .. }, _) => applied,
            (_, applied @ AccrualOutcome::Applied { .. }) => applied,
            (AccrualOutcome::NotDue, other) => other,
            (mine, _) => mine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RolloverOutcome {
    Applied { retained: f64, forfeited: f64 },
    NotDue,
}

/// A locked ledger row together with its policy and the movements recorded so far.
#[derive(Debug)]
pub struct LedgerTxn {
    pub policy: LeaveType,
    pub balance: EmployeeLeaveBalance,
    movements: Vec<LedgerMovement>,
}

impl LedgerTxn {
    pub fn new(policy: LeaveType, balance: EmployeeLeaveBalance) -> Self {
        Self {
            policy,
            balance,
            movements: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn movements(&self) -> &[LedgerMovement] {
        &self.movements
    }

    pub fn into_parts(self) -> (EmployeeLeaveBalance, Vec<LedgerMovement>) {
        (self.balance, self.movements)
    }

    /// Days that may be debited before `min_balance` is reached.
    pub fn available(&self) -> f64 {
        round_days(self.balance.balance - self.policy.min_balance).max(0.0)
    }

    fn record(&mut self, kind: MovementKind, days: f64, request_id: Option<u64>, on: NaiveDate) {
        self.movements.push(LedgerMovement {
            kind,
            days: round_days(days),
            balance_after: self.balance.balance,
            request_id,
            effective_date: on,
        });
    }

    fn take(&mut self, days: f64) -> Result<(), LeaveError> {
        if !days.is_finite() || days <= 0.0 {
            return Err(LeaveError::validation(format!(
                "days must be a positive number, got {days}"
            )));
        }
        let after = round_days(self.balance.balance - days);
        if after < self.policy.min_balance {
            return Err(LeaveError::InsufficientBalance {
                requested: days,
                available: self.available(),
            });
        }
        self.balance.balance = after;
        self.balance.carried_forward = round_days(self.balance.carried_forward - days).max(0.0);
        Ok(())
    }

    /// Debit for an approved request. Rejected before any change when the
    /// balance would fall below `min_balance`.
    pub fn debit(
        &mut self,
        days: f64,
        request_id: Option<u64>,
        on: NaiveDate,
    ) -> Result<(), LeaveError> {
        self.take(days)?;
        self.balance.total_consumed = round_days(self.balance.total_consumed + days);
        self.record(MovementKind::Usage, -days, request_id, on);
        Ok(())
    }

    /// Reverses a debit made for `request_id`. The caller passes the amount
    /// actually debited for that request.
    pub fn credit_back(&mut self, days: f64, request_id: Option<u64>, on: NaiveDate) {
        if days <= 0.0 {
            return;
        }
        self.balance.balance = round_days(self.balance.balance + days);
        self.balance.total_consumed = round_days(self.balance.total_consumed - days).max(0.0);
        self.record(MovementKind::Reversal, days, request_id, on);
    }

    /// Applies one accrual period if one is due on `as_of`.
    ///
    /// `observed_last` is the `last_accrual_date` the caller saw before taking
    /// the lock. If the row moved on in the meantime another run already
    /// credited this period and nothing happens.
    pub fn accrue(&mut self, as_of: NaiveDate, observed_last: Option<NaiveDate>) -> AccrualOutcome {
        let Some(months) = self.policy.accrual_method.period_months() else {
            // A row whose policy stopped accruing must not stay due.
            self.balance.next_accrual_date = None;
            return AccrualOutcome::NotAccruing;
        };
        if self.balance.last_accrual_date != observed_last {
            return AccrualOutcome::AlreadyApplied;
        }
        let Some(due) = self.balance.next_accrual_date else {
            // Policy switched to an accruing method after the row was opened.
            self.balance.next_accrual_date = Some(add_months(as_of, months));
            return AccrualOutcome::NotDue;
        };
        if as_of < due {
            return AccrualOutcome::NotDue;
        }

        let rate = round_days(self.policy.accrual_rate);
        let uncapped = round_days(self.balance.balance + rate);
        let capped = match self.policy.max_balance {
            Some(max) => uncapped.min(max),
            None => uncapped,
        };
        let forfeited = round_days(uncapped - capped);
        let before = self.balance.balance;

        self.balance.balance = uncapped;
        self.balance.total_accrued = round_days(self.balance.total_accrued + rate);
        self.record(MovementKind::Accrual, rate, None, due);
        if forfeited > 0.0 {
            self.balance.balance = capped;
            self.record(MovementKind::AccrualCapForfeit, -forfeited, None, due);
        }
        self.balance.last_accrual_date = Some(due);
        self.balance.next_accrual_date = Some(add_months(due, months));

        AccrualOutcome::Applied {
            credited: round_days(capped - before).max(0.0),
            forfeited,
        }
    }

    /// Credits every period still due inside the closing balance year, so the
    /// year-end rollover sees them. Does nothing until `today` is past Dec 31.
    pub fn accrue_closing_year(
        &mut self,
        today: NaiveDate,
        observed_last: Option<NaiveDate>,
    ) -> AccrualOutcome {
        let Some(year_end) = NaiveDate::from_ymd_opt(self.balance.balance_year, 12, 31) else {
            return AccrualOutcome::NotDue;
        };
        if today <= year_end {
            return AccrualOutcome::NotDue;
        }
        let mut outcome = AccrualOutcome::NotDue;
        let mut key = observed_last;
        while self.balance.next_accrual_date.is_some_and(|d| d <= year_end) {
            match self.accrue(year_end, key) {
                applied @ AccrualOutcome::Applied { .. } => {
                    outcome = outcome.merge(applied);
                    key = self.balance.last_accrual_date;
                }
                other => {
                    if outcome == AccrualOutcome::NotDue {
                        outcome = other;
                    }
                    break;
                }
            }
        }
        outcome
    }

    /// Year-end carry-forward. Runs once per calendar year boundary.
    pub fn roll_over(&mut self, today: NaiveDate) -> RolloverOutcome {
        if today.year() <= self.balance.balance_year {
            return RolloverOutcome::NotDue;
        }
        let rollover_date = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);

        let unused = self.balance.balance.max(0.0);
        let keep = if self.policy.allow_carry_forward {
            match self.policy.carry_forward_limit {
                Some(limit) => unused.min(limit),
                None => unused,
            }
        } else {
            0.0
        };
        let headroom = (self.balance.balance - self.policy.min_balance).max(0.0);
        let forfeited = round_days((unused - keep).min(headroom));

        if forfeited > 0.0 {
            self.balance.balance = round_days(self.balance.balance - forfeited);
            self.record(
                MovementKind::CarryForwardForfeit,
                -forfeited,
                None,
                rollover_date,
            );
        }

        let retained = if self.policy.allow_carry_forward {
            self.balance.balance.max(0.0)
        } else {
            0.0
        };
        self.balance.carried_forward = retained;
        self.balance.carry_forward_expires_on = match self.policy.carry_forward_expiry_months {
            Some(months) if months > 0 && retained > 0.0 => Some(add_months(rollover_date, months)),
            _ => None,
        };
        self.balance.balance_year = today.year();

        RolloverOutcome::Applied {
            retained,
            forfeited,
        }
    }

    /// Forfeits what is left of the carried amount once it has expired.
    pub fn expire_carry_forward(&mut self, today: NaiveDate) -> f64 {
        match self.balance.carry_forward_expires_on {
            Some(expires_on) if today >= expires_on => {}
            _ => return 0.0,
        }
        let headroom = (self.balance.balance - self.policy.min_balance).max(0.0);
        let forfeited = round_days(self.balance.carried_forward.min(headroom));
        let expires_on = self.balance.carry_forward_expires_on.take().unwrap_or(today);
        self.balance.carried_forward = 0.0;
        if forfeited > 0.0 {
            self.balance.balance = round_days(self.balance.balance - forfeited);
            self.record(MovementKind::CarryForwardExpiry, -forfeited, None, expires_on);
        }
        forfeited
    }

    /// Converts `days` into a payout quote. Payroll pays it out.
    pub fn encash(&mut self, days: f64, on: NaiveDate) -> Result<f64, LeaveError> {
        if !self.policy.allow_encashment {
            return Err(LeaveError::policy(format!(
                "leave type {} does not allow encashment",
                self.policy.code
            )));
        }
        let Some(rate) = self.policy.encashment_rate else {
            return Err(LeaveError::policy(format!(
                "leave type {} has no encashment rate",
                self.policy.code
            )));
        };
        self.take(days)?;
        self.record(MovementKind::Encashment, -days, None, on);
        Ok(round_days(days * rate))
    }
}

/// Outcome of one accrual-job pass over a single ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowSettlement {
    pub rollover: RolloverOutcome,
    pub expired: f64,
    pub accrual: AccrualOutcome,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EncashmentQuote {
    pub employee_id: u64,
    pub leave_id: u64,
    pub days: f64,
    #[schema(example = 250.0)]
    pub amount: f64,
    pub balance_after: f64,
}

pub struct LeaveBalanceLedger<S> {
    store: Arc<S>,
}

impl<S: LeaveStore> LeaveBalanceLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn employee_in_org(&self, actor: &Actor, employee_id: u64) -> Result<Employee, LeaveError> {
        self.store
            .fetch_employee(employee_id)
            .await?
            .filter(|e| e.organization_id == actor.organization_id)
            .ok_or_else(|| LeaveError::not_found(format!("employee {employee_id}")))
    }

    async fn policy_in_org(&self, actor: &Actor, leave_id: u64) -> Result<LeaveType, LeaveError> {
        self.store
            .fetch_leave_type(leave_id)
            .await?
            .filter(|t| t.organization_id == actor.organization_id && !t.delete_flag)
            .ok_or_else(|| LeaveError::not_found(format!("leave type {leave_id}")))
    }

    /// Opens a ledger row at the policy's initial balance.
    pub async fn open(
        &self,
        actor: &Actor,
        key: BalanceKey,
        today: NaiveDate,
    ) -> Result<EmployeeLeaveBalance, LeaveError> {
        actor.require_approver()?;
        let employee = self.employee_in_org(actor, key.employee_id).await?;
        let policy = self.policy_in_org(actor, key.leave_id).await?;
        let (row, opening) = opening_row(&employee, &policy, today, Utc::now());
        let row = self.store.insert_balance(row, opening).await?;
        info!(
            employee_id = key.employee_id,
            leave_id = key.leave_id,
            balance = row.balance,
            "Opened leave balance"
        );
        Ok(row)
    }

    /// Returns the ledger row, opening it first if the employee has none yet.
    pub(crate) async fn ensure_open(
        &self,
        employee: &Employee,
        policy: &LeaveType,
        today: NaiveDate,
    ) -> Result<EmployeeLeaveBalance, LeaveError> {
        let key = BalanceKey {
            employee_id: employee.id,
            leave_id: policy.id,
        };
        if let Some(row) = self.store.fetch_balance(key).await? {
            return Ok(row);
        }
        let (row, opening) = opening_row(employee, policy, today, Utc::now());
        match self.store.insert_balance(row, opening).await {
            Ok(row) => {
                debug!(employee_id = key.employee_id, leave_id = key.leave_id, "Opened leave balance lazily");
                Ok(row)
            }
            // Lost a race against another opener; theirs is as good as ours.
            Err(LeaveError::Conflict(_)) => self
                .store
                .fetch_balance(key)
                .await?
                .ok_or_else(|| LeaveError::not_found("leave balance")),
            Err(e) => Err(e),
        }
    }

    pub async fn get(
        &self,
        actor: &Actor,
        key: BalanceKey,
    ) -> Result<EmployeeLeaveBalance, LeaveError> {
        actor.require_view_of(key.employee_id)?;
        self.store
            .fetch_balance(key)
            .await?
            .filter(|b| b.organization_id == actor.organization_id)
            .ok_or_else(|| LeaveError::not_found("leave balance"))
    }

    pub async fn list(
        &self,
        actor: &Actor,
        mut filter: BalanceFilter,
    ) -> Result<(Vec<EmployeeLeaveBalance>, i64), LeaveError> {
        filter.organization_id = actor.organization_id;
        if !actor.is_approver() {
            filter.employee_id = Some(actor.own_employee_id()?);
        }
        self.store.list_balances(&filter).await
    }

    pub async fn journal(
        &self,
        actor: &Actor,
        key: BalanceKey,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<LedgerEntry>, i64), LeaveError> {
        // Resolves access and existence before exposing movements.
        self.get(actor, key).await?;
        self.store.list_journal(key, page, per_page).await
    }

    pub async fn encash(
        &self,
        actor: &Actor,
        key: BalanceKey,
        days: f64,
        today: NaiveDate,
    ) -> Result<EncashmentQuote, LeaveError> {
        actor.require_approver()?;
        self.get(actor, key).await?;
        let quote = self
            .store
            .update_balance_with(key, |txn| {
                let amount = txn.encash(days, today)?;
                Ok(EncashmentQuote {
                    employee_id: key.employee_id,
                    leave_id: key.leave_id,
                    days,
                    amount,
                    balance_after: txn.balance.balance,
                })
            })
            .await?;
        info!(
            employee_id = key.employee_id,
            leave_id = key.leave_id,
            days,
            amount = quote.amount,
            "Encashed leave"
        );
        Ok(quote)
    }

    /// Closing-year accruals, rollover, expiry and the current period's accrual
    /// for one row, in that order, in one transaction.
    pub async fn settle(
        &self,
        key: BalanceKey,
        today: NaiveDate,
    ) -> Result<RowSettlement, LeaveError> {
        let observed = self
            .store
            .fetch_balance(key)
            .await?
            .ok_or_else(|| LeaveError::not_found("leave balance"))?
            .last_accrual_date;
        self.store
            .update_balance_with(key, |txn| {
                let closing = txn.accrue_closing_year(today, observed);
                let accrual_key = match closing {
                    AccrualOutcome::Applied { .. } => txn.balance.last_accrual_date,
                    _ => observed,
                };
                let rollover = txn.roll_over(today);
                let expired = txn.expire_carry_forward(today);
                let accrual = closing.merge(txn.accrue(today, accrual_key));
                Ok(RowSettlement {
                    rollover,
                    expired,
                    accrual,
                })
            })
            .await
    }
}
