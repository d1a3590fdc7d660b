//! MySQL-backed [`LeaveStore`].
//!
//! Queries are checked at runtime. Ledger mutations run in one transaction
//! that locks the affected rows with `SELECT ... FOR UPDATE`; dropping the
//! transaction on an error rolls it back.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, MySqlConnection, MySqlPool};

use super::{LeaveStore, page_window};
use crate::error::{LeaveError, StoreError};
use crate::leave::ledger::LedgerTxn;
use crate::model::employee::Employee;
use crate::model::leave_balance::{
    BalanceFilter, BalanceKey, EmployeeLeaveBalance, LedgerEntry, LedgerMovement, MovementKind,
};
use crate::model::leave_request::{
    ApprovalEntry, Attachment, LeaveRequest, LeaveRequestFilter, LeaveStatus, StatisticsFilter,
    StatusTotal,
};
use crate::model::leave_type::{LeaveType, LeaveTypeDraft, LeaveTypeFilter};

const LEAVE_TYPE_COLUMNS: &str = "id, organization_id, code, name, description, category, is_paid, \
    accrual_method, accrual_rate, initial_balance, min_balance, max_balance, allow_carry_forward, \
    carry_forward_limit, carry_forward_expiry_months, allow_encashment, encashment_rate, \
    requires_approval, approval_levels, auto_approve_for_days, requires_documentation, \
    required_documents, min_service_months, min_advance_notice_days, max_consecutive_days, \
    blackout_dates, active_flag, delete_flag, created_at, updated_at";

const BALANCE_COLUMNS: &str = "employee_id, leave_id, organization_id, balance, total_accrued, \
    total_consumed, last_accrual_date, next_accrual_date, carried_forward, \
    carry_forward_expires_on, balance_year, updated_at";

const REQUEST_COLUMNS: &str = "id, employee_id, leave_id, organization_id, start_date, end_date, \
    total_days, is_half_day, status, reason, comments, approver_comments, approved_at, \
    rejected_at, cancelled_at, work_handover_to, handover_notes, emergency_contact_name, \
    emergency_contact_phone, attachments, approvals, debited_days, created_at, updated_at";

fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, StoreError> {
    T::from_str(value).map_err(|_| StoreError::Corrupt(format!("{column} = '{value}'")))
}

/// Maps a unique-key violation to `Conflict`; everything else is a store failure.
fn conflict_on_duplicate(e: sqlx::Error, message: String) -> LeaveError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => LeaveError::Conflict(message),
        _ => e.into(),
    }
}

// Typed values for dynamically built WHERE clauses.
enum FilterValue {
    U64(u64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
}

struct WhereClause {
    sql: String,
    args: Vec<FilterValue>,
}

impl WhereClause {
    fn new(first: &str, value: FilterValue) -> Self {
        Self {
            sql: format!(" WHERE {first}"),
            args: vec![value],
        }
    }

    fn and(&mut self, condition: &str, value: FilterValue) {
        self.sql.push_str(" AND ");
        self.sql.push_str(condition);
        self.args.push(value);
    }
}

macro_rules! bind_filters {
    ($query:expr, $args:expr) => {{
        let mut q = $query;
        for arg in $args {
            q = match arg {
                FilterValue::U64(v) => q.bind(*v),
                FilterValue::Bool(v) => q.bind(*v),
                FilterValue::Text(v) => q.bind(v.clone()),
                FilterValue::Date(v) => q.bind(*v),
            };
        }
        q
    }};
}

#[derive(FromRow)]
struct LeaveTypeRow {
    id: u64,
    organization_id: u64,
    code: String,
    name: String,
    description: Option<String>,
    category: String,
    is_paid: bool,
    accrual_method: String,
    accrual_rate: f64,
    initial_balance: f64,
    min_balance: f64,
    max_balance: Option<f64>,
    allow_carry_forward: bool,
    carry_forward_limit: Option<f64>,
    carry_forward_expiry_months: Option<u32>,
    allow_encashment: bool,
    encashment_rate: Option<f64>,
    requires_approval: bool,
    approval_levels: u32,
    auto_approve_for_days: f64,
    requires_documentation: bool,
    required_documents: Json<Vec<String>>,
    min_service_months: u32,
    min_advance_notice_days: u32,
    max_consecutive_days: Option<f64>,
    blackout_dates: Json<Vec<NaiveDate>>,
    active_flag: bool,
    delete_flag: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveTypeRow> for LeaveType {
    type Error = StoreError;

    fn try_from(row: LeaveTypeRow) -> Result<Self, Self::Error> {
        Ok(LeaveType {
            id: row.id,
            organization_id: row.organization_id,
            code: row.code,
            name: row.name,
            description: row.description,
            category: parse_column("leave_types.category", &row.category)?,
            is_paid: row.is_paid,
            accrual_method: parse_column("leave_types.accrual_method", &row.accrual_method)?,
            accrual_rate: row.accrual_rate,
            initial_balance: row.initial_balance,
            min_balance: row.min_balance,
            max_balance: row.max_balance,
            allow_carry_forward: row.allow_carry_forward,
            carry_forward_limit: row.carry_forward_limit,
            carry_forward_expiry_months: row.carry_forward_expiry_months,
            allow_encashment: row.allow_encashment,
            encashment_rate: row.encashment_rate,
            requires_approval: row.requires_approval,
            approval_levels: row.approval_levels,
            auto_approve_for_days: row.auto_approve_for_days,
            requires_documentation: row.requires_documentation,
            required_documents: row.required_documents.0,
            min_service_months: row.min_service_months,
            min_advance_notice_days: row.min_advance_notice_days,
            max_consecutive_days: row.max_consecutive_days,
            blackout_dates: row.blackout_dates.0,
            active_flag: row.active_flag,
            delete_flag: row.delete_flag,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct LedgerEntryRow {
    id: u64,
    employee_id: u64,
    leave_id: u64,
    request_id: Option<u64>,
    kind: String,
    days: f64,
    balance_after: f64,
    effective_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: row.id,
            employee_id: row.employee_id,
            leave_id: row.leave_id,
            request_id: row.request_id,
            kind: parse_column::<MovementKind>("leave_ledger_entries.kind", &row.kind)?,
            days: row.days,
            balance_after: row.balance_after,
            effective_date: row.effective_date,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct LeaveRequestRow {
    id: u64,
    employee_id: u64,
    leave_id: u64,
    organization_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_days: f64,
    is_half_day: bool,
    status: String,
    reason: Option<String>,
    comments: Option<String>,
    approver_comments: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    work_handover_to: Option<u64>,
    handover_notes: Option<String>,
    emergency_contact_name: Option<String>,
    emergency_contact_phone: Option<String>,
    attachments: Json<Vec<Attachment>>,
    approvals: Json<Vec<ApprovalEntry>>,
    debited_days: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_id: row.leave_id,
            organization_id: row.organization_id,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
            is_half_day: row.is_half_day,
            status: parse_column("leave_requests.status", &row.status)?,
            reason: row.reason,
            comments: row.comments,
            approver_comments: row.approver_comments,
            approved_at: row.approved_at,
            rejected_at: row.rejected_at,
            cancelled_at: row.cancelled_at,
            work_handover_to: row.work_handover_to,
            handover_notes: row.handover_notes,
            emergency_contact_name: row.emergency_contact_name,
            emergency_contact_phone: row.emergency_contact_phone,
            attachments: row.attachments.0,
            approvals: row.approvals.0,
            debited_days: row.debited_days,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, LeaveError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter()
        .map(|r| T::try_from(r).map_err(LeaveError::from))
        .collect()
}

async fn select_leave_type(
    conn: &mut MySqlConnection,
    leave_id: u64,
) -> Result<Option<LeaveType>, LeaveError> {
    let sql = format!("SELECT {LEAVE_TYPE_COLUMNS} FROM leave_types WHERE id = ?");
    let row = sqlx::query_as::<_, LeaveTypeRow>(&sql)
        .bind(leave_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(LeaveType::try_from).transpose()?)
}

async fn lock_balance(
    conn: &mut MySqlConnection,
    key: BalanceKey,
) -> Result<LedgerTxn, LeaveError> {
    let sql = format!(
        "SELECT {BALANCE_COLUMNS} FROM employee_leaves WHERE employee_id = ? AND leave_id = ? FOR UPDATE"
    );
    let balance = sqlx::query_as::<_, EmployeeLeaveBalance>(&sql)
        .bind(key.employee_id)
        .bind(key.leave_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LeaveError::not_found("leave balance"))?;
    let policy = select_leave_type(conn, key.leave_id)
        .await?
        .ok_or_else(|| LeaveError::not_found(format!("leave type {}", key.leave_id)))?;
    Ok(LedgerTxn::new(policy, balance))
}

async fn insert_movements(
    conn: &mut MySqlConnection,
    key: BalanceKey,
    movements: &[LedgerMovement],
) -> Result<(), LeaveError> {
    for m in movements {
        sqlx::query(
            r#"
            INSERT INTO leave_ledger_entries
                (employee_id, leave_id, request_id, kind, days, balance_after, effective_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(key.employee_id)
        .bind(key.leave_id)
        .bind(m.request_id)
        .bind(m.kind.as_ref())
        .bind(m.days)
        .bind(m.balance_after)
        .bind(m.effective_date)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Writes the locked row back and journals its movements.
async fn write_txn(
    conn: &mut MySqlConnection,
    txn: LedgerTxn,
    request_id: Option<u64>,
) -> Result<(), LeaveError> {
    let (row, mut movements) = txn.into_parts();
    if request_id.is_some() {
        for m in movements.iter_mut().filter(|m| m.request_id.is_none()) {
            m.request_id = request_id;
        }
    }
    sqlx::query(
        r#"
        UPDATE employee_leaves
        SET balance = ?, total_accrued = ?, total_consumed = ?, last_accrual_date = ?,
            next_accrual_date = ?, carried_forward = ?, carry_forward_expires_on = ?,
            balance_year = ?, updated_at = ?
        WHERE employee_id = ? AND leave_id = ?
        "#,
    )
    .bind(row.balance)
    .bind(row.total_accrued)
    .bind(row.total_consumed)
    .bind(row.last_accrual_date)
    .bind(row.next_accrual_date)
    .bind(row.carried_forward)
    .bind(row.carry_forward_expires_on)
    .bind(row.balance_year)
    .bind(Utc::now())
    .bind(row.employee_id)
    .bind(row.leave_id)
    .execute(&mut *conn)
    .await?;
    insert_movements(conn, row.key(), &movements).await
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl LeaveStore for MySqlStore {
    async fn fetch_employee(&self, employee_id: u64) -> Result<Option<Employee>, LeaveError> {
        let employee = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, organization_id, employee_code, first_name, last_name,
                   department_id, hire_date, status
            FROM employees
            WHERE id = ?
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn insert_leave_type(&self, draft: LeaveTypeDraft) -> Result<LeaveType, LeaveError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO leave_types
                (organization_id, code, name, description, category, is_paid, accrual_method,
                 accrual_rate, initial_balance, min_balance, max_balance, allow_carry_forward,
                 carry_forward_limit, carry_forward_expiry_months, allow_encashment,
                 encashment_rate, requires_approval, approval_levels, auto_approve_for_days,
                 requires_documentation, required_documents, min_service_months,
                 min_advance_notice_days, max_consecutive_days, blackout_dates, active_flag,
                 delete_flag, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?, ?)
            "#,
        )
        .bind(draft.organization_id)
        .bind(&draft.code)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.category.as_ref())
        .bind(draft.is_paid)
        .bind(draft.accrual_method.as_ref())
        .bind(draft.accrual_rate)
        .bind(draft.initial_balance)
        .bind(draft.min_balance)
        .bind(draft.max_balance)
        .bind(draft.allow_carry_forward)
        .bind(draft.carry_forward_limit)
        .bind(draft.carry_forward_expiry_months)
        .bind(draft.allow_encashment)
        .bind(draft.encashment_rate)
        .bind(draft.requires_approval)
        .bind(draft.approval_levels)
        .bind(draft.auto_approve_for_days)
        .bind(draft.requires_documentation)
        .bind(Json(&draft.required_documents))
        .bind(draft.min_service_months)
        .bind(draft.min_advance_notice_days)
        .bind(draft.max_consecutive_days)
        .bind(Json(&draft.blackout_dates))
        .bind(draft.active_flag)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_duplicate(e, format!("leave type code {} already exists", draft.code))
        })?;

        Ok(draft.into_leave_type(result.last_insert_id(), now))
    }

    async fn update_leave_type(&self, t: &LeaveType) -> Result<(), LeaveError> {
        sqlx::query(
            r#"
            UPDATE leave_types
            SET code = ?, name = ?, description = ?, category = ?, is_paid = ?,
                accrual_method = ?, accrual_rate = ?, initial_balance = ?, min_balance = ?,
                max_balance = ?, allow_carry_forward = ?, carry_forward_limit = ?,
                carry_forward_expiry_months = ?, allow_encashment = ?, encashment_rate = ?,
                requires_approval = ?, approval_levels = ?, auto_approve_for_days = ?,
                requires_documentation = ?, required_documents = ?, min_service_months = ?,
                min_advance_notice_days = ?, max_consecutive_days = ?, blackout_dates = ?,
                active_flag = ?, delete_flag = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&t.code)
        .bind(&t.name)
        .bind(&t.description)
        .bind(t.category.as_ref())
        .bind(t.is_paid)
        .bind(t.accrual_method.as_ref())
        .bind(t.accrual_rate)
        .bind(t.initial_balance)
        .bind(t.min_balance)
        .bind(t.max_balance)
        .bind(t.allow_carry_forward)
        .bind(t.carry_forward_limit)
        .bind(t.carry_forward_expiry_months)
        .bind(t.allow_encashment)
        .bind(t.encashment_rate)
        .bind(t.requires_approval)
        .bind(t.approval_levels)
        .bind(t.auto_approve_for_days)
        .bind(t.requires_documentation)
        .bind(Json(&t.required_documents))
        .bind(t.min_service_months)
        .bind(t.min_advance_notice_days)
        .bind(t.max_consecutive_days)
        .bind(Json(&t.blackout_dates))
        .bind(t.active_flag)
        .bind(t.delete_flag)
        .bind(t.updated_at)
        .bind(t.id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, format!("leave type code {} already exists", t.code)))?;
        Ok(())
    }

    async fn fetch_leave_type(&self, leave_id: u64) -> Result<Option<LeaveType>, LeaveError> {
        let mut conn = self.pool.acquire().await?;
        select_leave_type(&mut conn, leave_id).await
    }

    async fn list_leave_types(
        &self,
        filter: &LeaveTypeFilter,
    ) -> Result<(Vec<LeaveType>, i64), LeaveError> {
        let (_, per_page, offset) = page_window(filter.page, filter.per_page);

        let mut clause = WhereClause::new("organization_id = ?", FilterValue::U64(filter.organization_id));
        clause.and("delete_flag = ?", FilterValue::Bool(false));
        if let Some(active) = filter.active {
            clause.and("active_flag = ?", FilterValue::Bool(active));
        }
        if let Some(category) = filter.category {
            clause.and("category = ?", FilterValue::Text(category.to_string()));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            clause.and("(name LIKE ?", FilterValue::Text(pattern.clone()));
            clause.sql.push_str(" OR code LIKE ?)");
            clause.args.push(FilterValue::Text(pattern));
        }

        let count_sql = format!("SELECT COUNT(*) FROM leave_types{}", clause.sql);
        let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &clause.args)
            .fetch_one(&self.pool)
            .await?;

        let data_sql = format!(
            "SELECT {LEAVE_TYPE_COLUMNS} FROM leave_types{} ORDER BY name, id LIMIT ? OFFSET ?",
            clause.sql
        );
        let rows = bind_filters!(sqlx::query_as::<_, LeaveTypeRow>(&data_sql), &clause.args)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((convert_all(rows)?, total))
    }

    async fn insert_balance(
        &self,
        balance: EmployeeLeaveBalance,
        opening: LedgerMovement,
    ) -> Result<EmployeeLeaveBalance, LeaveError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO employee_leaves
                (employee_id, leave_id, organization_id, balance, total_accrued, total_consumed,
                 last_accrual_date, next_accrual_date, carried_forward, carry_forward_expires_on,
                 balance_year, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(balance.employee_id)
        .bind(balance.leave_id)
        .bind(balance.organization_id)
        .bind(balance.balance)
        .bind(balance.total_accrued)
        .bind(balance.total_consumed)
        .bind(balance.last_accrual_date)
        .bind(balance.next_accrual_date)
        .bind(balance.carried_forward)
        .bind(balance.carry_forward_expires_on)
        .bind(balance.balance_year)
        .bind(balance.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_duplicate(e, "leave balance already open".to_string()))?;

        insert_movements(&mut tx, balance.key(), std::slice::from_ref(&opening)).await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn fetch_balance(
        &self,
        key: BalanceKey,
    ) -> Result<Option<EmployeeLeaveBalance>, LeaveError> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM employee_leaves WHERE employee_id = ? AND leave_id = ?"
        );
        let row = sqlx::query_as::<_, EmployeeLeaveBalance>(&sql)
            .bind(key.employee_id)
            .bind(key.leave_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_balances(
        &self,
        filter: &BalanceFilter,
    ) -> Result<(Vec<EmployeeLeaveBalance>, i64), LeaveError> {
        let (_, per_page, offset) = page_window(filter.page, filter.per_page);

        let mut clause = WhereClause::new("organization_id = ?", FilterValue::U64(filter.organization_id));
        if let Some(employee_id) = filter.employee_id {
            clause.and("employee_id = ?", FilterValue::U64(employee_id));
        }
        if let Some(leave_id) = filter.leave_id {
            clause.and("leave_id = ?", FilterValue::U64(leave_id));
        }

        let count_sql = format!("SELECT COUNT(*) FROM employee_leaves{}", clause.sql);
        let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &clause.args)
            .fetch_one(&self.pool)
            .await?;

        let data_sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM employee_leaves{} ORDER BY employee_id, leave_id LIMIT ? OFFSET ?",
            clause.sql
        );
        let rows = bind_filters!(sqlx::query_as::<_, EmployeeLeaveBalance>(&data_sql), &clause.args)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn due_balances(&self, today: NaiveDate) -> Result<Vec<BalanceKey>, LeaveError> {
        let keys = sqlx::query_as::<_, (u64, u64)>(
            r#"
            SELECT employee_id, leave_id
            FROM employee_leaves
            WHERE next_accrual_date <= ?
               OR balance_year < ?
               OR carry_forward_expires_on <= ?
            ORDER BY employee_id, leave_id
            "#,
        )
        .bind(today)
        .bind(today.year())
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys
            .into_iter()
            .map(|(employee_id, leave_id)| BalanceKey {
                employee_id,
                leave_id,
            })
            .collect())
    }

    async fn list_journal(
        &self,
        key: BalanceKey,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<LedgerEntry>, i64), LeaveError> {
        let (_, per_page, offset) = page_window(page, per_page);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM leave_ledger_entries WHERE employee_id = ? AND leave_id = ?",
        )
        .bind(key.employee_id)
        .bind(key.leave_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT id, employee_id, leave_id, request_id, kind, days, balance_after,
                   effective_date, created_at
            FROM leave_ledger_entries
            WHERE employee_id = ? AND leave_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(key.employee_id)
        .bind(key.leave_id)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((convert_all(rows)?, total))
    }

    async fn update_balance_with<T, F>(&self, key: BalanceKey, f: F) -> Result<T, LeaveError>
    where
        F: FnOnce(&mut LedgerTxn) -> Result<T, LeaveError>,
    {
        let mut tx = self.pool.begin().await?;
        let mut txn = lock_balance(&mut tx, key).await?;
        let out = f(&mut txn)?;
        write_txn(&mut tx, txn, None).await?;
        tx.commit().await?;
        Ok(out)
    }

    async fn fetch_request(&self, request_id: u64) -> Result<Option<LeaveRequest>, LeaveError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ?");
        let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(LeaveRequest::try_from).transpose()?)
    }

    async fn list_requests(
        &self,
        filter: &LeaveRequestFilter,
    ) -> Result<(Vec<LeaveRequest>, i64), LeaveError> {
        let (_, per_page, offset) = page_window(filter.page, filter.per_page);

        let mut clause = WhereClause::new("organization_id = ?", FilterValue::U64(filter.organization_id));
        if let Some(employee_id) = filter.employee_id {
            clause.and("employee_id = ?", FilterValue::U64(employee_id));
        }
        if let Some(leave_id) = filter.leave_id {
            clause.and("leave_id = ?", FilterValue::U64(leave_id));
        }
        if let Some(status) = filter.status {
            clause.and("status = ?", FilterValue::Text(status.to_string()));
        }
        if let Some(from) = filter.from {
            clause.and("end_date >= ?", FilterValue::Date(from));
        }
        if let Some(to) = filter.to {
            clause.and("start_date <= ?", FilterValue::Date(to));
        }

        let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", clause.sql);
        let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &clause.args)
            .fetch_one(&self.pool)
            .await?;

        let data_sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            clause.sql
        );
        let rows = bind_filters!(sqlx::query_as::<_, LeaveRequestRow>(&data_sql), &clause.args)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((convert_all(rows)?, total))
    }

    async fn overlapping_requests(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, LeaveError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests \
             WHERE employee_id = ? AND status IN (?, ?) AND start_date <= ? AND end_date >= ? \
             ORDER BY start_date"
        );
        let rows = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(employee_id)
            .bind(LeaveStatus::Pending.as_ref())
            .bind(LeaveStatus::Approved.as_ref())
            .bind(end)
            .bind(start)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn insert_request_with<F>(
        &self,
        mut request: LeaveRequest,
        f: F,
    ) -> Result<LeaveRequest, LeaveError>
    where
        F: FnOnce(&mut LeaveRequest, &mut LedgerTxn) -> Result<(), LeaveError>,
    {
        let mut tx = self.pool.begin().await?;
        let mut txn = lock_balance(
            &mut tx,
            BalanceKey {
                employee_id: request.employee_id,
                leave_id: request.leave_id,
            },
        )
        .await?;
        f(&mut request, &mut txn)?;

        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (employee_id, leave_id, organization_id, start_date, end_date, total_days,
                 is_half_day, status, reason, comments, approver_comments, approved_at,
                 rejected_at, cancelled_at, work_handover_to, handover_notes,
                 emergency_contact_name, emergency_contact_phone, attachments, approvals,
                 debited_days, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.employee_id)
        .bind(request.leave_id)
        .bind(request.organization_id)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.total_days)
        .bind(request.is_half_day)
        .bind(request.status.as_ref())
        .bind(&request.reason)
        .bind(&request.comments)
        .bind(&request.approver_comments)
        .bind(request.approved_at)
        .bind(request.rejected_at)
        .bind(request.cancelled_at)
        .bind(request.work_handover_to)
        .bind(&request.handover_notes)
        .bind(&request.emergency_contact_name)
        .bind(&request.emergency_contact_phone)
        .bind(Json(&request.attachments))
        .bind(Json(&request.approvals))
        .bind(request.debited_days)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *tx)
        .await?;

        request.id = result.last_insert_id();
        write_txn(&mut tx, txn, Some(request.id)).await?;
        tx.commit().await?;
        Ok(request)
    }

    async fn update_request_with<T, F>(&self, request_id: u64, f: F) -> Result<T, LeaveError>
    where
        F: FnOnce(&mut LeaveRequest, &mut LedgerTxn) -> Result<T, LeaveError>,
    {
        let mut tx = self.pool.begin().await?;
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE");
        let mut request: LeaveRequest = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LeaveError::not_found(format!("leave request {request_id}")))?
            .try_into()?;
        let mut txn = lock_balance(
            &mut tx,
            BalanceKey {
                employee_id: request.employee_id,
                leave_id: request.leave_id,
            },
        )
        .await?;

        let out = f(&mut request, &mut txn)?;

        sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, comments = ?, approver_comments = ?, approved_at = ?,
                rejected_at = ?, cancelled_at = ?, approvals = ?, debited_days = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(request.status.as_ref())
        .bind(&request.comments)
        .bind(&request.approver_comments)
        .bind(request.approved_at)
        .bind(request.rejected_at)
        .bind(request.cancelled_at)
        .bind(Json(&request.approvals))
        .bind(request.debited_days)
        .bind(request.updated_at)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        write_txn(&mut tx, txn, Some(request_id)).await?;
        tx.commit().await?;
        Ok(out)
    }

    async fn status_totals(
        &self,
        filter: &StatisticsFilter,
    ) -> Result<Vec<StatusTotal>, LeaveError> {
        let mut clause = WhereClause::new("r.organization_id = ?", FilterValue::U64(filter.organization_id));
        if let Some(from) = filter.from {
            clause.and("r.start_date >= ?", FilterValue::Date(from));
        }
        if let Some(to) = filter.to {
            clause.and("r.start_date <= ?", FilterValue::Date(to));
        }
        if let Some(department_id) = filter.department_id {
            clause.and("e.department_id = ?", FilterValue::U64(department_id));
        }
        if let Some(leave_id) = filter.leave_id {
            clause.and("r.leave_id = ?", FilterValue::U64(leave_id));
        }

        let sql = format!(
            r#"
            SELECT r.status, COUNT(*), SUM(r.total_days)
            FROM leave_requests r
            LEFT JOIN employees e ON e.id = r.employee_id
            {}
            GROUP BY r.status
            "#,
            clause.sql
        );
        let rows = bind_filters!(sqlx::query_as::<_, (String, i64, f64)>(&sql), &clause.args)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(status, requests, days)| -> Result<StatusTotal, LeaveError> {
                Ok(StatusTotal {
                    status: parse_column("leave_requests.status", &status)?,
                    requests,
                    days,
                })
            })
            .collect()
    }
}
