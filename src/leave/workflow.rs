use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Actor;
use super::catalog::LeaveTypeCatalog;
use super::ledger::{LeaveBalanceLedger, round_days};
use crate::error::LeaveError;
use crate::model::employee::Employee;
use crate::model::leave_balance::BalanceKey;
use crate::model::leave_request::{
    ApprovalDecision, ApprovalEntry, Attachment, LeaveRequest, LeaveRequestFilter, LeaveStatus,
};
use crate::model::leave_type::LeaveType;
use crate::store::LeaveStore;

const MAX_BULK_ITEMS: usize = 100;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitLeave {
    /// Only HR/Admin may submit for someone else; defaults to the caller.
    pub employee_id: Option<u64>,
    #[schema(example = 7)]
    pub leave_id: u64,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-04", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_half_day: bool,
    pub reason: Option<String>,
    pub comments: Option<String>,
    pub work_handover_to: Option<u64>,
    pub handover_notes: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct Decision {
    #[schema(example = "Enjoy your time off")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkDecision {
    #[schema(example = json!([1, 2, 3]))]
    pub request_ids: Vec<u64>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkItemOutcome {
    pub request_id: u64,
    pub succeeded: bool,
    pub status: Option<LeaveStatus>,
    /// Error kind, e.g. `insufficient_balance`.
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkOutcome {
    /// Correlates the log lines of one bulk call.
    pub batch_id: String,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemOutcome>,
}

/// Inclusive calendar days, or half a day.
pub fn requested_days(start: NaiveDate, end: NaiveDate, is_half_day: bool) -> f64 {
    if is_half_day {
        0.5
    } else {
        ((end - start).num_days() + 1) as f64
    }
}

fn validate_dates(payload: &SubmitLeave) -> Result<(), LeaveError> {
    if payload.start_date > payload.end_date {
        return Err(LeaveError::validation("start_date must not be after end_date"));
    }
    if payload.is_half_day && payload.start_date != payload.end_date {
        return Err(LeaveError::validation(
            "a half-day request must start and end on the same day",
        ));
    }
    Ok(())
}

/// Policy limits a submission must satisfy. The first violated limit is reported.
pub fn check_policy_limits(
    policy: &LeaveType,
    employee: &Employee,
    payload: &SubmitLeave,
    total_days: f64,
    today: NaiveDate,
) -> Result<(), LeaveError> {
    let notice = (payload.start_date - today).num_days();
    if notice < i64::from(policy.min_advance_notice_days) {
        return Err(LeaveError::policy(format!(
            "{} requires {} days advance notice, got {}",
            policy.code, policy.min_advance_notice_days, notice
        )));
    }

    let served = employee.service_months(today);
    if served < policy.min_service_months {
        return Err(LeaveError::policy(format!(
            "{} requires {} months of service, employee has {}",
            policy.code, policy.min_service_months, served
        )));
    }

    if let Some(max) = policy.max_consecutive_days {
        if total_days > max {
            return Err(LeaveError::policy(format!(
                "{} allows at most {} consecutive days, requested {}",
                policy.code, max, total_days
            )));
        }
    }

    if policy.is_blackout(payload.start_date) {
        return Err(LeaveError::policy(format!(
            "{} is a blackout date for {}",
            payload.start_date, policy.code
        )));
    }

    if policy.requires_documentation {
        let missing: Vec<&str> = policy
            .required_documents
            .iter()
            .filter(|doc| !payload.attachments.iter().any(|a| &a.kind == *doc))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(LeaveError::policy(format!(
                "missing required documents: {}",
                missing.join(", ")
            )));
        }
    }

    Ok(())
}

fn invalid(from: LeaveStatus, action: &'static str) -> LeaveError {
    LeaveError::InvalidTransition { from, action }
}

pub struct LeaveRequestWorkflow<S> {
    store: Arc<S>,
    catalog: Arc<LeaveTypeCatalog<S>>,
    ledger: Arc<LeaveBalanceLedger<S>>,
}

impl<S: LeaveStore> LeaveRequestWorkflow<S> {
    pub fn new(
        store: Arc<S>,
        catalog: Arc<LeaveTypeCatalog<S>>,
        ledger: Arc<LeaveBalanceLedger<S>>,
    ) -> Self {
        Self {
            store,
            catalog,
            ledger,
        }
    }

    async fn request_in_org(&self, actor: &Actor, request_id: u64) -> Result<LeaveRequest, LeaveError> {
        self.store
            .fetch_request(request_id)
            .await?
            .filter(|r| r.organization_id == actor.organization_id)
            .ok_or_else(|| LeaveError::not_found(format!("leave request {request_id}")))
    }

    #[instrument(skip_all, fields(user_id = actor.user_id, leave_id = payload.leave_id))]
    pub async fn submit(
        &self,
        actor: &Actor,
        payload: SubmitLeave,
        today: NaiveDate,
    ) -> Result<LeaveRequest, LeaveError> {
        let employee_id = match payload.employee_id {
            Some(id) if actor.employee_id != Some(id) => {
                actor.require_approver()?;
                id
            }
            Some(id) => id,
            None => actor.own_employee_id()?,
        };
        validate_dates(&payload)?;

        let employee = self
            .store
            .fetch_employee(employee_id)
            .await?
            .filter(|e| e.organization_id == actor.organization_id)
            .ok_or_else(|| LeaveError::not_found(format!("employee {employee_id}")))?;
        let policy = self
            .catalog
            .policy(payload.leave_id)
            .await?
            .filter(|t| t.organization_id == actor.organization_id && !t.delete_flag)
            .ok_or_else(|| LeaveError::not_found(format!("leave type {}", payload.leave_id)))?;
        if !policy.is_usable() {
            return Err(LeaveError::validation(format!(
                "leave type {} is not active",
                policy.code
            )));
        }

        let total_days = requested_days(payload.start_date, payload.end_date, payload.is_half_day);
        check_policy_limits(&policy, &employee, &payload, total_days, today)?;

        let overlapping = self
            .store
            .overlapping_requests(employee_id, payload.start_date, payload.end_date)
            .await?;
        if let Some(existing) = overlapping.first() {
            return Err(LeaveError::policy(format!(
                "overlaps leave request {} ({} to {})",
                existing.id, existing.start_date, existing.end_date
            )));
        }

        let key = BalanceKey {
            employee_id,
            leave_id: policy.id,
        };
        let balance = match self.store.fetch_balance(key).await? {
            Some(row) => row.balance,
            None => policy.initial_balance,
        };
        let available = round_days(balance - policy.min_balance).max(0.0);
        if total_days > available {
            return Err(LeaveError::policy(format!(
                "requested {total_days} days, available balance {available}"
            )));
        }
        self.ledger.ensure_open(&employee, &policy, today).await?;

        let now = Utc::now();
        let request = LeaveRequest {
            id: 0,
            employee_id,
            leave_id: policy.id,
            organization_id: actor.organization_id,
            start_date: payload.start_date,
            end_date: payload.end_date,
            total_days,
            is_half_day: payload.is_half_day,
            status: LeaveStatus::Pending,
            reason: payload.reason,
            comments: payload.comments,
            approver_comments: None,
            approved_at: None,
            rejected_at: None,
            cancelled_at: None,
            work_handover_to: payload.work_handover_to,
            handover_notes: payload.handover_notes,
            emergency_contact_name: payload.emergency_contact_name,
            emergency_contact_phone: payload.emergency_contact_phone,
            attachments: payload.attachments,
            approvals: Vec::new(),
            debited_days: 0.0,
            created_at: now,
            updated_at: now,
        };

        let auto_approve = policy.auto_approves(total_days);
        let created = self
            .store
            .insert_request_with(request, |req, txn| {
                if auto_approve {
                    txn.debit(req.total_days, None, today)?;
                    req.status = LeaveStatus::Approved;
                    req.approved_at = Some(now);
                    req.debited_days = req.total_days;
                    req.approvals.push(ApprovalEntry {
                        level: req.next_approval_level(),
                        approver_id: None,
                        decision: ApprovalDecision::AutoApproved,
                        comments: None,
                        decided_at: now,
                    });
                }
                Ok(())
            })
            .await?;

        info!(
            request_id = created.id,
            employee_id,
            total_days,
            status = %created.status,
            "Submitted leave request"
        );
        Ok(created)
    }

    #[instrument(skip_all, fields(user_id = actor.user_id, request_id = request_id))]
    pub async fn approve(
        &self,
        actor: &Actor,
        request_id: u64,
        decision: Decision,
        today: NaiveDate,
    ) -> Result<LeaveRequest, LeaveError> {
        actor.require_approver()?;
        self.request_in_org(actor, request_id).await?;

        let now = Utc::now();
        let approver = actor.user_id;
        let approved = self
            .store
            .update_request_with(request_id, |req, txn| {
                if req.status != LeaveStatus::Pending {
                    return Err(invalid(req.status, "approve"));
                }
                txn.debit(req.total_days, Some(req.id), today)?;
                req.status = LeaveStatus::Approved;
                req.approved_at = Some(now);
                req.updated_at = now;
                req.debited_days = req.total_days;
                req.approver_comments = decision.comments.clone();
                req.approvals.push(ApprovalEntry {
                    level: req.next_approval_level(),
                    approver_id: Some(approver),
                    decision: ApprovalDecision::Approved,
                    comments: decision.comments,
                    decided_at: now,
                });
                Ok(req.clone())
            })
            .await?;

        info!(request_id, days = approved.debited_days, "Approved leave request");
        Ok(approved)
    }

    #[instrument(skip_all, fields(user_id = actor.user_id, request_id = request_id))]
    pub async fn reject(
        &self,
        actor: &Actor,
        request_id: u64,
        decision: Decision,
    ) -> Result<LeaveRequest, LeaveError> {
        actor.require_approver()?;
        self.request_in_org(actor, request_id).await?;

        let now = Utc::now();
        let approver = actor.user_id;
        let rejected = self
            .store
            .update_request_with(request_id, |req, _txn| {
                if req.status != LeaveStatus::Pending {
                    return Err(invalid(req.status, "reject"));
                }
                req.status = LeaveStatus::Rejected;
                req.rejected_at = Some(now);
                req.updated_at = now;
                req.approver_comments = decision.comments.clone();
                req.approvals.push(ApprovalEntry {
                    level: req.next_approval_level(),
                    approver_id: Some(approver),
                    decision: ApprovalDecision::Rejected,
                    comments: decision.comments,
                    decided_at: now,
                });
                Ok(req.clone())
            })
            .await?;

        info!(request_id, "Rejected leave request");
        Ok(rejected)
    }

    /// PENDING or APPROVED to CANCELLED. Approved days go back to the ledger.
    #[instrument(skip_all, fields(user_id = actor.user_id, request_id = request_id))]
    pub async fn cancel(
        &self,
        actor: &Actor,
        request_id: u64,
        decision: Decision,
        today: NaiveDate,
    ) -> Result<LeaveRequest, LeaveError> {
        let current = self.request_in_org(actor, request_id).await?;
        actor.require_view_of(current.employee_id)?;

        let now = Utc::now();
        let cancelled = self
            .store
            .update_request_with(request_id, |req, txn| {
                match req.status {
                    LeaveStatus::Pending => {}
                    LeaveStatus::Approved => {
                        txn.credit_back(req.debited_days, Some(req.id), today);
                        req.debited_days = 0.0;
                    }
                    closed => return Err(invalid(closed, "cancel")),
                }
                req.status = LeaveStatus::Cancelled;
                req.cancelled_at = Some(now);
                req.updated_at = now;
                if decision.comments.is_some() {
                    req.comments = decision.comments;
                }
                Ok(req.clone())
            })
            .await?;

        info!(request_id, "Cancelled leave request");
        Ok(cancelled)
    }

    pub async fn get(&self, actor: &Actor, request_id: u64) -> Result<LeaveRequest, LeaveError> {
        let request = self.request_in_org(actor, request_id).await?;
        actor.require_view_of(request.employee_id)?;
        Ok(request)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        mut filter: LeaveRequestFilter,
    ) -> Result<(Vec<LeaveRequest>, i64), LeaveError> {
        filter.organization_id = actor.organization_id;
        if !actor.is_approver() {
            filter.employee_id = Some(actor.own_employee_id()?);
        }
        self.store.list_requests(&filter).await
    }

    pub async fn bulk_approve(
        &self,
        actor: &Actor,
        payload: BulkDecision,
        today: NaiveDate,
    ) -> Result<BulkOutcome, LeaveError> {
        actor.require_approver()?;
        validate_bulk(&payload)?;
        let batch_id = Uuid::new_v4().to_string();
        let mut results = Vec::with_capacity(payload.request_ids.len());
        for &request_id in &payload.request_ids {
            let decision = Decision {
                comments: payload.comments.clone(),
            };
            let result = self.approve(actor, request_id, decision, today).await;
            results.push(item_outcome(&batch_id, request_id, result));
        }
        Ok(summarize(batch_id, "approve", results))
    }

    pub async fn bulk_reject(
        &self,
        actor: &Actor,
        payload: BulkDecision,
    ) -> Result<BulkOutcome, LeaveError> {
        actor.require_approver()?;
        validate_bulk(&payload)?;
        let batch_id = Uuid::new_v4().to_string();
        let mut results = Vec::with_capacity(payload.request_ids.len());
        for &request_id in &payload.request_ids {
            let decision = Decision {
                comments: payload.comments.clone(),
            };
            let result = self.reject(actor, request_id, decision).await;
            results.push(item_outcome(&batch_id, request_id, result));
        }
        Ok(summarize(batch_id, "reject", results))
    }
}

fn validate_bulk(payload: &BulkDecision) -> Result<(), LeaveError> {
    if payload.request_ids.is_empty() {
        return Err(LeaveError::validation("request_ids must not be empty"));
    }
    if payload.request_ids.len() > MAX_BULK_ITEMS {
        return Err(LeaveError::validation(format!(
            "at most {MAX_BULK_ITEMS} requests per bulk call"
        )));
    }
    Ok(())
}

fn item_outcome(
    batch_id: &str,
    request_id: u64,
    result: Result<LeaveRequest, LeaveError>,
) -> BulkItemOutcome {
    match result {
        Ok(request) => BulkItemOutcome {
            request_id,
            succeeded: true,
            status: Some(request.status),
            error: None,
            message: None,
        },
        Err(e) => {
            warn!(batch_id, request_id, error = %e, "Bulk item failed");
            BulkItemOutcome {
                request_id,
                succeeded: false,
                status: None,
                error: Some(e.kind().to_string()),
                message: Some(e.public_message()),
            }
        }
    }
}

fn summarize(batch_id: String, action: &str, results: Vec<BulkItemOutcome>) -> BulkOutcome {
    let succeeded = results.iter().filter(|r| r.succeeded).count();
    let failed = results.len() - succeeded;
    info!(batch_id = %batch_id, action, succeeded, failed, "Finished bulk leave decision");
    BulkOutcome {
        batch_id,
        succeeded,
        failed,
        results,
    }
}
