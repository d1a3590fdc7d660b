use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use moka::future::Cache;
use serde::{Deserialize, Deserializer};
use tracing::info;
use utoipa::ToSchema;

use super::Actor;
use crate::error::LeaveError;
use crate::model::leave_type::{
    AccrualMethod, LeaveCategory, LeaveType, LeaveTypeDraft, LeaveTypeFilter,
};
use crate::store::LeaveStore;

const POLICY_CACHE_CAPACITY: u64 = 10_000;

fn default_true() -> bool {
    true
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLeaveType {
    #[schema(example = "AL")]
    pub code: String,
    #[schema(example = "Annual leave")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "ANNUAL")]
    pub category: String,
    #[serde(default = "default_true")]
    pub is_paid: bool,
    #[schema(example = "MONTHLY")]
    pub accrual_method: String,
    #[serde(default)]
    #[schema(example = 1.5)]
    pub accrual_rate: f64,
    #[serde(default)]
    pub initial_balance: f64,
    #[serde(default)]
    pub min_balance: f64,
    pub max_balance: Option<f64>,
    #[serde(default)]
    pub allow_carry_forward: bool,
    pub carry_forward_limit: Option<f64>,
    pub carry_forward_expiry_months: Option<u32>,
    #[serde(default)]
    pub allow_encashment: bool,
    pub encashment_rate: Option<f64>,
    /// Defaults to `true` when omitted.
    pub requires_approval: Option<bool>,
    pub approval_levels: Option<u32>,
    #[serde(default)]
    pub auto_approve_for_days: f64,
    #[serde(default)]
    pub requires_documentation: bool,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub min_service_months: u32,
    #[serde(default)]
    pub min_advance_notice_days: u32,
    pub max_consecutive_days: Option<f64>,
    #[serde(default)]
    #[schema(value_type = Vec<String>, example = json!(["2026-12-25"]))]
    pub blackout_dates: Vec<NaiveDate>,
    pub active_flag: Option<bool>,
}

/// Partial update. Omitted fields keep their stored value; `null` clears a
/// nullable field.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateLeaveType {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub is_paid: Option<bool>,
    pub accrual_method: Option<String>,
    pub accrual_rate: Option<f64>,
    pub initial_balance: Option<f64>,
    pub min_balance: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<f64>, nullable)]
    pub max_balance: Option<Option<f64>>,
    pub allow_carry_forward: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<f64>, nullable)]
    pub carry_forward_limit: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<u32>, nullable)]
    pub carry_forward_expiry_months: Option<Option<u32>>,
    pub allow_encashment: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<f64>, nullable)]
    pub encashment_rate: Option<Option<f64>>,
    pub requires_approval: Option<bool>,
    pub approval_levels: Option<u32>,
    pub auto_approve_for_days: Option<f64>,
    pub requires_documentation: Option<bool>,
    pub required_documents: Option<Vec<String>>,
    pub min_service_months: Option<u32>,
    pub min_advance_notice_days: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<f64>, nullable)]
    pub max_consecutive_days: Option<Option<f64>>,
    #[schema(value_type = Option<Vec<String>>)]
    pub blackout_dates: Option<Vec<NaiveDate>>,
}

fn parse_enum<T: FromStr>(field: &str, value: &str) -> Result<T, String> {
    T::from_str(value.trim()).map_err(|_| format!("{field} has invalid value '{value}'"))
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Checks every field of a policy and reports all problems at once.
pub fn validate_policy(policy: &LeaveType) -> Result<(), LeaveError> {
    let mut problems = Vec::new();

    if policy.code.trim().is_empty() {
        problems.push("code is required".to_string());
    }
    if policy.name.trim().is_empty() {
        problems.push("name is required".to_string());
    }

    let non_negative = [
        ("accrual_rate", Some(policy.accrual_rate)),
        ("initial_balance", Some(policy.initial_balance)),
        ("min_balance", Some(policy.min_balance)),
        ("max_balance", policy.max_balance),
        ("carry_forward_limit", policy.carry_forward_limit),
        ("encashment_rate", policy.encashment_rate),
        ("auto_approve_for_days", Some(policy.auto_approve_for_days)),
        ("max_consecutive_days", policy.max_consecutive_days),
    ];
    for (field, value) in non_negative {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                problems.push(format!("{field} must be a non-negative number"));
            }
        }
    }

    if policy.approval_levels < 1 {
        problems.push("approval_levels must be at least 1".to_string());
    }
    if policy.min_balance > policy.initial_balance {
        problems.push("min_balance cannot exceed initial_balance".to_string());
    }
    if let Some(max) = policy.max_balance {
        if policy.initial_balance > max {
            problems.push("initial_balance cannot exceed max_balance".to_string());
        }
    }
    if policy.allow_encashment && policy.encashment_rate.is_none() {
        problems.push("encashment_rate is required when encashment is allowed".to_string());
    }
    if policy.requires_documentation && policy.required_documents.is_empty() {
        problems.push("required_documents must list at least one document kind".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(LeaveError::Validation(problems.join("; ")))
    }
}

impl CreateLeaveType {
    pub fn into_draft(self, organization_id: u64) -> Result<LeaveTypeDraft, LeaveError> {
        let category: LeaveCategory =
            parse_enum("category", &self.category).map_err(LeaveError::Validation)?;
        let accrual_method: AccrualMethod =
            parse_enum("accrual_method", &self.accrual_method).map_err(LeaveError::Validation)?;

        Ok(LeaveTypeDraft {
            organization_id,
            code: normalize_code(&self.code),
            name: self.name.trim().to_string(),
            description: self.description,
            category,
            is_paid: self.is_paid,
            accrual_method,
            accrual_rate: self.accrual_rate,
            initial_balance: self.initial_balance,
            min_balance: self.min_balance,
            max_balance: self.max_balance,
            allow_carry_forward: self.allow_carry_forward,
            carry_forward_limit: self.carry_forward_limit,
            carry_forward_expiry_months: self.carry_forward_expiry_months,
            allow_encashment: self.allow_encashment,
            encashment_rate: self.encashment_rate,
            requires_approval: self.requires_approval.unwrap_or(true),
            approval_levels: self.approval_levels.unwrap_or(1),
            auto_approve_for_days: self.auto_approve_for_days,
            requires_documentation: self.requires_documentation,
            required_documents: self.required_documents,
            min_service_months: self.min_service_months,
            min_advance_notice_days: self.min_advance_notice_days,
            max_consecutive_days: self.max_consecutive_days,
            blackout_dates: self.blackout_dates,
            active_flag: self.active_flag.unwrap_or(true),
        })
    }
}

impl UpdateLeaveType {
    /// Applies the update on top of `current`. The caller validates the result.
    pub fn apply_to(self, current: &mut LeaveType) -> Result<(), LeaveError> {
        if let Some(code) = self.code {
            current.code = normalize_code(&code);
        }
        if let Some(name) = self.name {
            current.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            current.description = description;
        }
        if let Some(category) = self.category {
            current.category = parse_enum("category", &category).map_err(LeaveError::Validation)?;
        }
        if let Some(method) = self.accrual_method {
            current.accrual_method =
                parse_enum("accrual_method", &method).map_err(LeaveError::Validation)?;
        }
        if let Some(v) = self.is_paid {
            current.is_paid = v;
        }
        if let Some(v) = self.accrual_rate {
            current.accrual_rate = v;
        }
        if let Some(v) = self.initial_balance {
            current.initial_balance = v;
        }
        if let Some(v) = self.min_balance {
            current.min_balance = v;
        }
        if let Some(v) = self.max_balance {
            current.max_balance = v;
        }
        if let Some(v) = self.allow_carry_forward {
            current.allow_carry_forward = v;
        }
        if let Some(v) = self.carry_forward_limit {
            current.carry_forward_limit = v;
        }
        if let Some(v) = self.carry_forward_expiry_months {
            current.carry_forward_expiry_months = v;
        }
        if let Some(v) = self.allow_encashment {
            current.allow_encashment = v;
        }
        if let Some(v) = self.encashment_rate {
            current.encashment_rate = v;
        }
        if let Some(v) = self.requires_approval {
            current.requires_approval = v;
        }
        if let Some(v) = self.approval_levels {
            current.approval_levels = v;
        }
        if let Some(v) = self.auto_approve_for_days {
            current.auto_approve_for_days = v;
        }
        if let Some(v) = self.requires_documentation {
            current.requires_documentation = v;
        }
        if let Some(v) = self.required_documents {
            current.required_documents = v;
        }
        if let Some(v) = self.min_service_months {
            current.min_service_months = v;
        }
        if let Some(v) = self.min_advance_notice_days {
            current.min_advance_notice_days = v;
        }
        if let Some(v) = self.max_consecutive_days {
            current.max_consecutive_days = v;
        }
        if let Some(v) = self.blackout_dates {
            current.blackout_dates = v;
        }
        Ok(())
    }
}

/// Leave-type policy store with a read-through cache for policy lookups.
pub struct LeaveTypeCatalog<S> {
    store: Arc<S>,
    cache: Cache<u64, LeaveType>,
}

impl<S: LeaveStore> LeaveTypeCatalog<S> {
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(POLICY_CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { store, cache }
    }

    /// Policy by id regardless of organization, cached.
    pub(crate) async fn policy(&self, leave_id: u64) -> Result<Option<LeaveType>, LeaveError> {
        if let Some(cached) = self.cache.get(&leave_id).await {
            return Ok(Some(cached));
        }
        let fetched = self.store.fetch_leave_type(leave_id).await?;
        if let Some(policy) = &fetched {
            self.cache.insert(leave_id, policy.clone()).await;
        }
        Ok(fetched)
    }

    pub async fn create(
        &self,
        actor: &Actor,
        payload: CreateLeaveType,
    ) -> Result<LeaveType, LeaveError> {
        actor.require_approver()?;
        let draft = payload.into_draft(actor.organization_id)?;
        validate_policy(&draft.clone().into_leave_type(0, Utc::now()))?;

        let created = self.store.insert_leave_type(draft).await?;
        info!(
            leave_id = created.id,
            organization_id = created.organization_id,
            code = %created.code,
            "Created leave type"
        );
        Ok(created)
    }

    pub async fn get(&self, actor: &Actor, leave_id: u64) -> Result<LeaveType, LeaveError> {
        self.policy(leave_id)
            .await?
            .filter(|t| t.organization_id == actor.organization_id && !t.delete_flag)
            .ok_or_else(|| LeaveError::not_found(format!("leave type {leave_id}")))
    }

    pub async fn list(
        &self,
        actor: &Actor,
        mut filter: LeaveTypeFilter,
    ) -> Result<(Vec<LeaveType>, i64), LeaveError> {
        filter.organization_id = actor.organization_id;
        self.store.list_leave_types(&filter).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        leave_id: u64,
        payload: UpdateLeaveType,
    ) -> Result<LeaveType, LeaveError> {
        actor.require_approver()?;
        // Bypass the cache; updates must start from the stored row.
        let mut current = self
            .store
            .fetch_leave_type(leave_id)
            .await?
            .filter(|t| t.organization_id == actor.organization_id && !t.delete_flag)
            .ok_or_else(|| LeaveError::not_found(format!("leave type {leave_id}")))?;

        payload.apply_to(&mut current)?;
        validate_policy(&current)?;
        current.updated_at = Utc::now();

        self.store.update_leave_type(&current).await?;
        self.cache.invalidate(&leave_id).await;
        info!(leave_id, code = %current.code, "Updated leave type");
        Ok(current)
    }

    pub async fn set_active(
        &self,
        actor: &Actor,
        leave_id: u64,
        active: bool,
    ) -> Result<LeaveType, LeaveError> {
        actor.require_approver()?;
        let mut current = self.get(actor, leave_id).await?;
        current.active_flag = active;
        current.updated_at = Utc::now();
        self.store.update_leave_type(&current).await?;
        self.cache.invalidate(&leave_id).await;
        info!(leave_id, active, "Changed leave type activation");
        Ok(current)
    }

    /// Soft delete: the row stays for historical requests and balances.
    pub async fn soft_delete(&self, actor: &Actor, leave_id: u64) -> Result<(), LeaveError> {
        actor.require_admin()?;
        let mut current = self.get(actor, leave_id).await?;
        current.delete_flag = true;
        current.active_flag = false;
        current.updated_at = Utc::now();
        self.store.update_leave_type(&current).await?;
        self.cache.invalidate(&leave_id).await;
        info!(leave_id, "Deleted leave type");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::test_utils::{admin_actor, employee_actor, hr_actor, policy};

    fn create_payload(code: &str) -> CreateLeaveType {
        serde_json::from_value(serde_json::json!({
            "code": code,
            "name": "Annual leave",
            "category": "annual",
            "accrual_method": "MONTHLY",
            "accrual_rate": 1.5,
            "initial_balance": 5,
            "max_balance": 30
        }))
        .expect("valid payload")
    }

    fn catalog() -> LeaveTypeCatalog<MemoryStore> {
        LeaveTypeCatalog::new(Arc::new(MemoryStore::default()), Duration::from_secs(60))
    }

    #[actix_web::test]
    async fn create_applies_defaults() {
        let catalog = catalog();
        let created = catalog
            .create(&hr_actor(), create_payload(" al "))
            .await
            .expect("created");

        assert_eq!(created.code, "AL");
        assert_eq!(created.category, LeaveCategory::Annual);
        assert_eq!(created.accrual_method, AccrualMethod::Monthly);
        assert!(created.requires_approval);
        assert_eq!(created.approval_levels, 1);
        assert!(created.active_flag);
    }

    #[actix_web::test]
    async fn duplicate_code_in_organization_conflicts() {
        let catalog = catalog();
        catalog
            .create(&hr_actor(), create_payload("AL"))
            .await
            .expect("first");
        let err = catalog
            .create(&hr_actor(), create_payload("al"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::Conflict(_)));
    }

    #[actix_web::test]
    async fn invalid_enum_is_a_validation_error() {
        let mut payload = create_payload("AL");
        payload.accrual_method = "FORTNIGHTLY".to_string();
        let err = catalog().create(&hr_actor(), payload).await.unwrap_err();
        match err {
            LeaveError::Validation(msg) => assert!(msg.contains("accrual_method")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn employees_cannot_manage_policy() {
        let err = catalog()
            .create(&employee_actor(1000), create_payload("AL"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::Forbidden(_)));
    }

    #[actix_web::test]
    async fn update_keeps_requires_approval_false() {
        let catalog = catalog();
        let mut payload = create_payload("SL");
        payload.requires_approval = Some(false);
        let created = catalog.create(&hr_actor(), payload).await.expect("created");

        let update: UpdateLeaveType =
            serde_json::from_value(serde_json::json!({ "name": "Sick leave" })).expect("payload");
        let updated = catalog
            .update(&hr_actor(), created.id, update)
            .await
            .expect("updated");

        assert_eq!(updated.name, "Sick leave");
        assert!(!updated.requires_approval);
    }

    #[actix_web::test]
    async fn update_null_clears_max_balance_and_refreshes_cache() {
        let catalog = catalog();
        let created = catalog
            .create(&hr_actor(), create_payload("AL"))
            .await
            .expect("created");
        // Prime the cache.
        catalog.get(&hr_actor(), created.id).await.expect("get");

        let update: UpdateLeaveType =
            serde_json::from_value(serde_json::json!({ "max_balance": null })).expect("payload");
        catalog
            .update(&hr_actor(), created.id, update)
            .await
            .expect("updated");

        let fetched = catalog.get(&hr_actor(), created.id).await.expect("get");
        assert_eq!(fetched.max_balance, None);
    }

    #[actix_web::test]
    async fn soft_deleted_types_are_not_found() {
        let catalog = catalog();
        let created = catalog
            .create(&hr_actor(), create_payload("AL"))
            .await
            .expect("created");
        assert!(matches!(
            catalog.soft_delete(&hr_actor(), created.id).await,
            Err(LeaveError::Forbidden(_))
        ));
        catalog
            .soft_delete(&admin_actor(), created.id)
            .await
            .expect("deleted");
        assert!(matches!(
            catalog.get(&hr_actor(), created.id).await,
            Err(LeaveError::NotFound(_))
        ));
        // The code is free again.
        catalog
            .create(&hr_actor(), create_payload("AL"))
            .await
            .expect("code reusable after delete");
    }

    #[test]
    fn validation_reports_every_problem() {
        let mut p = policy();
        p.name = " ".to_string();
        p.accrual_rate = -1.0;
        p.approval_levels = 0;
        p.initial_balance = 40.0;
        p.max_balance = Some(30.0);

        let Err(LeaveError::Validation(msg)) = validate_policy(&p) else {
            panic!("expected validation error");
        };
        assert!(msg.contains("name is required"));
        assert!(msg.contains("accrual_rate"));
        assert!(msg.contains("approval_levels"));
        assert!(msg.contains("initial_balance cannot exceed max_balance"));
    }

    #[test]
    fn min_balance_above_initial_is_rejected() {
        let mut p = policy();
        p.min_balance = 3.0;
        p.initial_balance = 1.0;
        assert!(validate_policy(&p).is_err());
    }
}
