use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::Actor;
use super::ledger::round_days;
use crate::error::LeaveError;
use crate::model::leave_request::{LeaveStatus, StatisticsFilter, StatusTotal};
use crate::store::LeaveStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct LeaveStatistics {
    #[schema(example = 42)]
    pub total_requests: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub cancelled: i64,
    #[schema(example = 87.5)]
    pub total_days_requested: f64,
    pub approved_days: f64,
}

impl LeaveStatistics {
    pub fn from_totals(totals: &[StatusTotal]) -> Self {
        let mut stats = LeaveStatistics::default();
        for t in totals {
            stats.total_requests += t.requests;
            stats.total_days_requested = round_days(stats.total_days_requested + t.days);
            match t.status {
                LeaveStatus::Pending => stats.pending += t.requests,
                LeaveStatus::Approved => {
                    stats.approved += t.requests;
                    stats.approved_days = round_days(stats.approved_days + t.days);
                }
                LeaveStatus::Rejected => stats.rejected += t.requests,
                LeaveStatus::Cancelled => stats.cancelled += t.requests,
            }
        }
        stats
    }
}

pub struct StatisticsAggregator<S> {
    store: Arc<S>,
}

impl<S: LeaveStore> StatisticsAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn summarize(
        &self,
        actor: &Actor,
        mut filter: StatisticsFilter,
    ) -> Result<LeaveStatistics, LeaveError> {
        actor.require_approver()?;
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(LeaveError::validation("from must not be after to"));
            }
        }
        filter.organization_id = actor.organization_id;
        let totals = self.store.status_totals(&filter).await?;
        Ok(LeaveStatistics::from_totals(&totals))
    }
}
