pub mod accrual_job;
pub mod catalog;
pub mod ledger;
pub mod statistics;
pub mod workflow;

use std::sync::Arc;
use std::time::Duration;

use crate::error::LeaveError;
use crate::model::role::Role;
use crate::store::LeaveStore;

use catalog::LeaveTypeCatalog;
use ledger::LeaveBalanceLedger;
use statistics::StatisticsAggregator;
use workflow::LeaveRequestWorkflow;

/// The authenticated caller of a leave operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub user_id: u64,
    pub organization_id: u64,
    pub employee_id: Option<u64>,
    pub role: Role,
}

impl Actor {
    pub fn is_approver(&self) -> bool {
        self.role.is_approver()
    }

    pub fn require_approver(&self) -> Result<(), LeaveError> {
        if self.is_approver() {
            Ok(())
        } else {
            Err(LeaveError::Forbidden("HR/Admin only".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), LeaveError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(LeaveError::Forbidden("Admin only".to_string()))
        }
    }

    pub fn own_employee_id(&self) -> Result<u64, LeaveError> {
        self.employee_id
            .ok_or_else(|| LeaveError::Forbidden("No employee profile".to_string()))
    }

    /// Approvers see everyone in their organization; others only themselves.
    pub fn require_view_of(&self, employee_id: u64) -> Result<(), LeaveError> {
        if self.is_approver() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(LeaveError::Forbidden(
                "Not allowed to access another employee's leave".to_string(),
            ))
        }
    }
}

/// Leave services sharing one store. Built once at startup and handed to the
/// HTTP layer and the accrual job.
pub struct LeaveServices<S> {
    pub catalog: Arc<LeaveTypeCatalog<S>>,
    pub ledger: Arc<LeaveBalanceLedger<S>>,
    pub workflow: LeaveRequestWorkflow<S>,
    pub statistics: StatisticsAggregator<S>,
}

impl<S: LeaveStore> LeaveServices<S> {
    pub fn new(store: Arc<S>, policy_cache_ttl: Duration) -> Self {
        let catalog = Arc::new(LeaveTypeCatalog::new(store.clone(), policy_cache_ttl));
        let ledger = Arc::new(LeaveBalanceLedger::new(store.clone()));
        let workflow = LeaveRequestWorkflow::new(store.clone(), catalog.clone(), ledger.clone());
        let statistics = StatisticsAggregator::new(store);
        Self {
            catalog,
            ledger,
            workflow,
            statistics,
        }
    }
}
