//! Periodic ledger maintenance: year-end rollover, carry-forward expiry and accrual.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;

use super::Actor;
use super::ledger::{AccrualOutcome, LeaveBalanceLedger, RolloverOutcome, RowSettlement, round_days};
use crate::error::LeaveError;
use crate::store::LeaveStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AccrualReport {
    #[schema(value_type = Option<String>, format = "date")]
    pub as_of: Option<NaiveDate>,
    pub rows_examined: usize,
    pub accrued: usize,
    pub days_credited: f64,
    pub rolled_over: usize,
    pub expired: usize,
    /// Days lost to caps, rollover limits and expiry.
    pub days_forfeited: f64,
    pub failed: usize,
}

impl AccrualReport {
    fn tally(&mut self, settlement: &RowSettlement) {
        if let RolloverOutcome::Applied { forfeited, .. } = settlement.rollover {
            self.rolled_over += 1;
            self.days_forfeited = round_days(self.days_forfeited + forfeited);
        }
        if settlement.expired > 0.0 {
            self.expired += 1;
            self.days_forfeited = round_days(self.days_forfeited + settlement.expired);
        }
        if let AccrualOutcome::Applied {
            credited,
            forfeited,
        } = settlement.accrual
        {
            self.accrued += 1;
            self.days_credited = round_days(self.days_credited + credited);
            self.days_forfeited = round_days(self.days_forfeited + forfeited);
        }
    }
}

pub struct AccrualJob<S> {
    store: Arc<S>,
    ledger: Arc<LeaveBalanceLedger<S>>,
}

impl<S: LeaveStore + 'static> AccrualJob<S> {
    pub fn new(store: Arc<S>, ledger: Arc<LeaveBalanceLedger<S>>) -> Self {
        Self { store, ledger }
    }

    /// Settles every due row once. A failing row is logged and counted; the
    /// rest of the batch still runs.
    pub async fn run_once(&self, today: NaiveDate) -> Result<AccrualReport, LeaveError> {
        let due = self.store.due_balances(today).await?;
        let mut report = AccrualReport {
            as_of: Some(today),
            rows_examined: due.len(),
            ..AccrualReport::default()
        };

        for key in due {
            match self.ledger.settle(key, today).await {
                Ok(settlement) => report.tally(&settlement),
                Err(e) => {
                    report.failed += 1;
                    error!(
                        employee_id = key.employee_id,
                        leave_id = key.leave_id,
                        error = %e,
                        "Failed to settle leave balance"
                    );
                }
            }
        }

        info!(
            as_of = %today,
            rows = report.rows_examined,
            accrued = report.accrued,
            rolled_over = report.rolled_over,
            expired = report.expired,
            failed = report.failed,
            "Accrual run finished"
        );
        Ok(report)
    }

    /// Manual trigger from the API.
    pub async fn run_for(&self, actor: &Actor, today: NaiveDate) -> Result<AccrualReport, LeaveError> {
        if !actor.role.may_run_jobs() {
            return Err(LeaveError::Forbidden("Admin only".to_string()));
        }
        self.run_once(today).await
    }

    /// Runs the job on the current actix runtime every `every`.
    pub fn spawn(self: Arc<Self>, every: Duration) {
        actix_web::rt::spawn(async move {
            let mut ticker = actix_web::rt::time::interval(every);
            loop {
                ticker.tick().await;
                let today = Utc::now().date_naive();
                if let Err(e) = self.run_once(today).await {
                    error!(error = %e, "Accrual run failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_balance::{BalanceKey, MovementKind};
    use crate::model::leave_type::LeaveTypeDraft;
    use crate::store::memory::MemoryStore;
    use crate::test_utils::{
        ALICE, BOB, add_policy, date, employee_actor, hr_actor, policy_draft, seeded_store,
        system_actor,
    };

    async fn setup(draft: LeaveTypeDraft) -> (Arc<MemoryStore>, Arc<LeaveBalanceLedger<MemoryStore>>, AccrualJob<MemoryStore>, u64) {
        let store = seeded_store();
        let policy = add_policy(&store, draft).await;
        let ledger = Arc::new(LeaveBalanceLedger::new(store.clone()));
        for employee_id in [ALICE, BOB] {
            ledger
                .open(
                    &hr_actor(),
                    BalanceKey {
                        employee_id,
                        leave_id: policy.id,
                    },
                    date(2026, 1, 15),
                )
                .await
                .expect("open");
        }
        let job = AccrualJob::new(store.clone(), ledger.clone());
        (store, ledger, job, policy.id)
    }

    #[actix_web::test]
    async fn credits_due_rows_once_per_period() {
        let (store, _, job, leave_id) = setup(LeaveTypeDraft {
            accrual_rate: 1.5,
            ..policy_draft("AL")
        })
        .await;

        let early = job.run_once(date(2026, 2, 14)).await.expect("run");
        assert_eq!(early.rows_examined, 0);

        let report = job.run_once(date(2026, 2, 15)).await.expect("run");
        assert_eq!(report.accrued, 2);
        assert_eq!(report.days_credited, 3.0);

        // A duplicate tick on the same day finds nothing due.
        let again = job.run_once(date(2026, 2, 15)).await.expect("run");
        assert_eq!(again.accrued, 0);

        let row = store
            .fetch_balance(BalanceKey {
                employee_id: ALICE,
                leave_id,
            })
            .await
            .expect("store")
            .expect("row");
        assert_eq!(row.balance, 1.5);
        assert_eq!(row.total_accrued, 1.5);
        assert_eq!(row.next_accrual_date, Some(date(2026, 3, 15)));
    }

    #[actix_web::test]
    async fn year_end_rolls_over_and_journals_forfeit() {
        let (_, ledger, job, leave_id) = setup(LeaveTypeDraft {
            accrual_method: crate::model::leave_type::AccrualMethod::None,
            initial_balance: 8.0,
            allow_carry_forward: true,
            carry_forward_limit: Some(5.0),
            ..policy_draft("AL")
        })
        .await;

        let report = job.run_once(date(2027, 1, 1)).await.expect("run");
        assert_eq!(report.rolled_over, 2);
        assert_eq!(report.days_forfeited, 6.0);

        let key = BalanceKey {
            employee_id: ALICE,
            leave_id,
        };
        let row = ledger.get(&hr_actor(), key).await.expect("row");
        assert_eq!(row.balance, 5.0);
        assert_eq!(row.balance_year, 2027);

        let (journal, _) = ledger.journal(&hr_actor(), key, 1, 10).await.expect("journal");
        assert_eq!(journal.last().map(|e| e.kind), Some(MovementKind::CarryForwardForfeit));

        let second = job.run_once(date(2027, 1, 2)).await.expect("run");
        assert_eq!(second.rows_examined, 0);
    }

    #[actix_web::test]
    async fn late_december_accrual_is_capped_by_rollover() {
        let store = seeded_store();
        let policy = add_policy(
            &store,
            LeaveTypeDraft {
                accrual_rate: 2.0,
                initial_balance: 5.0,
                allow_carry_forward: true,
                carry_forward_limit: Some(5.0),
                ..policy_draft("AL")
            },
        )
        .await;
        let ledger = Arc::new(LeaveBalanceLedger::new(store.clone()));
        let key = BalanceKey {
            employee_id: ALICE,
            leave_id: policy.id,
        };
        ledger
            .open(&hr_actor(), key, date(2026, 11, 15))
            .await
            .expect("open");
        let job = AccrualJob::new(store.clone(), ledger.clone());

        // The December period is first picked up after New Year.
        let report = job.run_once(date(2027, 1, 2)).await.expect("run");
        assert_eq!(report.accrued, 1);
        assert_eq!(report.days_credited, 2.0);
        assert_eq!(report.rolled_over, 1);
        assert_eq!(report.days_forfeited, 2.0);

        let row = ledger.get(&hr_actor(), key).await.expect("row");
        assert_eq!(row.balance, 5.0);
        assert_eq!(row.carried_forward, 5.0);
        assert_eq!(row.balance_year, 2027);
        assert_eq!(row.last_accrual_date, Some(date(2026, 12, 15)));
        assert_eq!(row.next_accrual_date, Some(date(2027, 1, 15)));
    }

    #[actix_web::test]
    async fn manual_runs_need_job_role() {
        let (_, _, job, _) = setup(policy_draft("AL")).await;
        assert!(matches!(
            job.run_for(&employee_actor(ALICE), date(2026, 2, 15)).await,
            Err(LeaveError::Forbidden(_))
        ));
        assert!(matches!(
            job.run_for(&hr_actor(), date(2026, 2, 15)).await,
            Err(LeaveError::Forbidden(_))
        ));
        let report = job
            .run_for(&system_actor(), date(2026, 2, 15))
            .await
            .expect("system may run");
        assert_eq!(report.accrued, 2);
    }
}
