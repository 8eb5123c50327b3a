use crate::error::TreasuryError;
use crate::types::{Principal, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A pre-authorized schedule of repeated transfers executed on demand once
/// due. Exempt from per-member spending limits: executions are not
/// attributed to the calling member's budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringPayment {
    pub id: u64,
    pub recipient: Principal,
    pub amount_minor: u64,
    pub frequency: Tick,
    pub next_due: Tick,
    pub total_payments: u32,
    pub payments_made: u32,
    pub active: bool,
    pub created_by: Principal,
    pub description: String,
    pub created_at: Tick,
}

impl RecurringPayment {
    pub fn is_due(&self, now: Tick) -> bool {
        self.active && now >= self.next_due && self.payments_made < self.total_payments
    }
}

/// Per-element outcome of a batch execution attempt.
#[derive(Debug)]
pub struct BatchOutcome {
    pub payment_id: u64,
    pub result: Result<(), TreasuryError>,
}

/// Recurring payment table with its own due-date cursor per series.
#[derive(Debug, Default, Clone)]
pub struct PaymentScheduler {
    payments: BTreeMap<u64, RecurringPayment>,
    next_id: u64,
}

impl PaymentScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new payment series and return its id. The first execution
    /// becomes due one full frequency interval after creation.
    pub fn create(
        &mut self,
        recipient: Principal,
        amount_minor: u64,
        frequency: Tick,
        total_payments: u32,
        created_by: Principal,
        description: impl Into<String>,
        now: Tick,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.payments.insert(
            id,
            RecurringPayment {
                id,
                recipient,
                amount_minor,
                frequency,
                next_due: now + frequency,
                total_payments,
                payments_made: 0,
                active: true,
                created_by,
                description: description.into(),
                created_at: now,
            },
        );
        id
    }

    pub fn get(&self, id: u64) -> Option<&RecurringPayment> {
        self.payments.get(&id)
    }

    pub fn count(&self) -> u64 {
        self.payments.len() as u64
    }

    /// Check every payment-local execute precondition and return the payment
    /// on success. The treasury-balance gate lives at the engine boundary.
    pub fn due_payment(&self, id: u64, now: Tick) -> Result<&RecurringPayment, TreasuryError> {
        let payment = self
            .payments
            .get(&id)
            .ok_or_else(|| TreasuryError::missing_payment(id))?;
        if !payment.active {
            return Err(TreasuryError::ExecutionFailed(format!(
                "recurring payment {id} is inactive"
            )));
        }
        if payment.payments_made >= payment.total_payments {
            return Err(TreasuryError::ExecutionFailed(format!(
                "recurring payment {id} already reached its target count"
            )));
        }
        if now < payment.next_due {
            return Err(TreasuryError::ExecutionFailed(format!(
                "recurring payment {id} not due until tick {}",
                payment.next_due
            )));
        }
        Ok(payment)
    }

    /// Advance the cursor after a successful transfer: bump the counter,
    /// push `next_due` one frequency forward, and auto-deactivate once the
    /// target count is reached.
    pub(crate) fn mark_executed(&mut self, id: u64) {
        let payment = self.payments.get_mut(&id).expect("payment checked as due");
        payment.payments_made += 1;
        payment.next_due += payment.frequency;
        if payment.payments_made >= payment.total_payments {
            payment.active = false;
            debug!(payment_id = id, "recurring payment completed its schedule");
        }
    }

    /// Permanently deactivate a series. Caller authorization (admin or
    /// creator) is checked at the engine boundary.
    pub fn cancel(&mut self, id: u64) -> Result<(), TreasuryError> {
        let payment = self
            .payments
            .get_mut(&id)
            .ok_or_else(|| TreasuryError::missing_payment(id))?;
        if !payment.active {
            return Err(TreasuryError::ExecutionFailed(format!(
                "recurring payment {id} is already inactive"
            )));
        }
        payment.active = false;
        Ok(())
    }

    /// Deactivate every active series, walking the table in id order.
    /// Returns the number of series newly deactivated.
    pub fn deactivate_all(&mut self) -> u64 {
        let mut frozen = 0;
        for payment in self.payments.values_mut() {
            if payment.active {
                payment.active = false;
                frozen += 1;
            }
        }
        frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler_with_payment(frequency: Tick, total: u32) -> (PaymentScheduler, u64) {
        let mut scheduler = PaymentScheduler::new();
        let id = scheduler.create(
            Principal::from("contractor"),
            2_500,
            frequency,
            total,
            Principal::from("admin"),
            "retainer",
            0,
        );
        (scheduler, id)
    }

    #[test]
    fn first_execution_due_one_interval_after_creation() {
        let (scheduler, id) = scheduler_with_payment(100, 3);

        let err = scheduler.due_payment(id, 99).unwrap_err();
        assert!(matches!(err, TreasuryError::ExecutionFailed(_)));
        assert!(scheduler.due_payment(id, 100).is_ok());
    }

    #[test]
    fn cursor_advances_and_auto_deactivates_at_target() {
        let (mut scheduler, id) = scheduler_with_payment(100, 3);

        for expected_due in [100, 200, 300] {
            scheduler.due_payment(id, expected_due).unwrap();
            scheduler.mark_executed(id);
        }

        let payment = scheduler.get(id).unwrap();
        assert_eq!(payment.payments_made, 3);
        assert_eq!(payment.next_due, 400);
        assert!(!payment.active);

        let err = scheduler.due_payment(id, 400).unwrap_err();
        assert!(matches!(err, TreasuryError::ExecutionFailed(_)));
    }

    #[test]
    fn payments_made_never_exceeds_total() {
        let (mut scheduler, id) = scheduler_with_payment(10, 1);
        scheduler.due_payment(id, 10).unwrap();
        scheduler.mark_executed(id);

        assert!(scheduler.due_payment(id, 1_000).is_err());
        assert_eq!(scheduler.get(id).unwrap().payments_made, 1);
    }

    #[test]
    fn cancel_is_permanent_and_double_cancel_fails() {
        let (mut scheduler, id) = scheduler_with_payment(100, 3);
        scheduler.cancel(id).unwrap();

        assert!(!scheduler.get(id).unwrap().active);
        let err = scheduler.cancel(id).unwrap_err();
        assert!(matches!(err, TreasuryError::ExecutionFailed(_)));
    }

    #[test]
    fn cancel_missing_payment_reports_not_found() {
        let mut scheduler = PaymentScheduler::new();
        assert!(matches!(
            scheduler.cancel(7),
            Err(TreasuryError::NotFound(_))
        ));
    }

    #[test]
    fn deactivate_all_counts_only_active_series() {
        let (mut scheduler, first) = scheduler_with_payment(100, 3);
        scheduler.create(
            Principal::from("auditor"),
            900,
            50,
            2,
            Principal::from("admin"),
            "audit retainer",
            0,
        );
        scheduler.cancel(first).unwrap();

        assert_eq!(scheduler.deactivate_all(), 1);
        assert_eq!(scheduler.deactivate_all(), 0);
    }
}
