//! Payment creation against a validated order, and durable settlement.
//!
//! Settlement is simulated gateway latency: processing stores a `settle_at`
//! deadline and a detached task completes the payment once it passes. The
//! deadline is persisted, so [`PaymentCoordinator::recover_settlements`] can
//! pick up where a crashed process left off.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use common::{Money, RecordId, Requester};
use document_store::DocumentStore;
use domain::{
    GatewayRefs, NewPayment, OrderStatus, Payment, PaymentService, PaymentState, PaymentStatus,
    SettlementOutcome,
};
use tokio::task::JoinHandle;

use crate::collaborators::OrderGateway;
use crate::config::SettlementConfig;
use crate::error::{FulfillmentError, Result};
use crate::reconciliation::{ReconciliationEntry, ReconciliationKind, ReconciliationLog};

/// Failure reason given to processing payments whose deadline was never stored.
pub const LOST_SCHEDULE_REASON: &str = "settlement schedule lost";

/// What a recovery sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Overdue payments settled during the sweep.
    pub completed: usize,
    /// Payments whose deadline is still ahead, re-armed.
    pub rescheduled: usize,
    /// Payments with no deadline, marked failed.
    pub failed: usize,
}

/// Coordinates the payment service with the order service.
#[derive(Clone)]
pub struct PaymentCoordinator<S: DocumentStore> {
    payments: PaymentService<S>,
    orders: Arc<dyn OrderGateway>,
    reconciliation: ReconciliationLog<S>,
    settlement: SettlementConfig,
}

impl<S: DocumentStore + Clone + 'static> PaymentCoordinator<S> {
    pub fn new(store: S, orders: Arc<dyn OrderGateway>, settlement: SettlementConfig) -> Self {
        Self {
            payments: PaymentService::new(store.clone()),
            reconciliation: ReconciliationLog::new(store),
            orders,
            settlement,
        }
    }

    /// The underlying payment service, for reads.
    pub fn payments(&self) -> &PaymentService<S> {
        &self.payments
    }

    pub fn reconciliation(&self) -> &ReconciliationLog<S> {
        &self.reconciliation
    }

    /// Creates a pending payment for an order the requester owns.
    ///
    /// Admins may read any order but only pay for their own.
    #[tracing::instrument(skip(self, requester, new), fields(order_id = %new.order_id))]
    pub async fn create_payment(&self, requester: &Requester, new: NewPayment) -> Result<Payment> {
        let order = self.orders.fetch_order(new.order_id, requester).await?;
        if order.user_id != requester.user_id {
            return Err(FulfillmentError::Forbidden(
                "Payments can only be created by the order owner".to_string(),
            ));
        }
        tracing::debug!(order_id = %order.id, status = %order.status, "order validated");
        Ok(self.payments.create(requester, new).await?)
    }

    /// Moves a pending payment to processing and arms its settlement.
    ///
    /// Returns as soon as the processing state is stored.
    #[tracing::instrument(skip(self, refs))]
    pub async fn process_payment(&self, id: RecordId, refs: GatewayRefs) -> Result<Payment> {
        let delay = TimeDelta::from_std(self.settlement.delay).unwrap_or(TimeDelta::zero());
        let payment = self
            .payments
            .start_processing(id, refs, Utc::now() + delay)
            .await?;
        self.schedule_settlement(id, self.settlement.delay);
        Ok(payment)
    }

    /// Spawns a task that settles the payment after `delay`.
    pub fn schedule_settlement(&self, id: RecordId, delay: Duration) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = coordinator.settle(id).await {
                tracing::error!(payment = %id, error = %e, "settlement failed");
            }
        })
    }

    /// Completes a processing payment and tells the order service.
    ///
    /// A failed order update is recorded for reconciliation; the payment
    /// stays completed.
    #[tracing::instrument(skip(self))]
    pub async fn settle(&self, id: RecordId) -> Result<SettlementOutcome> {
        let outcome = self.payments.settle(id).await?;

        if let SettlementOutcome::Completed(payment) = &outcome
            && let Err(e) = self
                .orders
                .system_update_status(
                    payment.order_id(),
                    OrderStatus::Processing,
                    Some(PaymentStatus::Paid),
                )
                .await
        {
            self.reconciliation
                .record_quietly(
                    ReconciliationEntry::new(ReconciliationKind::SettlementPropagation, e)
                        .order(payment.order_id())
                        .payment(payment.id()),
                )
                .await;
        }

        Ok(outcome)
    }

    #[tracing::instrument(skip(self, reason))]
    pub async fn refund(
        &self,
        id: RecordId,
        amount: Money,
        reason: Option<String>,
    ) -> Result<Payment> {
        Ok(self.payments.refund(id, amount, reason).await?)
    }

    pub async fn override_status(
        &self,
        id: RecordId,
        target: PaymentState,
        reason: Option<String>,
    ) -> Result<Payment> {
        Ok(self.payments.override_status(id, target, reason).await?)
    }

    /// Resolves every payment left in `processing`, typically at start-up.
    #[tracing::instrument(skip(self))]
    pub async fn recover_settlements(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let now = Utc::now();

        for payment in self.payments.processing().await? {
            match payment.settle_at() {
                None => {
                    self.payments
                        .override_status(
                            payment.id(),
                            PaymentState::Failed,
                            Some(LOST_SCHEDULE_REASON.to_string()),
                        )
                        .await?;
                    report.failed += 1;
                }
                Some(due) if due <= now => {
                    if let SettlementOutcome::Completed(_) = self.settle(payment.id()).await? {
                        report.completed += 1;
                    }
                }
                Some(due) => {
                    let remaining = (due - now).to_std().unwrap_or_default();
                    self.schedule_settlement(payment.id(), remaining);
                    report.rescheduled += 1;
                }
            }
        }

        tracing::info!(
            completed = report.completed,
            rescheduled = report.rescheduled,
            failed = report.failed,
            "settlement recovery finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::OrderSummary;
    use async_trait::async_trait;
    use common::{Role, UserId};
    use document_store::InMemoryDocumentStore;
    use domain::{Currency, PaymentMethod};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Order gateway that knows one order and records system updates.
    #[derive(Default)]
    struct StubOrders {
        owner: Mutex<Option<UserId>>,
        updates: Mutex<Vec<(RecordId, OrderStatus, Option<PaymentStatus>)>>,
        fail_updates: Mutex<bool>,
    }

    #[async_trait]
    impl OrderGateway for StubOrders {
        async fn fetch_order(&self, id: RecordId, requester: &Requester) -> Result<OrderSummary> {
            let owner = self.owner.lock().unwrap().ok_or(FulfillmentError::OrderNotFound(id))?;
            if !requester.can_access(owner) {
                return Err(FulfillmentError::Forbidden("not yours".into()));
            }
            Ok(OrderSummary {
                id,
                user_id: owner,
                final_amount: Money::from_cents(10_000),
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Pending,
            })
        }

        async fn system_update_status(
            &self,
            id: RecordId,
            status: OrderStatus,
            payment_status: Option<PaymentStatus>,
        ) -> Result<()> {
            if *self.fail_updates.lock().unwrap() {
                return Err(FulfillmentError::upstream("order", "connection refused"));
            }
            self.updates.lock().unwrap().push((id, status, payment_status));
            Ok(())
        }
    }

    fn setup() -> (
        PaymentCoordinator<InMemoryDocumentStore>,
        Arc<StubOrders>,
        Requester,
    ) {
        let requester = Requester::new(UserId::new(), "buyer@example.com", Role::User);
        let orders = Arc::new(StubOrders::default());
        *orders.owner.lock().unwrap() = Some(requester.user_id);
        let coordinator = PaymentCoordinator::new(
            InMemoryDocumentStore::new(),
            orders.clone(),
            SettlementConfig {
                delay: Duration::from_millis(2000),
            },
        );
        (coordinator, orders, requester)
    }

    fn new_payment(order_id: RecordId) -> NewPayment {
        NewPayment {
            order_id,
            amount: Money::from_cents(10_000),
            currency: Currency::Usd,
            method: PaymentMethod::Card,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_payment_requires_accessible_order() {
        let (coordinator, orders, requester) = setup();
        let stranger = Requester::new(UserId::new(), "other@example.com", Role::User);

        let denied = coordinator
            .create_payment(&stranger, new_payment(RecordId::new()))
            .await;
        assert!(matches!(denied, Err(FulfillmentError::Forbidden(_))));

        *orders.owner.lock().unwrap() = None;
        let missing = coordinator
            .create_payment(&requester, new_payment(RecordId::new()))
            .await;
        assert!(matches!(missing, Err(FulfillmentError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_admin_cannot_pay_for_someone_elses_order() {
        let (coordinator, _orders, _requester) = setup();
        let admin = Requester::new(UserId::new(), "admin@example.com", Role::Admin);

        let result = coordinator
            .create_payment(&admin, new_payment(RecordId::new()))
            .await;
        assert!(matches!(result, Err(FulfillmentError::Forbidden(_))));
        let stored = coordinator
            .payments()
            .list_for_user(admin.user_id, &admin)
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_settles_after_delay() {
        let (coordinator, orders, requester) = setup();
        let order_id = RecordId::new();
        let payment = coordinator
            .create_payment(&requester, new_payment(order_id))
            .await
            .unwrap();

        let processing = coordinator
            .process_payment(payment.id(), GatewayRefs::default())
            .await
            .unwrap();
        assert_eq!(processing.status(), PaymentState::Processing);

        tokio::time::sleep(Duration::from_millis(2100)).await;

        let settled = coordinator.payments().get(payment.id()).await.unwrap().unwrap();
        assert_eq!(settled.status(), PaymentState::Completed);
        assert_eq!(
            orders.updates.lock().unwrap().as_slice(),
            &[(order_id, OrderStatus::Processing, Some(PaymentStatus::Paid))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_settlement_wins() {
        let (coordinator, orders, requester) = setup();
        let payment = coordinator
            .create_payment(&requester, new_payment(RecordId::new()))
            .await
            .unwrap();
        coordinator
            .process_payment(payment.id(), GatewayRefs::default())
            .await
            .unwrap();
        coordinator
            .override_status(payment.id(), PaymentState::Cancelled, None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2100)).await;

        let stored = coordinator.payments().get(payment.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentState::Cancelled);
        assert!(orders.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_propagation_failure_is_recorded() {
        let (coordinator, orders, requester) = setup();
        *orders.fail_updates.lock().unwrap() = true;
        let payment = coordinator
            .create_payment(&requester, new_payment(RecordId::new()))
            .await
            .unwrap();
        coordinator
            .payments()
            .start_processing(payment.id(), GatewayRefs::default(), Utc::now())
            .await
            .unwrap();

        let outcome = coordinator.settle(payment.id()).await.unwrap();

        assert!(matches!(outcome, SettlementOutcome::Completed(_)));
        let entries = coordinator
            .reconciliation()
            .list(Some(ReconciliationKind::SettlementPropagation))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payment_id, Some(payment.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_sweep() {
        let (coordinator, _orders, requester) = setup();
        let mut ids = Vec::new();
        for _ in 0..2 {
            let payment = coordinator
                .create_payment(&requester, new_payment(RecordId::new()))
                .await
                .unwrap();
            ids.push(payment.id());
        }
        let overdue = Utc::now() - TimeDelta::seconds(5);
        let future = Utc::now() + TimeDelta::seconds(1);
        coordinator
            .payments()
            .start_processing(ids[0], GatewayRefs::default(), overdue)
            .await
            .unwrap();
        coordinator
            .payments()
            .start_processing(ids[1], GatewayRefs::default(), future)
            .await
            .unwrap();

        let report = coordinator.recover_settlements().await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.rescheduled, 1);
        assert_eq!(report.failed, 0);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let rescheduled = coordinator.payments().get(ids[1]).await.unwrap().unwrap();
        assert_eq!(rescheduled.status(), PaymentState::Completed);
    }
}
