//! Payment service.

use chrono::{DateTime, Utc};
use common::{Money, RecordId, Requester, UserId};
use document_store::{DocumentStore, DocumentStoreExt, StoreError};
use serde_json::{Map, Value, json};

use crate::error::DomainError;
use crate::pagination::{Page, PageRequest};

use super::{
    GatewayRefs, NewPayment, Payment, PaymentError, PaymentState, generate_payment_id,
    generate_refund_id,
};

/// Filters for the admin payment listing.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub status: Option<PaymentState>,
}

/// Result of a settlement attempt.
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// The payment was still processing and is now completed.
    Completed(Payment),
    /// The payment had already left `processing`; nothing was written.
    Skipped(PaymentState),
}

/// Service for managing payment records.
#[derive(Clone)]
pub struct PaymentService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> PaymentService<S> {
    /// Creates a new payment service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists a pending payment for the requester.
    ///
    /// The caller is responsible for having validated the referenced order.
    #[tracing::instrument(skip(self, new), fields(order_id = %new.order_id))]
    pub async fn create(
        &self,
        requester: &Requester,
        new: NewPayment,
    ) -> Result<Payment, DomainError> {
        let now = Utc::now();
        let mut payment = Payment::create(
            RecordId::new(),
            generate_payment_id(now),
            requester.user_id,
            new,
            now,
        )?;
        self.store.insert_doc(&mut payment).await?;

        tracing::info!(
            payment_id = payment.payment_id(),
            amount = %payment.amount(),
            "payment created"
        );
        Ok(payment)
    }

    pub async fn get(&self, id: RecordId) -> Result<Option<Payment>, DomainError> {
        Ok(self.store.load::<Payment>(id).await?.map(|v| v.into_inner()))
    }

    /// Loads a payment the requester owns (or any payment, for admins).
    pub async fn get_for(
        &self,
        id: RecordId,
        requester: &Requester,
    ) -> Result<Payment, DomainError> {
        let payment = self
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", id))?;
        if !requester.can_access(payment.user_id()) {
            return Err(DomainError::Forbidden(
                "Not authorized to access this payment".to_string(),
            ));
        }
        Ok(payment)
    }

    /// Lists all payments, newest first.
    pub async fn list(
        &self,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, DomainError> {
        let mut query = Map::new();
        if let Some(status) = filter.status {
            query.insert("status".into(), json!(status));
        }
        let payments = self.find_newest_first(Value::Object(query)).await?;
        Ok(page.paginate(payments))
    }

    /// Lists one user's payments, newest first. Users may only list their own.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        requester: &Requester,
    ) -> Result<Vec<Payment>, DomainError> {
        if !requester.can_access(user_id) {
            return Err(DomainError::Forbidden(
                "Not authorized to view these payments".to_string(),
            ));
        }
        self.find_newest_first(json!({ "user_id": user_id })).await
    }

    /// Every payment currently in `processing`.
    pub async fn processing(&self) -> Result<Vec<Payment>, DomainError> {
        Ok(self
            .store
            .find_docs(json!({ "status": PaymentState::Processing }))
            .await?)
    }

    /// Moves a pending payment to processing, due to settle at `settle_at`.
    #[tracing::instrument(skip(self, refs))]
    pub async fn start_processing(
        &self,
        id: RecordId,
        refs: GatewayRefs,
        settle_at: DateTime<Utc>,
    ) -> Result<Payment, DomainError> {
        let payment = self
            .store
            .update_with(id, |payment: &mut Payment| {
                payment.start_processing(refs.clone(), settle_at)?;
                Ok::<_, DomainError>(())
            })
            .await
            .map_err(|e| missing_as_not_found(e, id))?;

        metrics::counter!("payments_processed_total").increment(1);
        tracing::info!(payment_id = payment.payment_id(), %settle_at, "payment processing");
        Ok(payment)
    }

    /// Completes the payment if it is still processing.
    ///
    /// A payment that was refunded, cancelled or failed in the meantime is
    /// left alone and reported as [`SettlementOutcome::Skipped`].
    #[tracing::instrument(skip(self))]
    pub async fn settle(&self, id: RecordId) -> Result<SettlementOutcome, DomainError> {
        let result = self
            .store
            .update_with(id, |payment: &mut Payment| {
                payment.complete(Utc::now())?;
                Ok::<_, DomainError>(())
            })
            .await;

        match result {
            Ok(payment) => {
                metrics::counter!("payments_settled_total").increment(1);
                tracing::info!(payment_id = payment.payment_id(), "payment settled");
                Ok(SettlementOutcome::Completed(payment))
            }
            Err(DomainError::Payment(PaymentError::NotProcessing { current })) => {
                tracing::info!(payment = %id, %current, "settlement skipped");
                Ok(SettlementOutcome::Skipped(current))
            }
            Err(e) => Err(missing_as_not_found(e, id)),
        }
    }

    /// Records a refund against a completed payment.
    #[tracing::instrument(skip(self, reason))]
    pub async fn refund(
        &self,
        id: RecordId,
        amount: Money,
        reason: Option<String>,
    ) -> Result<Payment, DomainError> {
        let payment = self
            .store
            .update_with(id, |payment: &mut Payment| {
                payment.refund(amount, reason.clone(), generate_refund_id(Utc::now()))?;
                Ok::<_, DomainError>(())
            })
            .await
            .map_err(|e| missing_as_not_found(e, id))?;

        metrics::counter!("payments_refunded_total").increment(1);
        tracing::info!(
            payment_id = payment.payment_id(),
            refunded = %payment.refund_amount(),
            status = %payment.status(),
            "payment refunded"
        );
        Ok(payment)
    }

    /// Forces a pending or processing payment to failed or cancelled.
    #[tracing::instrument(skip(self, reason))]
    pub async fn override_status(
        &self,
        id: RecordId,
        target: PaymentState,
        reason: Option<String>,
    ) -> Result<Payment, DomainError> {
        let payment = self
            .store
            .update_with(id, |payment: &mut Payment| {
                payment.override_status(target, reason.clone())?;
                Ok::<_, DomainError>(())
            })
            .await
            .map_err(|e| missing_as_not_found(e, id))?;

        tracing::warn!(payment_id = payment.payment_id(), status = %target, "payment overridden");
        Ok(payment)
    }

    async fn find_newest_first(&self, filter: Value) -> Result<Vec<Payment>, DomainError> {
        let mut payments: Vec<Payment> = self.store.find_docs(filter).await?;
        payments.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(payments)
    }
}

fn missing_as_not_found(err: DomainError, id: RecordId) -> DomainError {
    match err {
        DomainError::Store(StoreError::NotFound { .. }) => DomainError::not_found("Payment", id),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::PaymentMethod;
    use crate::payment::Currency;
    use common::Role;
    use document_store::InMemoryDocumentStore;
    use std::collections::BTreeMap;

    fn user() -> Requester {
        Requester::new(UserId::new(), "payer@example.com", Role::User)
    }

    fn new_payment(cents: i64) -> NewPayment {
        NewPayment {
            order_id: RecordId::new(),
            amount: Money::from_cents(cents),
            currency: Currency::Usd,
            method: PaymentMethod::Card,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_settle_completes_processing_payment() {
        let service = PaymentService::new(InMemoryDocumentStore::new());
        let payment = service.create(&user(), new_payment(100_00)).await.unwrap();
        service
            .start_processing(payment.id(), GatewayRefs::default(), Utc::now())
            .await
            .unwrap();

        let outcome = service.settle(payment.id()).await.unwrap();
        match outcome {
            SettlementOutcome::Completed(p) => assert_eq!(p.status(), PaymentState::Completed),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_settle_skips_cancelled_payment() {
        let service = PaymentService::new(InMemoryDocumentStore::new());
        let payment = service.create(&user(), new_payment(100_00)).await.unwrap();
        service
            .start_processing(payment.id(), GatewayRefs::default(), Utc::now())
            .await
            .unwrap();
        service
            .override_status(payment.id(), PaymentState::Cancelled, None)
            .await
            .unwrap();

        let outcome = service.settle(payment.id()).await.unwrap();
        assert!(matches!(
            outcome,
            SettlementOutcome::Skipped(PaymentState::Cancelled)
        ));
        let stored = service.get(payment.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentState::Cancelled);
    }

    #[tokio::test]
    async fn test_process_twice_is_invalid_state() {
        let service = PaymentService::new(InMemoryDocumentStore::new());
        let payment = service.create(&user(), new_payment(100_00)).await.unwrap();
        service
            .start_processing(payment.id(), GatewayRefs::default(), Utc::now())
            .await
            .unwrap();

        let err = service
            .start_processing(payment.id(), GatewayRefs::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_invalid_state());
    }

    #[tokio::test]
    async fn test_unknown_payment_is_not_found() {
        let service = PaymentService::new(InMemoryDocumentStore::new());
        let err = service.settle(RecordId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Payment", .. }));
    }

    #[tokio::test]
    async fn test_access_rules() {
        let service = PaymentService::new(InMemoryDocumentStore::new());
        let owner = user();
        let payment = service.create(&owner, new_payment(50_00)).await.unwrap();

        assert!(service.get_for(payment.id(), &owner).await.is_ok());
        assert!(matches!(
            service.get_for(payment.id(), &user()).await,
            Err(DomainError::Forbidden(_))
        ));

        let mine = service.list_for_user(owner.user_id, &owner).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(service.list_for_user(owner.user_id, &user()).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let service = PaymentService::new(InMemoryDocumentStore::new());
        let payer = user();
        let a = service.create(&payer, new_payment(10_00)).await.unwrap();
        service.create(&payer, new_payment(20_00)).await.unwrap();
        service
            .start_processing(a.id(), GatewayRefs::default(), Utc::now())
            .await
            .unwrap();

        let page = PageRequest::new(1, 10, 100).unwrap();
        let processing = PaymentFilter {
            status: Some(PaymentState::Processing),
        };
        let result = service.list(&processing, page).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(service.processing().await.unwrap().len(), 1);

        let all = service.list(&PaymentFilter::default(), page).await.unwrap();
        assert_eq!(all.total, 2);
    }
}
