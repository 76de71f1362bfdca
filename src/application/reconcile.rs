//! Webhook reconciliation orchestrator.
//!
//! One entry point serves every provider: the adapter verifies and
//! normalizes the request, the orchestrator reserves the delivery in
//! the idempotency ledger, applies the business transition, records the
//! outcome for replay, and lets the adapter render the provider-facing
//! response.
//!
//! ## Concurrency
//!
//! - The ledger reservation serializes duplicate deliveries of the same
//!   (provider, phase, transaction) key; a loser either waits out an
//!   in-flight reservation (transient response) or replays the stored
//!   outcome verbatim.
//! - Subscription writes go through an optimistic version
//!   compare-and-swap; a conflict re-reads current state and retries a
//!   bounded number of times before answering transient.

use std::sync::Arc;

use serde_json::json;

use crate::domain::billing::{
    apply_successful_payment, AccountRef, BusinessRejection, NormalizedEvent, NotificationKind,
    Payment, PaymentProvider, PaymentSnapshot, PaymentStatus, ProviderResponse, ReconcileOutcome,
    SubscriptionChange, TariffTable, WebhookPhase,
};
use crate::domain::foundation::{DomainError, ErrorCode, ParentId, PaymentId, Timestamp};
use crate::ports::{
    EventRecorder, IdempotencyLedger, NotificationSender, ParentDirectory, PaymentAdapter,
    PaymentRepository, RecordedOutcome, Reservation, SubscriptionRepository,
};

/// Attempts at the subscription version compare-and-swap before giving
/// up with a transient response.
const MAX_CAS_ATTEMPTS: u32 = 3;

/// Orchestrates one webhook delivery end to end.
pub struct ReconcileWebhookHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    payments: Arc<dyn PaymentRepository>,
    ledger: Arc<dyn IdempotencyLedger>,
    parents: Arc<dyn ParentDirectory>,
    notifier: Arc<dyn NotificationSender>,
    recorder: Arc<dyn EventRecorder>,
    tariffs: TariffTable,
    reservation_ttl_secs: u64,
}

impl ReconcileWebhookHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        payments: Arc<dyn PaymentRepository>,
        ledger: Arc<dyn IdempotencyLedger>,
        parents: Arc<dyn ParentDirectory>,
        notifier: Arc<dyn NotificationSender>,
        recorder: Arc<dyn EventRecorder>,
        tariffs: TariffTable,
        reservation_ttl_secs: u64,
    ) -> Self {
        Self {
            subscriptions,
            payments,
            ledger,
            parents,
            notifier,
            recorder,
            tariffs,
            reservation_ttl_secs,
        }
    }

    /// Process one raw webhook through the given provider adapter and
    /// produce the provider-facing response.
    pub async fn handle(&self, adapter: &dyn PaymentAdapter, raw: &crate::ports::RawWebhook) -> ProviderResponse {
        let provider = adapter.provider();

        let event = match adapter.verify(raw) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(provider = %provider, error = %err, "Webhook verification failed");
                return adapter.build_response(None, &ReconcileOutcome::Denied(err));
            }
        };

        let outcome = match event.phase() {
            // Read-only events skip the ledger entirely.
            None => self.handle_read_only(provider, &event).await,
            Some(phase) => self.handle_mutating(adapter, provider, phase, &event).await,
        };

        match outcome {
            Replied::Fresh(outcome) => {
                tracing::info!(
                    provider = %provider,
                    accepted = outcome.accepted(),
                    "Webhook reconciled"
                );
                adapter.build_response(Some(&event), &outcome)
            }
            Replied::Stored(response) => {
                tracing::info!(provider = %provider, "Webhook replayed from ledger");
                response
            }
        }
    }

    async fn handle_read_only(
        &self,
        provider: PaymentProvider,
        event: &NormalizedEvent,
    ) -> Replied {
        let outcome = match event {
            NormalizedEvent::Probe {
                account,
                amount_uzs,
                ..
            } => match self.check_payable(account, *amount_uzs).await {
                Ok(_) => Ok(ReconcileOutcome::Allowed),
                Err(decision) => Err(decision),
            },
            NormalizedEvent::Inquiry { external_tx_id, .. } => {
                match self.payments.find_by_external_tx(provider, external_tx_id).await {
                    Ok(Some(payment)) => Ok(ReconcileOutcome::State(PaymentSnapshot::from(&payment))),
                    Ok(None) => Err(Decision::Rejected(BusinessRejection::UnknownTransaction)),
                    Err(err) => Err(Decision::Transient(err)),
                }
            }
            _ => unreachable!("mutating event routed to read-only path"),
        };

        Replied::Fresh(match outcome {
            Ok(outcome) => outcome,
            Err(decision) => decision.into_outcome(provider),
        })
    }

    async fn handle_mutating(
        &self,
        adapter: &dyn PaymentAdapter,
        provider: PaymentProvider,
        phase: WebhookPhase,
        event: &NormalizedEvent,
    ) -> Replied {
        let external_tx_id = match event.external_tx_id() {
            Some(id) => id.to_string(),
            None => {
                return Replied::Fresh(ReconcileOutcome::Rejected(
                    BusinessRejection::UnknownTransaction,
                ))
            }
        };
        let now = Timestamp::now();

        let reservation = match self
            .ledger
            .check_and_reserve(provider, phase, &external_tx_id, now, self.reservation_ttl_secs)
            .await
        {
            Ok(reservation) => reservation,
            Err(err) => {
                tracing::error!(provider = %provider, error = %err, "Ledger reservation failed");
                return Replied::Fresh(ReconcileOutcome::Transient);
            }
        };

        match reservation {
            Reservation::AlreadyProcessed(recorded) => Replied::Stored(recorded.response),
            Reservation::InFlight => {
                tracing::info!(
                    provider = %provider,
                    phase = %phase,
                    external_tx_id,
                    "Duplicate delivery while original is in flight"
                );
                Replied::Fresh(ReconcileOutcome::Transient)
            }
            Reservation::FirstSeen => {
                let outcome = match self.apply(provider, event, now).await {
                    Ok(outcome) => outcome,
                    Err(Decision::Rejected(rejection)) => ReconcileOutcome::Rejected(rejection),
                    Err(Decision::Transient(err)) => {
                        tracing::error!(
                            provider = %provider,
                            phase = %phase,
                            external_tx_id,
                            error = %err,
                            "Transient failure; releasing reservation"
                        );
                        if let Err(release_err) =
                            self.ledger.release(provider, phase, &external_tx_id).await
                        {
                            tracing::error!(error = %release_err, "Failed to release reservation");
                        }
                        return Replied::Fresh(ReconcileOutcome::Transient);
                    }
                };

                let response = adapter.build_response(Some(event), &outcome);
                let recorded = RecordedOutcome {
                    accepted: outcome.accepted(),
                    response: response.clone(),
                    recorded_at: Timestamp::now(),
                };
                if let Err(err) = self
                    .ledger
                    .record_outcome(provider, phase, &external_tx_id, recorded)
                    .await
                {
                    tracing::error!(error = %err, "Failed to record webhook outcome");
                }
                Replied::Stored(response)
            }
        }
    }

    /// Business transition for a first-seen mutating event.
    async fn apply(
        &self,
        provider: PaymentProvider,
        event: &NormalizedEvent,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, Decision> {
        match event {
            NormalizedEvent::Prepare {
                external_tx_id,
                account,
                amount_uzs,
                ..
            } => {
                self.apply_prepare(provider, external_tx_id, account, *amount_uzs, now)
                    .await
            }
            NormalizedEvent::Complete {
                external_tx_id,
                success,
                ..
            } => {
                self.apply_complete(provider, external_tx_id, *success, now)
                    .await
            }
            NormalizedEvent::InstantSuccess {
                external_tx_id,
                payer,
                amount_uzs,
                currency,
            } => {
                self.apply_instant_success(provider, external_tx_id, *payer, *amount_uzs, currency, now)
                    .await
            }
            _ => unreachable!("read-only event routed to mutating path"),
        }
    }

    async fn apply_prepare(
        &self,
        provider: PaymentProvider,
        external_tx_id: &str,
        account: &str,
        amount_uzs: i64,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, Decision> {
        let account_ref = self.check_payable(account, amount_uzs).await?;

        // A replayed prepare that slipped past the ledger must not
        // create a second record.
        if let Some(existing) = self
            .payments
            .find_by_external_tx(provider, external_tx_id)
            .await
            .map_err(Decision::transient)?
        {
            return if existing.is_pending() {
                Ok(ReconcileOutcome::Prepared(PaymentSnapshot::from(&existing)))
            } else {
                Err(Decision::Rejected(BusinessRejection::SubscriptionNotPayable))
            };
        }

        let payment = Payment::pending(
            PaymentId::new(),
            account_ref.parent_id,
            provider,
            external_tx_id,
            amount_uzs,
            "UZS",
            account_ref.tariff,
            now,
        );
        self.payments.insert(&payment).await.map_err(Decision::transient)?;

        self.record_event(
            "payment_prepared",
            json!({
                "provider": provider.code(),
                "external_tx_id": external_tx_id,
                "parent_id": account_ref.parent_id.to_string(),
                "tariff": account_ref.tariff.code(),
                "amount_uzs": amount_uzs,
            }),
        )
        .await;

        Ok(ReconcileOutcome::Prepared(PaymentSnapshot::from(&payment)))
    }

    async fn apply_complete(
        &self,
        provider: PaymentProvider,
        external_tx_id: &str,
        success: bool,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, Decision> {
        let mut payment = match self
            .payments
            .find_by_external_tx(provider, external_tx_id)
            .await
            .map_err(Decision::transient)?
        {
            Some(payment) => payment,
            None => return Err(Decision::Rejected(BusinessRejection::UnknownTransaction)),
        };

        // Already finalized (ledger reservation lapsed mid-crash, or a
        // cancel raced a perform): answer from the stored state.
        if !payment.is_pending() {
            let snapshot = PaymentSnapshot::from(&payment);
            return Ok(match payment.status {
                PaymentStatus::Success => ReconcileOutcome::Completed(snapshot),
                _ => ReconcileOutcome::Cancelled(snapshot),
            });
        }

        if success {
            let change = self
                .apply_subscription_change(payment.parent_id, payment.id, payment.tariff, now)
                .await?;
            payment
                .mark_success(change.subscription().id, now)
                .map_err(Decision::transient)?;
            self.payments.update(&payment).await.map_err(Decision::transient)?;
            self.announce_change(&change, &payment).await;
            Ok(ReconcileOutcome::Completed(PaymentSnapshot::from(&payment)))
        } else {
            payment.mark_failed(now).map_err(Decision::transient)?;
            self.payments.update(&payment).await.map_err(Decision::transient)?;
            self.notify(
                payment.parent_id,
                NotificationKind::PaymentFailed,
                json!({
                    "provider": provider.code(),
                    "tariff": payment.tariff.code(),
                }),
            )
            .await;
            self.record_event(
                "payment_failed",
                json!({
                    "provider": provider.code(),
                    "external_tx_id": external_tx_id,
                    "parent_id": payment.parent_id.to_string(),
                }),
            )
            .await;
            Ok(ReconcileOutcome::Cancelled(PaymentSnapshot::from(&payment)))
        }
    }

    async fn apply_instant_success(
        &self,
        provider: PaymentProvider,
        external_tx_id: &str,
        payer: ParentId,
        amount_uzs: i64,
        currency: &str,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, Decision> {
        if !self.parents.exists(&payer).await.map_err(Decision::transient)? {
            return Err(Decision::Rejected(BusinessRejection::AccountNotFound));
        }

        // Single-phase notifications carry no account reference; the
        // tariff is the one priced exactly at the paid amount.
        let tariff = match self.tariffs.tariff_for_amount(amount_uzs) {
            Some(tariff) => tariff,
            None => {
                return Err(Decision::Rejected(BusinessRejection::AmountMismatch {
                    expected: 0,
                    actual: amount_uzs,
                }))
            }
        };

        // A finalized payment replays its stored result. A pending one
        // is an interrupted earlier attempt (the subscription write
        // failed after the insert): resume the transition rather than
        // claiming a success that never happened.
        let mut payment = match self
            .payments
            .find_by_external_tx(provider, external_tx_id)
            .await
            .map_err(Decision::transient)?
        {
            Some(existing) if !existing.is_pending() => {
                let snapshot = PaymentSnapshot::from(&existing);
                return Ok(match existing.status {
                    PaymentStatus::Success => ReconcileOutcome::Completed(snapshot),
                    _ => ReconcileOutcome::Cancelled(snapshot),
                });
            }
            Some(existing) => existing,
            None => {
                let payment = Payment::pending(
                    PaymentId::new(),
                    payer,
                    provider,
                    external_tx_id,
                    amount_uzs,
                    currency,
                    tariff,
                    now,
                );
                self.payments.insert(&payment).await.map_err(Decision::transient)?;
                payment
            }
        };

        let change = self
            .apply_subscription_change(payer, payment.id, payment.tariff, now)
            .await?;
        payment
            .mark_success(change.subscription().id, now)
            .map_err(Decision::transient)?;
        self.payments.update(&payment).await.map_err(Decision::transient)?;
        self.announce_change(&change, &payment).await;

        Ok(ReconcileOutcome::Completed(PaymentSnapshot::from(&payment)))
    }

    /// Create or renew the parent's subscription, retrying the version
    /// compare-and-swap against concurrent writers.
    ///
    /// The subscription write and the payment finalization are separate
    /// statements, so a crash or transient error between them leaves the
    /// change committed with the payment still pending. The payment
    /// stamp on the stored record marks that state: when the current
    /// subscription already carries this payment's id, the change is
    /// returned as-is instead of being applied a second time.
    async fn apply_subscription_change(
        &self,
        parent_id: ParentId,
        payment_id: PaymentId,
        tariff: crate::domain::billing::Tariff,
        now: Timestamp,
    ) -> Result<SubscriptionChange, Decision> {
        let duration_days = self.tariffs.plan(tariff).duration_days;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self
                .subscriptions
                .find_current_for_parent(&parent_id)
                .await
                .map_err(Decision::transient)?;

            if let Some(sub) = &current {
                if sub.last_payment_id == Some(payment_id) {
                    tracing::info!(
                        parent_id = %parent_id,
                        payment_id = %payment_id,
                        "Subscription change already applied; resuming finalization"
                    );
                    // Inserts write version 1 and only updates bump it,
                    // so a pristine row was created by this payment.
                    return Ok(if sub.version == 1 {
                        SubscriptionChange::Created(sub.clone())
                    } else {
                        SubscriptionChange::Renewed(sub.clone())
                    });
                }
            }

            let change =
                apply_successful_payment(current, parent_id, payment_id, tariff, duration_days, now)
                    .map_err(Decision::transient)?;

            let write = match &change {
                SubscriptionChange::Created(sub) => self.subscriptions.insert(sub).await,
                SubscriptionChange::Renewed(sub) => self.subscriptions.update(sub).await,
            };

            match write {
                Ok(()) => return Ok(change),
                Err(err) if err.code == ErrorCode::VersionConflict => {
                    tracing::warn!(
                        parent_id = %parent_id,
                        attempt,
                        "Subscription version conflict; retrying"
                    );
                    continue;
                }
                Err(err) => return Err(Decision::transient(err)),
            }
        }

        Err(Decision::transient(DomainError::new(
            ErrorCode::VersionConflict,
            format!(
                "Gave up after {} compare-and-swap attempts for parent {}",
                MAX_CAS_ATTEMPTS, parent_id
            ),
        )))
    }

    /// Account/amount checks shared by probe and prepare.
    async fn check_payable(
        &self,
        account: &str,
        amount_uzs: i64,
    ) -> Result<AccountRef, Decision> {
        let account_ref = AccountRef::parse(account).map_err(Decision::Rejected)?;

        if !self
            .parents
            .exists(&account_ref.parent_id)
            .await
            .map_err(Decision::transient)?
        {
            return Err(Decision::Rejected(BusinessRejection::AccountNotFound));
        }

        let expected = self.tariffs.plan(account_ref.tariff).price_uzs;
        if expected != amount_uzs {
            return Err(Decision::Rejected(BusinessRejection::AmountMismatch {
                expected,
                actual: amount_uzs,
            }));
        }

        Ok(account_ref)
    }

    async fn announce_change(&self, change: &SubscriptionChange, payment: &Payment) {
        let subscription = change.subscription();
        let (kind, event) = match change {
            SubscriptionChange::Created(_) => {
                (NotificationKind::SubscriptionActivated, "subscription_activated")
            }
            SubscriptionChange::Renewed(_) => {
                (NotificationKind::SubscriptionRenewed, "subscription_renewed")
            }
        };

        self.notify(
            subscription.parent_id,
            kind,
            json!({
                "tariff": subscription.tariff.code(),
                "expires_at": subscription.expires_at,
                "provider": payment.provider.code(),
            }),
        )
        .await;

        self.record_event(
            event,
            json!({
                "subscription_id": subscription.id.to_string(),
                "parent_id": subscription.parent_id.to_string(),
                "payment_id": payment.id.to_string(),
                "tariff": subscription.tariff.code(),
                "amount_uzs": payment.amount_uzs,
                "expires_at": subscription.expires_at,
            }),
        )
        .await;
    }

    async fn notify(&self, parent_id: ParentId, kind: NotificationKind, payload: serde_json::Value) {
        if let Err(err) = self.notifier.notify(parent_id, kind, payload).await {
            tracing::error!(parent_id = %parent_id, error = %err, "Notification delivery failed");
        }
    }

    async fn record_event(&self, event: &str, attributes: serde_json::Value) {
        if let Err(err) = self.recorder.record(event, attributes).await {
            tracing::error!(event, error = %err, "Audit event recording failed");
        }
    }
}

/// Whether the response came out of the live path or the ledger.
enum Replied {
    Fresh(ReconcileOutcome),
    Stored(ProviderResponse),
}

/// Internal failure routing for business steps.
enum Decision {
    Rejected(BusinessRejection),
    Transient(DomainError),
}

impl Decision {
    fn transient(err: DomainError) -> Self {
        Decision::Transient(err)
    }

    fn into_outcome(self, provider: PaymentProvider) -> ReconcileOutcome {
        match self {
            Decision::Rejected(rejection) => ReconcileOutcome::Rejected(rejection),
            Decision::Transient(err) => {
                tracing::error!(provider = %provider, error = %err, "Transient reconcile failure");
                ReconcileOutcome::Transient
            }
        }
    }
}
