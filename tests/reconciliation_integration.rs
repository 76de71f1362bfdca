//! End-to-end reconciliation flows over the in-memory adapters.
//!
//! Each test drives raw provider webhooks through the orchestrator and
//! the sweeper the way production traffic would, asserting on the
//! provider-facing responses and the resulting billing state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use md5::{Digest, Md5};
use serde_json::json;

use edubot_billing::adapters::memory::{
    InMemoryEventRecorder, InMemoryIdempotencyLedger, InMemoryNotificationSender,
    InMemoryParentDirectory, InMemoryPaymentRepository, InMemorySubscriptionRepository,
};
use edubot_billing::adapters::providers::{ClickAdapter, PaymeAdapter, StarsAdapter};
use edubot_billing::application::{
    CancelSubscription, ExpirySweeper, ReconcileWebhookHandler, StatusQuery, SweeperConfig,
};
use edubot_billing::domain::billing::{
    AccountRef, NotificationKind, Payment, PaymentProvider, PaymentStatus, Subscription,
    SubscriptionStatus, Tariff, TariffTable,
};
use edubot_billing::domain::foundation::{
    DomainError, ParentId, PaymentId, SubscriptionId, Timestamp,
};
use edubot_billing::ports::{PaymentRepository, RawWebhook, SubscriptionRepository};

const STARS_SECRET: &str = "stars-secret";
const PAYME_SECRET: &str = "payme-secret";
const CLICK_SERVICE_ID: &str = "12345";
const CLICK_SECRET: &str = "click-secret";

struct World {
    handler: ReconcileWebhookHandler,
    stars: StarsAdapter,
    payme: PaymeAdapter,
    click: ClickAdapter,
    sweeper: ExpirySweeper,
    cancel: CancelSubscription,
    status: StatusQuery,
    subscriptions: Arc<InMemorySubscriptionRepository>,
    payments: Arc<InMemoryPaymentRepository>,
    parents: Arc<InMemoryParentDirectory>,
    notifier: Arc<InMemoryNotificationSender>,
    recorder: Arc<InMemoryEventRecorder>,
}

fn world() -> World {
    let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
    let payments = Arc::new(InMemoryPaymentRepository::new());
    let ledger = Arc::new(InMemoryIdempotencyLedger::new());
    let parents = Arc::new(InMemoryParentDirectory::new());
    let notifier = Arc::new(InMemoryNotificationSender::new());
    let recorder = Arc::new(InMemoryEventRecorder::new());

    let handler = ReconcileWebhookHandler::new(
        subscriptions.clone(),
        payments.clone(),
        ledger.clone(),
        parents.clone(),
        notifier.clone(),
        recorder.clone(),
        TariffTable::production_defaults(),
        120,
    );

    let sweeper = ExpirySweeper::new(
        subscriptions.clone(),
        ledger,
        notifier.clone(),
        recorder.clone(),
        SweeperConfig {
            interval: Duration::from_secs(3600),
            grace_window_days: 3,
            ledger_retention_days: 90,
        },
    );

    let cancel = CancelSubscription::new(
        subscriptions.clone(),
        notifier.clone(),
        recorder.clone(),
    );
    let status = StatusQuery::new(subscriptions.clone());

    World {
        handler,
        stars: StarsAdapter::new(STARS_SECRET),
        payme: PaymeAdapter::new(PAYME_SECRET),
        click: ClickAdapter::new(CLICK_SERVICE_ID, CLICK_SECRET),
        sweeper,
        cancel,
        status,
        subscriptions,
        payments,
        parents,
        notifier,
        recorder,
    }
}

fn order(parent_id: ParentId, tariff: Tariff) -> String {
    AccountRef { parent_id, tariff }.encode()
}

// ── Payme request builders ──────────────────────────────────────────────

fn payme_rpc(method: &str, params: serde_json::Value) -> RawWebhook {
    let auth = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("Paycom:{}", PAYME_SECRET))
    );
    let body = serde_json::to_vec(&json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    }))
    .unwrap();
    RawWebhook::from_body(body).with_auth(auth)
}

async fn payme_pay(w: &World, parent_id: ParentId, tariff: Tariff, tx: &str, tiyin: i64) {
    let prepare = payme_rpc(
        "CreateTransaction",
        json!({
            "id": tx,
            "amount": tiyin,
            "account": {"order_id": order(parent_id, tariff)},
        }),
    );
    let response = w.handler.handle(&w.payme, &prepare).await;
    assert_eq!(response.body["result"]["state"], json!(1), "{:?}", response);

    let complete = payme_rpc("PerformTransaction", json!({"id": tx}));
    let response = w.handler.handle(&w.payme, &complete).await;
    assert_eq!(response.body["result"]["state"], json!(2), "{:?}", response);
}

// ── Click request builders ──────────────────────────────────────────────

fn click_sign(
    click_trans_id: &str,
    merchant_trans_id: &str,
    merchant_prepare_id: Option<&str>,
    amount: &str,
    action: &str,
    sign_time: &str,
) -> String {
    let mut hasher = Md5::new();
    hasher.update(click_trans_id.as_bytes());
    hasher.update(CLICK_SERVICE_ID.as_bytes());
    hasher.update(CLICK_SECRET.as_bytes());
    hasher.update(merchant_trans_id.as_bytes());
    if let Some(prepare_id) = merchant_prepare_id {
        hasher.update(prepare_id.as_bytes());
    }
    hasher.update(amount.as_bytes());
    hasher.update(action.as_bytes());
    hasher.update(sign_time.as_bytes());
    hex::encode(hasher.finalize())
}

fn click_prepare(click_trans_id: &str, merchant_trans_id: &str, amount: &str) -> RawWebhook {
    let sign_time = "2026-08-30 12:00:00";
    let mut params = HashMap::new();
    params.insert("click_trans_id".to_string(), click_trans_id.to_string());
    params.insert("service_id".to_string(), CLICK_SERVICE_ID.to_string());
    params.insert("merchant_trans_id".to_string(), merchant_trans_id.to_string());
    params.insert("amount".to_string(), amount.to_string());
    params.insert("action".to_string(), "0".to_string());
    params.insert("sign_time".to_string(), sign_time.to_string());
    params.insert(
        "sign_string".to_string(),
        click_sign(click_trans_id, merchant_trans_id, None, amount, "0", sign_time),
    );
    RawWebhook::from_query(params)
}

fn click_complete(
    click_trans_id: &str,
    merchant_trans_id: &str,
    merchant_prepare_id: &str,
    amount: &str,
    error: i64,
) -> RawWebhook {
    let sign_time = "2026-08-30 12:05:00";
    let mut params = HashMap::new();
    params.insert("click_trans_id".to_string(), click_trans_id.to_string());
    params.insert("service_id".to_string(), CLICK_SERVICE_ID.to_string());
    params.insert("merchant_trans_id".to_string(), merchant_trans_id.to_string());
    params.insert(
        "merchant_prepare_id".to_string(),
        merchant_prepare_id.to_string(),
    );
    params.insert("amount".to_string(), amount.to_string());
    params.insert("action".to_string(), "1".to_string());
    params.insert("error".to_string(), error.to_string());
    params.insert("sign_time".to_string(), sign_time.to_string());
    params.insert(
        "sign_string".to_string(),
        click_sign(
            click_trans_id,
            merchant_trans_id,
            Some(merchant_prepare_id),
            amount,
            "1",
            sign_time,
        ),
    );
    RawWebhook::from_query(params)
}

// ── Stars request builder ───────────────────────────────────────────────

fn stars_notification(transaction_id: &str, payer: &ParentId, amount: i64) -> RawWebhook {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let payload = format!("{}.{}.{}.XTR", transaction_id, payer, amount);
    let mut mac = Hmac::<Sha256>::new_from_slice(STARS_SECRET.as_bytes()).unwrap();
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    let body = serde_json::to_vec(&json!({
        "transaction_id": transaction_id,
        "amount": amount,
        "currency": "XTR",
        "payer_id": payer,
        "signature": signature,
    }))
    .unwrap();
    RawWebhook::from_body(body)
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[tokio::test]
async fn payme_payment_activates_then_sweeper_walks_grace_and_expiry() {
    let w = world();
    let parent_id = ParentId::new();
    w.parents.register(parent_id);
    let base = Timestamp::now();

    payme_pay(&w, parent_id, Tariff::Monthly, "payme-tx-1", 9_900_000).await;

    let subscription = w
        .subscriptions
        .find_current_for_parent(&parent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(subscription.tariff, Tariff::Monthly);
    assert_eq!(subscription.expires_at, subscription.starts_at.add_days(30));

    // Day 31: period over, grace begins, access retained.
    let report = w.sweeper.run_once(base.add_days(31)).await;
    assert_eq!(report.entered_grace, 1);
    let view = w
        .status
        .status_for(&parent_id, base.add_days(31))
        .await
        .unwrap()
        .unwrap();
    assert!(view.in_grace);
    assert!(view.has_access);

    // Day 34: grace window (3 days) elapsed, access revoked.
    let report = w.sweeper.run_once(base.add_days(34)).await;
    assert_eq!(report.expired_from_grace, 1);
    let view = w
        .status
        .status_for(&parent_id, base.add_days(34))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.status, SubscriptionStatus::Expired);
    assert!(!view.has_access);

    assert_eq!(
        w.notifier.kinds_for(&parent_id),
        vec![
            NotificationKind::SubscriptionActivated,
            NotificationKind::GraceEntered,
            NotificationKind::SubscriptionExpired,
        ]
    );
}

#[tokio::test]
async fn click_payment_renews_the_payme_started_subscription() {
    let w = world();
    let parent_id = ParentId::new();
    w.parents.register(parent_id);

    payme_pay(&w, parent_id, Tariff::Monthly, "payme-tx-1", 9_900_000).await;
    let first_expiry = w
        .subscriptions
        .find_current_for_parent(&parent_id)
        .await
        .unwrap()
        .unwrap()
        .expires_at;

    let account = order(parent_id, Tariff::Monthly);
    let response = w
        .handler
        .handle(&w.click, &click_prepare("click-tx-1", &account, "99000"))
        .await;
    assert_eq!(response.body["error"], json!(0), "{:?}", response);
    let prepare_id = response.body["merchant_prepare_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = w
        .handler
        .handle(
            &w.click,
            &click_complete("click-tx-1", &account, &prepare_id, "99000", 0),
        )
        .await;
    assert_eq!(response.body["error"], json!(0), "{:?}", response);
    assert!(response.body["merchant_confirm_id"].is_string());

    // One subscription, early renewal stacked onto the remaining period.
    assert_eq!(w.subscriptions.all().len(), 1);
    let renewed = w
        .subscriptions
        .find_current_for_parent(&parent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renewed.expires_at, first_expiry.add_days(30));
    assert_eq!(
        w.notifier.kinds_for(&parent_id),
        vec![
            NotificationKind::SubscriptionActivated,
            NotificationKind::SubscriptionRenewed,
        ]
    );
}

#[tokio::test]
async fn click_complete_with_negative_error_cancels_without_subscription() {
    let w = world();
    let parent_id = ParentId::new();
    w.parents.register(parent_id);
    let account = order(parent_id, Tariff::Monthly);

    let response = w
        .handler
        .handle(&w.click, &click_prepare("click-tx-1", &account, "99000"))
        .await;
    let prepare_id = response.body["merchant_prepare_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Payer abandoned: Click reports error < 0 on the complete leg.
    let response = w
        .handler
        .handle(
            &w.click,
            &click_complete("click-tx-1", &account, &prepare_id, "99000", -1),
        )
        .await;
    assert_eq!(response.body["error"], json!(-9));

    let payment = w
        .payments
        .find_by_external_tx(PaymentProvider::Click, "click-tx-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(w
        .subscriptions
        .find_current_for_parent(&parent_id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        w.notifier.kinds_for(&parent_id),
        vec![NotificationKind::PaymentFailed]
    );
}

#[tokio::test]
async fn click_prepare_with_wrong_amount_is_rejected() {
    let w = world();
    let parent_id = ParentId::new();
    w.parents.register(parent_id);
    let account = order(parent_id, Tariff::Monthly);

    let response = w
        .handler
        .handle(&w.click, &click_prepare("click-tx-1", &account, "50000"))
        .await;
    assert_eq!(response.body["error"], json!(-2));
    assert!(w.payments.all().is_empty());
}

#[tokio::test]
async fn stars_notification_activates_instantly() {
    let w = world();
    let parent_id = ParentId::new();
    w.parents.register(parent_id);

    let response = w
        .handler
        .handle(&w.stars, &stars_notification("stars-tx-1", &parent_id, 99_000))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["ok"], json!(true));

    let subscription = w
        .subscriptions
        .find_current_for_parent(&parent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.tariff, Tariff::Monthly);
    assert_eq!(
        w.notifier.kinds_for(&parent_id),
        vec![NotificationKind::SubscriptionActivated]
    );
}

#[tokio::test]
async fn duplicate_stars_notification_applies_once() {
    let w = world();
    let parent_id = ParentId::new();
    w.parents.register(parent_id);
    let raw = stars_notification("stars-tx-1", &parent_id, 99_000);

    let first = w.handler.handle(&w.stars, &raw).await;
    let second = w.handler.handle(&w.stars, &raw).await;
    assert_eq!(first, second);

    let subscription = w
        .subscriptions
        .find_current_for_parent(&parent_id)
        .await
        .unwrap()
        .unwrap();
    // 30 days, not 60: the replay was answered from the ledger.
    assert_eq!(subscription.expires_at, subscription.starts_at.add_days(30));
    assert_eq!(w.payments.all().len(), 1);
    assert_eq!(
        w.notifier.kinds_for(&parent_id),
        vec![NotificationKind::SubscriptionActivated]
    );
}

#[tokio::test]
async fn cancelled_subscription_keeps_access_then_expires_without_grace() {
    let w = world();
    let parent_id = ParentId::new();
    w.parents.register(parent_id);
    let base = Timestamp::now();

    w.handler
        .handle(&w.stars, &stars_notification("stars-tx-1", &parent_id, 99_000))
        .await;

    let ack = w.cancel.cancel(&parent_id, base.add_days(5)).await.unwrap();

    let view = w
        .status
        .status_for(&parent_id, base.add_days(10))
        .await
        .unwrap()
        .unwrap();
    assert!(view.cancellation_pending);
    assert!(view.has_access);
    assert_eq!(ack.access_until, view.expires_at);

    // Past the paid period the record expires directly, no grace and no
    // renewal reminder.
    let report = w.sweeper.run_once(base.add_days(31)).await;
    assert_eq!(report.expired_cancelled, 1);
    assert_eq!(report.entered_grace, 0);

    let view = w
        .status
        .status_for(&parent_id, base.add_days(31))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.status, SubscriptionStatus::Expired);
    assert!(!view.has_access);
    assert_eq!(
        w.notifier.kinds_for(&parent_id),
        vec![
            NotificationKind::SubscriptionActivated,
            NotificationKind::CancellationScheduled,
        ]
    );
}

#[tokio::test]
async fn every_transition_leaves_an_audit_trail() {
    let w = world();
    let parent_id = ParentId::new();
    w.parents.register(parent_id);
    let base = Timestamp::now();

    payme_pay(&w, parent_id, Tariff::Monthly, "payme-tx-1", 9_900_000).await;
    w.sweeper.run_once(base.add_days(31)).await;
    w.sweeper.run_once(base.add_days(34)).await;

    let events = w.recorder.event_names();
    assert!(events.contains(&"payment_prepared".to_string()));
    assert!(events.contains(&"subscription_activated".to_string()));
    assert!(events.contains(&"grace_entered".to_string()));
    assert!(events.contains(&"subscription_expired".to_string()));
}

// ── Fault injection ─────────────────────────────────────────────────────
//
// The subscription write and the payment finalization are separate
// statements, so a transient failure between them leaves the two out of
// step until the provider redelivers. These wrappers fail exactly one
// write the way a dropped connection would; the retried delivery must
// converge on a single applied period and a finalized payment.

struct UnreliablePaymentRepository {
    inner: InMemoryPaymentRepository,
    fail_next_update: AtomicBool,
}

impl UnreliablePaymentRepository {
    fn new() -> Self {
        Self {
            inner: InMemoryPaymentRepository::new(),
            fail_next_update: AtomicBool::new(false),
        }
    }

    fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentRepository for UnreliablePaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), DomainError> {
        self.inner.insert(payment).await
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(DomainError::database("connection reset by peer"));
        }
        self.inner.update(payment).await
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_external_tx(
        &self,
        provider: PaymentProvider,
        external_tx_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        self.inner.find_by_external_tx(provider, external_tx_id).await
    }
}

struct UnreliableSubscriptionRepository {
    inner: InMemorySubscriptionRepository,
    fail_next_insert: AtomicBool,
}

impl UnreliableSubscriptionRepository {
    fn new() -> Self {
        Self {
            inner: InMemorySubscriptionRepository::new(),
            fail_next_insert: AtomicBool::new(false),
        }
    }

    fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubscriptionRepository for UnreliableSubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(DomainError::database("connection reset by peer"));
        }
        self.inner.insert(subscription).await
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        self.inner.update(subscription).await
    }

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.inner.find_by_id(id).await
    }

    async fn find_current_for_parent(
        &self,
        parent_id: &ParentId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.inner.find_current_for_parent(parent_id).await
    }

    async fn find_latest_for_parent(
        &self,
        parent_id: &ParentId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.inner.find_latest_for_parent(parent_id).await
    }

    async fn list_active_past_expiry(
        &self,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.inner.list_active_past_expiry(now).await
    }

    async fn list_grace_past_deadline(
        &self,
        now: Timestamp,
        grace_window_days: i64,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.inner.list_grace_past_deadline(now, grace_window_days).await
    }

    async fn list_cancelled_past_expiry(
        &self,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.inner.list_cancelled_past_expiry(now).await
    }
}

#[tokio::test]
async fn payme_perform_retry_after_payment_write_failure_extends_once() {
    let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
    let payments = Arc::new(UnreliablePaymentRepository::new());
    let parents = Arc::new(InMemoryParentDirectory::new());
    let notifier = Arc::new(InMemoryNotificationSender::new());
    let handler = ReconcileWebhookHandler::new(
        subscriptions.clone(),
        payments.clone(),
        Arc::new(InMemoryIdempotencyLedger::new()),
        parents.clone(),
        notifier.clone(),
        Arc::new(InMemoryEventRecorder::new()),
        TariffTable::production_defaults(),
        120,
    );
    let payme = PaymeAdapter::new(PAYME_SECRET);

    let parent_id = ParentId::new();
    parents.register(parent_id);

    let prepare = payme_rpc(
        "CreateTransaction",
        json!({
            "id": "payme-tx-reset",
            "amount": 9_900_000,
            "account": {"order_id": order(parent_id, Tariff::Monthly)},
        }),
    );
    let response = handler.handle(&payme, &prepare).await;
    assert_eq!(response.body["result"]["state"], json!(1), "{:?}", response);

    // The subscription write lands, then the payment finalization dies.
    payments.fail_next_update();
    let perform = payme_rpc("PerformTransaction", json!({"id": "payme-tx-reset"}));
    let response = handler.handle(&payme, &perform).await;
    assert_eq!(response.body["error"]["code"], json!(-31008), "{:?}", response);

    // Payme redelivers the identical request.
    let perform = payme_rpc("PerformTransaction", json!({"id": "payme-tx-reset"}));
    let response = handler.handle(&payme, &perform).await;
    assert_eq!(response.body["result"]["state"], json!(2), "{:?}", response);

    // One monthly payment buys one monthly period, not two.
    let subscription = subscriptions
        .find_current_for_parent(&parent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        subscription.expires_at,
        subscription.starts_at.add_days(30)
    );

    let payment = payments
        .find_by_external_tx(PaymentProvider::Payme, "payme-tx-reset")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(
        notifier.kinds_for(&parent_id),
        vec![NotificationKind::SubscriptionActivated]
    );
}

#[tokio::test]
async fn stars_retry_after_subscription_write_failure_still_activates() {
    let subscriptions = Arc::new(UnreliableSubscriptionRepository::new());
    let payments = Arc::new(InMemoryPaymentRepository::new());
    let parents = Arc::new(InMemoryParentDirectory::new());
    let notifier = Arc::new(InMemoryNotificationSender::new());
    let handler = ReconcileWebhookHandler::new(
        subscriptions.clone(),
        payments.clone(),
        Arc::new(InMemoryIdempotencyLedger::new()),
        parents.clone(),
        notifier.clone(),
        Arc::new(InMemoryEventRecorder::new()),
        TariffTable::production_defaults(),
        120,
    );
    let stars = StarsAdapter::new(STARS_SECRET);

    let parent_id = ParentId::new();
    parents.register(parent_id);

    // The payment row lands, then the subscription write dies.
    subscriptions.fail_next_insert();
    let response = handler
        .handle(&stars, &stars_notification("stars-tx-reset", &parent_id, 99_000))
        .await;
    assert_eq!(response.status, 503, "{:?}", response);
    assert_eq!(response.body["ok"], json!(false));

    // Telegram redelivers; the retry must not be answered success
    // without the subscription actually existing.
    let response = handler
        .handle(&stars, &stars_notification("stars-tx-reset", &parent_id, 99_000))
        .await;
    assert_eq!(response.status, 200, "{:?}", response);
    assert_eq!(response.body["ok"], json!(true));

    let subscription = subscriptions
        .find_current_for_parent(&parent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(
        subscription.expires_at,
        subscription.starts_at.add_days(30)
    );

    let payment = payments
        .find_by_external_tx(PaymentProvider::Stars, "stars-tx-reset")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(
        notifier.kinds_for(&parent_id),
        vec![NotificationKind::SubscriptionActivated]
    );
}
