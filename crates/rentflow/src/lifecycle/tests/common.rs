use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;

use crate::config::PaymentsConfig;
use crate::lifecycle::applications::{Decision, DecisionOutcome, SubmitApplication};
use crate::lifecycle::documents::{
    DocumentRenderer, LeaseFacts, RenderError, RenderedDocument, SignaturePair,
};
use crate::lifecycle::domain::{DocumentRef, Lease, PaymentReference, PropertyId, UserId};
use crate::lifecycle::gateway::{
    CallbackVerifier, GatewayAuthorization, GatewayError, GatewayStatus, InitializeRequest,
    PaymentGateway,
};
use crate::lifecycle::ledger::memory::InMemoryLedger;
use crate::lifecycle::notify::{Notification, NotificationSink, NotifyError};
use crate::lifecycle::properties::{DirectoryError, PropertyDirectory, PropertyFacts};
use crate::lifecycle::router::LifecycleServices;
use crate::lifecycle::LifecycleError;

pub(super) const WEBHOOK_SECRET: &str = "whsec-test-secret";
pub(super) const ANNUAL_RENT: u64 = 120_000_000;

pub(super) fn tenant_a() -> UserId {
    UserId("tenant-ade".to_string())
}

pub(super) fn tenant_b() -> UserId {
    UserId("tenant-bola".to_string())
}

pub(super) fn landlord() -> UserId {
    UserId("landlord-chi".to_string())
}

pub(super) fn oversight() -> UserId {
    UserId("ops-oversight".to_string())
}

pub(super) fn property_id() -> PropertyId {
    PropertyId("prop-lekki-12".to_string())
}

pub(super) fn move_in() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date")
}

pub(super) fn submission(tenant: UserId) -> SubmitApplication {
    SubmitApplication {
        tenant,
        property: property_id(),
        move_in: move_in(),
        duration_years: 1,
        message: "Looking to move in with my family".to_string(),
    }
}

pub(super) fn payments_config() -> PaymentsConfig {
    PaymentsConfig {
        platform_fee_bps: 500,
        webhook_secret: WEBHOOK_SECRET.to_string(),
        gateway_timeout: Duration::from_secs(5),
        oversight_recipient: oversight().0,
    }
}

pub(super) fn verifier() -> CallbackVerifier {
    CallbackVerifier::new(WEBHOOK_SECRET)
}

pub(super) fn success_event(reference: &PaymentReference) -> Vec<u8> {
    format!(
        r#"{{"event":"charge.success","data":{{"reference":"{}","status":"success"}}}}"#,
        reference.0
    )
    .into_bytes()
}

pub(super) fn failed_event(reference: &PaymentReference) -> Vec<u8> {
    format!(
        r#"{{"event":"charge.failed","data":{{"reference":"{}","status":"failed"}}}}"#,
        reference.0
    )
    .into_bytes()
}

/// In-memory property catalog fake.
#[derive(Default)]
pub(super) struct StaticDirectory {
    properties: Mutex<HashMap<PropertyId, PropertyFacts>>,
}

impl StaticDirectory {
    pub(super) fn with_property(facts: PropertyFacts) -> Self {
        let directory = Self::default();
        directory.insert(facts);
        directory
    }

    pub(super) fn insert(&self, facts: PropertyFacts) {
        self.properties
            .lock()
            .expect("directory mutex poisoned")
            .insert(facts.id.clone(), facts);
    }

    pub(super) fn is_listable(&self, id: &PropertyId) -> bool {
        self.properties
            .lock()
            .expect("directory mutex poisoned")
            .get(id)
            .map(|facts| facts.listable)
            .unwrap_or(false)
    }
}

impl PropertyDirectory for StaticDirectory {
    fn fetch(&self, id: &PropertyId) -> Result<Option<PropertyFacts>, DirectoryError> {
        let guard = self.properties.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn set_listable(&self, id: &PropertyId, listable: bool) -> Result<(), DirectoryError> {
        let mut guard = self.properties.lock().expect("directory mutex poisoned");
        match guard.get_mut(id) {
            Some(facts) => {
                facts.listable = listable;
                Ok(())
            }
            None => Err(DirectoryError::Unavailable("unknown property".to_string())),
        }
    }
}

/// Notification sink fake capturing every dispatched alert.
#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn titles_for(&self, recipient: &UserId) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| &event.recipient == recipient)
            .map(|event| event.title)
            .collect()
    }
}

impl NotificationSink for MemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Gateway fake with scriptable verify verdicts and failure injection.
pub(super) struct ScriptedGateway {
    sequence: AtomicU64,
    verify_calls: AtomicU64,
    fail_next_initialize: AtomicBool,
    verify_verdicts: Mutex<HashMap<PaymentReference, GatewayStatus>>,
    verify_errors: Mutex<HashMap<PaymentReference, GatewayError>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            sequence: AtomicU64::new(1),
            verify_calls: AtomicU64::new(0),
            fail_next_initialize: AtomicBool::new(false),
            verify_verdicts: Mutex::new(HashMap::new()),
            verify_errors: Mutex::new(HashMap::new()),
        }
    }
}

impl ScriptedGateway {
    pub(super) fn script_verdict(&self, reference: PaymentReference, status: GatewayStatus) {
        self.verify_verdicts
            .lock()
            .expect("gateway mutex poisoned")
            .insert(reference, status);
    }

    pub(super) fn script_error(&self, reference: PaymentReference, error: GatewayError) {
        self.verify_errors
            .lock()
            .expect("gateway mutex poisoned")
            .insert(reference, error);
    }

    pub(super) fn fail_next_initialize(&self) {
        self.fail_next_initialize.store(true, Ordering::SeqCst);
    }

    pub(super) fn verify_calls(&self) -> u64 {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for ScriptedGateway {
    fn initialize_transaction(
        &self,
        request: InitializeRequest,
    ) -> Result<GatewayAuthorization, GatewayError> {
        if self.fail_next_initialize.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let reference = PaymentReference(format!("RW-{}-{id:05}", request.lease.0));
        Ok(GatewayAuthorization {
            redirect_url: format!("https://checkout.sandbox.example/{}", reference.0),
            reference,
        })
    }

    fn verify_transaction(
        &self,
        reference: &PaymentReference,
    ) -> Result<GatewayStatus, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self
            .verify_errors
            .lock()
            .expect("gateway mutex poisoned")
            .remove(reference)
        {
            return Err(error);
        }
        let verdicts = self.verify_verdicts.lock().expect("gateway mutex poisoned");
        Ok(verdicts
            .get(reference)
            .copied()
            .unwrap_or(GatewayStatus::Success))
    }

    fn request_refund(&self, _reference: &PaymentReference) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// Renderer fake counting renders and serving cached fetches.
#[derive(Default)]
pub(super) struct StubRenderer {
    renders: AtomicU64,
    stored: Mutex<HashMap<DocumentRef, Vec<u8>>>,
}

impl StubRenderer {
    pub(super) fn render_count(&self) -> u64 {
        self.renders.load(Ordering::SeqCst)
    }
}

impl DocumentRenderer for StubRenderer {
    fn render(
        &self,
        facts: &LeaseFacts,
        _signatures: &SignaturePair,
    ) -> Result<RenderedDocument, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let reference = DocumentRef(format!("docs/{}.pdf", facts.lease.0));
        let bytes = format!("agreement for {}", facts.lease.0).into_bytes();
        self.stored
            .lock()
            .expect("renderer mutex poisoned")
            .insert(reference.clone(), bytes.clone());
        Ok(RenderedDocument { reference, bytes })
    }

    fn fetch(&self, reference: &DocumentRef) -> Result<Option<RenderedDocument>, RenderError> {
        let guard = self.stored.lock().expect("renderer mutex poisoned");
        Ok(guard.get(reference).map(|bytes| RenderedDocument {
            reference: reference.clone(),
            bytes: bytes.clone(),
        }))
    }
}

pub(super) type TestServices =
    LifecycleServices<InMemoryLedger, ScriptedGateway, StaticDirectory, MemoryNotifier, StubRenderer>;

pub(super) struct Fixture {
    pub(super) services: Arc<TestServices>,
    pub(super) ledger: Arc<InMemoryLedger>,
    pub(super) gateway: Arc<ScriptedGateway>,
    pub(super) directory: Arc<StaticDirectory>,
    pub(super) notifier: Arc<MemoryNotifier>,
    pub(super) renderer: Arc<StubRenderer>,
}

pub(super) fn fixture() -> Fixture {
    let ledger = Arc::new(InMemoryLedger::new());
    let gateway = Arc::new(ScriptedGateway::default());
    let directory = Arc::new(StaticDirectory::with_property(PropertyFacts {
        id: property_id(),
        landlord: landlord(),
        annual_rent: ANNUAL_RENT,
        listable: true,
    }));
    let notifier = Arc::new(MemoryNotifier::default());
    let renderer = Arc::new(StubRenderer::default());

    let services = Arc::new(LifecycleServices::new(
        ledger.clone(),
        gateway.clone(),
        directory.clone(),
        notifier.clone(),
        renderer.clone(),
        &payments_config(),
    ));

    Fixture {
        services,
        ledger,
        gateway,
        directory,
        notifier,
        renderer,
    }
}

impl Fixture {
    /// Submit and approve an application, returning the created pending lease.
    pub(super) fn approved_lease(&self, tenant: UserId) -> Lease {
        let application = self
            .services
            .applications
            .submit(submission(tenant))
            .expect("submission succeeds");
        match self
            .services
            .applications
            .decide(&application.id, &landlord(), Decision::Approve)
            .expect("approval succeeds")
        {
            DecisionOutcome::Approved(record) => record.lease,
            DecisionOutcome::Rejected { .. } => panic!("expected approval outcome"),
        }
    }

    /// Full happy path up to an occupied lease: approve, initiate, confirm.
    pub(super) fn occupied_lease(&self, tenant: UserId) -> Lease {
        let lease = self.approved_lease(tenant.clone());
        let initiation = self
            .services
            .payments
            .initiate(&lease.id, &tenant)
            .expect("initiate succeeds");
        self.services
            .payments
            .confirm(&initiation.reference)
            .expect("confirm succeeds");
        self.services
            .leases
            .get(&lease.id)
            .expect("lease still present")
    }
}

pub(super) fn expect_conflict(result: Result<impl std::fmt::Debug, LifecycleError>) {
    match result {
        Err(LifecycleError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

pub(super) fn expect_forbidden(result: Result<impl std::fmt::Debug, LifecycleError>) {
    match result {
        Err(LifecycleError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}
