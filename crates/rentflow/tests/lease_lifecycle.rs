//! Integration specifications for the lease lifecycle.
//!
//! Scenarios drive the public service facades and the HTTP router end to end:
//! application intake and approval, the racing dual-path payment
//! confirmation, signature collection with document gating, and expiry.

mod common {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::NaiveDate;

    use rentflow::config::PaymentsConfig;
    use rentflow::lifecycle::documents::{
        DocumentRenderer, LeaseFacts, RenderError, RenderedDocument, SignaturePair,
    };
    use rentflow::lifecycle::domain::{DocumentRef, PropertyId, UserId};
    use rentflow::lifecycle::gateway::{
        CallbackVerifier, GatewayAuthorization, GatewayError, GatewayStatus, InitializeRequest,
        PaymentGateway,
    };
    use rentflow::lifecycle::ledger::memory::InMemoryLedger;
    use rentflow::lifecycle::notify::{Notification, NotificationSink, NotifyError};
    use rentflow::lifecycle::properties::{DirectoryError, PropertyDirectory, PropertyFacts};
    use rentflow::lifecycle::router::LifecycleServices;
    use rentflow::lifecycle::{PaymentReference, SubmitApplication};

    pub(super) const WEBHOOK_SECRET: &str = "whsec-integration";
    pub(super) const ANNUAL_RENT: u64 = 120_000_000;

    pub(super) fn tenant() -> UserId {
        UserId("tenant-amaka".to_string())
    }

    pub(super) fn rival_tenant() -> UserId {
        UserId("tenant-dare".to_string())
    }

    pub(super) fn landlord() -> UserId {
        UserId("landlord-emeka".to_string())
    }

    pub(super) fn oversight() -> UserId {
        UserId("platform-ops".to_string())
    }

    pub(super) fn property() -> PropertyId {
        PropertyId("prop-vi-07".to_string())
    }

    pub(super) fn move_in() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
    }

    pub(super) fn submission(applicant: UserId) -> SubmitApplication {
        SubmitApplication {
            tenant: applicant,
            property: property(),
            move_in: move_in(),
            duration_years: 1,
            message: "One year lease, ready to move in".to_string(),
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

    #[derive(Default)]
    pub(super) struct MemoryDirectory {
        properties: Mutex<HashMap<PropertyId, PropertyFacts>>,
    }

    impl MemoryDirectory {
        pub(super) fn insert(&self, facts: PropertyFacts) {
            self.properties
                .lock()
                .expect("lock")
                .insert(facts.id.clone(), facts);
        }

        pub(super) fn is_listable(&self, id: &PropertyId) -> bool {
            self.properties
                .lock()
                .expect("lock")
                .get(id)
                .map(|facts| facts.listable)
                .unwrap_or(false)
        }
    }

    impl PropertyDirectory for MemoryDirectory {
        fn fetch(&self, id: &PropertyId) -> Result<Option<PropertyFacts>, DirectoryError> {
            Ok(self.properties.lock().expect("lock").get(id).cloned())
        }

        fn set_listable(&self, id: &PropertyId, listable: bool) -> Result<(), DirectoryError> {
            let mut guard = self.properties.lock().expect("lock");
            if let Some(facts) = guard.get_mut(id) {
                facts.listable = listable;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub(super) struct MemoryNotifier {
        events: Mutex<Vec<Notification>>,
    }

    impl MemoryNotifier {
        pub(super) fn events(&self) -> Vec<Notification> {
            self.events.lock().expect("lock").clone()
        }
    }

    impl NotificationSink for MemoryNotifier {
        fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
            self.events.lock().expect("lock").push(notification);
            Ok(())
        }
    }

    /// Gateway fake that approves everything it is asked to verify.
    #[derive(Default)]
    pub(super) struct ApprovingGateway {
        sequence: AtomicU64,
    }

    impl PaymentGateway for ApprovingGateway {
        fn initialize_transaction(
            &self,
            _request: InitializeRequest,
        ) -> Result<GatewayAuthorization, GatewayError> {
            let id = self.sequence.fetch_add(1, Ordering::Relaxed);
            let reference = PaymentReference(format!("RW-INT-{id:05}"));
            Ok(GatewayAuthorization {
                redirect_url: format!("https://checkout.sandbox.example/{}", reference.0),
                reference,
            })
        }

        fn verify_transaction(
            &self,
            _reference: &PaymentReference,
        ) -> Result<GatewayStatus, GatewayError> {
            Ok(GatewayStatus::Success)
        }

        fn request_refund(&self, _reference: &PaymentReference) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    #[derive(Default)]
    pub(super) struct PlainRenderer {
        stored: Mutex<HashMap<DocumentRef, Vec<u8>>>,
        renders: AtomicU64,
    }

    impl PlainRenderer {
        pub(super) fn render_count(&self) -> u64 {
            self.renders.load(Ordering::SeqCst)
        }
    }

    impl DocumentRenderer for PlainRenderer {
        fn render(
            &self,
            facts: &LeaseFacts,
            _signatures: &SignaturePair,
        ) -> Result<RenderedDocument, RenderError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            let reference = DocumentRef(format!("docs/{}.pdf", facts.lease.0));
            let bytes = format!(
                "lease {} from {} to {}",
                facts.lease.0, facts.start_date, facts.end_date
            )
            .into_bytes();
            self.stored
                .lock()
                .expect("lock")
                .insert(reference.clone(), bytes.clone());
            Ok(RenderedDocument { reference, bytes })
        }

        fn fetch(&self, reference: &DocumentRef) -> Result<Option<RenderedDocument>, RenderError> {
            Ok(self
                .stored
                .lock()
                .expect("lock")
                .get(reference)
                .map(|bytes| RenderedDocument {
                    reference: reference.clone(),
                    bytes: bytes.clone(),
                }))
        }
    }

    pub(super) type Services = LifecycleServices<
        InMemoryLedger,
        ApprovingGateway,
        MemoryDirectory,
        MemoryNotifier,
        PlainRenderer,
    >;

    pub(super) struct World {
        pub(super) services: Arc<Services>,
        pub(super) ledger: Arc<InMemoryLedger>,
        pub(super) directory: Arc<MemoryDirectory>,
        pub(super) notifier: Arc<MemoryNotifier>,
        pub(super) renderer: Arc<PlainRenderer>,
    }

    pub(super) fn world() -> World {
        let ledger = Arc::new(InMemoryLedger::new());
        let directory = Arc::new(MemoryDirectory::default());
        directory.insert(PropertyFacts {
            id: property(),
            landlord: landlord(),
            annual_rent: ANNUAL_RENT,
            listable: true,
        });
        let notifier = Arc::new(MemoryNotifier::default());
        let gateway = Arc::new(ApprovingGateway::default());
        let renderer = Arc::new(PlainRenderer::default());

        let payments = PaymentsConfig {
            platform_fee_bps: 500,
            webhook_secret: WEBHOOK_SECRET.to_string(),
            gateway_timeout: Duration::from_secs(5),
            oversight_recipient: oversight().0,
        };

        let services = Arc::new(LifecycleServices::new(
            ledger.clone(),
            gateway,
            directory.clone(),
            notifier.clone(),
            renderer.clone(),
            &payments,
        ));

        World {
            services,
            ledger,
            directory,
            notifier,
            renderer,
        }
    }
}

use common::*;
use rentflow::lifecycle::domain::{
    ApplicationStatus, LeaseStatus, PaymentStatus, SignatureRef, SignatureRole,
};
use rentflow::lifecycle::ledger::LeaseLedger;
use rentflow::lifecycle::payments::PaymentOutcome;
use rentflow::lifecycle::router::{lifecycle_router, SIGNATURE_HEADER};
use rentflow::lifecycle::{Decision, DecisionOutcome, LifecycleError};
use tower::ServiceExt;

#[test]
fn full_lifecycle_settles_exactly_once_with_the_advertised_split() {
    let world = world();

    // Tenant applies and the landlord approves.
    let application = world
        .services
        .applications
        .submit(submission(tenant()))
        .expect("submission succeeds");
    let record = match world
        .services
        .applications
        .decide(&application.id, &landlord(), Decision::Approve)
        .expect("approval succeeds")
    {
        DecisionOutcome::Approved(record) => record,
        other => panic!("expected approval, got {other:?}"),
    };
    assert_eq!(record.lease.rent_amount, ANNUAL_RENT);
    assert_eq!(record.lease.status, LeaseStatus::Pending);

    // Tenant initiates payment and is redirected to the gateway.
    let initiation = world
        .services
        .payments
        .initiate(&record.lease.id, &tenant())
        .expect("initiate succeeds");
    assert_eq!(initiation.amount, 120_000_000);

    // Gateway verify and webhook both report success within the same second.
    let direct = world
        .services
        .payments
        .confirm(&initiation.reference)
        .expect("direct verify succeeds");
    let payload = success_event(&initiation.reference);
    let signature = verifier().signature_for(&payload);
    let hook = world
        .services
        .payments
        .process_webhook(&payload, &signature)
        .expect("webhook acknowledged");

    let settled = [&direct, &hook]
        .iter()
        .filter(|outcome| matches!(outcome, PaymentOutcome::Settled { .. }))
        .count();
    assert_eq!(settled, 1, "only one path applies the transition");

    // Exactly one success, the lease is occupied, and the split is booked.
    let payment = world
        .services
        .payments
        .get(&initiation.reference)
        .expect("payment readable");
    assert_eq!(payment.status, PaymentStatus::Success);
    let lease = world
        .services
        .leases
        .get(&record.lease.id)
        .expect("lease readable");
    assert_eq!(lease.status, LeaseStatus::Occupied);
    assert_eq!(world.ledger.revenue_entry_count(), 1);
    let revenue = world
        .ledger
        .revenue_for(&initiation.reference)
        .expect("ledger readable")
        .expect("revenue booked");
    assert_eq!(revenue.platform_fee, 6_000_000);
    assert_eq!(revenue.landlord_earning, 114_000_000);

    // The property is off the market until expiry.
    assert!(!world.directory.is_listable(&property()));
}

#[test]
fn rival_application_is_cascade_rejected_and_cannot_be_approved() {
    let world = world();

    let first = world
        .services
        .applications
        .submit(submission(tenant()))
        .expect("first submission succeeds");
    let second = world
        .services
        .applications
        .submit(submission(rival_tenant()))
        .expect("second submission succeeds");

    let record = match world
        .services
        .applications
        .decide(&first.id, &landlord(), Decision::Approve)
        .expect("approval succeeds")
    {
        DecisionOutcome::Approved(record) => record,
        other => panic!("expected approval, got {other:?}"),
    };
    assert_eq!(record.rejected.len(), 1);

    let rival = world
        .services
        .applications
        .get(&second.id)
        .expect("rival readable");
    assert_eq!(rival.status, ApplicationStatus::Rejected);

    match world
        .services
        .applications
        .decide(&second.id, &landlord(), Decision::Approve)
    {
        Err(LifecycleError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn signatures_and_document_flow_through_the_router() {
    let world = world();
    let application = world
        .services
        .applications
        .submit(submission(tenant()))
        .expect("submission succeeds");
    let lease = match world
        .services
        .applications
        .decide(&application.id, &landlord(), Decision::Approve)
        .expect("approval succeeds")
    {
        DecisionOutcome::Approved(record) => record.lease,
        other => panic!("expected approval, got {other:?}"),
    };

    let router = lifecycle_router(world.services.clone());

    // Landlord signs first; the order must not matter.
    for (actor, role, key) in [
        (landlord().0, "landlord", "uploads/sig-landlord.png"),
        (tenant().0, "tenant", "uploads/sig-tenant.png"),
    ] {
        let body = serde_json::json!({
            "actor_id": actor,
            "role": role,
            "signature_key": key,
        });
        let response = router
            .clone()
            .oneshot(
                axum::http::Request::post(format!("/api/v1/leases/{}/signatures", lease.id.0))
                    .header(axum::http::header::CONTENT_TYPE, "application/json")
                    .body(axum::body::Body::from(body.to_string()))
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    let signed = world.services.leases.get(&lease.id).expect("lease readable");
    assert!(signed.fully_signed());
    assert!(signed.signed_at.is_some());

    let uri = format!(
        "/api/v1/leases/{}/document?actor_id={}",
        lease.id.0,
        tenant().0
    );
    let response = router
        .clone()
        .oneshot(
            axum::http::Request::get(uri.as_str())
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let content_type = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(content_type, "application/pdf");
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    assert!(!bytes.is_empty());

    // Second retrieval is served from cache.
    let response = router
        .oneshot(
            axum::http::Request::get(uri.as_str())
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    assert_eq!(world.renderer.render_count(), 1);
}

#[tokio::test]
async fn dual_confirmation_through_the_router_settles_once() {
    let world = world();
    let application = world
        .services
        .applications
        .submit(submission(tenant()))
        .expect("submission succeeds");
    let lease = match world
        .services
        .applications
        .decide(&application.id, &landlord(), Decision::Approve)
        .expect("approval succeeds")
    {
        DecisionOutcome::Approved(record) => record.lease,
        other => panic!("expected approval, got {other:?}"),
    };
    let initiation = world
        .services
        .payments
        .initiate(&lease.id, &tenant())
        .expect("initiate succeeds");

    let router = lifecycle_router(world.services.clone());

    let payload = success_event(&initiation.reference);
    let signature = verifier().signature_for(&payload);
    let webhook = router
        .clone()
        .oneshot(
            axum::http::Request::post("/api/v1/payments/webhook")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .header(SIGNATURE_HEADER, &signature)
                .body(axum::body::Body::from(payload))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(webhook.status(), axum::http::StatusCode::OK);

    let confirm = router
        .oneshot(
            axum::http::Request::get(format!(
                "/api/v1/payments/confirm?reference={}",
                initiation.reference.0
            ))
            .body(axum::body::Body::empty())
            .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(confirm.status(), axum::http::StatusCode::OK);
    let body = axum::body::to_bytes(confirm.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let body: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(body["outcome"], "already_settled");
    assert_eq!(body["payment_status"], "success");

    assert_eq!(world.ledger.revenue_entry_count(), 1);
}

#[test]
fn expiry_returns_the_property_to_the_market() {
    let world = world();
    let application = world
        .services
        .applications
        .submit(submission(tenant()))
        .expect("submission succeeds");
    let lease = match world
        .services
        .applications
        .decide(&application.id, &landlord(), Decision::Approve)
        .expect("approval succeeds")
    {
        DecisionOutcome::Approved(record) => record.lease,
        other => panic!("expected approval, got {other:?}"),
    };
    let initiation = world
        .services
        .payments
        .initiate(&lease.id, &tenant())
        .expect("initiate succeeds");
    world
        .services
        .payments
        .confirm(&initiation.reference)
        .expect("confirm succeeds");
    assert!(!world.directory.is_listable(&property()));

    let after_term = lease.end_date.succ_opt().expect("valid date");
    let report = world
        .services
        .sweeper
        .sweep(after_term)
        .expect("sweep succeeds");
    assert_eq!(report.expired, vec![lease.id.clone()]);

    let expired = world.services.leases.get(&lease.id).expect("lease readable");
    assert_eq!(expired.status, LeaseStatus::Expired);
    assert!(world.directory.is_listable(&property()));

    // Re-running immediately is a no-op.
    let second = world
        .services
        .sweeper
        .sweep(after_term)
        .expect("second sweep succeeds");
    assert!(second.expired.is_empty());

    // Expiry alerts went to both parties.
    let expiry_alerts = world
        .notifier
        .events()
        .into_iter()
        .filter(|event| event.title == "Lease expired")
        .count();
    assert_eq!(expiry_alerts, 2);
}
