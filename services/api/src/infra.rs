use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rentflow::lifecycle::documents::{
    DocumentRenderer, LeaseFacts, RenderError, RenderedDocument, SignaturePair,
};
use rentflow::lifecycle::domain::{DocumentRef, PaymentReference, PropertyId};
use rentflow::lifecycle::gateway::{
    GatewayAuthorization, GatewayError, GatewayStatus, InitializeRequest, PaymentGateway,
};
use rentflow::lifecycle::ledger::memory::InMemoryLedger;
use rentflow::lifecycle::notify::{Notification, NotificationSink, NotifyError};
use rentflow::lifecycle::properties::{DirectoryError, PropertyDirectory, PropertyFacts};
use rentflow::lifecycle::router::LifecycleServices;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Concrete service bundle for the sandbox wiring used by serve and demo.
pub(crate) type ApiServices = LifecycleServices<
    InMemoryLedger,
    SandboxGateway,
    InMemoryPropertyDirectory,
    InMemoryNotificationSink,
    SandboxRenderer,
>;

/// Catalog adapter backing the property registration endpoint.
#[derive(Default)]
pub(crate) struct InMemoryPropertyDirectory {
    properties: Mutex<HashMap<PropertyId, PropertyFacts>>,
}

impl InMemoryPropertyDirectory {
    pub(crate) fn insert(&self, facts: PropertyFacts) {
        self.properties
            .lock()
            .expect("directory mutex poisoned")
            .insert(facts.id.clone(), facts);
    }

    pub(crate) fn snapshot(&self, id: &PropertyId) -> Option<PropertyFacts> {
        self.properties
            .lock()
            .expect("directory mutex poisoned")
            .get(id)
            .cloned()
    }
}

impl PropertyDirectory for InMemoryPropertyDirectory {
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
            None => Err(DirectoryError::Unavailable(format!(
                "unknown property {}",
                id.0
            ))),
        }
    }
}

/// Notification sink retaining alerts in memory so the demo can replay them.
#[derive(Default)]
pub(crate) struct InMemoryNotificationSink {
    events: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationSink {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("sink mutex poisoned").clone()
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient.0,
            category = notification.category.label(),
            title = %notification.title,
            "notification dispatched"
        );
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Stand-in for the hosted payment provider: every transaction it is asked
/// about succeeds. Serve/demo wiring only; production deploys point the
/// reconciler at the real gateway client.
#[derive(Default)]
pub(crate) struct SandboxGateway {
    sequence: AtomicU64,
}

impl PaymentGateway for SandboxGateway {
    fn initialize_transaction(
        &self,
        request: InitializeRequest,
    ) -> Result<GatewayAuthorization, GatewayError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let reference = PaymentReference(format!("RW-{}-{id:05}", request.property.0));
        Ok(GatewayAuthorization {
            redirect_url: format!("https://checkout.sandbox.rentflow.dev/{}", reference.0),
            reference,
        })
    }

    fn verify_transaction(
        &self,
        _reference: &PaymentReference,
    ) -> Result<GatewayStatus, GatewayError> {
        Ok(GatewayStatus::Success)
    }

    fn request_refund(&self, reference: &PaymentReference) -> Result<(), GatewayError> {
        tracing::info!(reference = %reference.0, "sandbox refund accepted");
        Ok(())
    }
}

/// Renders the agreement as plain text standing in for the PDF engine.
#[derive(Default)]
pub(crate) struct SandboxRenderer {
    stored: Mutex<HashMap<DocumentRef, Vec<u8>>>,
}

impl DocumentRenderer for SandboxRenderer {
    fn render(
        &self,
        facts: &LeaseFacts,
        signatures: &SignaturePair,
    ) -> Result<RenderedDocument, RenderError> {
        let reference = DocumentRef(format!("documents/{}.pdf", facts.lease.0));
        let bytes = format!(
            "LEASE AGREEMENT\nlease: {}\ntenant: {}\nlandlord: {}\nproperty: {}\nterm: {} to {}\nrent (minor units): {}\nsignatures: {} / {}\n",
            facts.lease.0,
            facts.tenant.0,
            facts.landlord.0,
            facts.property.0,
            facts.start_date,
            facts.end_date,
            facts.rent_amount,
            signatures.tenant.0,
            signatures.landlord.0,
        )
        .into_bytes();
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

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
