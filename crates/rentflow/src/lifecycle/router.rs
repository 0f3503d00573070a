use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use crate::config::PaymentsConfig;

use super::applications::{ApplicationService, Decision, SubmitApplication};
use super::documents::DocumentRenderer;
use super::domain::{ApplicationId, LeaseId, PaymentReference, SignatureRef, SignatureRole, UserId};
use super::expiry::ExpirySweeper;
use super::gateway::{CallbackVerifier, PaymentGateway};
use super::ledger::LeaseLedger;
use super::leases::LeaseService;
use super::notify::NotificationSink;
use super::payments::{PaymentOutcome, PaymentReconciler};
use super::properties::PropertyDirectory;
use super::LifecycleError;

/// Signature header carried by gateway callbacks.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// The four lifecycle facades bundled for routing.
pub struct LifecycleServices<L, G, P, N, D> {
    pub applications: ApplicationService<L, P, N>,
    pub leases: LeaseService<L, N, D>,
    pub payments: PaymentReconciler<L, G, P, N>,
    pub sweeper: ExpirySweeper<L, P, N>,
}

impl<L, G, P, N, D> LifecycleServices<L, G, P, N, D>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    pub fn new(
        ledger: Arc<L>,
        gateway: Arc<G>,
        properties: Arc<P>,
        notifier: Arc<N>,
        renderer: Arc<D>,
        payments: &PaymentsConfig,
    ) -> Self {
        let oversight = UserId(payments.oversight_recipient.clone());
        Self {
            applications: ApplicationService::new(
                ledger.clone(),
                properties.clone(),
                notifier.clone(),
                oversight.clone(),
            ),
            leases: LeaseService::new(
                ledger.clone(),
                notifier.clone(),
                renderer,
                oversight.clone(),
            ),
            payments: PaymentReconciler::new(
                ledger.clone(),
                gateway,
                properties.clone(),
                notifier.clone(),
                CallbackVerifier::new(payments.webhook_secret.clone()),
                payments.platform_fee_bps,
                oversight,
            ),
            sweeper: ExpirySweeper::new(ledger, properties, notifier),
        }
    }
}

/// Router builder exposing the lifecycle endpoints.
pub fn lifecycle_router<L, G, P, N, D>(services: Arc<LifecycleServices<L, G, P, N, D>>) -> Router
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(submit_handler::<L, G, P, N, D>))
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<L, G, P, N, D>),
        )
        .route(
            "/api/v1/applications/:application_id/decision",
            post(decision_handler::<L, G, P, N, D>),
        )
        .route("/api/v1/leases/:lease_id", get(lease_handler::<L, G, P, N, D>))
        .route(
            "/api/v1/leases/:lease_id/signatures",
            post(signature_handler::<L, G, P, N, D>),
        )
        .route(
            "/api/v1/leases/:lease_id/document",
            get(document_handler::<L, G, P, N, D>),
        )
        .route("/api/v1/leases/sweep", post(sweep_handler::<L, G, P, N, D>))
        .route("/api/v1/payments", post(initiate_handler::<L, G, P, N, D>))
        .route(
            "/api/v1/payments/confirm",
            get(confirm_handler::<L, G, P, N, D>),
        )
        .route(
            "/api/v1/payments/webhook",
            post(webhook_handler::<L, G, P, N, D>),
        )
        .route(
            "/api/v1/payments/:reference/refund",
            post(refund_handler::<L, G, P, N, D>),
        )
        .with_state(services)
}

impl IntoResponse for LifecycleError {
    fn into_response(self) -> Response {
        let status = match &self {
            LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
            LifecycleError::Forbidden(_) => StatusCode::FORBIDDEN,
            LifecycleError::Conflict(_) => StatusCode::CONFLICT,
            LifecycleError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            LifecycleError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            LifecycleError::InvalidSignature => StatusCode::UNAUTHORIZED,
            LifecycleError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            LifecycleError::Unavailable(_) | LifecycleError::Renderer(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    pub(crate) landlord_id: String,
    pub(crate) decision: Decision,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignatureRequest {
    pub(crate) actor_id: String,
    pub(crate) role: SignatureRole,
    pub(crate) signature_key: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorQuery {
    pub(crate) actor_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InitiatePaymentRequest {
    pub(crate) lease_id: String,
    pub(crate) tenant_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmQuery {
    pub(crate) reference: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefundRequest {
    pub(crate) actor_id: String,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct SweepRequest {
    #[serde(default)]
    pub(crate) as_of: Option<NaiveDate>,
}

pub(crate) async fn submit_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    Json(request): Json<SubmitApplication>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let application = services.applications.submit(request)?;
    Ok((StatusCode::CREATED, Json(application)).into_response())
}

pub(crate) async fn application_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    Path(application_id): Path<String>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let application = services
        .applications
        .get(&ApplicationId(application_id))?;
    Ok(Json(application).into_response())
}

pub(crate) async fn decision_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    Path(application_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let outcome = services.applications.decide(
        &ApplicationId(application_id),
        &UserId(request.landlord_id),
        request.decision,
    )?;
    Ok(Json(outcome).into_response())
}

pub(crate) async fn lease_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    Path(lease_id): Path<String>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let lease = services.leases.get(&LeaseId(lease_id))?;
    Ok(Json(lease).into_response())
}

pub(crate) async fn signature_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    Path(lease_id): Path<String>,
    Json(request): Json<SignatureRequest>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let lease = services.leases.attach_signature(
        &LeaseId(lease_id),
        &UserId(request.actor_id),
        request.role,
        SignatureRef(request.signature_key),
    )?;
    Ok(Json(lease).into_response())
}

pub(crate) async fn document_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    Path(lease_id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let document = services
        .leases
        .retrieve_document(&LeaseId(lease_id), &UserId(query.actor_id))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime::APPLICATION_PDF.as_ref())],
        document.bytes,
    )
        .into_response())
}

pub(crate) async fn sweep_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    request: Option<Json<SweepRequest>>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let as_of = request
        .and_then(|Json(body)| body.as_of)
        .unwrap_or_else(|| Local::now().date_naive());
    let report = services.sweeper.sweep(as_of)?;
    Ok(Json(report).into_response())
}

pub(crate) async fn initiate_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let initiation = services
        .payments
        .initiate(&LeaseId(request.lease_id), &UserId(request.tenant_id))?;
    Ok((StatusCode::CREATED, Json(initiation)).into_response())
}

pub(crate) async fn confirm_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let outcome = services
        .payments
        .confirm(&PaymentReference(query.reference))?;
    Ok(Json(outcome_body(&outcome)).into_response())
}

/// Webhook landing: authenticate, reconcile, and always acknowledge
/// authenticated events so the gateway does not retry-storm. Internal
/// reconciliation failures are logged, not surfaced to the gateway.
pub(crate) async fn webhook_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match services.payments.process_webhook(&body, signature) {
        Ok(outcome) => (StatusCode::OK, Json(outcome_body(&outcome))).into_response(),
        Err(LifecycleError::InvalidSignature) => {
            LifecycleError::InvalidSignature.into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "webhook reconciliation failed");
            (StatusCode::OK, Json(json!({ "status": "acknowledged" }))).into_response()
        }
    }
}

pub(crate) async fn refund_handler<L, G, P, N, D>(
    State(services): State<Arc<LifecycleServices<L, G, P, N, D>>>,
    Path(reference): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Result<Response, LifecycleError>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    services
        .payments
        .refund(&PaymentReference(reference), &UserId(request.actor_id))?;
    Ok(Json(json!({ "status": "refund_requested" })).into_response())
}

fn outcome_body(outcome: &PaymentOutcome) -> serde_json::Value {
    let payment = outcome.payment();
    let settled = match outcome {
        PaymentOutcome::Settled { .. } => "settled",
        PaymentOutcome::AlreadySettled(_) => "already_settled",
        PaymentOutcome::StillPending(_) => "still_pending",
    };
    let lease_status = match outcome {
        PaymentOutcome::Settled {
            lease: Some(lease), ..
        } => Some(lease.status.label()),
        _ => None,
    };
    json!({
        "reference": payment.reference.0,
        "payment_status": payment.status.label(),
        "outcome": settled,
        "lease_status": lease_status,
    })
}
