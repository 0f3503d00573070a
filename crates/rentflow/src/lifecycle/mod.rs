//! The rental lease lifecycle: application intake and landlord decisions,
//! signature capture and document finalization, dual-path payment
//! reconciliation with revenue-split bookkeeping, and time-based expiry.

pub mod applications;
pub mod documents;
pub mod domain;
pub mod expiry;
pub mod gateway;
pub mod ledger;
pub mod leases;
pub mod notify;
pub mod payments;
pub mod properties;
pub mod router;

#[cfg(test)]
mod tests;

pub use applications::{ApplicationService, Decision, DecisionOutcome, SubmitApplication};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, DocumentRef, Lease, LeaseId, LeaseStatus,
    Payment, PaymentReference, PaymentStatus, PropertyId, RevenueEntry, SignatureRef,
    SignatureRole, UserId,
};
pub use expiry::{ExpirySweeper, SweepFailure, SweepReport};
pub use gateway::{
    CallbackVerifier, GatewayAuthorization, GatewayError, GatewayEvent, GatewayStatus,
    InitializeRequest, PaymentGateway,
};
pub use ledger::{
    ApprovalRecord, ExpireOutcome, LeaseLedger, LedgerError, SettleOutcome, Settlement,
};
pub use leases::LeaseService;
pub use notify::{Notification, NotificationCategory, NotificationSink, NotifyError};
pub use payments::{PaymentInitiation, PaymentOutcome, PaymentReconciler};
pub use properties::{DirectoryError, PropertyDirectory, PropertyFacts};
pub use router::{lifecycle_router, LifecycleServices};

use documents::RenderError;
use gateway::GatewayError as GatewayCallError;

/// Error taxonomy shared by the lifecycle services.
///
/// `Conflict`, `Forbidden`, and `PreconditionFailed` are detected before any
/// mutation; idempotency short-circuits are not errors and surface as regular
/// outcomes instead.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("webhook signature rejected")]
    InvalidSignature,
    #[error("malformed gateway event: {0}")]
    MalformedEvent(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("document renderer failed: {0}")]
    Renderer(String),
}

impl From<LedgerError> for LifecycleError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Conflict(reason) => Self::Conflict(reason.to_string()),
            LedgerError::NotFound => Self::NotFound("record"),
            LedgerError::Unavailable(reason) => Self::Unavailable(reason),
        }
    }
}

impl From<GatewayCallError> for LifecycleError {
    fn from(value: GatewayCallError) -> Self {
        Self::GatewayUnavailable(value.to_string())
    }
}

impl From<DirectoryError> for LifecycleError {
    fn from(value: DirectoryError) -> Self {
        Self::Unavailable(value.to_string())
    }
}

impl From<RenderError> for LifecycleError {
    fn from(value: RenderError) -> Self {
        Self::Renderer(value.to_string())
    }
}
