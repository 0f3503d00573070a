//! Contract for the external hosted-payment-page provider.
//!
//! The gateway is an untrusted, possibly-duplicating external actor: the same
//! charge can surface through the synchronous verify call and the webhook, in
//! either order, more than once. Implementations must bound initialize/verify
//! calls with the configured timeout; a timed-out verify means "unknown", not
//! "failed".

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

use super::domain::{LeaseId, PaymentReference, PropertyId, UserId};

type HmacSha512 = Hmac<Sha512>;

/// Client seam to the hosted payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Open a transaction for the payer and amount; returns the gateway
    /// reference and the checkout URL to redirect the payer to.
    fn initialize_transaction(
        &self,
        request: InitializeRequest,
    ) -> Result<GatewayAuthorization, GatewayError>;

    /// Ask the gateway for the authoritative state of a transaction.
    fn verify_transaction(&self, reference: &PaymentReference)
        -> Result<GatewayStatus, GatewayError>;

    /// Ask the gateway to refund a settled transaction. Bookkeeping of the
    /// refund itself is out of scope; nothing is mutated locally.
    fn request_refund(&self, reference: &PaymentReference) -> Result<(), GatewayError>;
}

/// Parameters for opening a gateway transaction.
#[derive(Debug, Clone)]
pub struct InitializeRequest {
    /// Amount in minor currency units.
    pub amount: u64,
    pub payer: UserId,
    pub lease: LeaseId,
    pub property: PropertyId,
}

/// Successful transaction initialization.
#[derive(Debug, Clone)]
pub struct GatewayAuthorization {
    pub reference: PaymentReference,
    pub redirect_url: String,
}

/// The gateway's view of a transaction. `Pending` is not terminal; the
/// reconciler leaves the payment untouched until a terminal verdict arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Success,
    Failed,
    Pending,
}

/// Error enumeration for gateway calls. Both variants are retryable and leave
/// no local state behind.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unavailable(String),
    #[error("gateway call timed out")]
    Timeout,
}

/// Keyed-MAC authentication for inbound gateway callbacks.
///
/// The MAC is computed over the raw request body, before any JSON parsing,
/// and compared in constant time.
#[derive(Debug, Clone)]
pub struct CallbackVerifier {
    secret: String,
}

impl CallbackVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn validate(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let mut mac = HmacSha512::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any size");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }

    /// Hex signature for a payload; used by sandbox adapters and tests to
    /// fabricate authentic callbacks.
    pub fn signature_for(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any size");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Event payload delivered on the webhook channel.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub event: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub reference: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<u64>,
}

impl GatewayEvent {
    /// Map the event to the gateway's verdict on the transaction.
    pub fn gateway_status(&self) -> GatewayStatus {
        if self.event == "charge.success" || self.data.status == "success" {
            GatewayStatus::Success
        } else if self.data.status == "failed" || self.event == "charge.failed" {
            GatewayStatus::Failed
        } else {
            GatewayStatus::Pending
        }
    }

    pub fn reference(&self) -> PaymentReference {
        PaymentReference(self.data.reference.clone())
    }
}
