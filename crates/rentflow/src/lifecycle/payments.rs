//! Payment reconciliation: bridges the untrusted gateway to the ledger with
//! an exactly-once effect guarantee despite at-least-once delivery.
//!
//! Two entry points drive the same conditional settle: the synchronous
//! verify call on the tenant's return redirect, and the asynchronous webhook.
//! Either may arrive first, twice, or concurrently for one reference; the
//! winner applies the side effects through a single ledger compare-and-set
//! and every other caller observes the already-settled record.

use std::sync::Arc;

use serde::Serialize;

use super::domain::{
    Lease, LeaseId, LeaseStatus, Payment, PaymentReference, PaymentStatus, RevenueEntry, UserId,
};
use super::gateway::{
    CallbackVerifier, GatewayEvent, GatewayStatus, InitializeRequest, PaymentGateway,
};
use super::ledger::{LeaseLedger, SettleOutcome, Settlement};
use super::notify::{self, Notification, NotificationCategory, NotificationSink};
use super::properties::PropertyDirectory;
use super::LifecycleError;

pub struct PaymentReconciler<L, G, P, N> {
    ledger: Arc<L>,
    gateway: Arc<G>,
    properties: Arc<P>,
    notifier: Arc<N>,
    verifier: CallbackVerifier,
    platform_fee_bps: u32,
    oversight: UserId,
}

/// Result of initiating a payment: where to send the tenant.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentInitiation {
    pub reference: PaymentReference,
    pub redirect_url: String,
    /// Amount to be charged, in minor currency units.
    pub amount: u64,
}

/// Result of driving a reference through reconciliation.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// This call applied the terminal transition and its side effects.
    Settled {
        payment: Payment,
        lease: Option<Lease>,
    },
    /// The reference was already terminal; nothing was re-applied.
    AlreadySettled(Payment),
    /// The gateway has no terminal verdict yet; the record stays pending for
    /// the other entry point (or a later retry) to resolve.
    StillPending(Payment),
}

impl PaymentOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            PaymentOutcome::Settled { payment, .. } => payment,
            PaymentOutcome::AlreadySettled(payment) => payment,
            PaymentOutcome::StillPending(payment) => payment,
        }
    }
}

impl<L, G, P, N> PaymentReconciler<L, G, P, N>
where
    L: LeaseLedger + 'static,
    G: PaymentGateway + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        ledger: Arc<L>,
        gateway: Arc<G>,
        properties: Arc<P>,
        notifier: Arc<N>,
        verifier: CallbackVerifier,
        platform_fee_bps: u32,
        oversight: UserId,
    ) -> Self {
        Self {
            ledger,
            gateway,
            properties,
            notifier,
            verifier,
            platform_fee_bps,
            oversight,
        }
    }

    pub fn get(&self, reference: &PaymentReference) -> Result<Payment, LifecycleError> {
        self.ledger
            .fetch_payment(reference)?
            .ok_or(LifecycleError::NotFound("payment"))
    }

    /// Open a gateway transaction for the lease's rent and record the pending
    /// attempt. A gateway failure here leaves no payment row behind; a
    /// follow-up call starts a fresh attempt with a fresh reference.
    pub fn initiate(
        &self,
        lease_id: &LeaseId,
        tenant: &UserId,
    ) -> Result<PaymentInitiation, LifecycleError> {
        let lease = self
            .ledger
            .fetch_lease(lease_id)?
            .ok_or(LifecycleError::NotFound("lease"))?;
        if &lease.tenant != tenant {
            return Err(LifecycleError::Forbidden(
                "only the lease's tenant may pay its rent".to_string(),
            ));
        }
        if lease.status != LeaseStatus::Pending {
            return Err(LifecycleError::Conflict(format!(
                "lease is {} and no longer awaiting payment",
                lease.status.label()
            )));
        }

        let authorization = self.gateway.initialize_transaction(InitializeRequest {
            amount: lease.rent_amount,
            payer: tenant.clone(),
            lease: lease.id.clone(),
            property: lease.property.clone(),
        })?;

        let payment = self.ledger.insert_payment(Payment {
            reference: authorization.reference.clone(),
            lease: lease.id.clone(),
            tenant: lease.tenant.clone(),
            landlord: lease.landlord.clone(),
            property: lease.property.clone(),
            amount: lease.rent_amount,
            status: PaymentStatus::Pending,
        })?;
        tracing::debug!(reference = %payment.reference, "payment attempt opened");

        Ok(PaymentInitiation {
            reference: payment.reference,
            redirect_url: authorization.redirect_url,
            amount: payment.amount,
        })
    }

    /// Direct-verify entry point: the tenant's return redirect (or an
    /// operator retry) asks the gateway for the transaction's state.
    ///
    /// A timed-out or unreachable gateway surfaces as a retryable error and
    /// leaves the payment pending; the verdict may still arrive by webhook.
    pub fn confirm(&self, reference: &PaymentReference) -> Result<PaymentOutcome, LifecycleError> {
        let payment = self.get(reference)?;
        if payment.is_settled() {
            return Ok(PaymentOutcome::AlreadySettled(payment));
        }

        let status = self.gateway.verify_transaction(reference)?;
        self.settle(payment, status)
    }

    /// Webhook entry point: authenticate the raw payload, then drive the
    /// event's verdict through the same conditional settle as `confirm`.
    ///
    /// An unauthenticated payload is dropped before any state logic runs.
    pub fn process_webhook(
        &self,
        raw_payload: &[u8],
        signature: &str,
    ) -> Result<PaymentOutcome, LifecycleError> {
        if !self.verifier.validate(raw_payload, signature) {
            return Err(LifecycleError::InvalidSignature);
        }

        let event: GatewayEvent = serde_json::from_slice(raw_payload)
            .map_err(|err| LifecycleError::MalformedEvent(err.to_string()))?;
        let reference = event.reference();

        let payment = self.get(&reference)?;
        if payment.is_settled() {
            return Ok(PaymentOutcome::AlreadySettled(payment));
        }

        self.settle(payment, event.gateway_status())
    }

    /// Hand a settled transaction back to the gateway. Platform oversight
    /// only; refund bookkeeping is not modeled locally.
    pub fn refund(
        &self,
        reference: &PaymentReference,
        actor: &UserId,
    ) -> Result<(), LifecycleError> {
        if actor != &self.oversight {
            return Err(LifecycleError::Forbidden(
                "only platform oversight may issue refunds".to_string(),
            ));
        }
        // Ensure the reference exists before involving the gateway.
        self.get(reference)?;
        self.gateway.request_refund(reference)?;
        Ok(())
    }

    fn settle(
        &self,
        payment: Payment,
        status: GatewayStatus,
    ) -> Result<PaymentOutcome, LifecycleError> {
        match status {
            GatewayStatus::Pending => Ok(PaymentOutcome::StillPending(payment)),
            GatewayStatus::Failed => {
                match self
                    .ledger
                    .settle_payment(&payment.reference, Settlement::Failure)?
                {
                    SettleOutcome::AlreadySettled(existing) => {
                        Ok(PaymentOutcome::AlreadySettled(existing))
                    }
                    SettleOutcome::Applied(applied) => {
                        notify::dispatch(
                            self.notifier.as_ref(),
                            Notification::new(
                                applied.payment.tenant.clone(),
                                NotificationCategory::Payment,
                                "Payment failed",
                                format!(
                                    "Payment {} did not complete; you can start a new attempt",
                                    applied.payment.reference
                                ),
                            ),
                        );
                        Ok(PaymentOutcome::Settled {
                            payment: applied.payment,
                            lease: None,
                        })
                    }
                }
            }
            GatewayStatus::Success => {
                let revenue = RevenueEntry::split(&payment, self.platform_fee_bps);
                match self
                    .ledger
                    .settle_payment(&payment.reference, Settlement::Success { revenue })?
                {
                    SettleOutcome::AlreadySettled(existing) => {
                        Ok(PaymentOutcome::AlreadySettled(existing))
                    }
                    SettleOutcome::Applied(applied) => {
                        if let Err(err) = self.properties.set_listable(&applied.payment.property, false)
                        {
                            tracing::warn!(
                                property = %applied.payment.property.0,
                                error = %err,
                                "failed to delist property after settlement"
                            );
                        }
                        self.announce_settlement(&applied.payment);
                        Ok(PaymentOutcome::Settled {
                            payment: applied.payment,
                            lease: applied.lease,
                        })
                    }
                }
            }
        }
    }

    fn announce_settlement(&self, payment: &Payment) {
        notify::dispatch(
            self.notifier.as_ref(),
            Notification::new(
                payment.tenant.clone(),
                NotificationCategory::Payment,
                "Rent payment confirmed",
                format!("Payment {} is confirmed; the lease is now active", payment.reference),
            )
            .with_link(format!("/leases/{}", payment.lease.0)),
        );
        notify::dispatch(
            self.notifier.as_ref(),
            Notification::new(
                payment.landlord.clone(),
                NotificationCategory::Payment,
                "Rent received",
                format!(
                    "Payment {} for property {} has been confirmed",
                    payment.reference, payment.property.0
                ),
            ),
        );
        notify::dispatch(
            self.notifier.as_ref(),
            Notification::new(
                self.oversight.clone(),
                NotificationCategory::Payment,
                "Revenue booked",
                format!("Payment {} settled and revenue split booked", payment.reference),
            )
            .with_detail("amount", payment.amount.to_string()),
        );
    }
}
