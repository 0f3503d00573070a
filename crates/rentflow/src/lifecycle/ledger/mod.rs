//! Durable-ledger contract for the lease lifecycle.
//!
//! Every guarded state transition in the lifecycle (application approval,
//! payment settlement, signature capture, expiry) is a single atomic
//! operation of the ledger rather than a read-then-write sequence in the
//! services. Handlers run across concurrent processes, so serialization is
//! delegated entirely to these primitives; the loser of a race observes
//! `Conflict` or the already-settled record, never a torn write.

pub mod memory;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::domain::{
    Application, ApplicationId, DocumentRef, Lease, LeaseId, LeaseStatus, Payment,
    PaymentReference, PropertyId, RevenueEntry, SignatureRef, SignatureRole,
};

/// Storage abstraction over the four lifecycle record types.
pub trait LeaseLedger: Send + Sync {
    /// Insert a pending application. Enforces the unique-pending constraint:
    /// `Conflict` if the tenant already has a pending application for the
    /// same property.
    fn insert_application(&self, application: Application) -> Result<Application, LedgerError>;

    fn fetch_application(&self, id: &ApplicationId) -> Result<Option<Application>, LedgerError>;

    /// Atomically approve an application and create its lease.
    ///
    /// In one unit: re-checks the application is still pending, that no other
    /// application on the property is approved, and that the property has no
    /// occupied lease; writes the approval and lease link; inserts the pending
    /// lease; rejects every sibling pending application. The loser of a
    /// double-approval race gets `Conflict` and nothing is written.
    fn approve_application(
        &self,
        id: &ApplicationId,
        lease: Lease,
    ) -> Result<ApprovalRecord, LedgerError>;

    /// Conditionally move a pending application to rejected.
    fn reject_application(&self, id: &ApplicationId) -> Result<Application, LedgerError>;

    fn fetch_lease(&self, id: &LeaseId) -> Result<Option<Lease>, LedgerError>;

    fn occupied_lease_for(&self, property: &PropertyId) -> Result<Option<Lease>, LedgerError>;

    /// Write one signature slot; stamps the signing timestamp iff this call
    /// makes both slots non-empty for the first time. Re-signing a role
    /// replaces that slot and nothing else.
    fn attach_signature(
        &self,
        id: &LeaseId,
        role: SignatureRole,
        signature: SignatureRef,
        at: DateTime<Utc>,
    ) -> Result<Lease, LedgerError>;

    /// Persist the finalized document reference, first writer wins. Returns
    /// the lease carrying whichever reference was persisted.
    fn store_document(&self, id: &LeaseId, document: DocumentRef) -> Result<Lease, LedgerError>;

    /// Insert a pending payment. `Conflict` on a duplicate gateway reference.
    fn insert_payment(&self, payment: Payment) -> Result<Payment, LedgerError>;

    fn fetch_payment(&self, reference: &PaymentReference) -> Result<Option<Payment>, LedgerError>;

    fn revenue_for(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<RevenueEntry>, LedgerError>;

    /// The compare-and-set at the heart of payment reconciliation.
    ///
    /// Applies the settlement only if the payment is currently pending: a
    /// success settles the payment, flips the lease to occupied, and books
    /// exactly one revenue entry in the same unit; a failure settles the
    /// payment alone. If the payment is no longer pending the existing record
    /// is returned untouched, which is how the loser of the direct-verify /
    /// webhook race skips re-application of side effects.
    fn settle_payment(
        &self,
        reference: &PaymentReference,
        settlement: Settlement,
    ) -> Result<SettleOutcome, LedgerError>;

    /// Occupied leases whose end date is strictly before `date`.
    fn leases_expiring_before(&self, date: NaiveDate) -> Result<Vec<Lease>, LedgerError>;

    /// Conditionally expire one lease, re-checking status and end date.
    fn expire_lease(&self, id: &LeaseId, before: NaiveDate) -> Result<ExpireOutcome, LedgerError>;
}

/// Result of an atomic application approval.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRecord {
    pub application: Application,
    pub lease: Lease,
    /// Sibling pending applications rejected in the same unit.
    pub rejected: Vec<Application>,
}

/// Terminal effect requested for a pending payment.
#[derive(Debug, Clone)]
pub enum Settlement {
    Success { revenue: RevenueEntry },
    Failure,
}

/// Whether a settlement call performed the transition or lost the race.
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    Applied(SettledPayment),
    AlreadySettled(Payment),
}

/// Records written by a successful `settle_payment` application.
#[derive(Debug, Clone)]
pub struct SettledPayment {
    pub payment: Payment,
    pub lease: Option<Lease>,
    pub revenue: Option<RevenueEntry>,
}

/// Whether an expiry call transitioned the lease or found it already moved on.
#[derive(Debug, Clone)]
pub enum ExpireOutcome {
    Expired(Lease),
    Skipped { status: LeaseStatus },
}

/// Error enumeration for ledger failures.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{0}")]
    Conflict(&'static str),
    #[error("record not found")]
    NotFound,
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}
