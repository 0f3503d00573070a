use std::fmt;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for marketplace users (tenants, landlords, oversight).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for listed properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub String);

/// Identifier wrapper for rental applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for leases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseId(pub String);

/// Gateway-issued transaction reference; globally unique per payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentReference(pub String);

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage key of a captured signature image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRef(pub String);

/// Storage key of a finalized lease document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

/// A tenant's request to rent a property, subject to landlord approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub tenant: UserId,
    pub property: PropertyId,
    pub move_in: NaiveDate,
    pub duration_years: u32,
    pub message: String,
    pub status: ApplicationStatus,
    /// Set once the application is approved and a lease is created from it.
    pub lease: Option<LeaseId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// Which side of the lease a signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureRole {
    Tenant,
    Landlord,
}

impl SignatureRole {
    pub const fn label(self) -> &'static str {
        match self {
            SignatureRole::Tenant => "tenant",
            SignatureRole::Landlord => "landlord",
        }
    }
}

/// The binding agreement instantiated the moment an application is approved.
///
/// Occupancy is only reachable through a confirmed payment; the finalized
/// document only exists once both signature slots are filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub id: LeaseId,
    pub application: ApplicationId,
    pub tenant: UserId,
    pub landlord: UserId,
    pub property: PropertyId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Total rent for the full term, in minor currency units.
    pub rent_amount: u64,
    pub status: LeaseStatus,
    pub tenant_signature: Option<SignatureRef>,
    pub landlord_signature: Option<SignatureRef>,
    /// Stamped the first time both signature slots become non-empty.
    pub signed_at: Option<DateTime<Utc>>,
    pub document: Option<DocumentRef>,
}

impl Lease {
    /// Calendar end date for a term starting at `move_in` and lasting
    /// `duration_years` whole years.
    pub fn term_end(move_in: NaiveDate, duration_years: u32) -> Option<NaiveDate> {
        move_in.checked_add_months(Months::new(duration_years.checked_mul(12)?))
    }

    pub fn party_for(&self, role: SignatureRole) -> &UserId {
        match role {
            SignatureRole::Tenant => &self.tenant,
            SignatureRole::Landlord => &self.landlord,
        }
    }

    pub fn fully_signed(&self) -> bool {
        self.tenant_signature.is_some() && self.landlord_signature.is_some()
    }
}

/// Canonical lease state machine.
///
/// `Occupied` replaces the source system's ambiguous `active`/`rented` pair;
/// `Terminated` is reserved for out-of-band administrative closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
    Pending,
    Occupied,
    Expired,
    Terminated,
}

impl LeaseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeaseStatus::Pending => "pending",
            LeaseStatus::Occupied => "occupied",
            LeaseStatus::Expired => "expired",
            LeaseStatus::Terminated => "terminated",
        }
    }
}

/// One attempt to settle a lease's rent through the external gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub reference: PaymentReference,
    pub lease: LeaseId,
    pub tenant: UserId,
    pub landlord: UserId,
    pub property: PropertyId,
    /// Amount charged, in minor currency units.
    pub amount: u64,
    pub status: PaymentStatus,
}

impl Payment {
    pub fn is_settled(&self) -> bool {
        !matches!(self.status, PaymentStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// The platform's fee/earning split, booked exactly once per successful payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueEntry {
    pub payment: PaymentReference,
    pub landlord: UserId,
    /// Platform share, in minor currency units.
    pub platform_fee: u64,
    /// Landlord remainder, in minor currency units.
    pub landlord_earning: u64,
}

impl RevenueEntry {
    /// Split `amount` minor units between the platform and the landlord at
    /// `fee_bps` basis points. Integer arithmetic throughout; the landlord
    /// receives the exact remainder so the split always sums to `amount`.
    pub fn split(payment: &Payment, fee_bps: u32) -> Self {
        let platform_fee = payment.amount * u64::from(fee_bps) / 10_000;
        Self {
            payment: payment.reference.clone(),
            landlord: payment.landlord.clone(),
            platform_fee,
            landlord_earning: payment.amount - platform_fee,
        }
    }
}
