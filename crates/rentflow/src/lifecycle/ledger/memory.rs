//! In-memory reference implementation of the ledger contract.
//!
//! One mutex guards all four record maps, so every trait primitive is
//! genuinely atomic with respect to the others. The api crate uses this for
//! serve/demo mode and the test suites use it as the canonical ledger.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

use super::{
    ApprovalRecord, ExpireOutcome, LeaseLedger, LedgerError, SettleOutcome, Settlement,
    SettledPayment,
};
use crate::lifecycle::domain::{
    Application, ApplicationId, ApplicationStatus, DocumentRef, Lease, LeaseId, LeaseStatus,
    Payment, PaymentReference, PaymentStatus, PropertyId, RevenueEntry, SignatureRef,
    SignatureRole,
};

#[derive(Default)]
struct LedgerState {
    applications: HashMap<ApplicationId, Application>,
    leases: HashMap<LeaseId, Lease>,
    payments: HashMap<PaymentReference, Payment>,
    revenue: HashMap<PaymentReference, RevenueEntry>,
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of revenue entries currently booked; used by tests asserting
    /// the exactly-once bookkeeping property.
    pub fn revenue_entry_count(&self) -> usize {
        self.state.lock().expect("ledger mutex poisoned").revenue.len()
    }

    /// Number of payment rows; used by tests asserting that a failed
    /// initialization leaves nothing behind.
    pub fn payment_count(&self) -> usize {
        self.state.lock().expect("ledger mutex poisoned").payments.len()
    }
}

impl LeaseLedger for InMemoryLedger {
    fn insert_application(&self, application: Application) -> Result<Application, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        let duplicate = state.applications.values().any(|existing| {
            existing.status == ApplicationStatus::Pending
                && existing.tenant == application.tenant
                && existing.property == application.property
        });
        if duplicate {
            return Err(LedgerError::Conflict(
                "a pending application already exists for this tenant and property",
            ));
        }
        if state.applications.contains_key(&application.id) {
            return Err(LedgerError::Conflict("application id already exists"));
        }
        state
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_application(&self, id: &ApplicationId) -> Result<Option<Application>, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.applications.get(id).cloned())
    }

    fn approve_application(
        &self,
        id: &ApplicationId,
        lease: Lease,
    ) -> Result<ApprovalRecord, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");

        let property = match state.applications.get(id) {
            None => return Err(LedgerError::NotFound),
            Some(application) if application.status != ApplicationStatus::Pending => {
                return Err(LedgerError::Conflict("application is no longer pending"));
            }
            Some(application) => application.property.clone(),
        };

        let already_approved = state.applications.values().any(|existing| {
            existing.property == property
                && existing.status == ApplicationStatus::Approved
                && &existing.id != id
        });
        if already_approved {
            return Err(LedgerError::Conflict(
                "property already has an approved application",
            ));
        }

        let occupied = state
            .leases
            .values()
            .any(|existing| existing.property == property && existing.status == LeaseStatus::Occupied);
        if occupied {
            return Err(LedgerError::Conflict("property already has an occupied lease"));
        }

        if state.leases.contains_key(&lease.id) {
            return Err(LedgerError::Conflict("lease id already exists"));
        }

        let mut rejected = Vec::new();
        for sibling in state.applications.values_mut() {
            if sibling.property == property
                && sibling.status == ApplicationStatus::Pending
                && &sibling.id != id
            {
                sibling.status = ApplicationStatus::Rejected;
                rejected.push(sibling.clone());
            }
        }

        let application = state
            .applications
            .get_mut(id)
            .expect("application present under lock");
        application.status = ApplicationStatus::Approved;
        application.lease = Some(lease.id.clone());
        let application = application.clone();

        state.leases.insert(lease.id.clone(), lease.clone());

        Ok(ApprovalRecord {
            application,
            lease,
            rejected,
        })
    }

    fn reject_application(&self, id: &ApplicationId) -> Result<Application, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        let application = state.applications.get_mut(id).ok_or(LedgerError::NotFound)?;
        if application.status != ApplicationStatus::Pending {
            return Err(LedgerError::Conflict("application is no longer pending"));
        }
        application.status = ApplicationStatus::Rejected;
        Ok(application.clone())
    }

    fn fetch_lease(&self, id: &LeaseId) -> Result<Option<Lease>, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.leases.get(id).cloned())
    }

    fn occupied_lease_for(&self, property: &PropertyId) -> Result<Option<Lease>, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state
            .leases
            .values()
            .find(|lease| &lease.property == property && lease.status == LeaseStatus::Occupied)
            .cloned())
    }

    fn attach_signature(
        &self,
        id: &LeaseId,
        role: SignatureRole,
        signature: SignatureRef,
        at: DateTime<Utc>,
    ) -> Result<Lease, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        let lease = state.leases.get_mut(id).ok_or(LedgerError::NotFound)?;
        match role {
            SignatureRole::Tenant => lease.tenant_signature = Some(signature),
            SignatureRole::Landlord => lease.landlord_signature = Some(signature),
        }
        if lease.fully_signed() && lease.signed_at.is_none() {
            lease.signed_at = Some(at);
        }
        Ok(lease.clone())
    }

    fn store_document(&self, id: &LeaseId, document: DocumentRef) -> Result<Lease, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        let lease = state.leases.get_mut(id).ok_or(LedgerError::NotFound)?;
        if lease.document.is_none() {
            lease.document = Some(document);
        }
        Ok(lease.clone())
    }

    fn insert_payment(&self, payment: Payment) -> Result<Payment, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        if state.payments.contains_key(&payment.reference) {
            return Err(LedgerError::Conflict("payment reference already exists"));
        }
        state
            .payments
            .insert(payment.reference.clone(), payment.clone());
        Ok(payment)
    }

    fn fetch_payment(&self, reference: &PaymentReference) -> Result<Option<Payment>, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.payments.get(reference).cloned())
    }

    fn revenue_for(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<RevenueEntry>, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.revenue.get(reference).cloned())
    }

    fn settle_payment(
        &self,
        reference: &PaymentReference,
        settlement: Settlement,
    ) -> Result<SettleOutcome, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");

        let current = state.payments.get(reference).ok_or(LedgerError::NotFound)?;
        if current.is_settled() {
            return Ok(SettleOutcome::AlreadySettled(current.clone()));
        }
        let lease_id = current.lease.clone();

        match settlement {
            Settlement::Failure => {
                let payment = state
                    .payments
                    .get_mut(reference)
                    .expect("payment present under lock");
                payment.status = PaymentStatus::Failed;
                Ok(SettleOutcome::Applied(SettledPayment {
                    payment: payment.clone(),
                    lease: None,
                    revenue: None,
                }))
            }
            Settlement::Success { revenue } => {
                let payment = {
                    let payment = state
                        .payments
                        .get_mut(reference)
                        .expect("payment present under lock");
                    payment.status = PaymentStatus::Success;
                    payment.clone()
                };

                let lease = state.leases.get_mut(&lease_id).map(|lease| {
                    if lease.status == LeaseStatus::Pending {
                        lease.status = LeaseStatus::Occupied;
                    }
                    lease.clone()
                });

                state.revenue.insert(reference.clone(), revenue.clone());

                Ok(SettleOutcome::Applied(SettledPayment {
                    payment,
                    lease,
                    revenue: Some(revenue),
                }))
            }
        }
    }

    fn leases_expiring_before(&self, date: NaiveDate) -> Result<Vec<Lease>, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state
            .leases
            .values()
            .filter(|lease| lease.status == LeaseStatus::Occupied && lease.end_date < date)
            .cloned()
            .collect())
    }

    fn expire_lease(&self, id: &LeaseId, before: NaiveDate) -> Result<ExpireOutcome, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        let lease = state.leases.get_mut(id).ok_or(LedgerError::NotFound)?;
        if lease.status != LeaseStatus::Occupied {
            return Ok(ExpireOutcome::Skipped {
                status: lease.status,
            });
        }
        if lease.end_date >= before {
            return Ok(ExpireOutcome::Skipped {
                status: lease.status,
            });
        }
        lease.status = LeaseStatus::Expired;
        Ok(ExpireOutcome::Expired(lease.clone()))
    }
}
