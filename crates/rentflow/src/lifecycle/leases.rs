use std::sync::Arc;

use chrono::Utc;

use super::documents::{DocumentRenderer, LeaseFacts, RenderedDocument, SignaturePair};
use super::domain::{Lease, LeaseId, SignatureRef, SignatureRole, UserId};
use super::ledger::LeaseLedger;
use super::notify::{self, Notification, NotificationCategory, NotificationSink};
use super::LifecycleError;

/// Service owning signature capture and document finalization. Occupancy is
/// the payment reconciler's job; this service never touches lease status.
pub struct LeaseService<L, N, D> {
    ledger: Arc<L>,
    notifier: Arc<N>,
    renderer: Arc<D>,
    oversight: UserId,
}

impl<L, N, D> LeaseService<L, N, D>
where
    L: LeaseLedger + 'static,
    N: NotificationSink + 'static,
    D: DocumentRenderer + 'static,
{
    pub fn new(ledger: Arc<L>, notifier: Arc<N>, renderer: Arc<D>, oversight: UserId) -> Self {
        Self {
            ledger,
            notifier,
            renderer,
            oversight,
        }
    }

    pub fn get(&self, id: &LeaseId) -> Result<Lease, LifecycleError> {
        self.ledger
            .fetch_lease(id)?
            .ok_or(LifecycleError::NotFound("lease"))
    }

    /// Store one party's signature. The actor must be exactly the lease party
    /// named by `role`; signing order is commutative and re-signing the same
    /// role simply replaces that slot. The first call that fills both slots
    /// stamps the signing timestamp.
    pub fn attach_signature(
        &self,
        id: &LeaseId,
        actor: &UserId,
        role: SignatureRole,
        signature: SignatureRef,
    ) -> Result<Lease, LifecycleError> {
        let lease = self.get(id)?;
        if lease.party_for(role) != actor {
            return Err(LifecycleError::Forbidden(format!(
                "signer is not the {} of record on this lease",
                role.label()
            )));
        }

        let was_fully_signed = lease.fully_signed();
        let updated = self
            .ledger
            .attach_signature(id, role, signature, Utc::now())?;

        if updated.fully_signed() && !was_fully_signed {
            for party in [&updated.tenant, &updated.landlord] {
                notify::dispatch(
                    self.notifier.as_ref(),
                    Notification::new(
                        party.clone(),
                        NotificationCategory::Lease,
                        "Lease fully signed",
                        format!("Lease {} now carries both signatures", updated.id.0),
                    )
                    .with_link(format!("/leases/{}/document", updated.id.0)),
                );
            }
        }

        Ok(updated)
    }

    /// Return the finalized agreement, rendering it on first retrieval.
    ///
    /// Only the lease parties and platform oversight may read it, and never
    /// before both signature slots are filled, regardless of payment state.
    pub fn retrieve_document(
        &self,
        id: &LeaseId,
        actor: &UserId,
    ) -> Result<RenderedDocument, LifecycleError> {
        let lease = self.get(id)?;
        let allowed =
            actor == &lease.tenant || actor == &lease.landlord || actor == &self.oversight;
        if !allowed {
            return Err(LifecycleError::Forbidden(
                "only the lease parties or platform oversight may read the agreement".to_string(),
            ));
        }

        let (tenant_signature, landlord_signature) =
            match (&lease.tenant_signature, &lease.landlord_signature) {
                (Some(tenant), Some(landlord)) => (tenant.clone(), landlord.clone()),
                _ => {
                    return Err(LifecycleError::PreconditionFailed(
                        "lease must be signed by both parties".to_string(),
                    ));
                }
            };

        if let Some(reference) = &lease.document {
            if let Some(document) = self.renderer.fetch(reference)? {
                return Ok(document);
            }
            // Cached reference points at nothing; fall through and re-render.
        }

        let rendered = self.renderer.render(
            &LeaseFacts::from(&lease),
            &SignaturePair {
                tenant: tenant_signature,
                landlord: landlord_signature,
            },
        )?;
        let stored = self.ledger.store_document(id, rendered.reference.clone())?;

        match stored.document {
            Some(reference) if reference != rendered.reference => {
                // A concurrent retrieval won the first-writer-wins race;
                // serve the persisted document.
                match self.renderer.fetch(&reference)? {
                    Some(document) => Ok(document),
                    None => Ok(rendered),
                }
            }
            _ => Ok(rendered),
        }
    }
}
