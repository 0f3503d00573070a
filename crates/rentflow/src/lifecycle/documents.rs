use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{DocumentRef, Lease, LeaseId, PropertyId, SignatureRef, UserId};

/// Rendering seam for the finalized lease agreement. `render` is called at
/// most once per lease; the resulting reference is cached on the lease so
/// later retrievals go through `fetch`.
pub trait DocumentRenderer: Send + Sync {
    fn render(
        &self,
        facts: &LeaseFacts,
        signatures: &SignaturePair,
    ) -> Result<RenderedDocument, RenderError>;

    fn fetch(&self, reference: &DocumentRef) -> Result<Option<RenderedDocument>, RenderError>;
}

/// The lease facts embedded into the rendered agreement.
#[derive(Debug, Clone, Serialize)]
pub struct LeaseFacts {
    pub lease: LeaseId,
    pub tenant: UserId,
    pub landlord: UserId,
    pub property: PropertyId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Total rent for the term, in minor currency units.
    pub rent_amount: u64,
}

impl From<&Lease> for LeaseFacts {
    fn from(lease: &Lease) -> Self {
        Self {
            lease: lease.id.clone(),
            tenant: lease.tenant.clone(),
            landlord: lease.landlord.clone(),
            property: lease.property.clone(),
            start_date: lease.start_date,
            end_date: lease.end_date,
            rent_amount: lease.rent_amount,
        }
    }
}

/// Both parties' signature images, required before rendering.
#[derive(Debug, Clone)]
pub struct SignaturePair {
    pub tenant: SignatureRef,
    pub landlord: SignatureRef,
}

/// A finalized agreement plus the storage key it was persisted under.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub reference: DocumentRef,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("document renderer unavailable: {0}")]
    Unavailable(String),
    #[error("rendered document missing from storage")]
    Missing,
}
