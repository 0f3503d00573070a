use serde::{Deserialize, Serialize};

use super::domain::{PropertyId, UserId};

/// Read/flip seam into the property catalog, which is owned elsewhere. The
/// lifecycle only needs ownership facts, the asking rent, and the listable
/// flag it toggles on occupancy and expiry.
pub trait PropertyDirectory: Send + Sync {
    fn fetch(&self, id: &PropertyId) -> Result<Option<PropertyFacts>, DirectoryError>;

    fn set_listable(&self, id: &PropertyId, listable: bool) -> Result<(), DirectoryError>;
}

/// Snapshot of the catalog facts the lifecycle depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFacts {
    pub id: PropertyId,
    pub landlord: UserId,
    /// Asking rent per year, in minor currency units.
    pub annual_rent: u64,
    pub listable: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("property directory unavailable: {0}")]
    Unavailable(String),
}
