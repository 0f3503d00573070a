use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::LeaseId;
use super::ledger::{ExpireOutcome, LeaseLedger};
use super::notify::{self, Notification, NotificationCategory, NotificationSink};
use super::properties::PropertyDirectory;
use super::LifecycleError;

/// Batch pass retiring leases whose term has ended and re-listing their
/// properties. Invoked periodically or on demand; holds no locks of its own.
pub struct ExpirySweeper<L, P, N> {
    ledger: Arc<L>,
    properties: Arc<P>,
    notifier: Arc<N>,
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub as_of: NaiveDate,
    pub expired: Vec<LeaseId>,
    /// Leases the query returned but another pass had already moved on.
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub lease: LeaseId,
    pub reason: String,
}

impl<L, P, N> ExpirySweeper<L, P, N>
where
    L: LeaseLedger + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(ledger: Arc<L>, properties: Arc<P>, notifier: Arc<N>) -> Self {
        Self {
            ledger,
            properties,
            notifier,
        }
    }

    /// Expire every occupied lease whose end date is strictly before `now`.
    ///
    /// Leases are processed independently; one failure is recorded and the
    /// pass continues. Re-running with no intervening state change expires
    /// nothing, as already-expired leases are excluded by the query.
    pub fn sweep(&self, now: NaiveDate) -> Result<SweepReport, LifecycleError> {
        let due = self.ledger.leases_expiring_before(now)?;
        let mut report = SweepReport {
            as_of: now,
            expired: Vec::new(),
            skipped: 0,
            failures: Vec::new(),
        };

        for lease in due {
            match self.ledger.expire_lease(&lease.id, now) {
                Ok(ExpireOutcome::Expired(expired)) => {
                    if let Err(err) = self.properties.set_listable(&expired.property, true) {
                        tracing::warn!(
                            property = %expired.property.0,
                            error = %err,
                            "failed to re-list property after expiry"
                        );
                    }
                    for party in [&expired.tenant, &expired.landlord] {
                        notify::dispatch(
                            self.notifier.as_ref(),
                            Notification::new(
                                party.clone(),
                                NotificationCategory::Expiry,
                                "Lease expired",
                                format!(
                                    "Lease {} on property {} reached its end date",
                                    expired.id.0, expired.property.0
                                ),
                            ),
                        );
                    }
                    report.expired.push(expired.id);
                }
                Ok(ExpireOutcome::Skipped { .. }) => report.skipped += 1,
                Err(err) => {
                    tracing::warn!(lease = %lease.id.0, error = %err, "expiry pass failed for lease");
                    report.failures.push(SweepFailure {
                        lease: lease.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}
