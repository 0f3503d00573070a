use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Lease, LeaseId, LeaseStatus, PropertyId, UserId,
};
use super::ledger::{ApprovalRecord, LeaseLedger};
use super::notify::{self, Notification, NotificationCategory, NotificationSink};
use super::properties::{PropertyDirectory, PropertyFacts};
use super::LifecycleError;

/// Service governing the tenant→landlord application state machine and the
/// lease it spawns on approval.
pub struct ApplicationService<L, P, N> {
    ledger: Arc<L>,
    properties: Arc<P>,
    notifier: Arc<N>,
    oversight: UserId,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static LEASE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

fn next_lease_id() -> LeaseId {
    let id = LEASE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeaseId(format!("lease-{id:06}"))
}

/// A tenant's intake payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitApplication {
    pub tenant: UserId,
    pub property: PropertyId,
    pub move_in: NaiveDate,
    pub duration_years: u32,
    #[serde(default)]
    pub message: String,
}

/// Landlord verdict on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// What a decision produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    Approved(ApprovalRecord),
    Rejected { application: Application },
}

impl<L, P, N> ApplicationService<L, P, N>
where
    L: LeaseLedger + 'static,
    P: PropertyDirectory + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(ledger: Arc<L>, properties: Arc<P>, notifier: Arc<N>, oversight: UserId) -> Self {
        Self {
            ledger,
            properties,
            notifier,
            oversight,
        }
    }

    /// Submit a new application for a listed property.
    pub fn submit(&self, request: SubmitApplication) -> Result<Application, LifecycleError> {
        let facts = self
            .properties
            .fetch(&request.property)?
            .ok_or(LifecycleError::NotFound("property"))?;
        if !facts.listable {
            return Err(LifecycleError::Conflict(
                "property is not open to applications".to_string(),
            ));
        }
        if request.duration_years == 0 {
            return Err(LifecycleError::Conflict(
                "lease duration must be at least one year".to_string(),
            ));
        }

        let application = Application {
            id: next_application_id(),
            tenant: request.tenant,
            property: request.property,
            move_in: request.move_in,
            duration_years: request.duration_years,
            message: request.message,
            status: ApplicationStatus::Pending,
            lease: None,
        };

        let stored = self.ledger.insert_application(application)?;

        notify::dispatch(
            self.notifier.as_ref(),
            Notification::new(
                facts.landlord.clone(),
                NotificationCategory::Application,
                "New rental application",
                format!(
                    "{} applied for property {}",
                    stored.tenant.0, stored.property.0
                ),
            )
            .with_link(format!("/applications/{}", stored.id.0))
            .with_detail("application_id", stored.id.0.clone()),
        );

        Ok(stored)
    }

    pub fn get(&self, id: &ApplicationId) -> Result<Application, LifecycleError> {
        self.ledger
            .fetch_application(id)?
            .ok_or(LifecycleError::NotFound("application"))
    }

    /// Approve or reject a pending application. Only the property's landlord
    /// may decide; approval atomically creates the pending lease and rejects
    /// every sibling pending application.
    pub fn decide(
        &self,
        id: &ApplicationId,
        landlord: &UserId,
        decision: Decision,
    ) -> Result<DecisionOutcome, LifecycleError> {
        let application = self.get(id)?;
        let facts = self
            .properties
            .fetch(&application.property)?
            .ok_or(LifecycleError::NotFound("property"))?;
        if &facts.landlord != landlord {
            return Err(LifecycleError::Forbidden(
                "only the property's landlord may decide on applications".to_string(),
            ));
        }
        match decision {
            Decision::Approve => {
                if self
                    .ledger
                    .occupied_lease_for(&application.property)?
                    .is_some()
                {
                    return Err(LifecycleError::Conflict(
                        "property already has an occupied lease".to_string(),
                    ));
                }
                self.approve(application, facts)
            }
            Decision::Reject => {
                let application = self.ledger.reject_application(id)?;
                notify::dispatch(
                    self.notifier.as_ref(),
                    Notification::new(
                        application.tenant.clone(),
                        NotificationCategory::Application,
                        "Application rejected",
                        format!(
                            "Your application for property {} was not accepted",
                            application.property.0
                        ),
                    )
                    .with_detail("status", application.status.label()),
                );
                Ok(DecisionOutcome::Rejected { application })
            }
        }
    }

    fn approve(
        &self,
        application: Application,
        facts: PropertyFacts,
    ) -> Result<DecisionOutcome, LifecycleError> {
        let end_date = Lease::term_end(application.move_in, application.duration_years).ok_or_else(
            || LifecycleError::Conflict("lease term exceeds the supported calendar".to_string()),
        )?;
        let rent_amount = facts
            .annual_rent
            .checked_mul(u64::from(application.duration_years))
            .ok_or_else(|| {
                LifecycleError::Conflict("lease rent exceeds the representable amount".to_string())
            })?;

        let lease = Lease {
            id: next_lease_id(),
            application: application.id.clone(),
            tenant: application.tenant.clone(),
            landlord: facts.landlord.clone(),
            property: application.property.clone(),
            start_date: application.move_in,
            end_date,
            rent_amount,
            status: LeaseStatus::Pending,
            tenant_signature: None,
            landlord_signature: None,
            signed_at: None,
            document: None,
        };

        let record = self.ledger.approve_application(&application.id, lease)?;

        notify::dispatch(
            self.notifier.as_ref(),
            Notification::new(
                record.application.tenant.clone(),
                NotificationCategory::Application,
                "Application approved",
                format!(
                    "Your application for property {} was approved; lease {} awaits payment",
                    record.application.property.0, record.lease.id.0
                ),
            )
            .with_link(format!("/leases/{}", record.lease.id.0)),
        );
        for sibling in &record.rejected {
            notify::dispatch(
                self.notifier.as_ref(),
                Notification::new(
                    sibling.tenant.clone(),
                    NotificationCategory::Application,
                    "Application rejected",
                    format!(
                        "Property {} has been let to another applicant",
                        sibling.property.0
                    ),
                ),
            );
        }
        notify::dispatch(
            self.notifier.as_ref(),
            Notification::new(
                self.oversight.clone(),
                NotificationCategory::Application,
                "Lease created",
                format!(
                    "Lease {} created for property {} pending payment",
                    record.lease.id.0, record.lease.property.0
                ),
            )
            .with_detail("rent_amount", record.lease.rent_amount.to_string()),
        );

        Ok(DecisionOutcome::Approved(record))
    }
}
