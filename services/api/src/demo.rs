use crate::infra::{
    ApiServices, InMemoryNotificationSink, InMemoryPropertyDirectory, SandboxGateway,
    SandboxRenderer,
};
use chrono::{Datelike, Local, NaiveDate};
use clap::Args;
use rentflow::config::AppConfig;
use rentflow::error::AppError;
use rentflow::lifecycle::domain::{PropertyId, SignatureRef, SignatureRole, UserId};
use rentflow::lifecycle::gateway::CallbackVerifier;
use rentflow::lifecycle::ledger::memory::InMemoryLedger;
use rentflow::lifecycle::ledger::LeaseLedger;
use rentflow::lifecycle::payments::PaymentOutcome;
use rentflow::lifecycle::properties::PropertyFacts;
use rentflow::lifecycle::router::LifecycleServices;
use rentflow::lifecycle::{Decision, DecisionOutcome};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Move-in date (YYYY-MM-DD). Defaults to the first of next month.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) move_in: Option<NaiveDate>,
    /// Lease duration in whole years.
    #[arg(long, default_value_t = 1)]
    pub(crate) duration_years: u32,
    /// Asking rent per year, in minor currency units.
    #[arg(long, default_value_t = 120_000_000)]
    pub(crate) annual_rent: u64,
}

struct DemoWorld {
    services: Arc<ApiServices>,
    ledger: Arc<InMemoryLedger>,
    notifier: Arc<InMemoryNotificationSink>,
    verifier: CallbackVerifier,
    oversight: UserId,
}

fn build_world(annual_rent: u64) -> Result<DemoWorld, AppError> {
    let config = AppConfig::load()?;

    let ledger = Arc::new(InMemoryLedger::new());
    let gateway = Arc::new(SandboxGateway::default());
    let directory = Arc::new(InMemoryPropertyDirectory::default());
    let notifier = Arc::new(InMemoryNotificationSink::default());
    let renderer = Arc::new(SandboxRenderer::default());

    directory.insert(PropertyFacts {
        id: demo_property(),
        landlord: demo_landlord(),
        annual_rent,
        listable: true,
    });

    let services = Arc::new(LifecycleServices::new(
        ledger.clone(),
        gateway,
        directory,
        notifier.clone(),
        renderer,
        &config.payments,
    ));

    Ok(DemoWorld {
        services,
        ledger,
        notifier,
        verifier: CallbackVerifier::new(config.payments.webhook_secret.clone()),
        oversight: UserId(config.payments.oversight_recipient),
    })
}

fn demo_property() -> PropertyId {
    PropertyId("prop-demo-01".to_string())
}

fn demo_landlord() -> UserId {
    UserId("landlord-demo".to_string())
}

fn demo_tenant() -> UserId {
    UserId("tenant-demo".to_string())
}

fn demo_rival() -> UserId {
    UserId("tenant-rival".to_string())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        move_in,
        duration_years,
        annual_rent,
    } = args;

    let move_in = move_in.unwrap_or_else(|| {
        let today = Local::now().date_naive();
        today
            .checked_add_months(chrono::Months::new(1))
            .and_then(|next| next.with_day(1))
            .unwrap_or(today)
    });

    let world = build_world(annual_rent)?;
    println!("RentFlow lease lifecycle demo");
    println!(
        "- property {} listed at {} minor units per year",
        demo_property().0,
        annual_rent
    );

    // Two tenants race for the same property.
    let application = world
        .services
        .applications
        .submit(rentflow::lifecycle::SubmitApplication {
            tenant: demo_tenant(),
            property: demo_property(),
            move_in,
            duration_years,
            message: "Demo walkthrough application".to_string(),
        })
        .map_err(AppError::from)?;
    let rival = world
        .services
        .applications
        .submit(rentflow::lifecycle::SubmitApplication {
            tenant: demo_rival(),
            property: demo_property(),
            move_in,
            duration_years,
            message: "Competing application".to_string(),
        })
        .map_err(AppError::from)?;
    println!(
        "- applications submitted: {} ({}), {} ({})",
        application.id.0, application.tenant.0, rival.id.0, rival.tenant.0
    );

    // Landlord approves one; the sibling is cascade-rejected in the same unit.
    let record = match world
        .services
        .applications
        .decide(&application.id, &demo_landlord(), Decision::Approve)
        .map_err(AppError::from)?
    {
        DecisionOutcome::Approved(record) => record,
        DecisionOutcome::Rejected { .. } => unreachable!("demo approves"),
    };
    println!(
        "- approved {} -> lease {} ({} to {}, rent {})",
        record.application.id.0,
        record.lease.id.0,
        record.lease.start_date,
        record.lease.end_date,
        record.lease.rent_amount
    );
    println!(
        "- cascade rejected {} sibling application(s)",
        record.rejected.len()
    );

    // Tenant pays through the gateway; verify and webhook race for the same
    // reference and the settlement applies exactly once.
    let initiation = world
        .services
        .payments
        .initiate(&record.lease.id, &demo_tenant())
        .map_err(AppError::from)?;
    println!(
        "- payment {} opened, redirect {}",
        initiation.reference, initiation.redirect_url
    );

    let direct = world
        .services
        .payments
        .confirm(&initiation.reference)
        .map_err(AppError::from)?;
    let payload = format!(
        r#"{{"event":"charge.success","data":{{"reference":"{}","status":"success"}}}}"#,
        initiation.reference.0
    );
    let signature = world.verifier.signature_for(payload.as_bytes());
    let webhook = world
        .services
        .payments
        .process_webhook(payload.as_bytes(), &signature)
        .map_err(AppError::from)?;
    println!(
        "- direct verify: {} | webhook: {}",
        outcome_label(&direct),
        outcome_label(&webhook)
    );

    let revenue = world
        .ledger
        .revenue_for(&initiation.reference)
        .ok()
        .flatten()
        .map(|entry| (entry.platform_fee, entry.landlord_earning));
    if let Some((fee, earning)) = revenue {
        println!(
            "- revenue booked once: platform fee {fee}, landlord earning {earning} ({} entries)",
            world.ledger.revenue_entry_count()
        );
    }

    // Both parties sign, in either order, and the agreement renders once.
    world
        .services
        .leases
        .attach_signature(
            &record.lease.id,
            &demo_landlord(),
            SignatureRole::Landlord,
            SignatureRef("uploads/demo/landlord.png".to_string()),
        )
        .map_err(AppError::from)?;
    world
        .services
        .leases
        .attach_signature(
            &record.lease.id,
            &demo_tenant(),
            SignatureRole::Tenant,
            SignatureRef("uploads/demo/tenant.png".to_string()),
        )
        .map_err(AppError::from)?;
    let document = world
        .services
        .leases
        .retrieve_document(&record.lease.id, &world.oversight)
        .map_err(AppError::from)?;
    println!(
        "- agreement finalized as {} ({} bytes)",
        document.reference.0,
        document.bytes.len()
    );

    // Fast-forward past the term and retire the lease.
    let after_term = record
        .lease
        .end_date
        .succ_opt()
        .unwrap_or(record.lease.end_date);
    let report = world
        .services
        .sweeper
        .sweep(after_term)
        .map_err(AppError::from)?;
    println!(
        "- expiry sweep as of {after_term}: {} lease(s) retired",
        report.expired.len()
    );

    println!("\nNotifications dispatched during the demo:");
    for event in world.notifier.events() {
        println!(
            "  [{}] {} -> {}",
            event.category.label(),
            event.title,
            event.recipient.0
        );
    }

    Ok(())
}

fn outcome_label(outcome: &PaymentOutcome) -> &'static str {
    match outcome {
        PaymentOutcome::Settled { .. } => "settled",
        PaymentOutcome::AlreadySettled(_) => "already settled",
        PaymentOutcome::StillPending(_) => "still pending",
    }
}
