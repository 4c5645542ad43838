//! Demo data for local development.

use anyhow::{Context, Result, anyhow};
use chrono::{Duration, NaiveDate, Utc};
use platform_authz::{Role, UsageMetric};
use platform_db::{
    DbPool,
    records::{self, ActivityFields, ContactFields, DealFields},
    tenancy, usage,
};
use tracing::info;
use uuid::Uuid;

use crate::auth::hash_password;

pub const DEMO_OWNER_EMAIL: &str = "owner@crm.test";
pub const DEMO_SALES_EMAIL: &str = "sales@crm.test";
pub const DEMO_PASSWORD: &str = "changeme";

#[derive(Debug, Clone)]
pub struct Seeded {
    pub organization_id: Uuid,
    pub owner_id: Uuid,
    pub created: bool,
}

fn contact(name: &str, email: &str, company: &str, status: &str, kind: &str) -> ContactFields {
    ContactFields {
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
        company: Some(company.to_string()),
        status: Some(status.to_string()),
        kind: Some(kind.to_string()),
    }
}

fn deal(title: &str, value: f64, stage: &str, probability: i32, close: Option<NaiveDate>) -> DealFields {
    DealFields {
        title: title.to_string(),
        value: Some(value),
        stage: Some(stage.to_string()),
        status: None,
        expected_close_date: close,
        probability: Some(probability),
        customer_id: None,
    }
}

/// Create the demo owner, a sales member and one organization of sample
/// records. Running it again finds the owner and changes nothing.
pub async fn seed_demo(db: &DbPool) -> Result<Seeded> {
    if let Some(owner) = tenancy::find_user_by_email(db, DEMO_OWNER_EMAIL).await? {
        let organization_id = tenancy::memberships_for_user(db, owner.id)
            .await?
            .into_iter()
            .next()
            .map(|(member, _)| member.organization_id)
            .ok_or_else(|| anyhow!("demo owner has no organization"))?;
        info!(%organization_id, "demo data already present");
        return Ok(Seeded {
            organization_id,
            owner_id: owner.id,
            created: false,
        });
    }

    let hash = hash_password(DEMO_PASSWORD)
        .map_err(|err| anyhow!("password hashing failed: {err}"))?;
    let owner = tenancy::create_user(db, DEMO_OWNER_EMAIL, Some("Demo Owner".into()), hash.clone())
        .await
        .context("creating demo owner")?;
    let sales = tenancy::create_user(db, DEMO_SALES_EMAIL, Some("Demo Sales".into()), hash)
        .await
        .context("creating demo sales user")?;
    let (org, _) = tenancy::create_organization(db, &owner, "Demo Co").await?;
    tenancy::add_member(db, org.id, &sales, Role::Member).await?;

    let customers = [
        contact("Ada Lovelace", "ada@acme.test", "ACME, Inc.", "Active", "Enterprise"),
        contact("Alan Turing", "alan@bletchley.test", "Bletchley Labs", "Active", "SMB"),
        contact("Katherine Johnson", "kj@orbit.test", "Orbit", "Inactive", "Enterprise"),
    ];
    let mut acme = None;
    for fields in customers {
        let created = records::create_customer(db, org.id, fields).await?;
        acme.get_or_insert(created.id);
    }
    let leads = [
        contact("Grace Hopper", "grace@navy.test", "Navy Research", "New", "Inbound"),
        contact("Linus Torvalds", "linus@kernel.test", "Kernel Co", "Qualified", "Referral"),
    ];
    for fields in leads {
        records::create_lead(db, org.id, fields).await?;
    }
    usage::increment(db, org.id, UsageMetric::Contacts, 5, Utc::now()).await?;

    let today = Utc::now().date_naive();
    let mut pilot = deal("ACME Pilot", 12_000.0, "Proposal", 60, Some(today + Duration::days(30)));
    pilot.customer_id = acme;
    for fields in [
        pilot,
        deal("Bletchley Renewal", 8_000.0, "Closed Won", 100, Some(today - Duration::days(20))),
        deal("Orbit Expansion", 20_000.0, "Negotiation", 40, None),
        deal("Navy Trial", 3_000.0, "Closed Lost", 0, Some(today - Duration::days(45))),
    ] {
        records::create_deal(db, org.id, fields).await?;
    }

    let soon = Utc::now().fixed_offset() + Duration::days(2);
    for (kind, status, subject) in [
        ("Meeting", "Scheduled", "Pilot kickoff"),
        ("Task", "Open", "Send renewal quote"),
        ("Call", "Completed", "Discovery call"),
    ] {
        records::create_activity(
            db,
            org.id,
            Some(owner.id),
            ActivityFields {
                kind: Some(kind.to_string()),
                status: Some(status.to_string()),
                subject: subject.to_string(),
                due_date: Some(soon),
                notes: None,
            },
        )
        .await?;
    }

    info!(organization_id = %org.id, "demo data seeded");
    Ok(Seeded {
        organization_id: org.id,
        owner_id: owner.id,
        created: true,
    })
}
