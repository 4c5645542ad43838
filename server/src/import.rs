//! Bulk import of exported collection documents into one organization.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use platform_authz::UsageMetric;
use platform_db::{
    Collection, CollectionPath, DbPool,
    records::{self, ActivityFields, ContactFields, DealFields},
    tenancy, usage,
};
use sea_orm::TransactionTrait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub collection: Collection,
    pub imported: usize,
}

fn documents<T: DeserializeOwned>(raw: &[Value]) -> Result<Vec<T>> {
    raw.iter()
        .enumerate()
        .map(|(index, doc)| {
            serde_json::from_value(doc.clone())
                .with_context(|| format!("document {index} has an unexpected shape"))
        })
        .collect()
}

/// Import a JSON array of documents. Both the flat and the per-user nested
/// paths land in `organization_id`; the whole batch is one transaction.
#[instrument(skip(db, json))]
pub async fn import_documents(
    db: &DbPool,
    organization_id: Uuid,
    path: &str,
    json: &str,
) -> Result<ImportSummary> {
    let path = CollectionPath::parse(path)?;
    if !path.collection.holds_records() {
        bail!("collection {} cannot be imported", path.collection);
    }
    tenancy::get_organization(db, organization_id)
        .await
        .with_context(|| format!("organization {organization_id} not found"))?;

    let raw: Vec<Value> = serde_json::from_str(json).context("expected a JSON array")?;
    let txn = db.begin().await?;
    let imported = match path.collection {
        Collection::Customers => {
            let docs = documents::<ContactFields>(&raw)?;
            for doc in &docs {
                records::create_customer(&txn, organization_id, doc.clone()).await?;
            }
            docs.len()
        }
        Collection::Leads => {
            let docs = documents::<ContactFields>(&raw)?;
            for doc in &docs {
                records::create_lead(&txn, organization_id, doc.clone()).await?;
            }
            docs.len()
        }
        Collection::Deals => {
            let docs = documents::<DealFields>(&raw)?;
            for doc in docs.iter().cloned() {
                records::create_deal(&txn, organization_id, doc).await?;
            }
            docs.len()
        }
        Collection::Activities => {
            let docs = documents::<ActivityFields>(&raw)?;
            for doc in docs.iter().cloned() {
                records::create_activity(&txn, organization_id, None, doc).await?;
            }
            docs.len()
        }
        Collection::Organizations | Collection::Usage => {
            bail!("collection {} cannot be imported", path.collection)
        }
    };
    if matches!(path.collection, Collection::Customers | Collection::Leads) {
        usage::increment(
            &txn,
            organization_id,
            UsageMetric::Contacts,
            imported as u64,
            Utc::now(),
        )
        .await?;
    }
    txn.commit().await?;

    info!(
        %organization_id,
        collection = %path.collection,
        legacy_layout = path.is_user_scoped(),
        imported,
        "documents imported"
    );
    Ok(ImportSummary {
        collection: path.collection,
        imported,
    })
}
