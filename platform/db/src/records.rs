//! Organization-scoped CRUD over the CRM collections.
//!
//! Every call is a direct insert, field merge, delete or filtered read on one
//! table. There is no cache and no cross-collection integrity check; the last
//! write wins.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use entity::{activity, customer, deal, lead};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, prelude::DateTimeWithTimeZone,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{DbError, DbResult, required};

/// Upper bound on a single list call.
pub const MAX_PAGE: u64 = 1_000;

/// Shared document shape of customers and leads.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactFields {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DealFields {
    pub title: String,
    pub value: Option<f64>,
    pub stage: Option<String>,
    pub status: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    pub probability: Option<i32>,
    pub customer_id: Option<Uuid>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DealPatch {
    pub title: Option<String>,
    pub value: Option<f64>,
    pub stage: Option<String>,
    pub status: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    pub probability: Option<i32>,
    pub customer_id: Option<Uuid>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityFields {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub subject: String,
    pub due_date: Option<DateTime<FixedOffset>>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityPatch {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub subject: Option<String>,
    pub due_date: Option<DateTime<FixedOffset>>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ActivityFilter {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub due_from: Option<DateTime<FixedOffset>>,
    pub due_before: Option<DateTime<FixedOffset>>,
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn page(limit: u64) -> u64 {
    limit.clamp(1, MAX_PAGE)
}

fn probability(value: Option<i32>) -> Option<i32> {
    value.map(|p| p.clamp(0, 100))
}

// Customers

pub async fn create_customer<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    fields: ContactFields,
) -> DbResult<customer::Model> {
    let name = required("name", &fields.name)?;
    let email = required("email", &fields.email)?;
    let stamp = now();
    let model = customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(organization_id),
        name: Set(name),
        email: Set(email),
        phone: Set(clean(fields.phone)),
        company: Set(clean(fields.company)),
        status: Set(clean(fields.status)),
        kind: Set(clean(fields.kind)),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    };
    Ok(model.insert(conn).await?)
}

pub async fn get_customer<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
) -> DbResult<customer::Model> {
    customer::Entity::find_by_id(id)
        .filter(customer::Column::OrganizationId.eq(organization_id))
        .one(conn)
        .await?
        .ok_or(DbError::NotFound)
}

pub async fn list_customers<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    status: Option<&str>,
    limit: u64,
) -> DbResult<Vec<customer::Model>> {
    let mut query =
        customer::Entity::find().filter(customer::Column::OrganizationId.eq(organization_id));
    if let Some(status) = status {
        query = query.filter(customer::Column::Status.eq(status));
    }
    Ok(query
        .order_by_desc(customer::Column::CreatedAt)
        .limit(page(limit))
        .all(conn)
        .await?)
}

pub async fn update_customer<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
    patch: ContactPatch,
) -> DbResult<customer::Model> {
    let existing = get_customer(conn, organization_id, id).await?;
    let mut active: customer::ActiveModel = existing.into();
    if let Some(name) = patch.name {
        active.name = Set(required("name", &name)?);
    }
    if let Some(email) = patch.email {
        active.email = Set(required("email", &email)?);
    }
    if patch.phone.is_some() {
        active.phone = Set(clean(patch.phone));
    }
    if patch.company.is_some() {
        active.company = Set(clean(patch.company));
    }
    if patch.status.is_some() {
        active.status = Set(clean(patch.status));
    }
    if patch.kind.is_some() {
        active.kind = Set(clean(patch.kind));
    }
    active.updated_at = Set(now());
    Ok(active.update(conn).await?)
}

pub async fn delete_customer<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
) -> DbResult<()> {
    let result = customer::Entity::delete_many()
        .filter(customer::Column::Id.eq(id))
        .filter(customer::Column::OrganizationId.eq(organization_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// Leads

pub async fn create_lead<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    fields: ContactFields,
) -> DbResult<lead::Model> {
    let name = required("name", &fields.name)?;
    let email = required("email", &fields.email)?;
    let stamp = now();
    let model = lead::ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(organization_id),
        name: Set(name),
        email: Set(email),
        phone: Set(clean(fields.phone)),
        company: Set(clean(fields.company)),
        status: Set(clean(fields.status)),
        kind: Set(clean(fields.kind)),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    };
    Ok(model.insert(conn).await?)
}

pub async fn get_lead<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
) -> DbResult<lead::Model> {
    lead::Entity::find_by_id(id)
        .filter(lead::Column::OrganizationId.eq(organization_id))
        .one(conn)
        .await?
        .ok_or(DbError::NotFound)
}

pub async fn list_leads<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    status: Option<&str>,
    limit: u64,
) -> DbResult<Vec<lead::Model>> {
    let mut query = lead::Entity::find().filter(lead::Column::OrganizationId.eq(organization_id));
    if let Some(status) = status {
        query = query.filter(lead::Column::Status.eq(status));
    }
    Ok(query
        .order_by_desc(lead::Column::CreatedAt)
        .limit(page(limit))
        .all(conn)
        .await?)
}

pub async fn update_lead<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
    patch: ContactPatch,
) -> DbResult<lead::Model> {
    let existing = get_lead(conn, organization_id, id).await?;
    let mut active: lead::ActiveModel = existing.into();
    if let Some(name) = patch.name {
        active.name = Set(required("name", &name)?);
    }
    if let Some(email) = patch.email {
        active.email = Set(required("email", &email)?);
    }
    if patch.phone.is_some() {
        active.phone = Set(clean(patch.phone));
    }
    if patch.company.is_some() {
        active.company = Set(clean(patch.company));
    }
    if patch.status.is_some() {
        active.status = Set(clean(patch.status));
    }
    if patch.kind.is_some() {
        active.kind = Set(clean(patch.kind));
    }
    active.updated_at = Set(now());
    Ok(active.update(conn).await?)
}

pub async fn delete_lead<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
) -> DbResult<()> {
    let result = lead::Entity::delete_many()
        .filter(lead::Column::Id.eq(id))
        .filter(lead::Column::OrganizationId.eq(organization_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// Deals

pub async fn create_deal<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    fields: DealFields,
) -> DbResult<deal::Model> {
    let title = required("title", &fields.title)?;
    let stamp = now();
    let model = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(organization_id),
        title: Set(title),
        value: Set(fields.value),
        stage: Set(clean(fields.stage)),
        status: Set(clean(fields.status)),
        expected_close_date: Set(fields.expected_close_date),
        probability: Set(probability(fields.probability)),
        customer_id: Set(fields.customer_id),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    };
    Ok(model.insert(conn).await?)
}

pub async fn get_deal<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
) -> DbResult<deal::Model> {
    deal::Entity::find_by_id(id)
        .filter(deal::Column::OrganizationId.eq(organization_id))
        .one(conn)
        .await?
        .ok_or(DbError::NotFound)
}

pub async fn list_deals<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    stage: Option<&str>,
    limit: u64,
) -> DbResult<Vec<deal::Model>> {
    let mut query = deal::Entity::find().filter(deal::Column::OrganizationId.eq(organization_id));
    if let Some(stage) = stage {
        query = query.filter(deal::Column::Stage.eq(stage));
    }
    Ok(query
        .order_by_desc(deal::Column::CreatedAt)
        .limit(page(limit))
        .all(conn)
        .await?)
}

pub async fn update_deal<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
    patch: DealPatch,
) -> DbResult<deal::Model> {
    let existing = get_deal(conn, organization_id, id).await?;
    let mut active: deal::ActiveModel = existing.into();
    if let Some(title) = patch.title {
        active.title = Set(required("title", &title)?);
    }
    if patch.value.is_some() {
        active.value = Set(patch.value);
    }
    if patch.stage.is_some() {
        active.stage = Set(clean(patch.stage));
    }
    if patch.status.is_some() {
        active.status = Set(clean(patch.status));
    }
    if patch.expected_close_date.is_some() {
        active.expected_close_date = Set(patch.expected_close_date);
    }
    if patch.probability.is_some() {
        active.probability = Set(probability(patch.probability));
    }
    if patch.customer_id.is_some() {
        active.customer_id = Set(patch.customer_id);
    }
    active.updated_at = Set(now());
    Ok(active.update(conn).await?)
}

pub async fn delete_deal<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
) -> DbResult<()> {
    let result = deal::Entity::delete_many()
        .filter(deal::Column::Id.eq(id))
        .filter(deal::Column::OrganizationId.eq(organization_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// Activities

pub async fn create_activity<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    created_by: Option<Uuid>,
    fields: ActivityFields,
) -> DbResult<activity::Model> {
    let subject = required("subject", &fields.subject)?;
    let stamp = now();
    let model = activity::ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(organization_id),
        kind: Set(clean(fields.kind)),
        status: Set(clean(fields.status)),
        subject: Set(subject),
        due_date: Set(fields.due_date),
        notes: Set(clean(fields.notes)),
        created_by: Set(created_by),
        timestamp: Set(stamp),
        updated_at: Set(stamp),
    };
    Ok(model.insert(conn).await?)
}

pub async fn get_activity<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
) -> DbResult<activity::Model> {
    activity::Entity::find_by_id(id)
        .filter(activity::Column::OrganizationId.eq(organization_id))
        .one(conn)
        .await?
        .ok_or(DbError::NotFound)
}

pub async fn list_activities<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    filter: &ActivityFilter,
    limit: u64,
) -> DbResult<Vec<activity::Model>> {
    let mut query =
        activity::Entity::find().filter(activity::Column::OrganizationId.eq(organization_id));
    if let Some(kind) = filter.kind.as_deref() {
        query = query.filter(activity::Column::Kind.eq(kind));
    }
    if let Some(status) = filter.status.as_deref() {
        query = query.filter(activity::Column::Status.eq(status));
    }
    if let Some(from) = filter.due_from {
        query = query.filter(activity::Column::DueDate.gte(from));
    }
    if let Some(before) = filter.due_before {
        query = query.filter(activity::Column::DueDate.lt(before));
    }
    Ok(query
        .order_by_desc(activity::Column::Timestamp)
        .limit(page(limit))
        .all(conn)
        .await?)
}

pub async fn update_activity<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
    patch: ActivityPatch,
) -> DbResult<activity::Model> {
    let existing = get_activity(conn, organization_id, id).await?;
    let mut active: activity::ActiveModel = existing.into();
    if patch.kind.is_some() {
        active.kind = Set(clean(patch.kind));
    }
    if patch.status.is_some() {
        active.status = Set(clean(patch.status));
    }
    if let Some(subject) = patch.subject {
        active.subject = Set(required("subject", &subject)?);
    }
    if patch.due_date.is_some() {
        active.due_date = Set(patch.due_date);
    }
    if patch.notes.is_some() {
        active.notes = Set(clean(patch.notes));
    }
    active.updated_at = Set(now());
    Ok(active.update(conn).await?)
}

pub async fn delete_activity<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
) -> DbResult<()> {
    let result = activity::Entity::delete_many()
        .filter(activity::Column::Id.eq(id))
        .filter(activity::Column::OrganizationId.eq(organization_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// Whole-organization reads, unbounded, for aggregation.

pub async fn all_customers<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
) -> DbResult<Vec<customer::Model>> {
    Ok(customer::Entity::find()
        .filter(customer::Column::OrganizationId.eq(organization_id))
        .all(conn)
        .await?)
}

pub async fn all_leads<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
) -> DbResult<Vec<lead::Model>> {
    Ok(lead::Entity::find()
        .filter(lead::Column::OrganizationId.eq(organization_id))
        .all(conn)
        .await?)
}

pub async fn all_deals<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
) -> DbResult<Vec<deal::Model>> {
    Ok(deal::Entity::find()
        .filter(deal::Column::OrganizationId.eq(organization_id))
        .all(conn)
        .await?)
}

pub async fn all_activities<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
) -> DbResult<Vec<activity::Model>> {
    Ok(activity::Entity::find()
        .filter(activity::Column::OrganizationId.eq(organization_id))
        .all(conn)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_documents_deserialize_from_camel_case() {
        let fields: ContactFields = serde_json::from_str(
            r#"{"name":"Ada","email":"ada@acme.test","type":"Premium","createdAt":"ignored"}"#,
        )
        .unwrap();
        assert_eq!(fields.name, "Ada");
        assert_eq!(fields.kind.as_deref(), Some("Premium"));
        assert_eq!(fields.status, None);
    }

    #[test]
    fn deal_documents_deserialize_dates() {
        let fields: DealFields = serde_json::from_str(
            r#"{"title":"Pilot","value":1200.5,"expectedCloseDate":"2026-11-30","probability":40}"#,
        )
        .unwrap();
        assert_eq!(fields.value, Some(1200.5));
        assert_eq!(
            fields.expected_close_date,
            NaiveDate::from_ymd_opt(2026, 11, 30)
        );
    }

    async fn setup() -> sea_orm::DatabaseConnection {
        use migration::{Migrator, MigratorTrait};
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn updates_merge_and_stay_inside_the_organization() {
        let db = setup().await;
        let org = Uuid::new_v4();
        let created = create_customer(
            &db,
            org,
            ContactFields {
                name: "Ada".into(),
                email: "ada@acme.test".into(),
                status: Some("Pending".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let updated = update_customer(
            &db,
            org,
            created.id,
            ContactPatch {
                status: Some("Active".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.status.as_deref(), Some("Active"));

        let stranger = Uuid::new_v4();
        assert!(matches!(
            get_customer(&db, stranger, created.id).await,
            Err(DbError::NotFound)
        ));
        assert!(matches!(
            delete_customer(&db, stranger, created.id).await,
            Err(DbError::NotFound)
        ));

        let active = list_customers(&db, org, Some("Active"), 50).await.unwrap();
        assert_eq!(active.len(), 1);
        delete_customer(&db, org, created.id).await.unwrap();
        assert!(list_customers(&db, org, None, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn required_fields_are_enforced() {
        let db = setup().await;
        let org = Uuid::new_v4();
        let err = create_deal(&db, org, DealFields::default()).await.unwrap_err();
        assert!(matches!(err, DbError::MissingField("title")));

        let task = create_activity(
            &db,
            org,
            None,
            ActivityFields {
                kind: Some("Task".into()),
                subject: "Call back".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let err = update_activity(
            &db,
            org,
            task.id,
            ActivityPatch {
                subject: Some("  ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::MissingField("subject")));

        let filter = ActivityFilter {
            kind: Some("Task".into()),
            ..Default::default()
        };
        assert_eq!(list_activities(&db, org, &filter, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn whole_organization_reads_are_not_paged() {
        let db = setup().await;
        let org = Uuid::new_v4();
        let total = MAX_PAGE as usize + 5;
        for i in 0..total {
            create_lead(
                &db,
                org,
                ContactFields {
                    name: format!("Lead {i}"),
                    email: format!("lead{i}@acme.test"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        create_lead(
            &db,
            Uuid::new_v4(),
            ContactFields {
                name: "Elsewhere".into(),
                email: "other@acme.test".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(all_leads(&db, org).await.unwrap().len(), total);
        assert_eq!(
            list_leads(&db, org, None, u64::MAX).await.unwrap().len(),
            MAX_PAGE as usize
        );
    }

    #[test]
    fn blanks_are_cleaned_and_probability_clamped() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" x ".into())), Some("x".into()));
        assert_eq!(probability(Some(140)), Some(100));
        assert_eq!(page(0), 1);
        assert_eq!(page(5_000), MAX_PAGE);
    }
}
