use async_graphql::{Context, InputObject, Object, ResultExt, SimpleObject};
use chrono::{DateTime, FixedOffset, NaiveDate};
use entity::{activity, customer, deal, lead};
use platform_api::ApiResult;
use platform_authz::{Permission, UsageMetric};
use platform_db::records::{
    self, ActivityFields, ActivityFilter, ActivityPatch, ContactFields, ContactPatch, DealFields,
    DealPatch,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    authorize, begin, commit, data, ensure_capacity, load_error, record_usage, store_error,
};

const DEFAULT_PAGE: u64 = 100;

fn page(first: Option<i32>) -> u64 {
    first.map(|n| n.max(1) as u64).unwrap_or(DEFAULT_PAGE)
}

/// A customer or a lead; both collections share one document shape.
#[derive(Clone, Debug, SimpleObject)]
pub struct ContactNode {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    #[graphql(name = "type")]
    pub kind: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<customer::Model> for ContactNode {
    fn from(m: customer::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            name: m.name,
            email: m.email,
            phone: m.phone,
            company: m.company,
            status: m.status,
            kind: m.kind,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<lead::Model> for ContactNode {
    fn from(m: lead::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            name: m.name,
            email: m.email,
            phone: m.phone,
            company: m.company,
            status: m.status,
            kind: m.kind,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DealNode {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub value: Option<f64>,
    pub stage: Option<String>,
    pub status: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    pub probability: Option<i32>,
    pub customer_id: Option<Uuid>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<deal::Model> for DealNode {
    fn from(m: deal::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            title: m.title,
            value: m.value,
            stage: m.stage,
            status: m.status,
            expected_close_date: m.expected_close_date,
            probability: m.probability,
            customer_id: m.customer_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ActivityNode {
    pub id: Uuid,
    pub organization_id: Uuid,
    #[graphql(name = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub subject: String,
    pub due_date: Option<DateTime<FixedOffset>>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub timestamp: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<activity::Model> for ActivityNode {
    fn from(m: activity::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            kind: m.kind,
            status: m.status,
            subject: m.subject,
            due_date: m.due_date,
            notes: m.notes,
            created_by: m.created_by,
            timestamp: m.timestamp,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    #[graphql(name = "type")]
    pub kind: Option<String>,
}

impl From<ContactInput> for ContactFields {
    fn from(input: ContactInput) -> Self {
        Self {
            name: input.name,
            email: input.email,
            phone: input.phone,
            company: input.company,
            status: input.status,
            kind: input.kind,
        }
    }
}

/// Only the fields present are written.
#[derive(Clone, Debug, Default, InputObject)]
pub struct ContactPatchInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    #[graphql(name = "type")]
    pub kind: Option<String>,
}

impl From<ContactPatchInput> for ContactPatch {
    fn from(input: ContactPatchInput) -> Self {
        Self {
            name: input.name,
            email: input.email,
            phone: input.phone,
            company: input.company,
            status: input.status,
            kind: input.kind,
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct DealInput {
    pub title: String,
    pub value: Option<f64>,
    pub stage: Option<String>,
    pub status: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    pub probability: Option<i32>,
    pub customer_id: Option<Uuid>,
}

impl From<DealInput> for DealFields {
    fn from(input: DealInput) -> Self {
        Self {
            title: input.title,
            value: input.value,
            stage: input.stage,
            status: input.status,
            expected_close_date: input.expected_close_date,
            probability: input.probability,
            customer_id: input.customer_id,
        }
    }
}

#[derive(Clone, Debug, Default, InputObject)]
pub struct DealPatchInput {
    pub title: Option<String>,
    pub value: Option<f64>,
    pub stage: Option<String>,
    pub status: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    pub probability: Option<i32>,
    pub customer_id: Option<Uuid>,
}

impl From<DealPatchInput> for DealPatch {
    fn from(input: DealPatchInput) -> Self {
        Self {
            title: input.title,
            value: input.value,
            stage: input.stage,
            status: input.status,
            expected_close_date: input.expected_close_date,
            probability: input.probability,
            customer_id: input.customer_id,
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct ActivityInput {
    #[graphql(name = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub subject: String,
    pub due_date: Option<DateTime<FixedOffset>>,
    pub notes: Option<String>,
}

impl From<ActivityInput> for ActivityFields {
    fn from(input: ActivityInput) -> Self {
        Self {
            kind: input.kind,
            status: input.status,
            subject: input.subject,
            due_date: input.due_date,
            notes: input.notes,
        }
    }
}

#[derive(Clone, Debug, Default, InputObject)]
pub struct ActivityPatchInput {
    #[graphql(name = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub subject: Option<String>,
    pub due_date: Option<DateTime<FixedOffset>>,
    pub notes: Option<String>,
}

impl From<ActivityPatchInput> for ActivityPatch {
    fn from(input: ActivityPatchInput) -> Self {
        Self {
            kind: input.kind,
            status: input.status,
            subject: input.subject,
            due_date: input.due_date,
            notes: input.notes,
        }
    }
}

#[derive(Default)]
pub struct RecordQuery;

#[Object]
impl RecordQuery {
    async fn customers(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        status: Option<String>,
        first: Option<i32>,
    ) -> async_graphql::Result<Vec<ContactNode>> {
        async move {
            authorize(ctx, org_id, Permission::ReadRecords).await?;
            let rows = records::list_customers(&data(ctx)?.db, org_id, status.as_deref(), page(first))
                .await
                .map_err(|err| load_error("customers", err))?;
            ApiResult::Ok(rows.into_iter().map(ContactNode::from).collect())
        }
        .await
        .extend()
    }

    async fn customer(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
    ) -> async_graphql::Result<ContactNode> {
        async move {
            authorize(ctx, org_id, Permission::ReadRecords).await?;
            let row = records::get_customer(&data(ctx)?.db, org_id, id)
                .await
                .map_err(store_error)?;
            ApiResult::Ok(ContactNode::from(row))
        }
        .await
        .extend()
    }

    async fn leads(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        status: Option<String>,
        first: Option<i32>,
    ) -> async_graphql::Result<Vec<ContactNode>> {
        async move {
            authorize(ctx, org_id, Permission::ReadRecords).await?;
            let rows = records::list_leads(&data(ctx)?.db, org_id, status.as_deref(), page(first))
                .await
                .map_err(|err| load_error("leads", err))?;
            ApiResult::Ok(rows.into_iter().map(ContactNode::from).collect())
        }
        .await
        .extend()
    }

    async fn lead(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
    ) -> async_graphql::Result<ContactNode> {
        async move {
            authorize(ctx, org_id, Permission::ReadRecords).await?;
            let row = records::get_lead(&data(ctx)?.db, org_id, id)
                .await
                .map_err(store_error)?;
            ApiResult::Ok(ContactNode::from(row))
        }
        .await
        .extend()
    }

    async fn deals(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        stage: Option<String>,
        first: Option<i32>,
    ) -> async_graphql::Result<Vec<DealNode>> {
        async move {
            authorize(ctx, org_id, Permission::ReadRecords).await?;
            let rows = records::list_deals(&data(ctx)?.db, org_id, stage.as_deref(), page(first))
                .await
                .map_err(|err| load_error("deals", err))?;
            ApiResult::Ok(rows.into_iter().map(DealNode::from).collect())
        }
        .await
        .extend()
    }

    async fn deal(&self, ctx: &Context<'_>, org_id: Uuid, id: Uuid) -> async_graphql::Result<DealNode> {
        async move {
            authorize(ctx, org_id, Permission::ReadRecords).await?;
            let row = records::get_deal(&data(ctx)?.db, org_id, id)
                .await
                .map_err(store_error)?;
            ApiResult::Ok(DealNode::from(row))
        }
        .await
        .extend()
    }

    #[allow(clippy::too_many_arguments)]
    async fn activities(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        #[graphql(name = "type")] kind: Option<String>,
        status: Option<String>,
        due_from: Option<DateTime<FixedOffset>>,
        due_before: Option<DateTime<FixedOffset>>,
        first: Option<i32>,
    ) -> async_graphql::Result<Vec<ActivityNode>> {
        let filter = ActivityFilter {
            kind,
            status,
            due_from,
            due_before,
        };
        async move {
            authorize(ctx, org_id, Permission::ReadRecords).await?;
            let rows = records::list_activities(&data(ctx)?.db, org_id, &filter, page(first))
                .await
                .map_err(|err| load_error("activities", err))?;
            ApiResult::Ok(rows.into_iter().map(ActivityNode::from).collect())
        }
        .await
        .extend()
    }

    async fn activity(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
    ) -> async_graphql::Result<ActivityNode> {
        async move {
            authorize(ctx, org_id, Permission::ReadRecords).await?;
            let row = records::get_activity(&data(ctx)?.db, org_id, id)
                .await
                .map_err(store_error)?;
            ApiResult::Ok(ActivityNode::from(row))
        }
        .await
        .extend()
    }
}

#[derive(Default)]
pub struct RecordMutation;

#[Object]
impl RecordMutation {
    #[instrument(name = "graphql.create_customer", skip(self, ctx, input))]
    async fn create_customer(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        input: ContactInput,
    ) -> async_graphql::Result<ContactNode> {
        async move {
            authorize(ctx, org_id, Permission::WriteRecords).await?;
            let db = &data(ctx)?.db;
            ensure_capacity(db, org_id, UsageMetric::Contacts, 1).await?;
            let txn = begin(db).await?;
            let row = records::create_customer(&txn, org_id, input.into())
                .await
                .map_err(store_error)?;
            record_usage(&txn, org_id, UsageMetric::Contacts).await?;
            commit(txn).await?;
            debug!(customer_id = %row.id, "customer created");
            ApiResult::Ok(ContactNode::from(row))
        }
        .await
        .extend()
    }

    async fn update_customer(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
        input: ContactPatchInput,
    ) -> async_graphql::Result<ContactNode> {
        async move {
            authorize(ctx, org_id, Permission::WriteRecords).await?;
            let row = records::update_customer(&data(ctx)?.db, org_id, id, input.into())
                .await
                .map_err(store_error)?;
            ApiResult::Ok(ContactNode::from(row))
        }
        .await
        .extend()
    }

    async fn delete_customer(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
    ) -> async_graphql::Result<bool> {
        async move {
            authorize(ctx, org_id, Permission::DeleteRecords).await?;
            records::delete_customer(&data(ctx)?.db, org_id, id)
                .await
                .map_err(store_error)?;
            ApiResult::Ok(true)
        }
        .await
        .extend()
    }

    #[instrument(name = "graphql.create_lead", skip(self, ctx, input))]
    async fn create_lead(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        input: ContactInput,
    ) -> async_graphql::Result<ContactNode> {
        async move {
            authorize(ctx, org_id, Permission::WriteRecords).await?;
            let db = &data(ctx)?.db;
            ensure_capacity(db, org_id, UsageMetric::Contacts, 1).await?;
            let txn = begin(db).await?;
            let row = records::create_lead(&txn, org_id, input.into())
                .await
                .map_err(store_error)?;
            record_usage(&txn, org_id, UsageMetric::Contacts).await?;
            commit(txn).await?;
            debug!(lead_id = %row.id, "lead created");
            ApiResult::Ok(ContactNode::from(row))
        }
        .await
        .extend()
    }

    async fn update_lead(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
        input: ContactPatchInput,
    ) -> async_graphql::Result<ContactNode> {
        async move {
            authorize(ctx, org_id, Permission::WriteRecords).await?;
            let row = records::update_lead(&data(ctx)?.db, org_id, id, input.into())
                .await
                .map_err(store_error)?;
            ApiResult::Ok(ContactNode::from(row))
        }
        .await
        .extend()
    }

    async fn delete_lead(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
    ) -> async_graphql::Result<bool> {
        async move {
            authorize(ctx, org_id, Permission::DeleteRecords).await?;
            records::delete_lead(&data(ctx)?.db, org_id, id)
                .await
                .map_err(store_error)?;
            ApiResult::Ok(true)
        }
        .await
        .extend()
    }

    async fn create_deal(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        input: DealInput,
    ) -> async_graphql::Result<DealNode> {
        async move {
            authorize(ctx, org_id, Permission::WriteRecords).await?;
            let row = records::create_deal(&data(ctx)?.db, org_id, input.into())
                .await
                .map_err(store_error)?;
            ApiResult::Ok(DealNode::from(row))
        }
        .await
        .extend()
    }

    async fn update_deal(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
        input: DealPatchInput,
    ) -> async_graphql::Result<DealNode> {
        async move {
            authorize(ctx, org_id, Permission::WriteRecords).await?;
            let row = records::update_deal(&data(ctx)?.db, org_id, id, input.into())
                .await
                .map_err(store_error)?;
            ApiResult::Ok(DealNode::from(row))
        }
        .await
        .extend()
    }

    async fn delete_deal(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
    ) -> async_graphql::Result<bool> {
        async move {
            authorize(ctx, org_id, Permission::DeleteRecords).await?;
            records::delete_deal(&data(ctx)?.db, org_id, id)
                .await
                .map_err(store_error)?;
            ApiResult::Ok(true)
        }
        .await
        .extend()
    }

    async fn create_activity(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        input: ActivityInput,
    ) -> async_graphql::Result<ActivityNode> {
        async move {
            let access = authorize(ctx, org_id, Permission::WriteRecords).await?;
            let row = records::create_activity(
                &data(ctx)?.db,
                org_id,
                Some(access.user.user_id),
                input.into(),
            )
            .await
            .map_err(store_error)?;
            ApiResult::Ok(ActivityNode::from(row))
        }
        .await
        .extend()
    }

    async fn update_activity(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
        input: ActivityPatchInput,
    ) -> async_graphql::Result<ActivityNode> {
        async move {
            authorize(ctx, org_id, Permission::WriteRecords).await?;
            let row = records::update_activity(&data(ctx)?.db, org_id, id, input.into())
                .await
                .map_err(store_error)?;
            ApiResult::Ok(ActivityNode::from(row))
        }
        .await
        .extend()
    }

    async fn delete_activity(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        id: Uuid,
    ) -> async_graphql::Result<bool> {
        async move {
            authorize(ctx, org_id, Permission::DeleteRecords).await?;
            records::delete_activity(&data(ctx)?.db, org_id, id)
                .await
                .map_err(store_error)?;
            ApiResult::Ok(true)
        }
        .await
        .extend()
    }
}
