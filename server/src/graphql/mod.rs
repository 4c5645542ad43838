//! GraphQL schema: accounts, organizations, CRM records, dashboard, insights.

mod account;
mod dashboard;
mod insights;
mod organizations;
mod records;

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, MergedObject, Schema};
use chrono::{FixedOffset, Utc};
use platform_api::{ApiError, ApiResult, load_failure};
use platform_authz::{
    AuthzError, Permission, Plan, PolicyEngine, Role, SubscriptionStatus, UsageMetric,
};
use platform_db::{DbError, DbPool, tenancy, usage};
use sea_orm::{ConnectionTrait, DatabaseTransaction, TransactionTrait};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{AuthConfig, CurrentUser},
    insights::TextGenerator,
};

pub use account::{AuthPayload, MePayload, UserNode};
pub use dashboard::DashboardNode;
pub use organizations::{MemberNode, MemberRole, OrganizationNode, PlanTier};

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

#[derive(MergedObject, Default)]
pub struct QueryRoot(
    account::AccountQuery,
    organizations::OrganizationQuery,
    records::RecordQuery,
    dashboard::DashboardQuery,
);

#[derive(MergedObject, Default)]
pub struct MutationRoot(
    account::AccountMutation,
    organizations::OrganizationMutation,
    records::RecordMutation,
    insights::InsightMutation,
);

/// Shared state every resolver reads from the schema data.
#[derive(Clone)]
pub struct GraphqlData {
    pub db: DbPool,
    pub auth: Arc<AuthConfig>,
    pub generator: Arc<dyn TextGenerator>,
    pub dashboard_offset: FixedOffset,
}

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .data(data)
        .finish()
}

pub fn schema_sdl() -> String {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .finish()
        .sdl()
}

fn data<'a>(ctx: &Context<'a>) -> ApiResult<&'a GraphqlData> {
    ctx.data::<GraphqlData>()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("schema data missing")))
}

fn current_user<'a>(ctx: &Context<'a>) -> ApiResult<&'a CurrentUser> {
    ctx.data::<CurrentUser>().map_err(|_| ApiError::Unauthorized)
}

/// The caller's standing in one organization.
#[derive(Clone, Debug)]
struct Access {
    user: CurrentUser,
    organization_id: Uuid,
    role: Role,
}

/// Resolve the caller's membership and check `permission` against their role.
async fn authorize(
    ctx: &Context<'_>,
    organization_id: Uuid,
    permission: Permission,
) -> ApiResult<Access> {
    let user = current_user(ctx)?;
    let db = &data(ctx)?.db;
    let member = tenancy::membership(db, organization_id, user.user_id)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::Forbidden)?;
    let role: Role = member.role.parse().map_err(authz_error)?;
    PolicyEngine.check(role, permission).map_err(authz_error)?;
    Ok(Access {
        user: user.clone(),
        organization_id,
        role,
    })
}

/// Fail with `LIMIT_EXCEEDED` when adding `increment` to `metric` would pass
/// the organization's plan limit.
async fn ensure_capacity(
    db: &DbPool,
    organization_id: Uuid,
    metric: UsageMetric,
    increment: u64,
) -> ApiResult<()> {
    let subscription = tenancy::subscription(db, organization_id)
        .await
        .map_err(store_error)?;
    let plan: Plan = subscription.plan.parse().map_err(authz_error)?;
    let status: SubscriptionStatus = subscription.status.parse().map_err(authz_error)?;
    let current = usage::current(db, organization_id, metric)
        .await
        .map_err(store_error)?;
    PolicyEngine
        .check_limit(plan, status, metric, current, increment)
        .map(|_| ())
        .map_err(authz_error)
}

async fn record_usage<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    metric: UsageMetric,
) -> ApiResult<()> {
    usage::increment(conn, organization_id, metric, 1, Utc::now())
        .await
        .map_err(store_error)
}

async fn begin(db: &DbPool) -> ApiResult<DatabaseTransaction> {
    db.begin().await.map_err(|err| store_error(err.into()))
}

async fn commit(txn: DatabaseTransaction) -> ApiResult<()> {
    txn.commit().await.map_err(|err| store_error(err.into()))
}

fn store_error(err: DbError) -> ApiError {
    match err {
        DbError::MissingField(field) => ApiError::invalid(format!("{field} is required")),
        DbError::NotFound => ApiError::NotFound,
        DbError::Duplicate(what) => ApiError::invalid(format!("{what} already exists")),
        DbError::LastOwner => ApiError::invalid(err.to_string()),
        DbError::InvalidPath(_) | DbError::UnknownCollection(_) => {
            ApiError::invalid(err.to_string())
        }
        DbError::MissingUrl(_) | DbError::Db(_) => ApiError::internal(err.into()),
    }
}

/// Store failures while reading a collection surface as "Failed to load ...".
fn load_error(collection: &str, err: DbError) -> ApiError {
    match err {
        DbError::Db(_) => {
            warn!(error = %err, collection, "collection read failed");
            ApiError::Unavailable(load_failure(collection))
        }
        other => store_error(other),
    }
}

fn authz_error(err: AuthzError) -> ApiError {
    match err {
        AuthzError::Denied { role, permission } => {
            warn!(%role, %permission, "permission denied");
            ApiError::Forbidden
        }
        AuthzError::LimitExceeded { metric, limit } => ApiError::LimitExceeded {
            metric: metric.as_str().to_string(),
            limit,
        },
        AuthzError::Unknown { .. } => ApiError::internal(err.into()),
    }
}
