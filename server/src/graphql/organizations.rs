use async_graphql::{Context, Enum, Json, Object, ResultExt, SimpleObject};
use chrono::{DateTime, FixedOffset};
use entity::{membership, organization, subscription, usage_counter::TOTAL_PERIOD};
use platform_api::{ApiError, ApiResult};
use platform_authz::{
    Permission, Plan, PlanLimits, Role, SubscriptionStatus, UsageMetric,
};
use platform_db::{tenancy, usage};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{authorize, authz_error, current_user, data, ensure_capacity, store_error};

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl From<Role> for MemberRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Owner => MemberRole::Owner,
            Role::Admin => MemberRole::Admin,
            Role::Member => MemberRole::Member,
            Role::Viewer => MemberRole::Viewer,
        }
    }
}

impl From<MemberRole> for Role {
    fn from(role: MemberRole) -> Self {
        match role {
            MemberRole::Owner => Role::Owner,
            MemberRole::Admin => Role::Admin,
            MemberRole::Member => Role::Member,
            MemberRole::Viewer => Role::Viewer,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlanTier {
    Free,
    Pro,
    Enterprise,
}

impl From<Plan> for PlanTier {
    fn from(plan: Plan) -> Self {
        match plan {
            Plan::Free => PlanTier::Free,
            Plan::Pro => PlanTier::Pro,
            Plan::Enterprise => PlanTier::Enterprise,
        }
    }
}

impl From<PlanTier> for Plan {
    fn from(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Plan::Free,
            PlanTier::Pro => Plan::Pro,
            PlanTier::Enterprise => Plan::Enterprise,
        }
    }
}

fn stored_role(value: &str) -> ApiResult<MemberRole> {
    value.parse::<Role>().map(MemberRole::from).map_err(authz_error)
}

#[derive(Clone, Debug, SimpleObject)]
pub struct OrganizationNode {
    pub id: Uuid,
    pub name: String,
    /// The caller's role in this organization.
    pub role: Option<MemberRole>,
    pub settings: Json<Value>,
    pub created_at: DateTime<FixedOffset>,
}

impl OrganizationNode {
    pub fn new(org: organization::Model, member: &membership::Model) -> Self {
        Self {
            id: org.id,
            name: org.name,
            role: stored_role(&member.role).ok(),
            settings: Json(org.settings),
            created_at: org.created_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MemberNode {
    pub user_id: Uuid,
    pub email: String,
    pub role: MemberRole,
    pub joined_at: DateTime<FixedOffset>,
}

impl MemberNode {
    fn from_model(model: membership::Model) -> ApiResult<Self> {
        Ok(Self {
            role: stored_role(&model.role)?,
            user_id: model.user_id,
            email: model.email,
            joined_at: model.joined_at,
        })
    }
}

/// Plan caps; `-1` means unlimited.
#[derive(Clone, Debug, SimpleObject)]
pub struct LimitsNode {
    pub contacts: i64,
    pub storage_mb: i64,
    pub users: i64,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct UsageNode {
    pub period: String,
    pub contacts: u64,
    pub storage_mb: u64,
    pub users: u64,
    pub ai_requests: u64,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct SubscriptionNode {
    pub plan: PlanTier,
    pub status: String,
    /// Limits in force, FREE when the subscription has lapsed.
    pub limits: LimitsNode,
}

impl SubscriptionNode {
    fn from_model(model: subscription::Model) -> ApiResult<Self> {
        let plan: Plan = model.plan.parse().map_err(authz_error)?;
        let status: SubscriptionStatus = model.status.parse().map_err(authz_error)?;
        let limits = PlanLimits::effective(plan, status);
        Ok(Self {
            plan: plan.into(),
            status: status.as_str().to_string(),
            limits: LimitsNode {
                contacts: limits.get(UsageMetric::Contacts).raw(),
                storage_mb: limits.get(UsageMetric::StorageMb).raw(),
                users: limits.get(UsageMetric::Users).raw(),
            },
        })
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct OrganizationDetail {
    pub organization: OrganizationNode,
    pub members: Vec<MemberNode>,
    pub subscription: SubscriptionNode,
    pub usage: UsageNode,
}

#[derive(Default)]
pub struct OrganizationQuery;

#[Object]
impl OrganizationQuery {
    async fn organizations(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<OrganizationNode>> {
        list_organizations(ctx).await.extend()
    }

    #[instrument(name = "graphql.organization", skip(self, ctx))]
    async fn organization(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
    ) -> async_graphql::Result<OrganizationDetail> {
        organization_detail(ctx, org_id).await.extend()
    }

    /// Counters for one period: `total` (default) or `YYYY-MM`.
    async fn usage(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        period: Option<String>,
    ) -> async_graphql::Result<UsageNode> {
        organization_usage(ctx, org_id, period.as_deref().unwrap_or(TOTAL_PERIOD))
            .await
            .extend()
    }
}

#[derive(Default)]
pub struct OrganizationMutation;

#[Object]
impl OrganizationMutation {
    #[instrument(name = "graphql.create_organization", skip(self, ctx))]
    async fn create_organization(
        &self,
        ctx: &Context<'_>,
        name: String,
    ) -> async_graphql::Result<OrganizationNode> {
        create_organization(ctx, &name).await.extend()
    }

    async fn update_organization(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        name: Option<String>,
        settings: Option<Json<Value>>,
    ) -> async_graphql::Result<OrganizationNode> {
        update_organization(ctx, org_id, name, settings.map(|s| s.0))
            .await
            .extend()
    }

    #[instrument(name = "graphql.add_member", skip(self, ctx))]
    async fn add_member(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        email: String,
        role: MemberRole,
    ) -> async_graphql::Result<MemberNode> {
        add_member(ctx, org_id, &email, role.into()).await.extend()
    }

    async fn update_member_role(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> async_graphql::Result<MemberNode> {
        update_member_role(ctx, org_id, user_id, role.into())
            .await
            .extend()
    }

    async fn remove_member(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        user_id: Uuid,
    ) -> async_graphql::Result<bool> {
        remove_member(ctx, org_id, user_id).await.extend()
    }

    #[instrument(name = "graphql.change_plan", skip(self, ctx))]
    async fn change_plan(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        plan: PlanTier,
    ) -> async_graphql::Result<SubscriptionNode> {
        change_plan(ctx, org_id, plan.into()).await.extend()
    }
}

async fn list_organizations(ctx: &Context<'_>) -> ApiResult<Vec<OrganizationNode>> {
    let user = current_user(ctx)?;
    let rows = tenancy::memberships_for_user(&data(ctx)?.db, user.user_id)
        .await
        .map_err(store_error)?;
    Ok(rows
        .into_iter()
        .map(|(member, org)| OrganizationNode::new(org, &member))
        .collect())
}

async fn organization_detail(ctx: &Context<'_>, org_id: Uuid) -> ApiResult<OrganizationDetail> {
    let access = authorize(ctx, org_id, Permission::ReadRecords).await?;
    let db = &data(ctx)?.db;
    let org = tenancy::get_organization(db, org_id)
        .await
        .map_err(store_error)?;
    let members = tenancy::members(db, org_id).await.map_err(store_error)?;
    let subscription = tenancy::subscription(db, org_id)
        .await
        .map_err(store_error)?;
    Ok(OrganizationDetail {
        organization: OrganizationNode {
            id: org.id,
            name: org.name,
            role: Some(access.role.into()),
            settings: Json(org.settings),
            created_at: org.created_at,
        },
        members: members
            .into_iter()
            .map(MemberNode::from_model)
            .collect::<ApiResult<_>>()?,
        subscription: SubscriptionNode::from_model(subscription)?,
        usage: load_usage(ctx, org_id, TOTAL_PERIOD).await?,
    })
}

async fn organization_usage(ctx: &Context<'_>, org_id: Uuid, period: &str) -> ApiResult<UsageNode> {
    authorize(ctx, org_id, Permission::ReadRecords).await?;
    load_usage(ctx, org_id, period).await
}

async fn load_usage(ctx: &Context<'_>, org_id: Uuid, period: &str) -> ApiResult<UsageNode> {
    let snapshot = usage::snapshot(&data(ctx)?.db, org_id, period)
        .await
        .map_err(store_error)?;
    Ok(UsageNode {
        period: period.to_string(),
        contacts: snapshot.contacts,
        storage_mb: snapshot.storage_mb,
        users: snapshot.users,
        ai_requests: snapshot.ai_requests,
    })
}

async fn create_organization(ctx: &Context<'_>, name: &str) -> ApiResult<OrganizationNode> {
    let viewer = current_user(ctx)?;
    let db = &data(ctx)?.db;
    let owner = tenancy::find_user(db, viewer.user_id)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::Unauthorized)?;
    let (org, member) = tenancy::create_organization(db, &owner, name)
        .await
        .map_err(store_error)?;
    Ok(OrganizationNode::new(org, &member))
}

async fn update_organization(
    ctx: &Context<'_>,
    org_id: Uuid,
    name: Option<String>,
    settings: Option<Value>,
) -> ApiResult<OrganizationNode> {
    let access = authorize(ctx, org_id, Permission::ManageSettings).await?;
    if settings.as_ref().is_some_and(|s| !s.is_object()) {
        return Err(ApiError::invalid("settings must be an object"));
    }
    let org = tenancy::update_organization(&data(ctx)?.db, org_id, name, settings)
        .await
        .map_err(store_error)?;
    Ok(OrganizationNode {
        id: org.id,
        name: org.name,
        role: Some(access.role.into()),
        settings: Json(org.settings),
        created_at: org.created_at,
    })
}

/// OWNER can only be granted, or taken away, by an OWNER.
fn guard_owner_change(actor: Role, current: Option<Role>, requested: Option<Role>) -> ApiResult<()> {
    let touches_owner = current == Some(Role::Owner) || requested == Some(Role::Owner);
    if touches_owner && actor != Role::Owner {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

async fn add_member(
    ctx: &Context<'_>,
    org_id: Uuid,
    email: &str,
    role: Role,
) -> ApiResult<MemberNode> {
    let access = authorize(ctx, org_id, Permission::ManageMembers).await?;
    guard_owner_change(access.role, None, Some(role))?;
    let db = &data(ctx)?.db;
    let user = tenancy::find_user_by_email(db, email)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;
    if tenancy::membership(db, org_id, user.id)
        .await
        .map_err(store_error)?
        .is_some()
    {
        return Err(ApiError::invalid("user is already a member"));
    }
    ensure_capacity(db, org_id, UsageMetric::Users, 1).await?;
    let member = tenancy::add_member(db, org_id, &user, role)
        .await
        .map_err(store_error)?;
    info!(organization_id = %org_id, user_id = %user.id, role = role.as_str(), by = %access.user.user_id, "member added");
    MemberNode::from_model(member)
}

async fn update_member_role(
    ctx: &Context<'_>,
    org_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> ApiResult<MemberNode> {
    let access = authorize(ctx, org_id, Permission::ManageMembers).await?;
    let db = &data(ctx)?.db;
    let existing = tenancy::membership(db, org_id, user_id)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;
    let current: Role = existing.role.parse().map_err(authz_error)?;
    guard_owner_change(access.role, Some(current), Some(role))?;
    let member = tenancy::update_member_role(db, org_id, user_id, role)
        .await
        .map_err(store_error)?;
    MemberNode::from_model(member)
}

async fn remove_member(ctx: &Context<'_>, org_id: Uuid, user_id: Uuid) -> ApiResult<bool> {
    let access = authorize(ctx, org_id, Permission::ManageMembers).await?;
    let db = &data(ctx)?.db;
    let existing = tenancy::membership(db, org_id, user_id)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;
    let current: Role = existing.role.parse().map_err(authz_error)?;
    guard_owner_change(access.role, Some(current), None)?;
    tenancy::remove_member(db, org_id, user_id)
        .await
        .map_err(store_error)?;
    info!(organization_id = %org_id, %user_id, by = %access.user.user_id, "member removed");
    Ok(true)
}

async fn change_plan(ctx: &Context<'_>, org_id: Uuid, plan: Plan) -> ApiResult<SubscriptionNode> {
    authorize(ctx, org_id, Permission::ManageBilling).await?;
    let updated = tenancy::set_plan(&data(ctx)?.db, org_id, plan, SubscriptionStatus::Active)
        .await
        .map_err(store_error)?;
    SubscriptionNode::from_model(updated)
}
