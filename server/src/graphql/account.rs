use async_graphql::{Context, Object, ResultExt, SimpleObject};
use chrono::{DateTime, FixedOffset};
use entity::app_user;
use platform_api::{ApiError, ApiResult};
use platform_db::{DbError, tenancy};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{current_user, data, organizations::OrganizationNode, store_error};
use crate::auth::{
    MIN_PASSWORD_LEN, cleared_session_cookie, hash_password, issue_token, normalize_email,
    session_cookie, verify_password,
};

#[derive(Clone, Debug, SimpleObject)]
pub struct UserNode {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<app_user::Model> for UserNode {
    fn from(model: app_user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            display_name: model.display_name,
            created_at: model.created_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserNode,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub user: UserNode,
    pub organizations: Vec<OrganizationNode>,
}

#[derive(Default)]
pub struct AccountQuery;

#[Object]
impl AccountQuery {
    /// The signed-in user and the organizations they belong to.
    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<MePayload> {
        load_me(ctx).await.extend()
    }
}

#[derive(Default)]
pub struct AccountMutation;

#[Object]
impl AccountMutation {
    #[instrument(name = "graphql.sign_up", skip_all)]
    async fn sign_up(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
        display_name: Option<String>,
    ) -> async_graphql::Result<AuthPayload> {
        sign_up(ctx, &email, &password, display_name).await.extend()
    }

    #[instrument(name = "graphql.sign_in", skip_all)]
    async fn sign_in(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<AuthPayload> {
        sign_in(ctx, &email, &password).await.extend()
    }

    async fn sign_out(&self, ctx: &Context<'_>) -> bool {
        ctx.append_http_header("Set-Cookie", cleared_session_cookie());
        true
    }
}

async fn load_me(ctx: &Context<'_>) -> ApiResult<MePayload> {
    let viewer = current_user(ctx)?;
    let db = &data(ctx)?.db;
    let user = tenancy::find_user(db, viewer.user_id)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::Unauthorized)?;
    let organizations = tenancy::memberships_for_user(db, user.id)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(|(member, org)| OrganizationNode::new(org, &member))
        .collect();
    Ok(MePayload {
        user: user.into(),
        organizations,
    })
}

async fn sign_up(
    ctx: &Context<'_>,
    email: &str,
    password: &str,
    display_name: Option<String>,
) -> ApiResult<AuthPayload> {
    let email = normalize_email(email).ok_or_else(|| ApiError::auth("auth/invalid-email"))?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::auth("auth/weak-password"));
    }
    let data = data(ctx)?;
    let hash = hash_password(password)
        .map_err(|err| ApiError::internal(anyhow::anyhow!("password hashing failed: {err}")))?;
    let user = match tenancy::create_user(&data.db, &email, display_name, hash).await {
        Ok(user) => user,
        Err(DbError::Duplicate(_)) => return Err(ApiError::auth("auth/email-already-in-use")),
        Err(err) => return Err(store_error(err)),
    };
    info!(user_id = %user.id, "account created");
    start_session(ctx, user)
}

async fn sign_in(ctx: &Context<'_>, email: &str, password: &str) -> ApiResult<AuthPayload> {
    let email = normalize_email(email).ok_or_else(|| ApiError::auth("auth/invalid-email"))?;
    let db = &data(ctx)?.db;
    let user = tenancy::find_user_by_email(db, &email)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::auth("auth/user-not-found"))?;
    if !verify_password(password, &user.password_hash) {
        return Err(ApiError::auth("auth/wrong-password"));
    }
    start_session(ctx, user)
}

fn start_session(ctx: &Context<'_>, user: app_user::Model) -> ApiResult<AuthPayload> {
    let auth = &data(ctx)?.auth;
    let token = issue_token(user.id, auth)
        .map_err(|err| ApiError::internal(anyhow::anyhow!("token signing failed: {err}")))?;
    ctx.append_http_header("Set-Cookie", session_cookie(&token, auth.session_ttl_minutes));
    Ok(AuthPayload {
        token,
        user: user.into(),
    })
}
