//! Users, organizations, memberships and subscriptions.

use chrono::Utc;
use entity::{app_user, membership, organization, subscription};
use platform_authz::{Plan, Role, SubscriptionStatus, UsageMetric};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use serde_json::Value as Json;
use tracing::info;
use uuid::Uuid;

use crate::{DbError, DbResult, required, usage};

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

pub async fn create_user<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    display_name: Option<String>,
    password_hash: String,
) -> DbResult<app_user::Model> {
    let email = required("email", email)?.to_lowercase();
    if find_user_by_email(conn, &email).await?.is_some() {
        return Err(DbError::Duplicate("user"));
    }
    let user = app_user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        display_name: Set(display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())),
        password_hash: Set(password_hash),
        created_at: Set(now()),
    };
    Ok(user.insert(conn).await?)
}

pub async fn find_user_by_email<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> DbResult<Option<app_user::Model>> {
    Ok(app_user::Entity::find()
        .filter(app_user::Column::Email.eq(email.trim().to_lowercase()))
        .one(conn)
        .await?)
}

pub async fn find_user<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> DbResult<Option<app_user::Model>> {
    Ok(app_user::Entity::find_by_id(id).one(conn).await?)
}

/// Create an organization owned by `owner`, on the FREE plan.
pub async fn create_organization(
    db: &DatabaseConnection,
    owner: &app_user::Model,
    name: &str,
) -> DbResult<(organization::Model, membership::Model)> {
    let name = required("name", name)?;
    let stamp = now();
    let txn = db.begin().await?;

    let org = organization::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        settings: Set(Json::Object(Default::default())),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await?;

    let owner_membership = membership::ActiveModel {
        organization_id: Set(org.id),
        user_id: Set(owner.id),
        email: Set(owner.email.clone()),
        role: Set(Role::Owner.as_str().to_string()),
        joined_at: Set(stamp),
    }
    .insert(&txn)
    .await?;

    subscription::ActiveModel {
        organization_id: Set(org.id),
        plan: Set(Plan::Free.as_str().to_string()),
        status: Set(SubscriptionStatus::Active.as_str().to_string()),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await?;

    usage::increment(&txn, org.id, UsageMetric::Users, 1, Utc::now()).await?;
    txn.commit().await?;

    info!(organization_id = %org.id, owner = %owner.id, "organization created");
    Ok((org, owner_membership))
}

pub async fn get_organization<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> DbResult<organization::Model> {
    organization::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(DbError::NotFound)
}

pub async fn update_organization<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    name: Option<String>,
    settings: Option<Json>,
) -> DbResult<organization::Model> {
    let existing = get_organization(conn, id).await?;
    let mut active: organization::ActiveModel = existing.into();
    if let Some(name) = name {
        active.name = Set(required("name", &name)?);
    }
    if let Some(settings) = settings {
        active.settings = Set(settings);
    }
    active.updated_at = Set(now());
    Ok(active.update(conn).await?)
}

/// Memberships of `user_id` with their organizations, oldest first.
pub async fn memberships_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> DbResult<Vec<(membership::Model, organization::Model)>> {
    let rows = membership::Entity::find()
        .filter(membership::Column::UserId.eq(user_id))
        .order_by_asc(membership::Column::JoinedAt)
        .find_also_related(organization::Entity)
        .all(conn)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(member, org)| org.map(|org| (member, org)))
        .collect())
}

pub async fn membership<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    user_id: Uuid,
) -> DbResult<Option<membership::Model>> {
    Ok(membership::Entity::find_by_id((organization_id, user_id))
        .one(conn)
        .await?)
}

pub async fn members<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
) -> DbResult<Vec<membership::Model>> {
    Ok(membership::Entity::find()
        .filter(membership::Column::OrganizationId.eq(organization_id))
        .order_by_asc(membership::Column::JoinedAt)
        .all(conn)
        .await?)
}

/// Add `user` to the organization and bump the `users` counter in the same
/// transaction.
pub async fn add_member<C: ConnectionTrait + TransactionTrait>(
    conn: &C,
    organization_id: Uuid,
    user: &app_user::Model,
    role: Role,
) -> DbResult<membership::Model> {
    let txn = conn.begin().await?;
    if membership(&txn, organization_id, user.id).await?.is_some() {
        return Err(DbError::Duplicate("membership"));
    }
    let member = membership::ActiveModel {
        organization_id: Set(organization_id),
        user_id: Set(user.id),
        email: Set(user.email.clone()),
        role: Set(role.as_str().to_string()),
        joined_at: Set(now()),
    }
    .insert(&txn)
    .await?;
    usage::increment(&txn, organization_id, UsageMetric::Users, 1, Utc::now()).await?;
    txn.commit().await?;
    Ok(member)
}

async fn owner_count<C: ConnectionTrait>(conn: &C, organization_id: Uuid) -> DbResult<u64> {
    Ok(membership::Entity::find()
        .filter(membership::Column::OrganizationId.eq(organization_id))
        .filter(membership::Column::Role.eq(Role::Owner.as_str()))
        .count(conn)
        .await?)
}

fn is_owner(member: &membership::Model) -> bool {
    member.role.eq_ignore_ascii_case(Role::Owner.as_str())
}

pub async fn update_member_role<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> DbResult<membership::Model> {
    let existing = membership(conn, organization_id, user_id)
        .await?
        .ok_or(DbError::NotFound)?;
    if is_owner(&existing) && role != Role::Owner && owner_count(conn, organization_id).await? <= 1
    {
        return Err(DbError::LastOwner);
    }
    let mut active: membership::ActiveModel = existing.into();
    active.role = Set(role.as_str().to_string());
    Ok(active.update(conn).await?)
}

/// Delete the membership and release its seat in the `users` counter.
pub async fn remove_member<C: ConnectionTrait + TransactionTrait>(
    conn: &C,
    organization_id: Uuid,
    user_id: Uuid,
) -> DbResult<()> {
    let txn = conn.begin().await?;
    let existing = membership(&txn, organization_id, user_id)
        .await?
        .ok_or(DbError::NotFound)?;
    if is_owner(&existing) && owner_count(&txn, organization_id).await? <= 1 {
        return Err(DbError::LastOwner);
    }
    membership::Entity::delete_by_id((organization_id, user_id))
        .exec(&txn)
        .await?;
    usage::release(&txn, organization_id, UsageMetric::Users, 1, Utc::now()).await?;
    txn.commit().await?;
    Ok(())
}

pub async fn subscription<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
) -> DbResult<subscription::Model> {
    subscription::Entity::find_by_id(organization_id)
        .one(conn)
        .await?
        .ok_or(DbError::NotFound)
}

pub async fn set_plan<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    plan: Plan,
    status: SubscriptionStatus,
) -> DbResult<subscription::Model> {
    let existing = subscription(conn, organization_id).await?;
    let mut active: subscription::ActiveModel = existing.into();
    active.plan = Set(plan.as_str().to_string());
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(now());
    let updated = active.update(conn).await?;
    info!(%organization_id, plan = plan.as_str(), status = status.as_str(), "plan changed");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity::usage_counter::TOTAL_PERIOD;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn setup() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn user(db: &DatabaseConnection, email: &str) -> app_user::Model {
        create_user(db, email, None, "hash".into()).await.unwrap()
    }

    #[tokio::test]
    async fn emails_are_unique_and_lowercased() {
        let db = setup().await;
        let ada = user(&db, "Ada@Example.TEST").await;
        assert_eq!(ada.email, "ada@example.test");
        let err = create_user(&db, "ada@example.test", None, "x".into())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate("user")));
        assert!(
            find_user_by_email(&db, " ADA@example.test ")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn creating_an_organization_sets_up_owner_and_free_plan() {
        let db = setup().await;
        let ada = user(&db, "ada@example.test").await;
        let (org, owner) = create_organization(&db, &ada, "Acme").await.unwrap();
        assert_eq!(owner.role, "OWNER");

        let sub = subscription(&db, org.id).await.unwrap();
        assert_eq!((sub.plan.as_str(), sub.status.as_str()), ("FREE", "ACTIVE"));

        let users = usage::snapshot(&db, org.id, TOTAL_PERIOD).await.unwrap().users;
        assert_eq!(users, 1);

        let mine = memberships_for_user(&db, ada.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].1.name, "Acme");
    }

    #[tokio::test]
    async fn the_last_owner_cannot_leave_or_be_demoted() {
        let db = setup().await;
        let ada = user(&db, "ada@example.test").await;
        let bob = user(&db, "bob@example.test").await;
        let (org, _) = create_organization(&db, &ada, "Acme").await.unwrap();

        add_member(&db, org.id, &bob, Role::Member).await.unwrap();
        assert!(matches!(
            add_member(&db, org.id, &bob, Role::Viewer).await,
            Err(DbError::Duplicate("membership"))
        ));

        assert!(matches!(
            update_member_role(&db, org.id, ada.id, Role::Admin).await,
            Err(DbError::LastOwner)
        ));
        assert!(matches!(
            remove_member(&db, org.id, ada.id).await,
            Err(DbError::LastOwner)
        ));

        update_member_role(&db, org.id, bob.id, Role::Owner).await.unwrap();
        remove_member(&db, org.id, ada.id).await.unwrap();
        assert_eq!(members(&db, org.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removing_a_member_frees_the_seat() {
        let db = setup().await;
        let ada = user(&db, "ada@example.test").await;
        let bob = user(&db, "bob@example.test").await;
        let carol = user(&db, "carol@example.test").await;
        let (org, _) = create_organization(&db, &ada, "Acme").await.unwrap();

        add_member(&db, org.id, &bob, Role::Member).await.unwrap();
        assert_eq!(usage::current(&db, org.id, UsageMetric::Users).await.unwrap(), 2);
        remove_member(&db, org.id, bob.id).await.unwrap();
        assert_eq!(usage::current(&db, org.id, UsageMetric::Users).await.unwrap(), 1);

        add_member(&db, org.id, &carol, Role::Viewer).await.unwrap();
        assert_eq!(usage::current(&db, org.id, UsageMetric::Users).await.unwrap(), 2);
        assert!(matches!(
            add_member(&db, org.id, &carol, Role::Viewer).await,
            Err(DbError::Duplicate("membership"))
        ));
        assert_eq!(usage::current(&db, org.id, UsageMetric::Users).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn plan_changes_are_persisted() {
        let db = setup().await;
        let ada = user(&db, "ada@example.test").await;
        let (org, _) = create_organization(&db, &ada, "Acme").await.unwrap();
        let sub = set_plan(&db, org.id, Plan::Pro, SubscriptionStatus::Trialing)
            .await
            .unwrap();
        assert_eq!(sub.plan, "PRO");
        assert_eq!(sub.status, "TRIALING");

        let renamed = update_organization(&db, org.id, Some("Acme Ltd".into()), None)
            .await
            .unwrap();
        assert_eq!(renamed.name, "Acme Ltd");
    }
}
