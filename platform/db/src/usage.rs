//! Per-organization usage counters.
//!
//! Each increment upserts two rows: the calendar month (`YYYY-MM`) and the
//! running total. Limit checks read the total row. Seats (`users`) are
//! released again when a member leaves; the other metrics only grow.

use chrono::{DateTime, Utc};
use entity::usage_counter::{self, TOTAL_PERIOD};
use platform_authz::UsageMetric;
use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    prelude::DateTimeWithTimeZone,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::DbResult;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub contacts: u64,
    pub storage_mb: u64,
    pub users: u64,
    pub ai_requests: u64,
}

impl UsageSnapshot {
    pub fn get(&self, metric: UsageMetric) -> u64 {
        match metric {
            UsageMetric::Contacts => self.contacts,
            UsageMetric::StorageMb => self.storage_mb,
            UsageMetric::Users => self.users,
            UsageMetric::AiRequests => self.ai_requests,
        }
    }

    fn set(&mut self, metric: UsageMetric, value: u64) {
        match metric {
            UsageMetric::Contacts => self.contacts = value,
            UsageMetric::StorageMb => self.storage_mb = value,
            UsageMetric::Users => self.users = value,
            UsageMetric::AiRequests => self.ai_requests = value,
        }
    }
}

pub fn month_period(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Add `amount` to both the monthly and the total counter of `metric`.
pub async fn increment<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    metric: UsageMetric,
    amount: u64,
    at: DateTime<Utc>,
) -> DbResult<()> {
    if amount == 0 {
        return Ok(());
    }
    let delta = i64::try_from(amount).unwrap_or(i64::MAX);
    for period in [month_period(at), TOTAL_PERIOD.to_string()] {
        let row = usage_counter::ActiveModel {
            organization_id: Set(organization_id),
            metric: Set(metric.as_str().to_string()),
            period: Set(period),
            count: Set(delta),
            updated_at: Set(at.into()),
        };
        usage_counter::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    usage_counter::Column::OrganizationId,
                    usage_counter::Column::Metric,
                    usage_counter::Column::Period,
                ])
                .value(
                    usage_counter::Column::Count,
                    Expr::col((usage_counter::Entity, usage_counter::Column::Count)).add(delta),
                )
                .update_column(usage_counter::Column::UpdatedAt)
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    debug!(%organization_id, metric = metric.as_str(), amount, "usage incremented");
    Ok(())
}

/// Take `amount` back off the monthly and total counters of `metric`,
/// clamping at zero.
pub async fn release<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    metric: UsageMetric,
    amount: u64,
    at: DateTime<Utc>,
) -> DbResult<()> {
    if amount == 0 {
        return Ok(());
    }
    let delta = i64::try_from(amount).unwrap_or(i64::MAX);
    let stamp: DateTimeWithTimeZone = at.into();
    let rows = || {
        usage_counter::Entity::update_many()
            .filter(usage_counter::Column::OrganizationId.eq(organization_id))
            .filter(usage_counter::Column::Metric.eq(metric.as_str()))
            .filter(
                usage_counter::Column::Period.is_in([month_period(at), TOTAL_PERIOD.to_string()]),
            )
            .col_expr(usage_counter::Column::UpdatedAt, Expr::value(stamp))
    };
    rows()
        .col_expr(
            usage_counter::Column::Count,
            Expr::col(usage_counter::Column::Count).sub(delta),
        )
        .filter(usage_counter::Column::Count.gte(delta))
        .exec(conn)
        .await?;
    rows()
        .col_expr(usage_counter::Column::Count, Expr::value(0i64))
        .filter(usage_counter::Column::Count.lt(delta))
        .exec(conn)
        .await?;
    debug!(%organization_id, metric = metric.as_str(), amount, "usage released");
    Ok(())
}

/// All-time count of `metric`, zero when nothing was recorded.
pub async fn current<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    metric: UsageMetric,
) -> DbResult<u64> {
    current_in(conn, organization_id, metric, TOTAL_PERIOD).await
}

pub async fn current_in<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    metric: UsageMetric,
    period: &str,
) -> DbResult<u64> {
    let row = usage_counter::Entity::find_by_id((
        organization_id,
        metric.as_str().to_string(),
        period.to_string(),
    ))
    .one(conn)
    .await?;
    Ok(row.map(|r| r.count.max(0) as u64).unwrap_or(0))
}

/// Every metric for one period (`total` or `YYYY-MM`).
pub async fn snapshot<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    period: &str,
) -> DbResult<UsageSnapshot> {
    let rows = usage_counter::Entity::find()
        .filter(usage_counter::Column::OrganizationId.eq(organization_id))
        .filter(usage_counter::Column::Period.eq(period))
        .all(conn)
        .await?;
    let mut snapshot = UsageSnapshot::default();
    for row in rows {
        // Rows for metrics this build does not know about are ignored.
        if let Ok(metric) = row.metric.parse::<UsageMetric>() {
            snapshot.set(metric, row.count.max(0) as u64);
        }
    }
    Ok(snapshot)
}
