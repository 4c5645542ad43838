use async_graphql::{Context, Object, ResultExt, SimpleObject};
use chrono::{DateTime, FixedOffset, Utc};
use entity::{activity, customer, deal, lead};
use platform_api::ApiResult;
use platform_authz::Permission;
use platform_db::records;
use products_crm::{
    ActivityRecord, ChartPoint, ContactRecord, DashboardInput, DashboardMetrics, DealRecord,
};
use tracing::instrument;
use uuid::Uuid;

use super::{authorize, data, load_error};

#[derive(Clone, Debug, SimpleObject)]
pub struct ChartPointNode {
    pub name: String,
    pub value: f64,
}

fn chart(points: Vec<ChartPoint>) -> Vec<ChartPointNode> {
    points
        .into_iter()
        .map(|p| ChartPointNode {
            name: p.name,
            value: p.value,
        })
        .collect()
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DashboardNode {
    /// Start of the seven-day upcoming-meetings window.
    pub window_start: DateTime<FixedOffset>,
    pub total_customers: u64,
    pub active_customers: u64,
    pub total_leads: u64,
    pub open_deals: u64,
    pub open_deal_value: f64,
    pub won_deal_value: f64,
    pub weighted_pipeline_value: f64,
    pub upcoming_meetings: u64,
    pub open_tasks: u64,
    pub deals_by_stage: Vec<ChartPointNode>,
    pub deal_value_by_stage: Vec<ChartPointNode>,
    pub leads_by_status: Vec<ChartPointNode>,
    pub customers_by_type: Vec<ChartPointNode>,
    pub activities_by_type: Vec<ChartPointNode>,
    pub won_revenue_by_month: Vec<ChartPointNode>,
}

impl DashboardNode {
    fn new(metrics: DashboardMetrics, now: DateTime<FixedOffset>) -> Self {
        Self {
            window_start: DashboardMetrics::window_start(now),
            total_customers: metrics.total_customers as u64,
            active_customers: metrics.active_customers as u64,
            total_leads: metrics.total_leads as u64,
            open_deals: metrics.open_deals as u64,
            open_deal_value: metrics.open_deal_value,
            won_deal_value: metrics.won_deal_value,
            weighted_pipeline_value: metrics.weighted_pipeline_value,
            upcoming_meetings: metrics.upcoming_meetings as u64,
            open_tasks: metrics.open_tasks as u64,
            deals_by_stage: chart(metrics.deals_by_stage),
            deal_value_by_stage: chart(metrics.deal_value_by_stage),
            leads_by_status: chart(metrics.leads_by_status),
            customers_by_type: chart(metrics.customers_by_type),
            activities_by_type: chart(metrics.activities_by_type),
            won_revenue_by_month: chart(metrics.won_revenue_by_month),
        }
    }
}

fn customer_record(m: customer::Model) -> ContactRecord {
    ContactRecord {
        status: m.status,
        kind: m.kind,
    }
}

fn lead_record(m: lead::Model) -> ContactRecord {
    ContactRecord {
        status: m.status,
        kind: m.kind,
    }
}

fn deal_record(m: deal::Model) -> DealRecord {
    DealRecord {
        stage: m.stage,
        status: m.status,
        value: m.value,
        probability: m.probability,
        expected_close_date: m.expected_close_date,
    }
}

fn activity_record(m: activity::Model) -> ActivityRecord {
    ActivityRecord {
        kind: m.kind,
        status: m.status,
        due_date: m.due_date,
    }
}

#[derive(Default)]
pub struct DashboardQuery;

#[Object]
impl DashboardQuery {
    /// Headline numbers and chart series for one organization. `asOf`
    /// defaults to now in the configured dashboard offset.
    #[instrument(name = "graphql.dashboard", skip(self, ctx))]
    async fn dashboard(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        as_of: Option<DateTime<FixedOffset>>,
    ) -> async_graphql::Result<DashboardNode> {
        load_dashboard(ctx, org_id, as_of).await.extend()
    }
}

async fn load_dashboard(
    ctx: &Context<'_>,
    org_id: Uuid,
    as_of: Option<DateTime<FixedOffset>>,
) -> ApiResult<DashboardNode> {
    authorize(ctx, org_id, Permission::ReadRecords).await?;
    let data = data(ctx)?;
    let db = &data.db;
    let now = as_of.unwrap_or_else(|| Utc::now().with_timezone(&data.dashboard_offset));

    let customers = records::all_customers(db, org_id)
        .await
        .map_err(|err| load_error("customers", err))?;
    let leads = records::all_leads(db, org_id)
        .await
        .map_err(|err| load_error("leads", err))?;
    let deals = records::all_deals(db, org_id)
        .await
        .map_err(|err| load_error("deals", err))?;
    let activities = records::all_activities(db, org_id)
        .await
        .map_err(|err| load_error("activities", err))?;

    let input = DashboardInput {
        customers: customers.into_iter().map(customer_record).collect(),
        leads: leads.into_iter().map(lead_record).collect(),
        deals: deals.into_iter().map(deal_record).collect(),
        activities: activities.into_iter().map(activity_record).collect(),
    };
    Ok(DashboardNode::new(DashboardMetrics::build(&input, now), now))
}
