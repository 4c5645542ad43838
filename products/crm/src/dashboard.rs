//! Dashboard snapshot for one organization.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::aggregate::{
    self, ChartPoint, UpcomingWindow, count_by, is_open_stage, is_upcoming_meeting,
    monthly_series, open_deal_value, sum_by,
};
use crate::{ACTIVE, CLOSED_WON, COMPLETED, TASK, WON};

const REVENUE_MONTHS: u32 = 6;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub status: Option<String>,
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    pub stage: Option<String>,
    pub status: Option<String>,
    pub value: Option<f64>,
    pub probability: Option<i32>,
    pub expected_close_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<DateTime<FixedOffset>>,
}

#[derive(Clone, Debug, Default)]
pub struct DashboardInput {
    pub customers: Vec<ContactRecord>,
    pub leads: Vec<ContactRecord>,
    pub deals: Vec<DealRecord>,
    pub activities: Vec<ActivityRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_customers: usize,
    pub active_customers: usize,
    pub total_leads: usize,
    pub open_deals: usize,
    pub open_deal_value: f64,
    pub won_deal_value: f64,
    pub weighted_pipeline_value: f64,
    pub upcoming_meetings: usize,
    pub open_tasks: usize,
    pub deals_by_stage: Vec<ChartPoint>,
    pub deal_value_by_stage: Vec<ChartPoint>,
    pub leads_by_status: Vec<ChartPoint>,
    pub customers_by_type: Vec<ChartPoint>,
    pub activities_by_type: Vec<ChartPoint>,
    pub won_revenue_by_month: Vec<ChartPoint>,
}

impl DealRecord {
    pub fn is_open(&self) -> bool {
        is_open_stage(self.stage.as_deref())
    }

    pub fn is_won(&self) -> bool {
        self.stage.as_deref() == Some(CLOSED_WON) || self.status.as_deref() == Some(WON)
    }

    fn weighted_value(&self) -> f64 {
        let value = self.value.filter(|v| v.is_finite()).unwrap_or(0.0);
        let probability = f64::from(self.probability.unwrap_or(0).clamp(0, 100));
        value * probability / 100.0
    }
}

impl DashboardMetrics {
    pub fn build(input: &DashboardInput, now: DateTime<FixedOffset>) -> Self {
        let window = UpcomingWindow::next_seven_days(now);
        let deals = &input.deals;
        let won: Vec<&DealRecord> = deals.iter().filter(|d| d.is_won()).collect();

        Self {
            total_customers: input.customers.len(),
            active_customers: input
                .customers
                .iter()
                .filter(|c| c.status.as_deref() == Some(ACTIVE))
                .count(),
            total_leads: input.leads.len(),
            open_deals: deals.iter().filter(|d| d.is_open()).count(),
            open_deal_value: open_deal_value(deals, |d| d.stage.as_deref(), |d| d.value),
            won_deal_value: won
                .iter()
                .map(|d| d.value.filter(|v| v.is_finite()).unwrap_or(0.0))
                .sum(),
            weighted_pipeline_value: deals
                .iter()
                .filter(|d| d.is_open())
                .map(DealRecord::weighted_value)
                .sum(),
            upcoming_meetings: input
                .activities
                .iter()
                .filter(|a| {
                    is_upcoming_meeting(
                        a.kind.as_deref(),
                        a.status.as_deref(),
                        a.due_date.as_ref(),
                        &window,
                    )
                })
                .count(),
            open_tasks: input
                .activities
                .iter()
                .filter(|a| {
                    a.kind.as_deref() == Some(TASK) && a.status.as_deref() != Some(COMPLETED)
                })
                .count(),
            deals_by_stage: count_by(deals, |d| d.stage.as_deref()),
            deal_value_by_stage: sum_by(deals, |d| d.stage.as_deref(), |d| d.value),
            leads_by_status: count_by(&input.leads, |l| l.status.as_deref()),
            customers_by_type: count_by(&input.customers, |c| c.kind.as_deref()),
            activities_by_type: count_by(&input.activities, |a| a.kind.as_deref()),
            won_revenue_by_month: monthly_series(
                &won,
                |d| d.expected_close_date,
                |d| d.value,
                now.date_naive(),
                REVENUE_MONTHS,
            ),
        }
    }

    /// Start of the upcoming-meetings window used for `now`.
    pub fn window_start(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        aggregate::start_of_day(now)
    }
}
