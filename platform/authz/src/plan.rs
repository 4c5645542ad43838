use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::AuthzError;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    Free,
    Pro,
    Enterprise,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

/// Counters tracked per organization.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMetric {
    Contacts,
    StorageMb,
    Users,
    AiRequests,
}

/// A plan cap. Stored as `-1` when unlimited.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LimitValue {
    Unlimited,
    Limited(u64),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PlanLimits {
    pub contacts: LimitValue,
    pub storage_mb: LimitValue,
    pub users: LimitValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitCheck {
    pub allowed: bool,
    pub current: u64,
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
}

impl LimitValue {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            -1 => LimitValue::Unlimited,
            n if n < 0 => LimitValue::Limited(0),
            n => LimitValue::Limited(n as u64),
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            LimitValue::Unlimited => -1,
            LimitValue::Limited(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }

    pub fn value(self) -> Option<u64> {
        match self {
            LimitValue::Unlimited => None,
            LimitValue::Limited(n) => Some(n),
        }
    }

    pub fn check(self, current: u64, increment: u64) -> LimitCheck {
        let next = current.saturating_add(increment);
        match self {
            LimitValue::Unlimited => LimitCheck {
                allowed: true,
                current,
                limit: None,
                remaining: None,
            },
            LimitValue::Limited(max) => LimitCheck {
                allowed: next <= max,
                current,
                limit: Some(max),
                remaining: Some(max.saturating_sub(next)),
            },
        }
    }
}

impl PlanLimits {
    pub fn for_plan(plan: Plan) -> Self {
        match plan {
            Plan::Free => Self {
                contacts: LimitValue::from_raw(100),
                storage_mb: LimitValue::from_raw(100),
                users: LimitValue::from_raw(2),
            },
            Plan::Pro => Self {
                contacts: LimitValue::from_raw(5_000),
                storage_mb: LimitValue::from_raw(10_240),
                users: LimitValue::from_raw(10),
            },
            Plan::Enterprise => Self {
                contacts: LimitValue::Unlimited,
                storage_mb: LimitValue::Unlimited,
                users: LimitValue::Unlimited,
            },
        }
    }

    /// Lapsed subscriptions keep working at free-tier limits.
    pub fn effective(plan: Plan, status: SubscriptionStatus) -> Self {
        if status.is_current() {
            Self::for_plan(plan)
        } else {
            Self::for_plan(Plan::Free)
        }
    }

    pub fn get(&self, metric: UsageMetric) -> LimitValue {
        match metric {
            UsageMetric::Contacts => self.contacts,
            UsageMetric::StorageMb => self.storage_mb,
            UsageMetric::Users => self.users,
            UsageMetric::AiRequests => LimitValue::Unlimited,
        }
    }
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Trialing => "TRIALING",
            SubscriptionStatus::PastDue => "PAST_DUE",
            SubscriptionStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_current(self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }
}

impl Plan {
    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Pro => "PRO",
            Plan::Enterprise => "ENTERPRISE",
        }
    }
}

impl UsageMetric {
    pub const ALL: [UsageMetric; 4] = [
        UsageMetric::Contacts,
        UsageMetric::StorageMb,
        UsageMetric::Users,
        UsageMetric::AiRequests,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UsageMetric::Contacts => "contacts",
            UsageMetric::StorageMb => "storage_mb",
            UsageMetric::Users => "users",
            UsageMetric::AiRequests => "ai_requests",
        }
    }
}

impl fmt::Display for UsageMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FREE" => Ok(Plan::Free),
            "PRO" => Ok(Plan::Pro),
            "ENTERPRISE" => Ok(Plan::Enterprise),
            _ => Err(AuthzError::Unknown {
                kind: "plan",
                value: value.to_string(),
            }),
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "TRIALING" => Ok(SubscriptionStatus::Trialing),
            "PAST_DUE" => Ok(SubscriptionStatus::PastDue),
            "CANCELED" | "CANCELLED" => Ok(SubscriptionStatus::Canceled),
            _ => Err(AuthzError::Unknown {
                kind: "subscription status",
                value: value.to_string(),
            }),
        }
    }
}

impl FromStr for UsageMetric {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        UsageMetric::ALL
            .into_iter()
            .find(|metric| metric.as_str() == value.trim())
            .ok_or_else(|| AuthzError::Unknown {
                kind: "usage metric",
                value: value.to_string(),
            })
    }
}
