//! Authorization primitives for organization members and subscription plans.
//!
//! Both tables are static: a role maps to a fixed permission list and a plan
//! maps to fixed limits. Nothing here touches storage.

mod plan;
mod role;

pub use plan::{LimitCheck, LimitValue, Plan, PlanLimits, SubscriptionStatus, UsageMetric};
pub use role::{Permission, Role};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("role {role} lacks permission {permission}")]
    Denied { role: Role, permission: Permission },
    #[error("{metric} limit of {limit} reached")]
    LimitExceeded { metric: UsageMetric, limit: u64 },
    #[error("unknown {kind}: {value}")]
    Unknown { kind: &'static str, value: String },
}

#[derive(Default, Debug)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn check(&self, role: Role, permission: Permission) -> Result<(), AuthzError> {
        if role.permissions().contains(&permission) {
            Ok(())
        } else {
            Err(AuthzError::Denied { role, permission })
        }
    }

    /// Gate an increment of `metric` against the limits of `plan` in `status`.
    pub fn check_limit(
        &self,
        plan: Plan,
        status: SubscriptionStatus,
        metric: UsageMetric,
        current: u64,
        increment: u64,
    ) -> Result<LimitCheck, AuthzError> {
        let limits = PlanLimits::effective(plan, status);
        let check = limits.get(metric).check(current, increment);
        if check.allowed {
            Ok(check)
        } else {
            Err(AuthzError::LimitExceeded {
                metric,
                limit: check.limit.unwrap_or_default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_cannot_write() {
        let engine = PolicyEngine;
        assert!(engine.check(Role::Viewer, Permission::ReadRecords).is_ok());
        let err = engine
            .check(Role::Viewer, Permission::WriteRecords)
            .unwrap_err();
        assert_eq!(
            err,
            AuthzError::Denied {
                role: Role::Viewer,
                permission: Permission::WriteRecords
            }
        );
    }

    #[test]
    fn only_owner_manages_billing() {
        let engine = PolicyEngine;
        assert!(engine.check(Role::Owner, Permission::ManageBilling).is_ok());
        for role in [Role::Admin, Role::Member, Role::Viewer] {
            assert!(engine.check(role, Permission::ManageBilling).is_err());
        }
    }

    #[test]
    fn free_plan_blocks_the_101st_contact() {
        let engine = PolicyEngine;
        let ok = engine
            .check_limit(
                Plan::Free,
                SubscriptionStatus::Active,
                UsageMetric::Contacts,
                99,
                1,
            )
            .unwrap();
        assert_eq!(ok.remaining, Some(0));
        let err = engine
            .check_limit(
                Plan::Free,
                SubscriptionStatus::Active,
                UsageMetric::Contacts,
                100,
                1,
            )
            .unwrap_err();
        assert_eq!(
            err,
            AuthzError::LimitExceeded {
                metric: UsageMetric::Contacts,
                limit: 100
            }
        );
    }

    #[test]
    fn canceled_subscription_falls_back_to_free_limits() {
        let engine = PolicyEngine;
        assert!(
            engine
                .check_limit(
                    Plan::Pro,
                    SubscriptionStatus::Canceled,
                    UsageMetric::Contacts,
                    150,
                    1,
                )
                .is_err()
        );
        assert!(
            engine
                .check_limit(
                    Plan::Pro,
                    SubscriptionStatus::Trialing,
                    UsageMetric::Contacts,
                    150,
                    1,
                )
                .is_ok()
        );
    }
}
