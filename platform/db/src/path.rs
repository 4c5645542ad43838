//! Collection addressing.
//!
//! Two schemes coexist in exported data: per-user nested paths
//! (`artifacts/{appId}/users/{userId}/{collection}`) and flat collection names
//! (`customers`). Both resolve to the same organization-scoped tables.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::DbError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Customers,
    Leads,
    Deals,
    Activities,
    Organizations,
    Usage,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Scope {
    Organization,
    User { app_id: String, user_id: String },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectionPath {
    pub collection: Collection,
    pub scope: Scope,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Customers => "customers",
            Collection::Leads => "leads",
            Collection::Deals => "deals",
            Collection::Activities => "activities",
            Collection::Organizations => "organizations",
            Collection::Usage => "usage",
        }
    }

    /// Collections whose documents can be imported as CRM records.
    pub fn holds_records(self) -> bool {
        matches!(
            self,
            Collection::Customers | Collection::Leads | Collection::Deals | Collection::Activities
        )
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = DbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "customers" => Ok(Collection::Customers),
            "leads" => Ok(Collection::Leads),
            "deals" => Ok(Collection::Deals),
            "activities" => Ok(Collection::Activities),
            "organizations" => Ok(Collection::Organizations),
            "usage" => Ok(Collection::Usage),
            other => Err(DbError::UnknownCollection(other.to_string())),
        }
    }
}

impl CollectionPath {
    pub fn flat(collection: Collection) -> Self {
        Self {
            collection,
            scope: Scope::Organization,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DbError> {
        let trimmed = raw.trim().trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(DbError::InvalidPath(raw.to_string()));
        }
        match segments.as_slice() {
            [collection] => Ok(Self::flat(collection.parse()?)),
            ["artifacts", app_id, "users", user_id, collection] => Ok(Self {
                collection: collection.parse()?,
                scope: Scope::User {
                    app_id: (*app_id).to_string(),
                    user_id: (*user_id).to_string(),
                },
            }),
            _ => Err(DbError::InvalidPath(raw.to_string())),
        }
    }

    pub fn is_user_scoped(&self) -> bool {
        matches!(self.scope, Scope::User { .. })
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Organization => write!(f, "{}", self.collection),
            Scope::User { app_id, user_id } => {
                write!(f, "artifacts/{app_id}/users/{user_id}/{}", self.collection)
            }
        }
    }
}

impl FromStr for CollectionPath {
    type Err = DbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}
