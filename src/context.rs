//! Tenant and acting-user identifiers for a single call
//!
//! The hosting request pipeline builds a `TenantContext` and passes it into
//! every mutating repository call. Absent identifiers are a hard failure.

use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};

/// Tenant id and acting user id for one call chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    #[serde(rename = "tenantId", default)]
    pub tenant_id: Option<i64>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<i64>,
}

impl TenantContext {
    pub fn new(tenant_id: i64, user_id: i64) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            user_id: Some(user_id),
        }
    }

    /// A context with neither identifier set
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build a context from raw request values (headers, claims, items).
    ///
    /// Empty or non-numeric values are left unset so that [`require`](Self::require)
    /// reports them.
    pub fn from_raw(tenant_id: Option<&str>, user_id: Option<&str>) -> Self {
        fn parse(raw: Option<&str>) -> Option<i64> {
            raw.map(str::trim)
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse().ok())
        }

        Self {
            tenant_id: parse(tenant_id),
            user_id: parse(user_id),
        }
    }

    /// Tenant id, or `MissingTenantContext`
    pub fn tenant(&self) -> Result<i64> {
        self.tenant_id.ok_or_else(|| {
            RepositoryError::missing_tenant("tenant id is not available in the current context")
        })
    }

    /// Acting user id, or `MissingUserContext`
    pub fn user(&self) -> Result<i64> {
        self.user_id.ok_or_else(|| {
            RepositoryError::missing_user("no acting user in the current context")
        })
    }

    /// Both identifiers, tenant checked first
    pub fn require(&self) -> Result<(i64, i64)> {
        Ok((self.tenant()?, self.user()?))
    }
}
