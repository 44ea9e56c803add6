//! Tenant identity.
//!
//! Every store and model operation takes the tenant explicitly; there is no
//! ambient "current tenant" anywhere in the process.

use std::fmt;

use crate::error::AgentError;

/// Validated tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap a raw identifier.
    ///
    /// Accepts non-empty ASCII alphanumerics plus `.`, `_` and `-`, up to
    /// [`Self::MAX_LEN`] bytes.
    pub fn new(id: impl Into<String>) -> Result<Self, AgentError> {
        let id = id.into();

        if id.is_empty() {
            return Err(AgentError::InvalidTenant {
                reason: "identifier is empty".to_string(),
            });
        }
        if id.len() > Self::MAX_LEN {
            return Err(AgentError::InvalidTenant {
                reason: format!("identifier exceeds {} bytes", Self::MAX_LEN),
            });
        }
        if let Some(c) = id
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '_' | '-'))
        {
            return Err(AgentError::InvalidTenant {
                reason: format!("unsupported character {c:?} in identifier"),
            });
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
