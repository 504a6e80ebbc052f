//! # Permissions
//!
//! A permission is what an operation asks for: a concrete resource and
//! action. It carries no domain or subject; both come from the caller
//! context at enforcement time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{require, ModelError, ModelResult};

/// A `(resource, action)` pair required by an operation.
///
/// # Example
///
/// ```
/// use platform_rbac::Permission;
///
/// let perm = Permission::new("doc", "read");
/// assert_eq!(perm.to_string(), "doc:read");
///
/// let parsed: Permission = "invoice:approve".parse().unwrap();
/// assert_eq!(parsed.resource, "invoice");
/// assert_eq!(parsed.action, "approve");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission {
    /// The resource being accessed.
    pub resource: String,
    /// The action performed on the resource.
    pub action: String,
}

impl Permission {
    /// Create a new permission.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Parse from `resource:action`.
    ///
    /// The resource may itself contain colons; the action is everything
    /// after the last one.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidPermission`] if there is no separator,
    /// or a field error if either side is empty.
    pub fn parse(s: &str) -> ModelResult<Self> {
        let (resource, action) = s
            .rsplit_once(':')
            .ok_or_else(|| ModelError::InvalidPermission(s.to_string()))?;
        require("resource", resource)?;
        require("action", action)?;
        Ok(Self::new(resource, action))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl FromStr for Permission {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<R: Into<String>, A: Into<String>> From<(R, A)> for Permission {
    fn from((resource, action): (R, A)) -> Self {
        Self::new(resource, action)
    }
}
