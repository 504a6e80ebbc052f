//! Operation access guard
//!
//! Every guarded entry point declares the permissions it needs, once, at
//! startup. A request is let through only if its caller is identified and
//! every declared permission is allowed in the caller's domain.

use std::collections::HashMap;

use platform_authz::{Decision, Enforcer};
use platform_rbac::Permission;

use crate::context::{Caller, ContextExtractor};
use crate::error::{AuthError, AuthResult};

/// Source of the permissions each operation requires.
pub trait MetadataProvider: Send + Sync {
    /// Permissions required by `operation`, or `None` if the operation is
    /// not known. An empty slice means the operation is public.
    fn required_permissions(&self, operation: &str) -> Option<&[Permission]>;
}

/// Static table of operation requirements.
///
/// # Example
///
/// ```rust
/// use platform_auth::{MetadataProvider, OperationRegistry};
///
/// let registry = OperationRegistry::builder()
///     .operation("documents.read", [("doc", "read")])
///     .operation("documents.publish", [("doc", "write"), ("doc", "publish")])
///     .public("health")
///     .build();
///
/// assert_eq!(registry.required_permissions("documents.publish").unwrap().len(), 2);
/// assert!(registry.required_permissions("health").unwrap().is_empty());
/// assert!(registry.required_permissions("unknown").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Vec<Permission>>,
}

impl OperationRegistry {
    /// Start building a registry.
    pub fn builder() -> OperationRegistryBuilder {
        OperationRegistryBuilder::default()
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl MetadataProvider for OperationRegistry {
    fn required_permissions(&self, operation: &str) -> Option<&[Permission]> {
        self.operations.get(operation).map(Vec::as_slice)
    }
}

/// Builder for [`OperationRegistry`].
#[derive(Debug, Default)]
pub struct OperationRegistryBuilder {
    operations: HashMap<String, Vec<Permission>>,
}

impl OperationRegistryBuilder {
    /// Register an operation and the permissions it requires.
    ///
    /// Registering the same name again replaces its permissions.
    pub fn operation<I, P>(mut self, name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        let name = name.into();
        let mut required: Vec<Permission> = Vec::new();
        for permission in permissions.into_iter().map(Into::into) {
            if !required.contains(&permission) {
                required.push(permission);
            }
        }
        if self.operations.insert(name.clone(), required).is_some() {
            tracing::warn!(operation = %name, "Operation registered twice, keeping the last");
        }
        self
    }

    /// Register an operation that requires no permission.
    pub fn public(self, name: impl Into<String>) -> Self {
        self.operation(name, Vec::<Permission>::new())
    }

    /// Finish building.
    pub fn build(self) -> OperationRegistry {
        OperationRegistry {
            operations: self.operations,
        }
    }
}

/// Guards operations with caller extraction and enforcement.
#[derive(Debug)]
pub struct AccessGuard<E, M> {
    extractor: E,
    metadata: M,
    enforcer: Enforcer,
}

impl<E, M> AccessGuard<E, M>
where
    E: ContextExtractor,
    M: MetadataProvider,
{
    /// Create a guard.
    pub fn new(extractor: E, metadata: M, enforcer: Enforcer) -> Self {
        Self {
            extractor,
            metadata,
            enforcer,
        }
    }

    /// Admit or reject a request for `operation`.
    ///
    /// Checks run in order: caller identity, operation lookup, then every
    /// required permission. The first denied permission is reported.
    ///
    /// # Returns
    ///
    /// The caller, once every required permission is allowed.
    pub fn check_operation(&self, request: &E::Request, operation: &str) -> AuthResult<Caller> {
        let caller = self.extractor.extract_caller(request).map_err(|e| {
            tracing::debug!(operation, error_code = e.error_code(), error = %e, "Caller not identified");
            e
        })?;

        let required = self.metadata.required_permissions(operation).ok_or_else(|| {
            tracing::error!(operation, "Guarded operation has no registered permissions");
            AuthError::UnknownOperation(operation.to_string())
        })?;

        self.check_permissions(&caller, required)?;

        tracing::debug!(
            operation,
            subject = %caller.subject,
            domain = %caller.domain,
            permissions = required.len(),
            "Operation permitted"
        );
        Ok(caller)
    }

    /// Check that `caller` holds every permission in `required`.
    pub fn check_permissions(&self, caller: &Caller, required: &[Permission]) -> AuthResult<()> {
        for permission in required {
            let decision = self.enforcer.enforce(
                &caller.subject,
                &caller.domain,
                &permission.resource,
                &permission.action,
            );
            if decision == Decision::Deny {
                tracing::info!(
                    subject = %caller.subject,
                    domain = %caller.domain,
                    permission = %permission,
                    "Permission denied"
                );
                return Err(AuthError::Forbidden {
                    permission: permission.clone(),
                });
            }
        }
        Ok(())
    }

    /// Decide a request without the reason.
    pub fn decide(&self, request: &E::Request, operation: &str) -> Decision {
        match self.check_operation(request, operation) {
            Ok(_) => Decision::Allow,
            Err(_) => Decision::Deny,
        }
    }

    /// The enforcer decisions are made with.
    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }
}
