//! Component repository, resolution and extraction errors

use super::BootstrapError;

/// Creates a component not found error
pub fn not_found(name: impl Into<String>) -> BootstrapError {
    BootstrapError::ComponentNotFound { name: name.into() }
}

/// Creates a no matching version error
pub fn version_not_found(
    component: impl Into<String>,
    constraint: impl Into<String>,
) -> BootstrapError {
    BootstrapError::VersionNotFound {
        component: component.into(),
        constraint: constraint.into(),
    }
}

/// Creates an invalid constraint error
pub fn invalid_constraint(
    constraint: impl Into<String>,
    reason: impl Into<String>,
) -> BootstrapError {
    BootstrapError::InvalidConstraint {
        constraint: constraint.into(),
        reason: reason.into(),
    }
}

/// Creates a malformed version error
pub fn malformed_version(version: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::MalformedVersion {
        version: version.into(),
        reason: reason.into(),
    }
}

/// Creates a repository read failure
pub fn repository_read_failed(
    path: impl Into<String>,
    reason: impl Into<String>,
) -> BootstrapError {
    BootstrapError::RepositoryReadFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates a missing required resource error
pub fn missing_required(
    component: impl Into<String>,
    version: impl Into<String>,
    missing: impl Into<String>,
) -> BootstrapError {
    BootstrapError::MissingRequiredResource {
        component: component.into(),
        version: version.into(),
        missing: missing.into(),
    }
}

/// Creates a malformed image reference error
pub fn malformed_image_reference(
    reference: impl Into<String>,
    reason: impl Into<String>,
) -> BootstrapError {
    BootstrapError::MalformedImageReference {
        reference: reference.into(),
        reason: reason.into(),
    }
}

/// Creates a resource access error
pub fn access_failed(resource: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::ResourceAccessFailed {
        resource: resource.into(),
        reason: reason.into(),
    }
}
