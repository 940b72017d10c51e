//! Manifest generation errors

use super::BootstrapError;

/// Creates a config data decode error
pub fn config_data_invalid(reason: impl Into<String>) -> BootstrapError {
    BootstrapError::ConfigDataInvalid {
        reason: reason.into(),
    }
}

/// Creates an unresolved localization error
pub fn unresolved_localization(resource: impl Into<String>) -> BootstrapError {
    BootstrapError::UnresolvedLocalization {
        resource: resource.into(),
    }
}

/// Creates a serialization error
pub fn serialization_failed(what: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::SerializationFailed {
        what: what.into(),
        reason: reason.into(),
    }
}

/// Creates a render failure
pub fn render_failed(dir: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::RenderFailed {
        dir: dir.into(),
        reason: reason.into(),
    }
}

/// Creates a file write failure
pub fn write_failed(path: impl Into<String>, reason: impl Into<String>) -> BootstrapError {
    BootstrapError::FileWriteFailed {
        path: path.into(),
        reason: reason.into(),
    }
}
