//! Error types and handling for mpas bootstrap
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`component`]: Component repository, resolution and extraction errors
//! - [`manifest`]: Manifest generation errors
//! - [`git`]: Git working copy errors
//! - [`cluster`]: Cluster apply and query errors
//! - [`config`]: Configuration errors
//! - [`health`]: Aggregated health check failures

pub mod cluster;
pub mod component;
pub mod config;
pub mod git;
pub mod health;
pub mod manifest;

pub use health::{HealthCheck, HealthErrors, HealthIssue};

use miette::Diagnostic;
use thiserror::Error;

/// Coarse classification of a failure, used to decide retry and reporting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad constraint, malformed version or image reference, invalid configuration
    InvalidInput,
    /// Missing component, version or required resource
    NotFound,
    /// A single clone attempt failed; eligible for one retry
    TransientInfra,
    /// Commit, push, apply, render or I/O failure
    FatalInfra,
    /// Health checks did not converge before the timeout
    HealthTimeout,
    /// The run was cancelled by the caller
    Cancelled,
}

/// Main error type for bootstrap operations
#[derive(Error, Diagnostic, Debug)]
pub enum BootstrapError {
    // Component repository errors
    #[error("Component '{name}' not found in repository")]
    #[diagnostic(
        code(mpas::component::not_found),
        help("Check the component name and the registry the bootstrap reads from")
    )]
    ComponentNotFound { name: String },

    #[error("No version of '{component}' matches constraint '{constraint}'")]
    #[diagnostic(code(mpas::component::version_not_found))]
    VersionNotFound {
        component: String,
        constraint: String,
    },

    #[error("Invalid version constraint '{constraint}': {reason}")]
    #[diagnostic(
        code(mpas::component::invalid_constraint),
        help("Use semantic version constraints such as '>=2.0.0', '~1.2' or 'v0.1.x'")
    )]
    InvalidConstraint { constraint: String, reason: String },

    #[error("Malformed version '{version}': {reason}")]
    #[diagnostic(code(mpas::component::malformed_version))]
    MalformedVersion { version: String, reason: String },

    #[error("Failed to read component repository at '{path}': {reason}")]
    #[diagnostic(code(mpas::component::repository_read_failed))]
    RepositoryReadFailed { path: String, reason: String },

    #[error("Failed to parse component descriptor '{path}': {reason}")]
    #[diagnostic(code(mpas::component::descriptor_parse_failed))]
    DescriptorParseFailed { path: String, reason: String },

    // Resource errors
    #[error("Component '{component}' version '{version}' is missing required resource(s): {missing}")]
    #[diagnostic(
        code(mpas::resource::missing_required),
        help("A bootstrap component must bundle its manifest resource and an 'ocm-config' resource")
    )]
    MissingRequiredResource {
        component: String,
        version: String,
        missing: String,
    },

    #[error("Malformed image reference '{reference}': {reason}")]
    #[diagnostic(
        code(mpas::resource::malformed_image_reference),
        help("Image references must look like 'registry/name:tag'")
    )]
    MalformedImageReference { reference: String, reason: String },

    #[error("Failed to read resource '{resource}': {reason}")]
    #[diagnostic(code(mpas::resource::access_failed))]
    ResourceAccessFailed { resource: String, reason: String },

    // Manifest errors
    #[error("Failed to decode config data: {reason}")]
    #[diagnostic(code(mpas::manifest::config_data_invalid))]
    ConfigDataInvalid { reason: String },

    #[error("Localization rule for resource '{resource}' has no matching image resource")]
    #[diagnostic(
        code(mpas::manifest::unresolved_localization),
        help("Add the image resource to the component or set 'allow_unresolved_localizations: true'")
    )]
    UnresolvedLocalization { resource: String },

    #[error("Failed to serialize {what}: {reason}")]
    #[diagnostic(code(mpas::manifest::serialization_failed))]
    SerializationFailed { what: String, reason: String },

    #[error("kustomize build failed in '{dir}': {reason}")]
    #[diagnostic(code(mpas::manifest::render_failed))]
    RenderFailed { dir: String, reason: String },

    // Git errors
    #[error("No git repository at '{path}'")]
    #[diagnostic(code(mpas::git::no_repository))]
    NoGitRepository { path: String },

    #[error("Git operation failed: {message}")]
    #[diagnostic(code(mpas::git::operation_failed))]
    GitOperationFailed { message: String },

    #[error("Clone attempt of {url} failed: {reason}")]
    #[diagnostic(code(mpas::git::clone_attempt_failed))]
    CloneAttemptFailed { url: String, reason: String },

    #[error("Failed to clone repository {url} after {attempts} attempt(s)")]
    #[diagnostic(
        code(mpas::git::clone_failed),
        help("Check that the URL is correct and the token grants access to the repository")
    )]
    CloneFailed {
        url: String,
        attempts: usize,
        #[source]
        source: Box<BootstrapError>,
    },

    #[error("Failed to clean directory '{path}': {reason}")]
    #[diagnostic(code(mpas::git::clean_failed))]
    CleanFailed { path: String, reason: String },

    #[error("Failed to commit '{path}': {reason}")]
    #[diagnostic(code(mpas::git::commit_failed))]
    CommitFailed { path: String, reason: String },

    #[error("Failed to push manifests: {reason}")]
    #[diagnostic(code(mpas::git::push_failed))]
    PushFailed { reason: String },

    // Cluster errors
    #[error("Failed to apply {target}: {reason}")]
    #[diagnostic(code(mpas::cluster::apply_failed))]
    ApplyFailed { target: String, reason: String },

    #[error("Cluster query failed: {reason}")]
    #[diagnostic(code(mpas::cluster::query_failed))]
    ClusterQueryFailed { reason: String },

    #[error("Failed to run '{program}': {reason}")]
    #[diagnostic(
        code(mpas::command::failed),
        help("Make sure the program is installed and on PATH")
    )]
    CommandFailed { program: String, reason: String },

    // Health errors
    #[error("failed to report health, please try again later:\n{issues}")]
    #[diagnostic(code(mpas::health::timeout))]
    HealthCheckTimeout { issues: HealthErrors },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    #[diagnostic(code(mpas::config::not_found))]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration file: {path}: {reason}")]
    #[diagnostic(code(mpas::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(mpas::config::invalid))]
    ConfigInvalid { message: String },

    #[error("Unknown component '{name}'")]
    #[diagnostic(
        code(mpas::config::unknown_component),
        help("Registered components: flux, ocm-controller")
    )]
    UnknownComponent { name: String },

    // File system errors
    #[error("Failed to write file: {path}: {reason}")]
    #[diagnostic(code(mpas::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(mpas::fs::io_error))]
    IoError { message: String },

    #[error("Operation cancelled")]
    #[diagnostic(code(mpas::cancelled))]
    Cancelled,

    #[error("{operation}")]
    #[diagnostic(code(mpas::context))]
    Context {
        operation: String,
        #[source]
        source: Box<BootstrapError>,
    },
}

impl BootstrapError {
    /// Innermost error, looking through context frames
    pub fn root(&self) -> &BootstrapError {
        let mut current = self;
        while let BootstrapError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Classification of the innermost error
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            BootstrapError::InvalidConstraint { .. }
            | BootstrapError::MalformedVersion { .. }
            | BootstrapError::MalformedImageReference { .. }
            | BootstrapError::ConfigDataInvalid { .. }
            | BootstrapError::UnresolvedLocalization { .. }
            | BootstrapError::ConfigParseFailed { .. }
            | BootstrapError::ConfigInvalid { .. }
            | BootstrapError::UnknownComponent { .. }
            | BootstrapError::DescriptorParseFailed { .. } => ErrorKind::InvalidInput,
            BootstrapError::ComponentNotFound { .. }
            | BootstrapError::VersionNotFound { .. }
            | BootstrapError::MissingRequiredResource { .. }
            | BootstrapError::ConfigNotFound { .. }
            | BootstrapError::NoGitRepository { .. } => ErrorKind::NotFound,
            BootstrapError::CloneAttemptFailed { .. } => ErrorKind::TransientInfra,
            BootstrapError::HealthCheckTimeout { .. } => ErrorKind::HealthTimeout,
            BootstrapError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::FatalInfra,
        }
    }

    /// Whether this error means the working copy holds no repository yet
    pub fn is_no_repository(&self) -> bool {
        matches!(self.root(), BootstrapError::NoGitRepository { .. })
    }

    /// Wrap this error in a context frame naming the failed operation
    pub fn context(self, operation: impl Into<String>) -> Self {
        BootstrapError::Context {
            operation: operation.into(),
            source: Box::new(self),
        }
    }
}

/// Adds operation context to fallible results
pub trait ResultExt<T> {
    /// Wrap the error with a fixed operation description
    fn context(self, operation: impl Into<String>) -> Result<T>;

    /// Wrap the error with a lazily built operation description
    fn with_context<F>(self, operation: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, operation: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(operation))
    }

    fn with_context<F>(self, operation: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(operation()))
    }
}

impl From<std::io::Error> for BootstrapError {
    fn from(err: std::io::Error) -> Self {
        BootstrapError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for BootstrapError {
    fn from(err: serde_yaml::Error) -> Self {
        BootstrapError::SerializationFailed {
            what: "YAML".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BootstrapError {
    fn from(err: serde_json::Error) -> Self {
        BootstrapError::SerializationFailed {
            what: "JSON".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<git2::Error> for BootstrapError {
    fn from(err: git2::Error) -> Self {
        BootstrapError::GitOperationFailed {
            message: err.message().to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, BootstrapError>;
