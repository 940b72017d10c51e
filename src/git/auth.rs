//! Git authentication configuration
//!
//! This module handles:
//! - Token authentication for the management repository
//! - Falling back to git's native credential system when no token is set
//!
//! The fallback chain is:
//! - Git credential helpers
//! - Empty or URL-provided usernames, for public repositories

use git2::{Cred, CredentialType, Error, ErrorClass, RemoteCallbacks};

/// Callback invocations before giving up on a remote that keeps rejecting us
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Username and token used for HTTP(S) basic authentication
#[derive(Clone, PartialEq, Eq)]
pub struct GitCredentials {
    pub username: String,
    pub token: String,
}

impl GitCredentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

fn auth_failed(message: &str) -> Error {
    Error::new(git2::ErrorCode::Auth, ErrorClass::Http, message)
}

fn try_default_credentials() -> Option<Cred> {
    for username in &["git", "anonymous"] {
        if let Ok(cred) = Cred::userpass_plaintext(username, "") {
            return Some(cred);
        }
    }
    None
}

fn try_user_pass_credentials(
    url: &str,
    username_from_url: Option<&str>,
) -> std::result::Result<Cred, Error> {
    let config = match git2::Config::open_default() {
        Ok(cfg) => cfg,
        Err(_) => git2::Config::new().map_err(|e| {
            Error::new(
                git2::ErrorCode::GenericError,
                ErrorClass::Config,
                format!("Failed to create default git config: {e}"),
            )
        })?,
    };

    if let Ok(cred) = Cred::credential_helper(&config, url, username_from_url) {
        return Ok(cred);
    }

    if let Some(username) = username_from_url {
        if let Ok(cred) = Cred::userpass_plaintext(username, "") {
            return Ok(cred);
        }
    }

    try_default_credentials().ok_or_else(|| auth_failed("authentication failed"))
}

/// Set up authentication callbacks for git operations
///
/// With `credentials`, username and token are offered for every plaintext
/// challenge. Without them, git's native credential system is used.
pub fn setup_auth_callbacks(
    callbacks: &mut RemoteCallbacks<'_>,
    credentials: Option<&GitCredentials>,
) {
    let credentials = credentials.cloned();
    let mut attempts = 0;

    callbacks.credentials(move |url, username_from_url, allowed_types| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(auth_failed("authentication failed: credentials rejected"));
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(creds) = &credentials {
                return Cred::userpass_plaintext(&creds.username, &creds.token);
            }
            return try_user_pass_credentials(url, username_from_url);
        }

        if allowed_types.contains(CredentialType::DEFAULT) {
            return Cred::default();
        }

        Err(auth_failed("authentication failed: unsupported credential type"))
    });
}
