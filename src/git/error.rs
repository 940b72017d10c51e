//! Readable libgit2 errors
//!
//! libgit2 messages are terse and transport specific. [`interpret_git_error`]
//! prefixes them with a category and, where one helps, a hint about the
//! management repository settings.

use git2::{Error, ErrorClass, ErrorCode};

/// What went wrong talking to the management repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GitFailure {
    NotFound,
    Unauthorized,
    Network,
    Tls,
    Rejected,
    Unclassified,
}

impl GitFailure {
    fn classify(err: &Error) -> Self {
        let message = err.message().to_lowercase();
        let has = |needle: &str| message.contains(needle);

        if err.code() == ErrorCode::Auth || has("authentication") || has("credentials") {
            // libgit2 reports a 404 after replaying credentials as an auth loop
            if has("replays") {
                return Self::NotFound;
            }
            return Self::Unauthorized;
        }
        if has("repository not found") || has("404") || has("too many redirects") {
            return Self::NotFound;
        }
        if has("401") || has("403") || has("permission denied") || has("access denied") {
            return Self::Unauthorized;
        }
        if err.class() == ErrorClass::Ssl || has("certificate") || has("ssl") {
            return Self::Tls;
        }
        if err.class() == ErrorClass::Net
            || has("connection")
            || has("timed out")
            || has("could not resolve")
        {
            return Self::Network;
        }
        if has("non-fast-forward") || has("rejected") || err.code() == ErrorCode::NotFastForward {
            return Self::Rejected;
        }
        Self::Unclassified
    }

    fn describe(self) -> Option<(&'static str, Option<&'static str>)> {
        match self {
            Self::NotFound => Some(("Repository not found", Some("check repository.url"))),
            Self::Unauthorized => Some((
                "Authentication failed",
                Some("pass a token with --token or MPAS_GIT_TOKEN"),
            )),
            Self::Network => Some(("Network error", None)),
            Self::Tls => Some(("TLS error", None)),
            Self::Rejected => Some((
                "Push rejected",
                Some("the branch moved on the remote; run the bootstrap again"),
            )),
            Self::Unclassified => None,
        }
    }
}

/// Describe a git2 error, keeping libgit2's own message
pub fn interpret_git_error(err: &Error) -> String {
    match GitFailure::classify(err).describe() {
        Some((category, Some(hint))) => format!("{category}: {} ({hint})", err.message()),
        Some((category, None)) => format!("{category}: {}", err.message()),
        None => err.message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(code: ErrorCode, class: ErrorClass, message: &str) -> Error {
        Error::new(code, class, message)
    }

    #[test]
    fn test_not_found() {
        let msg = interpret_git_error(&error(
            ErrorCode::GenericError,
            ErrorClass::Http,
            "unexpected http status code: 404",
        ));
        assert!(msg.starts_with("Repository not found"));
        assert!(msg.contains("404"));
    }

    #[test]
    fn test_auth_suggests_token() {
        let msg = interpret_git_error(&error(
            ErrorCode::Auth,
            ErrorClass::Http,
            "remote authentication required but no callback set",
        ));
        assert!(msg.starts_with("Authentication failed"));
        assert!(msg.contains("MPAS_GIT_TOKEN"));
    }

    #[test]
    fn test_auth_replay_is_not_found() {
        let msg = interpret_git_error(&error(
            ErrorCode::Auth,
            ErrorClass::Http,
            "too many authentication replays",
        ));
        assert!(msg.starts_with("Repository not found"));
    }

    #[test]
    fn test_network() {
        let msg = interpret_git_error(&error(
            ErrorCode::GenericError,
            ErrorClass::Net,
            "failed to connect: Connection refused",
        ));
        assert!(msg.starts_with("Network error"));
    }

    #[test]
    fn test_push_rejected() {
        let msg = interpret_git_error(&error(
            ErrorCode::NotFastForward,
            ErrorClass::Reference,
            "cannot push non-fastforwardable reference",
        ));
        assert!(msg.starts_with("Push rejected"));
    }

    #[test]
    fn test_unclassified_keeps_message() {
        let msg = interpret_git_error(&error(
            ErrorCode::Locked,
            ErrorClass::Reference,
            "reference is locked",
        ));
        assert_eq!(msg, "reference is locked");
    }
}
