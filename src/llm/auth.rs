//! Authentication for the Anthropic API
//!
//! Two credential forms are recognized, checked in this order:
//! - `ANTHROPIC_API_KEY` - API billing, sent as `x-api-key`
//! - `CLAUDE_CODE_OAUTH_TOKEN` - subscription billing, sent as a bearer token
//!
//! [`check_auth`] is the gate every conversation passes before the agent
//! backend is contacted.

use reqwest::RequestBuilder;
use thiserror::Error;

/// Environment variable holding an API key
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Environment variable holding an OAuth token from `claude setup-token`
pub const OAUTH_TOKEN_VAR: &str = "CLAUDE_CODE_OAUTH_TOKEN";

/// Beta header value required for OAuth bearer tokens
const OAUTH_BETA: &str = "oauth-2025-04-20";

/// Looks up an environment variable by name.
///
/// Injected so tests can run the gate against a fake environment.
pub type EnvLookup = fn(&str) -> Option<String>;

/// Reads from the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Neither credential form is present
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "No authentication found. Either:\n  \
     - Set ANTHROPIC_API_KEY for API billing, or\n  \
     - Run 'claude setup-token' and set CLAUDE_CODE_OAUTH_TOKEN for subscription billing"
)]
pub struct AuthError;

/// Credentials for API requests
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// API key (`x-api-key` header)
    ApiKey(String),
    /// OAuth access token (`Authorization: Bearer` header)
    OAuthToken(String),
}

impl Credential {
    /// Attach the credential headers to a request
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::ApiKey(key) => request.header("x-api-key", key),
            Credential::OAuthToken(token) => request
                .bearer_auth(token)
                .header("anthropic-beta", OAUTH_BETA),
        }
    }

    /// Short label for logs (never the secret itself)
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::ApiKey(_) => "api-key",
            Credential::OAuthToken(_) => "oauth-token",
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({})", self.kind())
    }
}

/// Check the process environment for credentials
pub fn check_auth() -> Result<Credential, AuthError> {
    check_auth_with(process_env)
}

/// Check credentials using the given environment lookup
pub fn check_auth_with(env: EnvLookup) -> Result<Credential, AuthError> {
    let present = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = present(API_KEY_VAR) {
        return Ok(Credential::ApiKey(key));
    }
    if let Some(token) = present(OAUTH_TOKEN_VAR) {
        return Ok(Credential::OAuthToken(token));
    }

    tracing::warn!("[Auth] No credentials found in environment");
    Err(AuthError)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_env(_: &str) -> Option<String> {
        None
    }

    fn oauth_only(name: &str) -> Option<String> {
        (name == OAUTH_TOKEN_VAR).then(|| "sk-ant-oat01-test".to_string())
    }

    fn both(name: &str) -> Option<String> {
        match name {
            API_KEY_VAR => Some("sk-ant-api03-test".to_string()),
            OAUTH_TOKEN_VAR => Some("sk-ant-oat01-test".to_string()),
            _ => None,
        }
    }

    fn blank_key(name: &str) -> Option<String> {
        (name == API_KEY_VAR).then(|| "   ".to_string())
    }

    #[test]
    fn test_missing_credentials() {
        assert_eq!(check_auth_with(empty_env), Err(AuthError));
        assert_eq!(check_auth_with(blank_key), Err(AuthError));
    }

    #[test]
    fn test_api_key_preferred() {
        let cred = check_auth_with(both).unwrap();
        assert_eq!(cred, Credential::ApiKey("sk-ant-api03-test".into()));
    }

    #[test]
    fn test_oauth_token() {
        let cred = check_auth_with(oauth_only).unwrap();
        assert_eq!(cred.kind(), "oauth-token");
        assert!(!format!("{:?}", cred).contains("sk-ant"));
    }

    #[test]
    fn test_remediation_text() {
        let msg = AuthError.to_string();
        assert!(msg.contains("ANTHROPIC_API_KEY"));
        assert!(msg.contains("CLAUDE_CODE_OAUTH_TOKEN"));
        assert!(msg.contains("claude setup-token"));
    }
}
