//! HTTP Basic authentication for MCP endpoints.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine};

/// Value of the `WWW-Authenticate` header sent with 401 responses.
pub const WWW_AUTHENTICATE_VALUE: &str = "Basic realm=\"mcp-server\"";

/// Credentials accepted for services that require authentication.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub username: Option<String>,
    /// bcrypt hash of the password
    pub password_hash: Option<String>,
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password_hash: Some(password_hash.into()),
        }
    }

    /// Check if credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password_hash.is_some()
    }

    /// Verify username and password against configured credentials
    pub fn verify_credentials(&self, username: &str, password: &str) -> bool {
        let (Some(expected_user), Some(hash)) = (&self.username, &self.password_hash) else {
            return false;
        };

        if username != expected_user {
            return false;
        }

        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// Verify the `Authorization: Basic ...` header of a request.
    ///
    /// Without configured credentials every request is rejected.
    pub fn verify_headers(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic_auth)
            .map(|(user, password)| self.verify_credentials(&user, &password))
            .unwrap_or(false)
    }
}

/// Decode a `Basic <base64(user:password)>` header value.
pub fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Helper function to generate password hash for setup
/// Usage: mcpgate hash-password <password>
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn basic(user: &str, password: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode(format!("{}:{}", user, password));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_password_hashing() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(bcrypt::verify(password, &hash).unwrap());
        assert!(!bcrypt::verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_parse_basic_auth() {
        assert_eq!(
            parse_basic_auth("Basic YWxpY2U6czNjcjN0"),
            Some(("alice".to_string(), "s3cr3t".to_string()))
        );
        // Passwords may contain colons
        assert_eq!(
            parse_basic_auth(&format!("basic {}", STANDARD.encode("bob:a:b"))),
            Some(("bob".to_string(), "a:b".to_string()))
        );
        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
    }

    #[test]
    fn test_verify_headers() {
        let config = AuthConfig::new("alice", hash_password("s3cr3t").unwrap());

        assert!(config.verify_headers(&basic("alice", "s3cr3t")));
        assert!(!config.verify_headers(&basic("alice", "nope")));
        assert!(!config.verify_headers(&basic("mallory", "s3cr3t")));
        assert!(!config.verify_headers(&HeaderMap::new()));
    }

    #[test]
    fn test_no_credentials_rejects_everything() {
        let config = AuthConfig::default();
        assert!(!config.has_credentials());
        assert!(!config.verify_headers(&basic("", "")));
    }
}
