//! Authentication modeled as a single-method capability rather than a class
//! hierarchy: anything that can mutate a request's headers immediately
//! before serialization qualifies. The core never inspects which scheme is
//! in play.

use crate::headers::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub trait Auth: Send + Sync {
    fn apply(&self, headers: &mut HeaderMap);
}

pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl Auth for BasicAuth {
    fn apply(&self, headers: &mut HeaderMap) {
        let credentials = format!("{}:{}", self.username, self.password);
        headers.set("Authorization", format!("Basic {}", STANDARD.encode(credentials.as_bytes())));
    }
}

pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl Auth for BearerAuth {
    fn apply(&self, headers: &mut HeaderMap) {
        headers.set("Authorization", format!("Bearer {}", self.token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_sets_authorization_header() {
        let auth = BasicAuth::new("user", "pass");
        let mut headers = HeaderMap::new();
        auth.apply(&mut headers);
        assert_eq!(headers.get("Authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn bearer_auth_sets_authorization_header() {
        let auth = BearerAuth::new("tok123");
        let mut headers = HeaderMap::new();
        auth.apply(&mut headers);
        assert_eq!(headers.get("Authorization"), Some("Bearer tok123"));
    }
}
