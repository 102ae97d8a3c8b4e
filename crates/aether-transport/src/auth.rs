//! Repository authentication, applied preemptively to every request per
//! the credentials resolved for that repository (§4.D.1: "preemptive vs
//! challenge-driven auth" — this transport only implements preemptive,
//! since the credentials are known up front from session config).

use reqwest::RequestBuilder;

/// Resolved credentials for a single repository.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none() && self.token.is_none()
    }
}

/// Apply authentication to a request if credentials are present. A bare
/// token with no username is sent as a bearer token; a username implies
/// HTTP basic auth.
pub fn apply_auth(request: RequestBuilder, creds: &Credentials) -> RequestBuilder {
    match (&creds.username, &creds.password, &creds.token) {
        (Some(user), Some(pass), _) => request.basic_auth(user, Some(pass)),
        (Some(user), None, _) => request.basic_auth(user, None::<&str>),
        (None, _, Some(token)) => request.bearer_auth(token),
        (None, _, None) => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_credentials_detected() {
        assert!(Credentials::default().is_empty());
        let creds = Credentials {
            token: Some("x".into()),
            ..Default::default()
        };
        assert!(!creds.is_empty());
    }
}
