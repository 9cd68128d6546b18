//! Bearer-token authentication for API handlers.

use crate::api::AppState;
use crate::db::enums::Role;
use crate::db::models::{User, UserProfile};
use crate::error::{Error, Result};
use crate::services::accounts;
use crate::services::activity::Origin;
use axum::extract::{ConnectInfo, FromRequestParts};
use http::HeaderMap;
use http::header::AUTHORIZATION;
use http::request::Parts;
use std::net::SocketAddr;

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub profile: UserProfile,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn origin(&self) -> Origin {
        Origin {
            user_id: Some(self.user.id),
            ip_address: self.ip_address.clone(),
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.role() == Role::Admin {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("{} role cannot perform this action", self.role())))
        }
    }

    pub fn require_settings_access(&self) -> Result<()> {
        if self.role().can_manage_settings() {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("{} role cannot change settings", self.role())))
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers).ok_or(Error::Unauthorized)?.to_string();
        let ip_address = client_address(parts);

        let (user, profile) = state
            .with_conn(move |conn| accounts::authenticate(conn, &token))
            .await?
            .ok_or(Error::Unauthorized)?;

        Ok(Actor {
            user,
            profile,
            ip_address,
        })
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// First `X-Forwarded-For` hop when present, otherwise the peer address.
fn client_address(parts: &Parts) -> Option<String> {
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| v.parse::<std::net::IpAddr>().is_ok());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Request};

    #[test]
    fn parses_bearer_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn client_address_prefers_forwarded_header() {
        let (mut parts, _) = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap()
            .into_parts();
        parts
            .extensions
            .insert(ConnectInfo("127.0.0.1:5000".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_address(&parts).as_deref(), Some("203.0.113.7"));

        parts.headers.remove("x-forwarded-for");
        assert_eq!(client_address(&parts).as_deref(), Some("127.0.0.1"));
    }
}
