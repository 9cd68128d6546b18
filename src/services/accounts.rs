//! User registration and bearer-token identity.
//!
//! Tokens are shown exactly once, when an account is created; only their
//! SHA-256 digest is stored.

use diesel::PgConnection;
use diesel::prelude::*;
use log::info;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::db::enums::Role;
use crate::db::models::{NewUser, NewUserProfile, User, UserProfile};
use crate::error::{Error, Result};
use crate::schema;

pub const TOKEN_LEN: usize = 40;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAccount {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// A freshly created user, their profile and the plaintext token.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: User,
    pub profile: UserProfile,
    pub token: String,
}

pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Create the user and their default profile in one transaction.
pub fn register_user(conn: &mut PgConnection, account: &NewAccount, token: Option<String>) -> Result<Registration> {
    use schema::user_profiles::dsl as P;
    use schema::users::dsl as U;

    let username = account.username.trim();
    if username.is_empty() {
        return Err(Error::Validation("username must not be blank".to_string()));
    }
    let token = token.unwrap_or_else(generate_token);
    let new_user = NewUser {
        username: username.to_string(),
        email: account.email.clone().unwrap_or_default(),
        first_name: account.first_name.clone().unwrap_or_default(),
        last_name: account.last_name.clone().unwrap_or_default(),
        token_hash: hash_token(&token),
    };

    conn.transaction::<_, Error, _>(|conn| {
        let user = diesel::insert_into(U::users)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(conn)?;
        let profile = diesel::insert_into(P::user_profiles)
            .values(&NewUserProfile {
                user_id: user.id,
                role: account.role,
            })
            .returning(UserProfile::as_returning())
            .get_result(conn)?;
        Ok(Registration { user, profile, token })
    })
}

/// Resolve a bearer token to an active user and their profile.
pub fn authenticate(conn: &mut PgConnection, token: &str) -> Result<Option<(User, UserProfile)>> {
    use schema::user_profiles::dsl as P;
    use schema::users::dsl as U;

    Ok(U::users
        .inner_join(P::user_profiles)
        .filter(U::token_hash.eq(hash_token(token)))
        .filter(U::is_active.eq(true))
        .select((User::as_select(), UserProfile::as_select()))
        .first(conn)
        .optional()?)
}

/// Create an admin account when the user table is empty.
///
/// Returns the registration only when an account was created.
pub fn ensure_admin(conn: &mut PgConnection, username: &str, token: Option<String>) -> Result<Option<Registration>> {
    use schema::users::dsl as U;

    let existing: i64 = U::users.count().get_result(conn)?;
    if existing > 0 {
        return Ok(None);
    }

    let account = NewAccount {
        username: username.to_string(),
        email: None,
        first_name: Some("Admin".to_string()),
        last_name: Some("User".to_string()),
        role: Role::Admin,
    };
    let registration = register_user(conn, &account, token)?;
    info!(
        "Bootstrapped admin account '{}' (id {})",
        registration.user.username, registration.user.id
    );
    Ok(Some(registration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_alphanumeric_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_hash_is_stable_sha256_hex() {
        let digest = hash_token("abc");
        assert_eq!(digest, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(hash_token("abc"), digest);
        assert_ne!(hash_token("abd"), digest);
    }

    #[test]
    fn new_account_defaults_to_monitor() {
        let account: NewAccount = serde_json::from_str(r#"{"username": "emily"}"#).unwrap();
        assert_eq!(account.role, Role::Monitor);
        assert!(account.validate().is_ok());

        let bad: NewAccount = serde_json::from_str(r#"{"username": "x", "email": "nope"}"#).unwrap();
        assert!(bad.validate().is_err());
    }
}
