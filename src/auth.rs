//! Admin authentication: argon2 credential check plus a short-lived JWT kept
//! in an httpOnly cookie.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::warn;

use crate::{errors::ServiceError, AppState};

pub const ADMIN_SESSION_COOKIE: &str = "atelier_admin";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct AuthService {
    admin_username: String,
    admin_password_hash: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl_secs: u64,
}

impl AuthService {
    pub fn new(
        admin_username: String,
        admin_password_hash: String,
        session_secret: &str,
        session_ttl_secs: u64,
    ) -> Self {
        Self {
            admin_username,
            admin_password_hash,
            encoding_key: EncodingKey::from_secret(session_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(session_secret.as_bytes()),
            session_ttl_secs,
        }
    }

    /// Checks the submitted credentials against the configured admin account.
    /// The same error comes back for a wrong username and a wrong password.
    pub fn verify_credentials(&self, username: &str, password: &str) -> Result<(), ServiceError> {
        let unauthorized =
            || ServiceError::Unauthorized("Invalid username or password".to_string());
        if username != self.admin_username {
            // Still run the hash check so both failure paths cost the same.
            let _ = self.verify_password(password);
            return Err(unauthorized());
        }
        if !self.verify_password(password) {
            return Err(unauthorized());
        }
        Ok(())
    }

    fn verify_password(&self, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.admin_password_hash) else {
            warn!("admin_password_hash is not a valid PHC string");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    pub fn create_session_token(&self) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: self.admin_username.clone(),
            iat: now,
            exp: now + self.session_ttl_secs as i64,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::InternalError(format!("token creation: {e}")))
    }

    pub fn verify_session_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ServiceError::Unauthorized("Session expired or invalid".to_string()))
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((ADMIN_SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(self.session_ttl_secs as i64))
            .build()
    }

    pub fn clear_session_cookie(&self) -> Cookie<'static> {
        Cookie::build((ADMIN_SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .max_age(Duration::ZERO)
            .build()
    }
}

/// Gate for `/api/admin/*` routes. Anything without a valid session cookie
/// gets the uniform 401 JSON body.
pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let token = jar
        .get(ADMIN_SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());
    match token {
        Some(token) if state.auth.verify_session_token(&token).is_ok() => {
            next.run(request).await
        }
        _ => ServiceError::Unauthorized("Admin session required".to_string()).into_response(),
    }
}
