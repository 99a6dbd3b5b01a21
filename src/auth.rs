use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::{
    AppState,
    config::AppConfig,
    error::ApiError,
    models::{Identity, RecordId},
    repository::{StoreError, USERNAME_TAKEN},
    schema::{FieldRule, Schema},
    validation::{Candidate, validate},
};

/// Claims
///
/// The payload signed into every bearer token. The role is embedded so role-gated routes can
/// decide without a store round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: RecordId,
    pub username: String,
    pub role: String,
    /// Issued At (iat), seconds since the epoch.
    pub iat: i64,
    /// Expiration Time (exp). Checked on every decode.
    pub exp: i64,
}

impl Claims {
    pub fn new(identity: &Identity, expiry_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            id: identity.id,
            username: identity.username.clone(),
            role: identity.role.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or malformed authorization header")]
    MissingOrMalformed,
    #[error("invalid or expired token")]
    InvalidOrExpired,
    #[error("insufficient role")]
    Forbidden,
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Token signing or password hashing failed internally.
    #[error("{0}")]
    Signing(String),
}

pub const ADMIN_ROLE: &str = "admin";
pub const DEFAULT_ROLE: &str = "regular";
const ROLES: &[&str] = &[ADMIN_ROLE, DEFAULT_ROLE];

// --- Token Issue & Verification ---

pub fn issue_token(identity: &Identity, config: &AppConfig) -> Result<String, AuthError> {
    let claims = Claims::new(identity, config.jwt_expiry_secs);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AuthError::Signing(e.to_string()))
}

/// authenticate
///
/// Resolves the raw `Authorization` header value into an identity. The header must read
/// `Bearer <token>`; the token must carry a valid signature and an unexpired `exp`.
pub fn authenticate(header: Option<&str>, config: &AppConfig) -> Result<Identity, AuthError> {
    let token = header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingOrMalformed)?;

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let claims = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| {
            tracing::debug!("token rejected: {:?}", e.kind());
            AuthError::InvalidOrExpired
        })?
        .claims;

    Ok(Identity {
        id: claims.id,
        username: claims.username,
        role: claims.role,
    })
}

/// Second, independent gate after authentication. Role names compare case-insensitively.
pub fn require_role(identity: &Identity, role: &str) -> Result<(), AuthError> {
    if identity.role.eq_ignore_ascii_case(role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

// --- Access Policy & Guard Middleware ---

/// Access
///
/// Who may call a group of routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Role(&'static str),
}

impl Access {
    /// Runs both gates for a raw header value. `Public` never looks at the header.
    pub fn authorize(&self, header: Option<&str>, config: &AppConfig) -> Result<Option<Identity>, AuthError> {
        match self {
            Access::Public => Ok(None),
            Access::Authenticated => authenticate(header, config).map(Some),
            Access::Role(role) => {
                let identity = authenticate(header, config)?;
                require_role(&identity, role)?;
                Ok(Some(identity))
            }
        }
    }
}

/// AccessGuard
///
/// State for [`enforce_access`]: the policy of the routes it wraps plus the config holding the
/// token secret.
#[derive(Clone)]
pub struct AccessGuard {
    pub access: Access,
    pub config: AppConfig,
}

/// enforce_access
///
/// Route-level middleware. On success the resolved [`Identity`] is inserted into the request
/// extensions (for handlers that stamp ownership); on failure the request never reaches the
/// handler and the caller gets 401 or 403.
pub async fn enforce_access(
    State(guard): State<AccessGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if let Some(identity) = guard.access.authorize(header, &guard.config)? {
        tracing::debug!(user = %identity.username, "request authorized");
        request.extensions_mut().insert(identity);
    }
    Ok(next.run(request).await)
}

/// AuthUser Extractor
///
/// The resolved identity of an authenticated request, usable as a handler argument. If the
/// guard middleware already ran, its identity is reused; otherwise the bearer token is
/// verified here. Rejects with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(AuthUser(identity.clone()));
        }

        let config = AppConfig::from_ref(state);
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        Ok(AuthUser(authenticate(header, &config)?))
    }
}

// --- Password Hashing ---

/// Both directions run on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Signing(e.to_string()))?
        .map_err(|e| AuthError::Signing(e.to_string()))
}

pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

/// Hash checked against when the username does not exist, created once per process at the
/// configured cost.
async fn dummy_hash(cost: u32) -> Result<&'static str, AuthError> {
    static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();
    DUMMY_HASH
        .get_or_try_init(|| hash_password("not-a-real-password".to_string(), cost))
        .await
        .map(String::as_str)
}

// --- Signup & Login ---

fn signup_schema() -> Schema {
    Schema::new(vec![
        FieldRule::string("username").required().length(3, 30),
        FieldRule::string("password").required().min_length(6),
        FieldRule::string("role").one_of(ROLES),
    ])
}

fn login_schema() -> Schema {
    Schema::new(vec![
        FieldRule::string("username").required(),
        FieldRule::string("password").required(),
    ])
}

fn required_str(candidate: &Candidate, field: &str) -> Result<String, ApiError> {
    candidate
        .get_str(field)
        .map(str::to_string)
        .ok_or_else(|| ApiError::InvalidInput(format!("\"{}\" is required", field)))
}

/// signup
///
/// Validates the payload, hashes the password and stores the credential. A requested role is
/// only honoured when the deployment allows role signup.
pub async fn signup(state: &AppState, body: &Map<String, Value>) -> Result<Identity, ApiError> {
    let candidate = validate(body, &signup_schema()).map_err(|e| ApiError::InvalidInput(e.0))?;
    let username = required_str(&candidate, "username")?;
    let password = required_str(&candidate, "password")?;
    let role = candidate
        .get_str("role")
        .filter(|_| state.config.allow_role_signup)
        .unwrap_or(DEFAULT_ROLE)
        .to_string();

    create_account(state, &username, password, &role).await
}

/// Hashes and stores one credential; the duplicate-username case surfaces as 409.
pub async fn create_account(
    state: &AppState,
    username: &str,
    password: String,
    role: &str,
) -> Result<Identity, ApiError> {
    let password_hash = hash_password(password, state.config.bcrypt_cost).await?;
    let credential = state
        .credentials
        .create_credential(username, &password_hash, role)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::Conflict(USERNAME_TAKEN.to_string()),
            other => other.into(),
        })?;

    tracing::info!(user = %credential.username, role = %credential.role, "account created");
    Ok(credential.identity())
}

/// login
///
/// Looks the username up and checks the password against the stored hash. Both an unknown
/// user and a wrong password yield the same `InvalidCredentials`.
pub async fn login(state: &AppState, body: &Map<String, Value>) -> Result<(String, Identity), ApiError> {
    let candidate = validate(body, &login_schema()).map_err(|e| ApiError::InvalidInput(e.0))?;
    let username = required_str(&candidate, "username")?;
    let password = required_str(&candidate, "password")?;

    let Some(credential) = state.credentials.find_credential(&username).await? else {
        // Unknown usernames still pay for one bcrypt verification.
        let hash = dummy_hash(state.config.bcrypt_cost).await?;
        verify_password(password, hash.to_string()).await;
        tracing::info!(user = %username, "login rejected");
        return Err(AuthError::InvalidCredentials.into());
    };

    if !verify_password(password, credential.password_hash.clone()).await {
        tracing::info!(user = %username, "login rejected");
        return Err(AuthError::InvalidCredentials.into());
    }

    let identity = credential.identity();
    let token = issue_token(&identity, &state.config)?;
    Ok((token, identity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dummy_hash_is_a_real_bcrypt_hash() {
        let hash = dummy_hash(4).await.unwrap();
        assert!(hash.starts_with("$2"));
        // A well-formed hash means the unknown-user path runs a full verification.
        assert!(!bcrypt::verify("secret1", hash).unwrap());
        assert!(bcrypt::verify("not-a-real-password", hash).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected_like_a_wrong_password() {
        let state = AppState::in_memory(AppConfig::default());
        let mut body = Map::new();
        body.insert("username".into(), Value::from("ghost"));
        body.insert("password".into(), Value::from("secret1"));

        let err = login(&state, &body).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "invalid credentials"));
    }
}
