use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Records ---

/// Sequential integer identifier shared by every resource (max existing id + 1).
pub type RecordId = i64;

/// Record
///
/// One persisted domain entity (movie, student, recipe). The `id` is assigned by the store
/// at creation and never changes; everything else lives in `fields` and is serialized flat,
/// so a movie reads `{"id": 1, "title": "Dune", "director": "...", "year": 2021}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: RecordId, fields: Map<String, Value>) -> Self {
        Self { id, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Credential
///
/// Stored login material. Only the bcrypt hash is ever kept, never the plaintext password.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Credential {
    pub id: RecordId,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

impl Credential {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
            role: self.role.clone(),
        }
    }
}

/// Identity
///
/// The authenticated caller, decoded from a verified token. Lives in the request
/// extensions for the lifetime of one request and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    pub id: RecordId,
    pub username: String,
    pub role: String,
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Documentation shape of `POST /auth/signup`. The handler reads the body as raw JSON and runs
/// it through the validator, so this struct only feeds the OpenAPI and TypeScript exports.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// --- Responses (Output Schemas) ---

/// TokenResponse
///
/// Returned by `POST /auth/login`. The token is valid for one hour by default.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
    pub user: Identity,
}

/// ErrorBody
///
/// The uniform error envelope: `{"error": "Movie not found"}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}
