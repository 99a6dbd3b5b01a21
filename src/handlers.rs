use crate::{
    AppState, auth,
    auth::AuthUser,
    collection::{Collection, Removal},
    error::ApiError,
    models::{ErrorBody, Identity, LoginRequest, Record, RecordId, SignupRequest, TokenResponse},
};
use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

// --- Request Helpers ---

/// Parses the `:id` path segment. Only positive integers name a record.
pub fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
    raw.parse::<RecordId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::InvalidInput("Invalid id".to_string()))
}

/// Unwraps a JSON body and insists it is an object.
fn object_body(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, ApiError> {
    match body {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(_)) => Err(ApiError::InvalidInput(
            "request body must be a JSON object".to_string(),
        )),
        Err(rejection) => Err(ApiError::InvalidInput(rejection.body_text())),
    }
}

// --- Collection Handlers ---
//
// Shared by every resource. The router gives each resource its own `Collection` extension
// and wraps the routes in that resource's access guard, so none of these check roles.

/// list_records
///
/// Lists the collection, narrowed by the resource's query parameters (AND semantics).
#[utoipa::path(
    get,
    path = "/{resource}",
    params(("resource" = String, Path, description = "movies, students or recipes")),
    responses(
        (status = 200, description = "Matching records", body = [Record]),
        (status = 400, description = "Unparseable numeric filter", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn list_records(
    Extension(collection): Extension<Collection>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let predicates = collection.predicates(&query)?;
    Ok(Json(collection.find_all(&predicates).await?))
}

#[utoipa::path(
    get,
    path = "/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "movies, students or recipes"),
        ("id" = i64, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "Found", body = Record),
        (status = 400, description = "Invalid id", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_record(
    Extension(collection): Extension<Collection>,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(collection.find_by_id(id).await?))
}

/// create_record
///
/// Validates and stores a new record. When the guard resolved an identity, resources that
/// track ownership stamp it onto the record.
#[utoipa::path(
    post,
    path = "/{resource}",
    params(("resource" = String, Path, description = "movies, students or recipes")),
    request_body(content = Record, description = "Record fields; id and system stamps are ignored"),
    responses(
        (status = 201, description = "Created", body = Record),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 403, description = "Role not allowed", body = ErrorBody),
        (status = 409, description = "Natural key taken", body = ErrorBody)
    )
)]
pub async fn create_record(
    Extension(collection): Extension<Collection>,
    identity: Option<Extension<Identity>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let body = object_body(body)?;
    let owner = identity.as_ref().map(|Extension(identity)| identity);
    let record = collection.insert(&body, owner).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// update_record
///
/// Partial update: the body is merged onto the stored record and the result re-validated.
#[utoipa::path(
    put,
    path = "/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "movies, students or recipes"),
        ("id" = i64, Path, description = "Record id")
    ),
    request_body(content = Record, description = "Record fields; id and system stamps are ignored"),
    responses(
        (status = 200, description = "Updated", body = Record),
        (status = 400, description = "Invalid id, empty patch or validation failed", body = ErrorBody),
        (status = 403, description = "Role not allowed, or not the record's owner", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn update_record(
    Extension(collection): Extension<Collection>,
    identity: Option<Extension<Identity>>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Record>, ApiError> {
    let id = parse_id(&id)?;
    let patch = object_body(body)?;
    let actor = identity.as_ref().map(|Extension(identity)| identity);
    Ok(Json(collection.update(id, &patch, actor).await?))
}

#[utoipa::path(
    delete,
    path = "/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "movies, students or recipes"),
        ("id" = i64, Path, description = "Record id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Invalid id", body = ErrorBody),
        (status = 403, description = "Role not allowed, or not the record's owner", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_record(
    Extension(collection): Extension<Collection>,
    identity: Option<Extension<Identity>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let actor = identity.as_ref().map(|Extension(identity)| identity);
    match collection.remove(id, actor).await? {
        Removal::Removed => Ok(StatusCode::NO_CONTENT),
        Removal::NotFound => Err(ApiError::NotFound(format!(
            "{} not found",
            collection.resource().label
        ))),
    }
}

// --- Auth Handlers ---

/// signup
///
/// [Public Route] Creates a credential. Mounted at both `/auth/signup` and `/auth/register`.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = Identity),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 409, description = "Username taken", body = ErrorBody)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Identity>), ApiError> {
    let body = object_body(body)?;
    let identity = auth::signup(&state, &body).await?;
    Ok((StatusCode::CREATED, Json(identity)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed token", body = TokenResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let body = object_body(body)?;
    let (token, user) = auth::login(&state, &body).await?;
    Ok(Json(TokenResponse { token, user }))
}

/// me
///
/// [Authenticated Route] Echoes the identity carried by the bearer token.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Caller identity", body = Identity),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn me(AuthUser(identity): AuthUser) -> Json<Identity> {
    Json(identity)
}
