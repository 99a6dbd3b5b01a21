use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use collection_api::{
    ApiError, AppState, InMemoryRepository,
    auth::{AuthError, AuthUser},
    collection::Collection,
    config::AppConfig,
    filter::TextMatch,
    handlers,
    models::Identity,
    resources,
};
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};
use tokio::test;

// --- Test Fixtures ---

fn movies() -> Extension<Collection> {
    Extension(Collection::new(
        Arc::new(InMemoryRepository::new()),
        resources::movies(),
        TextMatch::Substring,
    ))
}

fn dune() -> Value {
    json!({ "title": "Dune", "director": "Denis Villeneuve", "year": 2021 })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Collection Handlers ---

#[test]
async fn test_create_returns_201_with_record() {
    let (status, Json(record)) = handlers::create_record(movies(), None, Ok(Json(dune())))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record.id, 1);
    assert_eq!(record.get("title"), Some(&json!("Dune")));
}

#[test]
async fn test_create_rejects_non_object_body() {
    let err = handlers::create_record(movies(), None, Ok(Json(json!(["Dune"]))))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(ref m) if m == "request body must be a JSON object"));
}

#[test]
async fn test_list_filters_by_query() {
    let movies = movies();
    handlers::create_record(movies.clone(), None, Ok(Json(dune())))
        .await
        .unwrap();
    handlers::create_record(
        movies.clone(),
        None,
        Ok(Json(json!({ "title": "Alien", "director": "Ridley Scott", "year": 1979 }))),
    )
    .await
    .unwrap();

    let query = HashMap::from([("year".to_string(), "2021".to_string())]);
    let Json(found) = handlers::list_records(movies.clone(), Ok(Query(query)))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("title"), Some(&json!("Dune")));

    let bad = HashMap::from([("year".to_string(), "soon".to_string())]);
    let err = handlers::list_records(movies, Ok(Query(bad))).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
async fn test_get_update_delete_cycle() {
    let movies = movies();
    let (_, Json(created)) = handlers::create_record(movies.clone(), None, Ok(Json(dune())))
        .await
        .unwrap();
    let id = created.id.to_string();

    let Json(found) = handlers::get_record(movies.clone(), Path(id.clone()))
        .await
        .unwrap();
    assert_eq!(found, created);

    let Json(updated) = handlers::update_record(
        movies.clone(),
        None,
        Path(id.clone()),
        Ok(Json(json!({ "director": "David Lynch" }))),
    )
    .await
    .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.get("director"), Some(&json!("David Lynch")));

    let err = handlers::update_record(movies.clone(), None, Path(id.clone()), Ok(Json(json!({}))))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let status = handlers::delete_record(movies.clone(), None, Path(id.clone()))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let err = handlers::delete_record(movies, None, Path(id)).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[test]
async fn test_invalid_ids_are_rejected() {
    for raw in ["abc", "0", "-3", "1.5"] {
        let err = handlers::get_record(movies(), Path(raw.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m == "Invalid id"), "{raw}");
    }
    assert_eq!(handlers::parse_id("42").unwrap(), 42);
}

#[test]
async fn test_recipe_create_stamps_guard_identity() {
    let recipes = Extension(Collection::new(
        Arc::new(InMemoryRepository::new()),
        resources::recipes(),
        TextMatch::Substring,
    ));
    let admin = Identity {
        id: 3,
        username: "chef".into(),
        role: "admin".into(),
    };
    let (_, Json(record)) = handlers::create_record(
        recipes,
        Some(Extension(admin)),
        Ok(Json(json!({
            "title": "Porridge",
            "ingredients": ["oats", "water"],
            "instructions": "Simmer oats in water for five minutes.",
            "category": "quick",
            "prepTime": 5
        }))),
    )
    .await
    .unwrap();
    assert_eq!(record.get("createdBy"), Some(&json!(3)));
}

// --- Error Envelope ---

#[test]
async fn test_error_body_shape() {
    let response = ApiError::NotFound("Movie not found".into()).into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "error": "Movie not found" }));
}

#[test]
async fn test_store_unavailable_hides_detail() {
    let response = ApiError::StoreUnavailable("connection refused on 10.0.0.5".into()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({ "error": "Internal server error" }));
}

#[test]
async fn test_signing_failure_is_internal_not_store() {
    let err = ApiError::from(AuthError::Signing("InvalidKeyFormat".into()));
    assert!(matches!(err, ApiError::Internal(ref d) if d == "InvalidKeyFormat"));
    assert_eq!(err.to_string(), "internal error: InvalidKeyFormat");

    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({ "error": "Internal server error" }));
}

// --- Auth Handlers ---

#[test]
async fn test_signup_and_login_handlers() {
    let state = AppState::in_memory(AppConfig::default());
    let credentials = json!({ "username": "aino", "password": "secret1" });

    let (status, Json(identity)) =
        handlers::signup(State(state.clone()), Ok(Json(credentials.clone())))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(identity.username, "aino");

    let Json(tokens) = handlers::login(State(state.clone()), Ok(Json(credentials)))
        .await
        .unwrap();
    assert!(!tokens.token.is_empty());
    assert_eq!(tokens.user, identity);

    let Json(me) = handlers::me(AuthUser(identity.clone())).await;
    assert_eq!(me, identity);
}
