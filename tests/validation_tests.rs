use collection_api::{
    resources,
    schema::{FieldRule, Schema},
    validation::validate,
};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("test body must be an object, got {other}"),
    }
}

fn movie(year: Value) -> Map<String, Value> {
    body(json!({ "title": "Dune", "director": "Denis Villeneuve", "year": year }))
}

// --- Movies ---

#[test]
fn test_valid_movie_passes() {
    let schema = resources::movies().schema;
    let candidate = validate(&movie(json!(2021)), &schema).expect("valid movie");
    assert_eq!(candidate.get_str("title"), Some("Dune"));
    assert_eq!(candidate.get("year"), Some(&json!(2021)));
}

#[test]
fn test_year_boundaries() {
    let schema = resources::movies().schema;
    assert!(validate(&movie(json!(1900)), &schema).is_ok());
    assert!(validate(&movie(json!(2030)), &schema).is_ok());

    let low = validate(&movie(json!(1899)), &schema).unwrap_err();
    assert_eq!(low.0, "\"year\" must be greater than or equal to 1900");

    let high = validate(&movie(json!(2031)), &schema).unwrap_err();
    assert_eq!(high.0, "\"year\" must be less than or equal to 2030");
}

#[test]
fn test_missing_required_field_is_reported() {
    let schema = resources::movies().schema;
    let err = validate(&body(json!({ "title": "Dune", "year": 2021 })), &schema).unwrap_err();
    assert_eq!(err.0, "\"director\" is required");
}

#[test]
fn test_null_counts_as_absent() {
    let schema = resources::movies().schema;
    let err = validate(&movie(Value::Null), &schema).unwrap_err();
    assert_eq!(err.0, "\"year\" is required");
}

#[test]
fn test_blank_string_is_not_allowed() {
    let schema = resources::movies().schema;
    let mut candidate = movie(json!(2021));
    candidate.insert("title".into(), json!("   "));
    let err = validate(&candidate, &schema).unwrap_err();
    assert_eq!(err.0, "\"title\" is not allowed to be empty");
}

#[test]
fn test_wrong_type_is_reported() {
    let schema = resources::movies().schema;
    let err = validate(&movie(json!("2021")), &schema).unwrap_err();
    assert_eq!(err.0, "\"year\" must be an integer");

    let err = validate(&movie(json!(2021.5)), &schema).unwrap_err();
    assert_eq!(err.0, "\"year\" must be an integer");
}

#[test]
fn test_whole_float_counts_as_integer() {
    let schema = resources::movies().schema;
    let valid = validate(&movie(json!(2021.0)), &schema).unwrap();
    assert_eq!(valid.get("year"), Some(&json!(2021)));
    assert!(valid.get("year").is_some_and(Value::is_i64));
}

#[test]
fn test_title_length_bounds() {
    let schema = resources::movies().schema;
    let mut candidate = movie(json!(2021));
    candidate.insert("title".into(), json!("Up"));
    let err = validate(&candidate, &schema).unwrap_err();
    assert_eq!(err.0, "\"title\" length must be at least 3 characters long");
}

#[test]
fn test_rules_run_in_fixed_order() {
    // A missing field is reported before a type error elsewhere.
    let schema = resources::movies().schema;
    let err = validate(&body(json!({ "title": 5, "year": 2021 })), &schema).unwrap_err();
    assert_eq!(err.0, "\"director\" is required");

    // A type error is reported before a range error.
    let err = validate(
        &body(json!({ "title": 5, "director": "Someone", "year": 1800 })),
        &schema,
    )
    .unwrap_err();
    assert_eq!(err.0, "\"title\" must be a string");
}

#[test]
fn test_unknown_and_system_fields_are_stripped() {
    let schema = resources::movies().schema;
    let mut candidate = movie(json!(2021));
    candidate.insert("id".into(), json!(99));
    candidate.insert("rating".into(), json!(5));

    let candidate = validate(&candidate, &schema).expect("valid movie");
    assert!(candidate.get("id").is_none());
    assert!(candidate.get("rating").is_none());
    assert_eq!(candidate.fields().len(), 3);
}

#[test]
fn test_validate_leaves_input_untouched() {
    let schema = resources::movies().schema;
    let mut input = movie(json!(2021));
    input.insert("extra".into(), json!(true));
    let before = input.clone();

    let _ = validate(&input, &schema);
    assert_eq!(input, before);
}

// --- Students & Recipes ---

#[test]
fn test_student_campus_enum() {
    let schema = resources::students().schema;
    let ok = body(json!({ "name": "Aino", "age": 22, "campus": "Hervanta" }));
    assert!(validate(&ok, &schema).is_ok());

    let bad = body(json!({ "name": "Aino", "age": 22, "campus": "Linna" }));
    let err = validate(&bad, &schema).unwrap_err();
    assert_eq!(err.0, "\"campus\" must be one of [Kauppi, Hervanta, Center]");
}

#[test]
fn test_student_optional_credit_points_must_not_be_negative() {
    let schema = resources::students().schema;
    let bad = body(json!({ "name": "Aino", "age": 22, "campus": "Center", "creditPoints": -5 }));
    let err = validate(&bad, &schema).unwrap_err();
    assert_eq!(err.0, "\"creditPoints\" must be greater than or equal to 0");
}

#[test]
fn test_recipe_ingredients_list() {
    let schema = resources::recipes().schema;
    let recipe = |ingredients: Value| {
        body(json!({
            "title": "Pancakes",
            "ingredients": ingredients,
            "instructions": "Mix everything and fry.",
            "prepTime": 15
        }))
    };

    assert!(validate(&recipe(json!(["flour", "milk"])), &schema).is_ok());

    let err = validate(&recipe(json!([])), &schema).unwrap_err();
    assert_eq!(err.0, "\"ingredients\" length must be at least 1 items");

    let err = validate(&recipe(json!(["flour", 3])), &schema).unwrap_err();
    assert_eq!(err.0, "\"ingredients\" must be an array of strings");
}

#[test]
fn test_custom_schema_number_and_boolean() {
    let schema = Schema::new(vec![
        FieldRule::number("rating").range(0, 5),
        FieldRule::boolean("watched").required(),
    ]);

    assert!(validate(&body(json!({ "watched": true, "rating": 4.5 })), &schema).is_ok());
    let err = validate(&body(json!({ "watched": "yes" })), &schema).unwrap_err();
    assert_eq!(err.0, "\"watched\" must be a boolean");
}

// --- Property Tests ---

proptest! {
    /// A movie year is accepted exactly when it lies in 1900..=2030.
    #[test]
    fn year_accepted_iff_in_range(year in 1800i64..2100) {
        let schema = resources::movies().schema;
        let accepted = validate(&movie(json!(year)), &schema).is_ok();
        prop_assert_eq!(accepted, (1900..=2030).contains(&year));
    }

    /// Titles between 3 and 100 characters pass; the output keeps the title verbatim.
    #[test]
    fn valid_titles_round_trip(title in "[a-zA-Z][a-zA-Z0-9 ]{2,99}") {
        let schema = resources::movies().schema;
        let mut input = movie(json!(2000));
        input.insert("title".into(), json!(title.clone()));
        let candidate = validate(&input, &schema);
        prop_assert!(candidate.is_ok());
        let candidate = candidate.unwrap();
        prop_assert_eq!(candidate.get_str("title"), Some(title.as_str()));
    }
}
