use crate::{
    auth::{ADMIN_ROLE, Access},
    filter::{QueryKind, QueryParam},
    schema::{FieldRule, Schema},
};

/// Resource
///
/// Everything that makes one REST collection different from another: its path segment,
/// schema, natural key, filterable query parameters, access policy and system stamps.
/// The handlers, validator, filter engine and store adapter are shared.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Path segment and store partition, e.g. `movies`.
    pub name: &'static str,
    /// Singular label used in messages, e.g. `Movie not found`.
    pub label: &'static str,
    pub schema: Schema,
    /// Field that must be unique across the collection on insert.
    pub natural_key: Option<&'static str>,
    pub query: Vec<QueryParam>,
    pub read: Access,
    pub write: Access,
    /// Set to the creator's identity id on insert; immutable afterwards.
    pub owner_field: Option<&'static str>,
    /// Set to the insert time (RFC 3339, UTC); immutable afterwards.
    pub created_at_field: Option<&'static str>,
}

impl Resource {
    /// Fields the store manages itself. Callers can never set or overwrite them.
    pub fn system_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once("id")
            .chain(self.owner_field)
            .chain(self.created_at_field)
    }
}

pub const CAMPUSES: &[&str] = &["Kauppi", "Hervanta", "Center"];
pub const RECIPE_CATEGORIES: &[&str] = &["vegan", "quick", "dessert"];

/// Movies: every route requires a signed-in caller.
pub fn movies() -> Resource {
    Resource {
        name: "movies",
        label: "Movie",
        schema: Schema::new(vec![
            FieldRule::string("title").required().length(3, 100),
            FieldRule::string("director").required().length(3, 100),
            FieldRule::integer("year").required().range(1900, 2030),
        ]),
        natural_key: Some("title"),
        query: vec![
            QueryParam::new("title", "title", QueryKind::Text),
            QueryParam::new("director", "director", QueryKind::Text),
            QueryParam::new("year", "year", QueryKind::NumberEq),
        ],
        read: Access::Authenticated,
        write: Access::Authenticated,
        owner_field: None,
        created_at_field: None,
    }
}

/// Students: an open demonstration collection.
pub fn students() -> Resource {
    Resource {
        name: "students",
        label: "Student",
        schema: Schema::new(vec![
            FieldRule::string("name").required().length(1, 100),
            FieldRule::integer("age").required().at_least(0),
            FieldRule::integer("creditPoints").at_least(0),
            FieldRule::string("campus").required().one_of(CAMPUSES),
        ]),
        natural_key: None,
        query: vec![
            QueryParam::new("name", "name", QueryKind::Text),
            QueryParam::new("creditPointsMin", "creditPoints", QueryKind::AtLeast),
            QueryParam::new("campus", "campus", QueryKind::Enum),
        ],
        read: Access::Public,
        write: Access::Public,
        owner_field: None,
        created_at_field: None,
    }
}

/// Recipes: readable by any signed-in caller, writable by admins only.
pub fn recipes() -> Resource {
    Resource {
        name: "recipes",
        label: "Recipe",
        schema: Schema::new(vec![
            FieldRule::string("title").required().length(3, 100),
            FieldRule::string_list("ingredients").required().min_length(1),
            FieldRule::string("instructions").required().min_length(10),
            FieldRule::string("category").one_of(RECIPE_CATEGORIES),
            FieldRule::integer("prepTime").required().at_least(1),
        ]),
        natural_key: Some("title"),
        query: vec![
            QueryParam::new("title", "title", QueryKind::Text),
            QueryParam::new("category", "category", QueryKind::Enum),
            QueryParam::new("prepTime", "prepTime", QueryKind::AtMost),
        ],
        read: Access::Authenticated,
        write: Access::Role(ADMIN_ROLE),
        owner_field: Some("createdBy"),
        created_at_field: Some("createdAt"),
    }
}

/// The resources this service mounts.
pub fn all() -> Vec<Resource> {
    vec![movies(), students(), recipes()]
}
