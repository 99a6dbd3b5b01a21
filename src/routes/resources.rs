use crate::{
    AppState,
    auth::{Access, AccessGuard, enforce_access},
    collection::Collection,
    config::AppConfig,
    handlers,
    resources::{self, Resource},
};
use axum::{
    Extension, Router, middleware,
    routing::{MethodRouter, get, post, put},
};

/// Resource Router Module
///
/// Mounts `GET|POST /{name}` and `GET|PUT|DELETE /{name}/{id}` for every resource. Reads and
/// writes are guarded separately, so a collection can be readable by any signed-in caller
/// but writable by admins only.
pub fn resource_routes(state: &AppState) -> Router<AppState> {
    resources::all()
        .into_iter()
        .fold(Router::new(), |router, resource| {
            router.merge(collection_routes(resource, state))
        })
}

fn collection_routes(resource: Resource, state: &AppState) -> Router<AppState> {
    let name = resource.name;
    let (read, write) = (resource.read, resource.write);
    let config = &state.config;
    let collection = Collection::new(state.records.clone(), resource, config.text_match);

    let list = guarded(get(handlers::list_records), read, config)
        .merge(guarded(post(handlers::create_record), write, config));
    let item = guarded(get(handlers::get_record), read, config).merge(guarded(
        put(handlers::update_record).delete(handlers::delete_record),
        write,
        config,
    ));

    Router::new()
        .route(&format!("/{name}"), list)
        .route(&format!("/{name}/{{id}}"), item)
        .layer(Extension(collection))
}

/// Wraps `route` in the access guard unless the policy is public.
fn guarded(
    route: MethodRouter<AppState>,
    access: Access,
    config: &AppConfig,
) -> MethodRouter<AppState> {
    match access {
        Access::Public => route,
        access => route.route_layer(middleware::from_fn_with_state(
            AccessGuard {
                access,
                config: config.clone(),
            },
            enforce_access,
        )),
    }
}
