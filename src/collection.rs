use std::{collections::HashMap, sync::Arc};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::{
    error::ApiError,
    filter::{self, Predicate, TextMatch},
    models::{Identity, Record, RecordId},
    repository::{RecordStoreState, StoreError},
    resources::Resource,
    validation::validate,
};

const EMPTY_PATCH: &str = "\"value\" must have at least 1 key";
const NOT_OWNER: &str = "Unauthorized";

/// Outcome of [`Collection::remove`]. Removing twice is not an error: the second call
/// reports `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotFound,
}

/// Collection
///
/// The record store adapter for one resource. Composes the validator, the filter engine and
/// the injected [`RecordStore`](crate::repository::RecordStore); handlers only talk to this.
#[derive(Clone)]
pub struct Collection {
    store: RecordStoreState,
    resource: Arc<Resource>,
    text_match: TextMatch,
}

impl Collection {
    pub fn new(store: RecordStoreState, resource: Resource, text_match: TextMatch) -> Self {
        Self {
            store,
            resource: Arc::new(resource),
            text_match,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    fn not_found(&self) -> ApiError {
        ApiError::NotFound(format!("{} not found", self.resource.label))
    }

    /// Builds predicates from raw query parameters using this resource's declarations.
    pub fn predicates(&self, query: &HashMap<String, String>) -> Result<Vec<Predicate>, ApiError> {
        filter::predicates_from_query(query, &self.resource.query, self.text_match)
    }

    /// find_all
    ///
    /// Full scan, then the filter engine. An empty result is not an error.
    pub async fn find_all(&self, predicates: &[Predicate]) -> Result<Vec<Record>, ApiError> {
        let records = self.store.scan(self.resource.name).await?;
        Ok(filter::apply(&records, predicates))
    }

    pub async fn find_by_id(&self, id: RecordId) -> Result<Record, ApiError> {
        self.store
            .get(self.resource.name, id)
            .await?
            .ok_or_else(|| self.not_found())
    }

    /// insert
    ///
    /// Validates the body, stamps the system fields and hands the result to the store, which
    /// assigns the next sequential id and rejects a taken natural key.
    pub async fn insert(
        &self,
        body: &Map<String, Value>,
        owner: Option<&Identity>,
    ) -> Result<Record, ApiError> {
        let candidate =
            validate(body, &self.resource.schema).map_err(|e| ApiError::InvalidInput(e.0))?;
        let mut fields = candidate.into_fields();

        if let (Some(field), Some(owner)) = (self.resource.owner_field, owner) {
            fields.insert(field.to_string(), Value::from(owner.id));
        }
        if let Some(field) = self.resource.created_at_field {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            fields.insert(field.to_string(), Value::String(now));
        }

        let record = self
            .store
            .insert(self.resource.name, self.resource.natural_key, fields)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => {
                    ApiError::Conflict(format!("{} already exists", self.resource.label))
                }
                other => other.into(),
            })?;

        tracing::info!(resource = self.resource.name, id = record.id, "record created");
        Ok(record)
    }

    /// update
    ///
    /// Merges `patch` onto the stored record and re-validates the merged result before
    /// replacing it. System fields in the patch (`id` and the stamps) are ignored, so the
    /// persisted id never changes. An empty patch is rejected, and on owned resources only the
    /// owner may update.
    pub async fn update(
        &self,
        id: RecordId,
        patch: &Map<String, Value>,
        actor: Option<&Identity>,
    ) -> Result<Record, ApiError> {
        if patch.is_empty() {
            return Err(ApiError::InvalidInput(EMPTY_PATCH.to_string()));
        }
        let existing = self.find_by_id(id).await?;
        self.check_owner(&existing, actor)?;

        let mut merged = existing.fields.clone();
        for (key, value) in patch {
            if self.resource.system_fields().all(|system| system != key) {
                merged.insert(key.clone(), value.clone());
            }
        }

        let candidate =
            validate(&merged, &self.resource.schema).map_err(|e| ApiError::InvalidInput(e.0))?;
        let mut fields = candidate.into_fields();
        for system in self.resource.system_fields().filter(|f| *f != "id") {
            if let Some(value) = existing.fields.get(system) {
                fields.insert(system.to_string(), value.clone());
            }
        }

        let updated = self
            .store
            .replace(self.resource.name, Record::new(existing.id, fields))
            .await?
            .ok_or_else(|| self.not_found())?;

        tracing::info!(resource = self.resource.name, id, "record updated");
        Ok(updated)
    }

    pub async fn remove(&self, id: RecordId, actor: Option<&Identity>) -> Result<Removal, ApiError> {
        if self.resource.owner_field.is_some() {
            match self.store.get(self.resource.name, id).await? {
                Some(existing) => self.check_owner(&existing, actor)?,
                None => return Ok(Removal::NotFound),
            }
        }
        if self.store.delete(self.resource.name, id).await? {
            tracing::info!(resource = self.resource.name, id, "record removed");
            Ok(Removal::Removed)
        } else {
            Ok(Removal::NotFound)
        }
    }

    /// Owned resources may only be changed by the identity stamped on the record.
    fn check_owner(&self, existing: &Record, actor: Option<&Identity>) -> Result<(), ApiError> {
        let (Some(field), Some(actor)) = (self.resource.owner_field, actor) else {
            return Ok(());
        };
        if existing.get(field).and_then(Value::as_i64) == Some(actor.id) {
            Ok(())
        } else {
            tracing::info!(
                resource = self.resource.name,
                id = existing.id,
                user = %actor.username,
                "write by non-owner rejected"
            );
            Err(ApiError::Forbidden(NOT_OWNER.to_string()))
        }
    }
}
