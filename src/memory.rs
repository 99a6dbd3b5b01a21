use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::{
    models::{Credential, Record, RecordId},
    repository::{CredentialStore, RecordStore, StoreError, USERNAME_TAKEN},
};

/// InMemoryRepository
///
/// A process-local implementation of both store traits, used for local runs without
/// `DATABASE_URL` and throughout the tests. Every primitive runs under one `RwLock` write
/// guard, so concurrent writers inside a single process are safe; nothing is shared across
/// processes and nothing survives a restart.
#[derive(Default)]
pub struct InMemoryRepository {
    records: RwLock<HashMap<String, BTreeMap<RecordId, Map<String, Value>>>>,
    credentials: RwLock<Vec<Credential>>,
    /// When true, all operations return a simulated outage.
    should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that reports `StoreError::Unavailable` on every call.
    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Unavailable(
                "in-memory store: simulated outage".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRepository {
    async fn scan(&self, resource: &str) -> Result<Vec<Record>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .get(resource)
            .map(|collection| {
                collection
                    .iter()
                    .map(|(id, fields)| Record::new(*id, fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, resource: &str, id: RecordId) -> Result<Option<Record>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .get(resource)
            .and_then(|collection| collection.get(&id))
            .map(|fields| Record::new(id, fields.clone())))
    }

    async fn insert(
        &self,
        resource: &str,
        natural_key: Option<&str>,
        fields: Map<String, Value>,
    ) -> Result<Record, StoreError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let collection = records.entry(resource.to_string()).or_default();

        if let Some(key) = natural_key {
            let wanted = fields.get(key);
            if wanted.is_some() && collection.values().any(|existing| existing.get(key) == wanted) {
                return Err(StoreError::Conflict(format!("{} already exists", key)));
            }
        }

        let id = collection.keys().next_back().map_or(1, |max| max + 1);
        collection.insert(id, fields.clone());
        Ok(Record::new(id, fields))
    }

    async fn replace(&self, resource: &str, record: Record) -> Result<Option<Record>, StoreError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        match records
            .get_mut(resource)
            .and_then(|collection| collection.get_mut(&record.id))
        {
            Some(slot) => {
                *slot = record.fields.clone();
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, resource: &str, id: RecordId) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        Ok(records
            .get_mut(resource)
            .is_some_and(|collection| collection.remove(&id).is_some()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryRepository {
    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        self.check_available()?;
        let credentials = self.credentials.read().await;
        Ok(credentials.iter().find(|c| c.username == username).cloned())
    }

    async fn create_credential(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<Credential, StoreError> {
        self.check_available()?;
        let mut credentials = self.credentials.write().await;
        if credentials.iter().any(|c| c.username == username) {
            return Err(StoreError::Conflict(USERNAME_TAKEN.to_string()));
        }

        let credential = Credential {
            id: credentials.iter().map(|c| c.id).max().map_or(1, |max| max + 1),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role: role.to_string(),
        };
        credentials.push(credential.clone());
        Ok(credential)
    }
}
