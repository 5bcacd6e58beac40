use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{RemoteError, RemoteFlagStore, RemoteRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum MockRemoteCall {
    Fetch(String),
    Upsert(String, RemoteRecord),
}

/// In-memory [`RemoteFlagStore`]. Records written with `upsert` are returned
/// by later `fetch` calls; failures can be injected per operation. Clones
/// share state.
#[derive(Clone, Default)]
pub struct MockRemoteStore {
    records: Arc<Mutex<HashMap<String, RemoteRecord>>>,
    fetch_error: Arc<Mutex<Option<RemoteError>>>,
    upsert_error: Arc<Mutex<Option<RemoteError>>>,
    calls: Arc<Mutex<Vec<MockRemoteCall>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(&mut self, key: &str, record: RemoteRecord) -> Self {
        lock(&self.records).insert(key.to_owned(), record);
        self.clone()
    }

    /// Every fetch fails with `err` until cleared with `None`.
    pub fn fetch_error(&mut self, err: Option<RemoteError>) -> Self {
        *lock(&self.fetch_error) = err;
        self.clone()
    }

    /// Every upsert fails with `err` until cleared with `None`.
    pub fn upsert_error(&mut self, err: Option<RemoteError>) -> Self {
        *lock(&self.upsert_error) = err;
        self.clone()
    }

    pub fn record(&self, key: &str) -> Option<RemoteRecord> {
        lock(&self.records).get(key).cloned()
    }

    pub fn get_calls(&self) -> Vec<MockRemoteCall> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl RemoteFlagStore for MockRemoteStore {
    async fn fetch(&self, key: &str) -> Result<RemoteRecord, RemoteError> {
        lock(&self.calls).push(MockRemoteCall::Fetch(key.to_owned()));

        if let Some(err) = lock(&self.fetch_error).clone() {
            return Err(err);
        }
        lock(&self.records)
            .get(key)
            .cloned()
            .ok_or(RemoteError::NotFound)
    }

    async fn upsert(&self, key: &str, record: &RemoteRecord) -> Result<(), RemoteError> {
        lock(&self.calls).push(MockRemoteCall::Upsert(key.to_owned(), record.clone()));

        if let Some(err) = lock(&self.upsert_error).clone() {
            return Err(err);
        }
        lock(&self.records).insert(key.to_owned(), record.clone());
        Ok(())
    }
}
