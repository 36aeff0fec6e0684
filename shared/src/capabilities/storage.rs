use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

pub const MAX_KEY_LENGTH: usize = 512;

/// Browser-local key/value persistence (account records and pointers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageOperation {
    Read { keys: Vec<String> },
    Write { entries: Vec<(String, String)> },
    Remove { keys: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageResponse {
    /// One slot per requested key, in request order.
    Values(Vec<Option<String>>),
    Done,
}

pub type StorageOutput = Result<StorageResponse, StorageError>;

impl Operation for StorageOperation {
    type Output = StorageOutput;
}

pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let reason = if key.trim().is_empty() {
        "key cannot be empty"
    } else if key.len() > MAX_KEY_LENGTH {
        "key exceeds maximum length"
    } else if key.chars().any(char::is_control) {
        "key contains control characters"
    } else {
        return Ok(());
    };
    Err(StorageError::Corrupt {
        key: key.chars().take(50).collect(),
        reason: reason.to_string(),
    })
}

pub struct Storage<Ev> {
    context: CapabilityContext<StorageOperation, Ev>,
}

impl<Ev> Capability<Ev> for Storage<Ev> {
    type Operation = StorageOperation;
    type MappedSelf<MappedEv> = Storage<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Storage::new(self.context.map_event(f))
    }
}

impl<Ev> Storage<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<StorageOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn read<F>(&self, keys: Vec<String>, make_event: F)
    where
        F: FnOnce(Result<Vec<Option<String>>, StorageError>) -> Ev + Send + 'static,
    {
        let expected = keys.len();
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = match context
                .request_from_shell(StorageOperation::Read { keys })
                .await
            {
                Ok(StorageResponse::Values(values)) if values.len() == expected => Ok(values),
                Ok(_) => Err(StorageError::UnexpectedResponse),
                Err(e) => Err(e),
            };
            context.update_app(make_event(result));
        });
    }

    pub fn write<F>(&self, entries: Vec<(String, String)>, make_event: F)
    where
        F: FnOnce(Result<(), StorageError>) -> Ev + Send + 'static,
    {
        self.mutate(StorageOperation::Write { entries }, make_event);
    }

    pub fn remove<F>(&self, keys: Vec<String>, make_event: F)
    where
        F: FnOnce(Result<(), StorageError>) -> Ev + Send + 'static,
    {
        self.mutate(StorageOperation::Remove { keys }, make_event);
    }

    fn mutate<F>(&self, operation: StorageOperation, make_event: F)
    where
        F: FnOnce(Result<(), StorageError>) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = match context.request_from_shell(operation).await {
                Ok(StorageResponse::Done) => Ok(()),
                Ok(StorageResponse::Values(_)) => Err(StorageError::UnexpectedResponse),
                Err(e) => Err(e),
            };
            context.update_app(make_event(result));
        });
    }
}

/// Synchronous key/value backend a shell can delegate storage requests to.
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process backend, used in tests and by headless shells.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail as if the quota were exhausted.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QuotaExceeded);
        }
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Executes a storage request from the core against a backend.
pub fn serve_storage<S>(backend: &S, operation: StorageOperation) -> StorageOutput
where
    S: LocalStorage + ?Sized,
{
    match operation {
        StorageOperation::Read { keys } => keys
            .iter()
            .map(|key| backend.get(key))
            .collect::<Result<Vec<_>, _>>()
            .map(StorageResponse::Values),
        StorageOperation::Write { entries } => {
            for (key, value) in &entries {
                validate_key(key)?;
                backend.set(key, value)?;
            }
            Ok(StorageResponse::Done)
        }
        StorageOperation::Remove { keys } => {
            for key in &keys {
                backend.remove(key)?;
            }
            Ok(StorageResponse::Done)
        }
    }
}
