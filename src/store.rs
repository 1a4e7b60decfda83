//! Per-request metadata store.
//!
//! A heterogeneous key-value bag middlewares use to hand data to later
//! handlers. Every access goes through one reader/writer lock, and the
//! [`Store`] handle is cheap to clone, so a handler can move it into a
//! background thread that outlives its own call.
//!
//! Two kinds of typed read:
//!
//! - **soft** (`get_string`, `get_int`, ...): absent or wrong type reads as
//!   the type's zero value;
//! - **strict** ([`Store::try_get`]): absent and wrong type are distinct errors.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::StoreError;

/// A value held by the store.
pub type Value = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
pub struct Store {
    keys: Arc<RwLock<HashMap<String, Value>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.keys.write().insert(key.into(), Arc::new(value));
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.keys.read().get(key).map(Arc::clone)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.keys.write().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Apply `f` to the current value of `key` under the write lock.
    ///
    /// Read-modify-write in one critical section; two threads updating the
    /// same counter never lose an increment.
    pub fn update<V, F>(&self, key: &str, f: F)
    where
        V: Any + Send + Sync,
        F: FnOnce(Option<&V>) -> V,
    {
        let mut keys = self.keys.write();
        let next = f(keys.get(key).and_then(|v| v.downcast_ref::<V>()));
        keys.insert(key.to_owned(), Arc::new(next));
    }

    /// Soft typed read: `None` when absent or of another type.
    pub fn get_as<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.keys.read().get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    /// Strict typed read.
    pub fn try_get<T: Any + Clone>(&self, key: &str) -> Result<T, StoreError> {
        let keys = self.keys.read();
        let value = keys.get(key).ok_or_else(|| StoreError::Missing(key.to_owned()))?;
        value.downcast_ref::<T>().cloned().ok_or_else(|| StoreError::TypeMismatch {
            key: key.to_owned(),
            expected: type_name::<T>(),
        })
    }

    /// Accepts values stored as `String` or `&'static str`.
    pub fn get_string(&self, key: &str) -> String {
        let keys = self.keys.read();
        let Some(value) = keys.get(key) else { return String::new() };
        if let Some(s) = value.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = value.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else {
            String::new()
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get_as(key).unwrap_or_default()
    }

    pub fn get_int(&self, key: &str) -> i32 {
        self.get_as(key).unwrap_or_default()
    }

    pub fn get_int64(&self, key: &str) -> i64 {
        self.get_as(key).unwrap_or_default()
    }

    pub fn get_uint(&self, key: &str) -> u32 {
        self.get_as(key).unwrap_or_default()
    }

    pub fn get_uint64(&self, key: &str) -> u64 {
        self.get_as(key).unwrap_or_default()
    }

    pub fn get_float64(&self, key: &str) -> f64 {
        self.get_as(key).unwrap_or_default()
    }

    /// Zero value is the Unix epoch.
    pub fn get_time(&self, key: &str) -> DateTime<Utc> {
        self.get_as(key).unwrap_or_default()
    }

    pub fn get_duration(&self, key: &str) -> Duration {
        self.get_as(key).unwrap_or_default()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self.keys.read();
        let mut names: Vec<_> = keys.keys().collect();
        names.sort();
        f.debug_struct("Store").field("keys", &names).finish()
    }
}
