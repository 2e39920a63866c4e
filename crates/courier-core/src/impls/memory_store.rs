//! In-memory store.
//!
//! 値は JSON 文字列として保持するので、壊れた中身（`with_raw`）も再現できます。

use std::marker::PhantomData;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::StoreError;
use crate::ports::Store;

pub struct MemoryStore<T> {
    raw: Mutex<Option<String>>,
    saves: AtomicUsize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            raw: Mutex::new(None),
            saves: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Start with arbitrary (possibly corrupt) contents.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::new();
        *store.raw.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw.into());
        store
    }

    /// Serialized contents as last saved.
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Store<T> for MemoryStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>, StoreError> {
        let raw = self.raw();
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
        }
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        *self.raw.lock().unwrap_or_else(|e| e.into_inner()) = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
