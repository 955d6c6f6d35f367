use std::any::type_name;
use std::any::Any;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::Document;
use crate::ReactiveMap;
use crate::RegistryError;
use crate::Result;

/// Collection name → shared cache, owned by the runtime
#[derive(Default)]
pub struct CacheRegistry {
    caches: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Document>(
        &self,
        map: Arc<ReactiveMap<T>>,
    ) -> Result<()> {
        match self.caches.entry(map.name().to_string()) {
            Entry::Occupied(entry) => {
                Err(RegistryError::DuplicateCollection(entry.key().clone()).into())
            }
            Entry::Vacant(entry) => {
                entry.insert(map);
                Ok(())
            }
        }
    }

    /// Returns `Ok(None)` for unknown names and an error when the name is
    /// bound to another document type.
    pub fn get<T: Document>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<ReactiveMap<T>>>> {
        let Some(erased) = self.caches.get(name).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };

        erased
            .downcast::<ReactiveMap<T>>()
            .map(Some)
            .map_err(|_| {
                RegistryError::TypeMismatch {
                    name: name.to_string(),
                    expected: type_name::<T>(),
                }
                .into()
            })
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.caches.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.caches.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}
