use crate::error::OrmResult;
use crate::row::RowShape;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Identity of one compiled factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactoryKey {
    pub connection: Arc<str>,
    pub sql: Arc<str>,
    pub shape: RowShape,
    pub types: Vec<TypeId>,
    /// Schema ids; each (type, mapper) registration has its own.
    pub schemas: Vec<u64>,
    pub offset: usize,
    pub count: usize,
}

type Entry = Arc<dyn Any + Send + Sync>;

/// A read-mostly cache of compiled factories.
///
/// Compilation runs outside the lock, so a slow compile never blocks lookups of
/// other keys. When two callers race on a new key both compile, the last insert
/// wins, and every later lookup sees that one entry.
#[derive(Default)]
pub struct FactoryCache {
    entries: RwLock<HashMap<FactoryKey, Entry>>,
}

impl FactoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a factory of type `F`.
    pub fn get<F: Any + Send + Sync>(&self, key: &FactoryKey) -> Option<Arc<F>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .cloned()
            .and_then(|entry| entry.downcast::<F>().ok())
    }

    /// Return the cached factory for `key`, compiling it with `build` on a miss.
    pub fn get_or_compile<F, B>(&self, key: FactoryKey, build: B) -> OrmResult<Arc<F>>
    where
        F: Any + Send + Sync,
        B: FnOnce() -> OrmResult<F>,
    {
        if let Some(found) = self.get::<F>(&key) {
            return Ok(found);
        }

        let built = Arc::new(build()?);
        tracing::debug!(
            target: "rowforge.factory",
            sql = %key.sql,
            columns = key.shape.len(),
            offset = key.offset,
            count = key.count,
            "factory cache miss"
        );

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, built.clone() as Entry);
        Ok(built)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached factory.
    pub fn flush(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let dropped = entries.len();
        entries.clear();
        tracing::debug!(target: "rowforge.factory", dropped, "factory cache flushed");
    }
}

/// The process-wide factory cache.
pub fn factory_cache() -> &'static FactoryCache {
    static CACHE: OnceLock<FactoryCache> = OnceLock::new();
    CACHE.get_or_init(FactoryCache::new)
}

/// Drop every factory in the process-wide cache.
pub fn flush_factory_cache() {
    factory_cache().flush();
}
