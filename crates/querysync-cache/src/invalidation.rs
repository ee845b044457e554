//! Cache invalidation by key, prefix, text, pattern or predicate.

use querysync_core::{KeyFilter, QueryKey, Result};
use tracing::{debug, info};

use crate::store::CacheStore;

/// Resultado de una operacion de invalidacion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationResult {
    /// Numero de entries invalidadas.
    pub count: usize,
    /// Keys marcadas como stale.
    pub keys: Vec<QueryKey>,
    /// Keys con subscribers activos (se refrescan en background).
    pub active: Vec<QueryKey>,
    /// Filtros aplicados.
    pub filters: Vec<String>,
}

/// Facade over [`CacheStore::invalidate`].
///
/// Every form marks the selected entries stale without deleting their data.
/// Entries with live subscribers are refetched by those subscribers; the
/// rest refetch when next observed.
///
/// # Examples
///
/// ```
/// use querysync_cache::{CacheStore, InvalidationRouter};
/// use querysync_core::QueryKey;
/// use serde_json::json;
///
/// let store = CacheStore::default();
/// store.set(&QueryKey::new("userPosts").with(1).with("archive"), json!([]));
/// store.set(&QueryKey::new("tags"), json!([]));
///
/// let router = InvalidationRouter::new(store);
/// let result = router.invalidate_containing("archive");
/// assert_eq!(result.count, 1);
/// ```
#[derive(Debug, Clone)]
pub struct InvalidationRouter {
    store: CacheStore,
}

impl InvalidationRouter {
    /// Creates a router over `store`.
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Invalida las entries seleccionadas por el filtro.
    pub fn invalidate(&self, filter: &KeyFilter) -> InvalidationResult {
        let keys = self.store.invalidate(filter);
        let result = self.result(keys, vec![filter.to_string()]);

        info!(
            filter = %filter,
            count = result.count,
            active = result.active.len(),
            "Cache entries invalidated"
        );

        result
    }

    /// Invalida una entrada especifica.
    pub fn invalidate_key(&self, key: &QueryKey) -> InvalidationResult {
        self.invalidate(&KeyFilter::exact(key.clone()))
    }

    /// Invalida todas las entradas cuyos primeros segmentos coinciden con el prefijo.
    pub fn invalidate_prefix(&self, prefix: QueryKey) -> InvalidationResult {
        self.invalidate(&KeyFilter::prefix(prefix))
    }

    /// Invalidates every key with a segment that is or contains `text`.
    ///
    /// Used to blanket-invalidate every feed that may embed a mutated item
    /// without enumerating the exact feed keys.
    pub fn invalidate_containing(&self, text: &str) -> InvalidationResult {
        self.invalidate(&KeyFilter::containing(text))
    }

    /// Invalida entradas usando un patron glob sobre la forma `a:b:c` de la key.
    ///
    /// # Examples
    ///
    /// ```
    /// # use querysync_cache::{CacheStore, InvalidationRouter};
    /// # let router = InvalidationRouter::new(CacheStore::default());
    /// let result = router.invalidate_pattern("userPosts:*").unwrap();
    /// assert_eq!(result.filters, vec!["userPosts:*".to_string()]);
    /// ```
    pub fn invalidate_pattern(&self, pattern: &str) -> Result<InvalidationResult> {
        let filter = KeyFilter::pattern(pattern).inspect_err(|e| {
            debug!(pattern = %pattern, error = %e, "Invalid glob pattern");
        })?;
        Ok(self.invalidate(&filter))
    }

    /// Invalidates every key accepted by `predicate`.
    pub fn invalidate_where<F>(&self, predicate: F) -> InvalidationResult
    where
        F: Fn(&QueryKey) -> bool + Send + Sync + 'static,
    {
        self.invalidate(&KeyFilter::predicate(predicate))
    }

    /// Invalida multiples filtros a la vez.
    ///
    /// A key selected by several filters is invalidated, and notified, once.
    pub fn invalidate_many<I>(&self, filters: I) -> InvalidationResult
    where
        I: IntoIterator<Item = KeyFilter>,
    {
        let filters: Vec<KeyFilter> = filters.into_iter().collect();
        match filters.len() {
            0 => {
                debug!("No invalidation filters given");
                InvalidationResult::default()
            },
            1 => self.invalidate(&filters[0]),
            _ => {
                let descriptions: Vec<String> = filters.iter().map(ToString::to_string).collect();
                let combined = KeyFilter::predicate(move |key| filters.iter().any(|f| f.matches(key)));
                let keys = self.store.invalidate(&combined);
                let result = self.result(keys, descriptions);

                info!(
                    filters = ?result.filters,
                    count = result.count,
                    active = result.active.len(),
                    "Cache entries invalidated"
                );

                result
            },
        }
    }

    /// Invalidates every entry.
    pub fn invalidate_all(&self) -> InvalidationResult {
        self.invalidate(&KeyFilter::All)
    }

    fn result(&self, keys: Vec<QueryKey>, filters: Vec<String>) -> InvalidationResult {
        let active = keys
            .iter()
            .filter(|key| self.store.subscriber_count(key) > 0)
            .cloned()
            .collect();
        InvalidationResult {
            count: keys.len(),
            keys,
            active,
            filters,
        }
    }
}
