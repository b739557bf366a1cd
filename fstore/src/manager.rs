//! Feature table manager with a bounded cache of open tables.
//!
//! The manager resolves the caller's identity once and hands out
//! [`FeatureTableHandle`]s keyed by `(table name, owner)`. Opening a table
//! costs several remote round trips, so recently used tables stay open until
//! the cache evicts them.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use fstore_remote::Session;
use fstore_result::{Error, Result};
use fstore_table::{FeatureTable, MetadataColumn, PermissionGuard};
use fstore_types::UserId;
use tracing::debug;

use crate::cache::{Closable, LruClosableCache};
use crate::options::ManagerOptions;

type TableKey = (String, UserId);

/// Shared reference to an open [`FeatureTable`].
///
/// Clones point at the same table. The remote handle is closed when the
/// cache evicts an entry nobody else holds, or when the last clone is
/// dropped.
pub struct FeatureTableHandle<S: Session> {
    inner: Arc<Mutex<FeatureTable<S>>>,
}

impl<S: Session> FeatureTableHandle<S> {
    fn new(table: FeatureTable<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(table)),
        }
    }

    /// Exclusive access to the table.
    pub fn lock(&self) -> Result<MutexGuard<'_, FeatureTable<S>>> {
        self.inner.lock().map_err(Error::internal)
    }

    /// Whether the table still holds a remote handle. A table locked by
    /// another guard counts as open, a poisoned one as closed.
    pub fn is_open(&self) -> bool {
        match self.inner.try_lock() {
            Ok(table) => table.is_open(),
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(_)) => false,
        }
    }

    /// Number of live clones of this handle, the cache's included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<S: Session> Clone for FeatureTableHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Session> Closable for FeatureTableHandle<S> {
    fn close(&mut self) -> Result<()> {
        if Arc::strong_count(&self.inner) > 1 {
            debug!("feature table still checked out; leaving it open");
            return Ok(());
        }
        self.lock()?.close()
    }
}

impl<S: Session> fmt::Debug for FeatureTableHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Ok(table) => fmt::Debug::fmt(&*table, f),
            Err(_) => f.write_str("FeatureTableHandle(<locked>)"),
        }
    }
}

pub struct FeatureTableManager<S: Session> {
    session: Arc<S>,
    user: UserId,
    feature_space: String,
    annotation_space: String,
    cache: LruClosableCache<TableKey, FeatureTableHandle<S>>,
}

impl<S: Session> FeatureTableManager<S> {
    pub fn new(session: Arc<S>, options: ManagerOptions) -> Result<Self> {
        let user = PermissionGuard::from_identity(&*session)?.user();
        let feature_space = options.feature_space();
        let annotation_space = options.annotation_space();
        debug!(
            %user,
            %feature_space,
            %annotation_space,
            cache_size = options.cache_size,
            "feature table manager ready"
        );
        Ok(Self {
            session,
            user,
            feature_space,
            annotation_space,
            cache: LruClosableCache::new(options.cache_size),
        })
    }

    pub fn feature_space(&self) -> &str {
        &self.feature_space
    }

    pub fn annotation_space(&self) -> &str {
        &self.annotation_space
    }

    /// Caller identity resolved at construction.
    pub fn user_id(&self) -> UserId {
        self.user
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn unopened(&self, name: &str) -> FeatureTable<S> {
        FeatureTable::new(
            Arc::clone(&self.session),
            self.user,
            name,
            self.feature_space.as_str(),
            self.annotation_space.as_str(),
        )
    }

    /// Create a table owned by the caller and cache it.
    ///
    /// Fails with [`Error::TooManyMatches`] when the caller already owns a
    /// table of that name.
    pub fn create(
        &mut self,
        name: &str,
        meta: &[MetadataColumn],
        feature_names: &[String],
    ) -> Result<FeatureTableHandle<S>> {
        match self.get(name, None) {
            Ok(_) => {
                return Err(Error::TooManyMatches(format!(
                    "Table '{name}' already exists for user {}",
                    self.user
                )));
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let mut table = self.unopened(name);
        table.open_or_create(Some(self.user), Some((meta, feature_names)), None)?;
        let handle = FeatureTableHandle::new(table);
        self.cache.insert((name.to_string(), self.user), handle.clone());
        debug!(table = name, user = %self.user, "cached new feature table");
        Ok(handle)
    }

    /// Return the table `name` owned by `owner` (the caller by default),
    /// opening it when it is not cached or its cached handle was closed.
    pub fn get(&mut self, name: &str, owner: Option<UserId>) -> Result<FeatureTableHandle<S>> {
        let owner = owner.unwrap_or(self.user);
        let key = (name.to_string(), owner);
        if let Some(handle) = self.cache.get(&key).filter(|handle| handle.is_open()) {
            return Ok(handle.clone());
        }

        let mut table = self.unopened(name);
        table.open(None, Some(owner))?;
        debug!(table = name, %owner, "opened feature table");
        let handle = FeatureTableHandle::new(table);
        self.cache.insert(key, handle.clone());
        Ok(handle)
    }

    /// Close every cached table that is not checked out elsewhere and empty
    /// the cache.
    pub fn close(&mut self) {
        self.cache.close();
    }
}

impl<S: Session> fmt::Debug for FeatureTableManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureTableManager")
            .field("user", &self.user)
            .field("feature_space", &self.feature_space)
            .field("annotation_space", &self.annotation_space)
            .field("cached", &self.cache.len())
            .finish()
    }
}
