//! Unit-of-work session: identity map, snapshots and flush-on-close.
//!
//! # Responsibility
//! - Hand out at most one in-memory instance per `(kind, id)`.
//! - Record a snapshot for every loaded instance.
//! - Write back changed instances when the session closes.
//!
//! # Invariants
//! - Every key in the entity cache has exactly one snapshot, inserted in the
//!   same step; both maps are emptied together at close.
//! - A failed `find` leaves both maps untouched.
//! - Each load/update acquires a connection, runs one statement and drops the
//!   handle before returning.
//! - `Closed` is terminal: `find` and `close` fail with `SessionError::Closed`.

use crate::db::ConnectionSource;
use crate::mapping::descriptor::{EntityDescriptor, EntityRegistry, MappingError};
use crate::mapping::entity::Entity;
use crate::mapping::row_mapper::{self, UpdateStatement};
use crate::model::key::EntityKey;
use crate::model::value::EntityId;
use crate::session::change_tracker::{self, Snapshot};
use crate::session::error::{SessionError, SessionResult};
use log::{debug, error, info, warn};
use std::any::Any;
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Lifecycle state of a `Session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Outcome of a successful `Session::close`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Cached entries compared against their snapshots.
    pub inspected: usize,
    /// Update statements executed successfully.
    pub updated: usize,
}

/// Type-erased cache entry so one map can hold every entity kind.
trait ManagedEntity {
    fn as_any(&self) -> &dyn Any;
    fn is_dirty(&self, snapshot: &Snapshot) -> SessionResult<bool>;
    fn update_statement(&self, id: &EntityId) -> SessionResult<UpdateStatement>;
}

struct Managed<T: Entity> {
    instance: Rc<RefCell<T>>,
    descriptor: Arc<EntityDescriptor<T>>,
}

impl<T: Entity> Managed<T> {
    fn read(&self) -> SessionResult<Ref<'_, T>> {
        self.instance
            .try_borrow()
            .map_err(|_| SessionError::Serialization {
                field: T::KIND.to_string(),
                reason: "instance is mutably borrowed".to_string(),
            })
    }
}

impl<T: Entity> ManagedEntity for Managed<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_dirty(&self, snapshot: &Snapshot) -> SessionResult<bool> {
        let instance = self.read()?;
        Ok(change_tracker::is_dirty(&*self.descriptor, &*instance, snapshot))
    }

    fn update_statement(&self, id: &EntityId) -> SessionResult<UpdateStatement> {
        let instance = self.read()?;
        row_mapper::update_statement(&*self.descriptor, &*instance, id)
    }
}

/// Persistence context bounding one identity map.
///
/// A session is single-threaded: it holds `Rc` handles, is neither `Send`
/// nor `Sync`, and performs no internal locking. Create one per logical
/// thread of control from a shared `SessionFactory`.
pub struct Session {
    id: Uuid,
    source: Arc<dyn ConnectionSource>,
    registry: Arc<EntityRegistry>,
    entities: HashMap<EntityKey, Box<dyn ManagedEntity>>,
    snapshots: HashMap<EntityKey, Snapshot>,
    state: SessionState,
}

impl Session {
    pub(crate) fn new(source: Arc<dyn ConnectionSource>, registry: Arc<EntityRegistry>) -> Self {
        let id = Uuid::new_v4();
        info!("event=session_open module=session status=ok session_id={id}");
        Self {
            id,
            source,
            registry,
            entities: HashMap::new(),
            snapshots: HashMap::new(),
            state: SessionState::Open,
        }
    }

    /// Returns the instance for `(T, id)`, loading it on first access.
    ///
    /// Repeated calls with an equal key return the same `Rc` (`Rc::ptr_eq`).
    ///
    /// # Errors
    /// - `Closed` after `close()`.
    /// - `Mapping` when `T` is unregistered, `id` does not fit the id field's
    ///   type, or the row does not fit `T`.
    /// - `NotFound` when no row has this id.
    /// - `Connection` on any database failure.
    pub fn find<T: Entity>(&mut self, id: impl Into<EntityId>) -> SessionResult<Rc<RefCell<T>>> {
        self.ensure_open()?;
        let key = EntityKey::of::<T>(id);

        if let Some(entry) = self.entities.get(&key) {
            debug!(
                "event=entity_cache_hit module=session session_id={} kind={} id={}",
                self.id,
                key.kind(),
                key.id()
            );
            return entry
                .as_any()
                .downcast_ref::<Managed<T>>()
                .map(|managed| Rc::clone(&managed.instance))
                .ok_or_else(|| MappingError::KindConflict(T::KIND).into());
        }

        let descriptor = self.registry.descriptor::<T>()?;
        descriptor.check_id(key.id())?;
        let instance = self.load(&*descriptor, &key)?;
        let snapshot = change_tracker::snapshot(&*descriptor, &instance);
        let instance = Rc::new(RefCell::new(instance));
        self.track(
            key,
            Box::new(Managed {
                instance: Rc::clone(&instance),
                descriptor,
            }),
            snapshot,
        );
        Ok(instance)
    }

    /// Flushes every changed instance and ends the session.
    ///
    /// All dirty entries are attempted even when one fails; failures are
    /// returned together as `FlushIncomplete`. The cache and snapshot store
    /// are empty afterwards in every case.
    pub fn close(&mut self) -> SessionResult<FlushReport> {
        self.ensure_open()?;
        self.state = SessionState::Closed;
        let started_at = Instant::now();

        let mut entities = std::mem::take(&mut self.entities);
        let mut snapshots = std::mem::take(&mut self.snapshots);
        let mut keys: Vec<EntityKey> = entities.keys().cloned().collect();
        keys.sort();

        let mut report = FlushReport::default();
        let mut failures = Vec::new();
        for key in keys {
            let Some(entry) = entities.remove(&key) else {
                continue;
            };
            let snapshot = snapshots.remove(&key);
            report.inspected += 1;

            match self.flush_entry(&key, entry.as_ref(), snapshot.as_ref()) {
                Ok(true) => report.updated += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(
                        "event=entity_flush module=session status=error session_id={} kind={} id={} error={}",
                        self.id,
                        key.kind(),
                        key.id(),
                        err
                    );
                    failures.push((key, err));
                }
            }
        }

        let status = if failures.is_empty() { "ok" } else { "error" };
        info!(
            "event=session_close module=session status={status} session_id={} inspected={} updated={} failed={} duration_ms={}",
            self.id,
            report.inspected,
            report.updated,
            failures.len(),
            started_at.elapsed().as_millis()
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(SessionError::FlushIncomplete {
                updated: report.updated,
                failures,
            })
        }
    }

    /// Reports whether the cached `(T, id)` instance differs from its snapshot.
    ///
    /// Returns `Ok(None)` when this session does not track the key.
    pub fn is_dirty<T: Entity>(&self, id: impl Into<EntityId>) -> SessionResult<Option<bool>> {
        self.ensure_open()?;
        let key = EntityKey::of::<T>(id);
        match (self.entities.get(&key), self.snapshots.get(&key)) {
            (Some(entry), Some(snapshot)) => entry.is_dirty(snapshot).map(Some),
            _ => Ok(None),
        }
    }

    pub fn contains<T: Entity>(&self, id: impl Into<EntityId>) -> bool {
        self.entities.contains_key(&EntityKey::of::<T>(id))
    }

    /// Identifier used to correlate this session's log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn cached_len(&self) -> usize {
        self.entities.len()
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshots.len()
    }

    fn ensure_open(&self) -> SessionResult<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(SessionError::Closed),
        }
    }

    fn track(&mut self, key: EntityKey, entry: Box<dyn ManagedEntity>, snapshot: Snapshot) {
        self.snapshots.insert(key.clone(), snapshot);
        self.entities.insert(key, entry);
    }

    fn load<T: Entity>(
        &self,
        descriptor: &EntityDescriptor<T>,
        key: &EntityKey,
    ) -> SessionResult<T> {
        let started_at = Instant::now();
        let result = self.query_one(descriptor, key);
        match &result {
            Ok(_) => info!(
                "event=entity_load module=session status=ok session_id={} kind={} id={} duration_ms={}",
                self.id,
                key.kind(),
                key.id(),
                started_at.elapsed().as_millis()
            ),
            Err(SessionError::NotFound(_)) => warn!(
                "event=entity_load module=session status=not_found session_id={} kind={} id={} duration_ms={}",
                self.id,
                key.kind(),
                key.id(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=entity_load module=session status=error session_id={} kind={} id={} duration_ms={} error={}",
                self.id,
                key.kind(),
                key.id(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn query_one<T: Entity>(
        &self,
        descriptor: &EntityDescriptor<T>,
        key: &EntityKey,
    ) -> SessionResult<T> {
        let sql = row_mapper::select_sql(descriptor);
        let conn = self.source.acquire()?;
        debug!("event=sql module=session session_id={} sql={sql}", self.id);

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([key.id()])?;
        let row = rows.next()?;
        match row {
            Some(row) => row_mapper::materialize(descriptor, row),
            None => Err(SessionError::NotFound(key.clone())),
        }
    }

    /// Returns `Ok(true)` when an update was executed for the entry.
    fn flush_entry(
        &self,
        key: &EntityKey,
        entry: &dyn ManagedEntity,
        snapshot: Option<&Snapshot>,
    ) -> SessionResult<bool> {
        let dirty = match snapshot {
            Some(snapshot) => entry.is_dirty(snapshot)?,
            None => true,
        };
        if !dirty {
            return Ok(false);
        }

        let statement = entry.update_statement(key.id())?;
        let conn = self.source.acquire()?;
        debug!(
            "event=sql module=session session_id={} sql={}",
            self.id, statement.sql
        );
        let changed = conn.execute(&statement.sql, [&statement.id])?;
        if changed == 0 {
            return Err(SessionError::UpdateConflict(key.clone()));
        }

        info!(
            "event=entity_flush module=session status=ok session_id={} kind={} id={}",
            self.id,
            key.kind(),
            key.id()
        );
        Ok(true)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Open && !self.entities.is_empty() {
            warn!(
                "event=session_dropped_open module=session status=discarded session_id={} tracked={}",
                self.id,
                self.entities.len()
            );
        }
    }
}
