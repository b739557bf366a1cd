use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use fstore_result::{Error, Result};
use fstore_types::{FileId, ObjectId, UserId, Value};
use rustc_hash::FxHashMap;
use tracing::debug;

use super::stats::{CallStats, CallStatsSnapshot};
use super::table::{MemTable, TableData};
use crate::objects::{
    Criteria, FILE_ANNOTATION, FileRef, ORIGINAL_FILE, ObjectDetails, ObjectRecord, Permissions,
    annotation_link_kind, fields,
};
use crate::traits::{IdentityService, ObjectRepository, TableService};

type TableSlot = Arc<RwLock<TableData>>;

/// State shared by every [`MemSession`] cloned from the same root.
#[derive(Debug)]
pub(crate) struct MemState {
    next_id: AtomicI64,
    objects: RwLock<FxHashMap<ObjectId, ObjectRecord>>,
    tables: RwLock<FxHashMap<FileId, TableSlot>>,
    pub(crate) stats: CallStats,
    pub(crate) fail_initialize: AtomicBool,
    raw_table_paths: AtomicBool,
}

fn poisoned(what: &str) -> Error {
    Error::Internal(format!("MemSession {what} lock poisoned"))
}

impl MemState {
    fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            objects: RwLock::new(FxHashMap::default()),
            tables: RwLock::new(FxHashMap::default()),
            stats: CallStats::default(),
            fail_initialize: AtomicBool::new(false),
            raw_table_paths: AtomicBool::new(false),
        }
    }

    fn alloc_id(&self) -> ObjectId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn insert_object(
        &self,
        kind: &str,
        owner: UserId,
        fields: FxHashMap<String, Value>,
    ) -> Result<ObjectRecord> {
        let record = ObjectRecord {
            kind: kind.to_string(),
            id: self.alloc_id(),
            details: ObjectDetails {
                owner,
                permissions: Permissions::default(),
            },
            fields,
        };
        self.objects
            .write()
            .map_err(|_| poisoned("objects"))?
            .insert(record.id, record.clone());
        Ok(record)
    }

    fn object(&self, kind: &str, id: ObjectId) -> Result<ObjectRecord> {
        self.objects
            .read()
            .map_err(|_| poisoned("objects"))?
            .get(&id)
            .filter(|r| r.kind == kind)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{kind}:{id}")))
    }

    pub(crate) fn file(&self, id: FileId) -> Result<FileRef> {
        FileRef::try_from(&self.object(ORIGINAL_FILE, id.0)?)
    }

    fn table(&self, id: FileId) -> Result<TableSlot> {
        self.tables
            .read()
            .map_err(|_| poisoned("tables"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Backend(format!("file {id} does not hold a table")))
    }
}

/// In-memory session implementing every collaborator trait.
///
/// Clones and [`for_user`](Self::for_user) views share the same objects and
/// tables, so one user can create a table that another user then opens.
#[derive(Debug, Clone)]
pub struct MemSession {
    state: Arc<MemState>,
    user: UserId,
}

impl MemSession {
    pub fn new(user: UserId) -> Self {
        Self {
            state: Arc::new(MemState::new()),
            user,
        }
    }

    /// A session for another user over the same stored state.
    pub fn for_user(&self, user: UserId) -> Self {
        Self {
            state: Arc::clone(&self.state),
            user,
        }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    /// Make the next `initialize` calls fail until reset.
    pub fn set_fail_initialize(&self, fail: bool) {
        self.state.fail_initialize.store(fail, Ordering::Release);
    }

    /// Store new tables with the whole path as the file name and an empty
    /// directory, the way some table services lay out files.
    pub fn set_raw_table_paths(&self, raw: bool) {
        self.state.raw_table_paths.store(raw, Ordering::Release);
    }

    pub fn set_permissions(&self, id: ObjectId, permissions: Permissions) -> Result<()> {
        let mut objects = self.state.objects.write().map_err(|_| poisoned("objects"))?;
        let record = objects
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("object {id}")))?;
        record.details.permissions = permissions;
        Ok(())
    }

    /// Create a domain object owned by this session's user.
    pub fn create_object(&self, kind: &str, fields: Vec<(&str, Value)>) -> Result<ObjectId> {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Ok(self.state.insert_object(kind, self.user, fields)?.id)
    }

    pub fn object(&self, id: ObjectId) -> Option<ObjectRecord> {
        self.state
            .objects
            .read()
            .ok()
            .and_then(|objects| objects.get(&id).cloned())
    }

    pub fn count_objects(&self, kind: &str) -> usize {
        self.state
            .objects
            .read()
            .map(|objects| objects.values().filter(|r| r.kind == kind).count())
            .unwrap_or(0)
    }

    /// Raw rows currently stored for a table.
    pub fn table_rows(&self, file: FileId) -> Result<Vec<Vec<Value>>> {
        let slot = self.state.table(file)?;
        let data = slot.read().map_err(|_| poisoned("table"))?;
        Ok(data.rows.clone())
    }

    pub fn stats(&self) -> CallStatsSnapshot {
        self.state.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.state.stats.reset();
    }
}

impl TableService for MemSession {
    type Table = MemTable;

    fn new_table(&self, repository_id: i64, path: &str) -> Result<MemTable> {
        CallStats::bump(&self.state.stats.new_table);
        let (dir, name) = match path.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", path),
        };
        if name.is_empty() {
            return Err(Error::Backend(format!("invalid table path '{path}'")));
        }
        let (dir, name) = if self.state.raw_table_paths.load(Ordering::Acquire) {
            ("", path)
        } else {
            (dir, name)
        };
        let mut file_fields = FxHashMap::default();
        file_fields.insert(fields::NAME.to_string(), Value::from(name));
        file_fields.insert(fields::PATH.to_string(), Value::from(dir));
        let record = self
            .state
            .insert_object(ORIGINAL_FILE, self.user, file_fields)?;
        let file_id = FileId(record.id);
        let data: TableSlot = Arc::new(RwLock::new(TableData::default()));
        self.state
            .tables
            .write()
            .map_err(|_| poisoned("tables"))?
            .insert(file_id, Arc::clone(&data));
        debug!(repository_id, path, file = %file_id, "mem session created table");
        Ok(MemTable::new(file_id, Arc::clone(&self.state), data))
    }

    fn open_table(&self, file: &FileRef) -> Result<MemTable> {
        CallStats::bump(&self.state.stats.open_table);
        self.state.file(file.id)?;
        let data = self.state.table(file.id)?;
        Ok(MemTable::new(file.id, Arc::clone(&self.state), data))
    }
}

impl ObjectRepository for MemSession {
    fn find_objects(&self, kind: &str, criteria: &Criteria) -> Result<Vec<ObjectRecord>> {
        let objects = self.state.objects.read().map_err(|_| poisoned("objects"))?;
        let mut found: Vec<ObjectRecord> = objects
            .values()
            .filter(|r| r.kind == kind && criteria.matches(r))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }

    fn save_file(&self, file: &FileRef) -> Result<FileRef> {
        CallStats::bump(&self.state.stats.save_file);
        {
            let mut objects = self.state.objects.write().map_err(|_| poisoned("objects"))?;
            let record = objects
                .get_mut(&file.id.0)
                .filter(|r| r.kind == ORIGINAL_FILE)
                .ok_or_else(|| Error::NotFound(format!("{ORIGINAL_FILE}:{}", file.id)))?;
            record
                .fields
                .insert(fields::NAME.to_string(), Value::from(file.name.as_str()));
            record
                .fields
                .insert(fields::PATH.to_string(), Value::from(file.path.as_str()));
        }
        self.state.file(file.id)
    }

    fn link_file_annotation(
        &self,
        parent_kind: &str,
        parent_id: ObjectId,
        ns: &str,
        file: FileId,
    ) -> Result<ObjectRecord> {
        CallStats::bump(&self.state.stats.link_file_annotation);
        self.state.object(parent_kind, parent_id)?;
        self.state.file(file)?;

        let mut annotation_fields = FxHashMap::default();
        annotation_fields.insert(fields::NS.to_string(), Value::from(ns));
        annotation_fields.insert(fields::FILE.to_string(), Value::Long(file.0));
        let annotation = self
            .state
            .insert_object(FILE_ANNOTATION, self.user, annotation_fields)?;

        let mut link_fields = FxHashMap::default();
        link_fields.insert(fields::PARENT.to_string(), Value::Long(parent_id));
        link_fields.insert(fields::CHILD.to_string(), Value::Long(annotation.id));
        self.state
            .insert_object(&annotation_link_kind(parent_kind), self.user, link_fields)
    }

    fn delete_object(&self, kind: &str, id: ObjectId) -> Result<()> {
        CallStats::bump(&self.state.stats.delete_object);
        {
            let mut objects = self.state.objects.write().map_err(|_| poisoned("objects"))?;
            if !objects.get(&id).is_some_and(|r| r.kind == kind) {
                return Err(Error::NotFound(format!("{kind}:{id}")));
            }
            objects.remove(&id);
        }
        if kind == ORIGINAL_FILE {
            self.state
                .tables
                .write()
                .map_err(|_| poisoned("tables"))?
                .remove(&FileId(id));
        }
        Ok(())
    }
}

impl IdentityService for MemSession {
    fn current_user(&self) -> Result<UserId> {
        Ok(self.user)
    }
}
