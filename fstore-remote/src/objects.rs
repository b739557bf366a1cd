//! Records held by the object repository.
//!
//! The repository stores loosely typed records identified by a kind string
//! (`"OriginalFile"`, `"FileAnnotation"`, `"ImageAnnotationLink"`, ...) and a
//! numeric id. Each record carries ownership details and a small bag of named
//! fields used for lookups.

use fstore_result::{Error, Result};
use fstore_types::{FileId, ObjectId, UserId, Value};
use rustc_hash::FxHashMap;

/// Kind of the file object backing a remote table.
pub const ORIGINAL_FILE: &str = "OriginalFile";

/// Kind of an annotation wrapping a file under a namespace.
pub const FILE_ANNOTATION: &str = "FileAnnotation";

/// Suffix shared by every annotation link kind.
pub const ANNOTATION_LINK_SUFFIX: &str = "AnnotationLink";

/// Kinds of domain object that can carry annotation links.
pub const ANNOTATABLE_KINDS: &[&str] = &[
    "Project",
    "Dataset",
    "Folder",
    "Image",
    "Screen",
    "Plate",
    "PlateAcquisition",
    "Well",
    "Roi",
    "Shape",
    "Channel",
    "Experimenter",
    "ExperimenterGroup",
    "Annotation",
];

/// Field names used in repository criteria.
pub mod fields {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const PATH: &str = "path";
    pub const OWNER: &str = "details.owner.id";
    pub const NS: &str = "ns";
    pub const FILE: &str = "file";
    pub const PARENT: &str = "parent";
    pub const CHILD: &str = "child";
}

/// Link kind for annotations attached to objects of `parent_kind`.
pub fn annotation_link_kind(parent_kind: &str) -> String {
    format!("{parent_kind}{ANNOTATION_LINK_SUFFIX}")
}

/// Every annotation link kind known to the repository.
pub fn annotation_link_kinds() -> Vec<String> {
    ANNOTATABLE_KINDS
        .iter()
        .map(|k| annotation_link_kind(k))
        .collect()
}

/// Access control bits of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub can_edit: bool,
    pub can_annotate: bool,
}

impl Permissions {
    pub const READ_ONLY: Permissions = Permissions {
        can_edit: false,
        can_annotate: false,
    };

    pub const READ_WRITE: Permissions = Permissions {
        can_edit: true,
        can_annotate: true,
    };
}

impl Default for Permissions {
    fn default() -> Self {
        Self::READ_WRITE
    }
}

/// Ownership and ACL of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectDetails {
    pub owner: UserId,
    pub permissions: Permissions,
}

/// Generic repository record.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub kind: String,
    pub id: ObjectId,
    pub details: ObjectDetails,
    pub fields: FxHashMap<String, Value>,
}

impl ObjectRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Value of a criteria field, including the pseudo fields `id` and
    /// `details.owner.id`.
    pub fn lookup(&self, name: &str) -> Value {
        match name {
            fields::ID => Value::Long(self.id),
            fields::OWNER => Value::Long(self.details.owner.0),
            other => self.fields.get(other).cloned().unwrap_or_default(),
        }
    }
}

/// The file object backing a remote table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub id: FileId,
    pub name: String,
    pub path: String,
    pub details: ObjectDetails,
}

impl FileRef {
    /// `path/name`, the location the table was created at.
    pub fn full_path(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.path, self.name)
        }
    }
}

impl TryFrom<&ObjectRecord> for FileRef {
    type Error = Error;

    fn try_from(record: &ObjectRecord) -> Result<Self> {
        if record.kind != ORIGINAL_FILE {
            return Err(Error::Internal(format!(
                "expected {ORIGINAL_FILE} record, got {}",
                record.kind
            )));
        }
        let text = |field: &str| {
            record
                .field(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok(FileRef {
            id: FileId(record.id),
            name: text(fields::NAME),
            path: text(fields::PATH),
            details: record.details,
        })
    }
}

/// One condition of a repository query.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Criterion {
    pub fn matches(&self, record: &ObjectRecord) -> bool {
        match self {
            Criterion::Eq(field, expected) => values_equal(&record.lookup(field), expected),
            Criterion::In(field, candidates) => {
                let actual = record.lookup(field);
                candidates.iter().any(|c| values_equal(&actual, c))
            }
        }
    }
}

/// Conjunction of [`Criterion`]s. An empty set matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria(pub Vec<Criterion>);

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push(Criterion::Eq(field.into(), value.into()));
        self
    }

    pub fn any_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.0.push(Criterion::In(field.into(), values));
        self
    }

    pub fn matches(&self, record: &ObjectRecord) -> bool {
        self.0.iter().all(|c| c.matches(record))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
