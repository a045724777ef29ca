
mod mode;

pub use mode::{CurrvalPolicy, Mode};

use serde::{Deserialize, Serialize};
use std::{fmt, fs, io, path::Path, path::PathBuf};
use thiserror::Error;
use types::{ConversionError, Value};

/// Identifier for a column within a table schema.
/// Examples:
/// - `let id_col: ColumnId = 1; // maps to "id"`
/// - `let name_col: ColumnId = 2; // maps to "name"`
pub type ColumnId = u16;

/// Logical identifier for a page in the storage layer.
/// Examples:
/// - `let first = PageId(0);`
/// - `let user_data_page = PageId(42);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub u64);

/// Stable position of a row in the row store.
///
/// Ordering follows storage layout and carries no meaning for index cursors.
/// Examples:
/// - `let rid = RecordId { page_id: PageId(42), slot: 3 };`
/// - `let rid = RecordId::new(PageId(0), 0);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id.0, self.slot)
    }
}

/// Positional row representation backed by `types::Value`.
/// Examples:
/// - `let row = Row::new(vec![Value::Int(1)]);`
/// - `let row = Row::new(vec![Value::Int(10), Value::Null]).with_rid(rid);`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
    #[serde(skip)]
    #[serde(default)]
    rid: Option<RecordId>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, rid: None }
    }

    pub fn with_rid(mut self, rid: RecordId) -> Self {
        self.rid = Some(rid);
        self
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }
}

/// Kind of named catalog object, used in lookup failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Schema,
    Sequence,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Schema => f.write_str("schema"),
            ObjectKind::Sequence => f.write_str("sequence"),
        }
    }
}

/// Canonical error type shared across database subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("parse: {0}")]
    Parser(String),
    #[error("syntax error in SQL statement \"{0}\"")]
    Syntax(String),
    #[error("{kind} \"{name}\" not found")]
    ObjectNotFound { kind: ObjectKind, name: String },
    #[error("exec: {0}")]
    Executor(String),
    #[error("catalog: {0}")]
    Catalog(String),
    #[error("sequence \"{0}\" has run out of numbers")]
    SequenceExhausted(String),
    #[error("current value of sequence \"{0}\" is not yet defined in this session")]
    CurrentValueUndefined(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DbError {
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        DbError::ObjectNotFound {
            kind,
            name: name.into(),
        }
    }
}

impl From<ConversionError> for DbError {
    fn from(err: ConversionError) -> Self {
        DbError::Executor(err.to_string())
    }
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the database components.
///
/// # Example
/// ```
/// use common::{Config, Mode};
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .default_schema("APP".to_string())
///     .mode(Mode::oracle())
///     .build();
/// assert!(config.mode.decimal_sequences);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct Config {
    /// Directory where catalog metadata lives.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// File name of the catalog inside `data_dir`.
    #[builder(default = "catalog.json".to_string())]
    pub catalog_file: String,
    /// Schema new sessions start in.
    #[builder(default = "PUBLIC".to_string())]
    pub default_schema: String,
    /// Compatibility mode new sessions start with.
    #[builder(default = Mode::regular())]
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            catalog_file: "catalog.json".to_string(),
            default_schema: "PUBLIC".to_string(),
            mode: Mode::regular(),
        }
    }
}

impl Config {
    /// Load a JSON config file, falling back to defaults if it does not exist.
    /// Fields missing from the file take their default values.
    pub fn load(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|err| DbError::Catalog(format!("invalid config file: {err}")))
    }

    /// Full path of the catalog file.
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(&self.catalog_file)
    }
}
