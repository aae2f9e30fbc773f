//! Core data model for rivven-search
//!
//! - `FieldType`: the closed set of target index field types
//! - `SourceType`: native column type codes reported by the source database
//! - `TableMeta` / `ColumnMeta`: a source table resolved against the sync rules
//! - `ChangeRequest`: one insert/update/delete to apply to the target index

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::SyncError;

/// Target index field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Analyzed full-text string
    Text,
    /// Exact-match string
    Keyword,
    /// 64-bit integer
    Long,
    /// 32-bit integer
    Integer,
    /// 16-bit integer
    Short,
    /// 8-bit integer
    Byte,
    /// 64-bit float
    Double,
    /// 32-bit float
    Float,
    /// 16-bit float
    HalfFloat,
    /// true/false
    Boolean,
    /// Date or timestamp
    Date,
    /// Base64 encoded binary
    Binary,
    /// IPv4/IPv6 address
    Ip,
}

impl FieldType {
    /// All supported field types
    pub const ALL: [FieldType; 13] = [
        Self::Text,
        Self::Keyword,
        Self::Long,
        Self::Integer,
        Self::Short,
        Self::Byte,
        Self::Double,
        Self::Float,
        Self::HalfFloat,
        Self::Boolean,
        Self::Date,
        Self::Binary,
        Self::Ip,
    ];

    /// Name used in index mappings
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Keyword => "keyword",
            Self::Long => "long",
            Self::Integer => "integer",
            Self::Short => "short",
            Self::Byte => "byte",
            Self::Double => "double",
            Self::Float => "float",
            Self::HalfFloat => "half_float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Binary => "binary",
            Self::Ip => "ip",
        }
    }

    /// Text and keyword columns get a composite exact + full-text mapping
    #[inline]
    pub const fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Keyword)
    }

    /// Look up a field type by its mapping name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native source column type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SourceType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Numeric,
    Decimal,
    Double,
    Float,
    Real,
    Char,
    NChar,
    Varchar,
    NVarchar,
    LongVarchar,
    Clob,
    NClob,
    Date,
    Time,
    Timestamp,
    Binary,
    /// Anything else, carrying the vendor type name or JDBC code
    Other(String),
}

impl SourceType {
    /// Map a `java.sql.Types` code, as reported by JDBC-style metadata
    pub fn from_jdbc_code(code: i32) -> Self {
        match code {
            16 => Self::Boolean,
            -6 => Self::TinyInt,
            5 => Self::SmallInt,
            4 => Self::Integer,
            -5 => Self::BigInt,
            2 => Self::Numeric,
            3 => Self::Decimal,
            8 => Self::Double,
            6 => Self::Float,
            7 => Self::Real,
            1 => Self::Char,
            -15 => Self::NChar,
            12 => Self::Varchar,
            -9 => Self::NVarchar,
            -1 | -16 => Self::LongVarchar,
            2005 => Self::Clob,
            2011 => Self::NClob,
            91 => Self::Date,
            92 => Self::Time,
            93 => Self::Timestamp,
            -2 | -3 | -4 | 2004 => Self::Binary,
            other => Self::Other(format!("jdbc:{}", other)),
        }
    }

    /// Map a vendor type name such as `varchar(255)` or `int unsigned`
    pub fn from_type_name(type_name: &str) -> Self {
        let lower = type_name.trim().to_lowercase();
        let base = lower.split('(').next().unwrap_or_default();
        let base = base
            .trim_end_matches(" zerofill")
            .trim_end_matches(" unsigned")
            .trim_end_matches(" signed")
            .trim();

        match base {
            "bool" | "boolean" => Self::Boolean,
            "tinyint" => Self::TinyInt,
            "smallint" | "int2" => Self::SmallInt,
            "int" | "integer" | "int4" | "mediumint" | "serial" => Self::Integer,
            "bigint" | "int8" | "bigserial" => Self::BigInt,
            "numeric" => Self::Numeric,
            "decimal" | "dec" => Self::Decimal,
            "double" | "double precision" | "float8" => Self::Double,
            "float" | "float4" => Self::Float,
            "real" => Self::Real,
            "char" | "character" | "bpchar" => Self::Char,
            "nchar" => Self::NChar,
            "varchar" | "character varying" => Self::Varchar,
            "nvarchar" => Self::NVarchar,
            "text" | "tinytext" | "mediumtext" | "longtext" | "ntext" => Self::LongVarchar,
            "clob" => Self::Clob,
            "nclob" => Self::NClob,
            "date" => Self::Date,
            "time" => Self::Time,
            "datetime" | "datetime2" | "timestamp" | "timestamptz" => Self::Timestamp,
            "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob"
            | "bytea" => Self::Binary,
            _ => Self::Other(base.to_string()),
        }
    }
}

/// A column as described by the source database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    /// Native column name
    pub name: String,
    /// Native column type
    pub source_type: SourceType,
}

impl SourceColumn {
    /// Create a source column
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            source_type,
        }
    }
}

/// A table as described by the source database, before rule resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    /// Source database id
    pub db_id: String,
    /// Table name
    pub name: String,
    /// Columns in canonical (ordinal) order
    pub columns: Vec<SourceColumn>,
}

impl SourceTable {
    /// Create an empty source table
    pub fn new(db_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            db_id: db_id.into(),
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Append a column
    pub fn with_column(mut self, name: impl Into<String>, source_type: SourceType) -> Self {
        self.columns.push(SourceColumn::new(name, source_type));
        self
    }
}

/// Cache key of a resolved table: (source db id, source table)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    /// Source database id
    pub db_id: String,
    /// Source table name
    pub table: String,
}

impl TableKey {
    /// Create a table key. The db id is lowercased; the table name is kept.
    pub fn new(db_id: impl Into<String>, table: impl Into<String>) -> Self {
        let db_id: String = db_id.into();
        Self {
            db_id: db_id.to_lowercase(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}", self.db_id, self.table)
    }
}

/// Which rule produced a `TableMeta`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    /// A configured rule's table pattern matched
    Rule {
        /// Index of the sync group
        group: usize,
        /// Index of the rule within the group
        rule: usize,
        /// The rule's table pattern
        pattern: String,
    },
    /// The group matched but none of its rules did; defaults were applied
    NoRuleMatched {
        /// Index of the sync group
        group: usize,
    },
}

impl RuleMatch {
    /// Whether a configured rule was applied
    #[inline]
    pub fn is_rule(&self) -> bool {
        matches!(self, Self::Rule { .. })
    }
}

/// A source column resolved to its target field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Native column name
    pub source_name: String,
    /// Native column type
    pub source_type: SourceType,
    /// Field name in the target index
    pub target_name: String,
    /// Field type in the target index
    pub target_type: FieldType,
}

/// A source table resolved against the sync rules
///
/// Created once per (source db, source table) by the rule engine and shared
/// read-only through `Arc` afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    /// Source database id
    pub source_db_id: String,
    /// Source table name
    pub source_table: String,
    /// Target database id (selects the target store)
    pub target_db_id: String,
    /// Target index name: the override if configured, else the source table name
    pub target_table: String,
    /// Index name override from the matched rule
    pub index_override: Option<String>,
    /// Columns in canonical field order
    pub columns: Vec<ColumnMeta>,
    /// Rule resolution path
    pub rule_match: RuleMatch,
}

impl TableMeta {
    /// Name of the physical target index
    #[inline]
    pub fn index_name(&self) -> &str {
        &self.target_table
    }

    /// Cache key of this table
    pub fn key(&self) -> TableKey {
        TableKey::new(&self.source_db_id, &self.source_table)
    }

    /// Get column by source name
    pub fn column(&self, source_name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.source_name == source_name)
    }

    /// Target field names in canonical order
    pub fn target_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.target_name.as_str()).collect()
    }
}

/// Change event classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmlKind {
    /// Row inserted
    Insert,
    /// Row updated
    Update,
    /// Row deleted
    Delete,
}

impl DmlKind {
    /// Lowercase name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for DmlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DmlKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" | "i" | "c" | "create" => Ok(Self::Insert),
            "update" | "u" => Ok(Self::Update),
            "delete" | "d" => Ok(Self::Delete),
            _ => Err(SyncError::UnknownDmlKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// A single change to apply to the target index
#[derive(Debug, Clone)]
pub struct ChangeRequest {
    /// DML kind
    pub kind: DmlKind,
    /// Resolved table
    pub table: Arc<TableMeta>,
    /// Primary key value in string form, used as the document id
    pub pk: String,
    /// Target column name -> value (empty for deletes)
    pub values: Map<String, Value>,
}

impl ChangeRequest {
    /// Create a request of the given kind
    pub fn new(
        kind: DmlKind,
        table: Arc<TableMeta>,
        pk: impl Into<String>,
        values: Map<String, Value>,
    ) -> Self {
        Self {
            kind,
            table,
            pk: pk.into(),
            values,
        }
    }

    /// Create an insert request
    pub fn insert(table: Arc<TableMeta>, pk: impl Into<String>, values: Map<String, Value>) -> Self {
        Self::new(DmlKind::Insert, table, pk, values)
    }

    /// Create an update (upsert) request
    pub fn update(table: Arc<TableMeta>, pk: impl Into<String>, values: Map<String, Value>) -> Self {
        Self::new(DmlKind::Update, table, pk, values)
    }

    /// Create a delete request
    pub fn delete(table: Arc<TableMeta>, pk: impl Into<String>) -> Self {
        Self::new(DmlKind::Delete, table, pk, Map::new())
    }

    /// Resolved table of this request
    #[inline]
    pub fn table_meta(&self) -> &Arc<TableMeta> {
        &self.table
    }

    /// Name of the target index
    #[inline]
    pub fn index_name(&self) -> &str {
        self.table.index_name()
    }

    /// Target database id
    #[inline]
    pub fn target_db_id(&self) -> &str {
        &self.table.target_db_id
    }
}
