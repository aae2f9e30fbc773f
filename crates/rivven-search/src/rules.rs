//! Compiled sync rules
//!
//! Table patterns are anchored regexes (full-string match). Column maps are
//! parsed into [`ColumnDirective`]s once, when the configuration is compiled.

use regex::Regex;
use std::collections::HashMap;

use crate::config::SyncGroupConfig;
use crate::error::{Result, SyncError};
use crate::types::FieldType;

/// Per-column override from a rule's column map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDirective {
    /// Field name override
    pub target_name: Option<String>,
    /// Field type override
    pub target_type: Option<FieldType>,
}

impl ColumnDirective {
    /// Parse a raw directive.
    ///
    /// - `name` sets the field name
    /// - `name,type` sets both; either side may be blank
    /// - a blank directive yields `None` (column keeps its defaults)
    /// - more than one comma is rejected
    pub fn parse(column: &str, raw: &str) -> Result<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let mut parts = raw.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default();
        let field_type = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(SyncError::InvalidDirective {
                column: column.to_string(),
                directive: raw.to_string(),
            });
        }

        let target_type = if field_type.is_empty() {
            None
        } else {
            Some(
                FieldType::parse(field_type).ok_or_else(|| SyncError::UnsupportedFieldType {
                    column: column.to_string(),
                    field_type: field_type.to_string(),
                })?,
            )
        };

        Ok(Some(Self {
            target_name: (!name.is_empty()).then(|| name.to_string()),
            target_type,
        }))
    }
}

/// Compile a table pattern into a full-match regex
fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| SyncError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// A compiled per-table rule
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pattern: String,
    regex: Regex,
    index: Option<String>,
    columns: HashMap<String, ColumnDirective>,
}

impl CompiledRule {
    /// Table pattern as configured
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Index name override
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// Whether the pattern matches the whole table name
    pub fn matches(&self, table: &str) -> bool {
        self.regex.is_match(table)
    }

    /// Directive for a source column (exact name)
    pub fn directive(&self, column: &str) -> Option<&ColumnDirective> {
        self.columns.get(column)
    }
}

/// A compiled sync group
#[derive(Debug, Clone)]
pub struct CompiledGroup {
    db_id: String,
    target_db_id: String,
    tables: Vec<Regex>,
    rules: Vec<CompiledRule>,
}

impl CompiledGroup {
    /// Compile a group from its configuration
    pub fn compile(config: &SyncGroupConfig) -> Result<Self> {
        let tables = config
            .sync_tables
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(compile_pattern)
            .collect::<Result<Vec<_>>>()?;

        if tables.is_empty() {
            return Err(SyncError::config(format!(
                "sync group for '{}' lists no tables",
                config.db_id
            )));
        }

        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let mut columns = HashMap::new();
            if let Some(map) = &rule.map {
                for (column, raw) in map.entries(&rule.table)? {
                    if let Some(directive) = ColumnDirective::parse(&column, &raw)? {
                        columns.insert(column, directive);
                    }
                }
            }

            rules.push(CompiledRule {
                pattern: rule.table.clone(),
                regex: compile_pattern(&rule.table)?,
                index: rule
                    .index
                    .as_ref()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                columns,
            });
        }

        Ok(Self {
            db_id: config.db_id.clone(),
            target_db_id: config.target_db_id.clone(),
            tables,
            rules,
        })
    }

    /// Source database id
    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    /// Target database id
    pub fn target_db_id(&self) -> &str {
        &self.target_db_id
    }

    /// Whether this group belongs to the source database (case-insensitive)
    pub fn is_for(&self, db_id: &str) -> bool {
        self.db_id.eq_ignore_ascii_case(db_id)
    }

    /// Whether any sync-table pattern matches the table
    pub fn covers(&self, table: &str) -> bool {
        self.tables.iter().any(|re| re.is_match(table))
    }

    /// First rule matching the table, with its position
    pub fn find_rule(&self, table: &str) -> Option<(usize, &CompiledRule)> {
        self.rules.iter().enumerate().find(|(_, r)| r.matches(table))
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}

/// All compiled sync groups, in declaration order
#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    groups: Vec<CompiledGroup>,
}

impl CompiledRules {
    /// Compile every group
    pub fn compile(groups: &[SyncGroupConfig]) -> Result<Self> {
        let groups = groups
            .iter()
            .map(CompiledGroup::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { groups })
    }

    /// Groups in declaration order
    pub fn groups(&self) -> &[CompiledGroup] {
        &self.groups
    }

    /// First group of the database whose sync tables cover the table
    pub fn match_table(&self, db_id: &str, table: &str) -> Option<(usize, &CompiledGroup)> {
        self.groups
            .iter()
            .enumerate()
            .find(|(_, g)| g.is_for(db_id) && g.covers(table))
    }

    /// Whether no groups are configured
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
