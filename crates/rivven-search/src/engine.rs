//! Rule engine: resolves source tables to target-side metadata
//!
//! Resolution happens at most once per (source db, table), with the db id
//! compared case-insensitively as sync groups do. Concurrent callers
//! for the same key wait on a single computation; a failed computation is not
//! cached, so the next caller retries.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::metadata::MetadataProvider;
use crate::rules::{CompiledRule, CompiledRules};
use crate::type_map::infer_target_type;
use crate::types::{ColumnMeta, RuleMatch, SourceColumn, TableKey, TableMeta};

/// Resolves and caches `TableMeta`
pub struct RuleEngine {
    rules: CompiledRules,
    metadata: Arc<dyn MetadataProvider>,
    cache: DashMap<TableKey, Arc<OnceCell<Arc<TableMeta>>>>,
}

impl RuleEngine {
    /// Create an engine over compiled rules and a metadata provider
    pub fn new(rules: CompiledRules, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self {
            rules,
            metadata,
            cache: DashMap::new(),
        }
    }

    /// Compiled rules
    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    /// Resolve a table, computing and caching its metadata on first use.
    ///
    /// Fails with `TableNotConfigured` if no sync group of the database
    /// covers the table.
    pub async fn resolve_table(&self, db_id: &str, table: &str) -> Result<Arc<TableMeta>> {
        let key = TableKey::new(db_id, table);
        if let Some(meta) = self.get_by_key(&key) {
            return Ok(meta);
        }

        if self.rules.match_table(db_id, table).is_none() {
            return Err(SyncError::TableNotConfigured {
                db_id: db_id.to_string(),
                table: table.to_string(),
            });
        }

        let cell = self.cache.entry(key).or_default().clone();
        let meta = cell.get_or_try_init(|| self.build(db_id, table)).await?;
        Ok(meta.clone())
    }

    /// Cached metadata, if the table has been resolved
    pub fn get(&self, db_id: &str, table: &str) -> Option<Arc<TableMeta>> {
        self.get_by_key(&TableKey::new(db_id, table))
    }

    fn get_by_key(&self, key: &TableKey) -> Option<Arc<TableMeta>> {
        self.cache
            .get(key)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of resolved tables
    pub fn cached_tables(&self) -> usize {
        self.cache.iter().filter(|e| e.value().initialized()).count()
    }

    /// Resolve every covered table of the given source databases.
    ///
    /// Tables not covered by any group are skipped. Returns the number of
    /// newly resolved tables; the first failure aborts the pass.
    pub async fn initialize(&self, datasources: &[String]) -> Result<usize> {
        let mut resolved = 0;
        for db_id in datasources {
            let tables = self.metadata.list_tables(db_id).await?;
            for table in &tables {
                if self.rules.match_table(db_id, table).is_none() || self.get(db_id, table).is_some()
                {
                    continue;
                }
                self.resolve_table(db_id, table).await?;
                resolved += 1;
            }
        }

        info!(
            datasources = datasources.len(),
            tables = resolved,
            "Sync rules initialized"
        );
        Ok(resolved)
    }

    async fn build(&self, db_id: &str, table: &str) -> Result<Arc<TableMeta>> {
        let (group_pos, group) =
            self.rules
                .match_table(db_id, table)
                .ok_or_else(|| SyncError::TableNotConfigured {
                    db_id: db_id.to_string(),
                    table: table.to_string(),
                })?;

        let source = self.metadata.require_table(db_id, table).await?;
        let rule = group.find_rule(table);

        let columns = source
            .columns
            .iter()
            .map(|c| resolve_column(c, rule.map(|(_, r)| r)))
            .collect();

        let index_override = rule.and_then(|(_, r)| r.index()).map(str::to_string);
        let rule_match = match rule {
            Some((pos, r)) => RuleMatch::Rule {
                group: group_pos,
                rule: pos,
                pattern: r.pattern().to_string(),
            },
            None => RuleMatch::NoRuleMatched { group: group_pos },
        };

        let meta = TableMeta {
            source_db_id: db_id.to_string(),
            source_table: table.to_string(),
            target_db_id: group.target_db_id().to_string(),
            target_table: index_override.clone().unwrap_or_else(|| table.to_string()),
            index_override,
            columns,
            rule_match,
        };

        debug!(
            db_id,
            table,
            index = meta.index_name(),
            target = %meta.target_db_id,
            columns = meta.columns.len(),
            rule_matched = meta.rule_match.is_rule(),
            "Resolved table"
        );

        Ok(Arc::new(meta))
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("groups", &self.rules.groups().len())
            .field("cached_tables", &self.cached_tables())
            .finish()
    }
}

/// Apply a rule's directive (if any) to a source column.
///
/// Without a directive the field is the lowercased column name with the
/// inferred type.
fn resolve_column(column: &SourceColumn, rule: Option<&CompiledRule>) -> ColumnMeta {
    let directive = rule.and_then(|r| r.directive(&column.name));

    let target_name = directive
        .and_then(|d| d.target_name.clone())
        .unwrap_or_else(|| column.name.to_lowercase());
    let target_type = directive
        .and_then(|d| d.target_type)
        .unwrap_or_else(|| infer_target_type(&column.source_type));

    ColumnMeta {
        source_name: column.name.clone(),
        source_type: column.source_type.clone(),
        target_name,
        target_type,
    }
}
