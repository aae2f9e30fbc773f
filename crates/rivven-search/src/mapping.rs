//! Index schema generation
//!
//! Produces the `mappings` body for a resolved table:
//!
//! ```json
//! {
//!   "properties": {
//!     "id":   { "type": "long" },
//!     "name": {
//!       "type": "keyword",
//!       "fields": {
//!         "ser": { "type": "text", "analyzer": "ik_max_word", "search_analyzer": "ik_smart" }
//!       }
//!     },
//!     "created": { "type": "date", "format": "yyyy-MM-dd HH:mm:ss||yyyy-MM-dd||yyyy:MM:dd||epoch_millis" }
//!   }
//! }
//! ```
//!
//! Field order follows the table's column order.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::config::MappingOptions;
use crate::error::Result;
use crate::types::{FieldType, TableMeta};

/// Declaration of one index field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMapping {
    /// Exact-match keyword with an analyzed full-text sub-field
    Composite {
        /// Sub-field name
        sub_field: String,
        /// Index-time analyzer
        analyzer: String,
        /// Search-time analyzer
        search_analyzer: String,
    },
    /// Date accepting several input formats
    Date {
        /// Accepted formats, joined with `||` on the wire
        formats: Vec<String>,
    },
    /// A plain typed field
    Plain(FieldType),
}

impl FieldMapping {
    /// Declared field type
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Composite { .. } => FieldType::Keyword,
            Self::Date { .. } => FieldType::Date,
            Self::Plain(t) => *t,
        }
    }
}

impl Serialize for FieldMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Composite {
                sub_field,
                analyzer,
                search_analyzer,
            } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", FieldType::Keyword.as_str())?;
                map.serialize_entry(
                    "fields",
                    &SubFields {
                        name: sub_field,
                        analyzer,
                        search_analyzer,
                    },
                )?;
                map.end()
            }
            Self::Date { formats } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", FieldType::Date.as_str())?;
                map.serialize_entry("format", &formats.join("||"))?;
                map.end()
            }
            Self::Plain(t) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", t.as_str())?;
                map.end()
            }
        }
    }
}

struct SubFields<'a> {
    name: &'a str,
    analyzer: &'a str,
    search_analyzer: &'a str,
}

impl Serialize for SubFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Analyzed<'a> {
            #[serde(rename = "type")]
            field_type: &'static str,
            analyzer: &'a str,
            search_analyzer: &'a str,
        }

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            self.name,
            &Analyzed {
                field_type: FieldType::Text.as_str(),
                analyzer: self.analyzer,
                search_analyzer: self.search_analyzer,
            },
        )?;
        map.end()
    }
}

/// Ordered field declarations of an index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDocument {
    fields: Vec<(String, FieldMapping)>,
}

impl SchemaDocument {
    /// Fields in declaration order
    pub fn fields(&self) -> &[(String, FieldMapping)] {
        &self.fields
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema declares no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Add a field; a repeated name replaces the earlier declaration in place
    pub fn push(&mut self, name: impl Into<String>, mapping: FieldMapping) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = mapping,
            None => self.fields.push((name, mapping)),
        }
    }

    /// Render as a JSON value
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Render as a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for SchemaDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct Properties<'a>(&'a [(String, FieldMapping)]);

        impl Serialize for Properties<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (name, mapping) in self.0 {
                    map.serialize_entry(name, mapping)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("properties", &Properties(&self.fields))?;
        map.end()
    }
}

/// Field declaration for a target type
pub fn field_mapping(field_type: FieldType, options: &MappingOptions) -> FieldMapping {
    if field_type.is_textual() {
        FieldMapping::Composite {
            sub_field: options.text_sub_field.clone(),
            analyzer: options.index_analyzer.clone(),
            search_analyzer: options.search_analyzer.clone(),
        }
    } else if field_type == FieldType::Date {
        FieldMapping::Date {
            formats: options.date_formats.clone(),
        }
    } else {
        FieldMapping::Plain(field_type)
    }
}

/// Generate the schema document of a resolved table
pub fn generate_schema(table: &TableMeta, options: &MappingOptions) -> SchemaDocument {
    let mut schema = SchemaDocument::default();
    for column in &table.columns {
        schema.push(
            column.target_name.clone(),
            field_mapping(column.target_type, options),
        );
    }
    schema
}
