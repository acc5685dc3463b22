//! Column descriptor resolution and the record mapping cache

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::record::{FieldDef, Record};

/// Resolved layout of one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub field_name: &'static str,
    pub display_name: String,
    /// `None` = unordered, placed after every ordered column
    pub ordinal: Option<i32>,
}

/// Which side of the record a column list is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable fields, used by export
    Read,
    /// Writable fields, used by import
    Write,
}

/// Resolve the ordered column list for `fields`.
///
/// Without any explicit ordinal the declaration order is kept. Otherwise
/// columns are stably sorted by ordinal with unordered ones last.
pub fn resolve_columns(fields: &[FieldDef], access: Access) -> Vec<ColumnDescriptor> {
    let mut columns: Vec<ColumnDescriptor> = fields
        .iter()
        .filter(|f| match access {
            Access::Read => f.readable,
            Access::Write => f.writable,
        })
        .map(|f| {
            let (display_name, ordinal) = match &f.column {
                Some(attr) if !attr.display_name.is_empty() => {
                    (attr.display_name.clone(), attr.ordinal)
                }
                Some(attr) => (f.name.to_string(), attr.ordinal),
                None => (f.name.to_string(), None),
            };
            ColumnDescriptor {
                field_name: f.name,
                display_name,
                ordinal,
            }
        })
        .collect();

    if columns.iter().any(|c| c.ordinal.is_some()) {
        columns.sort_by_key(|c| (c.ordinal.is_none(), c.ordinal.unwrap_or_default()));
    }
    columns
}

/// Cached column layout for one record type
#[derive(Debug)]
pub struct RecordMapping {
    pub type_name: &'static str,
    pub fields: Vec<FieldDef>,
    /// Columns written on export
    pub export_columns: Vec<ColumnDescriptor>,
    /// Columns filled on import
    pub import_columns: Vec<ColumnDescriptor>,
    /// `import_columns[i]` is backed by `fields[import_fields[i]]`
    pub import_fields: Vec<usize>,
}

impl RecordMapping {
    pub fn build<T: Record>() -> Self {
        let fields = T::fields();
        let export_columns = resolve_columns(&fields, Access::Read);
        let import_columns = resolve_columns(&fields, Access::Write);
        let import_fields = import_columns
            .iter()
            .filter_map(|c| fields.iter().position(|f| f.name == c.field_name))
            .collect();
        Self {
            type_name: type_name::<T>(),
            fields,
            export_columns,
            import_columns,
            import_fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn export_headers(&self) -> Vec<String> {
        self.export_columns
            .iter()
            .map(|c| c.display_name.clone())
            .collect()
    }

    /// Map each worksheet header to the writable field it fills.
    ///
    /// Headers match display names first, then field names, both trimmed
    /// and case-insensitive. Unmatched headers map to `None`; a field is
    /// bound to at most one header.
    pub fn bind_headers(&self, headers: &[String]) -> Vec<Option<&FieldDef>> {
        let mut taken = vec![false; self.import_columns.len()];
        headers
            .iter()
            .map(|header| {
                let header = header.trim();
                let found = self
                    .import_columns
                    .iter()
                    .enumerate()
                    .position(|(i, c)| !taken[i] && c.display_name.trim().eq_ignore_ascii_case(header))
                    .or_else(|| {
                        self.import_columns
                            .iter()
                            .enumerate()
                            .position(|(i, c)| !taken[i] && c.field_name.eq_ignore_ascii_case(header))
                    })?;
                taken[found] = true;
                Some(&self.fields[self.import_fields[found]])
            })
            .collect()
    }
}

static MAPPINGS: Lazy<RwLock<HashMap<TypeId, Arc<RecordMapping>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Mapping for `T`, built on first use and shared for the life of the process.
pub fn mapping_for<T: Record>() -> Arc<RecordMapping> {
    let key = TypeId::of::<T>();
    if let Some(mapping) = MAPPINGS.read().get(&key) {
        return Arc::clone(mapping);
    }
    // Build outside the lock; a racing builder's entry wins and ours is dropped.
    let built = Arc::new(RecordMapping::build::<T>());
    let mut cache = MAPPINGS.write();
    Arc::clone(cache.entry(key).or_insert(built))
}
