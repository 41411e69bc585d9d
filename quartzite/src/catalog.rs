//! Table metadata consumed by the optimizer.
//!
//! The catalog is a read only snapshot for the duration of one optimization, so it's shared by
//! concurrent optimizations through an [`Arc`].
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use arrow_schema::SchemaRef;
use datafusion::prelude::Column;

use crate::properties::SortItem;

/// Secondary index of a table.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexMeta {
    name: String,
    columns: Vec<String>,
}

impl IndexMeta {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Everything optimizer needs to know about a table.
#[derive(Clone, Debug)]
pub struct TableMeta {
    name: String,
    schema: SchemaRef,
    row_count: f64,
    column_ndv: HashMap<String, f64>,
    /// Rows of a full table scan are returned in primary key order.
    primary_key: Vec<String>,
    indexes: Vec<IndexMeta>,
}

impl TableMeta {
    pub fn new<S: Into<String>>(name: S, schema: SchemaRef) -> Self {
        Self {
            name: name.into(),
            schema,
            row_count: 0.0,
            column_ndv: HashMap::new(),
            primary_key: vec![],
            indexes: vec![],
        }
    }

    pub fn with_row_count(mut self, row_count: f64) -> Self {
        self.row_count = row_count;
        self
    }

    pub fn with_ndv<S: Into<String>>(mut self, column: S, ndv: f64) -> Self {
        self.column_ndv.insert(column.into(), ndv);
        self
    }

    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index<N, I, S>(mut self, name: N, columns: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.push(IndexMeta {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn row_count(&self) -> f64 {
        self.row_count
    }

    pub fn column_ndv(&self) -> &HashMap<String, f64> {
        &self.column_ndv
    }

    pub fn indexes(&self) -> &[IndexMeta] {
        &self.indexes
    }

    pub fn index(&self, name: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|idx| idx.name == name)
    }

    /// Qualified column of this table.
    pub fn column(&self, name: &str) -> Column {
        Column::from_qualified_name(format!("{}.{}", self.name, name))
    }

    /// Order of rows returned by a full table scan.
    pub fn natural_order(&self) -> Vec<SortItem> {
        self.primary_key
            .iter()
            .map(|c| SortItem::asc(self.column(c)))
            .collect()
    }
}

pub trait Catalog: Send + Sync + Debug {
    fn table(&self, name: &str) -> Option<Arc<TableMeta>>;
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: HashMap<String, Arc<TableMeta>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_table(&mut self, table: TableMeta) -> Option<Arc<TableMeta>> {
        self.tables.insert(table.name.clone(), Arc::new(table))
    }
}

impl Catalog for MemoryCatalog {
    fn table(&self, name: &str) -> Option<Arc<TableMeta>> {
        self.tables.get(name).cloned()
    }
}
