use std::collections::HashMap;
use std::fmt::Formatter;
use std::sync::Arc;

use anyhow::anyhow;
use datafusion::common::{DFField, DFSchema};
use datafusion::prelude::Column;

use crate::catalog::{IndexMeta, TableMeta};
use crate::error::QuartziteResult;
use crate::operator::{DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{LogicalProperty, SortItem};
use crate::stat::{ColumnStatistics, Statistics};
use crate::utils::DisplayList;

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableScan {
    limit: Option<usize>,
    table_name: String,
}

impl TableScan {
    pub fn new<S: Into<String>>(table_name: S) -> Self {
        Self {
            limit: None,
            table_name: table_name.into(),
        }
    }

    pub fn with_limit<S: Into<String>>(table_name: S, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            table_name: table_name.into(),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

pub(crate) fn table_meta(ctx: &OptimizerContext, table_name: &str) -> QuartziteResult<Arc<TableMeta>> {
    ctx.catalog
        .table(table_name)
        .ok_or_else(|| anyhow!("Table {:?} not exists", table_name))
}

impl OperatorTrait for TableScan {
    fn derive_logical_prop(
        &self,
        ctx: &OptimizerContext,
        _inputs: &[&LogicalProperty],
    ) -> QuartziteResult<LogicalProperty> {
        let schema = table_meta(ctx, &self.table_name)?.schema();

        let table_fields = schema
            .fields()
            .iter()
            .map(|f| DFField::from_qualified(&self.table_name, f.clone()))
            .collect();

        let table_schema =
            DFSchema::new_with_metadata(table_fields, schema.metadata().clone())?;
        Ok(LogicalProperty::new(table_schema))
    }

    fn derive_statistics(
        &self,
        ctx: &OptimizerContext,
        _inputs: &[&Statistics],
    ) -> QuartziteResult<Statistics> {
        let table = table_meta(ctx, &self.table_name)?;
        let row_count = match self.limit {
            Some(limit) => table.row_count().min(limit as f64),
            None => table.row_count(),
        };

        let column_stats: HashMap<Column, ColumnStatistics> = table
            .column_ndv()
            .iter()
            .map(|(name, ndv)| (table.column(name), ColumnStatistics::new(*ndv)))
            .collect();

        Ok(Statistics::new(table.row_count())
            .with_column_stats(column_stats)
            .with_row_count(row_count))
    }
}

impl DisplayFields for TableScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("table_name", &self.table_name);
        if let Some(limit) = self.limit {
            s.field("limit", &limit);
        }
        s.finish()
    }
}

/// Scan of a secondary index, returns rows ordered by index columns.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct IndexScan {
    table_name: String,
    index_name: String,
    columns: Vec<Column>,
}

impl IndexScan {
    pub fn new(table: &TableMeta, index: &IndexMeta) -> Self {
        Self {
            table_name: table.name().to_string(),
            index_name: index.name().to_string(),
            columns: index.columns().iter().map(|c| table.column(c)).collect(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn order(&self) -> Vec<SortItem> {
        self.columns.iter().cloned().map(SortItem::asc).collect()
    }
}

impl DisplayFields for IndexScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("table_name", &self.table_name)
            .field("index", &self.index_name)
            .field("columns", &DisplayList(&self.columns))
            .finish()
    }
}
