use std::collections::HashMap;

use datafusion::prelude::Column;

/// Statistics of operator.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Statistics {
    /// Total number of row count.
    ///
    /// This maybe an estimated value.
    row_count: f64,
    /// Statistics of each column.
    column_stats: HashMap<Column, ColumnStatistics>,
}

/// Statistics of one column.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ColumnStatistics {
    /// Number of distinct value of a column.
    ndv: f64,
}

impl ColumnStatistics {
    pub fn new(ndv: f64) -> Self {
        Self { ndv }
    }

    pub fn ndv(&self) -> f64 {
        self.ndv
    }
}

impl Statistics {
    pub fn new(row_count: f64) -> Self {
        Self {
            row_count,
            column_stats: HashMap::new(),
        }
    }

    pub fn with_column_stats(
        mut self,
        column_stats: HashMap<Column, ColumnStatistics>,
    ) -> Self {
        self.column_stats = column_stats;
        self
    }

    pub fn row_count(&self) -> f64 {
        self.row_count
    }

    pub fn column_stats(&self) -> &HashMap<Column, ColumnStatistics> {
        &self.column_stats
    }

    pub fn ndv(&self, column: &Column) -> Option<f64> {
        self.column_stats.get(column).map(ColumnStatistics::ndv)
    }

    /// Same column statistics with a new row count, ndv never exceeds row count.
    pub(crate) fn with_row_count(&self, row_count: f64) -> Statistics {
        Statistics {
            row_count,
            column_stats: self
                .column_stats
                .iter()
                .map(|(c, s)| (c.clone(), ColumnStatistics::new(s.ndv.min(row_count))))
                .collect(),
        }
    }

    /// Statistics of concatenated rows from two inputs, used by join.
    pub(crate) fn merge(left: &Statistics, right: &Statistics, row_count: f64) -> Statistics {
        let mut column_stats = left.column_stats.clone();
        column_stats.extend(right.column_stats.iter().map(|(c, s)| (c.clone(), *s)));
        Statistics::new(row_count)
            .with_column_stats(column_stats)
            .with_row_count(row_count)
    }
}
