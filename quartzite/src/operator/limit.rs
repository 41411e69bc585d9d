use std::fmt::Formatter;

use crate::error::QuartziteResult;
use crate::operator::{single_input, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::stat::Statistics;

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Limit {
    limit: usize,
}

impl Limit {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl OperatorTrait for Limit {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> QuartziteResult<LogicalProperty> {
        Ok(single_input(inputs, "Limit")?.clone())
    }

    fn derive_statistics(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&Statistics],
    ) -> QuartziteResult<Statistics> {
        let input = single_input(inputs, "Limit")?;
        Ok(input.with_row_count(input.row_count().min(self.limit as f64)))
    }
}

impl DisplayFields for Limit {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("").field("limit", &self.limit).finish()
    }
}
