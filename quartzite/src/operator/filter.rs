use std::fmt::Formatter;

use datafusion::prelude::Expr;

use crate::error::QuartziteResult;
use crate::operator::{single_input, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::stat::Statistics;

/// Fraction of rows a filter is assumed to keep.
pub const SELECTION_FACTOR: f64 = 0.8;

#[derive(Clone, Debug, Hash, PartialEq)]
pub struct Filter {
    predicate: Expr,
}

impl Filter {
    pub fn new(predicate: Expr) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &Expr {
        &self.predicate
    }
}

impl OperatorTrait for Filter {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> QuartziteResult<LogicalProperty> {
        Ok(single_input(inputs, "Filter")?.clone())
    }

    fn derive_statistics(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&Statistics],
    ) -> QuartziteResult<Statistics> {
        let input = single_input(inputs, "Filter")?;
        Ok(input.with_row_count(input.row_count() * SELECTION_FACTOR))
    }
}

impl DisplayFields for Filter {
    fn display(&self, fmt: &mut Formatter) -> std::fmt::Result {
        fmt.debug_struct("")
            .field("predicate", &self.predicate)
            .finish()
    }
}
