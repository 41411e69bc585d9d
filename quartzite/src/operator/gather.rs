use std::fmt::Formatter;

use crate::error::QuartziteResult;
use crate::operator::{single_input, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::stat::Statistics;

/// Collects rows produced by storage engine into coordinator engine.
///
/// Its input subtree runs in storage engine, while itself and its parents run in coordinator.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct Gather {}

impl Gather {
    pub fn new() -> Self {
        Self {}
    }
}

impl OperatorTrait for Gather {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> QuartziteResult<LogicalProperty> {
        Ok(single_input(inputs, "Gather")?.clone())
    }

    fn derive_statistics(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&Statistics],
    ) -> QuartziteResult<Statistics> {
        Ok(single_input(inputs, "Gather")?.clone())
    }
}

impl DisplayFields for Gather {
    fn display(&self, _f: &mut Formatter<'_>) -> std::fmt::Result {
        Ok(())
    }
}
