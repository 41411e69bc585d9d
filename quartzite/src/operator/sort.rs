use std::fmt::Formatter;

use crate::error::QuartziteResult;
use crate::operator::{single_input, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{LogicalProperty, OrderSpec, SortItem};
use crate::stat::Statistics;

/// Sorts rows of its input, used by `ORDER BY` and by order enforcer.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct Sort {
    items: Vec<SortItem>,
}

impl Sort {
    pub fn new<I: IntoIterator<Item = SortItem>>(items: I) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn items(&self) -> &[SortItem] {
        &self.items
    }

    pub fn order(&self) -> OrderSpec {
        OrderSpec::new(self.items.iter().cloned())
    }
}

impl OperatorTrait for Sort {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> QuartziteResult<LogicalProperty> {
        Ok(single_input(inputs, "Sort")?.clone())
    }

    fn derive_statistics(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&Statistics],
    ) -> QuartziteResult<Statistics> {
        Ok(single_input(inputs, "Sort")?.clone())
    }
}

impl DisplayFields for Sort {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("").field("items", &self.items).finish()
    }
}
