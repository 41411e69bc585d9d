use enum_as_inner::EnumAsInner;
use std::fmt::{Display, Formatter};

use crate::operator::{DisplayFields, Filter, Gather, Sort};
use crate::operator::{Join, Limit, Projection, TableScan};
use enum_dispatch::enum_dispatch;
use strum_macros::{AsRefStr, EnumDiscriminants, EnumIter};

/// Logical relational operator.
///
/// [`LogicalOperatorKind`] is the fieldless twin of this enum, rules are registered by it.
#[derive(Clone, Debug, Hash, PartialEq, EnumAsInner, AsRefStr, EnumDiscriminants)]
#[strum_discriminants(name(LogicalOperatorKind), derive(Hash, EnumIter, AsRefStr))]
#[enum_dispatch]
pub enum LogicalOperator {
    LogicalLimit(Limit),
    LogicalFilter(Filter),
    LogicalProjection(Projection),
    LogicalJoin(Join),
    LogicalScan(TableScan),
    LogicalSort(Sort),
    LogicalGather(Gather),
}

impl LogicalOperator {
    pub fn kind(&self) -> LogicalOperatorKind {
        LogicalOperatorKind::from(self)
    }
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())?;
        self.display(f)
    }
}
