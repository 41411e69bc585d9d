//! Contains relational operators such as join, projection, limit, etc.
//!
//! Currently they are classified into two categories: logical and physical. We separate logical
//! and physical operators in two enums since they need to implement different traits. Logical
//! operators derive logical properties and statistics of a group, physical operators derive
//! physical properties required from their children.
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;
mod filter;
pub use filter::*;
mod gather;
pub use gather::*;
mod join;
pub use join::*;
mod limit;
pub use limit::*;
mod projection;
pub use projection::*;
mod sort;
pub use sort::*;
mod table_scan;
pub use table_scan::*;

use std::fmt::{Display, Formatter};

use anyhow::bail;
use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;

use crate::error::QuartziteResult;
use crate::operator::Operator::{Logical, Physical};
use crate::optimizer::OptimizerContext;
use crate::properties::{EngineKind, LogicalProperty};
use crate::stat::Statistics;

#[derive(Clone, Debug, Hash, PartialEq, EnumAsInner)]
pub enum Operator {
    Logical(LogicalOperator),
    Physical(PhysicalOperator),
}

/// Expressions in operators never contain `NaN` literals, so equality is total.
impl Eq for Operator {}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Logical(op) => write!(f, "{}", op),
            Physical(op) => write!(f, "{}", op),
        }
    }
}

/// Writes operator specific fields after operator name.
#[enum_dispatch(LogicalOperator)]
pub trait DisplayFields {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result;
}

/// Derives properties shared by all expressions of a group from the inputs' ones.
#[enum_dispatch(LogicalOperator)]
pub trait OperatorTrait {
    fn derive_logical_prop(
        &self,
        ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> QuartziteResult<LogicalProperty>;

    fn derive_statistics(
        &self,
        ctx: &OptimizerContext,
        inputs: &[&Statistics],
    ) -> QuartziteResult<Statistics>;
}

impl Operator {
    pub fn is_logical(&self) -> bool {
        matches!(self, Logical(_))
    }

    pub fn derive_logical_prop(
        &self,
        ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> QuartziteResult<LogicalProperty> {
        match self {
            Logical(op) => op.derive_logical_prop(ctx, inputs),
            Physical(op) => bail!("Can't derive logical property from {}", op),
        }
    }

    pub fn derive_statistics(
        &self,
        ctx: &OptimizerContext,
        inputs: &[&Statistics],
    ) -> QuartziteResult<Statistics> {
        match self {
            Logical(op) => op.derive_statistics(ctx, inputs),
            Physical(op) => bail!("Can't derive statistics from {}", op),
        }
    }

    /// Engine of a new group created for this operator.
    ///
    /// Gather is the boundary between storage and coordinator engine, other operators run in the
    /// engine of their first input.
    pub fn derive_engine(&self, inputs: &[EngineKind]) -> EngineKind {
        match self {
            Logical(LogicalOperator::LogicalGather(_))
            | Physical(PhysicalOperator::PhysicalGather(_)) => EngineKind::Coordinator,
            _ => inputs.first().copied().unwrap_or_default(),
        }
    }
}

/// Returns the only input of a unary operator.
pub(crate) fn single_input<'a, T>(inputs: &[&'a T], name: &str) -> QuartziteResult<&'a T> {
    match inputs {
        [input] => Ok(*input),
        _ => bail!("{} expects 1 input, but got {}", name, inputs.len()),
    }
}
