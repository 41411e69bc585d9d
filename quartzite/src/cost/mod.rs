//! Defines cost model.
//!
//! A [`CostModel`] estimates the cost of one physical operator, excluding its inputs. Search adds
//! up own costs of all nodes to get the total cost of a plan, so a model must be non-negative and
//! must not decrease when row counts grow, otherwise branch-and-bound pruning discards plans it
//! should keep. [`checked_cost`] verifies both when cost validation is enabled.

use std::fmt::{Display, Formatter};

use derive_more::{Add, AddAssign, Sub, SubAssign, Sum};
use smallvec::SmallVec;

use crate::error::{OptimizerError, QuartziteResult};
use crate::operator::PhysicalOperator;

mod simple;
pub use simple::*;

pub const INF: Cost = Cost(f64::INFINITY);

#[derive(
    Copy, Clone, Debug, Default, PartialOrd, PartialEq, Add, Sub, Sum, AddAssign, SubAssign,
)]
pub struct Cost(f64);

impl Cost {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Cost {
    fn from(c: f64) -> Self {
        Cost(c)
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Inputs of a cost estimation.
#[derive(Clone, Debug, PartialEq)]
pub struct CostContext {
    /// Rows produced by the operator, already capped by the expected row count of its parent.
    pub row_count: f64,
    /// Rows consumed from each input.
    pub input_row_counts: SmallVec<[f64; 2]>,
    /// Number of output columns.
    pub schema_width: usize,
}

impl CostContext {
    pub fn new<I>(row_count: f64, input_row_counts: I, schema_width: usize) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        Self {
            row_count,
            input_row_counts: input_row_counts.into_iter().collect(),
            schema_width,
        }
    }

    pub fn input_row_count(&self, idx: usize) -> f64 {
        self.input_row_counts.get(idx).copied().unwrap_or(0.0)
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            row_count: self.row_count * factor,
            input_row_counts: self.input_row_counts.iter().map(|r| r * factor).collect(),
            schema_width: self.schema_width,
        }
    }
}

pub trait CostModel: Send + Sync {
    /// Estimate cost of current operator without accumulating children's cost.
    fn estimate(&self, operator: &PhysicalOperator, ctx: &CostContext) -> QuartziteResult<Cost>;
}

/// Estimates cost with `model`, and checks the result when `validate` is on.
pub fn checked_cost(
    model: &dyn CostModel,
    operator: &PhysicalOperator,
    ctx: &CostContext,
    validate: bool,
) -> QuartziteResult<Cost> {
    let cost = model.estimate(operator, ctx)?;
    if !validate {
        return Ok(cost);
    }

    if !cost.value().is_finite() || cost.value() < 0.0 {
        return Err(OptimizerError::CostModelViolation(format!(
            "cost of {} is {:?} for {:?}",
            operator, cost, ctx
        ))
        .into());
    }

    let larger = model.estimate(operator, &ctx.scaled(2.0))?;
    if larger < cost {
        return Err(OptimizerError::CostModelViolation(format!(
            "cost of {} decreases from {:?} to {:?} when row counts double",
            operator, cost, larger
        ))
        .into());
    }

    Ok(cost)
}
