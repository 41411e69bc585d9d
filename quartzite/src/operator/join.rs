use datafusion::prelude::{Column, JoinType};
use datafusion_expr::{BinaryExpr, Operator as BinaryOperator};
use std::fmt::Formatter;

use crate::error::QuartziteResult;
use crate::operator::{DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::stat::Statistics;
use crate::Expr;
use anyhow::bail;

/// Logical join operator.
#[derive(Clone, Debug, Hash, PartialEq)]
pub struct Join {
    join_type: JoinType,
    expr: Expr,
}

impl Join {
    pub fn new(join_type: JoinType, expr: Expr) -> Self {
        Self { join_type, expr }
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Columns of `a = b` condition, in the order they appear in the condition.
    pub fn equi_join_columns(&self) -> Option<(&Column, &Column)> {
        match &self.expr {
            Expr::BinaryExpr(BinaryExpr {
                left,
                op: BinaryOperator::Eq,
                right,
            }) => match (left.as_ref(), right.as_ref()) {
                (Expr::Column(l), Expr::Column(r)) => Some((l, r)),
                _ => None,
            },
            _ => None,
        }
    }
}

fn two_inputs<'a, T>(inputs: &[&'a T]) -> QuartziteResult<(&'a T, &'a T)> {
    match inputs {
        [left, right] => Ok((*left, *right)),
        _ => bail!("Join expects 2 inputs, but got {}", inputs.len()),
    }
}

impl OperatorTrait for Join {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> QuartziteResult<LogicalProperty> {
        let (left_prop, right_prop) = two_inputs(inputs)?;

        match self.join_type {
            JoinType::LeftSemi | JoinType::LeftAnti => Ok(left_prop.clone()),
            JoinType::RightSemi | JoinType::RightAnti => Ok(right_prop.clone()),
            _ => {
                let schema = left_prop.schema().join(right_prop.schema())?;
                Ok(LogicalProperty::new(schema))
            }
        }
    }

    fn derive_statistics(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&Statistics],
    ) -> QuartziteResult<Statistics> {
        let (left, right) = two_inputs(inputs)?;
        let (l, r) = (left.row_count(), right.row_count());

        let inner = match self.equi_join_columns() {
            Some((a, b)) => {
                let ndv = |c: &Column| left.ndv(c).or_else(|| right.ndv(c));
                match (ndv(a), ndv(b)) {
                    (Some(x), Some(y)) => l * r / x.max(y).max(1.0),
                    _ => l.max(r),
                }
            }
            None => l * r,
        };

        let row_count = match self.join_type {
            JoinType::Inner => inner,
            JoinType::Left => inner.max(l),
            JoinType::Right => inner.max(r),
            JoinType::Full => inner.max(l + r),
            JoinType::LeftSemi | JoinType::LeftAnti => l,
            JoinType::RightSemi | JoinType::RightAnti => r,
        };

        Ok(Statistics::merge(left, right, row_count))
    }
}

impl DisplayFields for Join {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("join_type", &self.join_type)
            .field("expr", &self.expr)
            .finish()
    }
}
