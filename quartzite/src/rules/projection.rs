use anyhow::bail;

use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::LogicalProjection;
use crate::operator::LogicalOperatorKind;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::PhysicalProjection;
use crate::optimizer::Optimizer;
use crate::rules::RuleId::Projection2PhysicalProjection;
use crate::rules::RulePromise::High;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref PROJECTION_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalProjection)
        .end_node()
    };
}

#[derive(Clone, Default)]
pub struct Projection2PhysicalProjectionRule {}

impl Projection2PhysicalProjectionRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Projection2PhysicalProjectionRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let Logical(LogicalProjection(projection)) = input.get_operator(ctx)? {
            let op = Physical(PhysicalProjection(projection.clone()));
            result.add(input.clone_with_inputs(op));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &PROJECTION_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Projection2PhysicalProjection
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}
