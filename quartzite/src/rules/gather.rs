use anyhow::bail;
use enumset::EnumSet;

use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::LogicalGather;
use crate::operator::LogicalOperatorKind;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::PhysicalGather;
use crate::optimizer::Optimizer;
use crate::properties::EngineKind;
use crate::rules::RuleId::Gather2PhysicalGather;
use crate::rules::RulePromise::High;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref GATHER_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalGather)
        .end_node()
    };
}

#[derive(Clone, Default)]
pub struct Gather2PhysicalGatherRule {}

impl Gather2PhysicalGatherRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Gather2PhysicalGatherRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let Logical(LogicalGather(gather)) = input.get_operator(ctx)? {
            result.add(input.clone_with_inputs(Physical(PhysicalGather(gather.clone()))));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &GATHER_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Gather2PhysicalGather
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }

    fn engines(&self) -> EnumSet<EngineKind> {
        EnumSet::only(EngineKind::Coordinator)
    }
}
