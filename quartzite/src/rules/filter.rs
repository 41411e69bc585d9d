use anyhow::bail;

use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::{LogicalFilter, LogicalGather};
use crate::operator::LogicalOperatorKind;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::PhysicalFilter;
use crate::optimizer::Optimizer;
use crate::rules::RuleId::{Filter2PhysicalFilter, PushFilterThroughGather};
use crate::rules::RulePromise::{High, LOW};
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref FILTER_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalFilter)
        .end_node()
    };
    static ref PUSH_FILTER_THROUGH_GATHER_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalFilter)
          .leaf(LogicalOperatorKind::LogicalGather)
        .end_node()
    };
}

/// Rewrites `Filter(Gather(x))` to `Gather(Filter(x))`, evaluating the predicate in storage
/// engine.
#[derive(Clone, Default)]
pub struct PushFilterThroughGatherRule {}

impl PushFilterThroughGatherRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushFilterThroughGatherRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        match (input.get_operator(ctx)?, input[0].get_operator(ctx)?) {
            (filter @ Logical(LogicalFilter(_)), gather @ Logical(LogicalGather(_))) => {
                let pushed_filter =
                    OptExpression::with_operator(filter.clone(), vec![input[0][0].clone()]);
                result.add(OptExpression::with_operator(
                    gather.clone(),
                    vec![pushed_filter],
                ));
                Ok(())
            }
            _ => bail!("Pattern miss matched"),
        }
    }

    fn pattern(&self) -> &Pattern {
        &PUSH_FILTER_THROUGH_GATHER_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        PushFilterThroughGather
    }

    fn rule_promise(&self) -> RulePromise {
        LOW
    }
}

#[derive(Clone, Default)]
pub struct Filter2PhysicalFilterRule {}

impl Filter2PhysicalFilterRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Filter2PhysicalFilterRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let Logical(LogicalFilter(filter)) = input.get_operator(ctx)? {
            result.add(input.clone_with_inputs(Physical(PhysicalFilter(filter.clone()))));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &FILTER_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Filter2PhysicalFilter
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}
