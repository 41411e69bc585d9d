use anyhow::bail;
use datafusion::prelude::JoinType;
use enumset::EnumSet;

use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::LogicalJoin;
use crate::operator::LogicalOperatorKind;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{PhysicalHashJoin, PhysicalMergeJoin};
use crate::optimizer::Optimizer;
use crate::properties::EngineKind;
use crate::rules::RuleId::{CommutateJoin, Join2HashJoin, Join2MergeJoin};
use crate::rules::RulePromise::{High, Medium};
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref JOIN_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalJoin)
        .end_node()
    };
}

/// Commutate inner join inputs.
#[derive(Clone, Default)]
pub struct CommutateJoinRule {}

impl CommutateJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for CommutateJoinRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        match input.get_operator(ctx)? {
            Logical(LogicalJoin(join)) if join.join_type() == JoinType::Inner => {
                let op = Logical(LogicalJoin(join.clone()));
                let ret =
                    OptExpression::with_operator(op, vec![input[1].clone(), input[0].clone()]);
                result.add(ret);
                Ok(())
            }
            Logical(LogicalJoin(_)) => Ok(()),
            op => bail!("Pattern miss matched: {}", op),
        }
    }

    fn pattern(&self) -> &Pattern {
        &JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        CommutateJoin
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

/// Transforms join to hash join.
#[derive(Clone, Default)]
pub struct Join2HashJoinRule {}

impl Join2HashJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Join2HashJoinRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let Logical(LogicalJoin(join)) = input.get_operator(ctx)? {
            let hash_join_op = Physical(PhysicalHashJoin(join.clone()));
            let ret = input.clone_with_inputs(hash_join_op);

            result.add(ret);
            Ok(())
        } else {
            bail!("Miss matched pattern")
        }
    }

    fn pattern(&self) -> &Pattern {
        &JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Join2HashJoin
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }

    fn engines(&self) -> EnumSet<EngineKind> {
        EnumSet::only(EngineKind::Coordinator)
    }
}

/// Transforms inner equi join to merge join, which requires both inputs sorted on join keys.
#[derive(Clone, Default)]
pub struct Join2MergeJoinRule {}

impl Join2MergeJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Join2MergeJoinRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let Logical(LogicalJoin(join)) = input.get_operator(ctx)? {
            if join.join_type() == JoinType::Inner && join.equi_join_columns().is_some() {
                result.add(input.clone_with_inputs(Physical(PhysicalMergeJoin(join.clone()))));
            }
            Ok(())
        } else {
            bail!("Miss matched pattern")
        }
    }

    fn pattern(&self) -> &Pattern {
        &JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Join2MergeJoin
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }

    fn engines(&self) -> EnumSet<EngineKind> {
        EnumSet::only(EngineKind::Coordinator)
    }
}
