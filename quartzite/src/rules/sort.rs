use anyhow::bail;
use enumset::EnumSet;

use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::LogicalSort;
use crate::operator::LogicalOperatorKind;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{PhysicalNominalSort, PhysicalSort};
use crate::optimizer::Optimizer;
use crate::properties::EngineKind;
use crate::rules::RuleId::{Sort2NominalSort, Sort2PhysicalSort};
use crate::rules::RulePromise::High;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref SORT_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalSort)
        .end_node()
    };
}

/// Implements sort with an operator sorting all input rows.
#[derive(Clone, Default)]
pub struct Sort2PhysicalSortRule {}

impl Sort2PhysicalSortRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Sort2PhysicalSortRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let Logical(LogicalSort(sort)) = input.get_operator(ctx)? {
            result.add(input.clone_with_inputs(Physical(PhysicalSort(sort.clone()))));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &SORT_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Sort2PhysicalSort
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }

    fn engines(&self) -> EnumSet<EngineKind> {
        EnumSet::only(EngineKind::Coordinator)
    }
}

/// Implements sort by asking input for the order, e.g. from an index scan.
#[derive(Clone, Default)]
pub struct Sort2NominalSortRule {}

impl Sort2NominalSortRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Sort2NominalSortRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let Logical(LogicalSort(sort)) = input.get_operator(ctx)? {
            result.add(input.clone_with_inputs(Physical(PhysicalNominalSort(sort.clone()))));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &SORT_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Sort2NominalSort
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }

    fn engines(&self) -> EnumSet<EngineKind> {
        EnumSet::only(EngineKind::Coordinator)
    }
}
