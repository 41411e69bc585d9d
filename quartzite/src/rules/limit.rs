use std::cmp::min;

use anyhow::bail;

use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::{LogicalGather, LogicalLimit, LogicalScan};
use crate::operator::LogicalOperatorKind;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::PhysicalLimit;
use crate::operator::{Limit, TableScan};
use crate::optimizer::{OptGroup, Optimizer};
use crate::rules::RuleId::{
    Limit2PhysicalLimit, PushLimitThroughGather, PushLimitThroughProjection, PushLimitToTableScan,
    RemoveLimit,
};
use crate::rules::RulePromise::{High, LOW};
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref LIMIT_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalLimit)
        .end_node()
    };
    static ref REMOVE_LIMIT_RULE_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalLimit)
          .leaf(LogicalOperatorKind::LogicalLimit)
        .end_node()
    };
    static ref PUSH_LIMIT_THROUGH_PROJECTION_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalLimit)
          .leaf(LogicalOperatorKind::LogicalProjection)
        .end_node()
    };
    static ref PUSH_LIMIT_TO_TABLE_SCAN_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalLimit)
          .leaf(LogicalOperatorKind::LogicalScan)
        .end_node()
    };
    static ref PUSH_LIMIT_THROUGH_GATHER_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalLimit)
          .leaf(LogicalOperatorKind::LogicalGather)
        .end_node()
    };
}

/// Rewrites `Limit(Projection(x))` to `Projection(Limit(x))`.
#[derive(Clone, Default)]
pub struct PushLimitThroughProjectionRule {}

impl PushLimitThroughProjectionRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushLimitThroughProjectionRule {
    fn apply<O: Optimizer>(
        &self,
        opt_expr: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let limit = opt_expr.get_operator(ctx)?;
        let projection = opt_expr[0].get_operator(ctx)?;

        let new_limit = opt_expr[0].clone_with_inputs(limit.clone());
        let ret = OptExpression::with_operator(projection.clone(), vec![new_limit]);

        result.add(ret);

        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &PUSH_LIMIT_THROUGH_PROJECTION_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        PushLimitThroughProjection
    }

    fn rule_promise(&self) -> RulePromise {
        LOW
    }
}

/// Merges two adjacent limits into one.
#[derive(Clone, Default)]
pub struct RemoveLimitRule {}

impl RemoveLimitRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for RemoveLimitRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let (Logical(LogicalLimit(limit1)), Logical(LogicalLimit(limit2))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            let new_limit = min(limit1.limit(), limit2.limit());

            let ret = input[0].clone_with_inputs(Logical(LogicalLimit(Limit::new(new_limit))));

            result.add(ret);
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &REMOVE_LIMIT_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RemoveLimit
    }

    fn rule_promise(&self) -> RulePromise {
        LOW
    }
}

/// Rewrites `Limit(Scan)` to a scan with limit.
#[derive(Clone, Default)]
pub struct PushLimitToTableScanRule {}

impl PushLimitToTableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushLimitToTableScanRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let (Logical(LogicalLimit(limit)), Logical(LogicalScan(scan))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            let new_limit = scan
                .limit()
                .map(|l1| min(l1, limit.limit()))
                .unwrap_or_else(|| limit.limit());

            let ret = OptExpression::from(Logical(LogicalScan(TableScan::with_limit(
                scan.table_name(),
                new_limit,
            ))));

            result.add(ret);

            Ok(())
        } else {
            bail!("Pattern miss matched!")
        }
    }

    fn pattern(&self) -> &Pattern {
        &PUSH_LIMIT_TO_TABLE_SCAN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        PushLimitToTableScan
    }

    fn rule_promise(&self) -> RulePromise {
        LOW
    }
}

/// Rewrites `Limit(Gather(x))` to `Limit(Gather(Limit(x)))`, so that storage engine stops early.
///
/// Skipped when `x` doesn't produce more rows than the limit, which also stops the rule from
/// firing on its own output.
#[derive(Clone, Default)]
pub struct PushLimitThroughGatherRule {}

impl PushLimitThroughGatherRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushLimitThroughGatherRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let (limit, gather) = match (input.get_operator(ctx)?, input[0].get_operator(ctx)?) {
            (Logical(LogicalLimit(limit)), gather @ Logical(LogicalGather(_))) => {
                (limit, gather)
            }
            _ => bail!("Pattern miss matched!"),
        };

        let storage_input = &input[0][0];
        let storage_group = match storage_input.group_handle() {
            Some(group) => group,
            None => bail!("Input of gather should be bound to a group"),
        };
        if ctx.group_at(storage_group).statistics().row_count() <= limit.limit() as f64 {
            return Ok(());
        }

        let limit_op = Logical(LogicalLimit(limit.clone()));
        let pushed_limit = OptExpression::with_operator(limit_op.clone(), vec![storage_input.clone()]);
        let new_gather = OptExpression::with_operator(gather.clone(), vec![pushed_limit]);
        result.add(OptExpression::with_operator(limit_op, vec![new_gather]));

        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &PUSH_LIMIT_THROUGH_GATHER_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        PushLimitThroughGather
    }

    fn rule_promise(&self) -> RulePromise {
        LOW
    }
}

#[derive(Clone, Default)]
pub struct Limit2PhysicalLimitRule {}

impl Limit2PhysicalLimitRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Limit2PhysicalLimitRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let Logical(LogicalLimit(limit)) = input.get_operator(ctx)? {
            result.add(input.clone_with_inputs(Physical(PhysicalLimit(limit.clone()))));
            Ok(())
        } else {
            bail!("Pattern miss matched!")
        }
    }

    fn pattern(&self) -> &Pattern {
        &LIMIT_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Limit2PhysicalLimit
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}
