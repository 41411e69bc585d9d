//! Optimization rules.
//!
//! A rule defines equivalent transformation of query plan. There are three kinds of rules:
//!
//! 1. Transformation rule. It produces equivalent alternative logical plan, which is used in the
//! exploration phase of optimizer. For example, [`CommutateJoinRule`] just swaps the inputs of
//! inner join, and [`RemoveLimitRule`] merges two adjacent limits.
//! 2. Implementation rule. It transforms logical operator to physical operator to provide
//! physical implementation. For example, [`Join2HashJoinRule`] transforms join to hash join.
//! 3. Enforcer rule. It wraps an implementation with an operator providing a physical property
//! the implementation lacks. See [`enforcer`].
//!
//! ## Pattern
//!
//! A patten defines what expression the rule should operate on. With pattern definition, the
//! rule can avoid manipulating plan directly, it only cares about defining equivalent
//! transformations.
//!
//! Let use the [`RemoveLimitRule`] to illustrate, its pattern is defined as following:
//! ```no
//! static ref REMOVE_LIMIT_RULE_PATTERN: Pattern = {
//!     Pattern::new_builder(LogicalLimit)
//!         .leaf(LogicalLimit)
//!     .end_node()
//!};
//! ```
//!
//! When [`RemoveLimitRule`] is invoked by optimizer, its input/output is [`OptExpression`]
//! rather plan.
//!```no
//! [GroupExprId(0, 0) Limit(10)]                             [Operator Limit(5)]
//!              |                                                     |
//!              |                                                     |
//!              |                   RemoveLimitRule                   |
//! [GroupExprId(1, 0) Limit(5)]        -------->                 [GroupId (2)]
//!              |
//!              |
//!              |
//!         [GroupId(2)]
//!
//! ```
//!
//! Instead of manipulating plan directly, the optimizer generates [`OptExpression`] using rule's
//! pattern, and the rule generates equivalent transformation. Optimizer inserts generated
//! transformation into the memo.
//!
//! ## Rule set
//!
//! Rules are registered in a [`RuleSet`], which is keyed by the logical operator kind of each
//! pattern root. It's immutable after construction and shared by concurrent optimizations.
pub mod enforcer;
mod filter;
pub use filter::*;
mod gather;
pub use gather::*;
mod join;
pub use join::*;
mod limit;
pub use limit::*;
mod opt_expr;
pub use opt_expr::*;
mod pattern;
pub use pattern::*;
mod projection;
pub use projection::*;
mod sort;
pub use sort::*;
mod table_scan;
pub use table_scan::*;

use std::cmp::Reverse;
use std::collections::HashMap;
use std::convert::AsRef;
use std::fmt::{Debug, Formatter};

use enum_dispatch::enum_dispatch;
use enumset::{EnumSet, EnumSetType};
use itertools::Itertools;
use log::debug;
use strum::IntoEnumIterator;
use strum_macros::AsRefStr;

use crate::error::{OptimizerError, QuartziteResult};
use crate::operator::{LogicalOperator, LogicalOperatorKind};
use crate::optimizer::Optimizer;
use crate::properties::EngineKind;

pub type OptExprVec<O> = Vec<OptExpression<O>>;

pub struct RuleResult<O: Optimizer> {
    exprs: OptExprVec<O>,
}

impl<O: Optimizer> Default for RuleResult<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Optimizer> RuleResult<O> {
    pub fn new() -> Self {
        Self { exprs: vec![] }
    }

    pub fn add(&mut self, new_expr: OptExpression<O>) {
        self.exprs.push(new_expr);
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn results(self) -> impl Iterator<Item = OptExpression<O>> {
        self.exprs.into_iter()
    }
}

/// A rule should only focus on providing equivalent transformations of optimizer expressions.
#[enum_dispatch(RuleImpl)]
pub trait Rule {
    /// Apply a rule to match sub plan.
    ///
    /// A rule may add nothing when the bound expression doesn't qualify, e.g. a non inner join
    /// for [`CommutateJoinRule`].
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()>;

    /// Pattern for rule.
    fn pattern(&self) -> &Pattern;

    /// Use to identify each rule.
    ///
    /// This is used to avoid applying same rule repeatedly to same group expression.
    fn rule_id(&self) -> RuleId;

    /// Use to identify applying order of rules.
    fn rule_promise(&self) -> RulePromise;

    /// Engines of groups this rule may fire in.
    fn engines(&self) -> EnumSet<EngineKind> {
        EnumSet::all()
    }
}

#[enum_dispatch]
#[derive(Clone, AsRefStr)]
pub enum RuleImpl {
    // Transformation rules
    CommutateJoinRule,
    PushLimitThroughProjectionRule,
    RemoveLimitRule,
    PushLimitToTableScanRule,
    PushLimitThroughGatherRule,
    PushFilterThroughGatherRule,

    // Implementation rules
    Scan2TableScanRule,
    Scan2IndexScanRule,
    Filter2PhysicalFilterRule,
    Projection2PhysicalProjectionRule,
    Limit2PhysicalLimitRule,
    Join2HashJoinRule,
    Join2MergeJoinRule,
    Sort2PhysicalSortRule,
    Sort2NominalSortRule,
    Gather2PhysicalGatherRule,
}

#[derive(EnumSetType, Debug)]
pub enum RuleId {
    // Transformation rules
    CommutateJoin,
    PushLimitThroughProjection,
    RemoveLimit,
    PushLimitToTableScan,
    PushLimitThroughGather,
    PushFilterThroughGather,

    // Implementation rules
    Scan2TableScan,
    Scan2IndexScan,
    Filter2PhysicalFilter,
    Projection2PhysicalProjection,
    Limit2PhysicalLimit,
    Join2HashJoin,
    Join2MergeJoin,
    Sort2PhysicalSort,
    Sort2NominalSort,
    Gather2PhysicalGather,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RulePromise {
    LOW = 1,
    Medium = 2,
    High = 3,
}

impl Debug for RuleImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_ref())
    }
}

/// All rules shipped with this crate, in registration order.
pub fn default_rules() -> Vec<RuleImpl> {
    vec![
        CommutateJoinRule::new().into(),
        PushLimitThroughProjectionRule::new().into(),
        RemoveLimitRule::new().into(),
        PushLimitToTableScanRule::new().into(),
        PushLimitThroughGatherRule::new().into(),
        PushFilterThroughGatherRule::new().into(),
        Scan2TableScanRule::new().into(),
        Scan2IndexScanRule::new().into(),
        Filter2PhysicalFilterRule::new().into(),
        Projection2PhysicalProjectionRule::new().into(),
        Limit2PhysicalLimitRule::new().into(),
        Join2HashJoinRule::new().into(),
        Join2MergeJoinRule::new().into(),
        Sort2PhysicalSortRule::new().into(),
        Sort2NominalSortRule::new().into(),
        Gather2PhysicalGatherRule::new().into(),
    ]
}

/// Immutable registry of rules, indexed by the operator kind of pattern root.
pub struct RuleSet {
    rules: Vec<RuleImpl>,
    by_kind: HashMap<LogicalOperatorKind, Vec<usize>>,
}

impl RuleSet {
    pub fn new<I: IntoIterator<Item = RuleImpl>>(rules: I) -> QuartziteResult<Self> {
        let rules = rules.into_iter().collect::<Vec<_>>();
        if rules.is_empty() {
            return Err(OptimizerError::Configuration("rule set is empty".to_string()).into());
        }

        let mut registered = EnumSet::<RuleId>::new();
        let mut by_kind = HashMap::<LogicalOperatorKind, Vec<usize>>::new();
        for (idx, rule) in rules.iter().enumerate() {
            if registered.contains(rule.rule_id()) {
                return Err(OptimizerError::Configuration(format!(
                    "rule {:?} registered more than once",
                    rule.rule_id()
                ))
                .into());
            }
            registered |= rule.rule_id();

            match rule.pattern().matcher.kind() {
                Some(kind) => by_kind.entry(kind).or_default().push(idx),
                None => {
                    return Err(OptimizerError::Configuration(format!(
                        "root pattern of rule {:?} doesn't name an operator kind",
                        rule
                    ))
                    .into())
                }
            }
        }

        debug!("Rule set created with {} rules", rules.len());
        Ok(Self { rules, by_kind })
    }

    pub fn with_default_rules() -> QuartziteResult<Self> {
        Self::new(default_rules())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleImpl> {
        self.rules.iter()
    }

    /// Rules which may fire on `operator` in a group of `engine`, excluding `applied` ones.
    ///
    /// High promise rules come first, rules of same promise keep registration order.
    pub fn applicable_rules(
        &self,
        operator: &LogicalOperator,
        inputs_len: usize,
        applied: EnumSet<RuleId>,
        engine: EngineKind,
    ) -> Vec<&RuleImpl> {
        self.by_kind
            .get(&operator.kind())
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|idx| &self.rules[*idx])
                    .filter(|rule| !applied.contains(rule.rule_id()))
                    .filter(|rule| rule.engines().contains(engine))
                    .filter(|rule| {
                        rule.pattern()
                            .children
                            .as_ref()
                            .map(|c| c.len() == inputs_len)
                            .unwrap_or(true)
                    })
                    .sorted_by_key(|rule| Reverse(rule.rule_promise()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Debug for RuleSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for kind in LogicalOperatorKind::iter() {
            if let Some(indexes) = self.by_kind.get(&kind) {
                let rules = indexes.iter().map(|idx| &self.rules[*idx]).collect::<Vec<_>>();
                map.entry(&kind.as_ref(), &rules);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use datafusion::prelude::{col, JoinType};
    use enumset::EnumSet;

    use crate::cascades::{CascadesOptimizer, GroupExprId, GroupId};
    use crate::error::OptimizerError;
    use crate::operator::LogicalOperator::{LogicalJoin, LogicalLimit, LogicalScan};
    use crate::operator::Operator::Logical;
    use crate::operator::{Join, Limit, TableScan};
    use crate::properties::EngineKind;
    use crate::rules::{
        CommutateJoinRule, Join2HashJoinRule, Join2MergeJoinRule, OptExpression, Rule, RuleId,
        RuleImpl, RuleSet, Scan2TableScanRule, Sort2PhysicalSortRule,
    };

    fn is_configuration_error(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::Configuration(_))
        )
    }

    #[test]
    fn test_opt_expr_operator_format() {
        let tb1 = OptExpression::<CascadesOptimizer>::from(Logical(LogicalScan(
            TableScan::new("t1"),
        )));
        let tb2 = OptExpression::<CascadesOptimizer>::from(Logical(LogicalScan(
            TableScan::new("t2"),
        )));
        let opt_expr = OptExpression::<CascadesOptimizer>::with_operator(
            Logical(LogicalLimit(Limit::new(1))),
            vec![tb1, tb2],
        );

        let expected = "\
OperatorNode: LogicalLimit { limit: 1 }
--OperatorNode: LogicalScan { table_name: \"t1\" }
--OperatorNode: LogicalScan { table_name: \"t2\" }
";
        assert_eq!(expected, format!("{:?}", opt_expr));
    }

    #[test]
    fn test_opt_expr_group_expr_format() {
        let opt_expr = OptExpression::<CascadesOptimizer>::with_expr_handle(
            GroupExprId::new(GroupId(10), 4),
            vec![OptExpression::with_group_handle(GroupId(3))],
        );

        assert_eq!(
            "ExprHandleNode: 10.4\n--GroupHandleNode: 3\n",
            format!("{:?}", opt_expr)
        );
    }

    #[test]
    fn test_rule_debug() {
        assert_eq!(
            "\"CommutateJoinRule\"",
            format!("{:?}", RuleImpl::from(CommutateJoinRule::new()))
        );
    }

    #[test]
    fn test_invalid_rule_set() {
        let empty = RuleSet::new(vec![]).err().unwrap();
        assert!(is_configuration_error(&empty));

        let duplicated = RuleSet::new(vec![
            Join2HashJoinRule::new().into(),
            Join2HashJoinRule::new().into(),
        ])
        .err()
        .unwrap();
        assert!(is_configuration_error(&duplicated));
    }

    #[test]
    fn test_applicable_rules() {
        let rule_set = RuleSet::new(vec![
            Join2HashJoinRule::new().into(),
            Scan2TableScanRule::new().into(),
            Join2MergeJoinRule::new().into(),
            CommutateJoinRule::new().into(),
            Sort2PhysicalSortRule::new().into(),
        ])
        .unwrap();
        assert_eq!(5, rule_set.len());

        let join = LogicalJoin(Join::new(JoinType::Inner, col("t1.c1").eq(col("t2.c1"))));

        let rule_ids = |applied: EnumSet<RuleId>, engine: EngineKind| {
            rule_set
                .applicable_rules(&join, 2, applied, engine)
                .into_iter()
                .map(|rule| rule.rule_id())
                .collect::<Vec<_>>()
        };

        assert_eq!(
            vec![
                RuleId::Join2HashJoin,
                RuleId::Join2MergeJoin,
                RuleId::CommutateJoin
            ],
            rule_ids(EnumSet::empty(), EngineKind::Coordinator)
        );

        assert_eq!(
            vec![RuleId::Join2MergeJoin, RuleId::CommutateJoin],
            rule_ids(
                EnumSet::only(RuleId::Join2HashJoin),
                EngineKind::Coordinator
            )
        );

        // Joins are never implemented in storage engine.
        assert_eq!(
            vec![RuleId::CommutateJoin],
            rule_ids(EnumSet::empty(), EngineKind::Storage)
        );
    }

    #[test]
    fn test_default_rule_set() {
        let rule_set = RuleSet::with_default_rules().unwrap();
        assert_eq!(16, rule_set.len());
        let debug = format!("{:?}", rule_set);
        assert!(debug.contains("LogicalJoin"));
        assert!(debug.contains("Join2MergeJoinRule"));
    }
}
