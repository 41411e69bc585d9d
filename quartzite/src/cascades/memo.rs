use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Index, IndexMut};

use anyhow::bail;
use enumset::EnumSet;
use log::{debug, trace};
use prettytable::Table;
use smallvec::SmallVec;

use crate::cascades::CascadesOptimizer;
use crate::cost::Cost;
use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::LogicalSort;
use crate::operator::Operator;
use crate::optimizer::{OptExpr, OptExprHandle, OptGroup, OptGroupHandle, OptimizerContext};
use crate::plan::{Plan, PlanNode, PlanNodeRef};
use crate::properties::{EngineKind, LogicalProperty, OrderSpec, PhysicalPropertySet};
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::rules::{OptExpression, RuleId};
use crate::stat::Statistics;

/// Dynamic programming table used for storing expression groups.
///
/// Groups are never merged. When a rule produces an expression which already exists in another
/// group, the existing one is kept and the new one is dropped.
pub struct Memo {
    /// Used to avoid insert duplicate group expression.
    group_exprs: HashMap<GroupExprKey, GroupExprId>,
    groups: Vec<Group>,
    root_group_id: GroupId,
}

impl Memo {
    /// Copies a logical plan into memo, one group per plan node.
    ///
    /// Logical property, statistics and engine attached to plan nodes are used as is, missing
    /// ones are derived from inputs.
    pub(crate) fn new(plan: &Plan, ctx: &OptimizerContext) -> QuartziteResult<Self> {
        let mut memo = Memo {
            group_exprs: HashMap::new(),
            groups: vec![],
            root_group_id: GroupId(0),
        };

        memo.root_group_id = memo.insert_plan_node(&plan.root(), ctx)?;
        debug!("Memo created with {} groups", memo.groups.len());
        Ok(memo)
    }

    pub fn root_group_id(&self) -> GroupId {
        self.root_group_id
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Drops in-flight search state left by an interrupted optimization.
    pub(crate) fn clear_searching(&mut self) {
        for group in &mut self.groups {
            group.searching.clear();
        }
    }

    fn insert_plan_node(&mut self, node: &PlanNode, ctx: &OptimizerContext) -> QuartziteResult<GroupId> {
        if !node.operator().is_logical() {
            bail!("Input plan should be logical, but found {}", node.operator());
        }

        let inputs = node
            .inputs()
            .iter()
            .map(|input| self.insert_plan_node(input, ctx))
            .collect::<QuartziteResult<SmallVec<[GroupId; 2]>>>()?;

        let key = GroupExprKey {
            operator: node.operator().clone(),
            inputs,
        };

        let (group_expr_id, _) = self.insert_group_expression(key, None, ctx, Some(node))?;
        Ok(group_expr_id.group_id)
    }

    /// Insert a rule result into memo and return group expression id, and whether it's new.
    ///
    /// Nodes reused from rule input keep their group expression id. New nodes other than the
    /// root go to new groups, unless an equivalent expression exists.
    pub(crate) fn insert_opt_expression(
        &mut self,
        opt_expr: &OptExpression<CascadesOptimizer>,
        target_group: Option<GroupId>,
        ctx: &OptimizerContext,
    ) -> QuartziteResult<(GroupExprId, bool)> {
        match opt_expr.node() {
            ExprHandleNode(group_expr_id) => Ok((*group_expr_id, false)),
            OperatorNode(operator) => {
                let inputs = opt_expr
                    .inputs()
                    .iter()
                    .map(|input| match input.node() {
                        GroupHandleNode(group_id) => Ok(*group_id),
                        _ => self
                            .insert_opt_expression(input, None, ctx)
                            .map(|(id, _)| id.group_id),
                    })
                    .collect::<QuartziteResult<SmallVec<[GroupId; 2]>>>()?;

                let group_expr_key = GroupExprKey {
                    operator: operator.clone(),
                    inputs,
                };

                self.insert_group_expression(group_expr_key, target_group, ctx, None)
            }
            GroupHandleNode(group_id) => bail!("Can't insert group handle {} directly", group_id),
        }
    }

    fn insert_group_expression(
        &mut self,
        group_expr_key: GroupExprKey,
        target_group: Option<GroupId>,
        ctx: &OptimizerContext,
        source: Option<&PlanNode>,
    ) -> QuartziteResult<(GroupExprId, bool)> {
        if let Some(existing) = self.group_exprs.get(&group_expr_key).copied() {
            if let Some(target_group_id) = target_group {
                if target_group_id != existing.group_id {
                    debug!(
                        "Expression {} for group {} already exists in group {}",
                        group_expr_key.operator, target_group_id, existing.group_id
                    );
                }
            }
            return Ok((existing, false));
        }

        let group_id = match target_group {
            Some(group_id) => group_id,
            None => self.new_group(&group_expr_key, ctx, source)?,
        };

        let group_expr_id = self[group_id].insert_group_expr(GroupExpr::new(group_expr_key.clone()));
        self.group_exprs.insert(group_expr_key, group_expr_id);
        Ok((group_expr_id, true))
    }

    fn new_group(
        &mut self,
        key: &GroupExprKey,
        ctx: &OptimizerContext,
        source: Option<&PlanNode>,
    ) -> QuartziteResult<GroupId> {
        let (logical_prop, stats, engine) = {
            let inputs = key.inputs.iter().map(|id| &self[*id]).collect::<Vec<_>>();

            let logical_prop = match source.and_then(PlanNode::logical_prop) {
                Some(prop) => prop.clone(),
                None => {
                    let input_props = inputs.iter().map(|g| &g.logical_prop).collect::<Vec<_>>();
                    key.operator.derive_logical_prop(ctx, &input_props)?
                }
            };

            let stats = match source.and_then(PlanNode::stat) {
                Some(stat) => stat.clone(),
                None => {
                    let input_stats = inputs.iter().map(|g| &g.stats).collect::<Vec<_>>();
                    key.operator.derive_statistics(ctx, &input_stats)?
                }
            };

            let engine = match source.and_then(PlanNode::engine) {
                Some(engine) => engine,
                None => {
                    let input_engines = inputs.iter().map(|g| g.engine).collect::<Vec<_>>();
                    key.operator.derive_engine(&input_engines)
                }
            };

            (logical_prop, stats, engine)
        };

        let group_id = GroupId(self.groups.len());
        trace!(
            "Created group {} for {} in {:?} engine, row count: {}",
            group_id,
            key.operator,
            engine,
            stats.row_count()
        );
        self.groups
            .push(Group::new(group_id, logical_prop, stats, engine));
        Ok(group_id)
    }
}

impl Index<GroupId> for Memo {
    type Output = Group;

    fn index(&self, index: GroupId) -> &Group {
        &self.groups[index.0]
    }
}

impl IndexMut<GroupId> for Memo {
    fn index_mut(&mut self, index: GroupId) -> &mut Self::Output {
        &mut self.groups[index.0]
    }
}

impl Index<GroupExprId> for Memo {
    type Output = GroupExpr;

    fn index(&self, index: GroupExprId) -> &Self::Output {
        &self[index.group_id][index]
    }
}

impl IndexMut<GroupExprId> for Memo {
    fn index_mut(&mut self, index: GroupExprId) -> &mut Self::Output {
        &mut self[index.group_id][index]
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "Groups in memo, root group {}:", self.root_group_id)?;
        writeln!(f)?;

        for group in &self.groups {
            writeln!(f, "{:?}", group)?;
        }

        Ok(())
    }
}

/// A group id is an index of `groups` in `Memo`.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Ord, PartialOrd)]
pub struct GroupId(pub usize);

impl Debug for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl OptGroupHandle for GroupId {
    type O = CascadesOptimizer;
}

/// A group expression id is an index of `exprs` in `Group`.
#[derive(Hash, Eq, PartialEq, Clone, Copy)]
pub struct GroupExprId {
    pub(crate) group_id: GroupId,
    pub(crate) expr_id: usize,
}

impl Debug for GroupExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}.{:?}", self.group_id, self.expr_id)
    }
}

impl Display for GroupExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}.{:?}", self.group_id, self.expr_id)
    }
}

impl OptExprHandle for GroupExprId {
    type O = CascadesOptimizer;
}

impl GroupExprId {
    pub fn new(group_id: GroupId, expr_id: usize) -> Self {
        Self { group_id, expr_id }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }
}

/// Lowest cost plan found for a physical property.
#[derive(Clone, Debug)]
pub struct Winner {
    pub(crate) cost: Cost,
    /// `None` when the root of plan is inserted by an enforcer.
    pub(crate) group_expr_id: Option<GroupExprId>,
    pub(crate) plan: PlanNodeRef,
}

impl Winner {
    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn group_expr_id(&self) -> Option<GroupExprId> {
        self.group_expr_id
    }

    pub fn plan(&self) -> PlanNodeRef {
        self.plan.clone()
    }
}

/// A complete implementation offered during search, kept for diagnostics.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub prop: PhysicalPropertySet,
    pub cost: Cost,
    /// `None` for enforced candidates.
    pub source: Option<GroupExprId>,
}

/// State of an in-flight search of a group for a property.
#[derive(Debug)]
pub(crate) struct SearchState {
    pub(crate) upper_bound: Cost,
    pub(crate) best: Option<Winner>,
}

impl SearchState {
    pub(crate) fn new(upper_bound: Cost) -> Self {
        Self {
            upper_bound,
            best: None,
        }
    }

    /// Candidates costing more than this are pruned.
    pub(crate) fn bound(&self) -> Cost {
        match &self.best {
            Some(best) if best.cost < self.upper_bound => best.cost,
            _ => self.upper_bound,
        }
    }

    /// Keeps `candidate` if it's strictly cheaper than current best.
    pub(crate) fn offer(&mut self, candidate: Winner) -> bool {
        let better = self
            .best
            .as_ref()
            .map(|best| candidate.cost < best.cost)
            .unwrap_or(true);
        if better {
            self.best = Some(candidate);
        }
        better
    }
}

/// A group contains a set of logically equivalent `GroupExpression`s.
pub struct Group {
    group_id: GroupId,
    /// Shared by all expressions in a group.
    logical_prop: LogicalProperty,
    stats: Statistics,
    engine: EngineKind,
    /// Logical and physical expressions in insertion order.
    exprs: Vec<GroupExpr>,

    /// Lowest cost plans for each [`PhysicalPropertySet`].
    winners: HashMap<PhysicalPropertySet, Winner>,
    pub(crate) searching: HashMap<PhysicalPropertySet, SearchState>,
    candidates: Vec<Candidate>,

    /// All logical expression has been explored.
    pub(crate) explored: bool,
}

impl Debug for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Group {:?} ({} columns, {} rows, {:?} engine):",
            &self.group_id.0,
            self.logical_prop.width(),
            self.stats.row_count(),
            self.engine
        )?;

        let mut table = Table::new();
        table.add_row(row!["Group Expression Id", "Operator", "Inputs", "Applied Rules"]);
        for (expr_id, group_expr) in self.exprs.iter().enumerate() {
            table.add_row(row![
                expr_id,
                format!("{}", group_expr.key.operator),
                format!("{:?}", group_expr.key.inputs),
                format!("{:?}", group_expr.applied_rules)
            ]);
        }
        writeln!(f, "{}", table)?;

        if !self.winners.is_empty() {
            let mut table = Table::new();
            table.add_row(row!["Required Property", "Cost", "Winner"]);
            for (prop, winner) in &self.winners {
                table.add_row(row![
                    format!("{}", prop),
                    format!("{}", winner.cost),
                    winner
                        .group_expr_id
                        .map(|id| format!("{}", id))
                        .unwrap_or_else(|| "enforcer".to_string())
                ]);
            }
            writeln!(f, "{}", table)?;
        }

        if !self.candidates.is_empty() {
            let mut table = Table::new();
            table.add_row(row!["Required Property", "Cost", "Candidate"]);
            for candidate in &self.candidates {
                table.add_row(row![
                    format!("{}", candidate.prop),
                    format!("{}", candidate.cost),
                    candidate
                        .source
                        .map(|id| format!("{}", id))
                        .unwrap_or_else(|| "enforcer".to_string())
                ]);
            }
            writeln!(f, "{}", table)?;
        }

        Ok(())
    }
}

impl Index<GroupExprId> for Group {
    type Output = GroupExpr;

    fn index(&self, index: GroupExprId) -> &Self::Output {
        &self.exprs[index.expr_id]
    }
}

impl IndexMut<GroupExprId> for Group {
    fn index_mut(&mut self, index: GroupExprId) -> &mut Self::Output {
        &mut self.exprs[index.expr_id]
    }
}

impl OptGroup for Group {
    fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    fn statistics(&self) -> &Statistics {
        &self.stats
    }

    fn engine(&self) -> EngineKind {
        self.engine
    }

    fn sort_order(&self) -> Option<OrderSpec> {
        self.exprs.iter().find_map(|expr| match expr.operator() {
            Operator::Logical(LogicalSort(sort)) => Some(sort.order()),
            _ => None,
        })
    }
}

impl Group {
    fn new(
        group_id: GroupId,
        logical_prop: LogicalProperty,
        stats: Statistics,
        engine: EngineKind,
    ) -> Self {
        Self {
            group_id,
            logical_prop,
            stats,
            engine,
            exprs: vec![],
            winners: HashMap::new(),
            searching: HashMap::new(),
            candidates: vec![],
            explored: false,
        }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn winner(&self, physical_prop_set: &PhysicalPropertySet) -> Option<&Winner> {
        self.winners.get(physical_prop_set)
    }

    /// Installs `winner` unless an existing one is at least as cheap.
    ///
    /// Returns whether `winner` is installed.
    pub(crate) fn set_winner(&mut self, prop: &PhysicalPropertySet, winner: Winner) -> bool {
        match self.winners.get(prop) {
            Some(existing) if existing.cost <= winner.cost => false,
            _ => {
                self.winners.insert(prop.clone(), winner);
                true
            }
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub(crate) fn record_candidate(&mut self, candidate: Candidate) {
        self.candidates.push(candidate);
    }

    pub fn physical_expr_ids(&self) -> Vec<GroupExprId> {
        self.expr_ids(false)
    }

    pub fn logical_expr_ids(&self) -> Vec<GroupExprId> {
        self.expr_ids(true)
    }

    fn expr_ids(&self, logical: bool) -> Vec<GroupExprId> {
        self.exprs
            .iter()
            .enumerate()
            .filter(|(_, expr)| expr.is_logical() == logical)
            .map(|(expr_id, _)| GroupExprId::new(self.group_id, expr_id))
            .collect()
    }

    /// Number of group expressions.
    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    fn insert_group_expr(&mut self, group_expr: GroupExpr) -> GroupExprId {
        let group_expr_id = GroupExprId::new(self.group_id, self.exprs.len());
        self.exprs.push(group_expr);
        group_expr_id
    }
}

/// Base group expression information.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub(crate) struct GroupExprKey {
    pub(crate) operator: Operator,
    pub(crate) inputs: SmallVec<[GroupId; 2]>,
}

pub struct GroupExpr {
    /// Can be used to uniquely identify a group expression.
    ///
    /// It should not be changed after creation.
    key: GroupExprKey,

    /// Rules already applied to this group expression.
    applied_rules: EnumSet<RuleId>,
}

impl OptExpr for GroupExpr {
    type InputHandle = GroupId;
    type O = CascadesOptimizer;

    fn operator(&self) -> &Operator {
        GroupExpr::operator(self)
    }

    fn inputs_len(&self, _opt: &CascadesOptimizer) -> usize {
        self.key.inputs.len()
    }

    fn input_at(&self, idx: usize, _opt: &CascadesOptimizer) -> GroupId {
        self.key.inputs[idx]
    }
}

impl GroupExpr {
    fn new(key: GroupExprKey) -> Self {
        Self {
            key,
            applied_rules: EnumSet::new(),
        }
    }

    pub fn applied_rules(&self) -> EnumSet<RuleId> {
        self.applied_rules
    }

    pub fn is_rule_applied(&self, rule_id: RuleId) -> bool {
        self.applied_rules.contains(rule_id)
    }

    pub(crate) fn set_rule_applied(&mut self, rule_id: RuleId) {
        self.applied_rules |= rule_id;
    }

    pub fn operator(&self) -> &Operator {
        &self.key.operator
    }

    pub fn is_logical(&self) -> bool {
        self.key.operator.is_logical()
    }

    pub fn inputs(&self) -> &[GroupId] {
        &self.key.inputs
    }
}
