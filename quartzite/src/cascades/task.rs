use std::cmp::Ordering;
use std::mem::replace;
use std::sync::Arc;

use anyhow::bail;
use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use log::{debug, trace};

use crate::cascades::binding::Binding;
use crate::cascades::memo::{Candidate, Memo, SearchState, Winner};
use crate::cascades::task::OptimizeGroupTaskState::{AfterEnforce, Enforce};
use crate::cascades::task::OptimizeInputsTaskState::{
    AfterOptimizeInput, BeforeOptimizeInput, Init, Invalid, OptimizeSelf,
};
use crate::cascades::task::TaskControl::{Done, Yield};
use crate::cascades::{CascadesOptimizer, GroupExprId, GroupId};
use crate::cost::{checked_cost, Cost, CostContext, INF};
use crate::error::QuartziteResult;
use crate::operator::{DerivePropContext, DerivePropResult, PhysicalOperator};
use crate::optimizer::OptGroup;
use crate::plan::{PlanNodeBuilder, PlanNodeRef};
use crate::properties::PhysicalPropertySet;
use crate::rules::enforcer::{enforcer_rules, Enforcer, EnforcerImpl};
use crate::rules::{Rule, RuleImpl, RuleResult};

#[enum_dispatch]
pub(super) enum TaskImpl {
    ApplyRuleTask,
    OptimizeExpressionTask,
    OptimizeInputsTask,
    ExploreGroupTask,
    OptimizeGroupTask,
}

enum TaskControl {
    /// Run `dependencies` first, then `this` again.
    Yield {
        this: TaskImpl,
        dependencies: Vec<TaskImpl>,
    },
    Done {
        dependencies: Vec<TaskImpl>,
    },
}

impl TaskControl {
    fn done() -> Self {
        Done {
            dependencies: vec![],
        }
    }

    fn done_with_deps(deps: Vec<TaskImpl>) -> Self {
        Done { dependencies: deps }
    }

    fn again(this: TaskImpl) -> Self {
        Yield {
            this,
            dependencies: vec![],
        }
    }
}

#[enum_dispatch(TaskImpl)]
trait Task {
    fn execute(self, ctx: &mut CascadesOptimizer) -> QuartziteResult<TaskControl>;
}

/// Runs tasks on an explicit stack until it's empty.
///
/// Dependencies are pushed in order, so the last one runs first. Cancellation is checked
/// before each task.
pub(super) fn schedule(ctx: &mut CascadesOptimizer, root: TaskImpl) -> QuartziteResult<()> {
    let mut tasks = vec![root];

    while let Some(cur_task) = tasks.pop() {
        ctx.context.check_cancelled()?;
        ctx.executed_tasks += 1;

        match cur_task.execute(ctx)? {
            Yield {
                this,
                mut dependencies,
            } => {
                tasks.push(this);
                tasks.append(&mut dependencies);
            }
            Done { mut dependencies } => {
                tasks.append(&mut dependencies);
            }
        }
    }

    Ok(())
}

fn search_state<'a>(
    memo: &'a mut Memo,
    group_id: GroupId,
    prop: &PhysicalPropertySet,
) -> QuartziteResult<&'a mut SearchState> {
    match memo[group_id].searching.get_mut(prop) {
        Some(state) => Ok(state),
        None => bail!("Group {} is not searching for {}", group_id, prop),
    }
}

fn physical_operator(memo: &Memo, group_expr_id: GroupExprId) -> QuartziteResult<&PhysicalOperator> {
    match memo[group_expr_id].operator().as_physical() {
        Some(operator) => Ok(operator),
        None => bail!("Group expression {} is not physical", group_expr_id),
    }
}

/// Applies one rule to all bindings of a logical group expression.
pub(super) struct ApplyRuleTask {
    rule: RuleImpl,
    /// The logical group expression to apply rule to.
    group_expr_id: GroupExprId,
}

impl Task for ApplyRuleTask {
    fn execute(self, ctx: &mut CascadesOptimizer) -> QuartziteResult<TaskControl> {
        if ctx.memo[self.group_expr_id].is_rule_applied(self.rule.rule_id()) {
            return Ok(TaskControl::done());
        }

        trace!(
            "Beginning to apply rule {:?} to group expression {}",
            self.rule,
            self.group_expr_id
        );

        let opt_exprs = Binding::new(self.group_expr_id, self.rule.pattern(), &ctx.memo)
            .into_iter()
            .collect::<Vec<_>>();

        let mut results = Vec::new();
        for opt_expr in opt_exprs {
            let mut result = RuleResult::new();
            self.rule.apply(opt_expr, &*ctx, &mut result)?;
            results.extend(result.results());
        }

        let mut other_tasks = Vec::new();
        for result_expr in results {
            let (group_expr_id, inserted) = ctx.memo.insert_opt_expression(
                &result_expr,
                Some(self.group_expr_id.group_id),
                &ctx.context,
            )?;

            if inserted {
                debug!(
                    "Rule {:?} added {} to group {}: {:?}",
                    self.rule, group_expr_id, self.group_expr_id.group_id, result_expr
                );
                if ctx.memo[group_expr_id].is_logical() {
                    other_tasks.push(OptimizeExpressionTask { group_expr_id }.into());
                }
            }
        }

        // Bindings borrow memo, so rule is marked after all of them are consumed.
        ctx.memo[self.group_expr_id].set_rule_applied(self.rule.rule_id());
        Ok(TaskControl::done_with_deps(other_tasks))
    }
}

/// Optimizes a logical group expression by applying rules, after exploring its inputs.
pub(super) struct OptimizeExpressionTask {
    /// Logical group expression to be optimized.
    group_expr_id: GroupExprId,
}

impl Task for OptimizeExpressionTask {
    fn execute(self, ctx: &mut CascadesOptimizer) -> QuartziteResult<TaskControl> {
        let group_expr = &ctx.memo[self.group_expr_id];
        let operator = match group_expr.operator().as_logical() {
            Some(operator) => operator,
            None => bail!("Group expression {} is not logical", self.group_expr_id),
        };
        let engine = ctx.memo[self.group_expr_id.group_id].engine();

        let apply_rule_tasks = ctx
            .rules
            .applicable_rules(
                operator,
                group_expr.inputs().len(),
                group_expr.applied_rules(),
                engine,
            )
            .into_iter()
            .rev()
            .map(|rule| {
                ApplyRuleTask {
                    rule: rule.clone(),
                    group_expr_id: self.group_expr_id,
                }
                .into()
            })
            .collect::<Vec<TaskImpl>>();

        let explore_input_group_tasks = group_expr
            .inputs()
            .iter()
            .rev()
            .map(|group_id| ExploreGroupTask::new(*group_id).into())
            .collect::<Vec<TaskImpl>>();

        let mut tasks = Vec::<TaskImpl>::with_capacity(
            explore_input_group_tasks.len() + apply_rule_tasks.len(),
        );

        tasks.extend(apply_rule_tasks);
        // Inputs are explored before rules binding them run.
        tasks.extend(explore_input_group_tasks);

        Ok(TaskControl::done_with_deps(tasks))
    }
}

/// Explores a group by optimizing all its logical expressions.
pub(super) struct ExploreGroupTask {
    group_id: GroupId,
}

impl ExploreGroupTask {
    pub(super) fn new(group_id: GroupId) -> Self {
        Self { group_id }
    }
}

impl Task for ExploreGroupTask {
    fn execute(self, ctx: &mut CascadesOptimizer) -> QuartziteResult<TaskControl> {
        if ctx.memo[self.group_id].explored {
            return Ok(TaskControl::done());
        }

        trace!("Exploring group {}", self.group_id);
        let tasks = ctx.memo[self.group_id]
            .logical_expr_ids()
            .into_iter()
            .rev()
            .map(|group_expr_id| OptimizeExpressionTask { group_expr_id }.into())
            .collect();

        // Expressions added later by rules schedule their own tasks.
        ctx.memo[self.group_id].explored = true;

        Ok(TaskControl::done_with_deps(tasks))
    }
}

/// Optimizes a group for [`PhysicalPropertySet`].
///
/// Physical expressions of the group are costed first, then enforcers are tried against the
/// best cost found so far. The winner, if any, is memoized in group.
pub(super) struct OptimizeGroupTask {
    group_id: GroupId,
    /// Required property
    required_prop: PhysicalPropertySet,
    upper_bound: Cost,
    state: OptimizeGroupTaskState,
}

enum OptimizeGroupTaskState {
    Init,
    Enforce {
        enforcers: Vec<EnforcerImpl>,
        idx: usize,
    },
    AfterEnforce {
        enforcers: Vec<EnforcerImpl>,
        idx: usize,
        relaxed_prop: PhysicalPropertySet,
        enforce_cost: Cost,
    },
}

impl OptimizeGroupTask {
    pub(super) fn new(
        group_id: GroupId,
        required_prop: PhysicalPropertySet,
        upper_bound: Cost,
    ) -> Self {
        Self {
            group_id,
            required_prop,
            upper_bound,
            state: OptimizeGroupTaskState::Init,
        }
    }

    fn do_init(mut self, ctx: &mut CascadesOptimizer) -> QuartziteResult<TaskControl> {
        let group = &ctx.memo[self.group_id];
        if let Some(winner) = group.winner(&self.required_prop) {
            trace!(
                "Winner for {} in group {} found with cost {}",
                self.required_prop,
                self.group_id,
                winner.cost()
            );
            return Ok(TaskControl::done());
        }

        if group.searching.contains_key(&self.required_prop) {
            debug!(
                "Group {} is already searching for {}, skipped",
                self.group_id, self.required_prop
            );
            return Ok(TaskControl::done());
        }

        if !group.explored {
            let explore = ExploreGroupTask::new(self.group_id).into();
            return Ok(Yield {
                this: self.into(),
                dependencies: vec![explore],
            });
        }

        trace!(
            "Optimizing group {} for {} with upper bound {}",
            self.group_id,
            self.required_prop,
            self.upper_bound
        );

        let tasks = group
            .physical_expr_ids()
            .into_iter()
            .rev()
            .map(|group_expr_id| {
                OptimizeInputsTask::new(group_expr_id, self.required_prop.clone()).into()
            })
            .collect::<Vec<TaskImpl>>();

        let enforcers = enforcer_rules(group, &self.required_prop);
        ctx.memo[self.group_id]
            .searching
            .insert(self.required_prop.clone(), SearchState::new(self.upper_bound));

        self.state = Enforce { enforcers, idx: 0 };
        Ok(Yield {
            this: self.into(),
            dependencies: tasks,
        })
    }

    fn do_enforce(
        mut self,
        enforcers: Vec<EnforcerImpl>,
        idx: usize,
        ctx: &mut CascadesOptimizer,
    ) -> QuartziteResult<TaskControl> {
        let enforcer = match enforcers.get(idx) {
            Some(enforcer) => enforcer,
            None => return self.finish(ctx),
        };

        let relaxed_prop = enforcer.new_property(&self.required_prop);
        let bound = search_state(&mut ctx.memo, self.group_id, &self.required_prop)?.bound();
        let enforce_cost = enforcer.enforce_cost(
            &self.required_prop,
            &ctx.memo[self.group_id],
            ctx.cost_model.as_ref(),
            &ctx.context,
        )?;

        if relaxed_prop == self.required_prop || enforce_cost > bound {
            self.state = Enforce {
                enforcers,
                idx: idx + 1,
            };
            return Ok(TaskControl::again(self.into()));
        }

        let child_task =
            OptimizeGroupTask::new(self.group_id, relaxed_prop.clone(), bound - enforce_cost);
        self.state = AfterEnforce {
            enforcers,
            idx,
            relaxed_prop,
            enforce_cost,
        };

        Ok(Yield {
            this: self.into(),
            dependencies: vec![child_task.into()],
        })
    }

    fn do_after_enforce(
        mut self,
        enforcers: Vec<EnforcerImpl>,
        idx: usize,
        relaxed_prop: PhysicalPropertySet,
        enforce_cost: Cost,
        ctx: &mut CascadesOptimizer,
    ) -> QuartziteResult<TaskControl> {
        let relaxed_winner = ctx.memo[self.group_id].winner(&relaxed_prop).cloned();

        if let Some(relaxed_winner) = relaxed_winner {
            let cost = relaxed_winner.cost + enforce_cost;
            let plan = enforcers[idx].on_enforce(
                &self.required_prop,
                relaxed_winner.plan,
                cost,
                &mut ctx.context,
            );

            let state = search_state(&mut ctx.memo, self.group_id, &self.required_prop)?;
            if cost <= state.bound() {
                state.offer(Winner {
                    cost,
                    group_expr_id: None,
                    plan,
                });
                ctx.memo[self.group_id].record_candidate(Candidate {
                    prop: self.required_prop.clone(),
                    cost,
                    source: None,
                });
            }
        }

        self.state = Enforce {
            enforcers,
            idx: idx + 1,
        };
        Ok(TaskControl::again(self.into()))
    }

    fn finish(self, ctx: &mut CascadesOptimizer) -> QuartziteResult<TaskControl> {
        let group = &mut ctx.memo[self.group_id];
        let best = group
            .searching
            .remove(&self.required_prop)
            .and_then(|state| state.best);

        match best {
            Some(winner) => {
                debug!(
                    "Winner for {} in group {}: {} with cost {}",
                    self.required_prop,
                    self.group_id,
                    winner
                        .group_expr_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "enforcer".to_string()),
                    winner.cost
                );
                group.set_winner(&self.required_prop, winner);
            }
            None => trace!(
                "No plan for {} in group {} within {}",
                self.required_prop,
                self.group_id,
                self.upper_bound
            ),
        }

        Ok(TaskControl::done())
    }
}

impl Task for OptimizeGroupTask {
    fn execute(mut self, ctx: &mut CascadesOptimizer) -> QuartziteResult<TaskControl> {
        match replace(&mut self.state, OptimizeGroupTaskState::Init) {
            OptimizeGroupTaskState::Init => self.do_init(ctx),
            Enforce { enforcers, idx } => self.do_enforce(enforcers, idx, ctx),
            AfterEnforce {
                enforcers,
                idx,
                relaxed_prop,
                enforce_cost,
            } => self.do_after_enforce(enforcers, idx, relaxed_prop, enforce_cost, ctx),
        }
    }
}

/// Optimize physical group expression for required property.
#[derive(Debug)]
pub(super) struct OptimizeInputsTask {
    /// Physical group expression id to be optimized.
    group_expr_id: GroupExprId,
    /// Required property
    required_prop: PhysicalPropertySet,
    state: OptimizeInputsTaskState,
}

/// Costing progress of one derive result.
#[derive(Debug)]
struct InputsProgress {
    derive_results: Vec<DerivePropResult>,
    derive_idx: usize,
    /// Inputs in the order they are optimized, cheapest known first.
    input_order: Vec<usize>,
    /// Position in `input_order`.
    pos: usize,
    accumulated_cost: Cost,
    input_plans: Vec<Option<PlanNodeRef>>,
}

impl InputsProgress {
    fn derive_result(&self) -> &DerivePropResult {
        &self.derive_results[self.derive_idx]
    }

    fn current_input(&self) -> usize {
        self.input_order[self.pos]
    }
}

#[derive(Debug)]
enum OptimizeInputsTaskState {
    Init,
    BeforeOptimizeInput(InputsProgress),
    AfterOptimizeInput(InputsProgress),
    OptimizeSelf(InputsProgress),
    Invalid,
}

impl OptimizeInputsTask {
    fn new(group_expr_id: GroupExprId, required_prop: PhysicalPropertySet) -> Self {
        Self {
            group_expr_id,
            required_prop,
            state: Init,
        }
    }

    fn do_init(self, ctx: &mut CascadesOptimizer) -> QuartziteResult<TaskControl> {
        let operator = physical_operator(&ctx.memo, self.group_expr_id)?;

        let derive_results = operator
            .derive_properties(DerivePropContext {
                required_prop: &self.required_prop,
                expr_handle: self.group_expr_id,
                optimizer: &*ctx,
            })?
            .into_iter()
            .filter(|result| result.output_prop.satisfies(&self.required_prop))
            .collect::<Vec<_>>();

        if derive_results.is_empty() {
            trace!(
                "Group expression {} can't provide {}",
                self.group_expr_id,
                self.required_prop
            );
        }

        self.start_derive(derive_results, 0, ctx)
    }

    /// Starts costing derive result at `derive_idx`, or finishes the task when there is none.
    fn start_derive(
        mut self,
        derive_results: Vec<DerivePropResult>,
        derive_idx: usize,
        ctx: &CascadesOptimizer,
    ) -> QuartziteResult<TaskControl> {
        if derive_idx >= derive_results.len() {
            return Ok(TaskControl::done());
        }

        let derive_result = &derive_results[derive_idx];
        let operator_cost = self.operator_cost(derive_result, ctx)?;
        let inputs = ctx.memo[self.group_expr_id].inputs();

        let input_order =
            cheapest_input_first(&ctx.memo, inputs, &derive_result.input_required_props);

        let progress = InputsProgress {
            input_plans: vec![None; inputs.len()],
            derive_results,
            derive_idx,
            input_order,
            pos: 0,
            accumulated_cost: operator_cost,
        };

        self.state = if progress.input_order.is_empty() {
            OptimizeSelf(progress)
        } else {
            BeforeOptimizeInput(progress)
        };

        Ok(TaskControl::again(self.into()))
    }

    fn do_before_optimize_input(
        mut self,
        progress: InputsProgress,
        ctx: &mut CascadesOptimizer,
    ) -> QuartziteResult<TaskControl> {
        let bound = self.bound(ctx)?;
        if progress.accumulated_cost > bound {
            trace!(
                "Pruned group expression {} for {}: {} exceeds {}",
                self.group_expr_id,
                self.required_prop,
                progress.accumulated_cost,
                bound
            );
            return self.start_derive(progress.derive_results, progress.derive_idx + 1, ctx);
        }

        let input_idx = progress.current_input();
        let task = OptimizeGroupTask::new(
            ctx.memo[self.group_expr_id].inputs()[input_idx],
            progress.derive_result().input_required_props[input_idx].clone(),
            bound - progress.accumulated_cost,
        );

        self.state = AfterOptimizeInput(progress);
        Ok(Yield {
            this: self.into(),
            dependencies: vec![task.into()],
        })
    }

    fn do_after_optimize_input(
        mut self,
        mut progress: InputsProgress,
        ctx: &mut CascadesOptimizer,
    ) -> QuartziteResult<TaskControl> {
        let input_idx = progress.current_input();
        let input_group_id = ctx.memo[self.group_expr_id].inputs()[input_idx];
        let input_required_prop = &progress.derive_result().input_required_props[input_idx];

        match ctx.memo[input_group_id].winner(input_required_prop) {
            Some(winner) => {
                progress.accumulated_cost += winner.cost();
                progress.input_plans[input_idx] = Some(winner.plan());
                progress.pos += 1;

                self.state = if progress.pos == progress.input_order.len() {
                    OptimizeSelf(progress)
                } else {
                    BeforeOptimizeInput(progress)
                };
                Ok(TaskControl::again(self.into()))
            }
            // No plan of this input within bound, move to next derive result.
            None => self.start_derive(progress.derive_results, progress.derive_idx + 1, ctx),
        }
    }

    fn do_optimize_self(
        self,
        progress: InputsProgress,
        ctx: &mut CascadesOptimizer,
    ) -> QuartziteResult<TaskControl> {
        let cost = progress.accumulated_cost;
        if cost <= self.bound(ctx)? {
            let input_plans = match progress.input_plans.iter().cloned().collect::<Option<Vec<_>>>() {
                Some(plans) => plans,
                None => bail!("Inputs of {} are not optimized", self.group_expr_id),
            };

            let group_id = self.group_expr_id.group_id;
            let plan = {
                let group = &ctx.memo[group_id];
                PlanNodeBuilder::new(
                    ctx.context.next_plan_node_id(),
                    ctx.memo[self.group_expr_id].operator(),
                )
                .add_inputs(input_plans)
                .with_logical_prop(Some(group.logical_prop().clone()))
                .with_statistics(Some(group.statistics().clone()))
                .with_physical_props(Some(progress.derive_result().output_prop.clone()))
                .with_engine(Some(group.engine()))
                .with_cost(Some(cost))
                .build()
            };

            search_state(&mut ctx.memo, group_id, &self.required_prop)?.offer(Winner {
                cost,
                group_expr_id: Some(self.group_expr_id),
                plan: Arc::new(plan),
            });
            ctx.memo[group_id].record_candidate(Candidate {
                prop: self.required_prop.clone(),
                cost,
                source: Some(self.group_expr_id),
            });
        }

        self.start_derive(progress.derive_results, progress.derive_idx + 1, ctx)
    }

    /// Cost of the operator itself, inputs excluded.
    fn operator_cost(
        &self,
        derive_result: &DerivePropResult,
        ctx: &CascadesOptimizer,
    ) -> QuartziteResult<Cost> {
        let group = &ctx.memo[self.group_expr_id.group_id];
        let input_row_counts = ctx.memo[self.group_expr_id]
            .inputs()
            .iter()
            .zip(&derive_result.input_required_props)
            .map(|(group_id, prop)| prop.cap_row_count(ctx.memo[*group_id].statistics().row_count()));

        let cost_ctx = CostContext::new(
            self.required_prop
                .cap_row_count(group.statistics().row_count()),
            input_row_counts,
            group.logical_prop().width(),
        );

        checked_cost(
            ctx.cost_model.as_ref(),
            physical_operator(&ctx.memo, self.group_expr_id)?,
            &cost_ctx,
            ctx.context.validate_costs(),
        )
    }

    fn bound(&self, ctx: &mut CascadesOptimizer) -> QuartziteResult<Cost> {
        Ok(search_state(&mut ctx.memo, self.group_expr_id.group_id, &self.required_prop)?.bound())
    }
}

impl Task for OptimizeInputsTask {
    fn execute(mut self, ctx: &mut CascadesOptimizer) -> QuartziteResult<TaskControl> {
        match replace(&mut self.state, Invalid) {
            Init => self.do_init(ctx),
            BeforeOptimizeInput(progress) => self.do_before_optimize_input(progress, ctx),
            AfterOptimizeInput(progress) => self.do_after_optimize_input(progress, ctx),
            OptimizeSelf(progress) => self.do_optimize_self(progress, ctx),
            Invalid => bail!("Optimize inputs task {} in invalid state", self.group_expr_id),
        }
    }
}

/// Orders inputs by a cost estimate, cheapest first.
///
/// The estimate is the winner for the required property, or else the winner for the empty
/// property, which is a lower bound of it. Inputs with neither come last, in input order.
fn cheapest_input_first(
    memo: &Memo,
    inputs: &[GroupId],
    required_props: &[PhysicalPropertySet],
) -> Vec<usize> {
    let known_costs = inputs
        .iter()
        .zip(required_props)
        .map(|(group_id, prop)| {
            let group = &memo[*group_id];
            group
                .winner(prop)
                .or_else(|| group.winner(&PhysicalPropertySet::default()))
                .map(|winner| winner.cost())
                .unwrap_or(INF)
        })
        .collect::<Vec<_>>();

    (0..inputs.len())
        .sorted_by(|a, b| {
            known_costs[*a]
                .partial_cmp(&known_costs[*b])
                .unwrap_or(Ordering::Equal)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion::prelude::{col, Column, JoinType};
    use enumset::EnumSet;

    use crate::cascades::memo::Winner;
    use crate::cascades::task::{
        cheapest_input_first, schedule, ApplyRuleTask, ExploreGroupTask, OptimizeExpressionTask,
    };
    use crate::cascades::{CascadesOptimizer, GroupExprId};
    use crate::cost::Cost;
    use crate::operator::LogicalOperator::LogicalJoin;
    use crate::operator::Operator::{Logical, Physical};
    use crate::operator::PhysicalOperator::PhysicalTableScan;
    use crate::operator::{Join, TableScan};
    use crate::plan::{LogicalPlanBuilder, PlanNodeBuilder};
    use crate::properties::{PhysicalPropertySet, SortItem};
    use crate::rules::{CommutateJoinRule, RuleId};
    use crate::test_utils::cascades_optimizer_for_test;

    fn join_plan() -> crate::plan::Plan {
        let mut builder = LogicalPlanBuilder::new();
        let right = builder.scan(None, "t2").build().root();
        builder
            .scan(None, "t1")
            .join(JoinType::Inner, col("t1.c1").eq(col("t2.c1")), right)
            .build()
    }

    #[test]
    fn test_apply_rule_task() {
        let mut optimizer = cascades_optimizer_for_test(join_plan());
        let root_group_id = optimizer.memo.root_group_id();
        let root_expr_id = optimizer.memo[root_group_id].logical_expr_ids()[0];

        let task = ApplyRuleTask {
            rule: CommutateJoinRule::new().into(),
            group_expr_id: root_expr_id,
        };
        schedule(&mut optimizer, task.into()).unwrap();

        let logical_exprs = optimizer.memo[root_group_id].logical_expr_ids();
        assert_eq!(2, logical_exprs.len());
        assert!(optimizer.memo[root_expr_id].is_rule_applied(RuleId::CommutateJoin));

        let original_inputs = optimizer.memo[root_expr_id].inputs().to_vec();
        let commuted = &optimizer.memo[logical_exprs[1]];
        assert_eq!(
            &Logical(LogicalJoin(Join::new(
                JoinType::Inner,
                col("t1.c1").eq(col("t2.c1"))
            ))),
            commuted.operator()
        );
        assert_eq!(
            vec![original_inputs[1], original_inputs[0]],
            commuted.inputs().to_vec()
        );
    }

    #[test]
    fn test_explore_group_task() {
        let mut optimizer = cascades_optimizer_for_test(join_plan());
        let root_group_id = optimizer.memo.root_group_id();

        schedule(&mut optimizer, ExploreGroupTask::new(root_group_id).into()).unwrap();

        assert!(optimizer.memo.groups().all(|group| group.explored));

        // Commuted join is deduplicated when commuted again.
        assert_eq!(2, optimizer.memo[root_group_id].logical_expr_ids().len());

        let scan_group_id = optimizer.memo[optimizer.memo[root_group_id].logical_expr_ids()[0]]
            .inputs()[0];
        let scan_ops = optimizer.memo[scan_group_id]
            .physical_expr_ids()
            .into_iter()
            .map(|id| optimizer.memo[id].operator().clone())
            .collect::<Vec<_>>();
        assert!(scan_ops.contains(&Physical(PhysicalTableScan(TableScan::new("t1")))));
        // Full scan and idx_c2
        assert_eq!(2, scan_ops.len());
    }

    fn sorted_by(name: &str) -> PhysicalPropertySet {
        PhysicalPropertySet::sorted_by(vec![SortItem::asc(Column::from_qualified_name(name))])
    }

    fn scan_winner(table: &str, cost: f64) -> Winner {
        let plan = PlanNodeBuilder::new(100, &Physical(PhysicalTableScan(TableScan::new(table))))
            .with_cost(Some(Cost::from(cost)))
            .build();
        Winner {
            cost: Cost::from(cost),
            group_expr_id: None,
            plan: Arc::new(plan),
        }
    }

    /// Expression count of every group, and fired rules of every logical expression.
    fn closure_snapshot(
        optimizer: &CascadesOptimizer,
    ) -> (Vec<usize>, Vec<(GroupExprId, EnumSet<RuleId>)>) {
        let expr_counts = optimizer
            .memo
            .groups()
            .map(|group| group.expr_count())
            .collect();
        let applied_rules = optimizer
            .memo
            .groups()
            .flat_map(|group| group.logical_expr_ids())
            .map(|id| (id, optimizer.memo[id].applied_rules()))
            .collect();
        (expr_counts, applied_rules)
    }

    #[test]
    fn test_explore_again_adds_nothing() {
        let plan = {
            let mut builder = LogicalPlanBuilder::new();
            let right = builder.scan(None, "t2").build().root();
            builder
                .scan(None, "t1")
                .join(JoinType::Inner, col("t1.c1").eq(col("t2.c1")), right)
                .limit(5)
                .build()
        };
        let mut optimizer = cascades_optimizer_for_test(plan);
        optimizer.optimize(&PhysicalPropertySet::default()).unwrap();

        let before = closure_snapshot(&optimizer);
        assert_eq!(4, before.0.len());

        let group_ids = optimizer
            .memo
            .groups()
            .map(|group| group.group_id())
            .collect::<Vec<_>>();
        let logical_expr_ids = before.1.iter().map(|(id, _)| *id).collect::<Vec<_>>();

        for group_expr_id in logical_expr_ids.clone() {
            schedule(&mut optimizer, OptimizeExpressionTask { group_expr_id }.into()).unwrap();
        }
        for group_id in group_ids.clone() {
            schedule(&mut optimizer, ExploreGroupTask::new(group_id).into()).unwrap();
        }
        assert_eq!(before, closure_snapshot(&optimizer));

        // Forgetting the explored flags makes exploration walk every expression again.
        for group_id in group_ids {
            optimizer.memo[group_id].explored = false;
        }
        let root_group_id = optimizer.memo.root_group_id();
        schedule(&mut optimizer, ExploreGroupTask::new(root_group_id).into()).unwrap();
        assert!(optimizer.memo.groups().all(|group| group.explored));
        assert_eq!(before, closure_snapshot(&optimizer));
    }

    #[test]
    fn test_cheapest_input_first() {
        let mut optimizer = cascades_optimizer_for_test(join_plan());
        let root_group_id = optimizer.memo.root_group_id();
        let inputs = optimizer.memo[optimizer.memo[root_group_id].logical_expr_ids()[0]]
            .inputs()
            .to_vec();
        let required = vec![sorted_by("t1.c1"), sorted_by("t2.c1")];

        // Nothing known yet, input order is kept.
        assert_eq!(
            vec![0, 1],
            cheapest_input_first(&optimizer.memo, &inputs, &required)
        );

        // Only the unordered cost of t2 is known, it bounds the ordered one from below.
        let unordered = PhysicalPropertySet::default();
        optimizer.memo[inputs[1]].set_winner(&unordered, scan_winner("t2", 3600.0));
        assert_eq!(
            vec![1, 0],
            cheapest_input_first(&optimizer.memo, &inputs, &required)
        );

        // Winner of required property is preferred over the unordered one.
        optimizer.memo[inputs[0]].set_winner(&unordered, scan_winner("t1", 100.0));
        optimizer.memo[inputs[1]].set_winner(&required[1], scan_winner("t2", 5000.0));
        assert_eq!(
            vec![0, 1],
            cheapest_input_first(&optimizer.memo, &inputs, &required)
        );
    }
}
