use std::sync::Arc;

use log::{debug, info};

use crate::cascades::memo::Memo;
use crate::cascades::task::{schedule, OptimizeGroupTask};
use crate::cascades::{Group, GroupExpr, GroupExprId, GroupId};
use crate::cost::{CostModel, INF};
use crate::error::{OptimizerError, QuartziteResult};
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::plan::Plan;
use crate::properties::PhysicalPropertySet;
use crate::rules::RuleSet;

/// Top down optimizer over a memo built from one logical plan.
///
/// Rule set and cost model are shared, read only, by all optimizers, while memo is owned by one
/// optimizer and mutated by one thread only.
pub struct CascadesOptimizer {
    pub(crate) required_prop: PhysicalPropertySet,
    pub(crate) rules: Arc<RuleSet>,
    pub(crate) cost_model: Arc<dyn CostModel>,
    pub(crate) memo: Memo,
    pub(crate) context: OptimizerContext,
    pub(crate) executed_tasks: usize,
}

impl Optimizer for CascadesOptimizer {
    type GroupHandle = GroupId;
    type ExprHandle = GroupExprId;
    type Group = Group;
    type Expr = GroupExpr;

    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn group_at(&self, group_handle: GroupId) -> &Group {
        &self.memo[group_handle]
    }

    fn expr_at(&self, expr_handle: GroupExprId) -> &GroupExpr {
        &self.memo[expr_handle]
    }

    fn find_best_plan(mut self) -> QuartziteResult<Plan> {
        let required_prop = self.required_prop.clone();
        self.optimize(&required_prop)
    }
}

impl CascadesOptimizer {
    pub fn new(
        required_prop: PhysicalPropertySet,
        rules: Arc<RuleSet>,
        cost_model: Arc<dyn CostModel>,
        plan: Plan,
        context: OptimizerContext,
    ) -> QuartziteResult<Self> {
        if rules.is_empty() {
            return Err(OptimizerError::Configuration("rule set is empty".to_string()).into());
        }

        let memo = Memo::new(&plan, &context)?;
        Ok(Self {
            required_prop,
            rules,
            cost_model,
            memo,
            context,
            executed_tasks: 0,
        })
    }

    /// Finds the cheapest implementation of root group satisfying `required_prop`.
    ///
    /// Winners are kept in memo, so calling this again for a property already optimized
    /// returns the same plan without searching.
    pub fn optimize(&mut self, required_prop: &PhysicalPropertySet) -> QuartziteResult<Plan> {
        let root_group_id = self.memo.root_group_id();
        let executed_before = self.executed_tasks;
        info!(
            "Beginning to optimize root group {} for {}",
            root_group_id, required_prop
        );

        let root_task = OptimizeGroupTask::new(root_group_id, required_prop.clone(), INF).into();
        if let Err(e) = schedule(self, root_task) {
            self.memo.clear_searching();
            return Err(e);
        }

        info!(
            "Optimization of root group {} finished with {} tasks, {} groups in memo",
            root_group_id,
            self.executed_tasks - executed_before,
            self.memo.group_count()
        );
        debug!("Memo after optimization: {:?}", self.memo);

        match self.memo[root_group_id].winner(required_prop) {
            Some(winner) => Ok(Plan::new(winner.plan())),
            None => Err(OptimizerError::NoFeasiblePlan {
                group: root_group_id.0,
                required: required_prop.to_string(),
            }
            .into()),
        }
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    /// Number of tasks run by all optimizations so far.
    pub fn executed_tasks(&self) -> usize {
        self.executed_tasks
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use datafusion::prelude::{col, Column, JoinType};

    use crate::cascades::CascadesOptimizer;
    use crate::cost::{Cost, CostContext, CostModel, SimpleCostModel};
    use crate::error::{OptimizerError, QuartziteResult};
    use crate::operator::Operator::Physical;
    use crate::operator::PhysicalOperator::{
        PhysicalIndexScan, PhysicalLimit, PhysicalMergeJoin, PhysicalNominalSort, PhysicalSort,
        PhysicalTableScan,
    };
    use crate::operator::{PhysicalOperator, Sort, TableScan};
    use crate::optimizer::{CancellationToken, OptGroup, Optimizer, OptimizerContext};
    use crate::plan::{explain_to_string, LogicalPlanBuilder, Plan};
    use crate::properties::{PhysicalPropertySet, SortItem};
    use crate::rules::RuleSet;
    use crate::test_utils::{
        cascades_optimizer_for_test, catalog_for_test, optimizer_context_for_test,
    };

    fn sort_item(name: &str) -> SortItem {
        SortItem::asc(Column::from_qualified_name(name))
    }

    fn sorted_by(name: &str) -> PhysicalPropertySet {
        PhysicalPropertySet::sorted_by(vec![sort_item(name)])
    }

    fn scan_plan() -> Plan {
        LogicalPlanBuilder::new().scan(None, "t1").build()
    }

    fn root_operator(plan: &Plan) -> PhysicalOperator {
        plan.root().operator().as_physical().unwrap().clone()
    }

    #[test]
    fn test_optimize_scan_with_order() {
        let mut optimizer = cascades_optimizer_for_test(scan_plan());

        let plan = optimizer.optimize(&PhysicalPropertySet::default()).unwrap();
        assert!(matches!(root_operator(&plan), PhysicalTableScan(_)));
        let scan_cost = plan.cost().unwrap();
        assert_eq!(Cost::from(1000.0 * 24.0 * 1.5), scan_cost);

        // Natural order of t1 is its primary key.
        let plan = optimizer.optimize(&sorted_by("t1.c1")).unwrap();
        assert!(matches!(root_operator(&plan), PhysicalTableScan(_)));
        assert_eq!(scan_cost, plan.cost().unwrap());

        let plan = optimizer.optimize(&sorted_by("t1.c2")).unwrap();
        assert_eq!(
            &Physical(PhysicalSort(Sort::new(vec![sort_item("t1.c2")]))),
            plan.root().operator()
        );
        assert_eq!(
            &Physical(PhysicalTableScan(TableScan::new("t1"))),
            plan.root().inputs()[0].operator()
        );

        let enforce_cost = SimpleCostModel::default()
            .estimate(
                &PhysicalSort(Sort::new(vec![sort_item("t1.c2")])),
                &CostContext::new(1000.0, [1000.0], 3),
            )
            .unwrap();
        assert!(enforce_cost > Cost::from(0.0));
        assert_eq!(scan_cost + enforce_cost, plan.cost().unwrap());
    }

    #[test]
    fn test_winner_is_cached() {
        let mut optimizer = cascades_optimizer_for_test(scan_plan());
        let required = sorted_by("t1.c2");

        let first = optimizer.optimize(&required).unwrap();
        let executed = optimizer.executed_tasks();
        let groups = optimizer.memo().group_count();

        let second = optimizer.optimize(&required).unwrap();
        assert_eq!(executed + 1, optimizer.executed_tasks());
        assert_eq!(groups, optimizer.memo().group_count());
        assert_eq!(first.cost(), second.cost());
        assert_eq!(first.root().id(), second.root().id());
    }

    #[test]
    fn test_winner_not_worse_than_candidates() {
        let mut optimizer = cascades_optimizer_for_test(scan_plan());
        let required = sorted_by("t1.c2");
        let plan = optimizer.optimize(&required).unwrap();

        let root_group = &optimizer.memo()[optimizer.memo().root_group_id()];
        let winner = root_group.winner(&required).unwrap();
        assert_eq!(plan.cost(), Some(winner.cost()));

        let candidates = root_group
            .candidates()
            .iter()
            .filter(|c| c.prop == required)
            .collect::<Vec<_>>();
        // Index scan and enforced sort
        assert_eq!(2, candidates.len());
        assert!(candidates.iter().all(|c| winner.cost() <= c.cost));
        assert!(winner.group_expr_id().is_none());
    }

    #[test]
    fn test_optimize_is_deterministic() {
        let build = || {
            let mut builder = LogicalPlanBuilder::new();
            let right = builder.scan(None, "t2").build().root();
            builder
                .scan(None, "t1")
                .join(JoinType::Inner, col("t1.c1").eq(col("t2.c1")), right)
                .limit(10)
                .build()
        };

        let explain = |plan: Plan| {
            let mut optimizer = cascades_optimizer_for_test(plan);
            let best = optimizer.optimize(&PhysicalPropertySet::default()).unwrap();
            (explain_to_string(&best).unwrap(), optimizer.executed_tasks())
        };

        assert_eq!(explain(build()), explain(build()));
    }

    #[test]
    fn test_limit_over_sort_uses_index() {
        let plan = LogicalPlanBuilder::new()
            .scan(None, "t1")
            .sort(vec![sort_item("t1.c2")])
            .limit(10)
            .build();

        let mut optimizer = cascades_optimizer_for_test(plan);
        let plan = optimizer.optimize(&PhysicalPropertySet::default()).unwrap();

        let limit = plan.root();
        assert!(matches!(limit.operator(), Physical(PhysicalLimit(_))));
        let sort = &limit.inputs()[0];
        assert!(matches!(sort.operator(), Physical(PhysicalNominalSort(_))));
        let scan = &sort.inputs()[0];
        match scan.operator() {
            Physical(PhysicalIndexScan(index_scan)) => assert_eq!("idx_c2", index_scan.index_name()),
            op => panic!("Unexpected operator {}", op),
        }
        // Only 10 rows are read from index.
        assert!(scan.cost().unwrap() < Cost::from(1000.0 * 24.0 * 1.5));
    }

    #[test]
    fn test_ordered_limit_over_sort() {
        let plan = LogicalPlanBuilder::new()
            .scan(None, "t1")
            .sort(vec![sort_item("t1.c2")])
            .limit(10)
            .build();

        let mut optimizer = cascades_optimizer_for_test(plan);
        let plan = optimizer.optimize(&sorted_by("t1.c2")).unwrap();

        // Limit keeps the order of its sorted input, no sort above it.
        let limit = plan.root();
        assert!(matches!(limit.operator(), Physical(PhysicalLimit(_))));
        assert!(limit
            .physical_props()
            .unwrap()
            .satisfies(&sorted_by("t1.c2")));
        let sort = &limit.inputs()[0];
        assert!(matches!(sort.operator(), Physical(PhysicalNominalSort(_))));
        assert!(matches!(
            sort.inputs()[0].operator(),
            Physical(PhysicalIndexScan(_))
        ));
    }

    #[test]
    fn test_limit_over_sort_with_other_order() {
        let plan = LogicalPlanBuilder::new()
            .scan(None, "t1")
            .sort(vec![sort_item("t1.c2")])
            .limit(10)
            .build();

        let mut optimizer = cascades_optimizer_for_test(plan);
        let plan = optimizer.optimize(&sorted_by("t1.c3")).unwrap();

        // Rows kept by limit are the first ones by t1.c2, so t1.c3 is sorted above limit.
        assert_eq!(
            PhysicalSort(Sort::new(vec![sort_item("t1.c3")])),
            root_operator(&plan)
        );
        let root = plan.root();
        let limit = &root.inputs()[0];
        assert!(matches!(limit.operator(), Physical(PhysicalLimit(_))));
        assert!(matches!(
            limit.inputs()[0].operator(),
            Physical(PhysicalNominalSort(_))
        ));
    }

    #[test]
    fn test_optimize_merge_join() {
        let plan = {
            let mut builder = LogicalPlanBuilder::new();
            let right = builder.scan(None, "t2").build().root();
            builder
                .scan(None, "t1")
                .join(JoinType::Inner, col("t1.c1").eq(col("t2.c1")), right)
                .build()
        };

        let mut optimizer = cascades_optimizer_for_test(plan);
        let plan = optimizer.optimize(&sorted_by("t1.c1")).unwrap();

        assert!(matches!(root_operator(&plan), PhysicalMergeJoin(_)));
        let inputs = plan.root().inputs().to_vec();
        assert_eq!(
            &Physical(PhysicalTableScan(TableScan::new("t1"))),
            inputs[0].operator()
        );
        assert_eq!(
            &Physical(PhysicalTableScan(TableScan::new("t2"))),
            inputs[1].operator()
        );
    }

    #[test]
    fn test_no_enforcer_in_storage() {
        let plan = LogicalPlanBuilder::new().storage_scan(None, "t1").build();
        let mut optimizer = cascades_optimizer_for_test(plan);

        let err = optimizer.optimize(&sorted_by("t1.c3")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::NoFeasiblePlan { group: 0, .. })
        ));

        // Relaxed property still works on the same memo.
        let plan = optimizer.optimize(&PhysicalPropertySet::default()).unwrap();
        assert!(matches!(root_operator(&plan), PhysicalTableScan(_)));
    }

    #[test]
    fn test_enforce_above_gather() {
        let plan = LogicalPlanBuilder::new()
            .storage_scan(None, "t1")
            .gather()
            .build();
        let mut optimizer = cascades_optimizer_for_test(plan);

        let plan = optimizer.optimize(&sorted_by("t1.c3")).unwrap();
        assert!(matches!(root_operator(&plan), PhysicalSort(_)));
        assert!(optimizer.memo()[optimizer.memo().root_group_id()]
            .engine()
            .can_enforce());
    }

    #[test]
    fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let context = optimizer_context_for_test().with_cancellation(token);

        let mut optimizer = CascadesOptimizer::new(
            PhysicalPropertySet::default(),
            Arc::new(RuleSet::with_default_rules().unwrap()),
            Arc::new(SimpleCostModel::default()),
            scan_plan(),
            context,
        )
        .unwrap();

        let err = optimizer.optimize(&PhysicalPropertySet::default()).unwrap_err();
        assert!(OptimizerError::is_cancelled(&err));
        assert!(optimizer
            .memo()
            .groups()
            .all(|group| group.searching.is_empty()));
    }

    #[test]
    fn test_deadline_exceeded() {
        let context = optimizer_context_for_test().with_deadline(Instant::now());
        let optimizer = CascadesOptimizer::new(
            PhysicalPropertySet::default(),
            Arc::new(RuleSet::with_default_rules().unwrap()),
            Arc::new(SimpleCostModel::default()),
            scan_plan(),
            context,
        )
        .unwrap();

        assert!(OptimizerError::is_cancelled(
            &optimizer.find_best_plan().unwrap_err()
        ));
    }

    #[test]
    fn test_cost_model_violation() {
        struct NegativeCostModel;

        impl CostModel for NegativeCostModel {
            fn estimate(
                &self,
                _operator: &PhysicalOperator,
                _ctx: &CostContext,
            ) -> QuartziteResult<Cost> {
                Ok(Cost::from(-1.0))
            }
        }

        let optimizer = CascadesOptimizer::new(
            PhysicalPropertySet::default(),
            Arc::new(RuleSet::with_default_rules().unwrap()),
            Arc::new(NegativeCostModel),
            scan_plan(),
            OptimizerContext::default()
                .with_catalog(catalog_for_test())
                .with_cost_validation(true),
        )
        .unwrap();

        let err = optimizer.find_best_plan().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::CostModelViolation(_))
        ));
    }

    #[test]
    fn test_find_best_plan() {
        let plan = LogicalPlanBuilder::new()
            .scan(None, "t1")
            .limit(5)
            .build();

        let optimizer = CascadesOptimizer::new(
            sorted_by("t1.c1"),
            Arc::new(RuleSet::with_default_rules().unwrap()),
            Arc::new(SimpleCostModel::default()),
            plan,
            optimizer_context_for_test(),
        )
        .unwrap();

        let plan = optimizer.find_best_plan().unwrap();
        assert!(plan
            .root()
            .physical_props()
            .unwrap()
            .satisfies(&sorted_by("t1.c1")));
    }
}
