//! Enforcer rules.
//!
//! An enforcer supplies a physical property a group expression can't provide by itself. The
//! search asks the group again under the relaxed property returned by
//! [`Enforcer::new_property`], then wraps the winner with [`Enforcer::on_enforce`] and pays
//! [`Enforcer::enforce_cost`] on top of it.
use std::sync::Arc;

use enum_dispatch::enum_dispatch;

use crate::cost::{checked_cost, Cost, CostContext, CostModel};
use crate::error::QuartziteResult;
use crate::operator::Operator::Physical;
use crate::operator::PhysicalOperator;
use crate::operator::PhysicalOperator::PhysicalSort;
use crate::operator::Sort;
use crate::optimizer::{OptGroup, OptimizerContext};
use crate::plan::{PlanNodeBuilder, PlanNodeRef};
use crate::properties::PhysicalPropertySet;

#[enum_dispatch(EnforcerImpl)]
pub trait Enforcer {
    /// Property the child is asked for, with the dimension this enforcer supplies removed.
    fn new_property(&self, required: &PhysicalPropertySet) -> PhysicalPropertySet;

    /// Wraps `child` with an operator whose output satisfies `required`.
    ///
    /// `cost` is the total cost of the new plan node.
    fn on_enforce(
        &self,
        required: &PhysicalPropertySet,
        child: PlanNodeRef,
        cost: Cost,
        ctx: &mut OptimizerContext,
    ) -> PlanNodeRef;

    /// Extra cost paid for the enforcing operator over all rows of `group`.
    fn enforce_cost<G: OptGroup>(
        &self,
        required: &PhysicalPropertySet,
        group: &G,
        cost_model: &dyn CostModel,
        ctx: &OptimizerContext,
    ) -> QuartziteResult<Cost>;
}

#[enum_dispatch]
#[derive(Clone, Debug)]
pub enum EnforcerImpl {
    OrderEnforcer,
}

/// Supplies sort order by a sort operator.
#[derive(Clone, Debug, Default)]
pub struct OrderEnforcer {}

impl OrderEnforcer {
    pub fn new() -> Self {
        Self {}
    }

    fn sort_operator(required: &PhysicalPropertySet) -> PhysicalOperator {
        PhysicalSort(Sort::new(required.order().items().iter().cloned()))
    }
}

impl Enforcer for OrderEnforcer {
    /// A sort consumes all input rows before returning the first one, so row count hint is
    /// dropped with the order.
    fn new_property(&self, _required: &PhysicalPropertySet) -> PhysicalPropertySet {
        PhysicalPropertySet::default()
    }

    fn on_enforce(
        &self,
        required: &PhysicalPropertySet,
        child: PlanNodeRef,
        cost: Cost,
        ctx: &mut OptimizerContext,
    ) -> PlanNodeRef {
        let node = PlanNodeBuilder::new(
            ctx.next_plan_node_id(),
            &Physical(Self::sort_operator(required)),
        )
        .with_logical_prop(child.logical_prop().cloned())
        .with_statistics(child.stat().cloned())
        .with_engine(child.engine())
        .with_physical_props(Some(required.clone()))
        .with_cost(Some(cost))
        .add_inputs(vec![child])
        .build();

        Arc::new(node)
    }

    fn enforce_cost<G: OptGroup>(
        &self,
        required: &PhysicalPropertySet,
        group: &G,
        cost_model: &dyn CostModel,
        ctx: &OptimizerContext,
    ) -> QuartziteResult<Cost> {
        let row_count = group.statistics().row_count();
        let cost_ctx = CostContext::new(row_count, [row_count], group.logical_prop().width());
        checked_cost(
            cost_model,
            &Self::sort_operator(required),
            &cost_ctx,
            ctx.validate_costs(),
        )
    }
}

/// Enforcers which may supply `required` in `group`.
///
/// Only coordinator groups may run enforcing operators, and only sort order is enforced.
pub fn enforcer_rules<G: OptGroup>(group: &G, required: &PhysicalPropertySet) -> Vec<EnforcerImpl> {
    if group.engine().can_enforce() && !required.order().is_empty() {
        vec![OrderEnforcer::new().into()]
    } else {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion::prelude::Column;

    use crate::cost::{Cost, SimpleCostModel};
    use crate::operator::Operator::Physical;
    use crate::operator::PhysicalOperator::{PhysicalSort, PhysicalTableScan};
    use crate::operator::{Sort, TableScan};
    use crate::optimizer::OptimizerContext;
    use crate::plan::PlanNodeBuilder;
    use crate::properties::{PhysicalPropertySet, SortItem};
    use crate::rules::enforcer::{Enforcer, OrderEnforcer};

    fn required() -> PhysicalPropertySet {
        PhysicalPropertySet::sorted_by(vec![SortItem::desc(Column::from_qualified_name(
            "t1.c2",
        ))])
        .with_expected_row_count(10.0)
    }

    #[test]
    fn test_new_property() {
        let relaxed = OrderEnforcer::new().new_property(&required());
        assert!(relaxed.order().is_empty());
        assert!(relaxed.expected_row_count().is_infinite());
    }

    #[test]
    fn test_on_enforce() {
        let mut ctx = OptimizerContext::default();
        let child = Arc::new(
            PlanNodeBuilder::new(100, &Physical(PhysicalTableScan(TableScan::new("t1"))))
                .with_cost(Some(Cost::from(5.0)))
                .build(),
        );

        let node = OrderEnforcer::new().on_enforce(
            &required(),
            child.clone(),
            Cost::from(8.0),
            &mut ctx,
        );

        assert_eq!(
            &Physical(PhysicalSort(Sort::new(required().order().items().to_vec()))),
            node.operator()
        );
        assert_eq!(Some(&required()), node.physical_props());
        assert_eq!(Some(Cost::from(8.0)), node.cost());
        assert_eq!(&[child], node.inputs());
    }

    #[test]
    fn test_enforce_cost_positive() {
        let optimizer = crate::test_utils::cascades_optimizer_for_test(
            crate::plan::LogicalPlanBuilder::new().scan(None, "t1").build(),
        );
        let root = optimizer.memo.root_group_id();
        let group = &optimizer.memo[root];

        let cost = OrderEnforcer::new()
            .enforce_cost(
                &required(),
                group,
                &SimpleCostModel::default(),
                &OptimizerContext::default(),
            )
            .unwrap();
        assert!(cost > Cost::from(0.0));
    }
}
