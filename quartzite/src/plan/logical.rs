use std::sync::Arc;

use datafusion::prelude::{Expr, JoinType};

use crate::operator::LogicalOperator::{
    LogicalFilter, LogicalGather, LogicalJoin, LogicalLimit, LogicalProjection, LogicalScan,
    LogicalSort,
};
use crate::operator::Operator::Logical;
use crate::operator::{Filter, Gather, Join, Limit, LogicalOperator, Projection, Sort, TableScan};
use crate::plan::{Plan, PlanNode, PlanNodeId, PlanNodeRef};
use crate::properties::{EngineKind, SortItem};
use crate::stat::Statistics;

/// Builds logical plans bottom up.
///
/// Each node is tagged with the engine it runs in. [`storage_scan`](Self::storage_scan) starts a
/// subtree pushed down to storage engine, [`gather`](Self::gather) brings rows back to
/// coordinator. Other operators run in the engine of their input.
pub struct LogicalPlanBuilder {
    root: Option<PlanNodeRef>,
    engine: EngineKind,
    next_plan_node_id: PlanNodeId,
}

impl Default for LogicalPlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalPlanBuilder {
    pub fn new() -> Self {
        Self {
            root: None,
            engine: EngineKind::Coordinator,
            next_plan_node_id: 0,
        }
    }

    fn current_root(&self) -> PlanNodeRef {
        self.root
            .clone()
            .expect("Plan builder has no input node, start with a scan")
    }

    fn reset_root(&mut self, new_root: PlanNode) -> &mut Self {
        let mut new_root = new_root;
        new_root.engine = Some(self.engine);
        self.root = Some(Arc::new(new_root));
        self.next_plan_node_id += 1;
        self
    }

    fn add_node(&mut self, operator: LogicalOperator, inputs: Vec<PlanNodeRef>) -> &mut Self {
        let plan_node = PlanNode::new(self.next_plan_node_id, Logical(operator), inputs);
        self.reset_root(plan_node)
    }

    fn scan_node<S: Into<String>>(limit: Option<usize>, table_name: S) -> LogicalOperator {
        let table_scan = match limit {
            Some(l) => TableScan::with_limit(table_name.into(), l),
            None => TableScan::new(table_name.into()),
        };
        LogicalScan(table_scan)
    }

    /// Scan running in coordinator engine.
    pub fn scan<S: Into<String>>(&mut self, limit: Option<usize>, table_name: S) -> &mut Self {
        self.engine = EngineKind::Coordinator;
        self.add_node(Self::scan_node(limit, table_name), vec![])
    }

    /// Scan pushed down to storage engine, should be followed by a [`gather`](Self::gather).
    pub fn storage_scan<S: Into<String>>(
        &mut self,
        limit: Option<usize>,
        table_name: S,
    ) -> &mut Self {
        self.engine = EngineKind::Storage;
        self.add_node(Self::scan_node(limit, table_name), vec![])
    }

    pub fn filter(&mut self, predicate: Expr) -> &mut Self {
        let input = self.current_root();
        self.add_node(LogicalFilter(Filter::new(predicate)), vec![input])
    }

    pub fn projection<I: IntoIterator<Item = Expr>>(&mut self, exprs: I) -> &mut Self {
        let input = self.current_root();
        self.add_node(LogicalProjection(Projection::new(exprs)), vec![input])
    }

    pub fn limit(&mut self, limit: usize) -> &mut Self {
        let input = self.current_root();
        self.add_node(LogicalLimit(Limit::new(limit)), vec![input])
    }

    pub fn sort<I: IntoIterator<Item = SortItem>>(&mut self, items: I) -> &mut Self {
        let input = self.current_root();
        self.add_node(LogicalSort(Sort::new(items)), vec![input])
    }

    pub fn gather(&mut self) -> &mut Self {
        let input = self.current_root();
        self.engine = EngineKind::Coordinator;
        self.add_node(LogicalGather(Gather::new()), vec![input])
    }

    pub fn join(
        &mut self,
        join_type: JoinType,
        condition: Expr,
        right: PlanNodeRef,
    ) -> &mut Self {
        let left = self.current_root();
        self.add_node(LogicalJoin(Join::new(join_type, condition)), vec![left, right])
    }

    /// Attaches statistics estimated by the binder to current node.
    pub fn with_statistics(&mut self, stat: Statistics) -> &mut Self {
        let mut node = (*self.current_root()).clone();
        node.stat = Some(stat);
        self.root = Some(Arc::new(node));
        self
    }

    /// Consume current plan, but not rest state, e.g. plan node id.
    ///
    /// This is useful for building multi child plan, e.g. join.
    pub fn build(&mut self) -> Plan {
        let ret = Plan {
            root: self.current_root(),
        };
        self.root = None;
        self.engine = EngineKind::Coordinator;
        ret
    }
}

#[cfg(test)]
mod tests {
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::EngineKind;
    use crate::stat::Statistics;

    #[test]
    fn test_engine_tags() {
        let plan = LogicalPlanBuilder::new()
            .storage_scan(None, "t1")
            .limit(5)
            .gather()
            .limit(3)
            .build();

        let engines = plan
            .bfs_iterator()
            .map(|node| node.engine().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(
            vec![
                EngineKind::Coordinator,
                EngineKind::Coordinator,
                EngineKind::Storage,
                EngineKind::Storage
            ],
            engines
        );
    }

    #[test]
    fn test_attach_statistics() {
        let plan = LogicalPlanBuilder::new()
            .scan(None, "t1")
            .with_statistics(Statistics::new(42.0))
            .limit(5)
            .build();

        let scan = plan.root().inputs()[0].clone();
        assert_eq!(Some(42.0), scan.stat().map(|s| s.row_count()));
        assert!(plan.root().stat().is_none());
    }
}
