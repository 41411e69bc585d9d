use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

use crate::cascades::binding::Binding;
use crate::cascades::CascadesOptimizer;
use crate::catalog::{Catalog, MemoryCatalog, TableMeta};
use crate::cost::SimpleCostModel;
use crate::optimizer::OptimizerContext;
use crate::plan::Plan;
use crate::properties::PhysicalPropertySet;
use crate::rules::{OptExpression, Rule, RuleImpl, RuleResult, RuleSet};

fn table_for_test(name: &str, row_count: f64) -> TableMeta {
    let schema = Schema::new(vec![
        Field::new("c1", DataType::Int64, false),
        Field::new("c2", DataType::Int64, true),
        Field::new("c3", DataType::Utf8, true),
    ]);

    TableMeta::new(name, Arc::new(schema))
        .with_row_count(row_count)
        .with_ndv("c1", row_count)
        .with_primary_key(["c1"])
}

/// `t1` has 1000 rows and an index on `c2`, `t2` has 100 rows. Both are keyed by `c1`.
pub(crate) fn catalog_for_test() -> Arc<dyn Catalog> {
    let mut catalog = MemoryCatalog::new();
    catalog.register_table(table_for_test("t1", 1000.0).with_index("idx_c2", ["c2"]));
    catalog.register_table(table_for_test("t2", 100.0));
    Arc::new(catalog)
}

pub(crate) fn optimizer_context_for_test() -> OptimizerContext {
    OptimizerContext::default()
        .with_catalog(catalog_for_test())
        .with_cost_validation(true)
}

/// Optimizer with default rules and cost model, whose memo is built from `plan`.
pub(crate) fn cascades_optimizer_for_test(plan: Plan) -> CascadesOptimizer {
    CascadesOptimizer::new(
        PhysicalPropertySet::default(),
        Arc::new(RuleSet::with_default_rules().unwrap()),
        Arc::new(SimpleCostModel::default()),
        plan,
        optimizer_context_for_test(),
    )
    .unwrap()
}

/// Applies `rule` to all bindings of the first logical expression in root group.
///
/// Results are returned without being inserted into memo.
pub(crate) fn apply_rule_to_root_for_test(
    rule: RuleImpl,
    plan: Plan,
) -> (CascadesOptimizer, Vec<OptExpression<CascadesOptimizer>>) {
    let optimizer = cascades_optimizer_for_test(plan);
    let root_expr_id = optimizer.memo[optimizer.memo.root_group_id()].logical_expr_ids()[0];

    let bindings = Binding::new(root_expr_id, rule.pattern(), &optimizer.memo)
        .into_iter()
        .collect::<Vec<_>>();

    let mut result = RuleResult::new();
    for binding in bindings {
        rule.apply(binding, &optimizer, &mut result).unwrap();
    }

    let results = result.results().collect();
    (optimizer, results)
}
