use std::fmt::{Debug, Display, Formatter};

use strum_macros::AsRefStr;

use crate::error::QuartziteResult;
use crate::operator::table_scan::table_meta;
use crate::operator::{
    DisplayFields, Filter, Gather, IndexScan, Join, Limit, Projection, Sort, TableScan,
    SELECTION_FACTOR,
};
use crate::optimizer::{OptExpr, OptGroup, Optimizer};
use crate::properties::{OrderSpec, PhysicalProp, PhysicalPropertySet, SortItem};

/// Physical relational operator.
#[derive(Clone, Debug, Hash, PartialEq, AsRefStr)]
pub enum PhysicalOperator {
    PhysicalTableScan(TableScan),
    PhysicalIndexScan(IndexScan),
    PhysicalFilter(Filter),
    PhysicalProjection(Projection),
    PhysicalLimit(Limit),
    PhysicalHashJoin(Join),
    /// Requires both inputs sorted on join keys.
    PhysicalMergeJoin(Join),
    PhysicalSort(Sort),
    /// Sort whose input already provides the order, it does nothing at runtime.
    PhysicalNominalSort(Sort),
    PhysicalGather(Gather),
}

pub struct DerivePropContext<'a, O: Optimizer> {
    pub required_prop: &'a PhysicalPropertySet,
    pub expr_handle: O::ExprHandle,
    pub optimizer: &'a O,
}

/// One way an operator may run: what it outputs and what it asks from its inputs.
#[derive(Debug, Clone)]
pub struct DerivePropResult {
    pub output_prop: PhysicalPropertySet,
    pub input_required_props: Vec<PhysicalPropertySet>,
}

impl DerivePropResult {
    fn new(output: OrderSpec, inputs: Vec<PhysicalPropertySet>) -> Self {
        Self {
            output_prop: PhysicalPropertySet::new(output),
            input_required_props: inputs,
        }
    }
}

impl PhysicalOperator {
    /// Derive children's required properties with required properties of current node.
    ///
    /// Each result is an alternative, whose `output_prop` may not satisfy required property.
    pub fn derive_properties<O: Optimizer>(
        &self,
        context: DerivePropContext<O>,
    ) -> QuartziteResult<Vec<DerivePropResult>> {
        use PhysicalOperator::*;

        let required = context.required_prop;
        let pass_through = || required.order().clone();

        let result = match self {
            PhysicalTableScan(scan) => {
                let table = table_meta(context.optimizer.context(), scan.table_name())?;
                DerivePropResult::new(OrderSpec::new(table.natural_order()), vec![])
            }
            PhysicalIndexScan(scan) => DerivePropResult::new(OrderSpec::new(scan.order()), vec![]),
            PhysicalFilter(_) => DerivePropResult::new(
                pass_through(),
                vec![PhysicalPropertySet::new(pass_through())
                    .with_expected_row_count(required.expected_row_count() / SELECTION_FACTOR)],
            ),
            PhysicalProjection(projection) => {
                if projection.preserves(required.order().items()) {
                    DerivePropResult::new(pass_through(), vec![required.clone()])
                } else {
                    DerivePropResult::new(
                        OrderSpec::default(),
                        vec![PhysicalPropertySet::default()
                            .with_expected_row_count(required.expected_row_count())],
                    )
                }
            }
            PhysicalLimit(limit) => {
                let expected = required.cap_row_count(limit.limit() as f64);
                let mut results = vec![DerivePropResult::new(
                    OrderSpec::default(),
                    vec![PhysicalPropertySet::default().with_expected_row_count(expected)],
                )];
                // Rows kept by a limit over a sort are sorted, other orders would change them.
                if let Some(order) = limit_input_order(required, &context) {
                    results.push(DerivePropResult::new(
                        order.clone(),
                        vec![PhysicalPropertySet::new(order).with_expected_row_count(expected)],
                    ));
                }
                return Ok(results);
            }
            PhysicalHashJoin(_) => DerivePropResult::new(
                OrderSpec::default(),
                vec![PhysicalPropertySet::default(), PhysicalPropertySet::default()],
            ),
            PhysicalMergeJoin(join) => match merge_join_keys(join, &context)? {
                Some((left_key, right_key)) => DerivePropResult::new(
                    OrderSpec::new(vec![left_key.clone()]),
                    vec![
                        PhysicalPropertySet::sorted_by(vec![left_key]),
                        PhysicalPropertySet::sorted_by(vec![right_key]),
                    ],
                ),
                None => return Ok(vec![]),
            },
            PhysicalSort(sort) => {
                DerivePropResult::new(sort.order(), vec![PhysicalPropertySet::default()])
            }
            PhysicalNominalSort(sort) => DerivePropResult::new(
                sort.order(),
                vec![PhysicalPropertySet::new(sort.order())
                    .with_expected_row_count(required.expected_row_count())],
            ),
            PhysicalGather(_) => DerivePropResult::new(pass_through(), vec![required.clone()]),
        };

        Ok(vec![result])
    }
}

/// Order of the sort below a limit, when it provides the required non empty order.
fn limit_input_order<O: Optimizer>(
    required: &PhysicalPropertySet,
    context: &DerivePropContext<O>,
) -> Option<OrderSpec> {
    if required.order().is_empty() {
        return None;
    }

    let optimizer = context.optimizer;
    let expr = optimizer.expr_at(context.expr_handle.clone());
    optimizer
        .group_at(expr.input_at(0, optimizer))
        .sort_order()
        .filter(|order| order.satisfies(required.order()))
}

/// Sort items of merge join inputs, oriented by which input owns which column.
fn merge_join_keys<O: Optimizer>(
    join: &Join,
    context: &DerivePropContext<O>,
) -> QuartziteResult<Option<(SortItem, SortItem)>> {
    let (a, b) = match join.equi_join_columns() {
        Some(columns) => columns,
        None => return Ok(None),
    };

    let optimizer = context.optimizer;
    let expr = optimizer.expr_at(context.expr_handle.clone());
    let left_schema = optimizer
        .group_at(expr.input_at(0, optimizer))
        .logical_prop()
        .schema();

    if left_schema.index_of_column(a).is_ok() {
        Ok(Some((SortItem::asc(a.clone()), SortItem::asc(b.clone()))))
    } else if left_schema.index_of_column(b).is_ok() {
        Ok(Some((SortItem::asc(b.clone()), SortItem::asc(a.clone()))))
    } else {
        Ok(None)
    }
}

impl DisplayFields for PhysicalOperator {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use PhysicalOperator::*;
        match self {
            PhysicalTableScan(op) => op.display(f),
            PhysicalIndexScan(op) => op.display(f),
            PhysicalFilter(op) => op.display(f),
            PhysicalProjection(op) => op.display(f),
            PhysicalLimit(op) => op.display(f),
            PhysicalHashJoin(op) | PhysicalMergeJoin(op) => op.display(f),
            PhysicalSort(op) | PhysicalNominalSort(op) => op.display(f),
            PhysicalGather(op) => op.display(f),
        }
    }
}

impl Display for PhysicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())?;
        self.display(f)
    }
}
