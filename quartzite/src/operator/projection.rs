use datafusion::common::DFField;
use datafusion::prelude::Column;
use datafusion_common::DFSchema;
use datafusion_expr::Expr;
use std::fmt::Formatter;

use crate::error::{DFResult, QuartziteResult};
use crate::operator::{single_input, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{LogicalProperty, SortItem};
use crate::stat::Statistics;
use datafusion_expr::ExprSchemable;

#[derive(Clone, Debug, Hash, PartialEq)]
pub struct Projection {
    expr: Vec<Expr>,
}

impl Projection {
    pub fn new<I: IntoIterator<Item = Expr>>(exprs: I) -> Self {
        Self {
            expr: exprs.into_iter().collect(),
        }
    }

    pub fn expr(&self) -> &[Expr] {
        &self.expr
    }

    /// Whether rows keep `order` after projection, e.g. all sort columns are projected as is.
    pub fn preserves(&self, order: &[SortItem]) -> bool {
        order.iter().all(|item| {
            self.expr
                .iter()
                .any(|e| matches!(e, Expr::Column(c) if same_column(c, item.column())))
        })
    }
}

fn same_column(projected: &Column, sorted: &Column) -> bool {
    projected == sorted || (projected.relation.is_none() && projected.name == sorted.name)
}

impl OperatorTrait for Projection {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> QuartziteResult<LogicalProperty> {
        let input_logical_prop = single_input(inputs, "Projection")?;
        let input_schema = input_logical_prop.schema();
        let schema = DFSchema::new_with_metadata(
            self.expr
                .iter()
                .map(|e| e.to_field(input_schema))
                .collect::<DFResult<Vec<DFField>>>()?,
            input_schema.metadata().clone(),
        )?;

        Ok(LogicalProperty::new(schema))
    }

    fn derive_statistics(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&Statistics],
    ) -> QuartziteResult<Statistics> {
        Ok(single_input(inputs, "Projection")?.clone())
    }
}

impl DisplayFields for Projection {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("").field("expr", &self.expr).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::operator::Projection;
    use crate::properties::SortItem;
    use datafusion::prelude::{col, Column};

    #[test]
    fn test_preserves_order() {
        let projection = Projection::new(vec![col("t1.c1"), col("t1.c2")]);
        let c1 = SortItem::asc(Column::from_qualified_name("t1.c1"));
        let c3 = SortItem::asc(Column::from_qualified_name("t1.c3"));

        assert!(projection.preserves(&[c1.clone()]));
        assert!(!projection.preserves(&[c1, c3]));
        assert!(projection.preserves(&[]));
    }
}
