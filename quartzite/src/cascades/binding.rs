use std::rc::Rc;
use std::vec::IntoIter;

use itertools::Itertools;

use crate::cascades::memo::Memo;
use crate::cascades::{CascadesOptimizer, GroupExprId};
use crate::rules::{OptExpression, Pattern};

type OptExpr = OptExpression<CascadesOptimizer>;

/// Enumerates all sub trees rooted at a group expression that match a pattern.
///
/// Only logical expressions are bound. Pattern leaves are bound as whole groups, so rules see
/// group handles below them.
#[derive(Clone)]
pub(crate) struct Binding<'a, 'b> {
    group_expr_ids: Rc<Vec<GroupExprId>>,
    memo: &'a Memo,
    pattern: &'b Pattern,
}

pub(crate) struct BindingIterator<'a, 'b, I> {
    binding: Binding<'a, 'b>,
    iter: I,
}

impl<'a, 'b> Clone for BindingIterator<'a, 'b, IntoIter<OptExpr>> {
    fn clone(&self) -> Self {
        let iter = self.binding.clone().bind();
        Self {
            binding: self.binding.clone(),
            iter,
        }
    }
}

impl<'a, 'b, I> Iterator for BindingIterator<'a, 'b, I>
where
    I: Iterator<Item = OptExpr>,
{
    type Item = OptExpr;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

impl<'a, 'b> IntoIterator for Binding<'a, 'b> {
    type IntoIter = BindingIterator<'a, 'b, IntoIter<OptExpr>>;
    type Item = OptExpr;

    fn into_iter(self) -> Self::IntoIter {
        let iter = self.clone().bind();
        BindingIterator {
            binding: self,
            iter,
        }
    }
}

impl<'a, 'b> Binding<'a, 'b> {
    pub(crate) fn new(group_expr_id: GroupExprId, pattern: &'b Pattern, memo: &'a Memo) -> Self {
        Self {
            group_expr_ids: Rc::new(vec![group_expr_id]),
            memo,
            pattern,
        }
    }

    fn bind(self) -> IntoIter<OptExpr> {
        let memo = self.memo;
        let matched_group_expr_ids: Vec<GroupExprId> = self
            .group_expr_ids
            .iter()
            .copied()
            .filter(|group_expr_id| {
                let group_expr = &memo[*group_expr_id];
                group_expr.is_logical()
                    && self
                        .pattern
                        .matches_without_children(group_expr.operator(), group_expr.inputs().len())
            })
            .collect();

        if let Some(children_patterns) = &self.pattern.children {
            matched_group_expr_ids
                .into_iter()
                .flat_map(move |group_expr_id| {
                    children_patterns
                        .iter()
                        .zip(memo[group_expr_id].inputs())
                        .map(|(pattern, group_id)| Binding {
                            group_expr_ids: Rc::new(memo[*group_id].logical_expr_ids()),
                            pattern,
                            memo,
                        })
                        .multi_cartesian_product()
                        .map(move |inputs| OptExpression::with_expr_handle(group_expr_id, inputs))
                })
                .collect::<Vec<OptExpr>>()
                .into_iter()
        } else {
            matched_group_expr_ids
                .into_iter()
                .map(|group_expr_id| {
                    OptExpression::with_expr_handle(
                        group_expr_id,
                        memo[group_expr_id]
                            .inputs()
                            .iter()
                            .map(|group_id| OptExpr::with_group_handle(*group_id)),
                    )
                })
                .collect::<Vec<OptExpr>>()
                .into_iter()
        }
    }
}

#[cfg(test)]
mod tests {
    use datafusion::prelude::{col, JoinType};

    use crate::cascades::binding::Binding;
    use crate::cascades::CascadesOptimizer;
    use crate::operator::LogicalOperator::{LogicalJoin, LogicalLimit, LogicalProjection, LogicalScan};
    use crate::operator::LogicalOperatorKind;
    use crate::operator::Operator::Logical;
    use crate::operator::{Join, Limit, Projection, TableScan};
    use crate::plan::LogicalPlanBuilder;
    use crate::rules::OptExprNode::GroupHandleNode;
    use crate::rules::{Matcher, OptExpression, Pattern};
    use crate::test_utils::{cascades_optimizer_for_test, optimizer_context_for_test};
    use crate::utils::TreeBuilder;

    #[test]
    fn test_bind_one() {
        let plan = LogicalPlanBuilder::new()
            .scan(None, "t1")
            .projection(vec![col("t1.c1")])
            .limit(10)
            .build();

        let optimizer = cascades_optimizer_for_test(plan);

        let limit_pattern = Pattern::new_builder(LogicalOperatorKind::LogicalLimit)
            .leaf(Matcher::Any)
            .end_node();

        let root_group_expr_id =
            optimizer.memo[optimizer.memo.root_group_id()].logical_expr_ids()[0];

        let mut bindings =
            Binding::new(root_group_expr_id, &limit_pattern, &optimizer.memo).into_iter();

        // First binding
        {
            let opt_expr = bindings.next().unwrap();
            assert_eq!(
                &Logical(LogicalLimit(Limit::new(10))),
                opt_expr.get_operator(&optimizer).unwrap(),
            );

            assert_eq!(1, opt_expr.inputs().len());
            assert_eq!(
                &Logical(LogicalProjection(Projection::new(vec![col("t1.c1")]))),
                opt_expr[0].get_operator(&optimizer).unwrap()
            );

            assert_eq!(1, opt_expr[0].inputs().len());
            assert!(matches!(opt_expr[0][0].node(), GroupHandleNode(_)));
        }

        // No second binding
        {
            assert!(bindings.next().is_none());
        }
    }

    #[test]
    fn test_bind_mismatch() {
        let plan = LogicalPlanBuilder::new().scan(None, "t1").limit(10).build();
        let optimizer = cascades_optimizer_for_test(plan);

        let pattern = Pattern::new_builder(LogicalOperatorKind::LogicalLimit)
            .leaf(LogicalOperatorKind::LogicalProjection)
            .end_node();
        let root_group_expr_id =
            optimizer.memo[optimizer.memo.root_group_id()].logical_expr_ids()[0];

        assert_eq!(
            0,
            Binding::new(root_group_expr_id, &pattern, &optimizer.memo)
                .into_iter()
                .count()
        );
    }

    #[test]
    fn test_bind_multi() {
        let plan = {
            let mut builder = LogicalPlanBuilder::new();
            let right = builder.scan(None, "t2").build().root();

            builder
                .scan(None, "t1")
                .join(JoinType::Inner, col("t1.c1").eq(col("t2.c1")), right)
                .limit(7)
                .build()
        };

        let mut optimizer = cascades_optimizer_for_test(plan);
        let ctx = optimizer_context_for_test();

        // Currently root group has only one group expr
        let root_group_expr_id =
            optimizer.memo[optimizer.memo.root_group_id()].logical_expr_ids()[0];

        // Insert alternative plan to join
        {
            let left_child = OptExpression::<CascadesOptimizer>::from(Logical(LogicalScan(
                TableScan::new("t2"),
            )));
            let right_child = OptExpression::<CascadesOptimizer>::from(Logical(LogicalScan(
                TableScan::new("t1"),
            )));
            let opt_expr = OptExpression::with_operator(
                Logical(LogicalJoin(Join::new(
                    JoinType::Inner,
                    col("t2.c1").eq(col("t1.c1")),
                ))),
                vec![left_child, right_child],
            );

            let join_group_id = optimizer.memo[root_group_expr_id].inputs()[0];
            let (_, inserted) = optimizer
                .memo
                .insert_opt_expression(&opt_expr, Some(join_group_id), &ctx)
                .unwrap();
            assert!(inserted);
        }

        let limit_join_pattern = Pattern::new_builder(LogicalOperatorKind::LogicalLimit)
            .leaf(LogicalOperatorKind::LogicalJoin)
            .end_node();

        let bindings = Binding::new(root_group_expr_id, &limit_join_pattern, &optimizer.memo)
            .into_iter()
            .collect::<Vec<_>>();
        assert_eq!(2, bindings.len());

        let expected_joins = vec![
            Join::new(JoinType::Inner, col("t1.c1").eq(col("t2.c1"))),
            Join::new(JoinType::Inner, col("t2.c1").eq(col("t1.c1"))),
        ];

        for (opt_expr, join) in bindings.iter().zip(expected_joins) {
            assert_eq!(
                &Logical(LogicalLimit(Limit::new(7))),
                opt_expr.get_operator(&optimizer).unwrap()
            );
            assert_eq!(1, opt_expr.inputs().len());
            assert_eq!(
                &Logical(LogicalJoin(join)),
                opt_expr[0].get_operator(&optimizer).unwrap()
            );
            assert_eq!(2, opt_expr[0].inputs().len());
            assert!(opt_expr[0]
                .inputs()
                .iter()
                .all(|expr| matches!(expr.node(), GroupHandleNode(_))));
        }
    }
}
