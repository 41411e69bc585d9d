use anyhow::bail;

use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::LogicalScan;
use crate::operator::LogicalOperatorKind;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{PhysicalIndexScan, PhysicalTableScan};
use crate::operator::{table_meta, IndexScan};
use crate::optimizer::Optimizer;
use crate::rules::RuleId::{Scan2IndexScan, Scan2TableScan};
use crate::rules::RulePromise::High;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref SCAN_PATTERN: Pattern = {
        Pattern::new_builder(LogicalOperatorKind::LogicalScan)
        .end_node()
    };
}

#[derive(Clone, Default)]
pub struct Scan2TableScanRule {}

impl Scan2TableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Scan2TableScanRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let Logical(LogicalScan(scan)) = input.get_operator(ctx)? {
            let table_scan_op = Physical(PhysicalTableScan(scan.clone()));
            result.add(OptExpression::from(table_scan_op));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &SCAN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Scan2TableScan
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}

/// Produces one index scan per secondary index of the table.
///
/// Scans with limit are left to table scan, a limit above the scan still lets index scan benefit
/// from the expected row count.
#[derive(Clone, Default)]
pub struct Scan2IndexScanRule {}

impl Scan2IndexScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Scan2IndexScanRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let scan = match input.get_operator(ctx)? {
            Logical(LogicalScan(scan)) => scan,
            _ => bail!("Pattern miss matched"),
        };
        if scan.limit().is_some() {
            return Ok(());
        }

        let table = table_meta(ctx.context(), scan.table_name())?;
        for index in table.indexes() {
            let index_scan_op = Physical(PhysicalIndexScan(IndexScan::new(&table, index)));
            result.add(OptExpression::from(index_scan_op));
        }

        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &SCAN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Scan2IndexScan
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}

#[cfg(test)]
mod tests {
    use crate::operator::Operator::Physical;
    use crate::operator::PhysicalOperator::{PhysicalIndexScan, PhysicalTableScan};
    use crate::operator::TableScan;
    use crate::plan::LogicalPlanBuilder;
    use crate::rules::{Scan2IndexScanRule, Scan2TableScanRule};
    use crate::test_utils::apply_rule_to_root_for_test;

    #[test]
    fn test_scan_to_table_scan() {
        let plan = LogicalPlanBuilder::new().scan(Some(3), "t1").build();
        let (optimizer, results) =
            apply_rule_to_root_for_test(Scan2TableScanRule::new().into(), plan);

        assert_eq!(1, results.len());
        assert_eq!(
            &Physical(PhysicalTableScan(TableScan::with_limit("t1", 3))),
            results[0].get_operator(&optimizer).unwrap()
        );
    }

    #[test]
    fn test_scan_to_index_scan() {
        let plan = LogicalPlanBuilder::new().scan(None, "t1").build();
        let (optimizer, results) =
            apply_rule_to_root_for_test(Scan2IndexScanRule::new().into(), plan);

        assert_eq!(1, results.len());
        match results[0].get_operator(&optimizer).unwrap() {
            Physical(PhysicalIndexScan(scan)) => {
                assert_eq!("t1", scan.table_name());
                assert_eq!("idx_c2", scan.index_name());
            }
            op => panic!("Unexpected operator {}", op),
        }

        // t2 has no secondary index.
        let plan = LogicalPlanBuilder::new().scan(None, "t2").build();
        let (_, results) = apply_rule_to_root_for_test(Scan2IndexScanRule::new().into(), plan);
        assert!(results.is_empty());

        let plan = LogicalPlanBuilder::new().scan(Some(3), "t1").build();
        let (_, results) = apply_rule_to_root_for_test(Scan2IndexScanRule::new().into(), plan);
        assert!(results.is_empty());
    }
}
