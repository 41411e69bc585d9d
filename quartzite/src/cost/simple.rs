use crate::cost::{Cost, CostContext, CostModel};
use crate::error::QuartziteResult;
use crate::operator::PhysicalOperator;

/// Bytes per column assumed when converting schema width to row size.
const BYTES_PER_COLUMN: f64 = 8.0;

/// Per unit factors of [`SimpleCostModel`].
#[derive(Clone, Debug, PartialEq)]
pub struct CostFactors {
    pub cpu: f64,
    pub memory: f64,
    pub scan: f64,
    /// Multiplier on scan cost of an index scan, which reads index and table.
    pub index_lookup: f64,
    pub seek: f64,
    pub network: f64,
}

impl Default for CostFactors {
    fn default() -> Self {
        Self {
            cpu: 3.0,
            memory: 0.001,
            scan: 1.5,
            index_lookup: 2.0,
            seek: 20.0,
            network: 1.0,
        }
    }
}

/// Default cost model, a linear function of row counts for most operators.
#[derive(Clone, Debug, Default)]
pub struct SimpleCostModel {
    factors: CostFactors,
}

impl SimpleCostModel {
    pub fn new(factors: CostFactors) -> Self {
        Self { factors }
    }

    pub fn factors(&self) -> &CostFactors {
        &self.factors
    }

    fn row_size(ctx: &CostContext) -> f64 {
        ctx.schema_width as f64 * BYTES_PER_COLUMN
    }

    fn scan_cost(&self, ctx: &CostContext) -> f64 {
        ctx.row_count * Self::row_size(ctx) * self.factors.scan
    }

    fn sort_cost(&self, ctx: &CostContext) -> f64 {
        let n = ctx.input_row_count(0).max(2.0);
        n * n.log2() * self.factors.cpu + n * self.factors.memory * Self::row_size(ctx)
    }
}

impl CostModel for SimpleCostModel {
    fn estimate(&self, operator: &PhysicalOperator, ctx: &CostContext) -> QuartziteResult<Cost> {
        use PhysicalOperator::*;

        let f = &self.factors;
        let cost = match operator {
            PhysicalTableScan(_) => self.scan_cost(ctx),
            PhysicalIndexScan(_) => {
                f.seek * (ctx.row_count + 1.0).log2() + f.index_lookup * self.scan_cost(ctx)
            }
            PhysicalFilter(_) | PhysicalProjection(_) => ctx.input_row_count(0) * f.cpu,
            PhysicalLimit(_) => ctx.row_count * f.cpu,
            PhysicalSort(_) => self.sort_cost(ctx),
            PhysicalNominalSort(_) => 0.0,
            PhysicalHashJoin(_) => {
                let (left, right) = (ctx.input_row_count(0), ctx.input_row_count(1));
                (left + right) * f.cpu + right * f.memory * Self::row_size(ctx)
            }
            PhysicalMergeJoin(_) => (ctx.input_row_count(0) + ctx.input_row_count(1)) * f.cpu,
            PhysicalGather(_) => ctx.row_count * Self::row_size(ctx) * f.network,
        };

        Ok(Cost::from(cost))
    }
}
