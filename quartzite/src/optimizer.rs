use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::{Catalog, MemoryCatalog};
use crate::error::{OptimizerError, QuartziteResult};
use crate::operator::Operator;
use crate::plan::{Plan, PlanNodeId, PlanNodeIdGen};
use crate::properties::{EngineKind, LogicalProperty, OrderSpec};
use crate::stat::Statistics;

/// Cancellation signal shared between the compilation driver and an optimizer.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Context for optimization. Includes access to catalog, cancellation signal and deadline.
#[derive(Clone)]
pub struct OptimizerContext {
    pub catalog: Arc<dyn Catalog>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    validate_costs: bool,
    plan_node_gen: PlanNodeIdGen,
}

impl Default for OptimizerContext {
    fn default() -> Self {
        Self {
            catalog: Arc::new(MemoryCatalog::default()),
            cancellation: CancellationToken::default(),
            deadline: None,
            validate_costs: cfg!(debug_assertions),
            plan_node_gen: PlanNodeIdGen::default(),
        }
    }
}

impl OptimizerContext {
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Checks every cost returned by cost model. Enabled by default in debug builds.
    pub fn with_cost_validation(mut self, validate: bool) -> Self {
        self.validate_costs = validate;
        self
    }

    pub fn validate_costs(&self) -> bool {
        self.validate_costs
    }

    pub fn next_plan_node_id(&mut self) -> PlanNodeId {
        self.plan_node_gen.gen_next()
    }

    /// Fails with [`OptimizerError::Cancelled`] once cancelled or past deadline.
    pub fn check_cancelled(&self) -> QuartziteResult<()> {
        let expired = self
            .deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false);
        if expired || self.cancellation.is_cancelled() {
            Err(OptimizerError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}

/// Optimizer interface.
///
/// All information required by optimizer, such as rule set, input plan, required property are
/// passed by optimizer in constructor, since different optimizer may require different information.
///
/// The concepts of `group` and `group expression` are borrowed from cascades optimizer. Each
/// `group` consists of several `group expressions`, and all group expressions represents
/// logically same plan, e.g. return same result set.
pub trait Optimizer {
    type GroupHandle: OptGroupHandle<O = Self>;
    type ExprHandle: OptExprHandle<O = Self>;
    type Group: OptGroup;
    type Expr: OptExpr<O = Self, InputHandle = Self::GroupHandle>;

    /// These methods are accessed by rules.
    fn context(&self) -> &OptimizerContext;
    fn group_at(&self, group_handle: Self::GroupHandle) -> &Self::Group;
    fn expr_at(&self, expr_handle: Self::ExprHandle) -> &Self::Expr;

    /// Entry point to drive optimization process.
    fn find_best_plan(self) -> QuartziteResult<Plan>;
}

pub trait OptExpr {
    type O: Optimizer;
    type InputHandle: OptGroupHandle;

    fn operator(&self) -> &Operator;
    fn inputs_len(&self, opt: &Self::O) -> usize;
    fn input_at(&self, idx: usize, opt: &Self::O) -> Self::InputHandle;
}

pub trait OptGroup {
    fn logical_prop(&self) -> &LogicalProperty;
    fn statistics(&self) -> &Statistics;
    fn engine(&self) -> EngineKind;
    /// Order imposed by a logical sort in this group, if the group is one.
    fn sort_order(&self) -> Option<OrderSpec>;
}

pub trait OptExprHandle: Clone + Debug + PartialEq + Eq {
    type O: Optimizer<ExprHandle = Self>;
}

pub trait OptGroupHandle: Clone + Debug + PartialEq + Eq {
    type O: Optimizer<GroupHandle = Self>;
}
