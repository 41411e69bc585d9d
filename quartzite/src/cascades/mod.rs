//! Cascades style optimizer.
//!
//! Optimization starts by copying the input logical plan into [`Memo`], one group per plan node.
//! Then [`CascadesOptimizer`] drives a stack of tasks over the memo: groups are explored by
//! applying transformation and implementation rules to their logical expressions, and
//! physical expressions are costed top down for the required physical property, with
//! enforcers filling the gaps. The cheapest plan per group and property is memoized as a
//! [`Winner`].
pub(crate) mod binding;
mod memo;
pub use memo::*;
mod optimizer;
pub use optimizer::*;
mod task;
