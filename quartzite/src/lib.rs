//! ## Background
//!
//! A cost based optimizer turns a logical query plan into the cheapest physical plan it can find
//! that satisfies the physical properties required by the caller, for example "rows sorted by
//! `t1.c1`" for an `ORDER BY` clause. This crate implements the top-down, memoized search
//! strategy proposed by [1]: equivalent expressions are grouped into a memo, rules add logical
//! alternatives and physical implementations to each group, and branch-and-bound pruning keeps
//! the exponential search space manageable. Properties a child can't provide by itself are
//! supplied by enforcers, such as a sort placed on top of an unordered scan.
//!
//! ## Design
//!
//! * [`cascades`] Memo, rule binding and the task based search.
//! * [`operator`] Relational operators and property derivation.
//! * [`properties`] Logical properties, physical properties and engine affinity.
//! * [`rules`] Transformation, implementation and enforcer rules.
//! * [`cost`] Cost model interface and the default cost model.
//! * [`catalog`] Table metadata read by the optimizer.
//!
//! ## Reference
//!
//! 1. Graefe, G., 1995. The cascades framework for query optimization. IEEE Data Eng. Bull., 18(3),
//! pp.19-29.
//! 2. Xu, Y., 1998. Efficiency in the Columbia database query optimizer. Portland State University.
//! 3. Columnbia Project, https://github.com/yongwen/columbia

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

use datafusion::prelude::Expr;

pub mod cascades;
pub mod catalog;
pub mod cost;
pub mod error;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod properties;
pub mod rules;
pub mod stat;
#[cfg(test)]
mod test_utils;
pub mod utils;
