//! Properties of relation operators.
//!
//! Currently we have two kinds of properties: [`LogicalProperty`] and [`PhysicalPropertySet`].
//! Logical property are things shared by logically equivalent plans, such as schema. Physical
//! properties are requirements a parent imposes on its child's output, such as sort order.
//!
//! [`EngineKind`] is neither of them: it tags which execution engine may run a group.

use std::fmt::Debug;
use std::hash::Hash;

mod engine;
pub use engine::*;
mod order;
pub use order::*;
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;

pub trait PhysicalProp: Debug + Hash {
    /// Tests whether `self`, as provided by an operator, satisfies `required`.
    fn satisfies(&self, required: &Self) -> bool;
}
