use std::fmt::{Debug, Display, Formatter};

use datafusion::prelude::Column;

use crate::properties::PhysicalProp;

/// Ordering of one column.
#[derive(Hash, Clone, Eq, PartialEq)]
pub struct SortItem {
    column: Column,
    desc: bool,
}

impl SortItem {
    pub fn new(column: Column, desc: bool) -> Self {
        Self { column, desc }
    }

    pub fn asc(column: Column) -> Self {
        Self::new(column, false)
    }

    pub fn desc(column: Column) -> Self {
        Self::new(column, true)
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn is_desc(&self) -> bool {
        self.desc
    }
}

impl Debug for SortItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.column, if self.desc { "DESC" } else { "ASC" })
    }
}

/// Ordering property specification.
#[derive(Hash, Clone, Eq, PartialEq, Default)]
pub struct OrderSpec {
    items: Vec<SortItem>,
}

impl OrderSpec {
    pub fn new<I: IntoIterator<Item = SortItem>>(items: I) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn items(&self) -> &[SortItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An order satisfies the required order when the required items are a prefix of it, with same
/// columns and directions in same sequence.
impl PhysicalProp for OrderSpec {
    fn satisfies(&self, required: &Self) -> bool {
        required.items.len() <= self.items.len()
            && required
                .items
                .iter()
                .zip(self.items.iter())
                .all(|(r, p)| r == p)
    }
}

impl Debug for OrderSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.items)
    }
}

impl Display for OrderSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.items)
    }
}
