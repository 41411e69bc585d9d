use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::properties::{OrderSpec, PhysicalProp, SortItem};

/// All physical properties.
///
/// `expected_row_count` is a hint that parent only consumes that many rows, e.g. under a limit.
/// It never makes a candidate unacceptable, it only changes costs.
#[derive(Clone)]
pub struct PhysicalPropertySet {
    order: OrderSpec,
    expected_row_count: f64,
}

impl Default for PhysicalPropertySet {
    fn default() -> Self {
        Self {
            order: OrderSpec::default(),
            expected_row_count: f64::INFINITY,
        }
    }
}

impl PhysicalPropertySet {
    pub fn new(order: OrderSpec) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn sorted_by<I: IntoIterator<Item = SortItem>>(items: I) -> Self {
        Self::new(OrderSpec::new(items))
    }

    pub fn with_expected_row_count(mut self, expected_row_count: f64) -> Self {
        self.expected_row_count = expected_row_count;
        self
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn expected_row_count(&self) -> f64 {
        self.expected_row_count
    }

    /// No sort requirement and no row count hint.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.expected_row_count.is_infinite()
    }

    /// Only order takes part in satisfaction check.
    pub fn satisfies(&self, required: &PhysicalPropertySet) -> bool {
        self.order.satisfies(&required.order)
    }

    /// Row count an operator outputs under this property if it produces `row_count` rows in
    /// total.
    pub fn cap_row_count(&self, row_count: f64) -> f64 {
        row_count.min(self.expected_row_count)
    }
}

impl PartialEq for PhysicalPropertySet {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && self.expected_row_count.to_bits() == other.expected_row_count.to_bits()
    }
}

impl Eq for PhysicalPropertySet {}

impl Hash for PhysicalPropertySet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.order.hash(state);
        self.expected_row_count.to_bits().hash(state);
    }
}

impl Debug for PhysicalPropertySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for PhysicalPropertySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{order: {:?}", self.order)?;
        if self.expected_row_count.is_finite() {
            write!(f, ", expected rows: {}", self.expected_row_count)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use crate::properties::{PhysicalPropertySet, SortItem};
    use datafusion::prelude::Column;
    use std::collections::HashSet;

    #[test]
    fn test_empty_property() {
        assert!(PhysicalPropertySet::default().is_empty());
        assert!(!PhysicalPropertySet::default()
            .with_expected_row_count(10.0)
            .is_empty());
        assert!(!PhysicalPropertySet::sorted_by(vec![SortItem::asc(
            Column::from_qualified_name("t1.c1")
        )])
        .is_empty());
    }

    #[test]
    fn test_expected_row_count_is_advisory() {
        let order = vec![SortItem::asc(Column::from_qualified_name("t1.c1"))];
        let provided = PhysicalPropertySet::sorted_by(order.clone());
        let required = PhysicalPropertySet::sorted_by(order).with_expected_row_count(5.0);

        assert!(provided.satisfies(&required));
        assert_ne!(provided, required);
    }

    #[test]
    fn test_hash_by_value() {
        let props: HashSet<PhysicalPropertySet> = vec![
            PhysicalPropertySet::default(),
            PhysicalPropertySet::default(),
            PhysicalPropertySet::default().with_expected_row_count(3.0),
        ]
        .into_iter()
        .collect();

        assert_eq!(2, props.len());
    }

    #[test]
    fn test_display() {
        let prop = PhysicalPropertySet::sorted_by(vec![SortItem::desc(
            Column::from_qualified_name("t1.c1"),
        )])
        .with_expected_row_count(10.0);
        assert_eq!("{order: [t1.c1 DESC], expected rows: 10}", prop.to_string());
        assert_eq!("{order: []}", PhysicalPropertySet::default().to_string());
    }
}
