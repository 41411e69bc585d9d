use crate::operator::{LogicalOperator, LogicalOperatorKind, Operator};
use crate::utils::RootBuilder;

/// Matches one operator in a pattern tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Matcher {
    /// Matches any logical operator.
    Any,
    Kind(LogicalOperatorKind),
}

impl Matcher {
    pub fn matches(&self, operator: &Operator) -> bool {
        match (self, operator) {
            (Matcher::Any, Operator::Logical(_)) => true,
            (Matcher::Kind(kind), Operator::Logical(op)) => op.kind() == *kind,
            (_, Operator::Physical(_)) => false,
        }
    }

    pub fn matches_logical(&self, operator: &LogicalOperator) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Kind(kind) => operator.kind() == *kind,
        }
    }

    pub fn kind(&self) -> Option<LogicalOperatorKind> {
        match self {
            Matcher::Any => None,
            Matcher::Kind(kind) => Some(*kind),
        }
    }
}

impl From<LogicalOperatorKind> for Matcher {
    fn from(kind: LogicalOperatorKind) -> Self {
        Matcher::Kind(kind)
    }
}

/// A pattern defines how to match a sub tree of a plan.
///
/// If we want to match `Join(Limit(*), Scan)` pattern, the pattern tree should be defined like:
/// ```
/// use quartzite::operator::LogicalOperatorKind::{LogicalJoin, LogicalLimit, LogicalScan};
/// use quartzite::rules::{Matcher, Pattern};
/// use quartzite::utils::TreeBuilder;
///
/// let pattern = Pattern::new_builder(LogicalJoin)
///   .begin_node(LogicalLimit)
///     .leaf(Matcher::Any)
///   .end_node()
///   .leaf(LogicalScan)
/// .end_node();
/// ```
///
/// The root node in pattern tree matches `Join` operator, the first child node matches
/// `Limit` operator, and the last matches `Scan`. A pattern node without children matches
/// an operator with any inputs, which are bound as whole groups.
#[derive(Clone, Debug)]
pub struct Pattern {
    pub matcher: Matcher,
    /// `None` for leaf node.
    pub children: Option<Vec<Pattern>>,
}

impl Pattern {
    pub fn new_builder<M: Into<Matcher>>(matcher: M) -> RootBuilder<Pattern, Matcher> {
        RootBuilder::new(matcher.into())
    }

    pub fn leaf<M: Into<Matcher>>(matcher: M) -> Pattern {
        Pattern {
            matcher: matcher.into(),
            children: None,
        }
    }

    /// Tests operator of pattern root, and arity when children are given.
    pub fn matches_without_children(&self, operator: &Operator, inputs_len: usize) -> bool {
        self.matcher.matches(operator)
            && self
                .children
                .as_ref()
                .map(|c| c.len() == inputs_len)
                .unwrap_or(true)
    }
}

impl From<(Matcher, Vec<Pattern>)> for Pattern {
    fn from(t: (Matcher, Vec<Pattern>)) -> Self {
        let children = if t.1.is_empty() { None } else { Some(t.1) };
        Pattern {
            matcher: t.0,
            children,
        }
    }
}
