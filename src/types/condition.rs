use std::fmt;

use super::node::UiNode;

/// Comparison operators supported in selector attribute conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOp {
    Eq,
    Neq,
    /// `*=` substring match.
    Contains,
    /// `^=` prefix match.
    StartsWith,
    /// `$=` suffix match.
    EndsWith,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl PropertyOp {
    /// Compare a node property value against a condition literal.
    ///
    /// String operators compare case-insensitively. Numeric operators parse
    /// both sides as `f64`, treating anything unparsable as `0`.
    #[must_use]
    pub fn compare(self, actual: &str, target: &str) -> bool {
        match self {
            PropertyOp::Eq => actual.to_lowercase() == target.to_lowercase(),
            PropertyOp::Neq => actual.to_lowercase() != target.to_lowercase(),
            PropertyOp::Contains => actual.to_lowercase().contains(&target.to_lowercase()),
            PropertyOp::StartsWith => actual.to_lowercase().starts_with(&target.to_lowercase()),
            PropertyOp::EndsWith => actual.to_lowercase().ends_with(&target.to_lowercase()),
            PropertyOp::Lt => parse_numeric(actual) < parse_numeric(target),
            PropertyOp::Gt => parse_numeric(actual) > parse_numeric(target),
            PropertyOp::Lte => parse_numeric(actual) <= parse_numeric(target),
            PropertyOp::Gte => parse_numeric(actual) >= parse_numeric(target),
        }
    }
}

fn parse_numeric(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(0.0)
}

impl fmt::Display for PropertyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            PropertyOp::Eq => "=",
            PropertyOp::Neq => "!=",
            PropertyOp::Contains => "*=",
            PropertyOp::StartsWith => "^=",
            PropertyOp::EndsWith => "$=",
            PropertyOp::Lt => "<",
            PropertyOp::Gt => ">",
            PropertyOp::Lte => "<=",
            PropertyOp::Gte => ">=",
        };
        write!(f, "{sym}")
    }
}

/// One leaf comparison: `key op "value"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub op: PropertyOp,
    pub value: String,
}

impl Condition {
    /// Evaluate against a node. A property the node cannot produce makes the
    /// condition false, never an error.
    #[must_use]
    pub fn eval<N: UiNode>(&self, node: &N) -> bool {
        match property_value(node, &self.key) {
            Some(actual) => self.op.compare(&actual, &self.value),
            None => false,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}\"{}\"", self.key, self.op, self.value)
    }
}

/// Binary AND/OR tree over leaf conditions, built by the selector compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTree {
    Leaf(Condition),
    And(Box<ConditionTree>, Box<ConditionTree>),
    Or(Box<ConditionTree>, Box<ConditionTree>),
}

impl ConditionTree {
    #[must_use]
    pub fn eval<N: UiNode>(&self, node: &N) -> bool {
        match self {
            ConditionTree::Leaf(cond) => cond.eval(node),
            ConditionTree::And(a, b) => a.eval(node) && b.eval(node),
            ConditionTree::Or(a, b) => a.eval(node) || b.eval(node),
        }
    }

    #[must_use]
    pub fn and(self, other: ConditionTree) -> ConditionTree {
        ConditionTree::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: ConditionTree) -> ConditionTree {
        ConditionTree::Or(Box::new(self), Box::new(other))
    }
}

impl fmt::Display for ConditionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionTree::Leaf(cond) => write!(f, "{cond}"),
            ConditionTree::And(a, b) => write!(f, "({a} && {b})"),
            ConditionTree::Or(a, b) => write!(f, "({a} || {b})"),
        }
    }
}

/// Resolve a condition key to the node's property value as a string.
///
/// Unknown keys yield `None` so that a misspelled key fails the condition
/// rather than the whole matching pass.
#[must_use]
pub fn property_value<N: UiNode>(node: &N, key: &str) -> Option<String> {
    match key {
        "id" => node.view_id(),
        "vid" => node
            .view_id()
            .map(|id| id.rsplit('/').next().unwrap_or(&id).to_owned()),
        "text" => node.text(),
        "text.length" => node.text().map(|t| t.chars().count().to_string()),
        "desc" => node.description(),
        "desc.length" => node.description().map(|d| d.chars().count().to_string()),
        "name" => node.class_name(),
        "clickable" => Some(node.clickable().to_string()),
        "visibleToUser" => Some(node.visible().to_string()),
        "enabled" => Some(node.enabled().to_string()),
        "childCount" => Some(node.child_count().to_string()),
        "bounds" => Some(node.bounds().to_string()),
        _ => None,
    }
}
