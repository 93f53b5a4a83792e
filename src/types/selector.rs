use std::fmt;

use super::condition::ConditionTree;

/// Tree-structural connector between two consecutive selector units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// `>`: the next unit must match a direct child.
    Child,
    /// Whitespace, `>>` or `>>>`: the next unit may match any descendant.
    AnyDescendant,
    /// `<<`: the next unit must match the direct parent.
    Parent,
    /// `<<<`: the next unit may match any ancestor.
    AnyAncestor,
    /// `+`: the next unit must match the immediately following sibling.
    NextSibling,
    /// `-`: the next unit must match the immediately preceding sibling.
    PrevSibling,
    /// `~`: the next unit may match any sibling other than the node itself.
    OtherSibling,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            Relationship::Child => " > ",
            Relationship::AnyDescendant => " ",
            Relationship::Parent => " << ",
            Relationship::AnyAncestor => " <<< ",
            Relationship::NextSibling => " + ",
            Relationship::PrevSibling => " - ",
            Relationship::OtherSibling => " ~ ",
        };
        write!(f, "{sym}")
    }
}

/// One stage of a selector chain: an optional class-name substring filter plus
/// an optional attribute condition tree. A unit with neither matches any node.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub class_filter: Option<String>,
    pub condition: Option<ConditionTree>,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(class) = &self.class_filter {
            write!(f, "{class}")?;
        }
        match &self.condition {
            Some(cond) => write!(f, "[{cond}]"),
            None => write!(f, "[]"),
        }
    }
}

/// A compiled selector: an ordered unit chain joined by relationships, with
/// exactly one unit designated as the target.
///
/// Immutable once compiled; compilation is pure, so instances are cached by
/// their raw source string.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub units: Vec<Unit>,
    /// One fewer entries than `units`; `relationships[i]` connects
    /// `units[i]` to `units[i + 1]`.
    pub relationships: Vec<Relationship>,
    /// Index of the unit whose bound node is the match result.
    pub target: usize,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, unit) in self.units.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", self.relationships[i - 1])?;
            }
            if i == self.target && self.target != self.units.len() - 1 {
                write!(f, "@")?;
            }
            write!(f, "{unit}")?;
        }
        Ok(())
    }
}
