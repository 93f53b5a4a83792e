use winnow::combinator::{alt, cut_err, empty, opt, preceded, repeat};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use crate::types::{Condition, ConditionTree, PropertyOp, Relationship, Selector, Unit};

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

// -- Condition leaves -------------------------------------------------------

fn cond_key<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || c == '_' || c == '.'
    })
    .parse_next(input)
}

/// Longest-match operator tokenization: two-character operators must be tried
/// before their one-character prefixes.
fn property_op(input: &mut &str) -> ModalResult<PropertyOp> {
    alt((
        "*=".value(PropertyOp::Contains),
        "^=".value(PropertyOp::StartsWith),
        "$=".value(PropertyOp::EndsWith),
        "!=".value(PropertyOp::Neq),
        ">=".value(PropertyOp::Gte),
        "<=".value(PropertyOp::Lte),
        "=".value(PropertyOp::Eq),
        ">".value(PropertyOp::Gt),
        "<".value(PropertyOp::Lt),
    ))
    .parse_next(input)
}

fn quoted(mut quote: char) -> impl FnMut(&mut &str) -> ModalResult<String> {
    move |input: &mut &str| {
        quote.parse_next(input)?;
        let mut s = String::new();
        loop {
            let ch = any.parse_next(input)?;
            match ch {
                c if c == quote => return Ok(s),
                '\\' => {
                    let esc = any.parse_next(input)?;
                    match esc {
                        c if c == quote => s.push(c),
                        '\\' => s.push('\\'),
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        other => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                }
                c => s.push(c),
            }
        }
    }
}

/// Bare (unquoted) values run until whitespace, a connective, a quote, or the
/// closing bracket.
fn bare_value<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| {
        !c.is_whitespace() && !matches!(c, '&' | '|' | ']' | '"' | '\'')
    })
    .parse_next(input)
}

fn condition(input: &mut &str) -> ModalResult<Condition> {
    ws.parse_next(input)?;
    let key = cond_key.parse_next(input)?;
    ws.parse_next(input)?;
    let op = property_op.parse_next(input)?;
    ws.parse_next(input)?;
    let value = cut_err(alt((
        quoted('"'),
        quoted('\''),
        bare_value.map(str::to_owned),
    )))
    .context(StrContext::Expected(StrContextValue::Description(
        "attribute value",
    )))
    .parse_next(input)?;
    Ok(Condition {
        key: key.to_owned(),
        op,
        value,
    })
}

// -- Condition trees --------------------------------------------------------

#[derive(Clone, Copy)]
enum Connective {
    And,
    Or,
}

/// `&&` or `||` between two conditions; plain whitespace is an implicit AND.
fn connective(input: &mut &str) -> ModalResult<Connective> {
    preceded(
        ws,
        alt((
            "||".value(Connective::Or),
            "&&".value(Connective::And),
            empty.value(Connective::And),
        )),
    )
    .parse_next(input)
}

/// The conditions inside one bracket group, assembled left-to-right: AND
/// chains bind within each `||`-separated segment, the segments OR together.
/// There is no further precedence and no grouping syntax inside a bracket.
fn group_conditions(input: &mut &str) -> ModalResult<Option<ConditionTree>> {
    let Some(first) = opt(condition).parse_next(input)? else {
        return Ok(None);
    };
    let rest: Vec<(Connective, Condition)> =
        repeat(0.., (connective, condition)).parse_next(input)?;

    let mut or_groups: Vec<ConditionTree> = Vec::new();
    let mut current = ConditionTree::Leaf(first);
    for (conn, cond) in rest {
        match conn {
            Connective::And => current = current.and(ConditionTree::Leaf(cond)),
            Connective::Or => {
                or_groups.push(current);
                current = ConditionTree::Leaf(cond);
            }
        }
    }

    let mut tree = current;
    while let Some(prev) = or_groups.pop() {
        tree = prev.or(tree);
    }
    Ok(Some(tree))
}

/// One `[...]` group. No leading whitespace: adjacent groups belong to the
/// same unit, while a blank-separated `[...]` starts a new descendant unit.
fn bracket_group(input: &mut &str) -> ModalResult<Option<ConditionTree>> {
    '['.parse_next(input)?;
    let tree = group_conditions.parse_next(input)?;
    ws.parse_next(input)?;
    cut_err(']')
        .context(StrContext::Expected(StrContextValue::CharLiteral(']')))
        .parse_next(input)?;
    Ok(tree)
}

// -- Units and relationships ------------------------------------------------

fn class_token<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '*')
    })
    .parse_next(input)
}

fn unit(input: &mut &str) -> ModalResult<(bool, Unit)> {
    let is_target = opt('@').parse_next(input)?.is_some();
    let class = opt(class_token).parse_next(input)?;
    let groups: Vec<Option<ConditionTree>> = repeat(1.., bracket_group).parse_next(input)?;

    let class_filter = class
        .filter(|t| !t.is_empty() && *t != "*")
        .map(str::to_owned);

    // Multiple bracket groups on one unit are implicitly AND-ed.
    let mut condition: Option<ConditionTree> = None;
    for group in groups.into_iter().flatten() {
        condition = Some(match condition {
            Some(acc) => acc.and(group),
            None => group,
        });
    }

    Ok((
        is_target,
        Unit {
            class_filter,
            condition,
        },
    ))
}

/// Longest-match relationship tokenization; a separator of bare whitespace
/// (or nothing) means any-descendant.
fn relationship(input: &mut &str) -> ModalResult<Relationship> {
    preceded(
        ws,
        alt((
            ">>>".value(Relationship::AnyDescendant),
            ">>".value(Relationship::AnyDescendant),
            ">".value(Relationship::Child),
            "<<<".value(Relationship::AnyAncestor),
            "<<".value(Relationship::Parent),
            "+".value(Relationship::NextSibling),
            "-".value(Relationship::PrevSibling),
            "~".value(Relationship::OtherSibling),
            empty.value(Relationship::AnyDescendant),
        )),
    )
    .parse_next(input)
}

// -- Top-level parser -------------------------------------------------------

pub(super) fn selector(input: &mut &str) -> ModalResult<Selector> {
    ws.parse_next(input)?;
    let (first_target, first_unit) = unit.parse_next(input)?;
    let rest: Vec<(Relationship, (bool, Unit))> =
        repeat(0.., (relationship, preceded(ws, unit))).parse_next(input)?;
    ws.parse_next(input)?;

    let mut units = vec![first_unit];
    let mut relationships = Vec::with_capacity(rest.len());
    let mut target = first_target.then_some(0);
    for (rel, (is_target, u)) in rest {
        relationships.push(rel);
        units.push(u);
        if is_target {
            // A later `@` wins over an earlier one.
            target = Some(units.len() - 1);
        }
    }
    let target = target.unwrap_or(units.len() - 1);

    Ok(Selector {
        units,
        relationships,
        target,
    })
}
