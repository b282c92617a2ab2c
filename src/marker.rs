//! # Environment Marker Expressions
//!
//! A marker gates whether a requirement applies, as a boolean expression
//! over environment variables (`python_version >= "3.8" and sys_platform !=
//! "win32"`). This module models the expression and parses it from its
//! textual form; [`evaluate`](crate::evaluate) translates it into target
//! constraints.
//!
//! ## Shape
//!
//! Expressions are held in two-level disjunctive normal form: an outer list
//! of "or" groups, each an inner list of "and"ed leaf comparisons. This
//! mirrors how the source ecosystem serializes markers. The parser accepts
//! parenthesized sub-expressions (markers have no negation operator, so
//! distribution is always possible) and flattens them while parsing.
//!
//! ## Leaves
//!
//! A leaf compares two operands, each either an environment variable or a
//! quoted literal. Recognized variables form a closed set; anything else is
//! carried as [`MarkerVar::Other`] and later reported as untranslatable
//! instead of being guessed at.

use std::str::FromStr;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, multispace1, satisfy},
    combinator::{eof, not},
    sequence::{delimited, preceded, terminated},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ParseError;

/// The environment variables recognized in marker comparisons.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[non_exhaustive]
pub enum MarkerVar {
    /// The interpreter implementation, e.g. `cpython`.
    #[strum(serialize = "implementation_name")]
    ImplementationName,

    /// The interpreter implementation under its display name, e.g.
    /// `CPython`.
    #[strum(serialize = "platform_python_implementation")]
    PlatformPythonImplementation,

    /// The operating system name as reported by the platform module, e.g.
    /// `Linux` or `Windows`.
    #[strum(serialize = "platform_system")]
    PlatformSystem,

    /// The interpreter's platform identifier, e.g. `linux` or `win32`.
    #[strum(serialize = "sys_platform")]
    SysPlatform,

    /// The interpreter version as `X.Y`.
    #[strum(serialize = "python_version")]
    PythonVersion,

    /// The full interpreter version as `X.Y.Z`.
    #[strum(serialize = "python_full_version")]
    PythonFullVersion,

    /// The optional-feature flag under which the requirement was requested.
    #[strum(serialize = "extra")]
    Extra,

    /// Any variable this crate does not model (`os_name`,
    /// `platform_machine`, ...). Comparisons against these are reported as
    /// untranslatable.
    #[strum(default)]
    Other(String),
}

/// The comparison operators allowed in marker leaves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[non_exhaustive]
pub enum MarkerOp {
    /// `==`
    #[strum(serialize = "==")]
    Equal,

    /// `!=`
    #[strum(serialize = "!=")]
    NotEqual,

    /// `<`
    #[strum(serialize = "<")]
    Less,

    /// `<=`
    #[strum(serialize = "<=")]
    LessOrEqual,

    /// `>`
    #[strum(serialize = ">")]
    Greater,

    /// `>=`
    #[strum(serialize = ">=")]
    GreaterOrEqual,

    /// `~=`
    #[strum(serialize = "~=")]
    Compatible,

    /// `in` (substring containment; not translatable)
    #[strum(serialize = "in")]
    In,

    /// `not in` (substring containment; not translatable)
    #[strum(serialize = "not in")]
    NotIn,
}

impl MarkerOp {
    /// The operator with its comparison direction reversed, used to
    /// normalize leaves with the literal on the left-hand side. `None` for
    /// operators with no mirror form.
    pub fn flipped(&self) -> Option<MarkerOp> {
        match self {
            MarkerOp::Equal => Some(MarkerOp::Equal),
            MarkerOp::NotEqual => Some(MarkerOp::NotEqual),
            MarkerOp::Less => Some(MarkerOp::Greater),
            MarkerOp::LessOrEqual => Some(MarkerOp::GreaterOrEqual),
            MarkerOp::Greater => Some(MarkerOp::Less),
            MarkerOp::GreaterOrEqual => Some(MarkerOp::LessOrEqual),
            MarkerOp::Compatible => Some(MarkerOp::Compatible),
            MarkerOp::In | MarkerOp::NotIn => None,
        }
    }
}

/// One side of a marker comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerOperand {
    /// An environment variable.
    Variable(MarkerVar),

    /// A quoted literal.
    Literal(String),
}

impl std::fmt::Display for MarkerOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerOperand::Variable(var) => write!(f, "{var}"),
            MarkerOperand::Literal(value) => write!(f, "\"{value}\""),
        }
    }
}

/// A single comparison in a marker expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerLeaf {
    /// The left-hand operand.
    pub lhs: MarkerOperand,

    /// The comparison operator.
    pub op: MarkerOp,

    /// The right-hand operand.
    pub rhs: MarkerOperand,
}

impl std::fmt::Display for MarkerLeaf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

/// A marker expression in two-level disjunctive normal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub struct MarkerExpr {
    /// The "or" groups; each group is a conjunction of leaves.
    groups: Vec<Vec<MarkerLeaf>>,
}

impl MarkerExpr {
    /// The "or" groups of the expression; each group is a non-empty
    /// conjunction of leaves.
    pub fn groups(&self) -> &[Vec<MarkerLeaf>] {
        &self.groups
    }
}

impl From<Vec<Vec<MarkerLeaf>>> for MarkerExpr {
    fn from(groups: Vec<Vec<MarkerLeaf>>) -> Self {
        Self { groups }
    }
}

impl std::fmt::Display for MarkerExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first_group = true;
        for group in &self.groups {
            if !first_group {
                write!(f, " or ")?;
            }
            first_group = false;
            let mut first_leaf = true;
            for leaf in group {
                if !first_leaf {
                    write!(f, " and ")?;
                }
                first_leaf = false;
                write!(f, "{leaf}")?;
            }
        }
        Ok(())
    }
}

type Dnf = Vec<Vec<MarkerLeaf>>;

/// `(a or b) and (c or d)` distributes to
/// `(a and c) or (a and d) or (b and c) or (b and d)`.
fn distribute(lhs: Dnf, rhs: Dnf) -> Dnf {
    let mut out = Vec::with_capacity(lhs.len() * rhs.len());
    for left in &lhs {
        for right in &rhs {
            let mut group = left.clone();
            group.extend(right.iter().cloned());
            out.push(group);
        }
    }
    out
}

fn keyword<'a>(kw: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(
        tag(kw),
        not(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_')),
    )
}

fn variable(input: &str) -> IResult<&str, MarkerVar> {
    let (input, name) =
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)?;
    // EnumString with a default variant never fails.
    let var = MarkerVar::from_str(name).unwrap_or_else(|_| MarkerVar::Other(name.to_string()));
    Ok((input, var))
}

fn literal(input: &str) -> IResult<&str, String> {
    let single = delimited(char('\''), take_while(|c: char| c != '\''), char('\''));
    let double = delimited(char('"'), take_while(|c: char| c != '"'), char('"'));
    let (input, value) = alt((single, double)).parse(input)?;
    Ok((input, value.to_string()))
}

fn operand(input: &str) -> IResult<&str, MarkerOperand> {
    alt((
        literal.map(MarkerOperand::Literal),
        variable.map(MarkerOperand::Variable),
    ))
    .parse(input)
}

fn operator(input: &str) -> IResult<&str, MarkerOp> {
    alt((
        tag("===").map(|_| MarkerOp::Equal),
        tag("==").map(|_| MarkerOp::Equal),
        tag("!=").map(|_| MarkerOp::NotEqual),
        tag("<=").map(|_| MarkerOp::LessOrEqual),
        tag(">=").map(|_| MarkerOp::GreaterOrEqual),
        tag("~=").map(|_| MarkerOp::Compatible),
        tag("<").map(|_| MarkerOp::Less),
        tag(">").map(|_| MarkerOp::Greater),
        (keyword("not"), multispace1, keyword("in")).map(|_| MarkerOp::NotIn),
        keyword("in").map(|_| MarkerOp::In),
    ))
    .parse(input)
}

fn leaf(input: &str) -> IResult<&str, Dnf> {
    let (input, lhs) = operand(input)?;
    let (input, op) = delimited(multispace0, operator, multispace0).parse(input)?;
    let (input, rhs) = operand(input)?;
    Ok((input, vec![vec![MarkerLeaf { lhs, op, rhs }]]))
}

fn atom(input: &str) -> IResult<&str, Dnf> {
    alt((
        delimited(
            (char('('), multispace0),
            or_expr,
            (multispace0, char(')')),
        ),
        leaf,
    ))
    .parse(input)
}

fn and_expr(input: &str) -> IResult<&str, Dnf> {
    let (mut input, mut dnf) = atom(input)?;
    loop {
        let separator = delimited(multispace0, keyword("and"), multispace0);
        match preceded(separator, atom).parse(input) {
            Ok((rest, rhs)) => {
                dnf = distribute(dnf, rhs);
                input = rest;
            }
            Err(_) => return Ok((input, dnf)),
        }
    }
}

fn or_expr(input: &str) -> IResult<&str, Dnf> {
    let (mut input, mut dnf) = and_expr(input)?;
    loop {
        let separator = delimited(multispace0, keyword("or"), multispace0);
        match preceded(separator, and_expr).parse(input) {
            Ok((rest, rhs)) => {
                dnf.extend(rhs);
                input = rest;
            }
            Err(_) => return Ok((input, dnf)),
        }
    }
}

pub(crate) fn marker(input: &str) -> IResult<&str, MarkerExpr> {
    let (input, groups) = delimited(multispace0, or_expr, multispace0).parse(input)?;
    Ok((input, MarkerExpr::from(groups)))
}

impl FromStr for MarkerExpr {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (_, expr) = terminated(marker, eof)
            .parse(input)
            .map_err(|e| ParseError::Marker {
                input: input.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(expr)
    }
}
