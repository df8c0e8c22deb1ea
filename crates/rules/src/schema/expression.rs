//! Classification of a rule's textual expression into one of the five kinds.
//!
//! The grammar is deliberately tiny: whitespace-separated tokens, no quoting,
//! no boolean connectives. Classification order matters:
//!
//! 1. blank text is [`Expression::Meta`]
//! 2. `field op literal` with a comparison operator is numeric
//! 3. `field op literal` with a text operator is a regexp rule
//! 4. `Sensor <capability> [args..]` is a sensor predicate
//! 5. `Predicate <capability> [args..]` is a general predicate
//!
//! Operators may carry a `not` prefix, either fused (`notcontains`, `not<`)
//! or as a separate token (`STATE not contains open`).

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::RuleKind;

/// Comparison operators for numeric rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
}

impl NumericOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "<" => Some(NumericOp::Lt),
            "<=" => Some(NumericOp::Le),
            "==" => Some(NumericOp::Eq),
            ">=" => Some(NumericOp::Ge),
            ">" => Some(NumericOp::Gt),
            "!=" => Some(NumericOp::Ne),
            _ => None,
        }
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            NumericOp::Lt => lhs < rhs,
            NumericOp::Le => lhs <= rhs,
            NumericOp::Eq => lhs == rhs,
            NumericOp::Ge => lhs >= rhs,
            NumericOp::Gt => lhs > rhs,
            NumericOp::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for NumericOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NumericOp::Lt => "<",
            NumericOp::Le => "<=",
            NumericOp::Eq => "==",
            NumericOp::Ge => ">=",
            NumericOp::Gt => ">",
            NumericOp::Ne => "!=",
        };
        f.write_str(s)
    }
}

/// String operators for regexp rules.
#[derive(Debug, Clone)]
pub enum TextOp {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    /// Whole-value match against the literal compiled as a pattern.
    Matches(Regex),
}

impl TextOp {
    fn parse(token: &str, literal: &str) -> Result<Option<Self>, ExpressionError> {
        let op = match token.to_ascii_lowercase().as_str() {
            "equals" => TextOp::Equals,
            "contains" => TextOp::Contains,
            "startswith" => TextOp::StartsWith,
            "endswith" => TextOp::EndsWith,
            "matches" => {
                let anchored = format!("^(?:{})$", literal);
                let re = Regex::new(&anchored).map_err(|e| ExpressionError::InvalidPattern {
                    pattern: literal.to_string(),
                    reason: e.to_string(),
                })?;
                TextOp::Matches(re)
            }
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    pub fn apply(&self, value: &str, literal: &str) -> bool {
        match self {
            TextOp::Equals => value == literal,
            TextOp::Contains => value.contains(literal),
            TextOp::StartsWith => value.starts_with(literal),
            TextOp::EndsWith => value.ends_with(literal),
            TextOp::Matches(re) => re.is_match(value),
        }
    }
}

impl fmt::Display for TextOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TextOp::Equals => "equals",
            TextOp::Contains => "contains",
            TextOp::StartsWith => "startsWith",
            TextOp::EndsWith => "endsWith",
            TextOp::Matches(_) => "matches",
        };
        f.write_str(s)
    }
}

/// Why an expression could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("unrecognised expression '{0}'")]
    Unknown(String),

    #[error("numeric literal '{literal}' in '{expression}' is not a number")]
    InvalidNumber { expression: String, literal: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A classified, ready-to-evaluate rule expression.
#[derive(Debug, Clone)]
pub enum Expression {
    Meta,
    Numeric {
        field: String,
        op: NumericOp,
        negated: bool,
        literal: f64,
    },
    Regexp {
        field: String,
        op: TextOp,
        negated: bool,
        literal: String,
    },
    SensorPredicate {
        capability: String,
        negated: bool,
        args: Vec<String>,
    },
    GeneralPredicate {
        capability: String,
        negated: bool,
        args: Vec<String>,
    },
}

impl Expression {
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Expression::Meta);
        }

        let comparison = match tokens.as_slice() {
            [field, op, literal] => Some((*field, op.to_string(), *literal)),
            [field, not, op, literal] if not.eq_ignore_ascii_case("not") => {
                Some((*field, format!("not{}", op), *literal))
            }
            _ => None,
        };

        if let Some((field, op, literal)) = comparison {
            let (negated, bare) = strip_not(&op);

            if let Some(op) = NumericOp::parse(bare) {
                let value = first_number(literal).ok_or_else(|| ExpressionError::InvalidNumber {
                    expression: text.to_string(),
                    literal: literal.to_string(),
                })?;
                return Ok(Expression::Numeric {
                    field: field.to_string(),
                    op,
                    negated,
                    literal: value,
                });
            }

            if let Some(op) = TextOp::parse(bare, literal)? {
                return Ok(Expression::Regexp {
                    field: field.to_string(),
                    op,
                    negated,
                    literal: literal.to_string(),
                });
            }
        }

        match tokens.as_slice() {
            ["Sensor", rest @ ..] => {
                let (capability, negated, args) = parse_call(rest)
                    .ok_or_else(|| ExpressionError::Unknown(text.to_string()))?;
                Ok(Expression::SensorPredicate {
                    capability,
                    negated,
                    args,
                })
            }
            ["Predicate", rest @ ..] => {
                let (capability, negated, args) = parse_call(rest)
                    .ok_or_else(|| ExpressionError::Unknown(text.to_string()))?;
                Ok(Expression::GeneralPredicate {
                    capability,
                    negated,
                    args,
                })
            }
            _ => Err(ExpressionError::Unknown(text.to_string())),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Expression::Meta => RuleKind::Meta,
            Expression::Numeric { .. } => RuleKind::Numeric,
            Expression::Regexp { .. } => RuleKind::Regexp,
            Expression::SensorPredicate { .. } => RuleKind::SensorPredicate,
            Expression::GeneralPredicate { .. } => RuleKind::GeneralPredicate,
        }
    }
}

/// Split a leading `not` off an operator token.
fn strip_not(op: &str) -> (bool, &str) {
    match op.get(..3) {
        Some(prefix) if op.len() > 3 && prefix.eq_ignore_ascii_case("not") => (true, &op[3..]),
        _ => (false, op),
    }
}

/// Parse `[not] capability args..` or the fused `notCapability args..`.
fn parse_call(tokens: &[&str]) -> Option<(String, bool, Vec<String>)> {
    let (first, rest) = tokens.split_first()?;
    let args = |rest: &[&str]| rest.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    if first.eq_ignore_ascii_case("not") {
        let (name, rest) = rest.split_first()?;
        return Some((name.to_string(), true, args(rest)));
    }

    if let Some(tail) = first.strip_prefix("not") {
        let mut chars = tail.chars();
        if let Some(c) = chars.next() {
            if c.is_ascii_uppercase() {
                let name = format!("{}{}", c.to_ascii_lowercase(), chars.as_str());
                return Some((name, true, args(rest)));
            }
        }
    }

    Some((first.to_string(), false, args(rest)))
}

/// First integer or decimal substring of `text`, e.g. `"2.9V"` gives `2.9`.
pub fn first_number(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("number pattern is valid"));
    re.find(text).and_then(|m| m.as_str().parse().ok())
}
