//! Version constraints attached to dependency edges.
//!
//! Grammar (whitespace is insignificant):
//!
//! ```text
//! expr  := and ( "||" and )*
//! and   := unary ( "&&" unary )*
//! unary := "!" unary | "(" expr ")" | op? version
//! op    := "=" | ">" | ">=" | "<" | "<=" | "^" | "~"
//! ```
//!
//! A bare version means equality. The empty string is unconstrained.

use super::Version;
use crate::error::{BoardlibError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A boolean expression over versions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionConstraint {
    /// Matches every version.
    #[default]
    Any,
    Equal(Version),
    Greater(Version),
    GreaterOrEqual(Version),
    Less(Version),
    LessOrEqual(Version),
    /// Compatible with the version's leftmost non-zero component.
    Compatible(Version),
    /// Same major and minor.
    Tilde(Version),
    Not(Box<VersionConstraint>),
    And(Vec<VersionConstraint>),
    Or(Vec<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a constraint expression.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Ok(Self::Any);
        }
        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
        };
        let expr = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Exact match on one version.
    pub fn exact(version: Version) -> Self {
        Self::Equal(version)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Check whether `version` satisfies the constraint.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Equal(v) => version == v,
            Self::Greater(v) => version > v,
            Self::GreaterOrEqual(v) => version >= v,
            Self::Less(v) => version < v,
            Self::LessOrEqual(v) => version <= v,
            Self::Compatible(v) => version >= v && *version < caret_upper(v),
            Self::Tilde(v) => {
                version >= v && *version < Version::new(v.major(), v.minor() + 1, 0)
            }
            Self::Not(inner) => !inner.matches(version),
            Self::And(all) => all.iter().all(|c| c.matches(version)),
            Self::Or(any) => any.iter().any(|c| c.matches(version)),
        }
    }

    /// Intersect two constraints.
    pub fn and(self, other: VersionConstraint) -> VersionConstraint {
        match (self, other) {
            (Self::Any, c) | (c, Self::Any) => c,
            (a, b) if a == b => a,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), c) => {
                left.push(c);
                Self::And(left)
            }
            (c, Self::And(mut right)) => {
                right.insert(0, c);
                Self::And(right)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }
}

fn caret_upper(v: &Version) -> Version {
    if v.major() > 0 {
        Version::new(v.major() + 1, 0, 0)
    } else if v.minor() > 0 {
        Version::new(0, v.minor() + 1, 0)
    } else {
        Version::new(0, 0, v.patch() + 1)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => Ok(()),
            Self::Equal(v) => write!(f, "={v}"),
            Self::Greater(v) => write!(f, ">{v}"),
            Self::GreaterOrEqual(v) => write!(f, ">={v}"),
            Self::Less(v) => write!(f, "<{v}"),
            Self::LessOrEqual(v) => write!(f, "<={v}"),
            Self::Compatible(v) => write!(f, "^{v}"),
            Self::Tilde(v) => write!(f, "~{v}"),
            Self::Not(inner) => match inner.as_ref() {
                Self::And(_) | Self::Or(_) => write!(f, "!({inner})"),
                _ => write!(f, "!{inner}"),
            },
            Self::And(all) => {
                for (i, c) in all.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" && ")?;
                    }
                    match c {
                        Self::Or(_) => write!(f, "({c})")?,
                        _ => write!(f, "{c}")?,
                    }
                }
                Ok(())
            }
            Self::Or(any) => {
                for (i, c) in any.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" || ")?;
                    }
                    write!(f, "{c}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = BoardlibError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionConstraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Op(&'static str),
    Not,
    And,
    Or,
    Open,
    Close,
    Version(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '>' | '<' if next == Some('=') => {
                tokens.push(Token::Op(if c == '>' { ">=" } else { "<=" }));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(">"));
                i += 1;
            }
            '<' => {
                tokens.push(Token::Op("<"));
                i += 1;
            }
            '=' => {
                tokens.push(Token::Op("="));
                i += 1;
            }
            '^' => {
                tokens.push(Token::Op("^"));
                i += 1;
            }
            '~' => {
                tokens.push(Token::Op("~"));
                i += 1;
            }
            c if c.is_ascii_alphanumeric() => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '.' | '-' | '+'))
                {
                    i += 1;
                }
                tokens.push(Token::Version(chars[start..i].iter().collect()));
            }
            other => {
                return Err(BoardlibError::InvalidConstraint {
                    constraint: input.to_string(),
                    message: format!("unexpected character '{other}'"),
                })
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> BoardlibError {
        BoardlibError::InvalidConstraint {
            constraint: self.input.to_string(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<VersionConstraint> {
        let mut terms = vec![self.and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            VersionConstraint::Or(terms)
        })
    }

    fn and(&mut self) -> Result<VersionConstraint> {
        let mut terms = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            VersionConstraint::And(terms)
        })
    }

    fn unary(&mut self) -> Result<VersionConstraint> {
        match self.next() {
            Some(Token::Not) => Ok(VersionConstraint::Not(Box::new(self.unary()?))),
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(self.error("missing closing parenthesis")),
                }
            }
            Some(Token::Op(op)) => {
                let version = self.version()?;
                Ok(match op {
                    ">" => VersionConstraint::Greater(version),
                    ">=" => VersionConstraint::GreaterOrEqual(version),
                    "<" => VersionConstraint::Less(version),
                    "<=" => VersionConstraint::LessOrEqual(version),
                    "^" => VersionConstraint::Compatible(version),
                    "~" => VersionConstraint::Tilde(version),
                    _ => VersionConstraint::Equal(version),
                })
            }
            Some(Token::Version(raw)) => Ok(VersionConstraint::Equal(self.parse_version(&raw)?)),
            _ => Err(self.error("expected a version")),
        }
    }

    fn version(&mut self) -> Result<Version> {
        match self.next() {
            Some(Token::Version(raw)) => self.parse_version(&raw),
            _ => Err(self.error("expected a version after operator")),
        }
    }

    fn parse_version(&self, raw: &str) -> Result<Version> {
        Version::parse(raw).map_err(|e| self.error(&e.to_string()))
    }
}
