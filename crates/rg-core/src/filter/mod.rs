//! Target filter queries: a small FIQL/RSQL dialect.
//!
//! ```text
//! attribute.region==eu;(tag==canary,name=in=(lab-*,qa-*))
//! ```
//!
//! `;` / `and` binds tighter than `,` / `or`. Values may be bare words or
//! quoted, `*` matches any run of characters, and comparisons ignore case.
//! A blank query matches every target.

mod eval;
mod parser;

#[cfg(test)]
mod tests;

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::fleet::Target;

pub use parser::parse_filter;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// Target property a comparison reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    ControllerId,
    Name,
    /// Matches when any of the target's tags matches.
    Tag,
    /// `attribute.<key>`; the key is compared case-insensitively.
    Attribute(String),
}

impl Field {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "id" | "controllerid" => Some(Self::ControllerId),
            "name" => Some(Self::Name),
            "tag" => Some(Self::Tag),
            _ => lower
                .strip_prefix("attribute.")
                .filter(|key| !key.is_empty())
                .map(|key| Self::Attribute(key.to_string())),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControllerId => f.write_str("controllerid"),
            Self::Name => f.write_str("name"),
            Self::Tag => f.write_str("tag"),
            Self::Attribute(key) => write!(f, "attribute.{key}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    In,
    Out,
}

impl CompareOp {
    /// `!=` and `=out=` hold when no value matches.
    pub fn is_negated(self) -> bool {
        matches!(self, Self::Ne | Self::Out)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::In => "=in=",
            Self::Out => "=out=",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Blank query.
    All,
    Compare {
        field: Field,
        op: CompareOp,
        values: Vec<String>,
    },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
}

// ---------------------------------------------------------------------------
// TargetFilter
// ---------------------------------------------------------------------------

/// A parsed and compiled filter query.
pub struct TargetFilter {
    query: String,
    expr: FilterExpr,
    matcher: eval::Matcher,
}

impl TargetFilter {
    /// Parse `query`. Syntax errors are reported as [`CoreReason::Filter`](crate::CoreReason::Filter).
    pub fn parse(query: &str) -> CoreResult<Self> {
        let expr = parse_filter(query)?;
        let matcher = eval::Matcher::compile(&expr);
        Ok(Self {
            query: query.trim().to_string(),
            expr,
            matcher,
        })
    }

    pub fn matches(&self, target: &Target) -> bool {
        self.matcher.matches(target)
    }

    pub fn expr(&self) -> &FilterExpr {
        &self.expr
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// True for the empty query, which matches every target.
    pub fn is_match_all(&self) -> bool {
        self.expr == FilterExpr::All
    }
}

impl fmt::Debug for TargetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetFilter")
            .field("query", &self.query)
            .field("expr", &self.expr)
            .finish()
    }
}

impl FromStr for TargetFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}
