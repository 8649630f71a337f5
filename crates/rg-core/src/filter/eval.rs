use wildmatch::WildMatchPattern;

use super::{Field, FilterExpr};
use crate::fleet::Target;

/// Value pattern: `*` is the only wildcard. The single-character slot is NUL,
/// which the parser never lets into a value, so `?` matches literally.
type Pattern = WildMatchPattern<'*', '\0'>;

/// A [`FilterExpr`] with its value patterns compiled once, lower-cased for
/// case-insensitive matching.
pub(super) struct Matcher(Node);

enum Node {
    All,
    Compare {
        field: Field,
        negated: bool,
        patterns: Vec<Pattern>,
    },
    And(Vec<Node>),
    Or(Vec<Node>),
}

impl Matcher {
    pub(super) fn compile(expr: &FilterExpr) -> Self {
        Self(Node::compile(expr))
    }

    pub(super) fn matches(&self, target: &Target) -> bool {
        self.0.matches(target)
    }
}

impl Node {
    fn compile(expr: &FilterExpr) -> Self {
        match expr {
            FilterExpr::All => Self::All,
            FilterExpr::Compare { field, op, values } => Self::Compare {
                field: field.clone(),
                negated: op.is_negated(),
                patterns: values
                    .iter()
                    .map(|v| Pattern::new(&v.to_lowercase()))
                    .collect(),
            },
            FilterExpr::And(terms) => Self::And(terms.iter().map(Self::compile).collect()),
            FilterExpr::Or(terms) => Self::Or(terms.iter().map(Self::compile).collect()),
        }
    }

    fn matches(&self, target: &Target) -> bool {
        match self {
            Self::All => true,
            Self::Compare {
                field,
                negated,
                patterns,
            } => field_matches(field, target, patterns) != *negated,
            Self::And(terms) => terms.iter().all(|t| t.matches(target)),
            Self::Or(terms) => terms.iter().any(|t| t.matches(target)),
        }
    }
}

/// `true` when any value of `field` on `target` matches any pattern. A missing
/// attribute has no values.
fn field_matches(field: &Field, target: &Target, patterns: &[Pattern]) -> bool {
    let hit = |value: &str| {
        let value = value.to_lowercase();
        patterns.iter().any(|p| p.matches(&value))
    };
    match field {
        Field::ControllerId => hit(&target.controller_id),
        Field::Name => hit(target.display_name()),
        Field::Tag => target.tags.iter().any(|t| hit(t)),
        Field::Attribute(key) => target.attribute(key).is_some_and(hit),
    }
}
