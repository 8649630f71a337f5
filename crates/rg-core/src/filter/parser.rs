use orion_error::prelude::*;
use winnow::ascii::multispace0;
use winnow::combinator::{alt, cut_err, opt, separated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{literal, take_while};

use super::{CompareOp, Field, FilterExpr};
use crate::error::{CoreReason, CoreResult};

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Parse a filter query. A blank query yields [`FilterExpr::All`].
pub fn parse_filter(query: &str) -> CoreResult<FilterExpr> {
    if query.trim().is_empty() {
        return Ok(FilterExpr::All);
    }
    filter_expr.parse(query).map_err(|e| {
        StructError::from(CoreReason::Filter)
            .with_detail(format!("invalid target filter '{}': {e}", query.trim()))
    })
}

fn filter_expr(input: &mut &str) -> ModalResult<FilterExpr> {
    let expr = or_expr.parse_next(input)?;
    ws.parse_next(input)?;
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Precedence levels (lowest to highest)
// ---------------------------------------------------------------------------

/// `or_expr = and_expr { ("," | "or") and_expr }`
fn or_expr(input: &mut &str) -> ModalResult<FilterExpr> {
    let mut terms = vec![and_expr.parse_next(input)?];
    loop {
        ws.parse_next(input)?;
        if opt(alt((literal(",").void(), kw("or"), kw("OR")))).parse_next(input)?.is_some() {
            terms.push(cut_err(and_expr).parse_next(input)?);
        } else {
            break;
        }
    }
    Ok(collapse(terms, FilterExpr::Or))
}

/// `and_expr = term { (";" | "and") term }`
fn and_expr(input: &mut &str) -> ModalResult<FilterExpr> {
    let mut terms = vec![term.parse_next(input)?];
    loop {
        ws.parse_next(input)?;
        if opt(alt((literal(";").void(), kw("and"), kw("AND")))).parse_next(input)?.is_some() {
            terms.push(cut_err(term).parse_next(input)?);
        } else {
            break;
        }
    }
    Ok(collapse(terms, FilterExpr::And))
}

/// `term = "(" or_expr ")" | comparison`
fn term(input: &mut &str) -> ModalResult<FilterExpr> {
    ws.parse_next(input)?;
    if opt(literal("(")).parse_next(input)?.is_some() {
        let inner = cut_err(or_expr).parse_next(input)?;
        ws.parse_next(input)?;
        cut_err(literal(")"))
            .context(StrContext::Expected(StrContextValue::Description("')'")))
            .parse_next(input)?;
        return Ok(inner);
    }
    comparison.parse_next(input)
}

fn collapse(mut terms: Vec<FilterExpr>, join: fn(Vec<FilterExpr>) -> FilterExpr) -> FilterExpr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        join(terms)
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// `comparison = field op (value | "(" value { "," value } ")")`
fn comparison(input: &mut &str) -> ModalResult<FilterExpr> {
    let field = cut_err(field_name.verify_map(Field::from_name))
        .context(StrContext::Expected(StrContextValue::Description(
            "field (id, controllerid, name, tag, attribute.<key>)",
        )))
        .parse_next(input)?;
    ws.parse_next(input)?;

    let op = cut_err(compare_op)
        .context(StrContext::Expected(StrContextValue::Description(
            "operator (==, !=, =in=, =out=)",
        )))
        .parse_next(input)?;
    ws.parse_next(input)?;

    let values = match op {
        CompareOp::In | CompareOp::Out => cut_err(value_list)
            .context(StrContext::Expected(StrContextValue::Description(
                "value list '(a,b,...)'",
            )))
            .parse_next(input)?,
        CompareOp::Eq | CompareOp::Ne => vec![
            cut_err(value)
                .context(StrContext::Expected(StrContextValue::Description("value")))
                .parse_next(input)?,
        ],
    };

    Ok(FilterExpr::Compare { field, op, values })
}

fn field_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
    })
    .parse_next(input)
}

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    alt((
        literal("==").value(CompareOp::Eq),
        literal("!=").value(CompareOp::Ne),
        literal("=in=").value(CompareOp::In),
        literal("=out=").value(CompareOp::Out),
    ))
    .parse_next(input)
}

fn value_list(input: &mut &str) -> ModalResult<Vec<String>> {
    literal("(").parse_next(input)?;
    let values: Vec<String> = separated(
        1..,
        (ws, value, ws).map(|(_, v, _)| v),
        literal(","),
    )
    .parse_next(input)?;
    cut_err(literal(")"))
        .context(StrContext::Expected(StrContextValue::Description("')'")))
        .parse_next(input)?;
    Ok(values)
}

fn value(input: &mut &str) -> ModalResult<String> {
    alt((quoted_value, bare_value)).parse_next(input)
}

fn quoted_value(input: &mut &str) -> ModalResult<String> {
    let quote = alt(('"', '\'')).parse_next(input)?;
    let content = take_while(0.., move |c: char| c != quote && c != '\0').parse_next(input)?;
    cut_err(quote)
        .context(StrContext::Expected(StrContextValue::Description(
            "closing quote",
        )))
        .parse_next(input)?;
    Ok(content.to_string())
}

fn bare_value(input: &mut &str) -> ModalResult<String> {
    take_while(1.., |c: char| {
        !c.is_whitespace() && !matches!(c, ';' | ',' | '(' | ')' | '"' | '\'' | '\0')
    })
    .map(str::to_string)
    .parse_next(input)
}

// ---------------------------------------------------------------------------
// Whitespace & keywords
// ---------------------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    multispace0.void().parse_next(input)
}

/// Match a keyword only when it is followed by whitespace or `(`, so that a
/// field such as `order` is not read as `or` + `der`.
fn kw<'a>(keyword: &'static str) -> impl FnMut(&mut &'a str) -> ModalResult<()> {
    move |input: &mut &'a str| {
        let saved = *input;
        literal(keyword).parse_next(input)?;
        if !input.starts_with(|c: char| c.is_whitespace() || c == '(') {
            *input = saved;
            return Err(ErrMode::Backtrack(ContextError::new()));
        }
        Ok(())
    }
}
