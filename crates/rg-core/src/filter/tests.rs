use super::*;

fn target(id: &str) -> Target {
    Target::new(id)
}

fn fleet() -> Vec<Target> {
    vec![
        target("dev-001")
            .with_name("Lab Gateway")
            .with_tag("canary")
            .with_attribute("region", "eu"),
        target("dev-002").with_tag("stable").with_attribute("region", "us"),
        target("dev-003").with_attribute("region", "eu"),
        target("qa-001").with_tag("canary").with_tag("qa"),
    ]
}

fn matching(query: &str) -> Vec<String> {
    let filter = TargetFilter::parse(query).unwrap();
    fleet()
        .into_iter()
        .filter(|t| filter.matches(t))
        .map(|t| t.controller_id)
        .collect()
}

// -- parsing -----------------------------------------------------------------

#[test]
fn blank_matches_all() {
    assert_eq!(parse_filter("").unwrap(), FilterExpr::All);
    assert_eq!(parse_filter("   ").unwrap(), FilterExpr::All);
    assert!(TargetFilter::parse(" ").unwrap().is_match_all());
    assert_eq!(matching("").len(), 4);
}

#[test]
fn parse_single_comparison() {
    assert_eq!(
        parse_filter("tag==canary").unwrap(),
        FilterExpr::Compare {
            field: Field::Tag,
            op: CompareOp::Eq,
            values: vec!["canary".into()],
        }
    );
}

#[test]
fn and_binds_tighter_than_or() {
    let expr = parse_filter("tag==a,tag==b;name==c").unwrap();
    let FilterExpr::Or(terms) = expr else {
        panic!("expected or at top level");
    };
    assert_eq!(terms.len(), 2);
    assert!(matches!(&terms[1], FilterExpr::And(inner) if inner.len() == 2));
}

#[test]
fn parse_keywords_and_parentheses() {
    let expr = parse_filter("(tag==a or tag==b) and attribute.region==eu").unwrap();
    let FilterExpr::And(terms) = expr else {
        panic!("expected and at top level");
    };
    assert!(matches!(&terms[0], FilterExpr::Or(inner) if inner.len() == 2));
    assert_eq!(
        terms[1],
        FilterExpr::Compare {
            field: Field::Attribute("region".into()),
            op: CompareOp::Eq,
            values: vec!["eu".into()],
        }
    );
}

#[test]
fn parse_lists_and_quotes() {
    assert_eq!(
        parse_filter("name=out=( 'Lab Gateway' , \"x y\" )").unwrap(),
        FilterExpr::Compare {
            field: Field::Name,
            op: CompareOp::Out,
            values: vec!["Lab Gateway".into(), "x y".into()],
        }
    );
}

#[test]
fn field_aliases() {
    for q in ["id==x", "controllerid==x", "ControllerId==x"] {
        assert!(matches!(
            parse_filter(q).unwrap(),
            FilterExpr::Compare {
                field: Field::ControllerId,
                ..
            }
        ));
    }
}

#[test]
fn syntax_errors() {
    for q in [
        "colour==red",
        "tag=canary",
        "tag==",
        "tag=in=canary",
        "(tag==a",
        "tag==a;",
        "tag==a b",
        "name=='open",
        "attribute.==x",
    ] {
        let err = TargetFilter::parse(q).unwrap_err();
        assert!(err.to_string().contains("invalid target filter"), "{q}: {err}");
    }
}

// -- matching ----------------------------------------------------------------

#[test]
fn equality_ignores_case() {
    assert_eq!(matching("tag==CANARY"), ["dev-001", "qa-001"]);
    assert_eq!(matching("name=='lab gateway'"), ["dev-001"]);
}

#[test]
fn name_falls_back_to_controller_id() {
    assert_eq!(matching("name==dev-002"), ["dev-002"]);
}

#[test]
fn wildcards() {
    assert_eq!(matching("id==dev-*"), ["dev-001", "dev-002", "dev-003"]);
    assert_eq!(matching("id==*-001"), ["dev-001", "qa-001"]);
}

#[test]
fn question_mark_is_literal() {
    let filter = TargetFilter::parse("id==dev?").unwrap();
    assert!(!filter.matches(&target("devX")));
    assert!(filter.matches(&target("dev?")));
    assert!(TargetFilter::parse("id=='a\0b'").is_err());
}

#[test]
fn negation_includes_targets_without_the_value() {
    assert_eq!(matching("tag!=canary"), ["dev-002", "dev-003"]);
    assert_eq!(matching("attribute.region!=eu"), ["dev-002", "qa-001"]);
}

#[test]
fn in_and_out_lists() {
    assert_eq!(matching("tag=in=(qa,stable)"), ["dev-002", "qa-001"]);
    assert_eq!(matching("attribute.region=out=(eu,us)"), ["qa-001"]);
}

#[test]
fn missing_attribute_never_equals() {
    assert_eq!(matching("attribute.rack==*"), Vec::<String>::new());
}

#[test]
fn combined_query() {
    assert_eq!(
        matching("attribute.region==eu;(tag==canary,id==dev-003)"),
        ["dev-001", "dev-003"]
    );
    assert_eq!(matching("tag==canary and id==qa-*"), ["qa-001"]);
}
