//! Scenarios that run text through the parser, the evaluator and the SQL
//!  renderer together.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use chrono::{Duration, Local};
use proptest::prelude::*;

use crate::{
    ComparisonOperator as Op, Criteria, Dialect, Error, Expression, PrimaryKey, PropertyBag,
    PropertySource, Value, parse_criteria,
};

fn hash_of(c: &Criteria) -> u64 {
    let mut h = DefaultHasher::new();
    c.hash(&mut h);
    h.finish()
}

#[test]
fn legacy_expression_end_to_end() {
    let expression = Expression::create("param1 = 'test' AND (param2 = 3 or param2 = 4)")
        .expect("a valid parse");
    let stmt = expression
        .to_sql_statement(&Dialect::default())
        .expect("renders");
    assert_eq!(
        stmt.sql(),
        "(param1 = @Param0 AND (param2 = @Param1 OR param2 = @Param2))"
    );
    assert_eq!(
        stmt.parameter_values(),
        vec![&Value::from("test"), &Value::from(3), &Value::from(4)]
    );
}

#[test]
fn primary_key_end_to_end() {
    let key = PrimaryKey::new([("Surname", "Smith"), ("FirstName", "Jo")]);
    let criteria = Criteria::from_primary_key(&key).expect("a non-empty key");
    assert_eq!(
        criteria.to_string(),
        "(Surname = 'Smith') AND (FirstName = 'Jo')"
    );

    let jo = PropertyBag::new()
        .with("Surname", "Smith")
        .with("FirstName", "Jo");
    let ann = PropertyBag::new()
        .with("Surname", "Smith")
        .with("FirstName", "Ann");
    let people = [jo.clone(), ann];
    let matched = criteria.filter(&people).expect("evaluates");
    assert_eq!(matched, vec![&jo]);

    let stmt = criteria
        .to_sql_statement(&Dialect::sql_server())
        .expect("renders");
    assert_eq!(stmt.sql(), "([Surname] = @Param0) AND ([FirstName] = @Param1)");
}

#[test]
fn parsed_text_matches_and_renders() {
    let criteria =
        parse_criteria("Field1 = 'test' AND Field2 = 3").expect("a valid parse");

    let hit = PropertyBag::new().with("Field1", "test").with("Field2", 3);
    let miss = PropertyBag::new().with("Field1", "test").with("Field2", 4);
    assert!(criteria.matches(&hit).expect("evaluates"));
    assert!(!criteria.matches(&miss).expect("evaluates"));

    let stmt = criteria
        .to_sql_statement(&Dialect::default())
        .expect("renders");
    assert_eq!(stmt.parameters().len(), 2);
    assert!(!stmt.sql().contains("test"));
    assert!(!stmt.sql().contains('3'));
    assert_eq!(
        stmt.parameter_values(),
        vec![&Value::from("test"), &Value::from(3)]
    );
}

#[test]
fn and_or_without_parentheses_group_left_to_right() {
    // Read as (A OR B) AND C: with A true and C false the whole is false,
    //  where SQL precedence would make it true
    let criteria = parse_criteria("A = 1 OR B = 1 AND C = 1").expect("a valid parse");
    let target = PropertyBag::new().with("A", 1).with("B", 0).with("C", 0);
    assert!(!criteria.matches(&target).expect("evaluates"));
}

#[test]
fn like_wildcards() {
    let target = PropertyBag::new().with("Name", "This is MyValue Surname");
    let exact = PropertyBag::new().with("Name", "MyValue");

    for (pattern, expected) in [("%MyValue%", true), ("MyValue%", false), ("%MyValue", false)] {
        let criteria = Criteria::new("Name", Op::Like, pattern).expect("valid");
        assert_eq!(criteria.matches(&target).expect("evaluates"), expected, "{pattern}");
        assert!(criteria.matches(&exact).expect("evaluates"), "{pattern}");
    }
}

#[test]
fn incomparable_values_fail_loudly() {
    let criteria = Criteria::new("Photo", Op::LessThan, "x").expect("valid");
    let target = PropertyBag::new().with("Photo", Value::Bytes(vec![0xff, 0xd8]));
    let err = criteria.matches(&target).expect_err("bytes are not ordered");
    assert!(matches!(err, Error::NotComparable { .. }));
    assert!(
        err.to_string()
            .contains("does not implement IComparable and cannot be matched")
    );
}

#[test]
fn today_is_resolved_on_every_match() {
    let criteria = parse_criteria("Due > Today").expect("a valid parse");
    let now = Local::now().naive_local();
    let yesterday = PropertyBag::new().with("Due", now - Duration::days(1));
    let tomorrow = PropertyBag::new().with("Due", now + Duration::days(1));

    for _ in 0..2 {
        assert!(!criteria.matches(&yesterday).expect("evaluates"));
        assert!(criteria.matches(&tomorrow).expect("evaluates"));
    }
}

#[test]
fn guid_literals() {
    let guid = "{67e55044-10b1-426f-9247-bb680e5fe0c8}";
    let criteria = parse_criteria(&format!("OrganisationID = {guid}")).expect("a valid parse");
    let target = PropertyBag::new().with("OrganisationID", Value::from_literal(guid));
    assert!(criteria.matches(&target).expect("evaluates"));
    assert_eq!(criteria.to_string(), format!("OrganisationID = '{guid}'"));
}

#[test]
fn persisted_values_are_used_on_request() {
    let mut target = PropertyBag::new().with("Status", "Open");
    target.mark_persisted();
    target.set("Status", "Closed");

    let criteria = parse_criteria("Status = 'Open'").expect("a valid parse");
    assert!(!criteria.is_match(&target, true).expect("evaluates"));
    assert!(criteria.is_match(&target, false).expect("evaluates"));
    assert_eq!(target.persisted_value("Status"), Ok(Value::from("Open")));
}

#[test]
fn merged_criteria_match_like_and() {
    let a = parse_criteria("A = 1").expect("a valid parse");
    let b = parse_criteria("B = 2").expect("a valid parse");
    let merged = Criteria::merge(Some(a.clone()), Some(b.clone())).expect("both present");
    assert_eq!(merged, a & b);
    assert_eq!(Criteria::merge(None, None), None);
}

fn arb_leaf() -> impl Strategy<Value = Criteria> {
    let field = prop::sample::select(vec!["A", "B", "C"]);
    let op = prop::sample::select(vec![
        Op::Equals,
        Op::NotEquals,
        Op::GreaterThan,
        Op::LessThan,
        Op::GreaterThanEqual,
        Op::LessThanEqual,
    ]);
    (field, op, -3i64..3).prop_map(|(f, op, v)| Criteria::new(f, op, v).expect("valid leaf"))
}

fn arb_criteria() -> impl Strategy<Value = Criteria> {
    arb_leaf().prop_recursive(4, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| l & r),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| l | r),
            inner.prop_map(|c| !c),
        ]
    })
}

proptest! {
    #[test]
    fn clones_are_equal_with_equal_hashes(c in arb_criteria()) {
        let copy = c.clone();
        prop_assert_eq!(&copy, &c);
        prop_assert_eq!(hash_of(&copy), hash_of(&c));
    }

    #[test]
    fn different_values_are_not_equal(v in -3i64..3, w in -3i64..3) {
        let a = Criteria::new("A", Op::Equals, v).expect("valid");
        let b = Criteria::new("A", Op::Equals, w).expect("valid");
        prop_assert_eq!(a == b, v == w);
        let null = Criteria::new("A", Op::Equals, Value::Null).expect("valid");
        prop_assert_ne!(a, null);
    }

    // The display form quotes every value, so reparsing it yields text
    //  values; matching must still agree with the generated tree
    #[test]
    fn display_form_reparses_to_an_equivalent_filter(
        c in arb_criteria(),
        a in -3i64..3,
        b in -3i64..3,
        cv in -3i64..3,
    ) {
        let reparsed = parse_criteria(&c.to_string()).expect("display form parses");
        let target = PropertyBag::new().with("A", a).with("B", b).with("C", cv);
        prop_assert_eq!(
            reparsed.matches(&target).expect("evaluates"),
            c.matches(&target).expect("evaluates")
        );
    }

    #[test]
    fn every_bound_value_gets_its_own_placeholder(c in arb_criteria()) {
        let stmt = c.to_sql_statement(&Dialect::default()).expect("renders");
        let leaves = c.fields().len();
        prop_assert_eq!(stmt.parameters().len(), leaves);
        for (i, param) in stmt.parameters().iter().enumerate() {
            let expected = format!("@Param{i}");
            prop_assert_eq!(&param.name, &expected);
            prop_assert!(stmt.sql().contains(&expected));
        }
    }
}
