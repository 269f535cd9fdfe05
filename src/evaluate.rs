use std::{cmp::Ordering, collections::HashMap};

use tracing::trace;

use crate::{
    criteria::{Comparison, ComparisonOperator, Criteria, LogicalOperator},
    error::{Error, Result},
    value::Value,
};

/// The narrow view of a business object that criteria need: read a property
///  by name, and optionally the value it had when last saved.
///
/// Fields with a source path are looked up by their dotted name
///  (`Contact.Surname`); navigating that path is up to the implementor.
pub trait PropertySource {
    /// Fails with [Error::UnknownProperty] for names the object doesn't have.
    fn current_value(&self, property: &str) -> Result<Value>;

    fn persisted_value(&self, property: &str) -> Result<Value> {
        self.current_value(property)
    }

    /// Whether the object has ever been saved.
    fn is_persisted(&self) -> bool {
        false
    }
}

impl PropertySource for HashMap<String, Value> {
    fn current_value(&self, property: &str) -> Result<Value> {
        self.get(property)
            .cloned()
            .ok_or_else(|| Error::UnknownProperty(property.to_string()))
    }
}

/// A plain in-memory object: a set of named values plus, once it has been
///  marked as saved, a snapshot of what was persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    current: HashMap<String, Value>,
    persisted: Option<HashMap<String, Value>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(property, value);
        self
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        self.current.insert(property.into(), value.into());
    }

    /// Snapshots the current values as the persisted state.
    pub fn mark_persisted(&mut self) {
        self.persisted = Some(self.current.clone());
    }
}

impl PropertySource for PropertyBag {
    fn current_value(&self, property: &str) -> Result<Value> {
        self.current.current_value(property)
    }

    fn persisted_value(&self, property: &str) -> Result<Value> {
        match &self.persisted {
            Some(persisted) => persisted.current_value(property),
            None => self.current_value(property),
        }
    }

    fn is_persisted(&self) -> bool {
        self.persisted.is_some()
    }
}

impl Criteria {
    /// Evaluates the tree against `target`. With `use_real_time_value` false,
    ///  a saved target is judged by its persisted values instead of any
    ///  pending edits.
    ///
    /// Both sides of AND/OR are always evaluated, so a misconfigured
    ///  comparison fails even when the other side already decides the result.
    pub fn is_match<S>(&self, target: &S, use_real_time_value: bool) -> Result<bool>
    where
        S: PropertySource + ?Sized,
    {
        self.check_depth()?;
        self.evaluate(target, use_real_time_value)
    }

    fn evaluate<S>(&self, target: &S, use_real_time_value: bool) -> Result<bool>
    where
        S: PropertySource + ?Sized,
    {
        match self {
            Self::Leaf(comparison) => comparison.is_match(target, use_real_time_value),
            Self::Composite {
                left,
                operator: LogicalOperator::Not,
                right: None,
            } => Ok(!left.evaluate(target, use_real_time_value)?),
            Self::Composite {
                left,
                operator,
                right: Some(right),
            } => {
                let l = left.evaluate(target, use_real_time_value)?;
                let r = right.evaluate(target, use_real_time_value)?;
                match operator {
                    LogicalOperator::And => Ok(l && r),
                    LogicalOperator::Or => Ok(l || r),
                    LogicalOperator::Not => Err(Error::InvalidBinaryOperator(*operator)),
                }
            }
            Self::Composite {
                operator,
                right: None,
                ..
            } => Err(Error::InvalidUnaryOperator(*operator)),
        }
    }

    /// [Criteria::is_match] against current values.
    pub fn matches<S>(&self, target: &S) -> Result<bool>
    where
        S: PropertySource + ?Sized,
    {
        self.is_match(target, true)
    }

    /// The items that match, in order. The first evaluation error aborts.
    pub fn filter<'a, S: PropertySource>(&self, items: &'a [S]) -> Result<Vec<&'a S>> {
        self.check_depth()?;
        let mut matched = Vec::new();
        for item in items {
            if self.evaluate(item, true)? {
                matched.push(item);
            }
        }
        Ok(matched)
    }
}

impl Comparison {
    pub fn is_match<S>(&self, target: &S, use_real_time_value: bool) -> Result<bool>
    where
        S: PropertySource + ?Sized,
    {
        use ComparisonOperator as Op;

        let property = self.field.to_string();
        let actual = if !use_real_time_value && target.is_persisted() {
            target.persisted_value(&property)?
        } else {
            target.current_value(&property)?
        };
        trace!(%property, operator = %self.operator, "matching comparison");

        match self.operator {
            Op::Like | Op::NotLike => {
                let matched = like(&actual, &self.value.resolved());
                Ok(matched == (self.operator == Op::Like))
            }
            Op::In | Op::NotIn => {
                let expected = self.value.normalize_for(&actual)?;
                let member = match &expected {
                    Value::List(items) => items.iter().any(|v| values_equal(&actual, v)),
                    other => values_equal(&actual, other),
                };
                Ok(member == (self.operator == Op::In))
            }
            Op::Equals | Op::Is => Ok(values_equal(&actual, &self.value.normalize_for(&actual)?)),
            Op::NotEquals | Op::IsNot => {
                Ok(!values_equal(&actual, &self.value.normalize_for(&actual)?))
            }
            Op::GreaterThan | Op::LessThan | Op::GreaterThanEqual | Op::LessThanEqual => {
                let expected = self.value.normalize_for(&actual)?;
                if actual.is_null() || expected.is_null() {
                    return Ok(false);
                }
                let ordering = compare(&property, &actual, &expected)?;
                Ok(match self.operator {
                    Op::GreaterThan => ordering == Ordering::Greater,
                    Op::LessThan => ordering == Ordering::Less,
                    Op::GreaterThanEqual => ordering != Ordering::Less,
                    _ => ordering != Ordering::Greater,
                })
            }
        }
    }
}

// Value equality for matching: nulls are equal to each other and nothing else,
//  integers and decimals compare numerically.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Integer(i), Value::Decimal(d)) | (Value::Decimal(d), Value::Integer(i)) => {
            *i as f64 == *d
        }
        (Value::Decimal(x), Value::Decimal(y)) => x == y,
        _ => a == b,
    }
}

const fn is_orderable(value: &Value) -> bool {
    !matches!(
        value,
        Value::Bytes(_) | Value::List(_) | Value::Relative(_) | Value::Null
    )
}

fn compare(property: &str, a: &Value, b: &Value) -> Result<Ordering> {
    for v in [a, b] {
        if !is_orderable(v) {
            return Err(Error::NotComparable {
                property: property.to_string(),
                type_name: v.type_name(),
            });
        }
    }

    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
        (Value::Integer(x), Value::Decimal(y)) => Ok((*x as f64).total_cmp(y)),
        (Value::Decimal(x), Value::Integer(y)) => Ok(x.total_cmp(&(*y as f64))),
        (Value::Decimal(x), Value::Decimal(y)) => Ok(x.total_cmp(y)),
        (Value::Text(x), Value::Text(y)) => Ok(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Ok(x.cmp(y)),
        (Value::Guid(x), Value::Guid(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        _ => Err(Error::TypeMismatch {
            property: property.to_string(),
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

// `%` at the start and/or end of the pattern selects ends-with, starts-with,
//  or contains; without wildcards the match is exact. Case-sensitive.
fn like(actual: &Value, pattern: &Value) -> bool {
    match (actual, pattern) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (actual, pattern) => {
            let text = actual.to_string();
            let pattern = pattern.to_string();
            let (leading, rest) = match pattern.strip_prefix('%') {
                Some(rest) => (true, rest),
                None => (false, pattern.as_str()),
            };
            let (trailing, needle) = match rest.strip_suffix('%') {
                Some(needle) => (true, needle),
                None => (false, rest),
            };
            match (leading, trailing) {
                (true, true) => text.contains(needle),
                (true, false) => text.ends_with(needle),
                (false, true) => text.starts_with(needle),
                (false, false) => text == needle,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local};

    use super::*;
    use crate::{
        criteria::MAX_DEPTH,
        value::{CriteriaValues, RelativeDate},
    };
    use ComparisonOperator as Op;

    fn leaf(field: &str, op: ComparisonOperator, value: impl Into<Value>) -> Criteria {
        Criteria::new(field, op, value).expect("a valid criteria")
    }

    fn bag(property: &str, value: impl Into<Value>) -> PropertyBag {
        PropertyBag::new().with(property, value)
    }

    macro_rules! assert_match {
        ($criteria:expr, $target:expr, $expected:expr) => {{
            let criteria = &$criteria;
            assert_eq!(
                criteria.matches(&$target).expect("evaluation"),
                $expected,
                "{criteria}"
            );
        }};
    }

    #[test]
    fn null_matrix_for_equality() {
        let null = bag("Surname", Value::Null);
        let smith = bag("Surname", "Smith");

        assert_match!(leaf("Surname", Op::Equals, Value::Null), null, true);
        assert_match!(leaf("Surname", Op::Equals, "Smith"), null, false);
        assert_match!(leaf("Surname", Op::Equals, Value::Null), smith, false);
        assert_match!(leaf("Surname", Op::Equals, "Smith"), smith, true);
        assert_match!(leaf("Surname", Op::Equals, "Jones"), smith, false);

        assert_match!(leaf("Surname", Op::NotEquals, Value::Null), null, false);
        assert_match!(leaf("Surname", Op::NotEquals, "Smith"), null, true);
        assert_match!(leaf("Surname", Op::NotEquals, Value::Null), smith, true);
        assert_match!(leaf("Surname", Op::NotEquals, "Smith"), smith, false);

        assert_match!(leaf("Surname", Op::Is, "NULL"), null, true);
        assert_match!(leaf("Surname", Op::Is, "NULL"), smith, false);
        assert_match!(leaf("Surname", Op::IsNot, "null"), null, false);
        assert_match!(leaf("Surname", Op::IsNot, "null"), smith, true);
    }

    #[test]
    fn null_matrix_for_ordering() {
        for op in [
            Op::GreaterThan,
            Op::LessThan,
            Op::GreaterThanEqual,
            Op::LessThanEqual,
        ] {
            assert_match!(leaf("Age", op, Value::Null), bag("Age", Value::Null), false);
            assert_match!(leaf("Age", op, 3), bag("Age", Value::Null), false);
            assert_match!(leaf("Age", op, Value::Null), bag("Age", 3), false);
        }
    }

    #[test]
    fn ordering_operators() {
        let five = bag("Age", 5);
        assert_match!(leaf("Age", Op::GreaterThan, 4), five, true);
        assert_match!(leaf("Age", Op::GreaterThan, 5), five, false);
        assert_match!(leaf("Age", Op::GreaterThanEqual, 5), five, true);
        assert_match!(leaf("Age", Op::LessThan, 5.5), five, true);
        assert_match!(leaf("Age", Op::LessThanEqual, 4), five, false);
        // text literals are converted to the property's type
        assert_match!(leaf("Age", Op::LessThan, "10"), five, true);
    }

    #[test]
    fn like_wildcards() {
        let target = bag("Surname", "This is MyValue Surname");
        assert_match!(leaf("Surname", Op::Like, "%MyValue%"), target, true);
        assert_match!(leaf("Surname", Op::Like, "MyValue%"), target, false);
        assert_match!(leaf("Surname", Op::Like, "%MyValue"), target, false);
        assert_match!(leaf("Surname", Op::Like, "%myvalue%"), target, false);
        assert_match!(leaf("Surname", Op::NotLike, "MyValue%"), target, true);

        let exact = bag("Surname", "MyValue");
        for pattern in ["%MyValue%", "MyValue%", "%MyValue", "MyValue"] {
            assert_match!(leaf("Surname", Op::Like, pattern), exact, true);
        }
    }

    #[test]
    fn like_with_nulls() {
        let null = bag("Surname", Value::Null);
        assert_match!(leaf("Surname", Op::Like, "%a%"), null, false);
        assert_match!(leaf("Surname", Op::Like, Value::Null), null, true);
        assert_match!(leaf("Surname", Op::NotLike, "%a%"), null, true);
        assert_match!(leaf("Surname", Op::NotLike, Value::Null), null, false);
    }

    #[test]
    fn in_and_not_in() {
        let values = CriteriaValues::new([1, 3, 5]);
        assert_match!(leaf("X", Op::In, values.clone()), bag("X", 3), true);
        assert_match!(leaf("X", Op::In, values.clone()), bag("X", 4), false);
        assert_match!(leaf("X", Op::NotIn, values.clone()), bag("X", 4), true);
        assert_match!(leaf("X", Op::In, values.clone()), bag("X", Value::Null), false);

        let with_null = CriteriaValues::new([Value::Integer(1), Value::Null]);
        assert_match!(leaf("X", Op::In, with_null.clone()), bag("X", Value::Null), true);
        assert_match!(leaf("X", Op::NotIn, with_null), bag("X", Value::Null), false);
    }

    #[test]
    fn incomparable_types_fail_fast() {
        let image = bag("Image", Value::Bytes(vec![0x89, 0x50, 0x4e, 0x47]));
        let err = leaf("Image", Op::LessThan, Value::Bytes(vec![1]))
            .matches(&image)
            .expect_err("bytes are not ordered");
        assert!(
            err.to_string()
                .contains("does not implement IComparable and cannot be matched"),
            "{err}"
        );
        // equality is still fine
        assert_match!(
            leaf("Image", Op::Equals, Value::Bytes(vec![0x89, 0x50, 0x4e, 0x47])),
            image,
            true
        );
    }

    #[test]
    fn mismatched_orderable_types_fail_fast() {
        let guid = Value::from_literal("{67e55044-10b1-426f-9247-bb680e5fe0c8}");
        assert!(matches!(guid, Value::Guid(_)));

        // the comparison value is converted to the property's type first, so
        //  a bool against a guid property fails there
        let err = leaf("Key", Op::LessThan, true)
            .matches(&bag("Key", guid.clone()))
            .expect_err("a bool is not a guid");
        assert!(matches!(err, Error::Conversion { target: "guid", .. }), "{err}");

        // two orderable values of different kinds never get an ordering
        let err = compare("Key", &guid, &Value::Bool(true)).expect_err("guid against bool");
        assert_eq!(
            err,
            Error::TypeMismatch {
                property: "Key".into(),
                left: guid.type_name(),
                right: Value::Bool(true).type_name(),
            }
        );
        assert!(matches!(
            compare("When", &Value::Text("x".into()), &Value::Integer(1)),
            Err(Error::TypeMismatch { .. })
        ));
        assert_eq!(
            compare("Age", &Value::Integer(2), &Value::Decimal(2.5)),
            Ok(Ordering::Less)
        );
    }

    #[test]
    fn too_deep_trees_are_refused() {
        let target = bag("A", 1);
        let chain = (1..=MAX_DEPTH).fold(leaf("A", Op::Equals, 0), |acc, n| {
            acc | leaf("A", Op::Equals, n as i64)
        });
        assert_eq!(chain.depth(), MAX_DEPTH + 1);
        assert_eq!(
            chain.matches(&target),
            Err(Error::TooDeep { limit: MAX_DEPTH })
        );
        assert_eq!(
            chain.filter(std::slice::from_ref(&target)),
            Err(Error::TooDeep { limit: MAX_DEPTH })
        );

        let deepest = (1..MAX_DEPTH).fold(leaf("A", Op::Equals, 0), |acc, n| {
            acc | leaf("A", Op::Equals, n as i64)
        });
        assert_eq!(deepest.matches(&target), Ok(true));
    }

    #[test]
    fn unknown_property_is_an_error() {
        assert_eq!(
            leaf("Missing", Op::Equals, 1).matches(&bag("Present", 1)),
            Err(Error::UnknownProperty("Missing".into()))
        );
    }

    #[test]
    fn today_is_resolved_at_match_time() {
        let criteria = leaf("Due", Op::GreaterThan, RelativeDate::Today);
        let today = Local::now().date_naive();
        let yesterday = today - Duration::days(1);
        let tomorrow = today + Duration::days(1);

        for _ in 0..2 {
            assert_match!(criteria, bag("Due", yesterday), false);
            assert_match!(criteria, bag("Due", tomorrow), true);
        }
    }

    #[test]
    fn persisted_values_are_used_on_request() {
        let mut contact = bag("Surname", "Smith");
        contact.mark_persisted();
        contact.set("Surname", "Jones");

        let smith = leaf("Surname", Op::Equals, "Smith");
        assert!(!smith.is_match(&contact, true).expect("evaluation"));
        assert!(smith.is_match(&contact, false).expect("evaluation"));

        // never saved: the current value is all there is
        let fresh = bag("Surname", "Jones");
        assert!(!smith.is_match(&fresh, false).expect("evaluation"));
    }

    #[test]
    fn composites() {
        let target = PropertyBag::new().with("A", 1).with("B", 2);
        let a = leaf("A", Op::Equals, 1);
        let not_b = leaf("B", Op::Equals, 3);

        assert_match!(a.clone() & not_b.clone(), target, false);
        assert_match!(a.clone() | not_b.clone(), target, true);
        assert_match!(!not_b.clone(), target, true);
        assert_match!(!(a | not_b), target, false);
    }

    #[test]
    fn both_sides_are_evaluated() {
        let target = bag("A", 1);
        let criteria = leaf("A", Op::Equals, 2) & leaf("Missing", Op::Equals, 1);
        assert!(criteria.matches(&target).is_err());
    }

    #[test]
    fn dotted_fields_look_up_by_path() {
        let target = bag("Contact.Surname", "Smith");
        assert_match!(leaf("Contact.Surname", Op::Equals, "Smith"), target, true);
    }

    #[test]
    fn filter_keeps_matching_items() {
        let people = [bag("Age", 10), bag("Age", 30), bag("Age", 50)];
        let adults = leaf("Age", Op::GreaterThanEqual, 18)
            .filter(&people)
            .expect("evaluation");
        assert_eq!(adults, [&people[1], &people[2]]);
    }
}
