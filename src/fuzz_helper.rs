use crate::{
    criteria::Criteria,
    evaluate::PropertyBag,
    expression::Expression,
    sql::Dialect,
    value::{RelativeDate, Value},
};

// A target with one property of most value types
fn sample_object() -> PropertyBag {
    PropertyBag::new()
        .with("A", 1)
        .with("B", 2.5)
        .with("C", "three")
        .with("D", Value::Null)
        .with("Active", true)
        .with("Created", RelativeDate::Now.resolve())
        .with("Photo", Value::Bytes(vec![0x01, 0x02, 0x03]))
        .with("Contact.Surname", "Smith")
}

fn dialects() -> [Dialect; 3] {
    [Dialect::default(), Dialect::sql_server(), Dialect::mysql()]
}

/// Parses, matches and renders a criteria string, ignoring every error.
/// Only panics are interesting to the fuzzer.
pub fn check_criteria(text: &str) {
    let Ok(criteria) = text.parse::<Criteria>() else {
        return;
    };
    let target = sample_object();
    _ = criteria.is_match(&target, true);
    _ = criteria.is_match(&target, false);
    _ = criteria.to_string();
    for dialect in dialects() {
        _ = criteria.to_sql_statement(&dialect);
    }
}

pub fn check_expression(text: &str) {
    let Ok(expression) = Expression::create(text) else {
        return;
    };
    _ = expression.to_string();
    for dialect in dialects() {
        _ = expression.to_sql_statement(&dialect);
    }
}
