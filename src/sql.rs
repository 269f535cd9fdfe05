use std::{collections::HashMap, fmt};

use crate::value::Value;

/// Per-vendor formatting knobs handed to the renderer. Vendors differ only
///  in these values, so a new database is a new `Dialect`, not new code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dialect {
    pub open_delimiter: String,
    pub close_delimiter: String,
    pub parameter_prefix: String,
    /// What a `true` criteria value is bound as
    pub bool_true: Value,
    pub bool_false: Value,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            open_delimiter: String::new(),
            close_delimiter: String::new(),
            parameter_prefix: "@".to_string(),
            bool_true: Value::Bool(true),
            bool_false: Value::Bool(false),
        }
    }
}

impl Dialect {
    pub fn new(open_delimiter: &str, close_delimiter: &str, parameter_prefix: &str) -> Self {
        Self {
            open_delimiter: open_delimiter.to_string(),
            close_delimiter: close_delimiter.to_string(),
            parameter_prefix: parameter_prefix.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bools(mut self, bool_true: Value, bool_false: Value) -> Self {
        self.bool_true = bool_true;
        self.bool_false = bool_false;
        self
    }

    pub fn sql_server() -> Self {
        Self::new("[", "]", "@")
    }

    pub fn mysql() -> Self {
        Self::new("`", "`", "?").with_bools(Value::Integer(1), Value::Integer(0))
    }

    pub fn postgres() -> Self {
        Self::new("\"", "\"", ":")
    }

    pub fn sqlite() -> Self {
        Self::new("\"", "\"", "@").with_bools(Value::Integer(1), Value::Integer(0))
    }

    pub fn access() -> Self {
        Self::new("[", "]", "?").with_bools(Value::Integer(-1), Value::Integer(0))
    }

    pub fn firebird() -> Self {
        Self::new("\"", "\"", "@").with_bools(Value::Integer(1), Value::Integer(0))
    }

    /// Maps a criteria value to what actually gets bound.
    pub fn bind_value(&self, value: &Value) -> Value {
        match value.resolved() {
            Value::Bool(true) => self.bool_true.clone(),
            Value::Bool(false) => self.bool_false.clone(),
            other => other,
        }
    }
}

/// A placeholder name and the value bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

/// Accumulates SQL text and its bound parameters. One statement is written
///  by one renderer at a time.
#[derive(Debug, Clone)]
pub struct SqlStatement {
    text: String,
    parameters: Vec<SqlParameter>,
    dialect: Dialect,
    next_parameter: usize,
    aliases: HashMap<String, String>,
}

impl SqlStatement {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            text: String::new(),
            parameters: Vec::new(),
            dialect,
            next_parameter: 0,
            aliases: HashMap::new(),
        }
    }

    /// Qualify fields of the source named `source` with `alias` instead of
    ///  its entity name.
    #[must_use]
    pub fn with_alias(mut self, source: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.insert(source.into(), alias.into());
        self
    }

    pub fn alias_for(&self, source: &str) -> Option<&str> {
        self.aliases.get(source).map(String::as_str)
    }

    #[inline]
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    #[inline]
    pub fn sql(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn parameters(&self) -> &[SqlParameter] {
        &self.parameters
    }

    pub fn parameter_values(&self) -> Vec<&Value> {
        self.parameters.iter().map(|p| &p.value).collect()
    }

    pub fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    pub fn push_delimited(&mut self, ident: &str) {
        self.text.push_str(&self.dialect.open_delimiter);
        self.text.push_str(ident);
        self.text.push_str(&self.dialect.close_delimiter);
    }

    /// A fresh placeholder name: `@Param0`, `@Param1`, ...
    pub fn next_parameter_name(&mut self) -> String {
        let name = format!("{}Param{}", self.dialect.parameter_prefix, self.next_parameter);
        self.next_parameter += 1;
        name
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.parameters.push(SqlParameter {
            name: name.into(),
            value,
        });
    }

    /// Registers `value` under a fresh name, writes the name into the text and
    ///  returns it.
    pub fn bind(&mut self, value: &Value) -> String {
        let name = self.next_parameter_name();
        let value = self.dialect.bind_value(value);
        self.text.push_str(&name);
        self.add_parameter(name.clone(), value);
        name
    }
}

impl Default for SqlStatement {
    fn default() -> Self {
        Self::new(Dialect::default())
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RelativeDate;

    #[test]
    fn parameter_names_are_sequential() {
        let mut stmt = SqlStatement::new(Dialect::mysql());
        assert_eq!(stmt.next_parameter_name(), "?Param0");
        assert_eq!(stmt.next_parameter_name(), "?Param1");
        assert_eq!(stmt.bind(&Value::from("x")), "?Param2");
        assert_eq!(stmt.sql(), "?Param2");
        assert_eq!(stmt.parameter_values(), vec![&Value::from("x")]);
    }

    #[test]
    fn delimiters() {
        let mut stmt = SqlStatement::new(Dialect::sql_server());
        stmt.push_delimited("Surname");
        stmt.push_str(" = ");
        stmt.push_delimited("x");
        assert_eq!(stmt.to_string(), "[Surname] = [x]");

        for (dialect, expected) in [
            (Dialect::default(), "a"),
            (Dialect::mysql(), "`a`"),
            (Dialect::postgres(), "\"a\""),
        ] {
            let mut stmt = SqlStatement::new(dialect);
            stmt.push_delimited("a");
            assert_eq!(stmt.sql(), expected);
        }
    }

    #[test]
    fn bind_values_per_dialect() {
        let mut stmt = SqlStatement::new(Dialect::access());
        stmt.bind(&Value::Bool(true));
        stmt.bind(&Value::Bool(false));
        stmt.bind(&Value::Integer(7));
        assert_eq!(
            stmt.parameter_values(),
            vec![&Value::Integer(-1), &Value::Integer(0), &Value::Integer(7)]
        );

        // Relative dates are bound as concrete timestamps
        let mut stmt = SqlStatement::default();
        stmt.bind(&Value::Relative(RelativeDate::Today));
        assert!(matches!(stmt.parameters()[0].value, Value::DateTime(_)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn dialect_from_config() {
        let json = r#"{
            "open_delimiter": "[",
            "close_delimiter": "]",
            "parameter_prefix": "@",
            "bool_true": {"Integer": 1},
            "bool_false": {"Integer": 0}
        }"#;
        let dialect: Dialect = serde_json::from_str(json).expect("valid config");
        assert_eq!(
            dialect,
            Dialect::sql_server().with_bools(Value::Integer(1), Value::Integer(0))
        );
    }

    #[test]
    fn aliases() {
        let stmt = SqlStatement::default().with_alias("Contact", "c");
        assert_eq!(stmt.alias_for("Contact"), Some("c"));
        assert_eq!(stmt.alias_for("Address"), None);
    }
}
