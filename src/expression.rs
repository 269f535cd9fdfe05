use std::fmt;

use tracing::debug;

use crate::criteria::{ComparisonOperator, MAX_DEPTH};
use crate::error::{Error, ParseError, Result};
use crate::grammar::ExprParser;
use crate::value::{CriteriaValues, Value};

/// Joins two legacy expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "UPPERCASE")]
pub enum SqlOperator {
    And,
    Or,
}

/// A `field OP value` leaf of a legacy expression. Unlike a criteria
///  comparison, the field is a raw column name with an optional table rather
///  than a property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub field_name: String,
    pub table: Option<String>,
    pub operator: ComparisonOperator,
    pub value: Value,
}

impl Parameter {
    /// `field` may be `table.field`; the part before the last dot becomes the
    ///  table.
    pub fn new(field: &str, operator: ComparisonOperator, value: impl Into<Value>) -> Result<Self> {
        let field = field.trim();
        let (table, field_name) = match field.rsplit_once('.') {
            Some((table, name)) => (Some(table.to_string()), name),
            None => (None, field),
        };
        if field_name.is_empty() {
            return Err(Error::NullArgument("field_name"));
        }

        let value = value.into();
        let value = if operator.is_null_test() {
            if !value.is_null_token() {
                return Err(Error::InvalidNullComparison {
                    operator,
                    value: value.to_string(),
                });
            }
            Value::Null
        } else if operator.is_list() {
            match value {
                Value::List(items) if items.is_empty() => return Err(Error::EmptyList(operator)),
                list @ Value::List(_) => list,
                single => Value::List(CriteriaValues::new([single])),
            }
        } else {
            value
        };

        Ok(Self {
            field_name: field_name.to_string(),
            table,
            operator,
            value,
        })
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// The legacy expression tree used to build raw SQL fragments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Parameter(Parameter),
    Operator {
        left: Box<Expression>,
        operator: SqlOperator,
        right: Box<Expression>,
    },
}

impl Expression {
    /// Parses text such as `a = 'x' AND (b = 3 OR b = 4)`.
    pub fn create(text: &str) -> Result<Self> {
        debug!(text, "parsing legacy expression");
        if text.trim().is_empty() {
            return Err(ParseError::Empty.into());
        }

        ExprParser::new().parse(text).map_err(|e| {
            use lalrpop_util::ParseError as P;
            match e {
                P::User { error } => error,
                P::InvalidToken { location } => ParseError::UnexpectedCharacter(location).into(),
                P::UnrecognizedEof { .. } => ParseError::UnexpectedEof.into(),
                P::UnrecognizedToken {
                    token: (at, tok, _),
                    ..
                }
                | P::ExtraToken {
                    token: (at, tok, _),
                } => ParseError::UnexpectedToken {
                    found: tok.to_string(),
                    at,
                }
                .into(),
            }
        })
    }

    pub fn operator(left: Self, operator: SqlOperator, right: Self) -> Self {
        Self::Operator {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    /// Points every parameter named `property_name` at a real column, so an
    ///  expression written against property names can be rendered against
    ///  the table that stores them. Returns how many parameters changed.
    pub fn set_parameter_sql_info(
        &mut self,
        property_name: &str,
        field_name: &str,
        table: Option<&str>,
    ) -> usize {
        let mut changed = 0;
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Self::Parameter(param) => {
                    if param.field_name.eq_ignore_ascii_case(property_name) {
                        param.field_name = field_name.to_string();
                        param.table = table.map(str::to_string);
                        changed += 1;
                    }
                }
                Self::Operator { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        changed
    }

    /// Levels in the tree; a single parameter is 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((expr, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Self::Operator { left, right, .. } = expr {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        deepest
    }

    pub(crate) fn check_depth(&self) -> Result<()> {
        if self.depth() > MAX_DEPTH {
            return Err(Error::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    /// Every parameter leaf, left to right.
    pub fn parameters(&self) -> Vec<&Parameter> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Self::Parameter(param) => out.push(param),
                Self::Operator { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        out
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = &self.table {
            write!(f, "{table}.")?;
        }
        let field = &self.field_name;
        match (self.operator, &self.value) {
            (ComparisonOperator::Is, _) => write!(f, "{field} IS NULL"),
            (ComparisonOperator::IsNot, _) => write!(f, "{field} IS NOT NULL"),
            (op, list @ Value::List(_)) => write!(f, "{field} {op} ({list})"),
            (op, value) => write!(f, "{field} {op} '{value}'"),
        }
    }
}

enum Pending<'a> {
    Node(&'a Expression),
    Joiner(SqlOperator),
    Close,
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![Pending::Node(self)];
        while let Some(next) = pending.pop() {
            match next {
                Pending::Close => f.write_str(")")?,
                Pending::Joiner(operator) => write!(f, " {operator} ")?,
                Pending::Node(Self::Parameter(param)) => write!(f, "{param}")?,
                Pending::Node(Self::Operator {
                    left,
                    operator,
                    right,
                }) => {
                    f.write_str("(")?;
                    pending.push(Pending::Close);
                    pending.push(Pending::Node(right));
                    pending.push(Pending::Joiner(*operator));
                    pending.push(Pending::Node(left));
                }
            }
        }
        Ok(())
    }
}

// Same iterative teardown as criteria trees
impl Drop for Expression {
    fn drop(&mut self) {
        let mut detached = Vec::new();
        self.detach_children(&mut detached);
        while let Some(mut next) = detached.pop() {
            next.detach_children(&mut detached);
        }
    }
}

impl Expression {
    fn detach_children(&mut self, out: &mut Vec<Self>) {
        if let Self::Operator { left, right, .. } = self {
            for child in [left, right] {
                if matches!(**child, Self::Operator { .. }) {
                    let hollow = Self::Parameter(Parameter {
                        field_name: String::new(),
                        table: None,
                        operator: ComparisonOperator::Equals,
                        value: Value::Null,
                    });
                    out.push(std::mem::replace(&mut **child, hollow));
                }
            }
        }
    }
}
