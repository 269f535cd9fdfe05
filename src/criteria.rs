use std::{
    fmt,
    ops::{BitAnd, BitOr, Not},
};

use crate::{
    error::{Error, Result},
    field::QueryField,
    key::{PrimaryKey, RelationshipKey},
    value::{CriteriaValues, Value},
};

/// How many levels a criteria tree (or legacy expression) may nest. The parsers
///  refuse deeper text, and evaluation and rendering refuse deeper trees.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparisonOperator {
    #[strum(to_string = "=")]
    Equals,
    #[strum(to_string = ">")]
    GreaterThan,
    #[strum(to_string = "<")]
    LessThan,
    #[strum(to_string = ">=")]
    GreaterThanEqual,
    #[strum(to_string = "<=")]
    LessThanEqual,
    #[strum(to_string = "<>")]
    NotEquals,
    #[strum(to_string = "Like")]
    Like,
    #[strum(to_string = "Not Like")]
    NotLike,
    #[strum(to_string = "IS")]
    Is,
    #[strum(to_string = "IS NOT")]
    IsNot,
    #[strum(to_string = "IN")]
    In,
    #[strum(to_string = "NOT IN")]
    NotIn,
}

impl ComparisonOperator {
    /// The operator as it appears in generated SQL.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanEqual => ">=",
            Self::LessThanEqual => "<=",
            Self::NotEquals => "<>",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// IS and IS NOT compare against NULL only and never bind a parameter.
    #[must_use]
    pub const fn is_null_test(self) -> bool {
        matches!(self, Self::Is | Self::IsNot)
    }

    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

/// A single `field operator value` test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comparison {
    pub field: QueryField,
    pub operator: ComparisonOperator,
    pub value: Value,
}

/// A predicate tree: either a comparison or a logical combination of
///  criteria. `right` is `None` exactly when `operator` is `Not`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Criteria {
    Leaf(Comparison),
    Composite {
        left: Box<Criteria>,
        operator: LogicalOperator,
        right: Option<Box<Criteria>>,
    },
}

impl Criteria {
    /// Builds a comparison from a field string such as `Surname` or
    ///  `Contact.Surname`.
    pub fn new(
        field_string: &str,
        operator: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Result<Self> {
        if field_string.trim().is_empty() {
            return Err(Error::NullArgument("field_string"));
        }
        Self::from_field(QueryField::from_string(field_string)?, operator, value)
    }

    pub fn from_field(
        field: QueryField,
        operator: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Result<Self> {
        if field.property_name.trim().is_empty() {
            return Err(Error::NullArgument("field"));
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

        Ok(Self::Leaf(Comparison {
            field,
            operator,
            value,
        }))
    }

    /// Combines two criteria with `And` or `Or`.
    pub fn binary(left: Self, operator: LogicalOperator, right: Self) -> Result<Self> {
        if operator == LogicalOperator::Not {
            return Err(Error::InvalidBinaryOperator(operator));
        }
        Ok(Self::Composite {
            left: Box::new(left),
            operator,
            right: Some(Box::new(right)),
        })
    }

    /// Wraps a single criteria; only `Not` is accepted.
    pub fn unary(operator: LogicalOperator, child: Self) -> Result<Self> {
        if operator != LogicalOperator::Not {
            return Err(Error::InvalidUnaryOperator(operator));
        }
        Ok(Self::Composite {
            left: Box::new(child),
            operator,
            right: None,
        })
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::Composite {
            left: Box::new(left),
            operator: LogicalOperator::And,
            right: Some(Box::new(right)),
        }
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Composite {
            left: Box::new(left),
            operator: LogicalOperator::Or,
            right: Some(Box::new(right)),
        }
    }

    #[must_use]
    pub fn negate(child: Self) -> Self {
        Self::Composite {
            left: Box::new(child),
            operator: LogicalOperator::Not,
            right: None,
        }
    }

    /// AND-joins two optional criteria, passing either side through when the
    ///  other is missing.
    #[must_use]
    pub fn merge(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (None, None) => None,
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (Some(a), Some(b)) => Some(Self::and(a, b)),
        }
    }

    /// An `Equals` comparison per key property, AND-chained in key order.
    pub fn from_primary_key(key: &PrimaryKey) -> Result<Self> {
        key.properties
            .iter()
            .try_fold(None, |acc, prop| {
                let leaf = Self::from_field(
                    QueryField::from_property(prop.name.as_str()),
                    ComparisonOperator::Equals,
                    prop.value.clone(),
                )?;
                Ok::<_, Error>(Self::merge(acc, Some(leaf)))
            })?
            .ok_or(Error::NullArgument("key"))
    }

    /// Criteria matching the objects on the far side of a relationship: each
    ///  related property must equal the owner's value.
    pub fn from_relationship(relationship: &RelationshipKey) -> Result<Self> {
        relationship
            .properties
            .iter()
            .try_fold(None, |acc, prop| {
                let leaf = Self::from_field(
                    QueryField::from_property(prop.related_property.as_str()),
                    ComparisonOperator::Equals,
                    prop.value.clone(),
                )?;
                Ok::<_, Error>(Self::merge(acc, Some(leaf)))
            })?
            .ok_or(Error::NullArgument("relationship"))
    }

    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Composite { .. })
    }

    /// Levels in the tree; a single comparison is 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Self::Composite { left, right, .. } = node {
                stack.push((left, depth + 1));
                if let Some(right) = right {
                    stack.push((right, depth + 1));
                }
            }
        }
        deepest
    }

    /// Fails with [Error::TooDeep] past [MAX_DEPTH], before anything recurses
    ///  over the tree.
    pub(crate) fn check_depth(&self) -> Result<()> {
        if self.depth() > MAX_DEPTH {
            return Err(Error::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    // Moves composite children out, leaving empty leaves behind
    fn detach_children(&mut self, out: &mut Vec<Self>) {
        if let Self::Composite { left, right, .. } = self {
            for child in std::iter::once(left).chain(right.iter_mut()) {
                if child.is_composite() {
                    let hollow = Self::Leaf(Comparison {
                        field: QueryField::from_property(String::new()),
                        operator: ComparisonOperator::Equals,
                        value: Value::Null,
                    });
                    out.push(std::mem::replace(&mut **child, hollow));
                }
            }
        }
    }

    /// Every field referenced by the tree, left to right.
    pub fn fields(&self) -> Vec<&QueryField> {
        let mut fields = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Leaf(comparison) => fields.push(&comparison.field),
                Self::Composite { left, right, .. } => {
                    if let Some(right) = right {
                        stack.push(right);
                    }
                    stack.push(left);
                }
            }
        }
        fields
    }
}

impl BitAnd for Criteria {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::and(self, rhs)
    }
}

impl BitOr for Criteria {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::or(self, rhs)
    }
}

impl Not for Criteria {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::negate(self)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ComparisonOperator as Op;

        let field = &self.field;
        match (self.operator, &self.value) {
            (Op::Equals | Op::Is, Value::Null) => write!(f, "{field} IS NULL"),
            (Op::NotEquals | Op::IsNot, Value::Null) => write!(f, "{field} IS NOT NULL"),
            (op, Value::List(items)) => {
                write!(f, "{field} {op} (")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{item}'")?;
                }
                write!(f, ")")
            }
            (op, value) => write!(f, "{field} {op} '{value}'"),
        }
    }
}

// Pieces of the display form still to be written
enum Pending<'a> {
    Node(&'a Criteria),
    Joiner(LogicalOperator),
    Close,
}

/// Display form for logs and tests. Not SQL: values are quoted, not escaped.
impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![Pending::Node(self)];
        while let Some(next) = pending.pop() {
            match next {
                Pending::Close => f.write_str(")")?,
                Pending::Joiner(operator) => write!(f, ") {operator} (")?,
                Pending::Node(Self::Leaf(comparison)) => write!(f, "{comparison}")?,
                Pending::Node(Self::Composite {
                    left,
                    right: None,
                    ..
                }) => {
                    f.write_str("NOT (")?;
                    pending.push(Pending::Close);
                    pending.push(Pending::Node(left));
                }
                Pending::Node(Self::Composite {
                    left,
                    operator,
                    right: Some(right),
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

// Children are detached onto a heap stack so long chains drop without
//  recursing once per level
impl Drop for Criteria {
    fn drop(&mut self) {
        let mut detached = Vec::new();
        self.detach_children(&mut detached);
        while let Some(mut next) = detached.pop() {
            next.detach_children(&mut detached);
        }
    }
}
