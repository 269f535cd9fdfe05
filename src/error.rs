use thiserror::Error as ThisError;

use crate::criteria::{ComparisonOperator, LogicalOperator};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while building, evaluating, or rendering
///  criteria. None of these are transient: they point at a mistake in how the
///  caller assembled the tree (or at the data it was matched against).
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum Error {
    #[error("value cannot be null or empty (parameter '{0}')")]
    NullArgument(&'static str),

    #[error("a criteria with a single child must use the Not operator, got {0}")]
    InvalidUnaryOperator(LogicalOperator),

    #[error("a criteria with two children must use And or Or, got {0}")]
    InvalidBinaryOperator(LogicalOperator),

    #[error("operator {operator} can only compare against NULL, got '{value}'")]
    InvalidNullComparison {
        operator: ComparisonOperator,
        value: String,
    },

    #[error("join from '{from}' to '{to}' has no join fields defined")]
    MissingJoinFields { from: String, to: String },

    #[error(
        "property '{property}' of type {type_name} does not implement IComparable and cannot be matched"
    )]
    NotComparable {
        property: String,
        type_name: &'static str,
    },

    #[error("cannot compare property '{property}' ({left}) with a value of type {right}")]
    TypeMismatch {
        property: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot convert '{value}' to {target}")]
    Conversion { value: String, target: &'static str },

    #[error("operator {0} needs at least one value in its list")]
    EmptyList(ComparisonOperator),

    #[error("criteria nest deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("no property named '{0}'")]
    UnknownProperty(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Failures of the textual parsers. Positions are byte offsets into the
///  input string.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ParseError {
    #[error("empty criteria expression")]
    Empty,

    #[error("unterminated string literal starting at {0}")]
    UnterminatedString(usize),

    #[error("unexpected character at {0}")]
    UnexpectedCharacter(usize),

    #[error("unexpected token '{found}' at {at}")]
    UnexpectedToken { found: String, at: usize },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("missing closing parenthesis")]
    MissingCloseParen,

    #[error("expression nests too deeply at {at}")]
    TooDeep { at: usize },
}
