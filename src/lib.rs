use lalrpop_util::lalrpop_mod;

pub mod criteria;
pub mod error;
pub mod evaluate;
pub mod expression;
pub mod field;
pub mod fuzz_helper;
pub mod key;
pub mod lex;
pub mod parser;
pub mod sql;
pub mod to_sql;
pub mod value;
lalrpop_mod!(
    #[allow(clippy::all)]
    pub grammar
);

pub use criteria::{Comparison, ComparisonOperator, Criteria, LogicalOperator, MAX_DEPTH};
pub use error::{Error, ParseError, Result};
pub use evaluate::{PropertyBag, PropertySource};
pub use expression::{Expression, Parameter, SqlOperator};
pub use field::{Join, JoinField, JoinType, QueryField, Source};
pub use key::{KeyProperty, PrimaryKey, RelationshipKey, RelationshipProperty};
pub use parser::parse_criteria;
pub use sql::{Dialect, SqlParameter, SqlStatement};
pub use to_sql::ToSql;
pub use value::{CriteriaValues, RelativeDate, Value};

#[cfg(test)]
mod tests;
