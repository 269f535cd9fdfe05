use tracing::debug;

use crate::criteria::{Comparison, ComparisonOperator, Criteria, LogicalOperator};
use crate::error::{Error, Result};
use crate::expression::{Expression, Parameter};
use crate::field::{JoinType, QueryField, Source};
use crate::sql::{Dialect, SqlStatement};
use crate::value::Value;

/// Renders into a statement builder. Literal values never reach the SQL
///  text: they are bound as parameters. The one exception is `IS [NOT] NULL`.
pub trait ToSql {
    fn to_sql(&self, stmt: &mut SqlStatement) -> Result<()>;
}

impl<T> ToSql for Box<T>
where
    T: ToSql,
{
    fn to_sql(&self, stmt: &mut SqlStatement) -> Result<()> {
        self.as_ref().to_sql(stmt)
    }
}

impl Criteria {
    /// Renders the whole tree as a standalone WHERE fragment.
    pub fn to_sql_statement(&self, dialect: &Dialect) -> Result<SqlStatement> {
        let mut stmt = SqlStatement::new(dialect.clone());
        self.to_sql(&mut stmt)?;
        debug!(sql = stmt.sql(), parameters = stmt.parameters().len(), "rendered criteria");
        Ok(stmt)
    }
}

impl Expression {
    pub fn to_sql_statement(&self, dialect: &Dialect) -> Result<SqlStatement> {
        let mut stmt = SqlStatement::new(dialect.clone());
        self.to_sql(&mut stmt)?;
        debug!(sql = stmt.sql(), parameters = stmt.parameters().len(), "rendered expression");
        Ok(stmt)
    }
}

impl ToSql for Criteria {
    fn to_sql(&self, stmt: &mut SqlStatement) -> Result<()> {
        self.check_depth()?;
        write_criteria(self, stmt)
    }
}

fn write_criteria(criteria: &Criteria, stmt: &mut SqlStatement) -> Result<()> {
    match criteria {
        Criteria::Leaf(comparison) => comparison.to_sql(stmt),
        Criteria::Composite {
            left,
            operator: LogicalOperator::Not,
            right: None,
        } => {
            stmt.push_str("NOT (");
            write_criteria(left, stmt)?;
            stmt.push_str(")");
            Ok(())
        }
        Criteria::Composite {
            left,
            operator,
            right: Some(right),
        } if *operator != LogicalOperator::Not => {
            stmt.push_str("(");
            write_criteria(left, stmt)?;
            stmt.push_str(&format!(") {operator} ("));
            write_criteria(right, stmt)?;
            stmt.push_str(")");
            Ok(())
        }
        Criteria::Composite {
            operator,
            right: None,
            ..
        } => Err(Error::InvalidUnaryOperator(*operator)),
        Criteria::Composite { operator, .. } => Err(Error::InvalidBinaryOperator(*operator)),
    }
}

impl ToSql for Comparison {
    fn to_sql(&self, stmt: &mut SqlStatement) -> Result<()> {
        self.field.to_sql(stmt)?;
        write_predicate(stmt, self.operator, &self.value)
    }
}

// Everything after the field: ` = @Param0`, ` IN (@Param0, @Param1)`, ` IS NULL`
fn write_predicate(
    stmt: &mut SqlStatement,
    operator: ComparisonOperator,
    value: &Value,
) -> Result<()> {
    use ComparisonOperator as Op;

    match (operator, value) {
        (Op::Is | Op::Equals, Value::Null) => stmt.push_str(" IS NULL"),
        (Op::IsNot | Op::NotEquals, Value::Null) => stmt.push_str(" IS NOT NULL"),
        // Only NULL is accepted at construction, so any other operand is
        //  still a null test
        (Op::Is, _) => stmt.push_str(" IS NULL"),
        (Op::IsNot, _) => stmt.push_str(" IS NOT NULL"),
        (op, Value::List(items)) if items.is_empty() => return Err(Error::EmptyList(op)),
        (op, Value::List(items)) => {
            stmt.push_str(&format!(" {} (", op.sql()));
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    stmt.push_str(", ");
                }
                stmt.bind(item);
            }
            stmt.push_str(")");
        }
        (op, value) => {
            stmt.push_str(&format!(" {} ", op.sql()));
            stmt.bind(value);
        }
    }
    Ok(())
}

/// Writes `[Entity].[Field]`, or just `[Field]` when there is no source. The
///  qualifier is the source that owns the property, under its alias if the
///  statement has one.
impl ToSql for QueryField {
    fn to_sql(&self, stmt: &mut SqlStatement) -> Result<()> {
        if let Some(source) = &self.source {
            let owner = source.child_source_leaf();
            let qualifier = qualifier(stmt, owner);
            stmt.push_delimited(&qualifier);
            stmt.push_str(".");
        }
        stmt.push_delimited(&self.field_name);
        Ok(())
    }
}

fn qualifier(stmt: &SqlStatement, source: &Source) -> String {
    stmt.alias_for(&source.name)
        .unwrap_or(&source.entity_name)
        .to_string()
}

/// Renders the FROM clause of a source and its join graph:
///  `([A] JOIN [B] ON [A].[f] = [B].[f])`. Every join adds a pair of
///  parentheses around everything to its left.
impl ToSql for Source {
    fn to_sql(&self, stmt: &mut SqlStatement) -> Result<()> {
        for _ in &self.joins {
            stmt.push_str("(");
        }
        stmt.push_delimited(&self.entity_name);
        if let Some(alias) = stmt.alias_for(&self.name).map(str::to_string) {
            stmt.push_str(" ");
            stmt.push_delimited(&alias);
        }

        let from = qualifier(stmt, self);
        for join in &self.joins {
            if join.fields.is_empty() {
                return Err(Error::MissingJoinFields {
                    from: self.name.clone(),
                    to: join.to.name.clone(),
                });
            }

            stmt.push_str(match join.join_type {
                JoinType::Inner => " JOIN ",
                JoinType::LeftOuter => " LEFT JOIN ",
            });
            join.to.to_sql(stmt)?;
            stmt.push_str(" ON ");

            let to = qualifier(stmt, &join.to);
            for (i, field) in join.fields.iter().enumerate() {
                if i > 0 {
                    stmt.push_str(" AND ");
                }
                stmt.push_delimited(&from);
                stmt.push_str(".");
                stmt.push_delimited(&field.from_field);
                stmt.push_str(" = ");
                stmt.push_delimited(&to);
                stmt.push_str(".");
                stmt.push_delimited(&field.to_field);
            }
            stmt.push_str(")");
        }
        Ok(())
    }
}

impl ToSql for Parameter {
    fn to_sql(&self, stmt: &mut SqlStatement) -> Result<()> {
        if let Some(table) = &self.table {
            stmt.push_delimited(table);
            stmt.push_str(".");
        }
        stmt.push_delimited(&self.field_name);
        write_predicate(stmt, self.operator, &self.value)
    }
}

/// Legacy expressions parenthesize each operator node as a whole:
///  `(a = @Param0 AND b = @Param1)`.
impl ToSql for Expression {
    fn to_sql(&self, stmt: &mut SqlStatement) -> Result<()> {
        self.check_depth()?;
        write_expression(self, stmt)
    }
}

fn write_expression(expression: &Expression, stmt: &mut SqlStatement) -> Result<()> {
    match expression {
        Expression::Parameter(param) => param.to_sql(stmt),
        Expression::Operator {
            left,
            operator,
            right,
        } => {
            stmt.push_str("(");
            write_expression(left, stmt)?;
            stmt.push_str(&format!(" {operator} "));
            write_expression(right, stmt)?;
            stmt.push_str(")");
            Ok(())
        }
    }
}
