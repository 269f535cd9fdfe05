use std::str::FromStr;

use tracing::{debug, trace};

use crate::criteria::{ComparisonOperator, Criteria, LogicalOperator, MAX_DEPTH};
use crate::error::{Error, ParseError, Result};
use crate::field::QueryField;
use crate::lex::{Lexer, Token, TokenType};
use crate::value::{CriteriaValues, Value};

/// Parses the textual criteria form, e.g.
///  `Surname = 'Smith' AND (Age >= 18 OR Contact.Email IS NOT NULL)`.
///
/// AND and OR bind equally and group left to right, so `a OR b AND c` reads
///  as `(a OR b) AND c`. Use parentheses to say otherwise.
pub fn parse_criteria(input: &str) -> Result<Criteria> {
    debug!(input, "parsing criteria");
    let mut lexer = Lexer::new(input);
    if lexer.peek_token()?.is_none() {
        return Err(ParseError::Empty.into());
    }

    let (root, _) = parse_binary_op(&mut lexer, 0, 0)?;

    // Make sure we've completely parsed the input
    if let Some(tok) = lexer.next_token()? {
        return Err(lexer.unexpected(&tok).into());
    }

    trace!(criteria = %root, "parsed criteria");
    Ok(root)
}

impl FromStr for Criteria {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_criteria(s)
    }
}

// Returns the criteria and its depth. `nesting` counts the brackets and NOTs
//  enclosing this call; both it and the depth are capped at MAX_DEPTH.
fn parse_binary_op(
    lexer: &mut Lexer<'_>,
    min_binding_power: u8,
    nesting: usize,
) -> Result<(Criteria, usize)> {
    let first = lexer.next_token()?.ok_or(ParseError::UnexpectedEof)?;
    let (mut lhs, mut depth) = match first.ty {
        // Open paren: parse the internal expression and expect a closing paren
        TokenType::ParenLeft => {
            let inner = parse_binary_op(lexer, 0, within_limit(nesting + 1, &first)?)?;
            if !lexer.consume(TokenType::ParenRight)? {
                return Err(ParseError::MissingCloseParen.into());
            }
            inner
        }
        TokenType::Not => {
            let ((), pow) = prefix_binding(first.ty).ok_or_else(|| lexer.unexpected(&first))?;
            let (child, depth) =
                parse_binary_op(lexer, pow, within_limit(nesting + 1, &first)?)?;
            (
                Criteria::unary(LogicalOperator::Not, child)?,
                within_limit(depth + 1, &first)?,
            )
        }
        TokenType::Word => (parse_comparison(lexer, &first)?, 1),
        _ => return Err(lexer.unexpected(&first).into()),
    };

    loop {
        let Some(op_tok) = lexer.peek_token()? else {
            break;
        };
        let Some((l_pow, r_pow)) = infix_binding(op_tok.ty) else {
            break;
        };
        if l_pow < min_binding_power {
            break;
        }

        let op = match op_tok.ty {
            TokenType::And => LogicalOperator::And,
            _ => LogicalOperator::Or,
        };
        _ = lexer.next_token()?;

        let (rhs, rhs_depth) = parse_binary_op(lexer, r_pow, nesting)?;
        depth = within_limit(1 + depth.max(rhs_depth), &op_tok)?;
        lhs = Criteria::binary(lhs, op, rhs)?;
    }

    Ok((lhs, depth))
}

fn within_limit(depth: usize, tok: &Token) -> Result<usize> {
    if depth > MAX_DEPTH {
        return Err(ParseError::TooDeep { at: tok.start }.into());
    }
    Ok(depth)
}

// field op value, where op may be two keywords (NOT LIKE, IS NOT, NOT IN)
fn parse_comparison(lexer: &mut Lexer<'_>, field_tok: &Token) -> Result<Criteria> {
    let field = QueryField::from_string(lexer.source_of(field_tok))?;

    let op_tok = lexer.next_token()?.ok_or(ParseError::UnexpectedEof)?;
    let operator = match op_tok.ty {
        TokenType::Equals => ComparisonOperator::Equals,
        TokenType::NotEquals => ComparisonOperator::NotEquals,
        TokenType::LT => ComparisonOperator::LessThan,
        TokenType::GT => ComparisonOperator::GreaterThan,
        TokenType::LTE => ComparisonOperator::LessThanEqual,
        TokenType::GTE => ComparisonOperator::GreaterThanEqual,
        TokenType::Like => ComparisonOperator::Like,
        TokenType::In => ComparisonOperator::In,
        TokenType::Is => {
            if lexer.consume(TokenType::Not)? {
                ComparisonOperator::IsNot
            } else {
                ComparisonOperator::Is
            }
        }
        TokenType::Not => {
            let next = lexer.next_token()?.ok_or(ParseError::UnexpectedEof)?;
            match next.ty {
                TokenType::Like => ComparisonOperator::NotLike,
                TokenType::In => ComparisonOperator::NotIn,
                _ => return Err(lexer.unexpected(&next).into()),
            }
        }
        _ => return Err(lexer.unexpected(&op_tok).into()),
    };

    let value = if operator.is_list() {
        Value::List(parse_value_list(lexer)?)
    } else {
        parse_literal(lexer)?
    };

    Criteria::from_field(field, operator, value)
}

fn parse_literal(lexer: &mut Lexer<'_>) -> Result<Value> {
    let tok = lexer.next_token()?.ok_or(ParseError::UnexpectedEof)?;
    match tok.ty {
        // Quoted text stays text; the evaluator converts it when compared
        TokenType::String => Ok(Value::Text(lexer.text(&tok))),
        TokenType::Word => Ok(Value::from_literal(lexer.source_of(&tok))),
        _ => Err(lexer.unexpected(&tok).into()),
    }
}

// `(v1, v2, ...)` with at least one value
fn parse_value_list(lexer: &mut Lexer<'_>) -> Result<CriteriaValues> {
    let open = lexer.next_token()?.ok_or(ParseError::UnexpectedEof)?;
    if open.ty != TokenType::ParenLeft {
        return Err(lexer.unexpected(&open).into());
    }

    let mut values = vec![parse_literal(lexer)?];
    loop {
        let tok = lexer.next_token()?.ok_or(ParseError::MissingCloseParen)?;
        match tok.ty {
            TokenType::ParenRight => break,
            TokenType::Comma => values.push(parse_literal(lexer)?),
            _ => return Err(lexer.unexpected(&tok).into()),
        }
    }
    Ok(values.into_iter().collect())
}

// NOTE binding power is "precedence" from the operator's point of view: a
//  higher number binds more tightly. NOT binds tighter than AND/OR so that
//  `NOT a = 1 AND b = 2` negates only the first comparison.
fn prefix_binding(ty: TokenType) -> Option<((), u8)> {
    match ty {
        TokenType::Not => Some(((), 30)),
        _ => None,
    }
}

// AND and OR share a level; the right side being one higher makes them
//  left-associative.
fn infix_binding(ty: TokenType) -> Option<(u8, u8)> {
    match ty {
        TokenType::And | TokenType::Or => Some((10, 11)),
        _ => None,
    }
}
