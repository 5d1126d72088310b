use std::{collections::HashMap, io::BufRead};

use lazy_static::lazy_static;

use crate::ast::{ASTNode, Expression, Function, Prototype};
use crate::lexer::{Lexer, Token};

/// Name prefix given to the functions wrapping bare top-level expressions.
pub const ANON_PREFIX: &str = "__anon_expr";

lazy_static! {
    static ref BINOP_PRECEDENCE: HashMap<char, i32> = {
        let mut precedence = HashMap::new();
        precedence.insert('<', 10);
        precedence.insert('>', 10);
        precedence.insert('+', 20);
        precedence.insert('-', 20);
        precedence.insert('*', 40);
        precedence.insert('/', 40);
        precedence
    };
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParserError {
    #[error("expected {expected}, found {found}")]
    ExpectedToken { expected: &'static str, found: Token },
    #[error("unexpected {0} when expecting an expression")]
    UnexpectedToken(Token),
    #[error("expected ')' or ',' in argument list, found {0}")]
    MissingSeparator(Token),
}

pub type PartialParseResult = Result<Expression, ParserError>;

pub struct Parser<R> {
    lexer: Lexer<R>,
    current: Token,
    anon_count: usize,
}

impl<R: BufRead> Parser<R> {
    /// Create a parser and prime the current token slot.
    pub fn new(lexer: Lexer<R>) -> Self {
        let mut parser = Parser {
            lexer,
            current: Token::Eof,
            anon_count: 0,
        };
        parser.advance();
        parser
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn advance(&mut self) -> &Token {
        self.current = self.lexer.next_token();
        &self.current
    }

    fn expect_char(&mut self, c: char, expected: &'static str) -> Result<(), ParserError> {
        if self.current != Token::Char(c) {
            return Err(ParserError::ExpectedToken {
                expected,
                found: self.current.clone(),
            });
        }
        self.advance();
        Ok(())
    }

    /// Precedence of the pending binary operator, -1 if it is not one.
    fn token_precedence(&self) -> i32 {
        match self.current {
            Token::Char(c) => BINOP_PRECEDENCE.get(&c).copied().unwrap_or(-1),
            _ => -1,
        }
    }

    fn parse_number(&mut self, value: f64) -> PartialParseResult {
        self.advance();
        Ok(Expression::Literal(value))
    }

    fn parse_nested(&mut self) -> PartialParseResult {
        self.advance();
        let res = self.parse_expression()?;
        self.expect_char(')', "')'")?;
        Ok(res)
    }

    fn parse_identifier(&mut self, ident: String) -> PartialParseResult {
        self.advance();

        if self.current != Token::Char('(') {
            return Ok(Expression::Variable(ident));
        }
        self.advance();

        let mut args = Vec::new();
        if self.current != Token::Char(')') {
            loop {
                args.push(self.parse_expression()?);

                match self.current {
                    Token::Char(')') => break,
                    Token::Char(',') => {
                        self.advance();
                    }
                    _ => return Err(ParserError::MissingSeparator(self.current.clone())),
                }
            }
        }
        self.advance();

        Ok(Expression::Call(ident, args))
    }

    fn parse_primary(&mut self) -> PartialParseResult {
        match self.current.clone() {
            Token::Number(value) => self.parse_number(value),
            Token::Ident(ident) => self.parse_identifier(ident),
            Token::Char('(') => self.parse_nested(),
            tok => Err(ParserError::UnexpectedToken(tok)),
        }
    }

    fn parse_bin_op_rhs(&mut self, min_precedence: i32, lhs: Expression) -> PartialParseResult {
        let mut result = lhs;

        loop {
            let precedence = self.token_precedence();
            if precedence < min_precedence {
                return Ok(result);
            }

            let operator = match self.current {
                Token::Char(c) => c,
                _ => return Ok(result),
            };
            self.advance();

            let mut rhs = self.parse_primary()?;

            if precedence < self.token_precedence() {
                rhs = self.parse_bin_op_rhs(precedence + 1, rhs)?;
            }

            result = Expression::binary(operator, result, rhs);
        }
    }

    pub fn parse_expression(&mut self) -> PartialParseResult {
        let lhs = self.parse_primary()?;
        self.parse_bin_op_rhs(0, lhs)
    }

    pub fn parse_prototype(&mut self) -> Result<Prototype, ParserError> {
        let name = match &self.current {
            Token::Ident(name) => name.clone(),
            found => {
                return Err(ParserError::ExpectedToken {
                    expected: "function name in prototype",
                    found: found.clone(),
                })
            }
        };
        self.advance();

        self.expect_char('(', "'(' in prototype")?;

        let mut args = Vec::new();
        while let Token::Ident(arg) = &self.current {
            args.push(arg.clone());
            self.advance();
        }

        self.expect_char(')', "')' in prototype")?;

        Ok(Prototype { name, args })
    }

    pub fn parse_definition(&mut self) -> Result<ASTNode, ParserError> {
        self.advance();
        let prototype = self.parse_prototype()?;
        let body = self.parse_expression()?;
        Ok(ASTNode::Function(Function { prototype, body }))
    }

    pub fn parse_extern(&mut self) -> Result<ASTNode, ParserError> {
        self.advance();
        Ok(ASTNode::Extern(self.parse_prototype()?))
    }

    pub fn parse_top_level_expr(&mut self) -> Result<ASTNode, ParserError> {
        let body = self.parse_expression()?;

        let name = format!("{}{}", ANON_PREFIX, self.anon_count);
        self.anon_count += 1;

        Ok(ASTNode::TopLevelExpression(Function {
            prototype: Prototype {
                name,
                args: Vec::new(),
            },
            body,
        }))
    }

    /// Parse the unit starting at the current token, skipping `;`
    /// separators. Return `None` at end of input.
    pub fn parse_top_level(&mut self) -> Option<Result<ASTNode, ParserError>> {
        while self.current == Token::Char(';') {
            self.advance();
        }

        match self.current {
            Token::Eof => None,
            Token::Def => Some(self.parse_definition()),
            Token::Extern => Some(self.parse_extern()),
            _ => Some(self.parse_top_level_expr()),
        }
    }
}

/// Parse every top-level unit of `input`, stopping at the first error.
pub fn parse_str(input: &str) -> Result<Vec<ASTNode>, ParserError> {
    let mut parser = Parser::new(Lexer::new(input.as_bytes()));
    let mut ast = Vec::new();

    while let Some(node) = parser.parse_top_level() {
        ast.push(node?);
    }

    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_expr(input: &str) -> PartialParseResult {
        Parser::new(Lexer::new(input.as_bytes())).parse_expression()
    }

    fn var(name: &str) -> Expression {
        Expression::Variable(name.to_string())
    }

    fn num(value: f64) -> Expression {
        Expression::Literal(value)
    }

    #[test]
    fn parse_expr_works() {
        let target = Expression::binary(
            '+',
            var("x"),
            Expression::binary('*', num(1.0), Expression::binary('-', num(2.0), num(3.0))),
        );
        assert_eq!(parse_expr("x + 1 * (2 - 3)").unwrap(), target);
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_eq!(
            parse_expr("1+2*3").unwrap(),
            Expression::binary('+', num(1.0), Expression::binary('*', num(2.0), num(3.0)))
        );
        assert_eq!(
            parse_expr("1*2+3").unwrap(),
            Expression::binary('+', Expression::binary('*', num(1.0), num(2.0)), num(3.0))
        );
    }

    #[test]
    fn same_precedence_is_left_associative() {
        assert_eq!(
            parse_expr("1-2-3").unwrap(),
            Expression::binary('-', Expression::binary('-', num(1.0), num(2.0)), num(3.0))
        );
        assert_eq!(
            parse_expr("8/4*2").unwrap(),
            Expression::binary('*', Expression::binary('/', num(8.0), num(4.0)), num(2.0))
        );
    }

    #[test]
    fn comparison_binds_loosest() {
        assert_eq!(
            parse_expr("a+1 < b*2").unwrap(),
            Expression::binary(
                '<',
                Expression::binary('+', var("a"), num(1.0)),
                Expression::binary('*', var("b"), num(2.0)),
            )
        );
    }

    #[test]
    fn mixed_chain_climbs_back_down() {
        // 1 + 2 * 3 - 4 => (1 + (2 * 3)) - 4
        assert_eq!(
            parse_expr("1+2*3-4").unwrap(),
            Expression::binary(
                '-',
                Expression::binary('+', num(1.0), Expression::binary('*', num(2.0), num(3.0))),
                num(4.0),
            )
        );
    }

    #[test]
    fn calls_parse_arguments_in_order() {
        assert_eq!(
            parse_expr("foo(1, x+2, bar())").unwrap(),
            Expression::Call(
                "foo".to_string(),
                vec![
                    num(1.0),
                    Expression::binary('+', var("x"), num(2.0)),
                    Expression::Call("bar".to_string(), vec![]),
                ]
            )
        );
    }

    #[test]
    fn unknown_operator_ends_expression() {
        let mut parser = Parser::new(Lexer::new("1 % 2".as_bytes()));
        assert_eq!(parser.parse_expression().unwrap(), num(1.0));
        assert_eq!(parser.current(), &Token::Char('%'));
    }

    #[test]
    fn missing_separator_is_reported() {
        assert_eq!(
            parse_expr("foo(1 2)"),
            Err(ParserError::MissingSeparator(Token::Number(2.0)))
        );
    }

    #[test]
    fn unclosed_paren_is_reported() {
        assert_eq!(
            parse_expr("(1 + 2"),
            Err(ParserError::ExpectedToken {
                expected: "')'",
                found: Token::Eof,
            })
        );
    }

    #[test]
    fn unexpected_primary_is_reported() {
        assert_eq!(parse_expr(")"), Err(ParserError::UnexpectedToken(Token::Char(')'))));
        assert_eq!(parse_expr("1 + def"), Err(ParserError::UnexpectedToken(Token::Def)));
    }

    #[test]
    fn failure_leaves_offending_token() {
        let mut parser = Parser::new(Lexer::new("def 1(x) x".as_bytes()));
        assert!(parser.parse_definition().is_err());
        assert_eq!(parser.current(), &Token::Number(1.0));
    }

    #[test]
    fn prototype_errors() {
        assert_eq!(
            parse_str("extern (a)"),
            Err(ParserError::ExpectedToken {
                expected: "function name in prototype",
                found: Token::Char('('),
            })
        );
        assert_eq!(
            parse_str("def f x"),
            Err(ParserError::ExpectedToken {
                expected: "'(' in prototype",
                found: Token::Ident("x".to_string()),
            })
        );
        assert_eq!(
            parse_str("def f(a, b) a"),
            Err(ParserError::ExpectedToken {
                expected: "')' in prototype",
                found: Token::Char(','),
            })
        );
    }

    #[test]
    fn parse_str_works() {
        let ast = parse_str("extern sin(x); def thing(x y) sin(x) * y; thing(1, 2)").unwrap();
        assert_eq!(
            ast,
            vec![
                ASTNode::Extern(Prototype {
                    name: "sin".to_string(),
                    args: vec!["x".to_string()],
                }),
                ASTNode::Function(Function {
                    prototype: Prototype {
                        name: "thing".to_string(),
                        args: vec!["x".to_string(), "y".to_string()],
                    },
                    body: Expression::binary(
                        '*',
                        Expression::Call("sin".to_string(), vec![var("x")]),
                        var("y"),
                    ),
                }),
                ASTNode::TopLevelExpression(Function {
                    prototype: Prototype {
                        name: "__anon_expr0".to_string(),
                        args: vec![],
                    },
                    body: Expression::Call("thing".to_string(), vec![num(1.0), num(2.0)]),
                }),
            ]
        );
    }

    #[test]
    fn anonymous_functions_get_distinct_names() {
        let names: Vec<String> = parse_str("1+1; 1+1")
            .unwrap()
            .iter()
            .map(|node| node.name().to_string())
            .collect();
        assert_eq!(names, vec!["__anon_expr0", "__anon_expr1"]);
    }

    #[test]
    fn duplicate_parameter_names_are_kept() {
        assert_eq!(
            parse_str("extern f(a a)").unwrap(),
            vec![ASTNode::Extern(Prototype {
                name: "f".to_string(),
                args: vec!["a".to_string(), "a".to_string()],
            })]
        );
    }
}
