//! Recursive-descent parser with Pratt-style precedence climbing for
//! binary operators.
//!
//! Each grammar production has its own method. `parse_item` produces one
//! top-level form at a time so the driver can hand finished forms straight
//! to the code generator, in source order.

use crate::error::{CompileError, CompileResult};

use super::ast::{BinaryOp, Expr, Function, Item, PrefixOp, Prototype};
use super::lexer::Lexer;
use super::token::{Token, TokenKind};

/// tokens that end an expression without being consumed
fn is_terminator(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::RightParen | TokenKind::RightBrace | TokenKind::Comma | TokenKind::Semicolon
    )
}

pub struct Parser {
    lexer: Lexer,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        Self { lexer }
    }

    /// program ::= (definition | extern_proto)*
    ///
    /// Returns the next top-level form, or `None` once the input is
    /// exhausted. Bare top-level expressions are rejected.
    pub fn parse_item(&mut self) -> CompileResult<Option<Item>> {
        let token = self.lexer.next_token()?;
        if token.is_eof() {
            return Ok(None);
        }
        let kind = token.kind;
        self.lexer.putback(token);
        let item = match kind {
            TokenKind::Def => Item::Function(self.definition()?),
            TokenKind::Extern => Item::Extern(self.extern_proto()?),
            _ => {
                return Err(CompileError::TopLevelExpression {
                    line: self.lexer.line(),
                })
            }
        };
        Ok(Some(item))
    }

    /// definition ::= "def" prototype block
    fn definition(&mut self) -> CompileResult<Function> {
        self.expect(TokenKind::Def, "function definition")?;
        let prototype = self.prototype()?;
        let body = self.block()?;
        Ok(Function { prototype, body })
    }

    /// extern_proto ::= "extern" prototype ";"
    fn extern_proto(&mut self) -> CompileResult<Prototype> {
        self.expect(TokenKind::Extern, "extern")?;
        let prototype = self.prototype()?;
        self.expect(TokenKind::Semicolon, "semicolon")?;
        Ok(prototype)
    }

    /// prototype ::= IDENT "(" (IDENT ("," IDENT)*)? ")"
    fn prototype(&mut self) -> CompileResult<Prototype> {
        let token = self.lexer.next_token()?;
        if token.kind != TokenKind::Identifier {
            return Err(self.expected("function name", &token));
        }
        let name = token.lexeme;
        self.expect(TokenKind::LeftParen, "left parenthesis")?;
        let mut params = Vec::new();
        loop {
            // argument name or ')'
            let token = self.lexer.next_token()?;
            if token.kind == TokenKind::RightParen {
                break;
            }
            if token.kind != TokenKind::Identifier {
                return Err(self.expected("argument name", &token));
            }
            params.push(token.lexeme);
            // ',' or ')'
            let token = self.lexer.next_token()?;
            if token.kind == TokenKind::RightParen {
                break;
            }
            if token.kind != TokenKind::Comma {
                return Err(self.expected("comma or right parenthesis", &token));
            }
        }
        Ok(Prototype { name, params })
    }

    /// block ::= "{" statement* "}"
    fn block(&mut self) -> CompileResult<Expr> {
        self.expect(TokenKind::LeftBrace, "opening brace")?;
        let mut statements = Vec::new();
        loop {
            let token = self.lexer.next_token()?;
            let stop = token.is_eof() || token.kind == TokenKind::RightBrace;
            self.lexer.putback(token);
            if stop {
                break;
            }
            statements.push(self.statement()?);
        }
        self.expect(TokenKind::RightBrace, "closing brace")?;
        Ok(Expr::Block(statements))
    }

    /// statement ::= if_stmt | (let_stmt | binary) ";"
    fn statement(&mut self) -> CompileResult<Expr> {
        let token = self.lexer.next_token()?;
        let kind = token.kind;
        self.lexer.putback(token);
        let stmt = match kind {
            TokenKind::If => return self.if_stmt(),
            TokenKind::Let => self.let_stmt()?,
            _ => self.binary(0)?,
        };
        self.expect(TokenKind::Semicolon, "semicolon")?;
        Ok(stmt)
    }

    /// let_stmt ::= "let" IDENT ("=" binary)?
    fn let_stmt(&mut self) -> CompileResult<Expr> {
        self.expect(TokenKind::Let, "let")?;
        let token = self.lexer.next_token()?;
        if token.kind != TokenKind::Identifier {
            return Err(self.expected("variable name", &token));
        }
        let name = token.lexeme;
        let token = self.lexer.next_token()?;
        let uninitialised = token.kind == TokenKind::Semicolon;
        self.lexer.putback(token);
        if uninitialised {
            // default initialiser is the literal zero
            return Ok(Expr::Let {
                name,
                init: Box::new(Expr::Literal(0)),
            });
        }
        self.expect(TokenKind::Equals, "=")?;
        let init = self.binary(0)?;
        Ok(Expr::Let {
            name,
            init: Box::new(init),
        })
    }

    /// if_stmt ::= "if" "(" binary ")" block ("else" (if_stmt | block))?
    fn if_stmt(&mut self) -> CompileResult<Expr> {
        self.expect(TokenKind::If, "if")?;
        self.expect(TokenKind::LeftParen, "left parenthesis")?;
        let cond = self.binary(0)?;
        self.expect(TokenKind::RightParen, "right parenthesis")?;
        let then_branch = self.block()?;
        let token = self.lexer.next_token()?;
        if token.kind != TokenKind::Else {
            self.lexer.putback(token);
            return Ok(Expr::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: None,
            });
        }
        // `else if` chains without braces; any other else body is a block
        let token = self.lexer.next_token()?;
        let chained = token.kind == TokenKind::If;
        self.lexer.putback(token);
        let else_branch = if chained {
            self.if_stmt()?
        } else {
            self.block()?
        };
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Some(Box::new(else_branch)),
        })
    }

    /// binary ::= prefix (binop prefix)*
    ///
    /// Precedence climbing: keep folding while the next operator binds
    /// strictly tighter than `prev_precedence`. When the loop stops on a
    /// lower-precedence operator that token is already consumed; the caller
    /// picks it up again through `Lexer::current`. Assignment recurses at
    /// `precedence - 1` to fold right-associatively.
    fn binary(&mut self, prev_precedence: u8) -> CompileResult<Expr> {
        let mut lhs = self.prefix()?;
        let mut token = self.lexer.next_token()?;
        if is_terminator(token.kind) {
            self.lexer.putback(token);
            return Ok(lhs);
        }
        let mut op = self.binary_op(&token)?;
        while op.precedence() > prev_precedence {
            let rhs_floor = match op {
                BinaryOp::Assign => op.precedence() - 1,
                _ => op.precedence(),
            };
            let rhs = self.binary(rhs_floor)?;
            lhs = Expr::binary(op, lhs, rhs);
            token = self.lexer.current().clone();
            if is_terminator(token.kind) {
                return Ok(lhs);
            }
            op = self.binary_op(&token)?;
        }
        Ok(lhs)
    }

    fn binary_op(&self, token: &Token) -> CompileResult<BinaryOp> {
        BinaryOp::from_token(token.kind).ok_or_else(|| self.expected("operator", token))
    }

    /// prefix ::= (PREFIX_OP prefix) | primary
    fn prefix(&mut self) -> CompileResult<Expr> {
        let token = self.lexer.next_token()?;
        match PrefixOp::from_token(token.kind) {
            Some(op) => {
                let operand = self.prefix()?;
                Ok(Expr::prefix(op, operand))
            }
            None => {
                self.lexer.putback(token);
                self.primary()
            }
        }
    }

    /// primary ::= INT_LIT | call_or_var | "(" binary ")" | if_stmt
    fn primary(&mut self) -> CompileResult<Expr> {
        let token = self.lexer.next_token()?;
        let kind = token.kind;
        let error = self.expected("expression", &token);
        self.lexer.putback(token);
        match kind {
            TokenKind::Identifier => self.identifier_or_call(),
            TokenKind::IntLiteral => self.literal(),
            TokenKind::LeftParen => self.paren(),
            TokenKind::If => self.if_stmt(),
            _ => Err(error),
        }
    }

    /// literal ::= INT_LIT
    fn literal(&mut self) -> CompileResult<Expr> {
        let token = self.lexer.next_token()?;
        if token.kind != TokenKind::IntLiteral {
            return Err(self.expected("integer literal", &token));
        }
        Ok(Expr::Literal(token.int_value))
    }

    /// paren ::= "(" binary ")"
    fn paren(&mut self) -> CompileResult<Expr> {
        self.expect(TokenKind::LeftParen, "left parenthesis")?;
        let expr = self.binary(0)?;
        self.expect(TokenKind::RightParen, "right parenthesis")?;
        Ok(expr)
    }

    /// call_or_var ::= IDENT ("(" (binary ("," binary)*)? ")")?
    fn identifier_or_call(&mut self) -> CompileResult<Expr> {
        let token = self.lexer.next_token()?;
        if token.kind != TokenKind::Identifier {
            return Err(self.expected("identifier", &token));
        }
        let name = token.lexeme;
        let token = self.lexer.next_token()?;
        if token.kind != TokenKind::LeftParen {
            self.lexer.putback(token);
            return Ok(Expr::Variable(name));
        }
        let mut args = Vec::new();
        loop {
            let token = self.lexer.next_token()?;
            if token.kind == TokenKind::RightParen {
                break;
            }
            self.lexer.putback(token);
            args.push(self.binary(0)?);
            let token = self.lexer.next_token()?;
            if token.kind == TokenKind::RightParen {
                break;
            }
            if token.kind != TokenKind::Comma {
                return Err(self.expected("comma or right parenthesis", &token));
            }
        }
        Ok(Expr::Call { callee: name, args })
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> CompileResult<Token> {
        let token = self.lexer.next_token()?;
        if token.kind != kind {
            return Err(self.expected(what, &token));
        }
        Ok(token)
    }

    fn expected(&self, what: &str, token: &Token) -> CompileError {
        CompileError::UnexpectedToken {
            line: self.lexer.line(),
            expected: what.to_string(),
            found: token.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(source: &str) -> CompileResult<Vec<Item>> {
        let mut parser = Parser::new(Lexer::new(source));
        let mut items = Vec::new();
        while let Some(item) = parser.parse_item()? {
            items.push(item);
        }
        Ok(items)
    }

    /// parse the body of `def f(a, b, c) { <source> ; }` and return the
    /// single statement
    fn stmt(source: &str) -> Expr {
        let wrapped = format!("def f(a, b, c) {{ {} }}", source);
        let items = parse_all(&wrapped).unwrap();
        match items.into_iter().next() {
            Some(Item::Function(function)) => match function.body {
                Expr::Block(mut statements) => {
                    assert_eq!(statements.len(), 1);
                    statements.pop().unwrap()
                }
                body => panic!("function body is not a block: {:?}", body),
            },
            item => panic!("expected a function, got {:?}", item),
        }
    }

    fn var(name: &str) -> Expr {
        Expr::Variable(name.to_string())
    }

    #[test]
    fn extern_prototype() {
        let items = parse_all("extern putchard(c);").unwrap();
        assert_eq!(
            items,
            vec![Item::Extern(Prototype {
                name: "putchard".to_string(),
                params: vec!["c".to_string()],
            })]
        );
    }

    #[test]
    fn definition_with_params() {
        let items = parse_all("def add(a, b) { a + b; }").unwrap();
        match &items[0] {
            Item::Function(function) => {
                assert_eq!(function.prototype.name, "add");
                assert_eq!(function.prototype.params, vec!["a", "b"]);
                assert_eq!(
                    function.body,
                    Expr::Block(vec![Expr::binary(BinaryOp::Add, var("a"), var("b"))])
                );
            }
            item => panic!("expected a function, got {:?}", item),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            stmt("a + b * c;"),
            Expr::binary(
                BinaryOp::Add,
                var("a"),
                Expr::binary(BinaryOp::Mul, var("b"), var("c")),
            )
        );
    }

    #[test]
    fn equal_precedence_folds_left() {
        assert_eq!(
            stmt("a - b - c;"),
            Expr::binary(
                BinaryOp::Sub,
                Expr::binary(BinaryOp::Sub, var("a"), var("b")),
                var("c"),
            )
        );
    }

    #[test]
    fn assignment_folds_right() {
        assert_eq!(
            stmt("a = b = c;"),
            Expr::binary(
                BinaryOp::Assign,
                var("a"),
                Expr::binary(BinaryOp::Assign, var("b"), var("c")),
            )
        );
    }

    #[test]
    fn comparison_binds_tighter_than_logical() {
        assert_eq!(
            stmt("a < b && b < c;"),
            Expr::binary(
                BinaryOp::And,
                Expr::binary(BinaryOp::Lt, var("a"), var("b")),
                Expr::binary(BinaryOp::Lt, var("b"), var("c")),
            )
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            stmt("(a + b) * c;"),
            Expr::binary(
                BinaryOp::Mul,
                Expr::binary(BinaryOp::Add, var("a"), var("b")),
                var("c"),
            )
        );
    }

    #[test]
    fn prefix_operators_nest() {
        assert_eq!(
            stmt("!~a;"),
            Expr::prefix(PrefixOp::Not, Expr::prefix(PrefixOp::BitNot, var("a")))
        );
        assert_eq!(
            stmt("-a + b;"),
            Expr::binary(
                BinaryOp::Add,
                Expr::prefix(PrefixOp::Neg, var("a")),
                var("b"),
            )
        );
    }

    #[test]
    fn call_with_arguments() {
        assert_eq!(
            stmt("f(a, b + c, 1);"),
            Expr::Call {
                callee: "f".to_string(),
                args: vec![
                    var("a"),
                    Expr::binary(BinaryOp::Add, var("b"), var("c")),
                    Expr::Literal(1),
                ],
            }
        );
    }

    #[test]
    fn let_without_initialiser_defaults_to_zero() {
        assert_eq!(
            stmt("let x;"),
            Expr::Let {
                name: "x".to_string(),
                init: Box::new(Expr::Literal(0)),
            }
        );
    }

    #[test]
    fn if_without_semicolon() {
        let expr = stmt("if (a) { b; }");
        match expr {
            Expr::If { else_branch, .. } => assert!(else_branch.is_none()),
            expr => panic!("expected if, got {:?}", expr),
        }
    }

    #[test]
    fn else_if_chain() {
        let expr = stmt("if (a) { 1; } else if (b) { 2; } else { 3; }");
        match expr {
            Expr::If { else_branch, .. } => match else_branch.as_deref() {
                Some(Expr::If { else_branch, .. }) => {
                    assert!(matches!(else_branch.as_deref(), Some(Expr::Block(_))))
                }
                other => panic!("expected nested if, got {:?}", other),
            },
            expr => panic!("expected if, got {:?}", expr),
        }
    }

    #[test]
    fn if_as_expression() {
        let expr = stmt("let x = if (a) { 1; } else { 2; };");
        match expr {
            Expr::Let { init, .. } => assert!(matches!(*init, Expr::If { .. })),
            expr => panic!("expected let, got {:?}", expr),
        }
    }

    #[test]
    fn missing_operand_reports_expected_expression() {
        let result = parse_all("def f() {\n  1 + ;\n}");
        assert_eq!(
            result,
            Err(CompileError::UnexpectedToken {
                line: 2,
                expected: "expression".to_string(),
                found: "Semicolon/;".to_string(),
            })
        );
    }

    #[test]
    fn missing_semicolon_is_a_syntax_error() {
        let result = parse_all("def f() { 1 }");
        assert!(matches!(
            result,
            Err(CompileError::UnexpectedToken { ref expected, .. }) if expected == "semicolon"
        ));
    }

    #[test]
    fn two_operands_without_operator() {
        let result = parse_all("def f(a, b) { a b; }");
        assert!(matches!(
            result,
            Err(CompileError::UnexpectedToken { ref expected, .. }) if expected == "operator"
        ));
    }

    #[test]
    fn prefix_only_operator_is_not_binary() {
        let result = parse_all("def f(a, b) { a ~ b; }");
        assert!(matches!(
            result,
            Err(CompileError::UnexpectedToken { ref expected, .. }) if expected == "operator"
        ));
    }

    #[test]
    fn top_level_expression_is_rejected() {
        assert_eq!(
            parse_all("1 + 2;"),
            Err(CompileError::TopLevelExpression { line: 1 })
        );
    }

    #[test]
    fn else_requires_block_or_if() {
        let result = parse_all("def f(a) { if (a) { 1; } else 2; }");
        assert!(matches!(
            result,
            Err(CompileError::UnexpectedToken { ref expected, .. }) if expected == "opening brace"
        ));
    }

    #[test]
    fn unterminated_block_reports_closing_brace() {
        let result = parse_all("def f() { 1;");
        assert!(matches!(
            result,
            Err(CompileError::UnexpectedToken { ref expected, .. }) if expected == "closing brace"
        ));
    }
}
