//! Precedence-climbing parser.
//!
//! Operators dispatch through two tables: [`Parser::parse_prefix`] for a
//! token that starts an operand and [`Parser::parse_infix`] for a token that
//! follows one, with binding powers from [`infix_precedence`]. Syntax errors
//! are collected rather than fatal; the parser keeps going and returns the
//! best tree it could build.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::ast::*;
use crate::error::{ParseError, XPathError};
use crate::lexer::{Lexer, comment_len, is_ncname, unescape_string};
use crate::token::{Precedence, Token, TokenKind, infix_precedence};

/// Deepest operand nesting accepted before the parser gives up on a branch.
const MAX_NESTING: usize = 128;

/// Parses `source`, returning the tree and every syntax error found.
pub fn parse(source: &str) -> (Expr, Vec<ParseError>) {
    let mut parser = Parser::new(source);
    let expr = parser.parse_program();
    (expr, parser.errors)
}

/// Parses `source`, failing if any syntax error was found.
pub fn parse_expression(source: &str) -> Result<Expr, XPathError> {
    let (expr, errors) = parse(source);
    if errors.is_empty() {
        Ok(expr)
    } else {
        log::debug!("{} parse error(s) in '{}'", errors.len(), source);
        Err(XPathError::Parse {
            expression: source.to_string(),
            errors,
        })
    }
}

struct Parser<'s> {
    source: &'s str,
    lexer: Lexer<'s>,
    current: Token<'s>,
    lookahead: VecDeque<Token<'s>>,
    errors: Vec<ParseError>,
    depth: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            source,
            lexer,
            current,
            lookahead: VecDeque::new(),
            errors: Vec::new(),
            depth: 0,
        }
    }

    // --- token plumbing ---

    fn advance(&mut self) -> Token<'s> {
        let next = self
            .lookahead
            .pop_front()
            .unwrap_or_else(|| self.lexer.next_token());
        std::mem::replace(&mut self.current, next)
    }

    /// The `n`th token after the current one.
    fn peek(&mut self, n: usize) -> Token<'s> {
        while self.lookahead.len() <= n {
            let token = self.lexer.next_token();
            self.lookahead.push_back(token);
        }
        self.lookahead[n]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error(what);
            false
        }
    }

    fn expect_word(&mut self, word: &str) -> bool {
        if self.current.is_word(word) {
            self.advance();
            true
        } else {
            self.error(&format!("'{}'", word));
            false
        }
    }

    fn error(&mut self, expected: &str) {
        let offset = self.current.offset;
        if self.errors.last().is_some_and(|e| e.offset == offset) {
            return;
        }
        let got = match self.current.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => self.current.literal.to_string(),
        };
        self.errors.push(ParseError {
            expected: expected.to_string(),
            got,
            offset,
        });
    }

    // --- expressions ---

    fn parse_program(&mut self) -> Expr {
        if self.at(TokenKind::Eof) {
            self.error("expression");
            return Expr::empty_sequence();
        }
        let expr = self.parse_expr();
        if !self.at(TokenKind::Eof) {
            self.error("end of input");
        }
        expr
    }

    /// `ExprSingle ("," ExprSingle)*`
    fn parse_expr(&mut self) -> Expr {
        let first = self.parse_single();
        if !self.at(TokenKind::Comma) {
            return first;
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            items.push(self.parse_single());
        }
        Expr::sequence(items)
    }

    fn parse_single(&mut self) -> Expr {
        self.parse_precedence(Precedence::Comma)
    }

    /// Runs `parse` one level deeper, or records an error and returns
    /// `fallback` once [`MAX_NESTING`] is reached.
    fn nested<T>(&mut self, fallback: T, parse: impl FnOnce(&mut Self) -> T) -> T {
        if self.depth >= MAX_NESTING {
            self.error("shallower nesting");
            return fallback;
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_precedence(&mut self, min: Precedence) -> Expr {
        self.nested(Expr::empty_sequence(), |p| {
            let mut left = p.parse_prefix();
            while let Some(precedence) = infix_precedence(&p.current) {
                if precedence <= min {
                    break;
                }
                left = p.parse_infix(left, precedence);
            }
            left
        })
    }

    fn parse_prefix(&mut self) -> Expr {
        let token = self.current;
        match token.kind {
            TokenKind::Integer => {
                self.advance();
                self.integer_literal(token)
            }
            TokenKind::Decimal => {
                self.advance();
                self.decimal_literal(token)
            }
            TokenKind::Double => {
                self.advance();
                match token.literal.parse::<f64>() {
                    Ok(d) => Expr::Double(d),
                    Err(_) => {
                        self.error_at(token, "double literal");
                        Expr::Double(f64::NAN)
                    }
                }
            }
            TokenKind::String => {
                self.advance();
                Expr::String(unescape_string(token.literal))
            }
            TokenKind::Dollar => {
                self.advance();
                Expr::Variable(self.parse_qname("variable name"))
            }
            TokenKind::LParen => self.parse_parenthesized(),
            TokenKind::LBracket => self.parse_square_array(),
            TokenKind::Dot => {
                self.advance();
                Expr::ContextItem
            }
            TokenKind::DotDot => {
                self.advance();
                let step = Step {
                    axis: Axis::Parent,
                    test: NodeTest::Kind(KindTest::AnyNode),
                    predicates: self.parse_predicates(),
                };
                Expr::Step(step)
            }
            TokenKind::At => {
                self.advance();
                self.parse_step(Axis::Attribute)
            }
            TokenKind::Slash => {
                self.advance();
                if starts_relative_path(&self.current) {
                    Expr::RootPath(Some(Box::new(self.parse_precedence(Precedence::Path))))
                } else {
                    Expr::RootPath(None)
                }
            }
            TokenKind::DoubleSlash => {
                self.advance();
                let rest = self.parse_precedence(Precedence::Path);
                Expr::RootPath(Some(Box::new(Expr::Path {
                    left: Box::new(Expr::descendant_or_self()),
                    right: Box::new(rest),
                })))
            }
            TokenKind::Minus | TokenKind::Plus => {
                self.advance();
                let op = if token.kind == TokenKind::Minus {
                    UnaryOp::Minus
                } else {
                    UnaryOp::Plus
                };
                let operand = self.parse_precedence(Precedence::Unary);
                Expr::Unary {
                    op,
                    operand: Box::new(operand),
                }
            }
            TokenKind::Question => {
                self.advance();
                Expr::UnaryLookup(self.parse_lookup_key())
            }
            TokenKind::Star => self.parse_step(Axis::Child),
            TokenKind::Name => self.parse_name_start(),
            _ => {
                self.error("expression");
                if !matches!(
                    token.kind,
                    TokenKind::Eof
                        | TokenKind::RParen
                        | TokenKind::RBracket
                        | TokenKind::RBrace
                        | TokenKind::Comma
                ) {
                    self.advance();
                }
                Expr::empty_sequence()
            }
        }
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> Expr {
        let token = self.advance();
        let boxed = Box::new(left);
        match token.kind {
            TokenKind::Plus => self.arithmetic(ArithmeticOp::Add, boxed, precedence),
            TokenKind::Minus => self.arithmetic(ArithmeticOp::Sub, boxed, precedence),
            TokenKind::Star => self.arithmetic(ArithmeticOp::Mul, boxed, precedence),
            TokenKind::Eq => self.comparison(Comparison::General(CompareOp::Eq), boxed, precedence),
            TokenKind::NotEq => {
                self.comparison(Comparison::General(CompareOp::Ne), boxed, precedence)
            }
            TokenKind::Lt => self.comparison(Comparison::General(CompareOp::Lt), boxed, precedence),
            TokenKind::Le => self.comparison(Comparison::General(CompareOp::Le), boxed, precedence),
            TokenKind::Gt => self.comparison(Comparison::General(CompareOp::Gt), boxed, precedence),
            TokenKind::Ge => self.comparison(Comparison::General(CompareOp::Ge), boxed, precedence),
            TokenKind::Precedes => {
                self.comparison(Comparison::Node(NodeComparison::Precedes), boxed, precedence)
            }
            TokenKind::Follows => {
                self.comparison(Comparison::Node(NodeComparison::Follows), boxed, precedence)
            }
            TokenKind::Concat => Expr::Concat {
                left: boxed,
                right: Box::new(self.parse_precedence(precedence)),
            },
            TokenKind::Pipe => self.set_op(SetOp::Union, boxed, precedence),
            TokenKind::Bang => Expr::SimpleMap {
                left: boxed,
                right: Box::new(self.parse_precedence(precedence)),
            },
            TokenKind::Slash => Expr::Path {
                left: boxed,
                right: Box::new(self.parse_precedence(precedence)),
            },
            TokenKind::DoubleSlash => Expr::Path {
                left: Box::new(Expr::Path {
                    left: boxed,
                    right: Box::new(Expr::descendant_or_self()),
                }),
                right: Box::new(self.parse_precedence(precedence)),
            },
            TokenKind::Arrow => self.parse_arrow(boxed),
            TokenKind::LBracket => {
                let predicate = self.parse_expr();
                self.expect(TokenKind::RBracket, "']'");
                push_postfix(*boxed, PostfixOp::Predicate(predicate))
            }
            TokenKind::LParen => {
                let args = self.parse_arguments();
                push_postfix(*boxed, PostfixOp::Call(args))
            }
            TokenKind::Question => {
                let key = self.parse_lookup_key();
                push_postfix(*boxed, PostfixOp::Lookup(key))
            }
            TokenKind::Name => self.parse_word_infix(token, boxed, precedence),
            _ => {
                self.error_at(token, "operator");
                *boxed
            }
        }
    }

    fn parse_word_infix(&mut self, token: Token<'s>, left: Box<Expr>, precedence: Precedence) -> Expr {
        match token.literal {
            "or" => self.logical(LogicalOp::Or, left, precedence),
            "and" => self.logical(LogicalOp::And, left, precedence),
            "eq" => self.comparison(Comparison::Value(CompareOp::Eq), left, precedence),
            "ne" => self.comparison(Comparison::Value(CompareOp::Ne), left, precedence),
            "lt" => self.comparison(Comparison::Value(CompareOp::Lt), left, precedence),
            "le" => self.comparison(Comparison::Value(CompareOp::Le), left, precedence),
            "gt" => self.comparison(Comparison::Value(CompareOp::Gt), left, precedence),
            "ge" => self.comparison(Comparison::Value(CompareOp::Ge), left, precedence),
            "is" => self.comparison(Comparison::Node(NodeComparison::Is), left, precedence),
            "to" => Expr::Range {
                start: left,
                end: Box::new(self.parse_precedence(precedence)),
            },
            "div" => self.arithmetic(ArithmeticOp::Div, left, precedence),
            "idiv" => self.arithmetic(ArithmeticOp::IDiv, left, precedence),
            "mod" => self.arithmetic(ArithmeticOp::Mod, left, precedence),
            "union" => self.set_op(SetOp::Union, left, precedence),
            "intersect" => self.set_op(SetOp::Intersect, left, precedence),
            "except" => self.set_op(SetOp::Except, left, precedence),
            "instance" => {
                self.expect_word("of");
                Expr::InstanceOf {
                    expr: left,
                    ty: self.parse_sequence_type(),
                }
            }
            "treat" => {
                self.expect_word("as");
                Expr::TreatAs {
                    expr: left,
                    ty: self.parse_sequence_type(),
                }
            }
            "castable" => {
                self.expect_word("as");
                Expr::CastableAs {
                    expr: left,
                    ty: self.parse_single_type(),
                }
            }
            "cast" => {
                self.expect_word("as");
                Expr::CastAs {
                    expr: left,
                    ty: self.parse_single_type(),
                }
            }
            _ => {
                self.error_at(token, "operator");
                *left
            }
        }
    }

    fn arithmetic(&mut self, op: ArithmeticOp, left: Box<Expr>, precedence: Precedence) -> Expr {
        Expr::Arithmetic {
            op,
            left,
            right: Box::new(self.parse_precedence(precedence)),
        }
    }

    fn comparison(&mut self, op: Comparison, left: Box<Expr>, precedence: Precedence) -> Expr {
        Expr::Comparison {
            op,
            left,
            right: Box::new(self.parse_precedence(precedence)),
        }
    }

    fn logical(&mut self, op: LogicalOp, left: Box<Expr>, precedence: Precedence) -> Expr {
        Expr::Logical {
            op,
            left,
            right: Box::new(self.parse_precedence(precedence)),
        }
    }

    fn set_op(&mut self, op: SetOp, left: Box<Expr>, precedence: Precedence) -> Expr {
        Expr::SetOp {
            op,
            left,
            right: Box::new(self.parse_precedence(precedence)),
        }
    }

    // --- primaries ---

    fn integer_literal(&mut self, token: Token<'s>) -> Expr {
        if let Ok(i) = token.literal.parse::<i64>() {
            return Expr::Integer(i);
        }
        match Decimal::from_str(token.literal) {
            Ok(d) => Expr::Decimal(d),
            Err(_) => {
                self.error_at(token, "integer literal in range");
                Expr::Integer(0)
            }
        }
    }

    fn decimal_literal(&mut self, token: Token<'s>) -> Expr {
        let mut text = token.literal.to_string();
        if text.starts_with('.') {
            text.insert(0, '0');
        }
        if text.ends_with('.') {
            text.push('0');
        }
        match Decimal::from_str(&text) {
            Ok(d) => Expr::Decimal(d),
            Err(_) => {
                self.error_at(token, "decimal literal in range");
                Expr::Decimal(Decimal::ZERO)
            }
        }
    }

    /// `( ... )`: a bracket scan of the raw source decides between a
    /// grouped expression and a sequence before anything is parsed.
    fn parse_parenthesized(&mut self) -> Expr {
        let open = self.advance();
        if self.eat(TokenKind::RParen) {
            return Expr::empty_sequence();
        }
        let source = self.source;
        let inner = &source[open.offset + open.literal.len()..];
        let expr = if has_top_level_comma(inner) {
            let mut items = vec![self.parse_single()];
            while self.eat(TokenKind::Comma) {
                items.push(self.parse_single());
            }
            Expr::sequence(items)
        } else {
            self.parse_single()
        };
        self.expect(TokenKind::RParen, "')'");
        expr
    }

    fn parse_square_array(&mut self) -> Expr {
        self.advance();
        let mut members = Vec::new();
        if !self.eat(TokenKind::RBracket) {
            loop {
                members.push(self.parse_single());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBracket, "']'");
        }
        Expr::Array(ArrayConstructor::Square(members))
    }

    /// Parses an argument list whose `(` has already been consumed.
    fn parse_arguments(&mut self) -> Vec<Argument> {
        let mut args = Vec::new();
        if self.eat(TokenKind::RParen) {
            return args;
        }
        loop {
            let next = self.peek(0).kind;
            if self.at(TokenKind::Question) && matches!(next, TokenKind::Comma | TokenKind::RParen) {
                self.advance();
                args.push(Argument::Placeholder);
            } else {
                args.push(Argument::Expr(self.parse_single()));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'");
        args
    }

    fn parse_lookup_key(&mut self) -> LookupKey {
        let token = self.current;
        match token.kind {
            TokenKind::Name => {
                self.advance();
                LookupKey::Name(token.literal.to_string())
            }
            TokenKind::Integer => {
                self.advance();
                match token.literal.parse::<i64>() {
                    Ok(i) => LookupKey::Integer(i),
                    Err(_) => {
                        self.error_at(token, "integer key in range");
                        LookupKey::Integer(0)
                    }
                }
            }
            TokenKind::LParen => LookupKey::Expr(Box::new(self.parse_parenthesized())),
            TokenKind::Star => {
                self.advance();
                LookupKey::Wildcard
            }
            _ => {
                self.error("lookup key");
                LookupKey::Wildcard
            }
        }
    }

    fn parse_arrow(&mut self, base: Box<Expr>) -> Expr {
        let target = match self.current.kind {
            TokenKind::Name => ArrowTarget::Name(self.parse_qname("function name")),
            TokenKind::Dollar => {
                self.advance();
                ArrowTarget::Dynamic(Box::new(Expr::Variable(self.parse_qname("variable name"))))
            }
            TokenKind::LParen => ArrowTarget::Dynamic(Box::new(self.parse_parenthesized())),
            _ => {
                self.error("function after '=>'");
                return *base;
            }
        };
        let args = if self.expect(TokenKind::LParen, "'('") {
            self.parse_arguments()
        } else {
            Vec::new()
        };
        Expr::Arrow { base, target, args }
    }

    /// A name in operand position: a control keyword, a constructor, a
    /// function call or reference, an axis step or a plain name test.
    fn parse_name_start(&mut self) -> Expr {
        let word = self.current.literal;
        let next = self.peek(0).kind;
        match (word, next) {
            ("for", TokenKind::Dollar) => return self.parse_for(),
            ("let", TokenKind::Dollar) => return self.parse_let(),
            ("some", TokenKind::Dollar) => return self.parse_quantified(Quantifier::Some),
            ("every", TokenKind::Dollar) => return self.parse_quantified(Quantifier::Every),
            ("if", TokenKind::LParen) => return self.parse_if(),
            ("function", TokenKind::LParen) => return self.parse_inline_function(),
            ("map", TokenKind::LBrace) => return self.parse_map(),
            ("array", TokenKind::LBrace) => return self.parse_curly_array(),
            _ => {}
        }

        if next == TokenKind::ColonColon {
            let axis_token = self.advance();
            self.advance();
            return match Axis::from_name(axis_token.literal) {
                Some(axis) => self.parse_step(axis),
                None => {
                    self.error_at(axis_token, "axis name");
                    self.parse_step(Axis::Child)
                }
            };
        }

        if next == TokenKind::LParen && KindTest::from_keyword(word).is_some() {
            return self.parse_step(Axis::Child);
        }

        let start = self.current;
        let text = self.scan_name();
        match self.current.kind {
            TokenKind::LParen => {
                self.advance();
                let name = self.qname_from(start, text);
                let args = self.parse_arguments();
                Expr::FunctionCall { name, args }
            }
            TokenKind::Hash => {
                self.advance();
                let name = self.qname_from(start, text);
                let arity_token = self.advance();
                let arity = match arity_token.literal.parse::<usize>() {
                    Ok(n) if arity_token.kind == TokenKind::Integer => n,
                    _ => {
                        self.error_at(arity_token, "arity");
                        0
                    }
                };
                Expr::NamedFunctionRef { name, arity }
            }
            _ => {
                let test = self.name_test_from(start, text);
                Expr::Step(Step {
                    axis: Axis::Child,
                    test,
                    predicates: self.parse_predicates(),
                })
            }
        }
    }

    /// Parses `test[pred]...` for an explicit or abbreviated axis.
    fn parse_step(&mut self, axis: Axis) -> Expr {
        let test = self.parse_node_test();
        let axis = match (&test, axis) {
            (NodeTest::Kind(KindTest::Attribute(_)), Axis::Child) => Axis::Attribute,
            _ => axis,
        };
        Expr::Step(Step {
            axis,
            test,
            predicates: self.parse_predicates(),
        })
    }

    fn parse_node_test(&mut self) -> NodeTest {
        let kind = self.current.kind;
        match kind {
            TokenKind::Name
                if self.peek(0).kind == TokenKind::LParen
                    && KindTest::from_keyword(self.current.literal).is_some() =>
            {
                NodeTest::Kind(self.parse_kind_test())
            }
            TokenKind::Name | TokenKind::Star => {
                let start = self.current;
                let text = self.scan_name();
                self.name_test_from(start, text)
            }
            _ => {
                self.error("node test");
                NodeTest::Kind(KindTest::AnyNode)
            }
        }
    }

    fn parse_predicates(&mut self) -> Vec<Expr> {
        let mut predicates = Vec::new();
        while self.eat(TokenKind::LBracket) {
            predicates.push(self.parse_expr());
            self.expect(TokenKind::RBracket, "']'");
        }
        predicates
    }

    /// `keyword( ... )` for the node kind tests.
    fn parse_kind_test(&mut self) -> KindTest {
        let keyword = self.advance();
        self.advance();
        let test = match keyword.literal {
            "element" | "attribute" => {
                let name = match self.current.kind {
                    TokenKind::Star => {
                        self.advance();
                        None
                    }
                    TokenKind::Name => Some(self.parse_qname("element or attribute name")),
                    _ => None,
                };
                // A type annotation is accepted and ignored.
                if self.eat(TokenKind::Comma) {
                    self.parse_qname("type name");
                    self.eat(TokenKind::Question);
                }
                if keyword.literal == "element" {
                    KindTest::Element(name)
                } else {
                    KindTest::Attribute(name)
                }
            }
            "processing-instruction" => {
                let target = match self.current.kind {
                    TokenKind::Name => Some(self.advance().literal.to_string()),
                    TokenKind::String => Some(unescape_string(self.advance().literal)),
                    _ => None,
                };
                KindTest::ProcessingInstruction(target)
            }
            "document-node" => {
                if self.at(TokenKind::Name) && self.peek(0).kind == TokenKind::LParen {
                    self.nested(KindTest::AnyNode, Self::parse_kind_test);
                }
                KindTest::Document
            }
            other => KindTest::from_keyword(other).unwrap_or(KindTest::AnyNode),
        };
        self.expect(TokenKind::RParen, "')'");
        test
    }

    // --- control forms and constructors ---

    fn parse_bindings(&mut self, assign: bool) -> Vec<Binding> {
        let mut bindings = Vec::new();
        loop {
            self.expect(TokenKind::Dollar, "'$'");
            let name = self.parse_qname("variable name");
            if assign {
                self.expect(TokenKind::Assign, "':='");
            } else {
                self.expect_word("in");
            }
            let value = self.parse_single();
            bindings.push(Binding { name, value });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        bindings
    }

    fn parse_for(&mut self) -> Expr {
        self.advance();
        let bindings = self.parse_bindings(false);
        self.expect_word("return");
        let body = self.parse_precedence(Precedence::Control);
        Expr::For {
            bindings,
            body: Box::new(body),
        }
    }

    fn parse_let(&mut self) -> Expr {
        self.advance();
        let bindings = self.parse_bindings(true);
        self.expect_word("return");
        let body = self.parse_precedence(Precedence::Control);
        Expr::Let {
            bindings,
            body: Box::new(body),
        }
    }

    fn parse_quantified(&mut self, quantifier: Quantifier) -> Expr {
        self.advance();
        let bindings = self.parse_bindings(false);
        self.expect_word("satisfies");
        let satisfies = self.parse_precedence(Precedence::Control);
        Expr::Quantified {
            quantifier,
            bindings,
            satisfies: Box::new(satisfies),
        }
    }

    fn parse_if(&mut self) -> Expr {
        self.advance();
        self.expect(TokenKind::LParen, "'('");
        let condition = self.parse_expr();
        self.expect(TokenKind::RParen, "')'");
        self.expect_word("then");
        let then_branch = self.parse_precedence(Precedence::Control);
        self.expect_word("else");
        let else_branch = self.parse_precedence(Precedence::Control);
        Expr::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    fn parse_inline_function(&mut self) -> Expr {
        self.advance();
        self.advance();
        let mut params = Vec::new();
        if !self.eat(TokenKind::RParen) {
            loop {
                self.expect(TokenKind::Dollar, "'$'");
                let name = self.parse_qname("parameter name");
                let ty = if self.current.is_word("as") {
                    self.advance();
                    Some(self.parse_sequence_type())
                } else {
                    None
                };
                params.push(Param { name, ty });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')'");
        }
        let return_type = if self.current.is_word("as") {
            self.advance();
            Some(self.parse_sequence_type())
        } else {
            None
        };
        self.expect(TokenKind::LBrace, "'{'");
        let body = if self.at(TokenKind::RBrace) {
            Expr::empty_sequence()
        } else {
            self.parse_expr()
        };
        self.expect(TokenKind::RBrace, "'}'");
        Expr::InlineFunction {
            params,
            return_type,
            body: Arc::new(body),
        }
    }

    fn parse_map(&mut self) -> Expr {
        self.advance();
        self.advance();
        let mut entries = Vec::new();
        if !self.eat(TokenKind::RBrace) {
            loop {
                let key = self.parse_single();
                self.expect(TokenKind::Colon, "':'");
                let value = self.parse_single();
                entries.push(MapEntry { key, value });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBrace, "'}'");
        }
        Expr::Map(entries)
    }

    fn parse_curly_array(&mut self) -> Expr {
        self.advance();
        self.advance();
        let content = if self.at(TokenKind::RBrace) {
            Expr::empty_sequence()
        } else {
            self.parse_expr()
        };
        self.expect(TokenKind::RBrace, "'}'");
        Expr::Array(ArrayConstructor::Curly(Box::new(content)))
    }

    // --- types ---

    fn parse_sequence_type(&mut self) -> SequenceType {
        if self.current.is_word("empty-sequence") && self.peek(0).kind == TokenKind::LParen {
            self.advance();
            self.advance();
            self.expect(TokenKind::RParen, "')'");
            return SequenceType::Empty;
        }
        let item = self.parse_item_type();
        let occurrence = match self.current.kind {
            TokenKind::Question => Occurrence::Optional,
            TokenKind::Star => Occurrence::Many,
            TokenKind::Plus => Occurrence::OneOrMore,
            _ => Occurrence::One,
        };
        if occurrence != Occurrence::One {
            self.advance();
        }
        SequenceType::Items(item, occurrence)
    }

    fn parse_item_type(&mut self) -> ItemType {
        let token = self.current;
        if token.kind == TokenKind::LParen {
            self.advance();
            let inner = self.nested(ItemType::Item, Self::parse_item_type);
            self.expect(TokenKind::RParen, "')'");
            return inner;
        }
        if token.kind != TokenKind::Name {
            self.error("item type");
            return ItemType::Item;
        }
        if self.peek(0).kind == TokenKind::LParen {
            if KindTest::from_keyword(token.literal).is_some() {
                return ItemType::Kind(self.parse_kind_test());
            }
            let item = match token.literal {
                "item" => Some(ItemType::Item),
                "map" => Some(ItemType::Map),
                "array" => Some(ItemType::Array),
                "function" => Some(ItemType::Function),
                _ => None,
            };
            if let Some(item) = item {
                self.advance();
                self.skip_balanced_parens();
                if item == ItemType::Function && self.current.is_word("as") {
                    self.advance();
                    self.nested(SequenceType::Empty, Self::parse_sequence_type);
                }
                return item;
            }
        }
        let name = self.parse_qname("type name");
        match AtomicType::from_qname(&name) {
            Some(ty) => ItemType::Atomic(ty),
            None => {
                self.error_at(token, "atomic type");
                ItemType::Atomic(AtomicType::AnyAtomic)
            }
        }
    }

    fn parse_single_type(&mut self) -> SingleType {
        let token = self.current;
        let name = self.parse_qname("type name");
        let ty = AtomicType::from_qname(&name).unwrap_or_else(|| {
            self.error_at(token, "atomic type");
            AtomicType::AnyAtomic
        });
        let optional = self.eat(TokenKind::Question);
        SingleType { ty, optional }
    }

    /// Skips `( ... )` starting at the current `(`; type parameters of
    /// `map(...)`, `array(...)` and `function(...)` are not checked.
    fn skip_balanced_parens(&mut self) {
        let mut depth = 0usize;
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                TokenKind::Eof => {
                    self.error_at(token, "')'");
                    return;
                }
                _ => {}
            }
        }
    }

    // --- names ---

    /// Joins adjacent tokens into one qualified name or wildcard for as long
    /// as the text still reads as the start of a name, then consumes them.
    /// A trailing `:` is left in place for map entries such as `a:1`.
    fn scan_name(&mut self) -> &'s str {
        let source = self.source;
        let start = self.current;
        let mut count = 1;
        let mut taken = 1;
        let mut end = start.offset + start.literal.len();
        loop {
            let next = self.peek(count - 1);
            if next.space_before || next.kind == TokenKind::Eof {
                break;
            }
            let candidate = &source[start.offset..next.offset + next.literal.len()];
            if !is_name_prefix(candidate) {
                break;
            }
            count += 1;
            if !candidate.ends_with(':') {
                taken = count;
                end = start.offset + candidate.len();
            }
        }
        for _ in 0..taken {
            self.advance();
        }
        &source[start.offset..end]
    }

    fn parse_qname(&mut self, what: &str) -> QName {
        if !self.at(TokenKind::Name) {
            self.error(what);
            return QName::local("");
        }
        let start = self.current;
        let text = self.scan_name();
        self.qname_from(start, text)
    }

    fn qname_from(&mut self, start: Token<'s>, text: &str) -> QName {
        match QName::parse(text) {
            Ok(name) => name,
            Err(_) => {
                self.error_at(start, "qualified name");
                QName::local(text)
            }
        }
    }

    fn name_test_from(&mut self, start: Token<'s>, text: &str) -> NodeTest {
        if text == "*" {
            return NodeTest::Name(NameTest::Any);
        }
        if let Some(local) = text.strip_prefix("*:") {
            return NodeTest::Name(NameTest::AnyPrefix(local.to_string()));
        }
        if let Some(prefix) = text.strip_suffix(":*") {
            return NodeTest::Name(NameTest::AnyLocal(prefix.to_string()));
        }
        NodeTest::Name(NameTest::Name(self.qname_from(start, text)))
    }

    fn error_at(&mut self, token: Token<'s>, expected: &str) {
        self.errors.push(ParseError {
            expected: expected.to_string(),
            got: token.literal.to_string(),
            offset: token.offset,
        });
    }
}

fn push_postfix(base: Expr, op: PostfixOp) -> Expr {
    match base {
        Expr::Postfix { base, mut ops } => {
            ops.push(op);
            Expr::Postfix { base, ops }
        }
        other => Expr::Postfix {
            base: Box::new(other),
            ops: vec![op],
        },
    }
}

/// Tokens that can begin the relative path after a leading `/`.
fn starts_relative_path(token: &Token<'_>) -> bool {
    matches!(
        token.kind,
        TokenKind::Name | TokenKind::Star | TokenKind::At | TokenKind::Dot | TokenKind::DotDot
    )
}

/// Whether `text` could still grow into a name or wildcard name test.
fn is_name_prefix(text: &str) -> bool {
    if text == "*" || text == "*:" {
        return true;
    }
    if let Some(local) = text.strip_prefix("*:") {
        return is_ncname(local);
    }
    match text.split_once(':') {
        None => is_ncname(text),
        Some((prefix, local)) => {
            is_ncname(prefix) && (local.is_empty() || local == "*" || is_ncname(local))
        }
    }
}

/// Scans raw source up to the `)` closing the current group and reports
/// whether a comma occurs at its top level. Nested brackets, strings and
/// comments are skipped.
fn has_top_level_comma(text: &str) -> bool {
    let mut depth = 0usize;
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        if rest.starts_with("(:") {
            pos += comment_len(rest);
            continue;
        }
        let Some(c) = rest.chars().next() else {
            break;
        };
        pos += c.len_utf8();
        match c {
            '"' | '\'' => pos += quoted_len(&text[pos..], c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            ',' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Length up to and including the closing quote, past doubled quotes.
fn quoted_len(text: &str, quote: char) -> usize {
    let mut pos = 0;
    while let Some(found) = text[pos..].find(quote) {
        pos += found + quote.len_utf8();
        if text[pos..].starts_with(quote) {
            pos += quote.len_utf8();
        } else {
            return pos;
        }
    }
    text.len()
}
