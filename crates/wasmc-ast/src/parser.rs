//! Recursive-descent parser for the restricted surface grammar.
//!
//! Deliberately small: this is the host-AST boundary described in the
//! design notes, not a general JavaScript/TypeScript parser. Error
//! recovery is limited to skipping to the next statement boundary.

use crate::ast::*;
use crate::lexer::{Lexer, Token, TokenKind};
use wasmc_common::diagnostics::diagnostic_messages;
use wasmc_common::{Diagnostic, DiagnosticBag, Span};

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: &'a str,
    diagnostics: &'a mut DiagnosticBag,
}

/// Parse one source file's text into a [`SourceFile`], reporting syntax
/// errors into `diagnostics` as PreEmit diagnostics.
pub fn parse_source_file(source: &str, file: &str, diagnostics: &mut DiagnosticBag) -> SourceFile {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token();
        let is_eof = tok.kind == TokenKind::Eof && tok.span.is_empty();
        tokens.push(tok);
        if is_eof {
            break;
        }
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        file,
        diagnostics,
    };
    let statements = parser.parse_top_levels();
    SourceFile {
        path: file.to_string(),
        statements,
    }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn at_eof(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&mut self, message: &str, span: Span) {
        self.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNSUPPORTED_STATEMENT,
            self.file,
            span,
            &[message],
        ));
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Token {
        if self.check(kind) {
            self.advance()
        } else {
            let span = self.peek().span;
            self.error(&format!("expected {what}"), span);
            self.tokens[self.pos].clone()
        }
    }

    fn synchronize_to_statement_boundary(&mut self) {
        while !self.at_eof() {
            if self.eat(TokenKind::Semicolon) {
                return;
            }
            if self.check(TokenKind::RBrace) {
                return;
            }
            self.advance();
        }
    }

    fn parse_top_levels(&mut self) -> Vec<TopLevel> {
        let mut out = Vec::new();
        while !self.at_eof() {
            out.push(self.parse_top_level());
        }
        out
    }

    fn parse_top_level(&mut self) -> TopLevel {
        let start = self.peek().span.start;
        let exported = self.eat(TokenKind::Export);
        match self.peek_kind() {
            TokenKind::Function => TopLevel::Function(self.parse_function(exported, false)),
            TokenKind::Class => TopLevel::Class(self.parse_class(exported)),
            TokenKind::Enum => TopLevel::Enum(self.parse_enum(exported)),
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let decl = self.parse_variable_decl(exported);
                self.eat(TokenKind::Semicolon);
                TopLevel::Variable(decl)
            }
            TokenKind::Import | TokenKind::Interface | TokenKind::Type => {
                self.synchronize_to_statement_boundary();
                TopLevel::Ignored(Span::new(start, self.peek().span.start))
            }
            _ => {
                let span = self.peek().span;
                self.error("top-level declaration", span);
                self.synchronize_to_statement_boundary();
                TopLevel::Ignored(span)
            }
        }
    }

    fn parse_type_params(&mut self) -> Vec<TypeParam> {
        let mut params = Vec::new();
        if self.eat(TokenKind::Lt) {
            loop {
                let tok = self.expect(TokenKind::Identifier, "type parameter name");
                params.push(TypeParam {
                    name: tok.text.to_string(),
                    span: tok.span,
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt, "'>'");
        }
        params
    }

    /// Speculatively parse a `<Arg, ...>` list, restoring `pos` and reporting
    /// no diagnostics if it doesn't turn out to be one. Nested generics
    /// (`Array<Array<int>>`) are out of scope: the lexer merges `>>` into a
    /// single shift token, so only one level of `<...>` nesting parses.
    fn try_parse_type_args(&mut self) -> Option<Vec<TypeNode>> {
        let checkpoint = self.pos;
        if !self.check(TokenKind::Lt) {
            return None;
        }
        self.advance();
        let mut args = Vec::new();
        loop {
            match self.try_parse_type() {
                Some(ty) => args.push(ty),
                None => {
                    self.pos = checkpoint;
                    return None;
                }
            }
            if self.eat(TokenKind::Comma) {
                continue;
            }
            break;
        }
        if self.check(TokenKind::Gt) {
            self.advance();
            Some(args)
        } else {
            self.pos = checkpoint;
            None
        }
    }

    fn try_parse_type(&mut self) -> Option<TypeNode> {
        match self.peek_kind() {
            TokenKind::Void => Some(TypeNode::Void(self.advance().span)),
            TokenKind::Identifier => {
                let tok = self.advance();
                let type_args = self.try_parse_type_args().unwrap_or_default();
                Some(TypeNode::Named {
                    name: tok.text.to_string(),
                    type_args,
                    span: tok.span,
                })
            }
            _ => None,
        }
    }

    fn parse_type(&mut self) -> TypeNode {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Void => {
                self.advance();
                TypeNode::Void(tok.span)
            }
            TokenKind::Identifier => {
                self.advance();
                let type_args = self.try_parse_type_args().unwrap_or_default();
                TypeNode::Named {
                    name: tok.text.to_string(),
                    type_args,
                    span: tok.span,
                }
            }
            _ => {
                self.error("type", tok.span);
                TypeNode::Void(tok.span)
            }
        }
    }

    fn parse_params(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        self.expect(TokenKind::LParen, "'('");
        while !self.check(TokenKind::RParen) && !self.at_eof() {
            let name_tok = self.expect(TokenKind::Identifier, "parameter name");
            self.expect(TokenKind::Colon, "':'");
            let ty = self.parse_type();
            params.push(Param {
                name: name_tok.text.to_string(),
                ty,
                span: name_tok.span,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'");
        params
    }

    fn parse_function(&mut self, exported: bool, is_method: bool) -> FunctionDecl {
        let start = self.peek().span.start;
        self.expect(TokenKind::Function, "'function'");
        let name_tok = self.expect(TokenKind::Identifier, "function name");
        let mut name = name_tok.text.to_string();
        let mut import_qualifier = None;
        if self.eat(TokenKind::Dollar) {
            let base_tok = self.expect(TokenKind::Identifier, "import base name");
            import_qualifier = Some((name.clone(), base_tok.text.to_string()));
            name = format!("{name}${}", base_tok.text);
        }
        let type_params = if is_method { Vec::new() } else { self.parse_type_params() };
        let params = self.parse_params();
        self.expect(TokenKind::Colon, "':'");
        let return_type = self.parse_type();

        let (body, imported) = if self.eat(TokenKind::Semicolon) {
            (None, true)
        } else {
            let body = self.parse_block_statements();
            (Some(body), false)
        };

        FunctionDecl {
            name,
            type_params,
            params,
            return_type,
            body,
            exported,
            imported,
            import_qualifier,
            span: Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end),
        }
    }

    fn parse_class(&mut self, exported: bool) -> ClassDecl {
        let start = self.peek().span.start;
        self.expect(TokenKind::Class, "'class'");
        let name_tok = self.expect(TokenKind::Identifier, "class name");
        let type_params = self.parse_type_params();
        self.expect(TokenKind::LBrace, "'{'");
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            members.push(self.parse_class_member(&name_tok.text));
        }
        self.expect(TokenKind::RBrace, "'}'");
        ClassDecl {
            name: name_tok.text.to_string(),
            type_params,
            members,
            exported,
            span: Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end),
        }
    }

    fn parse_class_member(&mut self, class_name: &str) -> ClassMember {
        let start = self.peek().span;
        // `static` is not a reserved keyword in the lexer; treat the
        // identifier "static" specially here.
        let is_static = if self.check(TokenKind::Identifier) && self.peek().text.as_ref() == "static" {
            self.advance();
            true
        } else {
            false
        };

        if self.check(TokenKind::Identifier) && self.peek().text.as_ref() == class_name {
            // constructor: `ClassName(...)` with no leading `function`.
            let name_tok = self.advance();
            let params = self.parse_params();
            self.expect(TokenKind::Colon, "':'");
            let return_type = self.parse_type();
            let body = self.parse_block_statements();
            let decl = FunctionDecl {
                name: name_tok.text.to_string(),
                type_params: Vec::new(),
                params,
                return_type,
                body: Some(body),
                exported: false,
                imported: false,
                import_qualifier: None,
                span: name_tok.span,
            };
            return ClassMember {
                kind: MemberKind::Constructor,
                name: name_tok.text.to_string(),
                field_type: None,
                method: Some(decl),
                span: start,
            };
        }

        if self.check(TokenKind::Function) {
            let method = self.parse_function(false, true);
            let kind = if is_static {
                MemberKind::StaticMethod
            } else {
                MemberKind::Method
            };
            return ClassMember {
                kind,
                name: method.name.clone(),
                field_type: None,
                method: Some(method),
                span: start,
            };
        }

        // field
        let name_tok = self.expect(TokenKind::Identifier, "member name");
        self.expect(TokenKind::Colon, "':'");
        let ty = self.parse_type();
        self.eat(TokenKind::Semicolon);
        ClassMember {
            kind: MemberKind::Field,
            name: name_tok.text.to_string(),
            field_type: Some(ty),
            method: None,
            span: start,
        }
    }

    fn parse_enum(&mut self, exported: bool) -> EnumDecl {
        let start = self.peek().span.start;
        self.expect(TokenKind::Enum, "'enum'");
        let name_tok = self.expect(TokenKind::Identifier, "enum name");
        self.expect(TokenKind::LBrace, "'{'");
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let member_tok = self.expect(TokenKind::Identifier, "enum member name");
            let value = if self.eat(TokenKind::Eq) {
                Some(self.parse_expr())
            } else {
                None
            };
            members.push(EnumMember {
                name: member_tok.text.to_string(),
                value,
                span: member_tok.span,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'");
        EnumDecl {
            name: name_tok.text.to_string(),
            members,
            exported,
            span: Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end),
        }
    }

    fn parse_variable_decl(&mut self, exported: bool) -> VariableDecl {
        let start = self.peek().span.start;
        let kind = match self.advance().kind {
            TokenKind::Let => DeclKind::Let,
            TokenKind::Const => DeclKind::Const,
            _ => DeclKind::Var,
        };
        let name_tok = self.expect(TokenKind::Identifier, "variable name");
        let ty = if self.eat(TokenKind::Colon) {
            Some(self.parse_type())
        } else {
            None
        };
        let initializer = if self.eat(TokenKind::Eq) { Some(self.parse_expr()) } else { None };
        VariableDecl {
            kind,
            name: name_tok.text.to_string(),
            ty,
            initializer,
            exported,
            span: Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end),
        }
    }

    fn parse_block_statements(&mut self) -> Vec<Stmt> {
        self.expect(TokenKind::LBrace, "'{'");
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            stmts.push(self.parse_statement());
        }
        self.expect(TokenKind::RBrace, "'}'");
        stmts
    }

    fn parse_statement(&mut self) -> Stmt {
        let start = self.peek().span.start;
        match self.peek_kind() {
            TokenKind::LBrace => {
                let stmts = self.parse_block_statements();
                Stmt::Block(stmts, Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Break => {
                self.advance();
                let span = Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end);
                self.eat(TokenKind::Semicolon);
                Stmt::Break(span)
            }
            TokenKind::Continue => {
                self.advance();
                let span = Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end);
                self.eat(TokenKind::Semicolon);
                Stmt::Continue(span)
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semicolon) || self.check(TokenKind::RBrace) {
                    None
                } else {
                    Some(self.parse_expr())
                };
                let span = Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end);
                self.eat(TokenKind::Semicolon);
                Stmt::Return(value, span)
            }
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let decl = self.parse_variable_decl(false);
                self.eat(TokenKind::Semicolon);
                Stmt::Variable(decl)
            }
            TokenKind::Semicolon => {
                self.advance();
                Stmt::Block(Vec::new(), Span::new(start, start))
            }
            _ => {
                let expr = self.parse_expr();
                let span = Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end);
                self.eat(TokenKind::Semicolon);
                Stmt::Expr(expr, span)
            }
        }
    }

    fn parse_if(&mut self) -> Stmt {
        let start = self.peek().span.start;
        self.advance();
        self.expect(TokenKind::LParen, "'('");
        let cond = self.parse_expr();
        self.expect(TokenKind::RParen, "')'");
        let then_branch = Box::new(self.parse_statement());
        let else_branch = if self.eat(TokenKind::Else) {
            Some(Box::new(self.parse_statement()))
        } else {
            None
        };
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            span: Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end),
        }
    }

    fn parse_while(&mut self) -> Stmt {
        let start = self.peek().span.start;
        self.advance();
        self.expect(TokenKind::LParen, "'('");
        let cond = self.parse_expr();
        self.expect(TokenKind::RParen, "')'");
        let body = Box::new(self.parse_statement());
        Stmt::While {
            cond,
            body,
            span: Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end),
        }
    }

    fn parse_do_while(&mut self) -> Stmt {
        let start = self.peek().span.start;
        self.advance();
        let body = Box::new(self.parse_statement());
        self.expect(TokenKind::While, "'while'");
        self.expect(TokenKind::LParen, "'('");
        let cond = self.parse_expr();
        self.expect(TokenKind::RParen, "')'");
        self.eat(TokenKind::Semicolon);
        Stmt::DoWhile {
            body,
            cond,
            span: Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end),
        }
    }

    fn parse_for(&mut self) -> Stmt {
        let start = self.peek().span.start;
        self.advance();
        self.expect(TokenKind::LParen, "'('");
        let init = if self.check(TokenKind::Semicolon) {
            self.advance();
            None
        } else if matches!(self.peek_kind(), TokenKind::Let | TokenKind::Const | TokenKind::Var) {
            let decl = self.parse_variable_decl(false);
            self.expect(TokenKind::Semicolon, "';'");
            Some(Box::new(Stmt::Variable(decl)))
        } else {
            let expr = self.parse_expr();
            let span = expr.span();
            self.expect(TokenKind::Semicolon, "';'");
            Some(Box::new(Stmt::Expr(expr, span)))
        };
        let cond = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr())
        };
        self.expect(TokenKind::Semicolon, "';'");
        let update = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr())
        };
        self.expect(TokenKind::RParen, "')'");
        let body = Box::new(self.parse_statement());
        Stmt::For {
            init,
            cond,
            update,
            body,
            span: Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end),
        }
    }

    fn parse_switch(&mut self) -> Stmt {
        let start = self.peek().span.start;
        self.advance();
        self.expect(TokenKind::LParen, "'('");
        let discriminant = self.parse_expr();
        self.expect(TokenKind::RParen, "')'");
        self.expect(TokenKind::LBrace, "'{'");
        let mut cases = Vec::new();
        while matches!(self.peek_kind(), TokenKind::Case | TokenKind::Default) {
            let case_start = self.peek().span.start;
            let test = if self.eat(TokenKind::Case) {
                let expr = self.parse_expr();
                Some(expr)
            } else {
                self.advance(); // default
                None
            };
            self.expect(TokenKind::Colon, "':'");
            let mut body = Vec::new();
            while !matches!(self.peek_kind(), TokenKind::Case | TokenKind::Default | TokenKind::RBrace) && !self.at_eof() {
                body.push(self.parse_statement());
            }
            cases.push(SwitchCase {
                test,
                body,
                span: Span::new(case_start, self.tokens[self.pos.saturating_sub(1)].span.end),
            });
        }
        self.expect(TokenKind::RBrace, "'}'");
        Stmt::Switch {
            discriminant,
            cases,
            span: Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end),
        }
    }

    // Expression grammar, precedence climbing from assignment downward.

    fn parse_expr(&mut self) -> Expr {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Expr {
        let target = self.parse_conditional();
        if self.check(TokenKind::Eq) {
            self.advance();
            let value = self.parse_assignment();
            let span = target.span().merge(value.span());
            return Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
                span,
            };
        }
        target
    }

    fn parse_conditional(&mut self) -> Expr {
        let cond = self.parse_logical_or();
        if self.eat(TokenKind::Question) {
            let then_expr = self.parse_assignment();
            self.expect(TokenKind::Colon, "':'");
            let else_expr = self.parse_assignment();
            let span = cond.span().merge(else_expr.span());
            return Expr::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
                span,
            };
        }
        cond
    }

    fn parse_logical_or(&mut self) -> Expr {
        let mut left = self.parse_logical_and();
        while self.eat(TokenKind::PipePipe) {
            let right = self.parse_logical_and();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op: BinaryOp::LogicalOr,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_logical_and(&mut self) -> Expr {
        let mut left = self.parse_bitor();
        while self.eat(TokenKind::AmpAmp) {
            let right = self.parse_bitor();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op: BinaryOp::LogicalAnd,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_bitor(&mut self) -> Expr {
        let mut left = self.parse_bitxor();
        while self.check(TokenKind::Pipe) {
            self.advance();
            let right = self.parse_bitxor();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op: BinaryOp::BitOr,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_bitxor(&mut self) -> Expr {
        let mut left = self.parse_bitand();
        while self.eat(TokenKind::Caret) {
            let right = self.parse_bitand();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op: BinaryOp::BitXor,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_bitand(&mut self) -> Expr {
        let mut left = self.parse_equality();
        while self.check(TokenKind::Amp) {
            self.advance();
            let right = self.parse_equality();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op: BinaryOp::BitAnd,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_equality(&mut self) -> Expr {
        let mut left = self.parse_relational();
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq | TokenKind::EqEqEq => BinaryOp::Eq,
                TokenKind::BangEq | TokenKind::BangEqEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_relational(&mut self) -> Expr {
        let mut left = self.parse_shift();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::GtEq => BinaryOp::GtEq,
                TokenKind::As => {
                    self.advance();
                    let ty = self.parse_type();
                    let span = left.span().merge(ty.span());
                    left = Expr::Cast {
                        expr: Box::new(left),
                        ty,
                        span,
                    };
                    continue;
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_shift();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_shift(&mut self) -> Expr {
        let mut left = self.parse_additive();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::ShrS => BinaryOp::ShrSigned,
                TokenKind::ShrU => BinaryOp::ShrUnsigned,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary();
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.peek().span;
        let op = match self.peek_kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus => Some(UnaryOp::PreIncrement),
            TokenKind::MinusMinus => Some(UnaryOp::PreDecrement),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary();
            let span = start.merge(operand.span());
            return Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            };
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_call_or_member();
        loop {
            let op = match self.peek_kind() {
                TokenKind::PlusPlus => Some(UnaryOp::PostIncrement),
                TokenKind::MinusMinus => Some(UnaryOp::PostDecrement),
                _ => None,
            };
            if let Some(op) = op {
                let end = self.advance().span;
                let span = expr.span().merge(end);
                expr = Expr::Unary {
                    op,
                    operand: Box::new(expr),
                    span,
                };
                continue;
            }
            break;
        }
        expr
    }

    fn parse_call_or_member(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name_tok = self.expect(TokenKind::Identifier, "member name");
                    let span = expr.span().merge(name_tok.span);
                    expr = Expr::Property {
                        base: Box::new(expr),
                        name: name_tok.text.to_string(),
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr();
                    let end_tok = self.expect(TokenKind::RBracket, "']'");
                    let span = expr.span().merge(end_tok.span);
                    expr = Expr::Element {
                        base: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                TokenKind::LParen => {
                    let args = self.parse_args();
                    let end = self.tokens[self.pos.saturating_sub(1)].span;
                    let span = expr.span().merge(end);
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        type_args: Vec::new(),
                        span,
                    };
                }
                TokenKind::Lt if matches!(expr, Expr::Identifier(_, _)) => {
                    let checkpoint = self.pos;
                    let mut generic_call = None;
                    if let Some(type_args) = self.try_parse_type_args() {
                        if self.check(TokenKind::LParen) {
                            let args = self.parse_args();
                            let end = self.tokens[self.pos.saturating_sub(1)].span;
                            let span = expr.span().merge(end);
                            generic_call = Some((args, type_args, span));
                        }
                    }
                    match generic_call {
                        Some((args, type_args, span)) => {
                            expr = Expr::Call {
                                callee: Box::new(expr),
                                args,
                                type_args,
                                span,
                            };
                        }
                        None => {
                            self.pos = checkpoint;
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_args(&mut self) -> Vec<Expr> {
        self.expect(TokenKind::LParen, "'('");
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) && !self.at_eof() {
            args.push(self.parse_expr());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'");
        args
    }

    fn parse_primary(&mut self) -> Expr {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                Expr::Literal(Literal::Number(tok.text.to_string()), tok.span)
            }
            TokenKind::True => {
                self.advance();
                Expr::Literal(Literal::Bool(true), tok.span)
            }
            TokenKind::False => {
                self.advance();
                Expr::Literal(Literal::Bool(false), tok.span)
            }
            TokenKind::Null => {
                self.advance();
                Expr::Literal(Literal::Null, tok.span)
            }
            TokenKind::New => {
                self.advance();
                let name_tok = self.expect(TokenKind::Identifier, "class name");
                let type_args = self.try_parse_type_args().unwrap_or_default();
                let args = self.parse_args();
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                Expr::New {
                    class_name: name_tok.text.to_string(),
                    args,
                    type_args,
                    span: tok.span.merge(end),
                }
            }
            TokenKind::Identifier => {
                self.advance();
                Expr::Identifier(tok.text.to_string(), tok.span)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr();
                let end_tok = self.expect(TokenKind::RParen, "')'");
                Expr::Paren(Box::new(inner), tok.span.merge(end_tok.span))
            }
            _ => {
                self.error("expression", tok.span);
                self.advance();
                Expr::Literal(Literal::Null, tok.span)
            }
        }
    }
}
