//! Recursive-descent / Pratt parser.
//!
//! Expressions are parsed with operator precedences
//! `or < and < comparisons < sum < product < prefix < postfix`, where `|`
//! and `^` sit at sum and `&`, `<<`, `>>` at product. Everything else is
//! straightforward recursive descent over the token stream.

use crate::cst::*;
use sable_common::{Diagnostic, ErrorKind, Fatal, Interner, SourceLocation};
use sable_scanner::{Lexer, Token, TokenKind};

/// Lex and parse a whole source file.
pub fn parse_module(source: &str, path: &str, interner: &mut Interner) -> Result<Module, Fatal> {
    let tokens = Lexer::new(source, path, interner).tokenize(interner)?;
    Parser::new(tokens, path).parse_module()
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Or,
    And,
    Compare,
    Sum,
    Product,
    Prefix,
    Postfix,
}

fn token_precedence(kind: &TokenKind) -> Precedence {
    match kind {
        TokenKind::Or => Precedence::Or,
        TokenKind::And => Precedence::And,
        TokenKind::Eq
        | TokenKind::Ne
        | TokenKind::Le
        | TokenKind::Lt
        | TokenKind::Ge
        | TokenKind::Gt => Precedence::Compare,
        TokenKind::Plus | TokenKind::Dash | TokenKind::Pipe | TokenKind::Caret => Precedence::Sum,
        TokenKind::Star
        | TokenKind::FSlash
        | TokenKind::Ampersand
        | TokenKind::Shl
        | TokenKind::Shr => Precedence::Product,
        TokenKind::LParen | TokenKind::LBracket | TokenKind::DotStar | TokenKind::Dot => {
            Precedence::Postfix
        }
        _ => Precedence::Lowest,
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    path: String,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, path: &str) -> Self {
        debug_assert!(matches!(
            tokens.last().map(|t| &t.kind),
            Some(TokenKind::Eof)
        ));
        Parser {
            tokens,
            pos: 0,
            path: path.to_owned(),
        }
    }

    // ===== Token machinery =====

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// True if the current token is of `kind`. A `]]` token counts as a `]`
    /// so nested index expressions like `a[b[i]]` parse without whitespace.
    fn check_current(&self, kind: &TokenKind) -> bool {
        let current = &self.current().kind;
        if current.matches(kind) {
            return true;
        }
        matches!(kind, TokenKind::RBracket) && matches!(current, TokenKind::RBracketRBracket)
    }

    fn check_peek(&self, kind: &TokenKind) -> bool {
        self.peek().kind.matches(kind)
    }

    fn expect_current(&mut self, kind: &TokenKind) -> Result<Token, Fatal> {
        if self.current().kind.matches(kind) {
            return Ok(self.advance());
        }
        // Split a `]]` in two when a single `]` is expected.
        if matches!(kind, TokenKind::RBracket)
            && matches!(self.current().kind, TokenKind::RBracketRBracket)
        {
            let location = self.current().location;
            self.tokens[self.pos] = Token {
                kind: TokenKind::RBracket,
                location,
            };
            return Ok(Token {
                kind: TokenKind::RBracket,
                location,
            });
        }
        Err(self.error(
            self.current().location,
            format!(
                "expected `{}` (found `{}`)",
                kind.as_str(),
                self.current().kind.as_str()
            ),
        ))
    }

    fn error(&self, location: SourceLocation, message: impl Into<String>) -> Fatal {
        Diagnostic::new(
            ErrorKind::Syntax,
            self.path.clone(),
            location.line,
            location.col,
            message,
        )
    }

    // ===== Module =====

    pub fn parse_module(mut self) -> Result<Module, Fatal> {
        let namespace = if self.check_current(&TokenKind::Namespace) {
            Some(self.parse_namespace()?)
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.check_current(&TokenKind::Import) {
            imports.push(self.parse_import()?);
        }

        let mut decls = Vec::new();
        while !self.check_current(&TokenKind::Eof) {
            decls.push(self.parse_decl()?);
        }

        Ok(Module {
            namespace,
            imports,
            decls,
        })
    }

    fn parse_namespace(&mut self) -> Result<Namespace, Fatal> {
        let location = self.expect_current(&TokenKind::Namespace)?.location;
        let mut identifiers = vec![self.parse_identifier()?];
        while !self.check_current(&TokenKind::Semicolon) {
            self.expect_current(&TokenKind::ColonColon)?;
            identifiers.push(self.parse_identifier()?);
        }
        self.expect_current(&TokenKind::Semicolon)?;
        Ok(Namespace {
            location,
            identifiers,
        })
    }

    fn parse_import(&mut self) -> Result<Import, Fatal> {
        let location = self.expect_current(&TokenKind::Import)?.location;
        let path = match self.current().kind.clone() {
            TokenKind::Bytes(path) => {
                self.advance();
                path
            }
            kind => {
                return Err(self.error(
                    self.current().location,
                    format!("expected import path (found `{}`)", kind.as_str()),
                ));
            }
        };
        self.expect_current(&TokenKind::Semicolon)?;
        Ok(Import { location, path })
    }

    // ===== Declarations =====

    fn parse_decl(&mut self) -> Result<Decl, Fatal> {
        match self.current().kind {
            TokenKind::Var => self.parse_decl_variable(),
            TokenKind::Const => self.parse_decl_constant(),
            TokenKind::Func => self.parse_decl_function(),
            TokenKind::Struct => self.parse_decl_struct(),
            TokenKind::Extend => self.parse_decl_extend(),
            TokenKind::Alias => self.parse_decl_alias(),
            TokenKind::Extern if self.check_peek(&TokenKind::Var) => {
                self.parse_decl_extern_variable()
            }
            TokenKind::Extern => self.parse_decl_extern_function(),
            _ => Err(self.error(
                self.current().location,
                format!(
                    "expected declaration (found `{}`)",
                    self.current().kind.as_str()
                ),
            )),
        }
    }

    fn parse_decl_variable(&mut self) -> Result<Decl, Fatal> {
        let location = self.expect_current(&TokenKind::Var)?.location;
        let identifier = self.parse_identifier()?;
        let typespec = if self.check_current(&TokenKind::Colon) {
            self.expect_current(&TokenKind::Colon)?;
            Some(self.parse_typespec()?)
        } else {
            None
        };
        self.expect_current(&TokenKind::Assign)?;
        let expr = self.parse_expr()?;
        self.expect_current(&TokenKind::Semicolon)?;
        Ok(Decl {
            location,
            name: identifier.name,
            kind: DeclKind::Variable {
                identifier,
                typespec,
                expr,
            },
        })
    }

    fn parse_decl_constant(&mut self) -> Result<Decl, Fatal> {
        let location = self.expect_current(&TokenKind::Const)?.location;
        let identifier = self.parse_identifier()?;
        let typespec = if self.check_current(&TokenKind::Colon) {
            self.expect_current(&TokenKind::Colon)?;
            Some(self.parse_typespec()?)
        } else {
            None
        };
        self.expect_current(&TokenKind::Assign)?;
        let expr = self.parse_expr()?;
        self.expect_current(&TokenKind::Semicolon)?;
        Ok(Decl {
            location,
            name: identifier.name,
            kind: DeclKind::Constant {
                identifier,
                typespec,
                expr,
            },
        })
    }

    fn parse_decl_function(&mut self) -> Result<Decl, Fatal> {
        let location = self.expect_current(&TokenKind::Func)?.location;
        let identifier = self.parse_identifier()?;
        let template_parameters = self.parse_template_parameter_list()?;
        self.expect_current(&TokenKind::LParen)?;
        let parameters = self.parse_function_parameter_list()?;
        self.expect_current(&TokenKind::RParen)?;
        let return_typespec = self.parse_typespec()?;
        let body = self.parse_block()?;
        Ok(Decl {
            location,
            name: identifier.name,
            kind: DeclKind::Function(FunctionDecl {
                identifier,
                template_parameters,
                parameters,
                return_typespec,
                body,
            }),
        })
    }

    fn parse_decl_struct(&mut self) -> Result<Decl, Fatal> {
        let location = self.expect_current(&TokenKind::Struct)?.location;
        let identifier = self.parse_identifier()?;
        let template_parameters = self.parse_template_parameter_list()?;
        self.expect_current(&TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check_current(&TokenKind::RBrace) {
            members.push(self.parse_member()?);
        }
        self.expect_current(&TokenKind::RBrace)?;
        Ok(Decl {
            location,
            name: identifier.name,
            kind: DeclKind::Struct(StructDecl {
                identifier,
                template_parameters,
                members,
            }),
        })
    }

    fn parse_decl_extend(&mut self) -> Result<Decl, Fatal> {
        let location = self.expect_current(&TokenKind::Extend)?.location;
        let typespec = self.parse_typespec()?;
        let decl = self.parse_decl()?;
        Ok(Decl {
            location,
            name: decl.name,
            kind: DeclKind::Extend {
                typespec,
                decl: Box::new(decl),
            },
        })
    }

    fn parse_decl_alias(&mut self) -> Result<Decl, Fatal> {
        let location = self.expect_current(&TokenKind::Alias)?.location;
        let identifier = self.parse_identifier()?;
        self.expect_current(&TokenKind::Assign)?;
        let typespec = self.parse_typespec()?;
        self.expect_current(&TokenKind::Semicolon)?;
        Ok(Decl {
            location,
            name: identifier.name,
            kind: DeclKind::Alias {
                identifier,
                typespec,
            },
        })
    }

    fn parse_decl_extern_variable(&mut self) -> Result<Decl, Fatal> {
        let location = self.expect_current(&TokenKind::Extern)?.location;
        self.expect_current(&TokenKind::Var)?;
        let identifier = self.parse_identifier()?;
        self.expect_current(&TokenKind::Colon)?;
        let typespec = self.parse_typespec()?;
        self.expect_current(&TokenKind::Semicolon)?;
        Ok(Decl {
            location,
            name: identifier.name,
            kind: DeclKind::ExternVariable {
                identifier,
                typespec,
            },
        })
    }

    fn parse_decl_extern_function(&mut self) -> Result<Decl, Fatal> {
        let location = self.expect_current(&TokenKind::Extern)?.location;
        self.expect_current(&TokenKind::Func)?;
        let identifier = self.parse_identifier()?;
        self.expect_current(&TokenKind::LParen)?;
        let parameters = self.parse_function_parameter_list()?;
        self.expect_current(&TokenKind::RParen)?;
        let return_typespec = self.parse_typespec()?;
        self.expect_current(&TokenKind::Semicolon)?;
        Ok(Decl {
            location,
            name: identifier.name,
            kind: DeclKind::ExternFunction {
                identifier,
                parameters,
                return_typespec,
            },
        })
    }

    fn parse_member(&mut self) -> Result<Member, Fatal> {
        let location = self.current().location;
        match self.current().kind {
            TokenKind::Var => {
                self.expect_current(&TokenKind::Var)?;
                let identifier = self.parse_identifier()?;
                self.expect_current(&TokenKind::Colon)?;
                let typespec = self.parse_typespec()?;
                self.expect_current(&TokenKind::Semicolon)?;
                Ok(Member {
                    location,
                    name: identifier.name,
                    kind: MemberKind::Variable { typespec },
                })
            }
            TokenKind::Const => {
                let decl = self.parse_decl_constant()?;
                Ok(Member {
                    location,
                    name: decl.name,
                    kind: MemberKind::Constant(Box::new(decl)),
                })
            }
            TokenKind::Func => {
                let decl = self.parse_decl_function()?;
                Ok(Member {
                    location,
                    name: decl.name,
                    kind: MemberKind::Function(Box::new(decl)),
                })
            }
            _ => Err(self.error(
                location,
                format!(
                    "expected member declaration (found `{}`)",
                    self.current().kind.as_str()
                ),
            )),
        }
    }

    fn parse_template_parameter_list(&mut self) -> Result<Vec<Identifier>, Fatal> {
        if !self.check_current(&TokenKind::LBracketLBracket) {
            return Ok(Vec::new());
        }
        let lbracket = self.expect_current(&TokenKind::LBracketLBracket)?;
        if self.check_current(&TokenKind::RBracketRBracket) {
            return Err(self.error(
                lbracket.location,
                "template parameter list contains zero template parameters",
            ));
        }
        let mut parameters = vec![self.parse_identifier()?];
        while self.check_current(&TokenKind::Comma) {
            self.expect_current(&TokenKind::Comma)?;
            parameters.push(self.parse_identifier()?);
        }
        self.expect_current(&TokenKind::RBracketRBracket)?;
        Ok(parameters)
    }

    fn parse_template_argument_list(&mut self) -> Result<Vec<TypeSpec>, Fatal> {
        let lbracket = self.expect_current(&TokenKind::LBracketLBracket)?;
        if self.check_current(&TokenKind::RBracketRBracket) {
            return Err(self.error(
                lbracket.location,
                "template argument list contains zero template arguments",
            ));
        }
        let mut arguments = vec![self.parse_typespec()?];
        while self.check_current(&TokenKind::Comma) {
            self.expect_current(&TokenKind::Comma)?;
            arguments.push(self.parse_typespec()?);
        }
        self.expect_current(&TokenKind::RBracketRBracket)?;
        Ok(arguments)
    }

    fn parse_function_parameter_list(&mut self) -> Result<Vec<FunctionParameter>, Fatal> {
        let mut parameters = Vec::new();
        while !self.check_current(&TokenKind::RParen) {
            if !parameters.is_empty() {
                self.expect_current(&TokenKind::Comma)?;
            }
            let identifier = self.parse_identifier()?;
            self.expect_current(&TokenKind::Colon)?;
            let typespec = self.parse_typespec()?;
            parameters.push(FunctionParameter {
                location: identifier.location,
                identifier,
                typespec,
            });
        }
        Ok(parameters)
    }

    // ===== Statements =====

    fn parse_block(&mut self) -> Result<Block, Fatal> {
        let location = self.expect_current(&TokenKind::LBrace)?.location;
        let mut stmts = Vec::new();
        while !self.check_current(&TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect_current(&TokenKind::RBrace)?;
        Ok(Block { location, stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, Fatal> {
        let location = self.current().location;
        match self.current().kind {
            TokenKind::Var
            | TokenKind::Const
            | TokenKind::Func
            | TokenKind::Struct
            | TokenKind::Extend
            | TokenKind::Alias
            | TokenKind::Extern => {
                let decl = self.parse_decl()?;
                Ok(Stmt {
                    location,
                    kind: StmtKind::Decl(decl),
                })
            }
            TokenKind::Defer => {
                self.expect_current(&TokenKind::Defer)?;
                let body = self.parse_block()?;
                Ok(Stmt {
                    location,
                    kind: StmtKind::Defer(body),
                })
            }
            TokenKind::If => self.parse_stmt_if(),
            TokenKind::For => self.parse_stmt_for(),
            TokenKind::Break => {
                self.expect_current(&TokenKind::Break)?;
                self.expect_current(&TokenKind::Semicolon)?;
                Ok(Stmt {
                    location,
                    kind: StmtKind::Break,
                })
            }
            TokenKind::Continue => {
                self.expect_current(&TokenKind::Continue)?;
                self.expect_current(&TokenKind::Semicolon)?;
                Ok(Stmt {
                    location,
                    kind: StmtKind::Continue,
                })
            }
            TokenKind::Dump => {
                self.expect_current(&TokenKind::Dump)?;
                let expr = self.parse_expr()?;
                self.expect_current(&TokenKind::Semicolon)?;
                Ok(Stmt {
                    location,
                    kind: StmtKind::Dump(expr),
                })
            }
            TokenKind::Return => {
                self.expect_current(&TokenKind::Return)?;
                let expr = if self.check_current(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_current(&TokenKind::Semicolon)?;
                Ok(Stmt {
                    location,
                    kind: StmtKind::Return(expr),
                })
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.check_current(&TokenKind::Assign) {
                    let location = self.expect_current(&TokenKind::Assign)?.location;
                    let rhs = self.parse_expr()?;
                    self.expect_current(&TokenKind::Semicolon)?;
                    return Ok(Stmt {
                        location,
                        kind: StmtKind::Assign { lhs: expr, rhs },
                    });
                }
                self.expect_current(&TokenKind::Semicolon)?;
                Ok(Stmt {
                    location,
                    kind: StmtKind::Expr(expr),
                })
            }
        }
    }

    fn parse_stmt_if(&mut self) -> Result<Stmt, Fatal> {
        let if_location = self.expect_current(&TokenKind::If)?.location;
        let mut conditionals = Vec::new();

        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        conditionals.push(Conditional {
            location: if_location,
            condition: Some(condition),
            body,
        });

        while self.check_current(&TokenKind::Elif) {
            let location = self.expect_current(&TokenKind::Elif)?.location;
            let condition = self.parse_expr()?;
            let body = self.parse_block()?;
            conditionals.push(Conditional {
                location,
                condition: Some(condition),
                body,
            });
        }

        if self.check_current(&TokenKind::Else) {
            let location = self.expect_current(&TokenKind::Else)?.location;
            let body = self.parse_block()?;
            conditionals.push(Conditional {
                location,
                condition: None,
                body,
            });
        }

        Ok(Stmt {
            location: if_location,
            kind: StmtKind::If(conditionals),
        })
    }

    fn parse_stmt_for(&mut self) -> Result<Stmt, Fatal> {
        let location = self.expect_current(&TokenKind::For)?.location;

        if matches!(self.current().kind, TokenKind::Identifier(_))
            && self.check_peek(&TokenKind::In)
        {
            let identifier = self.parse_identifier()?;
            self.expect_current(&TokenKind::In)?;
            let first = self.parse_expr()?;
            let (begin, end) = if self.check_current(&TokenKind::Colon) {
                self.expect_current(&TokenKind::Colon)?;
                let end = self.parse_expr()?;
                (Some(first), end)
            } else {
                (None, first)
            };
            let body = self.parse_block()?;
            return Ok(Stmt {
                location,
                kind: StmtKind::ForRange {
                    identifier,
                    begin,
                    end,
                    body,
                },
            });
        }

        let expr = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt {
            location,
            kind: StmtKind::ForExpr { expr, body },
        })
    }

    // ===== Expressions =====

    pub fn parse_expr(&mut self) -> Result<Expr, Fatal> {
        self.parse_expr_precedence(Precedence::Lowest)
    }

    fn parse_expr_precedence(&mut self, precedence: Precedence) -> Result<Expr, Fatal> {
        let mut expr = self.parse_expr_nud()?;
        while precedence < token_precedence(&self.current().kind) {
            expr = self.parse_expr_led(expr)?;
        }
        Ok(expr)
    }

    fn parse_expr_nud(&mut self) -> Result<Expr, Fatal> {
        let location = self.current().location;
        match self.current().kind.clone() {
            TokenKind::Identifier(_) | TokenKind::ColonColon => {
                let symbol = self.parse_symbol_path()?;
                Ok(Expr {
                    location,
                    kind: ExprKind::Symbol(symbol),
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr {
                    location,
                    kind: ExprKind::Boolean(true),
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr {
                    location,
                    kind: ExprKind::Boolean(false),
                })
            }
            TokenKind::Integer { value, suffix } => {
                self.advance();
                Ok(Expr {
                    location,
                    kind: ExprKind::Integer { value, suffix },
                })
            }
            TokenKind::Character(c) => {
                self.advance();
                Ok(Expr {
                    location,
                    kind: ExprKind::Character(c),
                })
            }
            TokenKind::Bytes(bytes) => {
                self.advance();
                Ok(Expr {
                    location,
                    kind: ExprKind::Bytes(bytes),
                })
            }
            TokenKind::Uninit => {
                self.advance();
                Ok(Expr {
                    location,
                    kind: ExprKind::Uninit,
                })
            }
            TokenKind::LParen => self.parse_expr_lparen(),
            TokenKind::Syscall => self.parse_expr_syscall(),
            TokenKind::Sizeof => {
                self.advance();
                self.expect_current(&TokenKind::LParen)?;
                let typespec = self.parse_typespec()?;
                self.expect_current(&TokenKind::RParen)?;
                Ok(Expr {
                    location,
                    kind: ExprKind::Sizeof(typespec),
                })
            }
            TokenKind::Alignof => {
                self.advance();
                self.expect_current(&TokenKind::LParen)?;
                let typespec = self.parse_typespec()?;
                self.expect_current(&TokenKind::RParen)?;
                Ok(Expr {
                    location,
                    kind: ExprKind::Alignof(typespec),
                })
            }
            TokenKind::Not
            | TokenKind::Countof
            | TokenKind::Plus
            | TokenKind::Dash
            | TokenKind::Tilde
            | TokenKind::Star
            | TokenKind::Ampersand => self.parse_expr_nud_unary(),
            kind => Err(self.error(
                location,
                format!("expected expression (found `{}`)", kind.as_str()),
            )),
        }
    }

    fn parse_expr_nud_unary(&mut self) -> Result<Expr, Fatal> {
        let token = self.advance();
        let op = match token.kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Countof => UnaryOp::Countof,
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Dash => UnaryOp::Neg,
            TokenKind::Tilde => UnaryOp::Bitnot,
            TokenKind::Star => UnaryOp::Dereference,
            TokenKind::Ampersand => UnaryOp::Addressof,
            _ => unreachable!("caller checked the token kind"),
        };
        let rhs = self.parse_expr_precedence(Precedence::Prefix)?;
        Ok(Expr {
            location: token.location,
            kind: ExprKind::Unary {
                op,
                op_location: token.location,
                rhs: Box::new(rhs),
            },
        })
    }

    /// `(expr)` grouping, or the typed literal forms introduced by `(:T)`:
    /// array lists, slice lists, slice constructors, struct literals, and
    /// casts.
    fn parse_expr_lparen(&mut self) -> Result<Expr, Fatal> {
        let location = self.expect_current(&TokenKind::LParen)?.location;

        if !self.check_current(&TokenKind::Colon) {
            let expr = self.parse_expr()?;
            self.expect_current(&TokenKind::RParen)?;
            return Ok(Expr {
                location,
                kind: ExprKind::Grouped(Box::new(expr)),
            });
        }

        self.expect_current(&TokenKind::Colon)?;
        let typespec = self.parse_typespec()?;
        self.expect_current(&TokenKind::RParen)?;

        if self.check_current(&TokenKind::LBracket)
            && matches!(typespec.kind, TypeSpecKind::Array { .. })
        {
            self.expect_current(&TokenKind::LBracket)?;
            let mut elements = Vec::new();
            let mut ellipsis = None;
            while !self.check_current(&TokenKind::RBracket) {
                if !elements.is_empty() {
                    self.expect_current(&TokenKind::Comma)?;
                }
                let expr = self.parse_expr()?;
                if self.check_current(&TokenKind::Ellipsis) {
                    self.expect_current(&TokenKind::Ellipsis)?;
                    ellipsis = Some(Box::new(expr));
                    break;
                }
                elements.push(expr);
            }
            self.expect_current(&TokenKind::RBracket)?;
            return Ok(Expr {
                location,
                kind: ExprKind::ArrayList {
                    typespec,
                    elements,
                    ellipsis,
                },
            });
        }

        if self.check_current(&TokenKind::LBracket)
            && matches!(typespec.kind, TypeSpecKind::Slice(_))
        {
            self.expect_current(&TokenKind::LBracket)?;
            let mut elements = Vec::new();
            while !self.check_current(&TokenKind::RBracket) {
                if !elements.is_empty() {
                    self.expect_current(&TokenKind::Comma)?;
                }
                elements.push(self.parse_expr()?);
            }
            self.expect_current(&TokenKind::RBracket)?;
            return Ok(Expr {
                location,
                kind: ExprKind::SliceList { typespec, elements },
            });
        }

        if self.check_current(&TokenKind::LBrace) && matches!(typespec.kind, TypeSpecKind::Slice(_))
        {
            self.expect_current(&TokenKind::LBrace)?;
            let pointer = self.parse_expr()?;
            self.expect_current(&TokenKind::Comma)?;
            let count = self.parse_expr()?;
            self.expect_current(&TokenKind::RBrace)?;
            return Ok(Expr {
                location,
                kind: ExprKind::Slice {
                    typespec,
                    pointer: Box::new(pointer),
                    count: Box::new(count),
                },
            });
        }

        if self.check_current(&TokenKind::LBrace) {
            self.expect_current(&TokenKind::LBrace)?;
            let mut initializers = Vec::new();
            while !self.check_current(&TokenKind::RBrace) {
                if !initializers.is_empty() {
                    self.expect_current(&TokenKind::Comma)?;
                }
                let dot = self.expect_current(&TokenKind::Dot)?;
                let identifier = self.parse_identifier()?;
                self.expect_current(&TokenKind::Assign)?;
                let expr = self.parse_expr()?;
                initializers.push(MemberInitializer {
                    location: dot.location,
                    identifier,
                    expr,
                });
            }
            self.expect_current(&TokenKind::RBrace)?;
            return Ok(Expr {
                location,
                kind: ExprKind::Struct {
                    typespec,
                    initializers,
                },
            });
        }

        let expr = self.parse_expr_precedence(Precedence::Prefix)?;
        Ok(Expr {
            location,
            kind: ExprKind::Cast {
                typespec,
                expr: Box::new(expr),
            },
        })
    }

    fn parse_expr_syscall(&mut self) -> Result<Expr, Fatal> {
        let location = self.expect_current(&TokenKind::Syscall)?.location;
        self.expect_current(&TokenKind::LParen)?;
        let mut arguments = vec![self.parse_expr()?];
        while !self.check_current(&TokenKind::RParen) {
            self.expect_current(&TokenKind::Comma)?;
            arguments.push(self.parse_expr()?);
        }
        self.expect_current(&TokenKind::RParen)?;
        Ok(Expr {
            location,
            kind: ExprKind::Syscall(arguments),
        })
    }

    fn parse_expr_led(&mut self, lhs: Expr) -> Result<Expr, Fatal> {
        match self.current().kind {
            TokenKind::LParen => {
                let location = self.expect_current(&TokenKind::LParen)?.location;
                let mut arguments = Vec::new();
                while !self.check_current(&TokenKind::RParen) {
                    if !arguments.is_empty() {
                        self.expect_current(&TokenKind::Comma)?;
                    }
                    arguments.push(self.parse_expr()?);
                }
                self.expect_current(&TokenKind::RParen)?;
                Ok(Expr {
                    location,
                    kind: ExprKind::Call {
                        func: Box::new(lhs),
                        arguments,
                    },
                })
            }
            TokenKind::LBracket => {
                let location = self.expect_current(&TokenKind::LBracket)?.location;
                let idx = self.parse_expr()?;
                if self.check_current(&TokenKind::Colon) {
                    self.expect_current(&TokenKind::Colon)?;
                    let end = self.parse_expr()?;
                    self.expect_current(&TokenKind::RBracket)?;
                    return Ok(Expr {
                        location,
                        kind: ExprKind::AccessSlice {
                            lhs: Box::new(lhs),
                            begin: Box::new(idx),
                            end: Box::new(end),
                        },
                    });
                }
                self.expect_current(&TokenKind::RBracket)?;
                Ok(Expr {
                    location,
                    kind: ExprKind::AccessIndex {
                        lhs: Box::new(lhs),
                        idx: Box::new(idx),
                    },
                })
            }
            TokenKind::DotStar => {
                let location = self.expect_current(&TokenKind::DotStar)?.location;
                Ok(Expr {
                    location,
                    kind: ExprKind::AccessDereference { lhs: Box::new(lhs) },
                })
            }
            TokenKind::Dot => {
                let location = self.expect_current(&TokenKind::Dot)?.location;
                let member = self.parse_symbol_element()?;
                Ok(Expr {
                    location,
                    kind: ExprKind::AccessMember {
                        lhs: Box::new(lhs),
                        member,
                    },
                })
            }
            _ => self.parse_expr_led_binary(lhs),
        }
    }

    fn parse_expr_led_binary(&mut self, lhs: Expr) -> Result<Expr, Fatal> {
        let token = self.advance();
        let op = match token.kind {
            TokenKind::Or => BinaryOp::Or,
            TokenKind::And => BinaryOp::And,
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Dash => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::FSlash => BinaryOp::Div,
            TokenKind::Pipe => BinaryOp::Bitor,
            TokenKind::Caret => BinaryOp::Bitxor,
            TokenKind::Ampersand => BinaryOp::Bitand,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            kind => {
                return Err(self.error(
                    token.location,
                    format!("expected binary operator (found `{}`)", kind.as_str()),
                ));
            }
        };
        let rhs = self.parse_expr_precedence(token_precedence(&token.kind))?;
        Ok(Expr {
            location: token.location,
            kind: ExprKind::Binary {
                op,
                op_location: token.location,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        })
    }

    // ===== Symbols and typespecs =====

    fn parse_identifier(&mut self) -> Result<Identifier, Fatal> {
        if let TokenKind::Identifier(name) = self.current().kind {
            let token = self.advance();
            return Ok(Identifier {
                location: token.location,
                name,
            });
        }
        Err(self.error(
            self.current().location,
            format!(
                "expected identifier (found `{}`)",
                self.current().kind.as_str()
            ),
        ))
    }

    fn parse_symbol_path(&mut self) -> Result<SymbolPath, Fatal> {
        let mut is_from_root = false;
        let mut location = self.current().location;
        if self.check_current(&TokenKind::ColonColon) {
            is_from_root = true;
            location = self.expect_current(&TokenKind::ColonColon)?.location;
        }

        let mut elements = vec![self.parse_symbol_element()?];
        if !is_from_root {
            location = elements[0].location;
        }
        while self.check_current(&TokenKind::ColonColon) {
            self.expect_current(&TokenKind::ColonColon)?;
            elements.push(self.parse_symbol_element()?);
        }

        Ok(SymbolPath {
            location,
            is_from_root,
            elements,
        })
    }

    fn parse_symbol_element(&mut self) -> Result<SymbolElement, Fatal> {
        let identifier = self.parse_identifier()?;
        let template_arguments = if self.check_current(&TokenKind::LBracketLBracket) {
            self.parse_template_argument_list()?
        } else {
            Vec::new()
        };
        Ok(SymbolElement {
            location: identifier.location,
            identifier,
            template_arguments,
        })
    }

    fn parse_typespec(&mut self) -> Result<TypeSpec, Fatal> {
        let location = self.current().location;
        match self.current().kind {
            TokenKind::Identifier(_) | TokenKind::ColonColon => {
                let symbol = self.parse_symbol_path()?;
                Ok(TypeSpec {
                    location,
                    kind: TypeSpecKind::Symbol(symbol),
                })
            }
            TokenKind::Func => {
                self.expect_current(&TokenKind::Func)?;
                self.expect_current(&TokenKind::LParen)?;
                let mut parameter_typespecs = Vec::new();
                while !self.check_current(&TokenKind::RParen) {
                    if !parameter_typespecs.is_empty() {
                        self.expect_current(&TokenKind::Comma)?;
                    }
                    parameter_typespecs.push(self.parse_typespec()?);
                }
                self.expect_current(&TokenKind::RParen)?;
                let return_typespec = self.parse_typespec()?;
                Ok(TypeSpec {
                    location,
                    kind: TypeSpecKind::Function {
                        parameter_typespecs,
                        return_typespec: Box::new(return_typespec),
                    },
                })
            }
            TokenKind::Star => {
                self.expect_current(&TokenKind::Star)?;
                let base = self.parse_typespec()?;
                Ok(TypeSpec {
                    location,
                    kind: TypeSpecKind::Pointer(Box::new(base)),
                })
            }
            TokenKind::LBracket => {
                self.expect_current(&TokenKind::LBracket)?;
                if self.check_current(&TokenKind::RBracket) {
                    self.expect_current(&TokenKind::RBracket)?;
                    let base = self.parse_typespec()?;
                    return Ok(TypeSpec {
                        location,
                        kind: TypeSpecKind::Slice(Box::new(base)),
                    });
                }
                let count = self.parse_expr()?;
                self.expect_current(&TokenKind::RBracket)?;
                let base = self.parse_typespec()?;
                Ok(TypeSpec {
                    location,
                    kind: TypeSpecKind::Array {
                        count: Box::new(count),
                        base: Box::new(base),
                    },
                })
            }
            TokenKind::Typeof => {
                self.expect_current(&TokenKind::Typeof)?;
                self.expect_current(&TokenKind::LParen)?;
                let expr = self.parse_expr()?;
                self.expect_current(&TokenKind::RParen)?;
                Ok(TypeSpec {
                    location,
                    kind: TypeSpecKind::Typeof(Box::new(expr)),
                })
            }
            _ => Err(self.error(
                location,
                format!(
                    "expected type specification (found `{}`)",
                    self.current().kind.as_str()
                ),
            )),
        }
    }
}

#[cfg(test)]
#[path = "tests/parser_tests.rs"]
mod tests;
