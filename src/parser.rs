use std::{
    cell::{Cell, RefCell},
    fmt::Display,
    rc::Rc,
};

use tracing::{debug, trace};

use crate::{
    ast::{
        ClassDecl, Declaration, Destructure, Export, Expression, ExpressionKind, FunctionDecl,
        InfixOperator, Literal, NamespaceDecl, Parameter, Program, Qualifier, Statement,
        StatementKind, TypeAnnotation, UnaryOperator,
    },
    position::Position,
    stack,
    tokenizer::{AssignOperator, Keyword, Token, TokenKind},
};

/// Statements and expressions nested deeper than this are rejected.
const MAX_NESTING: usize = 512;

/// The first syntax error in a file, with the chain of grammar rules that
/// were being parsed when it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: Position,
    pub found: TokenKind,
    pub context: Vec<&'static str>,
}

impl ParseError {
    pub fn message(&self) -> String {
        format!(
            "{}, found {} while parsing {}",
            self.kind,
            self.found,
            self.context.join(" > ")
        )
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyntaxError: {}\n    at {}", self.message(), self.position)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("Expected {0}")]
    Expected(TokenKind),
    #[error("Expected one of {}", one_of(.0))]
    ExpectedOneOf(Vec<TokenKind>),
    #[error("Expected identifier")]
    ExpectedIdentifier,
    #[error("Expected expression")]
    ExpectedExpression,
    #[error("Expected type name")]
    ExpectedType,
    #[error("Expected declaration after 'export'")]
    ExpectedDeclaration,
    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("Constant '{0}' must be initialized")]
    MissingConstInitializer(String),
    #[error("'return' outside of a function")]
    ReturnOutsideFunction,
    #[error("'{0}' outside of a loop")]
    OutsideLoop(Keyword),
    #[error("'export' is only allowed at the top level")]
    ExportNotTopLevel,
    #[error("Expression nested too deeply")]
    NestedTooDeeply,
}

fn one_of(kinds: &[TokenKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    Block,
    Loop,
    Function,
    Namespace,
}

#[derive(Debug)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
    bodies: RefCell<Vec<Body>>,
    depth: Cell<usize>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            bodies: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard<'_> {
        self.stack.borrow_mut().push(name);
        ParseContextGuard { context: self }
    }

    fn enter(&self, body: Body) -> BodyGuard<'_> {
        self.bodies.borrow_mut().push(body);
        BodyGuard { context: self }
    }

    /// Counts one level of recursive nesting until the guard drops.
    fn nest(&self, tokens: &[Token]) -> Result<NestingGuard<'_>, ParseError> {
        if self.depth.get() >= MAX_NESTING {
            return Err(self.error(ParseErrorKind::NestedTooDeeply, tokens));
        }
        self.depth.set(self.depth.get() + 1);
        Ok(NestingGuard { context: self })
    }

    fn at_top_level(&self) -> bool {
        self.bodies.borrow().is_empty()
    }

    fn in_function(&self) -> bool {
        self.bodies
            .borrow()
            .iter()
            .rev()
            .find(|body| matches!(body, Body::Function | Body::Namespace))
            .is_some_and(|body| *body == Body::Function)
    }

    fn in_loop(&self) -> bool {
        self.bodies
            .borrow()
            .iter()
            .rev()
            .find(|body| **body != Body::Block)
            .is_some_and(|body| *body == Body::Loop)
    }

    fn error(&self, kind: ParseErrorKind, tokens: &[Token]) -> ParseError {
        let (position, found) = match tokens.first() {
            Some(token) => (token.position.clone(), token.kind.clone()),
            None => (Position::start(""), TokenKind::Eof),
        };
        trace!(target: "es::parser", %kind, at = %position, "syntax error");
        ParseError {
            kind,
            position,
            found,
            context: self.stack.borrow().clone(),
        }
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.stack.borrow_mut().pop();
    }
}

struct BodyGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> Drop for BodyGuard<'a> {
    fn drop(&mut self) {
        self.context.bodies.borrow_mut().pop();
    }
}

struct NestingGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> Drop for NestingGuard<'a> {
    fn drop(&mut self) {
        self.context.depth.set(self.context.depth.get() - 1);
    }
}

type ParseResult<'a, T> = Result<(T, &'a [Token]), ParseError>;

pub fn program(tokens: &[Token]) -> Result<Program, ParseError> {
    let context = ParseContext::new();
    let _guard = context.push("program");
    let mut statements = Vec::new();
    let mut tokens = skip_semicolons(tokens);

    while !at(tokens, &TokenKind::Eof) && !tokens.is_empty() {
        let (stmt, rest) = statement(&context, tokens)?;
        tokens = terminator(&context, tokens, rest)?;
        statements.push(stmt);
    }

    debug!(target: "es::parser", count = statements.len(), "parsed program");
    Ok(Program(statements))
}

fn kind_of(tokens: &[Token]) -> Option<&TokenKind> {
    tokens.first().map(Token::kind)
}

fn at(tokens: &[Token], kind: &TokenKind) -> bool {
    kind_of(tokens) == Some(kind)
}

fn at_keyword(tokens: &[Token], keyword: Keyword) -> bool {
    at(tokens, &TokenKind::Keyword(keyword))
}

fn skip_semicolons(mut tokens: &[Token]) -> &[Token] {
    while at(tokens, &TokenKind::Semicolon) {
        tokens = &tokens[1..];
    }
    tokens
}

/// Consumes the `;` after a statement. It may be left out when the statement
/// ended in `}` or when the enclosing block or file ends next.
fn terminator<'a>(
    context: &ParseContext,
    before: &'a [Token],
    after: &'a [Token],
) -> Result<&'a [Token], ParseError> {
    if at(after, &TokenKind::Semicolon) {
        return Ok(skip_semicolons(after));
    }
    let consumed = before.len() - after.len();
    let ended_with_brace = consumed > 0 && before[consumed - 1].kind == TokenKind::RightBrace;
    if ended_with_brace || at(after, &TokenKind::RightBrace) || at(after, &TokenKind::Eof) {
        return Ok(after);
    }
    Err(context.error(ParseErrorKind::Expected(TokenKind::Semicolon), after))
}

fn statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _nesting = context.nest(tokens)?;
    stack::guard(|| statement_inner(context, tokens))
}

fn statement_inner<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("statement");
    let Some(token) = tokens.first() else {
        return Err(context.error(ParseErrorKind::ExpectedExpression, tokens));
    };
    let position = token.position.clone();
    let (kind, rest) = match &token.kind {
        TokenKind::Keyword(Keyword::Export) => {
            if !context.at_top_level() {
                return Err(context.error(ParseErrorKind::ExportNotTopLevel, tokens));
            }
            match declaration(context, &tokens[1..], Export::Exported)? {
                Some(result) => result,
                None => {
                    return Err(context.error(ParseErrorKind::ExpectedDeclaration, &tokens[1..]))
                }
            }
        }
        TokenKind::Keyword(Keyword::If) => if_statement(context, &tokens[1..])?,
        TokenKind::Keyword(Keyword::While) => while_statement(context, &tokens[1..])?,
        TokenKind::Keyword(Keyword::For) => for_statement(context, &tokens[1..])?,
        TokenKind::Keyword(Keyword::Return) => return_statement(context, tokens)?,
        TokenKind::Keyword(keyword @ (Keyword::Break | Keyword::Continue)) => {
            if !context.in_loop() {
                return Err(context.error(ParseErrorKind::OutsideLoop(*keyword), tokens));
            }
            let kind = if *keyword == Keyword::Break {
                StatementKind::Break
            } else {
                StatementKind::Continue
            };
            (kind, &tokens[1..])
        }
        _ => match declaration(context, tokens, Export::Private)? {
            Some(result) => result,
            None => {
                let (expr, rest) = expression(context, tokens)?;
                (StatementKind::Expression(expr), rest)
            }
        },
    };
    Ok((Statement { kind, position }, rest))
}

/// Parses `let`/`const`/`var`, or a named `func`/`class`. Anything else is
/// left for the caller.
fn declaration<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    export: Export,
) -> Result<Option<(StatementKind, &'a [Token])>, ParseError> {
    let named = matches!(tokens.get(1).map(Token::kind), Some(TokenKind::Identifier(_)));
    let qualifier = match kind_of(tokens) {
        Some(TokenKind::Keyword(Keyword::Let)) => Qualifier::Let,
        Some(TokenKind::Keyword(Keyword::Const)) => Qualifier::Const,
        Some(TokenKind::Keyword(Keyword::Var)) => Qualifier::Var,
        Some(TokenKind::Keyword(Keyword::Func)) if named => {
            let _guard = context.push("function");
            let position = tokens[0].position.clone();
            let (name, rest) = match_identifier(context, &tokens[1..])?;
            let (decl, rest) = function_rest(context, rest, Some(name), position)?;
            return Ok(Some((StatementKind::Function(decl, export), rest)));
        }
        Some(TokenKind::Keyword(Keyword::Class)) if named => {
            let _guard = context.push("class");
            let position = tokens[0].position.clone();
            let (name, rest) = match_identifier(context, &tokens[1..])?;
            let (decl, rest) = class_body(context, rest, Some(name), position)?;
            return Ok(Some((StatementKind::Class(decl, export), rest)));
        }
        Some(TokenKind::Identifier(_)) if named && is_namespace(tokens) => {
            let _guard = context.push("namespace");
            let position = tokens[0].position.clone();
            let (name, rest) = match_identifier(context, &tokens[1..])?;
            let (decl, rest) = namespace_body(context, rest, Some(name), position)?;
            return Ok(Some((StatementKind::Namespace(decl, export), rest)));
        }
        _ => return Ok(None),
    };

    if at(&tokens[1..], &TokenKind::LeftBracket) {
        let _guard = context.push("destructuring");
        let (targets, rest) = list(context, &tokens[2..], TokenKind::RightBracket, parameter)?;
        let rest = consume(context, rest, TokenKind::Assign(AssignOperator::Assign))?;
        let (value, rest) = expression(context, rest)?;
        let destructure = Destructure {
            qualifier,
            targets,
            value,
            export,
        };
        return Ok(Some((StatementKind::Destructure(destructure), rest)));
    }

    let _guard = context.push("declaration");
    let (name, tokens) = match_identifier(context, &tokens[1..])?;
    let (annotation, tokens) = if at(tokens, &TokenKind::Colon) {
        let (annotation, rest) = type_annotation(context, &tokens[1..])?;
        (Some(annotation), rest)
    } else {
        (None, tokens)
    };
    let (initializer, tokens) = if at(tokens, &TokenKind::Assign(AssignOperator::Assign)) {
        let (expr, rest) = expression(context, &tokens[1..])?;
        (Some(name_anonymous(expr, &name)), rest)
    } else if qualifier == Qualifier::Const {
        return Err(context.error(ParseErrorKind::MissingConstInitializer(name), tokens));
    } else {
        (None, tokens)
    };

    Ok(Some((
        StatementKind::Declaration(Declaration {
            qualifier,
            name,
            annotation,
            initializer,
            export,
        }),
        tokens,
    )))
}

/// `const f = func () ...` names the function `f`; the same goes for classes.
fn name_anonymous(mut expr: Expression, name: &str) -> Expression {
    match &mut expr.kind {
        ExpressionKind::Function(decl) => {
            if let Some(decl) = Rc::get_mut(decl) {
                decl.name.get_or_insert_with(|| name.to_string());
            }
        }
        ExpressionKind::Class(decl) => {
            if let Some(decl) = Rc::get_mut(decl) {
                decl.name.get_or_insert_with(|| name.to_string());
            }
        }
        ExpressionKind::Namespace(decl) => {
            if let Some(decl) = Rc::get_mut(decl) {
                decl.name.get_or_insert_with(|| name.to_string());
            }
        }
        _ => {}
    }
    expr
}

fn type_annotation<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> ParseResult<'a, TypeAnnotation> {
    let _guard = context.push("type");
    let position = match tokens.first() {
        Some(token) => token.position.clone(),
        None => return Err(context.error(ParseErrorKind::ExpectedType, tokens)),
    };
    let mut names = Vec::new();
    let mut tokens = tokens;
    loop {
        let name = match kind_of(tokens) {
            Some(TokenKind::Identifier(name)) => name.clone(),
            Some(TokenKind::Keyword(Keyword::Nil)) => "nil".to_string(),
            _ => return Err(context.error(ParseErrorKind::ExpectedType, tokens)),
        };
        names.push(name);
        tokens = &tokens[1..];
        if !at(tokens, &TokenKind::Pipe) {
            break;
        }
        tokens = &tokens[1..];
    }
    Ok((TypeAnnotation { names, position }, tokens))
}

fn parameter<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Parameter> {
    let position = match tokens.first() {
        Some(token) => token.position.clone(),
        None => return Err(context.error(ParseErrorKind::ExpectedIdentifier, tokens)),
    };
    let (name, tokens) = match_identifier(context, tokens)?;
    let (annotation, tokens) = if at(tokens, &TokenKind::Colon) {
        let (annotation, rest) = type_annotation(context, &tokens[1..])?;
        (Some(annotation), rest)
    } else {
        (None, tokens)
    };
    Ok((
        Parameter {
            name,
            annotation,
            position,
        },
        tokens,
    ))
}

/// Everything after a function's name: parameters, return type and body. A
/// body written as a bare expression returns that expression.
fn function_rest<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    name: Option<String>,
    position: Position,
) -> ParseResult<'a, Rc<FunctionDecl>> {
    let tokens = consume(context, tokens, TokenKind::LeftParen)?;
    let (params, tokens) = list(context, tokens, TokenKind::RightParen, parameter)?;
    let (return_type, tokens) = if at(tokens, &TokenKind::Colon) {
        let (annotation, rest) = type_annotation(context, &tokens[1..])?;
        (Some(annotation), rest)
    } else {
        (None, tokens)
    };

    let _body = context.enter(Body::Function);
    let (body, tokens) = if at(tokens, &TokenKind::LeftBrace) {
        block(context, tokens)?
    } else {
        let (expr, rest) = expression(context, tokens)?;
        let position = expr.position.clone();
        let stmt = Statement {
            kind: StatementKind::Return(Some(expr)),
            position,
        };
        (vec![stmt], rest)
    };

    Ok((
        Rc::new(FunctionDecl {
            name,
            params,
            return_type,
            body,
            position,
        }),
        tokens,
    ))
}

/// Methods `name(params) body` and property declarations `name: type`,
/// in any order.
fn class_body<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    name: Option<String>,
    position: Position,
) -> ParseResult<'a, Rc<ClassDecl>> {
    let mut tokens = consume(context, tokens, TokenKind::LeftBrace)?;
    let mut properties = Vec::new();
    let mut methods = Vec::new();
    loop {
        tokens = skip_semicolons(tokens);
        if at(tokens, &TokenKind::RightBrace) {
            tokens = &tokens[1..];
            break;
        }
        if !at(tokens.get(1..).unwrap_or_default(), &TokenKind::LeftParen) {
            let _guard = context.push("property");
            let (property, rest) = parameter(context, tokens)?;
            properties.push(property);
            tokens = rest;
            continue;
        }
        let _guard = context.push("method");
        let method_position = tokens[0].position.clone();
        let (method_name, rest) = match_identifier(context, tokens)?;
        let (method, rest) = function_rest(context, rest, Some(method_name), method_position)?;
        methods.push(method);
        tokens = rest;
    }
    Ok((
        Rc::new(ClassDecl {
            name,
            properties,
            methods,
            position,
        }),
        tokens,
    ))
}

/// The contextual keyword that starts a namespace block.
const NAMESPACE: &str = "namespace";

fn is_namespace(tokens: &[Token]) -> bool {
    let starts = matches!(kind_of(tokens), Some(TokenKind::Identifier(word)) if word == NAMESPACE);
    let rest = tokens.get(1..).unwrap_or_default();
    let named = matches!(kind_of(rest), Some(TokenKind::Identifier(_)))
        && at(rest.get(1..).unwrap_or_default(), &TokenKind::LeftBrace);
    starts && (named || at(rest, &TokenKind::LeftBrace))
}

fn namespace_body<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    name: Option<String>,
    position: Position,
) -> ParseResult<'a, Rc<NamespaceDecl>> {
    let _body = context.enter(Body::Namespace);
    let (body, tokens) = block(context, tokens)?;
    Ok((
        Rc::new(NamespaceDecl {
            name,
            body,
            position,
        }),
        tokens,
    ))
}

fn block<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Vec<Statement>> {
    let _guard = context.push("block");
    let mut tokens = skip_semicolons(consume(context, tokens, TokenKind::LeftBrace)?);
    let mut statements = Vec::new();

    while !at(tokens, &TokenKind::RightBrace) {
        if at(tokens, &TokenKind::Eof) || tokens.is_empty() {
            return Err(context.error(ParseErrorKind::Expected(TokenKind::RightBrace), tokens));
        }
        let (stmt, rest) = statement(context, tokens)?;
        tokens = terminator(context, tokens, rest)?;
        statements.push(stmt);
    }

    Ok((statements, &tokens[1..]))
}

fn if_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, StatementKind> {
    let _guard = context.push("if");
    let (condition, tokens) = expression(context, tokens)?;
    let _body = context.enter(Body::Block);
    let (then_branch, tokens) = block(context, tokens)?;

    if !at_keyword(tokens, Keyword::Else) {
        return Ok((StatementKind::If(condition, then_branch, None), tokens));
    }

    let else_token = &tokens[1..];
    let position = match else_token.first() {
        Some(token) => token.position.clone(),
        None => return Err(context.error(ParseErrorKind::Expected(TokenKind::LeftBrace), else_token)),
    };
    let (else_kind, tokens) = if at_keyword(else_token, Keyword::If) {
        if_statement(context, &else_token[1..])?
    } else {
        let (statements, rest) = block(context, else_token)?;
        (StatementKind::Block(statements), rest)
    };
    let else_branch = Statement {
        kind: else_kind,
        position,
    };
    Ok((
        StatementKind::If(condition, then_branch, Some(Box::new(else_branch))),
        tokens,
    ))
}

fn while_statement<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> ParseResult<'a, StatementKind> {
    let _guard = context.push("while");
    let (condition, tokens) = expression(context, tokens)?;
    let _body = context.enter(Body::Loop);
    let (body, tokens) = block(context, tokens)?;
    Ok((StatementKind::While(condition, body), tokens))
}

fn for_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, StatementKind> {
    let _guard = context.push("for");
    let (variable, tokens) = match_identifier(context, tokens)?;
    let tokens = consume(context, tokens, TokenKind::Keyword(Keyword::In))?;
    let (iterable, tokens) = expression(context, tokens)?;
    let _body = context.enter(Body::Loop);
    let (body, tokens) = block(context, tokens)?;
    Ok((
        StatementKind::For {
            variable,
            iterable,
            body,
        },
        tokens,
    ))
}

fn return_statement<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> ParseResult<'a, StatementKind> {
    let _guard = context.push("return");
    if !context.in_function() {
        return Err(context.error(ParseErrorKind::ReturnOutsideFunction, tokens));
    }
    let tokens = &tokens[1..];
    match kind_of(tokens) {
        Some(TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof) | None => {
            Ok((StatementKind::Return(None), tokens))
        }
        _ => {
            let (expr, rest) = expression(context, tokens)?;
            Ok((StatementKind::Return(Some(expr)), rest))
        }
    }
}

fn expression<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("expression");
    assignment(context, tokens)
}

fn assignment<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _nesting = context.nest(tokens)?;
    stack::guard(|| assignment_inner(context, tokens))
}

fn assignment_inner<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let (target, rest) = coalesce(context, tokens)?;

    let Some(TokenKind::Assign(operator)) = kind_of(rest) else {
        return Ok((target, rest));
    };
    let _guard = context.push("assignment");
    if !matches!(
        target.kind,
        ExpressionKind::Identifier(_) | ExpressionKind::Member(..) | ExpressionKind::Index(..)
    ) {
        return Err(context.error(ParseErrorKind::InvalidAssignmentTarget, rest));
    }
    let operator = *operator;
    let (value, rest) = assignment(context, &rest[1..])?;
    let position = target.position.clone();
    Ok((
        Expression {
            kind: ExpressionKind::Assign {
                target: Box::new(target),
                operator,
                value: Box::new(value),
            },
            position,
        },
        rest,
    ))
}

fn binary<'a>(
    context: &ParseContext,
    precedence: impl Fn(&ParseContext, &'a [Token]) -> ParseResult<'a, Expression>,
    operator: impl Fn(&TokenKind) -> Option<InfixOperator>,
    tokens: &'a [Token],
) -> ParseResult<'a, Expression> {
    let (mut expr, mut tokens) = precedence(context, tokens)?;

    while let Some(op) = kind_of(tokens).and_then(&operator) {
        let (right, rest) = precedence(context, &tokens[1..])?;
        let position = expr.position.clone();
        expr = Expression {
            kind: ExpressionKind::Binary(Box::new(expr), op, Box::new(right)),
            position,
        };
        tokens = rest;
    }

    Ok((expr, tokens))
}

fn coalesce<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    binary(
        context,
        logical_or,
        |kind| match kind {
            TokenKind::QuestionQuestion => Some(InfixOperator::Coalesce),
            _ => None,
        },
        tokens,
    )
}

fn logical_or<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    binary(
        context,
        logical_and,
        |kind| match kind {
            TokenKind::OrOr => Some(InfixOperator::Or),
            _ => None,
        },
        tokens,
    )
}

fn logical_and<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    binary(
        context,
        equality,
        |kind| match kind {
            TokenKind::AndAnd => Some(InfixOperator::And),
            _ => None,
        },
        tokens,
    )
}

fn equality<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    binary(
        context,
        relational,
        |kind| match kind {
            TokenKind::EqualEqual => Some(InfixOperator::Equal),
            TokenKind::BangEqual => Some(InfixOperator::NotEqual),
            _ => None,
        },
        tokens,
    )
}

fn relational<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    binary(
        context,
        additive,
        |kind| match kind {
            TokenKind::Less => Some(InfixOperator::LessThan),
            TokenKind::LessEqual => Some(InfixOperator::LessThanOrEqual),
            TokenKind::Greater => Some(InfixOperator::GreaterThan),
            TokenKind::GreaterEqual => Some(InfixOperator::GreaterThanOrEqual),
            _ => None,
        },
        tokens,
    )
}

fn additive<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    binary(
        context,
        multiplicative,
        |kind| match kind {
            TokenKind::Plus => Some(InfixOperator::Plus),
            TokenKind::Minus => Some(InfixOperator::Minus),
            _ => None,
        },
        tokens,
    )
}

fn multiplicative<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    binary(
        context,
        unary,
        |kind| match kind {
            TokenKind::Star => Some(InfixOperator::Multiply),
            TokenKind::Slash => Some(InfixOperator::Divide),
            TokenKind::Percent => Some(InfixOperator::Modulo),
            _ => None,
        },
        tokens,
    )
}

fn unary<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _nesting = context.nest(tokens)?;
    stack::guard(|| prefixed(context, tokens))
}

fn prefixed<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let operator = match kind_of(tokens) {
        Some(TokenKind::Minus) => UnaryOperator::Negate,
        Some(TokenKind::Plus) => UnaryOperator::Plus,
        Some(TokenKind::Bang) => UnaryOperator::Not,
        _ => return power(context, tokens),
    };
    let _guard = context.push("unary");
    let position = tokens[0].position.clone();
    let (right, rest) = unary(context, &tokens[1..])?;
    Ok((
        Expression {
            kind: ExpressionKind::Unary(operator, Box::new(right)),
            position,
        },
        rest,
    ))
}

fn power<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let (base, tokens) = call(context, tokens)?;
    if !at(tokens, &TokenKind::StarStar) {
        return Ok((base, tokens));
    }
    let (exponent, rest) = unary(context, &tokens[1..])?;
    let position = base.position.clone();
    Ok((
        Expression {
            kind: ExpressionKind::Binary(Box::new(base), InfixOperator::Pow, Box::new(exponent)),
            position,
        },
        rest,
    ))
}

fn call<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let (mut expr, mut tokens) = primary(context, tokens)?;

    loop {
        let position = expr.position.clone();
        let kind = match kind_of(tokens) {
            Some(TokenKind::LeftParen) => {
                let _guard = context.push("call");
                let (args, rest) = list(context, &tokens[1..], TokenKind::RightParen, expression)?;
                tokens = rest;
                ExpressionKind::Call(Box::new(expr), args)
            }
            Some(TokenKind::Dot) => {
                let (name, rest) = match_identifier(context, &tokens[1..])?;
                tokens = rest;
                ExpressionKind::Member(Box::new(expr), name)
            }
            Some(TokenKind::LeftBracket) => {
                let _guard = context.push("index");
                let (index, rest) = expression(context, &tokens[1..])?;
                tokens = consume(context, rest, TokenKind::RightBracket)?;
                ExpressionKind::Index(Box::new(expr), Box::new(index))
            }
            _ => break,
        };
        expr = Expression { kind, position };
    }

    Ok((expr, tokens))
}

fn primary<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("primary");
    let Some(token) = tokens.first() else {
        return Err(context.error(ParseErrorKind::ExpectedExpression, tokens));
    };
    let position = token.position.clone();
    let rest = &tokens[1..];

    let (kind, rest) = match &token.kind {
        TokenKind::Number(n) => (ExpressionKind::Literal(Literal::Number(*n)), rest),
        TokenKind::String(s) => (ExpressionKind::Literal(Literal::String(s.clone())), rest),
        TokenKind::Keyword(Keyword::True) => (ExpressionKind::Literal(Literal::Boolean(true)), rest),
        TokenKind::Keyword(Keyword::False) => {
            (ExpressionKind::Literal(Literal::Boolean(false)), rest)
        }
        TokenKind::Keyword(Keyword::Nil) => (ExpressionKind::Literal(Literal::Nil), rest),
        TokenKind::Identifier(_) if is_namespace(tokens) => {
            let _guard = context.push("namespace");
            let (name, rest) = match kind_of(rest) {
                Some(TokenKind::Identifier(name)) => (Some(name.clone()), &rest[1..]),
                _ => (None, rest),
            };
            let (decl, rest) = namespace_body(context, rest, name, position.clone())?;
            (ExpressionKind::Namespace(decl), rest)
        }
        TokenKind::Identifier(name) => (ExpressionKind::Identifier(name.clone()), rest),
        TokenKind::LeftParen => {
            let (expr, rest) = expression(context, rest)?;
            let rest = consume(context, rest, TokenKind::RightParen)?;
            (ExpressionKind::Grouping(Box::new(expr)), rest)
        }
        TokenKind::LeftBracket => {
            let _guard = context.push("array");
            let (elements, rest) = list(context, rest, TokenKind::RightBracket, expression)?;
            (ExpressionKind::Array(elements), rest)
        }
        TokenKind::LeftBrace => {
            let _guard = context.push("object");
            let (fields, rest) = list(context, rest, TokenKind::RightBrace, field)?;
            (ExpressionKind::Object(fields), rest)
        }
        TokenKind::Keyword(Keyword::Func) => {
            let _guard = context.push("function");
            let (name, rest) = match kind_of(rest) {
                Some(TokenKind::Identifier(name)) => (Some(name.clone()), &rest[1..]),
                _ => (None, rest),
            };
            let (decl, rest) = function_rest(context, rest, name, position.clone())?;
            (ExpressionKind::Function(decl), rest)
        }
        TokenKind::Keyword(Keyword::Class) => {
            let _guard = context.push("class");
            let (name, rest) = match kind_of(rest) {
                Some(TokenKind::Identifier(name)) => (Some(name.clone()), &rest[1..]),
                _ => (None, rest),
            };
            let (decl, rest) = class_body(context, rest, name, position.clone())?;
            (ExpressionKind::Class(decl), rest)
        }
        TokenKind::Keyword(Keyword::Import) => {
            let _guard = context.push("import");
            let rest = consume(context, rest, TokenKind::LeftParen)?;
            let (path, rest) = expression(context, rest)?;
            let rest = consume(context, rest, TokenKind::RightParen)?;
            (ExpressionKind::Import(Box::new(path)), rest)
        }
        _ => return Err(context.error(ParseErrorKind::ExpectedExpression, tokens)),
    };

    Ok((Expression { kind, position }, rest))
}

fn field<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> ParseResult<'a, (String, Expression)> {
    let key = match kind_of(tokens) {
        Some(TokenKind::Identifier(key) | TokenKind::String(key)) => key.clone(),
        _ => return Err(context.error(ParseErrorKind::ExpectedIdentifier, tokens)),
    };
    let tokens = consume(context, &tokens[1..], TokenKind::Colon)?;
    let (value, tokens) = expression(context, tokens)?;
    Ok(((key, value), tokens))
}

/// Comma separated items up to and including `close`. A trailing comma is
/// allowed.
fn list<'a, T>(
    context: &ParseContext,
    tokens: &'a [Token],
    close: TokenKind,
    item: impl Fn(&ParseContext, &'a [Token]) -> ParseResult<'a, T>,
) -> ParseResult<'a, Vec<T>> {
    let mut items = Vec::new();
    let mut tokens = tokens;
    loop {
        if at(tokens, &close) {
            return Ok((items, &tokens[1..]));
        }

        let (value, rest) = item(context, tokens)?;
        items.push(value);
        tokens = rest;

        match kind_of(tokens) {
            Some(TokenKind::Comma) => tokens = &tokens[1..],
            Some(kind) if kind == &close => return Ok((items, &tokens[1..])),
            _ => {
                return Err(context.error(
                    ParseErrorKind::ExpectedOneOf(vec![TokenKind::Comma, close]),
                    tokens,
                ))
            }
        }
    }
}

fn consume<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    kind: TokenKind,
) -> Result<&'a [Token], ParseError> {
    match kind_of(tokens) {
        Some(k) if k == &kind => Ok(&tokens[1..]),
        _ => Err(context.error(ParseErrorKind::Expected(kind), tokens)),
    }
}

fn match_identifier<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, String> {
    match kind_of(tokens) {
        Some(TokenKind::Identifier(name)) => Ok((name.clone(), &tokens[1..])),
        _ => Err(context.error(ParseErrorKind::ExpectedIdentifier, tokens)),
    }
}
