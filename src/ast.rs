use std::{fmt::Display, rc::Rc};

use crate::{position::Position, tokenizer::AssignOperator};

#[derive(Debug)]
pub struct Program(pub Vec<Statement>);

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Expression(Expression),
    Declaration(Declaration),
    Destructure(Destructure),
    Function(Rc<FunctionDecl>, Export),
    Class(Rc<ClassDecl>, Export),
    Namespace(Rc<NamespaceDecl>, Export),
    If(Expression, Vec<Statement>, Option<Box<Statement>>),
    While(Expression, Vec<Statement>),
    For {
        variable: String,
        iterable: Expression,
        body: Vec<Statement>,
    },
    Block(Vec<Statement>),
    Return(Option<Expression>),
    Break,
    Continue,
}

/// Whether a top-level declaration was written with `export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Export {
    Exported,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub qualifier: Qualifier,
    pub name: String,
    pub annotation: Option<TypeAnnotation>,
    pub initializer: Option<Expression>,
    pub export: Export,
}

/// `let [a, b: number] = value`. Arrays and strings bind by position,
/// objects by key.
#[derive(Debug, Clone)]
pub struct Destructure {
    pub qualifier: Qualifier,
    pub targets: Vec<Parameter>,
    pub value: Expression,
    pub export: Export,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Option<String>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Vec<Statement>,
    pub position: Position,
}

impl FunctionDecl {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub annotation: Option<TypeAnnotation>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Option<String>,
    pub properties: Vec<Parameter>,
    pub methods: Vec<Rc<FunctionDecl>>,
    pub position: Position,
}

impl ClassDecl {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    pub name: Option<String>,
    pub body: Vec<Statement>,
    pub position: Position,
}

impl NamespaceDecl {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// `: number`, `: Point` or a union such as `: string | nil`.
#[derive(Debug, Clone)]
pub struct TypeAnnotation {
    pub names: Vec<String>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Identifier(String),
    Literal(Literal),
    Grouping(Box<Expression>),
    Array(Vec<Expression>),
    Object(Vec<(String, Expression)>),
    Binary(Box<Expression>, InfixOperator, Box<Expression>),
    Unary(UnaryOperator, Box<Expression>),
    Assign {
        target: Box<Expression>,
        operator: AssignOperator,
        value: Box<Expression>,
    },
    Call(Box<Expression>, Vec<Expression>),
    Member(Box<Expression>, String),
    Index(Box<Expression>, Box<Expression>),
    Function(Rc<FunctionDecl>),
    Class(Rc<ClassDecl>),
    Namespace(Rc<NamespaceDecl>),
    Import(Box<Expression>),
}

#[derive(Debug, Clone)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Pow,
    And,
    Or,
    Coalesce,
}

impl InfixOperator {
    /// The operator a compound assignment applies before storing.
    pub fn from_assign(operator: AssignOperator) -> Option<Self> {
        match operator {
            AssignOperator::Assign => None,
            AssignOperator::Add => Some(InfixOperator::Plus),
            AssignOperator::Subtract => Some(InfixOperator::Minus),
            AssignOperator::Multiply => Some(InfixOperator::Multiply),
            AssignOperator::Divide => Some(InfixOperator::Divide),
            AssignOperator::Modulo => Some(InfixOperator::Modulo),
            AssignOperator::Pow => Some(InfixOperator::Pow),
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

fn write_block(f: &mut std::fmt::Formatter<'_>, statements: &[Statement]) -> std::fmt::Result {
    writeln!(f, "{{")?;
    for statement in statements {
        writeln!(f, "{}", statement)?;
    }
    write!(f, "}}")
}

fn write_list<T: Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            StatementKind::Expression(expr) => write!(f, "{};", expr),
            StatementKind::Declaration(decl) => write!(f, "{};", decl),
            StatementKind::Destructure(decl) => write!(f, "{};", decl),
            StatementKind::Namespace(decl, export) => {
                if *export == Export::Exported {
                    write!(f, "export ")?;
                }
                write!(f, "{}", decl)
            }
            StatementKind::Function(decl, export) => {
                if *export == Export::Exported {
                    write!(f, "export ")?;
                }
                write!(f, "{}", decl)
            }
            StatementKind::Class(decl, export) => {
                if *export == Export::Exported {
                    write!(f, "export ")?;
                }
                write!(f, "{}", decl)
            }
            StatementKind::If(condition, then_branch, else_branch) => {
                write!(f, "if {} ", condition)?;
                write_block(f, then_branch)?;
                if let Some(else_branch) = else_branch {
                    write!(f, " else {}", else_branch)?;
                }
                Ok(())
            }
            StatementKind::While(condition, body) => {
                write!(f, "while {} ", condition)?;
                write_block(f, body)
            }
            StatementKind::For {
                variable,
                iterable,
                body,
            } => {
                write!(f, "for {} in {} ", variable, iterable)?;
                write_block(f, body)
            }
            StatementKind::Block(statements) => write_block(f, statements),
            StatementKind::Return(expr) => {
                if let Some(expr) = expr {
                    write!(f, "return {};", expr)
                } else {
                    write!(f, "return;")
                }
            }
            StatementKind::Break => write!(f, "break;"),
            StatementKind::Continue => write!(f, "continue;"),
        }
    }
}

impl Display for Declaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.export == Export::Exported {
            write!(f, "export ")?;
        }
        write!(f, "{} {}", self.qualifier, self.name)?;
        if let Some(annotation) = &self.annotation {
            write!(f, ": {}", annotation)?;
        }
        if let Some(initializer) = &self.initializer {
            write!(f, " = {}", initializer)?;
        }
        Ok(())
    }
}

impl Display for Destructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.export == Export::Exported {
            write!(f, "export ")?;
        }
        write!(f, "{} [", self.qualifier)?;
        write_list(f, &self.targets)?;
        write!(f, "] = {}", self.value)
    }
}

impl Display for NamespaceDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "namespace ")?;
        if let Some(name) = &self.name {
            write!(f, "{} ", name)?;
        }
        write_block(f, &self.body)
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Qualifier::Let => write!(f, "let"),
            Qualifier::Const => write!(f, "const"),
            Qualifier::Var => write!(f, "var"),
        }
    }
}

impl Display for FunctionDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "func ")?;
        if let Some(name) = &self.name {
            write!(f, "{}", name)?;
        }
        write!(f, "(")?;
        write_list(f, &self.params)?;
        write!(f, ")")?;
        if let Some(return_type) = &self.return_type {
            write!(f, ": {}", return_type)?;
        }
        write!(f, " ")?;
        write_block(f, &self.body)
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(annotation) = &self.annotation {
            write!(f, ": {}", annotation)?;
        }
        Ok(())
    }
}

impl Display for ClassDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "class ")?;
        if let Some(name) = &self.name {
            write!(f, "{} ", name)?;
        }
        writeln!(f, "{{")?;
        for property in &self.properties {
            writeln!(f, "{};", property)?;
        }
        for method in &self.methods {
            writeln!(f, "{}", method)?;
        }
        write!(f, "}}")
    }
}

impl Display for TypeAnnotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.names.join(" | "))
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExpressionKind::Identifier(name) => write!(f, "{}", name),
            ExpressionKind::Literal(literal) => write!(f, "{}", literal),
            ExpressionKind::Grouping(expr) => write!(f, "({})", expr),
            ExpressionKind::Array(elements) => {
                write!(f, "[")?;
                write_list(f, elements)?;
                write!(f, "]")
            }
            ExpressionKind::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            ExpressionKind::Binary(left, op, right) => write!(f, "({} {} {})", op, left, right),
            ExpressionKind::Unary(op, right) => write!(f, "({} {})", op, right),
            ExpressionKind::Assign {
                target,
                operator,
                value,
            } => write!(f, "{} {} {}", target, operator, value),
            ExpressionKind::Call(callee, args) => {
                write!(f, "{}(", callee)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExpressionKind::Member(object, name) => write!(f, "{}.{}", object, name),
            ExpressionKind::Index(object, index) => write!(f, "{}[{}]", object, index),
            ExpressionKind::Function(decl) => write!(f, "{}", decl),
            ExpressionKind::Class(decl) => write!(f, "{}", decl),
            ExpressionKind::Namespace(decl) => write!(f, "{}", decl),
            ExpressionKind::Import(path) => write!(f, "import({})", path),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Nil => write!(f, "nil"),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
            InfixOperator::Modulo => write!(f, "%"),
            InfixOperator::Pow => write!(f, "**"),
            InfixOperator::And => write!(f, "&&"),
            InfixOperator::Or => write!(f, "||"),
            InfixOperator::Coalesce => write!(f, "??"),
        }
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Plus => write!(f, "+"),
            UnaryOperator::Not => write!(f, "!"),
        }
    }
}
