//! The expression tree produced by the parser. Children are owned
//! exclusively by their parent node; the code generator takes each
//! top-level [`Item`] by value and consumes it.

use std::fmt;

use super::token::TokenKind;

/// Prefix operators. `+` is accepted and discarded during lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Plus,
    Neg,
    BitNot,
}

impl PrefixOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Not => Some(PrefixOp::Not),
            TokenKind::Plus => Some(PrefixOp::Plus),
            TokenKind::Minus => Some(PrefixOp::Neg),
            TokenKind::Tilde => Some(PrefixOp::BitNot),
            _ => None,
        }
    }
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            PrefixOp::Not => "!",
            PrefixOp::Plus => "+",
            PrefixOp::Neg => "-",
            PrefixOp::BitNot => "~",
        };
        write!(f, "{}", symbol)
    }
}

/// Binary operators recognised by the language. `!` and `~` are prefix-only
/// and deliberately have no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Assign,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Equals => Some(BinaryOp::Assign),
            TokenKind::Or => Some(BinaryOp::Or),
            TokenKind::And => Some(BinaryOp::And),
            TokenKind::Pipe => Some(BinaryOp::BitOr),
            TokenKind::Caret => Some(BinaryOp::BitXor),
            TokenKind::Ampersand => Some(BinaryOp::BitAnd),
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::Ne => Some(BinaryOp::Ne),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            TokenKind::LeftShift => Some(BinaryOp::Shl),
            TokenKind::RightShift => Some(BinaryOp::Shr),
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Remainder => Some(BinaryOp::Rem),
            _ => None,
        }
    }

    /// ascending precedence; climbing parses while strictly greater
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Assign => 10,
            BinaryOp::Or => 15,
            BinaryOp::And => 20,
            BinaryOp::BitOr => 25,
            BinaryOp::BitXor => 30,
            BinaryOp::BitAnd => 35,
            BinaryOp::Eq | BinaryOp::Ne => 50,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 60,
            BinaryOp::Shl | BinaryOp::Shr => 70,
            BinaryOp::Add | BinaryOp::Sub => 80,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 90,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Assign => "=",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(i32),
    Variable(String),
    Prefix {
        op: PrefixOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// ordered statement sequence; the block's value is the last statement's
    Block(Vec<Expr>),
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    /// `let name;` is desugared to `let name = 0;` by the parser
    Let {
        name: String,
        init: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn prefix(op: PrefixOp, operand: Expr) -> Self {
        Expr::Prefix {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

/// Name and parameter list of a function, without a body. Declared by
/// `extern` or as the header of a `def`.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<String>,
}

/// A `def`: prototype plus body. The body is always a [`Expr::Block`].
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub prototype: Prototype,
    pub body: Expr,
}

/// One top-level form of a source file.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(Function),
    Extern(Prototype),
}
