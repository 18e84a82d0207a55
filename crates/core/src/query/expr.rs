//! Predicate expression tree handed to the translator.

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// `target.contains(arg)` on a string or list field.
    Contains,
    /// `target.starts_with(arg)` on a string field.
    StartsWith,
    /// `[values].contains(field)`: membership of a field in a literal list.
    ListContains,
    /// Any other call; never translatable.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Value),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Call {
        method: Method,
        target: Box<Expr>,
        args: Vec<Expr>,
    },
}

/// A field reference.
pub fn field(name: impl Into<String>) -> Expr {
    Expr::Field(name.into())
}

/// A literal operand.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// `values.contains(field)`.
pub fn one_of(values: impl IntoIterator<Item = Value>, field_name: impl Into<String>) -> Expr {
    Expr::Call {
        method: Method::ListContains,
        target: Box::new(Expr::Literal(Value::List(values.into_iter().collect()))),
        args: vec![field(field_name)],
    }
}

impl Expr {
    fn compare(self, op: CompareOp, other: impl IntoOperand) -> Expr {
        Expr::Compare {
            op,
            left: Box::new(self),
            right: Box::new(other.into_operand()),
        }
    }

    pub fn eq(self, other: impl IntoOperand) -> Expr {
        self.compare(CompareOp::Eq, other)
    }

    pub fn ne(self, other: impl IntoOperand) -> Expr {
        self.compare(CompareOp::Ne, other)
    }

    pub fn lt(self, other: impl IntoOperand) -> Expr {
        self.compare(CompareOp::Lt, other)
    }

    pub fn le(self, other: impl IntoOperand) -> Expr {
        self.compare(CompareOp::Le, other)
    }

    pub fn gt(self, other: impl IntoOperand) -> Expr {
        self.compare(CompareOp::Gt, other)
    }

    pub fn ge(self, other: impl IntoOperand) -> Expr {
        self.compare(CompareOp::Ge, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    pub fn contains(self, needle: impl IntoOperand) -> Expr {
        Expr::Call {
            method: Method::Contains,
            target: Box::new(self),
            args: vec![needle.into_operand()],
        }
    }

    pub fn starts_with(self, prefix: impl IntoOperand) -> Expr {
        Expr::Call {
            method: Method::StartsWith,
            target: Box::new(self),
            args: vec![prefix.into_operand()],
        }
    }

    pub fn call(self, method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            method: Method::Other(method.into()),
            target: Box::new(self),
            args,
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// Anything usable as the right-hand operand of a builder call: an [`Expr`]
/// or a plain value that becomes a literal.
pub trait IntoOperand {
    fn into_operand(self) -> Expr;
}

impl IntoOperand for Expr {
    fn into_operand(self) -> Expr {
        self
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOperand for $ty {
                fn into_operand(self) -> Expr {
                    Expr::Literal(Value::from(self))
                }
            }
        )*
    };
}

literal_operand!(Value, &str, String, i64, i32, u32, f64, bool, Vec<u8>);
