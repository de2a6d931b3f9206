//! Term representation: constants, variables, integers and builtin
//! operators.

/// Builtin operator constants usable as the first element of a builtin
/// atom tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    /// `#int(X)`: enumerates the integers up to the program's `#maxint`.
    Int,
    Succ,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BuiltinOp {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinOp::Eq => "=",
            BuiltinOp::Neq => "!=",
            BuiltinOp::Lt => "<",
            BuiltinOp::Le => "<=",
            BuiltinOp::Gt => ">",
            BuiltinOp::Ge => ">=",
            BuiltinOp::Int => "#int",
            BuiltinOp::Succ => "#succ",
            BuiltinOp::Add => "+",
            BuiltinOp::Sub => "-",
            BuiltinOp::Mul => "*",
            BuiltinOp::Div => "/",
            BuiltinOp::Mod => "#mod",
        }
    }
}

/// An interned term. Terms are flat; the solver core has no function
/// symbols.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    Constant(String),
    Variable(String),
    Integer(u32),
    Builtin(BuiltinOp),
}

impl Term {
    pub fn text(&self) -> String {
        match self {
            Term::Constant(name) | Term::Variable(name) => name.clone(),
            Term::Integer(value) => value.to_string(),
            Term::Builtin(op) => op.name().to_owned(),
        }
    }
}
