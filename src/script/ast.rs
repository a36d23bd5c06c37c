use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Local {
        names: Vec<String>,
        values: Vec<Expr>,
        line: usize,
    },
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
        line: usize,
    },
    Call {
        call: Expr,
    },
    Do(Block),
    If {
        branches: Vec<(Expr, Block)>,
        otherwise: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    NumericFor {
        var: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: Block,
        line: usize,
    },
    GenericFor {
        vars: Vec<String>,
        iter: Expr,
        body: Block,
        line: usize,
    },
    LocalFunction {
        name: String,
        func: Rc<FuncBody>,
    },
    Return {
        values: Vec<Expr>,
    },
    Break,
}

#[derive(Debug)]
pub struct FuncBody {
    pub params: Vec<String>,
    pub body: Block,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Nil,
    True,
    False,
    Number(f64),
    Str(Rc<str>),
    Name(String),
    Index {
        obj: Box<Expr>,
        key: Box<Expr>,
        line: usize,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: usize,
    },
    Function(Rc<FuncBody>),
    Table(Vec<TableField>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: usize,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        line: usize,
    },
}

#[derive(Debug, Clone)]
pub enum TableField {
    Positional(Expr),
    Named(Rc<str>, Expr),
    Keyed(Expr, Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Len,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}
