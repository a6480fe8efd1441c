//! Language-neutral syntax tree consumed by the engine.
//!
//! Every front end lowers its own AST into [`SyntaxNode`] through a
//! [`NodeAdapter`](crate::adapter::NodeAdapter). Downstream components only
//! ever match on these variants.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Arithmetic and comparison operators that survive lowering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne
        )
    }

    /// The comparison obtained by swapping both operands (`a < b` is `b > a`).
    pub fn flipped(self) -> BinOp {
        match self {
            BinOp::Lt => BinOp::Gt,
            BinOp::Le => BinOp::Ge,
            BinOp::Gt => BinOp::Lt,
            BinOp::Ge => BinOp::Le,
            other => other,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

/// A statement or expression of the analysed function.
///
/// Calls reference their target by name, so recursion never creates a
/// cycle in the tree itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntaxNode {
    Sequence(Vec<SyntaxNode>),
    Conditional {
        condition: Box<SyntaxNode>,
        then_branch: Box<SyntaxNode>,
        else_branch: Option<Box<SyntaxNode>>,
    },
    /// `step` is either a constant increment or an update expression
    /// written in terms of `iterator` (for example `i * 2`).
    ForLoop {
        iterator: String,
        start: Box<SyntaxNode>,
        stop: Box<SyntaxNode>,
        step: Box<SyntaxNode>,
        body: Box<SyntaxNode>,
    },
    WhileLoop {
        condition: Box<SyntaxNode>,
        body: Box<SyntaxNode>,
    },
    Call {
        callee: String,
        args: Vec<SyntaxNode>,
    },
    Assignment {
        target: String,
        value: Box<SyntaxNode>,
    },
    BinaryOp {
        op: BinOp,
        left: Box<SyntaxNode>,
        right: Box<SyntaxNode>,
    },
    Literal(i128),
    Identifier(String),
    Return(Option<Box<SyntaxNode>>),
    Pass,
}

impl SyntaxNode {
    pub fn ident(name: &str) -> SyntaxNode {
        SyntaxNode::Identifier(name.to_string())
    }

    pub fn lit(value: i128) -> SyntaxNode {
        SyntaxNode::Literal(value)
    }

    pub fn binary(op: BinOp, left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
        SyntaxNode::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(callee: &str, args: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::Call {
            callee: callee.to_string(),
            args,
        }
    }

    pub fn assign(target: &str, value: SyntaxNode) -> SyntaxNode {
        SyntaxNode::Assignment {
            target: target.to_string(),
            value: Box::new(value),
        }
    }

    /// `for iterator in range(start, stop, step): body`
    pub fn for_range(
        iterator: &str,
        start: SyntaxNode,
        stop: SyntaxNode,
        step: SyntaxNode,
        body: SyntaxNode,
    ) -> SyntaxNode {
        SyntaxNode::ForLoop {
            iterator: iterator.to_string(),
            start: Box::new(start),
            stop: Box::new(stop),
            step: Box::new(step),
            body: Box::new(body),
        }
    }

    pub fn while_loop(condition: SyntaxNode, body: SyntaxNode) -> SyntaxNode {
        SyntaxNode::WhileLoop {
            condition: Box::new(condition),
            body: Box::new(body),
        }
    }

    pub fn conditional(
        condition: SyntaxNode,
        then_branch: SyntaxNode,
        else_branch: Option<SyntaxNode>,
    ) -> SyntaxNode {
        SyntaxNode::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        }
    }

    pub fn ret(value: Option<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::Return(value.map(Box::new))
    }

    /// Statements of a block; a non-sequence node is a block of one.
    pub fn statements(&self) -> &[SyntaxNode] {
        match self {
            SyntaxNode::Sequence(stmts) => stmts,
            other => std::slice::from_ref(other),
        }
    }

    /// Identifiers read anywhere inside this expression.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            SyntaxNode::Identifier(name) => out.push(name),
            SyntaxNode::BinaryOp { left, right, .. } => {
                left.collect_identifiers(out);
                right.collect_identifiers(out);
            }
            SyntaxNode::Call { args, .. } => {
                for arg in args {
                    arg.collect_identifiers(out);
                }
            }
            _ => {}
        }
    }

    /// Names assigned anywhere in this subtree, loop iterators included.
    pub fn assigned_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_assigned(&mut out);
        out
    }

    fn collect_assigned<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            SyntaxNode::Assignment { target, .. } => out.push(target),
            SyntaxNode::Sequence(stmts) => {
                for stmt in stmts {
                    stmt.collect_assigned(out);
                }
            }
            SyntaxNode::Conditional {
                then_branch,
                else_branch,
                ..
            } => {
                then_branch.collect_assigned(out);
                if let Some(else_branch) = else_branch {
                    else_branch.collect_assigned(out);
                }
            }
            SyntaxNode::ForLoop { iterator, body, .. } => {
                out.push(iterator);
                body.collect_assigned(out);
            }
            SyntaxNode::WhileLoop { body, .. } => body.collect_assigned(out),
            _ => {}
        }
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxNode::Literal(v) => write!(f, "{v}"),
            SyntaxNode::Identifier(name) => write!(f, "{name}"),
            SyntaxNode::BinaryOp { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            SyntaxNode::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{callee}({})", args.join(", "))
            }
            SyntaxNode::Assignment { target, value } => write!(f, "{target} = {value}"),
            SyntaxNode::Return(Some(value)) => write!(f, "return {value}"),
            SyntaxNode::Return(None) => write!(f, "return"),
            SyntaxNode::Pass => write!(f, "pass"),
            SyntaxNode::Sequence(_) => write!(f, "<block>"),
            SyntaxNode::Conditional { .. } => write!(f, "<if>"),
            SyntaxNode::ForLoop { iterator, .. } => write!(f, "<for {iterator}>"),
            SyntaxNode::WhileLoop { condition, .. } => write!(f, "<while {condition}>"),
        }
    }
}

/// One analysable function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub name: String,
    pub params: Vec<String>,
    pub body: SyntaxNode,
}

impl FunctionNode {
    pub fn new(name: &str, params: &[&str], body: Vec<SyntaxNode>) -> Self {
        FunctionNode {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: SyntaxNode::Sequence(body),
        }
    }
}
