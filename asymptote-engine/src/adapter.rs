//! Node adapters: lowering language-specific syntax trees into
//! [`SyntaxNode`].
//!
//! [`PythonAstAdapter`] reads the JSON form of Python's `ast` module as
//! produced by `ast2json` and similar dumpers: every node is an object whose
//! `_type` key names the node class and whose other keys are the node's
//! fields.
//!
//! ```
//! use asymptote_engine::adapter::{NodeAdapter, PythonAstAdapter};
//! use serde_json::json;
//!
//! let module = json!({
//!     "_type": "Module",
//!     "body": [{
//!         "_type": "FunctionDef",
//!         "name": "noop",
//!         "args": {"_type": "arguments", "args": []},
//!         "body": [{"_type": "Pass"}],
//!     }],
//! });
//! let functions = PythonAstAdapter::new().adapt_module(&module).unwrap();
//! assert_eq!(functions[0].name, "noop");
//! ```

use serde_json::Value;

use crate::error::UnsupportedConstruct;
use crate::nodes::{BinOp, FunctionNode, SyntaxNode};

/// Name of the synthetic function holding module-level statements.
pub const MODULE_FUNCTION: &str = "<module>";

/// Lowers one front end's syntax tree into the engine's node model.
pub trait NodeAdapter {
    type Raw: ?Sized;

    /// Lower a single statement or expression.
    fn adapt(&self, raw: &Self::Raw) -> Result<SyntaxNode, UnsupportedConstruct>;

    /// Lower a whole module, failing on the first unsupported construct.
    fn adapt_module(&self, raw: &Self::Raw) -> Result<Vec<FunctionNode>, UnsupportedConstruct>;
}

/// One top-level function of a module, or the reason it could not be
/// lowered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleItem {
    Function(FunctionNode),
    Rejected {
        name: String,
        error: UnsupportedConstruct,
    },
}

impl ModuleItem {
    pub fn name(&self) -> &str {
        match self {
            ModuleItem::Function(function) => &function.name,
            ModuleItem::Rejected { name, .. } => name,
        }
    }
}

/// Node classes with no lowering rule.
const UNSUPPORTED: &[&str] = &[
    "Try",
    "TryStar",
    "With",
    "AsyncWith",
    "AsyncFor",
    "AsyncFunctionDef",
    "Lambda",
    "GeneratorExp",
    "ListComp",
    "SetComp",
    "DictComp",
    "Yield",
    "YieldFrom",
    "Await",
    "Match",
    "NamedExpr",
];

#[derive(Clone, Debug, Default)]
pub struct PythonAstAdapter {
    /// Set while lowering methods, so `self.m()` resolves to `Class.m`.
    class: Option<(String, String)>,
}

impl PythonAstAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower a `Module` node function by function. An unsupported construct
    /// only rejects the function containing it.
    pub fn adapt_items(&self, module: &Value) -> Result<Vec<ModuleItem>, UnsupportedConstruct> {
        if kind(module) != "Module" {
            return Err(UnsupportedConstruct::new(format!(
                "{} at module root",
                kind_or_missing(module)
            )));
        }
        let mut items = Vec::new();
        let mut module_statements = Vec::new();
        let mut module_error = None;

        for stmt in list(module, "body") {
            match kind(stmt) {
                "FunctionDef" => items.push(self.function_item(stmt, None)),
                "AsyncFunctionDef" => items.push(ModuleItem::Rejected {
                    name: str_field(stmt, "name").to_string(),
                    error: UnsupportedConstruct::new("AsyncFunctionDef"),
                }),
                "ClassDef" => items.extend(self.class_items(stmt)),
                "Import" | "ImportFrom" => {}
                _ if module_error.is_none() => match self.statement(stmt) {
                    Ok(SyntaxNode::Pass) => {}
                    Ok(node) => module_statements.push(node),
                    Err(error) => module_error = Some(error),
                },
                _ => {}
            }
        }

        match module_error {
            Some(error) => items.push(ModuleItem::Rejected {
                name: MODULE_FUNCTION.to_string(),
                error,
            }),
            None if !module_statements.is_empty() => {
                items.push(ModuleItem::Function(FunctionNode {
                    name: MODULE_FUNCTION.to_string(),
                    params: Vec::new(),
                    body: SyntaxNode::Sequence(module_statements),
                }))
            }
            None => {}
        }
        Ok(items)
    }

    fn class_items(&self, class: &Value) -> Vec<ModuleItem> {
        let class_name = str_field(class, "name");
        let mut items = Vec::new();
        for stmt in list(class, "body") {
            match kind(stmt) {
                "FunctionDef" => items.push(self.function_item(stmt, Some(class_name))),
                "AsyncFunctionDef" | "ClassDef" => items.push(ModuleItem::Rejected {
                    name: format!("{class_name}.{}", str_field(stmt, "name")),
                    error: UnsupportedConstruct::new(match kind(stmt) {
                        "ClassDef" => "nested class",
                        other => other,
                    }),
                }),
                // Class attributes are evaluated once at definition time.
                _ => {}
            }
        }
        items
    }

    fn function_item(&self, def: &Value, class: Option<&str>) -> ModuleItem {
        let name = match class {
            Some(class) => format!("{class}.{}", str_field(def, "name")),
            None => str_field(def, "name").to_string(),
        };
        match self.function(def, class) {
            Ok(function) => ModuleItem::Function(function),
            Err(error) => ModuleItem::Rejected { name, error },
        }
    }

    fn function(&self, def: &Value, class: Option<&str>) -> Result<FunctionNode, UnsupportedConstruct> {
        let args = field(def, "args");
        let mut params: Vec<String> = ["posonlyargs", "args", "kwonlyargs"]
            .iter()
            .flat_map(|key| list(args, key))
            .chain(["vararg", "kwarg"].iter().map(|key| field(args, key)))
            .filter(|arg| !arg.is_null())
            .map(|arg| str_field(arg, "arg").to_string())
            .collect();

        let mut adapter = self.clone();
        let name = str_field(def, "name");
        let qualified = match class {
            Some(class) => {
                let is_static = list(def, "decorator_list")
                    .iter()
                    .any(|d| kind(d) == "Name" && str_field(d, "id") == "staticmethod");
                if !is_static && !params.is_empty() {
                    let receiver = params.remove(0);
                    adapter.class = Some((class.to_string(), receiver));
                }
                format!("{class}.{name}")
            }
            None => name.to_string(),
        };

        let body = adapter.block(list(def, "body"))?;
        Ok(FunctionNode {
            name: qualified,
            params,
            body,
        })
    }

    fn block(&self, stmts: &[Value]) -> Result<SyntaxNode, UnsupportedConstruct> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match self.statement(stmt)? {
                SyntaxNode::Pass => {}
                node => out.push(node),
            }
        }
        Ok(SyntaxNode::Sequence(out))
    }

    fn statement(&self, stmt: &Value) -> Result<SyntaxNode, UnsupportedConstruct> {
        let k = kind(stmt);
        if UNSUPPORTED.contains(&k) {
            return Err(UnsupportedConstruct::new(k));
        }
        match k {
            "FunctionDef" => Err(UnsupportedConstruct::new("nested function")),
            "ClassDef" => Err(UnsupportedConstruct::new("nested class")),
            "For" => {
                let iterator = target_name(field(stmt, "target"));
                let (start, stop, step) = self.iteration(field(stmt, "iter"))?;
                let lp = SyntaxNode::for_range(
                    &iterator,
                    start,
                    stop,
                    step,
                    self.block(list(stmt, "body"))?,
                );
                self.with_orelse(lp, stmt)
            }
            "While" => {
                let lp = SyntaxNode::while_loop(
                    self.expression(field(stmt, "test"))?,
                    self.block(list(stmt, "body"))?,
                );
                self.with_orelse(lp, stmt)
            }
            "If" => {
                let orelse = list(stmt, "orelse");
                Ok(SyntaxNode::conditional(
                    self.expression(field(stmt, "test"))?,
                    self.block(list(stmt, "body"))?,
                    if orelse.is_empty() {
                        None
                    } else {
                        Some(self.block(orelse)?)
                    },
                ))
            }
            "Assign" => {
                let value = self.expression(field(stmt, "value"))?;
                let targets = list(stmt, "targets");
                let mut out = Vec::with_capacity(targets.len());
                for target in targets {
                    out.extend(self.assign(target, value.clone(), field(stmt, "value"))?);
                }
                Ok(match out.len() {
                    1 => out.remove(0),
                    _ => SyntaxNode::Sequence(out),
                })
            }
            "AugAssign" => {
                let target = field(stmt, "target");
                let op = binop(kind(field(stmt, "op")))?;
                let value = SyntaxNode::binary(
                    op,
                    self.expression(target)?,
                    self.expression(field(stmt, "value"))?,
                );
                Ok(SyntaxNode::assign(&target_name(target), value))
            }
            "AnnAssign" => match field(stmt, "value") {
                Value::Null => Ok(SyntaxNode::Pass),
                value => Ok(SyntaxNode::assign(
                    &target_name(field(stmt, "target")),
                    self.expression(value)?,
                )),
            },
            "Expr" => match field(stmt, "value") {
                // Docstrings and other bare constants.
                value if matches!(kind(value), "Constant" | "Str" | "Num") => Ok(SyntaxNode::Pass),
                value => self.expression(value),
            },
            "Return" => match field(stmt, "value") {
                Value::Null => Ok(SyntaxNode::ret(None)),
                value => Ok(SyntaxNode::ret(Some(self.expression(value)?))),
            },
            "Raise" => match field(stmt, "exc") {
                Value::Null => Ok(SyntaxNode::ret(None)),
                exc => Ok(SyntaxNode::ret(Some(self.expression(exc)?))),
            },
            "Assert" => self.expression(field(stmt, "test")),
            "Pass" | "Break" | "Continue" | "Import" | "ImportFrom" | "Global" | "Nonlocal"
            | "Delete" => Ok(SyntaxNode::Pass),
            other => Err(UnsupportedConstruct::new(kind_or_missing_str(other))),
        }
    }

    /// `else:` of a loop runs once after it.
    fn with_orelse(&self, lp: SyntaxNode, stmt: &Value) -> Result<SyntaxNode, UnsupportedConstruct> {
        let orelse = list(stmt, "orelse");
        if orelse.is_empty() {
            return Ok(lp);
        }
        let mut out = vec![lp];
        out.extend(self.block(orelse)?.statements().iter().cloned());
        Ok(SyntaxNode::Sequence(out))
    }

    /// Start, stop and step of a `for` loop over `iter`.
    fn iteration(
        &self,
        iter: &Value,
    ) -> Result<(SyntaxNode, SyntaxNode, SyntaxNode), UnsupportedConstruct> {
        let one = SyntaxNode::lit(1);
        let zero = SyntaxNode::lit(0);
        match kind(iter) {
            "Call" if kind(field(iter, "func")) == "Name"
                && str_field(field(iter, "func"), "id") == "range" =>
            {
                let mut args = list(iter, "args")
                    .iter()
                    .map(|a| self.expression(a))
                    .collect::<Result<Vec<_>, _>>()?;
                match args.len() {
                    1 => Ok((zero, args.remove(0), one)),
                    2 => {
                        let stop = args.remove(1);
                        Ok((args.remove(0), stop, one))
                    }
                    3 => {
                        let step = args.remove(2);
                        let stop = args.remove(1);
                        Ok((args.remove(0), stop, step))
                    }
                    _ => Err(UnsupportedConstruct::new("range with unexpected arguments")),
                }
            }
            "List" | "Tuple" | "Set" => {
                let elts = list(iter, "elts");
                for elt in elts {
                    self.expression(elt)?;
                }
                Ok((zero, SyntaxNode::lit(elts.len() as i128), one))
            }
            _ => {
                let iterable = self.expression(iter)?;
                Ok((zero, SyntaxNode::call("len", vec![iterable]), one))
            }
        }
    }

    fn assign(
        &self,
        target: &Value,
        value: SyntaxNode,
        raw_value: &Value,
    ) -> Result<Vec<SyntaxNode>, UnsupportedConstruct> {
        if !matches!(kind(target), "Tuple" | "List") {
            return Ok(vec![SyntaxNode::assign(&target_name(target), value)]);
        }
        let names: Vec<String> = list(target, "elts").iter().map(target_name).collect();
        let elts = list(raw_value, "elts");
        let independent = matches!(kind(raw_value), "Tuple" | "List")
            && elts.len() == names.len()
            && elts.iter().enumerate().all(|(i, elt)| {
                let ids = self.expression(elt).map(|e| {
                    e.identifiers()
                        .into_iter()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                });
                ids.is_ok_and(|ids| {
                    names
                        .iter()
                        .enumerate()
                        .all(|(j, name)| j == i || !ids.contains(name))
                })
            });
        if independent {
            return names
                .iter()
                .zip(elts)
                .map(|(name, elt)| {
                    Ok::<_, UnsupportedConstruct>(SyntaxNode::assign(name, self.expression(elt)?))
                })
                .collect();
        }
        // Swaps and other entangled unpacking: evaluate once, forget targets.
        let mut out = vec![value];
        out.extend(
            names
                .iter()
                .map(|name| SyntaxNode::assign(name, SyntaxNode::ident("<unpacked>"))),
        );
        Ok(out)
    }

    fn expression(&self, expr: &Value) -> Result<SyntaxNode, UnsupportedConstruct> {
        let k = kind(expr);
        if UNSUPPORTED.contains(&k) {
            return Err(UnsupportedConstruct::new(k));
        }
        match k {
            "Name" => Ok(SyntaxNode::ident(str_field(expr, "id"))),
            "Constant" | "NameConstant" => Ok(SyntaxNode::lit(constant(field(expr, "value")))),
            "Num" => Ok(SyntaxNode::lit(constant(field(expr, "n")))),
            "Str" | "Bytes" | "Ellipsis" => Ok(SyntaxNode::lit(0)),
            "Attribute" => Ok(SyntaxNode::ident(&self.dotted(expr))),
            "Call" => self.call(expr),
            "BinOp" => Ok(SyntaxNode::binary(
                binop(kind(field(expr, "op")))?,
                self.expression(field(expr, "left"))?,
                self.expression(field(expr, "right"))?,
            )),
            "Compare" => self.compare(expr),
            "BoolOp" => {
                let op = match kind(field(expr, "op")) {
                    "And" => BinOp::And,
                    _ => BinOp::Or,
                };
                let mut values = list(expr, "values").iter().map(|v| self.expression(v));
                let first = values
                    .next()
                    .ok_or_else(|| UnsupportedConstruct::new("empty BoolOp"))??;
                values.try_fold(first, |acc, v| {
                    Ok::<_, UnsupportedConstruct>(SyntaxNode::binary(op, acc, v?))
                })
            }
            "UnaryOp" => {
                let operand = self.expression(field(expr, "operand"))?;
                Ok(match (kind(field(expr, "op")), operand) {
                    ("USub", SyntaxNode::Literal(v)) => SyntaxNode::lit(-v),
                    ("USub", operand) => SyntaxNode::binary(BinOp::Sub, SyntaxNode::lit(0), operand),
                    ("Not", operand) => SyntaxNode::binary(BinOp::Eq, operand, SyntaxNode::lit(0)),
                    ("Invert", operand) => {
                        SyntaxNode::binary(BinOp::Sub, SyntaxNode::lit(-1), operand)
                    }
                    (_, operand) => operand,
                })
            }
            "Subscript" => {
                let value = self.expression(field(expr, "value"))?;
                let mut slice = field(expr, "slice");
                if kind(slice) == "Index" {
                    slice = field(slice, "value");
                }
                if kind(slice) == "Slice" {
                    let lower = match field(slice, "lower") {
                        Value::Null => SyntaxNode::lit(0),
                        lower => self.expression(lower)?,
                    };
                    let upper = match field(slice, "upper") {
                        Value::Null => SyntaxNode::call("len", vec![value.clone()]),
                        upper => self.expression(upper)?,
                    };
                    Ok(SyntaxNode::call("slice", vec![value, lower, upper]))
                } else {
                    Ok(SyntaxNode::call("index", vec![value, self.expression(slice)?]))
                }
            }
            "List" | "Tuple" | "Set" => {
                let elts = list(expr, "elts")
                    .iter()
                    .map(|e| self.expression(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SyntaxNode::call("display", elts))
            }
            "Dict" => {
                let entries = list(expr, "keys")
                    .iter()
                    .chain(list(expr, "values"))
                    .filter(|e| !e.is_null())
                    .map(|e| self.expression(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SyntaxNode::call("display", entries))
            }
            "IfExp" => Ok(SyntaxNode::conditional(
                self.expression(field(expr, "test"))?,
                self.expression(field(expr, "body"))?,
                Some(self.expression(field(expr, "orelse"))?),
            )),
            "JoinedStr" => {
                let parts = list(expr, "values")
                    .iter()
                    .filter(|v| kind(v) == "FormattedValue")
                    .map(|v| self.expression(field(v, "value")))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SyntaxNode::call("str", parts))
            }
            "FormattedValue" | "Starred" => self.expression(field(expr, "value")),
            other => Err(UnsupportedConstruct::new(kind_or_missing_str(other))),
        }
    }

    fn call(&self, expr: &Value) -> Result<SyntaxNode, UnsupportedConstruct> {
        let func = field(expr, "func");
        let mut args = Vec::new();
        let callee = match kind(func) {
            "Name" => str_field(func, "id").to_string(),
            "Attribute" => self.dotted(func),
            _ => {
                args.push(self.expression(func)?);
                "<dynamic>".to_string()
            }
        };
        for arg in list(expr, "args") {
            args.push(self.expression(arg)?);
        }
        for keyword in list(expr, "keywords") {
            args.push(self.expression(field(keyword, "value"))?);
        }
        Ok(SyntaxNode::call(&callee, args))
    }

    /// `a < b` stays a comparison; chains become conjunctions. Membership
    /// tests become `contains` calls.
    fn compare(&self, expr: &Value) -> Result<SyntaxNode, UnsupportedConstruct> {
        let mut left = self.expression(field(expr, "left"))?;
        let mut result: Option<SyntaxNode> = None;
        for (op, comparator) in list(expr, "ops").iter().zip(list(expr, "comparators")) {
            let right = self.expression(comparator)?;
            let test = match kind(op) {
                "In" => SyntaxNode::call("contains", vec![right.clone(), left]),
                "NotIn" => SyntaxNode::binary(
                    BinOp::Eq,
                    SyntaxNode::call("contains", vec![right.clone(), left]),
                    SyntaxNode::lit(0),
                ),
                other => SyntaxNode::binary(compare_op(other)?, left, right.clone()),
            };
            result = Some(match result {
                None => test,
                Some(acc) => SyntaxNode::binary(BinOp::And, acc, test),
            });
            left = right;
        }
        result.ok_or_else(|| UnsupportedConstruct::new("empty Compare"))
    }

    /// `obj.attr` as a single dotted name, with the method receiver
    /// replaced by the class name.
    fn dotted(&self, expr: &Value) -> String {
        match kind(expr) {
            "Name" => {
                let id = str_field(expr, "id");
                match &self.class {
                    Some((class, receiver)) if receiver == id => class.clone(),
                    _ => id.to_string(),
                }
            }
            "Attribute" => format!(
                "{}.{}",
                self.dotted(field(expr, "value")),
                str_field(expr, "attr")
            ),
            "Call" => format!("{}()", self.dotted(field(expr, "func"))),
            _ => "<expr>".to_string(),
        }
    }
}

impl NodeAdapter for PythonAstAdapter {
    type Raw = Value;

    fn adapt(&self, raw: &Value) -> Result<SyntaxNode, UnsupportedConstruct> {
        match kind(raw) {
            "Module" => Ok(SyntaxNode::Sequence(
                self.adapt_module(raw)?
                    .into_iter()
                    .map(|f| f.body)
                    .collect(),
            )),
            "Expression" => self.expression(field(raw, "body")),
            _ => self.statement(raw).or_else(|_| self.expression(raw)),
        }
    }

    fn adapt_module(&self, raw: &Value) -> Result<Vec<FunctionNode>, UnsupportedConstruct> {
        self.adapt_items(raw)?
            .into_iter()
            .map(|item| match item {
                ModuleItem::Function(function) => Ok(function),
                ModuleItem::Rejected { error, .. } => Err(error),
            })
            .collect()
    }
}

fn kind(node: &Value) -> &str {
    node.get("_type").and_then(Value::as_str).unwrap_or("")
}

fn kind_or_missing(node: &Value) -> &str {
    kind_or_missing_str(kind(node))
}

fn kind_or_missing_str(kind: &str) -> &str {
    if kind.is_empty() {
        "node without _type"
    } else {
        kind
    }
}

fn field<'v>(node: &'v Value, name: &str) -> &'v Value {
    node.get(name).unwrap_or(&Value::Null)
}

fn list<'v>(node: &'v Value, name: &str) -> &'v [Value] {
    node.get(name)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn str_field<'v>(node: &'v Value, name: &str) -> &'v str {
    node.get(name).and_then(Value::as_str).unwrap_or("")
}

/// Integer and boolean constants keep their value; everything else is 0.
fn constant(value: &Value) -> i128 {
    match value {
        Value::Bool(b) => i128::from(*b),
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Name a target is assigned under; non-name targets get an opaque joined
/// name such as `a,b` or `arr[]`.
fn target_name(target: &Value) -> String {
    match kind(target) {
        "Name" => str_field(target, "id").to_string(),
        "Attribute" => format!(
            "{}.{}",
            target_name(field(target, "value")),
            str_field(target, "attr")
        ),
        "Subscript" => format!("{}[]", target_name(field(target, "value"))),
        "Tuple" | "List" => list(target, "elts")
            .iter()
            .map(target_name)
            .collect::<Vec<_>>()
            .join(","),
        "Starred" => target_name(field(target, "value")),
        _ => "<target>".to_string(),
    }
}

fn binop(op: &str) -> Result<BinOp, UnsupportedConstruct> {
    Ok(match op {
        "Add" => BinOp::Add,
        "Sub" => BinOp::Sub,
        "Mult" | "MatMult" => BinOp::Mul,
        "Div" => BinOp::Div,
        "FloorDiv" => BinOp::FloorDiv,
        "Mod" => BinOp::Mod,
        "Pow" => BinOp::Pow,
        "LShift" => BinOp::Shl,
        "RShift" => BinOp::Shr,
        "BitAnd" => BinOp::BitAnd,
        "BitOr" => BinOp::BitOr,
        "BitXor" => BinOp::BitXor,
        other => return Err(UnsupportedConstruct::new(format!("operator {other}"))),
    })
}

fn compare_op(op: &str) -> Result<BinOp, UnsupportedConstruct> {
    Ok(match op {
        "Lt" => BinOp::Lt,
        "LtE" => BinOp::Le,
        "Gt" => BinOp::Gt,
        "GtE" => BinOp::Ge,
        "Eq" | "Is" => BinOp::Eq,
        "NotEq" | "IsNot" => BinOp::Ne,
        other => return Err(UnsupportedConstruct::new(format!("comparison {other}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn name(id: &str) -> Value {
        json!({"_type": "Name", "id": id})
    }

    fn num(n: i64) -> Value {
        json!({"_type": "Constant", "value": n})
    }

    fn call(func: &str, args: Vec<Value>) -> Value {
        json!({"_type": "Call", "func": name(func), "args": args, "keywords": []})
    }

    fn def(name: &str, params: &[&str], body: Vec<Value>) -> Value {
        let args: Vec<Value> = params
            .iter()
            .map(|p| json!({"_type": "arg", "arg": p}))
            .collect();
        json!({
            "_type": "FunctionDef",
            "name": name,
            "args": {"_type": "arguments", "posonlyargs": [], "args": args, "kwonlyargs": []},
            "body": body,
            "decorator_list": [],
        })
    }

    fn module(body: Vec<Value>) -> Value {
        json!({"_type": "Module", "body": body})
    }

    #[test]
    fn test_for_over_range_variants() {
        let adapter = PythonAstAdapter::new();
        let stmt = json!({
            "_type": "For",
            "target": name("i"),
            "iter": call("range", vec![num(1), name("n"), num(2)]),
            "body": [{"_type": "Pass"}],
            "orelse": [],
        });
        assert_eq!(
            adapter.adapt(&stmt).unwrap(),
            SyntaxNode::for_range(
                "i",
                SyntaxNode::lit(1),
                SyntaxNode::ident("n"),
                SyntaxNode::lit(2),
                SyntaxNode::Sequence(vec![]),
            )
        );
    }

    #[test]
    fn test_for_over_collection_uses_len() {
        let adapter = PythonAstAdapter::new();
        let stmt = json!({
            "_type": "For",
            "target": name("x"),
            "iter": name("arr"),
            "body": [],
            "orelse": [],
        });
        let SyntaxNode::ForLoop { stop, .. } = adapter.adapt(&stmt).unwrap() else {
            panic!("expected a for loop");
        };
        assert_eq!(*stop, SyntaxNode::call("len", vec![SyntaxNode::ident("arr")]));
    }

    #[test]
    fn test_aug_assign() {
        let adapter = PythonAstAdapter::new();
        let stmt = json!({
            "_type": "AugAssign",
            "target": name("i"),
            "op": {"_type": "Mult"},
            "value": num(2),
        });
        assert_eq!(
            adapter.adapt(&stmt).unwrap(),
            SyntaxNode::assign(
                "i",
                SyntaxNode::binary(BinOp::Mul, SyntaxNode::ident("i"), SyntaxNode::lit(2))
            )
        );
    }

    #[test]
    fn test_slices() {
        let adapter = PythonAstAdapter::new();
        let expr = json!({
            "_type": "Subscript",
            "value": name("arr"),
            "slice": {"_type": "Slice", "lower": num(1), "upper": null, "step": null},
        });
        assert_eq!(
            adapter.adapt(&expr).unwrap(),
            SyntaxNode::call(
                "slice",
                vec![
                    SyntaxNode::ident("arr"),
                    SyntaxNode::lit(1),
                    SyntaxNode::call("len", vec![SyntaxNode::ident("arr")]),
                ]
            )
        );
    }

    #[test]
    fn test_chained_comparison() {
        let adapter = PythonAstAdapter::new();
        let expr = json!({
            "_type": "Compare",
            "left": num(0),
            "ops": [{"_type": "LtE"}, {"_type": "Lt"}],
            "comparators": [name("i"), name("n")],
        });
        assert_eq!(
            adapter.adapt(&expr).unwrap(),
            SyntaxNode::binary(
                BinOp::And,
                SyntaxNode::binary(BinOp::Le, SyntaxNode::lit(0), SyntaxNode::ident("i")),
                SyntaxNode::binary(BinOp::Lt, SyntaxNode::ident("i"), SyntaxNode::ident("n")),
            )
        );
    }

    #[test]
    fn test_unsupported_construct_is_named() {
        let adapter = PythonAstAdapter::new();
        let stmt = json!({"_type": "Try", "body": [], "handlers": [], "orelse": [], "finalbody": []});
        assert_eq!(
            adapter.adapt(&stmt).unwrap_err(),
            UnsupportedConstruct::new("Try")
        );
        let lambda = json!({"_type": "Lambda"});
        assert_eq!(
            adapter.adapt(&lambda).unwrap_err().construct,
            "Lambda"
        );
    }

    #[test]
    fn test_unsupported_function_is_rejected_alone() {
        let items = PythonAstAdapter::new()
            .adapt_items(&module(vec![
                def("ok", &["n"], vec![json!({"_type": "Pass"})]),
                def(
                    "bad",
                    &[],
                    vec![json!({"_type": "With", "items": [], "body": []})],
                ),
            ]))
            .unwrap();
        assert!(matches!(&items[0], ModuleItem::Function(f) if f.name == "ok"));
        assert_eq!(
            items[1],
            ModuleItem::Rejected {
                name: "bad".to_string(),
                error: UnsupportedConstruct::new("With"),
            }
        );
    }

    #[test]
    fn test_displays_are_constant_calls() {
        let adapter = PythonAstAdapter::new();
        let list = json!({"_type": "List", "elts": [name("a"), num(2)]});
        assert_eq!(
            adapter.adapt(&list).unwrap(),
            SyntaxNode::call("display", vec![SyntaxNode::ident("a"), SyntaxNode::lit(2)])
        );
        // `{**rest}` carries a null key.
        let dict = json!({"_type": "Dict", "keys": [null], "values": [name("rest")]});
        assert_eq!(
            adapter.adapt(&dict).unwrap(),
            SyntaxNode::call("display", vec![SyntaxNode::ident("rest")])
        );
        assert_eq!(
            crate::config::EngineConfig::default().builtin_cost("display"),
            Some(crate::complexity::ComplexityClass::O1)
        );
    }

    #[test]
    fn test_module_statements_form_synthetic_function() {
        let functions = PythonAstAdapter::new()
            .adapt_module(&module(vec![
                json!({"_type": "Import", "names": []}),
                def("f", &["n"], vec![]),
                json!({"_type": "Expr", "value": call("f", vec![num(10)])}),
            ]))
            .unwrap();
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[1].name, MODULE_FUNCTION);
        assert_eq!(
            functions[1].body,
            SyntaxNode::Sequence(vec![SyntaxNode::call("f", vec![SyntaxNode::lit(10)])])
        );
    }

    #[test]
    fn test_methods_are_qualified() {
        let method = json!({
            "_type": "FunctionDef",
            "name": "run",
            "args": {"_type": "arguments", "args": [
                {"_type": "arg", "arg": "self"},
                {"_type": "arg", "arg": "n"},
            ]},
            "body": [{
                "_type": "Expr",
                "value": {
                    "_type": "Call",
                    "func": {"_type": "Attribute", "value": name("self"), "attr": "step"},
                    "args": [name("n")],
                    "keywords": [],
                },
            }],
            "decorator_list": [],
        });
        let class = json!({"_type": "ClassDef", "name": "Job", "body": [method]});
        let functions = PythonAstAdapter::new()
            .adapt_module(&module(vec![class]))
            .unwrap();
        assert_eq!(functions[0].name, "Job.run");
        assert_eq!(functions[0].params, vec!["n".to_string()]);
        assert_eq!(
            functions[0].body,
            SyntaxNode::Sequence(vec![SyntaxNode::call(
                "Job.step",
                vec![SyntaxNode::ident("n")]
            )])
        );
    }

    #[test]
    fn test_swap_forgets_targets() {
        let adapter = PythonAstAdapter::new();
        let stmt = json!({
            "_type": "Assign",
            "targets": [{"_type": "Tuple", "elts": [name("a"), name("b")]}],
            "value": {"_type": "Tuple", "elts": [name("b"), {
                "_type": "BinOp", "left": name("a"), "op": {"_type": "Add"}, "right": name("b"),
            }]},
        });
        let SyntaxNode::Sequence(stmts) = adapter.adapt(&stmt).unwrap() else {
            panic!("expected a sequence");
        };
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[1], SyntaxNode::assign("a", SyntaxNode::ident("<unpacked>")));
    }
}
