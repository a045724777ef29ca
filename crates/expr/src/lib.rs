
mod sequence;
mod session;
mod visitor;

pub use sequence::SequenceValueFunction;
pub use session::SessionContext;
pub use visitor::ExpressionVisitor;

use common::{DbError, DbResult, Row};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};
use types::Value;

/// Binary comparison and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        };
        f.write_str(op)
    }
}

/// Unary operators (currently just logical NOT).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
}

/// Expression abstract syntax tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    /// Column reference with optional table/alias qualifier.
    ///
    /// Examples:
    /// - `Column { table: None, name: "id" }` - unqualified column
    /// - `Column { table: Some("users"), name: "id" }` - qualified column
    Column {
        /// Optional table name or alias qualifier.
        table: Option<String>,
        /// Column name.
        name: String,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// `NEXTVAL(...)` or `CURRVAL(...)`.
    SequenceValue(SequenceValueFunction),
}

impl Expr {
    pub fn column(table: Option<&str>, name: &str) -> Self {
        Expr::Column {
            table: table.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn text(value: &str) -> Self {
        Expr::Literal(Value::Text(value.to_string()))
    }

    /// SQL text of the expression.
    pub fn to_sql(&self) -> String {
        self.to_string()
    }

    /// Simplify the tree bottom-up.
    ///
    /// Operators whose operands are all literals are folded into a literal.
    /// Folding that fails (for example a type mismatch) leaves the node in
    /// place so the error surfaces at evaluation.
    pub fn optimize(self, session: &dyn SessionContext) -> DbResult<Expr> {
        match self {
            Expr::Literal(_) | Expr::Column { .. } => Ok(self),
            Expr::Unary { op, expr } => {
                let expr = (*expr).optimize(session)?;
                Ok(fold_constant(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                }))
            }
            Expr::Binary { left, op, right } => {
                let left = (*left).optimize(session)?;
                let right = (*right).optimize(session)?;
                Ok(fold_constant(Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                }))
            }
            Expr::SequenceValue(function) => Ok(Expr::SequenceValue(function.optimize(session)?)),
        }
    }

    /// Answer a capability query for the whole tree.
    ///
    /// Operators visit every operand, even after one has answered `false`,
    /// so collecting visitors see all columns.
    pub fn is_everything(&self, visitor: &mut ExpressionVisitor) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::Column { table, name } => visitor.visit_column(table.as_deref(), name),
            Expr::Unary { expr, .. } => expr.is_everything(visitor),
            Expr::Binary { left, right, .. } => {
                let left = left.is_everything(visitor);
                let right = right.is_everything(visitor);
                left && right
            }
            Expr::SequenceValue(function) => function.is_everything(visitor),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Column {
                table: Some(table),
                name,
            } => write!(f, "{table}.{name}"),
            Expr::Column { table: None, name } => f.write_str(name),
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => write!(f, "NOT {expr}"),
            Expr::Binary { left, op, right } => write!(f, "({left} {op} {right})"),
            Expr::SequenceValue(function) => write!(f, "{function}"),
        }
    }
}

fn fold_constant(expr: Expr) -> Expr {
    let constant = match &expr {
        Expr::Unary { expr: inner, .. } => matches!(**inner, Expr::Literal(_)),
        Expr::Binary { left, right, .. } => {
            matches!(**left, Expr::Literal(_)) && matches!(**right, Expr::Literal(_))
        }
        _ => false,
    };
    if !constant {
        return expr;
    }
    match EvalContext::new(&[]).eval(&expr, &Row::new(Vec::new())) {
        Ok(value) => Expr::Literal(value),
        Err(_) => expr,
    }
}

/// Evaluation context: the row schema (column names in order) plus the
/// session sequence functions run against.
pub struct EvalContext<'a> {
    pub schema: &'a [String],
    pub session: Option<&'a mut dyn SessionContext>,
}

impl<'a> EvalContext<'a> {
    /// Context without a session; sequence functions fail to evaluate.
    pub fn new(schema: &'a [String]) -> Self {
        Self {
            schema,
            session: None,
        }
    }

    pub fn with_session(schema: &'a [String], session: &'a mut dyn SessionContext) -> Self {
        Self {
            schema,
            session: Some(session),
        }
    }

    /// Evaluate an expression over a given row.
    pub fn eval(&mut self, expr: &Expr, row: &Row) -> DbResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Column { table, name } => {
                let idx = self.find_column(table.as_deref(), name)?;
                row.values.get(idx).cloned().ok_or_else(|| {
                    DbError::Executor(format!(
                        "column {idx} missing from row of {} values",
                        row.values.len()
                    ))
                })
            }
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, row)?;
                match op {
                    UnaryOp::Not => {
                        if v.is_null() {
                            return Ok(Value::Null);
                        }
                        let b = v.as_bool().ok_or_else(|| {
                            DbError::Executor(format!("NOT expects bool, got {:?}", v))
                        })?;
                        Ok(Value::Bool(!b))
                    }
                }
            }
            Expr::Binary { left, op, right } => {
                let lv = self.eval(left, row)?;
                let rv = self.eval(right, row)?;
                eval_binary(&lv, *op, &rv)
            }
            Expr::SequenceValue(function) => function.evaluate(self, row),
        }
    }

    /// Find column index in schema, supporting qualified and unqualified references.
    ///
    /// - Qualified ref (`table.col`): Match `"table.col"` exactly
    /// - Unqualified ref (`col`): Match simple `"col"` or suffix `".col"`
    fn find_column(&self, table: Option<&str>, name: &str) -> DbResult<usize> {
        if let Some(qualifier) = table {
            let full_name = format!("{}.{}", qualifier, name);
            self.schema
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&full_name))
                .ok_or_else(|| DbError::Executor(format!("unknown column '{}.{}'", qualifier, name)))
        } else {
            let suffix = format!(".{}", name.to_lowercase());
            self.schema
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name) || c.to_lowercase().ends_with(&suffix))
                .ok_or_else(|| DbError::Executor(format!("unknown column '{}'", name)))
        }
    }
}

fn eval_binary(l: &Value, op: BinaryOp, r: &Value) -> DbResult<Value> {
    use BinaryOp::*;

    if let And | Or = op {
        let lb = l
            .as_bool()
            .ok_or_else(|| DbError::Executor(format!("AND/OR expects bools, got {:?}", l)))?;
        let rb = r
            .as_bool()
            .ok_or_else(|| DbError::Executor(format!("AND/OR expects bools, got {:?}", r)))?;
        let result = if op == And { lb && rb } else { lb || rb };
        return Ok(Value::Bool(result));
    }

    // Comparison with NULL is unknown.
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }

    let ord = l.cmp_same_type(r).ok_or_else(|| {
        DbError::Executor(format!("incompatible types for {:?}: {:?}, {:?}", op, l, r))
    })?;

    let result = match op {
        Eq => ord == Ordering::Equal,
        Ne => ord != Ordering::Equal,
        Lt => ord == Ordering::Less,
        Le => ord != Ordering::Greater,
        Gt => ord == Ordering::Greater,
        Ge => ord != Ordering::Less,
        And | Or => false,
    };

    Ok(Value::Bool(result))
}
