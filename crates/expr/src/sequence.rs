//! `NEXTVAL` and `CURRVAL` compatibility functions.
//!
//! Both accept either one argument, a dynamic name such as `'myseq'` or
//! `'app.myseq'`, or two arguments, a schema name and a sequence name. The
//! target sequence is looked up each time the function is evaluated.

use std::{fmt, sync::Arc};

use catalog::Sequence;
use common::{DbError, DbResult, Mode, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{SqlType, Value};

use crate::{EvalContext, Expr, ExpressionVisitor, SessionContext};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceValueFunction {
    left: Box<Expr>,
    right: Option<Box<Expr>>,
    current: bool,
    /// Fixed by `optimize`.
    ty: Option<SqlType>,
}

impl SequenceValueFunction {
    /// `current` selects `CURRVAL`; otherwise the function is `NEXTVAL`.
    pub fn new(left: Expr, right: Option<Expr>, current: bool) -> Self {
        Self {
            left: Box::new(left),
            right: right.map(Box::new),
            current,
            ty: None,
        }
    }

    pub fn name(&self) -> &'static str {
        if self.current { "CURRVAL" } else { "NEXTVAL" }
    }

    pub fn is_current(&self) -> bool {
        self.current
    }

    pub fn left(&self) -> &Expr {
        &self.left
    }

    pub fn right(&self) -> Option<&Expr> {
        self.right.as_deref()
    }

    /// Result type, `None` until the function has been optimized.
    pub fn result_type(&self) -> Option<&SqlType> {
        self.ty.as_ref()
    }

    pub fn optimize(self, session: &dyn SessionContext) -> DbResult<Self> {
        let left = (*self.left).optimize(session)?;
        let right = match self.right {
            Some(right) => Some(Box::new((*right).optimize(session)?)),
            None => None,
        };
        Ok(Self {
            left: Box::new(left),
            right,
            current: self.current,
            ty: Some(result_type_for(session.mode())),
        })
    }

    pub(crate) fn evaluate(&self, ctx: &mut EvalContext<'_>, row: &Row) -> DbResult<Value> {
        let first = ctx.eval(&self.left, row)?;
        let second = match &self.right {
            Some(right) => Some(ctx.eval(right, row)?),
            None => None,
        };
        let session = ctx.session.as_deref_mut().ok_or_else(|| {
            DbError::Executor(format!("{} requires a session", self.name()))
        })?;

        let (schema_name, sequence_name) = match second {
            None => split_dynamic_name(&*session, dynamic_name(&first)?)?,
            Some(second) => (dynamic_name(&first)?, dynamic_name(&second)?),
        };
        let sequence = resolve(&*session, &schema_name, &sequence_name)?;

        let value = if self.current {
            session.current_value_for(&sequence)?
        } else {
            session.next_value_for(&sequence)?
        };
        let ty = match &self.ty {
            Some(ty) => ty.clone(),
            None => result_type_for(session.mode()),
        };
        Ok(value.convert_to(&ty)?)
    }

    /// `Independent`, `Deterministic` and `QueryComparable` are always denied.
    /// `NEXTVAL` is never read-only; `CURRVAL` is read-only when its arguments
    /// are. Every other query is answered by the arguments.
    pub fn is_everything(&self, visitor: &mut ExpressionVisitor) -> bool {
        match *visitor {
            ExpressionVisitor::Independent
            | ExpressionVisitor::Deterministic
            | ExpressionVisitor::QueryComparable => false,
            ExpressionVisitor::ReadOnly => self.current && self.visit_arguments(visitor),
            ExpressionVisitor::OptimizableAggregate
            | ExpressionVisitor::Evaluatable
            | ExpressionVisitor::SetMaxDataModificationId { .. }
            | ExpressionVisitor::NotFromResolver { .. }
            | ExpressionVisitor::GetDependencies { .. }
            | ExpressionVisitor::GetColumns { .. } => self.visit_arguments(visitor),
        }
    }

    fn visit_arguments(&self, visitor: &mut ExpressionVisitor) -> bool {
        let left = self.left.is_everything(visitor);
        let right = self
            .right
            .as_ref()
            .is_none_or(|right| right.is_everything(visitor));
        left && right
    }
}

impl fmt::Display for SequenceValueFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.name(), self.left)?;
        if let Some(right) = &self.right {
            write!(f, ", {right}")?;
        }
        f.write_str(")")
    }
}

fn result_type_for(mode: &Mode) -> SqlType {
    if mode.decimal_sequences {
        SqlType::numeric_bigint()
    } else {
        SqlType::Int
    }
}

fn dynamic_name(value: &Value) -> DbResult<String> {
    value
        .to_text()
        .ok_or_else(|| DbError::Syntax(value.to_string()))
}

/// Split a single-argument name into schema and sequence.
///
/// A qualified reference names its schema. An unqualified one resolves in the
/// session's current schema and keeps the argument text as the sequence name.
fn split_dynamic_name(session: &dyn SessionContext, sql: String) -> DbResult<(String, String)> {
    match session.parse_expression(&sql) {
        Ok(Expr::Column {
            table: Some(schema),
            name,
        }) => Ok((schema, name)),
        Ok(Expr::Column { table: None, .. }) => {
            Ok((session.current_schema_name().to_string(), sql))
        }
        Ok(_) | Err(_) => Err(DbError::Syntax(sql)),
    }
}

fn resolve(
    session: &dyn SessionContext,
    schema_name: &str,
    sequence_name: &str,
) -> DbResult<Arc<Sequence>> {
    let catalog = session.catalog();
    let schema = catalog.resolve_schema(schema_name)?;
    let sequence = Arc::clone(schema.resolve_sequence(sequence_name)?);
    debug!(
        schema = %schema.name,
        sequence = %sequence.name(),
        requested_schema = schema_name,
        requested_sequence = sequence_name,
        "sequence resolved"
    );
    Ok(sequence)
}
