use std::sync::Arc;

use catalog::{CatalogGuard, Sequence};
use common::{DbResult, Mode};
use types::Value;

use crate::Expr;

/// Session services an expression needs while it is optimized or evaluated.
pub trait SessionContext {
    /// Schema unqualified names resolve in.
    fn current_schema_name(&self) -> &str;

    fn mode(&self) -> &Mode;

    /// Read access to the shared catalog. Drop the guard before calling
    /// back into the session.
    fn catalog(&self) -> CatalogGuard<'_>;

    /// Parse one standalone expression.
    fn parse_expression(&self, sql: &str) -> DbResult<Expr>;

    /// Last value this session obtained from `sequence`. What happens before
    /// the first allocation is up to the session's [`Mode`].
    fn current_value_for(&self, sequence: &Sequence) -> DbResult<Value>;

    /// Allocate the next value of `sequence` and record it as the session's
    /// current value. Every call allocates.
    fn next_value_for(&mut self, sequence: &Arc<Sequence>) -> DbResult<Value>;
}
