use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use catalog::{CatalogGuard, Sequence, SequenceId, SequenceOptions};
use common::{CurrvalPolicy, DbError, DbResult, Mode, Row};
use expr::{EvalContext, Expr, SessionContext};
use parser::{SelectItem, Statement, parse_sql};
use tracing::{debug, info, trace};
use types::Value;

use crate::{Database, QueryResult};

/// Per-connection state.
///
/// A session is used by one thread at a time. Its recorded sequence values
/// are private to it and disappear when it is dropped.
pub struct Session {
    id: u64,
    database: Arc<Database>,
    current_schema: String,
    mode: Mode,
    current_values: HashMap<SequenceId, Value>,
}

impl Session {
    pub(crate) fn new(id: u64, database: Arc<Database>) -> Self {
        let config = database.config();
        let current_schema = config.default_schema.clone();
        let mode = config.mode.clone();
        info!(session = id, schema = %current_schema, mode = %mode.name, "session opened");
        Self {
            id,
            database,
            current_schema,
            mode,
            current_values: HashMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn current_schema(&self) -> &str {
        &self.current_schema
    }

    /// Switch the current schema. The name resolves exactly, then upper-cased.
    pub fn set_schema(&mut self, name: &str) -> DbResult<()> {
        let resolved = self.database.catalog().read().resolve_schema(name)?.name.clone();
        debug!(session = self.id, schema = %resolved, "current schema changed");
        self.current_schema = resolved;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) {
        debug!(session = self.id, mode = %mode.name, "mode changed");
        self.mode = mode;
    }

    /// Optimize and evaluate a standalone expression.
    pub fn evaluate(&mut self, expr: Expr) -> DbResult<Value> {
        let expr = expr.optimize(&*self)?;
        let mut ctx = EvalContext::with_session(&[], self);
        ctx.eval(&expr, &Row::new(Vec::new()))
    }

    /// Execute every statement in `sql`, returning the last result.
    pub fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        let statements = parse_sql(sql)?;
        let mut result = QueryResult::Empty;
        for statement in statements {
            debug!(session = self.id, ?statement, "executing statement");
            result = self.execute_statement(statement)?;
        }
        Ok(result)
    }

    fn execute_statement(&mut self, statement: Statement) -> DbResult<QueryResult> {
        match statement {
            Statement::CreateSchema {
                name,
                if_not_exists,
            } => {
                let mut catalog = self.database.catalog().write();
                if !(if_not_exists && catalog.find_schema(&name).is_some()) {
                    catalog.create_schema(&name)?;
                }
                Ok(QueryResult::Empty)
            }
            Statement::DropSchema {
                name,
                if_exists,
                cascade,
            } => {
                let mut catalog = self.database.catalog().write();
                if !(if_exists && catalog.find_schema(&name).is_none()) {
                    catalog.drop_schema(&name, cascade)?;
                }
                Ok(QueryResult::Empty)
            }
            Statement::CreateSequence {
                schema,
                name,
                if_not_exists,
                options,
            } => {
                let schema = schema.unwrap_or_else(|| self.current_schema.clone());
                self.create_sequence(&schema, &name, if_not_exists, options)
            }
            Statement::DropSequence {
                schema,
                name,
                if_exists,
            } => {
                let schema = schema.unwrap_or_else(|| self.current_schema.clone());
                let mut catalog = self.database.catalog().write();
                let exists = catalog.schema(&schema)?.find_sequence(&name).is_some();
                if exists || !if_exists {
                    catalog.drop_sequence(&schema, &name)?;
                }
                Ok(QueryResult::Empty)
            }
            Statement::SetSchema { name } => {
                self.set_schema(&name)?;
                Ok(QueryResult::Empty)
            }
            Statement::Select { items } => self.select(items),
        }
    }

    fn create_sequence(
        &self,
        schema: &str,
        name: &str,
        if_not_exists: bool,
        options: SequenceOptions,
    ) -> DbResult<QueryResult> {
        let mut catalog = self.database.catalog().write();
        if if_not_exists && catalog.schema(schema)?.find_sequence(name).is_some() {
            return Ok(QueryResult::Empty);
        }
        let id = catalog.create_sequence(schema, name, options)?;
        debug!(session = self.id, schema, sequence = name, id = id.0, "sequence created");
        Ok(QueryResult::Empty)
    }

    fn select(&mut self, items: Vec<SelectItem>) -> DbResult<QueryResult> {
        let mut schema = Vec::with_capacity(items.len());
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            schema.push(item.output_name());
            let expr = item.expr.optimize(&*self)?;
            let mut ctx = EvalContext::with_session(&[], self);
            values.push(ctx.eval(&expr, &Row::new(Vec::new()))?);
        }
        trace!(session = self.id, columns = schema.len(), "select evaluated");
        Ok(QueryResult::Rows {
            schema,
            rows: vec![Row::new(values)],
        })
    }
}

impl SessionContext for Session {
    fn current_schema_name(&self) -> &str {
        &self.current_schema
    }

    fn mode(&self) -> &Mode {
        &self.mode
    }

    fn catalog(&self) -> CatalogGuard<'_> {
        self.database.catalog().read()
    }

    fn parse_expression(&self, sql: &str) -> DbResult<Expr> {
        parser::parse_expression(sql)
    }

    fn current_value_for(&self, sequence: &Sequence) -> DbResult<Value> {
        if let Some(value) = self.current_values.get(&sequence.id()) {
            return Ok(value.clone());
        }
        match self.mode.currval_policy {
            CurrvalPolicy::Error => Err(DbError::CurrentValueUndefined(sequence.qualified_name())),
            CurrvalPolicy::GeneratorValue => Ok(Value::Int(sequence.current_value())),
        }
    }

    fn next_value_for(&mut self, sequence: &Arc<Sequence>) -> DbResult<Value> {
        let value = Value::Int(sequence.next_value()?);
        trace!(
            session = self.id,
            sequence = %sequence.qualified_name(),
            %value,
            "sequence value allocated"
        );
        self.current_values.insert(sequence.id(), value.clone());
        Ok(value)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        info!(
            session = self.id,
            sequences = self.current_values.len(),
            "session closed"
        );
    }
}

