mod ast;

pub use ast::*;

use catalog::SequenceOptions;
use common::{DbError, DbResult};
use expr::{BinaryOp, Expr, SequenceValueFunction, UnaryOp};
use sqlparser::ast as sqlast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;
use sqlparser::tokenizer::Token;
use types::Value;

/// Parse SQL text into the internal AST statements.
pub fn parse_sql(sql: &str) -> DbResult<Vec<Statement>> {
    let dialect = GenericDialect {};
    let stmts = SqlParser::parse_sql(&dialect, sql)
        .map_err(|e| DbError::Parser(format!("SQL parse error: {e}")))?;

    stmts.into_iter().map(map_statement).collect()
}

/// Parse exactly one standalone expression; trailing input is rejected.
pub fn parse_expression(sql: &str) -> DbResult<Expr> {
    let dialect = GenericDialect {};
    let mut parser = SqlParser::new(&dialect)
        .try_with_sql(sql)
        .map_err(|e| DbError::Parser(format!("SQL parse error: {e}")))?;
    let expr = parser
        .parse_expr()
        .map_err(|e| DbError::Parser(format!("SQL parse error: {e}")))?;
    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(DbError::Parser(format!(
            "unexpected input after expression: {}",
            next.token
        )));
    }
    map_expr(expr)
}

fn map_statement(stmt: sqlast::Statement) -> DbResult<Statement> {
    use sqlast::Statement as SqlStatement;

    match stmt {
        SqlStatement::CreateSchema {
            schema_name,
            if_not_exists,
            ..
        } => {
            let name = match schema_name {
                sqlast::SchemaName::Simple(name) => single_name(&name)?,
                other => {
                    return Err(DbError::Parser(format!(
                        "unsupported schema name: {other}"
                    )));
                }
            };
            Ok(Statement::CreateSchema {
                name,
                if_not_exists,
            })
        }
        SqlStatement::Drop {
            object_type,
            if_exists,
            names,
            cascade,
            ..
        } => match object_type {
            sqlast::ObjectType::Schema => Ok(Statement::DropSchema {
                name: single_name(first_name(&names)?)?,
                if_exists,
                cascade,
            }),
            sqlast::ObjectType::Sequence => {
                let (schema, name) = qualified_name(first_name(&names)?)?;
                Ok(Statement::DropSequence {
                    schema,
                    name,
                    if_exists,
                })
            }
            _ => Err(DbError::Parser(format!(
                "unsupported DROP type: {object_type:?}"
            ))),
        },
        SqlStatement::CreateSequence {
            if_not_exists,
            name,
            sequence_options,
            ..
        } => {
            let (schema, name) = qualified_name(&name)?;
            let options = map_sequence_options(sequence_options)?;
            Ok(Statement::CreateSequence {
                schema,
                name,
                if_not_exists,
                options,
            })
        }
        SqlStatement::SetVariable {
            variable, value, ..
        } => map_set(&variable, value),
        SqlStatement::Query(query) => map_select(*query),
        _ => Err(DbError::Parser("unsupported statement".into())),
    }
}

fn map_set(variable: &sqlast::ObjectName, mut value: Vec<sqlast::Expr>) -> DbResult<Statement> {
    let variable = variable.to_string();
    if !variable.eq_ignore_ascii_case("schema") && !variable.eq_ignore_ascii_case("search_path") {
        return Err(DbError::Parser(format!("unsupported SET variable: {variable}")));
    }
    if value.len() != 1 {
        return Err(DbError::Parser("SET SCHEMA expects one schema name".into()));
    }
    let name = match value.remove(0) {
        sqlast::Expr::Identifier(ident) => normalize_ident(&ident),
        sqlast::Expr::Value(sqlast::Value::SingleQuotedString(s)) => s,
        other => {
            return Err(DbError::Parser(format!(
                "SET SCHEMA expects a schema name, got {other}"
            )));
        }
    };
    Ok(Statement::SetSchema { name })
}

fn map_sequence_options(options: Vec<sqlast::SequenceOptions>) -> DbResult<SequenceOptions> {
    use sqlast::SequenceOptions as SqlOption;

    let mut mapped = SequenceOptions::default();
    for option in options {
        match option {
            SqlOption::StartWith(expr, _) => mapped.start = Some(int_literal(expr)?),
            SqlOption::IncrementBy(expr, _) => mapped.increment = int_literal(expr)?,
            SqlOption::MinValue(bound) => mapped.min_value = bound_value(bound)?,
            SqlOption::MaxValue(bound) => mapped.max_value = bound_value(bound)?,
            // `Cycle(true)` is NO CYCLE.
            SqlOption::Cycle(no_cycle) => mapped.cycle = !no_cycle,
            SqlOption::Cache(_) => {}
        }
    }
    Ok(mapped)
}

/// `NO MINVALUE` / `NO MAXVALUE` leave the bound unset.
fn bound_value(bound: Option<sqlast::Expr>) -> DbResult<Option<i64>> {
    bound.map(int_literal).transpose()
}

fn int_literal(expr: sqlast::Expr) -> DbResult<i64> {
    match map_expr(expr)? {
        Expr::Literal(Value::Int(i)) => Ok(i),
        other => Err(DbError::Parser(format!(
            "expected integer literal, got {other}"
        ))),
    }
}

fn map_select(query: sqlast::Query) -> DbResult<Statement> {
    use sqlast::SetExpr;

    if !query.order_by.is_empty() || query.limit.is_some() || query.offset.is_some() {
        return Err(DbError::Parser(
            "ORDER BY, LIMIT and OFFSET not supported".into(),
        ));
    }

    let select = match *query.body {
        SetExpr::Select(select) => select,
        SetExpr::Values(_) => {
            return Err(DbError::Parser("standalone VALUES not supported".into()));
        }
        _ => return Err(DbError::Parser("SET operations not supported".into())),
    };

    let sqlast::Select {
        projection,
        from,
        selection,
        ..
    } = *select;

    if !from.is_empty() {
        return Err(DbError::Parser("SELECT ... FROM not supported".into()));
    }
    if selection.is_some() {
        return Err(DbError::Parser("WHERE requires FROM".into()));
    }
    let items = projection
        .into_iter()
        .map(map_select_item)
        .collect::<DbResult<Vec<_>>>()?;

    Ok(Statement::Select { items })
}

fn map_select_item(item: sqlast::SelectItem) -> DbResult<SelectItem> {
    match item {
        sqlast::SelectItem::UnnamedExpr(expr) => Ok(SelectItem {
            expr: map_expr(expr)?,
            alias: None,
        }),
        sqlast::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem {
            expr: map_expr(expr)?,
            alias: Some(normalize_ident(&alias)),
        }),
        sqlast::SelectItem::Wildcard(_) | sqlast::SelectItem::QualifiedWildcard(_, _) => {
            Err(DbError::Parser("wildcard requires FROM".into()))
        }
    }
}

fn map_expr(expr: sqlast::Expr) -> DbResult<Expr> {
    use sqlast::Expr as SqlExpr;

    match expr {
        SqlExpr::Identifier(ident) => Ok(Expr::Column {
            table: None,
            name: normalize_ident(&ident),
        }),
        SqlExpr::CompoundIdentifier(idents) => match idents.as_slice() {
            [name] => Ok(Expr::Column {
                table: None,
                name: normalize_ident(name),
            }),
            // `schema.table.column`: the leading part is dropped, the table
            // qualifier is kept.
            [table, name] | [_, table, name] => Ok(Expr::Column {
                table: Some(normalize_ident(table)),
                name: normalize_ident(name),
            }),
            _ => Err(DbError::Parser(format!(
                "too many name parts: {}",
                idents
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(".")
            ))),
        },
        SqlExpr::Value(value) => Ok(Expr::Literal(map_value(value)?)),
        SqlExpr::BinaryOp { left, op, right } => Ok(Expr::Binary {
            left: Box::new(map_expr(*left)?),
            op: map_binary_op(op)?,
            right: Box::new(map_expr(*right)?),
        }),
        SqlExpr::UnaryOp {
            op: sqlast::UnaryOperator::Minus,
            expr,
        } => match map_expr(*expr)? {
            Expr::Literal(Value::Int(i)) => i
                .checked_neg()
                .map(|n| Expr::Literal(Value::Int(n)))
                .ok_or_else(|| DbError::Parser(format!("integer literal out of range: -{i}"))),
            _ => Err(DbError::Parser("unary minus supports literals only".into())),
        },
        SqlExpr::UnaryOp { op, expr } => Ok(Expr::Unary {
            op: map_unary_op(op)?,
            expr: Box::new(map_expr(*expr)?),
        }),
        SqlExpr::Nested(expr) => map_expr(*expr),
        SqlExpr::Function(function) => map_function(function),
        other => Err(DbError::Parser(format!("unsupported expr: {other}"))),
    }
}

/// `NEXTVAL`/`CURRVAL` with one (dynamic name) or two (schema, name) arguments.
fn map_function(function: sqlast::Function) -> DbResult<Expr> {
    let sqlast::Function { name, args, .. } = function;
    let fname = name.to_string();
    let current = if fname.eq_ignore_ascii_case("nextval") {
        false
    } else if fname.eq_ignore_ascii_case("currval") {
        true
    } else {
        return Err(DbError::Parser(format!("unsupported function: {fname}")));
    };

    let mut args = args
        .into_iter()
        .map(|arg| match arg {
            sqlast::FunctionArg::Unnamed(sqlast::FunctionArgExpr::Expr(expr)) => map_expr(expr),
            other => Err(DbError::Parser(format!(
                "unsupported argument to {fname}: {other}"
            ))),
        })
        .collect::<DbResult<Vec<_>>>()?
        .into_iter();

    match (args.next(), args.next(), args.next()) {
        (Some(left), right, None) => Ok(Expr::SequenceValue(SequenceValueFunction::new(
            left, right, current,
        ))),
        _ => Err(DbError::Parser(format!(
            "{} expects one or two arguments",
            fname.to_uppercase()
        ))),
    }
}

fn map_value(value: sqlast::Value) -> DbResult<Value> {
    use sqlast::Value as SqlValue;

    match value {
        SqlValue::Number(num, _) => {
            let parsed = num
                .parse::<i64>()
                .map_err(|_| DbError::Parser(format!("invalid int literal: {num}")))?;
            Ok(Value::Int(parsed))
        }
        SqlValue::SingleQuotedString(s) => Ok(Value::Text(s)),
        SqlValue::Boolean(b) => Ok(Value::Bool(b)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(DbError::Parser(format!("unsupported literal: {other:?}"))),
    }
}

fn map_binary_op(op: sqlast::BinaryOperator) -> DbResult<BinaryOp> {
    use sqlast::BinaryOperator as SqlBinary;

    Ok(match op {
        SqlBinary::Eq => BinaryOp::Eq,
        SqlBinary::NotEq => BinaryOp::Ne,
        SqlBinary::Lt => BinaryOp::Lt,
        SqlBinary::LtEq => BinaryOp::Le,
        SqlBinary::Gt => BinaryOp::Gt,
        SqlBinary::GtEq => BinaryOp::Ge,
        SqlBinary::And => BinaryOp::And,
        SqlBinary::Or => BinaryOp::Or,
        other => return Err(DbError::Parser(format!("unsupported operator: {other:?}"))),
    })
}

fn map_unary_op(op: sqlast::UnaryOperator) -> DbResult<UnaryOp> {
    use sqlast::UnaryOperator as SqlUnary;

    Ok(match op {
        SqlUnary::Not => UnaryOp::Not,
        other => {
            return Err(DbError::Parser(format!(
                "unsupported unary operator: {other:?}"
            )));
        }
    })
}

/// Unquoted identifiers fold to upper case, quoted ones keep their case.
fn normalize_ident(ident: &sqlast::Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_uppercase(),
    }
}

fn single_name(name: &sqlast::ObjectName) -> DbResult<String> {
    match name.0.as_slice() {
        [ident] => Ok(normalize_ident(ident)),
        _ => Err(DbError::Parser(format!("expected a simple name, got {name}"))),
    }
}

/// Split `[schema.]name`.
fn qualified_name(name: &sqlast::ObjectName) -> DbResult<(Option<String>, String)> {
    match name.0.as_slice() {
        [ident] => Ok((None, normalize_ident(ident))),
        [schema, ident] => Ok((Some(normalize_ident(schema)), normalize_ident(ident))),
        _ => Err(DbError::Parser(format!("invalid object name: {name}"))),
    }
}

fn first_name(names: &[sqlast::ObjectName]) -> DbResult<&sqlast::ObjectName> {
    match names {
        [name] => Ok(name),
        [] => Err(DbError::Parser("DROP requires a target".into())),
        _ => Err(DbError::Parser("DROP of several objects not supported".into())),
    }
}
