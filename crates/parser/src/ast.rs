use catalog::SequenceOptions;
use expr::Expr;

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    CreateSchema {
        name: String,
        if_not_exists: bool,
    },
    DropSchema {
        name: String,
        if_exists: bool,
        cascade: bool,
    },
    CreateSequence {
        /// `None` when the name is unqualified.
        schema: Option<String>,
        name: String,
        if_not_exists: bool,
        options: SequenceOptions,
    },
    DropSequence {
        schema: Option<String>,
        name: String,
        if_exists: bool,
    },
    /// `SET SCHEMA = name`, `SET SCHEMA TO name` or `SET search_path = name`.
    SetSchema {
        name: String,
    },
    /// Projection without FROM, e.g. `SELECT NEXTVAL('s'), 1 = 1`.
    Select {
        items: Vec<SelectItem>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    /// Output column name: the alias, otherwise the expression's SQL.
    pub fn output_name(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.expr.to_sql())
    }
}
