/// Capability query the planner asks of an expression tree.
///
/// Every variant is answered by [`crate::Expr::is_everything`]. Collecting
/// variants (`GetDependencies`, `GetColumns`) accumulate into their fields as
/// the tree is walked; the rest are pure yes/no questions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpressionVisitor {
    /// Value does not depend on the row or session it is evaluated in.
    Independent,
    /// Can be answered from index statistics alone.
    OptimizableAggregate,
    /// Same inputs always give the same result.
    Deterministic,
    /// All referenced columns are available.
    Evaluatable,
    /// Track the highest data modification id the expression depends on.
    SetMaxDataModificationId { max_id: u64 },
    /// Evaluation does not change any state.
    ReadOnly,
    /// No column is taken from `table`.
    NotFromResolver { table: String },
    /// Collect the objects the expression depends on.
    GetDependencies { dependencies: Vec<String> },
    /// Result may be compared across query rewrites.
    QueryComparable,
    /// Collect referenced columns, only those of `table` when set.
    GetColumns {
        table: Option<String>,
        columns: Vec<String>,
    },
}

impl ExpressionVisitor {
    pub fn get_dependencies() -> Self {
        ExpressionVisitor::GetDependencies {
            dependencies: Vec::new(),
        }
    }

    pub fn get_columns(table: Option<&str>) -> Self {
        ExpressionVisitor::GetColumns {
            table: table.map(str::to_string),
            columns: Vec::new(),
        }
    }

    pub fn not_from_resolver(table: &str) -> Self {
        ExpressionVisitor::NotFromResolver {
            table: table.to_string(),
        }
    }

    /// Collected items of a collecting visitor, empty for the others.
    pub fn collected(&self) -> &[String] {
        match self {
            ExpressionVisitor::GetDependencies { dependencies } => dependencies,
            ExpressionVisitor::GetColumns { columns, .. } => columns,
            _ => &[],
        }
    }

    /// Answer for a column reference.
    pub(crate) fn visit_column(&mut self, table: Option<&str>, name: &str) -> bool {
        match self {
            ExpressionVisitor::Independent | ExpressionVisitor::OptimizableAggregate => false,
            ExpressionVisitor::Deterministic
            | ExpressionVisitor::Evaluatable
            | ExpressionVisitor::SetMaxDataModificationId { .. }
            | ExpressionVisitor::ReadOnly
            | ExpressionVisitor::QueryComparable => true,
            ExpressionVisitor::NotFromResolver { table: resolver } => {
                !table.is_some_and(|t| t.eq_ignore_ascii_case(resolver))
            }
            ExpressionVisitor::GetDependencies { dependencies } => {
                if let Some(table) = table {
                    if !dependencies.iter().any(|d| d == table) {
                        dependencies.push(table.to_string());
                    }
                }
                true
            }
            ExpressionVisitor::GetColumns {
                table: wanted,
                columns,
            } => {
                let selected = match wanted {
                    Some(wanted) => table.is_some_and(|t| t.eq_ignore_ascii_case(wanted)),
                    None => true,
                };
                if selected {
                    let column = match table {
                        Some(t) => format!("{t}.{name}"),
                        None => name.to_string(),
                    };
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
                true
            }
        }
    }
}
