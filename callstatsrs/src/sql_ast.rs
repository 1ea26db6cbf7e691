use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dialect::Dialect;
use crate::models::LogicalOperator;

/// A value headed for the warehouse, either as a bound parameter or as an
/// escaped literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    /// Convert a JSON scalar. Arrays and objects have no SQL scalar form.
    pub fn from_json(value: &Value) -> Option<SqlValue> {
        match value {
            Value::Null => Some(SqlValue::Null),
            Value::Bool(b) => Some(SqlValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(SqlValue::Int)
                .or_else(|| n.as_f64().map(SqlValue::Float)),
            Value::String(s) => Some(SqlValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// Whether values are bound as parameters or inlined as escaped literals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralMode {
    #[default]
    Bound,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
        }
    }
}

/// Boolean SQL fragments. Column names are expected to have passed
/// identifier validation before they get here.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    /// Trusted text, emitted as is.
    Raw(String),
    Compare {
        column: String,
        op: ComparisonOp,
        value: SqlValue,
    },
    Like {
        column: String,
        pattern: SqlValue,
        negated: bool,
    },
    Between {
        column: String,
        low: SqlValue,
        high: SqlValue,
        negated: bool,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    InList {
        column: String,
        values: Vec<SqlValue>,
    },
    Not(Box<SqlExpr>),
    Nested(Box<SqlExpr>),
    /// Items joined in order; the first item's operator is not emitted.
    Chain(Vec<(LogicalOperator, SqlExpr)>),
}

#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub columns: Vec<String>,
    pub from: String,
    pub filters: Vec<SqlExpr>,
    pub group_by: Option<String>,
    pub order_by: Vec<String>,
}

/// SQL text plus the parameters its placeholders refer to, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

pub struct SqlRenderer<'d> {
    dialect: &'d dyn Dialect,
    mode: LiteralMode,
}

impl<'d> SqlRenderer<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            mode: LiteralMode::Bound,
        }
    }

    pub fn with_mode(mut self, mode: LiteralMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn render_select(&self, query: &SelectQuery) -> RenderedSql {
        let mut out = RenderedSql::default();
        let columns = if query.columns.is_empty() {
            "*".to_string()
        } else {
            query.columns.join(", ")
        };
        out.sql = format!("SELECT {columns} FROM {} WHERE 1=1", query.from);

        for filter in &query.filters {
            out.sql.push_str(" AND ");
            self.write_expr(filter, &mut out);
        }

        if let Some(group) = &query.group_by {
            out.sql.push_str(&format!(" GROUP BY {group}"));
        }

        if !query.order_by.is_empty() {
            out.sql
                .push_str(&format!(" ORDER BY {}", query.order_by.join(", ")));
        }

        out
    }

    pub fn render_expr(&self, expr: &SqlExpr) -> RenderedSql {
        let mut out = RenderedSql::default();
        self.write_expr(expr, &mut out);
        out
    }

    fn write_expr(&self, expr: &SqlExpr, out: &mut RenderedSql) {
        match expr {
            SqlExpr::Raw(text) => out.sql.push_str(text),
            SqlExpr::Compare { column, op, value } => {
                out.sql.push_str(&format!("{column} {} ", op.as_str()));
                self.write_value(value, out);
            }
            SqlExpr::Like {
                column,
                pattern,
                negated,
            } => {
                let kw = if *negated { "NOT LIKE" } else { "LIKE" };
                out.sql.push_str(&format!("{column} {kw} "));
                self.write_value(pattern, out);
            }
            SqlExpr::Between {
                column,
                low,
                high,
                negated,
            } => {
                let kw = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                out.sql.push_str(&format!("{column} {kw} "));
                self.write_value(low, out);
                out.sql.push_str(" AND ");
                self.write_value(high, out);
            }
            SqlExpr::IsNull { column, negated } => {
                let kw = if *negated { "IS NOT NULL" } else { "IS NULL" };
                out.sql.push_str(&format!("{column} {kw}"));
            }
            SqlExpr::InList { column, values } => {
                if values.is_empty() {
                    // Nothing can match an empty set.
                    out.sql.push_str("1=0");
                    return;
                }
                out.sql.push_str(&format!("{column} IN ("));
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        out.sql.push_str(", ");
                    }
                    self.write_value(value, out);
                }
                out.sql.push(')');
            }
            SqlExpr::Not(inner) => {
                out.sql.push_str("NOT (");
                self.write_expr(inner, out);
                out.sql.push(')');
            }
            SqlExpr::Nested(inner) => {
                out.sql.push('(');
                self.write_expr(inner, out);
                out.sql.push(')');
            }
            SqlExpr::Chain(items) => {
                for (idx, (op, item)) in items.iter().enumerate() {
                    if idx > 0 {
                        out.sql.push_str(&format!(" {} ", op.as_str()));
                    }
                    self.write_expr(item, out);
                }
            }
        }
    }

    fn write_value(&self, value: &SqlValue, out: &mut RenderedSql) {
        match self.mode {
            LiteralMode::Inline => out.sql.push_str(&self.dialect.render_literal(value)),
            LiteralMode::Bound => {
                out.sql.push_str(&self.dialect.placeholder(out.params.len()));
                out.params.push(value.clone());
            }
        }
    }
}
