//! Advanced filter tree to SQL fragment translation.

use serde_json::Value;

use crate::models::{Condition, ConditionOperator, FilterNode, FilterTree, LogicalOperator};
use crate::sql_ast::{ComparisonOp, SqlExpr, SqlValue};

use super::sanitize::is_valid_identifier;
use super::warnings::CompileWarning;

/// Translate one condition. The output depends only on the input.
pub(crate) fn condition_to_sql(
    condition: &Condition,
    path: &str,
) -> Result<SqlExpr, CompileWarning> {
    let Some(operator) = condition.operator.as_ref().filter(|_| condition.is_complete()) else {
        return Err(CompileWarning::IncompleteCondition {
            path: path.to_string(),
        });
    };
    let field = condition.field.trim();
    if !is_valid_identifier(field) {
        return Err(CompileWarning::InvalidField {
            path: path.to_string(),
            field: condition.field.clone(),
        });
    }

    let column = field.to_string();
    let negate = condition.is_not;
    let expr = match operator {
        ConditionOperator::Eq
        | ConditionOperator::Neq
        | ConditionOperator::Gt
        | ConditionOperator::Lt
        | ConditionOperator::Gte
        | ConditionOperator::Lte => SqlExpr::Compare {
            column,
            op: comparison(operator),
            value: scalar(condition, operator, path)?,
        },
        ConditionOperator::Like
        | ConditionOperator::NotLike
        | ConditionOperator::StartsWith
        | ConditionOperator::EndsWith => {
            let text = like_text(condition, operator, path)?;
            let pattern = match operator {
                ConditionOperator::StartsWith => format!("{text}%"),
                ConditionOperator::EndsWith => format!("%{text}"),
                _ => format!("%{text}%"),
            };
            SqlExpr::Like {
                column,
                pattern: SqlValue::Text(pattern),
                negated: matches!(operator, ConditionOperator::NotLike),
            }
        }
        ConditionOperator::Between | ConditionOperator::NotBetween => {
            let (low, high) = range(condition, operator, path)?;
            SqlExpr::Between {
                column,
                low,
                high,
                negated: matches!(operator, ConditionOperator::NotBetween),
            }
        }
        // Negation flips the tested state for these instead of wrapping them.
        ConditionOperator::IsNull | ConditionOperator::IsNotNull => {
            let is_null = matches!(operator, ConditionOperator::IsNull) != negate;
            return Ok(SqlExpr::IsNull {
                column,
                negated: !is_null,
            });
        }
        ConditionOperator::IsTrue | ConditionOperator::IsFalse => {
            let want_true = matches!(operator, ConditionOperator::IsTrue) != negate;
            return Ok(SqlExpr::Compare {
                column,
                op: ComparisonOp::Eq,
                value: SqlValue::Int(i64::from(want_true)),
            });
        }
        ConditionOperator::Unrecognized(_) => {
            return Err(CompileWarning::IncompleteCondition {
                path: path.to_string(),
            })
        }
    };

    Ok(if negate {
        SqlExpr::Not(Box::new(expr))
    } else {
        expr
    })
}

fn comparison(operator: &ConditionOperator) -> ComparisonOp {
    match operator {
        ConditionOperator::Neq => ComparisonOp::Neq,
        ConditionOperator::Gt => ComparisonOp::Gt,
        ConditionOperator::Lt => ComparisonOp::Lt,
        ConditionOperator::Gte => ComparisonOp::Gte,
        ConditionOperator::Lte => ComparisonOp::Lte,
        _ => ComparisonOp::Eq,
    }
}

fn scalar(
    condition: &Condition,
    operator: &ConditionOperator,
    path: &str,
) -> Result<SqlValue, CompileWarning> {
    match SqlValue::from_json(&condition.value) {
        Some(SqlValue::Null) => Err(CompileWarning::MissingValue {
            path: path.to_string(),
            field: condition.field.clone(),
            operator: operator.to_string(),
        }),
        Some(value) => Ok(value),
        None => Err(CompileWarning::UnsupportedValue {
            path: path.to_string(),
            field: condition.field.clone(),
            operator: operator.to_string(),
        }),
    }
}

fn like_text(
    condition: &Condition,
    operator: &ConditionOperator,
    path: &str,
) -> Result<String, CompileWarning> {
    match &condition.value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(CompileWarning::MissingValue {
            path: path.to_string(),
            field: condition.field.clone(),
            operator: operator.to_string(),
        }),
        Value::Array(_) | Value::Object(_) => Err(CompileWarning::UnsupportedValue {
            path: path.to_string(),
            field: condition.field.clone(),
            operator: operator.to_string(),
        }),
    }
}

fn range(
    condition: &Condition,
    operator: &ConditionOperator,
    path: &str,
) -> Result<(SqlValue, SqlValue), CompileWarning> {
    let malformed = || CompileWarning::MalformedBetween {
        path: path.to_string(),
        field: condition.field.clone(),
        operator: operator.to_string(),
    };
    let Value::Array(bounds) = &condition.value else {
        return Err(malformed());
    };
    let [low, high] = bounds.as_slice() else {
        return Err(malformed());
    };
    match (SqlValue::from_json(low), SqlValue::from_json(high)) {
        (Some(low), Some(high)) if !low.is_null() && !high.is_null() => Ok((low, high)),
        _ => Err(malformed()),
    }
}

/// Walks a filter tree, collecting warnings for everything it drops.
pub(crate) struct Translator {
    max_depth: usize,
    warnings: Vec<CompileWarning>,
}

impl Translator {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            warnings: Vec::new(),
        }
    }

    /// `None` when nothing in the tree survived.
    pub(crate) fn translate_tree(&mut self, tree: &FilterTree) -> Option<SqlExpr> {
        self.translate_nodes(&tree.children, "", 0)
    }

    pub(crate) fn into_warnings(self) -> Vec<CompileWarning> {
        self.warnings
    }

    fn translate_nodes(
        &mut self,
        nodes: &[FilterNode],
        prefix: &str,
        depth: usize,
    ) -> Option<SqlExpr> {
        let mut items: Vec<(LogicalOperator, SqlExpr)> = Vec::new();
        let mut condition_idx = 0;
        let mut group_idx = 0;

        for node in nodes {
            match node {
                FilterNode::Condition(condition) => {
                    let path = format!("{prefix}conditions[{condition_idx}]");
                    condition_idx += 1;
                    match condition_to_sql(condition, &path) {
                        Ok(expr) => items.push((condition.logical_operator, expr)),
                        Err(warning) => self.warnings.push(warning),
                    }
                }
                FilterNode::Group(group) => {
                    let path = format!("{prefix}groups[{group_idx}]");
                    group_idx += 1;
                    if depth + 1 > self.max_depth {
                        self.warnings.push(CompileWarning::DepthExceeded {
                            path,
                            max_depth: self.max_depth,
                        });
                        continue;
                    }
                    let child_prefix = format!("{path}.");
                    match self.translate_nodes(&group.children, &child_prefix, depth + 1) {
                        Some(inner) => {
                            items.push((group.logical_operator, SqlExpr::Nested(Box::new(inner))))
                        }
                        None => self.warnings.push(CompileWarning::EmptyGroup { path }),
                    }
                }
            }
        }

        match items.len() {
            0 => None,
            1 => items.pop().map(|(_, expr)| expr),
            _ => Some(SqlExpr::Chain(items)),
        }
    }
}
