//! MySQL dialect implementation.

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn escape_string(&self, value: &str) -> String {
        // Backslash is an escape character inside MySQL string literals.
        value.replace('\\', "\\\\").replace('\'', "''")
    }
}
