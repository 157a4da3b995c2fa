//! `%name` macro substitution for building SQL text.

use std::fmt;

use crate::translation::StmtParser;

/// SQL template with `%name` macros, resolved one name at a time.
///
/// Macros that a call does not name are left in place, so substitutions can be
/// chained in any order:
/// ```rust
/// use sql_portal::SqlBuilder;
///
/// let mut sql = SqlBuilder::new("select a from %tab where b in (%ids)");
/// sql.extend_param("ids", 3).replace("tab", "t");
/// assert_eq!(sql.as_str(), "select a from t where b in ( :ids0,:ids1,:ids2 )");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlBuilder {
    sql: String,
}

impl SqlBuilder {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    /// Replace `%varname` with `count` host variables `:varname0,:varname1,...`,
    /// or with `NULL` when `count` is zero.
    pub fn extend_param(&mut self, varname: &str, count: usize) -> &mut Self {
        let replacement = if count == 0 {
            " NULL ".to_string()
        } else {
            let vars = (0..count)
                .map(|n| format!(":{varname}{n}"))
                .collect::<Vec<_>>()
                .join(",");
            format!(" {vars} ")
        };
        self.substitute(varname, &replacement)
    }

    /// Replace `%varname` with the literal `value`.
    pub fn replace(&mut self, varname: &str, value: &str) -> &mut Self {
        self.substitute(varname, value)
    }

    /// Replace `%varname` with `value` when `cond` holds, else with nothing.
    pub fn replace_if(&mut self, cond: bool, varname: &str, value: &str) -> &mut Self {
        self.replace_if_else(cond, varname, value, "")
    }

    pub fn replace_if_else(
        &mut self,
        cond: bool,
        varname: &str,
        value: &str,
        else_value: &str,
    ) -> &mut Self {
        self.substitute(varname, if cond { value } else { else_value })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.sql
    }

    fn substitute(&mut self, varname: &str, replacement: &str) -> &mut Self {
        let parser = StmtParser::with_prefix('%').keep_escapes(true);
        self.sql = parser.parse(&self.sql, &mut |name: &str| {
            if name == varname {
                replacement.to_string()
            } else {
                format!("%{name}")
            }
        });
        self
    }
}

impl fmt::Display for SqlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl AsRef<str> for SqlBuilder {
    fn as_ref(&self) -> &str {
        &self.sql
    }
}

impl From<&str> for SqlBuilder {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for SqlBuilder {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

impl From<SqlBuilder> for String {
    fn from(builder: SqlBuilder) -> Self {
        builder.sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_param_expands_list() {
        let mut sql = SqlBuilder::new("select a from t where b in (%c)");
        sql.extend_param("c", 3);
        assert_eq!(sql.as_str(), "select a from t where b in ( :c0,:c1,:c2 )");
    }

    #[test]
    fn extend_param_zero_is_null() {
        let mut sql = SqlBuilder::new("select a from t where b in (%c)");
        sql.extend_param("c", 0);
        assert_eq!(sql.as_str(), "select a from t where b in ( NULL )");
    }

    #[test]
    fn replace_leaves_other_names() {
        let mut sql = SqlBuilder::new("select %x, %y from t");
        sql.replace("x", "v");
        assert_eq!(sql.as_str(), "select v, %y from t");
        sql.replace("y", "w");
        assert_eq!(sql.as_str(), "select v, w from t");
    }

    #[test]
    fn host_vars_and_literals_survive() {
        let mut sql = SqlBuilder::new("select * from %t where a = :a and b like '%x%'");
        sql.replace("t", "tab").replace("x", "nope");
        assert_eq!(sql.as_str(), "select * from tab where a = :a and b like '%x%'");
    }

    #[test]
    fn escapes_survive_chained_replacements() {
        let mut sql = SqlBuilder::new("select '\\:x', a\\:b from %t");
        sql.replace("t", "t1");
        assert_eq!(sql.as_str(), "select '\\:x', a\\:b from t1");
    }

    #[test]
    fn replace_if_picks_branch() {
        let mut sql = SqlBuilder::new("select a from t %where");
        sql.replace_if(false, "where", "where a > 0");
        assert_eq!(sql.as_str(), "select a from t ");

        let mut sql = SqlBuilder::new("order by %col");
        sql.replace_if_else(false, "col", "a", "b");
        assert_eq!(sql.to_string(), "order by b");
    }

    #[test]
    fn modulo_operator_passes_through() {
        let mut sql = SqlBuilder::new("select a % 3, b %% 2 from t");
        sql.replace("t", "x");
        assert_eq!(sql.as_str(), "select a % 3, b %% 2 from t");
    }
}
