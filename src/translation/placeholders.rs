use std::collections::HashMap;

use super::{HostVarHandler, StmtParser};

/// Target placeholder syntax of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
    /// Anonymous `?` placeholders (MySQL, ODBC); one position per occurrence.
    QuestionMark,
    /// Keep `:name` as is, for engines that bind by name.
    Named,
}

/// SQL with host variables rewritten for a driver, plus the binding order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenSql {
    pub sql: String,
    /// `params[i]` is the host variable bound at placeholder position `i + 1`.
    pub params: Vec<String>,
}

impl RewrittenSql {
    /// 1-based placeholder positions that take the value of `name`.
    pub fn positions_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.params
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.as_str() == name)
            .map(|(i, _)| i + 1)
    }
}

struct Collector {
    style: PlaceholderStyle,
    params: Vec<String>,
    seen: HashMap<String, usize>,
}

impl HostVarHandler for Collector {
    fn on_host_var(&mut self, name: &str) -> String {
        if self.style == PlaceholderStyle::QuestionMark {
            self.params.push(name.to_string());
            return "?".to_string();
        }

        let idx = match self.seen.get(name) {
            Some(&idx) => idx,
            None => {
                self.params.push(name.to_string());
                let idx = self.params.len();
                self.seen.insert(name.to_string(), idx);
                idx
            }
        };

        match self.style {
            PlaceholderStyle::Postgres => format!("${idx}"),
            PlaceholderStyle::Sqlite => format!("?{idx}"),
            PlaceholderStyle::Named | PlaceholderStyle::QuestionMark => format!(":{name}"),
        }
    }
}

/// Rewrite `:name` host variables into `style` placeholders.
///
/// Repeated names share one position except for [`PlaceholderStyle::QuestionMark`],
/// where every occurrence is its own positional parameter.
#[must_use]
pub fn rewrite_host_vars(sql: &str, style: PlaceholderStyle) -> RewrittenSql {
    let mut collector = Collector {
        style,
        params: Vec::new(),
        seen: HashMap::new(),
    };
    let sql = StmtParser::new().parse(sql, &mut collector);
    RewrittenSql {
        sql,
        params: collector.params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_style_reuses_positions() {
        let res = rewrite_host_vars(
            "select * from t where a = :a or b = :b or c = :a",
            PlaceholderStyle::Sqlite,
        );
        assert_eq!(res.sql, "select * from t where a = ?1 or b = ?2 or c = ?1");
        assert_eq!(res.params, vec!["a", "b"]);
    }

    #[test]
    fn postgres_style() {
        let res = rewrite_host_vars("insert into t values(:x, :y)", PlaceholderStyle::Postgres);
        assert_eq!(res.sql, "insert into t values($1, $2)");
    }

    #[test]
    fn question_mark_style_repeats_names() {
        let res = rewrite_host_vars("where a = :a or c = :a", PlaceholderStyle::QuestionMark);
        assert_eq!(res.sql, "where a = ? or c = ?");
        assert_eq!(res.params, vec!["a", "a"]);
        assert_eq!(res.positions_of("a").collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn named_style_keeps_text() {
        let res = rewrite_host_vars("where a = :a and s = ':b'", PlaceholderStyle::Named);
        assert_eq!(res.sql, "where a = :a and s = ':b'");
        assert_eq!(res.params, vec!["a"]);
    }
}
