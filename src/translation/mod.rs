//! Host-variable parsing.
//!
//! SQL text refers to bound values through host variables such as `:name`.
//! [`StmtParser`] finds them, asks a [`HostVarHandler`] for replacement text,
//! and re-emits the statement. Quoted literals (`'...'`, `"..."`, `` `...` ``)
//! are copied untouched, and `\` escapes the next character.

mod placeholders;
mod scanner;

pub use placeholders::{PlaceholderStyle, RewrittenSql, rewrite_host_vars};

use scanner::{State, is_name_continue, is_name_start, is_quote};

/// Callback invoked once per host-variable occurrence.
pub trait HostVarHandler {
    /// Return the text that replaces the whole `prefix + name` token.
    fn on_host_var(&mut self, name: &str) -> String;
}

impl<F> HostVarHandler for F
where
    F: FnMut(&str) -> String,
{
    fn on_host_var(&mut self, name: &str) -> String {
        self(name)
    }
}

/// Scanner for `<prefix><alpha><alnum>*` host variables.
///
/// # Examples
/// ```rust
/// use sql_portal::translation::StmtParser;
///
/// let sql = StmtParser::new().parse(
///     "select * from t where a = ':x' and b = :y",
///     &mut |name: &str| if name == "y" { "5".to_string() } else { format!(":{name}") },
/// );
/// assert_eq!(sql, "select * from t where a = ':x' and b = 5");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StmtParser {
    prefix: char,
    keep_escapes: bool,
}

impl Default for StmtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StmtParser {
    /// Parser for `:name` host variables.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix(':')
    }

    #[must_use]
    pub fn with_prefix(prefix: char) -> Self {
        Self {
            prefix,
            keep_escapes: false,
        }
    }

    /// Keep `\` in the output instead of consuming it. Used when the output
    /// is itself a template that will be parsed again.
    #[must_use]
    pub fn keep_escapes(mut self, keep: bool) -> Self {
        self.keep_escapes = keep;
        self
    }

    #[must_use]
    pub fn prefix(&self) -> char {
        self.prefix
    }

    /// Rewrite `sql`, replacing every host variable with the handler's text.
    pub fn parse<H>(&self, sql: &str, handler: &mut H) -> String
    where
        H: HostVarHandler + ?Sized,
    {
        let mut out = String::with_capacity(sql.len());
        let mut name = String::new();
        let mut state = State::Normal;

        for ch in sql.chars() {
            state = match state {
                State::Normal => self.scan_normal(ch, &mut out, &mut name),
                State::NameStart => {
                    if is_name_start(ch) {
                        name.push(ch);
                        State::Name
                    } else if ch == self.prefix {
                        // doubled prefix, e.g. a postgres `::` cast
                        out.push(self.prefix);
                        out.push(ch);
                        State::Normal
                    } else {
                        out.push(self.prefix);
                        self.scan_normal(ch, &mut out, &mut name)
                    }
                }
                State::Name => {
                    if is_name_continue(ch) {
                        name.push(ch);
                        State::Name
                    } else {
                        out.push_str(&handler.on_host_var(&name));
                        name.clear();
                        self.scan_normal(ch, &mut out, &mut name)
                    }
                }
                State::Escape => {
                    out.push(ch);
                    State::Normal
                }
                State::Quoted(quote) => {
                    out.push(ch);
                    if ch == quote {
                        State::Normal
                    } else if ch == '\\' {
                        State::QuotedEscape(quote)
                    } else {
                        State::Quoted(quote)
                    }
                }
                State::QuotedEscape(quote) => {
                    out.push(ch);
                    State::Quoted(quote)
                }
            };
        }

        match state {
            State::NameStart => out.push(self.prefix),
            State::Name => out.push_str(&handler.on_host_var(&name)),
            _ => {}
        }

        out
    }

    fn scan_normal(&self, ch: char, out: &mut String, name: &mut String) -> State {
        if ch == '\\' {
            if self.keep_escapes {
                out.push(ch);
            }
            State::Escape
        } else if ch == self.prefix {
            name.clear();
            State::NameStart
        } else {
            out.push(ch);
            if is_quote(ch) {
                State::Quoted(ch)
            } else {
                State::Normal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(sql: &str) -> (String, Vec<String>) {
        let mut seen = Vec::new();
        let out = StmtParser::new().parse(sql, &mut |name: &str| {
            seen.push(name.to_string());
            format!("<{name}>")
        });
        (out, seen)
    }

    #[test]
    fn replaces_host_vars_outside_quotes() {
        let out = StmtParser::new().parse(
            "select * from t where a = ':x' and b = :y",
            &mut |name: &str| {
                assert_eq!(name, "y");
                "5".to_string()
            },
        );
        assert_eq!(out, "select * from t where a = ':x' and b = 5");
    }

    #[test]
    fn escape_suppresses_name_and_is_removed() {
        let (out, seen) = collect("a\\:bcol");
        assert_eq!(out, "a:bcol");
        assert!(seen.is_empty());
    }

    #[test]
    fn skips_all_quote_kinds() {
        let (out, seen) = collect("select \":a\", `:b`, ':c' from t where d = :d");
        assert_eq!(out, "select \":a\", `:b`, ':c' from t where d = <d>");
        assert_eq!(seen, vec!["d"]);
    }

    #[test]
    fn quote_characters_do_not_close_each_other() {
        let (out, seen) = collect("select 'it\"s :x' , :y");
        assert_eq!(out, "select 'it\"s :x' , <y>");
        assert_eq!(seen, vec!["y"]);
    }

    #[test]
    fn escaped_quote_inside_literal_stays_open() {
        let (out, seen) = collect("select 'a\\' :x' from t");
        assert_eq!(out, "select 'a\\' :x' from t");
        assert!(seen.is_empty());
    }

    #[test]
    fn flushes_name_at_end_of_input() {
        let (out, seen) = collect("select a from t where b = :last");
        assert_eq!(out, "select a from t where b = <last>");
        assert_eq!(seen, vec!["last"]);
    }

    #[test]
    fn name_stops_at_first_non_alnum() {
        let (out, seen) = collect("values(:a1,:b2)");
        assert_eq!(out, "values(<a1>,<b2>)");
        assert_eq!(seen, vec!["a1", "b2"]);
    }

    #[test]
    fn name_stops_at_escape() {
        let (out, seen) = collect(":ab\\:cd");
        assert_eq!(out, "<ab>:cd");
        assert_eq!(seen, vec!["ab"]);
    }

    #[test]
    fn name_followed_by_quote_enters_literal() {
        let (out, seen) = collect(":a':b'");
        assert_eq!(out, "<a>':b'");
        assert_eq!(seen, vec!["a"]);
    }

    #[test]
    fn prefix_without_alpha_is_literal() {
        let (out, seen) = collect("select a :1, b : c, x::int from t:");
        assert_eq!(out, "select a :1, b : c, x::int from t:");
        assert!(seen.is_empty());
    }

    #[test]
    fn every_occurrence_invokes_handler() {
        let (out, seen) = collect(":a + :a");
        assert_eq!(out, "<a> + <a>");
        assert_eq!(seen, vec!["a", "a"]);
    }

    #[test]
    fn keep_escapes_preserves_backslash() {
        let out = StmtParser::with_prefix('%')
            .keep_escapes(true)
            .parse("a\\%b %c", &mut |_: &str| "X".to_string());
        assert_eq!(out, "a\\%b X");
    }

    #[test]
    fn custom_prefix_ignores_colon() {
        let out = StmtParser::with_prefix('%').parse("where a = :a and b in (%b)", &mut |n: &str| {
            format!("[{n}]")
        });
        assert_eq!(out, "where a = :a and b in ([b])");
    }
}
