use std::collections::HashMap;

use sql_portal::{Blob, SqlBuilder, StmtParser};

#[test]
fn quoted_host_variables_are_untouched() {
    let mut calls = Vec::new();
    let out = StmtParser::new().parse(
        "select * from t where a = ':x' and b = :y",
        &mut |name: &str| {
            calls.push(name.to_string());
            "5".to_string()
        },
    );
    assert_eq!(out, "select * from t where a = ':x' and b = 5");
    assert_eq!(calls, vec!["y"]);
}

#[test]
fn escaped_prefix_is_literal() {
    let mut calls = 0;
    let out = StmtParser::new().parse("a\\:bcol", &mut |_: &str| {
        calls += 1;
        String::new()
    });
    assert_eq!(out, "a:bcol");
    assert_eq!(calls, 0);
}

#[test]
fn parser_feeds_a_lookup_table() {
    let values: HashMap<&str, &str> = [("id", "17"), ("name", "'bob'")].into_iter().collect();
    let out = StmtParser::new().parse(
        "update t set name = :name where id = :id and tag = :tag",
        &mut |name: &str| {
            values
                .get(name)
                .map_or_else(|| format!(":{name}"), |v| (*v).to_string())
        },
    );
    assert_eq!(out, "update t set name = 'bob' where id = 17 and tag = :tag");
}

#[test]
fn builder_expands_in_lists() {
    let mut three = SqlBuilder::new("select a from t where b in (%c)");
    three.extend_param("c", 3);
    assert_eq!(three.as_str(), "select a from t where b in ( :c0,:c1,:c2 )");

    let mut none = SqlBuilder::new("select a from t where b in (%c)");
    none.extend_param("c", 0);
    assert_eq!(none.as_str(), "select a from t where b in ( NULL )");
}

#[test]
fn builder_substitutions_are_independent() {
    let mut sql = SqlBuilder::new("select %cols from %table where %cond");
    sql.replace("table", "users");
    assert_eq!(sql.as_str(), "select %cols from users where %cond");

    sql.replace_if(true, "cond", "active = 1")
        .replace_if_else(false, "cols", "id, name", "*");
    assert_eq!(sql.to_string(), "select * from users where active = 1");

    let mut optional = SqlBuilder::new("select 1%order");
    optional.replace_if(false, "order", " order by 1");
    assert_eq!(optional.into_string(), "select 1");
}

#[test]
fn blob_copies_do_not_alias() {
    let mut a = Blob::new();
    a.assign(b"hi");
    let mut b = a.clone();
    assert!(a.shares_buffer(&b));

    b.assign(b"yo");
    assert_eq!(a.data(), b"hi");
    assert_eq!(b.data(), b"yo");
    assert!(!a.shares_buffer(&b));

    b.reserve(0, true);
    assert_eq!(b.size(), 0);
    assert_eq!(a.size(), 2);
}
