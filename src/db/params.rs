//! Bind marker handling.
//!
//! Statements are written once with `?` markers; PostgreSQL needs numbered
//! `$n` markers instead.

use crate::models::DatabaseType;

/// Rewrite `?` bind markers for the target engine.
///
/// Markers inside single-quoted literals are left alone.
pub fn bind_markers(sql: &str, db_type: DatabaseType) -> String {
    if db_type != DatabaseType::PostgreSQL {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut in_literal = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}
