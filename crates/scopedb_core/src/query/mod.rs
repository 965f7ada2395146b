//! Statement execution over a cursor.
//!
//! [`Cursor::execute`](crate::Cursor::execute) parses a statement, binds its
//! placeholders and runs it through the cursor's data operations, so a
//! statement sees and writes exactly what the cursor would.

mod params;
mod parser;

pub use params::Params;
pub use parser::{parse, Operand, Statement};

use crate::cursor::Cursor;
use crate::error::{CoreError, CoreResult};
use scopedb_codec::Value;

/// A row returned by `GET` or `SCAN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Key within the table.
    pub key: String,
    /// Stored value.
    pub value: Value,
}

/// Outcome of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// Rows read by `GET` or `SCAN`.
    Rows(Vec<Row>),
    /// Number of keys changed by `PUT` or `DELETE`.
    Affected(usize),
}

impl QueryResult {
    /// Returns the rows, empty for a write.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        match self {
            Self::Rows(rows) => rows,
            Self::Affected(_) => &[],
        }
    }

    /// Returns the number of changed keys, zero for a read.
    #[must_use]
    pub fn affected(&self) -> usize {
        match self {
            Self::Rows(_) => 0,
            Self::Affected(n) => *n,
        }
    }
}

fn name(value: Value, what: &str) -> CoreResult<String> {
    match value {
        Value::Text(s) => Ok(s),
        Value::Integer(n) => Ok(n.to_string()),
        other => Err(CoreError::validation(format!(
            "{what} must be text or an integer, not {}",
            other.type_name()
        ))),
    }
}

pub(crate) fn execute(cursor: &mut Cursor, statement: &str, params: Params) -> CoreResult<QueryResult> {
    let parsed = parse(statement)?;
    let mut values = params.bind(&parsed.operands())?.into_iter();
    let mut next = || values.next().unwrap_or(Value::Null);
    tracing::trace!(verb = parsed.verb(), "execute");

    match parsed {
        Statement::Put { .. } => {
            let table = name(next(), "table")?;
            let key = name(next(), "key")?;
            cursor.put(table, key, next())?;
            Ok(QueryResult::Affected(1))
        }
        Statement::Get { .. } => {
            let table = name(next(), "table")?;
            let key = name(next(), "key")?;
            let rows = cursor
                .get(&table, &key)?
                .map(|value| vec![Row { key, value }])
                .unwrap_or_default();
            Ok(QueryResult::Rows(rows))
        }
        Statement::Delete { .. } => {
            let table = name(next(), "table")?;
            let key = name(next(), "key")?;
            let existed = cursor.get(&table, &key)?.is_some();
            cursor.delete(table, key)?;
            Ok(QueryResult::Affected(usize::from(existed)))
        }
        Statement::Scan { .. } => {
            let table = name(next(), "table")?;
            Ok(QueryResult::Rows(cursor.scan(&table)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use std::collections::BTreeMap;

    #[test]
    fn put_get_scan_delete() {
        let db = Database::open_in_memory().unwrap();
        let mut cr = db.cursor().unwrap();
        assert_eq!(
            cr.execute("PUT res_users admin 'Mitchell Admin'", ()).unwrap(),
            QueryResult::Affected(1)
        );
        cr.execute("PUT res_users %s %s", vec!["demo", "Marc Demo"]).unwrap();

        let rows = cr.execute("GET res_users admin", ()).unwrap();
        assert_eq!(rows.rows()[0].value, Value::from("Mitchell Admin"));

        let all = cr.execute("SCAN res_users", ()).unwrap();
        let keys: Vec<_> = all.rows().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["admin", "demo"]);

        assert_eq!(cr.execute("DELETE res_users demo", ()).unwrap().affected(), 1);
        assert_eq!(cr.execute("DELETE res_users demo", ()).unwrap().affected(), 0);
        assert!(cr.execute("GET res_users demo", ()).unwrap().rows().is_empty());
        cr.close().unwrap();
    }

    #[test]
    fn named_parameters() {
        let db = Database::open_in_memory().unwrap();
        let mut cr = db.cursor().unwrap();
        let mut params = BTreeMap::new();
        params.insert("id", Value::Integer(3));
        params.insert("name", Value::from("Deco Addict"));
        cr.execute("PUT res_partner %(id)s %(name)s", params).unwrap();
        assert_eq!(
            cr.get("res_partner", "3").unwrap(),
            Some(Value::from("Deco Addict"))
        );
        cr.close().unwrap();
    }

    #[test]
    fn scalar_parameter_is_validation_error() {
        let db = Database::open_in_memory().unwrap();
        let mut cr = db.cursor().unwrap();
        let err = cr
            .execute("GET res_users %s", "admin")
            .unwrap_err();
        assert!(err.is_validation());
        let err = cr.execute("GET res_users %s", 1_i64).unwrap_err();
        assert!(err.is_validation());
        cr.close().unwrap();
    }

    #[test]
    fn non_text_table_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let mut cr = db.cursor().unwrap();
        assert!(cr.execute("SCAN NULL", ()).unwrap_err().is_validation());
        assert!(cr.execute("GET t %s", vec![true]).unwrap_err().is_validation());
        cr.close().unwrap();
    }

    #[test]
    fn execute_respects_cursor_state() {
        let db = Database::open_in_memory().unwrap();
        let mut cr = db.cursor().unwrap();
        cr.rollback().unwrap();
        assert!(cr.execute("PUT t k v", ()).unwrap_err().is_state());
        assert!(cr.execute("SCAN t", ()).is_ok());
        cr.close().unwrap();
        assert!(cr.execute("SCAN t", ()).unwrap_err().is_state());
    }
}
