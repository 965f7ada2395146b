//! Exec command implementation.

use scopedb_core::{Config, CoreResult, Cursor, Database, QueryResult};
use std::fs;
use std::path::Path;

/// Runs the exec command.
///
/// Every statement runs in the same root cursor. The cursor commits after
/// the last statement, or rolls back on the first error or with `dry_run`.
pub fn run(path: &Path, script: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let source = fs::read_to_string(script)?;
    let statements = parse_script(&source);

    let db = Database::open_with_config(path, Config::default())?;
    let mut cr = db.cursor()?;

    let outcome = run_statements(&mut cr, &statements);
    if outcome.is_ok() && !dry_run {
        cr.commit()?;
    } else {
        cr.rollback()?;
    }
    cr.close()?;
    let executed = outcome?;

    if dry_run {
        println!("{executed} statement(s) executed, rolled back (dry run)");
    } else {
        println!("{executed} statement(s) executed, committed");
    }
    db.close()?;
    Ok(())
}

/// Splits a script into statements: one per line, skipping blank lines
/// and `--` comments.
pub fn parse_script(source: &str) -> Vec<&str> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .collect()
}

fn run_statements(cr: &mut Cursor, statements: &[&str]) -> CoreResult<usize> {
    for (line, statement) in statements.iter().enumerate() {
        tracing::debug!(line = line + 1, statement, "executing");
        let result = cr.execute(statement, ())?;
        print_result(statement, &result);
    }
    Ok(statements.len())
}

fn print_result(statement: &str, result: &QueryResult) {
    match result {
        QueryResult::Rows(rows) => {
            println!("{statement}");
            for row in rows {
                println!("  {}\t{}", row.key, row.value);
            }
            println!("  ({} row(s))", rows.len());
        }
        QueryResult::Affected(count) => {
            println!("{statement}  -- {count} affected");
        }
    }
}
