//! Hook firing and nested-scope visibility.

use scopedb_core::{CoreError, CursorState, HookEvent, Value};
use scopedb_testkit::prelude::*;

fn register_all(cr: &mut scopedb_core::Cursor, log: &HookLog, suffix: &str) {
    cr.after("commit", log.hook(format!("C{suffix}"))).unwrap();
    cr.after("rollback", log.hook(format!("R{suffix}"))).unwrap();
    cr.after("close", log.hook(format!("X{suffix}"))).unwrap();
}

#[test]
fn commit_then_close_fires_commit_and_close_in_order() {
    with_temp_db(|db| {
        let log = HookLog::new();
        let mut cr = db.cursor().unwrap();
        cr.after("commit", log.hook("C1")).unwrap();
        cr.after("close", log.hook("X1")).unwrap();
        cr.after("commit", log.hook("C2")).unwrap();
        cr.after("rollback", log.hook("R1")).unwrap();
        cr.after("close", log.hook("X2")).unwrap();

        cr.commit().unwrap();
        cr.close().unwrap();
        assert_eq!(log.entries(), ["C1", "C2", "X1", "X2"]);
    });
}

#[test]
fn rollback_then_close_fires_rollback_and_close() {
    with_temp_db(|db| {
        let log = HookLog::new();
        let mut cr = db.cursor().unwrap();
        register_all(&mut cr, &log, "1");
        cr.rollback().unwrap();
        assert_eq!(cr.state(), CursorState::RolledBack);
        cr.close().unwrap();
        assert_eq!(log.entries(), ["R1", "X1"]);
    });
}

#[test]
fn close_without_resolution_rolls_back_first() {
    with_temp_db(|db| {
        let log = HookLog::new();
        let mut cr = db.cursor().unwrap();
        register_all(&mut cr, &log, "1");
        cr.close().unwrap();
        assert_eq!(log.entries(), ["R1", "X1"]);
    });
}

#[test]
fn second_close_fires_nothing() {
    with_temp_db(|db| {
        let log = HookLog::new();
        let mut cr = db.cursor().unwrap();
        register_all(&mut cr, &log, "1");
        cr.commit().unwrap();
        cr.close().unwrap();
        log.clear();
        cr.close().unwrap();
        assert!(log.entries().is_empty());
        assert!(cr.is_closed());
    });
}

#[test]
fn drop_closes_with_implicit_rollback() {
    with_temp_db(|db| {
        let log = HookLog::new();
        {
            let mut cr = db.cursor().unwrap();
            register_all(&mut cr, &log, "1");
            cr.put("res_partner", "1", "Foo").unwrap();
        }
        assert_eq!(log.entries(), ["R1", "X1"]);
        assert_eq!(db.get("res_partner", "1").unwrap(), None);
        assert_eq!(db.connection_count(), 0);
    });
}

#[test]
fn sequence_of_commit_rollback_close_hooks() {
    // Each cursor fires once, so the three outcomes take three cursors.
    with_temp_db(|db| {
        let log = HookLog::new();

        let mut cr = db.cursor().unwrap();
        cr.after("commit", log.hook("C1")).unwrap();
        cr.after("rollback", log.hook("R1")).unwrap();
        cr.commit().unwrap();
        cr.close().unwrap();
        assert_eq!(log.take(), ["C1"]);

        let mut cr = db.cursor().unwrap();
        cr.after("commit", log.hook("C2")).unwrap();
        cr.after("rollback", log.hook("R2")).unwrap();
        cr.rollback().unwrap();
        cr.close().unwrap();
        assert_eq!(log.take(), ["R2"]);

        let mut cr = db.cursor().unwrap();
        cr.after("commit", log.hook("C3")).unwrap();
        cr.after("rollback", log.hook("R3")).unwrap();
        cr.close().unwrap();
        assert_eq!(log.take(), ["R3"]);
    });
}

#[test]
fn unknown_event_registers_nothing() {
    with_temp_db(|db| {
        let log = HookLog::new();
        let mut cr = db.cursor().unwrap();
        let err = cr.after("flush", log.hook("F")).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        let err = cr.after("Commit", log.hook("F")).unwrap_err();
        assert!(err.is_validation());
        cr.commit().unwrap();
        cr.close().unwrap();
        assert!(log.entries().is_empty());
    });
}

#[test]
fn typed_registration_matches_string_form() {
    with_temp_db(|db| {
        let log = HookLog::new();
        let mut cr = db.cursor().unwrap();
        cr.on(HookEvent::Rollback, log.hook("typed")).unwrap();
        cr.after(HookEvent::Rollback.as_str(), log.hook("named")).unwrap();
        cr.close().unwrap();
        assert_eq!(log.entries(), ["typed", "named"]);
    });
}

#[test]
fn hook_registered_after_its_event_never_runs() {
    with_temp_db(|db| {
        let log = HookLog::new();
        let mut cr = db.cursor().unwrap();
        cr.commit().unwrap();
        cr.after("commit", log.hook("late commit")).unwrap();
        cr.after("rollback", log.hook("late rollback")).unwrap();
        cr.after("close", log.hook("close")).unwrap();
        cr.close().unwrap();
        assert_eq!(log.entries(), ["close"]);
    });
}

#[test]
fn sub_cursor_commit_is_visible_to_parent() {
    with_temp_db(|db| {
        let mut cr = db.cursor().unwrap();
        cr.put("res_partner", "1", "Foo").unwrap();

        cr.scoped(|sub| sub.put("res_partner", "1", "Bar")).unwrap();
        assert_eq!(cr.get("res_partner", "1").unwrap(), Some(Value::from("Bar")));

        cr.commit().unwrap();
        cr.close().unwrap();
        assert_eq!(db.get("res_partner", "1").unwrap(), Some(Value::from("Bar")));
    });
}

#[test]
fn sub_cursor_failure_is_invisible_to_parent() {
    with_temp_db(|db| {
        let mut cr = db.cursor().unwrap();
        cr.put("res_partner", "1", "Foo").unwrap();

        let result: Result<(), CoreError> = cr.scoped(|sub| {
            sub.put("res_partner", "1", "Bar")?;
            sub.put("res_partner", "2", "Baz")?;
            Err(CoreError::validation("constraint violated"))
        });
        assert!(result.is_err());

        assert_eq!(cr.get("res_partner", "1").unwrap(), Some(Value::from("Foo")));
        assert_eq!(cr.get("res_partner", "2").unwrap(), None);
        cr.close().unwrap();
    });
}

#[test]
fn deep_nesting_merges_level_by_level() {
    with_temp_db(|db| {
        let mut root = db.cursor().unwrap();
        let mut a = root.begin().unwrap();
        let mut b = a.begin().unwrap();
        b.put("t", "k", 3).unwrap();
        assert_eq!(b.depth(), 2);
        assert_eq!(a.get("t", "k").unwrap(), None);

        b.commit().unwrap();
        b.close().unwrap();
        assert_eq!(a.get("t", "k").unwrap(), Some(Value::Integer(3)));
        assert_eq!(root.get("t", "k").unwrap(), None);

        a.rollback().unwrap();
        a.close().unwrap();
        assert_eq!(root.get("t", "k").unwrap(), None);
        root.close().unwrap();
    });
}

#[test]
fn closing_parent_with_open_child_is_state_error() {
    with_temp_db(|db| {
        let mut cr = db.cursor().unwrap();
        let mut sub = cr.begin().unwrap();
        assert!(cr.close().unwrap_err().is_state());
        assert_eq!(cr.state(), CursorState::Open);
        sub.close().unwrap();
        cr.close().unwrap();
    });
}

#[test]
fn panic_in_scope_rolls_back() {
    with_temp_db(|db| {
        let mut cr = db.cursor().unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), CoreError> = cr.scoped(|sub| {
                sub.put("t", "k", 1)?;
                panic!("boom");
            });
        }));
        assert!(outcome.is_err());
        assert!(!cr.has_open_child().unwrap());
        assert_eq!(cr.get("t", "k").unwrap(), None);
        cr.close().unwrap();
    });
}

#[test]
fn independent_root_cursors_are_isolated() {
    with_temp_db(|db| {
        let mut a = db.cursor().unwrap();
        let mut b = db.cursor().unwrap();
        a.put("t", "k", 1).unwrap();
        assert_eq!(b.get("t", "k").unwrap(), None);
        a.commit().unwrap();
        assert_eq!(b.get("t", "k").unwrap(), Some(Value::Integer(1)));
        a.close().unwrap();
        b.close().unwrap();
    });
}
