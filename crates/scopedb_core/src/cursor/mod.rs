//! Transactional cursors.
//!
//! A [`Cursor`] is one unit-of-work scope. The root cursor owns a
//! connection; [`Cursor::begin`] opens a child scope on the same connection
//! that behaves like a savepoint. Every cursor fires exactly one terminal
//! event (`commit` or `rollback`) followed by `close`, running the hooks
//! attached with [`Cursor::after`].

mod hooks;
mod scope;
mod state;

pub use hooks::{Hook, HookEvent};
pub(crate) use hooks::HookRegistry;
pub(crate) use scope::ScopeStack;
pub use state::CursorState;

use crate::engine::Connection;
use crate::error::{CoreError, CoreResult};
use crate::query::{self, Params, QueryResult, Row};
use crate::transaction::PendingWrite;
use crate::types::{Key, SavepointId};
use scopedb_codec::Value;
use std::fmt;
use std::sync::Arc;

/// A unit-of-work scope over a connection.
///
/// # Nesting
///
/// A cursor has at most one open child. The child reads through its
/// parent's pending writes; the parent sees the child's writes only after
/// the child commits. `begin`, `commit`, `rollback` and `close` on a cursor
/// whose child is still open fail with a state error.
///
/// # Dropping
///
/// Dropping an unclosed cursor closes it, which rolls back uncommitted
/// writes. Any nested cursors still open are detached first; their later
/// operations fail with a state error.
///
/// A cursor is not meant to be shared between threads. Use one root cursor
/// per thread.
pub struct Cursor {
    conn: Option<Arc<Connection>>,
    depth: usize,
    savepoint: SavepointId,
    state: CursorState,
    hooks: HookRegistry,
}

impl Cursor {
    /// Opens the root scope of a fresh connection.
    pub(crate) fn root(conn: Arc<Connection>) -> CoreResult<Self> {
        let (depth, savepoint) = conn.stack.lock().push()?;
        tracing::debug!(%savepoint, "root cursor opened");
        Ok(Self::attached(conn, depth, savepoint))
    }

    fn attached(conn: Arc<Connection>, depth: usize, savepoint: SavepointId) -> Self {
        Self {
            conn: Some(conn),
            depth,
            savepoint,
            state: CursorState::Open,
            hooks: HookRegistry::new(),
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Nesting depth; the root cursor is at depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns `true` for a cursor that owns its connection.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// The savepoint marking this cursor's scope.
    #[must_use]
    pub fn savepoint(&self) -> SavepointId {
        self.savepoint
    }

    /// Returns `true` while a nested cursor opened from this one is open.
    ///
    /// # Errors
    ///
    /// Returns a state error if this cursor is closed or detached.
    pub fn has_open_child(&self) -> CoreResult<bool> {
        self.ensure_readable()?;
        let conn = self.connection()?;
        let stack = conn.stack.lock();
        stack.locate(self.depth, self.savepoint)?;
        Ok(stack.has_children(self.depth))
    }

    fn connection(&self) -> CoreResult<&Arc<Connection>> {
        self.conn
            .as_ref()
            .ok_or_else(|| CoreError::state(CursorState::Closed.describe()))
    }

    fn ensure_open(&self, operation: &str) -> CoreResult<()> {
        match self.state {
            CursorState::Open => Ok(()),
            other => Err(CoreError::state(format!(
                "cannot {operation}: {}",
                other.describe()
            ))),
        }
    }

    fn ensure_readable(&self) -> CoreResult<()> {
        if self.state.is_readable() {
            Ok(())
        } else {
            Err(CoreError::state(CursorState::Closed.describe()))
        }
    }

    /// Opens a nested cursor.
    ///
    /// # Errors
    ///
    /// - state error if this cursor is not open or already has an open child
    /// - resource error if the savepoint limit is reached or the database
    ///   is closed
    pub fn begin(&mut self) -> CoreResult<Cursor> {
        self.ensure_open("begin")?;
        let conn = Arc::clone(self.connection()?);
        if !conn.engine.is_open() {
            return Err(CoreError::resource("database is closed"));
        }

        let (depth, savepoint) = {
            let mut stack = conn.stack.lock();
            stack.locate(self.depth, self.savepoint)?;
            if stack.has_children(self.depth) {
                return Err(CoreError::state(
                    "cannot begin: a nested cursor is already open",
                ));
            }
            stack.push()?
        };
        tracing::debug!(parent = %self.savepoint, %savepoint, depth, "nested cursor opened");
        Ok(Self::attached(conn, depth, savepoint))
    }

    /// Writes `value` under `table`/`key` in this scope.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the cursor is open and attached, or
    /// [`CoreError::DatabaseClosed`].
    pub fn put(
        &mut self,
        table: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> CoreResult<()> {
        self.write(Key::new(table, key), PendingWrite::Put(value.into()))
    }

    /// Removes `table`/`key` in this scope.
    ///
    /// # Errors
    ///
    /// Same as [`put`](Self::put).
    pub fn delete(&mut self, table: impl Into<String>, key: impl Into<String>) -> CoreResult<()> {
        self.write(Key::new(table, key), PendingWrite::Delete)
    }

    fn write(&mut self, key: Key, write: PendingWrite) -> CoreResult<()> {
        self.ensure_open("write")?;
        let conn = self.connection()?;
        conn.engine.ensure_open()?;
        let mut stack = conn.stack.lock();
        stack.locate(self.depth, self.savepoint)?;
        stack.write(self.depth, key, write);
        Ok(())
    }

    /// Reads `table`/`key` as this scope sees it.
    ///
    /// # Errors
    ///
    /// Returns a state error if the cursor is closed or detached, or
    /// [`CoreError::DatabaseClosed`].
    pub fn get(&self, table: &str, key: &str) -> CoreResult<Option<Value>> {
        self.ensure_readable()?;
        let conn = self.connection()?;
        conn.engine.ensure_open()?;
        let key = Key::new(table, key);
        let stack = conn.stack.lock();
        stack.locate(self.depth, self.savepoint)?;
        Ok(match stack.read(self.depth, &key) {
            Some(write) => write.visible_value().cloned(),
            None => conn.engine.store().get(&key),
        })
    }

    /// Returns every row of `table` as this scope sees it, in key order.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn scan(&self, table: &str) -> CoreResult<Vec<Row>> {
        self.ensure_readable()?;
        let conn = self.connection()?;
        conn.engine.ensure_open()?;
        let stack = conn.stack.lock();
        stack.locate(self.depth, self.savepoint)?;
        let committed = conn.engine.store().scan(table);
        Ok(stack
            .scan(self.depth, table, committed)
            .into_iter()
            .map(|(key, value)| Row { key, value })
            .collect())
    }

    /// Runs one statement with bound parameters.
    ///
    /// ```rust
    /// # use scopedb_core::{Database, QueryResult};
    /// let db = Database::open_in_memory()?;
    /// let mut cr = db.cursor()?;
    /// cr.execute("PUT res_users %s %s", vec!["admin", "Mitchell"])?;
    /// let rows = cr.execute("GET res_users %(login)s", [("login", "admin")].into_iter().collect::<std::collections::BTreeMap<_, _>>())?;
    /// assert_eq!(rows.rows().len(), 1);
    /// assert!(cr.execute("GET res_users %s", "admin").unwrap_err().is_validation());
    /// # Ok::<(), scopedb_core::CoreError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed statement, scalar
    /// parameters, or parameters that do not match the placeholders, and
    /// the errors of the underlying operation otherwise.
    pub fn execute(&mut self, statement: &str, params: impl Into<Params>) -> CoreResult<QueryResult> {
        query::execute(self, statement, params.into())
    }

    /// Commits this scope.
    ///
    /// A nested cursor merges its writes into its parent. A root cursor
    /// journals its writes and applies them to the committed store. Commit
    /// hooks then run in registration order.
    ///
    /// # Errors
    ///
    /// - state error if the cursor is not open, is detached, or has an open
    ///   child
    /// - [`CoreError::DatabaseClosed`] for a root commit on a closed database
    /// - journal errors; the cursor then stays open with its writes intact
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_open("commit")?;
        let conn = Arc::clone(self.connection()?);
        {
            let mut stack = conn.stack.lock();
            stack.locate(self.depth, self.savepoint)?;
            if stack.has_children(self.depth) {
                return Err(CoreError::state(
                    "cannot commit while a nested cursor is open",
                ));
            }
            if self.depth == 0 {
                conn.engine.ensure_open()?;
                if let Some(writes) = stack.writes(0) {
                    conn.engine.manager().commit(writes)?;
                }
                stack.discard(0);
            } else {
                stack.release(self.depth);
            }
        }

        self.state = CursorState::Committed;
        tracing::debug!(savepoint = %self.savepoint, depth = self.depth, "cursor committed");
        self.hooks.fire(HookEvent::Commit);
        Ok(())
    }

    /// Discards this scope's writes and runs rollback hooks.
    ///
    /// # Errors
    ///
    /// Returns a state error if the cursor is not open, is detached, or has
    /// an open child.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_open("rollback")?;
        let conn = Arc::clone(self.connection()?);
        {
            let mut stack = conn.stack.lock();
            stack.locate(self.depth, self.savepoint)?;
            if stack.has_children(self.depth) {
                return Err(CoreError::state(
                    "cannot rollback while a nested cursor is open",
                ));
            }
            stack.discard(self.depth);
        }

        self.state = CursorState::RolledBack;
        tracing::debug!(savepoint = %self.savepoint, depth = self.depth, "cursor rolled back");
        self.hooks.fire(HookEvent::Rollback);
        Ok(())
    }

    /// Closes the cursor.
    ///
    /// An open cursor is rolled back first, running its rollback hooks.
    /// Close hooks run next; hooks that never fired are dropped. Closing a
    /// closed cursor does nothing. A detached cursor closes as if rolled
    /// back.
    ///
    /// # Errors
    ///
    /// Returns a state error if a nested cursor is still open.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.state == CursorState::Closed {
            return Ok(());
        }
        let conn = Arc::clone(self.connection()?);
        {
            let mut stack = conn.stack.lock();
            if stack.locate(self.depth, self.savepoint).is_ok() {
                if stack.has_children(self.depth) {
                    return Err(CoreError::state(
                        "cannot close while a nested cursor is open",
                    ));
                }
                stack.discard(self.depth);
                stack.pop(self.depth);
            } else {
                tracing::debug!(savepoint = %self.savepoint, "closing detached cursor");
            }
        }

        if self.state == CursorState::Open {
            self.state = CursorState::RolledBack;
            tracing::debug!(savepoint = %self.savepoint, "implicit rollback on close");
            self.hooks.fire(HookEvent::Rollback);
        }
        self.state = CursorState::Closed;
        self.hooks.fire(HookEvent::Close);
        self.hooks.clear();
        self.conn = None;
        tracing::debug!(savepoint = %self.savepoint, depth = self.depth, "cursor closed");
        Ok(())
    }

    /// Registers `hook` to run when `event` fires on this cursor.
    ///
    /// `event` is one of `"commit"`, `"rollback"` or `"close"`. A hook for
    /// an event that already fired is accepted but never runs.
    ///
    /// # Errors
    ///
    /// - validation error for any other event name; nothing is registered
    /// - state error if the cursor is closed
    pub fn after<F>(&mut self, event: impl AsRef<str>, hook: F) -> CoreResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let event: HookEvent = event.as_ref().parse()?;
        self.on(event, hook)
    }

    /// Typed form of [`after`](Self::after).
    ///
    /// # Errors
    ///
    /// Returns a state error if the cursor is closed.
    pub fn on<F>(&mut self, event: HookEvent, hook: F) -> CoreResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_readable()?;
        if !self.hooks.register(event, Box::new(hook)) {
            tracing::debug!(savepoint = %self.savepoint, %event, "hook registered after its event fired");
        }
        Ok(())
    }

    /// Runs `f` inside a nested cursor.
    ///
    /// If `f` returns `Ok` the nested cursor commits (unless `f` already
    /// resolved it) and closes. If `f` returns `Err` the nested cursor is
    /// closed, rolling it back, and the error is returned. A panic in `f`
    /// drops the nested cursor, which also rolls it back.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or of opening, committing or closing the
    /// nested cursor.
    pub fn scoped<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Cursor) -> Result<T, E>,
        E: From<CoreError>,
    {
        let child = self.begin()?;
        run_guarded(child, f)
    }
}

/// Runs `f` against `cursor`, then commits and closes it, or closes it
/// after an error.
pub(crate) fn run_guarded<T, E, F>(mut cursor: Cursor, f: F) -> Result<T, E>
where
    F: FnOnce(&mut Cursor) -> Result<T, E>,
    E: From<CoreError>,
{
    match f(&mut cursor) {
        Ok(value) => {
            if cursor.state() == CursorState::Open {
                cursor.commit()?;
            }
            cursor.close()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(close_err) = cursor.close() {
                tracing::warn!(error = %close_err, "failed to close cursor after error");
            }
            Err(err)
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        if let Some(conn) = &self.conn {
            let mut stack = conn.stack.lock();
            if stack.locate(self.depth, self.savepoint).is_ok() && stack.has_children(self.depth) {
                tracing::warn!(
                    savepoint = %self.savepoint,
                    "cursor dropped with nested cursors open; detaching them"
                );
                stack.truncate(self.depth + 1);
            }
        }
        if let Err(err) = self.close() {
            tracing::warn!(savepoint = %self.savepoint, error = %err, "failed to close dropped cursor");
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("savepoint", &self.savepoint)
            .field("depth", &self.depth)
            .field("state", &self.state)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
