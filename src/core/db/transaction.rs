/// Transaction Scope Module
///
/// `TransactionScope` counts nesting on its context. Entering increments the
/// depth, leaving decrements it, and only the exit that brings the depth back
/// to zero commits or rolls back. A scope that had to install the connection
/// itself also closes it on exit.
use crate::core::{DbError, Result};
use std::ops::{Deref, DerefMut};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::connection::Connection;
use super::context::ExecutionContext;
use super::query::profile;

/// Commits `connection`; on failure attempts a rollback and reports both
/// outcomes as `DbError::Transaction`.
pub(crate) fn commit_with_recovery(connection: &mut Connection) -> Result<()> {
    let cause = match connection.commit() {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    warn!("commit failed. try rollback...");
    let rollback = match connection.rollback() {
        Ok(()) => {
            warn!("rollback ok.");
            None
        }
        Err(e) => {
            error!("rollback failed: {}", e);
            Some(Box::new(e))
        }
    };
    Err(DbError::Transaction {
        cause: Box::new(cause),
        rollback,
    })
}

/// Guard for one level of a (possibly nested) transaction.
///
/// Finish it with [`commit`](TransactionScope::commit),
/// [`rollback`](TransactionScope::rollback) or [`exit`](TransactionScope::exit).
/// A scope dropped without being finished, by an early return or a panic,
/// exits as failed.
#[derive(Debug)]
pub struct TransactionScope<'a> {
    ctx: &'a mut ExecutionContext,
    owns_connection: bool,
    active: bool,
}

impl<'a> TransactionScope<'a> {
    /// Enters a transaction level on `ctx`.
    ///
    /// # Errors
    ///
    /// `UninitializedDatabase` if no driver is available; the depth is not
    /// touched in that case.
    pub fn enter(ctx: &'a mut ExecutionContext) -> Result<Self> {
        let owns_connection = ctx.ensure_connection()?;
        let depth = ctx.enter_transaction();
        if depth == 1 {
            debug!("begin transaction...");
        } else {
            debug!("join current transaction...");
        }
        Ok(TransactionScope {
            ctx,
            owns_connection,
            active: true,
        })
    }

    /// Whether this scope installed the connection and will close it
    pub fn owns_connection(&self) -> bool {
        self.owns_connection
    }

    /// Leaves the scope successfully.
    pub fn commit(self) -> Result<()> {
        self.exit(false)
    }

    /// Leaves the scope as failed.
    pub fn rollback(self) -> Result<()> {
        self.exit(true)
    }

    /// Leaves the scope, committing or rolling back if it is the outermost.
    ///
    /// # Errors
    ///
    /// - `Transaction` if the commit failed; a rollback has been attempted
    ///   and its failure, if any, is carried alongside.
    /// - `Database` if a requested rollback failed.
    pub fn exit(mut self, failed: bool) -> Result<()> {
        self.active = false;
        self.finish(failed)
    }

    fn finish(&mut self, failed: bool) -> Result<()> {
        let depth = self.ctx.leave_transaction();
        let outcome = if depth == 0 {
            if failed {
                self.rollback_outermost()
            } else {
                self.commit_outermost()
            }
        } else {
            Ok(())
        };
        if self.owns_connection {
            self.ctx.release_connection();
        }
        outcome
    }

    fn commit_outermost(&mut self) -> Result<()> {
        let connection = self.ctx.connection_mut()?;
        if !connection.is_open() {
            debug!("commit transaction: nothing to commit");
            return Ok(());
        }
        debug!("commit transaction...");
        commit_with_recovery(connection)?;
        debug!("commit ok.");
        Ok(())
    }

    fn rollback_outermost(&mut self) -> Result<()> {
        let connection = self.ctx.connection_mut()?;
        if !connection.is_open() {
            debug!("rollback transaction: nothing to roll back");
            return Ok(());
        }
        debug!("rollback transaction...");
        connection.rollback()?;
        info!("rollback ok.");
        Ok(())
    }
}

impl Deref for TransactionScope<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        self.ctx
    }
}

impl DerefMut for TransactionScope<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionContext {
        self.ctx
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            if let Err(e) = self.finish(true) {
                error!("rollback of abandoned transaction failed: {}", e);
            }
        }
    }
}

/// Runs `f` inside a [`TransactionScope`].
///
/// `Ok` exits the scope successfully, `Err` exits it as failed; the outermost
/// level commits or rolls back accordingly. The body's error is always the
/// one returned. If the rollback that follows it also fails, that failure is
/// logged.
///
/// ```ignore
/// with_transaction(&mut ctx, |ctx| {
///     ctx.insert("user", [("loginName", "eva"), ("loginPwd", "x")])?;
///     ctx.insert("profile", [("loginName", "eva")])?;
///     Ok::<_, DbError>(())
/// })?;
/// ```
pub fn with_transaction<T, E, F>(ctx: &mut ExecutionContext, f: F) -> std::result::Result<T, E>
where
    F: FnOnce(&mut ExecutionContext) -> std::result::Result<T, E>,
    E: From<DbError> + std::fmt::Display,
{
    let start = Instant::now();
    let mut scope = TransactionScope::enter(ctx)?;
    let result = match f(&mut *scope) {
        Ok(value) => scope.exit(false).map(|()| value).map_err(E::from),
        Err(e) => {
            if let Err(rollback) = scope.exit(true) {
                error!("transaction failed: {}; rollback failed: {}", e, rollback);
            }
            Err(e)
        }
    };
    profile(start, "<transaction>");
    result
}
