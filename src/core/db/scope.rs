/// Connection Scope Module
///
/// A `ConnectionScope` guarantees its context holds a connection for as long
/// as the guard lives. Scopes nest freely; only the outermost one, the scope
/// that installed the connection, closes it when dropped.
use crate::core::DbError;
use std::ops::{Deref, DerefMut};

use super::context::ExecutionContext;

/// Guard keeping a connection installed on an [`ExecutionContext`]
#[derive(Debug)]
pub struct ConnectionScope<'a> {
    ctx: &'a mut ExecutionContext,
    owns_connection: bool,
}

impl<'a> ConnectionScope<'a> {
    /// Enters a scope, installing a lazy connection if the context has none.
    ///
    /// # Errors
    ///
    /// `UninitializedDatabase` if the context has no explicit driver and no
    /// process-wide driver has been recorded. The context is left untouched.
    pub fn enter(ctx: &'a mut ExecutionContext) -> crate::core::Result<Self> {
        let owns_connection = ctx.ensure_connection()?;
        Ok(ConnectionScope {
            ctx,
            owns_connection,
        })
    }

    /// Whether this scope installed the connection and will close it
    pub fn owns_connection(&self) -> bool {
        self.owns_connection
    }

    /// Leaves the scope; equivalent to dropping it.
    pub fn exit(self) {}
}

impl Deref for ConnectionScope<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        self.ctx
    }
}

impl DerefMut for ConnectionScope<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionContext {
        self.ctx
    }
}

impl Drop for ConnectionScope<'_> {
    fn drop(&mut self) {
        if self.owns_connection {
            self.ctx.release_connection();
        }
    }
}

/// Runs `f` inside a [`ConnectionScope`], so every query it issues shares
/// one connection.
///
/// ```ignore
/// with_connection(&mut ctx, |ctx| {
///     let user = ctx.select_one("select * from user where loginName=?", args!["eva"])?;
///     ctx.update("update user set lastLogin=? where loginName=?", args![now, "eva"])?;
///     Ok::<_, DbError>(user)
/// })?;
/// ```
pub fn with_connection<T, E, F>(ctx: &mut ExecutionContext, f: F) -> Result<T, E>
where
    F: FnOnce(&mut ExecutionContext) -> Result<T, E>,
    E: From<DbError>,
{
    let mut scope = ConnectionScope::enter(ctx)?;
    f(&mut *scope)
}
