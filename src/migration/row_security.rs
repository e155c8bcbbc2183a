// ABOUTME: Save/suspend/restore bracket for row-level security around a bulk load
// ABOUTME: Re-enables RLS after the load on every return path if it was enabled before

use crate::error::Result;
use crate::migration::TableRef;
use crate::postgres::TableSession;
use std::future::Future;

/// Run `load` with row-level security on `table` suspended.
///
/// The current RLS state is read first. If it is enabled it is disabled,
/// `load` runs, and RLS is enabled again whether `load` succeeded or not.
/// If it was already disabled nothing is toggled in either direction.
///
/// Returns the load's value together with whether RLS had to be suspended.
/// When both the load and the restore fail the load's error is returned and
/// the restore failure is logged.
pub async fn with_row_security_suspended<S, F, Fut, T>(
    session: &S,
    table: &TableRef,
    load: F,
) -> Result<(T, bool)>
where
    S: TableSession + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let guard = RowSecurityGuard::acquire(session, table).await?;
    let suspended = guard.was_enabled;
    let outcome = load().await;
    let value = guard.release(outcome).await?;
    Ok((value, suspended))
}

struct RowSecurityGuard<'a, S: TableSession + ?Sized> {
    session: &'a S,
    table: &'a TableRef,
    was_enabled: bool,
    released: bool,
}

impl<'a, S: TableSession + ?Sized> RowSecurityGuard<'a, S> {
    async fn acquire(session: &'a S, table: &'a TableRef) -> Result<Self> {
        let was_enabled = session.row_security_enabled(table).await?;

        if was_enabled {
            tracing::info!("  Disabling row level security on {} for the load", table);
            session
                .execute(&format!(
                    "ALTER TABLE {} DISABLE ROW LEVEL SECURITY",
                    table.quoted()
                ))
                .await?;
        } else {
            tracing::debug!("Row level security not enabled on {}", table);
        }

        Ok(Self {
            session,
            table,
            was_enabled,
            released: false,
        })
    }

    async fn release<T>(mut self, outcome: Result<T>) -> Result<T> {
        self.released = true;
        if !self.was_enabled {
            return outcome;
        }

        let restored = self
            .session
            .execute(&format!(
                "ALTER TABLE {} ENABLE ROW LEVEL SECURITY",
                self.table.quoted()
            ))
            .await;

        match (outcome, restored) {
            (Ok(value), Ok(())) => {
                tracing::info!("  Row level security on {} restored", self.table);
                Ok(value)
            }
            (Ok(_), Err(restore_err)) => Err(restore_err),
            (Err(load_err), Ok(())) => {
                tracing::info!(
                    "  Row level security on {} restored after failed load",
                    self.table
                );
                Err(load_err)
            }
            (Err(load_err), Err(restore_err)) => {
                tracing::error!(
                    "Failed to restore row level security on {}: {}",
                    self.table,
                    restore_err
                );
                Err(load_err)
            }
        }
    }
}

impl<S: TableSession + ?Sized> Drop for RowSecurityGuard<'_, S> {
    fn drop(&mut self) {
        if self.was_enabled && !self.released {
            tracing::error!(
                "Load of {} was abandoned with row level security disabled; \
                 run ALTER TABLE {} ENABLE ROW LEVEL SECURITY",
                self.table,
                self.table.quoted()
            );
        }
    }
}
