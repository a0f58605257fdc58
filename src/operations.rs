//! Multi-call operations shared by several resources.

use std::time::Duration;

use tracing::{debug, info};

use crate::api::{ApiError, Task};
use crate::meta::Meta;
use crate::waiter::{WaitError, Waiter};

/// Wait until a task is completed
pub async fn wait_for_task(meta: &Meta, task_id: &str, timeout: Duration) -> Result<Task, WaitError> {
    Waiter::task(meta.cancel_token())
        .with_timeout(timeout)
        .wait(|| async {
            let task = meta.client.get_task(task_id).await?;
            let status = task.status.clone();
            Ok((task, status))
        })
        .await
}

/// Permanently remove an object from the trash
///
/// An object absent from the trash is considered purged.
pub async fn purge_trash_object(
    meta: &Meta,
    object_id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    match meta.client.purge_trash_object(object_id).await {
        Ok(task) => debug!(object_id, task_id = task.id, "trash object purge started"),
        Err(err) if err.is_not_found() => {
            debug!(object_id, "trash object already gone");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }

    Waiter::trash_object_purged(meta.cancel_token())
        .with_timeout(timeout)
        .wait(|| async {
            match meta.client.get_trash_object(object_id).await {
                Ok(_) => Ok(((), String::from("exists"))),
                Err(ApiError::NotFound(_)) => Ok(((), String::from("not_found"))),
                Err(err) => Err(err),
            }
        })
        .await?;

    info!(object_id, "trash object purged");
    Ok(())
}
