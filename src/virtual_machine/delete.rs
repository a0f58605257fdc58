//! Deletion of virtual machines.
//!
//! A deletion is planned as an ordered list of [`DeleteStep`] from the power
//! state of the machine, then run step by step. The first failing step stops
//! the deletion and is named in the error.

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::api::{self, ApiError, VirtualMachineUpdate};
use crate::meta::{random_suffix, Meta};
use crate::operations::{purge_trash_object, wait_for_task};
use crate::waiter::{WaitError, Waiter};

pub const MAX_HOSTNAME_LENGTH: usize = 63;
const TRASH_SUFFIX_LENGTH: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    Stop,
    WaitStopped,
    RenameForTrash,
    Delete,
    UnallocateIps,
    PurgeFromTrash,
}

impl DeleteStep {
    pub fn name(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::WaitStopped => "wait for stop",
            Self::RenameForTrash => "rename for trash",
            Self::Delete => "delete",
            Self::UnallocateIps => "unallocate ips",
            Self::PurgeFromTrash => "purge from trash",
        }
    }
}

impl Display for DeleteStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("cannot delete virtual machine in state: {0}")]
    IllegalState(String),

    #[error("failed to {step} virtual machine: {source}")]
    Step {
        step: DeleteStep,
        #[source]
        source: WaitError,
    },
}

/// Steps deleting a machine in the power state `state`
pub fn plan(state: &str, skip_trash_object_purge: bool) -> Result<Vec<DeleteStep>, DeleteError> {
    let mut steps = match state {
        "started" => vec![DeleteStep::Stop, DeleteStep::WaitStopped],
        "stopping" | "shutting_down" => vec![DeleteStep::WaitStopped],
        "stopped" => vec![],
        other => return Err(DeleteError::IllegalState(other.to_owned())),
    };
    if skip_trash_object_purge {
        steps.push(DeleteStep::RenameForTrash);
    }
    steps.extend([DeleteStep::Delete, DeleteStep::UnallocateIps]);
    if !skip_trash_object_purge {
        steps.push(DeleteStep::PurgeFromTrash);
    }
    Ok(steps)
}

/// Steps deleting a machine already in the trash
pub fn plan_in_trash(skip_trash_object_purge: bool) -> Vec<DeleteStep> {
    if skip_trash_object_purge {
        vec![]
    } else {
        vec![DeleteStep::PurgeFromTrash]
    }
}

/// Hostname freed for new machines: hostnames are unique within an organization,
/// trash included
pub fn trash_hostname(hostname: &str) -> String {
    let suffix = format!("-{}", random_suffix(TRASH_SUFFIX_LENGTH));
    let kept = MAX_HOSTNAME_LENGTH.saturating_sub(suffix.len());
    let prefix = hostname.chars().take(kept).collect::<String>();
    format!("{prefix}{suffix}")
}

fn is_gone(err: &ApiError) -> bool {
    err.is_not_found() || matches!(err, ApiError::InTrash { .. })
}

fn unless_gone<T>(result: api::Result<T>) -> api::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if is_gone(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

fn wait_unless_gone<T>(result: Result<T, WaitError>) -> Result<(), WaitError> {
    match result {
        Err(WaitError::Refresh(err)) if is_gone(&err) => Ok(()),
        result => result.map(|_| ()),
    }
}

pub struct Deletion<'m> {
    pub meta: &'m Meta,
    pub id: &'m str,
    pub hostname: &'m str,
    pub ip_address_ids: &'m [String],
    pub timeout: Duration,
}

impl Deletion<'_> {
    pub async fn run(&self, steps: &[DeleteStep]) -> Result<(), DeleteError> {
        for &step in steps {
            debug!(id = self.id, %step, "running delete step");
            self.step(step)
                .await
                .map_err(|source| DeleteError::Step { step, source })?;
        }
        info!(id = self.id, "virtual machine deleted");
        Ok(())
    }

    async fn step(&self, step: DeleteStep) -> Result<(), WaitError> {
        let client = self.meta.client.as_ref();
        match step {
            DeleteStep::Stop => {
                if let Some(task) = unless_gone(client.stop_virtual_machine(self.id).await)? {
                    wait_unless_gone(wait_for_task(self.meta, &task.id, self.timeout).await)?;
                }
            }
            DeleteStep::WaitStopped => {
                let result = Waiter::virtual_machine_stopped(self.meta.cancel_token())
                    .with_timeout(self.timeout)
                    .wait(|| async {
                        let vm = client.get_virtual_machine(self.id).await?;
                        Ok(((), vm.state))
                    })
                    .await;
                wait_unless_gone(result)?;
            }
            DeleteStep::RenameForTrash => {
                let args = VirtualMachineUpdate {
                    hostname: Some(trash_hostname(self.hostname)),
                    ..Default::default()
                };
                unless_gone(client.update_virtual_machine(self.id, &args).await)?;
            }
            DeleteStep::Delete => {
                unless_gone(client.delete_virtual_machine(self.id).await)?;
            }
            DeleteStep::UnallocateIps => {
                for ip_address_id in self.ip_address_ids {
                    api::optional(client.unallocate_ip_address(ip_address_id).await)?;
                }
            }
            DeleteStep::PurgeFromTrash => {
                purge_trash_object(self.meta, self.id, self.timeout).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeleteStep::*;

    #[test]
    fn plans_per_state() {
        for (state, skip, expected) in [
            ("started", false, vec![Stop, WaitStopped, Delete, UnallocateIps, PurgeFromTrash]),
            ("stopping", false, vec![WaitStopped, Delete, UnallocateIps, PurgeFromTrash]),
            ("shutting_down", false, vec![WaitStopped, Delete, UnallocateIps, PurgeFromTrash]),
            ("stopped", false, vec![Delete, UnallocateIps, PurgeFromTrash]),
            ("started", true, vec![Stop, WaitStopped, RenameForTrash, Delete, UnallocateIps]),
            ("stopped", true, vec![RenameForTrash, Delete, UnallocateIps]),
        ] {
            assert_eq!(plan(state, skip).unwrap(), expected, "{state} {skip}");
        }
    }

    #[test]
    fn illegal_states() {
        for state in ["allocating", "starting", "migrating", ""] {
            let err = plan(state, false).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("cannot delete virtual machine in state: {state}")
            );
        }
    }

    #[test]
    fn trash_plans() {
        assert_eq!(plan_in_trash(false), vec![PurgeFromTrash]);
        assert!(plan_in_trash(true).is_empty());
    }

    #[test]
    fn trash_hostnames() {
        let hostname = trash_hostname("web-1");
        assert!(hostname.starts_with("web-1-"));
        assert_eq!(hostname.len(), "web-1-".len() + 12);

        let long = "a".repeat(80);
        let hostname = trash_hostname(&long);
        assert_eq!(hostname.len(), MAX_HOSTNAME_LENGTH);
        assert!(hostname.starts_with(&"a".repeat(50)));
        assert_ne!(trash_hostname("web-1"), trash_hostname("web-1"));
    }
}
