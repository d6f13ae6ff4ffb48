//! In-memory mount table and executor for unit tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::NfsError;
use crate::executor::MountExecutor;
use crate::mount_table::{MountEntry, MountTable};

/// Records mount attempts; a successful mount shows up in the table.
#[derive(Default)]
pub(crate) struct FakeMounts {
    mounted: Mutex<HashSet<PathBuf>>,
    calls: Mutex<Vec<(String, PathBuf)>>,
    delay: Option<Duration>,
    fail: Option<String>,
}

impl FakeMounts {
    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            fail: Some(reason.to_owned()),
            ..Default::default()
        }
    }

    pub(crate) fn mark_mounted(&self, path: PathBuf) {
        self.mounted.lock().unwrap().insert(path);
    }

    pub(crate) fn mount_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MountTable for FakeMounts {
    async fn entries(&self) -> Result<Vec<MountEntry>, NfsError> {
        Ok(self
            .mounted
            .lock()
            .unwrap()
            .iter()
            .map(|p| MountEntry {
                source: "fake".to_owned(),
                mount_point: p.clone(),
                fs_type: "nfs4".to_owned(),
            })
            .collect())
    }
}

#[async_trait]
impl MountExecutor for FakeMounts {
    async fn mount(&self, remote: &str, target: &Path) -> Result<(), NfsError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls
            .lock()
            .unwrap()
            .push((remote.to_owned(), target.to_path_buf()));
        if let Some(reason) = &self.fail {
            return Err(NfsError::MountFailed {
                remote: remote.to_owned(),
                path: target.display().to_string(),
                reason: reason.clone(),
            });
        }
        self.mounted.lock().unwrap().insert(target.to_path_buf());
        Ok(())
    }
}
