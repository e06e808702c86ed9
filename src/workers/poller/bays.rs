//! Parking-bay status file source.
//!
//! A separate scraper keeps a JSON document on disk. The document is re-read
//! every interval and reported when it changed, when its mtime moved on by
//! more than the stale window, or when a fetch is forced.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::{debug, error};

use super::PollSource;
use crate::config::BaysConfig;
use crate::events::{ClientId, Event};
use crate::workers::WorkerError;

pub struct BaysSource {
    path: PathBuf,
    stale_mtime: Duration,
    last_payload: Option<String>,
    last_mtime: Option<SystemTime>,
}

impl BaysSource {
    /// `None` when the source is disabled.
    pub fn new(config: &BaysConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            path: config.file.clone(),
            stale_mtime: config.stale_mtime(),
            last_payload: None,
            last_mtime: None,
        })
    }

    fn mtime_moved(&self, mtime: SystemTime) -> bool {
        match self.last_mtime {
            None => true,
            Some(last) => mtime
                .duration_since(last)
                .map(|moved| moved > self.stale_mtime)
                .unwrap_or(false),
        }
    }

    async fn read(&self) -> Result<(SystemTime, String), WorkerError> {
        let io = |e: std::io::Error| WorkerError::Source(format!("{}: {}", self.path.display(), e));
        let mtime = tokio::fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(io)?;
        let payload = tokio::fs::read_to_string(&self.path).await.map_err(io)?;
        serde_json::from_str::<serde_json::Value>(&payload).map_err(|e| {
            WorkerError::Source(format!("{}: {}", self.path.display(), e))
        })?;
        Ok((mtime, payload))
    }
}

#[async_trait]
impl PollSource for BaysSource {
    fn client_id(&self) -> ClientId {
        ClientId::ParkingBays
    }

    async fn fetch(&mut self, force: bool) -> Result<Vec<Event>, WorkerError> {
        let (mtime, payload) = match self.read().await {
            Ok(read) => read,
            Err(e) => {
                error!(error = %e, "Unable to load and parse bay status file");
                return Err(e);
            }
        };

        let changed = self.last_payload.as_deref() != Some(payload.as_str());
        if !(force || changed || self.mtime_moved(mtime)) {
            return Ok(Vec::new());
        }
        debug!(path = %self.path.display(), force, changed, "Bay status updated");
        self.last_payload = Some(payload.clone());
        self.last_mtime = Some(mtime);
        Ok(vec![Event::ParkingBaysUpdate { payload }])
    }
}
