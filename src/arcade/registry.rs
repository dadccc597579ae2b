//! Registry of configured bus groups, owned by the process root

use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::error::{LifecycleError, SetupError};
use super::group::BusGroup;
use crate::config::{ConfigError, PollSettings, PortMap};
use crate::input::InputBackend;
use crate::port::PortProvider;

#[derive(Default)]
pub struct ArcadeRegistry {
    groups: Vec<BusGroup>,
}

impl ArcadeRegistry {
    /// Configures one bus group per port map.
    ///
    /// On the first failure every group configured so far is torn down and
    /// the error is returned. Fails with [`SetupError::NoDevice`] when no
    /// port map is given.
    pub async fn configure(
        maps: &[PortMap],
        provider: &dyn PortProvider,
        backend: &dyn InputBackend,
        settings: &PollSettings,
    ) -> Result<Self, SetupError> {
        let mut registry = Self::default();
        let mut seen = HashSet::new();

        for map in maps {
            let result = if seen.insert(map.port) {
                BusGroup::configure(map.port, &map.pads, provider, backend, settings)
            } else {
                Err(ConfigError::DuplicatePort(map.port).into())
            };

            match result {
                Ok(group) => registry.groups.push(group),
                Err(e) => {
                    error!("Failed to configure port {}: {}", map.port, e);
                    registry.shutdown().await;
                    return Err(e);
                }
            }
        }

        if registry.groups.is_empty() {
            error!("No arcade port configured");
            return Err(SetupError::NoDevice);
        }

        info!("Configured {} arcade ports", registry.groups.len());
        Ok(registry)
    }

    pub fn groups(&self) -> &[BusGroup] {
        &self.groups
    }

    pub fn group(&self, port: u32) -> Option<&BusGroup> {
        self.groups.iter().find(|group| group.number() == port)
    }

    /// Opens every configured connector, as a consumer attaching to each
    /// device would. Connectors opened before a failure are closed again.
    pub async fn open_all(&self, cancel: &CancellationToken) -> Result<usize, LifecycleError> {
        let mut opened: Vec<(&BusGroup, usize)> = Vec::new();

        for group in &self.groups {
            for index in group.connectors() {
                if let Err(e) = group.open(index, cancel).await {
                    warn!(
                        "Opening {}/control{} failed: {}",
                        group.port_name(),
                        index,
                        e
                    );
                    for (group, index) in opened.into_iter().rev() {
                        group.close(index).await;
                    }
                    return Err(e);
                }
                opened.push((group, index));
            }
        }

        info!("Opened {} devices", opened.len());
        Ok(opened.len())
    }

    /// Closes every configured connector once.
    pub async fn close_all(&self) {
        for group in &self.groups {
            for index in group.connectors() {
                group.close(index).await;
            }
        }
    }

    /// Tears down every group, last configured first.
    pub async fn shutdown(mut self) {
        while let Some(group) = self.groups.pop() {
            group.teardown().await;
        }
        info!("Arcade registry shut down");
    }
}
