use super::{ComponentState, PosecamOrchestrator};
use crate::error::{PosecamError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

impl PosecamOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        // Stop components in reverse start order
        for component in ["keyboard", "voice", "dispatch", "pose", "camera"] {
            if let Err(e) = self.stop_component(component).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Stop a specific component
    async fn stop_component(&mut self, component: &str) -> Result<()> {
        if self.get_component_state(component).await.is_none() {
            return Ok(());
        }

        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        let result = match component {
            "keyboard" => match &self.keyboard_handler {
                Some(handler) => with_timeout(component, Duration::from_secs(2), handler.stop()).await,
                None => Ok(()),
            },
            "voice" => match self.voice_task.take() {
                Some(task) => {
                    let joined = with_timeout(component, Duration::from_secs(2), async {
                        task.await.map_err(|e| PosecamError::component("voice", e.to_string()))
                    })
                    .await;
                    joined.map(|state| info!("Voice listener ended in state {:?}", state))
                }
                None => Ok(()),
            },
            "dispatch" => match self.dispatch_task.take() {
                Some(task) => {
                    with_timeout(component, Duration::from_secs(2), async {
                        task.await
                            .map_err(|e| PosecamError::component("dispatch", e.to_string()))
                    })
                    .await
                }
                None => Ok(()),
            },
            "pose" => {
                with_timeout(component, Duration::from_secs(5), self.pose_integration.stop()).await
            }
            "camera" => with_timeout(component, Duration::from_secs(10), self.camera.stop()).await,
            _ => Ok(()),
        };

        match &result {
            Ok(()) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
            }
        }
        result
    }
}

async fn with_timeout<T, F>(component: &str, limit: Duration, stop: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(limit, stop).await {
        Ok(result) => result,
        Err(_) => {
            error!("{} component stop timeout", component);
            Err(PosecamError::component(
                component,
                format!("{} component stop timeout", component),
            ))
        }
    }
}
