use super::{PosecamOrchestrator, ShutdownReason};
use crate::config::ApiMode;
use crate::detection::{DetectionReporter, TriggerSource};
use crate::error::{EventBusError, PosecamError, Result};
use crate::events::{EventBus, EventFilter, PosecamEvent, UserCommand};
use crate::modes::ModeController;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

type SharedSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl PosecamOrchestrator {
    /// Run the main application loop with signal handling
    pub async fn run(&mut self) -> Result<i32> {
        info!("Posecam system is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| PosecamError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| PosecamError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(Arc::clone(&shutdown_sender));
        self.watch_shutdown_requests(shutdown_sender);

        // Wait for shutdown signal
        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| PosecamError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {}", shutdown_reason);

        let exit_code = match shutdown_reason {
            ShutdownReason::Error(_) => self.shutdown().await?.max(1),
            _ => self.shutdown().await?,
        };

        info!("Posecam system shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_sender: SharedSender) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_shutdown(
                        &shutdown_sender_sigterm,
                        ShutdownReason::Signal("SIGTERM".to_string()),
                    )
                    .await;
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_shutdown(
                    &shutdown_sender,
                    ShutdownReason::Signal("SIGINT".to_string()),
                )
                .await;
            }
        });
    }

    /// Turn `ShutdownRequested` events into a shutdown
    fn watch_shutdown_requests(&self, shutdown_sender: SharedSender) {
        let mut receiver = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown",
        );
        let cancel = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = receiver.recv() => event,
                };

                match event {
                    Ok(PosecamEvent::ShutdownRequested { reason, .. }) => {
                        send_shutdown(&shutdown_sender, ShutdownReason::UserRequest(reason))
                            .await;
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Shutdown watcher receiver error: {}", e);
                        if matches!(e, EventBusError::ChannelClosed) {
                            return;
                        }
                    }
                }
            }
        });
    }
}

async fn send_shutdown(sender: &SharedSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}

/// Apply one bus event to the camera screen
pub async fn dispatch_event(
    modes: &ModeController,
    reporter: &DetectionReporter,
    event_bus: &EventBus,
    event: PosecamEvent,
) {
    match event {
        PosecamEvent::UserCommand { command } => {
            if let Err(e) = run_command(modes, reporter, command).await {
                error!("{:?} failed: {}", command, e);
                let _ = event_bus.publish(PosecamEvent::SystemError {
                    component: "modes".to_string(),
                    error: e.user_message(),
                });
            }
        }
        PosecamEvent::DetectionCompleted { cycle_id, result } => {
            info!(
                "Detection {} finished ({}): {}",
                cycle_id, result.provenance, result.message
            );
            modes.on_detection_completed(&result);
        }
        PosecamEvent::CaptureFailed { cycle_id, message } => {
            warn!("Detection {} capture failed: {}", cycle_id, message);
            modes.on_capture_failed(&message);
        }
        PosecamEvent::VoiceListenerStopped { reason } => {
            warn!("Voice trigger unavailable: {}", reason);
        }
        other => debug!("Dispatch ignoring {}", other.event_type()),
    }
}

async fn run_command(
    modes: &ModeController,
    reporter: &DetectionReporter,
    command: UserCommand,
) -> Result<()> {
    debug!("User command: {:?}", command);
    match command {
        UserCommand::Capture => {
            let outcome = modes.capture().await?;
            debug!("Capture in {} mode: {:?}", modes.mode(), outcome);
        }
        UserCommand::AnalyzeLatest => {
            let outcome = modes.trigger_detection(TriggerSource::LatestFrame);
            info!("Analyze latest frame: {:?}", outcome);
        }
        UserCommand::SwitchCamera => {
            let facing = modes.switch_camera().await?;
            info!("Switched to {} camera", facing);
        }
        UserCommand::NextMode => {
            let mode = modes.next_mode();
            info!("Capture mode: {}", mode);
        }
        UserCommand::ToggleMockApi => {
            let mode = match reporter.api_mode() {
                ApiMode::Real => ApiMode::Mock,
                ApiMode::Mock => ApiMode::Real,
            };
            reporter.set_api_mode(mode);
            info!("API mode: {:?}", mode);
        }
        UserCommand::DismissResult => {
            modes.clear_results();
            modes.clear_error();
        }
    }
    Ok(())
}
