use super::runtime::dispatch_event;
use super::{ComponentState, PosecamOrchestrator};
use crate::config::ApiMode;
use crate::detection::{InjuryAnalyzer, TriggerSource};
use crate::error::{CameraError, EventBusError, PosecamError, Result};
use crate::events::EventFilter;
use crate::recovery::{RecoveryAction, RecoveryManager};
use crate::voice::{LineRecognizer, PhraseMatcher, SpeechRecognizer, VoiceListener};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

impl PosecamOrchestrator {
    /// Initialize all system components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing Posecam system components");

        tokio::fs::create_dir_all(self.config.capture.capture_dir()).await?;
        tokio::fs::create_dir_all(self.config.capture.cache_dir()).await?;

        // Set initial component states
        let mut states = self.component_states.lock().await;
        states.insert("camera".to_string(), ComponentState::Stopped);
        states.insert("pose".to_string(), ComponentState::Stopped);
        states.insert("dispatch".to_string(), ComponentState::Stopped);

        if self.voice_enabled() {
            states.insert("voice".to_string(), ComponentState::Stopped);
        }

        // Only register keyboard component if enabled
        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start all system components
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting Posecam system");

        // Camera first, everything else hangs off its frames
        self.set_component_state("camera", ComponentState::Starting)
            .await;
        if let Err(e) = self.start_camera().await {
            self.set_component_state("camera", ComponentState::Failed)
                .await;
            error!("Failed to start camera: {}", e);
            return Err(e);
        }
        self.set_component_state("camera", ComponentState::Running)
            .await;
        info!("Camera started successfully");

        self.set_component_state("pose", ComponentState::Starting)
            .await;
        self.pose_integration
            .start(self.camera.frames())
            .map_err(|e| {
                error!("Failed to start pose integration: {}", e);
                e
            })?;
        self.set_component_state("pose", ComponentState::Running)
            .await;
        info!("Pose integration started successfully");

        self.start_dispatch();
        self.set_component_state("dispatch", ComponentState::Running)
            .await;

        if self.reporter.api_mode() == ApiMode::Real {
            self.spawn_webhook_probe();
        } else {
            info!("Mock API mode - detections are simulated locally");
        }

        if self.config.voice.enabled && !self.voice_enabled() {
            warn!("Keyboard controls own the terminal - voice trigger on stdin disabled");
        }

        if self.voice_enabled() {
            self.set_component_state("voice", ComponentState::Starting)
                .await;
            self.start_voice();
            self.set_component_state("voice", ComponentState::Running)
                .await;
            info!("Voice trigger started successfully");
        }

        // Start keyboard input handler (only if enabled)
        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Starting)
                    .await;

                keyboard_handler.start().await.map_err(|e| {
                    error!("Failed to start keyboard handler: {}", e);
                    e
                })?;

                self.set_component_state("keyboard", ComponentState::Running)
                    .await;
            }
        }

        info!("Posecam system started successfully");
        Ok(())
    }

    /// Voice listens on stdin unless a recognizer was supplied; stdin is
    /// unavailable while the keyboard owns the terminal.
    pub(super) fn voice_enabled(&self) -> bool {
        self.config.voice.enabled && (self.voice_recognizer.is_some() || !self.keyboard_enabled)
    }

    async fn start_camera(&self) -> Result<()> {
        let mut recovery = RecoveryManager::new();
        let facing = self.config.camera.facing;

        loop {
            let error = match self.camera.start(facing).await {
                Ok(()) => break,
                Err(e) => e,
            };

            match recovery.handle_error("camera", &error) {
                RecoveryAction::RetryAfterDelay(delay) => {
                    warn!("Camera bind failed ({}), retrying in {:?}", error, delay);
                    tokio::time::sleep(delay).await;
                }
                RecoveryAction::GiveUp => return Err(error),
            }
        }

        self.wait_for_frames(FIRST_FRAME_TIMEOUT).await
    }

    /// Wait until the camera has delivered at least one frame
    async fn wait_for_frames(&self, limit: Duration) -> Result<()> {
        let mut frames = self.camera.frames();

        let waited = timeout(limit, async {
            loop {
                let ready = frames.borrow_and_update().is_some();
                if ready {
                    return Ok(());
                }
                if frames.changed().await.is_err() {
                    return Err(PosecamError::component("camera", "frame stream closed"));
                }
            }
        })
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => Err(CameraError::FrameTimeout { timeout: limit }.into()),
        }
    }

    fn start_dispatch(&mut self) {
        let mut receiver = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec![
                "user_command",
                "detection_completed",
                "capture_failed",
                "voice_listener_stopped",
            ]),
            "dispatch",
        );
        let modes = Arc::clone(&self.modes);
        let reporter = self.reporter.clone();
        let event_bus = self.event_bus.clone();
        let cancel = self.cancellation_token.clone();

        self.dispatch_task = Some(tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = receiver.recv() => event,
                };

                match event {
                    Ok(event) => dispatch_event(&modes, &reporter, &event_bus, event).await,
                    Err(EventBusError::ChannelClosed) => break,
                    Err(e) => warn!("Dispatch receiver error: {}", e),
                }
            }
            debug!("Event dispatch stopped");
        }));
    }

    fn spawn_webhook_probe(&self) {
        let client = Arc::clone(&self.webhook);
        tokio::spawn(async move {
            let report = client.probe().await;
            if report.reachable {
                info!("{}", report.message);
            } else {
                warn!(
                    "{} - detections will fall back to simulated results",
                    report.message
                );
            }
        });
    }

    fn start_voice(&mut self) {
        let recognizer: Box<dyn SpeechRecognizer> = match self.voice_recognizer.take() {
            Some(recognizer) => recognizer.into_inner(),
            None => {
                info!("Listening for trigger phrases on standard input");
                Box::new(LineRecognizer::new(BufReader::new(tokio::io::stdin())))
            }
        };

        let modes = Arc::clone(&self.modes);
        let listener = VoiceListener::new(
            recognizer,
            PhraseMatcher::new(self.config.voice.phrases.iter().cloned()),
            (&self.config.voice).into(),
            self.event_bus.clone(),
            Box::new(move |utterance: &str| {
                let outcome = modes.trigger_detection(TriggerSource::Voice);
                debug!("Voice trigger '{}' -> {:?}", utterance, outcome);
            }),
        );

        self.voice_task = Some(tokio::spawn(
            listener.run(self.cancellation_token.child_token()),
        ));
    }
}
