use crate::detection::{DetectionResult, TriggerSource};
use crate::error::EventBusError;
use crate::frame::LensFacing;
use crate::modes::CaptureMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Commands issued by a person at the controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCommand {
    /// Shutter press in the current mode
    Capture,
    /// Analyze the most recent pose frame without a new capture
    AnalyzeLatest,
    SwitchCamera,
    NextMode,
    ToggleMockApi,
    DismissResult,
}

/// Events that can occur in the posecam system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PosecamEvent {
    /// A frame passed the throttle and produced an overlay
    OverlayReady {
        frame_id: u64,
        landmark_count: usize,
        command_count: usize,
        timestamp: SystemTime,
    },
    /// The camera was unbound and bound again with a new lens
    CameraRebound {
        facing: LensFacing,
        timestamp: SystemTime,
    },
    /// The speech recognizer heard a trigger phrase
    VoiceCommand { utterance: String },
    /// Voice listening switched on or off
    ListeningStateChanged { listening: bool },
    /// The voice listener stopped for good
    VoiceListenerStopped { reason: String },
    /// A capture-and-analyze cycle began
    DetectionStarted { cycle_id: String, source: TriggerSource },
    /// A capture-and-analyze cycle produced a result
    DetectionCompleted {
        cycle_id: String,
        result: DetectionResult,
    },
    /// The still capture of a cycle failed
    CaptureFailed { cycle_id: String, message: String },
    /// A photo, document or pose snapshot was written to disk
    CaptureSaved { mode: CaptureMode, path: PathBuf },
    /// The capture mode selector moved
    ModeChanged { mode: CaptureMode },
    /// User input from the keyboard or another control surface
    UserCommand { command: UserCommand },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl PosecamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PosecamEvent::OverlayReady {
                frame_id,
                landmark_count,
                command_count,
                ..
            } => format!(
                "Overlay for frame {}: {} landmarks, {} draw commands",
                frame_id, landmark_count, command_count
            ),
            PosecamEvent::CameraRebound { facing, .. } => {
                format!("Camera rebound to {} lens", facing)
            }
            PosecamEvent::VoiceCommand { utterance } => {
                format!("Voice command recognized: '{}'", utterance)
            }
            PosecamEvent::ListeningStateChanged { listening } => {
                format!(
                    "Voice listening {}",
                    if *listening { "started" } else { "stopped" }
                )
            }
            PosecamEvent::VoiceListenerStopped { reason } => {
                format!("Voice listener stopped: {}", reason)
            }
            PosecamEvent::DetectionStarted { cycle_id, source } => {
                format!("Detection {} started ({})", cycle_id, source)
            }
            PosecamEvent::DetectionCompleted { cycle_id, result } => {
                format!("Detection {} completed: {}", cycle_id, result.message)
            }
            PosecamEvent::CaptureFailed { cycle_id, message } => {
                format!("Detection {} capture failed: {}", cycle_id, message)
            }
            PosecamEvent::CaptureSaved { mode, path } => {
                format!("{} capture saved to {}", mode, path.display())
            }
            PosecamEvent::ModeChanged { mode } => format!("Mode changed to {}", mode),
            PosecamEvent::UserCommand { command } => format!("User command: {:?}", command),
            PosecamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            PosecamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PosecamEvent::OverlayReady { .. } => "overlay_ready",
            PosecamEvent::CameraRebound { .. } => "camera_rebound",
            PosecamEvent::VoiceCommand { .. } => "voice_command",
            PosecamEvent::ListeningStateChanged { .. } => "listening_state_changed",
            PosecamEvent::VoiceListenerStopped { .. } => "voice_listener_stopped",
            PosecamEvent::DetectionStarted { .. } => "detection_started",
            PosecamEvent::DetectionCompleted { .. } => "detection_completed",
            PosecamEvent::CaptureFailed { .. } => "capture_failed",
            PosecamEvent::CaptureSaved { .. } => "capture_saved",
            PosecamEvent::ModeChanged { .. } => "mode_changed",
            PosecamEvent::UserCommand { .. } => "user_command",
            PosecamEvent::SystemError { .. } => "system_error",
            PosecamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<PosecamEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PosecamEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: PosecamEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        // Log important events at appropriate levels
        match &event {
            PosecamEvent::DetectionCompleted { result, .. } => {
                info!("Detection result ({}): {}", result.provenance, result.message);
            }
            PosecamEvent::CaptureFailed { message, .. } => {
                warn!("Capture failed: {}", message);
            }
            PosecamEvent::VoiceListenerStopped { reason } => {
                warn!("Voice listener stopped: {}", reason);
            }
            PosecamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            PosecamEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events from specific components (for SystemError events)
    Components(Vec<String>),
    /// Custom filter function
    Custom(fn(&PosecamEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &PosecamEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Components(components) => {
                if let PosecamEvent::SystemError { component, .. } = event {
                    components.contains(component)
                } else {
                    false
                }
            }
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<PosecamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<PosecamEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<PosecamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                    // Continue loop to get next event if this one doesn't match filter
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<PosecamEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
