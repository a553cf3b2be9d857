use crate::error::Result;
use crate::events::{EventBus, PosecamEvent, UserCommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::{Duration, SystemTime};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Command(UserCommand),
    Quit,
}

/// Map a key to its action, if it has one
pub fn action_for_key(code: KeyCode) -> Option<KeyAction> {
    let command = match code {
        KeyCode::Char(' ') | KeyCode::Enter => UserCommand::Capture,
        KeyCode::Char('a') => UserCommand::AnalyzeLatest,
        KeyCode::Char('s') => UserCommand::SwitchCamera,
        KeyCode::Char('m') | KeyCode::Tab => UserCommand::NextMode,
        KeyCode::Char('t') => UserCommand::ToggleMockApi,
        KeyCode::Char('d') => UserCommand::DismissResult,
        KeyCode::Char('q') | KeyCode::Esc => return Some(KeyAction::Quit),
        _ => return None,
    };
    Some(KeyAction::Command(command))
}

/// Single-key terminal controls for the camera screen
pub struct KeyboardInputHandler {
    event_bus: EventBus,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    /// Create a new keyboard input handler
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!(
            "Keyboard controls: SPACE capture, a analyze latest, s switch camera, \
             m next mode, t toggle mock API, d dismiss, q quit"
        );

        let event_bus = self.event_bus.clone();
        let cancellation_token = self.cancellation_token.clone();

        // Spawn a blocking task to handle keyboard input
        task::spawn_blocking(move || {
            // Enable raw mode to capture individual key presses
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                // Poll for keyboard events with a timeout
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let key_event = match event::read() {
                            Ok(Event::Key(key_event)) if key_event.kind == KeyEventKind::Press => {
                                key_event
                            }
                            _ => continue,
                        };

                        let event = match action_for_key(key_event.code) {
                            Some(KeyAction::Command(command)) => {
                                debug!("Key {:?} -> {:?}", key_event.code, command);
                                PosecamEvent::UserCommand { command }
                            }
                            Some(KeyAction::Quit) => {
                                info!("Quit key pressed - requesting shutdown");
                                if let Err(e) = event_bus.publish(PosecamEvent::ShutdownRequested {
                                    timestamp: SystemTime::now(),
                                    reason: "User requested via keyboard".to_string(),
                                }) {
                                    warn!("Failed to publish shutdown event: {}", e);
                                }
                                break;
                            }
                            None => {
                                debug!("Key pressed: {:?}", key_event.code);
                                continue;
                            }
                        };

                        if let Err(e) = event_bus.publish(event) {
                            warn!("Failed to publish keyboard command: {}", e);
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            // Disable raw mode when exiting
            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(
            action_for_key(KeyCode::Char(' ')),
            Some(KeyAction::Command(UserCommand::Capture))
        );
        assert_eq!(
            action_for_key(KeyCode::Char('a')),
            Some(KeyAction::Command(UserCommand::AnalyzeLatest))
        );
        assert_eq!(
            action_for_key(KeyCode::Char('t')),
            Some(KeyAction::Command(UserCommand::ToggleMockApi))
        );
        assert_eq!(action_for_key(KeyCode::Esc), Some(KeyAction::Quit));
        assert_eq!(action_for_key(KeyCode::Char('z')), None);
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let handler = KeyboardInputHandler::new(EventBus::new(100));
        assert!(!handler.cancellation_token.is_cancelled());

        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}
