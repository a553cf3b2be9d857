use super::matcher::PhraseMatcher;
use super::recognizer::{SpeechRecognizer, Utterance};
use crate::error::{PosecamError, VoiceError};
use crate::events::{EventBus, PosecamEvent};
use crate::recovery::{RecoveryAction, RecoveryConfig, RecoveryManager};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "voice";

/// Lifecycle of the voice listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Listening,
    /// Waiting to restart after recognizer failure number `attempt`
    Backoff { attempt: u32 },
    /// Input ended or the listener was cancelled
    Stopped,
    /// Too many consecutive recognizer failures
    GaveUp,
}

/// Called with the utterance text whenever a trigger phrase is heard
pub type TriggerCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Runs a speech recognizer continuously and fires on trigger phrases
pub struct VoiceListener {
    recognizer: Box<dyn SpeechRecognizer>,
    matcher: PhraseMatcher,
    recovery: RecoveryManager,
    event_bus: EventBus,
    on_trigger: TriggerCallback,
    state: Arc<Mutex<ListenerState>>,
    /// Set once a partial result of the current utterance has fired
    fired_on_partial: bool,
}

impl VoiceListener {
    pub fn new(
        recognizer: Box<dyn SpeechRecognizer>,
        matcher: PhraseMatcher,
        recovery: RecoveryConfig,
        event_bus: EventBus,
        on_trigger: TriggerCallback,
    ) -> Self {
        Self {
            recognizer,
            matcher,
            recovery: RecoveryManager::with_config(recovery),
            event_bus,
            on_trigger,
            state: Arc::new(Mutex::new(ListenerState::Idle)),
            fired_on_partial: false,
        }
    }

    /// Shared view of the listener state
    pub fn state_handle(&self) -> Arc<Mutex<ListenerState>> {
        Arc::clone(&self.state)
    }

    pub fn state(&self) -> ListenerState {
        *self.state.lock()
    }

    fn set_state(&self, state: ListenerState) {
        let mut current = self.state.lock();
        if *current != state {
            debug!("Voice listener {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    fn publish(&self, event: PosecamEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            error!("Failed to publish voice event: {}", e);
        }
    }

    /// Listen until cancelled, the input ends, or recovery gives up
    pub async fn run(mut self, cancel: CancellationToken) -> ListenerState {
        info!(
            "Voice listener starting with {} trigger phrases",
            self.matcher.phrases().len()
        );

        let final_state = loop {
            if let Err(e) = self.recognizer.start().await {
                match self.backoff(e, &cancel).await {
                    Some(state) => break state,
                    None => continue,
                }
            }

            self.set_state(ListenerState::Listening);
            self.publish(PosecamEvent::ListeningStateChanged { listening: true });

            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(None),
                outcome = self.listen() => outcome,
            };

            self.recognizer.stop().await;
            self.publish(PosecamEvent::ListeningStateChanged { listening: false });

            match outcome {
                Ok(()) => {
                    info!("Speech input ended");
                    break ListenerState::Stopped;
                }
                Err(None) => {
                    debug!("Voice listener cancelled");
                    break ListenerState::Stopped;
                }
                Err(Some(e)) => {
                    if let Some(state) = self.backoff(e, &cancel).await {
                        break state;
                    }
                }
            }
        };

        self.set_state(final_state);
        info!("Voice listener finished in state {:?}", final_state);
        final_state
    }

    /// Consume utterances until the input ends or the recognizer fails
    async fn listen(&mut self) -> Result<(), Option<VoiceError>> {
        loop {
            match self.recognizer.next_utterance().await {
                Ok(Some(utterance)) => {
                    self.recovery.reset_retry_count(COMPONENT);
                    self.handle_utterance(&utterance);
                }
                Ok(None) => return Ok(()),
                Err(e) => return Err(Some(e)),
            }
        }
    }

    fn handle_utterance(&mut self, utterance: &Utterance) {
        debug!(
            "Heard {}: '{}'",
            if utterance.partial { "partial" } else { "final" },
            utterance.text
        );

        let already_fired = self.fired_on_partial;
        if !utterance.partial {
            self.fired_on_partial = false;
        }
        if already_fired {
            return;
        }

        if let Some(phrase) = self.matcher.find(&utterance.text) {
            info!("Voice trigger '{}' in '{}'", phrase, utterance.text);
            if utterance.partial {
                self.fired_on_partial = true;
            }
            self.publish(PosecamEvent::VoiceCommand {
                utterance: utterance.text.clone(),
            });
            (self.on_trigger)(&utterance.text);
        }
    }

    /// Wait out the backoff for `error`. Returns a terminal state if listening should end.
    async fn backoff(
        &mut self,
        error: VoiceError,
        cancel: &CancellationToken,
    ) -> Option<ListenerState> {
        warn!("Speech recognizer error: {}", error);
        // A restarted session starts a new utterance
        self.fired_on_partial = false;
        let error = PosecamError::Voice(error);

        match self.recovery.handle_error(COMPONENT, &error) {
            RecoveryAction::RetryAfterDelay(delay) => {
                let attempt = self.recovery.get_retry_count(COMPONENT);
                self.set_state(ListenerState::Backoff { attempt });
                tokio::select! {
                    _ = cancel.cancelled() => Some(ListenerState::Stopped),
                    _ = tokio::time::sleep(delay) => None,
                }
            }
            RecoveryAction::GiveUp => {
                let attempts = self.recovery.get_retry_count(COMPONENT);
                let reason = VoiceError::GaveUp { attempts }.to_string();
                self.publish(PosecamEvent::VoiceListenerStopped { reason });
                Some(ListenerState::GaveUp)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{ScriptStep, ScriptedRecognizer};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_recovery(max_retries: u32) -> RecoveryConfig {
        RecoveryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            exponential_backoff: true,
        }
    }

    fn listener(
        script: Vec<ScriptStep>,
        max_retries: u32,
        event_bus: EventBus,
    ) -> (VoiceListener, Arc<AtomicU32>, Arc<AtomicU32>) {
        let recognizer = ScriptedRecognizer::new(script);
        let starts = recognizer.start_counter();
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let listener = VoiceListener::new(
            Box::new(recognizer),
            PhraseMatcher::default(),
            fast_recovery(max_retries),
            event_bus,
            Box::new(move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (listener, fired, starts)
    }

    fn heard(text: &str) -> ScriptStep {
        ScriptStep::Heard(Utterance::final_text(text))
    }

    fn failure() -> ScriptStep {
        ScriptStep::Fail(VoiceError::Recognition {
            details: "no speech input".to_string(),
        })
    }

    #[tokio::test]
    async fn test_trigger_phrase_fires_once() {
        let event_bus = EventBus::new(16);
        let mut events = event_bus.subscribe();
        let (listener, fired, _) =
            listener(vec![heard("please analyze this now")], 3, event_bus);

        let state = listener.run(CancellationToken::new()).await;
        assert_eq!(state, ListenerState::Stopped);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let mut commands = 0;
        while let Ok(event) = events.try_recv() {
            if let PosecamEvent::VoiceCommand { utterance } = event {
                assert_eq!(utterance, "please analyze this now");
                commands += 1;
            }
        }
        assert_eq!(commands, 1);
    }

    #[tokio::test]
    async fn test_partial_and_final_of_same_utterance_fire_once() {
        let (listener, fired, _) = listener(
            vec![
                ScriptStep::Heard(Utterance::partial("please analyze")),
                heard("please analyze this now"),
                heard("hello there"),
                heard("scan"),
            ],
            3,
            EventBus::new(16),
        );

        listener.run(CancellationToken::new()).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_final_after_restart_fires_despite_earlier_partial() {
        let (listener, fired, starts) = listener(
            vec![
                ScriptStep::Heard(Utterance::partial("please analyze")),
                failure(),
                heard("scan my arm"),
            ],
            3,
            EventBus::new(16),
        );

        let state = listener.run(CancellationToken::new()).await;
        assert_eq!(state, ListenerState::Stopped);
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recognizer_errors_restart_then_give_up() {
        let event_bus = EventBus::new(32);
        let mut events = event_bus.subscribe();
        let script = (0..10).map(|_| failure()).collect();
        let (listener, fired, starts) = listener(script, 3, event_bus);
        let state = listener.state_handle();

        let result = listener.run(CancellationToken::new()).await;
        assert_eq!(result, ListenerState::GaveUp);
        assert_eq!(*state.lock(), ListenerState::GaveUp);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        // Initial start plus three restarts
        assert_eq!(starts.load(Ordering::SeqCst), 4);

        let mut stopped = None;
        while let Ok(event) = events.try_recv() {
            if let PosecamEvent::VoiceListenerStopped { reason } = event {
                stopped = Some(reason);
            }
        }
        assert!(stopped.unwrap().contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_successful_utterance_resets_attempts() {
        let script = vec![
            failure(),
            failure(),
            heard("scan"),
            failure(),
            failure(),
            heard("analyze"),
        ];
        let (listener, fired, _) = listener(script, 2, EventBus::new(32));

        let state = listener.run(CancellationToken::new()).await;
        assert_eq!(state, ListenerState::Stopped);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation_stops_listener() {
        struct Silent;

        #[async_trait::async_trait]
        impl SpeechRecognizer for Silent {
            async fn start(&mut self) -> Result<(), VoiceError> {
                Ok(())
            }
            async fn next_utterance(&mut self) -> Result<Option<Utterance>, VoiceError> {
                std::future::pending().await
            }
            async fn stop(&mut self) {}
        }

        let listener = VoiceListener::new(
            Box::new(Silent),
            PhraseMatcher::default(),
            fast_recovery(3),
            EventBus::new(4),
            Box::new(|_: &str| {}),
        );
        let state = listener.state_handle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*state.lock(), ListenerState::Listening);
        cancel.cancel();
        assert_eq!(task.await.unwrap(), ListenerState::Stopped);
    }
}
