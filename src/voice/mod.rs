mod listener;
mod matcher;
mod recognizer;

pub use listener::{ListenerState, TriggerCallback, VoiceListener};
pub use matcher::PhraseMatcher;
pub use recognizer::{LineRecognizer, ScriptStep, ScriptedRecognizer, SpeechRecognizer, Utterance};
