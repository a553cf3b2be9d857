use crate::error::VoiceError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::debug;

/// One recognised piece of speech
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    /// True while the speaker is still talking and the text may change
    pub partial: bool,
}

impl Utterance {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            partial: false,
        }
    }

    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            partial: true,
        }
    }
}

/// Speech-to-text engine boundary
#[async_trait]
pub trait SpeechRecognizer: Send {
    async fn start(&mut self) -> Result<(), VoiceError>;

    /// Next recognised utterance. `Ok(None)` means the input ended.
    async fn next_utterance(&mut self) -> Result<Option<Utterance>, VoiceError>;

    async fn stop(&mut self);
}

/// Treats every non-empty line of a reader as a final utterance
pub struct LineRecognizer<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> LineRecognizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SpeechRecognizer for LineRecognizer<R> {
    async fn start(&mut self) -> Result<(), VoiceError> {
        debug!("Line recognizer ready");
        Ok(())
    }

    async fn next_utterance(&mut self) -> Result<Option<Utterance>, VoiceError> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Ok(Some(Utterance::final_text(line.trim()))),
                Ok(None) => return Ok(None),
                Err(e) => {
                    return Err(VoiceError::Recognition {
                        details: e.to_string(),
                    })
                }
            }
        }
    }

    async fn stop(&mut self) {}
}

/// One step of a scripted recognition session
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Heard(Utterance),
    Fail(VoiceError),
}

/// Replays a fixed script of utterances and errors
pub struct ScriptedRecognizer {
    script: VecDeque<ScriptStep>,
    starts: Arc<AtomicU32>,
}

impl ScriptedRecognizer {
    pub fn new(script: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            script: script.into_iter().collect(),
            starts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Shared counter of `start` calls
    pub fn start_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.starts)
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn start(&mut self) -> Result<(), VoiceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_utterance(&mut self) -> Result<Option<Utterance>, VoiceError> {
        match self.script.pop_front() {
            Some(ScriptStep::Heard(utterance)) => Ok(Some(utterance)),
            Some(ScriptStep::Fail(error)) => Err(error),
            None => Ok(None),
        }
    }

    async fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_recognizer_skips_blank_lines() {
        let input: &[u8] = b"hello\n\n  scan now  \n";
        let mut recognizer = LineRecognizer::new(input);
        recognizer.start().await.unwrap();

        assert_eq!(
            recognizer.next_utterance().await.unwrap(),
            Some(Utterance::final_text("hello"))
        );
        assert_eq!(
            recognizer.next_utterance().await.unwrap(),
            Some(Utterance::final_text("scan now"))
        );
        assert_eq!(recognizer.next_utterance().await.unwrap(), None);
    }
}
