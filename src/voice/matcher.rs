use crate::config::default_trigger_phrases;

/// Case-insensitive substring matcher over a set of trigger phrases
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    phrases: Vec<String>,
}

impl PhraseMatcher {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// First configured phrase contained in `utterance`
    pub fn find(&self, utterance: &str) -> Option<&str> {
        let heard = utterance.to_lowercase();
        self.phrases
            .iter()
            .find(|phrase| heard.contains(phrase.as_str()))
            .map(String::as_str)
    }

    pub fn is_match(&self, utterance: &str) -> bool {
        self.find(utterance).is_some()
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl Default for PhraseMatcher {
    fn default() -> Self {
        Self::new(default_trigger_phrases())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phrases_match_inside_sentences() {
        let matcher = PhraseMatcher::default();
        assert_eq!(matcher.find("please ANALYZE this now"), Some("analyze"));
        assert_eq!(matcher.find("Process Image"), Some("process image"));
        assert!(matcher.is_match("can you check injury on my arm"));
        assert!(matcher.is_match("scan"));
        assert!(!matcher.is_match("hello there"));
        assert!(!matcher.is_match(""));
    }

    #[test]
    fn test_custom_phrases_are_normalised() {
        let matcher = PhraseMatcher::new(["  Look Here ", ""]);
        assert_eq!(matcher.phrases(), &["look here".to_string()]);
        assert!(matcher.is_match("ok look here please"));
        assert!(!matcher.is_match("analyze"));
    }
}
