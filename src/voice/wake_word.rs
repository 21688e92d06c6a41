//! Wake word matching
//!
//! Classifies recognized utterances: does the text contain a configured wake
//! phrase, or one of the identity questions answered locally.

/// Matches utterances against wake phrases and identity questions
#[derive(Debug, Clone)]
pub struct WakeWordMatcher {
    wake_words: Vec<String>,
    identity_prompts: Vec<String>,
}

impl WakeWordMatcher {
    /// Create a new matcher
    ///
    /// # Arguments
    ///
    /// * `wake_words` - Trigger phrases (e.g., "ok sakura")
    /// * `identity_prompts` - Phrases answered with the canned identity reply
    #[must_use]
    pub fn new(wake_words: Vec<String>, identity_prompts: Vec<String>) -> Self {
        let wake_words = normalize(wake_words);
        let identity_prompts = normalize(identity_prompts);

        tracing::debug!(
            wake_words = ?wake_words,
            identity_prompts = identity_prompts.len(),
            "wake word matcher initialized"
        );

        Self {
            wake_words,
            identity_prompts,
        }
    }

    /// Check if text contains any wake phrase, ignoring case
    #[must_use]
    pub fn contains_wake_word(&self, text: &str) -> bool {
        let normalized = text.to_lowercase();
        self.wake_words.iter().any(|w| normalized.contains(w.as_str()))
    }

    /// Check if text asks one of the identity questions, ignoring case
    #[must_use]
    pub fn is_identity_question(&self, text: &str) -> bool {
        let normalized = text.to_lowercase();
        self.identity_prompts
            .iter()
            .any(|p| normalized.contains(p.as_str()))
    }

    /// Remove every occurrence of every wake phrase and trim the result
    ///
    /// Text without a wake phrase comes back trimmed but otherwise unchanged.
    /// Removal repeats until no phrase is left, so a phrase spliced together
    /// by an earlier removal is stripped as well.
    #[must_use]
    pub fn strip_wake_word(&self, text: &str) -> String {
        let mut stripped = text.to_string();
        loop {
            let next = self
                .wake_words
                .iter()
                .fold(stripped.clone(), |acc, w| remove_ignore_case(&acc, w));
            if next == stripped {
                break;
            }
            stripped = next;
        }
        stripped.trim().to_string()
    }

    /// Get the configured wake phrases
    #[must_use]
    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }

    /// Get the configured identity phrases
    #[must_use]
    pub fn identity_prompts(&self) -> &[String] {
        &self.identity_prompts
    }
}

fn normalize(phrases: Vec<String>) -> Vec<String> {
    phrases
        .into_iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Remove all case-insensitive occurrences of a lowercase `needle`
///
/// Matching runs char by char so byte offsets stay valid even when
/// lowercasing changes a character's length.
fn remove_ignore_case(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }

    let needle: Vec<char> = needle.chars().collect();
    let chars: Vec<char> = haystack.chars().collect();
    let mut out = String::with_capacity(haystack.len());
    let mut i = 0;

    while i < chars.len() {
        let matches = chars.len() - i >= needle.len()
            && chars[i..i + needle.len()]
                .iter()
                .zip(&needle)
                .all(|(c, n)| c.to_lowercase().eq(n.to_lowercase()));

        if matches {
            i += needle.len();
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> WakeWordMatcher {
        WakeWordMatcher::new(
            vec!["ok sakura".to_string(), "okay sakura".to_string()],
            vec!["who are you".to_string(), "who made you".to_string()],
        )
    }

    #[test]
    fn test_wake_word_detection() {
        let m = matcher();

        assert!(!m.contains_wake_word("hello world"));
        assert!(m.contains_wake_word("OK Sakura, what's up?"));
        assert!(m.contains_wake_word("well okay sakura"));
    }

    #[test]
    fn test_strip_removes_every_occurrence() {
        let m = matcher();

        assert_eq!(
            m.strip_wake_word("ok sakura what time is it"),
            "what time is it"
        );
        assert_eq!(m.strip_wake_word("OK SAKURA tell me OK sakura"), "tell me");
        assert_eq!(m.strip_wake_word("  plain text  "), "plain text");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let m = matcher();

        for input in ["ok sakok sakuraura hi", "ok sakura ok sakura", "okay sakura  what"] {
            let once = m.strip_wake_word(input);
            assert_eq!(m.strip_wake_word(&once), once, "input: {input}");
            assert!(!m.contains_wake_word(&once));
        }
    }

    #[test]
    fn test_empty_input() {
        let m = matcher();

        assert!(!m.contains_wake_word(""));
        assert!(!m.contains_wake_word("   "));
        assert_eq!(m.strip_wake_word("   "), "");
    }

    #[test]
    fn test_identity_question() {
        let m = matcher();

        assert!(m.is_identity_question("Who made you?"));
        assert!(!m.is_identity_question("who is she"));
    }

    #[test]
    fn test_remove_ignore_case_handles_multibyte() {
        assert_eq!(remove_ignore_case("Zażółć OK sakura", "ok sakura"), "Zażółć ");
        assert_eq!(remove_ignore_case("İx", "x"), "İ");
    }
}
