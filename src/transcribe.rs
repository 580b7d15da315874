//! Pluggable transcription engine: maps a PCM sample snapshot to a lowercase
//! string (spec §1 "out of scope", specified only by the interface the core
//! consumes). Grounded on the teacher's `transcribe/backend.rs` trait shape
//! and `transcribe/whisper_local.rs`'s `whisper-rs` usage, adapted to take
//! an in-memory snapshot rather than a file path since the core never
//! writes stage buffers to disk.

use crate::error::TranscriptionError;

/// Hot-word boosting hint (spec.md doesn't carry this; supplemented from
/// `original_source/src/speech.py`'s `HOT_WORDS_AND_BOOST`). Engines that
/// ignore it are unaffected.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionRequest<'a> {
    pub samples: &'a [i16],
    pub sample_rate: u32,
    pub language: &'a str,
    pub hot_words: Vec<(String, i32)>,
}

pub trait Transcriber: Send + Sync {
    fn transcribe(&self, request: &TranscriptionRequest<'_>) -> Result<String, TranscriptionError>;
}

pub struct WhisperTranscriber {
    ctx: whisper_rs::WhisperContext,
}

impl WhisperTranscriber {
    pub fn new(model_path: &str) -> Result<Self, TranscriptionError> {
        let ctx = whisper_rs::WhisperContext::new_with_params(
            model_path,
            whisper_rs::WhisperContextParameters::default(),
        )
        .map_err(|e| TranscriptionError::InitFailed(format!("{e:?}")))?;
        Ok(Self { ctx })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, request: &TranscriptionRequest<'_>) -> Result<String, TranscriptionError> {
        let samples_f32: Vec<f32> = request
            .samples
            .iter()
            .map(|&s| s as f32 / 32768.0)
            .collect();

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscriptionError::InferenceFailed(format!("{e:?}")))?;

        let mut params =
            whisper_rs::FullParams::new(whisper_rs::SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(4);
        params.set_language(Some(request.language));
        let hot_words: Vec<&str> = request.hot_words.iter().map(|(w, _)| w.as_str()).collect();
        if !hot_words.is_empty() {
            params.set_initial_prompt(&hot_words.join(" "));
        }

        state
            .full(params, &samples_f32)
            .map_err(|e| TranscriptionError::InferenceFailed(format!("{e:?}")))?;

        let mut text = String::new();
        let n_segments = state.full_n_segments();
        for i in 0..n_segments {
            if let Some(segment) = state.get_segment(i) {
                if let Ok(segment_text) = segment.to_str_lossy() {
                    text.push_str(&segment_text);
                }
            }
        }
        Ok(text.trim().to_lowercase())
    }
}

/// Lowercases and strips any character that is not alphanumeric or
/// whitespace (spec §4.4 step 1/3's normalization rule).
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_strips_punctuation() {
        assert_eq!(normalize("Hey, Listener!!"), "hey listener");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("Hey, Listener!!");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_keeps_whitespace_and_digits() {
        assert_eq!(normalize("turn on light 2"), "turn on light 2");
    }
}
