use hearken::actions::registry::ActionRegistry;
use hearken::audio::ring_buffer::RingBuffer;
use hearken::audio::threshold::AdaptiveThreshold;
use hearken::audio::vad::{is_instruction_buffer_done, is_keyword_buffer_relevant, VadParams};
use hearken::dispatch::{Dispatcher, NoopHandler};
use hearken::sound::SoundSink;

const PARAMS: VadParams = VadParams {
    bucket_count: 60,
    required_leading_silence_ratio: 0.1,
    required_speech_ratio: 0.15,
    required_trailing_silence_ratio: 0.2,
};

fn amplitude_run(runs: &[(usize, i16)], bucket_len: usize) -> Vec<i16> {
    let mut out = Vec::new();
    for &(bucket_count, amp) in runs {
        for _ in 0..(bucket_count * bucket_len) {
            out.push(amp);
        }
    }
    out
}

/// Scenario 1 (spec §8): all-silence keyword buffer filled to capacity.
#[test]
fn all_silence_keyword_buffer_is_not_relevant() {
    let buffer = RingBuffer::with_duration(16_000, 2, 1.2);
    let zeros = vec![0i16; buffer.capacity()];
    buffer.extend(&zeros);

    let mut threshold = AdaptiveThreshold::new(600, 1.5);
    let snapshot = buffer.snapshot();
    let (relevant, mean) =
        is_keyword_buffer_relevant(&snapshot, buffer.capacity(), threshold.current(), &PARAMS);
    threshold.record(mean);

    assert!(!relevant);
    assert_eq!(mean, 0);
    assert_eq!(threshold.current(), 600);
}

/// Scenario 2 (spec §8): short buffer, `10000 < 38400/3`.
#[test]
fn short_buffer_is_rejected_before_scanning() {
    let buffer = RingBuffer::with_duration(16_000, 2, 1.2);
    assert_eq!(buffer.capacity(), 38_400);
    buffer.extend(&vec![5000i16; 10_000]);

    let snapshot = buffer.snapshot();
    let (relevant, _) = is_keyword_buffer_relevant(&snapshot, buffer.capacity(), 600, &PARAMS);
    assert!(!relevant);
}

/// Scenario 3 (spec §8): leading-speech rejection.
#[test]
fn leading_speech_rejects_keyword_buffer() {
    let buffer = RingBuffer::with_duration(16_000, 2, 1.2);
    let bucket_len = buffer.capacity() / 60;
    let snapshot = amplitude_run(&[(60, 3000)], bucket_len);

    let (relevant, mean) = is_keyword_buffer_relevant(&snapshot, buffer.capacity(), 600, &PARAMS);
    assert!(!relevant);
    assert_eq!(mean, 3000);
}

/// Scenario 4 (spec §8): leading silence, speech, trailing silence.
#[test]
fn positive_keyword_detection() {
    let buffer = RingBuffer::with_duration(16_000, 2, 1.2);
    let bucket_len = buffer.capacity() / 60;
    let snapshot = amplitude_run(&[(10, 100), (20, 3000), (30, 100)], bucket_len);

    let (relevant, _) = is_keyword_buffer_relevant(&snapshot, buffer.capacity(), 600, &PARAMS);
    assert!(relevant);
}

/// Scenario 5 (spec §8): instruction buffer completion with
/// `required_trailing_silence_ratio = 0.2` (req_trailing = 12).
#[test]
fn instruction_buffer_completes_after_trailing_silence() {
    let buffer = RingBuffer::with_duration(16_000, 2, 3.0);
    let bucket_len = buffer.capacity() / 60;
    let mut snapshot = amplitude_run(&[(20, 2000), (20, 100)], bucket_len);
    snapshot.resize(buffer.capacity(), 100);

    let done = is_instruction_buffer_done(&snapshot, buffer.capacity(), 600, &PARAMS);
    assert!(done);
}

/// Scenario 6 (spec §8): dispatch round-trip, match and no-match.
#[test]
fn dispatch_round_trip_matches_and_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let action = serde_json::json!({ "keys": ["turn off the lights"], "command": "X" });
    std::fs::write(dir.path().join("lights.json"), action.to_string()).unwrap();

    let registry = std::sync::Arc::new(ActionRegistry::new(dir.path()));
    registry.load_once();

    let found = registry.find("please turn off the lights now");
    assert!(found.is_some());
    assert!(registry.find("make coffee").is_none());

    let dispatcher = Dispatcher::new(registry, Box::new(NoopHandler), std::sync::Arc::new(SoundSink::silent()));
    dispatcher.act("please turn off the lights now");
    dispatcher.act("make coffee");
}

/// Invariant (spec §8): `len(snapshot(b)) <= capacity(b)` under overflow.
#[test]
fn ring_buffer_snapshot_never_exceeds_capacity() {
    let buffer = RingBuffer::with_duration(16_000, 2, 1.0);
    buffer.extend(&vec![1i16; 500_000]);
    assert!(buffer.snapshot().len() <= buffer.capacity());
}

/// Invariant (spec §8): after `clear()`, `len == 0` and snapshot is empty.
#[test]
fn ring_buffer_clear_resets_state() {
    let buffer = RingBuffer::with_duration(16_000, 2, 1.0);
    buffer.extend(&[1, 2, 3]);
    buffer.clear();
    assert_eq!(buffer.len(), 0);
    assert!(buffer.snapshot().is_empty());
}

/// Invariant (spec §8): adaptive threshold with empty history is exactly
/// `min_silence_threshold`.
#[test]
fn adaptive_threshold_empty_history_is_floor() {
    let threshold = AdaptiveThreshold::new(600, 1.5);
    assert_eq!(threshold.current(), 600);
}
