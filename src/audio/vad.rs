//! Energy-based voice activity detection: pure functions over a buffer
//! snapshot. No neural model, no streaming state — this is a bucket-mean
//! scan against a silence threshold (spec §4.3).

/// Parameters shared by both VAD predicates.
#[derive(Debug, Clone, Copy)]
pub struct VadParams {
    pub bucket_count: usize,
    pub required_leading_silence_ratio: f64,
    pub required_speech_ratio: f64,
    pub required_trailing_silence_ratio: f64,
}

impl VadParams {
    /// Programming-error check (spec §4.3.1): each ratio in `[0, 1]`, and
    /// leading + speech + trailing must not exceed 1.
    fn assert_valid(&self) {
        let ratios = [
            self.required_leading_silence_ratio,
            self.required_speech_ratio,
            self.required_trailing_silence_ratio,
        ];
        for r in ratios {
            assert!((0.0..=1.0).contains(&r), "VAD ratio out of range: {r}");
        }
        let sum = self.required_leading_silence_ratio
            + self.required_speech_ratio
            + self.required_trailing_silence_ratio;
        assert!(sum <= 1.0, "VAD ratios sum to more than 1: {sum}");
    }
}

/// Per-bucket mean absolute amplitude over equal-length contiguous slices.
/// Trailing samples that don't fill a full bucket are ignored.
fn bucket_means(snapshot: &[i16], bucket_count: usize) -> Vec<i64> {
    if bucket_count == 0 {
        return Vec::new();
    }
    let bucket_len = snapshot.len() / bucket_count;
    if bucket_len == 0 {
        return Vec::new();
    }
    (0..bucket_count)
        .map(|i| {
            let start = i * bucket_len;
            let bucket = &snapshot[start..start + bucket_len];
            let sum: i64 = bucket.iter().map(|&s| (s as i64).abs()).sum();
            sum / bucket_len as i64
        })
        .collect()
}

fn mean_abs(snapshot: &[i16]) -> i64 {
    if snapshot.is_empty() {
        return 0;
    }
    let sum: i64 = snapshot.iter().map(|&s| (s as i64).abs()).sum();
    sum / snapshot.len() as i64
}

struct ScanResult {
    speech_bucket_count: usize,
    last_silent_bucket: Option<usize>,
    triggered_early_reject: bool,
    satisfied_at: Option<usize>,
}

/// Shared bucket scan used by both predicates. `req_trailing` is passed in
/// because the keyword and instruction predicates derive it differently
/// (spec §4.3.1 uses the leading ratio; §4.3.2 uses the trailing ratio).
/// `req_leading` is `None` for the instruction predicate, which has no
/// leading-silence precondition (spec §4.3.2): it only gates on the speech
/// and trailing-silence thresholds.
fn scan(
    means: &[i64],
    threshold: i64,
    req_leading: Option<usize>,
    req_speech: usize,
    req_trailing: usize,
) -> ScanResult {
    let mut last_speech_bucket: Option<usize> = None;
    let mut speech_bucket_count = 0usize;
    let mut last_silent_bucket: Option<usize> = None;

    for (i, &mean) in means.iter().enumerate() {
        if mean >= threshold {
            last_speech_bucket = Some(i);
            speech_bucket_count += 1;
        } else {
            last_silent_bucket = Some(i);
        }

        if let Some(last_speech) = last_speech_bucket {
            if let Some(req_leading) = req_leading {
                if last_speech < req_leading {
                    return ScanResult {
                        speech_bucket_count,
                        last_silent_bucket,
                        triggered_early_reject: true,
                        satisfied_at: None,
                    };
                }
            }
            if speech_bucket_count >= req_speech {
                if let Some(last_silent) = last_silent_bucket {
                    if last_silent > last_speech && last_silent - last_speech >= req_trailing {
                        return ScanResult {
                            speech_bucket_count,
                            last_silent_bucket,
                            triggered_early_reject: false,
                            satisfied_at: Some(i),
                        };
                    }
                }
            }
        }
    }

    ScanResult {
        speech_bucket_count,
        last_silent_bucket,
        triggered_early_reject: false,
        satisfied_at: None,
    }
}

/// `(relevant, mean_abs_of_whole_snapshot)`. Requires
/// `len(snapshot) >= capacity / 3`; otherwise returns `(false, 0)` without
/// scanning.
pub fn is_keyword_buffer_relevant(
    snapshot: &[i16],
    capacity: usize,
    threshold: i64,
    params: &VadParams,
) -> (bool, i64) {
    params.assert_valid();
    if snapshot.len() < capacity / 3 {
        return (false, 0);
    }

    let whole_mean = mean_abs(snapshot);
    let means = bucket_means(snapshot, params.bucket_count);
    if means.is_empty() {
        return (false, whole_mean);
    }

    let req_leading = (params.bucket_count as f64 * params.required_leading_silence_ratio).round() as usize;
    let req_speech = (params.bucket_count as f64 * params.required_speech_ratio).round() as usize;
    // Intentionally the leading ratio, not the trailing ratio — preserved
    // asymmetry from the reference behavior (see DESIGN.md).
    let req_trailing = (params.bucket_count as f64 * params.required_leading_silence_ratio).round() as usize;

    let result = scan(&means, threshold, Some(req_leading), req_speech, req_trailing);
    if result.triggered_early_reject {
        return (false, whole_mean);
    }
    (result.satisfied_at.is_some(), whole_mean)
}

/// `true` once enough speech followed by enough trailing silence is
/// observed within the snapshot; `false` otherwise. Unlike the keyword
/// predicate, this has no leading-silence precondition — the instruction
/// buffer is cleared right as this stage begins, so speech commonly starts
/// in bucket 0 (spec §4.3.2).
pub fn is_instruction_buffer_done(
    snapshot: &[i16],
    capacity: usize,
    threshold: i64,
    params: &VadParams,
) -> bool {
    params.assert_valid();
    if snapshot.len() < capacity / 3 {
        return false;
    }

    let means = bucket_means(snapshot, params.bucket_count);
    if means.is_empty() {
        return false;
    }

    let req_speech = (params.bucket_count as f64 * params.required_speech_ratio).round() as usize;
    let req_trailing = (params.bucket_count as f64 * params.required_trailing_silence_ratio).round() as usize;

    let result = scan(&means, threshold, None, req_speech, req_trailing);
    result.satisfied_at.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_all_silence_keyword_buffer() {
        let capacity = 38_400; // 1.2s * 16000 * 2
        let snapshot = vec![0i16; capacity];
        let (relevant, mean) = is_keyword_buffer_relevant(&snapshot, capacity, 600, &PARAMS);
        assert!(!relevant);
        assert_eq!(mean, 0);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let capacity = 38_400;
        let snapshot = vec![5000i16; 10_000];
        let (relevant, _) = is_keyword_buffer_relevant(&snapshot, capacity, 600, &PARAMS);
        assert!(!relevant, "10000 < 38400/3 must short-circuit to not relevant");
    }

    #[test]
    fn test_leading_speech_rejected() {
        let capacity = 38_400;
        let bucket_len = capacity / 60;
        let snapshot = amplitude_run(&[(60, 3000)], bucket_len);
        let (relevant, mean) = is_keyword_buffer_relevant(&snapshot, capacity, 600, &PARAMS);
        assert!(!relevant);
        assert_eq!(mean, 3000);
    }

    #[test]
    fn test_positive_keyword_detection() {
        let capacity = 38_400;
        let bucket_len = capacity / 60;
        let snapshot = amplitude_run(
            &[(10, 100), (20, 3000), (30, 100)],
            bucket_len,
        );
        let (relevant, _) = is_keyword_buffer_relevant(&snapshot, capacity, 600, &PARAMS);
        assert!(relevant);
    }

    #[test]
    fn test_instruction_completion() {
        let instr_params = VadParams {
            bucket_count: 60,
            required_leading_silence_ratio: 0.1,
            required_speech_ratio: 0.15,
            required_trailing_silence_ratio: 0.2,
        };
        let capacity = 96_000; // 3.0s * 16000 * 2
        let bucket_len = capacity / 60;
        let snapshot = amplitude_run(&[(20, 2000), (20, 100)], bucket_len);
        // pad to full capacity with silence so len == capacity
        let mut snapshot = snapshot;
        snapshot.resize(capacity, 100);
        let done = is_instruction_buffer_done(&snapshot, capacity, 600, &instr_params);
        assert!(done);
    }

    #[test]
    fn test_instruction_not_done_without_speech() {
        let instr_params = PARAMS;
        let capacity = 96_000;
        let snapshot = vec![0i16; capacity];
        assert!(!is_instruction_buffer_done(&snapshot, capacity, 600, &instr_params));
    }

    #[test]
    #[should_panic]
    fn test_invalid_ratio_sum_panics() {
        let bad = VadParams {
            bucket_count: 60,
            required_leading_silence_ratio: 0.5,
            required_speech_ratio: 0.4,
            required_trailing_silence_ratio: 0.3,
        };
        let snapshot = vec![0i16; 100];
        is_keyword_buffer_relevant(&snapshot, 100, 600, &bad);
    }
}
