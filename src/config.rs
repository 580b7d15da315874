//! Layered configuration: built-in defaults, overlaid by a TOML file,
//! overlaid by `LISTENER_*` environment variables (env wins — spec §6).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keyword: KeywordConfig,
    pub capture: CaptureConfig,
    pub vad: VadConfig,
    pub transcription: TranscriptionConfig,
    pub actions: ActionsConfig,
    pub handler: HandlerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Activation phrase. Normalized (lowercased, stripped of non-alphanumeric,
    /// non-whitespace characters) before substring matching (spec §3).
    pub keyword: String,
    pub keyword_queue_length_seconds: f32,
    pub instruction_queue_length_seconds: f32,
    pub queue_check_interval_seconds: f32,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            keyword: "hey listener".to_string(),
            keyword_queue_length_seconds: 1.2,
            instruction_queue_length_seconds: 3.0,
            queue_check_interval_seconds: 0.2,
        }
    }
}

/// Bit depth is not a configurable option: the core always captures signed
/// 16-bit PCM (spec §3, "the core treats a sample as the atomic unit; bit
/// depth is fixed").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            input_device: None,
            output_device: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    pub min_silence_threshold: i64,
    pub speech_bucket_count: usize,
    pub required_leading_silence_ratio: f64,
    pub required_speech_ratio: f64,
    pub required_trailing_silence_ratio: f64,
    pub ambiance_level_factor: f64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            min_silence_threshold: 600,
            speech_bucket_count: 60,
            required_leading_silence_ratio: 0.1,
            required_speech_ratio: 0.15,
            required_trailing_silence_ratio: 0.2,
            ambiance_level_factor: 1.5,
        }
    }
}

impl VadConfig {
    /// Programming-error check demanded by spec §4.3.1: ratios must each lie
    /// in `[0, 1]` and the leading+speech+trailing sum must not exceed 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratios = [
            ("required_leading_silence_ratio", self.required_leading_silence_ratio),
            ("required_speech_ratio", self.required_speech_ratio),
            ("required_trailing_silence_ratio", self.required_trailing_silence_ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    option: name,
                    reason: format!("must be within [0, 1], got {value}"),
                });
            }
        }
        let sum = self.required_leading_silence_ratio
            + self.required_speech_ratio
            + self.required_trailing_silence_ratio;
        if sum > 1.0 {
            return Err(ConfigError::InvalidValue {
                option: "required_leading_silence_ratio+required_speech_ratio+required_trailing_silence_ratio",
                reason: format!("sum must not exceed 1, got {sum}"),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub backend: String,
    pub model: String,
    pub language: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: "whisper-local".to_string(),
            model: "base.en".to_string(),
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub directory: PathBuf,
    pub action_refresh_interval_seconds: u64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        let directory = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hearken")
            .join("actions");
        Self {
            directory,
            action_refresh_interval_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Name of the built-in handler to resolve from the handler table
    /// (spec §9 design notes — no dynamic class injection).
    pub handler_module: String,
    /// Opaque config handed to the resolved handler's constructor.
    pub handler_config: serde_json::Value,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            handler_module: "noop".to_string(),
            handler_config: serde_json::Value::Object(Default::default()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keyword: KeywordConfig::default(),
            capture: CaptureConfig::default(),
            vad: VadConfig::default(),
            transcription: TranscriptionConfig::default(),
            actions: ActionsConfig::default(),
            handler: HandlerConfig::default(),
        }
    }
}

impl Config {
    /// Resolve configuration: defaults, overlaid by an optional file,
    /// overlaid by `LISTENER_*` environment variables.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = explicit_path.map(PathBuf::from).or_else(Self::discover_path) {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
            } else if explicit_path.is_some() {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "config file not found",
                    ),
                });
            }
        }

        apply_env_overrides(&mut config);

        if config.keyword.keyword.trim().is_empty() {
            return Err(ConfigError::MissingOption("keyword"));
        }
        config.vad.validate()?;

        Ok(config)
    }

    fn discover_path() -> Option<PathBuf> {
        let path = dirs::config_dir()?.join("hearken").join("config.toml");
        Some(path)
    }
}

/// Overlay `LISTENER_*` environment variables onto an already-loaded config.
/// Env wins over the file per spec §6 (the reverse of the Python original;
/// see DESIGN.md Open Question #3).
fn apply_env_overrides(config: &mut Config) {
    macro_rules! overlay_str {
        ($env:expr, $field:expr) => {
            if let Ok(value) = std::env::var($env) {
                $field = value;
            }
        };
    }
    macro_rules! overlay_parsed {
        ($env:expr, $field:expr) => {
            if let Ok(value) = std::env::var($env) {
                if let Ok(parsed) = value.parse() {
                    $field = parsed;
                } else {
                    tracing::warn!("Ignoring unparseable {}={}", $env, value);
                }
            }
        };
    }

    overlay_str!("LISTENER_KEYWORD", config.keyword.keyword);
    overlay_parsed!(
        "LISTENER_KEYWORD_QUEUE_LENGTH_SECONDS",
        config.keyword.keyword_queue_length_seconds
    );
    overlay_parsed!(
        "LISTENER_INSTRUCTION_QUEUE_LENGTH_SECONDS",
        config.keyword.instruction_queue_length_seconds
    );
    overlay_parsed!(
        "LISTENER_QUEUE_CHECK_INTERVAL_SECONDS",
        config.keyword.queue_check_interval_seconds
    );
    overlay_parsed!("LISTENER_SAMPLE_RATE", config.capture.sample_rate);
    if let Ok(value) = std::env::var("LISTENER_INPUT_DEVICE") {
        config.capture.input_device = Some(value);
    }
    if let Ok(value) = std::env::var("LISTENER_OUTPUT_DEVICE") {
        config.capture.output_device = Some(value);
    }
    overlay_parsed!(
        "LISTENER_MIN_SILENCE_THRESHOLD",
        config.vad.min_silence_threshold
    );
    overlay_parsed!("LISTENER_SPEECH_BUCKET_COUNT", config.vad.speech_bucket_count);
    overlay_parsed!(
        "LISTENER_REQUIRED_LEADING_SILENCE_RATIO",
        config.vad.required_leading_silence_ratio
    );
    overlay_parsed!(
        "LISTENER_REQUIRED_SPEECH_RATIO",
        config.vad.required_speech_ratio
    );
    overlay_parsed!(
        "LISTENER_REQUIRED_TRAILING_SILENCE_RATIO",
        config.vad.required_trailing_silence_ratio
    );
    overlay_parsed!(
        "LISTENER_AMBIANCE_LEVEL_FACTOR",
        config.vad.ambiance_level_factor
    );
    overlay_str!("LISTENER_LANGUAGE", config.transcription.language);
    overlay_str!("LISTENER_MODEL", config.transcription.model);
    overlay_str!("LISTENER_TRANSCRIPTION_BACKEND", config.transcription.backend);
    overlay_parsed!(
        "LISTENER_ACTION_REFRESH_INTERVAL",
        config.actions.action_refresh_interval_seconds
    );
    if let Ok(value) = std::env::var("LISTENER_ACTIONS_DIRECTORY") {
        config.actions.directory = PathBuf::from(value);
    }
    overlay_str!("LISTENER_HANDLER_MODULE", config.handler.handler_module);
}

/// A copy of `Config` safe to print: secrets redacted.
pub fn redacted_display(config: &Config) -> String {
    let mut copy = config.clone();
    if copy.handler.handler_config != serde_json::Value::Null
        && copy.handler.handler_config != serde_json::Value::Object(Default::default())
    {
        copy.handler.handler_config = serde_json::Value::String("<redacted>".to_string());
    }
    toml::to_string_pretty(&copy).unwrap_or_else(|e| format!("<unprintable config: {e}>"))
}
