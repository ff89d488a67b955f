//! Reads `~/.mirador/config.toml` and turns it into runtime settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mirador_hal::{CommandScreen, PipelineConfig};
use mirador_runtime::{AgentLoopConfig, ReasoningProvider};

/// Persisted user configuration stored in `~/.mirador/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ollama server hosting the intent classifier.
    pub classifier_url: String,
    pub classifier_model: String,
    pub classifier_timeout_secs: u64,

    pub reasoning_provider: ReasoningProvider,
    pub reasoning_url: String,
    pub reasoning_model: String,
    /// Only sent to OpenAI-compatible servers.  Stored as plain text; the
    /// file is written owner-only.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reasoning_api_key: String,
    pub reasoning_timeout_secs: u64,

    /// Remembered turns, user and agent counted separately.
    pub memory_capacity: usize,

    pub images_dir: PathBuf,
    pub image_width: u32,
    pub image_height: u32,
    pub jpeg_quality: u8,
    pub camera_device: PathBuf,
    /// Deadline for one external camera or screenshot command.
    pub capture_timeout_secs: u64,
    /// Screenshot command overriding the built-in screen source, e.g.
    /// `["grim", "{path}"]`.  `{path}` is replaced with a temporary PNG path.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub screen_command: Vec<String>,
    /// How long the terminal preview notice lingers; 0 disables it.
    pub preview_ms: u64,

    /// NDJSON token-usage log.  Absent means disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_log_path: Option<PathBuf>,

    /// Use synthetic camera/screen sources instead of real devices.
    pub simulate_devices: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("classifier_url", &self.classifier_url)
            .field("classifier_model", &self.classifier_model)
            .field("classifier_timeout_secs", &self.classifier_timeout_secs)
            .field("reasoning_provider", &self.reasoning_provider)
            .field("reasoning_url", &self.reasoning_url)
            .field("reasoning_model", &self.reasoning_model)
            .field(
                "reasoning_api_key",
                if self.reasoning_api_key.is_empty() {
                    &"<not set>"
                } else {
                    &"<redacted>"
                },
            )
            .field("reasoning_timeout_secs", &self.reasoning_timeout_secs)
            .field("memory_capacity", &self.memory_capacity)
            .field("images_dir", &self.images_dir)
            .field("image_width", &self.image_width)
            .field("image_height", &self.image_height)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("camera_device", &self.camera_device)
            .field("capture_timeout_secs", &self.capture_timeout_secs)
            .field("screen_command", &self.screen_command)
            .field("preview_ms", &self.preview_ms)
            .field("token_log_path", &self.token_log_path)
            .field("simulate_devices", &self.simulate_devices)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier_url: "http://localhost:11434".to_string(),
            classifier_model: "qwen3:0.6b".to_string(),
            classifier_timeout_secs: 10,
            reasoning_provider: ReasoningProvider::Ollama,
            reasoning_url: "http://localhost:11434".to_string(),
            reasoning_model: "gemma3:4b".to_string(),
            reasoning_api_key: String::new(),
            reasoning_timeout_secs: 120,
            memory_capacity: 6,
            images_dir: PathBuf::from("images"),
            image_width: 640,
            image_height: 360,
            jpeg_quality: 75,
            camera_device: PathBuf::from("/dev/video0"),
            capture_timeout_secs: 10,
            screen_command: Vec::new(),
            preview_ms: 800,
            token_log_path: None,
            simulate_devices: false,
        }
    }
}

impl Config {
    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.memory_capacity == 0 || self.memory_capacity % 2 != 0 {
            return Err(format!(
                "memory_capacity must be a positive even number of turns, got {}",
                self.memory_capacity
            ));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(format!(
                "image dimensions must be non-zero, got {}x{}",
                self.image_width, self.image_height
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            ));
        }
        if self.classifier_timeout_secs == 0 || self.reasoning_timeout_secs == 0 {
            return Err("model timeouts must be at least one second".to_string());
        }
        if self.capture_timeout_secs == 0 {
            return Err("capture_timeout_secs must be at least one second".to_string());
        }
        if self.screen_command.first().is_some_and(|p| p.trim().is_empty()) {
            return Err("screen_command must start with a program name".to_string());
        }
        Ok(())
    }

    pub fn agent_config(&self) -> AgentLoopConfig {
        AgentLoopConfig {
            classifier_url: self.classifier_url.clone(),
            classifier_model: self.classifier_model.clone(),
            classifier_timeout: Duration::from_secs(self.classifier_timeout_secs),
            reasoning_provider: self.reasoning_provider,
            reasoning_url: self.reasoning_url.clone(),
            reasoning_model: self.reasoning_model.clone(),
            reasoning_api_key: (!self.reasoning_api_key.is_empty())
                .then(|| self.reasoning_api_key.clone()),
            reasoning_timeout: Duration::from_secs(self.reasoning_timeout_secs),
            memory_capacity: self.memory_capacity,
            usage_log_path: self.token_log_path.clone(),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            images_dir: self.images_dir.clone(),
            target_width: self.image_width,
            target_height: self.image_height,
            jpeg_quality: self.jpeg_quality,
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    /// The configured screenshot command, if one overrides the default source.
    pub fn screen_override(&self) -> Option<CommandScreen> {
        let (program, args) = self.screen_command.split_first()?;
        let screen = CommandScreen::new(program.clone(), args.to_vec());
        Some(screen.with_timeout(self.capture_timeout()))
    }
}

/// Return the path to `~/.mirador/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mirador").join("config.toml")
}

/// Load the effective configuration: file (or defaults) plus `MIRADOR_*`
/// overrides, validated.
pub fn load() -> Result<Config, String> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Load the file at `path`.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `MIRADOR_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MIRADOR_CLASSIFIER_URL` | `classifier_url` |
/// | `MIRADOR_CLASSIFIER_MODEL` | `classifier_model` |
/// | `MIRADOR_REASONING_URL` | `reasoning_url` |
/// | `MIRADOR_REASONING_MODEL` | `reasoning_model` |
/// | `MIRADOR_API_KEY` | `reasoning_api_key` |
/// | `MIRADOR_MEMORY_CAPACITY` | `memory_capacity` |
/// | `MIRADOR_IMAGES_DIR` | `images_dir` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MIRADOR_CLASSIFIER_URL") {
        cfg.classifier_url = v;
    }
    if let Ok(v) = std::env::var("MIRADOR_CLASSIFIER_MODEL") {
        cfg.classifier_model = v;
    }
    if let Ok(v) = std::env::var("MIRADOR_REASONING_URL") {
        cfg.reasoning_url = v;
    }
    if let Ok(v) = std::env::var("MIRADOR_REASONING_MODEL") {
        cfg.reasoning_model = v;
    }
    if let Ok(v) = std::env::var("MIRADOR_API_KEY") {
        cfg.reasoning_api_key = v;
    }
    if let Ok(v) = std::env::var("MIRADOR_MEMORY_CAPACITY")
        && let Ok(n) = v.trim().parse::<usize>()
    {
        cfg.memory_capacity = n;
    }
    if let Ok(v) = std::env::var("MIRADOR_IMAGES_DIR") {
        cfg.images_dir = PathBuf::from(v);
    }
}

/// `true` if `~/.mirador/config.toml` exists.
pub fn exists() -> bool {
    config_path().exists()
}

/// Save the config to `~/.mirador/config.toml`.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Write the config to `path` with owner-only permissions on Unix.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let cfg = Config {
            reasoning_api_key: "sk-super-secret".to_string(),
            ..Config::default()
        };
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("sk-super-secret"));
        assert!(debug_str.contains("<redacted>"));
        assert!(format!("{:?}", Config::default()).contains("<not set>"));
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.memory_capacity, 6);
        assert_eq!(cfg.classifier_model, "qwen3:0.6b");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let odd = Config {
            memory_capacity: 5,
            ..Config::default()
        };
        assert!(odd.validate().unwrap_err().contains("memory_capacity"));

        let zero = Config {
            memory_capacity: 0,
            ..Config::default()
        };
        assert!(zero.validate().is_err());

        let flat = Config {
            image_height: 0,
            ..Config::default()
        };
        assert!(flat.validate().is_err());

        let quality = Config {
            jpeg_quality: 0,
            ..Config::default()
        };
        assert!(quality.validate().unwrap_err().contains("jpeg_quality"));

        let no_deadline = Config {
            capture_timeout_secs: 0,
            ..Config::default()
        };
        assert!(no_deadline.validate().unwrap_err().contains("capture_timeout_secs"));

        let blank_program = Config {
            screen_command: vec![" ".to_string(), "{path}".to_string()],
            ..Config::default()
        };
        assert!(blank_program.validate().unwrap_err().contains("screen_command"));
    }

    #[test]
    fn screen_command_overrides_builtin_source() {
        assert!(Config::default().screen_override().is_none());

        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "screen_command = [\"grim\", \"{path}\"]\ncapture_timeout_secs = 3\n",
        )
        .unwrap();

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.screen_command, vec!["grim", "{path}"]);
        assert_eq!(cfg.capture_timeout(), Duration::from_secs(3));
        assert!(cfg.screen_override().is_some());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "reasoning_provider = \"openai\"\nreasoning_model = \"gpt-4o-mini\"\nsimulate_devices = true\n",
        )
        .unwrap();

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.reasoning_provider, ReasoningProvider::OpenAi);
        assert_eq!(cfg.reasoning_model, "gpt-4o-mini");
        assert!(cfg.simulate_devices);
        assert_eq!(cfg.image_width, 640);
        assert_eq!(cfg.token_log_path, None);
    }

    #[test]
    fn roundtrip_through_disk() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let cfg = Config {
            token_log_path: Some(PathBuf::from("logs/usage.jsonl")),
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.classifier_url, "http://localhost:11434");
        assert_eq!(loaded.token_log_path, Some(PathBuf::from("logs/usage.jsonl")));
        assert_eq!(loaded.reasoning_provider, ReasoningProvider::Ollama);
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn env_overrides_apply() {
        // SAFETY: these variables are only touched by this test.
        unsafe {
            std::env::set_var("MIRADOR_REASONING_MODEL", "llava:7b");
            std::env::set_var("MIRADOR_MEMORY_CAPACITY", "10");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.reasoning_model, "llava:7b");
        assert_eq!(cfg.memory_capacity, 10);
        unsafe {
            std::env::remove_var("MIRADOR_REASONING_MODEL");
            std::env::remove_var("MIRADOR_MEMORY_CAPACITY");
        }
    }

    #[test]
    fn agent_config_maps_timeouts_and_key() {
        let cfg = Config {
            reasoning_timeout_secs: 30,
            ..Config::default()
        };
        let agent = cfg.agent_config();
        assert_eq!(agent.reasoning_timeout, Duration::from_secs(30));
        assert_eq!(agent.reasoning_api_key, None);

        let pipeline = cfg.pipeline_config();
        assert_eq!((pipeline.target_width, pipeline.target_height), (640, 360));
    }
}
