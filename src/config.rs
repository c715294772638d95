use crate::gemini::{DEFAULT_API_BASE, DEFAULT_MODEL_ID, DEFAULT_TIMEOUT, GeminiConfig};
use argh::FromArgs;
use std::{path::PathBuf, time::Duration};

// defaults for the server
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7860;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 20;

/// Environment variable holding the Gemini API key.
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(FromArgs, Debug)]
/// Medscan serves a page that sends medical images to a hosted multimodal model for analysis.
pub struct MedscanArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    pub host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    pub port: u16,

    /// the Gemini model id to call
    #[argh(option, short = 'm', default = "DEFAULT_MODEL_ID.to_string()")]
    pub model: String,

    /// base URL of the Gemini API
    #[argh(option, default = "DEFAULT_API_BASE.to_string()")]
    pub api_base: String,

    /// directory for the temporary images written per request
    #[argh(option)]
    pub scratch_dir: Option<PathBuf>,

    /// seconds to wait for the model before giving up
    #[argh(option, default = "DEFAULT_TIMEOUT.as_secs()")]
    pub timeout_secs: u64,

    /// largest accepted upload, in MiB
    #[argh(option, default = "DEFAULT_MAX_UPLOAD_MB")]
    pub max_upload_mb: usize,

    /// do not let the model run web searches
    #[argh(switch)]
    pub no_web_search: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingApiKey(&'static str),

    #[error("scratch directory {0} does not exist")]
    MissingScratchDir(PathBuf),

    #[error("timeout must be at least one second")]
    ZeroTimeout,
}

/// Everything the server needs, resolved once at start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: String,
    pub scratch_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub gemini: GeminiConfig,
}

impl AppConfig {
    /// Combines the command line with an API key looked up through `lookup`.
    pub fn resolve(
        args: MedscanArgs,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_key = lookup(API_KEY_VAR)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey(API_KEY_VAR))?;

        if args.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let scratch_dir = args.scratch_dir.unwrap_or_else(std::env::temp_dir);
        if !scratch_dir.is_dir() {
            return Err(ConfigError::MissingScratchDir(scratch_dir));
        }

        let gemini = GeminiConfig::new(api_key)
            .with_model(args.model)
            .with_api_base(args.api_base)
            .with_web_search(!args.no_web_search)
            .with_timeout(Duration::from_secs(args.timeout_secs));

        Ok(Self {
            addr: format!("{}:{}", args.host, args.port),
            scratch_dir,
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
            gemini,
        })
    }

    /// Reads the API key from the process environment.
    pub fn from_env(args: MedscanArgs) -> Result<Self, ConfigError> {
        Self::resolve(args, |name| std::env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> MedscanArgs {
        MedscanArgs::from_args(&["medscan"], args).unwrap()
    }

    fn with_key(name: &str) -> Option<String> {
        (name == API_KEY_VAR).then(|| "test-key".to_string())
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::resolve(parse(&[]), with_key).unwrap();
        assert_eq!(config.addr, "127.0.0.1:7860");
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.gemini.model_id(), DEFAULT_MODEL_ID);
        assert!(config.gemini.web_search());
        assert_eq!(config.gemini.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn flags_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_str().unwrap();
        let args = parse(&[
            "--port",
            "9000",
            "-m",
            "gemini-1.5-pro",
            "--no-web-search",
            "--scratch-dir",
            dir_arg,
            "--timeout-secs",
            "30",
        ]);
        let config = AppConfig::resolve(args, with_key).unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.scratch_dir, dir.path());
        assert_eq!(config.gemini.model_id(), "gemini-1.5-pro");
        assert!(!config.gemini.web_search());
        assert_eq!(config.gemini.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn missing_or_blank_key_is_an_error() {
        let err = AppConfig::resolve(parse(&[]), |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(API_KEY_VAR)));

        let err = AppConfig::resolve(parse(&[]), |_| Some("  ".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(_)));
    }

    #[test]
    fn missing_scratch_dir_is_rejected() {
        let args = parse(&["--scratch-dir", "/definitely/not/here"]);
        let err = AppConfig::resolve(args, with_key).unwrap_err();
        assert!(matches!(err, ConfigError::MissingScratchDir(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = AppConfig::resolve(parse(&["--timeout-secs", "0"]), with_key).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }
}
