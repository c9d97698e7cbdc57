//! Server configuration, parsed once at startup.

use std::time::Duration;

use clap::Parser;
use portrait::{FetchOptions, InputSource, OutputMode};

/// Everything the server needs to know, from flags or `PORTRAIT_*` env vars.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portrait-server",
    about = "HTTP API turning a still image and an audio clip into a portrait MP4"
)]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "PORTRAIT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind.
    #[arg(short, long, env = "PORTRAIT_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Verbose logging.
    #[arg(long, env = "PORTRAIT_DEBUG")]
    pub debug: bool,

    /// Where request inputs come from: `url` (image_url/audio_url) or
    /// `base64` (image/audio).
    #[arg(long, env = "PORTRAIT_INPUT", default_value_t = InputSource::Url)]
    pub input: InputSource,

    /// How the video is returned: `file` (MP4 download) or `base64` (JSON).
    #[arg(long, env = "PORTRAIT_OUTPUT", default_value_t = OutputMode::File)]
    pub output: OutputMode,

    /// Frame rate of the generated video (1-120).
    #[arg(
        long,
        env = "PORTRAIT_FPS",
        default_value_t = portrait::config::DEFAULT_FPS,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(portrait::config::MAX_FPS))
    )]
    pub fps: u32,

    /// Per-download timeout in seconds.
    #[arg(long, env = "PORTRAIT_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    pub download_timeout_secs: u64,

    /// Skip TLS certificate verification for downloads.
    #[arg(long, env = "PORTRAIT_INSECURE")]
    pub insecure: bool,

    /// Extra attempts for transient download failures.
    #[arg(long, env = "PORTRAIT_DOWNLOAD_RETRIES", default_value_t = 0)]
    pub download_retries: u32,

    /// Largest accepted download, in MiB.
    #[arg(long, env = "PORTRAIT_MAX_DOWNLOAD_MB", default_value_t = 100)]
    pub max_download_mb: u64,

    /// Largest accepted request body, in MiB (base64 payloads count here).
    #[arg(long, env = "PORTRAIT_MAX_BODY_MB", default_value_t = 64)]
    pub max_body_mb: usize,

    /// Encodes allowed to run at once; further requests wait.
    #[arg(long, env = "PORTRAIT_MAX_JOBS", default_value_t = default_max_jobs())]
    pub max_jobs: usize,
}

fn default_max_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            debug: false,
            input: InputSource::Url,
            output: OutputMode::File,
            fps: portrait::config::DEFAULT_FPS,
            download_timeout_secs: 30,
            insecure: false,
            download_retries: 0,
            max_download_mb: 100,
            max_body_mb: 64,
            max_jobs: default_max_jobs(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::new()
            .timeout(Duration::from_secs(self.download_timeout_secs))
            .verify_ssl(!self.insecure)
            .retries(self.download_retries)
            .max_bytes(self.max_download_mb * 1024 * 1024)
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb * 1024 * 1024
    }

    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "portrait=debug,portrait_server=debug,tower_http=debug"
        } else {
            "portrait=info,portrait_server=info,tower_http=info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config = ServerConfig::try_parse_from(["portrait-server"]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.input, InputSource::Url);
        assert_eq!(config.output, OutputMode::File);
        assert_eq!(config.fps, 24);
        assert!(!config.insecure);
        assert!(config.max_jobs >= 1);
    }

    #[test]
    fn test_parse_modes() {
        let config = ServerConfig::try_parse_from([
            "portrait-server",
            "--input",
            "base64",
            "--output",
            "base64",
            "--port",
            "9000",
        ])
        .unwrap();
        assert_eq!(config.input, InputSource::Base64);
        assert_eq!(config.output, OutputMode::Base64);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        assert!(ServerConfig::try_parse_from(["portrait-server", "--output", "stream"]).is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range_fps() {
        assert!(ServerConfig::try_parse_from(["portrait-server", "--fps", "0"]).is_err());
        assert!(ServerConfig::try_parse_from(["portrait-server", "--fps", "121"]).is_err());
        let config = ServerConfig::try_parse_from(["portrait-server", "--fps", "120"]).unwrap();
        assert_eq!(config.fps, 120);
    }

    #[test]
    fn test_fetch_options_follow_config() {
        let config = ServerConfig {
            insecure: true,
            download_timeout_secs: 5,
            download_retries: 2,
            max_download_mb: 1,
            ..ServerConfig::default()
        };
        let fetch = config.fetch_options();
        assert!(!fetch.verify_ssl);
        assert_eq!(fetch.timeout, Duration::from_secs(5));
        assert_eq!(fetch.retries, 2);
        assert_eq!(fetch.max_bytes, 1024 * 1024);
    }

    #[test]
    fn test_log_filter_follows_debug() {
        let mut config = ServerConfig::default();
        assert!(config.log_filter().contains("portrait=info"));
        config.debug = true;
        assert!(config.log_filter().contains("portrait=debug"));
    }
}
