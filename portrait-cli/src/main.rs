use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use portrait::{ComposeOptions, FetchOptions, MediaKind};

#[derive(Parser)]
#[command(
    name = "portrait",
    about = "Turn a still image and an audio clip into a 1080x1920 MP4"
)]
struct Cli {
    /// Image file path or http(s) URL.
    image: String,

    /// Audio file path or http(s) URL.
    audio: String,

    /// Output MP4 path.
    #[arg(short, long, default_value = "output_video.mp4")]
    output: PathBuf,

    /// Target length in seconds, capped at the audio length.
    #[arg(short, long, default_value = "10", conflicts_with = "full_length")]
    duration: f64,

    /// Use the whole audio clip instead of a target length.
    #[arg(long)]
    full_length: bool,

    /// Volume multiplier (0 mutes, 1 leaves the clip unchanged).
    #[arg(short, long, default_value = "1.0")]
    volume: f32,

    /// Frame rate of the video track.
    #[arg(long, default_value_t = portrait::config::DEFAULT_FPS)]
    fps: u32,

    /// H.264 target bitrate.
    #[arg(long, default_value = "2000k")]
    video_bitrate: String,

    /// AAC bitrate.
    #[arg(long, default_value = "192k")]
    audio_bitrate: String,

    /// x264 preset (ultrafast .. veryslow).
    #[arg(long, default_value = "medium")]
    preset: String,

    /// Download timeout in seconds.
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Extra attempts for transient download failures.
    #[arg(long, default_value = "0")]
    retries: u32,

    /// Skip TLS certificate verification for downloads.
    #[arg(long)]
    insecure: bool,
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

async fn read_input(input: &str, kind: MediaKind, fetch: &FetchOptions) -> portrait::Result<Vec<u8>> {
    if is_url(input) {
        portrait::fetch::download(input, kind, fetch).await
    } else {
        std::fs::read(input).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => match kind {
                MediaKind::Image => portrait::Error::ImageNotFound { path: input.into() },
                MediaKind::Audio => portrait::Error::AudioNotFound { path: input.into() },
            },
            _ => e.into(),
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portrait=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut opts = match ComposeOptions::new()
        .volume(cli.volume)
        .and_then(|o| o.fps(cli.fps))
    {
        Ok(o) => o
            .video_bitrate(cli.video_bitrate)
            .audio_bitrate(cli.audio_bitrate)
            .preset(cli.preset),
        Err(e) => fail(e),
    };

    opts = if cli.full_length {
        opts.full_length()
    } else {
        match opts.duration(cli.duration) {
            Ok(o) => o,
            Err(e) => fail(e),
        }
    };

    if !portrait::encode::ffmpeg_available() {
        fail(portrait::Error::FfmpegNotFound);
    }

    let output = cli.output;

    if !is_url(&cli.image) && !is_url(&cli.audio) {
        let image = PathBuf::from(&cli.image);
        let audio = PathBuf::from(&cli.audio);
        let pb = spinner("Composing video");
        let target = output.clone();
        let result = tokio::task::spawn_blocking(move || {
            portrait::compose_files(&image, &audio, &target, &opts)
        })
        .await;
        pb.finish_and_clear();

        let video = match result {
            Ok(Ok(video)) => video,
            Ok(Err(e)) => fail(e),
            Err(e) => fail(e),
        };
        eprintln!(
            "Video complete: {:.1}s, {}x{} at {} fps",
            video.duration, video.width, video.height, video.fps
        );
        eprintln!("Written to {}", video.path.display());
        return;
    }

    let fetch = FetchOptions::new()
        .timeout(Duration::from_secs(cli.timeout))
        .retries(cli.retries)
        .verify_ssl(!cli.insecure);

    let pb = spinner("Fetching inputs");
    let inputs = async {
        let image = read_input(&cli.image, MediaKind::Image, &fetch).await?;
        let audio = read_input(&cli.audio, MediaKind::Audio, &fetch).await?;
        Ok::<_, portrait::Error>((image, audio))
    }
    .await;
    let (image, audio) = match inputs {
        Ok(pair) => pair,
        Err(e) => {
            pb.finish_and_clear();
            fail(e);
        }
    };

    pb.set_message("Composing video");
    let result =
        tokio::task::spawn_blocking(move || portrait::compose_bytes(&image, &audio, &opts)).await;
    pb.finish_and_clear();

    let video = match result {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => fail(e),
        Err(e) => fail(e),
    };

    if let Err(e) = std::fs::write(&output, &video) {
        fail(format!("writing to {}: {e}", output.display()));
    }
    print_summary(&output, video.len());
}

fn print_summary(path: &Path, bytes: usize) {
    match portrait::encode::probe_duration(path) {
        Ok(secs) => eprintln!("Video complete: {secs:.1}s, {}", format_bytes(bytes as u64)),
        Err(_) => eprintln!("Video complete: {}", format_bytes(bytes as u64)),
    }
    eprintln!("Written to {}", path.display());
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1} MB", bytes as f64 / 1_000_000.0)
    } else {
        format!("{:.0} KB", bytes as f64 / 1_000.0)
    }
}
