use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize dubbed audio aligned to subtitle timing
    Dub(DubArgs),

    /// Translate subtitle files through a chat-completion API
    Translate(TranslateArgs),

    /// Resize every MP4 in a directory
    Resize {
        /// Directory containing MP4 files
        #[arg(short, long)]
        directory: PathBuf,

        /// Target width
        #[arg(short, long)]
        width: u32,

        /// Target height
        #[arg(long)]
        height: u32,

        /// Replace the original files instead of writing new ones
        #[arg(short, long)]
        replace: bool,

        /// Suffix of resized files
        #[arg(short, long, default_value = "_resized")]
        suffix: String,

        /// Encoder device (cpu, nvenc, qsv, amf)
        #[arg(long, default_value = "cpu")]
        device: String,
    },

    /// Composite two subtitle overlay videos onto a main video
    Blend {
        /// Main video
        #[arg(short, long)]
        main_video: PathBuf,

        /// First overlay (default: <main>_en.mp4)
        #[arg(long)]
        overlay1: Option<PathBuf>,

        /// Second overlay (default: <main>_cn.mp4)
        #[arg(long)]
        overlay2: Option<PathBuf>,

        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        sub1_x: i32,

        #[arg(long, default_value_t = -10, allow_hyphen_values = true)]
        sub1_y: i32,

        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        sub2_x: i32,

        #[arg(long, default_value_t = -65, allow_hyphen_values = true)]
        sub2_y: i32,

        /// Output video (default: <main>_blended.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output video codec
        #[arg(long, default_value = "libx264")]
        codec: String,

        /// Hardware acceleration backend; amf and qsv are tried when omitted and the CPU run fails
        #[arg(long)]
        hwaccel: Option<String>,
    },

    /// Extract embedded cover images from MP4 files
    Cover {
        /// Input directory, searched recursively
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (default: input directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Explicit cover stream, e.g. 0:3
        #[arg(short, long)]
        map: Option<String>,

        /// Do not look for an attached-picture stream
        #[arg(long)]
        no_detect: bool,

        /// Upscale covers smaller than --min-size
        #[arg(long)]
        resize: bool,

        /// Minimum cover size as WIDTHxHEIGHT
        #[arg(long, default_value = "1920x1080")]
        min_size: String,
    },

    /// Write the effective configuration to a TOML file
    InitConfig {
        /// Output file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
pub struct DubArgs {
    /// Subtitle file or directory of subtitle files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory (default: next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only subtitle files ending with this suffix are dubbed in directory mode
    #[arg(long)]
    pub subtitle_suffix: Option<String>,

    /// Suffix appended to the audio file name
    #[arg(long)]
    pub audio_suffix: Option<String>,

    /// Audio codec
    #[arg(long)]
    pub audio_codec: Option<String>,

    /// Encoder quality arguments, e.g. "-vbr 3"
    #[arg(long, allow_hyphen_values = true)]
    pub audio_quality: Option<String>,

    /// Audio container extension
    #[arg(long)]
    pub audio_format: Option<String>,

    /// Speech rate (very_low, low, moderate, high, very_high)
    #[arg(short = 's', long)]
    pub speech_speed: Option<String>,

    /// Speech pitch (very_low, low, moderate, high, very_high)
    #[arg(short = 'p', long)]
    pub speech_pitch: Option<String>,

    /// Built-in voice
    #[arg(short = 'r', long)]
    pub voice_role: Option<String>,

    /// Clone role base name; alternates are <role>1, <role>2, ...
    #[arg(long)]
    pub clone_role: Option<String>,

    /// Number of extra clone alternates
    #[arg(long)]
    pub alternative: Option<u32>,

    /// Use the configured rate instead of probing one per file
    #[arg(long)]
    pub no_rate_probe: bool,

    /// Speed up clips that overrun their subtitle window
    #[arg(long)]
    pub adjust_duration: bool,

    /// Overlap handling (truncate, keep)
    #[arg(long)]
    pub overlap: Option<String>,
}

#[derive(clap::Args)]
pub struct TranslateArgs {
    /// Subtitle file or directory of subtitle files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file, or output directory in directory mode
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// API vendor
    #[arg(long)]
    pub vendor: Option<String>,

    /// API key (default: the vendor's environment variable)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Model type of the vendor
    #[arg(long)]
    pub model_type: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Entries per request
    #[arg(long)]
    pub batch: Option<usize>,

    /// Batch size validation (strict, lenient)
    #[arg(long)]
    pub validation: Option<String>,

    /// Target language named in the prompt
    #[arg(long)]
    pub target_language: Option<String>,

    /// Also write <output>.desc.json with a title, description and tags
    #[arg(long)]
    pub desc: bool,

    /// Wait until this time of day (HH:MM:SS) before starting
    #[arg(long)]
    pub start_at: Option<String>,

    /// Stop before the next file once this time of day (HH:MM:SS) has passed
    #[arg(long)]
    pub stop_at: Option<String>,
}
