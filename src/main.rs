//! subdub - subtitle-driven dubbing and video localization tools
//!
//! Entry point: parses arguments, sets up logging, loads configuration and
//! dispatches to the workflow.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subdub::cli::{Args, Commands, DubArgs, TranslateArgs};
use subdub::config::{Config, OverlapPolicy, SpeechLevel, ValidationMode};
use subdub::error::SubdubError;
use subdub::media::VideoEncoder;
use subdub::schedule::Deadline;
use subdub::workflow::{BlendOptions, CoverOptions, TranslateOptions, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting subdub");

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.resolve_env();

    match args.command {
        Commands::Dub(dub) => {
            apply_dub_args(&mut config, &dub)?;
            let workflow = Workflow::new(config);
            workflow.check_dependencies().await?;

            let report = workflow.dub(&dub.input, dub.output.as_deref()).await?;
            info!("Dubbed {} file(s)", report.succeeded);
        }
        Commands::Translate(translate) => {
            apply_translate_args(&mut config, &translate)?;
            let options = TranslateOptions {
                vendor: translate.vendor.clone(),
                model_type: translate.model_type.clone(),
                api_key: translate.api_key.clone(),
                describe: translate.desc,
                stop_at: translate.stop_at.as_deref().map(Deadline::parse).transpose()?,
            };

            if let Some(start_at) = translate.start_at.as_deref() {
                Deadline::parse(start_at)?.wait().await;
            }

            let workflow = Workflow::new(config);
            let report = workflow
                .translate(&translate.input, translate.output.as_deref(), &options)
                .await?;
            info!("Translated {} file(s)", report.succeeded);
        }
        Commands::Resize { directory, width, height, replace, suffix, device } => {
            let encoder: VideoEncoder = device.parse()?;
            let workflow = Workflow::new(config);
            workflow.check_dependencies().await?;

            workflow
                .resize_directory(&directory, width, height, replace, &suffix, encoder)
                .await?;
        }
        Commands::Blend {
            main_video,
            overlay1,
            overlay2,
            sub1_x,
            sub1_y,
            sub2_x,
            sub2_y,
            output,
            codec,
            hwaccel,
        } => {
            let workflow = Workflow::new(config);
            workflow.check_dependencies().await?;

            let options = BlendOptions {
                main_video,
                first_overlay: overlay1,
                second_overlay: overlay2,
                first_offset: (sub1_x, sub1_y),
                second_offset: (sub2_x, sub2_y),
                output,
                codec,
                hwaccel,
            };
            let output = workflow.blend(&options).await?;
            info!("Blend complete: {}", output.display());
        }
        Commands::Cover { input, output, map, no_detect, resize, min_size } => {
            let options = CoverOptions {
                map,
                detect_map: !no_detect,
                min_size: if resize { Some(parse_size(&min_size)?) } else { None },
            };

            let workflow = Workflow::new(config);
            workflow.check_dependencies().await?;
            workflow.extract_covers(&input, output.as_deref(), &options).await?;
        }
        Commands::InitConfig { output } => {
            config.save_to_file(&output)?;
            info!("Configuration written to {}", output.display());
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".subdub").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation; the guard must outlive the program.
    let file_appender = rolling::daily(&log_dir, "subdub.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("subdub.log").display()
    );

    Ok(())
}

fn apply_dub_args(config: &mut Config, args: &DubArgs) -> Result<()> {
    if let Some(suffix) = &args.subtitle_suffix {
        config.dub.subtitle_suffix = suffix.clone();
    }
    if let Some(suffix) = &args.audio_suffix {
        config.dub.audio_suffix = suffix.clone();
    }
    if let Some(codec) = &args.audio_codec {
        config.media.audio_codec = codec.clone();
    }
    if let Some(quality) = &args.audio_quality {
        config.media.audio_quality = quality.split_whitespace().map(str::to_string).collect();
    }
    if let Some(format) = &args.audio_format {
        config.media.audio_format = format.trim_start_matches('.').to_string();
    }
    if let Some(speed) = &args.speech_speed {
        config.speech.rate = parse_speech_level(speed)?;
    }
    if let Some(pitch) = &args.speech_pitch {
        config.speech.pitch = parse_speech_level(pitch)?;
    }
    if let Some(role) = &args.voice_role {
        config.speech.voice_role = role.clone();
    }
    if let Some(role) = &args.clone_role {
        config.speech.clone.role = Some(role.clone()).filter(|r| !r.is_empty());
    }
    if let Some(alternates) = args.alternative {
        config.speech.clone.alternates = alternates;
    }
    if args.no_rate_probe {
        config.dub.rate_probe = false;
    }
    if args.adjust_duration {
        config.dub.adjust_duration = true;
    }
    if let Some(overlap) = &args.overlap {
        config.dub.overlap = parse_overlap_policy(overlap)?;
    }
    Ok(())
}

fn apply_translate_args(config: &mut Config, args: &TranslateArgs) -> Result<()> {
    if let Some(temperature) = args.temperature {
        config.translate.temperature = temperature;
    }
    if let Some(batch) = args.batch {
        if batch == 0 {
            return Err(SubdubError::Config("Batch size must be at least 1".to_string()).into());
        }
        config.translate.batch_size = batch;
    }
    if let Some(mode) = &args.validation {
        config.translate.validation = parse_validation_mode(mode)?;
    }
    if let Some(language) = &args.target_language {
        config.translate.target_language = language.clone();
    }
    Ok(())
}

/// Parse speech rate or pitch level from string
fn parse_speech_level(level: &str) -> Result<SpeechLevel> {
    Ok(level.parse::<SpeechLevel>()?)
}

/// Parse batch validation mode from string
fn parse_validation_mode(mode: &str) -> Result<ValidationMode> {
    match mode.to_lowercase().as_str() {
        "strict" => Ok(ValidationMode::Strict),
        "lenient" => Ok(ValidationMode::Lenient),
        _ => Err(SubdubError::Config(format!(
            "Invalid validation mode '{}'. Valid modes: strict, lenient",
            mode
        ))
        .into()),
    }
}

/// Parse overlap policy from string
fn parse_overlap_policy(policy: &str) -> Result<OverlapPolicy> {
    match policy.to_lowercase().as_str() {
        "truncate" => Ok(OverlapPolicy::Truncate),
        "keep" => Ok(OverlapPolicy::Keep),
        _ => Err(SubdubError::Config(format!(
            "Invalid overlap policy '{}'. Valid policies: truncate, keep",
            policy
        ))
        .into()),
    }
}

/// Parse `WIDTHxHEIGHT`
fn parse_size(size: &str) -> Result<(u32, u32)> {
    size.split_once(['x', 'X'])
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)))
        .ok_or_else(|| SubdubError::Config(format!("Invalid size '{}'. Expected WIDTHxHEIGHT", size)).into())
}
