use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SubdubError};

/// Captured result of a media tool run that may legitimately fail
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
    pub timeout: Option<Duration>,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
            timeout: None,
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Kill the process if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Only report errors on stderr
    pub fn quiet(self) -> Self {
        self.arg("-hide_banner").arg("-loglevel").arg("error")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Select a stream for the output
    pub fn map<S: Into<String>>(self, spec: S) -> Self {
        self.arg("-map").arg(spec)
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Add audio filter
    pub fn audio_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-filter:a").arg(filter)
    }

    /// Add a complex filter graph
    pub fn filter_complex<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-filter_complex").arg(graph)
    }

    /// Decode everything and discard the result
    pub fn null_output(self) -> Self {
        self.arg("-f").arg("null").arg("-")
    }

    /// Execute the command, failing on a non-zero exit status
    pub async fn execute(&self) -> Result<()> {
        let output = self.execute_capture().await?;

        if !output.success {
            return Err(SubdubError::Media(format!(
                "{} failed: {}",
                self.description,
                output.stderr.trim()
            )));
        }

        Ok(())
    }

    /// Execute the command and hand back its exit state and stderr
    pub async fn execute_capture(&self) -> Result<CommandOutput> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child).await.map_err(|_| {
                SubdubError::Timeout {
                    operation: self.description.clone(),
                    seconds: limit.as_secs(),
                }
            })?,
            None => child.await,
        }
        .map_err(|e| SubdubError::Media(format!("Failed to execute media processor: {}", e)))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Video encoder backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEncoder {
    Cpu,
    Nvenc,
    Qsv,
    Amf,
}

impl VideoEncoder {
    pub fn codec(&self) -> &'static str {
        match self {
            Self::Cpu => "libx264",
            Self::Nvenc => "h264_nvenc",
            Self::Qsv => "h264_qsv",
            Self::Amf => "h264_amf",
        }
    }
}

impl std::str::FromStr for VideoEncoder {
    type Err = SubdubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "nvenc" => Ok(Self::Nvenc),
            "qsv" => Ok(Self::Qsv),
            "amf" => Ok(Self::Amf),
            _ => Err(SubdubError::Config(format!(
                "Unsupported device '{}'. Valid devices: cpu, nvenc, qsv, amf",
                s
            ))),
        }
    }
}

/// One clip placed on the assembled timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSlot {
    pub path: std::path::PathBuf,
    /// Start offset in seconds
    pub offset: f64,
    /// Maximum playable length in seconds, if the clip must be cut
    pub max_length: Option<f64>,
}

/// Encoding of an assembled audio track
#[derive(Debug, Clone)]
pub struct AudioEncoding {
    pub codec: String,
    pub quality: Vec<String>,
}

/// Two overlay videos composited onto a main video
#[derive(Debug, Clone)]
pub struct OverlayRequest {
    pub main_video: std::path::PathBuf,
    pub overlays: [(std::path::PathBuf, i32, i32); 2],
    pub output: std::path::PathBuf,
    pub codec: String,
    pub hwaccel: Option<String>,
}

/// Builder for common media processing operations
pub struct MediaCommandBuilder {
    binary_path: String,
    timeout: Duration,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S, timeout: Duration) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout,
        }
    }

    fn command<S: Into<String>>(&self, description: S) -> MediaCommand {
        MediaCommand::new(&self.binary_path, description).with_timeout(self.timeout)
    }

    /// Build a decode pass whose stderr carries the `Duration:` line
    pub fn probe_duration<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        self.command("Duration probe")
            .arg("-hide_banner")
            .input(path)
            .null_output()
    }

    /// Build a decode pass that fails on unplayable input
    pub fn validate<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        self.command("Playability check")
            .arg("-v")
            .arg("error")
            .input(path)
            .null_output()
    }

    /// Build a tempo-scaling command from a chain of stage factors
    pub fn change_tempo<P: AsRef<Path>>(
        &self,
        input: P,
        output: P,
        stages: &[f64],
        codec: &str,
    ) -> MediaCommand {
        let mut cmd = self.command("Tempo scaling").overwrite().quiet().input(input);
        if !stages.is_empty() {
            cmd = cmd.audio_filter(atempo_chain(stages));
        }
        cmd.audio_codec(codec).output(output)
    }

    /// Build the command mixing every slot onto one track
    pub fn mix_timeline<P: AsRef<Path>>(
        &self,
        slots: &[TimelineSlot],
        output: P,
        encoding: &AudioEncoding,
    ) -> MediaCommand {
        let mut cmd = self.command("Timeline assembly").overwrite().quiet();
        for slot in slots {
            cmd = cmd.input(&slot.path);
        }

        cmd.filter_complex(timeline_filter(slots))
            .map("[out]")
            .audio_codec(&encoding.codec)
            .args(encoding.quality.iter().cloned())
            .output(output)
    }

    /// Build a resize command with the encoder of the chosen device
    pub fn resize_video<P: AsRef<Path>>(
        &self,
        input: P,
        output: P,
        width: u32,
        height: u32,
        encoder: VideoEncoder,
    ) -> MediaCommand {
        self.command(format!("Resize to {}x{}", width, height))
            .overwrite()
            .input(input)
            .video_filter(format!("scale={}:{}", width, height))
            .video_codec(encoder.codec())
            .map("0")
            .copy_audio()
            .output(output)
    }

    /// Build an overlay composite of two videos onto a main video
    pub fn overlay(&self, request: &OverlayRequest) -> MediaCommand {
        let mut cmd = self.command("Subtitle overlay").overwrite();
        if let Some(hwaccel) = &request.hwaccel {
            cmd = cmd.arg("-hwaccel").arg(hwaccel);
        }

        let [(first, x1, y1), (second, x2, y2)] = &request.overlays;
        cmd.input(&request.main_video)
            .input(first)
            .input(second)
            .filter_complex(format!(
                "[0:v][1:v]overlay=x={}:y={}[v1];[v1][2:v]overlay=x={}:y={}[final]",
                x1, y1, x2, y2
            ))
            .map("[final]")
            .map("0:a?")
            .video_codec(&request.codec)
            .output(&request.output)
    }

    /// Build a stream listing pass used to find embedded cover art
    pub fn list_streams<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        self.command("Stream listing")
            .arg("-hide_banner")
            .input(path)
            .arg("-c")
            .arg("copy")
            .null_output()
    }

    /// Build a single-frame cover extraction from `map` (attachments when `None`)
    pub fn extract_cover<P: AsRef<Path>>(
        &self,
        input: P,
        output: P,
        map: Option<&str>,
        min_size: Option<(u32, u32)>,
    ) -> MediaCommand {
        let mut cmd = self.command("Cover extraction").quiet().overwrite().input(input);
        match map {
            Some(map) => {
                cmd = cmd.map(map);
                match min_size {
                    Some((w, h)) => {
                        cmd = cmd
                            .video_filter(format!(
                                "scale=w='if(lt(iw,{w}),{w},iw)':h='if(lt(ih,{h}),{h},ih)':force_original_aspect_ratio=increase"
                            ))
                            .arg("-sws_flags")
                            .arg("lanczos")
                            .arg("-q:v")
                            .arg("1");
                    }
                    None => cmd = cmd.arg("-c").arg("copy"),
                }
            }
            None => {
                cmd = cmd.map("0:t").arg("-c").arg("copy").arg("-f").arg("image2");
            }
        }
        cmd.arg("-frames:v").arg("1").output(output)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        self.command("Version check").arg("-version")
    }
}

/// First line of `-version` output
pub fn parse_version_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Render tempo stages as an `atempo` filter chain
pub fn atempo_chain(stages: &[f64]) -> String {
    stages
        .iter()
        .map(|factor| format!("atempo={:.3}", factor))
        .collect::<Vec<_>>()
        .join(",")
}

/// Filter graph delaying every input to its offset and mixing them
pub fn timeline_filter(slots: &[TimelineSlot]) -> String {
    let mut graph = String::new();
    let mut labels = String::new();

    for (input, slot) in slots.iter().enumerate() {
        let delay_ms = (slot.offset * 1000.0).round() as u64;
        let trim = slot
            .max_length
            .map(|length| format!("atrim=end={:.3},", length))
            .unwrap_or_default();
        graph.push_str(&format!(
            "[{input}:a]{trim}adelay={delay_ms}:all=1[a{input}];"
        ));
        labels.push_str(&format!("[a{input}]"));
    }

    graph.push_str(&format!(
        "{labels}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[out]",
        slots.len()
    ));
    graph
}

/// Extract the `Duration: HH:MM:SS.ss` value from ffmpeg diagnostics
pub fn parse_duration(stderr: &str) -> Option<f64> {
    stderr.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Duration:")?;
        let stamp = rest.split(',').next()?.trim();
        let mut parts = stamp.split(':');
        let hours: f64 = parts.next()?.parse().ok()?;
        let minutes: f64 = parts.next()?.parse().ok()?;
        let seconds: f64 = parts.next()?.parse().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    })
}

/// Find an attached MJPEG picture stream (`0:N`) in an ffmpeg stream listing
pub fn parse_cover_stream(stderr: &str) -> Option<String> {
    stderr.lines().find_map(|line| {
        if !(line.contains("Video") && line.contains("(attached pic)")) || line.contains("Subtitle") {
            return None;
        }
        if !line.to_lowercase().contains("mjpeg") {
            return None;
        }
        let rest = line.split("Stream #0:").nth(1)?;
        let index: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        (!index.is_empty()).then(|| format!("0:{}", index))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn builder() -> MediaCommandBuilder {
        MediaCommandBuilder::new("ffmpeg", Duration::from_secs(30))
    }

    #[test]
    fn test_parse_duration() {
        let stderr = "Input #0, mov,mp4,m4a, from 'a.m4a':\n  Duration: 00:01:02.50, start: 0.000000, bitrate: 130 kb/s\n";
        assert_eq!(parse_duration(stderr), Some(62.5));
        assert_eq!(parse_duration("  Duration: 01:00:00.00, start"), Some(3600.0));
        assert_eq!(parse_duration("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration("no duration here"), None);
    }

    #[test]
    fn test_parse_cover_stream() {
        let listing = "  Stream #0:0[0x1](und): Audio: aac\n  Stream #0:1[0x2](und): Video: h264\n  Stream #0:3: Video: mjpeg (Baseline), yuvj420p, 1280x720 (attached pic)\n";
        assert_eq!(parse_cover_stream(listing), Some("0:3".to_string()));
        assert_eq!(parse_cover_stream("  Stream #0:2: Video: png (attached pic)\n"), None);
    }

    #[test]
    fn test_parse_version_line() {
        let stdout = "ffmpeg version 6.1.1 Copyright (c) 2000-2023\nbuilt with gcc 13\n";
        assert_eq!(parse_version_line(stdout), Some("ffmpeg version 6.1.1 Copyright (c) 2000-2023".to_string()));
        assert_eq!(parse_version_line("\n  \n"), None);
    }

    #[tokio::test]
    async fn test_execute_capture_times_out() {
        let started = std::time::Instant::now();
        let result = MediaCommand::new("sleep", "Slow tool")
            .arg("5")
            .with_timeout(Duration::from_millis(100))
            .execute_capture()
            .await;

        assert!(matches!(result, Err(SubdubError::Timeout { ref operation, .. }) if operation == "Slow tool"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_execute_capture_collects_stdout() {
        let output = MediaCommand::new("echo", "Echo")
            .arg("hello")
            .with_timeout(Duration::from_secs(5))
            .execute_capture()
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn test_atempo_chain() {
        assert_eq!(atempo_chain(&[2.0, 1.25]), "atempo=2.000,atempo=1.250");
        assert_eq!(atempo_chain(&[]), "");
    }

    #[test]
    fn test_timeline_filter_places_clips_at_offsets() {
        let slots = vec![
            TimelineSlot { path: PathBuf::from("a.m4a"), offset: 0.0, max_length: Some(2.0) },
            TimelineSlot { path: PathBuf::from("b.m4a"), offset: 2.0, max_length: None },
        ];
        assert_eq!(
            timeline_filter(&slots),
            "[0:a]atrim=end=2.000,adelay=0:all=1[a0];[1:a]adelay=2000:all=1[a1];\
             [a0][a1]amix=inputs=2:duration=longest:dropout_transition=0:normalize=0[out]"
        );
    }

    #[test]
    fn test_mix_timeline_command() {
        let slots = vec![TimelineSlot { path: PathBuf::from("a.m4a"), offset: 1.5, max_length: None }];
        let encoding = AudioEncoding { codec: "aac".into(), quality: vec!["-vbr".into(), "3".into()] };
        let cmd = builder().mix_timeline(&slots, PathBuf::from("out.m4a"), &encoding);

        assert_eq!(cmd.timeout, Some(Duration::from_secs(30)));
        assert_eq!(&cmd.args[cmd.args.len() - 5..], ["-c:a", "aac", "-vbr", "3", "out.m4a"]);
        assert!(cmd.args.contains(&"[out]".to_string()));
    }

    #[test]
    fn test_change_tempo_without_stages_skips_filter() {
        let cmd = builder().change_tempo("in.m4a", "out.m4a", &[], "aac");
        assert!(!cmd.args.contains(&"-filter:a".to_string()));
        let cmd = builder().change_tempo("in.m4a", "out.m4a", &[2.0], "aac");
        assert!(cmd.args.contains(&"atempo=2.000".to_string()));
    }

    #[test]
    fn test_resize_uses_device_encoder() {
        let cmd = builder().resize_video("in.mp4", "out.mp4", 1280, 720, VideoEncoder::Nvenc);
        assert!(cmd.args.windows(2).any(|w| w == ["-c:v", "h264_nvenc"]));
        assert!(cmd.args.windows(2).any(|w| w == ["-vf", "scale=1280:720"]));
        assert!(cmd.args.windows(2).any(|w| w == ["-map", "0"]));
    }

    #[test]
    fn test_overlay_with_hwaccel() {
        let request = OverlayRequest {
            main_video: PathBuf::from("main.mp4"),
            overlays: [(PathBuf::from("en.mp4"), 0, -10), (PathBuf::from("cn.mp4"), 0, -65)],
            output: PathBuf::from("out.mp4"),
            codec: "libx264".into(),
            hwaccel: Some("qsv".into()),
        };
        let cmd = builder().overlay(&request);
        assert!(cmd.args.windows(2).any(|w| w == ["-hwaccel", "qsv"]));
        assert!(cmd.args.iter().any(|a| a.contains("overlay=x=0:y=-65[final]")));
    }

    #[test]
    fn test_encoder_parse() {
        assert_eq!("QSV".parse::<VideoEncoder>().unwrap(), VideoEncoder::Qsv);
        assert!("vulkan".parse::<VideoEncoder>().is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_media_error() {
        let cmd = MediaCommand::new("/nonexistent/ffmpeg-binary", "Missing").arg("-version");
        assert!(matches!(cmd.execute().await, Err(SubdubError::Media(_))));
    }
}
