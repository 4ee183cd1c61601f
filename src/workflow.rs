use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::dub::DubPipeline;
use crate::error::{Result, SubdubError};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait, OverlayRequest, VideoEncoder};
use crate::schedule::Deadline;
use crate::speech::{HttpSpeechApi, SpeechSynthesizer};
use crate::subtitle::{load_srt, write_srt, TimedEntry};
use crate::translate::{Translator, TranslatorFactory, DESCRIPTION_ENTRIES};

/// Accelerators tried in order when a CPU blend fails.
const BLEND_FALLBACKS: [&str; 2] = ["amf", "qsv"];

/// Outcome counts of a batch run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    fn log(&self, what: &str) {
        info!(
            "{} finished: {} succeeded, {} skipped, {} failed",
            what, self.succeeded, self.skipped, self.failed
        );
    }
}

/// Translation options that do not live in the configuration file
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    pub vendor: Option<String>,
    pub model_type: Option<String>,
    pub api_key: Option<String>,
    pub describe: bool,
    pub stop_at: Option<Deadline>,
}

/// Inputs of a two-overlay composite
#[derive(Debug, Clone)]
pub struct BlendOptions {
    pub main_video: PathBuf,
    /// Defaults to `{main stem}_en.mp4`
    pub first_overlay: Option<PathBuf>,
    /// Defaults to `{main stem}_cn.mp4`
    pub second_overlay: Option<PathBuf>,
    pub first_offset: (i32, i32),
    pub second_offset: (i32, i32),
    /// Defaults to `{main stem}_blended.mp4`
    pub output: Option<PathBuf>,
    pub codec: String,
    pub hwaccel: Option<String>,
}

/// Options of a cover extraction run
#[derive(Debug, Clone, Default)]
pub struct CoverOptions {
    pub map: Option<String>,
    pub detect_map: bool,
    pub min_size: Option<(u32, u32)>,
}

pub struct Workflow {
    config: Config,
    media: Arc<dyn MediaProcessorTrait>,
}

impl Workflow {
    pub fn new(config: Config) -> Self {
        let media = MediaProcessorFactory::create_processor(config.media.clone());
        Self::with_media(config, media)
    }

    pub fn with_media(config: Config, media: Arc<dyn MediaProcessorTrait>) -> Self {
        Self { config, media }
    }

    /// Fail early when the media tool cannot be run.
    pub async fn check_dependencies(&self) -> Result<()> {
        self.media.check_availability().await?;
        match self.media.get_version_info().await {
            Ok(version) => debug!("Using {}", version),
            Err(e) => debug!("Version query failed: {}", e),
        }
        Ok(())
    }

    /// Dub one subtitle file, or every `{subtitle_suffix}.srt` file in a directory.
    pub async fn dub(&self, input: &Path, output_dir: Option<&Path>) -> Result<BatchReport> {
        let api = HttpSpeechApi::new(&self.config.speech)?;
        let synthesizer = SpeechSynthesizer::new(
            Box::new(api),
            self.config.speech.clone(),
            self.config.media.audio_codec.clone(),
        );
        let pipeline = DubPipeline::new(Box::new(synthesizer), self.media.clone(), &self.config);

        self.dub_with(&pipeline, input, output_dir).await
    }

    pub async fn dub_with(
        &self,
        pipeline: &DubPipeline,
        input: &Path,
        output_dir: Option<&Path>,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        if input.is_file() {
            let output_dir = resolve_output_dir(input, output_dir)?;
            pipeline.process_file(input, &output_dir).await?;
            report.succeeded += 1;
            return Ok(report);
        }

        let input_dir = require_dir(input)?;
        let output_dir = output_dir.unwrap_or(input_dir).to_path_buf();
        let suffix = format!("{}.srt", self.config.dub.subtitle_suffix);
        let files = list_files(input_dir, false, |name| name.ends_with(&suffix));

        info!("Found {} subtitle files to dub in {}", files.len(), input_dir.display());

        for path in files {
            match pipeline.process_file(&path, &output_dir).await {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    warn!("Failed to dub {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        report.log("Dubbing");
        Ok(report)
    }

    /// Translate one subtitle file, or every untranslated subtitle in a directory.
    pub async fn translate(
        &self,
        input: &Path,
        output: Option<&Path>,
        options: &TranslateOptions,
    ) -> Result<BatchReport> {
        let vendor = options
            .vendor
            .clone()
            .unwrap_or_else(|| self.config.translate.default_vendor.clone());
        let translator = TranslatorFactory::create_translator(
            &self.config.translate,
            &vendor,
            options.model_type.as_deref(),
            options.api_key.clone(),
        )?;

        if input.is_file() {
            let output = match output {
                Some(path) => path.to_path_buf(),
                None => sibling_with_suffix(input, &self.config.translate.output_suffix, "srt")?,
            };
            self.translate_file(translator.as_ref(), input, &output, options.describe).await?;
            return Ok(BatchReport { succeeded: 1, ..Default::default() });
        }

        self.translate_directory(translator.as_ref(), input, output, options.describe, options.stop_at)
            .await
    }

    pub async fn translate_file(
        &self,
        translator: &dyn Translator,
        input: &Path,
        output: &Path,
        describe: bool,
    ) -> Result<()> {
        info!("Translating {} -> {}", input.display(), output.display());

        let entries = load_srt(input).await?;
        let translated = translator.translate_entries(&entries).await;
        write_srt(&translated, output).await?;

        if describe {
            self.write_description(translator, &translated, output).await;
        }
        Ok(())
    }

    pub async fn translate_directory(
        &self,
        translator: &dyn Translator,
        input: &Path,
        output_dir: Option<&Path>,
        describe: bool,
        stop_at: Option<Deadline>,
    ) -> Result<BatchReport> {
        let input_dir = require_dir(input)?;
        let output_dir = output_dir.unwrap_or(input_dir).to_path_buf();
        fs::create_dir_all(&output_dir).await?;

        let output_ending = format!("{}.srt", self.config.translate.output_suffix);
        let backup_ending = format!("{}.srt", self.config.translate.original_suffix);
        let files = list_files(input_dir, false, |name| {
            name.to_lowercase().ends_with(".srt")
                && !name.ends_with(&output_ending)
                && !name.ends_with(&backup_ending)
        });

        info!("Found {} subtitle files to translate in {}", files.len(), input_dir.display());

        let mut report = BatchReport::default();
        for path in files {
            if stop_at.is_some_and(|deadline| deadline.has_passed()) {
                warn!("Stop time reached, leaving remaining files for the next run");
                break;
            }

            let stem = file_stem(&path)?;
            let backup = output_dir.join(format!("{}{}.srt", stem, self.config.translate.original_suffix));
            let output = output_dir.join(format!("{}{}.srt", stem, self.config.translate.output_suffix));

            if !backup.exists() {
                if let Err(e) = fs::copy(&path, &backup).await {
                    warn!("Failed to back up {}: {}", path.display(), e);
                }
            }

            if output.exists() {
                debug!("Skipping {}: {} exists", path.display(), output.display());
                report.skipped += 1;
                continue;
            }

            match self.translate_file(translator, &path, &output, describe).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    warn!("Failed to translate {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        report.log("Translation");
        Ok(report)
    }

    async fn write_description(&self, translator: &dyn Translator, entries: &[TimedEntry], output: &Path) {
        match describe_to_file(translator, entries, output).await {
            Ok(path) => info!("Description saved to {}", path.display()),
            Err(e) => warn!("Description generation failed: {}", e),
        }
    }

    /// Resize every `.mp4` directly inside `dir`.
    pub async fn resize_directory(
        &self,
        dir: &Path,
        width: u32,
        height: u32,
        replace: bool,
        suffix: &str,
        encoder: VideoEncoder,
    ) -> Result<BatchReport> {
        let dir = require_dir(dir)?;
        let produced = format!("{}.mp4", suffix);
        let files = list_files(dir, false, |name| {
            name.to_lowercase().ends_with(".mp4") && (replace || suffix.is_empty() || !name.ends_with(&produced))
        });

        info!("Found {} videos to resize in {}", files.len(), dir.display());

        let mut report = BatchReport::default();
        for path in files {
            match self.resize_one(&path, width, height, replace, suffix, encoder).await {
                Ok(output) => {
                    info!("Resized {} -> {}", path.display(), output.display());
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("Failed to resize {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        report.log("Resize");
        Ok(report)
    }

    async fn resize_one(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        replace: bool,
        suffix: &str,
        encoder: VideoEncoder,
    ) -> Result<PathBuf> {
        let stem = file_stem(path)?;

        if !replace {
            let output = path.with_file_name(format!("{}{}.mp4", stem, suffix));
            self.media.resize_video(path, &output, width, height, encoder).await?;
            return Ok(output);
        }

        let temp = path.with_file_name(format!("{}.resizing.mp4", stem));
        if let Err(e) = self.media.resize_video(path, &temp, width, height, encoder).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(path.to_path_buf())
    }

    /// Composite two overlay videos onto a main video.
    pub async fn blend(&self, options: &BlendOptions) -> Result<PathBuf> {
        let main = &options.main_video;
        let first = match &options.first_overlay {
            Some(path) => path.clone(),
            None => sibling_with_suffix(main, "_en", "mp4")?,
        };
        let second = match &options.second_overlay {
            Some(path) => path.clone(),
            None => sibling_with_suffix(main, "_cn", "mp4")?,
        };
        let output = match &options.output {
            Some(path) => path.clone(),
            None => sibling_with_suffix(main, "_blended", "mp4")?,
        };

        for path in [main, &first, &second] {
            if !path.is_file() {
                return Err(SubdubError::FileNotFound(path.display().to_string()));
            }
        }

        let mut request = OverlayRequest {
            main_video: main.clone(),
            overlays: [
                (first, options.first_offset.0, options.first_offset.1),
                (second, options.second_offset.0, options.second_offset.1),
            ],
            output: output.clone(),
            codec: options.codec.clone(),
            hwaccel: options.hwaccel.clone(),
        };

        let mut result = self.media.overlay(&request).await;

        // Only an unaccelerated run falls back to the accelerators.
        if options.hwaccel.is_none() {
            for fallback in BLEND_FALLBACKS {
                let Err(e) = &result else { break };
                warn!("Blend failed ({}), retrying with -hwaccel {}", e, fallback);
                request.hwaccel = Some(fallback.to_string());
                result = self.media.overlay(&request).await;
            }
        }

        result?;
        info!("Blended video written to {}", output.display());
        Ok(output)
    }

    /// Extract cover images of every `.mp4` below `input` into `output_dir`.
    pub async fn extract_covers(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        options: &CoverOptions,
    ) -> Result<BatchReport> {
        let input_dir = require_dir(input)?;
        let output_dir = output_dir.unwrap_or(input_dir).to_path_buf();
        fs::create_dir_all(&output_dir).await?;

        let files = list_files(input_dir, true, |name| name.to_lowercase().ends_with(".mp4"));
        info!("Found {} videos to extract covers from", files.len());

        let mut report = BatchReport::default();
        for path in files {
            let output = output_dir.join(format!("{}.jpg", file_stem(&path)?));

            let map = match &options.map {
                Some(map) => Some(map.clone()),
                None if options.detect_map => match self.media.detect_cover_stream(&path).await {
                    Ok(found) => found,
                    Err(e) => {
                        debug!("Cover stream detection failed for {}: {}", path.display(), e);
                        None
                    }
                },
                None => None,
            };

            match self.media.extract_cover(&path, &output, map, options.min_size).await {
                Ok(true) => {
                    info!("[ok] {} -> {}", path.display(), output.display());
                    report.succeeded += 1;
                }
                Ok(false) => {
                    warn!("[failed] {}: no cover found", path.display());
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("[failed] {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        report.log("Cover extraction");
        Ok(report)
    }
}

/// Write `{output stem}.desc.json` next to `output`.
async fn describe_to_file(translator: &dyn Translator, entries: &[TimedEntry], output: &Path) -> Result<PathBuf> {
    let excerpt = &entries[..entries.len().min(DESCRIPTION_ENTRIES)];
    let description = translator.describe(excerpt).await?;

    let path = output.with_file_name(format!("{}.desc.json", file_stem(output)?));
    fs::write(&path, serde_json::to_string_pretty(&description)?).await?;
    Ok(path)
}

fn require_dir(path: &Path) -> Result<&Path> {
    if !path.exists() {
        return Err(SubdubError::FileNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(SubdubError::Config(format!("{} is not a directory", path.display())));
    }
    Ok(path)
}

fn resolve_output_dir(input: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    match output_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| SubdubError::Config("Cannot determine output directory".to_string())),
    }
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| SubdubError::Config(format!("Invalid file name: {}", path.display())))
}

/// `{dir}/{stem}{suffix}.{extension}` next to `path`
fn sibling_with_suffix(path: &Path, suffix: &str, extension: &str) -> Result<PathBuf> {
    let stem = file_stem(path)?;
    Ok(path.with_file_name(format!("{}{}.{}", stem, suffix, extension)))
}

/// Files in `dir` whose name passes `keep`, sorted by path.
fn list_files<F: Fn(&str) -> bool>(dir: &Path, recursive: bool, keep: F) -> Vec<PathBuf> {
    let walker = WalkDir::new(dir).min_depth(1);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().is_some_and(&keep))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaProcessorTrait;
    use crate::speech::MockClipSynthesizer;
    use crate::translate::{MediaDescription, MockTranslator};
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    const SRT: &str = "1\n00:00:00,000 --> 00:00:01,000\nHello\n";

    fn workflow(media: MockMediaProcessorTrait) -> Workflow {
        Workflow::with_media(Config::default(), Arc::new(media))
    }

    #[tokio::test]
    async fn test_dub_directory_continues_past_failures() {
        let temp = TempDir::new().unwrap();
        temp.child("a_cn.srt").write_str(SRT).unwrap();
        temp.child("b_cn.srt").write_str("garbage\n").unwrap();
        temp.child("c_en.srt").write_str(SRT).unwrap();
        let out = temp.child("out");

        let mut synth = MockClipSynthesizer::new();
        synth.expect_synthesize().times(1).returning(|_, _| b"clip".to_vec());

        let mut media = MockMediaProcessorTrait::new();
        media.expect_validate().returning(|_| Ok(true));
        media.expect_mix_timeline().returning(|_, output| {
            std::fs::write(output, b"track").unwrap();
            Ok(())
        });
        let media: Arc<dyn MediaProcessorTrait> = Arc::new(media);

        let mut config = Config::default();
        config.dub.rate_probe = false;
        let pipeline = DubPipeline::new(Box::new(synth), media.clone(), &config);
        let workflow = Workflow::with_media(config, media);

        let report = workflow.dub_with(&pipeline, temp.path(), Some(out.path())).await.unwrap();

        assert_eq!(report, BatchReport { succeeded: 1, skipped: 0, failed: 1 });
        out.child("a_cn.m4a").assert("track");
        assert!(!out.child("c_en.m4a").path().exists());
    }

    #[tokio::test]
    async fn test_dub_missing_input() {
        let workflow = workflow(MockMediaProcessorTrait::new());
        let pipeline = DubPipeline::new(
            Box::new(MockClipSynthesizer::new()),
            Arc::new(MockMediaProcessorTrait::new()),
            &Config::default(),
        );

        let err = workflow.dub_with(&pipeline, Path::new("/no/such/dir"), None).await.unwrap_err();
        assert!(matches!(err, SubdubError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_translate_directory_backs_up_and_skips() {
        let temp = TempDir::new().unwrap();
        temp.child("one.srt").write_str(SRT).unwrap();
        temp.child("two.srt").write_str(SRT).unwrap();
        temp.child("two_cn.srt").write_str(SRT).unwrap();
        temp.child("three_en.srt").write_str(SRT).unwrap();

        let mut translator = MockTranslator::new();
        translator.expect_translate_entries().times(1).returning(|entries| {
            entries.iter().map(|e| TimedEntry::new(e.index, e.start, e.end, "你好")).collect()
        });
        translator.expect_describe().times(0);

        let workflow = workflow(MockMediaProcessorTrait::new());
        let report = workflow
            .translate_directory(&translator, temp.path(), None, false, None)
            .await
            .unwrap();

        assert_eq!(report, BatchReport { succeeded: 1, skipped: 1, failed: 0 });
        assert!(std::fs::read_to_string(temp.child("one_cn.srt").path()).unwrap().contains("你好"));
        temp.child("one_en.srt").assert(SRT);
        temp.child("two_en.srt").assert(SRT);
        assert!(!temp.child("three_en_cn.srt").path().exists());
    }

    #[tokio::test]
    async fn test_translate_file_writes_description() {
        let temp = TempDir::new().unwrap();
        temp.child("movie.srt").write_str(SRT).unwrap();
        let output = temp.child("movie_cn.srt");

        let mut translator = MockTranslator::new();
        translator.expect_translate_entries().returning(|entries| entries.to_vec());
        translator.expect_describe().returning(|_| {
            Ok(MediaDescription {
                title: "标题".to_string(),
                description: "简介".to_string(),
                tags: vec!["tag".to_string()],
            })
        });

        let workflow = workflow(MockMediaProcessorTrait::new());
        workflow
            .translate_file(&translator, temp.child("movie.srt").path(), output.path(), true)
            .await
            .unwrap();

        assert!(std::fs::read_to_string(output.path()).unwrap().contains("Hello"));
        let json = std::fs::read_to_string(temp.child("movie_cn.desc.json").path()).unwrap();
        assert!(json.contains("\"title\": \"标题\""));
    }

    #[tokio::test]
    async fn test_resize_writes_suffixed_copies() {
        let temp = TempDir::new().unwrap();
        temp.child("a.mp4").touch().unwrap();
        temp.child("a_resized.mp4").touch().unwrap();
        temp.child("notes.txt").touch().unwrap();

        let mut media = MockMediaProcessorTrait::new();
        media.expect_resize_video()
            .withf(|input, output, w, h, enc| {
                input.ends_with("a.mp4") && output.ends_with("a_resized.mp4") && *w == 1280 && *h == 720 && *enc == VideoEncoder::Nvenc
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));

        let report = workflow(media)
            .resize_directory(temp.path(), 1280, 720, false, "_resized", VideoEncoder::Nvenc)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn test_resize_replace_renames_over_original() {
        let temp = TempDir::new().unwrap();
        temp.child("a.mp4").write_str("old").unwrap();

        let mut media = MockMediaProcessorTrait::new();
        media.expect_resize_video().returning(|_, output, _, _, _| {
            std::fs::write(output, "new").unwrap();
            Ok(())
        });

        let report = workflow(media)
            .resize_directory(temp.path(), 640, 360, true, "_resized", VideoEncoder::Cpu)
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
        temp.child("a.mp4").assert("new");
        assert!(!temp.child("a.resizing.mp4").path().exists());
    }

    #[tokio::test]
    async fn test_resize_replace_failed_rename_removes_temp() {
        let temp = TempDir::new().unwrap();
        // A non-empty directory in place of the original cannot be renamed over.
        temp.child("a.mp4/keep.txt").touch().unwrap();

        let mut media = MockMediaProcessorTrait::new();
        media.expect_resize_video().returning(|_, output, _, _, _| {
            std::fs::write(output, "new").unwrap();
            Ok(())
        });

        let result = workflow(media)
            .resize_one(temp.child("a.mp4").path(), 640, 360, true, "_resized", VideoEncoder::Cpu)
            .await;

        assert!(result.is_err());
        assert!(!temp.child("a.resizing.mp4").path().exists());
        assert!(temp.child("a.mp4/keep.txt").path().exists());
    }

    fn blend_options(main: PathBuf, hwaccel: Option<String>) -> BlendOptions {
        BlendOptions {
            main_video: main,
            first_overlay: None,
            second_overlay: None,
            first_offset: (0, -10),
            second_offset: (0, -65),
            output: None,
            codec: "libx264".to_string(),
            hwaccel,
        }
    }

    #[tokio::test]
    async fn test_blend_falls_back_to_accelerators() {
        let temp = TempDir::new().unwrap();
        for name in ["movie.mp4", "movie_en.mp4", "movie_cn.mp4"] {
            temp.child(name).touch().unwrap();
        }

        let mut media = MockMediaProcessorTrait::new();
        media.expect_overlay()
            .withf(|r| r.hwaccel.as_deref() != Some("amf"))
            .returning(|_| Err(SubdubError::Media("encoder failed".to_string())));
        media.expect_overlay()
            .withf(|r| r.hwaccel.as_deref() == Some("amf") && r.overlays[1].2 == -65)
            .times(1)
            .returning(|_| Ok(()));

        let output = workflow(media)
            .blend(&blend_options(temp.child("movie.mp4").path().to_path_buf(), None))
            .await
            .unwrap();
        assert_eq!(output, temp.child("movie_blended.mp4").path().to_path_buf());
    }

    #[tokio::test]
    async fn test_blend_with_explicit_accelerator_does_not_fall_back() {
        let temp = TempDir::new().unwrap();
        for name in ["movie.mp4", "movie_en.mp4", "movie_cn.mp4"] {
            temp.child(name).touch().unwrap();
        }

        let mut media = MockMediaProcessorTrait::new();
        media.expect_overlay()
            .times(1)
            .returning(|_| Err(SubdubError::Media("encoder failed".to_string())));

        let result = workflow(media)
            .blend(&blend_options(temp.child("movie.mp4").path().to_path_buf(), Some("cuda".to_string())))
            .await;
        assert!(matches!(result, Err(SubdubError::Media(_))));
    }

    #[tokio::test]
    async fn test_blend_missing_overlay() {
        let temp = TempDir::new().unwrap();
        temp.child("movie.mp4").touch().unwrap();

        let result = workflow(MockMediaProcessorTrait::new())
            .blend(&blend_options(temp.child("movie.mp4").path().to_path_buf(), None))
            .await;
        assert!(matches!(result, Err(SubdubError::FileNotFound(ref p)) if p.ends_with("movie_en.mp4")));
    }

    #[tokio::test]
    async fn test_covers_use_detected_stream() {
        let temp = TempDir::new().unwrap();
        temp.child("season/ep1.mp4").touch().unwrap();
        temp.child("ep2.MP4").touch().unwrap();
        let out = temp.child("covers");

        let mut media = MockMediaProcessorTrait::new();
        media.expect_detect_cover_stream()
            .returning(|path| Ok(path.ends_with("ep1.mp4").then(|| "0:2".to_string())));
        media.expect_extract_cover()
            .withf(|input, output, map, size| {
                let expected = if input.ends_with("ep1.mp4") { Some("0:2".to_string()) } else { None };
                output.extension().unwrap() == "jpg" && *map == expected && *size == Some((1920, 1080))
            })
            .times(2)
            .returning(|input, _, _, _| Ok(input.ends_with("ep1.mp4")));

        let options = CoverOptions {
            map: None,
            detect_map: true,
            min_size: Some((1920, 1080)),
        };
        let report = workflow(media)
            .extract_covers(temp.path(), Some(out.path()), &options)
            .await
            .unwrap();

        assert_eq!(report, BatchReport { succeeded: 1, skipped: 0, failed: 1 });
    }

    #[test]
    fn test_list_files_depth() {
        let temp = TempDir::new().unwrap();
        temp.child("b.srt").touch().unwrap();
        temp.child("a.srt").touch().unwrap();
        temp.child("nested/c.srt").touch().unwrap();

        let flat = list_files(temp.path(), false, |n| n.ends_with(".srt"));
        assert_eq!(flat, vec![temp.child("a.srt").path().to_path_buf(), temp.child("b.srt").path().to_path_buf()]);
        assert_eq!(list_files(temp.path(), true, |n| n.ends_with(".srt")).len(), 3);
    }
}
