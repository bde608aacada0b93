//! End-to-end tests against the FFmpeg engine.
//!
//! Tests that need media require fixture files from
//! `tests/fixtures/generate_fixtures.sh` and return early when they are
//! missing.

use std::path::Path;
use std::time::Duration;

use framepeek::{
    DEFAULT_PROBE_BYTES, ExtractError, ExtractionRequest, FfmpegEngine, FfmpegLogLevel,
    FrameExtractor, ImageSink, LogSink, MediaEngine, MediaSession, OutputPattern, PixelFormat,
    ProbeBudget, ProbeLimits,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";
const SAMPLE_AUDIO_ONLY: &str = "tests/fixtures/sample_audio_only.mp4";

fn engine() -> FfmpegEngine {
    FfmpegEngine::new()
        .expect("Failed to initialize FFmpeg")
        .with_log_level(FfmpegLogLevel::Quiet)
}

#[test]
fn open_nonexistent_file() {
    let result = MediaSession::open(&engine(), "this_file_does_not_exist.mp4", ProbeBudget::default());

    let error = result.unwrap_err();
    assert!(matches!(error, ExtractError::InputOpen { .. }));
    assert!(error.engine_code().is_some_and(|code| code < 0));

    let message = error.to_string();
    assert!(
        message.contains("this_file_does_not_exist.mp4"),
        "Error message should name the input: {message}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let locator = invalid_file_path.to_string_lossy();
    let error = MediaSession::open(&engine(), &locator, ProbeBudget::default()).unwrap_err();
    assert!(
        matches!(
            error,
            ExtractError::InputOpen { .. } | ExtractError::StreamProbe { .. }
        ),
        "unexpected error: {error:?}",
    );
}

#[test]
fn extract_cli_style_failure_has_nonzero_exit() {
    let extractor = FrameExtractor::new(engine());
    let request = ExtractionRequest::new(
        "this_file_does_not_exist.mp4",
        OutputPattern::parse("frame_%d.png").expect("valid pattern"),
        1,
    );

    let result = extractor.extract(&request, &mut LogSink);
    assert!(!result.is_success());
    assert_ne!(result.exit_code(), 0);
}

#[test]
fn session_decodes_first_frame() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let engine = engine();
    let mut session = MediaSession::open(&engine, SAMPLE_VIDEO, ProbeBudget::default())
        .expect("Failed to open test video");
    assert_eq!(
        session.video_stream().map(|stream| stream.index),
        Some(0),
        "fixture has video on stream 0",
    );

    let frame = session
        .next_frame()
        .expect("Failed to decode")
        .expect("expected a frame");
    assert_eq!(frame.sequence_index(), 0);
    assert!(frame.pixels().width() > 0);
    assert!(frame.pixels().height() > 0);

    session.close();
    assert!(!session.is_open());
}

#[test]
fn extract_writes_numbered_images() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let pattern = temporary_directory.path().join("frame_%03d.png");
    let request = ExtractionRequest::new(
        SAMPLE_VIDEO,
        OutputPattern::parse(&pattern.to_string_lossy()).expect("valid pattern"),
        3,
    );

    let result = FrameExtractor::new(engine()).extract(&request, &mut ImageSink::new());

    assert!(result.error().is_none(), "unexpected error: {:?}", result.error());
    assert_eq!(result.frames_extracted(), 3);
    for (index, path) in result.output_paths().iter().enumerate() {
        let expected = temporary_directory.path().join(format!("frame_{index:03}.png"));
        assert_eq!(path, &expected);

        let image = image::open(path).expect("Failed to read written frame");
        assert!(image.width() > 0 && image.height() > 0);
    }
}

#[test]
fn extract_grayscale_images() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let pattern = temporary_directory.path().join("gray_%d.png");
    let request = ExtractionRequest::new(
        SAMPLE_VIDEO,
        OutputPattern::parse(&pattern.to_string_lossy()).expect("valid pattern"),
        1,
    );
    let mut sink = ImageSink::new().pixel_format(PixelFormat::Gray8);

    let result = FrameExtractor::new(engine()).extract(&request, &mut sink);
    assert_eq!(result.frames_extracted(), 1);

    let image = image::open(&result.output_paths()[0]).expect("Failed to read written frame");
    assert_eq!(image.color(), image::ColorType::L8);
}

#[test]
fn existing_outputs_are_not_overwritten() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let pattern = temporary_directory.path().join("frame_%d.png");
    let request = ExtractionRequest::new(
        SAMPLE_VIDEO,
        OutputPattern::parse(&pattern.to_string_lossy()).expect("valid pattern"),
        1,
    );
    let extractor = FrameExtractor::new(engine());

    let first = extractor.extract(&request, &mut ImageSink::new());
    assert_eq!(first.frames_extracted(), 1);

    let second = extractor.extract(&request, &mut ImageSink::new());
    assert!(!second.is_success());
    assert!(matches!(second.error(), Some(ExtractError::Persist { frame_index: 0, .. })));

    let third = extractor.extract(&request, &mut ImageSink::new().overwrite(true));
    assert_eq!(third.frames_extracted(), 1);
}

#[test]
fn dry_run_writes_nothing() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let pattern = temporary_directory.path().join("frame_%d.png");
    let request = ExtractionRequest::new(
        SAMPLE_VIDEO,
        OutputPattern::parse(&pattern.to_string_lossy()).expect("valid pattern"),
        2,
    );

    let result = FrameExtractor::new(engine()).extract(&request, &mut LogSink);

    assert_eq!(result.frames_extracted(), 2);
    for path in result.output_paths() {
        assert!(!path.exists(), "{} should not exist", path.display());
    }
}

#[test]
fn small_probe_budget_still_opens_local_file() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let budget = ProbeBudget::default().with_probe_bytes(32 * 1024);
    let mut session =
        MediaSession::open(&engine(), SAMPLE_VIDEO, budget).expect("Failed to open test video");
    assert!(session.next_frame().expect("Failed to decode").is_some());
}

#[test]
fn probe_budget_is_written_to_the_format_context() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let budget = ProbeBudget::default()
        .with_probe_bytes(48 * 1024)
        .with_analyze_duration(Duration::from_millis(200));
    let input = engine()
        .open_input(SAMPLE_VIDEO, &budget)
        .expect("Failed to open test video");

    assert_eq!(
        input.probe_limits(),
        ProbeLimits {
            format_probe_bytes: 48 * 1024,
            probe_bytes: 48 * 1024,
            analyze_duration_micros: 200_000,
        }
    );
}

#[test]
fn default_budget_bounds_container_detection() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let input = engine()
        .open_input(SAMPLE_VIDEO, &ProbeBudget::default())
        .expect("Failed to open test video");

    let limits = input.probe_limits();
    assert_eq!(limits.format_probe_bytes as u64, DEFAULT_PROBE_BYTES);
    assert_eq!(limits.probe_bytes as u64, DEFAULT_PROBE_BYTES);
    assert_eq!(limits.analyze_duration_micros, 1_000_000);
}

#[test]
fn audio_only_file_has_no_video_stream() {
    if !Path::new(SAMPLE_AUDIO_ONLY).exists() {
        return;
    }

    let error = MediaSession::open(&engine(), SAMPLE_AUDIO_ONLY, ProbeBudget::default()).unwrap_err();
    assert!(matches!(error, ExtractError::NoVideoStream { .. }));
    assert_eq!(error.exit_code(), 1);
}
