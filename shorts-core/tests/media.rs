mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use shorts_core::{
    ClipGenerator, Frame, KeyframeGenerator, NarrationGenerator, Quality, RunDirectory, Script,
    VideoSection,
};
use support::FakeMedia;
use tempfile::{tempdir, TempDir};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn script() -> Script {
    serde_json::from_value(json!({
        "scenes": [
            {"visual_prompt": "terminal with glowing cursor", "text_overlay": "one"},
            {"visual_prompt": "broken render of a server rack", "text_overlay": "two"},
            {
                "visual_prompt": "rust crab on a keyboard",
                "veo_prompt": "crab types furiously",
                "text_overlay": "three"
            }
        ],
        "narration": {"hook": "Stop.", "main": "Rust just shipped.", "cta": "Follow."},
        "subtitles": []
    }))
    .unwrap()
}

fn run_dir() -> (TempDir, RunDirectory) {
    let tmp = tempdir().unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
    let run = RunDirectory::create(tmp.path(), date, "media").unwrap();
    (tmp, run)
}

fn failing(markers: &[&str]) -> FakeMedia {
    FakeMedia {
        failing: markers.iter().map(|marker| marker.to_string()).collect(),
        ..FakeMedia::default()
    }
}

async fn frames(media: Arc<FakeMedia>, run: &RunDirectory) -> Vec<Frame> {
    KeyframeGenerator::new(media).generate(&script(), run).await.unwrap()
}

#[tokio::test]
async fn failed_keyframes_are_skipped() {
    let (_tmp, run) = run_dir();
    let media = Arc::new(failing(&["broken"]));
    let frames = frames(media.clone(), &run).await;

    assert_eq!(media.images.load(Ordering::SeqCst), 3);
    let scenes: Vec<usize> = frames.iter().map(|frame| frame.scene).collect();
    assert_eq!(scenes, vec![1, 3]);
    assert!(run.frame_path(1).exists());
    assert!(!run.frame_path(2).exists());
    assert!(run.frame_path(3).exists());
    assert_eq!((frames[0].width, frames[0].height), (9, 16));

    let manifest: Vec<Frame> = run.read_json(&run.frames_manifest()).unwrap();
    assert_eq!(manifest, frames);
}

#[tokio::test]
async fn non_png_keyframes_are_stored_as_png() {
    let (_tmp, run) = run_dir();
    let media = Arc::new(FakeMedia {
        jpeg: true,
        ..FakeMedia::default()
    });
    let frames = frames(media, &run).await;
    assert_eq!(frames.len(), 3);
    let bytes = std::fs::read(run.frame_path(1)).unwrap();
    assert_eq!(bytes[..8], PNG_SIGNATURE);
}

#[tokio::test]
async fn every_keyframe_failing_leaves_empty_manifest() {
    let (_tmp, run) = run_dir();
    let media = Arc::new(failing(&["Content:"]));
    let frames = frames(media, &run).await;
    assert!(frames.is_empty());
    let manifest: Vec<Frame> = run.read_json(&run.frames_manifest()).unwrap();
    assert!(manifest.is_empty());
}

#[tokio::test(start_paused = true)]
async fn clips_keep_scene_indices_and_prompts() {
    let (_tmp, run) = run_dir();
    let media = Arc::new(FakeMedia {
        failing: vec!["broken".into()],
        pending_polls: 2,
        ..FakeMedia::default()
    });
    let frames = frames(media.clone(), &run).await;
    let generator = ClipGenerator::new(media.clone(), VideoSection::default(), Quality::Fast);

    let clips = generator.generate(&frames, &script(), &run).await;
    let scenes: Vec<usize> = clips.iter().map(|clip| clip.scene).collect();
    assert_eq!(scenes, vec![1, 3]);
    assert_eq!(clips[1].path, run.clip_path(3));
    assert!(run.clip_path(3).exists());

    let submissions = media.submissions();
    assert_eq!(submissions.len(), 2);
    assert!(submissions[0].prompt.contains("terminal with glowing cursor"));
    assert!(submissions[1].prompt.contains("crab types furiously"));
    assert_eq!(submissions[1].model, VideoSection::default().fast_model);
    assert_eq!(submissions[1].aspect_ratio, "9:16");
    assert_eq!(submissions[1].duration_seconds, 8);
    assert_eq!(submissions[1].image[..8], PNG_SIGNATURE);
}

#[tokio::test(start_paused = true)]
async fn full_quality_uses_full_model() {
    let (_tmp, run) = run_dir();
    let media = Arc::new(FakeMedia::default());
    let frames = frames(media.clone(), &run).await;
    let clips = ClipGenerator::new(media.clone(), VideoSection::default(), Quality::Full)
        .generate(&frames[..1], &script(), &run)
        .await;
    assert_eq!(clips.len(), 1);
    assert_eq!(media.submissions()[0].model, VideoSection::default().full_model);
}

#[tokio::test(start_paused = true)]
async fn rejected_submission_skips_only_that_scene() {
    let (_tmp, run) = run_dir();
    let keyframes = Arc::new(FakeMedia::default());
    let frames = frames(keyframes, &run).await;
    let media = Arc::new(failing(&["crab types"]));

    let clips = ClipGenerator::new(media, VideoSection::default(), Quality::Fast)
        .generate(&frames, &script(), &run)
        .await;
    let scenes: Vec<usize> = clips.iter().map(|clip| clip.scene).collect();
    assert_eq!(scenes, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn polling_gives_up_after_max_wait() {
    let (_tmp, run) = run_dir();
    let keyframes = Arc::new(FakeMedia::default());
    let frames = frames(keyframes, &run).await;
    let media = Arc::new(FakeMedia {
        never_finishes: true,
        ..FakeMedia::default()
    });

    let clips = ClipGenerator::new(media.clone(), VideoSection::default(), Quality::Fast)
        .generate(&frames[..1], &script(), &run)
        .await;
    assert!(clips.is_empty());
    // 10 s interval, 600 s bound.
    assert_eq!(media.polls.load(Ordering::SeqCst), 60);
    assert!(!run.clip_path(1).exists());
}

#[tokio::test]
async fn narration_is_written_as_wav() {
    let (_tmp, run) = run_dir();
    let media = Arc::new(FakeMedia::default());
    let asset = NarrationGenerator::new(media)
        .generate(&script(), &run)
        .await
        .unwrap();
    assert_eq!(asset.path, run.narration_file());
    assert_eq!(asset.duration_seconds, 45.0);

    let reader = hound::WavReader::open(&asset.path).unwrap();
    assert_eq!(reader.spec().sample_rate, 24_000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.duration(), 1_080_000);
}

#[tokio::test]
async fn narration_failure_is_soft() {
    let (_tmp, run) = run_dir();
    let media = Arc::new(FakeMedia {
        speech_bytes: None,
        ..FakeMedia::default()
    });
    assert!(NarrationGenerator::new(media).generate(&script(), &run).await.is_none());
    assert!(!run.narration_file().exists());

    let mut silent = script();
    silent.narration = Default::default();
    let media = Arc::new(FakeMedia::default());
    assert!(NarrationGenerator::new(media).generate(&silent, &run).await.is_none());
}
