use image::{Rgb, RgbImage};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use media2yolo::pairing::resolve_pairs;
use media2yolo::utils::collect_files_with_extensions;
use media2yolo::video::extract_video_frames;
use media2yolo::{
    process_dataset_with_backend, FfmpegBackend, FrameWorkspace, InputSources, PrepareConfig,
    PrepareError, Result, VideoBackend, VideoDecoder,
};

struct SyntheticDecoder {
    fps: f64,
    remaining: u64,
}

impl VideoDecoder for SyntheticDecoder {
    fn native_fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(RgbImage::from_pixel(8, 8, Rgb([200, 40, 90]))))
    }
}

/// Every video is `seconds` long at `fps`
struct SyntheticBackend {
    fps: f64,
    seconds: u64,
}

impl VideoBackend for SyntheticBackend {
    fn open(&self, _path: &Path) -> Result<Option<Box<dyn VideoDecoder>>> {
        Ok(Some(Box::new(SyntheticDecoder {
            fps: self.fps,
            remaining: (self.fps as u64) * self.seconds,
        })))
    }
}

/// Rejects every video like a file without a readable stream
struct UnreadableBackend;

impl VideoBackend for UnreadableBackend {
    fn open(&self, _path: &Path) -> Result<Option<Box<dyn VideoDecoder>>> {
        Ok(None)
    }
}

struct Fixture {
    _root: tempfile::TempDir,
    images: PathBuf,
    labels: PathBuf,
    videos: PathBuf,
    classes: PathBuf,
    output: PathBuf,
    frames_parent: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().to_path_buf();
        let fixture = Self {
            images: base.join("images"),
            labels: base.join("labels"),
            videos: base.join("videos"),
            classes: base.join("classes.txt"),
            output: base.join("dataset_yolo"),
            frames_parent: base.join("scratch"),
            _root: root,
        };
        fs::create_dir_all(&fixture.images).unwrap();
        fs::create_dir_all(&fixture.labels).unwrap();
        fs::create_dir_all(&fixture.videos).unwrap();
        fs::write(&fixture.classes, "bud\nflower\n").unwrap();
        fixture
    }

    fn add_image(&self, name: &str) {
        fs::write(self.images.join(name), format!("fake image {}", name)).unwrap();
    }

    fn add_label(&self, stem: &str, class_id: u32) {
        fs::write(
            self.labels.join(format!("{}.txt", stem)),
            format!("{} 0.5 0.5 0.25 0.25\n", class_id),
        )
        .unwrap();
    }

    fn config(&self) -> PrepareConfig {
        PrepareConfig {
            frames_dir: Some(self.frames_parent.clone()),
            ..PrepareConfig::with_output_dir(self.output.clone())
        }
    }

    fn image_sources(&self) -> InputSources {
        InputSources::new(
            Some(self.images.clone()),
            None,
            self.labels.clone(),
            self.classes.clone(),
        )
        .unwrap()
    }
}

fn list_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn first_class(label: &Path) -> String {
    fs::read_to_string(label)
        .unwrap()
        .split_whitespace()
        .next()
        .unwrap()
        .to_string()
}

#[test]
fn test_resolve_pairs_drops_unmatched_image() {
    let images = vec![PathBuf::from("imgs/b.jpg"), PathBuf::from("imgs/a.jpg")];
    let labels = vec![PathBuf::from("txts/a.txt")];

    let pairs = resolve_pairs(&images, &labels).unwrap();
    assert_eq!(pairs.images(), vec![PathBuf::from("imgs/a.jpg")]);
    assert_eq!(pairs.labels(), vec![PathBuf::from("txts/a.txt")]);
    assert_eq!(pairs.unmatched_images, vec![PathBuf::from("imgs/b.jpg")]);
}

#[test]
fn test_resolve_pairs_is_symmetric_and_sorted() {
    let images = vec![
        PathBuf::from("i/c.png"),
        PathBuf::from("i/a.jpg"),
        PathBuf::from("i/b.jpg"),
    ];
    let labels = vec![
        PathBuf::from("l/b.txt"),
        PathBuf::from("l/d.txt"),
        PathBuf::from("l/c.txt"),
    ];

    let pairs = resolve_pairs(&images, &labels).unwrap();
    let stems: Vec<&str> = pairs.samples.iter().map(|s| s.stem.as_str()).collect();
    assert_eq!(stems, vec!["b", "c"]);
    assert_eq!(pairs.unmatched_images, vec![PathBuf::from("i/a.jpg")]);
    assert_eq!(pairs.unmatched_labels, vec![PathBuf::from("l/d.txt")]);
}

#[test]
fn test_resolve_pairs_keeps_first_duplicate_stem() {
    let images = vec![PathBuf::from("i/a.jpg"), PathBuf::from("i/a.png")];
    let labels = vec![PathBuf::from("l/a.txt")];

    let pairs = resolve_pairs(&images, &labels).unwrap();
    assert_eq!(pairs.images(), vec![PathBuf::from("i/a.jpg")]);
    assert_eq!(pairs.duplicates, vec![PathBuf::from("i/a.png")]);
}

#[test]
fn test_resolve_pairs_without_match_fails() {
    let images = vec![PathBuf::from("i/a.jpg")];
    let labels = vec![PathBuf::from("l/b.txt")];
    assert!(matches!(
        resolve_pairs(&images, &labels),
        Err(PrepareError::NoPairs)
    ));
}

#[test]
fn test_collect_files_matches_extensions_case_insensitively() {
    let fixture = Fixture::new();
    fixture.add_image("a.jpg");
    fixture.add_image("b.PNG");
    fixture.add_image("notes.md");

    let found =
        collect_files_with_extensions(&fixture.images, &["jpg".to_string(), "png".to_string()])
            .unwrap();
    let names: Vec<String> = found
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.jpg", "b.PNG"]);
}

#[test]
fn test_images_pipeline_builds_layout_and_manifest() {
    let fixture = Fixture::new();
    for i in 0..10 {
        let stem = format!("sample{}", i);
        fixture.add_image(&format!("{}.jpg", stem));
        fixture.add_label(&stem, if i < 3 { 0 } else { 1 });
    }
    fixture.add_image("orphan.jpg");

    let report = process_dataset_with_backend(
        &fixture.image_sources(),
        &fixture.config(),
        &SyntheticBackend {
            fps: 30.0,
            seconds: 1,
        },
    )
    .unwrap();

    let out = &fixture.output;
    let train_images = list_names(&out.join("train/images"));
    let valid_images = list_names(&out.join("valid/images"));
    let valid_labels = list_names(&out.join("valid/labels"));
    assert_eq!(train_images.len(), 8);
    assert_eq!(valid_images.len(), 2);
    assert_eq!(list_names(&out.join("train/labels")).len(), 8);
    assert!(!train_images.contains(&"orphan.jpg".to_string()));

    // 3:7 classes over 2 valid slots give one of each
    let mut valid_classes: Vec<String> = valid_labels
        .iter()
        .map(|name| first_class(&out.join("valid/labels").join(name)))
        .collect();
    valid_classes.sort();
    assert_eq!(valid_classes, vec!["0", "1"]);

    // Sources are copied, not moved
    assert!(fixture.images.join("sample0.jpg").exists());
    assert!(fixture.labels.join("sample0.txt").exists());

    let manifest = fs::read_to_string(&report.manifest_path).unwrap();
    assert_eq!(report.manifest_path, out.join("custom_dataset.yaml"));
    assert!(manifest.contains("names: [\"bud\", \"flower\"]\n"));
    assert!(manifest.contains("nc: 2\n"));
    let train_root = fs::canonicalize(out.join("train")).unwrap();
    assert!(manifest.contains(&format!("train: \"{}\"", train_root.display())));
    assert!(manifest.contains("val: "));

    assert_eq!(report.stats.train_samples, 8);
    assert_eq!(report.stats.valid_samples, 2);
    assert_eq!(report.stats.unmatched_images, 1);
    assert_eq!(report.stats.files_copied, 20);
}

#[test]
fn test_rerun_is_idempotent() {
    let fixture = Fixture::new();
    for i in 0..6 {
        let stem = format!("s{}", i);
        fixture.add_image(&format!("{}.png", stem));
        fixture.add_label(&stem, (i % 2) as u32);
    }
    let backend = SyntheticBackend {
        fps: 30.0,
        seconds: 1,
    };

    let first =
        process_dataset_with_backend(&fixture.image_sources(), &fixture.config(), &backend)
            .unwrap();
    let valid_after_first = list_names(&fixture.output.join("valid/images"));
    let second =
        process_dataset_with_backend(&fixture.image_sources(), &fixture.config(), &backend)
            .unwrap();

    assert_eq!(first.stats.files_copied, 12);
    assert_eq!(second.stats.files_copied, 0);
    assert_eq!(second.stats.files_unchanged, 12);
    assert_eq!(valid_after_first.len(), 2);
    assert_eq!(
        list_names(&fixture.output.join("valid/images")),
        valid_after_first
    );
}

#[test]
fn test_video_pipeline_samples_frames_and_cleans_up() {
    let fixture = Fixture::new();
    fs::write(fixture.videos.join("orchard.mp4"), b"not decoded by the fake").unwrap();
    for i in 0..5 {
        fixture.add_label(&format!("orchard_frame_{}", i), (i % 2) as u32);
    }
    let sources = InputSources::new(
        None,
        Some(fixture.videos.clone()),
        fixture.labels.clone(),
        fixture.classes.clone(),
    )
    .unwrap();

    let report = process_dataset_with_backend(
        &sources,
        &fixture.config(),
        &SyntheticBackend {
            fps: 30.0,
            seconds: 5,
        },
    )
    .unwrap();

    assert_eq!(report.stats.videos_processed, 1);
    assert_eq!(report.stats.frames_extracted, 5);
    let mut images = list_names(&fixture.output.join("train/images"));
    images.extend(list_names(&fixture.output.join("valid/images")));
    images.sort();
    assert_eq!(
        images,
        (0..5)
            .map(|i| format!("orchard_frame_{}.jpg", i))
            .collect::<Vec<_>>()
    );

    // The scoped frame workspace is gone
    assert!(list_names(&fixture.frames_parent).is_empty());
}

#[test]
fn test_no_pairs_writes_nothing_and_cleans_up() {
    let fixture = Fixture::new();
    fs::write(fixture.videos.join("field.mp4"), b"fake").unwrap();
    fixture.add_image("a.jpg");
    fixture.add_label("unrelated", 0);
    let sources = InputSources::new(
        Some(fixture.images.clone()),
        Some(fixture.videos.clone()),
        fixture.labels.clone(),
        fixture.classes.clone(),
    )
    .unwrap();

    let result = process_dataset_with_backend(
        &sources,
        &fixture.config(),
        &SyntheticBackend {
            fps: 10.0,
            seconds: 2,
        },
    );

    assert!(matches!(result, Err(PrepareError::NoPairs)));
    assert!(!fixture.output.exists());
    assert!(list_names(&fixture.frames_parent).is_empty());
}

#[test]
fn test_missing_classes_file_is_io_error() {
    let fixture = Fixture::new();
    fixture.add_image("a.jpg");
    fixture.add_label("a", 0);
    fs::remove_file(&fixture.classes).unwrap();

    let result = process_dataset_with_backend(
        &fixture.image_sources(),
        &fixture.config(),
        &SyntheticBackend {
            fps: 30.0,
            seconds: 1,
        },
    );
    assert!(matches!(result, Err(PrepareError::Io { .. })));
    assert!(!fixture.output.exists());
}

#[test]
fn test_config_error_before_any_io() {
    let fixture = Fixture::new();
    let result = InputSources::new(None, None, fixture.labels.clone(), fixture.classes.clone());
    assert!(matches!(result, Err(PrepareError::Config(_))));
    assert!(!fixture.output.exists());
    assert!(!fixture.frames_parent.exists());
}

#[test]
fn test_frame_names_stay_distinct_across_videos() {
    let fixture = Fixture::new();
    fs::write(fixture.videos.join("ab.mp4"), b"fake").unwrap();
    fs::write(fixture.videos.join("a:b.mp4"), b"fake").unwrap();
    let workspace = FrameWorkspace::create(Some(&fixture.frames_parent)).unwrap();

    let (frames, videos) = extract_video_frames(
        &SyntheticBackend {
            fps: 1.0,
            seconds: 2,
        },
        &fixture.videos,
        &["mp4".to_string()],
        1,
        &workspace,
    )
    .unwrap();

    assert_eq!(videos, 2);
    assert_eq!(frames.len(), 4);
    let distinct: HashSet<&PathBuf> = frames.iter().collect();
    assert_eq!(distinct.len(), 4);
    assert_eq!(
        list_names(workspace.path()),
        vec![
            "a:b_frame_0.jpg",
            "a:b_frame_1.jpg",
            "ab_frame_0.jpg",
            "ab_frame_1.jpg"
        ]
    );
}

#[test]
fn test_unopenable_video_yields_no_frames() {
    let fixture = Fixture::new();
    fs::write(fixture.videos.join("broken.mp4"), b"not a video").unwrap();
    for i in 0..4 {
        let stem = format!("s{}", i);
        fixture.add_image(&format!("{}.jpg", stem));
        fixture.add_label(&stem, (i % 2) as u32);
    }
    let sources = InputSources::new(
        Some(fixture.images.clone()),
        Some(fixture.videos.clone()),
        fixture.labels.clone(),
        fixture.classes.clone(),
    )
    .unwrap();

    let report =
        process_dataset_with_backend(&sources, &fixture.config(), &UnreadableBackend).unwrap();

    assert_eq!(report.stats.videos_processed, 1);
    assert_eq!(report.stats.frames_extracted, 0);
    assert_eq!(report.stats.train_samples + report.stats.valid_samples, 4);
    assert!(report.manifest_path.exists());
    assert!(list_names(&fixture.frames_parent).is_empty());
}

#[test]
fn test_failed_copy_aborts_with_destination_path() {
    let fixture = Fixture::new();
    for i in 0..4 {
        let stem = format!("s{}", i);
        fixture.add_image(&format!("{}.jpg", stem));
        fixture.add_label(&stem, (i % 2) as u32);
    }
    // A directory squatting on the destination name makes the copy fail on either side
    for split in ["train", "valid"] {
        fs::create_dir_all(fixture.output.join(split).join("images").join("s0.jpg")).unwrap();
    }

    let result = process_dataset_with_backend(
        &fixture.image_sources(),
        &fixture.config(),
        &SyntheticBackend {
            fps: 30.0,
            seconds: 1,
        },
    );

    match result {
        Err(PrepareError::Io { path, .. }) => {
            assert_eq!(path.file_name().unwrap(), "s0.jpg");
            assert!(path.starts_with(&fixture.output));
        }
        other => panic!("expected an io error, got {:?}", other.map(|r| r.output_dir)),
    }
    assert!(!fixture.output.join("custom_dataset.yaml").exists());
}

#[test]
fn test_ffmpeg_backend_without_executables_is_decode_error() {
    let fixture = Fixture::new();
    let video = fixture.videos.join("clip.mp4");
    fs::write(&video, b"fake").unwrap();
    let backend = FfmpegBackend {
        ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
        ffprobe: PathBuf::from("/nonexistent/ffprobe"),
    };

    assert!(matches!(
        backend.open(&video),
        Err(PrepareError::Decode { .. })
    ));
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn test_ffmpeg_exit_status_decides_end_of_stream() {
    let fixture = Fixture::new();
    let bin = fixture.frames_parent.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let video = fixture.videos.join("clip.mp4");
    fs::write(&video, b"fake").unwrap();

    // One 2x2 rgb24 frame is 12 bytes
    let ffprobe = write_script(
        &bin,
        "ffprobe",
        r#"echo '{"streams":[{"width":2,"height":2,"avg_frame_rate":"5/1","nb_frames":"1"}]}'"#,
    );
    let clean = write_script(&bin, "ffmpeg_ok", "printf 'abcdefghijkl'");
    let failing = write_script(&bin, "ffmpeg_fail", "printf 'abcdefghijkl'\nexit 1");

    let backend = FfmpegBackend {
        ffmpeg: clean,
        ffprobe: ffprobe.clone(),
    };
    let mut decoder = backend.open(&video).unwrap().unwrap();
    assert_eq!(decoder.native_fps(), 5.0);
    assert_eq!(decoder.frame_count_hint(), Some(1));
    let frame = decoder.next_frame().unwrap().unwrap();
    assert_eq!(frame.dimensions(), (2, 2));
    assert!(decoder.next_frame().unwrap().is_none());

    let backend = FfmpegBackend {
        ffmpeg: failing,
        ffprobe,
    };
    let mut decoder = backend.open(&video).unwrap().unwrap();
    assert!(decoder.next_frame().unwrap().is_some());
    assert!(matches!(
        decoder.next_frame(),
        Err(PrepareError::Decode { .. })
    ));
}
