use log::{info, warn};

use crate::config::{InputSources, PrepareConfig};
use crate::error::Result;
use crate::io::{copy_split, setup_output_directories};
use crate::labels::stratification_keys;
use crate::manifest::{create_dataset_yaml, read_class_names};
use crate::pairing::resolve_pairs;
use crate::split::stratified_split;
use crate::types::{PrepareReport, ProcessingStats};
use crate::utils::collect_files_with_extensions;
use crate::video::{extract_video_frames, FfmpegBackend, FrameWorkspace, VideoBackend};

/// Main dataset preparation pipeline, decoding videos with ffmpeg
pub fn process_dataset(sources: &InputSources, config: &PrepareConfig) -> Result<PrepareReport> {
    process_dataset_with_backend(sources, config, &FfmpegBackend::default())
}

/// Main dataset preparation pipeline with a caller-supplied video backend.
///
/// Nothing is written under the output directory until pairing and splitting succeeded.
/// Extracted frames live in a scoped workspace that is removed on every exit path.
pub fn process_dataset_with_backend(
    sources: &InputSources,
    config: &PrepareConfig,
    backend: &dyn VideoBackend,
) -> Result<PrepareReport> {
    config.validate()?;
    let mut stats = ProcessingStats::new();

    let class_names = read_class_names(sources.classes_file())?;
    info!("Loaded {} class name(s).", class_names.len());

    let mut images = Vec::new();
    if let Some(images_dir) = sources.images_dir() {
        images = collect_files_with_extensions(images_dir, &config.img_formats)?;
        stats.images_discovered = images.len();
        info!("Found {} image(s) in {:?}", images.len(), images_dir);
    }

    // Held until the copies are done, dropped (and removed) on any early return
    let mut workspace = None;
    if let Some(videos_dir) = sources.videos_dir() {
        let frames_workspace = FrameWorkspace::create(config.frames_dir.as_deref())?;
        let (frames, videos) = extract_video_frames(
            backend,
            videos_dir,
            &config.video_formats,
            config.frame_rate,
            &frames_workspace,
        )?;
        stats.videos_processed = videos;
        stats.frames_extracted = frames.len();
        images.extend(frames);
        workspace = Some(frames_workspace);
    }

    let labels = collect_files_with_extensions(sources.labels_dir(), &["txt".to_string()])?;
    stats.labels_discovered = labels.len();
    info!("Found {} annotation file(s).", labels.len());

    let pairs = resolve_pairs(&images, &labels)?;
    stats.unmatched_images = pairs.unmatched_images.len();
    stats.unmatched_labels = pairs.unmatched_labels.len();
    stats.duplicate_stems = pairs.duplicates.len();
    info!("Matched {} image/annotation pair(s).", pairs.samples.len());

    let keys = stratification_keys(&pairs.samples)?;
    let split = stratified_split(
        pairs.samples,
        &keys,
        config.val_size,
        config.seed,
        config.split_policy,
    )?;
    stats.train_samples = split.train.len();
    stats.valid_samples = split.valid.len();

    let output_dirs = setup_output_directories(&config.output_dir)?;
    copy_split(&split, &output_dirs, &mut stats)?;

    info!("Creating dataset yaml file...");
    let manifest_path = create_dataset_yaml(&output_dirs, &class_names)?;

    if let Some(workspace) = workspace {
        if let Err(e) = workspace.close() {
            warn!("Failed to remove extracted frames: {}", e);
        }
    }

    stats.print_summary();
    info!("Preprocessing complete. Dataset ready at: {:?}", output_dirs.root);
    info!("YAML file created at: {:?}", manifest_path);

    Ok(PrepareReport {
        output_dir: output_dirs.root,
        manifest_path,
        stats,
    })
}
