use std::path::{Path, PathBuf};

// Image extensions picked up by default
pub const DEFAULT_IMG_FORMATS: &[&str] = &["jpeg", "jpg", "png", "tif", "bmp"];

// Video extensions picked up by default
pub const DEFAULT_VIDEO_FORMATS: &[&str] = &["mp4"];

// Name of the manifest written at the dataset root
pub const MANIFEST_FILE_NAME: &str = "custom_dataset.yaml";

// Stratification key for annotation files without any object line
pub const BACKGROUND_KEY: &str = "background";

/// An image and its annotation file, joined on their shared stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub stem: String,
    pub image: PathBuf,
    pub label: PathBuf,
}

/// The two halves of a split. Each half is sorted by stem.
#[derive(Debug, Clone, Default)]
pub struct SplitData {
    pub train: Vec<Sample>,
    pub valid: Vec<Sample>,
}

impl SplitData {
    pub fn train_images(&self) -> Vec<&Path> {
        self.train.iter().map(|s| s.image.as_path()).collect()
    }

    pub fn train_labels(&self) -> Vec<&Path> {
        self.train.iter().map(|s| s.label.as_path()).collect()
    }

    pub fn valid_images(&self) -> Vec<&Path> {
        self.valid.iter().map(|s| s.image.as_path()).collect()
    }

    pub fn valid_labels(&self) -> Vec<&Path> {
        self.valid.iter().map(|s| s.label.as_path()).collect()
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.valid.is_empty()
    }
}

// Paths of the dataset tree for the train/valid splits
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub train_dir: PathBuf,
    pub valid_dir: PathBuf,
    pub train_images_dir: PathBuf,
    pub train_labels_dir: PathBuf,
    pub valid_images_dir: PathBuf,
    pub valid_labels_dir: PathBuf,
}

impl OutputDirs {
    pub fn new(root: &Path) -> Self {
        let train_dir = root.join("train");
        let valid_dir = root.join("valid");
        Self {
            root: root.to_path_buf(),
            train_images_dir: train_dir.join("images"),
            train_labels_dir: train_dir.join("labels"),
            valid_images_dir: valid_dir.join("images"),
            valid_labels_dir: valid_dir.join("labels"),
            train_dir,
            valid_dir,
        }
    }

    pub fn leaf_dirs(&self) -> [&Path; 4] {
        [
            &self.train_images_dir,
            &self.train_labels_dir,
            &self.valid_images_dir,
            &self.valid_labels_dir,
        ]
    }
}

// Counters collected over one run
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub images_discovered: usize,
    pub videos_processed: usize,
    pub frames_extracted: usize,
    pub labels_discovered: usize,
    pub unmatched_images: usize,
    pub unmatched_labels: usize,
    pub duplicate_stems: usize,
    pub train_samples: usize,
    pub valid_samples: usize,
    pub files_copied: usize,
    pub files_unchanged: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Images discovered: {}", self.images_discovered);
        log::info!(
            "Videos processed: {} ({} frames extracted)",
            self.videos_processed,
            self.frames_extracted
        );
        log::info!("Annotation files discovered: {}", self.labels_discovered);
        log::info!(
            "Samples: {} train, {} valid",
            self.train_samples,
            self.valid_samples
        );
        log::info!(
            "Files copied: {} (already up to date: {})",
            self.files_copied,
            self.files_unchanged
        );

        let total_dropped = self.unmatched_images + self.unmatched_labels + self.duplicate_stems;
        if total_dropped > 0 {
            log::warn!(
                "Total dropped files: {} (image without label: {}, label without image: {}, duplicate stem: {})",
                total_dropped,
                self.unmatched_images,
                self.unmatched_labels,
                self.duplicate_stems
            );
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PrepareReport {
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub stats: ProcessingStats,
}
