use log::info;
use std::path::{Path, PathBuf};

use crate::error::{PrepareError, Result};
use crate::types::{OutputDirs, ProcessingStats, Sample, SplitData};
use crate::utils::{copy_if_changed, create_output_directory, create_progress_bar};

/// Set up the `train|valid` x `images|labels` tree under `root`.
///
/// Directories that already exist are reused.
pub fn setup_output_directories(root: &Path) -> Result<OutputDirs> {
    let output_dirs = OutputDirs::new(root);
    for dir in output_dirs.leaf_dirs() {
        create_output_directory(dir)?;
    }
    Ok(output_dirs)
}

/// Copy the image and annotation of every sample into the leaf directories of one split.
///
/// File names are kept. The first failing copy aborts the batch.
pub fn copy_samples(
    samples: &[Sample],
    images_dir: &Path,
    labels_dir: &Path,
    label: &str,
    stats: &mut ProcessingStats,
) -> Result<()> {
    let pb = create_progress_bar(samples.len() as u64, label);
    for sample in samples {
        for (src, dst_dir) in [(&sample.image, images_dir), (&sample.label, labels_dir)] {
            let dst = destination(src, dst_dir)?;
            if copy_if_changed(src, &dst)? {
                stats.files_copied += 1;
            } else {
                stats.files_unchanged += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} copy complete", label));
    Ok(())
}

/// Copy both halves of a split into the dataset tree
pub fn copy_split(
    split: &SplitData,
    output_dirs: &OutputDirs,
    stats: &mut ProcessingStats,
) -> Result<()> {
    info!("Copying {} train samples...", split.train.len());
    copy_samples(
        &split.train,
        &output_dirs.train_images_dir,
        &output_dirs.train_labels_dir,
        "Train",
        stats,
    )?;
    info!("Copying {} valid samples...", split.valid.len());
    copy_samples(
        &split.valid,
        &output_dirs.valid_images_dir,
        &output_dirs.valid_labels_dir,
        "Valid",
        stats,
    )?;
    Ok(())
}

fn destination(src: &Path, dst_dir: &Path) -> Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| {
        PrepareError::io(
            src,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    Ok(dst_dir.join(name))
}
