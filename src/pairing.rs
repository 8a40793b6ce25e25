use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{PrepareError, Result};
use crate::types::Sample;
use crate::utils::file_stem;

/// Outcome of joining images with annotation files on their stem
#[derive(Debug, Clone, Default)]
pub struct ResolvedPairs {
    /// Matched samples, sorted by stem
    pub samples: Vec<Sample>,
    pub unmatched_images: Vec<PathBuf>,
    pub unmatched_labels: Vec<PathBuf>,
    /// Files dropped because an earlier file already claimed their stem
    pub duplicates: Vec<PathBuf>,
}

impl ResolvedPairs {
    pub fn images(&self) -> Vec<PathBuf> {
        self.samples.iter().map(|s| s.image.clone()).collect()
    }

    pub fn labels(&self) -> Vec<PathBuf> {
        self.samples.iter().map(|s| s.label.clone()).collect()
    }
}

/// Keep only the images and annotation files whose stems appear on both sides.
///
/// The first file seen for a stem wins on each side. Fails with [`PrepareError::NoPairs`]
/// when nothing matches.
pub fn resolve_pairs(images: &[PathBuf], labels: &[PathBuf]) -> Result<ResolvedPairs> {
    let mut resolved = ResolvedPairs::default();

    let images_by_stem = index_by_stem(images, &mut resolved.duplicates);
    let mut labels_by_stem = index_by_stem(labels, &mut resolved.duplicates);

    for (stem, image) in images_by_stem {
        match labels_by_stem.remove(&stem) {
            Some(label) => resolved.samples.push(Sample { stem, image, label }),
            None => {
                debug!("No annotation for image {:?}", image);
                resolved.unmatched_images.push(image);
            }
        }
    }
    for (_, label) in labels_by_stem {
        debug!("No image for annotation {:?}", label);
        resolved.unmatched_labels.push(label);
    }

    if !resolved.duplicates.is_empty() {
        warn!(
            "Ignored {} file(s) sharing a stem with an earlier file",
            resolved.duplicates.len()
        );
    }
    if resolved.samples.is_empty() {
        return Err(PrepareError::NoPairs);
    }
    Ok(resolved)
}

fn index_by_stem(paths: &[PathBuf], duplicates: &mut Vec<PathBuf>) -> BTreeMap<String, PathBuf> {
    let mut by_stem = BTreeMap::new();
    for path in paths {
        let Some(stem) = file_stem(path) else {
            continue;
        };
        if by_stem.contains_key(&stem) {
            warn!("Duplicate stem '{}': ignoring {:?}", stem, path);
            duplicates.push(path.clone());
        } else {
            by_stem.insert(stem, path.clone());
        }
    }
    by_stem
}
