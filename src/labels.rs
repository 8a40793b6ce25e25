use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{PrepareError, Result};
use crate::types::{Sample, BACKGROUND_KEY};

/// Class identifiers of every object line in an annotation text.
///
/// The class identifier is the first whitespace-separated token. Blank lines are skipped.
pub fn parse_class_ids(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Read an annotation file and extract its class identifiers
pub fn read_class_ids(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| PrepareError::io(path, e))?;
    Ok(parse_class_ids(&content))
}

/// Reduce the classes of one sample to the single key used for stratification.
///
/// The most frequent class wins, ties go to the class that appears first. A sample
/// without objects maps to [`BACKGROUND_KEY`].
pub fn representative_label(class_ids: &[String]) -> String {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, id) in class_ids.iter().enumerate() {
        counts.entry(id.as_str()).or_insert((0, position)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(id, _)| id.to_string())
        .unwrap_or_else(|| BACKGROUND_KEY.to_string())
}

/// One stratification key per sample, in sample order
pub fn stratification_keys(samples: &[Sample]) -> Result<Vec<String>> {
    samples
        .iter()
        .map(|sample| read_class_ids(&sample.label).map(|ids| representative_label(&ids)))
        .collect()
}
