use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::config::SplitPolicy;
use crate::error::{PrepareError, Result};
use crate::types::{Sample, SplitData};

// f32 fractions such as 0.2 are slightly above their decimal value
const FRACTION_EPSILON: f64 = 1e-6;

/// Size of the validation subset: `ceil(val_size * total)`, kept within `[1, total - 1]`.
pub fn validation_count(total: usize, val_size: f32) -> usize {
    if total < 2 {
        return 0;
    }
    let wanted = (total as f64 * f64::from(val_size) - FRACTION_EPSILON).ceil();
    (wanted.max(0.0) as usize).clamp(1, total - 1)
}

/// Split `samples` into train and valid subsets, keeping the share of each key.
///
/// `keys[i]` is the stratification key of `samples[i]`. The split only depends on
/// the samples, the keys, `val_size` and `seed`.
pub fn stratified_split(
    samples: Vec<Sample>,
    keys: &[String],
    val_size: f32,
    seed: u64,
    policy: SplitPolicy,
) -> Result<SplitData> {
    if samples.len() != keys.len() {
        return Err(PrepareError::Config(format!(
            "{} stratification keys given for {} samples",
            keys.len(),
            samples.len()
        )));
    }
    if samples.len() < 2 {
        return Err(PrepareError::TooFewSamples {
            found: samples.len(),
        });
    }

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, key) in keys.iter().enumerate() {
        groups.entry(key.as_str()).or_default().push(index);
    }

    let n_valid = validation_count(samples.len(), val_size);
    let mut rng = StdRng::seed_from_u64(seed);

    let undersized = groups
        .iter()
        .find(|(_, members)| members.len() < 2)
        .map(|(key, members)| (key.to_string(), members.len()));

    let valid_indices: Vec<usize> = match undersized {
        Some((key, count)) if policy == SplitPolicy::Strict => {
            return Err(PrepareError::Stratification { key, count });
        }
        Some((key, _)) => {
            warn!(
                "Class '{}' has a single sample, falling back to an unstratified split",
                key
            );
            let mut indices: Vec<usize> = (0..samples.len()).collect();
            indices.shuffle(&mut rng);
            indices.truncate(n_valid);
            indices
        }
        None => {
            for members in groups.values_mut() {
                members.shuffle(&mut rng);
            }
            let quotas = allocate_quotas(&groups, val_size, n_valid);
            groups
                .values()
                .zip(quotas)
                .flat_map(|(members, quota)| members[..quota].to_vec())
                .collect()
        }
    };

    let mut is_valid = vec![false; samples.len()];
    for index in valid_indices {
        is_valid[index] = true;
    }

    let mut split = SplitData::default();
    let mut per_class: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (index, sample) in samples.into_iter().enumerate() {
        let counts = per_class.entry(keys[index].as_str()).or_default();
        if is_valid[index] {
            counts.1 += 1;
            split.valid.push(sample);
        } else {
            counts.0 += 1;
            split.train.push(sample);
        }
    }
    split.train.sort_by(|a, b| a.stem.cmp(&b.stem));
    split.valid.sort_by(|a, b| a.stem.cmp(&b.stem));

    info!(
        "Split {} samples into {} train and {} valid",
        split.len(),
        split.train.len(),
        split.valid.len()
    );
    for (key, (train, valid)) in &per_class {
        info!("  class {}: {} train, {} valid", key, train, valid);
    }
    Ok(split)
}

/// Number of validation slots per group, in group order.
///
/// Every group first gets `floor(val_size * len)`. Leftover slots go to the largest
/// fractional remainders, then the larger group, then key order. A group never loses all
/// its members to the validation side while another group can still take a slot.
fn allocate_quotas(
    groups: &BTreeMap<&str, Vec<usize>>,
    val_size: f32,
    n_valid: usize,
) -> Vec<usize> {
    let fraction = f64::from(val_size);
    let mut quotas = Vec::with_capacity(groups.len());
    let mut remainders = Vec::with_capacity(groups.len());
    for (position, members) in groups.values().enumerate() {
        let exact = fraction * members.len() as f64;
        let base = ((exact + FRACTION_EPSILON).floor() as usize).min(members.len());
        quotas.push(base);
        remainders.push((position, exact - base as f64, members.len()));
    }

    remainders.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.2.cmp(&a.2))
            .then(a.0.cmp(&b.0))
    });

    let mut remaining = n_valid.saturating_sub(quotas.iter().sum());
    for keep_one_in_train in [true, false] {
        for &(position, _, len) in &remainders {
            if remaining == 0 {
                return quotas;
            }
            let cap = if keep_one_in_train { len - 1 } else { len };
            if quotas[position] < cap {
                quotas[position] += 1;
                remaining -= 1;
            }
        }
    }
    quotas
}
