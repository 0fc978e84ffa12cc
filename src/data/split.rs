use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::CLASS_NAMES;

pub const SPLIT_NAMES: [&str; 3] = ["Train", "Validation", "Test"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub train_ratio: f64,
    pub val_ratio: f64,
    pub test_ratio: f64,
    /// Shuffle seed. Same seed, same input set → same split.
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.7,
            val_ratio: 0.15,
            test_ratio: 0.15,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassCounts {
    pub class: String,
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

#[derive(Debug, Default)]
pub struct SplitSummary {
    pub per_class: Vec<ClassCounts>,
}

impl SplitSummary {
    pub fn total(&self) -> usize {
        self.per_class
            .iter()
            .map(|c| c.train + c.val + c.test)
            .sum()
    }
}

/// Partition `input_dir`'s class folders into Train/Validation/Test under
/// `output_dir`, copying files so the originals stay intact.
///
/// Split boundaries truncate the ratio-scaled count; the test split absorbs
/// the rounding remainder. Every input file lands in exactly one split.
pub fn split_dataset(
    input_dir: &Path,
    output_dir: &Path,
    config: &SplitConfig,
) -> Result<SplitSummary> {
    let ratio_sum = config.train_ratio + config.val_ratio + config.test_ratio;
    if (ratio_sum - 1.0).abs() > 1e-4 {
        bail!("split ratios must sum to 1.0, got {ratio_sum}");
    }

    for split in SPLIT_NAMES {
        for class in CLASS_NAMES {
            fs::create_dir_all(output_dir.join(split).join(class))?;
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut summary = SplitSummary::default();

    for class in CLASS_NAMES {
        let class_dir = input_dir.join(class);
        if !class_dir.is_dir() {
            bail!("class directory not found: {}", class_dir.display());
        }

        let mut files = list_images(&class_dir)?;
        if files.is_empty() {
            bail!("class directory is empty: {}", class_dir.display());
        }

        // Directory iteration order is OS-dependent; sort before shuffling so
        // the seed fully determines the outcome.
        files.sort();
        files.shuffle(&mut rng);

        let total = files.len();
        let train_end = (config.train_ratio * total as f64) as usize;
        let val_end = ((config.train_ratio + config.val_ratio) * total as f64) as usize;

        copy_files(&files[..train_end], &output_dir.join("Train").join(class))?;
        copy_files(&files[train_end..val_end], &output_dir.join("Validation").join(class))?;
        copy_files(&files[val_end..], &output_dir.join("Test").join(class))?;

        summary.per_class.push(ClassCounts {
            class: class.to_string(),
            train: train_end,
            val: val_end - train_end,
            test: total - val_end,
        });
    }

    Ok(summary)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        if matches!(ext.as_deref(), Some("jpg") | Some("jpeg") | Some("png")) {
            files.push(path);
        }
    }
    Ok(files)
}

fn copy_files(files: &[PathBuf], dest_dir: &Path) -> Result<()> {
    for src in files {
        let name = src
            .file_name()
            .with_context(|| format!("no file name: {}", src.display()))?;
        fs::copy(src, dest_dir.join(name))
            .with_context(|| format!("copying {}", src.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn make_class_dir(root: &Path, class: &str, count: usize) {
        let dir = root.join(class);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            fs::write(dir.join(format!("img_{i:03}.png")), b"fake").unwrap();
        }
    }

    fn split_file_names(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn hundred_files_per_class_split_70_15_15() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        let output = tmp.path().join("split");
        for class in CLASS_NAMES {
            make_class_dir(&input, class, 100);
        }

        let summary = split_dataset(&input, &output, &SplitConfig::default()).unwrap();

        assert_eq!(summary.total(), 200);
        for counts in &summary.per_class {
            assert_eq!(counts.train, 70);
            assert_eq!(counts.val, 15);
            assert_eq!(counts.test, 15);
        }

        for class in CLASS_NAMES {
            let train = split_file_names(&output.join("Train").join(class));
            let val = split_file_names(&output.join("Validation").join(class));
            let test = split_file_names(&output.join("Test").join(class));

            // No duplicates, no omissions.
            assert!(train.is_disjoint(&val));
            assert!(train.is_disjoint(&test));
            assert!(val.is_disjoint(&test));
            let union: BTreeSet<_> = train.union(&val).chain(test.iter()).cloned().collect();
            assert_eq!(union, split_file_names(&input.join(class)));
        }
    }

    #[test]
    fn test_split_absorbs_rounding_remainder() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        let output = tmp.path().join("split");
        for class in CLASS_NAMES {
            make_class_dir(&input, class, 7);
        }

        let summary = split_dataset(&input, &output, &SplitConfig::default()).unwrap();

        // floor(0.7 * 7) = 4 train, floor(0.85 * 7) - 4 = 1 val, remainder 2 test.
        for counts in &summary.per_class {
            assert_eq!(counts.train, 4);
            assert_eq!(counts.val, 1);
            assert_eq!(counts.test, 2);
            assert_eq!(counts.train + counts.val + counts.test, 7);
        }
    }

    #[test]
    fn same_seed_same_split() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        for class in CLASS_NAMES {
            make_class_dir(&input, class, 20);
        }

        let out_a = tmp.path().join("a");
        let out_b = tmp.path().join("b");
        let config = SplitConfig::default();
        split_dataset(&input, &out_a, &config).unwrap();
        split_dataset(&input, &out_b, &config).unwrap();

        for split in SPLIT_NAMES {
            for class in CLASS_NAMES {
                assert_eq!(
                    split_file_names(&out_a.join(split).join(class)),
                    split_file_names(&out_b.join(split).join(class)),
                );
            }
        }
    }

    #[test]
    fn missing_class_dir_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        make_class_dir(&input, "Normal", 5);
        // No Tuberculosis directory.

        let err = split_dataset(&input, &tmp.path().join("out"), &SplitConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("class directory not found"));
    }

    #[test]
    fn empty_class_dir_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        make_class_dir(&input, "Normal", 5);
        fs::create_dir_all(input.join("Tuberculosis")).unwrap();

        let err = split_dataset(&input, &tmp.path().join("out"), &SplitConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn originals_remain_after_split() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        for class in CLASS_NAMES {
            make_class_dir(&input, class, 10);
        }

        split_dataset(&input, &tmp.path().join("out"), &SplitConfig::default()).unwrap();

        for class in CLASS_NAMES {
            assert_eq!(split_file_names(&input.join(class)).len(), 10);
        }
    }
}
