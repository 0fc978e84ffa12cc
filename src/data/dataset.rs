use anyhow::{bail, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::CLASS_NAMES;

/// Labeled chest X-ray samples from one split directory.
///
/// Expected structure (the splitter's output):
/// ```text
/// dataset_split/Train/
/// ├── Normal/
/// └── Tuberculosis/
/// ```
#[derive(Debug, Clone)]
pub struct XrayDataset {
    samples: Vec<(PathBuf, usize)>,
}

impl XrayDataset {
    pub fn from_split_dir(dir: &Path) -> Result<Self> {
        let mut samples = Vec::new();

        for (label, class) in CLASS_NAMES.iter().enumerate() {
            let class_dir = dir.join(class);
            if !class_dir.is_dir() {
                bail!("class directory not found: {}", class_dir.display());
            }

            let before = samples.len();
            for entry in WalkDir::new(&class_dir).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    if matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png") {
                        samples.push((path.to_path_buf(), label));
                    }
                }
            }

            if samples.len() == before {
                bail!("no images found in {}", class_dir.display());
            }
        }

        samples.sort();
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Per-class sample counts, index-aligned with `CLASS_NAMES`.
    pub fn class_counts(&self) -> [usize; 2] {
        let mut counts = [0; 2];
        for &(_, label) in &self.samples {
            counts[label] += 1;
        }
        counts
    }

    pub fn get(&self, idx: usize) -> Result<(DynamicImage, usize)> {
        let Some((path, label)) = self.samples.get(idx) else {
            bail!(
                "index {} out of bounds, dataset has {} samples",
                idx,
                self.samples.len()
            );
        };
        let img = image::open(path)?;
        Ok((img, *label))
    }
}
