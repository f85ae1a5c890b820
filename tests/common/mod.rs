//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use resnet_trainer::RunConfig;

/// Per-class base colours; classes are easy to tell apart
const PALETTE: [[u8; 3]; 5] = [
    [220, 30, 30],
    [30, 200, 40],
    [40, 50, 230],
    [230, 220, 30],
    [30, 210, 220],
];

/// Write `per_class` small PNGs for each of `classes` classes under `root`
pub fn write_image_folder(root: &Path, classes: usize, per_class: usize) {
    for class in 0..classes {
        let dir = root.join(format!("class_{}", class));
        std::fs::create_dir_all(&dir).unwrap();
        let [r, g, b] = PALETTE[class % PALETTE.len()];
        for i in 0..per_class {
            let shade = (i * 3) as u8;
            RgbImage::from_fn(12, 12, |x, y| {
                let noise = ((x + y) as u8).wrapping_mul(7);
                Rgb([
                    r.saturating_sub(shade) ^ (noise & 0x0f),
                    g.saturating_sub(shade),
                    b.saturating_sub(shade),
                ])
            })
            .save(dir.join(format!("img_{:03}.png", i)))
            .unwrap();
        }
    }
}

/// Directory layout of one test run
pub struct Workspace {
    pub root: tempfile::TempDir,
}

impl Workspace {
    /// Train and validation folders with the same classes
    pub fn new(classes: usize, train_per_class: usize, valid_per_class: usize) -> Self {
        let root = tempfile::tempdir().unwrap();
        write_image_folder(&root.path().join("train"), classes, train_per_class);
        write_image_folder(&root.path().join("valid"), classes, valid_per_class);
        Self { root }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Small, fast configuration over this workspace
    pub fn config(&self) -> RunConfig {
        let mut config = RunConfig::new(
            self.path("output"),
            self.path("model"),
            self.path("train"),
            self.path("valid"),
        );
        config.image_size = 32;
        config.base_channels = 8;
        config.epochs = 1;
        config
    }
}
