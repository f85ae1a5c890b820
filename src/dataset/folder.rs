//! Class-per-directory image datasets
//!
//! A dataset root holds one subdirectory per class; the class index is the
//! position of the subdirectory name in sorted order.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageReader;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{Result, TrainError};

/// File extensions recognised as images
pub const IMAGE_EXTENSIONS: [&str; 9] = [
    "jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp",
];

/// A single image file with its class label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    pub path: PathBuf,
    pub label: usize,
}

/// A decoded image ready for batching
#[derive(Debug, Clone)]
pub struct ImageItem {
    /// CHW float data `[3 * size * size]` in `[0, 1]`
    pub image: Vec<f32>,
    pub label: usize,
}

/// Image dataset discovered from a directory tree
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<ImageSample>,
}

impl ImageFolder {
    /// Scan `root` for class directories and their image files.
    ///
    /// ```text
    /// root/
    /// ├── cat/
    /// │   ├── 001.jpg
    /// │   └── 002.jpg
    /// └── dog/
    ///     └── ...
    /// ```
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        info!("Loading image folder from: {:?}", root);

        if !root.is_dir() {
            return Err(TrainError::dataset_not_found(&root, "directory does not exist"));
        }

        let mut classes: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            // is_dir follows symlinked class directories
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    classes.push(name.to_string());
                }
            }
        }
        classes.sort();

        if classes.is_empty() {
            return Err(TrainError::dataset_not_found(&root, "no class subdirectories"));
        }

        let mut samples = Vec::new();
        for (label, class_name) in classes.iter().enumerate() {
            let class_dir = root.join(class_name);
            let before = samples.len();

            // Images may sit in nested folders; they keep the class label
            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if entry.file_type().is_file() && is_image_file(path) {
                    samples.push(ImageSample {
                        path: path.to_path_buf(),
                        label,
                    });
                }
            }

            let found = samples.len() - before;
            if found == 0 {
                return Err(TrainError::dataset_not_found(
                    &class_dir,
                    format!("class '{}' contains no image files", class_name),
                ));
            }
            debug!("Class '{}' (label {}): {} images", class_name, label, found);
        }

        info!(
            "Found {} images in {} classes under {:?}",
            samples.len(),
            classes.len(),
            root
        );

        Ok(Self {
            root,
            classes,
            samples,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Class names in label order
    pub fn class_names(&self) -> &[String] {
        &self.classes
    }

    pub fn samples(&self) -> &[ImageSample] {
        &self.samples
    }

    /// Number of samples per label
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            counts[sample.label] += 1;
        }
        counts
    }

    /// Decode the sample at `index` into an `ImageItem`
    pub fn load_item(&self, index: usize, image_size: usize) -> Result<ImageItem> {
        let sample = self.samples.get(index).ok_or_else(|| {
            TrainError::dataset_not_found(
                &self.root,
                format!("sample index {} out of range ({})", index, self.samples.len()),
            )
        })?;

        Ok(ImageItem {
            image: load_image_tensor(&sample.path, image_size)?,
            label: sample.label,
        })
    }
}

/// Whether `path` has one of the recognised image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Load an image, resize it to `image_size × image_size` and convert it to
/// CHW RGB values in `[0, 1]`.
pub fn load_image_tensor(path: &Path, image_size: usize) -> Result<Vec<f32>> {
    let decode_err = |reason: String| TrainError::ImageDecode {
        path: path.to_path_buf(),
        reason,
    };

    let img = ImageReader::open(path)
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?
        .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
        .to_rgb8();

    let plane = image_size * image_size;
    let mut tensor = vec![0.0f32; 3 * plane];

    for (i, pixel) in img.pixels().enumerate() {
        tensor[i] = pixel[0] as f32 / 255.0;
        tensor[plane + i] = pixel[1] as f32 / 255.0;
        tensor[2 * plane + i] = pixel[2] as f32 / 255.0;
    }

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_image(path: &Path, color: [u8; 3]) {
        RgbImage::from_pixel(8, 8, Rgb(color)).save(path).unwrap();
    }

    #[test]
    fn test_labels_follow_sorted_class_names() {
        let dir = tempfile::tempdir().unwrap();
        for class in ["zebra", "ant", "moth"] {
            std::fs::create_dir(dir.path().join(class)).unwrap();
            write_image(&dir.path().join(class).join("a.png"), [0, 0, 0]);
        }

        let folder = ImageFolder::open(dir.path()).unwrap();
        assert_eq!(folder.class_names(), &["ant", "moth", "zebra"]);
        assert_eq!(folder.len(), 3);
        let zebra = folder
            .samples()
            .iter()
            .find(|s| s.path.starts_with(dir.path().join("zebra")))
            .unwrap();
        assert_eq!(zebra.label, 2);
    }

    #[test]
    fn test_non_image_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let class_dir = dir.path().join("only");
        std::fs::create_dir(&class_dir).unwrap();
        write_image(&class_dir.join("a.png"), [1, 2, 3]);
        std::fs::write(class_dir.join("notes.txt"), "not an image").unwrap();

        let folder = ImageFolder::open(dir.path()).unwrap();
        assert_eq!(folder.len(), 1);
        assert_eq!(folder.class_counts(), vec![1]);
    }

    #[test]
    fn test_nested_class_images_are_found() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("cat").join("batch1");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir(dir.path().join("dog")).unwrap();
        write_image(&nested.join("a.png"), [4, 5, 6]);
        write_image(&dir.path().join("dog").join("b.png"), [7, 8, 9]);

        let folder = ImageFolder::open(dir.path()).unwrap();
        assert_eq!(folder.class_names(), &["cat", "dog"]);
        assert_eq!(folder.len(), 2);
        assert_eq!(folder.class_counts(), vec![1, 1]);

        let cat = &folder.samples()[0];
        assert_eq!(cat.path, nested.join("a.png"));
        assert_eq!(cat.label, 0);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageFolder::open(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, TrainError::DatasetNotFound { .. }));
    }

    #[test]
    fn test_directory_without_classes() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageFolder::open(dir.path()).unwrap_err();
        assert!(matches!(err, TrainError::DatasetNotFound { .. }));
    }

    #[test]
    fn test_empty_class_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("full")).unwrap();
        std::fs::create_dir(dir.path().join("hollow")).unwrap();
        write_image(&dir.path().join("full").join("a.png"), [9, 9, 9]);

        let err = ImageFolder::open(dir.path()).unwrap_err();
        assert!(err.to_string().contains("hollow"));
    }

    #[test]
    fn test_tensor_is_chw_and_normalised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        write_image(&path, [255, 0, 51]);

        let tensor = load_image_tensor(&path, 4).unwrap();
        assert_eq!(tensor.len(), 3 * 4 * 4);
        assert!(tensor[..16].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(tensor[16..32].iter().all(|&v| v.abs() < 1e-6));
        assert!(tensor[32..].iter().all(|&v| (v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_corrupt_image_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = load_image_tensor(&path, 8).unwrap_err();
        assert!(matches!(err, TrainError::ImageDecode { .. }));
    }
}
