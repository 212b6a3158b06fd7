//! Corpus access: annotations, filenames, and image decoding.

use crate::types::{Annotations, BBox, SamplerError, SamplerResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of annotated images consumed by the sampler.
pub trait Loader {
    type Image;

    /// Every image of the corpus; random negatives are picked from here.
    fn filenames(&self) -> &[String];

    /// Images of a named split (the positive index reads `"pos"`).
    fn filenames_for(&self, split: &str) -> SamplerResult<Vec<String>>;

    fn read_annotations(&self, name: &str) -> SamplerResult<Annotations>;

    fn load_image(&self, name: &str) -> SamplerResult<Self::Image>;

    fn num_classes(&self) -> usize;
}

/// In-memory corpus. Images are blank RGB buffers of the annotated size.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    names: Vec<String>,
    annotations: HashMap<String, Annotations>,
    splits: HashMap<String, Vec<String>>,
    num_classes: usize,
}

impl MemoryLoader {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    /// Add an image; images with at least one object also join the `"pos"` split.
    pub fn insert(&mut self, name: impl Into<String>, annotations: Annotations) -> &mut Self {
        let name = name.into();
        if !annotations.is_empty() {
            let pos = self.splits.entry("pos".to_string()).or_default();
            if !pos.contains(&name) {
                pos.push(name.clone());
            }
        }
        if !self.annotations.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.annotations.insert(name, annotations);
        self
    }

    pub fn with_image(mut self, name: impl Into<String>, annotations: Annotations) -> Self {
        self.insert(name, annotations);
        self
    }

    /// Replace the members of a split.
    pub fn with_split<I, S>(mut self, split: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.splits
            .insert(split.to_string(), names.into_iter().map(Into::into).collect());
        self
    }
}

impl Loader for MemoryLoader {
    type Image = image::RgbImage;

    fn filenames(&self) -> &[String] {
        &self.names
    }

    fn filenames_for(&self, split: &str) -> SamplerResult<Vec<String>> {
        self.splits
            .get(split)
            .cloned()
            .ok_or_else(|| SamplerError::UnknownSplit(split.to_string()))
    }

    fn read_annotations(&self, name: &str) -> SamplerResult<Annotations> {
        self.annotations
            .get(name)
            .cloned()
            .ok_or_else(|| SamplerError::UnknownImage(name.to_string()))
    }

    fn load_image(&self, name: &str) -> SamplerResult<Self::Image> {
        let ann = self
            .annotations
            .get(name)
            .ok_or_else(|| SamplerError::UnknownImage(name.to_string()))?;
        Ok(image::RgbImage::new(ann.width, ann.height))
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

/// On-disk corpus manifest (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusManifest {
    pub num_classes: usize,
    /// Image directory; relative paths resolve against the manifest's directory.
    #[serde(default)]
    pub image_root: Option<PathBuf>,
    #[serde(default)]
    pub splits: HashMap<String, Vec<String>>,
    pub images: Vec<ManifestImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestImage {
    pub name: String,
    /// Image file relative to `image_root`; defaults to `name`.
    #[serde(default)]
    pub file: Option<String>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub objects: Vec<ManifestObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestObject {
    /// Pixel `[x, y, w, h]`.
    pub bbox: [f64; 4],
    pub label: u32,
    #[serde(default)]
    pub difficult: bool,
}

impl ManifestImage {
    fn annotations(&self) -> Annotations {
        Annotations {
            boxes: self.objects.iter().map(|o| BBox::from_array(o.bbox)).collect(),
            labels: self.objects.iter().map(|o| o.label).collect(),
            width: self.width,
            height: self.height,
            difficult: self.objects.iter().map(|o| o.difficult).collect(),
        }
    }
}

/// Corpus backed by a JSON manifest and image files on disk.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    image_root: PathBuf,
    names: Vec<String>,
    images: HashMap<String, ManifestImage>,
    splits: HashMap<String, Vec<String>>,
    num_classes: usize,
}

impl ManifestLoader {
    pub fn load(path: &Path) -> SamplerResult<Self> {
        let raw = fs::read(path).map_err(|e| SamplerError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let manifest: CorpusManifest =
            serde_json::from_slice(&raw).map_err(|e| SamplerError::Json {
                path: path.to_path_buf(),
                source: e,
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::from_manifest(manifest, base))
    }

    pub fn from_manifest(manifest: CorpusManifest, base: &Path) -> Self {
        let image_root = match manifest.image_root {
            Some(root) if root.is_absolute() => root,
            Some(root) => base.join(root),
            None => base.to_path_buf(),
        };
        let names: Vec<String> = manifest.images.iter().map(|i| i.name.clone()).collect();
        let mut splits = manifest.splits;
        splits.entry("pos".to_string()).or_insert_with(|| {
            manifest
                .images
                .iter()
                .filter(|i| !i.objects.is_empty())
                .map(|i| i.name.clone())
                .collect()
        });
        let images = manifest
            .images
            .into_iter()
            .map(|i| (i.name.clone(), i))
            .collect();
        Self {
            image_root,
            names,
            images,
            splits,
            num_classes: manifest.num_classes,
        }
    }

    fn entry(&self, name: &str) -> SamplerResult<&ManifestImage> {
        self.images
            .get(name)
            .ok_or_else(|| SamplerError::UnknownImage(name.to_string()))
    }

    pub fn image_path(&self, name: &str) -> SamplerResult<PathBuf> {
        let entry = self.entry(name)?;
        Ok(self
            .image_root
            .join(entry.file.as_deref().unwrap_or(&entry.name)))
    }
}

impl Loader for ManifestLoader {
    type Image = image::RgbImage;

    fn filenames(&self) -> &[String] {
        &self.names
    }

    fn filenames_for(&self, split: &str) -> SamplerResult<Vec<String>> {
        self.splits
            .get(split)
            .cloned()
            .ok_or_else(|| SamplerError::UnknownSplit(split.to_string()))
    }

    fn read_annotations(&self, name: &str) -> SamplerResult<Annotations> {
        Ok(self.entry(name)?.annotations())
    }

    fn load_image(&self, name: &str) -> SamplerResult<Self::Image> {
        let path = self.image_path(name)?;
        if !path.exists() {
            return Err(SamplerError::Io {
                path,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let img = image::open(&path)
            .map_err(|e| SamplerError::Image {
                path: path.clone(),
                source: e,
            })?
            .to_rgb8();
        Ok(img)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_box(w: u32, h: u32) -> Annotations {
        Annotations {
            boxes: vec![BBox::new(1.0, 1.0, 4.0, 4.0)],
            labels: vec![3],
            width: w,
            height: h,
            difficult: vec![false],
        }
    }

    #[test]
    fn memory_loader_tracks_positive_split() {
        let loader = MemoryLoader::new(5)
            .with_image("a", one_box(10, 10))
            .with_image("empty", Annotations { width: 10, height: 10, ..Default::default() });
        assert_eq!(loader.filenames(), ["a".to_string(), "empty".to_string()]);
        assert_eq!(loader.filenames_for("pos").unwrap(), vec!["a".to_string()]);
        assert!(matches!(loader.filenames_for("val"), Err(SamplerError::UnknownSplit(_))));
        let img = loader.load_image("a").unwrap();
        assert_eq!(img.dimensions(), (10, 10));
    }

    #[test]
    fn manifest_defaults_pos_split_to_annotated_images() {
        let manifest: CorpusManifest = serde_json::from_str(
            r#"{
                "num_classes": 3,
                "image_root": "img",
                "images": [
                    {"name": "a.png", "width": 8, "height": 6,
                     "objects": [{"bbox": [1, 1, 2, 2], "label": 2}]},
                    {"name": "b.png", "file": "other.png", "width": 8, "height": 6}
                ]
            }"#,
        )
        .unwrap();
        let loader = ManifestLoader::from_manifest(manifest, Path::new("/data"));
        assert_eq!(loader.filenames_for("pos").unwrap(), vec!["a.png".to_string()]);
        assert_eq!(
            loader.image_path("b.png").unwrap(),
            PathBuf::from("/data/img/other.png")
        );
        let ann = loader.read_annotations("a.png").unwrap();
        assert_eq!(ann.labels, vec![2]);
        assert_eq!(ann.boxes[0], BBox::new(1.0, 1.0, 2.0, 2.0));
        assert_eq!(ann.difficult, vec![false]);
    }
}
