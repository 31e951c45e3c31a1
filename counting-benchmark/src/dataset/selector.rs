//! Reproducible sampling of labeled images from the source corpus

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::{DatasetError, DatasetResult};
use crate::config::Config;
use crate::table::{ResultTable, TableResult, CLASS, FILENAME, OBJECT_COUNT};

/// One selected image with its class and true count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledImage {
    pub filename: String,
    pub class: String,
    pub object_count: u64,
}

/// Annotation entry; only the point list matters here
#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    points: Vec<serde_json::Value>,
}

/// Samples images, copies them and writes the label table
#[derive(Debug, Clone)]
pub struct DatasetSelector {
    pub source_dir: PathBuf,
    pub class_file: PathBuf,
    pub annotation_file: PathBuf,
    pub destination_dir: PathBuf,
    pub labels_csv: PathBuf,
    pub sample_size: usize,
    pub seed: u64,
}

impl DatasetSelector {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_dir: config.paths.source_images.clone(),
            class_file: config.paths.class_file.clone(),
            annotation_file: config.paths.annotation_file.clone(),
            destination_dir: config.paths.image_dir.clone(),
            labels_csv: config.paths.labels_csv.clone(),
            sample_size: config.selection.sample_size,
            seed: config.selection.seed,
        }
    }

    /// Parse the `<filename>\t<class>` file, in file order
    pub fn read_classes(&self) -> DatasetResult<Vec<(String, String)>> {
        let content =
            std::fs::read_to_string(&self.class_file).map_err(DatasetError::io(&self.class_file))?;
        Ok(parse_class_file(&content))
    }

    /// Class entries whose image exists in the source directory
    pub fn valid_images(&self, classes: &[(String, String)]) -> Vec<(String, String)> {
        classes
            .iter()
            .filter(|(filename, _)| self.source_dir.join(filename).is_file())
            .cloned()
            .collect()
    }

    /// Draw `sample_size` entries with the configured seed
    pub fn sample<T: Clone>(&self, candidates: &[T]) -> DatasetResult<Vec<T>> {
        if candidates.len() < self.sample_size {
            return Err(DatasetError::NotEnoughImages {
                required: self.sample_size,
                available: candidates.len(),
            });
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        Ok(rand::seq::index::sample(&mut rng, candidates.len(), self.sample_size)
            .into_iter()
            .map(|i| candidates[i].clone())
            .collect())
    }

    /// Point count per annotated file
    pub fn annotation_counts(&self) -> DatasetResult<HashMap<String, u64>> {
        let content = std::fs::read_to_string(&self.annotation_file)
            .map_err(DatasetError::io(&self.annotation_file))?;
        let annotations: HashMap<String, Annotation> = serde_json::from_str(&content)?;
        Ok(annotations
            .into_iter()
            .map(|(filename, a)| (filename, a.points.len() as u64))
            .collect())
    }

    /// Run the full selection: sample, copy, label.
    pub fn select(&self) -> DatasetResult<Vec<LabeledImage>> {
        let classes = self.read_classes()?;
        let valid = self.valid_images(&classes);
        tracing::info!(
            "{} of {} class entries have an image in {}",
            valid.len(),
            classes.len(),
            self.source_dir.display()
        );

        let selected = self.sample(&valid)?;

        std::fs::create_dir_all(&self.destination_dir)
            .map_err(DatasetError::io(&self.destination_dir))?;
        for (filename, _) in &selected {
            let from = self.source_dir.join(filename);
            std::fs::copy(&from, self.destination_dir.join(filename)).map_err(DatasetError::io(&from))?;
        }

        let counts = self.annotation_counts()?;
        let labeled: Vec<LabeledImage> = selected
            .into_iter()
            .map(|(filename, class)| {
                let object_count = counts.get(&filename).copied().unwrap_or_else(|| {
                    tracing::warn!("No annotation for {}, using 0", filename);
                    0
                });
                LabeledImage {
                    filename,
                    class,
                    object_count,
                }
            })
            .collect();

        write_labels(&self.labels_csv, &labeled)?;
        tracing::info!(
            "Selected {} images into {}, labels at {}",
            labeled.len(),
            self.destination_dir.display(),
            self.labels_csv.display()
        );
        Ok(labeled)
    }
}

fn parse_class_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter(|line| line.contains('\t'))
        .filter_map(|line| {
            let mut fields = line.trim().split('\t');
            let filename = fields.next()?.to_string();
            let class = fields.next()?.to_string();
            Some((filename, class))
        })
        .collect()
}

/// Write the label table with header `filename,class,object_count`
pub fn write_labels(path: impl AsRef<Path>, images: &[LabeledImage]) -> TableResult<()> {
    let mut table = ResultTable::new([FILENAME, CLASS, OBJECT_COUNT]);
    for image in images {
        table.push_row([
            (FILENAME, image.filename.clone()),
            (CLASS, image.class.clone()),
            (OBJECT_COUNT, image.object_count.to_string()),
        ])?;
    }
    table.write(path)
}

/// Delete files in `image_dir` that the label table does not list.
///
/// Returns the removed paths, sorted.
pub fn clean(image_dir: impl AsRef<Path>, labels_csv: impl AsRef<Path>) -> DatasetResult<Vec<PathBuf>> {
    let image_dir = image_dir.as_ref();
    let table = ResultTable::read(labels_csv)?;
    let listed: HashSet<&str> = table.column(FILENAME)?.into_iter().flatten().collect();

    let mut removed = Vec::new();
    for entry in std::fs::read_dir(image_dir).map_err(DatasetError::io(image_dir))? {
        let path = entry.map_err(DatasetError::io(image_dir))?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if path.is_file() && !listed.contains(name) {
            tracing::info!("Removing {}", path.display());
            std::fs::remove_file(&path).map_err(DatasetError::io(&path))?;
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(dir: &Path, images: usize) -> DatasetSelector {
        let source = dir.join("source");
        std::fs::create_dir_all(&source).unwrap();

        let mut classes = String::new();
        let mut annotations = serde_json::Map::new();
        for i in 0..images {
            let name = format!("{}.jpg", i);
            std::fs::write(source.join(&name), format!("image {}", i)).unwrap();
            classes.push_str(&format!("{}\tclass_{}\n", name, i % 3));
            if i % 4 != 0 {
                let points: Vec<[f64; 2]> = (0..i).map(|p| [p as f64, 1.0]).collect();
                annotations.insert(name, serde_json::json!({ "points": points, "H": 384 }));
            }
        }
        // Listed but absent from the corpus
        classes.push_str("missing.jpg\tghosts\n");
        classes.push_str("no tab line\n");

        let class_file = dir.join("classes.txt");
        let annotation_file = dir.join("annotations.json");
        std::fs::write(&class_file, classes).unwrap();
        std::fs::write(&annotation_file, serde_json::Value::Object(annotations).to_string()).unwrap();

        DatasetSelector {
            source_dir: source,
            class_file,
            annotation_file,
            destination_dir: dir.join("selected"),
            labels_csv: dir.join("labels.csv"),
            sample_size: 5,
            seed: 42,
        }
    }

    #[test]
    fn test_parse_class_file() {
        let parsed = parse_class_file("a.jpg\tapples\r\nno tab\nb.jpg\tsea shells\textra\n");
        assert_eq!(
            parsed,
            vec![
                ("a.jpg".to_string(), "apples".to_string()),
                ("b.jpg".to_string(), "sea shells".to_string()),
            ]
        );
    }

    #[test]
    fn test_valid_images_require_file() {
        let dir = tempfile::tempdir().unwrap();
        let selector = corpus(dir.path(), 6);
        let classes = selector.read_classes().unwrap();
        assert_eq!(classes.len(), 7);
        let valid = selector.valid_images(&classes);
        assert_eq!(valid.len(), 6);
        assert!(valid.iter().all(|(f, _)| f != "missing.jpg"));
    }

    #[test]
    fn test_select_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let selector = corpus(dir.path(), 20);
        let first = selector.select().unwrap();

        let again = DatasetSelector {
            destination_dir: dir.path().join("selected_again"),
            labels_csv: dir.path().join("labels_again.csv"),
            ..selector.clone()
        };
        let second = again.select().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);

        for image in &first {
            assert!(selector.destination_dir.join(&image.filename).is_file());
        }
    }

    #[test]
    fn test_select_labels_counts_points() {
        let dir = tempfile::tempdir().unwrap();
        let selector = DatasetSelector {
            sample_size: 12,
            ..corpus(dir.path(), 12)
        };
        let labeled = selector.select().unwrap();

        for image in &labeled {
            let index: u64 = image.filename.trim_end_matches(".jpg").parse().unwrap();
            let expected = if index % 4 == 0 { 0 } else { index };
            assert_eq!(image.object_count, expected, "{}", image.filename);
            assert_eq!(image.class, format!("class_{}", index % 3));
        }

        let table = ResultTable::read(&selector.labels_csv).unwrap();
        assert_eq!(table.columns().collect::<Vec<_>>(), vec![FILENAME, CLASS, OBJECT_COUNT]);
        assert_eq!(table.len(), 12);
    }

    #[test]
    fn test_not_enough_images() {
        let dir = tempfile::tempdir().unwrap();
        let selector = DatasetSelector {
            sample_size: 300,
            ..corpus(dir.path(), 4)
        };
        match selector.select() {
            Err(DatasetError::NotEnoughImages {
                required,
                available,
            }) => {
                assert_eq!(required, 300);
                assert_eq!(available, 4);
            }
            other => panic!("expected NotEnoughImages, got {:?}", other),
        }
    }

    #[test]
    fn test_clean_removes_only_unlisted() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir_all(images.join("nested")).unwrap();
        for name in ["1.jpg", "2.jpg", "stray.jpg", ".DS_Store"] {
            std::fs::write(images.join(name), b"x").unwrap();
        }
        let labels = dir.path().join("labels.csv");
        write_labels(
            &labels,
            &[
                LabeledImage {
                    filename: "1.jpg".to_string(),
                    class: "apples".to_string(),
                    object_count: 3,
                },
                LabeledImage {
                    filename: "2.jpg".to_string(),
                    class: "birds".to_string(),
                    object_count: 30,
                },
            ],
        )
        .unwrap();

        let removed = clean(&images, &labels).unwrap();
        assert_eq!(removed, vec![images.join(".DS_Store"), images.join("stray.jpg")]);
        assert!(images.join("1.jpg").is_file());
        assert!(images.join("2.jpg").is_file());
        assert!(images.join("nested").is_dir());
    }
}
