//! Dataset selection and image preprocessing

pub mod preprocess;
pub mod selector;

pub use preprocess::{crop_to_square, preprocess_dir, resize_image, square_crop_box, TARGET_SIZE};
pub use selector::{clean, write_labels, DatasetSelector, LabeledImage};

use std::path::PathBuf;

use crate::table::TableError;

/// Error type for dataset operations
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Annotation parse error: {0}")]
    Annotation(#[from] serde_json::Error),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Image error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Not enough images with classes. Required: {required}, available: {available}")]
    NotEnoughImages { required: usize, available: usize },

    #[error("Image {path} is {width}x{height}, expected a square image")]
    NotSquare {
        path: PathBuf,
        width: u32,
        height: u32,
    },
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| DatasetError::Io { path, source }
    }

    pub(crate) fn image(path: impl Into<PathBuf>) -> impl FnOnce(image::ImageError) -> Self {
        let path = path.into();
        move |source| DatasetError::Image { path, source }
    }
}

pub type DatasetResult<T> = Result<T, DatasetError>;
