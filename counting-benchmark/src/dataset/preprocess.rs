//! Square cropping and resizing of dataset images

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::path::{Path, PathBuf};

use super::{DatasetError, DatasetResult};

/// Default edge length after resizing
pub const TARGET_SIZE: u32 = 1080;

/// Crop window `(left, top, size)` for an image of the given size.
///
/// The square is centered horizontally and anchored to the bottom edge.
pub fn square_crop_box(width: u32, height: u32) -> (u32, u32, u32) {
    let size = width.min(height);
    ((width - size) / 2, height - size, size)
}

fn open(path: &Path) -> DatasetResult<DynamicImage> {
    image::open(path).map_err(DatasetError::image(path))
}

fn save(image: &DynamicImage, path: &Path) -> DatasetResult<()> {
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false);

    // JPEG has no alpha channel
    if is_jpeg && image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8())
            .save(path)
            .map_err(DatasetError::image(path))
    } else {
        image.save(path).map_err(DatasetError::image(path))
    }
}

/// Crop an image to a square, writing to `output` or over the input
pub fn crop_to_square(input: &Path, output: Option<&Path>) -> DatasetResult<PathBuf> {
    let image = open(input)?;
    let (width, height) = image.dimensions();
    let (left, top, size) = square_crop_box(width, height);
    tracing::debug!("Cropping {} from {}x{} to {}x{}", input.display(), width, height, size, size);

    let cropped = image.crop_imm(left, top, size, size);
    let output = output.unwrap_or(input);
    save(&cropped, output)?;
    tracing::info!("Image saved to {}", output.display());
    Ok(output.to_path_buf())
}

/// Resize a square image to `size`x`size` with Lanczos3 filtering
pub fn resize_image(input: &Path, output: Option<&Path>, size: u32) -> DatasetResult<PathBuf> {
    let image = open(input)?;
    let (width, height) = image.dimensions();
    if width != height {
        return Err(DatasetError::NotSquare {
            path: input.to_path_buf(),
            width,
            height,
        });
    }

    let resized = image.resize_exact(size, size, FilterType::Lanczos3);
    let output = output.unwrap_or(input);
    save(&resized, output)?;
    tracing::info!("Resized image saved to {}", output.display());
    Ok(output.to_path_buf())
}

/// Crop then resize every JPEG/PNG in `dir` in place.
///
/// Returns the number of images processed.
pub fn preprocess_dir(dir: &Path, size: u32) -> DatasetResult<usize> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(DatasetError::io(dir))? {
        let path = entry.map_err(DatasetError::io(dir))?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
            .unwrap_or(false);
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort();

    for path in &paths {
        crop_to_square(path, None)?;
        resize_image(path, None, size)?;
    }
    tracing::info!("Preprocessed {} images in {}", paths.len(), dir.display());
    Ok(paths.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Red channel encodes the row, green the column
    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(y * 10) as u8, (x * 10) as u8, 0]))
    }

    #[test]
    fn test_square_crop_box() {
        assert_eq!(square_crop_box(10, 6), (2, 0, 6));
        assert_eq!(square_crop_box(6, 10), (0, 4, 6));
        assert_eq!(square_crop_box(7, 4), (1, 0, 4));
        assert_eq!(square_crop_box(5, 5), (0, 0, 5));
    }

    #[test]
    fn test_crop_is_bottom_anchored() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tall.png");
        gradient(4, 6).save(&input).unwrap();

        let output = dir.path().join("square.png");
        crop_to_square(&input, Some(&output)).unwrap();

        let cropped = image::open(&output).unwrap().to_rgb8();
        assert_eq!(cropped.dimensions(), (4, 4));
        // Top two rows were dropped
        assert_eq!(cropped.get_pixel(0, 0)[0], 20);
        assert_eq!(cropped.get_pixel(0, 3)[0], 50);
    }

    #[test]
    fn test_crop_is_horizontally_centered() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wide.png");
        gradient(8, 4).save(&input).unwrap();

        crop_to_square(&input, None).unwrap();

        let cropped = image::open(&input).unwrap().to_rgb8();
        assert_eq!(cropped.dimensions(), (4, 4));
        assert_eq!(cropped.get_pixel(0, 0)[1], 20);
    }

    #[test]
    fn test_resize_square_image() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("square.jpg");
        DynamicImage::ImageRgb8(gradient(12, 12)).save(&input).unwrap();

        let output = dir.path().join("big.jpg");
        resize_image(&input, Some(&output), 30).unwrap();
        assert_eq!(image::open(&output).unwrap().dimensions(), (30, 30));
    }

    #[test]
    fn test_resize_rejects_non_square() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wide.png");
        gradient(8, 4).save(&input).unwrap();

        assert!(matches!(
            resize_image(&input, None, TARGET_SIZE),
            Err(DatasetError::NotSquare { width: 8, height: 4, .. })
        ));
    }

    #[test]
    fn test_preprocess_dir() {
        let dir = tempfile::tempdir().unwrap();
        gradient(9, 5).save(dir.path().join("a.png")).unwrap();
        gradient(5, 9).save(dir.path().join("b.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        assert_eq!(preprocess_dir(dir.path(), 16).unwrap(), 2);
        for name in ["a.png", "b.png"] {
            assert_eq!(image::open(dir.path().join(name)).unwrap().dimensions(), (16, 16));
        }
    }
}
