//! Image conversion to device constraints.
//!
//! Each backend describes its screen with an [`ImagePolicy`]. Images are
//! optionally rotated to landscape, scaled to fit the maximum dimensions,
//! then shrunk stepwise until the encoded file fits the size limit. The size
//! limit is best effort: an image that cannot be shrunk further is written
//! as is.

use std::fs;
use std::path::{Path, PathBuf};

use crate::assets::{AssetResult, needs_update};

/// Device constraints for staged images.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImagePolicy {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Rotate wide images a quarter turn when they exceed `max_width`.
    pub to_landscape: bool,
    /// Output format extension (e.g. `png`); `None` keeps the source format.
    pub to_ext: Option<String>,
    /// Maximum encoded size in bytes.
    pub max_size: Option<u64>,
}

impl ImagePolicy {
    /// Apply the extension rewrite to a destination path.
    #[must_use]
    pub fn destination(&self, dst: &Path) -> PathBuf {
        match &self.to_ext {
            Some(ext) => dst.with_extension(ext.trim_start_matches('.')),
            None => dst.to_path_buf(),
        }
    }
}

/// Outcome of [`convert_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Final destination path (after any extension rewrite).
    pub path: PathBuf,
    /// Whether the destination was (re)written.
    pub written: bool,
}

/// Convert `src` into `dst` under `policy`.
///
/// Skipped when the destination is strictly newer than the source. Without
/// the `images` feature the source bytes are copied unchanged.
///
/// # Errors
///
/// Returns an error if the source cannot be decoded or the result cannot be
/// written.
pub fn convert_image(src: &Path, dst: &Path, policy: &ImagePolicy) -> AssetResult<Conversion> {
    let path = policy.destination(dst);

    if !needs_update(src, &path) {
        return Ok(Conversion { path, written: false });
    }

    transcode(src, &path, policy)?;
    Ok(Conversion { path, written: true })
}

#[cfg(not(feature = "images"))]
fn transcode(src: &Path, dst: &Path, _policy: &ImagePolicy) -> AssetResult<()> {
    fs::copy(src, dst)?;
    Ok(())
}

#[cfg(feature = "images")]
fn transcode(src: &Path, dst: &Path, policy: &ImagePolicy) -> AssetResult<()> {
    use image::imageops::FilterType;

    let mut img = image::open(src)?;

    let too_wide = policy
        .max_width
        .is_some_and(|max_width| img.width() > max_width);
    if policy.to_landscape && too_wide && f64::from(img.width()) > f64::from(img.height()) * 1.2 {
        img = img.rotate90();
    }

    let (width, height) = (img.width(), img.height());
    let ratio = fit_ratio(width, policy.max_width).max(fit_ratio(height, policy.max_height));
    if ratio > 1.0 {
        img = img.resize_exact(scale(width, ratio), scale(height, ratio), FilterType::Lanczos3);
    }

    if let Some(max_size) = policy.max_size {
        let ext = dst.extension().map_or_else(|| "png".into(), |e| e.to_string_lossy());
        img = shrink_to_size(img, &ext, max_size, &std::env::temp_dir())?;
    }

    img.save(dst)?;
    Ok(())
}

/// Downscale factor needed to bring `actual` within `limit`.
#[cfg(feature = "images")]
fn fit_ratio(actual: u32, limit: Option<u32>) -> f64 {
    match limit {
        Some(limit) if limit > 0 && actual > limit => f64::from(actual) / f64::from(limit),
        _ => 1.0,
    }
}

#[cfg(feature = "images")]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(dimension: u32, ratio: f64) -> u32 {
    ((f64::from(dimension) / ratio) as u32).max(1)
}

/// Shrink by successive 0.7, 0.6, ... factors until the encoded size fits.
///
/// Trial encodings go to a scratch directory under `scratch_root` that is
/// removed on return, on success and on error alike.
#[cfg(feature = "images")]
fn shrink_to_size(
    img: image::DynamicImage,
    ext: &str,
    max_size: u64,
    scratch_root: &Path,
) -> AssetResult<image::DynamicImage> {
    use image::imageops::FilterType;

    let scratch = tempfile::TempDir::new_in(scratch_root)?;
    let trial = scratch.path().join(format!("scaling.{ext}"));

    img.save(&trial)?;
    let (mut width, mut height) = (img.width(), img.height());
    let mut current = img.clone();

    while fs::metadata(&trial)?.len() > max_size {
        let (old_width, old_height) = (width, height);
        let mut tenths = 7;
        while (width == old_width || height == old_height) && tenths > 0 {
            width = width * tenths / 10;
            height = height * tenths / 10;
            tenths -= 1;
        }

        if width == 0 || height == 0 {
            break;
        }
        current = img.resize_exact(width, height, FilterType::Lanczos3);
        current.save(&trial)?;
    }

    Ok(current)
}


#[cfg(all(test, not(feature = "images")))]
mod passthrough_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_bytes_are_copied_unchanged() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("photo.jpg");
        let bytes = b"\xff\xd8 not decoded without image support";
        fs::write(&src, bytes).unwrap();

        let policy = ImagePolicy {
            max_width: Some(10),
            max_size: Some(1),
            to_ext: Some("png".to_string()),
            ..ImagePolicy::default()
        };
        let out = convert_image(&src, &dir.path().join("photo.jpg.out"), &policy).unwrap();

        assert!(out.written);
        assert_eq!(out.path, dir.path().join("photo.jpg.png"));
        assert_eq!(fs::read(&out.path).unwrap(), bytes);
    }
}
