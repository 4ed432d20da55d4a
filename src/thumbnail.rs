use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Produces the asset file for a record at `dest`.
pub trait AssetWriter {
    fn write(&self, image_url: &str, dest: &Path, size: u32) -> Result<()>;
}

/// Downloads the source image and stores a square JPEG thumbnail.
pub struct ThumbnailWriter {
    client: reqwest::blocking::Client,
}

impl ThumbnailWriter {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ThumbnailWriter { client })
    }
}

impl AssetWriter for ThumbnailWriter {
    fn write(&self, image_url: &str, dest: &Path, size: u32) -> Result<()> {
        debug!("Downloading image {}", image_url);
        let bytes = self
            .client
            .get(image_url)
            .send()?
            .error_for_status()?
            .bytes()
            .with_context(|| format!("Failed to download {}", image_url))?;

        let source = image::load_from_memory(&bytes)
            .with_context(|| format!("Unsupported image at {}", image_url))?;
        save_thumbnail(&source, dest, size)?;
        info!("Saved {}x{} thumbnail to {:?}", size, size, dest);
        Ok(())
    }
}

/// Center-crop to a square, resize to `size` and write as JPEG.
///
/// The encoded bytes go to a temp file next to `dest` first, so a failed
/// encode never leaves a truncated asset behind.
pub fn save_thumbnail(source: &DynamicImage, dest: &Path, size: u32) -> Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let thumb = source.resize_to_fill(size, size, FilterType::Lanczos3);
    let rgb = DynamicImage::ImageRgb8(thumb.to_rgb8());

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        rgb.write_to(&mut out, ImageFormat::Jpeg)?;
        out.flush()?;
    }
    tmp.persist(dest)
        .map_err(|e| anyhow!("Failed to move thumbnail into {:?}: {}", dest, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};

    #[test]
    fn writes_square_jpeg() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("assets").join("wide-B1.jpg");
        let wide = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 120, image::Rgb([200, 10, 10])));

        save_thumbnail(&wide, &dest, 64)?;

        let written = image::open(&dest)?;
        assert_eq!(written.dimensions(), (64, 64));
        assert_eq!(std::fs::read_dir(dest.parent().unwrap())?.count(), 1);
        Ok(())
    }

    #[test]
    fn rgba_sources_are_flattened() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("alpha-B2.jpg");
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            50,
            80,
            image::Rgba([0, 0, 255, 128]),
        ));

        save_thumbnail(&rgba, &dest, 32)?;
        assert_eq!(image::open(&dest)?.dimensions(), (32, 32));
        Ok(())
    }
}
