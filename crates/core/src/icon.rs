//! Battery icon compositing.
//!
//! The icon is an "empty" outline with the bottom slice of a "full" fill mask
//! laid over it, proportional to the charge, padded to a square. Dark themes
//! lift near-black pixels to light grey so the outline stays visible.

use crate::error::{Error, Result};
use image::{imageops, Rgba, RgbaImage};
use std::path::Path;
use tracing::debug;

/// Channels below this count as black for dark-theme recolouring.
pub const DARK_THRESHOLD: u8 = 10;
/// Replacement colour for near-black pixels in dark themes.
pub const DARK_REPLACEMENT: [u8; 3] = [200, 200, 200];

/// Built-in "empty" outline artwork.
pub const BUILTIN_EMPTY_PNG: &[u8] = include_bytes!("../assets/mouse.png");
/// Built-in "full" fill mask artwork.
pub const BUILTIN_FULL_PNG: &[u8] = include_bytes!("../assets/mousefull.png");

/// The two base images every icon is built from.
#[derive(Debug, Clone)]
pub struct IconAssets {
    empty: RgbaImage,
    full: RgbaImage,
}

impl IconAssets {
    /// Pair two decoded images. Both must share dimensions.
    pub fn from_images(empty: RgbaImage, full: RgbaImage) -> Result<Self> {
        if empty.dimensions() != full.dimensions() {
            return Err(Error::Asset(format!(
                "empty icon is {}x{} but full icon is {}x{}",
                empty.width(),
                empty.height(),
                full.width(),
                full.height()
            )));
        }
        if empty.width() == 0 || empty.height() == 0 {
            return Err(Error::Asset("icon images are empty".into()));
        }
        Ok(Self { empty, full })
    }

    /// Decode both images from encoded bytes (PNG).
    pub fn from_memory(empty: &[u8], full: &[u8]) -> Result<Self> {
        let decode = |bytes: &[u8], which: &str| {
            image::load_from_memory(bytes)
                .map(|img| img.into_rgba8())
                .map_err(|e| Error::Asset(format!("decode {which} icon: {e}")))
        };
        Self::from_images(decode(empty, "empty")?, decode(full, "full")?)
    }

    /// The artwork shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_memory(BUILTIN_EMPTY_PNG, BUILTIN_FULL_PNG)
    }

    /// Load both images from disk.
    pub fn load(empty: &Path, full: &Path) -> Result<Self> {
        let open = |path: &Path| {
            image::open(path)
                .map(|img| img.into_rgba8())
                .map_err(|e| Error::Asset(format!("load {}: {e}", path.display())))
        };
        let assets = Self::from_images(open(empty)?, open(full)?)?;
        debug!(
            empty = %empty.display(),
            full = %full.display(),
            width = assets.empty.width(),
            height = assets.empty.height(),
            "Loaded icon assets"
        );
        Ok(assets)
    }

    pub fn empty(&self) -> &RgbaImage {
        &self.empty
    }

    pub fn full(&self) -> &RgbaImage {
        &self.full
    }
}

/// Rows of the fill mask shown for `percentage`.
fn fill_height(percentage: f32, height: u32) -> u32 {
    let fraction = if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 100.0) / 100.0
    };
    ((fraction * height as f32) as u32).min(height)
}

/// Whether a pixel reads as black.
fn is_near_black(pixel: &Rgba<u8>) -> bool {
    pixel.0[..3].iter().all(|&c| c < DARK_THRESHOLD)
}

/// Lift near-black pixels to light grey, keeping alpha.
pub fn apply_dark_theme(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        if is_near_black(pixel) {
            pixel.0[..3].copy_from_slice(&DARK_REPLACEMENT);
        }
    }
}

/// Build the square battery icon for `percentage` (clamped to [0, 100]).
pub fn compose(percentage: f32, assets: &IconAssets, dark: bool) -> RgbaImage {
    let (width, height) = assets.full.dimensions();
    let filled = fill_height(percentage, height);

    let mut base = assets.empty.clone();
    if filled > 0 {
        let slice = imageops::crop_imm(&assets.full, 0, height - filled, width, filled).to_image();
        imageops::overlay(&mut base, &slice, 0, i64::from(height - filled));
    }

    let side = width.max(height);
    let mut square = RgbaImage::from_pixel(side, side, Rgba([0, 0, 0, 0]));
    let x = (side - width) / 2;
    let y = (side - height) / 2;
    imageops::replace(&mut square, &base, i64::from(x), i64::from(y));

    if dark {
        apply_dark_theme(&mut square);
    }
    square
}
