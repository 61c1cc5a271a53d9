//! Image preprocessing driven by a `preprocessor_config.json`.
//!
//! Understands the fields image-classification checkpoints usually ship:
//! `do_resize`/`size`/`resample`, `do_center_crop`/`crop_size`,
//! `do_rescale`/`rescale_factor` and `do_normalize`/`image_mean`/`image_std`.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use serde::Deserialize;
use std::path::Path;

use crate::classifier::ClassifierError;

/// Largest edge the model input may have after resizing and cropping.
pub const MAX_EDGE: u32 = 4096;

/// Target size as written in the config: `{"height", "width"}`,
/// `{"shortest_edge"}` or a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Exact { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
    Square(u32),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    pub do_resize: bool,
    pub size: SizeSpec,
    /// PIL resampling id: 0 nearest, 1 lanczos, 2 bilinear, 3 bicubic.
    pub resample: u8,
    pub do_center_crop: bool,
    pub crop_size: Option<SizeSpec>,
    pub do_rescale: bool,
    pub rescale_factor: f32,
    pub do_normalize: bool,
    pub image_mean: [f32; 3],
    pub image_std: [f32; 3],
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: SizeSpec::Exact {
                height: 224,
                width: 224,
            },
            resample: 2,
            do_center_crop: false,
            crop_size: None,
            do_rescale: true,
            rescale_factor: 1.0 / 255.0,
            do_normalize: true,
            image_mean: [0.5, 0.5, 0.5],
            image_std: [0.5, 0.5, 0.5],
        }
    }
}

impl PreprocessorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::PreprocessorConfig(format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ClassifierError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| ClassifierError::PreprocessorConfig(e.to_string()))?;
        if config.image_std.iter().any(|s| *s == 0.0) {
            return Err(ClassifierError::PreprocessorConfig(
                "image_std must be non-zero".to_string(),
            ));
        }
        Ok(config)
    }

    fn filter(&self) -> FilterType {
        match self.resample {
            0 => FilterType::Nearest,
            1 => FilterType::Lanczos3,
            3 => FilterType::CatmullRom,
            _ => FilterType::Triangle,
        }
    }

    /// Target dimensions for `resize`. Extreme aspect ratios can scale the
    /// long edge past `u32`, so the math stays in `f64` until it is checked.
    fn resize_target(&self, w: u32, h: u32) -> Result<(u32, u32), ClassifierError> {
        let (tw, th) = match self.size {
            SizeSpec::Exact { height, width } => (width as f64, height as f64),
            SizeSpec::Square(s) => (s as f64, s as f64),
            SizeSpec::ShortestEdge { shortest_edge } => {
                let short = w.min(h).max(1) as f64;
                let scale = shortest_edge as f64 / short;
                (
                    (w as f64 * scale).round().max(1.0),
                    (h as f64 * scale).round().max(1.0),
                )
            }
        };
        if tw > MAX_EDGE as f64 || th > MAX_EDGE as f64 {
            return Err(ClassifierError::UnsupportedImage(format!(
                "{w}x{h} would resize to {tw}x{th}, over the {MAX_EDGE}px edge limit"
            )));
        }
        Ok((tw as u32, th as u32))
    }

    fn resize(&self, image: &RgbImage) -> Result<RgbImage, ClassifierError> {
        let (w, h) = image.dimensions();
        let (tw, th) = self.resize_target(w, h)?;
        Ok(imageops::resize(image, tw, th, self.filter()))
    }

    fn center_crop(&self, image: RgbImage) -> RgbImage {
        let (cw, ch) = match self.crop_size {
            Some(SizeSpec::Exact { height, width }) => (width, height),
            Some(SizeSpec::Square(s)) | Some(SizeSpec::ShortestEdge { shortest_edge: s }) => (s, s),
            None => return image,
        };
        let (w, h) = image.dimensions();
        if w == cw && h == ch {
            return image;
        }
        let x = w.saturating_sub(cw) / 2;
        let y = h.saturating_sub(ch) / 2;
        let cropped = imageops::crop_imm(&image, x, y, cw.min(w), ch.min(h)).to_image();
        if cropped.dimensions() == (cw, ch) {
            cropped
        } else {
            // Source smaller than the crop window.
            imageops::resize(&cropped, cw, ch, self.filter())
        }
    }

    /// Convert an image into a `[1, 3, H, W]` float tensor.
    ///
    /// Fails with `UnsupportedImage` when either edge of the model input would
    /// exceed `MAX_EDGE`.
    pub fn to_tensor(&self, image: &RgbImage) -> Result<Array4<f32>, ClassifierError> {
        let mut prepared = if self.do_resize {
            self.resize(image)?
        } else {
            image.clone()
        };
        if self.do_center_crop {
            prepared = self.center_crop(prepared);
        }

        let (w, h) = prepared.dimensions();
        if w > MAX_EDGE || h > MAX_EDGE {
            return Err(ClassifierError::UnsupportedImage(format!(
                "{w}x{h} input is over the {MAX_EDGE}px edge limit"
            )));
        }
        let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
        for (x, y, pixel) in prepared.enumerate_pixels() {
            for c in 0..3 {
                let mut v = pixel[c] as f32;
                if self.do_rescale {
                    v *= self.rescale_factor;
                }
                if self.do_normalize {
                    v = (v - self.image_mean[c]) / self.image_std[c];
                }
                tensor[[0, c, y as usize, x as usize]] = v;
            }
        }
        Ok(tensor)
    }
}
