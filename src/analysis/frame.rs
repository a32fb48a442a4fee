//! Frame buffers and the small raster toolkit the analyzers share.
//!
//! Frames arrive from the transcoder gateway as packed RGB24 bytes and are
//! wrapped in `image` buffers; the heuristic detectors only need grayscale
//! statistics, HSV masks, and connected-component labeling, so that is all
//! this module provides on top.

use image::{imageops, GrayImage, RgbImage};

/// RGB frame backed by an `image` buffer
#[derive(Debug, Clone)]
pub struct RgbFrame {
    inner: RgbImage,
}

impl RgbFrame {
    /// Wrap raw rgb24 bytes; returns None when the length does not match
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|inner| Self { inner })
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let px = self.inner.get_pixel(x, y);
        (px[0], px[1], px[2])
    }

    /// Luma conversion
    pub fn luma(&self) -> GrayFrame {
        GrayFrame {
            inner: imageops::grayscale(&self.inner),
        }
    }

    /// Build a boolean mask from a per-pixel RGB predicate
    pub fn mask<F: Fn(u8, u8, u8) -> bool>(&self, pred: F) -> Mask {
        let bits = self
            .inner
            .pixels()
            .map(|px| pred(px[0], px[1], px[2]))
            .collect();
        Mask {
            width: self.width(),
            height: self.height(),
            bits,
        }
    }
}

/// Single-channel 8-bit frame
#[derive(Debug, Clone)]
pub struct GrayFrame {
    inner: GrayImage,
}

impl GrayFrame {
    /// Wrap raw grayscale bytes (tests)
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, data).map(|inner| Self { inner })
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    #[inline]
    fn at(&self, x: u32, y: u32) -> u8 {
        self.inner.get_pixel(x, y)[0]
    }

    /// Mean intensity in [0, 1]
    pub fn mean(&self) -> f64 {
        let data = self.inner.as_raw();
        if data.is_empty() {
            return 0.0;
        }
        let sum: u64 = data.iter().map(|&v| v as u64).sum();
        sum as f64 / data.len() as f64 / 255.0
    }

    /// Intensity standard deviation in [0, 1]
    pub fn stddev(&self) -> f64 {
        let data = self.inner.as_raw();
        if data.is_empty() {
            return 0.0;
        }
        let mean = self.mean() * 255.0;
        let variance: f64 = data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / data.len() as f64;
        variance.sqrt() / 255.0
    }

    /// Mean absolute per-pixel difference against another frame, in [0, 1]
    pub fn mean_abs_diff(&self, other: &GrayFrame) -> f64 {
        let a = self.inner.as_raw();
        let b = other.inner.as_raw();
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let sum: u64 = a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs() as u64)
            .sum();
        sum as f64 / a.len() as f64 / 255.0
    }

    /// Crop a region; coordinates are clamped to the frame
    pub fn region(&self, x: u32, y: u32, w: u32, h: u32) -> GrayFrame {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let w = w.min(self.width() - x);
        let h = h.min(self.height() - y);
        GrayFrame {
            inner: imageops::crop_imm(&self.inner, x, y, w, h).to_image(),
        }
    }

    /// Mean gradient magnitude (forward differences), normalized to [0, 1].
    /// A cheap stand-in for edge density.
    pub fn gradient_density(&self) -> f64 {
        let (width, height) = (self.width(), self.height());
        if width < 2 || height < 2 {
            return 0.0;
        }
        let mut sum = 0u64;
        let mut count = 0u64;
        for y in 0..height - 1 {
            for x in 0..width - 1 {
                let here = self.at(x, y) as i32;
                let right = self.at(x + 1, y) as i32;
                let below = self.at(x, y + 1) as i32;
                sum += ((here - right).abs() + (here - below).abs()) as u64;
                count += 1;
            }
        }
        sum as f64 / count as f64 / 510.0
    }

    /// Standard deviation of the 4-neighbor Laplacian, normalized to [0, 1].
    /// Low values mean smooth, soft imagery.
    pub fn laplacian_std(&self) -> f64 {
        let (width, height) = (self.width(), self.height());
        if width < 3 || height < 3 {
            return 0.0;
        }
        let mut values = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let center = self.at(x, y) as f64;
                let neighbors = self.at(x, y - 1) as f64
                    + self.at(x, y + 1) as f64
                    + self.at(x - 1, y) as f64
                    + self.at(x + 1, y) as f64;
                values.push(neighbors - 4.0 * center);
            }
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
        variance.sqrt() / 255.0
    }
}

/// Convert RGB to HSV: hue in degrees [0, 360), saturation and value in [0, 1]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation, max)
}

/// Boolean pixel mask
#[derive(Debug, Clone)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    pub bits: Vec<bool>,
}

impl Mask {
    /// Fraction of set pixels
    pub fn coverage(&self) -> f64 {
        if self.bits.is_empty() {
            return 0.0;
        }
        self.bits.iter().filter(|&&b| b).count() as f64 / self.bits.len() as f64
    }
}

/// Connected component with bounding box
#[derive(Debug, Clone, Copy)]
pub struct Blob {
    pub area: u32,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Blob {
    /// Height over width
    pub fn aspect_ratio(&self) -> f64 {
        if self.w == 0 {
            return 0.0;
        }
        self.h as f64 / self.w as f64
    }

    /// Area over bounding-box area; circles land around pi/4
    pub fn fill_ratio(&self) -> f64 {
        let box_area = self.w as u64 * self.h as u64;
        if box_area == 0 {
            return 0.0;
        }
        self.area as f64 / box_area as f64
    }

    /// Roughly circular: near-square box, well filled
    pub fn is_roundish(&self) -> bool {
        let aspect = self.aspect_ratio();
        (0.6..=1.6).contains(&aspect) && self.fill_ratio() > 0.5
    }
}

/// Label 4-connected components of the mask, skipping those below `min_area`
pub fn connected_blobs(mask: &Mask, min_area: u32) -> Vec<Blob> {
    let width = mask.width as usize;
    let height = mask.height as usize;
    let mut visited = vec![false; mask.bits.len()];
    let mut blobs = Vec::new();
    let mut stack = Vec::new();

    for start in 0..mask.bits.len() {
        if visited[start] || !mask.bits[start] {
            continue;
        }

        let mut area = 0u32;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        stack.push(start);
        visited[start] = true;

        while let Some(idx) = stack.pop() {
            area += 1;
            let x = idx % width;
            let y = idx / width;
            min_x = min_x.min(x as u32);
            min_y = min_y.min(y as u32);
            max_x = max_x.max(x as u32);
            max_y = max_y.max(y as u32);

            let neighbors = [
                (x > 0).then(|| idx - 1),
                (x + 1 < width).then(|| idx + 1),
                (y > 0).then(|| idx - width),
                (y + 1 < height).then(|| idx + width),
            ];
            for neighbor in neighbors.into_iter().flatten() {
                if !visited[neighbor] && mask.bits[neighbor] {
                    visited[neighbor] = true;
                    stack.push(neighbor);
                }
            }
        }

        if area >= min_area {
            blobs.push(Blob {
                area,
                x: min_x,
                y: min_y,
                w: max_x - min_x + 1,
                h: max_y - min_y + 1,
            });
        }
    }

    blobs
}

/// Detected face bounding box
#[derive(Debug, Clone, Copy)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Skin-tone face heuristic: connected skin-colored regions with face-like
/// size and aspect. Deterministic; no model files required.
pub fn detect_faces(frame: &RgbFrame) -> Vec<FaceBox> {
    let mask = frame.mask(is_skin_tone);
    let frame_area = frame.width() * frame.height();
    let min_area = (frame_area / 400).max(16);
    let max_area = frame_area / 5;

    let mut faces: Vec<FaceBox> = connected_blobs(&mask, min_area)
        .into_iter()
        .filter(|blob| {
            blob.area <= max_area
                && (0.7..=2.2).contains(&blob.aspect_ratio())
                && blob.fill_ratio() > 0.35
        })
        .map(|blob| FaceBox {
            x: blob.x,
            y: blob.y,
            w: blob.w,
            h: blob.h,
        })
        .collect();

    faces.truncate(16);
    faces
}

/// Classic RGB skin-tone rule
fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
    let (r_i, g_i, b_i) = (r as i32, g as i32, b as i32);
    r_i > 95
        && g_i > 40
        && b_i > 20
        && r_i > g_i
        && r_i > b_i
        && (r_i - g_i.min(b_i)) > 15
        && (r_i.max(g_i).max(b_i) - r_i.min(g_i).min(b_i)) > 15
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: (u8, u8, u8)) -> RgbFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[rgb.0, rgb.1, rgb.2]);
        }
        RgbFrame::from_raw(width, height, data).unwrap()
    }

    fn paint(frame: &mut RgbFrame, x0: u32, y0: u32, x1: u32, y1: u32, rgb: (u8, u8, u8)) {
        for y in y0..y1 {
            for x in x0..x1 {
                frame.inner.put_pixel(x, y, image::Rgb([rgb.0, rgb.1, rgb.2]));
            }
        }
    }

    #[test]
    fn test_from_raw_length_check() {
        assert!(RgbFrame::from_raw(2, 2, vec![0; 12]).is_some());
        assert!(RgbFrame::from_raw(2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn test_luma_and_mean() {
        let frame = solid_frame(4, 4, (255, 255, 255));
        let gray = frame.luma();
        assert!(gray.mean() > 0.95);

        let frame = solid_frame(4, 4, (0, 0, 0));
        assert_eq!(frame.luma().mean(), 0.0);
    }

    #[test]
    fn test_mean_abs_diff() {
        let a = solid_frame(4, 4, (0, 0, 0)).luma();
        let b = solid_frame(4, 4, (255, 255, 255)).luma();
        assert!((a.mean_abs_diff(&b) - 1.0).abs() < 0.01);
        assert_eq!(a.mean_abs_diff(&a), 0.0);
    }

    #[test]
    fn test_rgb_to_hsv() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert!(h.abs() < 1.0);
        assert!((s - 1.0).abs() < 1e-9);
        assert!((v - 1.0).abs() < 1e-9);

        let (_, s, v) = rgb_to_hsv(255, 255, 255);
        assert_eq!(s, 0.0);
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_connected_blobs_finds_square() {
        // 8x8 mask with a 3x3 square of set pixels
        let mut bits = vec![false; 64];
        for y in 2..5 {
            for x in 2..5 {
                bits[y * 8 + x] = true;
            }
        }
        let mask = Mask {
            width: 8,
            height: 8,
            bits,
        };
        let blobs = connected_blobs(&mask, 1);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 9);
        assert_eq!((blobs[0].w, blobs[0].h), (3, 3));
        assert!(blobs[0].is_roundish());
    }

    #[test]
    fn test_min_area_filters_specks() {
        let mut bits = vec![false; 64];
        bits[0] = true; // 1px speck
        let mask = Mask {
            width: 8,
            height: 8,
            bits,
        };
        assert!(connected_blobs(&mask, 2).is_empty());
    }

    #[test]
    fn test_detect_faces_on_skin_patch() {
        // 32x32 frame with a 10x12 skin-colored patch on black
        let mut frame = solid_frame(32, 32, (0, 0, 0));
        paint(&mut frame, 10, 8, 20, 20, (200, 150, 120));
        let faces = detect_faces(&frame);
        assert_eq!(faces.len(), 1);
        assert_eq!((faces[0].w, faces[0].h), (10, 12));
    }

    #[test]
    fn test_region_clamped() {
        let gray = solid_frame(8, 8, (100, 100, 100)).luma();
        let crop = gray.region(6, 6, 10, 10);
        assert_eq!((crop.width(), crop.height()), (2, 2));
    }
}
