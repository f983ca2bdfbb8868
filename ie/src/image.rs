//! Image primitives and utilities.
//!
//! The project uses a lightweight owned RGB image type (`OwnedImage`) for
//! captured regions and preprocessed templates.
//!
//! Matching only ever reads pixels, so most operations borrow a view
//! (`Image<'a>`) instead of copying. Views convert back to owned images when a
//! copy is needed (template crops, debug snapshots).

use anyhow::{Context, Result};

/// Owned RGB image (no alpha).
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedImage {
    width: u32,
    height: u32,
    data: Vec<Color>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResizeError {
    #[error("invalid source buffer: {0}")]
    Buffer(#[from] fast_image_resize::ImageBufferError),
    #[error(transparent)]
    Resize(#[from] fast_image_resize::ResizeError),
}

impl OwnedImage {
    /// Build an `OwnedImage` from RGBA bytes (alpha is discarded).
    ///
    /// The buffer is expected to be tightly packed: `width * height * 4` bytes.
    pub fn from_rgba(width: usize, bytes: &[u8]) -> Self {
        let height = bytes.len() / width.max(1) / 4;
        let data = bytes
            .chunks_exact(4)
            .take(width * height)
            .map(|v| Color::new(v[0], v[1], v[2]))
            .collect::<Vec<_>>();

        Self {
            width: width as u32,
            height: height as u32,
            data,
        }
    }

    /// Convert a decoded RGBA image, discarding alpha.
    pub fn from_rgba_image(image: &image::RgbaImage) -> Self {
        Self::from_rgba(image.width() as usize, image.as_raw())
    }

    /// Flatten an RGBA picture onto an opaque `background`.
    ///
    /// Each channel is blended as `src * a + background * (1 - a)`, which is
    /// what compositing onto a fully opaque backdrop reduces to.
    pub fn composited(image: &image::RgbaImage, background: Color) -> Self {
        let blend = |src: u8, bg: u8, a: u32| -> u8 {
            ((src as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
        };

        let data = image
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                let a = a as u32;
                Color::new(
                    blend(r, background.r, a),
                    blend(g, background.g, a),
                    blend(b, background.b, a),
                )
            })
            .collect();

        Self {
            width: image.width(),
            height: image.height(),
            data,
        }
    }

    pub fn from_pixels(width: u32, height: u32, data: Vec<Color>) -> Option<Self> {
        (data.len() == (width * height) as usize).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize to exactly `width` x `height` with nearest-neighbour sampling.
    ///
    /// Uses `fast_image_resize` and keeps output in `Vec<Color>`.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ResizeError> {
        let width = width.max(1);
        let height = height.max(1);
        if self.width == width && self.height == height {
            return Ok(());
        }

        // SAFETY: `Color` is `#[repr(C)]` with 3 x `u8`, so it is layout-compatible
        // with `fast_image_resize::pixels::U8x3` (alignment 1).
        let src_pixels = unsafe {
            std::slice::from_raw_parts(
                self.data.as_ptr() as *const fast_image_resize::pixels::U8x3,
                self.data.len(),
            )
        };

        let src = fast_image_resize::images::ImageRef::from_pixels(self.width, self.height, src_pixels)?;
        let mut dst = fast_image_resize::images::Image::new(width, height, fast_image_resize::PixelType::U8x3);

        let mut resizer = fast_image_resize::Resizer::new();
        let options = fast_image_resize::ResizeOptions::new().resize_alg(fast_image_resize::ResizeAlg::Nearest);
        resizer.resize(&src, &mut dst, &Some(options))?;

        let bytes: Vec<u8> = dst.into_vec();
        let mut data = Vec::with_capacity((width * height) as usize);
        for px in bytes.chunks_exact(3) {
            data.push(Color::new(px[0], px[1], px[2]));
        }

        self.width = width;
        self.height = height;
        self.data = data;
        Ok(())
    }

    /// Scale both dimensions by `scale` (truncating, never below one pixel).
    pub fn scaled(mut self, scale: f32) -> Result<Self, ResizeError> {
        let width = (self.width as f32 * scale) as u32;
        let height = (self.height as f32 * scale) as u32;
        self.resize(width, height)?;
        Ok(self)
    }

    /// Create a borrowed view of this entire image.
    pub fn as_image<'a>(&'a self) -> Image<'a> {
        Image {
            x1: 0,
            y1: 0,
            x2: self.width,
            y2: self.height,
            true_width: self.width,
            data: &self.data,
        }
    }
}

// ----------

/// Borrowed image view into an `OwnedImage`.
#[derive(Clone, Copy)]
pub struct Image<'a> {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
    true_width: u32,
    data: &'a [Color],
}

impl<'a> Image<'a> {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Pixel at view-relative coordinates.
    #[inline(always)]
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.data[(self.x1 + x + (self.y1 + y) * self.true_width) as usize]
    }

    /// One row of the view, left to right.
    #[inline(always)]
    pub fn row(&self, y: u32) -> &'a [Color] {
        let start = (self.x1 + (self.y1 + y) * self.true_width) as usize;
        &self.data[start..start + self.width() as usize]
    }

    pub fn to_owned_image(self) -> OwnedImage {
        let mut data = Vec::with_capacity((self.width() * self.height()) as usize);
        for y in 0..self.height() {
            data.extend_from_slice(self.row(y));
        }

        OwnedImage {
            width: self.width(),
            height: self.height(),
            data,
        }
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.width() * self.height() * 3) as usize);
        for y in 0..self.height() {
            for clr in self.row(y) {
                bytes.extend_from_slice(&[clr.r, clr.g, clr.b]);
            }
        }
        bytes
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let clr = self.pixel(x, y);
            image::Rgb([clr.r, clr.g, clr.b])
        })
    }

    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        self.to_rgb_image()
            .save_with_format(path, image::ImageFormat::Png)
            .context("save png")?;
        Ok(())
    }

    /// Create an arbitrary subimage (relative coordinates).
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);

        Self {
            x1: self.x1 + x,
            y1: self.y1 + y,
            x2: self.x1 + x + width,
            y2: self.y1 + y + height,
            true_width: self.true_width,
            data: self.data,
        }
    }

    /// Keep the band between fractional edges, measured from the top-left.
    ///
    /// `left`/`right` are fractions of the width and `top`/`bottom` of the
    /// height; edges are truncated to whole pixels.
    pub fn cropped_fraction(&self, left: f32, top: f32, right: f32, bottom: f32) -> Self {
        let w = self.width() as f32;
        let h = self.height() as f32;
        let x1 = (w * left) as u32;
        let y1 = (h * top) as u32;
        let x2 = (w * right) as u32;
        let y2 = (h * bottom) as u32;

        self.sub_image(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
    }

    /// Offset of this view's top-left corner inside the backing image.
    pub fn origin(&self) -> (u32, u32) {
        (self.x1, self.y1)
    }
}

// ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline(always)]
    pub fn channels(&self) -> [f64; 3] {
        [self.r as f64, self.g as f64, self.b as f64]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> OwnedImage {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| Color::new(x as u8, y as u8, (x + y) as u8)))
            .collect();
        OwnedImage::from_pixels(width, height, data).unwrap()
    }

    #[test]
    fn composite_respects_alpha() {
        let bg = Color::new(10, 10, 32);
        let mut picture = image::RgbaImage::new(2, 1);
        picture.put_pixel(0, 0, image::Rgba([200, 100, 50, 255]));
        picture.put_pixel(1, 0, image::Rgba([200, 100, 50, 0]));

        let flat = OwnedImage::composited(&picture, bg);
        assert_eq!(flat.as_image().pixel(0, 0), Color::new(200, 100, 50));
        assert_eq!(flat.as_image().pixel(1, 0), bg);
    }

    #[test]
    fn half_alpha_blends_towards_background() {
        let mut picture = image::RgbaImage::new(1, 1);
        picture.put_pixel(0, 0, image::Rgba([255, 255, 255, 128]));
        let flat = OwnedImage::composited(&picture, Color::BLACK);
        assert_eq!(flat.as_image().pixel(0, 0), Color::new(128, 128, 128));
    }

    #[test]
    fn nearest_upscale_repeats_pixels() {
        let img = gradient(2, 2).scaled(2.0).unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
        let view = img.as_image();
        assert_eq!(view.pixel(0, 0), view.pixel(1, 1));
        assert_eq!(view.pixel(3, 3), Color::new(1, 1, 2));
    }

    #[test]
    fn scaling_never_collapses_to_zero() {
        let img = gradient(3, 3).scaled(0.01).unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
    }

    #[test]
    fn sub_image_is_clamped() {
        let img = gradient(10, 8);
        let view = img.as_image().sub_image(6, 5, 100, 100);
        assert_eq!((view.width(), view.height()), (4, 3));
        assert_eq!(view.pixel(0, 0), Color::new(6, 5, 11));
        assert_eq!(view.origin(), (6, 5));
    }

    #[test]
    fn fractional_crop_truncates_edges() {
        let img = gradient(30, 20);
        let view = img.as_image().cropped_fraction(1.0 / 6.0, 0.1, 5.5 / 6.0, 2.3 / 3.0);
        assert_eq!(view.origin(), (5, 2));
        assert_eq!((view.width(), view.height()), (22, 13));

        let owned = view.to_owned_image();
        assert_eq!(owned.as_image().pixel(0, 0), Color::new(5, 2, 7));
    }

    #[test]
    fn rgba_bytes_drop_alpha() {
        let img = OwnedImage::from_rgba(2, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(img.as_image().get_bytes(), [1, 2, 3, 5, 6, 7]);
        assert_eq!(img.as_image().to_rgb_image().into_raw(), [1, 2, 3, 5, 6, 7]);
    }
}
