//! Reference templates.
//!
//! Source pictures are authored at one resolution with a transparent
//! background. Before matching each one is flattened onto the inventory panel
//! color, resampled to the player's resolution and cropped to the glyph so
//! the varying frame decoration doesn't take part in the correlation.

use std::path::Path;

use crate::correlation::Centered;
use crate::{Color, Error, Image, OwnedImage};

/// Inventory panel background the icons are drawn over.
pub const PANEL_BACKGROUND: Color = Color::new(10, 10, 32);

/// Source pictures are square with this side length.
pub const SOURCE_PICTURE_SIZE: f32 = 78.0;

/// Scale that maps source pictures onto a 1440p capture.
const REFERENCE_SCALE: f32 = 0.91;
const REFERENCE_HEIGHT: f32 = 1440.0;

/// Kept band of the scaled picture, as fractions of width and height.
const CROP_LEFT: f32 = 1.0 / 6.0;
const CROP_RIGHT: f32 = 5.5 / 6.0;
const CROP_TOP: f32 = 1.0 / 10.0;
const CROP_BOTTOM: f32 = 2.3 / 3.0;

/// Highlights cover this share of the scaled icon.
const HIGHLIGHT_RATIO: f32 = 0.7;

/// Template scale for a screen of the given height.
///
/// Calibrated against 1440p and assumed linear in screen height.
// TODO: ultrawide and other non-16:9 layouts have not been measured.
pub fn default_scale(screen_height: u32) -> f32 {
    let constant = REFERENCE_HEIGHT / (SOURCE_PICTURE_SIZE * REFERENCE_SCALE);
    screen_height as f32 / (SOURCE_PICTURE_SIZE * constant)
}

/// A decoded source picture for one item.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub item: String,
    pub picture: image::RgbaImage,
}

impl TemplateSource {
    pub fn new(item: impl Into<String>, picture: image::RgbaImage) -> Self {
        Self {
            item: item.into(),
            picture,
        }
    }

    /// Decode a picture from memory.
    pub fn decode(item: impl Into<String>, bytes: &[u8]) -> Result<Self, Error> {
        let item = item.into();
        match image::load_from_memory(bytes) {
            Ok(img) => Ok(Self::new(item, img.to_rgba8())),
            Err(source) => Err(Error::TemplateLoad { item, source }),
        }
    }

    /// Open and decode a picture file.
    pub fn open(item: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, Error> {
        let item = item.into();
        match image::open(path) {
            Ok(img) => Ok(Self::new(item, img.to_rgba8())),
            Err(source) => Err(Error::TemplateLoad { item, source }),
        }
    }
}

/// Preprocessed matching target for one item.
#[derive(Debug, Clone)]
pub struct Template {
    item: String,
    image: OwnedImage,
    /// Where the cropped band starts inside the scaled picture.
    crop_origin: (u32, u32),
    /// Size of the scaled picture before cropping.
    scaled_size: (u32, u32),
    centered: Centered,
}

impl Template {
    pub fn prepare(source: &TemplateSource, scale: f32) -> Result<Self, Error> {
        let flat = OwnedImage::composited(&source.picture, PANEL_BACKGROUND);
        let scaled = flat.scaled(scale).map_err(|source_err| Error::Resize {
            item: source.item.clone(),
            source: source_err,
        })?;

        let band = scaled
            .as_image()
            .cropped_fraction(CROP_LEFT, CROP_TOP, CROP_RIGHT, CROP_BOTTOM);
        if band.is_empty() {
            return Err(Error::EmptyTemplate {
                item: source.item.clone(),
                scale,
            });
        }

        let crop_origin = band.origin();
        let image = band.to_owned_image();
        let centered = Centered::new(image.as_image());
        if centered.is_flat() {
            log::warn!("template for {} is a single color and will never match", source.item);
        }

        Ok(Self {
            item: source.item.clone(),
            crop_origin,
            scaled_size: (scaled.width(), scaled.height()),
            centered,
            image,
        })
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn image(&self) -> Image<'_> {
        self.image.as_image()
    }

    pub fn crop_origin(&self) -> (u32, u32) {
        self.crop_origin
    }

    pub fn scaled_size(&self) -> (u32, u32) {
        self.scaled_size
    }

    pub(crate) fn centered(&self) -> &Centered {
        &self.centered
    }
}

/// All templates at one scale, in catalog order.
///
/// The decoded sources are retained so the set can be rebuilt when the scale
/// changes.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    scale: f32,
    sources: Vec<TemplateSource>,
    templates: Vec<Template>,
}

impl TemplateSet {
    pub fn build(sources: Vec<TemplateSource>, scale: f32) -> Result<Self, Error> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::InvalidScale(scale));
        }

        let templates = sources
            .iter()
            .map(|v| Template::prepare(v, scale))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("prepared {} templates at scale {scale}", templates.len());

        Ok(Self {
            scale,
            sources,
            templates,
        })
    }

    /// Rebuild every template for a new scale. A failed rebuild leaves the
    /// set unchanged.
    pub fn rescale(&mut self, scale: f32) -> Result<(), Error> {
        if scale == self.scale {
            return Ok(());
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::InvalidScale(scale));
        }

        self.templates = self
            .sources
            .iter()
            .map(|v| Template::prepare(v, scale))
            .collect::<Result<Vec<_>, _>>()?;
        self.scale = scale;
        Ok(())
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn as_slice(&self) -> &[Template] {
        &self.templates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Template> {
        self.templates.iter()
    }

    pub fn get(&self, item: &str) -> Option<&Template> {
        self.templates.iter().find(|v| v.item == item)
    }

    /// Size of the highlight box drawn over a found `item`.
    pub fn highlight_size(&self, item: &str) -> Option<(u32, u32)> {
        self.get(item).map(|v| {
            let (w, h) = v.scaled_size;
            ((w as f32 * HIGHLIGHT_RATIO) as u32, (h as f32 * HIGHLIGHT_RATIO) as u32)
        })
    }
}

impl<'a> IntoIterator for &'a TemplateSet {
    type Item = &'a Template;
    type IntoIter = std::slice::Iter<'a, Template>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(width: u32, height: u32) -> image::RgbaImage {
        image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x * 3) as u8, (y * 5) as u8, (x * y) as u8, 255])
        })
    }

    #[test]
    fn default_scale_matches_reference() {
        assert!((default_scale(1440) - 0.91).abs() < 1e-5);
        assert!((default_scale(1080) - 0.6825).abs() < 1e-5);
    }

    #[test]
    fn prepare_scales_then_crops() {
        let source = TemplateSource::new("Toxic", opaque(78, 78));
        let template = Template::prepare(&source, 0.91).unwrap();

        // 78 * 0.91 = 70.98 -> 70
        assert_eq!(template.scaled_size(), (70, 70));
        assert_eq!(template.crop_origin(), (11, 7));
        assert_eq!((template.image().width(), template.image().height()), (53, 46));
    }

    #[test]
    fn transparent_pixels_take_panel_color() {
        let mut picture = opaque(12, 12);
        for p in picture.pixels_mut() {
            p.0[3] = 0;
        }
        let template = Template::prepare(&TemplateSource::new("Toxic", picture), 1.0).unwrap();
        let view = template.image();
        assert_eq!(view.pixel(0, 0), PANEL_BACKGROUND);
        assert_eq!(view.pixel(view.width() - 1, view.height() - 1), PANEL_BACKGROUND);
    }

    #[test]
    fn tiny_scale_is_rejected() {
        let source = TemplateSource::new("Toxic", opaque(2, 2));
        let err = Template::prepare(&source, 0.5).unwrap_err();
        assert!(matches!(err, Error::EmptyTemplate { ref item, .. } if item == "Toxic"));
    }

    #[test]
    fn rescale_rebuilds_templates() {
        let sources = vec![
            TemplateSource::new("Toxic", opaque(78, 78)),
            TemplateSource::new("Hasted", opaque(78, 78)),
        ];
        let mut set = TemplateSet::build(sources, 1.0).unwrap();
        assert_eq!(set.get("Toxic").unwrap().scaled_size(), (78, 78));
        assert_eq!(set.highlight_size("Toxic"), Some((54, 54)));

        set.rescale(0.5).unwrap();
        assert_eq!(set.scale(), 0.5);
        assert_eq!(set.get("Hasted").unwrap().scaled_size(), (39, 39));
        assert_eq!(set.iter().map(|v| v.item()).collect::<Vec<_>>(), ["Toxic", "Hasted"]);

        assert!(matches!(set.rescale(0.0), Err(Error::InvalidScale(_))));
        assert_eq!(set.scale(), 0.5);
    }

    #[test]
    fn corrupt_picture_names_the_item() {
        let err = TemplateSource::decode("Opulent", b"definitely not a png").unwrap_err();
        assert!(matches!(err, Error::TemplateLoad { ref item, .. } if item == "Opulent"));
        assert!(err.to_string().contains("Opulent"));
    }
}
