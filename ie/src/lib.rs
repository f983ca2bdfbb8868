mod image;
pub use image::*;
pub mod correlation;
mod scan;
pub use scan::*;
mod template;
pub use template::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("failed to load reference picture for {item}")]
	TemplateLoad {
		item: String,
		#[source]
		source: ::image::ImageError,
	},
	#[error("failed to resize reference picture for {item}")]
	Resize {
		item: String,
		#[source]
		source: ResizeError,
	},
	#[error("reference picture for {item} is empty after cropping at scale {scale}")]
	EmptyTemplate {
		item: String,
		scale: f32,
	},
	#[error("image scale must be a positive number, got {0}")]
	InvalidScale(f32),
	#[error("confidence threshold must be in (0, 1], got {0}")]
	InvalidThreshold(f32),
}

/// Templates and scanner settings for one session.
pub struct Ie {
	templates: TemplateSet,
	scanner: Scanner,
}

impl Ie {
	pub fn try_new(sources: Vec<TemplateSource>, scale: f32, threshold: f32) -> Result<Self, Error> {
		Ok(Self {
			templates: TemplateSet::build(sources, scale)?,
			scanner: Scanner::new(threshold)?,
		})
	}

	pub fn scan(&self, region: Image) -> ScanReport {
		self.scanner.scan(&self.templates, region)
	}

	pub fn templates(&self) -> &TemplateSet {
		&self.templates
	}

	pub fn scale(&self) -> f32 {
		self.templates.scale()
	}

	pub fn set_scale(&mut self, scale: f32) -> Result<(), Error> {
		self.templates.rescale(scale)
	}

	pub fn threshold(&self) -> f32 {
		self.scanner.threshold()
	}

	pub fn set_threshold(&mut self, threshold: f32) -> Result<(), Error> {
		self.scanner.set_threshold(threshold)
	}
}
