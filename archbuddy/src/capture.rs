use std::path::Path;

use anyhow::{Context, Result, ensure};
use xcap::image::EncodableLayout;

use crate::config::Rect;

/// Capture the primary monitor.
pub fn capture_primary() -> Result<ie::OwnedImage> {
	let monitors = xcap::Monitor::all().context("enumerate monitors")?;
	let monitor = monitors
		.into_iter()
		.find(|m| m.is_primary().unwrap_or(false))
		.context("no primary monitor")?;
	let img = monitor.capture_image().context("capture primary monitor")?;
	tracing::debug!(width = img.width(), height = img.height(), "captured screen");
	Ok(ie::OwnedImage::from_rgba(img.width() as usize, img.as_bytes()))
}

/// Load a saved screenshot instead of capturing the screen.
pub fn load_screenshot(path: &Path) -> Result<ie::OwnedImage> {
	let img = image::open(path).with_context(|| format!("open screenshot {:?}", path))?;
	Ok(ie::OwnedImage::from_rgba_image(&img.to_rgba8()))
}

/// Cut the scanner window out of a full screen capture.
pub fn crop_region(screen: &ie::OwnedImage, window: Rect) -> Result<ie::OwnedImage> {
	let fits = window.x.checked_add(window.width).is_some_and(|r| r <= screen.width())
		&& window.y.checked_add(window.height).is_some_and(|b| b <= screen.height());
	ensure!(
		fits,
		"scanner window {window} lies outside the {}x{} screen",
		screen.width(),
		screen.height()
	);

	Ok(screen
		.as_image()
		.sub_image(window.x, window.y, window.width, window.height)
		.to_owned_image())
}
