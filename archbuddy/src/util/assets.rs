use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Folder name accepted below any search location.
const PICTURES_DIR: &str = "pictures";

/// File holding the reference picture for `item`.
pub fn picture_path(dir: &Path, item: &str) -> PathBuf {
	dir.join(format!("{item}.png"))
}

/// Catalog items that have a reference picture.
fn scannable(catalog: &data::Catalog) -> impl Iterator<Item = &str> + Clone + '_ {
	catalog.all_items().filter(|v| *v != data::COMBO_ITEM)
}

fn has_any_picture(dir: &Path, items: &[&str]) -> bool {
	items.iter().any(|item| picture_path(dir, item).is_file())
}

fn normalize_pictures_dir(dir: PathBuf, items: &[&str]) -> PathBuf {
	// Accept either the folder holding the pictures or its parent.
	if has_any_picture(&dir, items) {
		dir
	} else {
		dir.join(PICTURES_DIR)
	}
}

/// Locate the reference pictures, both when running from the repo
/// (`cargo run`) and from a packaged binary with the pictures next to it.
///
/// Discovery can be overridden with `ARCHBUDDY_ASSETS_DIR`. A directory is
/// accepted when it holds the picture of at least one catalog item; missing
/// pictures are dealt with when loading.
pub fn resolve_pictures_dir(catalog: &data::Catalog) -> Result<PathBuf> {
	let mut candidates: Vec<PathBuf> = Vec::new();
	if let Some(dir) = std::env::var_os("ARCHBUDDY_ASSETS_DIR") {
		candidates.push(PathBuf::from(dir));
	}
	if let Ok(exe) = std::env::current_exe()
		&& let Some(dir) = exe.parent()
	{
		candidates.push(dir.to_path_buf());
	}
	if let Ok(cwd) = std::env::current_dir() {
		candidates.push(cwd);
	}
	#[cfg(debug_assertions)]
	candidates.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".."));

	find_pictures_dir(candidates, &scannable(catalog).collect::<Vec<_>>())
}

fn find_pictures_dir(candidates: Vec<PathBuf>, items: &[&str]) -> Result<PathBuf> {
	let mut tried = Vec::new();
	for base in candidates {
		let dir = normalize_pictures_dir(base, items);
		if has_any_picture(&dir, items) {
			return Ok(dir);
		}
		tried.push(dir);
	}

	bail!(
		"reference pictures not found (expected files like {}.png).\n\nSearched in:\n{}\n\nFix: copy the '{PICTURES_DIR}/' folder next to the executable (or set ARCHBUDDY_ASSETS_DIR to the folder that contains it).",
		items.first().copied().unwrap_or("<Item>"),
		tried
			.into_iter()
			.map(|p| format!("  - {}", p.display()))
			.collect::<Vec<_>>()
			.join("\n")
	)
}

/// Load the picture of every scannable catalog item from `dir`.
///
/// With `strict` the first missing or corrupt picture is an error. Otherwise
/// the item is skipped with a warning and won't be scanned.
pub fn load_sources(catalog: &data::Catalog, dir: &Path, strict: bool) -> Result<Vec<ie::TemplateSource>> {
	let mut sources = Vec::with_capacity(catalog.len());
	for item in scannable(catalog) {
		match ie::TemplateSource::open(item, picture_path(dir, item)) {
			Ok(source) => sources.push(source),
			Err(err) if !strict => {
				tracing::warn!(error = %err, item, "skipping item without a usable picture");
			}
			Err(err) => return Err(err.into()),
		}
	}
	tracing::info!(count = sources.len(), dir = %dir.display(), "loaded reference pictures");
	Ok(sources)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scratch_dir(name: &str) -> PathBuf {
		let dir = std::env::temp_dir().join(format!("archbuddy-{name}-{}", std::process::id()));
		let _ = std::fs::remove_dir_all(&dir);
		std::fs::create_dir_all(&dir).unwrap();
		dir
	}

	fn write_picture(dir: &Path, item: &str) {
		image::RgbaImage::from_fn(12, 12, |x, y| image::Rgba([(x * 20) as u8, (y * 20) as u8, 7, 255]))
			.save(picture_path(dir, item))
			.unwrap();
	}

	fn small_catalog() -> data::Catalog {
		data::Catalog::new([
			("Toxic", vec![]),
			("Hasted", vec![]),
			("Sentinel", vec!["Toxic", "Hasted"]),
			(data::COMBO_ITEM, vec![]),
		])
		.unwrap()
	}

	#[test]
	fn lenient_loading_skips_missing_pictures() {
		let dir = scratch_dir("lenient");
		write_picture(&dir, "Toxic");
		write_picture(&dir, "Sentinel");

		let sources = load_sources(&small_catalog(), &dir, false).unwrap();
		let items = sources.iter().map(|v| v.item.as_str()).collect::<Vec<_>>();
		assert_eq!(items, ["Toxic", "Sentinel"]);
	}

	#[test]
	fn strict_loading_names_the_missing_item() {
		let dir = scratch_dir("strict");
		write_picture(&dir, "Toxic");

		let err = load_sources(&small_catalog(), &dir, true).unwrap_err();
		assert!(err.to_string().contains("Hasted"));
	}

	#[test]
	fn pictures_subfolder_is_accepted() {
		let root = scratch_dir("subfolder");
		let pictures = root.join(PICTURES_DIR);
		std::fs::create_dir_all(&pictures).unwrap();
		write_picture(&pictures, "Toxic");

		let items = ["Toxic", "Hasted"];
		assert_eq!(normalize_pictures_dir(root.clone(), &items), pictures);
		assert_eq!(normalize_pictures_dir(pictures.clone(), &items), pictures);
	}

	#[test]
	fn folder_missing_the_first_picture_is_still_found() {
		let empty = scratch_dir("discovery-empty");
		let partial = scratch_dir("discovery-partial");
		write_picture(&partial, "Sentinel");

		let catalog = small_catalog();
		let items = scannable(&catalog).collect::<Vec<_>>();
		assert_eq!(items, ["Toxic", "Hasted", "Sentinel"]);

		let found = find_pictures_dir(vec![empty.clone(), partial.clone()], &items).unwrap();
		assert_eq!(found, partial);

		let err = find_pictures_dir(vec![empty.clone()], &items).unwrap_err();
		assert!(err.to_string().contains(&empty.join(PICTURES_DIR).display().to_string()));
	}
}
