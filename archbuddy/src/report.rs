//! Scan output.
//!
//! Everything is collected into a [`Report`] first, then printed either as
//! plain text or as JSON.

use std::fmt;

use data::{Location, Resolution};
use serde::Serialize;

use crate::config::Rect;

#[derive(Debug, Clone, Serialize)]
pub struct FoundItem {
	pub item: String,
	pub location: Location,
	pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryLine {
	pub item: String,
	pub count: usize,
}

/// Screen rectangle to highlight for one backing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Highlight {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
	pub item: String,
	pub direct: bool,
	pub highlights: Vec<Highlight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
	pub total: usize,
	/// Every finding, sorted by location.
	pub findings: Vec<FoundItem>,
	/// Per-item counts in catalog order.
	pub inventory: Vec<InventoryLine>,
	/// Resolution list with locations in screen coordinates.
	pub entries: Vec<Entry>,
	pub shortages: Vec<String>,
	#[serde(skip)]
	pub show_inventory: bool,
}

impl Report {
	pub fn new(
		catalog: &data::Catalog,
		templates: &ie::TemplateSet,
		scan: &ie::ScanReport,
		window: Rect,
		resolutions: &[Resolution],
		shortages: &[String],
	) -> Self {
		let mut findings = scan
			.findings
			.iter()
			.flat_map(|(item, v)| {
				v.iter().map(move |f| FoundItem {
					item: item.clone(),
					location: f.location,
					score: f.score,
				})
			})
			.collect::<Vec<_>>();
		findings.sort_by(|a, b| a.location.cmp(&b.location).then_with(|| a.item.cmp(&b.item)));

		let inventory = catalog
			.all_items()
			.filter_map(|item| {
				let count = scan.findings.get(item).map_or(0, Vec::len);
				(count > 0).then(|| InventoryLine {
					item: item.to_owned(),
					count,
				})
			})
			.collect();

		// Combo entries span several items; every picture shares one source size.
		let fallback = templates
			.iter()
			.next()
			.and_then(|t| templates.highlight_size(t.item()))
			.unwrap_or((0, 0));
		let entries = resolutions
			.iter()
			.map(|r| {
				let (width, height) = templates.highlight_size(&r.item).unwrap_or(fallback);
				Entry {
					item: r.item.clone(),
					direct: r.direct,
					highlights: r
						.locations
						.iter()
						.map(|loc| {
							let loc = loc.offset(window.x, window.y);
							Highlight { x: loc.x, y: loc.y, width, height }
						})
						.collect(),
				}
			})
			.collect();

		Self {
			total: scan.total(),
			findings,
			inventory,
			entries,
			shortages: shortages.to_vec(),
			show_inventory: false,
		}
	}

	pub fn with_inventory(mut self, show: bool) -> Self {
		self.show_inventory = show;
		self
	}

	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}
}

impl fmt::Display for Report {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Count: {}", self.total)?;
		for found in &self.findings {
			writeln!(f, "({}, {}) {}", found.location.x, found.location.y, found.item)?;
		}

		if self.show_inventory && !self.inventory.is_empty() {
			writeln!(f)?;
			writeln!(f, "Inventory:")?;
			for line in &self.inventory {
				writeln!(f, "  x{} {}", line.count, line.item)?;
			}
		}

		writeln!(f)?;
		if self.entries.is_empty() {
			writeln!(f, "Nothing to craft.")?;
		} else {
			writeln!(f, "Available:")?;
			for entry in &self.entries {
				let kind = if entry.direct { "direct" } else { "crafted" };
				write!(f, "  {} [{kind}]:", entry.item)?;
				for h in &entry.highlights {
					write!(f, " ({}, {})", h.x, h.y)?;
				}
				writeln!(f)?;
			}
		}

		if !self.shortages.is_empty() {
			writeln!(f, "Short: {}", self.shortages.join(", "))?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use data::Finding;

	use super::*;

	fn templates() -> ie::TemplateSet {
		let picture = image::RgbaImage::from_fn(10, 10, |x, y| image::Rgba([(x * 25) as u8, (y * 25) as u8, 40, 255]));
		let sources = ["Toxic", "Hasted", "Sentinel"]
			.into_iter()
			.map(|item| ie::TemplateSource::new(item, picture.clone()))
			.collect();
		ie::TemplateSet::build(sources, 1.0).unwrap()
	}

	fn finding(x: u32, y: u32) -> Finding {
		Finding {
			location: Location::new(x, y),
			score: 0.97,
		}
	}

	fn scan() -> ie::ScanReport {
		let mut scan = ie::ScanReport::default();
		scan.findings.insert("Toxic".into(), vec![finding(50, 2), finding(3, 40)]);
		scan.findings.insert("Hasted".into(), vec![finding(3, 10)]);
		scan
	}

	fn report() -> Report {
		let catalog = data::Catalog::archnemesis();
		let window = Rect { x: 100, y: 200, width: 80, height: 80 };
		let resolutions = vec![
			Resolution {
				item: "Sentinel".into(),
				locations: vec![Location::new(3, 40), Location::new(3, 10)],
				direct: false,
			},
			Resolution {
				item: data::COMBO_ITEM.into(),
				locations: vec![Location::new(50, 2)],
				direct: true,
			},
		];
		Report::new(&catalog, &templates(), &scan(), window, &resolutions, &["Steel-Infused".into()])
	}

	#[test]
	fn findings_are_sorted_by_location() {
		let report = report();
		assert_eq!(report.total, 3);
		let order = report
			.findings
			.iter()
			.map(|f| (f.location.x, f.location.y))
			.collect::<Vec<_>>();
		assert_eq!(order, [(3, 10), (3, 40), (50, 2)]);
	}

	#[test]
	fn inventory_follows_catalog_order() {
		let catalog = data::Catalog::archnemesis();
		let report = report();
		let positions = report
			.inventory
			.iter()
			.map(|l| catalog.position(&l.item).unwrap())
			.collect::<Vec<_>>();
		assert!(positions.windows(2).all(|w| w[0] < w[1]));
		assert!(report.inventory.contains(&InventoryLine { item: "Toxic".into(), count: 2 }));
	}

	#[test]
	fn entries_use_screen_coordinates() {
		let report = report();
		// 10px pictures at scale 1.0 highlight 7x7.
		assert_eq!(
			report.entries[0].highlights,
			[
				Highlight { x: 103, y: 240, width: 7, height: 7 },
				Highlight { x: 103, y: 210, width: 7, height: 7 },
			]
		);
		assert_eq!(report.entries[1].highlights[0], Highlight { x: 150, y: 202, width: 7, height: 7 });
	}

	#[test]
	fn text_output() {
		let text = report().with_inventory(true).to_string();
		assert!(text.starts_with("Count: 3\n(3, 10) Hasted\n"));
		assert!(text.contains("  x2 Toxic\n"));
		assert!(text.contains("  Sentinel [crafted]: (103, 240) (103, 210)\n"));
		assert!(text.contains("  Combo [direct]: (150, 202)\n"));
		assert!(text.contains("Short: Steel-Infused"));

		assert!(!report().to_string().contains("Inventory:"));
	}

	#[test]
	fn entry_without_locations_still_ends_its_line() {
		let mut report = report();
		report.entries[1].highlights.clear();
		let text = report.to_string();
		assert!(text.contains("  Combo [direct]:\nShort: Steel-Infused\n"));
	}

	#[test]
	fn json_output() {
		let json: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
		assert_eq!(json["total"], 3);
		assert_eq!(json["entries"][0]["item"], "Sentinel");
		assert_eq!(json["entries"][1]["direct"], true);
		assert!(json.get("show_inventory").is_none());
	}
}
