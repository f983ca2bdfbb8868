//! Recipe resolution.
//!
//! Allocation is greedy and order sensitive: combos are served in the order
//! given, ingredients in recipe order, and every scanned instance is consumed
//! at most once across the whole pass. Earlier combos win scarce items.

use std::collections::{BTreeMap, VecDeque};

use crate::{Catalog, CatalogError, COMBO_ITEM};

/// Recursion limit for recipe expansion.
pub const MAX_RECIPE_DEPTH: usize = 32;

/// Pixel location inside the scanned region (top-left of the match).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Location {
	pub x: u32,
	pub y: u32,
}

impl Location {
	pub const fn new(x: u32, y: u32) -> Self {
		Self { x, y }
	}

	pub fn offset(self, dx: u32, dy: u32) -> Self {
		Self::new(self.x + dx, self.y + dy)
	}
}

impl From<(u32, u32)> for Location {
	fn from((x, y): (u32, u32)) -> Self {
		Self::new(x, y)
	}
}

/// One detected instance of an item.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Finding {
	pub location: Location,
	/// Correlation score measured at this location.
	///
	/// This is the actual score, not the threshold that admitted it; it is
	/// always at or above that threshold.
	pub score: f32,
}

/// Item name to detected instances, in the matcher's raster order.
pub type Findings = BTreeMap<String, Vec<Finding>>;

/// A successfully found or crafted item.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Resolution {
	pub item: String,
	/// Base-item locations backing this entry.
	pub locations: Vec<Location>,
	/// `true` when the entry was satisfied entirely from the inventory.
	pub direct: bool,
}

enum Outcome {
	Found(Location),
	Crafted(Vec<Location>),
	Missing,
}

type Pool = BTreeMap<String, VecDeque<Location>>;

fn pop_front(pool: &mut Pool, item: &str) -> Option<Location> {
	let list = pool.get_mut(item)?;
	let loc = list.pop_front();
	if list.is_empty() {
		pool.remove(item);
	}
	loc
}

/// Owns the inventory and the reservation pool for one resolution pass.
pub struct Allocator<'a> {
	catalog: &'a Catalog,
	inventory: Pool,
	reserved: Pool,
	shortages: Vec<String>,
	resolved: Vec<Resolution>,
}

impl<'a> Allocator<'a> {
	pub fn new(catalog: &'a Catalog, findings: &Findings) -> Self {
		let inventory = findings
			.iter()
			.filter(|(_, v)| !v.is_empty())
			.map(|(name, v)| (name.clone(), v.iter().map(|f| f.location).collect()))
			.collect();

		Self {
			catalog,
			inventory,
			reserved: Pool::new(),
			shortages: Vec::new(),
			resolved: Vec::new(),
		}
	}

	/// Consume the next instance of `item`, preferring scanned instances over reservations.
	pub fn take(&mut self, item: &str) -> Option<Location> {
		pop_front(&mut self.inventory, item).or_else(|| pop_front(&mut self.reserved, item))
	}

	/// Set `location` aside for a later search for `item`.
	pub fn reserve(&mut self, item: &str, location: Location) {
		self.reserved.entry(item.to_owned()).or_default().push_back(location);
	}

	/// Scanned instances of `item` not yet consumed.
	pub fn available(&self, item: &str) -> usize {
		self.inventory.get(item).map_or(0, |v| v.len())
	}

	/// Reserved instances of `item`, in the order they will be handed out.
	pub fn reserved(&self, item: &str) -> Vec<Location> {
		self.reserved
			.get(item)
			.map(|v| v.iter().copied().collect())
			.unwrap_or_default()
	}

	pub fn inventory(&self) -> &BTreeMap<String, VecDeque<Location>> {
		&self.inventory
	}

	pub fn reservations(&self) -> &BTreeMap<String, VecDeque<Location>> {
		&self.reserved
	}

	/// Ingredients that were missing during failed crafts, in discovery order.
	pub fn shortages(&self) -> &[String] {
		&self.shortages
	}

	pub fn resolutions(&self) -> &[Resolution] {
		&self.resolved
	}

	pub fn into_resolutions(self) -> Vec<Resolution> {
		self.resolved
	}

	/// Allocate one combo and return the entries it produced.
	///
	/// If the inventory already holds every member, one instance of each is
	/// consumed and a single [`COMBO_ITEM`] entry is emitted. Otherwise each
	/// member is searched for independently and only crafted sub-items are
	/// recorded; the combo itself is never assembled in that branch.
	pub fn allocate<S: AsRef<str>>(&mut self, combo: &[S]) -> crate::Result<&[Resolution]> {
		self.catalog.validate_combo(combo)?;
		let start = self.resolved.len();

		if self.combo_in_inventory(combo) {
			let locations = combo
				.iter()
				.filter_map(|name| pop_front(&mut self.inventory, name.as_ref()))
				.collect::<Vec<_>>();
			log::debug!("combo found complete in inventory: {locations:?}");
			self.resolved.push(Resolution {
				item: COMBO_ITEM.to_owned(),
				locations,
				direct: true,
			});
		} else {
			let shortages = self.shortages.len();
			for name in combo {
				self.search(name.as_ref(), 0)?;
			}
			if self.shortages.len() > shortages {
				log::debug!("short: {:?}", &self.shortages[shortages..]);
			}
		}

		Ok(&self.resolved[start..])
	}

	fn combo_in_inventory<S: AsRef<str>>(&self, combo: &[S]) -> bool {
		let mut needed = BTreeMap::<&str, usize>::new();
		for name in combo {
			*needed.entry(name.as_ref()).or_insert(0) += 1;
		}
		needed.into_iter().all(|(name, count)| self.available(name) >= count)
	}

	fn search(&mut self, item: &str, depth: usize) -> crate::Result<Outcome> {
		if depth > MAX_RECIPE_DEPTH {
			return Err(CatalogError::RecipeCycleDetected {
				item: item.to_owned(),
				depth,
			});
		}

		if let Some(loc) = self.take(item) {
			return Ok(Outcome::Found(loc));
		}

		let catalog = self.catalog;
		let recipe = catalog.ingredients_of(item)?;
		if recipe.is_empty() {
			return Ok(Outcome::Missing);
		}

		let mut outcomes = Vec::with_capacity(recipe.len());
		for ingredient in recipe {
			outcomes.push(self.search(ingredient, depth + 1)?);
		}

		if outcomes.iter().all(|v| !matches!(v, Outcome::Missing)) {
			let mut locations = Vec::new();
			for outcome in outcomes {
				match outcome {
					Outcome::Found(loc) => locations.push(loc),
					Outcome::Crafted(locs) => locations.extend(locs),
					Outcome::Missing => {}
				}
			}
			self.resolved.push(Resolution {
				item: item.to_owned(),
				locations: locations.clone(),
				direct: false,
			});
			return Ok(Outcome::Crafted(locations));
		}

		// Give back what was already taken so sibling branches can still use it.
		for (ingredient, outcome) in recipe.iter().zip(outcomes) {
			match outcome {
				Outcome::Found(loc) => self.reserve(ingredient, loc),
				Outcome::Missing => self.shortages.push(ingredient.clone()),
				Outcome::Crafted(_) => {}
			}
		}
		Ok(Outcome::Missing)
	}
}

/// Run one resolution pass over `combos` against a copy of `findings`.
///
/// Every combo is checked against the catalog before anything is consumed.
pub fn resolve<S: AsRef<str>>(catalog: &Catalog, findings: &Findings, combos: &[Vec<S>]) -> crate::Result<Vec<Resolution>> {
	for combo in combos {
		catalog.validate_combo(combo)?;
	}

	let mut allocator = Allocator::new(catalog, findings);
	for combo in combos {
		allocator.allocate(combo)?;
	}
	Ok(allocator.into_resolutions())
}
