use std::collections::HashMap;

/// Synthetic item used for combos that were found complete in the inventory.
pub const COMBO_ITEM: &str = "Combo";

/// Archnemesis modifiers in display order, each with its recipe.
///
/// An empty recipe marks a base modifier, which can only be found and never crafted.
const ARCHNEMESIS: &[(&str, &[&str])] = &[
	("Kitava-Touched", &["Tukohama-Touched", "Abberath-Touched", "Corrupter", "Corpse Detonator"]),
	("Innocence-Touched", &["Lunaris-Touched", "Solaris-Touched", "Mirror Image", "Mana Siphoner"]),
	("Shakari-Touched", &["Entangler", "Soul Eater", "Drought Bringer"]),
	("Abberath-Touched", &["Flame Strider", "Frenzied", "Rejuvenating"]),
	("Tukohama-Touched", &["Bonebreaker", "Executioner", "Magma Barrier"]),
	("Brine King-Touched", &["Ice Prison", "Storm Strider", "Heralding Minions"]),
	("Arakaali-Touched", &["Corpse Detonator", "Entangler", "Assassin"]),
	("Solaris-Touched", &["Invulnerable", "Magma Barrier", "Empowered Minions"]),
	("Lunaris-Touched", &["Invulnerable", "Frost Strider", "Empowered Minions"]),
	("Effigy", &["Hexer", "Malediction", "Corrupter"]),
	("Empowered Elements", &["Evocationist", "Steel-Infused", "Chaosweaver"]),
	("Crystal-Skinned", &["Permafrost", "Rejuvenating", "Berserker"]),
	("Invulnerable", &["Sentinel", "Juggernaut", "Consecrator"]),
	("Corrupter", &["Bloodletter", "Chaosweaver"]),
	("Mana Siphoner", &["Consecrator", "Dynamo"]),
	("Storm Strider", &["Stormweaver", "Hasted"]),
	("Mirror Image", &["Echoist", "Soul Conduit"]),
	("Magma Barrier", &["Incendiary", "Bonebreaker"]),
	("Evocationist", &["Flameweaver", "Frostweaver", "Stormweaver"]),
	("Corpse Detonator", &["Necromancer", "Incendiary"]),
	("Flame Strider", &["Flameweaver", "Hasted"]),
	("Soul Eater", &["Soul Conduit", "Necromancer", "Gargantuan"]),
	("Ice Prison", &["Permafrost", "Sentinel"]),
	("Frost Strider", &["Frostweaver", "Hasted"]),
	("Treant Horde", &["Toxic", "Sentinel", "Steel-Infused"]),
	("Temporal Bubble", &["Juggernaut", "Hexer", "Arcane Buffer"]),
	("Entangler", &["Toxic", "Bloodletter"]),
	("Drought Bringer", &["Malediction", "Deadeye"]),
	("Hexer", &["Chaosweaver", "Echoist"]),
	("Executioner", &["Frenzied", "Berserker"]),
	("Rejuvenating", &["Gargantuan", "Vampiric"]),
	("Necromancer", &["Bombardier", "Overcharged"]),
	("Trickster", &["Overcharged", "Assassin", "Echoist"]),
	("Assassin", &["Deadeye", "Vampiric"]),
	("Empowered Minions", &["Necromancer", "Executioner", "Gargantuan"]),
	("Heralding Minions", &["Dynamo", "Arcane Buffer"]),
	("Arcane Buffer", &[]),
	("Berserker", &[]),
	("Bloodletter", &[]),
	("Bombardier", &[]),
	("Bonebreaker", &[]),
	("Chaosweaver", &[]),
	("Consecrator", &[]),
	("Deadeye", &[]),
	("Dynamo", &[]),
	("Echoist", &[]),
	("Flameweaver", &[]),
	("Frenzied", &[]),
	("Frostweaver", &[]),
	("Gargantuan", &[]),
	("Hasted", &[]),
	("Incendiary", &[]),
	("Juggernaut", &[]),
	("Malediction", &[]),
	("Opulent", &[]),
	("Overcharged", &[]),
	("Permafrost", &[]),
	("Sentinel", &[]),
	("Soul Conduit", &[]),
	("Steel-Infused", &[]),
	("Stormweaver", &[]),
	("Toxic", &[]),
	("Vampiric", &[]),
	(COMBO_ITEM, &[]),
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
	#[error("unknown item {name:?}{}", .suggestion.as_ref().map(|s| format!(" (did you mean {s:?}?)")).unwrap_or_default())]
	UnknownItem {
		name: String,
		suggestion: Option<String>,
	},
	#[error("item {0:?} is declared more than once")]
	DuplicateItem(String),
	#[error("recipe cycle detected while expanding {item:?} (depth {depth})")]
	RecipeCycleDetected {
		item: String,
		depth: usize,
	},
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
	pub name: String,
	/// Ingredient names in declared order; empty for base items.
	pub recipe: Vec<String>,
}

impl Item {
	pub fn is_base(&self) -> bool {
		self.recipe.is_empty()
	}
}

/// Ordered, read-only table of items and their recipes.
///
/// Declaration order is the display order and also fixes allocation
/// precedence, so items are kept in a `Vec` with a side index for lookups.
#[derive(Debug, Clone)]
pub struct Catalog {
	items: Vec<Item>,
	index: HashMap<String, usize>,
}

impl Default for Catalog {
	fn default() -> Self {
		Self::archnemesis()
	}
}

impl Catalog {
	/// Build a catalog from `(name, recipe)` pairs.
	///
	/// Rejects duplicate names, ingredients missing from the catalog and
	/// recipes that (directly or transitively) contain themselves.
	pub fn new<I, N, R, S>(entries: I) -> crate::Result<Self>
	where
		I: IntoIterator<Item = (N, R)>,
		N: Into<String>,
		R: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut items = Vec::new();
		let mut index = HashMap::new();
		for (name, recipe) in entries {
			let name = name.into();
			if index.contains_key(&name) {
				return Err(CatalogError::DuplicateItem(name));
			}
			index.insert(name.clone(), items.len());
			items.push(Item {
				name,
				recipe: recipe.into_iter().map(Into::into).collect(),
			});
		}

		let catalog = Self::from_parts(items, index);
		for item in &catalog.items {
			for ingredient in &item.recipe {
				if !catalog.contains(ingredient) {
					return Err(catalog.unknown(ingredient));
				}
			}
		}
		catalog.check_acyclic()?;

		Ok(catalog)
	}

	/// The built-in archnemesis catalog.
	pub fn archnemesis() -> Self {
		let items = ARCHNEMESIS
			.iter()
			.map(|(name, recipe)| Item {
				name: name.to_string(),
				recipe: recipe.iter().map(|v| v.to_string()).collect(),
			})
			.collect::<Vec<_>>();
		let index = items
			.iter()
			.enumerate()
			.map(|(i, v)| (v.name.clone(), i))
			.collect();
		Self::from_parts(items, index)
	}

	/// Skips validation. The table is trusted to be well formed.
	pub(crate) fn from_parts(items: Vec<Item>, index: HashMap<String, usize>) -> Self {
		Self { items, index }
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.index.contains_key(name)
	}

	/// Declaration index of `name`, used to order displays.
	pub fn position(&self, name: &str) -> Option<usize> {
		self.index.get(name).copied()
	}

	pub fn get(&self, name: &str) -> crate::Result<&Item> {
		self.index
			.get(name)
			.map(|&i| &self.items[i])
			.ok_or_else(|| self.unknown(name))
	}

	/// Recipe of `name`; empty for base items.
	pub fn ingredients_of(&self, name: &str) -> crate::Result<&[String]> {
		self.get(name).map(|v| v.recipe.as_slice())
	}

	/// Every item name in declaration order.
	pub fn all_items(&self) -> impl Iterator<Item = &str> + Clone + '_ {
		self.items.iter().map(|v| v.name.as_str())
	}

	/// Items with a non-empty recipe, in declaration order.
	pub fn recipes(&self) -> impl Iterator<Item = (&str, &[String])> + Clone + '_ {
		self.items
			.iter()
			.filter(|v| !v.is_base())
			.map(|v| (v.name.as_str(), v.recipe.as_slice()))
	}

	/// Fails with [`CatalogError::UnknownItem`] on the first name not in the catalog.
	pub fn validate_combo<S: AsRef<str>>(&self, combo: &[S]) -> crate::Result<()> {
		for name in combo {
			let name = name.as_ref();
			if !self.contains(name) {
				return Err(self.unknown(name));
			}
		}
		Ok(())
	}

	pub(crate) fn unknown(&self, name: &str) -> CatalogError {
		CatalogError::UnknownItem {
			name: name.to_owned(),
			suggestion: self.closest_name(name),
		}
	}

	/// Closest known name by edit distance, if it is plausibly a typo.
	pub fn closest_name(&self, name: &str) -> Option<String> {
		let needle = name.trim().to_ascii_lowercase();
		let (best, distance) = self
			.items
			.iter()
			.map(|v| (v.name.as_str(), levenshtein::levenshtein(&needle, &v.name.to_ascii_lowercase())))
			.min_by_key(|(_, d)| *d)?;

		// Past half the length the "match" is noise.
		if distance > (needle.len().max(best.len()) / 2).max(1) {
			return None;
		}
		Some(best.to_owned())
	}

	fn check_acyclic(&self) -> crate::Result<()> {
		#[derive(Clone, Copy, PartialEq)]
		enum Mark {
			Unvisited,
			Visiting,
			Done,
		}

		fn visit(catalog: &Catalog, i: usize, marks: &mut [Mark], depth: usize) -> crate::Result<()> {
			match marks[i] {
				Mark::Done => return Ok(()),
				Mark::Visiting => {
					return Err(CatalogError::RecipeCycleDetected {
						item: catalog.items[i].name.clone(),
						depth,
					});
				}
				Mark::Unvisited => {}
			}

			marks[i] = Mark::Visiting;
			for ingredient in &catalog.items[i].recipe {
				let Some(&j) = catalog.index.get(ingredient) else {
					return Err(catalog.unknown(ingredient));
				};
				visit(catalog, j, marks, depth + 1)?;
			}
			marks[i] = Mark::Done;
			Ok(())
		}

		let mut marks = vec![Mark::Unvisited; self.items.len()];
		for i in 0..self.items.len() {
			visit(self, i, &mut marks, 0)?;
		}
		Ok(())
	}
}
