#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! A catalogue of mangrove and coastal plants baked into the binary.
//!
//! Each `.toml` file in `packages/guide/species/` holds one habitat group
//! and is embedded at compile time via [`include_str!`]. Adding species
//! means adding a `[[species]]` entry to one of them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// TOML catalogues embedded at compile time.
const SPECIES_TOMLS: &[(&str, &str)] = &[
    ("true_mangroves", include_str!("../species/true_mangroves.toml")),
    (
        "mangrove_associates",
        include_str!("../species/mangrove_associates.toml"),
    ),
    ("beach", include_str!("../species/beach.toml")),
    ("salt_marsh", include_str!("../species/salt_marsh.toml")),
];

/// Descriptive sheet for one species.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesDetail {
    pub conservation_status: Option<String>,
    pub distribution: Option<String>,
    pub vernacular: Option<String>,
    pub plant_type: Option<String>,
    pub leaves: Option<String>,
    pub flowers: Option<String>,
    pub fruits: Option<String>,
    pub bark: Option<String>,
    pub roots: Option<String>,
    pub zonation: Option<String>,
    pub uses: Option<String>,
}

impl SpeciesDetail {
    /// Labelled rows for display, skipping absent fields.
    #[must_use]
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        [
            ("Conservation status", &self.conservation_status),
            ("Distribution", &self.distribution),
            ("Vernacular names", &self.vernacular),
            ("Plant type", &self.plant_type),
            ("Leaves", &self.leaves),
            ("Flowers", &self.flowers),
            ("Fruits", &self.fruits),
            ("Bark", &self.bark),
            ("Roots", &self.roots),
            ("Zonation", &self.zonation),
            ("Uses", &self.uses),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|v| (label, v)))
        .collect()
    }
}

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub id: String,
    pub scientific_name: String,
    pub local_name: String,
    /// Habitat group, e.g. `"True Mangrove"`.
    pub category: String,
    #[serde(default)]
    pub detail: SpeciesDetail,
}

#[derive(Deserialize)]
struct SpeciesFile {
    species: Vec<Species>,
}

/// Returns every species in the catalogue, in file order.
///
/// # Panics
///
/// Panics if any embedded catalogue is malformed. The catalogues are
/// compiled in, so this is covered by the tests below.
#[must_use]
pub fn all_species() -> Vec<Species> {
    SPECIES_TOMLS
        .iter()
        .flat_map(|(name, source)| {
            toml::de::from_str::<SpeciesFile>(source)
                .unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
                .species
        })
        .collect()
}

/// Distinct categories, sorted.
#[must_use]
pub fn categories(species: &[Species]) -> Vec<&str> {
    let mut categories: Vec<&str> = species.iter().map(|s| s.category.as_str()).collect();
    categories.sort_unstable();
    categories.dedup();
    categories
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Filters by a case-insensitive substring of the scientific or local name
/// and an optional exact category, then sorts by scientific name.
///
/// A blank query matches everything.
#[must_use]
pub fn search<'a>(
    species: &'a [Species],
    query: &str,
    category: Option<&str>,
    ascending: bool,
) -> Vec<&'a Species> {
    let query = query.trim().to_lowercase();
    let mut matches: Vec<&Species> = species
        .iter()
        .filter(|s| {
            query.is_empty()
                || s.scientific_name.to_lowercase().contains(&query)
                || s.local_name.to_lowercase().contains(&query)
        })
        .filter(|s| category.is_none_or(|c| s.category == c))
        .collect();

    matches.sort_by(|a, b| {
        let ordering = compare_names(&a.scientific_name, &b.scientific_name);
        if ascending { ordering } else { ordering.reverse() }
    });
    matches
}
