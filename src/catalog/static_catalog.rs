//! In-memory catalog, loaded once at startup from a JSON file or the
//! built-in table.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{Category, CatalogLookup, MAX_MENU_ENTRIES, Machine};
use crate::error::CatalogError;

/// Longest slug accepted. Row ids on the wire are capped at 200 chars and
/// carry a short prefix.
const MAX_SLUG_LEN: usize = 180;

/// On-disk catalog layout.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    categories: Vec<Category>,
}

/// Immutable catalog shared across requests without locking.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    categories: Vec<Category>,
}

impl StaticCatalog {
    /// Build a catalog, validating slugs and names.
    pub fn new(categories: Vec<Category>) -> Result<Self, CatalogError> {
        validate(&categories)?;
        Ok(Self { categories })
    }

    /// Load `{"categories": [...]}` from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            categories = catalog.categories.len(),
            "Catalog loaded from file"
        );
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(raw).map_err(|e| CatalogError::Invalid(e.to_string()))?;
        Self::new(file.categories)
    }

    /// The built-in catalog of machine categories.
    pub fn builtin() -> Self {
        Self {
            categories: builtin_categories(),
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[async_trait]
impl CatalogLookup for StaticCatalog {
    async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        Ok(self.categories.clone())
    }

    async fn category(&self, slug: &str) -> Result<Option<Category>, CatalogError> {
        Ok(self.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn machine(
        &self,
        category_slug: &str,
        machine_slug: &str,
    ) -> Result<Option<Machine>, CatalogError> {
        Ok(self
            .categories
            .iter()
            .find(|c| c.slug == category_slug)
            .and_then(|c| c.machines.iter().find(|m| m.slug == machine_slug))
            .cloned())
    }
}

fn validate(categories: &[Category]) -> Result<(), CatalogError> {
    if categories.is_empty() {
        return Err(CatalogError::Invalid("catalog has no categories".into()));
    }
    if categories.len() > MAX_MENU_ENTRIES {
        return Err(CatalogError::Invalid(format!(
            "catalog has {} categories; a menu shows at most {MAX_MENU_ENTRIES}",
            categories.len()
        )));
    }

    let mut seen = HashSet::new();
    for category in categories {
        check_slug(&category.slug)?;
        check_name(&category.slug, &category.name)?;
        if !seen.insert(category.slug.as_str()) {
            return Err(CatalogError::Invalid(format!(
                "duplicate category slug {:?}",
                category.slug
            )));
        }

        if category.machines.len() > MAX_MENU_ENTRIES {
            return Err(CatalogError::Invalid(format!(
                "category {:?} has {} machines; a menu shows at most {MAX_MENU_ENTRIES}",
                category.slug,
                category.machines.len()
            )));
        }

        let mut machines = HashSet::new();
        for machine in &category.machines {
            check_slug(&machine.slug)?;
            check_name(&machine.slug, &machine.name)?;
            if !machines.insert(machine.slug.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate machine slug {:?} in category {:?}",
                    machine.slug, category.slug
                )));
            }
        }
    }
    Ok(())
}

fn check_slug(slug: &str) -> Result<(), CatalogError> {
    let valid = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CatalogError::Invalid(format!(
            "slug {slug:?} must be 1-{MAX_SLUG_LEN} chars of [a-z0-9_-]"
        )))
    }
}

fn check_name(slug: &str, name: &str) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        Err(CatalogError::Invalid(format!("entry {slug:?} has an empty name")))
    } else {
        Ok(())
    }
}

fn machine(slug: &str, name: &str, description: &str) -> Machine {
    Machine {
        slug: slug.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
    }
}

fn builtin_categories() -> Vec<Category> {
    vec![
        Category {
            slug: "mixing".into(),
            name: "Mixing Machines".into(),
            description: Some("Mixers and blenders for dough, powder and paste".into()),
            machines: vec![
                machine("planetary_mixer", "Planetary Mixer", "20-80 L bowl, 3 speeds"),
                machine("spiral_mixer", "Spiral Mixer", "Heavy dough, 25-120 kg"),
                machine("ribbon_blender", "Ribbon Blender", "Dry powder blending, SS 304"),
            ],
        },
        Category {
            slug: "packaging".into(),
            name: "Packaging Machines".into(),
            description: Some("Filling, sealing and wrapping".into()),
            machines: vec![
                machine("pouch_packing", "Pouch Packing Machine", "Automatic FFS, 20-60 ppm"),
                machine("band_sealer", "Continuous Band Sealer", "Horizontal and vertical"),
                machine("shrink_wrapper", "Shrink Wrapping Machine", "L-sealer with tunnel"),
            ],
        },
        Category {
            slug: "grinding".into(),
            name: "Grinding Machines".into(),
            description: Some("Pulverizers and mills for spices and grains".into()),
            machines: vec![
                machine("pulverizer", "Pulverizer", "Spice and grain, 2-stage"),
                machine("hammer_mill", "Hammer Mill", "Coarse grinding, 5-30 HP"),
            ],
        },
        Category {
            slug: "bakery".into(),
            name: "Bakery Equipment".into(),
            description: Some("Ovens and proofers".into()),
            machines: vec![
                machine("rotary_rack_oven", "Rotary Rack Oven", "Diesel, gas or electric"),
                machine("deck_oven", "Deck Oven", "1-3 decks, stone base"),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = StaticCatalog::builtin();
        assert!(validate(&catalog.categories).is_ok());
        assert!(!catalog.is_empty());
    }

    #[tokio::test]
    async fn lookup_category_and_machine() {
        let catalog = StaticCatalog::builtin();
        let mixing = catalog.category("mixing").await.unwrap().unwrap();
        assert_eq!(mixing.name, "Mixing Machines");

        let mixer = catalog
            .machine("mixing", "planetary_mixer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mixer.name, "Planetary Mixer");

        assert!(catalog.category("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn machine_lookup_is_scoped_to_category() {
        let catalog = StaticCatalog::builtin();
        assert!(catalog
            .machine("packaging", "planetary_mixer")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(matches!(
            StaticCatalog::new(vec![]),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_bad_slug() {
        let json = r#"{"categories": [{"slug": "Mixing Machines", "name": "Mixing"}]}"#;
        let err = StaticCatalog::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("slug"));
    }

    #[test]
    fn rejects_duplicate_category() {
        let json = r#"{"categories": [
            {"slug": "mixing", "name": "A"},
            {"slug": "mixing", "name": "B"}
        ]}"#;
        let err = StaticCatalog::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_duplicate_machine_within_category() {
        let json = r#"{"categories": [{"slug": "mixing", "name": "Mixing", "machines": [
            {"slug": "a", "name": "A"},
            {"slug": "a", "name": "A again"}
        ]}]}"#;
        assert!(StaticCatalog::from_json_str(json).is_err());
    }

    fn numbered_machines(n: usize) -> Vec<Machine> {
        (0..n)
            .map(|i| machine(&format!("m{i}"), &format!("Machine {i}"), "x"))
            .collect()
    }

    #[test]
    fn rejects_category_with_more_machines_than_a_menu_holds() {
        let categories = vec![Category {
            slug: "big".into(),
            name: "Big".into(),
            description: None,
            machines: numbered_machines(MAX_MENU_ENTRIES + 1),
        }];
        let err = StaticCatalog::new(categories).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(ref m) if m.contains("\"big\"")));
    }

    #[test]
    fn accepts_full_menu() {
        let categories = vec![Category {
            slug: "big".into(),
            name: "Big".into(),
            description: None,
            machines: numbered_machines(MAX_MENU_ENTRIES),
        }];
        assert!(StaticCatalog::new(categories).is_ok());
    }

    #[test]
    fn rejects_more_categories_than_a_menu_holds() {
        let categories = (0..=MAX_MENU_ENTRIES)
            .map(|i| Category {
                slug: format!("c{i}"),
                name: format!("Category {i}"),
                description: None,
                machines: numbered_machines(1),
            })
            .collect();
        assert!(matches!(
            StaticCatalog::new(categories),
            Err(CatalogError::Invalid(ref m)) if m.contains("categories")
        ));
    }

    #[test]
    fn rejects_blank_name() {
        let json = r#"{"categories": [{"slug": "mixing", "name": "  "}]}"#;
        assert!(StaticCatalog::from_json_str(json).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"categories": [{{"slug": "cutting", "name": "Cutting", "machines": [
                {{"slug": "veg_cutter", "name": "Vegetable Cutter"}}
            ]}}]}}"#
        )
        .unwrap();

        let catalog = StaticCatalog::from_json_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.categories[0].machines[0].slug, "veg_cutter");
        assert!(catalog.categories[0].machines[0].description.is_none());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = StaticCatalog::from_json_file(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Unavailable(_)));
    }
}
