//! INI catalogs that describe classes and assets.
//!
//! ```ini
//! [class:Widget]
//! category = display
//!
//! [class:WBP_Menu_C]
//! parent = Widget
//!
//! [asset:/Game/UI/WBP_Menu.WBP_Menu_C]
//! class = WBP_Menu_C
//! kind = type
//!
//! [asset:/Game/Textures/T_Grass]
//! class = Texture
//! ```
//!
//! Parents may appear after their children; classes are registered in
//! dependency order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::info;

use super::AssetStore;
use crate::resource::{Category, ResourceClass};

const CLASS_PREFIX: &str = "class:";
const ASSET_PREFIX: &str = "asset:";

/// Errors that can occur while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("class {class}: {reason}")]
    InvalidClass { class: String, reason: String },

    #[error("asset {path}: {reason}")]
    InvalidAsset { path: String, reason: String },
}

struct ClassSpec {
    category: Option<Category>,
    parent: Option<String>,
    is_abstract: bool,
}

/// Builds an [`AssetStore`] from an INI catalog.
pub struct Catalog;

impl Catalog {
    /// Load a catalog file into a new store named after the file.
    pub fn load(path: &Path) -> Result<AssetStore, CatalogError> {
        let ini = Ini::load_from_file(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "catalog".to_string());
        Self::from_ini(name, &ini)
    }

    /// Parse catalog text into a new store.
    pub fn from_ini_str(name: impl Into<String>, text: &str) -> Result<AssetStore, CatalogError> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(name, &ini)
    }

    fn from_ini(name: impl Into<String>, ini: &Ini) -> Result<AssetStore, CatalogError> {
        let store = AssetStore::new(name);
        let mut pending = HashMap::new();
        let mut asset_count = 0usize;

        for (section, props) in ini.iter() {
            let Some(section) = section else { continue };
            if let Some(class) = section.strip_prefix(CLASS_PREFIX) {
                let class = class.trim().to_string();
                let category = props
                    .get("category")
                    .map(|value| value.parse::<Category>())
                    .transpose()
                    .map_err(|reason| CatalogError::InvalidClass {
                        class: class.clone(),
                        reason,
                    })?;
                let is_abstract = props
                    .get("abstract")
                    .map(parse_bool)
                    .transpose()
                    .map_err(|reason| CatalogError::InvalidClass {
                        class: class.clone(),
                        reason,
                    })?
                    .unwrap_or(false);
                pending.insert(
                    class,
                    ClassSpec {
                        category,
                        parent: props.get("parent").map(|p| p.trim().to_string()),
                        is_abstract,
                    },
                );
            } else if let Some(path) = section.strip_prefix(ASSET_PREFIX) {
                let path = path.trim().to_string();
                let class = props
                    .get("class")
                    .ok_or_else(|| CatalogError::InvalidAsset {
                        path: path.clone(),
                        reason: "missing 'class'".to_string(),
                    })?
                    .trim()
                    .to_string();
                match props.get("kind").map(|k| k.trim().to_lowercase()).as_deref() {
                    None | Some("object") => store.register_object(path, class),
                    Some("type") | Some("class") => store.register_type(path, class),
                    Some(other) => {
                        return Err(CatalogError::InvalidAsset {
                            path,
                            reason: format!("unknown kind '{}'", other),
                        })
                    }
                }
                asset_count += 1;
            }
        }

        let class_count = pending.len();
        Self::register_classes(&store, pending)?;
        info!(
            store = %store.name(),
            classes = class_count,
            assets = asset_count,
            "Catalog loaded"
        );
        Ok(store)
    }

    fn register_classes(
        store: &AssetStore,
        mut pending: HashMap<String, ClassSpec>,
    ) -> Result<(), CatalogError> {
        while !pending.is_empty() {
            let ready: Vec<String> = pending
                .iter()
                .filter(|(_, spec)| {
                    spec.parent
                        .as_deref()
                        .map_or(true, |parent| store.class(parent).is_some())
                })
                .map(|(name, _)| name.clone())
                .collect();

            if ready.is_empty() {
                let mut stuck: Vec<_> = pending.into_keys().collect();
                stuck.sort();
                return Err(CatalogError::InvalidClass {
                    class: stuck.join(", "),
                    reason: "unknown or cyclic parent".to_string(),
                });
            }

            for name in ready {
                let Some(spec) = pending.remove(&name) else { continue };
                let class = match spec.parent.as_deref().and_then(|p| store.class(p)) {
                    Some(parent) => {
                        if spec.category.is_some_and(|c| c != parent.category()) {
                            return Err(CatalogError::InvalidClass {
                                class: name,
                                reason: "category differs from parent".to_string(),
                            });
                        }
                        ResourceClass::derived(name, &parent)
                    }
                    None => ResourceClass::new(name, spec.category.unwrap_or(Category::Object)),
                };
                store.register_class(class.with_abstract(spec.is_abstract));
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(format!("invalid boolean '{}'", other)),
    }
}
