//! Item Catalog
//!
//! The immutable table of purchasable item kinds: base price, production
//! rate, and display text per kind. Loaded once at startup from the store
//! data embedded in the binary; read-only afterwards, so it can be shared
//! across tasks without locking.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// Store data compiled into the binary.
const STORE_JSON: &str = include_str!("../../assets/store.json");

// =============================================================================
// ITEM KIND
// =============================================================================

/// One purchasable category of production-generating asset.
///
/// A closed set: every kind the engine ever references is declared here, and
/// catalog load verifies the store data covers all of them. External string
/// input is converted exactly once at the boundary via [`ItemKind::from_name`];
/// everything past that point operates on the enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemKind {
    /// Clicks on its own, slowly.
    Cursor,
    /// Bakes by hand.
    Grandma,
    /// Industrial-scale production.
    Factory,
    /// Extracts raw ingredients.
    Mine,
    /// Off-world imports.
    Shipment,
    /// Transmutation.
    AlchemyLab,
    /// Interdimensional supply.
    Portal,
    /// Retrieval from the past.
    TimeMachine,
}

impl ItemKind {
    /// All kinds in their fixed declared order (display order, storage order,
    /// and the order production is summed in).
    pub const ALL: [ItemKind; 8] = [
        ItemKind::Cursor,
        ItemKind::Grandma,
        ItemKind::Factory,
        ItemKind::Mine,
        ItemKind::Shipment,
        ItemKind::AlchemyLab,
        ItemKind::Portal,
        ItemKind::TimeMachine,
    ];

    /// Lowercase name used as the key in store data and save files.
    pub fn storage_name(self) -> &'static str {
        match self {
            ItemKind::Cursor => "cursor",
            ItemKind::Grandma => "grandma",
            ItemKind::Factory => "factory",
            ItemKind::Mine => "mine",
            ItemKind::Shipment => "shipment",
            ItemKind::AlchemyLab => "alchemy lab",
            ItemKind::Portal => "portal",
            ItemKind::TimeMachine => "time machine",
        }
    }

    /// Parse a kind from external input (case-insensitive).
    ///
    /// Returns `None` for anything outside the catalog; callers translate
    /// that into their own unknown-item error.
    pub fn from_name(name: &str) -> Option<ItemKind> {
        let name = name.trim().to_ascii_lowercase();
        ItemKind::ALL
            .into_iter()
            .find(|kind| kind.storage_name() == name)
    }
}

impl fmt::Display for ItemKind {
    /// Title-case human name, e.g. "Alchemy Lab".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first_in_word = true;
        for c in self.storage_name().chars() {
            if c == ' ' {
                first_in_word = true;
                f.write_str(" ")?;
            } else if first_in_word {
                write!(f, "{}", c.to_ascii_uppercase())?;
                first_in_word = false;
            } else {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Price and production data for one kind.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Price of the first unit, before the growth curve applies.
    pub base_price: u64,
    /// Resource units produced per second per unit owned.
    pub rate: f64,
    /// Player-facing description. Not used by the engine itself.
    pub description: String,
}

/// Raw per-kind record as it appears in store data.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "base-price")]
    base_price: u64,
    cps: f64,
    description: String,
}

/// Catalog load errors. Any of these is fatal at startup: the engine never
/// runs with a partial catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Store data is not valid JSON of the expected shape.
    #[error("malformed store data: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Store data has no entry for a declared kind.
    #[error("store data missing entry for \"{0}\"")]
    MissingKind(&'static str),

    /// A kind's base price is zero.
    #[error("base price for \"{0}\" must be positive")]
    ZeroBasePrice(&'static str),

    /// A kind's production rate is negative or not finite.
    #[error("invalid production rate for \"{0}\"")]
    InvalidRate(&'static str),
}

/// The immutable item catalog.
#[derive(Debug)]
pub struct Catalog {
    entries: [CatalogEntry; ItemKind::ALL.len()],
}

impl Catalog {
    /// Load the catalog from the embedded store data.
    pub fn load() -> Result<Catalog, CatalogError> {
        Catalog::from_json(STORE_JSON)
    }

    /// Build a catalog from store-format JSON. Fails on malformed data, a
    /// missing kind, or out-of-range values.
    pub fn from_json(json: &str) -> Result<Catalog, CatalogError> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(json)?;

        let mut entries = Vec::with_capacity(ItemKind::ALL.len());
        for kind in ItemKind::ALL {
            let name = kind.storage_name();
            let raw = raw.get(name).ok_or(CatalogError::MissingKind(name))?;
            if raw.base_price == 0 {
                return Err(CatalogError::ZeroBasePrice(name));
            }
            if !raw.cps.is_finite() || raw.cps < 0.0 {
                return Err(CatalogError::InvalidRate(name));
            }
            entries.push(CatalogEntry {
                base_price: raw.base_price,
                rate: raw.cps,
                description: raw.description.clone(),
            });
        }

        // Length is exactly ItemKind::ALL.len() by construction.
        let entries = entries
            .try_into()
            .unwrap_or_else(|_| unreachable!("one entry pushed per kind"));

        Ok(Catalog { entries })
    }

    /// Price and production data for a kind.
    #[inline]
    pub fn lookup(&self, kind: ItemKind) -> &CatalogEntry {
        &self.entries[kind as usize]
    }

    /// All kinds in declared order.
    pub fn kinds(&self) -> impl Iterator<Item = ItemKind> {
        ItemKind::ALL.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_store_loads() {
        let catalog = Catalog::load().expect("embedded store data must parse");
        for kind in ItemKind::ALL {
            let entry = catalog.lookup(kind);
            assert!(entry.base_price > 0);
            assert!(entry.rate >= 0.0);
        }
    }

    #[test]
    fn cursor_matches_store_data() {
        let catalog = Catalog::load().unwrap();
        let cursor = catalog.lookup(ItemKind::Cursor);
        assert_eq!(cursor.base_price, 15);
        assert!((cursor.rate - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn from_name_accepts_any_case() {
        assert_eq!(ItemKind::from_name("cursor"), Some(ItemKind::Cursor));
        assert_eq!(ItemKind::from_name("Alchemy Lab"), Some(ItemKind::AlchemyLab));
        assert_eq!(ItemKind::from_name("  TIME MACHINE "), Some(ItemKind::TimeMachine));
        assert_eq!(ItemKind::from_name("farm"), None);
        assert_eq!(ItemKind::from_name(""), None);
    }

    #[test]
    fn display_is_title_case() {
        assert_eq!(ItemKind::Cursor.to_string(), "Cursor");
        assert_eq!(ItemKind::AlchemyLab.to_string(), "Alchemy Lab");
        assert_eq!(ItemKind::TimeMachine.to_string(), "Time Machine");
    }

    #[test]
    fn missing_kind_is_fatal() {
        let err = Catalog::from_json(r#"{"cursor": {"base-price": 15, "cps": 0.1, "description": ""}}"#)
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingKind("grandma")));
    }

    #[test]
    fn malformed_json_is_fatal() {
        assert!(matches!(
            Catalog::from_json("not json"),
            Err(CatalogError::Malformed(_))
        ));
    }
}
