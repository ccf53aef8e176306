//! The layout registry: a symbol table mapping domain entities to coordinates
//!
//! The registry is built incrementally during a single top-to-bottom assembly
//! pass over rounds. Entries are added, never mutated or removed. Because a
//! round's formulas may reference the previous round's aggregates, assembly
//! declares the full round order up front and seals each round once its
//! registration pass completes; looking up a symbol in a declared-but-unsealed
//! round is reported as an ordering violation rather than an unknown symbol.

use ahash::{AHashMap, AHashSet};

use crate::error::{Error, Result};
use crate::location::Location;
use crate::symbol::{sanitize_name, SymbolKey};

/// Symbol table mapping [`SymbolKey`]s to physical [`Location`]s
///
/// Append-only: re-registering a key with the same location is a no-op,
/// re-registering with a different location is an error.
#[derive(Debug, Default)]
pub struct LayoutRegistry {
    entries: AHashMap<SymbolKey, Location>,
    /// Declared round names (sanitized), in assembly order
    round_order: Vec<String>,
    /// Rounds whose registration pass has completed
    sealed: AHashSet<String>,
}

impl LayoutRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the full round order before registration begins.
    ///
    /// Declaring rounds up front lets [`lookup`](Self::lookup) distinguish
    /// "referenced too early" from "does not exist".
    pub fn declare_rounds<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.round_order.push(sanitize_name(name.as_ref()));
        }
    }

    /// The declared round order (sanitized names)
    pub fn round_order(&self) -> &[String] {
        &self.round_order
    }

    /// The round declared immediately before `round`, if any
    pub fn previous_round(&self, round: &str) -> Option<&str> {
        let round = sanitize_name(round);
        let idx = self.round_order.iter().position(|r| *r == round)?;
        if idx == 0 {
            None
        } else {
            Some(&self.round_order[idx - 1])
        }
    }

    /// Register a symbol at a location.
    ///
    /// Idempotent for identical locations; registering a key at a different
    /// location is a [`Error::SymbolConflict`].
    pub fn register(&mut self, key: SymbolKey, location: Location) -> Result<()> {
        if let Some(existing) = self.entries.get(&key) {
            if *existing == location {
                return Ok(());
            }
            return Err(Error::SymbolConflict {
                key: key.to_string(),
                existing: existing.to_string(),
                attempted: location.to_string(),
            });
        }

        self.entries.insert(key, location);
        Ok(())
    }

    /// Mark a round's registration pass as complete
    pub fn seal_round(&mut self, round: &str) {
        self.sealed.insert(sanitize_name(round));
    }

    /// Whether a round's registration pass has completed
    pub fn is_sealed(&self, round: &str) -> bool {
        self.sealed.contains(&sanitize_name(round))
    }

    /// Look up the location registered for a symbol.
    ///
    /// Failure modes:
    /// - [`Error::RoundNotRegistered`] - the key's round is declared but its
    ///   registration pass has not completed (assembly-order bug)
    /// - [`Error::UnregisteredSymbol`] - nothing is known about the key
    pub fn lookup(&self, key: &SymbolKey) -> Result<&Location> {
        if let Some(location) = self.entries.get(key) {
            return Ok(location);
        }

        if let Some(round) = key.round_name() {
            if self.round_order.iter().any(|r| r == round) && !self.sealed.contains(round) {
                return Err(Error::RoundNotRegistered {
                    round: round.to_string(),
                    key: key.to_string(),
                });
            }
        }

        Err(Error::UnregisteredSymbol(key.to_string()))
    }

    /// Check if a symbol is registered
    pub fn contains(&self, key: &SymbolKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of registered symbols
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all registered entries
    pub fn iter(&self) -> impl Iterator<Item = (&SymbolKey, &Location)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CellAddress;
    use crate::symbol::AggregateKind;

    fn seed_loc(row: u32) -> Location {
        Location::cell("Seed", CellAddress::absolute(row, 1))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = LayoutRegistry::new();
        let key = SymbolKey::round("Seed");
        reg.register(key.clone(), seed_loc(0)).unwrap();

        let loc = reg.lookup(&key).unwrap();
        assert_eq!(loc.sheet, "Seed");
    }

    #[test]
    fn test_idempotent_re_registration() {
        let mut reg = LayoutRegistry::new();
        let key = SymbolKey::round("Seed");
        reg.register(key.clone(), seed_loc(0)).unwrap();
        reg.register(key.clone(), seed_loc(0)).unwrap();
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_conflicting_registration_fails() {
        let mut reg = LayoutRegistry::new();
        let key = SymbolKey::round("Seed");
        reg.register(key.clone(), seed_loc(0)).unwrap();

        let err = reg.register(key, seed_loc(5)).unwrap_err();
        assert!(matches!(err, Error::SymbolConflict { .. }));
    }

    #[test]
    fn test_unknown_symbol() {
        let reg = LayoutRegistry::new();
        let err = reg.lookup(&SymbolKey::round("Ghost")).unwrap_err();
        assert!(matches!(err, Error::UnregisteredSymbol(_)));
    }

    #[test]
    fn test_ordering_violation_is_distinct() {
        let mut reg = LayoutRegistry::new();
        reg.declare_rounds(["Seed", "Series A"]);

        // Series A is declared but nothing registered yet
        let key = SymbolKey::aggregate("Series A", AggregateKind::PreRoundShares);
        let err = reg.lookup(&key).unwrap_err();
        assert!(matches!(err, Error::RoundNotRegistered { .. }));

        // After sealing, a missing key is a plain unknown symbol
        reg.seal_round("Series A");
        let err = reg.lookup(&key).unwrap_err();
        assert!(matches!(err, Error::UnregisteredSymbol(_)));
    }

    #[test]
    fn test_previous_round() {
        let mut reg = LayoutRegistry::new();
        reg.declare_rounds(["Seed", "Series A", "Series B"]);

        assert_eq!(reg.previous_round("Seed"), None);
        assert_eq!(reg.previous_round("Series A"), Some("Seed"));
        assert_eq!(reg.previous_round("Series B"), Some("Series_A"));
    }
}
