//! Reference resolution: registry symbols → target-language reference text
//!
//! A reference kind says *how* a symbol should be rendered: as a defined
//! name, as a structured table-column reference, as a bare sheet-qualified
//! cell address, or by whatever the registry holds for the key. The resolver
//! never invents coordinates; everything comes out of the
//! [`LayoutRegistry`].

use capsheet_core::{
    aggregate_name, LayoutRegistry, Location, LocationKind, SymbolKey,
};

use crate::error::{FormulaError, FormulaResult, ResolveContext};

/// How a symbol should be rendered into reference text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A registry-defined global identifier (a defined name)
    Named,
    /// A table-column reference, optionally scoped to the current row
    Structured,
    /// A direct sheet-qualified cell coordinate
    Cell,
    /// Resolve through the registry and render whatever shape it holds
    EntityLookup,
}

impl ReferenceKind {
    /// Parse a kind string from a document.
    ///
    /// Unknown kinds deliberately fall back to [`ReferenceKind::EntityLookup`].
    pub fn parse(s: &str) -> Self {
        match s {
            "named" => ReferenceKind::Named,
            "structured" => ReferenceKind::Structured,
            "cell" => ReferenceKind::Cell,
            _ => ReferenceKind::EntityLookup,
        }
    }
}

/// Renders registry symbols as target-language references
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    registry: &'a LayoutRegistry,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a registry
    pub fn new(registry: &'a LayoutRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a symbol into reference text.
    ///
    /// Failure is an `Err` with the round/holder context - never an error
    /// message disguised as a reference string. Callers decide whether to
    /// propagate or substitute a safe default.
    pub fn resolve(
        &self,
        key: &SymbolKey,
        kind: ReferenceKind,
        ctx: &ResolveContext,
    ) -> FormulaResult<String> {
        let location = self
            .registry
            .lookup(key)
            .map_err(|source| FormulaError::Reference {
                context: ctx.clone(),
                source,
            })?;

        let text = match kind {
            ReferenceKind::Named => match key {
                SymbolKey::Aggregate { round, kind } => aggregate_name(round, *kind),
                // Keys without a defined name render like an entity lookup
                _ => render_location(location, ctx),
            },
            ReferenceKind::Structured => match &location.kind {
                LocationKind::Column { .. } => render_location(location, ctx),
                // A cell has no structured form; the coordinate is still correct
                LocationKind::Cell(_) => render_location(location, ctx),
            },
            ReferenceKind::Cell => match &location.kind {
                LocationKind::Cell(addr) => format!("{}!{}", location.sheet, addr),
                LocationKind::Column { range, .. } => {
                    format!("{}!{}", location.sheet, range)
                }
            },
            ReferenceKind::EntityLookup => render_location(location, ctx),
        };

        Ok(text)
    }
}

/// Render a location in its natural shape
fn render_location(location: &Location, ctx: &ResolveContext) -> String {
    match &location.kind {
        LocationKind::Cell(addr) => format!("{}!{}", location.sheet, addr),
        LocationKind::Column {
            table: Some(table),
            column,
            ..
        } => {
            if ctx.current_row {
                format!("{}[[#This Row],[{}]]", table, column)
            } else {
                format!("{}[{}]", table, column)
            }
        }
        // No named region: fall back to the raw backing range
        LocationKind::Column {
            table: None, range, ..
        } => format!("{}!{}", location.sheet, range),
    }
}
