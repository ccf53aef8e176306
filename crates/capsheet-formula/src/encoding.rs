//! Formula encodings: templates plus typed dependency lists
//!
//! A [`FormulaEncoding`] is the intermediate representation between "what a
//! cell means" and the finished expression string: a template whose
//! placeholders name symbols, and one dependency entry per placeholder saying
//! how that symbol should be rendered. Resolution is a pure function of the
//! encoding and the current registry state.

use capsheet_core::{LayoutRegistry, SymbolKey};

use crate::error::{FormulaError, FormulaResult, ResolveContext};
use crate::reference::{ReferenceKind, Resolver};
use crate::EXPRESSION_MARKER;

/// One placeholder → symbol binding
#[derive(Debug, Clone)]
pub struct Dependency {
    /// The placeholder text as it appears in the template, e.g. `{pre}`
    pub placeholder: String,
    /// The symbol to resolve
    pub key: SymbolKey,
    /// How to render the symbol
    pub kind: ReferenceKind,
}

/// A formula template with its typed dependency list
///
/// Immutable once constructed; [`resolve_encoding`] never mutates it.
#[derive(Debug, Clone)]
pub struct FormulaEncoding {
    /// Template text, placeholders written as `{name}`
    pub template: String,
    /// Exactly one entry per distinct placeholder in the template
    pub dependencies: Vec<Dependency>,
}

impl FormulaEncoding {
    /// Create an encoding with no dependencies
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            dependencies: Vec::new(),
        }
    }

    /// Add a dependency entry (builder-style)
    pub fn dep(mut self, placeholder: impl Into<String>, key: SymbolKey, kind: ReferenceKind) -> Self {
        self.dependencies.push(Dependency {
            placeholder: placeholder.into(),
            key,
            kind,
        });
        self
    }
}

/// Resolve an encoding into a finished, guarded expression string.
///
/// Steps: resolve every dependency through the [`Resolver`], substitute
/// placeholders (whole-token, longest placeholder first, substituted text is
/// never re-scanned), prepend the expression marker, and wrap
/// division-bearing expressions in an `IFERROR` guard.
///
/// Any placeholder left in the template without a dependency entry fails
/// loudly as [`FormulaError::MissingDependency`] - the literal placeholder
/// text is never emitted.
pub fn resolve_encoding(
    encoding: &FormulaEncoding,
    registry: &LayoutRegistry,
    ctx: &ResolveContext,
) -> FormulaResult<String> {
    if encoding.template.trim().is_empty() {
        return Err(FormulaError::MalformedEncoding("empty template".into()));
    }

    let resolver = Resolver::new(registry);

    // placeholder → reference text, longest placeholder first so a short
    // placeholder that prefixes a longer one cannot corrupt it
    let mut replacements: Vec<(String, String)> = Vec::with_capacity(encoding.dependencies.len());
    for dep in &encoding.dependencies {
        if replacements.iter().any(|(ph, _)| *ph == dep.placeholder) {
            return Err(FormulaError::MalformedEncoding(format!(
                "duplicate dependency entry for placeholder '{}'",
                dep.placeholder
            )));
        }
        let text = resolver
            .resolve(&dep.key, dep.kind, ctx)
            .map_err(|err| match err {
                FormulaError::Reference { context, source } => FormulaError::Placeholder {
                    placeholder: dep.placeholder.clone(),
                    context,
                    source,
                },
                other => other,
            })?;
        replacements.push((dep.placeholder.clone(), text));
    }
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let substituted = substitute(&encoding.template, &replacements);

    if let Some(placeholder) = find_unresolved(&substituted) {
        return Err(FormulaError::MissingDependency {
            placeholder,
            context: ctx.clone(),
        });
    }

    let expr = substituted.trim();
    let formula = match expr.strip_prefix(EXPRESSION_MARKER) {
        Some(rest) => format!("{}{}", EXPRESSION_MARKER, rest),
        None => format!("{}{}", EXPRESSION_MARKER, expr),
    };

    Ok(ensure_division_guard(&formula))
}

/// Wrap a division-bearing formula in a divide-by-zero guard.
///
/// Syntactic, not semantic: the check is "contains `/` and is not already
/// wrapped in `IFERROR(`". The expression tree is never parsed, and wrapping
/// is single-level; downstream formulas rely on exactly this shallow
/// behavior.
pub fn ensure_division_guard(formula: &str) -> String {
    let expr = formula.strip_prefix(EXPRESSION_MARKER).unwrap_or(formula);
    if !expr.contains('/') || expr.starts_with("IFERROR(") {
        format!("{}{}", EXPRESSION_MARKER, expr)
    } else {
        format!("{}IFERROR({},0)", EXPRESSION_MARKER, expr)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Single left-to-right pass: at each position the longest matching
/// placeholder wins, and replacement text is appended to the output without
/// ever being re-scanned.
fn substitute(template: &str, replacements: &[(String, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut pos = 0;

    'scan: while pos < template.len() {
        for (placeholder, text) in replacements {
            if template[pos..].starts_with(placeholder.as_str())
                && token_boundaries_ok(template, pos, placeholder)
            {
                out.push_str(text);
                pos += placeholder.len();
                continue 'scan;
            }
        }
        let c = template[pos..].chars().next().expect("in-bounds char");
        out.push(c);
        pos += c.len_utf8();
    }

    out
}

/// Whole-token check: a placeholder that starts or ends with an identifier
/// character must not sit flush against another identifier character, so it
/// cannot match inside a longer identifier.
fn token_boundaries_ok(template: &str, pos: usize, placeholder: &str) -> bool {
    let first = placeholder.chars().next().expect("non-empty placeholder");
    let last = placeholder.chars().next_back().expect("non-empty placeholder");

    let left_ok = !is_ident_char(first)
        || !template[..pos].chars().next_back().is_some_and(is_ident_char);
    let right_ok = !is_ident_char(last)
        || !template[pos + placeholder.len()..]
            .chars()
            .next()
            .is_some_and(is_ident_char);

    left_ok && right_ok
}

/// Find a leftover `{name}` placeholder, if any survived substitution
fn find_unresolved(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && is_ident_char(bytes[end] as char) {
                end += 1;
            }
            if end > start && bytes.get(end) == Some(&b'}') {
                return Some(format!("{{{}}}", &s[start..end]));
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsheet_core::{AggregateKind, CellAddress, Location};
    use pretty_assertions::assert_eq;

    fn registry() -> LayoutRegistry {
        let mut reg = LayoutRegistry::new();
        reg.declare_rounds(["Seed", "Series A"]);
        for (round, row) in [("Seed", 1), ("Series A", 1)] {
            reg.register(
                SymbolKey::aggregate(round, AggregateKind::PreRoundShares),
                Location::cell(capsheet_core::sanitize_name(round), CellAddress::absolute(row, 1)),
            )
            .unwrap();
            reg.register(
                SymbolKey::aggregate(round, AggregateKind::IssuedShares),
                Location::cell(
                    capsheet_core::sanitize_name(round),
                    CellAddress::absolute(row + 12, 1),
                ),
            )
            .unwrap();
            reg.seal_round(round);
        }
        reg
    }

    #[test]
    fn test_resolve_simple_encoding() {
        let reg = registry();
        let encoding = FormulaEncoding::new("{pre}+{issued}")
            .dep(
                "{pre}",
                SymbolKey::aggregate("Seed", AggregateKind::PreRoundShares),
                ReferenceKind::Named,
            )
            .dep(
                "{issued}",
                SymbolKey::aggregate("Seed", AggregateKind::IssuedShares),
                ReferenceKind::Named,
            );

        let formula =
            resolve_encoding(&encoding, &reg, &ResolveContext::round("Series A")).unwrap();
        assert_eq!(formula, "=Seed_PreRoundShares+Seed_IssuedShares");
    }

    #[test]
    fn test_substring_placeholders_do_not_cross_contaminate() {
        let reg = registry();
        // {X} is a prefix of {XY} up to the closing brace; longest-first
        // ordering and whole-token matching keep them independent
        let encoding = FormulaEncoding::new("{X}+{XY}")
            .dep(
                "{X}",
                SymbolKey::aggregate("Seed", AggregateKind::PreRoundShares),
                ReferenceKind::Named,
            )
            .dep(
                "{XY}",
                SymbolKey::aggregate("Seed", AggregateKind::IssuedShares),
                ReferenceKind::Named,
            );

        let formula = resolve_encoding(&encoding, &reg, &ResolveContext::default()).unwrap();
        assert_eq!(formula, "=Seed_PreRoundShares+Seed_IssuedShares");
    }

    #[test]
    fn test_bare_token_placeholders_match_whole_tokens_only() {
        let replacements = vec![
            ("PRE".to_string(), "X".to_string()),
            ("PRESHARES".to_string(), "Y".to_string()),
        ];
        // sorted longest-first before substitution
        let mut sorted = replacements;
        sorted.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        assert_eq!(substitute("PRE+PRESHARES", &sorted), "X+Y");
        // PREFIX shares a prefix with PRE but is a different identifier
        assert_eq!(substitute("PREFIX", &sorted), "PREFIX");
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        // The replacement for {a} contains the literal text "{b}"; a second
        // pass would corrupt it, a single pass must not
        let replacements = vec![
            ("{a}".to_string(), "{b}+1".to_string()),
            ("{b}".to_string(), "2".to_string()),
        ];
        assert_eq!(substitute("{a}*{b}", &replacements), "{b}+1*2");
    }

    #[test]
    fn test_missing_dependency_fails_loudly() {
        let reg = registry();
        let encoding = FormulaEncoding::new("{pre}+{ghost}").dep(
            "{pre}",
            SymbolKey::aggregate("Seed", AggregateKind::PreRoundShares),
            ReferenceKind::Named,
        );

        let err = resolve_encoding(&encoding, &reg, &ResolveContext::round("Seed")).unwrap_err();
        match err {
            FormulaError::MissingDependency { placeholder, .. } => {
                assert_eq!(placeholder, "{ghost}")
            }
            other => panic!("expected MissingDependency, got {other}"),
        }
    }

    #[test]
    fn test_empty_template_rejected() {
        let reg = registry();
        let err = resolve_encoding(
            &FormulaEncoding::new("  "),
            &reg,
            &ResolveContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FormulaError::MalformedEncoding(_)));
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let reg = registry();
        let encoding = FormulaEncoding::new("{pre}")
            .dep(
                "{pre}",
                SymbolKey::aggregate("Seed", AggregateKind::PreRoundShares),
                ReferenceKind::Named,
            )
            .dep(
                "{pre}",
                SymbolKey::aggregate("Seed", AggregateKind::IssuedShares),
                ReferenceKind::Named,
            );

        let err = resolve_encoding(&encoding, &reg, &ResolveContext::default()).unwrap_err();
        assert!(matches!(err, FormulaError::MalformedEncoding(_)));
    }

    #[test]
    fn test_expression_marker_added_once() {
        let reg = registry();
        let encoding = FormulaEncoding::new("={pre}").dep(
            "{pre}",
            SymbolKey::aggregate("Seed", AggregateKind::PreRoundShares),
            ReferenceKind::Named,
        );
        let formula = resolve_encoding(&encoding, &reg, &ResolveContext::default()).unwrap();
        assert_eq!(formula, "=Seed_PreRoundShares");
    }

    #[test]
    fn test_division_guard() {
        assert_eq!(ensure_division_guard("=A1/B1"), "=IFERROR(A1/B1,0)");
        // Already wrapped: left alone
        assert_eq!(
            ensure_division_guard("=IFERROR(A1/B1,0)"),
            "=IFERROR(A1/B1,0)"
        );
        // No division: left alone
        assert_eq!(ensure_division_guard("=A1+B1"), "=A1+B1");
    }

    #[test]
    fn test_encoding_with_division_gets_guarded() {
        let reg = registry();
        let encoding = FormulaEncoding::new("{pre}/{issued}")
            .dep(
                "{pre}",
                SymbolKey::aggregate("Seed", AggregateKind::PreRoundShares),
                ReferenceKind::Named,
            )
            .dep(
                "{issued}",
                SymbolKey::aggregate("Seed", AggregateKind::IssuedShares),
                ReferenceKind::Named,
            );

        let formula = resolve_encoding(&encoding, &reg, &ResolveContext::default()).unwrap();
        assert_eq!(
            formula,
            "=IFERROR(Seed_PreRoundShares/Seed_IssuedShares,0)"
        );
    }
}
