//! Small helpers for building target-language expression text
//!
//! The emitted syntax is a bit-exact compatibility surface: function names
//! and argument separators here must be accepted unmodified by the target
//! spreadsheet engine, so every call site goes through these helpers instead
//! of ad-hoc formatting.

/// A function call: `NAME(arg1,arg2,...)`
pub fn func(name: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(name.len() + 2 + args.iter().map(|a| a.len() + 1).sum::<usize>());
    out.push_str(name);
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(arg);
    }
    out.push(')');
    out
}

/// `IF(cond,then,else)`
pub fn if_expr(cond: &str, then: &str, otherwise: &str) -> String {
    func("IF", &[cond, then, otherwise])
}

/// `MAX(a,b)`
pub fn max(a: &str, b: &str) -> String {
    func("MAX", &[a, b])
}

/// `MIN(a,b)`
pub fn min(a: &str, b: &str) -> String {
    func("MIN", &[a, b])
}

/// `ROUND(expr,digits)`
pub fn round(expr: &str, digits: u8) -> String {
    func("ROUND", &[expr, &digits.to_string()])
}

/// `SUM(range)`
pub fn sum(range: &str) -> String {
    func("SUM", &[range])
}

/// `SUMIF(criteria_range,criteria,sum_range)`
pub fn sumif(criteria_range: &str, criteria: &str, sum_range: &str) -> String {
    func("SUMIF", &[criteria_range, criteria, sum_range])
}

/// `SUMIFS(sum_range,criteria_range1,criteria1,...)`
pub fn sumifs(sum_range: &str, criteria: &[(&str, &str)]) -> String {
    let mut args: Vec<&str> = vec![sum_range];
    for (range, criterion) in criteria {
        args.push(range);
        args.push(criterion);
    }
    func("SUMIFS", &args)
}

/// A quoted string literal: `"text"`
pub fn text_literal(s: &str) -> String {
    format!("\"{}\"", s)
}

/// Parenthesize an expression
pub fn paren(expr: &str) -> String {
    format!("({})", expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_func_building() {
        assert_eq!(func("SUM", &["A1:A3"]), "SUM(A1:A3)");
        assert_eq!(max("0", "A1-B1"), "MAX(0,A1-B1)");
        assert_eq!(round("A1/B1", 0), "ROUND(A1/B1,0)");
        assert_eq!(
            if_expr("A1<B1", "A1", "B1"),
            "IF(A1<B1,A1,B1)"
        );
    }

    #[test]
    fn test_sumif_shapes() {
        assert_eq!(
            sumif("T[Rights]", "\"standard\"", "T[Target]"),
            "SUMIF(T[Rights],\"standard\",T[Target])"
        );
        assert_eq!(
            sumifs("T[Shares]", &[("T[Holder]", "\"Alice\""), ("T[Kind]", "\"anti_dilution\"")]),
            "SUMIFS(T[Shares],T[Holder],\"Alice\",T[Kind],\"anti_dilution\")"
        );
    }
}
