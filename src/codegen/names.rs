//! Identifier rendering
//!
//! Case conversion and keyword escaping for the target languages, plus
//! collision handling for type names hoisted out of one schema.

use std::collections::HashSet;

/// Rust keywords (strict and reserved) that need a raw identifier
const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate", "do", "dyn",
    "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in", "let", "loop", "macro",
    "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "static", "struct", "trait",
    "true", "try", "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers in Rust
const RUST_NON_RAW: &[&str] = &["self", "Self", "super", "crate"];

/// TypeScript global types a generated interface must not shadow
const TS_GLOBAL_TYPES: &[&str] = &[
    "Array", "Boolean", "Date", "Error", "Function", "Map", "Number", "Object", "Promise", "Record", "Set",
    "String", "Symbol",
];

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | ' ' | '.' | '/' | ':')
}

/// Convert to PascalCase. Existing inner capitals are kept, so
/// `dataQuery` becomes `DataQuery` and `PanelCfg` stays as is.
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;

    for c in s.chars() {
        if is_separator(c) {
            capitalize_next = true;
        } else if !c.is_ascii_alphanumeric() {
            continue;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Convert to camelCase
pub fn to_camel_case(s: &str) -> String {
    let pascal = to_pascal_case(s);
    let mut chars = pascal.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
    }
}

/// Convert to snake_case
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if is_separator(c) {
            if !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }

    result.trim_end_matches('_').to_string()
}

/// Rust type name for `s`
pub fn rust_type_name(s: &str) -> String {
    let name = to_pascal_case(s);
    match name.chars().next() {
        None => "Unnamed".to_string(),
        Some(c) if c.is_ascii_digit() => format!("T{}", name),
        Some(_) => name,
    }
}

/// Rust field identifier for the JSON property `s`.
///
/// Returns the identifier and whether it differs from `s`, in which case the
/// field needs a `#[serde(rename)]`.
pub fn rust_field_name(s: &str) -> (String, bool) {
    let mut ident = to_snake_case(s);
    if ident.is_empty() {
        ident = "field".to_string();
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident = format!("f_{}", ident);
    }
    if RUST_NON_RAW.contains(&ident.as_str()) {
        ident = format!("{}_", ident);
    } else if RUST_KEYWORDS.contains(&ident.as_str()) {
        ident = format!("r#{}", ident);
    }
    let bare = ident.trim_start_matches("r#");
    let renamed = bare != s;
    (ident, renamed)
}

/// Rust enum variant name for the string value `s`
pub fn rust_variant_name(s: &str) -> String {
    let name = to_pascal_case(s);
    if name.is_empty() {
        return "Empty".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("V{}", name);
    }
    name
}

/// TypeScript type name for `s`
pub fn ts_type_name(s: &str) -> String {
    let name = rust_type_name(s);
    if TS_GLOBAL_TYPES.contains(&name.as_str()) {
        format!("{}Type", name)
    } else {
        name
    }
}

/// TypeScript property key: bare when it is a valid identifier, quoted otherwise
pub fn ts_property_name(s: &str) -> String {
    let valid = s
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if valid {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

/// Hands out unique type names within one generated file.
///
/// A colliding name is disambiguated with a numeric suffix.
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `base`, or the first free `base2`, `base3`, ...
    pub fn claim(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}", base, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tenant_id", "TenantId")]
    #[case("user-profile", "UserProfile")]
    #[case("dataQuery", "DataQuery")]
    #[case("PanelCfg", "PanelCfg")]
    #[case("grafana-piechart-panel", "GrafanaPiechartPanel")]
    fn test_to_pascal_case(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_pascal_case(input), expected);
    }

    #[rstest]
    #[case("TenantId", "tenant_id")]
    #[case("UserProfile", "user_profile")]
    #[case("API", "api")]
    #[case("refId", "ref_id")]
    #[case("max-data-points", "max_data_points")]
    fn test_to_snake_case(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_snake_case(input), expected);
    }

    #[test]
    fn test_rust_field_names() {
        assert_eq!(rust_field_name("name"), ("name".to_string(), false));
        assert_eq!(rust_field_name("refId"), ("ref_id".to_string(), true));
        assert_eq!(rust_field_name("type"), ("r#type".to_string(), false));
        assert_eq!(rust_field_name("self"), ("self_".to_string(), true));
        assert_eq!(rust_field_name("2d"), ("f_2d".to_string(), true));
    }

    #[test]
    fn test_variant_and_type_names() {
        assert_eq!(rust_variant_name("time_series"), "TimeSeries");
        assert_eq!(rust_variant_name("3d"), "V3d");
        assert_eq!(rust_variant_name(""), "Empty");
        assert_eq!(rust_type_name("0day"), "T0day");
        assert_eq!(ts_type_name("string"), "StringType");
        assert_eq!(ts_type_name("options"), "Options");
        assert_eq!(to_camel_case("data_query"), "dataQuery");
    }

    #[test]
    fn test_ts_property_names() {
        assert_eq!(ts_property_name("refId"), "refId");
        assert_eq!(ts_property_name("max-lines"), "'max-lines'");
        assert_eq!(ts_property_name("1st"), "'1st'");
    }

    #[test]
    fn test_unique_names() {
        let mut names = UniqueNames::new();
        assert_eq!(names.claim("Spec"), "Spec");
        assert_eq!(names.claim("Spec"), "Spec2");
        assert_eq!(names.claim("Spec"), "Spec3");
        assert!(names.is_taken("Spec2"));
    }
}
