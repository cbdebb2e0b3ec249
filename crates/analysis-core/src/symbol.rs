/// Exchange suffixes stripped when canonicalising a ticker.
pub const EXCHANGE_SUFFIXES: &[&str] = &[".BK"];

/// Canonical stock identifier: trimmed, upper-cased, exchange suffix removed.
///
/// `"scb.bk"` and `"SCB"` both map to `"SCB"`. Share-class dots such as
/// `BRK.B` are kept because only known exchange suffixes are stripped.
pub fn canonical_symbol(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    for suffix in EXCHANGE_SUFFIXES {
        if let Some(stripped) = upper.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    upper
}

/// Symbol in the form the market-data provider expects.
pub fn provider_symbol(raw: &str, suffix: &str) -> String {
    format!("{}{}", canonical_symbol(raw), suffix)
}
