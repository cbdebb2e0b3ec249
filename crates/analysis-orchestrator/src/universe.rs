use analysis_core::canonical_symbol;

/// SET50 constituents in canonical form.
pub const SET50: &[&str] = &[
    "ADVANC", "AOT", "AWC", "BANPU", "BBL", "BDMS", "BEM", "BGRIM", "BH", "BJC", "BPP", "CPALL",
    "CPF", "CPN", "CRC", "DELTA", "EGCO", "BSRC", "GULF", "HMPRO", "IRPC", "KBANK", "KTB", "KTC",
    "LH", "MINT", "MTC", "OR", "OSP", "PTT", "PTTEP", "PTTGC", "RATCH", "SAWAD", "SCB", "SCC",
    "SCGP", "TISCO", "TLI", "TOP", "TTB", "TU", "VGI", "WHA", "GLOBAL", "BAM", "CPAXT", "GPSC",
    "BLA",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockUniverse {
    Custom(Vec<String>),
    Set50,
}

impl StockUniverse {
    /// An explicit, non-empty list wins over the default index.
    pub fn from_request(symbols: Option<Vec<String>>) -> Self {
        match symbols {
            Some(list) if !list.is_empty() => StockUniverse::Custom(list),
            _ => StockUniverse::Set50,
        }
    }

    /// Canonical symbols, duplicates removed, first occurrence kept.
    pub fn get_symbols(&self) -> Vec<String> {
        let raw: Vec<String> = match self {
            StockUniverse::Custom(symbols) => symbols.iter().map(|s| canonical_symbol(s)).collect(),
            StockUniverse::Set50 => SET50.iter().map(|s| s.to_string()).collect(),
        };

        let mut seen = std::collections::HashSet::new();
        raw.into_iter()
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set50_is_default() {
        assert_eq!(StockUniverse::from_request(None), StockUniverse::Set50);
        assert_eq!(StockUniverse::from_request(Some(vec![])), StockUniverse::Set50);
        assert_eq!(StockUniverse::Set50.get_symbols().len(), SET50.len());
    }

    #[test]
    fn test_custom_symbols_are_canonical_and_unique() {
        let universe = StockUniverse::from_request(Some(vec![
            "ptt.bk".to_string(),
            "SCB".to_string(),
            "PTT".to_string(),
            " ".to_string(),
        ]));
        assert_eq!(universe.get_symbols(), vec!["PTT", "SCB"]);
    }
}
