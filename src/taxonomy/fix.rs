//! String-fix rules applied to raw taxonomy and biome strings before splitting.
//!
//! MGnify biome names use `-` both as the level delimiter and inside some
//! labels (`Host-associated`), so those labels are rewritten to use `_`
//! before the split. Species strings get whitespace cleanup around `;`.

use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single regex replacement. `replacement` may use `$1`-style captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRule {
    pub pattern: String,
    pub replacement: String,
}

impl FixRule {
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// Biome labels whose internal hyphen collides with the `-` delimiter.
const BIOME_COMPOUNDS: [(&str, &str); 3] = [
    ("Host-associated", "Host_associated"),
    ("Oil-contaminated", "Oil_contaminated"),
    ("Non-marine", "Non_marine"),
];

/// Default species rules: drop whitespace around `;` and trailing `;`.
pub fn species_rules() -> Vec<FixRule> {
    vec![FixRule::new(r"\s*;\s*", ";"), FixRule::new(r";+$", "")]
}

/// Default biome rules: hyphenated compound labels become underscore-joined.
pub fn biome_rules() -> Vec<FixRule> {
    BIOME_COMPOUNDS
        .iter()
        .map(|(from, to)| FixRule::new(&regex::escape(from), to))
        .collect()
}

/// Undo the biome compound fixes to recover the EBI spelling of a label.
pub fn restore_biome(fixed: &str) -> String {
    BIOME_COMPOUNDS
        .iter()
        .fold(fixed.to_string(), |acc, (from, to)| acc.replace(to, from))
}

/// Compiled, ordered set of fix rules.
#[derive(Debug, Clone)]
pub struct FixRules {
    compiled: Vec<(Regex, String)>,
}

impl FixRules {
    /// Compile `rules`, failing on the first invalid pattern.
    pub fn compile(rules: &[FixRule]) -> Result<Self> {
        let compiled = rules
            .iter()
            .map(|rule| Ok((Regex::new(&rule.pattern)?, rule.replacement.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { compiled })
    }

    /// No rules; `apply` returns its input unchanged.
    pub fn none() -> Self {
        Self {
            compiled: Vec::new(),
        }
    }

    /// Apply every rule in order.
    pub fn apply(&self, raw: &str) -> String {
        self.compiled
            .iter()
            .fold(raw.to_string(), |acc, (re, rep)| {
                re.replace_all(&acc, rep.as_str()).into_owned()
            })
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biome_compounds_fixed() {
        let rules = FixRules::compile(&biome_rules()).unwrap();
        assert_eq!(
            rules.apply("root-Host-associated-Human-Digestive system"),
            "root-Host_associated-Human-Digestive system"
        );
        assert_eq!(
            rules.apply("root-Environmental-Aquatic-Non-marine Saline and Alkaline"),
            "root-Environmental-Aquatic-Non_marine Saline and Alkaline"
        );
        assert_eq!(
            rules.apply("root-Engineered-Bioremediation-Oil-contaminated"),
            "root-Engineered-Bioremediation-Oil_contaminated"
        );
    }

    #[test]
    fn test_species_whitespace_cleanup() {
        let rules = FixRules::compile(&species_rules()).unwrap();
        assert_eq!(
            rules.apply("sk__Bacteria ; p__Firmicutes;c__Bacilli;;"),
            "sk__Bacteria;p__Firmicutes;c__Bacilli"
        );
    }

    #[test]
    fn test_restore_biome() {
        assert_eq!(restore_biome("Host_associated"), "Host-associated");
        assert_eq!(restore_biome("Non_marine Saline"), "Non-marine Saline");
        assert_eq!(restore_biome("Soil"), "Soil");
    }

    #[test]
    fn test_invalid_pattern() {
        let result = FixRules::compile(&[FixRule::new("(unclosed", "")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_none_is_identity() {
        let rules = FixRules::none();
        assert!(rules.is_empty());
        assert_eq!(rules.apply("a-b;c"), "a-b;c");
    }
}
