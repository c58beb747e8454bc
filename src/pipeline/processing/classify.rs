//! Classification resolver.
//!
//! Maps a NASA `recclass` code to a [`ClassificationTaxonomy`]. Three rule
//! families are tried in a fixed order (primitive achondrites, chondrites,
//! achondrites); inside a family the first matching row wins.

use crate::types::{ChemicalComposition, ClassificationTaxonomy, MaterialType};

/// Predicate over an upper-cased classification code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeMatch {
    Prefix(&'static str),
    /// Starts with `prefix` but not with `excluded`
    PrefixExcept {
        prefix: &'static str,
        excluded: &'static str,
    },
    /// Starts with `prefix` unless the code is exactly `excluded`
    PrefixUnlessExactly {
        prefix: &'static str,
        excluded: &'static str,
    },
    Contains(&'static str),
}

impl CodeMatch {
    pub fn matches(&self, code: &str) -> bool {
        match *self {
            CodeMatch::Prefix(prefix) => code.starts_with(prefix),
            CodeMatch::PrefixExcept { prefix, excluded } => {
                code.starts_with(prefix) && !code.starts_with(excluded)
            }
            CodeMatch::PrefixUnlessExactly { prefix, excluded } => {
                code.starts_with(prefix) && code != excluded
            }
            CodeMatch::Contains(needle) => code.contains(needle),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TaxonomyRule {
    pub matcher: CodeMatch,
    pub group: &'static str,
    pub clan: Option<&'static str>,
    pub clazz: Option<&'static str>,
    pub material: MaterialType,
}

#[derive(Debug)]
pub struct RuleFamily {
    pub name: &'static str,
    pub composition: ChemicalComposition,
    pub rules: &'static [TaxonomyRule],
}

impl RuleFamily {
    /// First matching row of this family, if any. `code` must already be upper-cased.
    pub fn resolve(&self, code: &str) -> Option<ClassificationTaxonomy> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(code))
            .map(|rule| ClassificationTaxonomy {
                group: rule.group.to_string(),
                clan: rule.clan.map(str::to_string),
                clazz: rule.clazz.map(str::to_string),
                chemical_composition: self.composition,
                material_type: rule.material,
            })
    }
}

const fn rule(
    matcher: CodeMatch,
    group: &'static str,
    clan: Option<&'static str>,
    clazz: Option<&'static str>,
    material: MaterialType,
) -> TaxonomyRule {
    TaxonomyRule { matcher, group, clan, clazz, material }
}

use CodeMatch::{Contains, Prefix, PrefixExcept, PrefixUnlessExactly};
use MaterialType::{Iron, Stony, StonyIron};

const PRIMITIVE_ACHONDRITE_RULES: &[TaxonomyRule] = &[
    rule(Prefix("URE"), "URE", None, None, Stony),
    rule(Prefix("BRA"), "BRA", None, None, Stony),
    rule(Prefix("ACA"), "ACA", Some("ACA-LOD"), None, Stony),
    rule(Prefix("LOD"), "LOD", Some("ACA-LOD"), None, Stony),
    rule(Prefix("WIN"), "WIN", Some("WIN-IAB-IICD"), None, Stony),
    rule(Prefix("IRON, IAB"), "IAB", Some("WIN-IAB-IICD"), None, Iron),
];

const CHONDRITE_RULES: &[TaxonomyRule] = &[
    rule(Prefix("CI"), "CI", Some("CI"), Some("C"), Stony),
    rule(Prefix("CM"), "CM", Some("CM-CO"), Some("C"), Stony),
    rule(Prefix("CO"), "CO", Some("CM-CO"), Some("C"), Stony),
    rule(Prefix("CV"), "CV", Some("CV-CK"), Some("C"), Stony),
    rule(Prefix("CK"), "CK", Some("CV-CK"), Some("C"), Stony),
    rule(Prefix("CR"), "CR", Some("CR-CLAN"), Some("C"), Stony),
    rule(Prefix("CH"), "CH", Some("CR-CLAN"), Some("C"), Stony),
    rule(Prefix("CB"), "CB", Some("CR-CLAN"), Some("C"), Stony),
    rule(
        PrefixUnlessExactly { prefix: "H", excluded: "HOWARDITE" },
        "H",
        Some("H-L-LL"),
        Some("O"),
        Stony,
    ),
    rule(
        PrefixExcept { prefix: "L", excluded: "LL" },
        "L",
        Some("H-L-LL"),
        Some("O"),
        Stony,
    ),
    rule(Prefix("LL"), "LL", Some("H-L-LL"), Some("O"), Stony),
    rule(Prefix("EH"), "EH", Some("EH-EL"), Some("E"), Stony),
    rule(Prefix("EL"), "EL", Some("EH-EL"), Some("E"), Stony),
    rule(PrefixExcept { prefix: "R", excluded: "RE" }, "R", None, None, Stony),
    rule(Prefix("K"), "K", None, None, Stony),
];

const ACHONDRITE_RULES: &[TaxonomyRule] = &[
    rule(Prefix("ANG"), "ANG", None, None, Stony),
    rule(Prefix("AUB"), "AUB", None, None, Stony),
    rule(Prefix("EUC"), "EUC", Some("VESTA"), None, Stony),
    rule(Prefix("DIO"), "DIO", Some("VESTA"), None, Stony),
    rule(Prefix("HOW"), "HOW", Some("VESTA"), None, Stony),
    rule(Prefix("MES"), "MES", None, None, StonyIron),
    rule(Prefix("PAL"), "PAL", None, None, StonyIron),
    rule(Prefix("IRON, IC"), "IRON, IC", None, None, Iron),
    rule(Prefix("IRON, IIAB"), "IRON, IIAB", None, None, Iron),
    rule(Prefix("IRON, IIC"), "IRON, IIC", None, None, Iron),
    rule(Prefix("IRON, IID"), "IRON, IID", None, None, Iron),
    rule(Prefix("IRON, IIE"), "IRON, IIE", None, None, Iron),
    rule(Prefix("IRON, IIIAB"), "IRON, IIIAB", None, None, Iron),
    rule(Prefix("IRON, IIIE"), "IRON, IIIE", None, None, Iron),
    rule(Prefix("IRON, IIIF"), "IRON, IIIF", None, None, Iron),
    rule(Prefix("IRON, IVA"), "IRON, IVA", None, None, Iron),
    rule(Prefix("IRON, IVB"), "IRON, IVB", None, None, Iron),
    rule(Contains("SHE"), "SHE", Some("MARS"), None, Stony),
    rule(Contains("NAK"), "NAK", Some("MARS"), None, Stony),
    rule(Contains("CHA"), "CHA", Some("MARS"), None, Stony),
    rule(Contains("OPX"), "OPX", Some("MARS"), None, Stony),
];

/// Rule families in evaluation order
pub const RULE_FAMILIES: &[RuleFamily] = &[
    RuleFamily {
        name: "primitive_achondrites",
        composition: ChemicalComposition::PrimitiveAchondrites,
        rules: PRIMITIVE_ACHONDRITE_RULES,
    },
    RuleFamily {
        name: "chondrites",
        composition: ChemicalComposition::Chondrites,
        rules: CHONDRITE_RULES,
    },
    RuleFamily {
        name: "achondrites",
        composition: ChemicalComposition::Achondrites,
        rules: ACHONDRITE_RULES,
    },
];

/// Resolves a raw classification code. `None` means the code is unclassifiable.
pub fn classify(recclass: &str) -> Option<ClassificationTaxonomy> {
    let code = recclass.to_uppercase();
    RULE_FAMILIES.iter().find_map(|family| family.resolve(&code))
}
