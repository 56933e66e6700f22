//! Compiled-in synonym tables.
//!
//! Each table maps an alternate spelling (English, Arabic, Egyptian
//! colloquial) to a canonical catalog key in lowercase. Tables are listed
//! in priority order: when two tables define the same synonym, the earlier
//! one wins. Entries whose target is not in the live catalog are ignored
//! at index build time.

/// A named synonym table.
pub struct SynonymTable {
    pub name: &'static str,
    pub entries: &'static [(&'static str, &'static str)],
}

/// Finished household items. Highest priority: a specific item beats a
/// raw material reading of the same word.
const ITEM_SYNONYMS: &[(&str, &str)] = &[
    ("faucet", "basin mixer"),
    ("faucets", "basin mixer"),
    ("mixer tap", "basin mixer"),
    ("sink mixer", "basin mixer"),
    ("laptops", "laptop"),
    ("notebook computer", "laptop"),
    ("chairs", "chair"),
    ("clothes iron", "iron"),
    ("steam iron", "iron"),
    ("fridge", "refrigerator"),
    ("washer", "washing machine"),
    ("television", "tv"),
    ("mobile phone", "mobile"),
    ("cell phone", "mobile"),
    ("smartphone", "mobile"),
    ("microwave oven", "microwave"),
    ("water heater", "heater"),
];

const ARABIC_SYNONYMS: &[(&str, &str)] = &[
    ("حنفية", "basin mixer"),
    ("حنفيه", "basin mixer"),
    ("خلاط مياه", "basin mixer"),
    ("لابتوب", "laptop"),
    ("لاب توب", "laptop"),
    ("كمبيوتر محمول", "laptop"),
    ("كرسي", "chair"),
    ("كراسي", "chair"),
    ("مكواة", "iron"),
    ("مكوة", "iron"),
    ("مكاوي", "iron"),
    ("ثلاجة", "refrigerator"),
    ("تلاجة", "refrigerator"),
    ("تلاجه", "refrigerator"),
    ("غسالة", "washing machine"),
    ("غساله", "washing machine"),
    ("تلفزيون", "tv"),
    ("تليفزيون", "tv"),
    ("شاشة", "tv"),
    ("موبايل", "mobile"),
    ("تليفون", "mobile"),
    ("ميكروويف", "microwave"),
    ("سخان", "heater"),
    ("بلاستيك", "plastics"),
    ("بلاستك", "plastics"),
    ("كانز", "cans"),
    ("علب كانز", "cans"),
    ("الومنيوم", "aluminium"),
    ("ألومنيوم", "aluminium"),
    ("المونيوم", "aluminium"),
    ("نحاس", "copper"),
    ("ستانلس", "stainless"),
    ("استانلس", "stainless"),
    ("صفيح", "tinplate"),
    ("كرتون", "cardboard"),
    ("كراتين", "cardboard"),
    ("ورق", "paper"),
    ("جرايد", "newspaper"),
    ("جرائد", "newspaper"),
    ("مجلات", "magazines"),
    ("بلاستيك صلب", "solid plastic"),
];

/// Raw-material spellings. Lowest priority.
const MATERIAL_SYNONYMS: &[(&str, &str)] = &[
    ("aluminum", "aluminium"),
    ("aluminium cans", "cans"),
    ("soda cans", "cans"),
    ("drink cans", "cans"),
    ("stainless steel", "stainless"),
    ("tin plate", "tinplate"),
    ("tin cans", "tinplate"),
    ("hard plastic", "solid plastic"),
    ("rigid plastic", "solid plastic"),
    ("plastic bottles", "plastics"),
    ("carton", "cardboard"),
    ("cartons", "cardboard"),
    ("cardboard boxes", "cardboard"),
    ("newspapers", "newspaper"),
    ("magazine", "magazines"),
    ("copper wire", "copper"),
];

/// All tables, highest priority first.
pub const SYNONYM_TABLES: &[SynonymTable] = &[
    SynonymTable {
        name: "items",
        entries: ITEM_SYNONYMS,
    },
    SynonymTable {
        name: "arabic",
        entries: ARABIC_SYNONYMS,
    },
    SynonymTable {
        name: "materials",
        entries: MATERIAL_SYNONYMS,
    },
];

/// Raw-material catalog keys. Matching one of these is a weaker
/// identification than matching a named finished item.
pub const GENERIC_MATERIALS: &[&str] = &[
    "aluminium",
    "cans",
    "stainless",
    "tinplate",
    "copper",
    "solid plastic",
    "paper",
    "cardboard",
    "magazines",
    "newspaper",
];

pub fn is_generic(material: &str) -> bool {
    let key = material.trim().to_lowercase();
    GENERIC_MATERIALS.contains(&key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_generic() {
        assert!(is_generic("Aluminium"));
        assert!(is_generic(" solid plastic "));
        assert!(!is_generic("basin mixer"));
        assert!(!is_generic("plastics"));
    }

    #[test]
    fn test_tables_are_normalized() {
        for table in SYNONYM_TABLES {
            for (synonym, target) in table.entries {
                assert_eq!(*synonym, synonym.trim().to_lowercase(), "table {}", table.name);
                assert_eq!(*target, target.to_lowercase(), "table {}", table.name);
            }
        }
    }
}
