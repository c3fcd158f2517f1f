//! Base-asset synonym table. Config data, not code: the default table has
//! one class (`BTC` ↔ `XBT`) but the table is rebuildable from a TOML file
//! without a code change.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct SynonymTable {
    classes: Vec<HashSet<String>>,
    index: HashMap<String, usize>,
}

impl SynonymTable {
    pub fn with_classes(classes: Vec<HashSet<String>>) -> Self {
        let mut index = HashMap::new();
        for (i, class) in classes.iter().enumerate() {
            for member in class {
                index.insert(member.clone(), i);
            }
        }
        Self { classes, index }
    }

    /// The synonym class for `base` (uppercased), or `{base}` if it belongs
    /// to no configured class.
    pub fn class_of(&self, base: &str) -> HashSet<String> {
        let base = base.to_uppercase();
        match self.index.get(&base) {
            Some(&i) => self.classes[i].clone(),
            None => HashSet::from([base]),
        }
    }
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::with_classes(vec![HashSet::from([
            "BTC".to_string(),
            "XBT".to_string(),
        ])])
    }
}
