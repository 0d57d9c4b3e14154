#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A module loaded inside an injected agent, as reported by `/module/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleInfo {
    pub name: String,
    pub is_loaded: bool,
    pub is_activated: bool,
    pub class_cnt: u32,
    pub method_cnt: u32,
    pub version: String,
    pub author: String,
}

/// A library found on the classpath of an injected JVM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dependency {
    /// Artifact id.
    pub product: String,
    pub version: String,
    /// Group id.
    pub vendor: String,
    pub path: String,
    /// How the jar was brought in.
    pub source: String,
}

/// Set of module names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSet(BTreeSet<String>);

impl ModuleSet {
    /// Modules currently activated in the agent.
    pub fn activated(modules: &[ModuleInfo]) -> Self {
        Self(
            modules
                .iter()
                .filter(|module| module.is_activated)
                .map(|module| module.name.clone())
                .collect(),
        )
    }

    /// Set difference: the modules of `self` that are not in `keep`.
    pub fn without(&self, keep: &BTreeSet<String>) -> Self {
        Self(self.0.difference(keep).cloned().collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<String> for ModuleSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn module(name: &str, activated: bool) -> ModuleInfo {
        ModuleInfo {
            name: name.into(),
            is_loaded: true,
            is_activated: activated,
            ..Default::default()
        }
    }

    #[test]
    fn decodes_agent_field_names() {
        let json = r#"{"name":"rce","isLoaded":true,"isActivated":false,"classCnt":3,"methodCnt":7,"version":"1.0","author":"ops"}"#;
        let info: ModuleInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.name, "rce");
        assert!(info.is_loaded);
        assert!(!info.is_activated);
        assert_eq!((info.class_cnt, info.method_cnt), (3, 7));
    }

    #[test]
    fn activated_skips_inactive_modules() {
        let set = ModuleSet::activated(&[module("a", true), module("b", false), module("c", true)]);
        assert_eq!(set.to_vec(), ["a", "c"]);
    }

    #[test]
    fn without_removes_kept_modules() {
        let set = ModuleSet::activated(&[module("a", true), module("b", true)]);
        let keep: BTreeSet<String> = ["b".to_owned(), "z".to_owned()].into();
        assert_eq!(set.without(&keep).to_vec(), ["a"]);
    }

    proptest! {
        #[test]
        fn without_is_set_difference(
            modules in prop::collection::vec(("[a-e]", any::<bool>()), 0..12),
            keep in prop::collection::btree_set("[a-e]", 0..5),
        ) {
            let infos: Vec<_> = modules.iter().map(|(n, a)| module(n, *a)).collect();
            let targets = ModuleSet::activated(&infos).without(&keep);

            for (name, _) in &modules {
                let activated = infos.iter().any(|m| &m.name == name && m.is_activated);
                prop_assert_eq!(targets.contains(name), activated && !keep.contains(name));
            }
            prop_assert!(targets.len() <= modules.len());
        }
    }
}
