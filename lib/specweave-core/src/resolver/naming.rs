use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::document::Node;
use crate::fragment::Fragment;
use crate::source::Reference;
use crate::{Source, Target};

/// Names accepted verbatim as collection keys.
static COMPONENT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("a valid regex"));

const FALLBACK_NAME: &str = "Schema";

/// Registry of content hoisted into the consolidated collection.
///
/// Each target is hoisted once and keeps its name. Keys already present in the root
/// collection are reserved, except for the target their own pointer designates.
#[derive(Debug)]
pub(crate) struct Hoister {
    collection: Fragment,
    reserved: HashSet<String>,
    preferred: HashMap<Target, String>,
    names: HashMap<Target, String>,
    entries: IndexMap<String, Node>,
}

impl Hoister {
    pub(crate) fn new(collection: Fragment) -> Self {
        Self {
            collection,
            reserved: HashSet::new(),
            preferred: HashMap::new(),
            names: HashMap::new(),
            entries: IndexMap::new(),
        }
    }

    /// Records the keys of the root collection, and the targets of its external pointers.
    pub(crate) fn prepare(&mut self, root: &Node, root_source: &Source) {
        let Ok(Node::Mapping(collection)) = self.collection.extract(root) else {
            return;
        };

        for (key, value) in collection {
            self.reserved.insert(key.clone());

            let Some(reference) = value.as_reference().and_then(|raw| Reference::parse(raw).ok()) else {
                continue;
            };
            let Some(source) = reference.source() else {
                continue;
            };
            if let Ok(source) = root_source.resolve(source) {
                let target = Target::new(source, reference.fragment().clone());
                self.preferred.entry(target).or_insert_with(|| key.clone());
            }
        }
    }

    pub(crate) fn name_of(&self, target: &Target) -> Option<&str> {
        self.names.get(target).map(String::as_str)
    }

    /// Stores resolved content and returns its name.
    pub(crate) fn hoist(&mut self, target: Target, node: Node) -> String {
        let name = self.pick_name(&target);
        self.entries.insert(name.clone(), node);
        self.names.insert(target, name.clone());
        name
    }

    /// A same-document pointer to the named entry.
    pub(crate) fn pointer_to(&self, name: &str) -> Node {
        Node::reference(self.collection.join(name).to_pointer())
    }

    pub(crate) fn collection(&self) -> &Fragment {
        &self.collection
    }

    pub(crate) fn into_entries(self) -> IndexMap<String, Node> {
        self.entries
    }

    fn pick_name(&self, target: &Target) -> String {
        if let Some(name) = self.preferred.get(target) {
            return name.clone();
        }

        let base = base_name(target);
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.reserved.contains(&candidate) || self.entries.contains_key(&candidate) {
            suffix += 1;
            candidate = format!("{base}{suffix}");
        }
        candidate
    }
}

/// The last fragment segment, or the PascalCase file stem for whole documents.
fn base_name(target: &Target) -> String {
    use cruet::*;

    let name = match target.fragment.last_segment() {
        Some(segment) if COMPONENT_NAME.is_match(segment) => segment.to_string(),
        Some(segment) => segment.to_pascal_case(),
        None => target
            .source
            .stem()
            .map(|stem| stem.to_pascal_case())
            .unwrap_or_default(),
    };

    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rstest::rstest;

    use super::*;
    use crate::codec::{Format, decode};

    fn schemas() -> Fragment {
        Fragment::from_segments(["components", "schemas"])
    }

    fn target(path: &str, fragment: &[&str]) -> Target {
        Target::new(
            Source::File(PathBuf::from(path)),
            Fragment::from_segments(fragment.iter().copied()),
        )
    }

    #[rstest]
    #[case("/api/user.yaml", &[], "User")]
    #[case("/api/pet-store.yaml", &[], "PetStore")]
    #[case("/api/common.yaml", &["components", "schemas", "Error"], "Error")]
    #[case("/api/common.yaml", &["definitions", "api_error.v2"], "api_error.v2")]
    #[case("/api/common.yaml", &["definitions", "pet store"], "PetStore")]
    fn should_derive_base_name(#[case] path: &str, #[case] fragment: &[&str], #[case] expected: &str) {
        let name = base_name(&target(path, fragment));

        assert_eq!(name, expected);
    }

    #[test]
    fn should_suffix_on_collision() {
        let mut hoister = Hoister::new(schemas());

        let first = hoister.hoist(target("/a/user.yaml", &[]), Node::mapping());
        let second = hoister.hoist(target("/b/user.yaml", &[]), Node::mapping());
        let third = hoister.hoist(target("/c/user.json", &[]), Node::mapping());

        assert_eq!([first, second, third], ["User", "User2", "User3"]);
    }

    #[test]
    fn should_reserve_existing_collection_keys() {
        let root = decode(
            br#"{"components": {"schemas": {"User": {"type": "string"}, "Pet": {"$ref": "./pet.yaml"}}}}"#,
            Some(Format::Json),
            "test",
        )
        .expect("valid JSON");
        let mut hoister = Hoister::new(schemas());
        hoister.prepare(&root, &Source::File(PathBuf::from("/api/main.json")));

        let user = hoister.hoist(target("/api/user.yaml", &[]), Node::mapping());
        let pet = hoister.hoist(target("/api/pet.yaml", &[]), Node::mapping());
        let other_pet = hoister.hoist(target("/other/pet.yaml", &[]), Node::mapping());

        assert_eq!(user, "User2");
        assert_eq!(pet, "Pet");
        assert_eq!(other_pet, "Pet2");
        assert_eq!(hoister.name_of(&target("/api/pet.yaml", &[])), Some("Pet"));
    }

    #[test]
    fn should_render_pointer_to_entry() {
        let hoister = Hoister::new(schemas());

        assert_eq!(
            hoister.pointer_to("User").as_reference(),
            Some("#/components/schemas/User")
        );
    }
}
