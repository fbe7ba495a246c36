use linked_hash_map::LinkedHashMap;

use super::ElementDef;
use super::PropertyDef;

/// Insertion-ordered map from names to definitions.
///
/// Declaration order is iteration order, and the payload is laid out in
/// declaration order, so the same map drives the header, the scanner and
/// the writer without extra bookkeeping. The alias also keeps the
/// dependency on `LinkedHashMap` in one place.
pub type KeyMap<V> = LinkedHashMap<String, V>;

/// Definitions that know the name they are filed under.
pub trait Named {
    fn label(&self) -> &str;
}

impl Named for ElementDef {
    fn label(&self) -> &str {
        &self.name
    }
}

impl Named for PropertyDef {
    fn label(&self) -> &str {
        &self.name
    }
}

/// Stores values under their own name, so the map key and the `name`
/// field can never drift apart.
pub trait NamedInsert<V> {
    fn insert_named(&mut self, value: V);
}

impl<V: Named> NamedInsert<V> for KeyMap<V> {
    fn insert_named(&mut self, value: V) {
        self.insert(value.label().to_string(), value);
    }
}

/// Key under which a bound (element, property) pair is stored in the
/// request registry.
pub(crate) fn request_key(element_name: &str, property_name: &str) -> String {
    format!("{}-{}", element_name, property_name)
}
