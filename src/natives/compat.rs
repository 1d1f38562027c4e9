//! Deprecated flat declaration set.
//!
//! Older scripts call natives by `PascalCase` globals (`GetEntityCoords`)
//! instead of namespaced methods. Those names are not separate natives, only
//! aliases that delegate to the canonical declaration.

use std::collections::HashMap;

use super::{NativeDef, ALL};

/// `GET_ENTITY_COORDS` -> `GetEntityCoords`.
pub fn legacy_name(def: &NativeDef) -> String {
    def.name
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Legacy name to canonical declaration, for every native in [`ALL`].
pub fn aliases() -> HashMap<String, &'static NativeDef> {
    ALL.iter()
        .flat_map(|ns| ns.iter())
        .map(|def| (legacy_name(def), def))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::natives::{entity, kvp};

    #[test]
    fn test_legacy_names() {
        assert_eq!(legacy_name(&entity::GET_ENTITY_COORDS), "GetEntityCoords");
        assert_eq!(legacy_name(&kvp::SET_RESOURCE_KVP_INT), "SetResourceKvpInt");
    }

    #[test]
    fn test_aliases_point_at_canonical_declarations() {
        let table = aliases();
        assert_eq!(table["GetResourceKvpInt"].id, kvp::GET_RESOURCE_KVP_INT.id);
        assert_eq!(table.len(), ALL.iter().map(|ns| ns.len()).sum::<usize>());
    }
}
