//! Rollback snapshots of the entity cache.
//!
//! A [`CacheSnapshot`] captures the collection view and a chosen set of
//! entity views before an optimistic edit. Restoring it puts both views
//! back exactly as they were, including "absent" and "not loaded".

use crate::{cache::EntityCache, Entity, EntityId};

/// Pre-mutation state of the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    collection: Option<Vec<Entity>>,
    entities: Vec<(EntityId, Option<Entity>)>,
}

impl CacheSnapshot {
    /// Capture the collection view and the entity views of `ids`.
    pub fn capture<'a>(cache: &EntityCache, ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            collection: cache.collection(),
            entities: ids
                .into_iter()
                .map(|id| (id.to_string(), cache.entity(id)))
                .collect(),
        }
    }

    /// Capture only the collection view.
    pub fn collection_only(cache: &EntityCache) -> Self {
        Self::capture(cache, std::iter::empty())
    }

    /// The captured collection view.
    pub fn collection(&self) -> Option<&[Entity]> {
        self.collection.as_deref()
    }

    /// Entities from the captured collection view whose id is in `ids`, in
    /// collection order, falling back to captured entity views.
    pub fn entities_for(&self, ids: &[EntityId]) -> Vec<Entity> {
        let mut found: Vec<Entity> = self
            .collection
            .iter()
            .flatten()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect();
        for (id, entity) in &self.entities {
            if let Some(entity) = entity {
                if ids.contains(id) && !found.iter().any(|e| &e.id == id) {
                    found.push(entity.clone());
                }
            }
        }
        found
    }

    /// Put every captured view back into `cache`.
    pub fn restore(self, cache: &EntityCache) {
        match self.collection {
            Some(list) => cache.set_collection(list),
            None => cache.unload_collection(),
        }
        for (id, entity) in self.entities {
            cache.write_entity(&id, |_| entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::attributes;
    use chrono::Utc;
    use serde_json::json;

    fn user(id: &str, name: &str) -> Entity {
        Entity::new(id, Utc::now(), attributes(json!({ "name": name })))
    }

    #[test]
    fn restore_undoes_edits_to_both_views() {
        let cache = EntityCache::new();
        cache.set_collection(vec![user("a", "A"), user("b", "B")]);
        cache.put_entity(user("a", "A"));
        let before_list = cache.collection();
        let before_entity = cache.entity("a");

        let snapshot = CacheSnapshot::capture(&cache, ["a"]);
        cache.update_everywhere("a", |e| e.merge(&attributes(json!({"name": "Z"}))));
        cache.remove("b");

        snapshot.restore(&cache);
        assert_eq!(cache.collection(), before_list);
        assert_eq!(cache.entity("a"), before_entity);
    }

    #[test]
    fn restore_preserves_absence() {
        let cache = EntityCache::new();
        let snapshot = CacheSnapshot::capture(&cache, ["a"]);

        cache.write_collection(|mut list| {
            list.push(user("a", "A"));
            list
        });
        cache.put_entity(user("a", "A"));

        snapshot.restore(&cache);
        assert_eq!(cache.collection(), None);
        assert_eq!(cache.entity("a"), None);
    }

    #[test]
    fn entities_for_prefers_collection_order() {
        let cache = EntityCache::new();
        cache.set_collection(vec![user("a", "A"), user("b", "B"), user("c", "C")]);
        cache.put_entity(user("d", "D"));
        let snapshot = CacheSnapshot::capture(&cache, ["d"]);

        let ids: Vec<_> = snapshot
            .entities_for(&["c".into(), "a".into(), "d".into()])
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
    }
}
