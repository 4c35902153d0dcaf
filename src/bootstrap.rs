//! Wires the dispatcher, the object cache and the relation stores together.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::info;

use crate::cache::{GroupCache, LayeredObjectCache, MemoryObjectCache, ObjectCache};
use crate::config::CacheConfig;
use crate::hooks::HookManager;
use crate::relations::{InMemoryContentRelations, InMemorySiteRelations};
use crate::trasher::{PostTrash, Trasher, TrasherSettingRepository};
use crate::Result;

/// Group, and base key, of the cached site relation map. Shared by every site.
pub const SITE_RELATIONS_GROUP: &str = "site_relations";

/// Base key of cached content relation lookups.
pub const CONTENT_RELATIONS_KEY: &str = "content_relations";

/// Group of network-wide data other than the site relation map, shared by every site.
pub const NETWORK_GROUP: &str = "mlp_network";

/// The services of one network, built once and passed down explicitly.
pub struct Services {
    config: CacheConfig,
    hooks: Arc<HookManager>,
    backend: Arc<dyn ObjectCache>,
    site_relations: Arc<InMemorySiteRelations>,
    content_relations: Arc<InMemoryContentRelations>,
}

impl Services {
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let memory = MemoryObjectCache::new();
        memory.add_global_groups(config.global_groups.iter().cloned());
        memory.add_global_groups([SITE_RELATIONS_GROUP, NETWORK_GROUP]);
        let memory: Arc<dyn ObjectCache> = Arc::new(memory);
        let backend: Arc<dyn ObjectCache> = match NonZeroUsize::new(config.local_capacity) {
            Some(capacity) => Arc::new(LayeredObjectCache::new(capacity, memory)),
            None => memory,
        };

        let hooks = Arc::new(HookManager::new());
        let ttl = config.default_ttl();

        let site_cache = GroupCache::new(SITE_RELATIONS_GROUP, backend.clone(), &hooks)
            .with_group(SITE_RELATIONS_GROUP);
        let site_relations = Arc::new(InMemorySiteRelations::new(site_cache, &hooks).with_ttl(ttl));

        let content_cache =
            GroupCache::new(CONTENT_RELATIONS_KEY, backend.clone(), &hooks).with_group(NETWORK_GROUP);
        let content_relations =
            Arc::new(InMemoryContentRelations::new(content_cache, &hooks).with_ttl(ttl));

        info!(
            backend = backend.name(),
            group = %config.default_group,
            local_capacity = config.local_capacity,
            "Cache services ready"
        );

        Ok(Self {
            config,
            hooks,
            backend,
            site_relations,
            content_relations,
        })
    }

    /// Services configured from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::new(CacheConfig::from_env()?)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn hooks(&self) -> &Arc<HookManager> {
        &self.hooks
    }

    pub fn backend(&self) -> &Arc<dyn ObjectCache> {
        &self.backend
    }

    pub fn site_relations(&self) -> &Arc<InMemorySiteRelations> {
        &self.site_relations
    }

    pub fn content_relations(&self) -> &Arc<InMemoryContentRelations> {
        &self.content_relations
    }

    /// A cache under `base_key` in the configured default group.
    pub fn cache(&self, base_key: impl Into<String>) -> GroupCache {
        GroupCache::new(base_key, self.backend.clone(), &self.hooks)
            .with_group(self.config.default_group.clone())
    }

    /// A trasher over the content relations, already listening for trashed posts.
    ///
    /// Replaces the trasher of any earlier call.
    pub fn trasher(
        &self,
        settings: Arc<dyn TrasherSettingRepository>,
        posts: Arc<dyn PostTrash>,
    ) -> Arc<Trasher> {
        let trasher = Arc::new(Trasher::new(settings, self.content_relations.clone(), posts));
        trasher.clone().register(&self.hooks);
        trasher
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::cache::{Cache, MAIN_SITE_ID};
    use crate::relations::{ContentKind, ContentRelations, SiteRelations};
    use crate::trasher::{InMemoryPosts, InMemoryTrasherSettings};

    #[test]
    fn layered_backend_by_default() {
        let services = Services::new(CacheConfig::default()).expect("services");
        assert_eq!(services.backend().name(), "layered");
        assert_eq!(services.backend().current_site(), MAIN_SITE_ID);
    }

    #[test]
    fn zero_capacity_uses_plain_memory() {
        let services = Services::new(CacheConfig::default().with_local_capacity(0)).expect("services");
        assert_eq!(services.backend().name(), "memory");
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(Services::new(CacheConfig::default().with_group(" ")).is_err());
    }

    #[test]
    fn caches_share_backend_and_group() {
        let services = Services::new(CacheConfig::default().with_group("net")).expect("services");
        let a = services.cache("a");
        assert_eq!(a.group(), "net");
        a.set(json!(1), &crate::fragments!["x"], Duration::ZERO);
        assert_eq!(services.backend().get("a|x", "net", false), Some(json!(1)));
    }

    #[test]
    fn site_relation_map_survives_site_switch() {
        let services = Services::new(CacheConfig::default()).expect("services");
        services.site_relations().insert_relations(1, &[2]).expect("insert");
        assert_eq!(services.site_relations().get_related_site_ids(1, false), vec![2]);

        services.backend().switch_to_site(2);
        assert!(services.backend().get(SITE_RELATIONS_GROUP, SITE_RELATIONS_GROUP, false).is_some());
    }

    #[test]
    fn trasher_is_registered() {
        let services = Services::new(CacheConfig::default()).expect("services");
        let settings = Arc::new(InMemoryTrasherSettings::new());
        let posts = Arc::new(InMemoryPosts::new(services.hooks()));
        let _trasher = services.trasher(settings.clone(), posts.clone());

        posts.insert(1, 10);
        posts.insert(2, 20);
        services
            .content_relations()
            .set_relation(1, 10, 2, 20, ContentKind::Post)
            .expect("relate");
        settings.update_setting(1, 10, true);

        assert!(posts.trash_post(1, 10).expect("trash"));
        assert!(posts.is_trashed(2, 20));
    }

    #[test]
    fn second_trasher_replaces_first() {
        let services = Services::new(CacheConfig::default()).expect("services");
        let settings = Arc::new(InMemoryTrasherSettings::new());
        let posts = Arc::new(InMemoryPosts::new(services.hooks()));
        services.trasher(settings.clone(), posts.clone());
        services.trasher(settings, posts);
        assert_eq!(services.hooks().count(crate::trasher::TRASH_POST_ACTION), 1);
    }

    #[test]
    fn relation_groups_are_global() {
        let services = Services::new(CacheConfig::default().with_local_capacity(0)).expect("services");
        services
            .content_relations()
            .set_relation(1, 10, 2, 20, ContentKind::Post)
            .expect("relate");
        services.content_relations().get_relations(1, 10, ContentKind::Post);

        services.backend().switch_to_site(3);
        assert!(services.backend().get("content_relations|post|1|10", NETWORK_GROUP, false).is_some());
    }
}
