//! Relations between sites of the network.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use serde_json::json;
use tracing::info;

use crate::cache::{Cache, CacheExt, GroupCache};
use crate::hooks::HookManager;
use crate::utils::lock::{rw_read, rw_write};
use crate::{Result, SiteId};

const SOURCE: &str = "relations::site";

/// Fired with the base site id after any change to site relations.
pub const SITE_RELATIONS_UPDATED: &str = "mlp_site_relations_updated";

/// Site relations API.
///
/// Relations are symmetric: relating 1 to 2 also relates 2 to 1.
pub trait SiteRelations: Send + Sync {
    /// Deletes the relation between two sites, or every relation of `site_1`
    /// when `site_2` is `None`. Returns the number of relations removed.
    fn delete_relation(&self, site_1: SiteId, site_2: Option<SiteId>) -> Result<usize>;

    /// Every site with relations, mapped to its related site ids.
    fn get_all_relations(&self) -> BTreeMap<SiteId, Vec<SiteId>>;

    /// Ids of the sites related to `site_id`, ascending.
    fn get_related_site_ids(&self, site_id: SiteId, include_site: bool) -> Vec<SiteId>;

    /// Relates `base_site_id` to each of `site_ids`. Returns the number of new relations.
    fn insert_relations(&self, base_site_id: SiteId, site_ids: &[SiteId]) -> Result<usize>;

    /// Makes `site_ids` the exact set of sites related to `base_site_id`.
    /// Returns relations inserted plus relations deleted.
    fn set_relationships(&self, base_site_id: SiteId, site_ids: &[SiteId]) -> Result<usize>;
}

fn pair(a: SiteId, b: SiteId) -> (SiteId, SiteId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// In-process site relations with a cached relation map.
pub struct InMemorySiteRelations {
    pairs: RwLock<BTreeSet<(SiteId, SiteId)>>,
    cache: GroupCache,
    hooks: Weak<HookManager>,
    ttl: Duration,
}

impl InMemorySiteRelations {
    pub fn new(cache: GroupCache, hooks: &Arc<HookManager>) -> Self {
        cache.register_deletion_action(&[SITE_RELATIONS_UPDATED], &[]);
        Self {
            pairs: RwLock::new(BTreeSet::new()),
            cache,
            hooks: Arc::downgrade(hooks),
            ttl: Duration::ZERO,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn load_all(&self) -> BTreeMap<SiteId, Vec<SiteId>> {
        let pairs = rw_read(&self.pairs, SOURCE, "load_all");
        let mut all: BTreeMap<SiteId, Vec<SiteId>> = BTreeMap::new();
        for &(a, b) in pairs.iter() {
            all.entry(a).or_default().push(b);
            all.entry(b).or_default().push(a);
        }
        for related in all.values_mut() {
            related.sort_unstable();
        }
        all
    }

    fn changed(&self, base_site_id: SiteId, rows: usize) -> Result<usize> {
        if rows > 0 {
            info!(base_site_id, rows, "Site relations changed");
            if let Some(hooks) = self.hooks.upgrade() {
                hooks.do_action(SITE_RELATIONS_UPDATED, &[json!(base_site_id)])?;
            }
        }
        Ok(rows)
    }
}

impl SiteRelations for InMemorySiteRelations {
    fn delete_relation(&self, site_1: SiteId, site_2: Option<SiteId>) -> Result<usize> {
        let removed = {
            let mut pairs = rw_write(&self.pairs, SOURCE, "delete_relation");
            match site_2 {
                Some(site_2) => usize::from(pairs.remove(&pair(site_1, site_2))),
                None => {
                    let before = pairs.len();
                    pairs.retain(|&(a, b)| a != site_1 && b != site_1);
                    before - pairs.len()
                }
            }
        };
        self.changed(site_1, removed)
    }

    fn get_all_relations(&self) -> BTreeMap<SiteId, Vec<SiteId>> {
        self.cache.remember(&[], self.ttl, || self.load_all())
    }

    fn get_related_site_ids(&self, site_id: SiteId, include_site: bool) -> Vec<SiteId> {
        let mut related = self.get_all_relations().remove(&site_id).unwrap_or_default();
        if include_site && !related.is_empty() {
            related.push(site_id);
            related.sort_unstable();
        }
        related
    }

    fn insert_relations(&self, base_site_id: SiteId, site_ids: &[SiteId]) -> Result<usize> {
        let inserted = {
            let mut pairs = rw_write(&self.pairs, SOURCE, "insert_relations");
            site_ids
                .iter()
                .filter(|&&site| site != base_site_id)
                .filter(|&&site| pairs.insert(pair(base_site_id, site)))
                .count()
        };
        self.changed(base_site_id, inserted)
    }

    fn set_relationships(&self, base_site_id: SiteId, site_ids: &[SiteId]) -> Result<usize> {
        let wanted: BTreeSet<SiteId> =
            site_ids.iter().copied().filter(|&site| site != base_site_id).collect();
        let rows = {
            let mut pairs = rw_write(&self.pairs, SOURCE, "set_relationships");
            let current: BTreeSet<SiteId> = pairs
                .iter()
                .filter_map(|&(a, b)| match (a == base_site_id, b == base_site_id) {
                    (true, _) => Some(b),
                    (_, true) => Some(a),
                    _ => None,
                })
                .collect();
            let mut rows = 0;
            for stale in current.difference(&wanted) {
                pairs.remove(&pair(base_site_id, *stale));
                rows += 1;
            }
            for fresh in wanted.difference(&current) {
                pairs.insert(pair(base_site_id, *fresh));
                rows += 1;
            }
            rows
        };
        self.changed(base_site_id, rows)
    }
}
