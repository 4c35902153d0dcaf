//! Translation groups: posts or terms on different sites that are translations of each other.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::cache::{Cache, CacheExt, GroupCache, KeyFragment};
use crate::hooks::HookManager;
use crate::utils::lock::{rw_read, rw_write};
use crate::{fragments, ContentId, Error, ErrorContext, Result, SiteId};

const SOURCE: &str = "relations::content";

/// Fired as `[kind, [[site_id, content_id], ...]]` with every member whose
/// relations changed.
pub const CONTENT_RELATIONS_UPDATED: &str = "mlp_content_relations_updated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Term,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Term => "term",
        }
    }
}

/// Content relations API.
pub trait ContentRelations: Send + Sync {
    /// Every member of the translation group `content_id` on `site_id` belongs
    /// to, keyed by site. Empty when the content is not related to anything.
    fn get_relations(&self, site_id: SiteId, content_id: ContentId, kind: ContentKind) -> BTreeMap<SiteId, ContentId>;

    /// Adds the target to the source's translation group. A target already in
    /// another group moves over; a different item of the target site already in
    /// the group is replaced. Returns whether anything changed.
    fn set_relation(
        &self,
        source_site: SiteId,
        source_id: ContentId,
        target_site: SiteId,
        target_id: ContentId,
        kind: ContentKind,
    ) -> Result<bool>;

    /// Removes the content from its translation group.
    fn delete_relation(&self, site_id: SiteId, content_id: ContentId, kind: ContentKind) -> Result<bool>;
}

type Member = (SiteId, ContentId);

#[derive(Default)]
struct Groups {
    next_id: u64,
    members: HashMap<u64, BTreeMap<SiteId, ContentId>>,
    index: HashMap<(ContentKind, SiteId, ContentId), u64>,
}

impl Groups {
    fn group_of(&self, kind: ContentKind, member: Member) -> Option<u64> {
        self.index.get(&(kind, member.0, member.1)).copied()
    }

    fn members_of(&self, group: u64) -> Vec<Member> {
        self.members.get(&group).map(|m| m.iter().map(|(&s, &c)| (s, c)).collect()).unwrap_or_default()
    }

    fn detach(&mut self, kind: ContentKind, member: Member) -> bool {
        let Some(group) = self.index.remove(&(kind, member.0, member.1)) else {
            return false;
        };
        let remaining = match self.members.get_mut(&group) {
            Some(members) => {
                members.remove(&member.0);
                members.len()
            }
            None => 0,
        };
        // a group of one relates nothing
        if remaining <= 1 {
            if let Some(members) = self.members.remove(&group) {
                for (site, content) in members {
                    self.index.remove(&(kind, site, content));
                }
            }
        }
        true
    }

    fn attach(&mut self, kind: ContentKind, group: u64, member: Member) {
        self.members.entry(group).or_default().insert(member.0, member.1);
        self.index.insert((kind, member.0, member.1), group);
    }

    fn create(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process translation groups with cached lookups.
pub struct InMemoryContentRelations {
    groups: RwLock<Groups>,
    cache: GroupCache,
    hooks: Weak<HookManager>,
    ttl: Duration,
}

impl InMemoryContentRelations {
    /// `cache` should use a group shared by every site: invalidation only
    /// reaches the partition of the site selected when the action fires.
    pub fn new(cache: GroupCache, hooks: &Arc<HookManager>) -> Self {
        cache.on_actions(&[CONTENT_RELATIONS_UPDATED], invalidate_members);
        Self {
            groups: RwLock::new(Groups::default()),
            cache,
            hooks: Arc::downgrade(hooks),
            ttl: Duration::ZERO,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn load(&self, site_id: SiteId, content_id: ContentId, kind: ContentKind) -> BTreeMap<SiteId, ContentId> {
        let groups = rw_read(&self.groups, SOURCE, "get_relations");
        groups
            .group_of(kind, (site_id, content_id))
            .and_then(|g| groups.members.get(&g).cloned())
            .unwrap_or_default()
    }

    fn changed(&self, kind: ContentKind, affected: BTreeSet<Member>) -> Result<()> {
        info!(kind = kind.as_str(), members = affected.len(), "Content relations changed");
        let Some(hooks) = self.hooks.upgrade() else {
            return Ok(());
        };
        let members: Vec<Value> = affected.into_iter().map(|(s, c)| json!([s, c])).collect();
        hooks.do_action(CONTENT_RELATIONS_UPDATED, &[json!(kind.as_str()), Value::Array(members)])
    }
}

fn relations_key(kind: &str, site_id: SiteId, content_id: ContentId) -> Vec<KeyFragment> {
    fragments![kind, site_id, content_id]
}

/// Drops the cached lookups of every member named in the action arguments.
fn invalidate_members(cache: &dyn Cache, args: &[Value]) -> Result<()> {
    let kind = args.first().and_then(Value::as_str);
    let members = args.get(1).and_then(Value::as_array);
    let (Some(kind), Some(members)) = (kind, members) else {
        return Err(Error::hook(CONTENT_RELATIONS_UPDATED, "expected [kind, members] arguments"));
    };
    for member in members {
        let site = member.get(0).and_then(Value::as_u64);
        let content = member.get(1).and_then(Value::as_u64);
        if let (Some(site), Some(content)) = (site, content) {
            cache.delete(&relations_key(kind, site, content));
        }
    }
    debug!(kind, members = members.len(), "Content relation lookups invalidated");
    Ok(())
}

impl ContentRelations for InMemoryContentRelations {
    fn get_relations(&self, site_id: SiteId, content_id: ContentId, kind: ContentKind) -> BTreeMap<SiteId, ContentId> {
        self.cache
            .remember(&relations_key(kind.as_str(), site_id, content_id), self.ttl, || {
                self.load(site_id, content_id, kind)
            })
    }

    fn set_relation(
        &self,
        source_site: SiteId,
        source_id: ContentId,
        target_site: SiteId,
        target_id: ContentId,
        kind: ContentKind,
    ) -> Result<bool> {
        if source_site == target_site {
            return Err(Error::validation_with_context(
                "cannot relate content to content on the same site",
                ErrorContext::new()
                    .with_details(format!("site {}: {} -> {}", source_site, source_id, target_id))
                    .with_source("content_relations"),
            ));
        }
        let source = (source_site, source_id);
        let target = (target_site, target_id);

        let affected = {
            let mut groups = rw_write(&self.groups, SOURCE, "set_relation");
            let source_group = groups.group_of(kind, source);
            if source_group.is_some() && source_group == groups.group_of(kind, target) {
                return Ok(false);
            }

            let mut affected: BTreeSet<Member> = BTreeSet::from([source, target]);
            if let Some(old) = groups.group_of(kind, target) {
                affected.extend(groups.members_of(old));
                groups.detach(kind, target);
            }

            let group = match groups.group_of(kind, source) {
                Some(group) => group,
                None => {
                    let group = groups.create();
                    groups.attach(kind, group, source);
                    group
                }
            };
            let displaced = groups.members.get(&group).and_then(|m| m.get(&target_site)).copied();
            if let Some(displaced) = displaced {
                groups.detach(kind, (target_site, displaced));
                affected.insert((target_site, displaced));
            }
            affected.extend(groups.members_of(group));
            // detaching the displaced member may have dissolved a pair
            let group = match groups.group_of(kind, source) {
                Some(group) => group,
                None => {
                    let group = groups.create();
                    groups.attach(kind, group, source);
                    group
                }
            };
            groups.attach(kind, group, target);
            affected
        };

        self.changed(kind, affected)?;
        Ok(true)
    }

    fn delete_relation(&self, site_id: SiteId, content_id: ContentId, kind: ContentKind) -> Result<bool> {
        let affected = {
            let mut groups = rw_write(&self.groups, SOURCE, "delete_relation");
            let Some(group) = groups.group_of(kind, (site_id, content_id)) else {
                return Ok(false);
            };
            let affected: BTreeSet<Member> = groups.members_of(group).into_iter().collect();
            groups.detach(kind, (site_id, content_id));
            affected
        };
        self.changed(kind, affected)?;
        Ok(true)
    }
}
