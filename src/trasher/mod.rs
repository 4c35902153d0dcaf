//! Trashes the translations of a post when the post itself is trashed.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Trasher`] | Cascades a trash to every related post on other sites |
//! | [`TrasherSettingRepository`] | Per-post opt-in for the cascade |
//! | [`PostTrash`] | Host post store that can trash a post on a given site |
//! | [`InMemoryPosts`] | In-process post store that fires `wp_trash_post` |

mod posts;
mod settings;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::hooks::{HookManager, DEFAULT_PRIORITY};
use crate::relations::{ContentKind, ContentRelations};
use crate::utils::lock::mutex_lock;
use crate::{ContentId, Error, ErrorContext, Result, SiteId};

pub use posts::{InMemoryPosts, PostTrash};
pub use settings::{InMemoryTrasherSettings, TrasherSettingRepository};

const SOURCE: &str = "trasher";

/// Fired as `[site_id, post_id]` right before a post is trashed.
pub const TRASH_POST_ACTION: &str = "wp_trash_post";

/// Name the trasher's listener is registered under.
pub const TRASHER_HOOK: &str = "mlp_trasher";

type Member = (SiteId, ContentId);

/// Claims the members of one translation group for a cascade; released when dropped.
struct CascadeGuard<'a> {
    active: &'a Mutex<HashSet<Member>>,
    members: Vec<Member>,
}

impl<'a> CascadeGuard<'a> {
    /// `None` if another cascade already holds any of `members`.
    fn acquire(active: &'a Mutex<HashSet<Member>>, members: Vec<Member>) -> Option<Self> {
        let mut claimed = mutex_lock(active, SOURCE, "acquire");
        if members.iter().any(|m| claimed.contains(m)) {
            return None;
        }
        claimed.extend(members.iter().copied());
        Some(Self { active, members })
    }
}

impl Drop for CascadeGuard<'_> {
    fn drop(&mut self) {
        let mut claimed = mutex_lock(self.active, SOURCE, "release");
        for member in &self.members {
            claimed.remove(member);
        }
    }
}

/// Post trasher.
///
/// Trashing a related post fires the trash action again. Posts whose group is
/// being cascaded are ignored until that cascade finishes; cascades over
/// unrelated posts run independently.
pub struct Trasher {
    settings: Arc<dyn TrasherSettingRepository>,
    relations: Arc<dyn ContentRelations>,
    posts: Arc<dyn PostTrash>,
    cascading: Mutex<HashSet<Member>>,
}

impl Trasher {
    pub fn new(
        settings: Arc<dyn TrasherSettingRepository>,
        relations: Arc<dyn ContentRelations>,
        posts: Arc<dyn PostTrash>,
    ) -> Self {
        Self {
            settings,
            relations,
            posts,
            cascading: Mutex::new(HashSet::new()),
        }
    }

    fn is_cascading(&self, site_id: SiteId, post_id: ContentId) -> bool {
        mutex_lock(&self.cascading, SOURCE, "is_cascading").contains(&(site_id, post_id))
    }

    /// Trashes every post related to `post_id` on `site_id`.
    ///
    /// Returns the number of related posts trashed.
    pub fn trash_related_posts(&self, site_id: SiteId, post_id: ContentId) -> usize {
        if self.is_cascading(site_id, post_id) {
            debug!(site_id, post_id, "Nested trash ignored during cascade");
            return 0;
        }
        if !self.settings.get_setting(site_id, post_id) {
            return 0;
        }

        let mut related = self.relations.get_relations(site_id, post_id, ContentKind::Post);
        related.remove(&site_id);
        if related.is_empty() {
            return 0;
        }

        let members = related.iter().map(|(&s, &p)| (s, p)).chain([(site_id, post_id)]).collect();
        let Some(_guard) = CascadeGuard::acquire(&self.cascading, members) else {
            debug!(site_id, post_id, "Translation group already being cascaded");
            return 0;
        };

        let mut trashed = 0;
        for (related_site, related_post) in related {
            match self.posts.trash_post(related_site, related_post) {
                Ok(true) => trashed += 1,
                Ok(false) => debug!(related_site, related_post, "Related post not trashed"),
                Err(e) => warn!(related_site, related_post, error = %e, "Failed to trash related post"),
            }
        }
        if trashed > 0 {
            info!(site_id, post_id, trashed, "Related posts trashed");
        }
        trashed
    }

    /// Listens on [`TRASH_POST_ACTION`], replacing any trasher registered before.
    pub fn register(self: Arc<Self>, hooks: &HookManager) {
        if hooks.remove_action(TRASH_POST_ACTION, TRASHER_HOOK) {
            info!("Previously registered trasher replaced");
        }
        hooks.add_action_fn(TRASH_POST_ACTION, TRASHER_HOOK, DEFAULT_PRIORITY, move |args| {
            let (site_id, post_id) = trash_args(args)?;
            self.trash_related_posts(site_id, post_id);
            Ok(())
        });
    }
}

fn trash_args(args: &[Value]) -> Result<(SiteId, ContentId)> {
    match (args.first().and_then(Value::as_u64), args.get(1).and_then(Value::as_u64)) {
        (Some(site_id), Some(post_id)) => Ok((site_id, post_id)),
        _ => Err(Error::validation_with_context(
            "expected [site_id, post_id]",
            ErrorContext::new()
                .with_details(Value::from(args.to_vec()).to_string())
                .with_source(TRASH_POST_ACTION),
        )),
    }
}
