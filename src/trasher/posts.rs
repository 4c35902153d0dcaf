use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use serde_json::json;

use super::TRASH_POST_ACTION;
use crate::hooks::HookManager;
use crate::utils::lock::{rw_read, rw_write};
use crate::{ContentId, Result, SiteId};

const SOURCE: &str = "trasher::posts";

/// Host post store.
pub trait PostTrash: Send + Sync {
    /// Moves the post to the trash. `Ok(false)` if there was nothing to trash.
    fn trash_post(&self, site_id: SiteId, post_id: ContentId) -> Result<bool>;
}

/// Posts kept in process.
///
/// Fires [`TRASH_POST_ACTION`] before a post goes to the trash, as the host does.
pub struct InMemoryPosts {
    trashed: RwLock<HashMap<(SiteId, ContentId), bool>>,
    hooks: Weak<HookManager>,
}

impl InMemoryPosts {
    pub fn new(hooks: &Arc<HookManager>) -> Self {
        Self {
            trashed: RwLock::new(HashMap::new()),
            hooks: Arc::downgrade(hooks),
        }
    }

    pub fn insert(&self, site_id: SiteId, post_id: ContentId) {
        rw_write(&self.trashed, SOURCE, "insert").insert((site_id, post_id), false);
    }

    pub fn exists(&self, site_id: SiteId, post_id: ContentId) -> bool {
        rw_read(&self.trashed, SOURCE, "exists").contains_key(&(site_id, post_id))
    }

    pub fn is_trashed(&self, site_id: SiteId, post_id: ContentId) -> bool {
        rw_read(&self.trashed, SOURCE, "is_trashed").get(&(site_id, post_id)).copied().unwrap_or(false)
    }
}

impl PostTrash for InMemoryPosts {
    fn trash_post(&self, site_id: SiteId, post_id: ContentId) -> Result<bool> {
        if !self.exists(site_id, post_id) || self.is_trashed(site_id, post_id) {
            return Ok(false);
        }
        // listeners run without any lock held; they may trash other posts
        if let Some(hooks) = self.hooks.upgrade() {
            hooks.do_action(TRASH_POST_ACTION, &[json!(site_id), json!(post_id)])?;
        }
        rw_write(&self.trashed, SOURCE, "trash_post").insert((site_id, post_id), true);
        Ok(true)
    }
}
