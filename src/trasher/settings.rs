use std::collections::HashMap;
use std::sync::RwLock;

use crate::utils::lock::{rw_read, rw_write};
use crate::{ContentId, SiteId};

const SOURCE: &str = "trasher::settings";

/// Whether trashing a post should also trash its translations.
pub trait TrasherSettingRepository: Send + Sync {
    fn get_setting(&self, site_id: SiteId, post_id: ContentId) -> bool;
    fn update_setting(&self, site_id: SiteId, post_id: ContentId, value: bool);
}

/// Settings kept in process; posts default to off.
#[derive(Default)]
pub struct InMemoryTrasherSettings {
    settings: RwLock<HashMap<(SiteId, ContentId), bool>>,
}

impl InMemoryTrasherSettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrasherSettingRepository for InMemoryTrasherSettings {
    fn get_setting(&self, site_id: SiteId, post_id: ContentId) -> bool {
        rw_read(&self.settings, SOURCE, "get_setting").get(&(site_id, post_id)).copied().unwrap_or(false)
    }

    fn update_setting(&self, site_id: SiteId, post_id: ContentId, value: bool) {
        rw_write(&self.settings, SOURCE, "update_setting").insert((site_id, post_id), value);
    }
}
