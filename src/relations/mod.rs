//! Site relations and translation groups.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SiteRelations`] | Which sites of the network are related |
//! | [`ContentRelations`] | Which posts or terms on related sites translate each other |
//! | [`InMemorySiteRelations`] | Site relations with a cached relation map |
//! | [`InMemoryContentRelations`] | Translation groups with cached per-item lookups |
//!
//! Both in-memory stores fire an action after every change and invalidate
//! their cached lookups from listeners bound to that action.

mod content;
mod site;

pub use content::{ContentKind, ContentRelations, InMemoryContentRelations, CONTENT_RELATIONS_UPDATED};
pub use site::{InMemorySiteRelations, SiteRelations, SITE_RELATIONS_UPDATED};
