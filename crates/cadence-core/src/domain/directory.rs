//! Directory entities: resources, actors and roles.
//!
//! Unlike tasks these are created by their registries, which allocate fresh
//! ids; a snapshot's ids for them are only hints resolved at import time.

use super::ids::{ActorId, ResourceId, RoleId};

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub strength: i32,
}
