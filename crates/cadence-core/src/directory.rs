//! Directory: registries of resources, actors and roles.
//!
//! These entities are not stable across save/load. A registry always
//! allocates a fresh id, and remembers which saved id it stood in for
//! (`aliases`), so importing the same snapshot twice resolves to the
//! same live entity instead of creating a duplicate.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::ids as marker;
use crate::domain::{Actor, ActorId, Id, IdMarker, Resource, ResourceId, Role, RoleId};
use crate::ports::IdGenerator;

/// Generic id-keyed registry with an alias table.
#[derive(Debug)]
pub struct Registry<M: IdMarker, E> {
    entries: BTreeMap<Id<M>, E>,
    aliases: HashMap<Id<M>, Id<M>>,
}

impl<M: IdMarker, E> Default for Registry<M, E> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            aliases: HashMap::new(),
        }
    }
}

impl<M: IdMarker, E> Registry<M, E> {
    pub fn get(&self, id: Id<M>) -> Option<&E> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: Id<M>) -> Option<&mut E> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: Id<M>) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&mut self, id: Id<M>) -> Option<E> {
        self.aliases.retain(|_, live| *live != id);
        self.entries.remove(&id)
    }

    /// Resolve an id from a snapshot: the live id it was mapped to, or the
    /// id itself when it names a live entry.
    pub fn resolve(&self, saved: Id<M>) -> Option<Id<M>> {
        match self.aliases.get(&saved) {
            Some(live) if self.contains(*live) => Some(*live),
            _ if self.contains(saved) => Some(saved),
            _ => None,
        }
    }

    pub(crate) fn insert(&mut self, id: Id<M>, entry: E) {
        self.entries.insert(id, entry);
    }

    pub(crate) fn alias(&mut self, saved: Id<M>, live: Id<M>) {
        if saved != live {
            self.aliases.insert(saved, live);
        }
    }
}

/// Resources, actors and roles known to the engine.
pub struct Directory {
    pub resources: Registry<marker::Resource, Resource>,
    pub actors: Registry<marker::Actor, Actor>,
    pub roles: Registry<marker::Role, Role>,
    ids: Arc<dyn IdGenerator>,
}

impl Directory {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            resources: Registry::default(),
            actors: Registry::default(),
            roles: Registry::default(),
            ids,
        }
    }

    pub fn add_resource(&mut self, name: impl Into<String>, value: f64) -> ResourceId {
        let id = self.ids.generate_resource_id();
        self.resources.insert(
            id,
            Resource {
                id,
                name: name.into(),
                value,
            },
        );
        id
    }

    pub fn add_actor(&mut self, name: impl Into<String>, username: Option<String>) -> ActorId {
        let id = self.ids.generate_actor_id();
        self.actors.insert(
            id,
            Actor {
                id,
                name: name.into(),
                username,
            },
        );
        id
    }

    pub fn add_role(&mut self, name: impl Into<String>, strength: i32) -> RoleId {
        let id = self.ids.generate_role_id();
        self.roles.insert(
            id,
            Role {
                id,
                name: name.into(),
                strength,
            },
        );
        id
    }
}
