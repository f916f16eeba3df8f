//! Multi-role entity classifier
//!
//! Roles are not mutually exclusive. A city-state is a country, a
//! territorial entity and a human settlement at once, so every role is
//! evaluated independently.

use crate::entity::{Entity, Value};
use crate::vocab;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Extraction role an entity can play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Country,
    TerritorialEntity,
    HumanSettlement,
    Language,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Country,
        Role::TerritorialEntity,
        Role::HumanSettlement,
        Role::Language,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Country => "country",
            Role::TerritorialEntity => "territorial_entity",
            Role::HumanSettlement => "human_settlement",
            Role::Language => "language",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Small ordered set of roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    pub fn empty() -> Self {
        Self(0)
    }

    fn bit(role: Role) -> u8 {
        1 << role as u8
    }

    pub fn insert(&mut self, role: Role) {
        self.0 |= Self::bit(role);
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0 & Self::bit(role) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Roles in declaration order
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(move |role| self.contains(*role))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = RoleSet::empty();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

/// Ids of every class (transitively) derived from a root class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomySet {
    ids: HashSet<String>,
}

impl TaxonomySet {
    pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Taxonomy closures for each role
#[derive(Debug, Clone, Default)]
pub struct Taxonomies {
    pub country: TaxonomySet,
    pub territorial_entity: TaxonomySet,
    pub human_settlement: TaxonomySet,
    /// Fixed single-class set, not expanded through the taxonomy service
    pub language: TaxonomySet,
}

impl Taxonomies {
    fn for_role(&self, role: Role) -> &TaxonomySet {
        match role {
            Role::Country => &self.country,
            Role::TerritorialEntity => &self.territorial_entity,
            Role::HumanSettlement => &self.human_settlement,
            Role::Language => &self.language,
        }
    }
}

/// Whether any "instance of" value of the entity is in the set
fn is_instance_of(entity: &Entity, taxonomy: &TaxonomySet) -> bool {
    entity
        .claims(vocab::INSTANCE_OF)
        .iter()
        .filter_map(|claim| claim.main_value().and_then(Value::as_entity_id))
        .any(|id| taxonomy.contains(id))
}

/// Every role that applies to the entity.
///
/// An ISO-code claim implies the country role on its own, so incomplete
/// taxonomy closures don't lose countries.
pub fn classify(entity: &Entity, taxonomies: &Taxonomies) -> RoleSet {
    let mut roles = RoleSet::empty();
    for role in Role::ALL {
        if is_instance_of(entity, taxonomies.for_role(role)) {
            roles.insert(role);
        }
    }
    if entity.has_claim(vocab::ISO_CODE) {
        roles.insert(Role::Country);
    }
    roles
}
