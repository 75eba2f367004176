//! Deployment outputs: resolved entities and the per-environment context.
use std::collections::BTreeMap;

use super::Coordinate;

/// Property key holding the platform-assigned (or stable) object id.
pub const PROP_ID: &str = "id";
/// Property key holding the resolved entity name.
pub const PROP_NAME: &str = "name";
/// Property key holding the resolved scope, where applicable.
pub const PROP_SCOPE: &str = "scope";

/// The outcome of deploying one config.
///
/// `properties` always carries [`PROP_ID`] after a successful deployment;
/// per-kind deployers may add further fields (e.g. `owner`, `uid`) for
/// downstream references.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntity {
    /// The resolved, human-readable name the object was deployed under.
    pub entity_name: String,
    /// Coordinate of the config this entity came from.
    pub coordinate: Coordinate,
    /// Named properties available to later reference parameters.
    pub properties: BTreeMap<String, serde_json::Value>,
    /// `true` when the config was skipped and no request was made.
    pub skipped: bool,
}

impl ResolvedEntity {
    /// Build an entity for a successfully deployed config.
    #[must_use]
    pub fn deployed(
        entity_name: impl Into<String>,
        coordinate: Coordinate,
        properties: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            coordinate,
            properties,
            skipped: false,
        }
    }

    /// Build an entity for a skipped config.
    ///
    /// When the config carries an `originObjectId`, it is exposed as the
    /// entity's id so dependents can still resolve references to it.
    #[must_use]
    pub fn skipped(coordinate: Coordinate, origin_object_id: Option<&str>) -> Self {
        let mut properties = BTreeMap::new();
        if let Some(id) = origin_object_id {
            properties.insert(PROP_ID.to_string(), serde_json::Value::String(id.to_string()));
        }
        Self {
            entity_name: String::new(),
            coordinate,
            properties,
            skipped: true,
        }
    }

    /// The entity's id property, when present.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.properties.get(PROP_ID).and_then(serde_json::Value::as_str)
    }
}

/// Accumulated deployment outputs for one environment traversal.
///
/// Starts empty, collects one [`ResolvedEntity`] per visited config, and is
/// discarded when the environment completes. Single-writer/single-reader by
/// construction, so no locking is involved.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    entities: BTreeMap<Coordinate, ResolvedEntity>,
}

impl ResolutionContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the entity produced by deploying `coordinate`'s config.
    pub fn insert(&mut self, entity: ResolvedEntity) {
        self.entities.insert(entity.coordinate.clone(), entity);
    }

    /// Look up the entity for a coordinate.
    #[must_use]
    pub fn get(&self, coordinate: &Coordinate) -> Option<&ResolvedEntity> {
        self.entities.get(coordinate)
    }

    /// `true` when an entity exists for the coordinate.
    #[must_use]
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.entities.contains_key(coordinate)
    }

    /// Number of recorded entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// `true` when no entity has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over recorded entities in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedEntity> {
        self.entities.values()
    }
}
