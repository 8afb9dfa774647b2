//! Resources, actions, and the per-role permission matrix

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Domain object category subject to access control
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Leads,
    Deals,
    Tasks,
    Reports,
    Users,
    Settings,
}

impl Resource {
    /// All resources, in matrix order
    pub const ALL: [Resource; 6] = [
        Resource::Leads,
        Resource::Deals,
        Resource::Tasks,
        Resource::Reports,
        Resource::Users,
        Resource::Settings,
    ];

    /// Actions recognized for this resource
    pub fn actions(self) -> &'static [Action] {
        const CRUD: &[Action] = &[Action::Create, Action::Read, Action::Update, Action::Delete];
        match self {
            Resource::Leads | Resource::Deals | Resource::Tasks | Resource::Users => CRUD,
            Resource::Reports => &[Action::Read, Action::Export],
            Resource::Settings => &[Action::Manage],
        }
    }

    /// Whether `action` is part of this resource's action set
    pub fn recognizes(self, action: Action) -> bool {
        self.actions().contains(&action)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Leads => "leads",
            Resource::Deals => "deals",
            Resource::Tasks => "tasks",
            Resource::Reports => "reports",
            Resource::Users => "users",
            Resource::Settings => "settings",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// Operation kind on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Export,
    Manage,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Export,
        Action::Manage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Export => "export",
            Action::Manage => "manage",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// A resource or action name outside the closed enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(pub String);

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name '{}'", self.0)
    }
}

impl std::error::Error for UnknownName {}

/// Result of looking up a single matrix leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The resource has no entry at all
    MissingResource,
    /// The resource exists but the action is absent or unrecognized
    MissingAction,
    /// The leaf is present
    Defined(bool),
}

/// Mapping from resource to per-action booleans
///
/// Serializes as nested objects: `{"leads": {"read": true}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMatrix {
    entries: BTreeMap<Resource, BTreeMap<Action, bool>>,
}

impl PermissionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a matrix via the builder
    pub fn builder() -> PermissionMatrixBuilder {
        PermissionMatrixBuilder::default()
    }

    /// Look up one leaf
    ///
    /// An action not recognized for the resource is reported as missing
    /// even if a stored value exists for it.
    pub fn lookup(&self, resource: Resource, action: Action) -> Lookup {
        let Some(actions) = self.entries.get(&resource) else {
            return Lookup::MissingResource;
        };

        if !resource.recognizes(action) {
            return Lookup::MissingAction;
        }

        match actions.get(&action) {
            Some(allowed) => Lookup::Defined(*allowed),
            None => Lookup::MissingAction,
        }
    }

    /// Whether the leaf is present and true
    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        self.lookup(resource, action) == Lookup::Defined(true)
    }

    pub fn has_resource(&self, resource: Resource) -> bool {
        self.entries.contains_key(&resource)
    }

    /// Resources present in the matrix
    pub fn resources(&self) -> impl Iterator<Item = Resource> + '_ {
        self.entries.keys().copied()
    }

    /// Set a single leaf
    pub fn set(&mut self, resource: Resource, action: Action, allowed: bool) {
        self.entries.entry(resource).or_default().insert(action, allowed);
    }

    /// Whether every present resource carries its full recognized action set
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|(resource, actions)| {
            resource.actions().iter().all(|a| actions.contains_key(a))
        })
    }
}

/// Builder for [`PermissionMatrix`]
#[derive(Debug, Default)]
pub struct PermissionMatrixBuilder {
    matrix: PermissionMatrix,
}

impl PermissionMatrixBuilder {
    /// Add a resource with every recognized action set to `false`
    pub fn resource(mut self, resource: Resource) -> Self {
        for action in resource.actions() {
            self.matrix.set(resource, *action, false);
        }
        self
    }

    /// Add a resource with the given actions granted and the rest denied
    pub fn grant(mut self, resource: Resource, actions: &[Action]) -> Self {
        self = self.resource(resource);
        for action in actions {
            self.matrix.set(resource, *action, true);
        }
        self
    }

    /// Add a resource with every recognized action granted
    pub fn grant_all(self, resource: Resource) -> Self {
        self.grant(resource, resource.actions())
    }

    /// Explicitly deny a single leaf
    pub fn deny(mut self, resource: Resource, action: Action) -> Self {
        self.matrix.set(resource, action, false);
        self
    }

    pub fn build(self) -> PermissionMatrix {
        self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("leads".parse::<Resource>(), Ok(Resource::Leads));
        assert_eq!("manage".parse::<Action>(), Ok(Action::Manage));
        assert!("Leads".parse::<Resource>().is_err());
        assert!("nonexistent_resource".parse::<Resource>().is_err());
    }

    #[test]
    fn test_lookup_paths() {
        let matrix = PermissionMatrix::builder()
            .grant(Resource::Leads, &[Action::Read])
            .build();

        assert_eq!(matrix.lookup(Resource::Leads, Action::Read), Lookup::Defined(true));
        assert_eq!(matrix.lookup(Resource::Leads, Action::Create), Lookup::Defined(false));
        assert_eq!(matrix.lookup(Resource::Leads, Action::Export), Lookup::MissingAction);
        assert_eq!(matrix.lookup(Resource::Deals, Action::Read), Lookup::MissingResource);
    }

    #[test]
    fn test_unrecognized_leaf_never_allows() {
        let mut matrix = PermissionMatrix::builder().grant_all(Resource::Reports).build();
        matrix.set(Resource::Reports, Action::Delete, true);

        assert!(!matrix.allows(Resource::Reports, Action::Delete));
        assert!(matrix.allows(Resource::Reports, Action::Export));
    }

    #[test]
    fn test_completeness() {
        let complete = PermissionMatrix::builder()
            .grant(Resource::Tasks, &[Action::Read])
            .resource(Resource::Settings)
            .build();
        assert!(complete.is_complete());

        let mut partial = PermissionMatrix::new();
        partial.set(Resource::Leads, Action::Read, true);
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_json_shape() {
        let matrix = PermissionMatrix::builder()
            .grant(Resource::Reports, &[Action::Read])
            .build();

        let json = serde_json::to_value(&matrix).unwrap();
        assert_eq!(json, serde_json::json!({"reports": {"read": true, "export": false}}));

        let back: PermissionMatrix = serde_json::from_value(json).unwrap();
        assert_eq!(back, matrix);
    }
}
