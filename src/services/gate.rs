//! Authorization gate.
//!
//! A static registry of named predicates over the request principal (and an
//! optional target resource). Built once at startup, then shared read-only.
//!
//! Two kinds of actions are recognised:
//! - named abilities: `admin`, `manage-activities`, `manage-anagrafiche`, `view-own-deadlines`
//! - per-resource CRUD abilities: `<resource>.<ability>`, e.g. `vehicles.update`
//!
//! Anything else is denied. Every decision is written to the `audit` tracing target.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::services::auth::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Client,
    Site,
    Vehicle,
    Driver,
    Activity,
    VehicleDeadline,
    User,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Client,
        ResourceKind::Site,
        ResourceKind::Vehicle,
        ResourceKind::Driver,
        ResourceKind::Activity,
        ResourceKind::VehicleDeadline,
        ResourceKind::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Client => "clients",
            ResourceKind::Site => "sites",
            ResourceKind::Vehicle => "vehicles",
            ResourceKind::Driver => "drivers",
            ResourceKind::Activity => "activities",
            ResourceKind::VehicleDeadline => "vehicle-deadlines",
            ResourceKind::User => "users",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|k| k.as_str() == s).ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ability {
    ViewAny,
    View,
    Create,
    Update,
    Delete,
}

impl Ability {
    pub const ALL: [Ability; 5] = [
        Ability::ViewAny,
        Ability::View,
        Ability::Create,
        Ability::Update,
        Ability::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ability::ViewAny => "viewAny",
            Ability::View => "view",
            Ability::Create => "create",
            Ability::Update => "update",
            Ability::Delete => "delete",
        }
    }
}

impl FromStr for Ability {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|a| a.as_str() == s).ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Admin,
    ManageActivities,
    ManageAnagrafiche,
    ViewOwnDeadlines,
    Crud(ResourceKind, Ability),
}

impl Action {
    pub const NAMED: [Action; 4] = [
        Action::Admin,
        Action::ManageActivities,
        Action::ManageAnagrafiche,
        Action::ViewOwnDeadlines,
    ];

    /// Whether the predicate depends on a target resource.
    pub fn is_resource_scoped(&self) -> bool {
        matches!(self, Action::ViewOwnDeadlines)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Admin => f.write_str("admin"),
            Action::ManageActivities => f.write_str("manage-activities"),
            Action::ManageAnagrafiche => f.write_str("manage-anagrafiche"),
            Action::ViewOwnDeadlines => f.write_str("view-own-deadlines"),
            Action::Crud(kind, ability) => write!(f, "{}.{}", kind.as_str(), ability.as_str()),
        }
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Action::Admin),
            "manage-activities" => Ok(Action::ManageActivities),
            "manage-anagrafiche" => Ok(Action::ManageAnagrafiche),
            "view-own-deadlines" => Ok(Action::ViewOwnDeadlines),
            other => {
                let (kind, ability) = other.split_once('.').ok_or(())?;
                Ok(Action::Crud(kind.parse()?, ability.parse()?))
            }
        }
    }
}

/// Target of an ownership-scoped check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub owner_id: Option<Uuid>,
}

impl Resource {
    pub fn owned_by(kind: ResourceKind, owner_id: Uuid) -> Self {
        Self {
            kind,
            owner_id: Some(owner_id),
        }
    }
}

/// Who may perform a CRUD ability on a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Authenticated,
    /// Admin or manager.
    Staff,
    AdminOnly,
}

impl Rule {
    fn admits(&self, principal: &Principal) -> bool {
        match self {
            Rule::Authenticated => true,
            Rule::Staff => principal.is_staff(),
            Rule::AdminOnly => principal.is_admin(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gate {
    policies: HashMap<(ResourceKind, Ability), Rule>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::with_default_policies()
    }
}

impl Gate {
    /// Empty CRUD table: every `<resource>.<ability>` is denied until a rule is set.
    pub fn empty() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    /// Registry data (clients, sites, vehicles, drivers) is readable by anyone
    /// signed in and writable by admins; activities are writable by staff;
    /// deadlines are staff-only; user accounts are admin-only.
    pub fn with_default_policies() -> Self {
        let mut gate = Self::empty();

        for kind in [
            ResourceKind::Client,
            ResourceKind::Site,
            ResourceKind::Vehicle,
            ResourceKind::Driver,
        ] {
            gate = gate
                .with_rule(kind, Ability::ViewAny, Rule::Authenticated)
                .with_rule(kind, Ability::View, Rule::Authenticated)
                .with_rule(kind, Ability::Create, Rule::AdminOnly)
                .with_rule(kind, Ability::Update, Rule::AdminOnly)
                .with_rule(kind, Ability::Delete, Rule::AdminOnly);
        }

        gate = gate
            .with_rule(ResourceKind::Activity, Ability::ViewAny, Rule::Authenticated)
            .with_rule(ResourceKind::Activity, Ability::View, Rule::Authenticated)
            .with_rule(ResourceKind::Activity, Ability::Create, Rule::Staff)
            .with_rule(ResourceKind::Activity, Ability::Update, Rule::Staff)
            .with_rule(ResourceKind::Activity, Ability::Delete, Rule::Staff);

        for ability in Ability::ALL {
            gate = gate
                .with_rule(ResourceKind::VehicleDeadline, ability, Rule::Staff)
                .with_rule(ResourceKind::User, ability, Rule::AdminOnly);
        }

        gate
    }

    #[must_use]
    pub fn with_rule(mut self, kind: ResourceKind, ability: Ability, rule: Rule) -> Self {
        self.policies.insert((kind, ability), rule);
        self
    }

    /// Evaluate a named action. Unknown names and missing principals are denied.
    pub fn check(
        &self,
        action: &str,
        principal: Option<&Principal>,
        resource: Option<&Resource>,
    ) -> bool {
        let allowed = match action.parse::<Action>() {
            Ok(parsed) => self.evaluate(parsed, principal, resource),
            Err(()) => false,
        };

        tracing::info!(
            target: "audit",
            principal_id = ?principal.map(|p| p.id),
            action,
            allowed,
            "gate decision"
        );

        allowed
    }

    fn evaluate(
        &self,
        action: Action,
        principal: Option<&Principal>,
        resource: Option<&Resource>,
    ) -> bool {
        let Some(principal) = principal else {
            return false;
        };

        match action {
            Action::Admin | Action::ManageAnagrafiche => principal.is_admin(),
            Action::ManageActivities => principal.is_staff(),
            Action::ViewOwnDeadlines => resource.is_some_and(|r| principal.owns(r.owner_id)),
            Action::Crud(kind, ability) => self
                .policies
                .get(&(kind, ability))
                .is_some_and(|rule| rule.admits(principal)),
        }
    }

    /// Every registered action that does not need a target resource.
    pub fn action_names(&self) -> Vec<String> {
        let mut crud: Vec<_> = self.policies.keys().copied().collect();
        crud.sort();

        Action::NAMED
            .into_iter()
            .filter(|a| !a.is_resource_scoped())
            .chain(crud.into_iter().map(|(k, a)| Action::Crud(k, a)))
            .map(|a| a.to_string())
            .collect()
    }

    /// Evaluate every non-resource-scoped action for `principal`.
    pub fn abilities(&self, principal: &Principal) -> BTreeMap<String, bool> {
        self.action_names()
            .into_iter()
            .map(|name| {
                let allowed = self.check(&name, Some(principal), None);
                (name, allowed)
            })
            .collect()
    }
}
