//! The unit of deployment: a config with its type, parameters, and template.
use std::collections::BTreeMap;

use super::{Coordinate, Parameter};

/// A named, renderable template blob.
///
/// Loaded from a file next to the config definition, or synthesized
/// in-memory by the downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// The template's name as written in the config (usually a file name).
    pub name: String,
    /// The raw template text.
    pub content: String,
}

/// Automation resource kinds, a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationResource {
    /// An automation workflow.
    Workflow,
    /// A business calendar consumed by scheduling rules.
    BusinessCalendar,
    /// A scheduling rule.
    SchedulingRule,
}

impl AutomationResource {
    /// Parse the YAML discriminator.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "workflow" => Some(Self::Workflow),
            "business-calendar" => Some(Self::BusinessCalendar),
            "scheduling-rule" => Some(Self::SchedulingRule),
            _ => None,
        }
    }

    /// The kebab-case discriminator, used as the coordinate kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::BusinessCalendar => "business-calendar",
            Self::SchedulingRule => "scheduling-rule",
        }
    }
}

/// Document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A platform dashboard document.
    Dashboard,
    /// A notebook document.
    Notebook,
}

impl DocumentKind {
    /// Parse the YAML discriminator.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dashboard" => Some(Self::Dashboard),
            "notebook" => Some(Self::Notebook),
            _ => None,
        }
    }

    /// The discriminator string sent to the platform.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Notebook => "notebook",
        }
    }
}

/// The closed set of config type variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigType {
    /// A classic environment API, named in the known-API registry.
    ClassicApi {
        /// The API id (registry key).
        api: String,
        /// Resolvable scope for sub-path APIs whose URL contains `{scope}`.
        scope: Option<Parameter>,
    },
    /// A settings 2.0 object.
    Settings {
        /// The schema id (e.g. `builtin:alerting.profile`).
        schema_id: String,
        /// Optional schema version pin.
        schema_version: Option<String>,
        /// The settings scope, resolved per environment.
        scope: Parameter,
    },
    /// An automation resource.
    Automation {
        /// Which automation resource.
        resource: AutomationResource,
    },
    /// A grail storage bucket.
    Bucket,
    /// A platform document.
    Document {
        /// Document kind.
        kind: DocumentKind,
        /// Whether the document is private to its owner.
        private: bool,
    },
    /// A grail filter segment.
    Segment,
}

impl ConfigType {
    /// The coordinate kind string for this type.
    ///
    /// Classic APIs use the API id, settings use the schema id, automation
    /// uses the resource discriminator, and the remaining platform kinds use
    /// a fixed name.
    #[must_use]
    pub fn kind(&self) -> String {
        match self {
            Self::ClassicApi { api, .. } => api.clone(),
            Self::Settings { schema_id, .. } => schema_id.clone(),
            Self::Automation { resource } => resource.as_str().to_string(),
            Self::Bucket => "bucket".to_string(),
            Self::Document { .. } => "document".to_string(),
            Self::Segment => "segment".to_string(),
        }
    }

    /// `true` for kinds served by platform (OAuth) APIs rather than the
    /// classic token APIs.
    #[must_use]
    pub const fn requires_platform(&self) -> bool {
        matches!(
            self,
            Self::Automation { .. } | Self::Bucket | Self::Document { .. } | Self::Segment
        )
    }
}

/// One declarative configuration object, immutable after loading.
#[derive(Debug, Clone)]
pub struct Config {
    /// The config's identity.
    pub coordinate: Coordinate,
    /// Group of the environment this instance was composed for.
    pub group: String,
    /// Environment this instance was composed for.
    pub environment: String,
    /// The type variant, driving deployment dispatch.
    pub type_: ConfigType,
    /// The mandatory name parameter (engine-owned; not in `parameters`).
    pub name: Parameter,
    /// User parameters by name. Reserved names are rejected at load.
    pub parameters: BTreeMap<String, Parameter>,
    /// The renderable template.
    pub template: Template,
    /// Coordinates this config depends on, derived from its parameters.
    pub references: Vec<Coordinate>,
    /// Whether deployment is skipped (resolved at load time).
    pub skip: bool,
    /// Persistent external anchor on the platform, when configured.
    pub origin_object_id: Option<String>,
}

impl Config {
    /// Recompute the reference list from the name, scope, and user parameters.
    ///
    /// The loader calls this once after composing the effective config; the
    /// result is sorted and de-duplicated.
    #[must_use]
    pub fn collect_references(&self) -> Vec<Coordinate> {
        let mut refs = self.name.references(&self.coordinate, &self.parameters);
        let scope = match &self.type_ {
            ConfigType::Settings { scope, .. } => Some(scope),
            ConfigType::ClassicApi { scope, .. } => scope.as_ref(),
            _ => None,
        };
        if let Some(scope) = scope {
            refs.extend(scope.references(&self.coordinate, &self.parameters));
        }
        for parameter in self.parameters.values() {
            refs.extend(parameter.references(&self.coordinate, &self.parameters));
        }
        refs.sort();
        refs.dedup();
        refs
    }
}
