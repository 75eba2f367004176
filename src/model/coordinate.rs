//! Config identity: the `(project, kind, id)` coordinate triple.
use base64::Engine as _;
use sha2::{Digest as _, Sha256};

/// Prefix for platform stable ids derived from coordinates, so objects
/// created by this tool are recognizable in listings.
const EXTERNAL_ID_PREFIX: &str = "moncfg:";

/// The universal identity of a config: `(project, kind, id)`.
///
/// Two configs match iff all three components are equal. Coordinates order
/// lexicographically by their string form, which keeps deployment plans
/// deterministic across runs.
///
/// # Examples
///
/// ```
/// use moncfg_cli::model::Coordinate;
///
/// let c = Coordinate::new("infra", "management-zone", "main");
/// assert_eq!(c.to_string(), "infra:management-zone:main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinate {
    /// Project id the config belongs to.
    pub project: String,
    /// Type discriminator (API id, settings schema, automation resource, ...).
    pub kind: String,
    /// Config id, unique within `(project, kind)`.
    pub id: String,
}

impl Coordinate {
    /// Create a coordinate from its three components.
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        kind: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Derive the platform-accepted stable id for this coordinate.
    ///
    /// The value is a prefixed base64 digest of the canonical coordinate
    /// string, so the same coordinate always produces the same external id
    /// across runs and machines.
    #[must_use]
    pub fn external_id(&self) -> String {
        let digest = Sha256::digest(self.to_string().as_bytes());
        format!(
            "{EXTERNAL_ID_PREFIX}{}",
            base64::engine::general_purpose::STANDARD_NO_PAD.encode(digest)
        )
    }

    /// Derive a UUID-shaped stable id for APIs whose object ids must look
    /// like UUIDs (automation resources).
    ///
    /// Formats the first sixteen digest bytes as a version-less UUID string;
    /// like [`external_id`](Self::external_id), the result is stable across
    /// runs.
    #[must_use]
    pub fn stable_uuid(&self) -> String {
        let digest = Sha256::digest(self.to_string().as_bytes());
        let b: Vec<u8> = digest.iter().copied().take(16).collect();
        format!(
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.project, self.kind, self.id)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_components_with_colons() {
        let c = Coordinate::new("infra", "alerting-profile", "on-call");
        assert_eq!(c.to_string(), "infra:alerting-profile:on-call");
    }

    #[test]
    fn equality_requires_all_three_components() {
        let a = Coordinate::new("p", "k", "id");
        assert_eq!(a, Coordinate::new("p", "k", "id"));
        assert_ne!(a, Coordinate::new("p2", "k", "id"));
        assert_ne!(a, Coordinate::new("p", "k2", "id"));
        assert_ne!(a, Coordinate::new("p", "k", "id2"));
    }

    #[test]
    fn ordering_is_lexicographic_by_components() {
        let mut coords = vec![
            Coordinate::new("b", "x", "1"),
            Coordinate::new("a", "y", "1"),
            Coordinate::new("a", "x", "2"),
            Coordinate::new("a", "x", "1"),
        ];
        coords.sort();
        let formatted: Vec<String> = coords.iter().map(ToString::to_string).collect();
        assert_eq!(formatted, vec!["a:x:1", "a:x:2", "a:y:1", "b:x:1"]);
    }

    #[test]
    fn external_id_is_stable_across_calls() {
        let c = Coordinate::new("infra", "builtin:alerting.profile", "on-call");
        assert_eq!(c.external_id(), c.external_id());
    }

    #[test]
    fn external_id_is_prefixed() {
        let c = Coordinate::new("p", "k", "id");
        assert!(c.external_id().starts_with("moncfg:"));
    }

    #[test]
    fn external_id_differs_per_coordinate() {
        let a = Coordinate::new("p", "k", "one");
        let b = Coordinate::new("p", "k", "two");
        assert_ne!(a.external_id(), b.external_id());
    }

    #[test]
    fn stable_uuid_is_uuid_shaped_and_stable() {
        let c = Coordinate::new("p", "workflow", "nightly");
        let uuid = c.stable_uuid();
        assert_eq!(uuid, c.stable_uuid());
        assert_eq!(uuid.len(), 36);
        let dash_positions: Vec<usize> = uuid
            .char_indices()
            .filter(|(_, ch)| *ch == '-')
            .map(|(i, _)| i)
            .collect();
        assert_eq!(dash_positions, vec![8, 13, 18, 23]);
    }

    #[test]
    fn external_id_has_no_padding_or_whitespace() {
        let id = Coordinate::new("p", "k", "c").external_id();
        assert!(!id.contains('='));
        assert!(!id.contains(char::is_whitespace));
    }
}
