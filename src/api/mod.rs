//! The closed registry of known classic environment APIs.
//!
//! Every classic config declares one of these API ids; unknown ids are a
//! load-time error. The registry also carries the per-API traits the
//! deployer and downloader dispatch on.

/// Pagination style of an API's list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// First-generation endpoints: the page key is appended to the existing
    /// query parameters.
    V1,
    /// Second-generation endpoints: the follow-up query string is reset to
    /// only the page key.
    V2,
}

/// Traits of one known classic API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSpec {
    /// Registry key, as written in config files.
    pub id: &'static str,
    /// URL path under the environment base URL. May contain a `{scope}`
    /// placeholder for sub-path APIs.
    pub url_path: &'static str,
    /// Object names are not unique; configs need a stable identity.
    pub non_unique_name: bool,
    /// The endpoint holds exactly one object (no listing, always update).
    pub single_configuration: bool,
    /// Excluded from downloads (e.g. credential payloads are never returned).
    pub skip_download: bool,
    /// Replaced by another API; deploying warns and download skips it.
    pub deprecated_by: Option<&'static str>,
    /// List-endpoint pagination style.
    pub pagination: Pagination,
}

impl ApiSpec {
    /// `true` when the URL path needs a resolved scope substituted.
    #[must_use]
    pub fn has_scope(&self) -> bool {
        self.url_path.contains("{scope}")
    }

    /// The URL path with the scope placeholder substituted.
    ///
    /// For APIs without a scope placeholder the path is returned unchanged.
    #[must_use]
    pub fn resolve_path(&self, scope: Option<&str>) -> String {
        match scope {
            Some(scope) if self.has_scope() => self.url_path.replace("{scope}", scope),
            _ => self.url_path.to_string(),
        }
    }
}

/// All known classic APIs, ordered by id.
///
/// The set is closed on purpose: new APIs are added here, never discovered
/// dynamically, so a typo in a config file fails loudly at load time.
pub const KNOWN_APIS: &[ApiSpec] = &[
    ApiSpec {
        id: "alerting-profile",
        url_path: "/api/config/v1/alertingProfiles",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "anomaly-detection-applications",
        url_path: "/api/config/v1/anomalyDetection/applications",
        non_unique_name: false,
        single_configuration: true,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "anomaly-detection-services",
        url_path: "/api/config/v1/anomalyDetection/services",
        non_unique_name: false,
        single_configuration: true,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "app-detection-rule",
        url_path: "/api/config/v1/applicationDetectionRules",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "application",
        url_path: "/api/config/v1/applications/web",
        non_unique_name: false,
        single_configuration: false,
        skip_download: true,
        deprecated_by: Some("application-web"),
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "application-mobile",
        url_path: "/api/config/v1/applications/mobile",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "application-web",
        url_path: "/api/config/v1/applications/web",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "auto-tag",
        url_path: "/api/config/v1/autoTags",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "aws-credentials",
        url_path: "/api/config/v1/aws/credentials",
        non_unique_name: true,
        single_configuration: false,
        skip_download: true,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "azure-credentials",
        url_path: "/api/config/v1/azure/credentials",
        non_unique_name: false,
        single_configuration: false,
        skip_download: true,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "calculated-metrics-log",
        url_path: "/api/config/v1/calculatedMetrics/log",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "calculated-metrics-service",
        url_path: "/api/config/v1/calculatedMetrics/service",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "credential-vault",
        url_path: "/api/config/v1/credentials",
        non_unique_name: false,
        single_configuration: false,
        skip_download: true,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "dashboard",
        url_path: "/api/config/v1/dashboards",
        non_unique_name: true,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "data-privacy",
        url_path: "/api/config/v1/dataPrivacy",
        non_unique_name: false,
        single_configuration: true,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "extension",
        url_path: "/api/config/v1/extensions",
        non_unique_name: false,
        single_configuration: false,
        skip_download: true,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "frequent-issue-detection",
        url_path: "/api/config/v1/frequentIssueDetection",
        non_unique_name: false,
        single_configuration: true,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "hosts-auto-update",
        url_path: "/api/config/v1/hosts/autoupdate",
        non_unique_name: false,
        single_configuration: true,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "key-user-actions-web",
        url_path: "/api/config/v1/applications/web/{scope}/keyUserActions",
        non_unique_name: true,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "maintenance-window",
        url_path: "/api/config/v1/maintenanceWindows",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "management-zone",
        url_path: "/api/config/v1/managementZones",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "notification",
        url_path: "/api/config/v1/notifications",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "request-naming-service",
        url_path: "/api/config/v1/service/requestNaming",
        non_unique_name: true,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "slo",
        url_path: "/api/v2/slo",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V2,
    },
    ApiSpec {
        id: "synthetic-location",
        url_path: "/api/v1/synthetic/locations",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
    ApiSpec {
        id: "synthetic-monitor",
        url_path: "/api/v1/synthetic/monitors",
        non_unique_name: false,
        single_configuration: false,
        skip_download: false,
        deprecated_by: None,
        pagination: Pagination::V1,
    },
];

/// Look up a known API by id.
#[must_use]
pub fn get(id: &str) -> Option<&'static ApiSpec> {
    KNOWN_APIS.iter().find(|spec| spec.id == id)
}

/// `true` when the id names a known API.
#[must_use]
pub fn is_known(id: &str) -> bool {
    get(id).is_some()
}
