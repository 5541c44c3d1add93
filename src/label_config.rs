use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::label::*;

/// One configurable label key. The serialized name of each slot is its
/// `key()`, which is also the field name in config documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    DepartmentLabel,
    EnvironmentLabel,
    OwnerLabel,
    ProductLabel,
    TeamLabel,
    ClusterExternalLabel,
    NamespaceExternalLabel,
    ControllerExternalLabel,
    DaemonsetExternalLabel,
    DeploymentExternalLabel,
    StatefulsetExternalLabel,
    ServiceExternalLabel,
    PodExternalLabel,
    DepartmentExternalLabel,
    EnvironmentExternalLabel,
    OwnerExternalLabel,
    ProductExternalLabel,
    TeamExternalLabel,
}

impl Slot {
    pub const ALL: [Slot; 18] = [
        Slot::DepartmentLabel,
        Slot::EnvironmentLabel,
        Slot::OwnerLabel,
        Slot::ProductLabel,
        Slot::TeamLabel,
        Slot::ClusterExternalLabel,
        Slot::NamespaceExternalLabel,
        Slot::ControllerExternalLabel,
        Slot::DaemonsetExternalLabel,
        Slot::DeploymentExternalLabel,
        Slot::StatefulsetExternalLabel,
        Slot::ServiceExternalLabel,
        Slot::PodExternalLabel,
        Slot::DepartmentExternalLabel,
        Slot::EnvironmentExternalLabel,
        Slot::OwnerExternalLabel,
        Slot::ProductExternalLabel,
        Slot::TeamExternalLabel,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Slot::DepartmentLabel => "department_label",
            Slot::EnvironmentLabel => "environment_label",
            Slot::OwnerLabel => "owner_label",
            Slot::ProductLabel => "product_label",
            Slot::TeamLabel => "team_label",
            Slot::ClusterExternalLabel => "cluster_external_label",
            Slot::NamespaceExternalLabel => "namespace_external_label",
            Slot::ControllerExternalLabel => "controller_external_label",
            Slot::DaemonsetExternalLabel => "daemonset_external_label",
            Slot::DeploymentExternalLabel => "deployment_external_label",
            Slot::StatefulsetExternalLabel => "statefulset_external_label",
            Slot::ServiceExternalLabel => "service_external_label",
            Slot::PodExternalLabel => "pod_external_label",
            Slot::DepartmentExternalLabel => "department_external_label",
            Slot::EnvironmentExternalLabel => "environment_external_label",
            Slot::OwnerExternalLabel => "owner_external_label",
            Slot::ProductExternalLabel => "product_external_label",
            Slot::TeamExternalLabel => "team_external_label",
        }
    }

    // The only default table. Both LabelConfig::new() and map() read it.
    pub fn default_value(self) -> &'static str {
        match self {
            Slot::DepartmentLabel => "department",
            Slot::EnvironmentLabel => "env",
            Slot::OwnerLabel => "owner",
            Slot::ProductLabel => "app",
            Slot::TeamLabel => "team",
            Slot::ClusterExternalLabel => "kubernetes_cluster",
            Slot::NamespaceExternalLabel => "kubernetes_namespace",
            Slot::ControllerExternalLabel => "kubernetes_controller",
            Slot::DaemonsetExternalLabel => "kubernetes_daemonset",
            Slot::DeploymentExternalLabel => "kubernetes_deployment",
            Slot::StatefulsetExternalLabel => "kubernetes_statefulset",
            Slot::ServiceExternalLabel => "kubernetes_service",
            Slot::PodExternalLabel => "kubernetes_pod",
            Slot::DepartmentExternalLabel => "kubernetes_label_department",
            Slot::EnvironmentExternalLabel => "kubernetes_label_env",
            Slot::OwnerExternalLabel => "kubernetes_label_owner",
            Slot::ProductExternalLabel => "kubernetes_label_app",
            Slot::TeamExternalLabel => "kubernetes_label_team",
        }
    }

    /// For the organizational external slots, the direct label slot they
    /// fall back to when not set explicitly.
    pub fn derived_from(self) -> Option<Slot> {
        match self {
            Slot::DepartmentExternalLabel => Some(Slot::DepartmentLabel),
            Slot::EnvironmentExternalLabel => Some(Slot::EnvironmentLabel),
            Slot::OwnerExternalLabel => Some(Slot::OwnerLabel),
            Slot::ProductExternalLabel => Some(Slot::ProductLabel),
            Slot::TeamExternalLabel => Some(Slot::TeamLabel),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Label keys used to find cost-allocation dimensions on a resource.
///
/// An empty field means "unset"; reading through [`LabelConfig::resolve`] or
/// [`LabelConfig::map`] fills it in from the defaults. Once handed to
/// consumers it should be treated as immutable; build a new one to change it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelConfig {
    pub department_label: String,
    pub environment_label: String,
    pub owner_label: String,
    pub product_label: String,
    pub team_label: String,
    pub cluster_external_label: String,
    pub namespace_external_label: String,
    pub controller_external_label: String,
    pub daemonset_external_label: String,
    pub deployment_external_label: String,
    pub statefulset_external_label: String,
    pub service_external_label: String,
    pub pod_external_label: String,
    pub department_external_label: String,
    pub environment_external_label: String,
    pub owner_external_label: String,
    pub product_external_label: String,
    pub team_external_label: String,
}

impl LabelConfig {
    /// A config with every slot explicitly set to its default.
    pub fn new() -> Self {
        let mut lc = Self::default();
        for slot in Slot::ALL {
            lc.set(slot, slot.default_value());
        }
        lc
    }

    pub fn get(&self, slot: Slot) -> &str {
        match slot {
            Slot::DepartmentLabel => &self.department_label,
            Slot::EnvironmentLabel => &self.environment_label,
            Slot::OwnerLabel => &self.owner_label,
            Slot::ProductLabel => &self.product_label,
            Slot::TeamLabel => &self.team_label,
            Slot::ClusterExternalLabel => &self.cluster_external_label,
            Slot::NamespaceExternalLabel => &self.namespace_external_label,
            Slot::ControllerExternalLabel => &self.controller_external_label,
            Slot::DaemonsetExternalLabel => &self.daemonset_external_label,
            Slot::DeploymentExternalLabel => &self.deployment_external_label,
            Slot::StatefulsetExternalLabel => &self.statefulset_external_label,
            Slot::ServiceExternalLabel => &self.service_external_label,
            Slot::PodExternalLabel => &self.pod_external_label,
            Slot::DepartmentExternalLabel => &self.department_external_label,
            Slot::EnvironmentExternalLabel => &self.environment_external_label,
            Slot::OwnerExternalLabel => &self.owner_external_label,
            Slot::ProductExternalLabel => &self.product_external_label,
            Slot::TeamExternalLabel => &self.team_external_label,
        }
    }

    pub fn set(&mut self, slot: Slot, value: impl Into<String>) {
        *self.field_mut(slot) = value.into();
    }

    fn field_mut(&mut self, slot: Slot) -> &mut String {
        match slot {
            Slot::DepartmentLabel => &mut self.department_label,
            Slot::EnvironmentLabel => &mut self.environment_label,
            Slot::OwnerLabel => &mut self.owner_label,
            Slot::ProductLabel => &mut self.product_label,
            Slot::TeamLabel => &mut self.team_label,
            Slot::ClusterExternalLabel => &mut self.cluster_external_label,
            Slot::NamespaceExternalLabel => &mut self.namespace_external_label,
            Slot::ControllerExternalLabel => &mut self.controller_external_label,
            Slot::DaemonsetExternalLabel => &mut self.daemonset_external_label,
            Slot::DeploymentExternalLabel => &mut self.deployment_external_label,
            Slot::StatefulsetExternalLabel => &mut self.statefulset_external_label,
            Slot::ServiceExternalLabel => &mut self.service_external_label,
            Slot::PodExternalLabel => &mut self.pod_external_label,
            Slot::DepartmentExternalLabel => &mut self.department_external_label,
            Slot::EnvironmentExternalLabel => &mut self.environment_external_label,
            Slot::OwnerExternalLabel => &mut self.owner_external_label,
            Slot::ProductExternalLabel => &mut self.product_external_label,
            Slot::TeamExternalLabel => &mut self.team_external_label,
        }
    }

    /// Effective value of a slot: the override if set, then (for the
    /// organizational external slots) `kubernetes_label_<direct label>`,
    /// then the default. Never empty.
    pub fn resolve(&self, slot: Slot) -> String {
        let value = self.get(slot);
        if !value.is_empty() {
            return value.to_string();
        }

        if let Some(direct) = slot.derived_from() {
            let direct = self.get(direct);
            if !direct.is_empty() {
                return format!("{KUBERNETES_LABEL_PREFIX}{direct}");
            }
        }

        slot.default_value().to_string()
    }

    /// All 18 slots, keyed by slot name, with defaults filled in.
    pub fn map(&self) -> BTreeMap<String, String> {
        Slot::ALL
            .iter()
            .map(|&slot| (slot.key().to_string(), self.resolve(slot)))
            .collect()
    }
}

/// Same as [`LabelConfig::map`], with an absent config meaning all defaults.
pub fn resolve_full_mapping(lc: Option<&LabelConfig>) -> BTreeMap<String, String> {
    match lc {
        Some(lc) => lc.map(),
        None => Slot::ALL
            .iter()
            .map(|&slot| (slot.key().to_string(), slot.default_value().to_string()))
            .collect(),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown aggregation dimension '{0}'")]
pub struct UnknownDimension(pub String);

/// Kubernetes concepts that can be aggregated by through an external label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    Cluster,
    Controller,
    Namespace,
    Pod,
    Service,
    Deployment,
    StatefulSet,
    DaemonSet,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Dimension::Cluster,
        Dimension::Controller,
        Dimension::Namespace,
        Dimension::Pod,
        Dimension::Service,
        Dimension::Deployment,
        Dimension::StatefulSet,
        Dimension::DaemonSet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Cluster => DIMENSION_CLUSTER,
            Dimension::Controller => DIMENSION_CONTROLLER,
            Dimension::Namespace => DIMENSION_NAMESPACE,
            Dimension::Pod => DIMENSION_POD,
            Dimension::Service => DIMENSION_SERVICE,
            Dimension::Deployment => DIMENSION_DEPLOYMENT,
            Dimension::StatefulSet => DIMENSION_STATEFULSET,
            Dimension::DaemonSet => DIMENSION_DAEMONSET,
        }
    }

    pub fn external_slot(self) -> Slot {
        match self {
            Dimension::Cluster => Slot::ClusterExternalLabel,
            Dimension::Controller => Slot::ControllerExternalLabel,
            Dimension::Namespace => Slot::NamespaceExternalLabel,
            Dimension::Pod => Slot::PodExternalLabel,
            Dimension::Service => Slot::ServiceExternalLabel,
            Dimension::Deployment => Slot::DeploymentExternalLabel,
            Dimension::StatefulSet => Slot::StatefulsetExternalLabel,
            Dimension::DaemonSet => Slot::DaemonsetExternalLabel,
        }
    }
}

impl FromStr for Dimension {
    type Err = UnknownDimension;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == lower)
            .ok_or_else(|| UnknownDimension(s.to_string()))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use assert2::assert;

    use super::*;

    const DEFAULTS: &[(&str, &str)] = &[
        ("department_label", "department"),
        ("environment_label", "env"),
        ("owner_label", "owner"),
        ("product_label", "app"),
        ("team_label", "team"),
        ("cluster_external_label", "kubernetes_cluster"),
        ("namespace_external_label", "kubernetes_namespace"),
        ("controller_external_label", "kubernetes_controller"),
        ("daemonset_external_label", "kubernetes_daemonset"),
        ("deployment_external_label", "kubernetes_deployment"),
        ("statefulset_external_label", "kubernetes_statefulset"),
        ("service_external_label", "kubernetes_service"),
        ("pod_external_label", "kubernetes_pod"),
        ("department_external_label", "kubernetes_label_department"),
        ("environment_external_label", "kubernetes_label_env"),
        ("owner_external_label", "kubernetes_label_owner"),
        ("product_external_label", "kubernetes_label_app"),
        ("team_external_label", "kubernetes_label_team"),
    ];

    fn expected_defaults() -> BTreeMap<String, String> {
        DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_absent_config_is_defaults() {
        let m = resolve_full_mapping(None);
        assert!(m == expected_defaults());
        assert!(m.values().all(|v| !v.is_empty()));
    }

    #[test]
    fn test_empty_and_new_match_absent() {
        assert!(LabelConfig::default().map() == expected_defaults());
        assert!(LabelConfig::new().map() == expected_defaults());
        assert!(resolve_full_mapping(Some(&LabelConfig::new())) == resolve_full_mapping(None));
    }

    #[test]
    fn test_new_sets_every_field() {
        let lc = LabelConfig::new();
        for slot in Slot::ALL {
            assert!(lc.get(slot) == slot.default_value());
        }
    }

    #[test]
    fn test_overrides() {
        for slot in Slot::ALL {
            let mut lc = LabelConfig::default();
            lc.set(slot, "custom");

            let m = lc.map();
            assert!(m[slot.key()] == "custom");

            for other in Slot::ALL.into_iter().filter(|&s| s != slot) {
                // a direct override moves its derived external slot
                if other.derived_from() == Some(slot) {
                    assert!(m[other.key()] == "kubernetes_label_custom");
                } else {
                    assert!(m[other.key()] == other.default_value());
                }
            }
        }
    }

    #[test]
    fn test_derived_precedence() {
        let mut lc = LabelConfig {
            department_label: "dept".to_string(),
            ..Default::default()
        };
        assert!(lc.map()["department_external_label"] == "kubernetes_label_dept");
        assert!(lc.map()["department_label"] == "dept");

        lc.department_external_label = "cost_center".to_string();
        assert!(lc.map()["department_external_label"] == "cost_center");

        let lc = LabelConfig {
            product_label: "service".to_string(),
            team_label: "squad".to_string(),
            ..Default::default()
        };
        assert!(lc.resolve(Slot::ProductExternalLabel) == "kubernetes_label_service");
        assert!(lc.resolve(Slot::TeamExternalLabel) == "kubernetes_label_squad");
        assert!(lc.resolve(Slot::OwnerExternalLabel) == "kubernetes_label_owner");
    }

    #[test]
    fn test_derived_from_new_is_not_rederived() {
        // new() sets the external slots explicitly, so changing a direct
        // label afterwards leaves them alone
        let mut lc = LabelConfig::new();
        lc.environment_label = "stage".to_string();
        assert!(lc.resolve(Slot::EnvironmentExternalLabel) == "kubernetes_label_env");
    }

    #[test]
    fn test_deserialize() {
        let lc: LabelConfig = serde_json::from_str(
            r#"{"namespace_external_label": "kubens", "team_label": "squad"}"#,
        )
        .unwrap();

        assert!(lc.namespace_external_label == "kubens");
        assert!(lc.cluster_external_label.is_empty());

        let m = lc.map();
        assert!(m["namespace_external_label"] == "kubens");
        assert!(m["team_external_label"] == "kubernetes_label_squad");
        assert!(m["cluster_external_label"] == "kubernetes_cluster");

        let err = serde_json::from_str::<LabelConfig>(r#"{"namespace_label": "x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_serialize_uses_slot_keys() {
        let v = serde_json::to_value(LabelConfig::new()).unwrap();
        let obj = v.as_object().unwrap();
        assert!(obj.len() == Slot::ALL.len());
        for slot in Slot::ALL {
            assert!(obj[slot.key()] == slot.default_value());
        }
    }

    #[test]
    fn test_dimension_parse() {
        assert!("namespace".parse::<Dimension>() == Ok(Dimension::Namespace));
        assert!("Namespace".parse::<Dimension>() == Ok(Dimension::Namespace));
        assert!("STATEFULSET".parse::<Dimension>() == Ok(Dimension::StatefulSet));
        assert!("DaemonSet".parse::<Dimension>() == Ok(Dimension::DaemonSet));
        assert!(
            "unknown-dimension".parse::<Dimension>()
                == Err(UnknownDimension("unknown-dimension".to_string()))
        );
        assert!("label:app".parse::<Dimension>().is_err());
    }

    #[test]
    fn test_dimension_slots_are_external() {
        for d in Dimension::ALL {
            let slot = d.external_slot();
            assert!(slot.key().starts_with(d.as_str()));
            assert!(slot.key().ends_with("_external_label"));
            assert!(slot.derived_from().is_none());
        }
    }
}
