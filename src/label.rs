// Aggregating by a literal label: "label:<key>"
pub const LABEL_AGGREGATE_PREFIX: &str = "label:";

// Derived external slots are "kubernetes_label_<direct label>"
pub const KUBERNETES_LABEL_PREFIX: &str = "kubernetes_label_";

// Recognized aggregation dimensions (matched case-insensitively)
pub const DIMENSION_CLUSTER: &str = "cluster";
pub const DIMENSION_CONTROLLER: &str = "controller";
pub const DIMENSION_NAMESPACE: &str = "namespace";
pub const DIMENSION_POD: &str = "pod";
pub const DIMENSION_SERVICE: &str = "service";
pub const DIMENSION_DEPLOYMENT: &str = "deployment";
pub const DIMENSION_STATEFULSET: &str = "statefulset";
pub const DIMENSION_DAEMONSET: &str = "daemonset";
