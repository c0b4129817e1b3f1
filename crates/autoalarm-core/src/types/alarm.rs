//! Default alarm definitions
//!
//! An alarm definition is a key/threshold pair. The key packs everything
//! needed to create the alarm (namespace, metric, dimensions, comparison,
//! period, evaluation periods, statistic and owner marker) joined with
//! [`ALARM_SEPARATOR`]. Keys double as idempotent alarm names, so they must
//! be unique within their group.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::config::AutoAlarmConfig;
use crate::{
    Error, Result, ALARM_SEPARATOR, DEFAULT_EVALUATION_PERIODS, DEFAULT_PERIOD, DEFAULT_STATISTIC,
    OWNER_MARKER,
};

pub const EC2_NAMESPACE: &str = "AWS/EC2";
pub const RDS_NAMESPACE: &str = "AWS/RDS";
pub const LAMBDA_NAMESPACE: &str = "AWS/Lambda";

/// Dimension always included for agent metrics
pub const AUTO_SCALING_GROUP_DIMENSION: &str = "AutoScalingGroupName";

/// Placeholder marking a dimension value expanded per matching resource
pub const WILDCARD: char = '*';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl AlarmDefinition {
    pub fn is_wildcard(&self) -> bool {
        self.key.contains(WILDCARD)
    }
}

/// Operating system platforms with agent alarm defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "Windows")]
    Windows,
    #[serde(rename = "Amazon Linux")]
    AmazonLinux,
    #[serde(rename = "Red Hat")]
    RedHat,
    #[serde(rename = "Ubuntu")]
    Ubuntu,
    #[serde(rename = "SUSE")]
    Suse,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Windows,
        Platform::AmazonLinux,
        Platform::RedHat,
        Platform::Ubuntu,
        Platform::Suse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::AmazonLinux => "Amazon Linux",
            Platform::RedHat => "Red Hat",
            Platform::Ubuntu => "Ubuntu",
            Platform::Suse => "SUSE",
        }
    }

    /// Root volume the agent reports disk metrics for: (device, fstype)
    fn root_volume(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Platform::Windows => None,
            Platform::AmazonLinux => Some(("nvme0n1p1", "xfs")),
            Platform::RedHat => Some(("xvda2", "xfs")),
            Platform::Ubuntu => Some(("xvda1", "ext4")),
            Platform::Suse => Some(("xvda1", "xfs")),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alarm definitions of one namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlarmGroup {
    /// Service namespaces: one list for every resource
    Metrics(Vec<AlarmDefinition>),
    /// Agent namespace: one list per operating system platform
    Platforms(BTreeMap<Platform, Vec<AlarmDefinition>>),
}

/// Wildcard definitions of the agent namespace, by platform
pub type WildcardAlarms = BTreeMap<Platform, Vec<AlarmDefinition>>;

/// Default alarms keyed by namespace. Built per invocation, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultAlarmTable {
    groups: BTreeMap<String, AlarmGroup>,
}

impl DefaultAlarmTable {
    pub fn from_config(config: &AutoAlarmConfig) -> Result<Self> {
        let keys = KeyBuilder::new(&config.alarms.identifier_prefix);
        let thresholds = &config.thresholds;
        let agent = config.alarms.namespace.as_str();

        let cpu_high = format_threshold(thresholds.cpu_high);
        let memory_high = format_threshold(thresholds.memory_high);
        let disk_free = thresholds.disk_free_percent.to_string();
        let disk_used = thresholds.disk_used_percent().to_string();

        let mut groups = BTreeMap::new();
        groups.insert(
            RDS_NAMESPACE.to_string(),
            AlarmGroup::Metrics(vec![keys.definition(
                RDS_NAMESPACE,
                &["CPUUtilization"],
                "GreaterThanThreshold",
                format_threshold(thresholds.rds_cpu_high),
            )]),
        );
        groups.insert(
            EC2_NAMESPACE.to_string(),
            AlarmGroup::Metrics(vec![keys.definition(
                EC2_NAMESPACE,
                &["CPUUtilization"],
                "GreaterThanThreshold",
                cpu_high,
            )]),
        );
        groups.insert(
            LAMBDA_NAMESPACE.to_string(),
            AlarmGroup::Metrics(vec![
                keys.definition(
                    LAMBDA_NAMESPACE,
                    &["Errors"],
                    "GreaterThanThreshold",
                    format_threshold(thresholds.lambda_errors),
                ),
                keys.definition(
                    LAMBDA_NAMESPACE,
                    &["Throttles"],
                    "GreaterThanThreshold",
                    format_threshold(thresholds.lambda_throttles),
                ),
            ]),
        );

        let mut platforms = BTreeMap::new();
        for platform in Platform::ALL {
            let definitions = match platform.root_volume() {
                None => vec![
                    keys.definition(
                        agent,
                        &[
                            "LogicalDisk % Free Space",
                            "objectname",
                            "LogicalDisk",
                            "instance",
                            "C:",
                        ],
                        "LessThanThreshold",
                        disk_free.clone(),
                    ),
                    keys.definition(
                        agent,
                        &["Memory % Committed Bytes In Use", "objectname", "Memory"],
                        "GreaterThanThreshold",
                        memory_high.clone(),
                    ),
                ],
                Some((device, fstype)) => vec![
                    keys.definition(
                        agent,
                        &[
                            "disk_used_percent",
                            "device",
                            device,
                            "fstype",
                            fstype,
                            "path",
                            "/",
                        ],
                        "GreaterThanThreshold",
                        disk_used.clone(),
                    ),
                    keys.definition(
                        agent,
                        &["mem_used_percent"],
                        "GreaterThanThreshold",
                        memory_high.clone(),
                    ),
                ],
            };
            platforms.insert(platform, definitions);
        }
        // Inserted last so a custom agent namespace named like a service
        // namespace replaces that entry.
        groups.insert(agent.to_string(), AlarmGroup::Platforms(platforms));

        let table = Self { groups };
        table.validate()?;
        Ok(table)
    }

    pub fn get(&self, namespace: &str) -> Option<&AlarmGroup> {
        self.groups.get(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Definitions of a service namespace; empty for unknown namespaces.
    pub fn metrics(&self, namespace: &str) -> &[AlarmDefinition] {
        match self.groups.get(namespace) {
            Some(AlarmGroup::Metrics(definitions)) => definitions,
            _ => &[],
        }
    }

    /// Definitions of an agent namespace platform; empty when missing.
    pub fn platform(&self, namespace: &str, platform: Platform) -> &[AlarmDefinition] {
        match self.groups.get(namespace) {
            Some(AlarmGroup::Platforms(platforms)) => {
                platforms.get(&platform).map(Vec::as_slice).unwrap_or(&[])
            }
            _ => &[],
        }
    }

    /// Split the agent namespace into exact definitions and wildcard
    /// definitions. The returned table equals this one with every wildcard
    /// definition removed from the agent platform lists.
    pub fn separate_wildcard_alarms(&self, namespace: &str) -> (DefaultAlarmTable, WildcardAlarms) {
        let mut exact = self.clone();
        let mut wildcards = WildcardAlarms::new();

        if let Some(AlarmGroup::Platforms(platforms)) = exact.groups.get_mut(namespace) {
            for (platform, definitions) in platforms.iter_mut() {
                let (wild, kept): (Vec<_>, Vec<_>) =
                    definitions.drain(..).partition(AlarmDefinition::is_wildcard);
                *definitions = kept;
                wildcards.insert(*platform, wild);
            }
        }

        (exact, wildcards)
    }

    fn validate(&self) -> Result<()> {
        for (namespace, group) in &self.groups {
            match group {
                AlarmGroup::Metrics(definitions) => check_unique(namespace, definitions)?,
                AlarmGroup::Platforms(platforms) => {
                    for (platform, definitions) in platforms {
                        check_unique(&format!("{}/{}", namespace, platform), definitions)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_unique(group: &str, definitions: &[AlarmDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for definition in definitions {
        if !seen.insert(definition.key.as_str()) {
            return Err(Error::DuplicateAlarmKey {
                group: group.to_string(),
                key: definition.key.clone(),
            });
        }
    }
    Ok(())
}

/// Thresholds render without a fractional part when integral ("75").
fn format_threshold(value: f64) -> String {
    value.to_string()
}

struct KeyBuilder<'a> {
    prefix: &'a str,
}

impl<'a> KeyBuilder<'a> {
    fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    fn definition(
        &self,
        namespace: &str,
        metric: &[&str],
        comparison: &str,
        value: String,
    ) -> AlarmDefinition {
        let mut parts = Vec::with_capacity(metric.len() + 7);
        parts.push(self.prefix);
        parts.push(namespace);
        parts.extend_from_slice(metric);
        parts.extend_from_slice(&[
            comparison,
            DEFAULT_PERIOD,
            DEFAULT_EVALUATION_PERIODS,
            DEFAULT_STATISTIC,
            OWNER_MARKER,
        ]);

        AlarmDefinition {
            key: parts.join(ALARM_SEPARATOR),
            value,
        }
    }
}

/// Dimension names used when creating alarms, by namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricDimensionsMap(BTreeMap<String, Vec<String>>);

impl MetricDimensionsMap {
    pub fn from_config(config: &AutoAlarmConfig) -> Self {
        let agent = config.alarms.namespace.clone();

        let mut map = BTreeMap::new();
        map.insert(agent.clone(), config.alarms.append_dimensions.clone());
        map.insert(EC2_NAMESPACE.to_string(), vec!["InstanceId".to_string()]);

        let dimensions = map.entry(agent).or_default();
        if !dimensions.iter().any(|d| d == AUTO_SCALING_GROUP_DIMENSION) {
            dimensions.push(AUTO_SCALING_GROUP_DIMENSION.to_string());
        }

        Self(map)
    }

    pub fn get(&self, namespace: &str) -> Option<&[String]> {
        self.0.get(namespace).map(Vec::as_slice)
    }
}
