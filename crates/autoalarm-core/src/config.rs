//! Configuration for AutoAlarm
//!
//! Every invocation reads its configuration from named environment
//! variables. A TOML file with the same sections can be used instead when
//! running locally.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoAlarmConfig {
    /// Account the handler is deployed in. Events from any other account
    /// are processed with cross-account credentials.
    pub local_account_id: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub alarms: AlarmConfig,

    #[serde(default)]
    pub thresholds: ThresholdConfig,

    #[serde(default)]
    pub targets: TargetConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl AutoAlarmConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::ConfigFile(format!("Failed to read config: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigFile(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from a variable lookup. Empty values are
    /// treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let local_account_id =
            get("LOCAL_ACCOUNT_ID").ok_or(Error::MissingConfig("LOCAL_ACCOUNT_ID"))?;

        let mut config = Self {
            local_account_id: local_account_id.trim().to_string(),
            logging: LoggingConfig::default(),
            alarms: AlarmConfig::default(),
            thresholds: ThresholdConfig::default(),
            targets: TargetConfig::default(),
            notifications: NotificationConfig::default(),
        };

        if let Some(level) = get("LOGLEVEL") {
            config.logging.level = level;
        }

        if let Some(tag) = get("ALARM_TAG") {
            config.alarms.alarm_tag = tag;
        }
        if let Some(namespace) = get("CLOUDWATCH_NAMESPACE") {
            config.alarms.namespace = namespace;
        }
        if let Some(flag) = get("CREATE_DEFAULT_ALARMS") {
            config.alarms.create_default_alarms = flag.trim().eq_ignore_ascii_case("true");
        }
        if let Some(dimensions) = get("CLOUDWATCH_APPEND_DIMENSIONS") {
            config.alarms.append_dimensions = split_list(&dimensions);
        }
        if let Some(prefix) = get("ALARM_IDENTIFIER_PREFIX") {
            config.alarms.identifier_prefix = prefix;
        }

        let thresholds = &mut config.thresholds;
        if let Some(v) = get("ALARM_CPU_HIGH_THRESHOLD") {
            thresholds.cpu_high = parse_threshold("ALARM_CPU_HIGH_THRESHOLD", &v)?;
        }
        if let Some(v) = get("ALARM_MEMORY_HIGH_THRESHOLD") {
            thresholds.memory_high = parse_threshold("ALARM_MEMORY_HIGH_THRESHOLD", &v)?;
        }
        if let Some(v) = get("ALARM_DISK_PERCENT_LOW_THRESHOLD") {
            thresholds.disk_free_percent = parse_percent("ALARM_DISK_PERCENT_LOW_THRESHOLD", &v)?;
        }
        if let Some(v) = get("ALARM_RDS_CPU_HIGH_THRESHOLD") {
            thresholds.rds_cpu_high = parse_threshold("ALARM_RDS_CPU_HIGH_THRESHOLD", &v)?;
        }
        if let Some(v) = get("ALARM_LAMBDA_ERROR_THRESHOLD") {
            thresholds.lambda_errors = parse_threshold("ALARM_LAMBDA_ERROR_THRESHOLD", &v)?;
        }
        if let Some(v) = get("ALARM_LAMBDA_THROTTLE_THRESHOLD") {
            thresholds.lambda_throttles = parse_threshold("ALARM_LAMBDA_THROTTLE_THRESHOLD", &v)?;
        }

        if let Some(units) = get("TARGET_ORG_UNITS") {
            config.targets.org_units = split_list(&units);
        }
        if let Some(regions) = get("TARGET_REGIONS") {
            config.targets.regions = split_list(&regions);
        }
        config.targets.org_mgmt_account_id = get("ORG_MGMT_ACCOUNT").map(|v| v.trim().to_string());

        config.notifications.topic_name = get("SNS_TOPIC_NAME");
        config.notifications.topic_account = get("SNS_TOPIC_ACCOUNT");

        Ok(config)
    }

    /// Checks values that could not be checked while deserializing.
    pub fn validate(&self) -> Result<()> {
        if self.local_account_id.trim().is_empty() {
            return Err(Error::MissingConfig("LOCAL_ACCOUNT_ID"));
        }
        if self.thresholds.disk_free_percent > 100 {
            return Err(Error::InvalidConfig {
                name: "ALARM_DISK_PERCENT_LOW_THRESHOLD",
                value: self.thresholds.disk_free_percent.to_string(),
                reason: "percentage must be between 0 and 100".into(),
            });
        }
        for (name, value) in [
            ("ALARM_CPU_HIGH_THRESHOLD", self.thresholds.cpu_high),
            ("ALARM_MEMORY_HIGH_THRESHOLD", self.thresholds.memory_high),
            ("ALARM_RDS_CPU_HIGH_THRESHOLD", self.thresholds.rds_cpu_high),
            ("ALARM_LAMBDA_ERROR_THRESHOLD", self.thresholds.lambda_errors),
            ("ALARM_LAMBDA_THROTTLE_THRESHOLD", self.thresholds.lambda_throttles),
        ] {
            if !value.is_finite() {
                return Err(Error::InvalidConfig {
                    name,
                    value: value.to_string(),
                    reason: "threshold must be a finite number".into(),
                });
            }
        }
        Ok(())
    }

    /// Account to assume into for an event, or `None` when the event
    /// belongs to the local account.
    pub fn cross_account_id<'a>(&self, event_account: Option<&'a str>) -> Option<&'a str> {
        event_account.filter(|account| *account != self.local_account_id)
    }

    /// Default notification topic for a region. Notifications are disabled
    /// unless topic name, topic account and region are all known.
    pub fn sns_topic_arn(&self, region: Option<&str>) -> Option<String> {
        let name = self.notifications.topic_name.as_deref()?;
        let account = self.notifications.topic_account.as_deref()?;
        let region = region.filter(|r| !r.is_empty())?;
        Some(format!("arn:aws:sns:{}:{}:{}", region, account, name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Log level alone, for setting up logging before the rest of the
    /// configuration can be validated.
    pub fn from_env() -> Self {
        match std::env::var("LOGLEVEL") {
            Ok(level) if !level.trim().is_empty() => Self { level },
            _ => Self::default(),
        }
    }

    /// Translate the configured level into a tracing filter directive.
    pub fn filter_directive(&self) -> &'static str {
        match self.level.trim().to_ascii_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" | "CRITICAL" | "FATAL" => "error",
            _ => "info",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Tag key marking resources for alarm creation
    pub alarm_tag: String,
    /// CloudWatch agent namespace
    pub namespace: String,
    pub create_default_alarms: bool,
    /// Dimensions the agent appends to its metrics
    pub append_dimensions: Vec<String>,
    /// Prefix of every alarm name created by this tool
    pub identifier_prefix: String,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            alarm_tag: "Create_Auto_Alarms".to_string(),
            namespace: "CWAgent".to_string(),
            create_default_alarms: true,
            append_dimensions: vec![
                "InstanceId".to_string(),
                "ImageId".to_string(),
                "InstanceType".to_string(),
            ],
            identifier_prefix: "AutoAlarm".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub cpu_high: f64,
    pub memory_high: f64,
    /// Free disk space percentage below which the disk alarm fires
    pub disk_free_percent: u8,
    pub rds_cpu_high: f64,
    pub lambda_errors: f64,
    pub lambda_throttles: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_high: 75.0,
            memory_high: 75.0,
            disk_free_percent: 20,
            rds_cpu_high: 75.0,
            lambda_errors: 1.0,
            lambda_throttles: 1.0,
        }
    }
}

impl ThresholdConfig {
    /// Used disk space percentage matching the free space threshold
    pub fn disk_used_percent(&self) -> u8 {
        100u8.saturating_sub(self.disk_free_percent)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Organizational units scanned when an org management account is set
    pub org_units: Vec<String>,
    pub regions: Vec<String>,
    pub org_mgmt_account_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub topic_name: Option<String>,
    pub topic_account: Option<String>,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn parse_threshold(name: &'static str, value: &str) -> Result<f64> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(Error::InvalidConfig {
            name,
            value: value.to_string(),
            reason: "threshold must be a finite number".into(),
        }),
        Err(e) => Err(Error::InvalidConfig {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_percent(name: &'static str, value: &str) -> Result<u8> {
    let percent = value.trim().parse::<u8>().map_err(|e| Error::InvalidConfig {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    if percent > 100 {
        return Err(Error::InvalidConfig {
            name,
            value: value.to_string(),
            reason: "percentage must be between 0 and 100".into(),
        });
    }
    Ok(percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<AutoAlarmConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AutoAlarmConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[("LOCAL_ACCOUNT_ID", "111111111111")]).unwrap();

        assert_eq!(config.local_account_id, "111111111111");
        assert_eq!(config.alarms.alarm_tag, "Create_Auto_Alarms");
        assert_eq!(config.alarms.namespace, "CWAgent");
        assert!(config.alarms.create_default_alarms);
        assert_eq!(
            config.alarms.append_dimensions,
            vec!["InstanceId", "ImageId", "InstanceType"]
        );
        assert_eq!(config.alarms.identifier_prefix, "AutoAlarm");
        assert_eq!(config.thresholds.cpu_high, 75.0);
        assert_eq!(config.thresholds.disk_used_percent(), 80);
        assert!(config.targets.regions.is_empty());
        assert!(config.targets.org_mgmt_account_id.is_none());
        assert_eq!(config.logging.filter_directive(), "info");
    }

    #[test]
    fn test_missing_local_account() {
        let err = config_with(&[("TARGET_REGIONS", "us-east-1")]).unwrap_err();
        assert!(matches!(err, Error::MissingConfig("LOCAL_ACCOUNT_ID")));

        let err = config_with(&[("LOCAL_ACCOUNT_ID", "")]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_disk_threshold_derivation() {
        let config = config_with(&[
            ("LOCAL_ACCOUNT_ID", "111111111111"),
            ("ALARM_DISK_PERCENT_LOW_THRESHOLD", "20"),
        ])
        .unwrap();
        assert_eq!(config.thresholds.disk_used_percent(), 80);

        let config = config_with(&[
            ("LOCAL_ACCOUNT_ID", "111111111111"),
            ("ALARM_DISK_PERCENT_LOW_THRESHOLD", "35"),
        ])
        .unwrap();
        assert_eq!(config.thresholds.disk_used_percent(), 65);
    }

    #[test]
    fn test_invalid_thresholds_fail_fast() {
        let err = config_with(&[
            ("LOCAL_ACCOUNT_ID", "111111111111"),
            ("ALARM_CPU_HIGH_THRESHOLD", "high"),
        ])
        .unwrap_err();
        match err {
            Error::InvalidConfig { name, value, .. } => {
                assert_eq!(name, "ALARM_CPU_HIGH_THRESHOLD");
                assert_eq!(value, "high");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = config_with(&[
            ("LOCAL_ACCOUNT_ID", "111111111111"),
            ("ALARM_DISK_PERCENT_LOW_THRESHOLD", "120"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));

        let err = config_with(&[
            ("LOCAL_ACCOUNT_ID", "111111111111"),
            ("ALARM_DISK_PERCENT_LOW_THRESHOLD", "12.5"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_lists_are_trimmed() {
        let config = config_with(&[
            ("LOCAL_ACCOUNT_ID", "111111111111"),
            ("TARGET_REGIONS", "us-east-1, us-west-2,"),
            ("TARGET_ORG_UNITS", "ou-aaaa-11111111 ,ou-bbbb-22222222"),
            ("CLOUDWATCH_APPEND_DIMENSIONS", "InstanceId,AutoScalingGroupName"),
            ("CREATE_DEFAULT_ALARMS", "FALSE"),
            ("LOGLEVEL", "WARNING"),
        ])
        .unwrap();

        assert_eq!(config.targets.regions, vec!["us-east-1", "us-west-2"]);
        assert_eq!(
            config.targets.org_units,
            vec!["ou-aaaa-11111111", "ou-bbbb-22222222"]
        );
        assert_eq!(
            config.alarms.append_dimensions,
            vec!["InstanceId", "AutoScalingGroupName"]
        );
        assert!(!config.alarms.create_default_alarms);
        assert_eq!(config.logging.filter_directive(), "warn");
    }

    #[test]
    fn test_cross_account_id() {
        let config = config_with(&[("LOCAL_ACCOUNT_ID", "111111111111")]).unwrap();

        assert_eq!(config.cross_account_id(Some("111111111111")), None);
        assert_eq!(
            config.cross_account_id(Some("222222222222")),
            Some("222222222222")
        );
        assert_eq!(config.cross_account_id(None), None);
    }

    #[test]
    fn test_sns_topic_arn() {
        let config = config_with(&[("LOCAL_ACCOUNT_ID", "111111111111")]).unwrap();
        assert_eq!(config.sns_topic_arn(Some("us-east-1")), None);

        let config = config_with(&[
            ("LOCAL_ACCOUNT_ID", "111111111111"),
            ("SNS_TOPIC_NAME", "CloudWatchAutoAlarmsSNSTopic"),
            ("SNS_TOPIC_ACCOUNT", "333333333333"),
        ])
        .unwrap();
        assert_eq!(
            config.sns_topic_arn(Some("eu-west-1")).as_deref(),
            Some("arn:aws:sns:eu-west-1:333333333333:CloudWatchAutoAlarmsSNSTopic")
        );
        assert_eq!(config.sns_topic_arn(None), None);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!(
            "autoalarm-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"
local_account_id = "111111111111"

[thresholds]
cpu_high = 90.0
memory_high = 80.0
disk_free_percent = 10
rds_cpu_high = 85.0
lambda_errors = 2.0
lambda_throttles = 1.0

[targets]
regions = ["us-east-1"]
org_units = []
"#,
        )
        .unwrap();

        let config = AutoAlarmConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.thresholds.cpu_high, 90.0);
        assert_eq!(config.thresholds.disk_used_percent(), 90);
        assert_eq!(config.targets.regions, vec!["us-east-1"]);
        assert_eq!(config.alarms.namespace, "CWAgent");
    }
}
