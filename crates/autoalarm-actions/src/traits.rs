//! Alarm actions trait
//!
//! Each request carries everything one collaborator call needs. The
//! dispatcher builds the request, the implementation talks to the cloud.

use anyhow::Result;
use async_trait::async_trait;
use autoalarm_core::types::{
    Account, DefaultAlarmTable, MetricDimensionsMap, ResourceInfo, Tag, WildcardAlarms,
};
use autoalarm_core::AutoAlarmConfig;
use std::collections::BTreeMap;

/// Region and account an action runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scope<'a> {
    pub region: Option<&'a str>,
    /// Account to assume into; `None` means the local account
    pub cross_account_id: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn new(region: Option<&'a str>, cross_account_id: Option<&'a str>) -> Self {
        Self {
            region,
            cross_account_id,
        }
    }
}

/// Reconcile the alarms of a tagged EC2 instance
#[derive(Debug, Clone, Copy)]
pub struct InstanceAlarmRequest<'a> {
    pub instance_id: &'a str,
    pub instance_info: &'a ResourceInfo,
    /// Default alarms with agent wildcard definitions removed
    pub default_alarms: &'a DefaultAlarmTable,
    pub wildcard_alarms: &'a WildcardAlarms,
    pub metric_dimensions: &'a MetricDimensionsMap,
    pub sns_topic_arn: Option<&'a str>,
    pub config: &'a AutoAlarmConfig,
    pub scope: Scope<'a>,
}

/// Reconcile the alarms of a tagged Lambda function
#[derive(Debug, Clone, Copy)]
pub struct FunctionAlarmRequest<'a> {
    pub function_name: &'a str,
    pub tags: &'a BTreeMap<String, String>,
    pub default_alarms: &'a DefaultAlarmTable,
    pub sns_topic_arn: Option<&'a str>,
    pub config: &'a AutoAlarmConfig,
    pub scope: Scope<'a>,
}

/// Reconcile the alarms of a tagged RDS instance or cluster
#[derive(Debug, Clone, Copy)]
pub struct DatabaseAlarmRequest<'a> {
    pub db_arn: &'a str,
    pub is_cluster: bool,
    pub tags: &'a [Tag],
    pub default_alarms: &'a DefaultAlarmTable,
    pub sns_topic_arn: Option<&'a str>,
    pub config: &'a AutoAlarmConfig,
    pub scope: Scope<'a>,
}

/// Scan one account and region for tagged resources
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    pub default_alarms: &'a DefaultAlarmTable,
    pub metric_dimensions: &'a MetricDimensionsMap,
    pub sns_topic_arn: Option<&'a str>,
    pub config: &'a AutoAlarmConfig,
    pub region: &'a str,
    /// Member account to scan; `None` scans the local account
    pub account_id: Option<&'a str>,
}

/// Delete every alarm created for a resource
#[derive(Debug, Clone, Copy)]
pub struct DeleteAlarmsRequest<'a> {
    pub resource_id: &'a str,
    pub identifier_prefix: &'a str,
    pub separator: &'a str,
    pub scope: Scope<'a>,
}

/// Active accounts per organizational unit id, in the order the units
/// were requested
pub type AccountsByUnit = Vec<(String, Vec<Account>)>;

/// Operations performed against the monitoring, tagging and organizations
/// APIs. Errors are returned untouched to the dispatcher.
#[async_trait]
pub trait AlarmActions: Send + Sync {
    /// Instance details if the instance carries `tag_key`
    async fn check_alarm_tag(
        &self,
        instance_id: &str,
        tag_key: &str,
        scope: Scope<'_>,
    ) -> Result<Option<ResourceInfo>>;

    async fn process_alarm_tags(&self, request: InstanceAlarmRequest<'_>) -> Result<()>;

    async fn process_lambda_alarms(&self, request: FunctionAlarmRequest<'_>) -> Result<()>;

    async fn process_rds_alarms(&self, request: DatabaseAlarmRequest<'_>) -> Result<()>;

    async fn scan_and_process_alarm_tags(&self, request: ScanRequest<'_>) -> Result<()>;

    async fn delete_alarms(&self, request: DeleteAlarmsRequest<'_>) -> Result<()>;

    async fn get_active_accounts_by_organizational_unit(
        &self,
        org_unit_ids: &[String],
        mgmt_account_id: &str,
    ) -> Result<AccountsByUnit>;
}
