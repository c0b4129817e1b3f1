//! Event Dispatcher
//!
//! Routes one decoded event to the alarm action it calls for.

use autoalarm_actions::{
    AlarmActions, DatabaseAlarmRequest, DeleteAlarmsRequest, FunctionAlarmRequest,
    InstanceAlarmRequest, ScanRequest, Scope,
};
use autoalarm_core::types::{
    find_tag, DefaultAlarmTable, EventKind, InboundEvent, MetricDimensionsMap,
};
use autoalarm_core::utils::{arn_resource_name, is_cluster_arn};
use autoalarm_core::{AutoAlarmConfig, Result, ALARM_SEPARATOR, NOTIFY_TAG};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// What the dispatcher did with an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Alarm creation was requested for a tagged resource
    AlarmsReconciled,
    /// A running instance without the alarm tag
    NotTagged,
    AlarmsDeleted,
    Scanned { invocations: usize },
    Ignored,
}

/// Everything built from configuration for one invocation
struct Invocation<'a> {
    config: &'a AutoAlarmConfig,
    default_alarms: DefaultAlarmTable,
    metric_dimensions: MetricDimensionsMap,
    sns_topic_arn: Option<String>,
    scope: Scope<'a>,
}

impl Invocation<'_> {
    fn scan_request<'b>(&'b self, region: &'b str, account_id: Option<&'b str>) -> ScanRequest<'b> {
        ScanRequest {
            default_alarms: &self.default_alarms,
            metric_dimensions: &self.metric_dimensions,
            sns_topic_arn: self.sns_topic_arn.as_deref(),
            config: self.config,
            region,
            account_id,
        }
    }
}

pub struct EventDispatcher<A> {
    actions: A,
}

impl<A: AlarmActions> EventDispatcher<A> {
    pub fn new(actions: A) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }

    /// Decode a raw payload and dispatch it.
    pub async fn handle(
        &self,
        config: &AutoAlarmConfig,
        payload: Value,
    ) -> Result<DispatchOutcome> {
        info!("event received: {}", payload);

        let event = InboundEvent::decode(payload).map_err(|e| {
            error!("Failure creating alarm: {}", e);
            e
        })?;
        self.dispatch(config, &event).await
    }

    /// Dispatch a decoded event. Failures are logged once and returned
    /// unchanged.
    pub async fn dispatch(
        &self,
        config: &AutoAlarmConfig,
        event: &InboundEvent,
    ) -> Result<DispatchOutcome> {
        let default_alarms = DefaultAlarmTable::from_config(config).map_err(|e| {
            error!("Invalid alarm configuration: {}", e);
            e
        })?;
        let metric_dimensions = MetricDimensionsMap::from_config(config);

        let sns_topic_arn = config.sns_topic_arn(event.region.as_deref());
        if sns_topic_arn.is_none() {
            info!(
                "SNS_TOPIC_ACCOUNT and SNS_TOPIC_NAME environment variables not set, \
                 skipping notifications setup"
            );
        }

        let invocation = Invocation {
            config,
            default_alarms,
            metric_dimensions,
            sns_topic_arn,
            scope: Scope::new(
                event.region.as_deref(),
                config.cross_account_id(event.account.as_deref()),
            ),
        };

        match self.run(&invocation, event).await {
            Ok(outcome) => {
                debug!("Dispatched {} event: {:?}", event.kind.name(), outcome);
                Ok(outcome)
            }
            Err(e) => {
                error!("Failure creating alarm: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, inv: &Invocation<'_>, event: &InboundEvent) -> Result<DispatchOutcome> {
        let config = inv.config;

        match &event.kind {
            EventKind::InstanceRunning { instance_id } => {
                let Some(instance_info) = self
                    .actions
                    .check_alarm_tag(instance_id, &config.alarms.alarm_tag, inv.scope)
                    .await?
                else {
                    debug!(
                        "Instance {} is not tagged with {}",
                        instance_id, config.alarms.alarm_tag
                    );
                    return Ok(DispatchOutcome::NotTagged);
                };

                let sns_topic_arn = instance_info
                    .tag(NOTIFY_TAG)
                    .or(inv.sns_topic_arn.as_deref());

                let (default_alarms, wildcard_alarms) = inv
                    .default_alarms
                    .separate_wildcard_alarms(&config.alarms.namespace);

                self.actions
                    .process_alarm_tags(InstanceAlarmRequest {
                        instance_id,
                        instance_info: &instance_info,
                        default_alarms: &default_alarms,
                        wildcard_alarms: &wildcard_alarms,
                        metric_dimensions: &inv.metric_dimensions,
                        sns_topic_arn,
                        config,
                        scope: inv.scope,
                    })
                    .await?;
                Ok(DispatchOutcome::AlarmsReconciled)
            }

            EventKind::InstanceTerminated { instance_id } => {
                self.delete(inv, instance_id).await?;
                Ok(DispatchOutcome::AlarmsDeleted)
            }

            EventKind::FunctionTagged { resource_arn, tags } => {
                debug!("Tag Lambda Function event occurred, tags are: {:?}", tags);

                let sns_topic_arn = tags
                    .get(NOTIFY_TAG)
                    .map(String::as_str)
                    .or(inv.sns_topic_arn.as_deref());

                self.actions
                    .process_lambda_alarms(FunctionAlarmRequest {
                        function_name: arn_resource_name(resource_arn),
                        tags,
                        default_alarms: &inv.default_alarms,
                        sns_topic_arn,
                        config,
                        scope: inv.scope,
                    })
                    .await?;
                Ok(DispatchOutcome::AlarmsReconciled)
            }

            EventKind::FunctionDeleted { function_name } => {
                debug!("Delete Lambda Function event occurred for: {}", function_name);
                self.delete(inv, function_name).await?;
                Ok(DispatchOutcome::AlarmsDeleted)
            }

            EventKind::DatabaseTagged {
                resource_name,
                tags,
            } => {
                info!("Tag DB event occurred for RDS: {}", resource_name);
                debug!("RDS tags are: {:?}", tags);

                let sns_topic_arn = find_tag(tags, NOTIFY_TAG).or(inv.sns_topic_arn.as_deref());

                self.actions
                    .process_rds_alarms(DatabaseAlarmRequest {
                        db_arn: resource_name,
                        is_cluster: is_cluster_arn(resource_name),
                        tags,
                        default_alarms: &inv.default_alarms,
                        sns_topic_arn,
                        config,
                        scope: inv.scope,
                    })
                    .await?;
                Ok(DispatchOutcome::AlarmsReconciled)
            }

            EventKind::DatabaseDeleted { source_arn } => {
                let db_id = arn_resource_name(source_arn);
                info!("Delete DB Instance event occurred for RDS: {}", db_id);
                self.delete(inv, db_id).await?;
                Ok(DispatchOutcome::AlarmsDeleted)
            }

            EventKind::Scan => {
                let invocations = self.scan(inv).await?;
                Ok(DispatchOutcome::Scanned { invocations })
            }

            EventKind::Unrecognized => {
                warn!(
                    "Ignoring unrecognized event from source {}",
                    event.source.as_deref().unwrap_or("<none>")
                );
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    async fn delete(&self, inv: &Invocation<'_>, resource_id: &str) -> Result<()> {
        self.actions
            .delete_alarms(DeleteAlarmsRequest {
                resource_id,
                identifier_prefix: &inv.config.alarms.identifier_prefix,
                separator: ALARM_SEPARATOR,
                scope: inv.scope,
            })
            .await?;
        Ok(())
    }

    /// Scan every target region, either of the local account or of every
    /// active account in the target organizational units. Calls run one at
    /// a time and stop at the first failure.
    async fn scan(&self, inv: &Invocation<'_>) -> Result<usize> {
        let config = inv.config;
        let targets = &config.targets;
        debug!(
            "Scanning for EC2 instances with tag: {} to create alarm",
            config.alarms.alarm_tag
        );

        if targets.regions.is_empty() {
            warn!("TARGET_REGIONS is empty, nothing to scan");
        }

        let mut invocations = 0;
        match targets.org_mgmt_account_id.as_deref() {
            Some(mgmt_account_id) => {
                let accounts_by_unit = self
                    .actions
                    .get_active_accounts_by_organizational_unit(&targets.org_units, mgmt_account_id)
                    .await?;

                for (ou_id, accounts) in &accounts_by_unit {
                    info!("Processing Organizational Unit (OU): {}", ou_id);
                    for account in accounts {
                        info!(
                            "Processing account {} ({}) in OU {}",
                            account.account_id, account.account_name, ou_id
                        );
                        for region in &targets.regions {
                            info!("Processing region {}", region);
                            self.actions
                                .scan_and_process_alarm_tags(inv.scan_request(
                                    region,
                                    Some(account.account_id.as_str()),
                                ))
                                .await?;
                            invocations += 1;
                        }
                    }
                }
            }
            None => {
                for region in &targets.regions {
                    info!("Processing region {}", region);
                    self.actions
                        .scan_and_process_alarm_tags(inv.scan_request(region, None))
                        .await?;
                    invocations += 1;
                }
            }
        }

        Ok(invocations)
    }
}
