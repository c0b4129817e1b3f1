//! Dry-run actions
//!
//! Answers tag and account lookups from fixtures and records every
//! reconciliation or deletion it is asked to perform.

use anyhow::Result;
use async_trait::async_trait;
use autoalarm_core::types::{Account, AlarmDefinition, ResourceInfo};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::traits::*;

/// Lookup answers for a dry run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DryRunFixtures {
    /// Tagged resources by resource id
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceInfo>,
    /// Active accounts by organizational unit id
    #[serde(default)]
    pub accounts: BTreeMap<String, Vec<Account>>,
}

impl DryRunFixtures {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// One operation the handler asked for
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    ReconcileInstance {
        instance_id: String,
        sns_topic_arn: Option<String>,
        alarms: Vec<AlarmDefinition>,
        wildcard_alarms: usize,
        region: Option<String>,
        cross_account_id: Option<String>,
    },
    ReconcileFunction {
        function_name: String,
        sns_topic_arn: Option<String>,
        region: Option<String>,
        cross_account_id: Option<String>,
    },
    ReconcileDatabase {
        db_arn: String,
        is_cluster: bool,
        sns_topic_arn: Option<String>,
        region: Option<String>,
        cross_account_id: Option<String>,
    },
    Scan {
        region: String,
        account_id: Option<String>,
        sns_topic_arn: Option<String>,
    },
    DeleteAlarms {
        /// Alarm name prefix selecting the alarms to delete
        alarm_prefix: String,
        region: Option<String>,
        cross_account_id: Option<String>,
    },
}

#[derive(Default)]
pub struct DryRunActions {
    fixtures: DryRunFixtures,
    planned: Mutex<Vec<PlannedAction>>,
}

impl DryRunActions {
    pub fn new(fixtures: DryRunFixtures) -> Self {
        Self {
            fixtures,
            planned: Mutex::new(Vec::new()),
        }
    }

    /// Operations recorded so far, in call order
    pub fn planned(&self) -> Vec<PlannedAction> {
        self.planned.lock().clone()
    }

    fn record(&self, action: PlannedAction) {
        debug!("Planned {:?}", action);
        self.planned.lock().push(action);
    }
}

#[async_trait]
impl AlarmActions for DryRunActions {
    async fn check_alarm_tag(
        &self,
        instance_id: &str,
        tag_key: &str,
        _scope: Scope<'_>,
    ) -> Result<Option<ResourceInfo>> {
        let info = self
            .fixtures
            .resources
            .get(instance_id)
            .filter(|info| info.tag(tag_key).is_some())
            .cloned();
        debug!(
            "Alarm tag {} on {}: {}",
            tag_key,
            instance_id,
            if info.is_some() { "present" } else { "absent" }
        );
        Ok(info)
    }

    async fn process_alarm_tags(&self, request: InstanceAlarmRequest<'_>) -> Result<()> {
        let namespace = &request.config.alarms.namespace;
        let mut alarms: Vec<AlarmDefinition> = request
            .default_alarms
            .metrics(autoalarm_core::types::EC2_NAMESPACE)
            .to_vec();
        if let Some(platform) = platform_of(request.instance_info) {
            alarms.extend_from_slice(request.default_alarms.platform(namespace, platform));
        }

        info!(
            "Would reconcile {} alarms for instance {}",
            alarms.len(),
            request.instance_id
        );
        self.record(PlannedAction::ReconcileInstance {
            instance_id: request.instance_id.to_string(),
            sns_topic_arn: request.sns_topic_arn.map(String::from),
            alarms,
            wildcard_alarms: request.wildcard_alarms.values().map(Vec::len).sum(),
            region: request.scope.region.map(String::from),
            cross_account_id: request.scope.cross_account_id.map(String::from),
        });
        Ok(())
    }

    async fn process_lambda_alarms(&self, request: FunctionAlarmRequest<'_>) -> Result<()> {
        if !request.tags.contains_key(&request.config.alarms.alarm_tag) {
            debug!(
                "Function {} is not tagged with {}",
                request.function_name, request.config.alarms.alarm_tag
            );
            return Ok(());
        }

        info!("Would reconcile alarms for function {}", request.function_name);
        self.record(PlannedAction::ReconcileFunction {
            function_name: request.function_name.to_string(),
            sns_topic_arn: request.sns_topic_arn.map(String::from),
            region: request.scope.region.map(String::from),
            cross_account_id: request.scope.cross_account_id.map(String::from),
        });
        Ok(())
    }

    async fn process_rds_alarms(&self, request: DatabaseAlarmRequest<'_>) -> Result<()> {
        let alarm_tag = &request.config.alarms.alarm_tag;
        if !request.tags.iter().any(|tag| &tag.key == alarm_tag) {
            debug!("Database {} is not tagged with {}", request.db_arn, alarm_tag);
            return Ok(());
        }

        info!("Would reconcile alarms for database {}", request.db_arn);
        self.record(PlannedAction::ReconcileDatabase {
            db_arn: request.db_arn.to_string(),
            is_cluster: request.is_cluster,
            sns_topic_arn: request.sns_topic_arn.map(String::from),
            region: request.scope.region.map(String::from),
            cross_account_id: request.scope.cross_account_id.map(String::from),
        });
        Ok(())
    }

    async fn scan_and_process_alarm_tags(&self, request: ScanRequest<'_>) -> Result<()> {
        info!(
            "Would scan region {} of account {}",
            request.region,
            request.account_id.unwrap_or("local")
        );
        self.record(PlannedAction::Scan {
            region: request.region.to_string(),
            account_id: request.account_id.map(String::from),
            sns_topic_arn: request.sns_topic_arn.map(String::from),
        });
        Ok(())
    }

    async fn delete_alarms(&self, request: DeleteAlarmsRequest<'_>) -> Result<()> {
        let alarm_prefix = format!(
            "{}{}{}",
            request.identifier_prefix, request.separator, request.resource_id
        );
        info!("Would delete alarms starting with {}", alarm_prefix);
        self.record(PlannedAction::DeleteAlarms {
            alarm_prefix,
            region: request.scope.region.map(String::from),
            cross_account_id: request.scope.cross_account_id.map(String::from),
        });
        Ok(())
    }

    async fn get_active_accounts_by_organizational_unit(
        &self,
        org_unit_ids: &[String],
        mgmt_account_id: &str,
    ) -> Result<AccountsByUnit> {
        debug!(
            "Listing accounts of {} units via {}",
            org_unit_ids.len(),
            mgmt_account_id
        );
        Ok(org_unit_ids
            .iter()
            .map(|ou| {
                let accounts = self.fixtures.accounts.get(ou).cloned().unwrap_or_default();
                (ou.clone(), accounts)
            })
            .collect())
    }
}

/// Agent platform of an instance, from its reported platform details.
fn platform_of(info: &ResourceInfo) -> Option<autoalarm_core::types::Platform> {
    use autoalarm_core::types::Platform;

    let platform = info.platform.as_deref()?.to_ascii_lowercase();
    let found = if platform.contains("windows") {
        Platform::Windows
    } else if platform.contains("red hat") {
        Platform::RedHat
    } else if platform.contains("ubuntu") {
        Platform::Ubuntu
    } else if platform.contains("suse") {
        Platform::Suse
    } else {
        Platform::AmazonLinux
    };
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoalarm_core::types::Tag;

    fn fixtures() -> DryRunFixtures {
        DryRunFixtures::from_json(
            r#"{
                "resources": {
                    "i-123": {
                        "resource_id": "i-123",
                        "Tags": [{"Key": "Create_Auto_Alarms", "Value": ""}],
                        "platform": "Ubuntu"
                    },
                    "i-456": {"resource_id": "i-456", "Tags": [{"Key": "Name", "Value": "web"}]}
                },
                "accounts": {
                    "ou-1": [{"AccountId": "222222222222", "AccountName": "dev"}]
                }
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_check_alarm_tag() {
        let actions = DryRunActions::new(fixtures());
        let scope = Scope::default();

        let info = actions
            .check_alarm_tag("i-123", "Create_Auto_Alarms", scope)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.tags, vec![Tag::new("Create_Auto_Alarms", "")]);

        assert!(actions
            .check_alarm_tag("i-456", "Create_Auto_Alarms", scope)
            .await
            .unwrap()
            .is_none());
        assert!(actions
            .check_alarm_tag("i-789", "Create_Auto_Alarms", scope)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_records_prefix() {
        let actions = DryRunActions::default();
        actions
            .delete_alarms(DeleteAlarmsRequest {
                resource_id: "i-123",
                identifier_prefix: "AutoAlarm",
                separator: "-",
                scope: Scope::new(Some("us-east-1"), Some("222222222222")),
            })
            .await
            .unwrap();

        assert_eq!(
            actions.planned(),
            vec![PlannedAction::DeleteAlarms {
                alarm_prefix: "AutoAlarm-i-123".to_string(),
                region: Some("us-east-1".to_string()),
                cross_account_id: Some("222222222222".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_accounts_by_unit() {
        let actions = DryRunActions::new(fixtures());
        let units = vec!["ou-1".to_string(), "ou-2".to_string()];

        let accounts = actions
            .get_active_accounts_by_organizational_unit(&units, "999999999999")
            .await
            .unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].0, "ou-1");
        assert_eq!(accounts[0].1[0].account_name, "dev");
        assert_eq!(accounts[1].0, "ou-2");
        assert!(accounts[1].1.is_empty());
    }
}
