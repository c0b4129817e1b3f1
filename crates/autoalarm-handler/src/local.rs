//! Local invocation
//!
//! Runs the dispatcher outside Lambda against the dry-run actions, so an
//! event can be replayed and the resulting alarm operations inspected.

use autoalarm_actions::{DryRunActions, DryRunFixtures, PlannedAction};
use autoalarm_core::types::{DefaultAlarmTable, MetricDimensionsMap};
use autoalarm_core::{AutoAlarmConfig, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::dispatcher::{DispatchOutcome, EventDispatcher};

#[derive(Debug, Serialize)]
pub struct InvokeReport {
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
    pub planned: Vec<PlannedAction>,
}

/// Configuration from a TOML file when given, the environment otherwise.
pub fn load_config(path: Option<&Path>) -> Result<AutoAlarmConfig> {
    match path {
        Some(path) => AutoAlarmConfig::from_file(path),
        None => AutoAlarmConfig::from_env(),
    }
}

pub async fn invoke(
    config: &AutoAlarmConfig,
    payload: Value,
    fixtures: DryRunFixtures,
) -> Result<InvokeReport> {
    let dispatcher = EventDispatcher::new(DryRunActions::new(fixtures));
    let outcome = dispatcher.handle(config, payload).await?;

    Ok(InvokeReport {
        outcome,
        planned: dispatcher.actions().planned(),
    })
}

#[derive(Debug, Serialize)]
pub struct Defaults {
    pub alarms: DefaultAlarmTable,
    pub dimensions: MetricDimensionsMap,
}

/// The alarm table and dimension map an invocation would build
pub fn defaults(config: &AutoAlarmConfig) -> Result<Defaults> {
    Ok(Defaults {
        alarms: DefaultAlarmTable::from_config(config)?,
        dimensions: MetricDimensionsMap::from_config(config),
    })
}
