//! Inbound event decoding
//!
//! Lifecycle events arrive as EventBridge payloads whose `detail` shape
//! depends on the source. Decoding classifies the payload once, up front,
//! into an [`EventKind`]; the dispatcher never looks at raw JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::Tag;
use crate::utils::arn_resource_name;
use crate::{Error, Result};

pub const EC2_SOURCE: &str = "aws.ec2";
pub const LAMBDA_SOURCE: &str = "aws.lambda";
pub const RDS_SOURCE: &str = "aws.rds";

pub const LAMBDA_TAG_EVENT: &str = "TagResource20170331v2";
pub const LAMBDA_DELETE_EVENT: &str = "DeleteFunction20150331";
pub const RDS_TAG_EVENT: &str = "AddTagsToResource";
pub const RDS_DELETION_CATEGORY: &str = "deletion";
pub const SCAN_ACTION: &str = "scan";

const INSTANCE_ID: &str = "detail.instance-id";

/// A decoded event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundEvent {
    pub source: Option<String>,
    pub region: Option<String>,
    pub account: Option<String>,
    pub kind: EventKind,
}

/// What an event asks the dispatcher to do
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    InstanceRunning {
        instance_id: String,
    },
    InstanceTerminated {
        instance_id: String,
    },
    FunctionTagged {
        resource_arn: String,
        tags: BTreeMap<String, String>,
    },
    FunctionDeleted {
        function_name: String,
    },
    DatabaseTagged {
        resource_name: String,
        tags: Vec<Tag>,
    },
    DatabaseDeleted {
        source_arn: String,
    },
    Scan,
    Unrecognized,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::InstanceRunning { .. } => "instance_running",
            EventKind::InstanceTerminated { .. } => "instance_terminated",
            EventKind::FunctionTagged { .. } => "function_tagged",
            EventKind::FunctionDeleted { .. } => "function_deleted",
            EventKind::DatabaseTagged { .. } => "database_tagged",
            EventKind::DatabaseDeleted { .. } => "database_deleted",
            EventKind::Scan => "scan",
            EventKind::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    account: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    detail: Value,
}

#[derive(Debug, Deserialize)]
struct Ec2StateDetail {
    state: String,
    #[serde(rename = "instance-id")]
    instance_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudTrailDetail {
    event_name: Option<String>,
    #[serde(default)]
    request_parameters: Value,
}

#[derive(Debug, Deserialize)]
struct LambdaTagParameters {
    resource: String,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LambdaDeleteParameters {
    function_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdsTagParameters {
    resource_name: String,
    tags: Vec<Tag>,
}

#[derive(Debug, Default, Deserialize)]
struct RdsEventDetail {
    #[serde(rename = "EventCategories", default)]
    event_categories: Vec<String>,
    #[serde(rename = "SourceArn")]
    source_arn: Option<String>,
}

impl InboundEvent {
    pub fn decode(value: Value) -> Result<Self> {
        // Structs also deserialize from arrays, by position.
        if !value.is_object() {
            return Err(Error::malformed("inbound", "payload is not an object"));
        }
        let raw: RawEvent = serde_json::from_value(value)
            .map_err(|e| Error::malformed("inbound", e.to_string()))?;

        let kind = classify(&raw)?;
        Ok(Self {
            source: raw.source,
            region: raw.region,
            account: raw.account,
            kind,
        })
    }

    /// Function name of a tagged or deleted function
    pub fn function_name(&self) -> Option<&str> {
        match &self.kind {
            EventKind::FunctionTagged { resource_arn, .. } => Some(arn_resource_name(resource_arn)),
            EventKind::FunctionDeleted { function_name } => Some(function_name),
            _ => None,
        }
    }
}

/// Branches are tried in order; the first match wins.
fn classify(raw: &RawEvent) -> Result<EventKind> {
    match raw.source.as_deref() {
        Some(EC2_SOURCE) => {
            let detail: Ec2StateDetail = detail(EC2_SOURCE, &raw.detail)?;
            match detail.state.as_str() {
                "running" => {
                    let instance_id = required(EC2_SOURCE, detail.instance_id, INSTANCE_ID)?;
                    return Ok(EventKind::InstanceRunning { instance_id });
                }
                "terminated" => {
                    let instance_id = required(EC2_SOURCE, detail.instance_id, INSTANCE_ID)?;
                    return Ok(EventKind::InstanceTerminated { instance_id });
                }
                _ => {}
            }
        }
        Some(LAMBDA_SOURCE) => {
            let detail: CloudTrailDetail = detail(LAMBDA_SOURCE, &raw.detail)?;
            let event_name = required(LAMBDA_SOURCE, detail.event_name, "detail.eventName")?;
            match event_name.as_str() {
                LAMBDA_TAG_EVENT => {
                    let params: LambdaTagParameters =
                        parameters(LAMBDA_SOURCE, detail.request_parameters)?;
                    return Ok(EventKind::FunctionTagged {
                        resource_arn: params.resource,
                        tags: params.tags,
                    });
                }
                LAMBDA_DELETE_EVENT => {
                    let params: LambdaDeleteParameters =
                        parameters(LAMBDA_SOURCE, detail.request_parameters)?;
                    return Ok(EventKind::FunctionDeleted {
                        function_name: params.function_name,
                    });
                }
                _ => {}
            }
        }
        Some(RDS_SOURCE) => {
            let trail: CloudTrailDetail = detail(RDS_SOURCE, &raw.detail)?;
            if trail.event_name.as_deref() == Some(RDS_TAG_EVENT) {
                let params: RdsTagParameters = parameters(RDS_SOURCE, trail.request_parameters)?;
                return Ok(EventKind::DatabaseTagged {
                    resource_name: params.resource_name,
                    tags: params.tags,
                });
            }

            let notification: RdsEventDetail = detail(RDS_SOURCE, &raw.detail)?;
            if notification
                .event_categories
                .iter()
                .any(|category| category == RDS_DELETION_CATEGORY)
            {
                return Ok(EventKind::DatabaseDeleted {
                    source_arn: required(RDS_SOURCE, notification.source_arn, "detail.SourceArn")?,
                });
            }
        }
        _ => {}
    }

    if raw.action.as_deref() == Some(SCAN_ACTION) {
        return Ok(EventKind::Scan);
    }

    Ok(EventKind::Unrecognized)
}

fn detail<T: DeserializeOwned>(origin: &str, detail: &Value) -> Result<T> {
    if !detail.is_object() {
        return Err(Error::malformed(origin, "detail is not an object"));
    }
    T::deserialize(detail).map_err(|e| Error::malformed(origin, format!("detail: {}", e)))
}

fn parameters<T: DeserializeOwned>(origin: &str, parameters: Value) -> Result<T> {
    if !parameters.is_object() {
        return Err(Error::malformed(origin, "detail.requestParameters is not an object"));
    }
    serde_json::from_value(parameters)
        .map_err(|e| Error::malformed(origin, format!("detail.requestParameters: {}", e)))
}

fn required(origin: &str, value: Option<String>, field: &str) -> Result<String> {
    value.ok_or_else(|| Error::malformed(origin, format!("missing {}", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> InboundEvent {
        InboundEvent::decode(value).unwrap()
    }

    #[test]
    fn test_ec2_state_changes() {
        let event = decode(json!({
            "source": "aws.ec2",
            "account": "111111111111",
            "region": "us-east-1",
            "detail": {"state": "running", "instance-id": "i-123"}
        }));
        assert_eq!(
            event.kind,
            EventKind::InstanceRunning {
                instance_id: "i-123".to_string()
            }
        );
        assert_eq!(event.region.as_deref(), Some("us-east-1"));

        let event = decode(json!({
            "source": "aws.ec2",
            "detail": {"state": "terminated", "instance-id": "i-123"}
        }));
        assert_eq!(event.kind.name(), "instance_terminated");

        let event = decode(json!({
            "source": "aws.ec2",
            "detail": {"state": "stopped", "instance-id": "i-123"}
        }));
        assert_eq!(event.kind, EventKind::Unrecognized);
    }

    #[test]
    fn test_ec2_missing_fields() {
        let err = InboundEvent::decode(json!({
            "source": "aws.ec2",
            "detail": {"state": "running"}
        }))
        .unwrap_err();
        assert_eq!(err.code(), "MalformedEvent");

        let err = InboundEvent::decode(json!({"source": "aws.ec2"})).unwrap_err();
        assert_eq!(err.code(), "MalformedEvent");
    }

    #[test]
    fn test_lambda_events() {
        let event = decode(json!({
            "source": "aws.lambda",
            "detail": {
                "eventName": "TagResource20170331v2",
                "requestParameters": {
                    "resource": "arn:aws:lambda:us-east-1:111111111111:function:orders-api",
                    "tags": {
                        "Create_Auto_Alarms": "",
                        "notify": "arn:aws:sns:us-east-1:111111111111:ops"
                    }
                }
            }
        }));
        match &event.kind {
            EventKind::FunctionTagged { tags, .. } => assert_eq!(tags.len(), 2),
            other => panic!("unexpected kind: {other:?}"),
        }
        assert_eq!(event.function_name(), Some("orders-api"));

        let event = decode(json!({
            "source": "aws.lambda",
            "detail": {
                "eventName": "DeleteFunction20150331",
                "requestParameters": {"functionName": "orders-api"}
            }
        }));
        assert_eq!(event.function_name(), Some("orders-api"));

        let event = decode(json!({
            "source": "aws.lambda",
            "detail": {"eventName": "UntagResource20170331v2", "requestParameters": {}}
        }));
        assert_eq!(event.kind, EventKind::Unrecognized);
    }

    #[test]
    fn test_rds_events() {
        let event = decode(json!({
            "source": "aws.rds",
            "detail": {
                "eventName": "AddTagsToResource",
                "requestParameters": {
                    "resourceName": "arn:aws:rds:us-east-1:111111111111:cluster:orders",
                    "tags": [
                        {"key": "Create_Auto_Alarms", "value": ""},
                        {"key": "notify", "value": "arn"}
                    ]
                }
            }
        }));
        match event.kind {
            EventKind::DatabaseTagged { resource_name, tags } => {
                assert!(resource_name.ends_with("cluster:orders"));
                assert_eq!(tags[1], Tag::new("notify", "arn"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        let event = decode(json!({
            "source": "aws.rds",
            "detail": {
                "SourceArn": "arn:aws:rds:us-east-1:111111111111:db:mydb-1",
                "EventCategories": ["deletion"]
            }
        }));
        assert_eq!(
            event.kind,
            EventKind::DatabaseDeleted {
                source_arn: "arn:aws:rds:us-east-1:111111111111:db:mydb-1".to_string()
            }
        );

        let event = decode(json!({
            "source": "aws.rds",
            "detail": {"EventCategories": ["backup"], "SourceArn": "arn:aws:rds:us-east-1:1:db:x"}
        }));
        assert_eq!(event.kind, EventKind::Unrecognized);
    }

    #[test]
    fn test_scan_and_unrecognized() {
        assert_eq!(decode(json!({"action": "scan"})).kind, EventKind::Scan);
        assert_eq!(
            decode(json!({"source": "aws.s3", "detail": {}})).kind,
            EventKind::Unrecognized
        );
        assert_eq!(decode(json!({})).kind, EventKind::Unrecognized);

        let err = InboundEvent::decode(json!(["not", "an", "event"])).unwrap_err();
        assert_eq!(err.code(), "MalformedEvent");
    }

    #[test]
    fn test_positional_payloads_rejected() {
        let err = InboundEvent::decode(json!([
            "aws.ec2",
            "us-east-1",
            "111111111111",
            null,
            {"state": "terminated", "instance-id": "i-1"}
        ]))
        .unwrap_err();
        assert_eq!(err.code(), "MalformedEvent");

        let err = InboundEvent::decode(json!({
            "source": "aws.lambda",
            "detail": {
                "eventName": "DeleteFunction20150331",
                "requestParameters": ["orders-api"]
            }
        }))
        .unwrap_err();
        assert_eq!(err.code(), "MalformedEvent");
    }

    #[test]
    fn test_tag_events_require_tags() {
        let err = InboundEvent::decode(json!({
            "source": "aws.lambda",
            "detail": {
                "eventName": "TagResource20170331v2",
                "requestParameters": {
                    "resource": "arn:aws:lambda:us-east-1:111111111111:function:orders-api"
                }
            }
        }))
        .unwrap_err();
        assert_eq!(err.code(), "MalformedEvent");

        let err = InboundEvent::decode(json!({
            "source": "aws.rds",
            "detail": {
                "eventName": "AddTagsToResource",
                "requestParameters": {"resourceName": "arn:aws:rds:us-east-1:1:db:x"}
            }
        }))
        .unwrap_err();
        assert_eq!(err.code(), "MalformedEvent");
    }

    #[test]
    fn test_first_match_wins() {
        // A service event that matches no branch still honours a scan action.
        let event = decode(json!({
            "source": "aws.ec2",
            "action": "scan",
            "detail": {"state": "pending", "instance-id": "i-123"}
        }));
        assert_eq!(event.kind, EventKind::Scan);

        let event = decode(json!({
            "source": "aws.ec2",
            "action": "scan",
            "detail": {"state": "running", "instance-id": "i-123"}
        }));
        assert_eq!(event.kind.name(), "instance_running");
    }
}
