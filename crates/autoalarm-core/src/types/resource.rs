//! Tags, resources and accounts exchanged with the collaborators

use serde::{Deserialize, Serialize};

/// A resource tag.
///
/// EC2 reports tags as `Key`/`Value` while RDS API events use `key`/`value`,
/// so both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Key", alias = "key")]
    pub key: String,
    #[serde(rename = "Value", alias = "value", default)]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Value of the first tag named `key`
pub fn find_tag<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.key == key)
        .map(|tag| tag.value.as_str())
}

/// A resource found carrying the alarm tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub resource_id: String,
    #[serde(default, rename = "Tags", alias = "tags")]
    pub tags: Vec<Tag>,
    /// Operating system reported for instances, e.g. "Linux/UNIX"
    #[serde(default)]
    pub platform: Option<String>,
}

impl ResourceInfo {
    pub fn tag(&self, key: &str) -> Option<&str> {
        find_tag(&self.tags, key)
    }
}

/// An active member account of an organizational unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "AccountId")]
    pub account_id: String,
    #[serde(rename = "AccountName")]
    pub account_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_spellings() {
        let ec2: Tag = serde_json::from_str(r#"{"Key": "notify", "Value": "arn"}"#).unwrap();
        let rds: Tag = serde_json::from_str(r#"{"key": "notify", "value": "arn"}"#).unwrap();
        assert_eq!(ec2, rds);
    }

    #[test]
    fn test_find_tag_first_match() {
        let tags = vec![
            Tag::new("Name", "web"),
            Tag::new("notify", "first"),
            Tag::new("notify", "second"),
        ];
        assert_eq!(find_tag(&tags, "notify"), Some("first"));
        assert_eq!(find_tag(&tags, "missing"), None);
    }
}
