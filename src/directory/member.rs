//! Member records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Member {
    pub uid: String,

    #[serde(rename = "cn")]
    pub full_name: String,

    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub on_floor: bool,

    /// Remaining raw attributes (phone numbers, drink balance, ...).
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_on_floor(&self) -> bool {
        self.on_floor
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Attribute value, with `uid` and `cn` addressable too.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "uid" => Some(&self.uid),
            "cn" => Some(&self.full_name),
            _ => self.fields.get(name).map(String::as_str),
        }
    }

    /// Drink credit balance, if recorded.
    pub fn credit_balance(&self) -> Option<i64> {
        self.fields.get("drink_balance")?.trim().parse().ok()
    }
}

/// Welcome text read back to a recognised caller.
pub fn greeting(member: &Member) -> String {
    let activity = if member.is_active() { "active" } else { "inactive" };
    let floor = if member.is_on_floor() { "on floor" } else { "off floor" };
    let credits = member
        .credit_balance()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "0".to_string());

    format!(
        "Hello {}! According to my records, you are currently an {}, {} member, with {} drink credits.",
        member.full_name(),
        activity,
        floor,
        credits
    )
}
