use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Identity returned by the remote auth API. Tokens are opaque here; the
/// transport owns refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../web/src/bindings/")]
pub struct RemoteSession {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../web/src/bindings/")]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub tutorial_seen: bool,
    #[ts(type = "number")]
    pub last_active_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../web/src/bindings/")]
pub struct Household {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub currency: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub created_at: i64,
}

/// Default display name: the local part of the account email, padded to
/// three characters when shorter.
pub fn derive_display_name(email: &str) -> String {
    let mut name = email.split('@').next().unwrap_or("").to_string();
    while name.chars().count() < 3 {
        name.push('_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_email_local_part() {
        assert_eq!(derive_display_name("paula@example.com"), "paula");
    }

    #[test]
    fn short_local_parts_are_padded() {
        assert_eq!(derive_display_name("jo@example.com"), "jo_");
        assert_eq!(derive_display_name("@example.com"), "___");
    }

    #[test]
    fn household_tolerates_missing_optional_fields() {
        let hh: Household =
            serde_json::from_str(r#"{"id":"h1","name":"Home"}"#).expect("parse household");
        assert_eq!(hh.currency, None);
        assert_eq!(hh.created_at, 0);
    }
}
