//! JSON message types for the event stream.
//!
//! Events use an adjacently tagged envelope: `{"event": "...", "payload":
//! {...}}`. Event names are namespaced slash-style (`control/host`,
//! `member/created`) to match the client catalogue.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::control::MemberProfile;

/// Host occupancy snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlHost {
    pub has_host: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
}

impl From<Option<String>> for ControlHost {
    fn from(host_id: Option<String>) -> Self {
        Self {
            has_host: host_id.is_some(),
            host_id,
        }
    }
}

/// A member record as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberData {
    pub id: String,
    #[serde(flatten)]
    pub profile: MemberProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardData {
    pub text: String,
}

/// First message on every event stream: who you are and the room state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInit {
    pub member_id: String,
    pub control_host: ControlHost,
    pub members: HashMap<String, MemberProfile>,
}

/// Server -> client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "system/init")]
    SystemInit(SystemInit),
    #[serde(rename = "system/error")]
    SystemError { message: String },
    #[serde(rename = "control/host")]
    ControlHost(ControlHost),
    #[serde(rename = "member/created")]
    MemberCreated(MemberData),
    #[serde(rename = "member/updated")]
    MemberUpdated(MemberData),
    #[serde(rename = "member/removed")]
    MemberRemoved { id: String },
}

/// Client -> server requests accepted on the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ClientRequest {
    #[serde(rename = "clipboard/set")]
    ClipboardSet(ClipboardData),
    #[serde(rename = "control/request")]
    ControlRequest,
    #[serde(rename = "control/release")]
    ControlRelease,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_host_from_occupant() {
        let vacant = ControlHost::from(None);
        assert!(!vacant.has_host);
        assert!(vacant.host_id.is_none());

        let seated = ControlHost::from(Some("a".to_string()));
        assert!(seated.has_host);
        assert_eq!(seated.host_id.as_deref(), Some("a"));
    }

    #[test]
    fn control_host_event_wire_shape() {
        let event = ServerEvent::ControlHost(ControlHost::from(Some("a".to_string())));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "control/host");
        assert_eq!(json["payload"]["has_host"], true);
        assert_eq!(json["payload"]["host_id"], "a");
    }

    #[test]
    fn vacant_host_omits_id() {
        let json = serde_json::to_value(ControlHost::from(None)).unwrap();
        assert!(json.get("host_id").is_none());
    }

    #[test]
    fn member_data_flattens_profile() {
        let data = MemberData {
            id: "a".into(),
            profile: MemberProfile::named("Alice"),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["can_watch"], true);
    }

    #[test]
    fn client_request_round_trip() {
        let set: ClientRequest =
            serde_json::from_str(r#"{"event":"clipboard/set","payload":{"text":"hi"}}"#).unwrap();
        assert_eq!(
            set,
            ClientRequest::ClipboardSet(ClipboardData { text: "hi".into() })
        );

        let request: ClientRequest =
            serde_json::from_str(r#"{"event":"control/request"}"#).unwrap();
        assert_eq!(request, ClientRequest::ControlRequest);

        let release: ClientRequest =
            serde_json::from_str(r#"{"event":"control/release"}"#).unwrap();
        assert_eq!(release, ClientRequest::ControlRelease);
    }

    #[test]
    fn member_removed_event_shape() {
        let event = ServerEvent::MemberRemoved { id: "gone".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "member/removed");
        assert_eq!(json["payload"]["id"], "gone");
    }
}
