use serde::{Deserialize, Serialize};

/// A named permission a member may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Admin,
    Login,
    Connect,
    Watch,
    Host,
    Clipboard,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::Admin => "admin",
            Capability::Login => "login",
            Capability::Connect => "connect",
            Capability::Watch => "watch",
            Capability::Host => "host",
            Capability::Clipboard => "clipboard",
        };
        f.write_str(name)
    }
}

/// What one member may do, plus their display name.
///
/// The flag set has a fixed shape; updates go through the member registry
/// and replace the whole profile, never individual flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberProfile {
    pub name: String,
    pub is_admin: bool,
    pub can_login: bool,
    pub can_connect: bool,
    pub can_watch: bool,
    pub can_host: bool,
    pub can_access_clipboard: bool,
}

impl Default for MemberProfile {
    /// Provisioning defaults: everything allowed except administration.
    fn default() -> Self {
        Self {
            name: String::new(),
            is_admin: false,
            can_login: true,
            can_connect: true,
            can_watch: true,
            can_host: true,
            can_access_clipboard: true,
        }
    }
}

impl MemberProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Pure capability lookup.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Admin => self.is_admin,
            Capability::Login => self.can_login,
            Capability::Connect => self.can_connect,
            Capability::Watch => self.can_watch,
            Capability::Host => self.can_host,
            Capability::Clipboard => self.can_access_clipboard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_everything_but_admin() {
        let profile = MemberProfile::default();
        assert!(!profile.has(Capability::Admin));
        assert!(profile.has(Capability::Login));
        assert!(profile.has(Capability::Connect));
        assert!(profile.has(Capability::Watch));
        assert!(profile.has(Capability::Host));
        assert!(profile.has(Capability::Clipboard));
    }

    #[test]
    fn has_reads_each_flag() {
        let profile = MemberProfile {
            name: "spectator".into(),
            is_admin: false,
            can_login: true,
            can_connect: true,
            can_watch: true,
            can_host: false,
            can_access_clipboard: false,
        };
        assert!(profile.has(Capability::Watch));
        assert!(!profile.has(Capability::Host));
        assert!(!profile.has(Capability::Clipboard));
    }

    #[test]
    fn serde_uses_snake_case_flags() {
        let profile = MemberProfile::named("alice");
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["name"], "alice");
        assert_eq!(json["is_admin"], false);
        assert_eq!(json["can_access_clipboard"], true);

        let back: MemberProfile = serde_json::from_value(json).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn partial_payload_fills_provisioning_defaults() {
        let profile: MemberProfile =
            serde_json::from_str(r#"{"name":"carol","can_host":false}"#).unwrap();
        assert_eq!(profile.name, "carol");
        assert!(!profile.can_host);
        assert!(profile.can_watch);
        assert!(!profile.is_admin);
    }

    #[test]
    fn capability_display() {
        assert_eq!(Capability::Clipboard.to_string(), "clipboard");
        assert_eq!(Capability::Host.to_string(), "host");
    }
}
