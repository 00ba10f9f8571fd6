use thiserror::Error;

use super::host::HostSlot;
use super::profile::{Capability, MemberProfile};

/// Why a privileged action was refused. The two causes stay distinct so the
/// surrounding adapter can render an accurate message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denied {
    #[error("missing capability: {0}")]
    MissingCapability(Capability),

    #[error("not the current host")]
    NotHost,
}

/// Decide whether a member may perform a privileged action.
///
/// Stateless: reads the profile and the host slot, mutates nothing. The
/// capability check runs first, so a host with a revoked flag is reported as
/// a capability denial rather than a host one.
pub fn authorize(
    profile: &MemberProfile,
    member_id: &str,
    host: &HostSlot,
    required: Capability,
    require_host: bool,
) -> Result<(), Denied> {
    if !profile.has(required) {
        return Err(Denied::MissingCapability(required));
    }
    if require_host && !host.is_host(member_id) {
        return Err(Denied::NotHost);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(can_access_clipboard: bool) -> MemberProfile {
        MemberProfile {
            can_access_clipboard,
            ..MemberProfile::named("m")
        }
    }

    #[test]
    fn allows_when_flag_set_and_host_not_required() {
        let host = HostSlot::new();
        let p = profile(true);
        assert!(authorize(&p, "a", &host, Capability::Clipboard, false).is_ok());
    }

    #[test]
    fn denies_missing_capability_regardless_of_host() {
        let host = HostSlot::new();
        host.set("a");
        let p = profile(false);
        assert_eq!(
            authorize(&p, "a", &host, Capability::Clipboard, true),
            Err(Denied::MissingCapability(Capability::Clipboard)),
        );
    }

    #[test]
    fn denies_not_host_regardless_of_flags() {
        let host = HostSlot::new();
        host.set("someone-else");
        let p = profile(true);
        assert_eq!(
            authorize(&p, "a", &host, Capability::Clipboard, true),
            Err(Denied::NotHost),
        );
    }

    #[test]
    fn denies_not_host_when_slot_vacant() {
        let host = HostSlot::new();
        let p = profile(true);
        assert_eq!(
            authorize(&p, "a", &host, Capability::Clipboard, true),
            Err(Denied::NotHost),
        );
    }

    #[test]
    fn allows_when_both_hold() {
        let host = HostSlot::new();
        host.set("a");
        let p = profile(true);
        assert!(authorize(&p, "a", &host, Capability::Clipboard, true).is_ok());
    }

    #[test]
    fn capability_denial_wins_when_both_fail() {
        let host = HostSlot::new();
        let p = profile(false);
        assert_eq!(
            authorize(&p, "a", &host, Capability::Clipboard, true),
            Err(Denied::MissingCapability(Capability::Clipboard)),
        );
    }
}
