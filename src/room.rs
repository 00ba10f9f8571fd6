use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::capture::{CaptureError, CaptureManager};
use crate::clipboard::{Clipboard, ClipboardError};
use crate::control::{self, Capability, Denied, HostSlot, MemberProfile};
use crate::member::MemberRegistry;

#[derive(Error, Debug)]
pub enum RoomError {
    #[error("unknown member: {0}")]
    UnknownMember(String),

    #[error(transparent)]
    Denied(#[from] Denied),

    #[error("control is held by {host}")]
    ControlBusy { host: String },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

/// The shared surface and everything attached to it: the member registry,
/// the host slot, the capture manager, and the clipboard collaborator.
///
/// Every privileged operation follows the same shape: resolve the acting
/// member, run the authorization guard, and only then invoke the effect.
/// Denials are surfaced verbatim -- no retry, no fallback, no privilege
/// escalation.
#[derive(Clone)]
pub struct Room {
    members: MemberRegistry,
    host: HostSlot,
    capture: CaptureManager,
    clipboard: Arc<dyn Clipboard>,
}

impl Room {
    pub fn new(
        members: MemberRegistry,
        host: HostSlot,
        capture: CaptureManager,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            members,
            host,
            capture,
            clipboard,
        }
    }

    pub fn members(&self) -> &MemberRegistry {
        &self.members
    }

    pub fn host(&self) -> &HostSlot {
        &self.host
    }

    pub fn capture(&self) -> &CaptureManager {
        &self.capture
    }

    /// Resolve the acting member and run the authorization guard. Exposed so
    /// request handlers can gate actions that have no dedicated adapter
    /// (e.g. member administration).
    pub fn authorize(
        &self,
        member_id: &str,
        required: Capability,
        require_host: bool,
    ) -> Result<MemberProfile, RoomError> {
        let profile = self
            .members
            .get(member_id)
            .ok_or_else(|| RoomError::UnknownMember(member_id.to_string()))?;
        control::authorize(&profile, member_id, &self.host, required, require_host)?;
        Ok(profile)
    }

    /// Fetch the latest frame of the shared surface. Watching is not an
    /// exclusive-control action, so no host requirement.
    pub async fn screenshot(&self, member_id: &str) -> Result<Bytes, RoomError> {
        self.authorize(member_id, Capability::Watch, false)?;
        Ok(self.capture.fetch_frame().await?)
    }

    /// Write to the shared clipboard. Requires the clipboard flag and the
    /// host seat, like any other action that reaches into the surface.
    pub fn set_clipboard(&self, member_id: &str, text: String) -> Result<(), RoomError> {
        self.authorize(member_id, Capability::Clipboard, true)?;
        tracing::debug!(member = %member_id, "clipboard set");
        Ok(self.clipboard.set_text(text)?)
    }

    /// Read the shared clipboard. Same gate as writing.
    pub fn clipboard_text(&self, member_id: &str) -> Result<String, RoomError> {
        self.authorize(member_id, Capability::Clipboard, true)?;
        Ok(self.clipboard.text()?)
    }

    /// Take the host seat. First-come while the slot is vacant; an admin
    /// may displace the sitting host.
    pub fn request_control(&self, member_id: &str) -> Result<(), RoomError> {
        let profile = self.authorize(member_id, Capability::Host, false)?;
        self.host
            .try_claim(member_id, profile.is_admin)
            .map_err(|host| RoomError::ControlBusy { host })?;
        tracing::info!(member = %member_id, "host control taken");
        Ok(())
    }

    /// Give up the host seat. Only the sitting host may release it; an
    /// admin may force-release on someone else's behalf.
    pub fn release_control(&self, member_id: &str) -> Result<(), RoomError> {
        let profile = self.authorize(member_id, Capability::Host, false)?;
        if profile.is_admin {
            self.host.clear();
        } else if self.host.is_host(member_id) {
            self.host.clear_if(member_id);
        } else {
            return Err(Denied::NotHost.into());
        }
        tracing::info!(member = %member_id, "host control released");
        Ok(())
    }

    /// Remove a member, vacating the host slot if they held it.
    pub fn remove_member(&self, member_id: &str) -> Option<MemberProfile> {
        let removed = self.members.remove(member_id);
        if removed.is_some() {
            self.host.clear_if(member_id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, CommandSourceFactory};
    use crate::clipboard::MemoryClipboard;
    use std::time::Duration;

    fn test_room(pipeline: &str) -> Room {
        let capture = CaptureManager::new(
            CaptureConfig {
                enabled: true,
                pipeline: pipeline.into(),
                start_timeout: Duration::from_secs(5),
                idle_interval: Duration::from_secs(60),
            },
            Arc::new(CommandSourceFactory),
        );
        Room::new(
            MemberRegistry::new(),
            HostSlot::new(),
            capture,
            Arc::new(MemoryClipboard::new()),
        )
    }

    fn add_member(room: &Room, id: &str, mutate: impl FnOnce(&mut MemberProfile)) {
        let mut profile = MemberProfile::named(id);
        mutate(&mut profile);
        room.members()
            .create(Some(id.to_string()), profile)
            .unwrap();
    }

    #[tokio::test]
    async fn clipboard_requires_flag_before_host() {
        let room = test_room("printf 'x'");
        add_member(&room, "a", |p| p.can_access_clipboard = false);
        room.host().set("a");

        // Host, but the flag is revoked: capability denial.
        let err = room.set_clipboard("a", "text".into()).unwrap_err();
        assert!(matches!(
            err,
            RoomError::Denied(Denied::MissingCapability(Capability::Clipboard))
        ));

        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn clipboard_requires_host_seat() {
        let room = test_room("printf 'x'");
        add_member(&room, "a", |_| {});
        // Flag set, but someone else is host.
        room.host().set("b");

        let err = room.set_clipboard("a", "text".into()).unwrap_err();
        assert!(matches!(err, RoomError::Denied(Denied::NotHost)));

        // Denial never reaches the effect.
        room.host().set("a");
        assert_eq!(room.clipboard_text("a").unwrap(), "");

        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn clipboard_round_trip_as_host() {
        let room = test_room("printf 'x'");
        add_member(&room, "a", |_| {});
        room.host().set("a");

        room.set_clipboard("a", "copied".into()).unwrap();
        assert_eq!(room.clipboard_text("a").unwrap(), "copied");

        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn screenshot_requires_watch() {
        let room = test_room("printf 'shot'");
        add_member(&room, "viewer", |_| {});
        add_member(&room, "blind", |p| p.can_watch = false);

        let err = room.screenshot("blind").await.unwrap_err();
        assert!(matches!(
            err,
            RoomError::Denied(Denied::MissingCapability(Capability::Watch))
        ));

        let bytes = room.screenshot("viewer").await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"shot"));

        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn unknown_member_is_rejected() {
        let room = test_room("printf 'x'");
        let err = room.screenshot("ghost").await.unwrap_err();
        assert!(matches!(err, RoomError::UnknownMember(_)));
        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn control_is_first_come() {
        let room = test_room("printf 'x'");
        add_member(&room, "a", |_| {});
        add_member(&room, "b", |_| {});

        room.request_control("a").unwrap();
        assert!(room.host().is_host("a"));

        let err = room.request_control("b").unwrap_err();
        assert!(matches!(err, RoomError::ControlBusy { ref host } if host == "a"));

        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn admin_can_seize_control() {
        let room = test_room("printf 'x'");
        add_member(&room, "a", |_| {});
        add_member(&room, "root", |p| p.is_admin = true);

        room.request_control("a").unwrap();
        room.request_control("root").unwrap();
        assert!(room.host().is_host("root"));

        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn control_requires_host_capability() {
        let room = test_room("printf 'x'");
        add_member(&room, "a", |p| p.can_host = false);

        let err = room.request_control("a").unwrap_err();
        assert!(matches!(
            err,
            RoomError::Denied(Denied::MissingCapability(Capability::Host))
        ));

        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn release_only_by_host_or_admin() {
        let room = test_room("printf 'x'");
        add_member(&room, "a", |_| {});
        add_member(&room, "b", |_| {});
        add_member(&room, "root", |p| p.is_admin = true);

        room.request_control("a").unwrap();

        let err = room.release_control("b").unwrap_err();
        assert!(matches!(err, RoomError::Denied(Denied::NotHost)));
        assert!(room.host().is_host("a"));

        room.release_control("a").unwrap();
        assert!(!room.host().has_host());

        room.request_control("a").unwrap();
        room.release_control("root").unwrap();
        assert!(!room.host().has_host());

        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn removing_the_host_vacates_the_slot() {
        let room = test_room("printf 'x'");
        add_member(&room, "a", |_| {});
        room.request_control("a").unwrap();

        assert!(room.remove_member("a").is_some());
        assert!(!room.host().has_host());
        assert!(room.members().get("a").is_none());

        room.capture().shutdown().await;
    }

    #[tokio::test]
    async fn removing_a_non_host_keeps_the_slot() {
        let room = test_room("printf 'x'");
        add_member(&room, "a", |_| {});
        add_member(&room, "b", |_| {});
        room.request_control("a").unwrap();

        room.remove_member("b");
        assert!(room.host().is_host("a"));

        room.capture().shutdown().await;
    }
}
