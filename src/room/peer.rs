//! Remote participants as reported by the SDK.

use std::collections::BTreeMap;

use crate::{PeerId, TrackId};

/// A remote participant. Supplied by the SDK; the engine only stores
/// copies for the UI to render and never edits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerView {
    /// SDK-assigned peer id.
    pub peer_id: PeerId,
    /// Name the peer chose, if any.
    pub display_name: Option<String>,
    /// Avatar the peer chose, if any.
    pub avatar_url: Option<String>,
    /// Remote camera track, when the peer is sending video.
    pub cam_track: Option<TrackId>,
    /// Remote microphone track, when the peer is sending audio.
    pub mic_track: Option<TrackId>,
}

impl PeerView {
    /// A peer with no name, avatar or tracks yet.
    pub fn new(peer_id: impl Into<PeerId>) -> Self {
        Self {
            peer_id: peer_id.into(),
            display_name: None,
            avatar_url: None,
            cam_track: None,
            mic_track: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the avatar URL.
    #[must_use]
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Sets the camera track.
    #[must_use]
    pub fn with_cam_track(mut self, track: impl Into<TrackId>) -> Self {
        self.cam_track = Some(track.into());
        self
    }

    /// Sets the microphone track.
    #[must_use]
    pub fn with_mic_track(mut self, track: impl Into<TrackId>) -> Self {
        self.mic_track = Some(track.into());
        self
    }
}

/// The set of peers currently in the room, ordered by peer id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerRoster {
    peers: BTreeMap<PeerId, PeerView>,
}

impl PeerRoster {
    /// An empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a peer.
    pub fn upsert(&mut self, peer: PeerView) {
        self.peers.insert(peer.peer_id.clone(), peer);
    }

    /// Removes a peer, returning its last known view.
    pub fn remove(&mut self, peer_id: &PeerId) -> Option<PeerView> {
        self.peers.remove(peer_id)
    }

    /// Looks up a peer.
    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerView> {
        self.peers.get(peer_id)
    }

    /// Iterates peers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerView> {
        self.peers.values()
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns `true` when nobody else is here.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Forgets every peer.
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces() {
        let mut roster = PeerRoster::new();
        roster.upsert(PeerView::new("p1"));
        roster.upsert(PeerView::new("p1").with_cam_track("t-cam"));

        assert_eq!(roster.len(), 1);
        let peer = roster.get(&PeerId::new("p1")).unwrap();
        assert_eq!(peer.cam_track.as_ref().map(TrackId::as_str), Some("t-cam"));
    }

    #[test]
    fn test_remove_returns_peer() {
        let mut roster = PeerRoster::new();
        roster.upsert(PeerView::new("p1").with_display_name("Grace"));

        let removed = roster.remove(&PeerId::new("p1")).unwrap();
        assert_eq!(removed.display_name.as_deref(), Some("Grace"));
        assert!(roster.is_empty());
        assert!(roster.remove(&PeerId::new("p1")).is_none());
    }

    #[test]
    fn test_builder_sets_every_field() {
        let peer = PeerView::new("p1")
            .with_display_name("Ada")
            .with_avatar_url("https://example.com/ada.png")
            .with_cam_track("t-cam")
            .with_mic_track("t-mic");

        assert_eq!(peer.display_name.as_deref(), Some("Ada"));
        assert_eq!(peer.avatar_url.as_deref(), Some("https://example.com/ada.png"));
        assert_eq!(peer.mic_track.as_ref().map(TrackId::as_str), Some("t-mic"));
    }

    #[test]
    fn test_iter_is_ordered() {
        let mut roster = PeerRoster::new();
        roster.upsert(PeerView::new("b"));
        roster.upsert(PeerView::new("a"));

        let ids: Vec<_> = roster.iter().map(|p| p.peer_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
