//! Presence uids, media-transport ids, and the table that correlates them.
//!
//! The media transport names its users with its own identifiers. Those
//! identifiers embed the first [`MEDIA_UID_PREFIX_LEN`] characters of the
//! presence uid, followed by `-` and transport-specific data. This module is
//! the only place that knows that convention.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Number of uid characters embedded in a media-transport id.
pub const MEDIA_UID_PREFIX_LEN: usize = 8;

/// Separator between the uid prefix and the transport's own suffix.
pub const MEDIA_ID_SEPARATOR: char = '-';

/// Stable identity of a presence occupant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Uid(pub String);

impl Uid {
    /// Creates a uid from anything string-like.
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// The leading characters the media transport embeds.
    pub fn media_prefix(&self) -> &str {
        match self.0.char_indices().nth(MEDIA_UID_PREFIX_LEN) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the media transport uses for a remote user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(pub String);

impl MediaId {
    /// Creates a media id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The uid prefix embedded in this id, if it follows the convention.
    pub fn uid_prefix(&self) -> Option<&str> {
        let (prefix, _) = self.0.split_once(MEDIA_ID_SEPARATOR)?;
        (!prefix.is_empty()).then_some(prefix)
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// MediaIdentityTable
// ---------------------------------------------------------------------------

/// Bidirectional uid <-> media id mapping.
///
/// Media ids announced before their uid is known are parked and bound as
/// soon as a matching uid shows up.
#[derive(Debug, Default)]
pub struct MediaIdentityTable {
    by_uid: FxHashMap<Uid, MediaId>,
    by_media: FxHashMap<MediaId, Uid>,
    pending: FxHashSet<MediaId>,
}

impl MediaIdentityTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlates a newly announced media id against `known` uids.
    ///
    /// Returns the uid it was bound to. Ids with no match are parked; ids
    /// matching more than one uid are refused.
    pub fn announce<'a>(
        &mut self,
        media: MediaId,
        known: impl IntoIterator<Item = &'a Uid>,
    ) -> Option<Uid> {
        let Some(prefix) = media.uid_prefix() else {
            warn!(%media, "media id does not embed a uid prefix");
            return None;
        };
        let found: Vec<&Uid> = known
            .into_iter()
            .filter(|uid| uid.media_prefix() == prefix)
            .take(2)
            .collect();
        match found.as_slice() {
            [uid] => {
                let uid = (*uid).clone();
                self.bind(uid.clone(), media);
                Some(uid)
            }
            [] => {
                debug!(%media, "no uid for media id yet, parking");
                self.pending.insert(media);
                None
            }
            _ => {
                warn!(%media, "media id prefix matches several uids, refusing");
                None
            }
        }
    }

    /// Binds any parked media id that belongs to `uid`.
    pub fn resolve_pending(&mut self, uid: &Uid) -> Option<MediaId> {
        let media = self
            .pending
            .iter()
            .find(|media| media.uid_prefix() == Some(uid.media_prefix()))
            .cloned()?;
        self.pending.remove(&media);
        self.bind(uid.clone(), media.clone());
        Some(media)
    }

    /// Records an explicit mapping, replacing any previous one for `uid`.
    pub fn bind(&mut self, uid: Uid, media: MediaId) {
        if let Some(old) = self.by_uid.insert(uid.clone(), media.clone()) {
            self.by_media.remove(&old);
        }
        self.by_media.insert(media, uid);
    }

    /// Media id for a uid.
    pub fn media_for(&self, uid: &Uid) -> Option<&MediaId> {
        self.by_uid.get(uid)
    }

    /// Uid for a media id.
    pub fn uid_for(&self, media: &MediaId) -> Option<&Uid> {
        self.by_media.get(media)
    }

    /// Drops the mapping for a departed uid.
    pub fn forget(&mut self, uid: &Uid) {
        if let Some(media) = self.by_uid.remove(uid) {
            self.by_media.remove(&media);
        }
    }
}
