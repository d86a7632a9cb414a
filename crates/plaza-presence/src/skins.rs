//! Avatar skins for video placeholders.
//!
//! When a remote user's camera is off the video UI shows their avatar
//! instead. Skins are not part of movement updates, so they are fetched with
//! a query/response pair and cached here.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::identity::Uid;
use crate::messages::OutboundMessage;

/// What to do after a skin lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum SkinLookup {
    /// The skin is cached.
    Known(String),
    /// A query must be sent.
    Query(OutboundMessage),
    /// A query is already outstanding.
    Waiting,
}

/// Local skin plus a cache of remote skins.
#[derive(Debug)]
pub struct SkinDirectory {
    local_uid: Uid,
    local_skin: String,
    known: FxHashMap<Uid, String>,
    outstanding: FxHashSet<Uid>,
}

impl SkinDirectory {
    /// Creates a directory for the local player.
    pub fn new(local_uid: Uid, local_skin: impl Into<String>) -> Self {
        Self {
            local_uid,
            local_skin: local_skin.into(),
            known: FxHashMap::default(),
            outstanding: FxHashSet::default(),
        }
    }

    /// The local player's skin.
    pub fn local_skin(&self) -> &str {
        &self.local_skin
    }

    /// Cached skin for `uid`.
    pub fn get(&self, uid: &Uid) -> Option<&str> {
        if uid == &self.local_uid {
            return Some(&self.local_skin);
        }
        self.known.get(uid).map(String::as_str)
    }

    /// Looks up `uid`, issuing at most one outstanding query per uid.
    pub fn lookup(&mut self, uid: &Uid) -> SkinLookup {
        if let Some(skin) = self.get(uid) {
            return SkinLookup::Known(skin.to_string());
        }
        if !self.outstanding.insert(uid.clone()) {
            return SkinLookup::Waiting;
        }
        SkinLookup::Query(OutboundMessage::SkinQuery {
            requester: self.local_uid.clone(),
            uid: uid.clone(),
        })
    }

    /// Answers a query if it is about the local player.
    pub fn answer(&self, uid: &Uid) -> Option<OutboundMessage> {
        (uid == &self.local_uid).then(|| OutboundMessage::SkinResponse {
            uid: self.local_uid.clone(),
            skin: self.local_skin.clone(),
        })
    }

    /// Caches a response. Returns `false` if the value was already known.
    pub fn record(&mut self, uid: Uid, skin: String) -> bool {
        self.outstanding.remove(&uid);
        if uid == self.local_uid {
            return false;
        }
        self.known.insert(uid, skin.clone()) != Some(skin)
    }

    /// Drops cached state for a departed uid.
    pub fn forget(&mut self, uid: &Uid) {
        self.known.remove(uid);
        self.outstanding.remove(uid);
    }
}
