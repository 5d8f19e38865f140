use std::{any::Any, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// How a caller names a chat: `@username`/`username`, or a numeric id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerRef {
    Username(String),
    Id(i64),
}

impl PeerRef {
    /// Numeric strings resolve by id, everything else by username.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Username(trimmed.trim_start_matches('@').to_string()),
        }
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username(u) => write!(f, "{u}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerKind {
    User,
    Group,
    Broadcast,
    Megagroup,
}

/// Client-owned payload carried through the core untouched.
///
/// Adapters stash whatever they need to act on a peer or a media item later
/// (packed chat, photo object) and get it back with [`Opaque::downcast_ref`].
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(..)")
    }
}

/// A chat the client has resolved and can address directly.
#[derive(Clone, Debug)]
pub struct ResolvedPeer {
    pub id: i64,
    pub kind: PeerKind,
    pub title: Option<String>,
    pub username: Option<String>,
    pub raw: Opaque,
}

/// Options for walking a chat's history.
#[derive(Clone, Debug, Default)]
pub struct MessageQuery {
    /// Only messages older than this id; 0 starts from the newest.
    pub offset_id: i32,
    pub limit: usize,
    /// In-chat text search.
    pub search: Option<String>,
}

/// One history entry plus its downloadable photo, if any.
#[derive(Clone, Debug)]
pub struct FetchedMessage {
    pub post: Post,
    pub photo: Option<Opaque>,
}

#[derive(Clone, Debug)]
pub struct FetchedProfilePhoto {
    pub date: Option<DateTime<Utc>>,
    pub media: Opaque,
}

/// Full channel description as returned by the platform.
#[derive(Clone, Debug)]
pub struct FullChannel {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    pub about: Option<String>,
    pub participants_count: Option<i32>,
    pub linked_chat_id: Option<i64>,
    pub broadcast: bool,
    pub megagroup: bool,
    /// The discussion group, when the platform sent it along.
    pub linked_chat: Option<ResolvedPeer>,
}

/// Where to resume a hashtag search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchOffset {
    pub rate: i32,
    pub id: i32,
    pub peer_id: i64,
    pub peer_hash: i64,
}

/// One batch of hashtag search results.
#[derive(Clone, Debug, Default)]
pub struct PostBatch {
    pub posts: Vec<Post>,
    /// Present when the platform says more results exist.
    pub next_rate: Option<i32>,
    /// `(message id, channel id, access hash)` of the last message, when known.
    pub last: Option<(i32, i64, i64)>,
}

// ============== Response entities ==============

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Post {
    pub id: i32,
    #[serde(serialize_with = "rfc3339_opt")]
    pub date: Option<DateTime<Utc>>,
    pub text: String,
    pub views: Option<i32>,
    pub forwards: Option<i32>,
    pub replies_count: Option<i32>,
    #[serde(serialize_with = "rfc3339_opt")]
    pub edit_date: Option<DateTime<Utc>>,
    pub grouped_id: Option<i64>,
    pub sender: Option<SenderInfo>,
    pub channel: Option<ChannelRef>,
    pub media: Option<MediaInfo>,
}

impl Post {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            date: None,
            text: String::new(),
            views: None,
            forwards: None,
            replies_count: None,
            edit_date: None,
            grouped_id: None,
            sender: None,
            channel: None,
            media: None,
        }
    }

    pub fn is_photo(&self) -> bool {
        self.media
            .as_ref()
            .is_some_and(|m| m.kind == MediaInfo::PHOTO)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SenderInfo {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SenderInfo {
    pub fn user(
        id: i64,
        first_name: Option<String>,
        last_name: Option<String>,
        username: Option<String>,
    ) -> Self {
        Self {
            id,
            first_name,
            last_name,
            username,
            title: None,
        }
    }

    pub fn channel(id: i64, title: Option<String>, username: Option<String>) -> Self {
        Self {
            id,
            first_name: None,
            last_name: None,
            username,
            title,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelRef {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MediaInfo {
    #[serde(rename = "type")]
    pub kind: String,
}

impl MediaInfo {
    pub const PHOTO: &'static str = "MessageMediaPhoto";

    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhotoPost {
    #[serde(flatten)]
    pub post: Post,
    pub photo_base64: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfilePhoto {
    pub index: usize,
    #[serde(serialize_with = "rfc3339_opt")]
    pub date: Option<DateTime<Utc>>,
    pub photo_base64: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelSearchResult {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    pub participants_count: Option<i32>,
    pub about: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelFullInfo {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    pub about: Option<String>,
    pub participants_count: Option<i32>,
    pub photo_url: Option<String>,
    pub linked_chat_id: Option<i64>,
    pub broadcast: bool,
    pub megagroup: bool,
}

fn rfc3339_opt<S: Serializer>(v: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(d) => s.serialize_str(&d.to_rfc3339()),
        None => s.serialize_none(),
    }
}
