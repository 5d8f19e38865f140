//! Raw MTProto objects to domain types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use grammers_client::types::Chat;
use grammers_session::PackedType;
use grammers_tl_types as tl;

use tgf_core::domain::{
    ChannelRef, ChannelSearchResult, MediaInfo, PeerKind, Post, PostBatch, SenderInfo,
};

pub fn unix_date(ts: i32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::from(ts), 0)
}

/// Platform type name of a media attachment; `None` for the empty placeholder.
pub fn media_kind(media: &tl::enums::MessageMedia) -> Option<&'static str> {
    use tl::enums::MessageMedia as M;
    let name = match media {
        M::Empty => return None,
        M::Photo(_) => MediaInfo::PHOTO,
        M::Document(_) => "MessageMediaDocument",
        M::Geo(_) => "MessageMediaGeo",
        M::Contact(_) => "MessageMediaContact",
        M::WebPage(_) => "MessageMediaWebPage",
        M::Venue(_) => "MessageMediaVenue",
        M::Game(_) => "MessageMediaGame",
        M::Invoice(_) => "MessageMediaInvoice",
        M::GeoLive(_) => "MessageMediaGeoLive",
        M::Poll(_) => "MessageMediaPoll",
        M::Dice(_) => "MessageMediaDice",
        M::Story(_) => "MessageMediaStory",
        _ => "MessageMediaUnsupported",
    };
    Some(name)
}

pub fn peer_kind(ty: PackedType) -> PeerKind {
    match ty {
        PackedType::User | PackedType::Bot => PeerKind::User,
        PackedType::Chat => PeerKind::Group,
        PackedType::Megagroup | PackedType::Gigagroup => PeerKind::Megagroup,
        PackedType::Broadcast => PeerKind::Broadcast,
    }
}

/// Bare id as the client library reports it, from either a bare id or a
/// marked one (`-100…` for channels, negative for basic groups).
///
/// `None` for ids no peer can carry, such as `i64::MIN`.
pub fn bare_id(id: i64) -> Option<i64> {
    const CHANNEL_MARK: i64 = 1_000_000_000_000;
    if id <= -CHANNEL_MARK {
        id.checked_neg().map(|v| v - CHANNEL_MARK)
    } else {
        id.checked_abs()
    }
}

/// Post skeleton from the raw message; sender and channel are filled by the caller.
pub fn post_from_raw(m: &tl::types::Message) -> Post {
    Post {
        id: m.id,
        date: unix_date(m.date),
        text: m.message.clone(),
        views: m.views,
        forwards: m.forwards,
        replies_count: m.replies.as_ref().map(|r| match r {
            tl::enums::MessageReplies::Replies(r) => r.replies,
        }),
        edit_date: m.edit_date.and_then(unix_date),
        grouped_id: m.grouped_id,
        sender: None,
        channel: None,
        media: m
            .media
            .as_ref()
            .and_then(media_kind)
            .map(MediaInfo::new),
    }
}

fn is_channel_like(chat: &Chat) -> bool {
    matches!(
        chat.pack().ty,
        PackedType::Broadcast | PackedType::Megagroup | PackedType::Gigagroup
    )
}

/// Sender as shown on a post. Basic groups have no sender form.
pub fn sender_from_chat(chat: &Chat) -> Option<SenderInfo> {
    match chat {
        Chat::User(u) => Some(SenderInfo::user(
            u.id(),
            Some(u.first_name().to_string()),
            u.last_name().map(str::to_string),
            u.username().map(str::to_string),
        )),
        c if is_channel_like(c) => Some(SenderInfo::channel(
            c.id(),
            Some(c.name().to_string()),
            c.username().map(str::to_string),
        )),
        _ => None,
    }
}

pub fn channel_from_chat(chat: &Chat) -> Option<ChannelRef> {
    is_channel_like(chat).then(|| ChannelRef {
        id: chat.id(),
        title: Some(chat.name().to_string()),
        username: chat.username().map(str::to_string),
    })
}

/// Users and channels that came along with a raw response, by bare id.
#[derive(Default)]
pub struct Entities {
    users: HashMap<i64, tl::types::User>,
    channels: HashMap<i64, tl::types::Channel>,
}

impl Entities {
    pub fn new(users: Vec<tl::enums::User>, chats: Vec<tl::enums::Chat>) -> Self {
        let mut out = Self::default();
        for user in users {
            if let tl::enums::User::User(u) = user {
                out.users.insert(u.id, u);
            }
        }
        for chat in chats {
            if let tl::enums::Chat::Channel(c) = chat {
                out.channels.insert(c.id, c);
            }
        }
        out
    }

    pub fn channel(&self, id: i64) -> Option<&tl::types::Channel> {
        self.channels.get(&id)
    }

    fn sender(&self, peer: &tl::enums::Peer) -> Option<SenderInfo> {
        match peer {
            tl::enums::Peer::User(p) => self.users.get(&p.user_id).map(|u| {
                SenderInfo::user(
                    u.id,
                    u.first_name.clone(),
                    u.last_name.clone(),
                    u.username.clone(),
                )
            }),
            tl::enums::Peer::Channel(p) => self
                .channels
                .get(&p.channel_id)
                .map(|c| SenderInfo::channel(c.id, Some(c.title.clone()), c.username.clone())),
            tl::enums::Peer::Chat(_) => None,
        }
    }

    fn channel_ref(&self, peer: &tl::enums::Peer) -> Option<ChannelRef> {
        let tl::enums::Peer::Channel(p) = peer else {
            return None;
        };
        self.channels.get(&p.channel_id).map(|c| ChannelRef {
            id: c.id,
            title: Some(c.title.clone()),
            username: c.username.clone(),
        })
    }

    /// Full post with sender and channel looked up in this set.
    pub fn post(&self, m: &tl::types::Message) -> Post {
        // Channel posts carry no author; the channel itself is the sender.
        let from = match (&m.from_id, m.post) {
            (Some(from), _) => Some(from),
            (None, true) => Some(&m.peer_id),
            (None, false) => None,
        };
        Post {
            sender: from.and_then(|p| self.sender(p)),
            channel: self.channel_ref(&m.peer_id),
            ..post_from_raw(m)
        }
    }
}

fn peer_channel_id(peer: &tl::enums::Peer) -> Option<i64> {
    match peer {
        tl::enums::Peer::Channel(p) => Some(p.channel_id),
        _ => None,
    }
}

/// Flatten any `messages.Messages` answer into a batch.
///
/// `last` is set only when the final message belongs to a channel whose
/// access hash came along, since that is what resuming a search requires.
pub fn post_batch(res: tl::enums::messages::Messages) -> PostBatch {
    use tl::enums::messages::Messages as M;
    let (messages, chats, users, next_rate) = match res {
        M::Messages(m) => (m.messages, m.chats, m.users, None),
        M::Slice(m) => (m.messages, m.chats, m.users, m.next_rate),
        M::ChannelMessages(m) => (m.messages, m.chats, m.users, None),
        M::NotModified(_) => (Vec::new(), Vec::new(), Vec::new(), None),
    };
    let entities = Entities::new(users, chats);

    let mut posts = Vec::with_capacity(messages.len());
    let mut last = None;
    for message in &messages {
        let (id, peer) = match message {
            tl::enums::Message::Message(m) => {
                posts.push(entities.post(m));
                (m.id, &m.peer_id)
            }
            tl::enums::Message::Service(m) => (m.id, &m.peer_id),
            tl::enums::Message::Empty(_) => continue,
        };
        last = peer_channel_id(peer)
            .and_then(|cid| entities.channel(cid))
            .and_then(|c| c.access_hash.map(|hash| (id, c.id, hash)));
    }

    PostBatch {
        posts,
        next_rate,
        last,
    }
}

/// Channels among a directory search answer.
pub fn channel_results(chats: &[tl::enums::Chat]) -> Vec<ChannelSearchResult> {
    chats
        .iter()
        .filter_map(|chat| match chat {
            tl::enums::Chat::Channel(c) => Some(ChannelSearchResult {
                id: c.id,
                title: Some(c.title.clone()),
                username: c.username.clone(),
                participants_count: c.participants_count,
                about: None,
            }),
            _ => None,
        })
        .collect()
}
