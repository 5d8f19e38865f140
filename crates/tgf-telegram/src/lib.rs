//! Telegram adapter (grammers).
//!
//! This crate implements the `tgf-core` ClientHandle and Connector ports over
//! an MTProto user session.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use grammers_client::{
    types::{Chat, Downloadable, Media, Message},
    Client, Config, InitParams, InvocationError,
};
use grammers_client::client::chats::ProfilePhotoIter;
use grammers_session::{PackedChat, PackedType, Session};
use grammers_tl_types as tl;
use tracing::{debug, warn};

pub mod convert;

use tgf_core::{
    domain::{
        ChannelSearchResult, FetchedMessage, FetchedProfilePhoto, FullChannel, MessageQuery,
        Opaque, PeerRef, Post, PostBatch, ResolvedPeer, SearchOffset,
    },
    errors::Error,
    ports::{ClientHandle, Connector},
    Result,
};

use crate::convert::{bare_id, channel_from_chat, peer_kind, post_batch, sender_from_chat, Entities};

/// Map a client failure into the core error type, keeping RPC names intact.
pub fn map_err(e: InvocationError) -> Error {
    match e {
        InvocationError::Rpc(rpc) if rpc.name.starts_with("USERNAME_") => {
            Error::NotFound(format!("username lookup failed: {}", rpc.name))
        }
        InvocationError::Rpc(rpc) => Error::rpc(rpc.code, rpc.name, rpc.value),
        other => Error::External(format!("telegram error: {other}")),
    }
}

/// Open an MTProto connection for the session stored at `path`.
///
/// With `create`, a missing file starts a fresh (unauthorized) session.
/// Flood waits are never slept on inside the client; they surface as
/// `FLOOD_WAIT` RPC errors.
pub async fn connect_client(path: &Path, api_id: i32, api_hash: &str, create: bool) -> Result<Client> {
    let loaded = if create {
        Session::load_file_or_create(path)
    } else {
        Session::load_file(path)
    };
    let session = loaded.map_err(|e| Error::InvalidSession {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Client::connect(Config {
        session,
        api_id,
        api_hash: api_hash.to_string(),
        params: InitParams {
            catch_up: false,
            flood_sleep_threshold: 0,
            ..Default::default()
        },
    })
    .await
    .map_err(|e| Error::External(format!("telegram connect failed: {e}")))
}

#[derive(Clone)]
pub struct GrammersConnector {
    api_id: i32,
    api_hash: String,
}

impl GrammersConnector {
    pub fn new(api_id: i32, api_hash: impl Into<String>) -> Self {
        Self {
            api_id,
            api_hash: api_hash.into(),
        }
    }
}

#[async_trait]
impl Connector for GrammersConnector {
    async fn connect(&self, credential: &Path) -> Result<Arc<dyn ClientHandle>> {
        let client = connect_client(credential, self.api_id, &self.api_hash, false).await?;
        Ok(Arc::new(GrammersHandle::new(client, credential)))
    }
}

/// One connected session.
pub struct GrammersHandle {
    name: String,
    path: PathBuf,
    client: Client,
    closed: AtomicBool,
}

impl GrammersHandle {
    pub fn new(client: Client, path: &Path) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            path: path.to_path_buf(),
            client,
            closed: AtomicBool::new(false),
        }
    }

    fn packed(peer: &ResolvedPeer) -> Result<PackedChat> {
        peer.raw
            .downcast_ref::<PackedChat>()
            .copied()
            .ok_or_else(|| Error::InvalidInput(format!("peer {} was not resolved by this client", peer.id)))
    }

    fn resolved(chat: &Chat) -> ResolvedPeer {
        let packed = chat.pack();
        ResolvedPeer {
            id: chat.id(),
            kind: peer_kind(packed.ty),
            title: Some(chat.name().to_string()),
            username: chat.username().map(str::to_string),
            raw: Opaque::new(packed),
        }
    }

    fn input_channel(peer: &ResolvedPeer) -> Result<tl::enums::InputChannel> {
        Self::packed(peer)?
            .try_to_input_channel()
            .ok_or_else(|| Error::InvalidInput(format!("{} is not a channel", peer.id)))
    }

    async fn find_dialog(&self, id: i64) -> Result<ResolvedPeer> {
        let not_found = || Error::NotFound(format!("Could not find the input entity for {id}"));
        let wanted = bare_id(id).ok_or_else(not_found)?;
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await.map_err(map_err)? {
            let chat = dialog.chat();
            if chat.id() == wanted {
                return Ok(Self::resolved(chat));
            }
        }
        Err(not_found())
    }
}

fn fetched(message: &Message) -> FetchedMessage {
    let post = Post {
        sender: message.sender().as_ref().and_then(sender_from_chat),
        channel: channel_from_chat(&message.chat()),
        ..convert::post_from_raw(&message.raw)
    };
    let photo = match message.media() {
        Some(media @ Media::Photo(_)) => Some(Opaque::new(media)),
        _ => None,
    };
    FetchedMessage { post, photo }
}

#[async_trait]
impl ClientHandle for GrammersHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_authorized(&self) -> Result<bool> {
        self.client.is_authorized().await.map_err(map_err)
    }

    // Persists the session only; the connection closes when the last
    // `Client` clone is dropped.
    async fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.client.session().save_to_file(&self.path) {
            warn!(session = %self.name, error = %e, "session_save_failed");
        }
        debug!(session = %self.name, "session_disconnected");
    }

    async fn resolve(&self, peer: &PeerRef) -> Result<ResolvedPeer> {
        match peer {
            PeerRef::Id(id) => self.find_dialog(*id).await,
            PeerRef::Username(name) => match self.client.resolve_username(name).await.map_err(map_err)? {
                Some(chat) => Ok(Self::resolved(&chat)),
                None => Err(Error::NotFound(format!(
                    "No user has \"{name}\" as username"
                ))),
            },
        }
    }

    async fn messages(
        &self,
        peer: &ResolvedPeer,
        query: &MessageQuery,
    ) -> Result<Vec<FetchedMessage>> {
        let packed = Self::packed(peer)?;
        let mut raw = Vec::with_capacity(query.limit);

        // Both iterators walk newest first, older than `offset_id`.
        match &query.search {
            Some(text) => {
                let mut iter = self
                    .client
                    .search_messages(packed)
                    .query(text)
                    .offset_id(query.offset_id)
                    .limit(query.limit);
                while let Some(message) = iter.next().await.map_err(map_err)? {
                    raw.push(message);
                }
            }
            None => {
                let mut iter = self
                    .client
                    .iter_messages(packed)
                    .offset_id(query.offset_id)
                    .limit(query.limit);
                while let Some(message) = iter.next().await.map_err(map_err)? {
                    raw.push(message);
                }
            }
        }

        let out = raw.iter().map(fetched).collect();
        Ok(out)
    }

    async fn replies(
        &self,
        peer: &ResolvedPeer,
        post_id: i32,
        offset_id: i32,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let packed = Self::packed(peer)?;
        let res = self
            .client
            .invoke(&tl::functions::messages::GetReplies {
                peer: packed.to_input_peer(),
                msg_id: post_id,
                offset_id,
                offset_date: 0,
                add_offset: 0,
                limit: i32::try_from(limit).unwrap_or(i32::MAX),
                max_id: 0,
                min_id: 0,
                hash: 0,
            })
            .await
            .map_err(map_err)?;
        Ok(post_batch(res).posts)
    }

    async fn full_channel(&self, peer: &ResolvedPeer) -> Result<FullChannel> {
        let channel = Self::input_channel(peer)?;
        let res: tl::types::messages::ChatFull = self
            .client
            .invoke(&tl::functions::channels::GetFullChannel { channel })
            .await
            .map_err(map_err)?
            .into();

        let tl::enums::ChatFull::ChannelFull(full) = res.full_chat else {
            return Err(Error::NotFound(format!("{} is not a channel", peer.id)));
        };
        let entities = Entities::new(res.users, res.chats);
        let this = entities.channel(full.id);

        let linked_chat = full
            .linked_chat_id
            .and_then(|id| entities.channel(id))
            .and_then(|c| {
                let access_hash = c.access_hash?;
                let ty = if c.megagroup {
                    PackedType::Megagroup
                } else {
                    PackedType::Broadcast
                };
                let packed = PackedChat {
                    ty,
                    id: c.id,
                    access_hash: Some(access_hash),
                };
                Some(ResolvedPeer {
                    id: c.id,
                    kind: peer_kind(ty),
                    title: Some(c.title.clone()),
                    username: c.username.clone(),
                    raw: Opaque::new(packed),
                })
            });

        Ok(FullChannel {
            id: full.id,
            title: this.map(|c| c.title.clone()),
            username: this.and_then(|c| c.username.clone()),
            about: Some(full.about),
            participants_count: full.participants_count,
            linked_chat_id: full.linked_chat_id,
            broadcast: this.is_some_and(|c| c.broadcast),
            megagroup: this.is_some_and(|c| c.megagroup),
            linked_chat,
        })
    }

    async fn search_posts(
        &self,
        hashtag: &str,
        offset: Option<SearchOffset>,
        limit: usize,
    ) -> Result<PostBatch> {
        let (offset_rate, offset_id, offset_peer) = match offset {
            Some(o) => (
                o.rate,
                o.id,
                tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                    channel_id: o.peer_id,
                    access_hash: o.peer_hash,
                }),
            ),
            None => (0, 0, tl::enums::InputPeer::Empty),
        };
        let res = self
            .client
            .invoke(&tl::functions::channels::SearchPosts {
                hashtag: hashtag.to_string(),
                offset_rate,
                offset_peer,
                offset_id,
                limit: i32::try_from(limit).unwrap_or(i32::MAX),
            })
            .await
            .map_err(map_err)?;
        Ok(post_batch(res))
    }

    async fn search_chats(&self, query: &str, limit: usize) -> Result<Vec<ChannelSearchResult>> {
        let found: tl::types::contacts::Found = self
            .client
            .invoke(&tl::functions::contacts::Search {
                q: query.to_string(),
                limit: i32::try_from(limit).unwrap_or(i32::MAX),
            })
            .await
            .map_err(map_err)?
            .into();
        Ok(convert::channel_results(&found.chats))
    }

    async fn profile_photos(
        &self,
        peer: &ResolvedPeer,
        limit: usize,
    ) -> Result<Vec<FetchedProfilePhoto>> {
        let packed = Self::packed(peer)?;
        let mut photos = match self.client.iter_profile_photos(packed) {
            ProfilePhotoIter::User(iter) => ProfilePhotoIter::User(iter.limit(limit)),
            ProfilePhotoIter::Chat(iter) => ProfilePhotoIter::Chat(iter.limit(limit)),
        };
        let mut out = Vec::new();
        while let Some(photo) = photos.next().await.map_err(map_err)? {
            out.push(FetchedProfilePhoto {
                date: None,
                media: Opaque::new(Media::Photo(photo)),
            });
        }
        Ok(out)
    }

    async fn download(&self, media: &Opaque) -> Result<Option<Vec<u8>>> {
        let media = media
            .downcast_ref::<Media>()
            .cloned()
            .ok_or_else(|| Error::InvalidInput("not a downloadable media item".to_string()))?;

        let mut chunks = self.client.iter_download(&Downloadable::Media(media));
        let mut bytes = Vec::new();
        while let Some(chunk) = chunks.next().await.map_err(map_err)? {
            bytes.extend(chunk);
        }
        Ok((!bytes.is_empty()).then_some(bytes))
    }
}
