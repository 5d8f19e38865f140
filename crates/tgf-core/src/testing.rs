//! In-memory port implementations for tests.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    domain::{
        ChannelSearchResult, FetchedMessage, FetchedProfilePhoto, FullChannel, MessageQuery,
        Opaque, PeerKind, PeerRef, Post, PostBatch, ResolvedPeer, SearchOffset,
    },
    errors::Error,
    ports::{ClientHandle, Connector},
    Result,
};

/// Canned responses served by a [`FakeHandle`].
#[derive(Clone, Debug, Default)]
pub struct FakeData {
    /// Peers resolvable by their `PeerRef` display form (`"news"`, `"123"`).
    pub peers: Vec<(String, ResolvedPeer)>,
    pub messages: Vec<FetchedMessage>,
    pub replies: Vec<Post>,
    pub full_channel: Option<FullChannel>,
    pub batch: PostBatch,
    pub chats: Vec<ChannelSearchResult>,
    pub profile_photos: Vec<FetchedProfilePhoto>,
}

/// Records what the core asked of a handle.
#[derive(Clone, Debug, Default)]
pub struct FakeCalls {
    pub resolved: Vec<PeerRef>,
    pub queries: Vec<MessageQuery>,
    pub replies: Vec<(i32, i32, usize)>,
    pub search_offsets: Vec<Option<SearchOffset>>,
    pub downloads: usize,
}

pub struct FakeHandle {
    name: String,
    authorized: bool,
    auth_check_fails: bool,
    disconnects: AtomicUsize,
    data: FakeData,
    calls: Mutex<FakeCalls>,
}

impl FakeHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_data(name, FakeData::default())
    }

    pub fn with_data(name: impl Into<String>, data: FakeData) -> Self {
        Self {
            name: name.into(),
            authorized: true,
            auth_check_fails: false,
            disconnects: AtomicUsize::new(0),
            data,
            calls: Mutex::new(FakeCalls::default()),
        }
    }

    pub fn unauthorized(name: impl Into<String>) -> Self {
        Self {
            authorized: false,
            ..Self::new(name)
        }
    }

    /// A handle whose authorization check itself errors.
    pub fn failing_auth_check(name: impl Into<String>) -> Self {
        Self {
            auth_check_fails: true,
            ..Self::new(name)
        }
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> FakeCalls {
        self.calls.lock().unwrap().clone()
    }
}

/// A resolved channel whose opaque payload is its id.
pub fn channel_peer(id: i64, username: &str) -> ResolvedPeer {
    ResolvedPeer {
        id,
        kind: PeerKind::Broadcast,
        title: Some(username.to_uppercase()),
        username: Some(username.to_string()),
        raw: Opaque::new(id),
    }
}

/// A history entry; `photo` bytes become the downloadable payload.
pub fn fetched(post: Post, photo: Option<Vec<u8>>) -> FetchedMessage {
    FetchedMessage {
        post,
        photo: photo.map(Opaque::new),
    }
}

#[async_trait]
impl ClientHandle for FakeHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_authorized(&self) -> Result<bool> {
        if self.auth_check_fails {
            return Err(Error::External(format!("{}: auth check failed", self.name)));
        }
        Ok(self.authorized)
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn resolve(&self, peer: &PeerRef) -> Result<ResolvedPeer> {
        self.calls.lock().unwrap().resolved.push(peer.clone());
        let key = peer.to_string();
        self.data
            .peers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| Error::NotFound(format!("No user has \"{key}\" as username")))
    }

    async fn messages(
        &self,
        _peer: &ResolvedPeer,
        query: &MessageQuery,
    ) -> Result<Vec<FetchedMessage>> {
        self.calls.lock().unwrap().queries.push(query.clone());
        Ok(self
            .data
            .messages
            .iter()
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn replies(
        &self,
        _peer: &ResolvedPeer,
        post_id: i32,
        offset_id: i32,
        limit: usize,
    ) -> Result<Vec<Post>> {
        self.calls
            .lock()
            .unwrap()
            .replies
            .push((post_id, offset_id, limit));
        Ok(self.data.replies.iter().take(limit).cloned().collect())
    }

    async fn full_channel(&self, _peer: &ResolvedPeer) -> Result<FullChannel> {
        self.data
            .full_channel
            .clone()
            .ok_or_else(|| Error::NotFound("channel not found".to_string()))
    }

    async fn search_posts(
        &self,
        _hashtag: &str,
        offset: Option<SearchOffset>,
        _limit: usize,
    ) -> Result<PostBatch> {
        self.calls.lock().unwrap().search_offsets.push(offset);
        Ok(self.data.batch.clone())
    }

    async fn search_chats(&self, _query: &str, limit: usize) -> Result<Vec<ChannelSearchResult>> {
        Ok(self.data.chats.iter().take(limit).cloned().collect())
    }

    async fn profile_photos(
        &self,
        _peer: &ResolvedPeer,
        limit: usize,
    ) -> Result<Vec<FetchedProfilePhoto>> {
        Ok(self
            .data
            .profile_photos
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn download(&self, media: &Opaque) -> Result<Option<Vec<u8>>> {
        self.calls.lock().unwrap().downloads += 1;
        Ok(media
            .downcast_ref::<Vec<u8>>()
            .filter(|b| !b.is_empty())
            .cloned())
    }
}

/// Connector that hands out [`FakeHandle`]s named after the file stem.
#[derive(Default)]
pub struct FakeConnector {
    unauthorized: Vec<String>,
    failing: Vec<String>,
    auth_check_failing: Vec<String>,
    created: Mutex<Vec<Arc<FakeHandle>>>,
}

impl FakeConnector {
    /// `unauthorized` lists the file stems whose sessions fail the auth check.
    pub fn new(unauthorized: &[&str]) -> Self {
        Self {
            unauthorized: stems(unauthorized),
            failing: Vec::new(),
            auth_check_failing: Vec::new(),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Sessions that cannot be opened at all.
    pub fn failing_on(mut self, names: &[&str]) -> Self {
        self.failing = stems(names);
        self
    }

    /// Sessions that open but whose authorization check errors.
    pub fn auth_check_failing_on(mut self, names: &[&str]) -> Self {
        self.auth_check_failing = stems(names);
        self
    }

    pub fn connected(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|h| h.name.clone())
            .collect()
    }

    pub fn disconnected(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.disconnects() > 0)
            .map(|h| h.name.clone())
            .collect()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, credential: &Path) -> Result<Arc<dyn ClientHandle>> {
        let stem = credential
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&stem) {
            return Err(Error::InvalidSession {
                path: credential.to_path_buf(),
                reason: "unreadable".to_string(),
            });
        }
        let handle = if self.auth_check_failing.contains(&stem) {
            Arc::new(FakeHandle::failing_auth_check(stem))
        } else if self.unauthorized.contains(&stem) {
            Arc::new(FakeHandle::unauthorized(stem))
        } else {
            Arc::new(FakeHandle::new(stem))
        };
        self.created.lock().unwrap().push(handle.clone());
        Ok(handle)
    }
}

fn stems(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
