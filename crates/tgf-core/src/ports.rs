use std::{path::Path, sync::Arc};

use async_trait::async_trait;

use crate::{
    domain::{
        ChannelSearchResult, FetchedMessage, FetchedProfilePhoto, FullChannel, MessageQuery,
        Opaque, PeerRef, Post, PostBatch, ResolvedPeer, SearchOffset,
    },
    Result,
};

/// Hexagonal port for one authenticated MTProto session.
///
/// Implementations must be safe for concurrent independent calls: the pool
/// hands the same handle to several in-flight requests. Upstream RPC
/// failures are reported as [`crate::Error::Rpc`] so they can be classified.
#[async_trait]
pub trait ClientHandle: Send + Sync {
    /// Human-readable session label (credential file stem).
    fn name(&self) -> &str;

    async fn is_authorized(&self) -> Result<bool>;

    /// Close the connection. Must be safe to call more than once.
    async fn disconnect(&self);

    async fn resolve(&self, peer: &PeerRef) -> Result<ResolvedPeer>;

    async fn messages(&self, peer: &ResolvedPeer, query: &MessageQuery)
        -> Result<Vec<FetchedMessage>>;

    /// Comments posted under `post_id` in the channel's discussion thread.
    async fn replies(
        &self,
        peer: &ResolvedPeer,
        post_id: i32,
        offset_id: i32,
        limit: usize,
    ) -> Result<Vec<Post>>;

    async fn full_channel(&self, peer: &ResolvedPeer) -> Result<FullChannel>;

    /// Global hashtag search across public channels.
    async fn search_posts(
        &self,
        hashtag: &str,
        offset: Option<SearchOffset>,
        limit: usize,
    ) -> Result<PostBatch>;

    /// Directory search; only channels are returned.
    async fn search_chats(&self, query: &str, limit: usize) -> Result<Vec<ChannelSearchResult>>;

    async fn profile_photos(
        &self,
        peer: &ResolvedPeer,
        limit: usize,
    ) -> Result<Vec<FetchedProfilePhoto>>;

    /// Full bytes of a media item; `None` when the platform returns nothing.
    async fn download(&self, media: &Opaque) -> Result<Option<Vec<u8>>>;
}

/// Turns a credential file into a connected (not necessarily authorized) handle.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credential: &Path) -> Result<Arc<dyn ClientHandle>>;
}
