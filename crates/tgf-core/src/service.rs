//! Operations run through the session runner.
//!
//! Each is a plain `async fn` of a client handle plus request arguments, so
//! it can be retried as-is on another session.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::info;

use crate::{
    cursor,
    domain::{
        ChannelFullInfo, ChannelSearchResult, MessageQuery, PeerRef, PhotoPost, Post,
        ProfilePhoto, ResolvedPeer, SearchOffset,
    },
    errors::Error,
    ports::ClientHandle,
    Result,
};

/// Upper bound the platform accepts for one hashtag search page.
pub const SEARCH_POSTS_MAX: usize = 100;

async fn resolve(client: &dyn ClientHandle, raw: &str) -> Result<ResolvedPeer> {
    client.resolve(&PeerRef::parse(raw)).await
}

pub async fn channel_posts(
    client: &dyn ClientHandle,
    channel: &str,
    offset_id: i32,
    limit: usize,
) -> Result<Vec<Post>> {
    info!(channel, offset_id, limit, "get_channel_posts");
    let peer = resolve(client, channel).await?;
    let query = MessageQuery {
        offset_id,
        limit,
        search: None,
    };
    let posts: Vec<Post> = client
        .messages(&peer, &query)
        .await?
        .into_iter()
        .map(|m| m.post)
        .collect();
    info!(channel, count = posts.len(), "get_channel_posts_done");
    Ok(posts)
}

pub async fn post_comments(
    client: &dyn ClientHandle,
    channel: &str,
    post_id: i32,
    offset_id: i32,
    limit: usize,
) -> Result<Vec<Post>> {
    info!(channel, post_id, offset_id, limit, "get_post_comments");
    let peer = resolve(client, channel).await?;
    let posts = client.replies(&peer, post_id, offset_id, limit).await?;
    info!(channel, post_id, count = posts.len(), "get_post_comments_done");
    Ok(posts)
}

/// Hashtag search across public channels.
///
/// Returns the page plus a cursor for the next one when the platform reports
/// more results and the last message's channel is addressable.
pub async fn search_posts(
    client: &dyn ClientHandle,
    tag: &str,
    offset: Option<SearchOffset>,
    limit: usize,
) -> Result<(Vec<Post>, Option<String>)> {
    let start = offset.unwrap_or(SearchOffset {
        rate: 0,
        id: 0,
        peer_id: 0,
        peer_hash: 0,
    });
    info!(
        tag,
        offset_rate = start.rate,
        offset_id = start.id,
        limit,
        "search_posts"
    );

    let batch = client
        .search_posts(tag, offset, limit.min(SEARCH_POSTS_MAX))
        .await?;

    let next_cursor = match (batch.next_rate, batch.last) {
        (Some(rate), Some((msg_id, peer_id, peer_hash))) if !batch.posts.is_empty() => {
            Some(cursor::encode(rate, msg_id, peer_id, peer_hash))
        }
        _ => None,
    };

    info!(
        tag,
        count = batch.posts.len(),
        has_next = next_cursor.is_some(),
        "search_posts_done"
    );
    Ok((batch.posts, next_cursor))
}

pub async fn search_channels(
    client: &dyn ClientHandle,
    query: &str,
    limit: usize,
) -> Result<Vec<ChannelSearchResult>> {
    info!(query, limit, "search_channels");
    let channels = client.search_chats(query, limit).await?;
    info!(query, count = channels.len(), "search_channels_done");
    Ok(channels)
}

pub async fn search_channel_messages(
    client: &dyn ClientHandle,
    channel: &str,
    query: &str,
    offset_id: i32,
    limit: usize,
) -> Result<Vec<Post>> {
    info!(channel, query, offset_id, limit, "search_channel_messages");
    let peer = resolve(client, channel).await?;
    let posts = search_in(client, &peer, query, offset_id, limit).await?;
    info!(channel, query, count = posts.len(), "search_channel_messages_done");
    Ok(posts)
}

/// Text search in the discussion group linked to `channel`.
pub async fn search_comments(
    client: &dyn ClientHandle,
    channel: &str,
    query: &str,
    offset_id: i32,
    limit: usize,
) -> Result<Vec<Post>> {
    info!(channel, query, offset_id, limit, "search_comments");
    let peer = resolve(client, channel).await?;
    let full = client.full_channel(&peer).await?;

    let Some(linked_id) = full.linked_chat_id else {
        return Err(Error::NotFound(format!(
            "Channel {channel} has no linked discussion group"
        )));
    };
    let linked = match full.linked_chat {
        Some(p) => p,
        None => client.resolve(&PeerRef::Id(linked_id)).await?,
    };

    let posts = search_in(client, &linked, query, offset_id, limit).await?;
    info!(channel, query, count = posts.len(), "search_comments_done");
    Ok(posts)
}

async fn search_in(
    client: &dyn ClientHandle,
    peer: &ResolvedPeer,
    query: &str,
    offset_id: i32,
    limit: usize,
) -> Result<Vec<Post>> {
    let query = MessageQuery {
        offset_id,
        limit,
        search: Some(query.to_string()),
    };
    Ok(client
        .messages(peer, &query)
        .await?
        .into_iter()
        .map(|m| m.post)
        .collect())
}

/// Photo posts of a channel with the image inlined as base64.
///
/// `limit` bounds the history scanned, not the photos returned; non-photo
/// posts and empty downloads are skipped.
pub async fn channel_photos(
    client: &dyn ClientHandle,
    channel: &str,
    offset_id: i32,
    limit: usize,
) -> Result<Vec<PhotoPost>> {
    info!(channel, offset_id, limit, "get_channel_photos");
    let peer = resolve(client, channel).await?;
    let query = MessageQuery {
        offset_id,
        limit,
        search: None,
    };

    let mut out = Vec::new();
    for message in client.messages(&peer, &query).await? {
        let Some(media) = message.photo.as_ref().filter(|_| message.post.is_photo()) else {
            continue;
        };
        let Some(bytes) = client.download(media).await? else {
            continue;
        };
        out.push(PhotoPost {
            post: message.post,
            photo_base64: STANDARD.encode(bytes),
        });
    }
    info!(channel, count = out.len(), "get_channel_photos_done");
    Ok(out)
}

/// Profile photos of a user, newest first, as base64.
pub async fn user_profile_photos(
    client: &dyn ClientHandle,
    user: &str,
    limit: usize,
) -> Result<Vec<ProfilePhoto>> {
    info!(user, limit, "get_user_profile_photos");
    let peer = resolve(client, user).await?;

    let mut out = Vec::new();
    for (index, photo) in client.profile_photos(&peer, limit).await?.into_iter().enumerate() {
        let Some(bytes) = client.download(&photo.media).await? else {
            continue;
        };
        out.push(ProfilePhoto {
            index,
            date: photo.date,
            photo_base64: STANDARD.encode(bytes),
        });
    }
    info!(user, count = out.len(), "get_user_profile_photos_done");
    Ok(out)
}

pub async fn channel_info(client: &dyn ClientHandle, channel: &str) -> Result<ChannelFullInfo> {
    info!(channel, "get_channel_info");
    let peer = resolve(client, channel).await?;
    let full = client.full_channel(&peer).await?;

    let info = ChannelFullInfo {
        id: full.id,
        title: full.title.or(peer.title),
        username: full.username.or(peer.username),
        about: full.about,
        participants_count: full.participants_count,
        photo_url: None,
        linked_chat_id: full.linked_chat_id,
        broadcast: full.broadcast,
        megagroup: full.megagroup,
    };
    info!(channel, "get_channel_info_done");
    Ok(info)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        domain::{FetchedProfilePhoto, FullChannel, MediaInfo, Opaque, PostBatch},
        testing::{channel_peer, fetched, FakeData, FakeHandle},
    };

    fn post(id: i32, text: &str) -> Post {
        Post {
            text: text.to_string(),
            ..Post::new(id)
        }
    }

    fn photo_post(id: i32) -> Post {
        Post {
            media: Some(MediaInfo::new(MediaInfo::PHOTO)),
            ..Post::new(id)
        }
    }

    fn full_channel(linked: Option<i64>) -> FullChannel {
        FullChannel {
            id: 100,
            title: Some("News".into()),
            username: Some("news".into()),
            about: Some("daily".into()),
            participants_count: Some(1500),
            linked_chat_id: linked,
            broadcast: true,
            megagroup: false,
            linked_chat: None,
        }
    }

    fn handle(data: FakeData) -> FakeHandle {
        let mut data = data;
        data.peers.push(("news".into(), channel_peer(100, "news")));
        data.peers.push(("100".into(), channel_peer(100, "news")));
        data.peers.push(("200".into(), channel_peer(200, "news_chat")));
        FakeHandle::with_data("s1", data)
    }

    #[tokio::test]
    async fn channel_posts_resolves_username_and_passes_paging() {
        let h = handle(FakeData {
            messages: (0..3).map(|i| fetched(post(i, &format!("post {i}")), None)).collect(),
            ..Default::default()
        });

        let posts = channel_posts(&h, "@news", 50, 20).await.unwrap();

        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].text, "post 0");
        let calls = h.calls();
        assert_eq!(calls.resolved, vec![PeerRef::Username("news".into())]);
        assert_eq!(calls.queries[0].offset_id, 50);
        assert_eq!(calls.queries[0].limit, 20);
        assert!(calls.queries[0].search.is_none());
    }

    #[tokio::test]
    async fn numeric_channel_resolves_by_id() {
        let h = handle(FakeData::default());
        channel_posts(&h, "100", 0, 20).await.unwrap();
        assert_eq!(h.calls().resolved, vec![PeerRef::Id(100)]);
    }

    #[tokio::test]
    async fn unknown_channel_is_not_found() {
        let h = handle(FakeData::default());
        let err = channel_posts(&h, "missing", 0, 20).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn post_comments_reads_the_reply_thread() {
        let h = handle(FakeData {
            replies: vec![post(1, "comment 0"), post(2, "comment 1")],
            ..Default::default()
        });

        let posts = post_comments(&h, "news", 77, 5, 20).await.unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].text, "comment 1");
        assert_eq!(h.calls().replies, vec![(77, 5, 20)]);
    }

    #[tokio::test]
    async fn search_posts_without_more_results_has_no_cursor() {
        let h = handle(FakeData {
            batch: PostBatch {
                posts: vec![post(1, "a"), post(2, "b")],
                next_rate: None,
                last: Some((2, 456, 789)),
            },
            ..Default::default()
        });

        let (posts, next) = search_posts(&h, "#test", None, 100).await.unwrap();

        assert_eq!(posts.len(), 2);
        assert!(next.is_none());
        assert_eq!(h.calls().search_offsets, vec![None]);
    }

    #[tokio::test]
    async fn search_posts_mints_a_cursor_from_the_last_message() {
        let h = handle(FakeData {
            batch: PostBatch {
                posts: vec![post(10, "a")],
                next_rate: Some(42),
                last: Some((10, 456, 789)),
            },
            ..Default::default()
        });

        let (_, next) = search_posts(&h, "#test", None, 100).await.unwrap();
        let next = next.expect("cursor");

        assert_eq!(
            cursor::decode(&next).unwrap(),
            SearchOffset {
                rate: 42,
                id: 10,
                peer_id: 456,
                peer_hash: 789
            }
        );
    }

    #[tokio::test]
    async fn search_posts_needs_an_addressable_last_channel_for_a_cursor() {
        let h = handle(FakeData {
            batch: PostBatch {
                posts: vec![post(10, "a")],
                next_rate: Some(42),
                last: None,
            },
            ..Default::default()
        });
        let (_, next) = search_posts(&h, "#test", None, 100).await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn search_posts_forwards_the_decoded_offset() {
        let h = handle(FakeData::default());
        let offset = SearchOffset {
            rate: 1,
            id: 2,
            peer_id: 3,
            peer_hash: 4,
        };
        let (posts, next) = search_posts(&h, "#x", Some(offset), 100).await.unwrap();
        assert!(posts.is_empty());
        assert!(next.is_none());
        assert_eq!(h.calls().search_offsets, vec![Some(offset)]);
    }

    #[tokio::test]
    async fn channel_search_passes_query_text() {
        let h = handle(FakeData {
            messages: vec![fetched(post(5, "hello world"), None)],
            ..Default::default()
        });
        let posts = search_channel_messages(&h, "news", "hello", 0, 10)
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(h.calls().queries[0].search.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn comment_search_uses_the_linked_group() {
        let h = handle(FakeData {
            full_channel: Some(full_channel(Some(200))),
            messages: vec![fetched(post(9, "nice"), None)],
            ..Default::default()
        });

        let posts = search_comments(&h, "news", "nice", 0, 20).await.unwrap();

        assert_eq!(posts.len(), 1);
        let calls = h.calls();
        assert_eq!(
            calls.resolved,
            vec![PeerRef::Username("news".into()), PeerRef::Id(200)]
        );
        assert_eq!(calls.queries[0].search.as_deref(), Some("nice"));
    }

    #[tokio::test]
    async fn comment_search_without_linked_group_is_not_found() {
        let h = handle(FakeData {
            full_channel: Some(full_channel(None)),
            ..Default::default()
        });
        let err = search_comments(&h, "news", "x", 0, 20).await.unwrap_err();
        assert!(
            matches!(err, Error::NotFound(ref m) if m.contains("no linked discussion group")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn channel_photos_skips_non_photo_and_empty_downloads() {
        let h = handle(FakeData {
            messages: vec![
                fetched(photo_post(1), Some(vec![1, 2, 3])),
                fetched(post(2, "text only"), None),
                fetched(photo_post(3), Some(Vec::new())),
                fetched(photo_post(4), Some(b"hi".to_vec())),
            ],
            ..Default::default()
        });

        let photos = channel_photos(&h, "news", 0, 20).await.unwrap();

        assert_eq!(photos.iter().map(|p| p.post.id).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(photos[0].photo_base64, "AQID");
        assert_eq!(photos[1].photo_base64, "aGk=");
        assert_eq!(h.calls().downloads, 3);
    }

    #[tokio::test]
    async fn profile_photos_keep_their_original_index() {
        let date = Utc.with_ymd_and_hms(2023, 5, 6, 7, 8, 9).unwrap();
        let h = handle(FakeData {
            profile_photos: vec![
                FetchedProfilePhoto {
                    date: None,
                    media: Opaque::new(Vec::<u8>::new()),
                },
                FetchedProfilePhoto {
                    date: Some(date),
                    media: Opaque::new(vec![0xffu8]),
                },
            ],
            ..Default::default()
        });

        let photos = user_profile_photos(&h, "news", 10).await.unwrap();

        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].index, 1);
        assert_eq!(photos[0].date, Some(date));
        assert_eq!(photos[0].photo_base64, "/w==");
    }

    #[tokio::test]
    async fn channel_info_merges_full_and_resolved_fields() {
        let mut full = full_channel(Some(200));
        full.title = None;
        let h = handle(FakeData {
            full_channel: Some(full),
            ..Default::default()
        });

        let info = channel_info(&h, "news").await.unwrap();

        assert_eq!(info.id, 100);
        assert_eq!(info.title.as_deref(), Some("NEWS"));
        assert_eq!(info.about.as_deref(), Some("daily"));
        assert_eq!(info.participants_count, Some(1500));
        assert_eq!(info.linked_chat_id, Some(200));
        assert!(info.broadcast);
        assert!(!info.megagroup);
        assert!(info.photo_url.is_none());
    }
}
