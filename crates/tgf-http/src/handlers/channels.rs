use axum::{extract::State, routing::get, Json, Router};
use tgf_core::{
    domain::{ChannelFullInfo, PhotoPost, Post},
    service,
};

use super::{limit, offset, MessagesResponse, PageQuery, PhotoPageQuery, TextSearchQuery};
use crate::{
    error::ApiError,
    extract::{ApiPath, ValidQuery},
    router::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{channel}/info", get(channel_info))
        .route("/{channel}/posts", get(channel_posts))
        .route("/{channel}/posts/{post_id}/comments", get(post_comments))
        .route("/{channel}/photos", get(channel_photos))
        .route("/{channel}/search", get(search_channel))
        .route("/{channel}/comments/search", get(search_comments))
}

async fn channel_info(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<String>,
) -> Result<Json<ChannelFullInfo>, ApiError> {
    let channel = channel.as_str();
    let info = state
        .runner
        .run("get_channel_info", |client| async move {
            service::channel_info(client.as_ref(), channel).await
        })
        .await?;
    Ok(Json(info))
}

async fn channel_posts(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<String>,
    ValidQuery(q): ValidQuery<PageQuery>,
) -> Result<Json<MessagesResponse<Post>>, ApiError> {
    let channel = channel.as_str();
    let (offset_id, limit) = (offset(q.offset_id), limit(q.limit));
    let messages = state
        .runner
        .run("get_channel_posts", |client| async move {
            service::channel_posts(client.as_ref(), channel, offset_id, limit).await
        })
        .await?;
    Ok(Json(MessagesResponse::new(messages)))
}

async fn post_comments(
    State(state): State<AppState>,
    ApiPath((channel, post_id)): ApiPath<(String, i32)>,
    ValidQuery(q): ValidQuery<PageQuery>,
) -> Result<Json<MessagesResponse<Post>>, ApiError> {
    let channel = channel.as_str();
    let (offset_id, limit) = (offset(q.offset_id), limit(q.limit));
    let messages = state
        .runner
        .run("get_post_comments", |client| async move {
            service::post_comments(client.as_ref(), channel, post_id, offset_id, limit).await
        })
        .await?;
    Ok(Json(MessagesResponse::new(messages)))
}

async fn channel_photos(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<String>,
    ValidQuery(q): ValidQuery<PhotoPageQuery>,
) -> Result<Json<MessagesResponse<PhotoPost>>, ApiError> {
    let channel = channel.as_str();
    let (offset_id, limit) = (offset(q.offset_id), limit(q.limit));
    let messages = state
        .runner
        .run("get_channel_photos", |client| async move {
            service::channel_photos(client.as_ref(), channel, offset_id, limit).await
        })
        .await?;
    Ok(Json(MessagesResponse::new(messages)))
}

async fn search_channel(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<String>,
    ValidQuery(q): ValidQuery<TextSearchQuery>,
) -> Result<Json<MessagesResponse<Post>>, ApiError> {
    let (channel, text) = (channel.as_str(), q.q.as_str());
    let (offset_id, limit) = (offset(q.offset_id), limit(q.limit));
    let messages = state
        .runner
        .run("search_channel_messages", |client| async move {
            service::search_channel_messages(client.as_ref(), channel, text, offset_id, limit).await
        })
        .await?;
    Ok(Json(MessagesResponse::new(messages)))
}

async fn search_comments(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<String>,
    ValidQuery(q): ValidQuery<TextSearchQuery>,
) -> Result<Json<MessagesResponse<Post>>, ApiError> {
    let (channel, text) = (channel.as_str(), q.q.as_str());
    let (offset_id, limit) = (offset(q.offset_id), limit(q.limit));
    let messages = state
        .runner
        .run("search_comments", |client| async move {
            service::search_comments(client.as_ref(), channel, text, offset_id, limit).await
        })
        .await?;
    Ok(Json(MessagesResponse::new(messages)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use tgf_core::{
        domain::{FullChannel, MediaInfo},
        testing::{fetched, FakeData, FakeHandle},
        Error,
    };

    use super::super::test_support::{app, app_with, get, news_data};
    use super::*;

    fn text_post(id: i32, text: &str) -> Post {
        Post {
            text: text.into(),
            ..Post::new(id)
        }
    }

    #[tokio::test]
    async fn posts_return_messages_and_count() {
        let data = FakeData {
            messages: vec![
                fetched(text_post(2, "second"), None),
                fetched(text_post(1, "first"), None),
            ],
            ..news_data()
        };

        let (status, body) = get(app(data), "/api/channels/news/posts?limit=10").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["messages"][0]["id"], 2);
        assert_eq!(body["messages"][0]["text"], "second");
        assert!(body["messages"][0]["media"].is_null());
    }

    #[tokio::test]
    async fn unknown_channel_is_404_with_detail() {
        let (status, body) = get(app(news_data()), "/api/channels/nobody/posts").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "No user has \"nobody\" as username");
    }

    #[tokio::test]
    async fn out_of_range_paging_is_422() {
        for uri in [
            "/api/channels/news/posts?limit=0",
            "/api/channels/news/posts?limit=101",
            "/api/channels/news/posts?offset_id=-1",
            "/api/channels/news/posts?limit=abc",
            "/api/channels/news/photos?limit=51",
            "/api/channels/news/search?q=",
            "/api/channels/news/search",
        ] {
            let (status, body) = get(app(news_data()), uri).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
            assert!(body["detail"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn non_numeric_post_id_is_422() {
        let (status, _) = get(app(news_data()), "/api/channels/news/posts/abc/comments").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn comments_are_read_for_the_given_post() {
        let data = FakeData {
            replies: vec![text_post(11, "nice")],
            ..news_data()
        };
        let handle = Arc::new(FakeHandle::with_data("s1", data));
        let (app, _) = app_with(vec![handle.clone()]);

        let (status, body) = get(app, "/api/channels/news/posts/5/comments?offset_id=3").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(handle.calls().replies, vec![(5, 3, 20)]);
    }

    #[tokio::test]
    async fn photos_are_inlined_as_base64() {
        let photo = Post {
            media: Some(MediaInfo::new(MediaInfo::PHOTO)),
            ..Post::new(3)
        };
        let data = FakeData {
            messages: vec![fetched(photo, Some(vec![1, 2, 3])), fetched(text_post(2, "x"), None)],
            ..news_data()
        };

        let (status, body) = get(app(data), "/api/channels/news/photos").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["messages"][0]["id"], 3);
        assert_eq!(body["messages"][0]["photo_base64"], "AQID");
        assert_eq!(body["messages"][0]["media"]["type"], "MessageMediaPhoto");
    }

    #[tokio::test]
    async fn info_reports_full_channel_fields() {
        let data = FakeData {
            full_channel: Some(FullChannel {
                id: 100,
                title: Some("News".into()),
                username: Some("news".into()),
                about: Some("daily".into()),
                participants_count: Some(10),
                linked_chat_id: None,
                broadcast: true,
                megagroup: false,
                linked_chat: None,
            }),
            ..news_data()
        };

        let (status, body) = get(app(data), "/api/channels/news/info").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 100);
        assert_eq!(body["about"], "daily");
        assert_eq!(body["broadcast"], true);
        assert!(body["photo_url"].is_null());
    }

    #[tokio::test]
    async fn comment_search_without_discussion_group_is_404() {
        let data = FakeData {
            full_channel: Some(FullChannel {
                id: 100,
                title: None,
                username: None,
                about: None,
                participants_count: None,
                linked_chat_id: None,
                broadcast: true,
                megagroup: false,
                linked_chat: None,
            }),
            ..news_data()
        };

        let (status, body) = get(app(data), "/api/channels/news/comments/search?q=hi").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Channel news has no linked discussion group");
    }

    #[tokio::test]
    async fn empty_pool_is_503() {
        let (app, _) = app_with(Vec::new());
        let (status, body) = get(app, "/api/channels/news/posts").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"], Error::PoolExhausted.to_string());
    }
}
