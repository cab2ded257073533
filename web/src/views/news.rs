use axum::{
    Json,
    response::{IntoResponse, Response},
};
use chrono::NaiveDateTime;
use newsroom_config::Config;
use newsroom_db::{entities::news::NewsWithReporter, pagination::PageMetadata};
use serde::Serialize;
use serde_json::json;

use crate::uploads::{PLACEHOLDER_AVATAR, image_url};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReporterResource {
    pub id: i64,
    pub name: String,
    pub profile: String,
}

/// The public shape of an article.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewsResource {
    pub id: i64,
    pub heading: String,
    pub news: String,
    pub image: String,
    pub created_at: NaiveDateTime,
    pub reporter: ReporterResource,
}

impl NewsResource {
    pub fn new(news: NewsWithReporter, config: &Config) -> Self {
        let profile = match &news.reporter_profile {
            Some(name) => image_url(config, name),
            None => PLACEHOLDER_AVATAR.to_string(),
        };

        Self {
            id: news.id,
            heading: news.title,
            news: news.content,
            image: image_url(config, &news.image),
            created_at: news.created_at,
            reporter: ReporterResource {
                id: news.user_id,
                name: news.reporter_name,
                profile,
            },
        }
    }
}

pub enum NewsView {
    Index(Vec<NewsResource>, PageMetadata),
    Show(NewsResource),
    Created(NewsResource),
    Updated(NewsResource),
    Deleted,
}

impl IntoResponse for NewsView {
    fn into_response(self) -> Response {
        match self {
            NewsView::Index(news, metadata) => Json(json!({
                "status": 200,
                "news": news,
                "metadata": metadata,
            }))
            .into_response(),
            NewsView::Show(news) => Json(json!({ "status": 200, "news": news })).into_response(),
            NewsView::Created(news) => Json(json!({
                "status": 200,
                "message": "News successfully created..!",
                "news": news,
            }))
            .into_response(),
            NewsView::Updated(news) => Json(json!({
                "status": 200,
                "message": "News updated successfully!",
                "news": news,
            }))
            .into_response(),
            NewsView::Deleted => Json(json!({
                "status": 200,
                "message": "News deleted successfully!",
            }))
            .into_response(),
        }
    }
}
