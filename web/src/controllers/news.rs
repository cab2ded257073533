use axum::{
    Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, header},
    routing::{get, post, put},
};
use newsroom_db::{
    Validate,
    entities::news::{News, NewsChangeset},
    pagination::Pagination,
};
use serde::Deserialize;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::{
    error::Error,
    middlewares::auth::AuthSession,
    state::AppState,
    uploads::{MultipartForm, remove_image},
    views::news::{NewsResource, NewsView},
};

/// Listings may be cached briefly by clients and proxies.
const INDEX_CACHE_CONTROL: &str = "public, max-age=60";

/// `page` and `limit` as sent by the client. Anything that is not a number counts as missing.
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

impl From<PageQuery> for Pagination {
    fn from(query: PageQuery) -> Self {
        let parse = |value: Option<String>| value.and_then(|v| v.trim().parse::<i64>().ok());
        Pagination::new(parse(query.page), parse(query.limit))
    }
}

pub struct NewsController;

impl NewsController {
    /// Routes anyone can call.
    pub fn public_router() -> Router<AppState> {
        Router::new()
            .route(
                "/news",
                get(NewsController::index).layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static(INDEX_CACHE_CONTROL),
                )),
            )
            .route("/news/{id}", get(NewsController::show))
    }

    /// Routes that need a logged in user.
    pub fn router() -> Router<AppState> {
        Router::new().route("/news", post(NewsController::store)).route(
            "/news/{id}",
            put(NewsController::update).delete(NewsController::destroy),
        )
    }

    pub async fn index(
        Query(query): Query<PageQuery>,
        State(app_state): State<AppState>,
    ) -> Result<NewsView, Error> {
        let pagination = Pagination::from(query);

        let news = News::load_page(pagination, &app_state.db_pool)
            .await?
            .into_iter()
            .map(|news| NewsResource::new(news, &app_state.config))
            .collect();
        let total = News::count(&app_state.db_pool).await?;

        Ok(NewsView::Index(news, pagination.metadata(total)))
    }

    pub async fn show(
        Path(id): Path<i64>,
        State(app_state): State<AppState>,
    ) -> Result<NewsView, Error> {
        let news = News::load_with_reporter(id, &app_state.db_pool).await?;

        Ok(NewsView::Show(NewsResource::new(news, &app_state.config)))
    }

    pub async fn store(
        auth_session: AuthSession,
        State(app_state): State<AppState>,
        multipart: Multipart,
    ) -> Result<NewsView, Error> {
        let user = auth_session.user.ok_or(Error::Unauthenticated)?;

        let mut form = MultipartForm::read(multipart).await?;
        let changeset = NewsChangeset {
            title: form.text("title"),
            content: form.text("content"),
        };
        changeset.validate().map_err(newsroom_db::Error::from)?;

        let upload = form
            .file("image")
            .ok_or_else(|| Error::invalid("image", "Image field is required"))?;

        let uploads = &app_state.config.uploads;
        let image = upload.store(uploads, "image").await?;

        let news = match News::create(user.id, changeset, &image, &app_state.db_pool).await {
            Ok(news) => news,
            Err(e) => {
                remove_image(uploads, &image).await?;
                return Err(e.into());
            }
        };

        tracing::info!(news_id = news.id, user_id = user.id, "news created");

        let news = News::load_with_reporter(news.id, &app_state.db_pool).await?;

        Ok(NewsView::Created(NewsResource::new(news, &app_state.config)))
    }

    pub async fn update(
        auth_session: AuthSession,
        Path(id): Path<i64>,
        State(app_state): State<AppState>,
        multipart: Multipart,
    ) -> Result<NewsView, Error> {
        let user = auth_session.user.ok_or(Error::Unauthenticated)?;

        let existing = News::load(id, &app_state.db_pool).await?;
        if existing.user_id != user.id {
            return Err(Error::Forbidden);
        }

        let mut form = MultipartForm::read(multipart).await?;
        let changeset = NewsChangeset {
            title: form.text("title"),
            content: form.text("content"),
        };
        changeset.validate().map_err(newsroom_db::Error::from)?;

        let uploads = &app_state.config.uploads;
        let image = match form.file("image") {
            Some(upload) => Some(upload.store(uploads, "image").await?),
            None => None,
        };

        if let Err(e) = News::update(id, changeset, image.as_deref(), &app_state.db_pool).await {
            if let Some(image) = &image {
                remove_image(uploads, image).await?;
            }
            return Err(e.into());
        }

        if image.is_some() {
            remove_image(uploads, &existing.image).await?;
        }

        tracing::info!(news_id = id, user_id = user.id, "news updated");

        let news = News::load_with_reporter(id, &app_state.db_pool).await?;

        Ok(NewsView::Updated(NewsResource::new(news, &app_state.config)))
    }

    pub async fn destroy(
        auth_session: AuthSession,
        Path(id): Path<i64>,
        State(app_state): State<AppState>,
    ) -> Result<NewsView, Error> {
        let user = auth_session.user.ok_or(Error::Unauthenticated)?;

        let existing = News::load(id, &app_state.db_pool).await?;
        if existing.user_id != user.id {
            return Err(Error::Forbidden);
        }

        // the row comes back if the image cannot be removed
        let mut tx = newsroom_db::transaction(&app_state.db_pool).await?;
        let deleted = News::delete(id, &mut *tx).await?;
        remove_image(&app_state.config.uploads, &deleted.image).await?;
        tx.commit().await.map_err(newsroom_db::Error::from)?;

        tracing::info!(news_id = id, user_id = user.id, "news deleted");

        Ok(NewsView::Deleted)
    }
}
