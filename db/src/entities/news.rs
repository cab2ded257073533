#[cfg(any(test, feature = "test-helpers"))]
use fake::{Dummy, faker::lorem::en::*};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, prelude::FromRow};
use validator::Validate;

use crate::{Error, pagination::Pagination};

/// A news article.
#[derive(Serialize, Debug, Deserialize, FromRow, Clone)]
pub struct News {
    pub id: i64,
    /// The user who published the article.
    pub user_id: i64,
    pub title: String,
    pub content: String,
    /// File name of the article image.
    pub image: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A news article joined with the public fields of its reporter.
#[derive(Serialize, Debug, FromRow, Clone)]
pub struct NewsWithReporter {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub image: String,
    pub created_at: NaiveDateTime,
    pub reporter_name: String,
    pub reporter_profile: Option<String>,
}

/// A changeset representing the data that is intended to be used to either create a new article or update an existing one.
///
/// Changesets are validated in the [`News::create`] and [`News::update`] functions which return an [Result::Err] if validation fails.
///
/// Changesets can also be used to generate fake data for tests when the `test-helpers` feature is enabled:
///
/// ```
/// let news_changeset: NewsChangeset = Faker.fake();
/// ```
#[derive(Deserialize, Validate, Clone, Debug)]
#[cfg_attr(any(test, feature = "test-helpers"), derive(Serialize, Dummy))]
pub struct NewsChangeset {
    #[cfg_attr(any(test, feature = "test-helpers"), dummy(faker = "Sentence(3..8)"))]
    #[validate(length(min = 5, max = 150, message = "title must be between 5 and 150 characters"))]
    pub title: String,
    #[cfg_attr(any(test, feature = "test-helpers"), dummy(faker = "Paragraph(2..4)"))]
    #[validate(length(
        min = 10,
        max = 10000,
        message = "content must be between 10 and 10000 characters"
    ))]
    pub content: String,
}

const SELECT_WITH_REPORTER: &str = r#"
    select news.id, news.user_id, news.title, news.content, news.image, news.created_at,
           users.name as reporter_name, users.profile as reporter_profile
    from news
    inner join users on users.id = news.user_id
"#;

impl News {
    pub async fn load(
        id: i64,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<News, Error> {
        let news = sqlx::query_as::<_, News>(
            r#"select * from news where id = ?

"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(Error::NoRecordFound)?;

        Ok(news)
    }

    pub async fn load_with_reporter(
        id: i64,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<NewsWithReporter, Error> {
        let news = sqlx::query_as::<_, NewsWithReporter>(&format!(
            "{} where news.id = ?",
            SELECT_WITH_REPORTER
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(Error::NoRecordFound)?;

        Ok(news)
    }

    /// Loads one page of articles, newest first.
    pub async fn load_page(
        pagination: Pagination,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<Vec<NewsWithReporter>, Error> {
        let news = sqlx::query_as::<_, NewsWithReporter>(&format!(
            "{} order by news.id desc limit ? offset ?",
            SELECT_WITH_REPORTER
        ))
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(executor)
        .await?;

        Ok(news)
    }

    pub async fn count(executor: impl sqlx::Executor<'_, Database = Sqlite>) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar("select count(*) from news")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }

    pub async fn create(
        user_id: i64,
        news: NewsChangeset,
        image: &str,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<News, Error> {
        news.validate()?;

        let news = sqlx::query_as::<_, News>(
            r#"insert into news (user_id, title, content, image) values (?, ?, ?, ?) returning *

"#,
        )
        .bind(user_id)
        .bind(news.title)
        .bind(news.content)
        .bind(image)
        .fetch_one(executor)
        .await?;

        Ok(news)
    }

    /// Updates title and content, and the image when a new one is given.
    pub async fn update(
        id: i64,
        news: NewsChangeset,
        image: Option<&str>,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<News, Error> {
        news.validate()?;

        let news = sqlx::query_as::<_, News>(
            r#"update news
            set title = ?, content = ?, image = coalesce(?, image), updated_at = current_timestamp
            where id = ?
            returning *

"#,
        )
        .bind(news.title)
        .bind(news.content)
        .bind(image)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(Error::NoRecordFound)?;

        Ok(news)
    }

    pub async fn delete(
        id: i64,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<News, Error> {
        let news = sqlx::query_as::<_, News>(
            r#"delete from news where id = ? returning *

"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(Error::NoRecordFound)?;

        Ok(news)
    }
}
