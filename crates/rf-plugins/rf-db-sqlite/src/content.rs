//! `ContentRepo`: posts, comments, categories and the cascades that remove them.

use async_trait::async_trait;
use rf_core::error::{AppError, Result};
use rf_core::models::{
    CascadeSummary, Category, Comment, NewPost, Post, PostSort, PostView, Target, VoteTally,
};
use rf_core::traits::ContentRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

use crate::{is_foreign_key_violation, is_unique_violation, storage, SqliteForumRepo};

const POST_COLUMNS: &str = "id, user_id, title, content, created_at";
const COMMENT_COLUMNS: &str = "id, post_id, user_id, content, created_at";

/// Posts with their own vote counts. Callers append `WHERE`, `GROUP BY p.id`
/// and an ordering.
const POSTS_WITH_TALLY: &str = "SELECT p.id, p.user_id, p.title, p.content, p.created_at, \
     COALESCE(SUM(v.is_like = 1), 0) AS likes, COALESCE(SUM(v.is_like = 0), 0) AS dislikes \
     FROM posts p LEFT JOIN votes v ON v.post_id = p.id";

/// Rows hanging off a post directly or through one of its comments.
const ON_POST_OR_ITS_COMMENTS: &str =
    "post_id = ?1 OR comment_id IN (SELECT id FROM comments WHERE post_id = ?1)";

fn post_from_row(row: &SqliteRow) -> sqlx::Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        author_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

fn tally_from_row(row: &SqliteRow) -> sqlx::Result<VoteTally> {
    Ok(VoteTally {
        likes: row.try_get("likes")?,
        dislikes: row.try_get("dislikes")?,
    })
}

fn order_by(sort: PostSort) -> &'static str {
    match sort {
        PostSort::Newest => "p.created_at DESC, p.id DESC",
        PostSort::MostLiked => "likes DESC, p.created_at DESC, p.id DESC",
    }
}

/// Attaches categories and the first image to a post row.
async fn post_view(conn: &mut SqliteConnection, row: &SqliteRow) -> sqlx::Result<PostView> {
    let post = post_from_row(row)?;

    let categories = sqlx::query(
        "SELECT c.id, c.name FROM categories c \
         JOIN post_categories pc ON pc.category_id = c.id \
         WHERE pc.post_id = ? ORDER BY c.name",
    )
    .bind(post.id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(category_from_row)
    .collect::<sqlx::Result<_>>()?;

    let image_path = sqlx::query_scalar(
        "SELECT file_path FROM images WHERE post_id = ? ORDER BY uploaded_at, id LIMIT 1",
    )
    .bind(post.id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(PostView {
        tally: tally_from_row(row)?,
        post,
        categories,
        image_path,
    })
}

fn category_from_row(row: &SqliteRow) -> sqlx::Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> sqlx::Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        author_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ContentRepo for SqliteForumRepo {
    async fn insert_post(&self, new_post: &NewPost) -> Result<()> {
        let post = &new_post.post;
        let mut tx = self.pool.begin().await.map_err(storage("begin post insert"))?;

        sqlx::query("INSERT INTO posts (id, user_id, title, content, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(post.id)
            .bind(post.author_id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    AppError::not_found("identity", post.author_id)
                } else {
                    storage("insert post")(err)
                }
            })?;

        for category_id in &new_post.category_ids {
            sqlx::query("INSERT OR IGNORE INTO post_categories (post_id, category_id) VALUES (?, ?)")
                .bind(post.id)
                .bind(category_id)
                .execute(&mut *tx)
                .await
                .map_err(|err| {
                    if is_foreign_key_violation(&err) {
                        AppError::not_found("category", category_id)
                    } else {
                        storage("link post category")(err)
                    }
                })?;
        }

        if let Some(path) = &new_post.image_path {
            sqlx::query("INSERT INTO images (id, post_id, file_path, uploaded_at) VALUES (?, ?, ?, ?)")
                .bind(Uuid::now_v7())
                .bind(post.id)
                .bind(path)
                .bind(post.created_at)
                .execute(&mut *tx)
                .await
                .map_err(storage("insert post image"))?;
        }

        tx.commit().await.map_err(storage("commit post insert"))
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("find post"))?;

        row.as_ref()
            .map(post_from_row)
            .transpose()
            .map_err(storage("decode post"))
    }

    async fn update_post(&self, id: Uuid, title: &str, content: &str) -> Result<()> {
        let result = sqlx::query("UPDATE posts SET title = ?, content = ? WHERE id = ?")
            .bind(title)
            .bind(content)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage("update post"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("post", id));
        }
        Ok(())
    }

    async fn delete_post_cascade(&self, id: Uuid) -> Result<CascadeSummary> {
        let mut tx = self.pool.begin().await.map_err(storage("begin post cascade"))?;
        let mut summary = CascadeSummary::default();

        summary.votes = sqlx::query(&format!("DELETE FROM votes WHERE {ON_POST_OR_ITS_COMMENTS}"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage("cascade votes"))?
            .rows_affected();

        summary.notifications =
            sqlx::query(&format!("DELETE FROM notifications WHERE {ON_POST_OR_ITS_COMMENTS}"))
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(storage("cascade notifications"))?
                .rows_affected();

        summary.reports = sqlx::query(&format!("DELETE FROM reports WHERE {ON_POST_OR_ITS_COMMENTS}"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage("cascade reports"))?
            .rows_affected();

        summary.comments = sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage("cascade comments"))?
            .rows_affected();

        summary.category_links = sqlx::query("DELETE FROM post_categories WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage("cascade category links"))?
            .rows_affected();

        summary.images = sqlx::query("DELETE FROM images WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage("cascade images"))?
            .rows_affected();

        let removed = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage("delete post"))?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await.map_err(storage("rollback post cascade"))?;
            return Err(AppError::not_found("post", id));
        }

        tx.commit().await.map_err(storage("commit post cascade"))?;
        debug!(post_id = %id, ?summary, "post cascade committed");
        Ok(summary)
    }

    async fn posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage("list posts by author"))?;

        rows.iter()
            .map(post_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(storage("decode post"))
    }

    async fn list_posts(&self, category_id: Option<Uuid>, sort: PostSort) -> Result<Vec<PostView>> {
        let mut conn = self.pool.acquire().await.map_err(storage("acquire for post feed"))?;
        let rows = sqlx::query(&format!(
            "{POSTS_WITH_TALLY} WHERE ?1 IS NULL OR EXISTS \
             (SELECT 1 FROM post_categories pc WHERE pc.post_id = p.id AND pc.category_id = ?1) \
             GROUP BY p.id ORDER BY {}",
            order_by(sort)
        ))
        .bind(category_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage("list posts"))?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            views.push(post_view(&mut *conn, row).await.map_err(storage("load post view"))?);
        }
        Ok(views)
    }

    async fn find_post_view(&self, id: Uuid) -> Result<Option<PostView>> {
        let mut conn = self.pool.acquire().await.map_err(storage("acquire for post view"))?;
        let row = sqlx::query(&format!("{POSTS_WITH_TALLY} WHERE p.id = ? GROUP BY p.id"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage("find post view"))?;

        match row {
            Some(row) => post_view(&mut *conn, &row)
                .await
                .map(Some)
                .map_err(storage("load post view")),
            None => Ok(None),
        }
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO comments (id, post_id, user_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(AppError::not_found("post", comment.post_id))
            }
            Err(err) => Err(storage("insert comment")(err)),
        }
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("find comment"))?;

        row.as_ref()
            .map(comment_from_row)
            .transpose()
            .map_err(storage("decode comment"))
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> Result<()> {
        let result = sqlx::query("UPDATE comments SET content = ? WHERE id = ?")
            .bind(content)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage("update comment"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("comment", id));
        }
        Ok(())
    }

    async fn delete_comment_cascade(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage("begin comment cascade"))?;

        for (sql, operation) in [
            ("DELETE FROM votes WHERE comment_id = ?", "cascade comment votes"),
            ("DELETE FROM notifications WHERE comment_id = ?", "cascade comment notifications"),
            ("DELETE FROM reports WHERE comment_id = ?", "cascade comment reports"),
        ] {
            sqlx::query(sql)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(storage(operation))?;
        }

        let removed = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage("delete comment"))?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await.map_err(storage("rollback comment cascade"))?;
            return Err(AppError::not_found("comment", id));
        }

        tx.commit().await.map_err(storage("commit comment cascade"))
    }

    async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ? ORDER BY created_at, id"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage("list comments for post"))?;

        rows.iter()
            .map(comment_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(storage("decode comment"))
    }

    async fn comments_by_author(&self, author_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage("list comments by author"))?;

        rows.iter()
            .map(comment_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(storage("decode comment"))
    }

    async fn target_owner(&self, target: Target) -> Result<Option<Uuid>> {
        let sql = match target {
            Target::Post(_) => "SELECT user_id FROM posts WHERE id = ?",
            Target::Comment(_) => "SELECT user_id FROM comments WHERE id = ?",
        };
        sqlx::query_scalar(sql)
            .bind(target.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("find target owner"))
    }

    async fn insert_category(&self, category: &Category) -> Result<()> {
        let result = sqlx::query("INSERT INTO categories (id, name) VALUES (?, ?)")
            .bind(category.id)
            .bind(&category.name)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(AppError::AlreadyTaken("category name".into()))
            }
            Err(err) => Err(storage("insert category")(err)),
        }
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(storage("list categories"))?;

        rows.iter()
            .map(category_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(storage("decode category"))
    }
}
