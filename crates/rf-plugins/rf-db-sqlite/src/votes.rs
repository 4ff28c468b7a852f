//! `VoteRepo`: the toggle transaction and tallies.

use async_trait::async_trait;
use rf_core::error::{AppError, Result};
use rf_core::models::{Target, Vote, VoteKind, VoteOutcome, VoteTally, VoteTransition};
use rf_core::traits::VoteRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::{is_foreign_key_violation, storage, target_from_columns, SqliteForumRepo};

fn target_column(target: Target) -> &'static str {
    match target {
        Target::Post(_) => "post_id",
        Target::Comment(_) => "comment_id",
    }
}

fn vote_from_row(row: &SqliteRow) -> sqlx::Result<Vote> {
    Ok(Vote {
        id: row.try_get("id")?,
        voter_id: row.try_get("user_id")?,
        target: target_from_columns(row.try_get("post_id")?, row.try_get("comment_id")?)?,
        kind: VoteKind::from_like(row.try_get("is_like")?),
        created_at: row.try_get("created_at")?,
    })
}

async fn tally_on(conn: &mut SqliteConnection, target: Target) -> Result<VoteTally> {
    let (likes, dislikes): (i64, i64) = sqlx::query_as(&format!(
        "SELECT COALESCE(SUM(is_like = 1), 0), COALESCE(SUM(is_like = 0), 0) FROM votes WHERE {} = ?",
        target_column(target)
    ))
    .bind(target.id())
    .fetch_one(conn)
    .await
    .map_err(storage("tally votes"))?;

    Ok(VoteTally { likes, dislikes })
}

#[async_trait]
impl VoteRepo for SqliteForumRepo {
    async fn toggle_vote(&self, vote: &Vote) -> Result<VoteOutcome> {
        let column = target_column(vote.target);
        let mut tx = self.pool.begin().await.map_err(storage("begin vote toggle"))?;

        // Any existing vote is removed regardless of direction.
        let withdrawn: Option<bool> = sqlx::query_scalar(&format!(
            "DELETE FROM votes WHERE user_id = ? AND {column} = ? RETURNING is_like"
        ))
        .bind(vote.voter_id)
        .bind(vote.target.id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage("withdraw vote"))?;

        let owner_sql = match vote.target {
            Target::Post(_) => "SELECT user_id FROM posts WHERE id = ?",
            Target::Comment(_) => "SELECT user_id FROM comments WHERE id = ?",
        };
        let owner: Option<Uuid> = sqlx::query_scalar(owner_sql)
            .bind(vote.target.id())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage("find vote target"))?;
        let Some(target_owner) = owner else {
            tx.rollback().await.map_err(storage("rollback vote toggle"))?;
            return Err(AppError::not_found(vote.target.entity(), vote.target.id()));
        };

        let transition = match withdrawn {
            Some(is_like) => VoteTransition::Withdrawn(VoteKind::from_like(is_like)),
            None => {
                sqlx::query(
                    "INSERT INTO votes (id, user_id, post_id, comment_id, is_like, created_at) VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(vote.id)
                .bind(vote.voter_id)
                .bind(vote.target.post_id())
                .bind(vote.target.comment_id())
                .bind(vote.kind.is_like())
                .bind(vote.created_at)
                .execute(&mut *tx)
                .await
                .map_err(|err| {
                    if is_foreign_key_violation(&err) {
                        AppError::not_found("identity", vote.voter_id)
                    } else {
                        storage("insert vote")(err)
                    }
                })?;
                VoteTransition::Cast(vote.kind)
            }
        };

        let tally = tally_on(&mut *tx, vote.target).await?;
        tx.commit().await.map_err(storage("commit vote toggle"))?;

        Ok(VoteOutcome {
            transition,
            tally,
            target_owner,
        })
    }

    async fn tally(&self, target: Target) -> Result<VoteTally> {
        let mut conn = self.pool.acquire().await.map_err(storage("acquire connection"))?;
        tally_on(&mut *conn, target).await
    }

    async fn votes_by_voter(&self, voter_id: Uuid) -> Result<Vec<Vote>> {
        let rows = sqlx::query(
            "SELECT id, user_id, post_id, comment_id, is_like, created_at FROM votes WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(voter_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage("list votes by voter"))?;

        rows.iter()
            .map(vote_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(storage("decode vote"))
    }
}
