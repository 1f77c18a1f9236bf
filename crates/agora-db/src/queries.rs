use crate::Database;
use crate::models::{OwnedWrite, PostFilter, PostPatch, PostRow, UserInsert, UserRow, VoteInsert, VoteRemoval};
use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

const POST_SELECT: &str = "
    SELECT p.id, p.title, p.content, p.published, p.created_at, p.owner_id,
           u.email, u.created_at, COUNT(v.post_id)
    FROM posts p
    JOIN users u ON u.id = p.owner_id
    LEFT JOIN votes v ON v.post_id = p.id";

impl Database {
    // -- Users --

    /// Insert a user. The UNIQUE(email) constraint backs the pre-check, so a
    /// racing duplicate still comes back as `EmailTaken`.
    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<UserInsert> {
        self.with_conn_mut(|conn| {
            if query_user_by_email(conn, email)?.is_some() {
                return Ok(UserInsert::EmailTaken);
            }

            insert_user(conn, email, password_hash)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, created_at FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    // -- Posts --

    pub fn create_post(&self, owner_id: i64, title: &str, content: &str, published: bool) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let id: i64 = tx.query_row(
                "INSERT INTO posts (title, content, published, owner_id) VALUES (?1, ?2, ?3, ?4)
                 RETURNING id",
                rusqlite::params![title, content, published, owner_id],
                |row| row.get(0),
            )?;
            let post = query_post(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("Post {} vanished after insert", id))?;
            tx.commit()?;
            Ok(post)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Page through posts with their vote counts, oldest id first. Posts
    /// without votes are included with a count of zero.
    pub fn list_posts(&self, filter: &PostFilter<'_>) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_SELECT}
                 WHERE ?1 = '' OR instr(casefold(p.title), casefold(?1)) > 0
                 GROUP BY p.id
                 ORDER BY p.id
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![filter.search, filter.limit, filter.offset],
                    post_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply only the supplied fields, and only if `caller_id` owns the post.
    pub fn update_post(&self, id: i64, caller_id: i64, patch: &PostPatch<'_>) -> Result<OwnedWrite<PostRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            match check_owner(&tx, id, caller_id)? {
                OwnedWrite::Done(()) => {}
                OwnedWrite::NotFound => return Ok(OwnedWrite::NotFound),
                OwnedWrite::NotOwner => return Ok(OwnedWrite::NotOwner),
            }

            tx.execute(
                "UPDATE posts
                 SET title = COALESCE(?1, title),
                     content = COALESCE(?2, content),
                     published = COALESCE(?3, published)
                 WHERE id = ?4",
                rusqlite::params![patch.title, patch.content, patch.published, id],
            )?;

            let post = query_post(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("Post {} vanished during update", id))?;
            tx.commit()?;
            Ok(OwnedWrite::Done(post))
        })
    }

    /// Delete a post and its votes in one transaction, owner only.
    pub fn delete_post(&self, id: i64, caller_id: i64) -> Result<OwnedWrite<()>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let outcome = check_owner(&tx, id, caller_id)?;
            if let OwnedWrite::Done(()) = outcome {
                // The FK cascade covers this too; be explicit about it
                let votes = tx.execute("DELETE FROM votes WHERE post_id = ?1", [id])?;
                tx.execute("DELETE FROM posts WHERE id = ?1", [id])?;
                tx.commit()?;
                debug!("Deleted post {} with {} votes", id, votes);
            }
            Ok(outcome)
        })
    }

    // -- Votes --

    /// Record a vote. The (post_id, user_id) primary key is the real guard
    /// against double votes; the SELECT beforehand only avoids the error path.
    pub fn insert_vote(&self, post_id: i64, user_id: i64) -> Result<VoteInsert> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !post_exists(&tx, post_id)? {
                return Ok(VoteInsert::PostMissing);
            }
            if vote_exists(&tx, post_id, user_id)? {
                return Ok(VoteInsert::Duplicate);
            }

            let outcome = insert_vote_row(&tx, post_id, user_id)?;
            if outcome == VoteInsert::Cast {
                tx.commit()?;
            }
            Ok(outcome)
        })
    }

    pub fn delete_vote(&self, post_id: i64, user_id: i64) -> Result<VoteRemoval> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !post_exists(&tx, post_id)? {
                return Ok(VoteRemoval::PostMissing);
            }

            let removed = tx.execute(
                "DELETE FROM votes WHERE post_id = ?1 AND user_id = ?2",
                [post_id, user_id],
            )?;
            if removed == 0 {
                return Ok(VoteRemoval::VoteMissing);
            }
            tx.commit()?;
            Ok(VoteRemoval::Retracted)
        })
    }

    /// Number of votes on a post. Does not check that the post exists.
    pub fn count_votes(&self, post_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM votes WHERE post_id = ?1", [post_id], |r| r.get(0))?;
            Ok(count)
        })
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        published: row.get(3)?,
        created_at: row.get(4)?,
        owner_id: row.get(5)?,
        owner_email: row.get(6)?,
        owner_created_at: row.get(7)?,
        votes: row.get(8)?,
    })
}

/// Plain insert; a UNIQUE(email) violation is reported as `EmailTaken`.
fn insert_user(conn: &Connection, email: &str, password_hash: &str) -> Result<UserInsert> {
    let inserted = conn.query_row(
        "INSERT INTO users (email, password) VALUES (?1, ?2)
         RETURNING id, email, password, created_at",
        (email, password_hash),
        user_from_row,
    );

    match inserted {
        Ok(user) => Ok(UserInsert::Created(user)),
        Err(e) if is_unique_violation(&e) => Ok(UserInsert::EmailTaken),
        Err(e) => Err(e.into()),
    }
}

/// Plain insert; a (post_id, user_id) key violation is reported as `Duplicate`.
fn insert_vote_row(conn: &Connection, post_id: i64, user_id: i64) -> Result<VoteInsert> {
    match conn.execute(
        "INSERT INTO votes (post_id, user_id) VALUES (?1, ?2)",
        [post_id, user_id],
    ) {
        Ok(_) => Ok(VoteInsert::Cast),
        Err(e) if is_unique_violation(&e) => Ok(VoteInsert::Duplicate),
        Err(e) => Err(e.into()),
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        "SELECT id, email, password, created_at FROM users WHERE email = ?1",
        [email],
        user_from_row,
    )
    .optional()
}

fn query_post(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    let sql = format!("{POST_SELECT} WHERE p.id = ?1 GROUP BY p.id");
    conn.query_row(&sql, [id], post_from_row).optional()
}

fn check_owner(conn: &Connection, id: i64, caller_id: i64) -> Result<OwnedWrite<()>> {
    let owner: Option<i64> = conn
        .query_row("SELECT owner_id FROM posts WHERE id = ?1", [id], |r| r.get(0))
        .optional()?;

    Ok(match owner {
        None => OwnedWrite::NotFound,
        Some(owner_id) if owner_id != caller_id => OwnedWrite::NotOwner,
        Some(_) => OwnedWrite::Done(()),
    })
}

fn post_exists(conn: &Connection, id: i64) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM posts WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn vote_exists(conn: &Connection, post_id: i64, user_id: i64) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM votes WHERE post_id = ?1 AND user_id = ?2",
            [post_id, user_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
