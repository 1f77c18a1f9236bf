use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use agora_db::{PostRow, UserRow};
use agora_types::models::{Post, PostWithVotes, User};

pub fn user(row: UserRow) -> User {
    User {
        created_at: timestamp(&row.created_at, "user", row.id),
        id: row.id,
        email: row.email,
    }
}

pub fn post(row: PostRow) -> PostWithVotes {
    let owner = User {
        id: row.owner_id,
        email: row.owner_email,
        created_at: timestamp(&row.owner_created_at, "user", row.owner_id),
    };

    PostWithVotes {
        post: Post {
            created_at: timestamp(&row.created_at, "post", row.id),
            id: row.id,
            title: row.title,
            content: row.content,
            published: row.published,
            owner_id: row.owner_id,
            owner,
        },
        votes: row.votes,
    }
}

fn timestamp(raw: &str, kind: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            // Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {} {}: {}", raw, kind, id, e);
            DateTime::default()
        })
}
