/// Database row types — these map directly to SQLite rows.
/// Distinct from agora-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

/// A post joined with its owner and its vote count.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub created_at: String,
    pub owner_id: i64,
    pub owner_email: String,
    pub owner_created_at: String,
    pub votes: i64,
}

pub struct PostFilter<'a> {
    pub search: &'a str,
    pub limit: u32,
    pub offset: u32,
}

/// Fields to change on a post; `None` leaves the stored value alone.
pub struct PostPatch<'a> {
    pub title: Option<&'a str>,
    pub content: Option<&'a str>,
    pub published: Option<bool>,
}

pub enum UserInsert {
    Created(UserRow),
    EmailTaken,
}

/// Outcome of a write that is only allowed for the post's owner.
pub enum OwnedWrite<T> {
    Done(T),
    NotFound,
    NotOwner,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VoteInsert {
    Cast,
    PostMissing,
    Duplicate,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VoteRemoval {
    Retracted,
    PostMissing,
    VoteMissing,
}
