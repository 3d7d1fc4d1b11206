pub mod models;
pub mod users;
pub mod posts;
pub mod comments;
pub mod votes;
pub mod messages;
pub mod files;
pub mod reports;
pub mod communities;

pub use models::{
    Comment, Community, CommunityPost, Member, MemberRole, Message, Post, Report, ReportStatus,
    StoredFile, User, Vote, VoteScore, VoteType,
};
pub use users::UserRepository;
pub use posts::PostRepository;
pub use comments::CommentRepository;
pub use votes::{CastVote, VoteRepository, VoteTarget};
pub use messages::MessageRepository;
pub use files::{FileRepository, NewFile};
pub use reports::ReportRepository;
pub use communities::CommunityRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;
use crate::error::AppError;

/// Open the pool and bring the schema up to date.
pub async fn connect(config: &Config) -> Result<Pool<Sqlite>, AppError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
