//! Database repositories
//!
//! One repository per aggregate. Each exposes an async trait (so services can
//! be handed an `Arc<dyn ...>`) and an `Sqlx*Repository` implementation that
//! runs the same SQL against SQLite or MySQL.

/// Run `$body` with `$pool` bound to the concrete sqlx pool behind a
/// [`DynDatabasePool`](crate::db::DynDatabasePool).
///
/// The body is expanded once per driver, so it must only use SQL both
/// dialects accept.
macro_rules! with_pool {
    ($db:expr, |$pool:ident| $body:expr) => {
        match $db.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $pool = ::anyhow::Context::context($db.as_sqlite(), "SQLite pool unavailable")?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $pool = ::anyhow::Context::context($db.as_mysql(), "MySQL pool unavailable")?;
                $body
            }
        }
    };
}

pub mod category;
pub mod course;
pub mod invitation;
pub mod lesson;
pub mod note;
pub mod session;
pub mod tag;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use course::{CourseRepository, SqlxCourseRepository};
pub use invitation::{InvitationRepository, SqlxInvitationRepository};
pub use lesson::{LessonRepository, SqlxLessonRepository};
pub use note::{NoteRepository, SqlxNoteRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Id of the row an INSERT just created, for either backend.
pub(crate) trait InsertedId {
    fn inserted_id(&self) -> i64;
}

impl InsertedId for sqlx::sqlite::SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertedId for sqlx::mysql::MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}
