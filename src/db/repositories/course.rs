//! Course repository
//!
//! Courses plus the many-to-many tables hanging off them: enrolled students,
//! favorites and collaborators. Tags are handled by the tag repository.

use super::InsertedId;
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Course, CourseSearch, CourseStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;

/// Course repository trait
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: &Course) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    /// Exact title match within a status
    async fn find_by_title_status(&self, title: &str, status: CourseStatus) -> Result<Option<Course>>;

    /// Persist every mutable field and bump `updated_at`
    async fn update(&self, course: &Course) -> Result<Course>;

    /// Delete a course; lessons, notes and memberships cascade
    async fn delete(&self, id: i64) -> Result<()>;

    /// Public courses matching the filters, ranked, with the total match count.
    ///
    /// With a query, title matches come first, then tag matches, then
    /// description matches, each group ordered by title. Without one the
    /// newest courses come first.
    async fn search(&self, search: &CourseSearch, params: &ListParams) -> Result<(Vec<Course>, i64)>;

    /// Courses created by a user, newest first
    async fn list_by_creator(&self, user_id: i64) -> Result<Vec<Course>>;

    /// Courses a user is enrolled in, most recent enrollment first
    async fn list_enrolled(&self, user_id: i64) -> Result<Vec<Course>>;

    async fn list_favorites(&self, user_id: i64) -> Result<Vec<Course>>;

    /// Public courses sharing a tag or the creator with `course`, excluding it
    async fn related(&self, course: &Course, limit: i64) -> Result<Vec<Course>>;

    async fn is_enrolled(&self, course_id: i64, user_id: i64) -> Result<bool>;

    /// Returns false when the user was already enrolled
    async fn enroll(&self, course_id: i64, user_id: i64) -> Result<bool>;

    /// Returns false when there was no enrollment to remove
    async fn unenroll(&self, course_id: i64, user_id: i64) -> Result<bool>;

    async fn count_students(&self, course_id: i64) -> Result<i64>;

    async fn is_favorite(&self, course_id: i64, user_id: i64) -> Result<bool>;

    /// Idempotent
    async fn add_favorite(&self, course_id: i64, user_id: i64) -> Result<()>;

    /// Idempotent
    async fn remove_favorite(&self, course_id: i64, user_id: i64) -> Result<()>;

    async fn is_collaborator(&self, course_id: i64, user_id: i64) -> Result<bool>;

    /// Idempotent
    async fn add_collaborator(&self, course_id: i64, user_id: i64) -> Result<()>;

    /// Returns false when the user was not a collaborator
    async fn remove_collaborator(&self, course_id: i64, user_id: i64) -> Result<bool>;

    /// Collaborator user ids in the order they joined
    async fn list_collaborator_ids(&self, course_id: i64) -> Result<Vec<i64>>;
}

/// SQLx-based course repository implementation
pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }

    /// `SELECT COUNT(*)` over a membership table for one (course, user) pair
    async fn membership_exists(&self, table: &str, course_id: i64, user_id: i64) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE course_id = ? AND user_id = ?",
            table
        );
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(course_id)
                .bind(user_id)
                .fetch_one(pool)
                .await
                .with_context(|| format!("Failed to check {}", table))?
        });
        Ok(count > 0)
    }

    /// Insert a membership row; an existing row is left alone and gives false
    async fn membership_insert(&self, table: &str, course_id: i64, user_id: i64) -> Result<bool> {
        let insert = match self.pool.driver() {
            DatabaseDriver::Sqlite => "INSERT OR IGNORE",
            DatabaseDriver::Mysql => "INSERT IGNORE",
        };
        let sql = format!(
            "{} INTO {} (course_id, user_id, {}) VALUES (?, ?, ?)",
            insert,
            table,
            if table == "course_students" { "enrolled_at" } else { "created_at" }
        );
        let inserted = with_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(course_id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(pool)
                .await
                .with_context(|| format!("Failed to insert into {}", table))?
                .rows_affected()
        });
        Ok(inserted > 0)
    }

    async fn membership_delete(&self, table: &str, course_id: i64, user_id: i64) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE course_id = ? AND user_id = ?", table);
        let removed = with_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(course_id)
                .bind(user_id)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to delete from {}", table))?
                .rows_affected()
        });
        Ok(removed > 0)
    }

    /// Run a course listing with a single user-id parameter
    async fn list_for_user(&self, sql: &str, user_id: i64) -> Result<Vec<Course>> {
        let rows = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, CourseRow>(sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list courses")?
        });
        rows.into_iter().map(Course::try_from).collect()
    }
}

const COURSE_COLUMNS: &str = "c.id, c.title, c.description, c.status, c.creator_id, \
                              c.category_id, c.cover_url, c.created_at, c.updated_at";

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: i64,
    title: String,
    description: String,
    status: String,
    creator_id: i64,
    category_id: Option<i64>,
    cover_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CourseRow> for Course {
    type Error = anyhow::Error;

    fn try_from(row: CourseRow) -> Result<Self> {
        Ok(Course {
            id: row.id,
            title: row.title,
            description: row.description,
            status: CourseStatus::from_str(&row.status)?,
            creator_id: row.creator_id,
            category_id: row.category_id,
            cover_url: row.cover_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escape LIKE wildcards with `!`, which needs no quoting in either dialect.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '!' | '%' | '_') {
            out.push('!');
        }
        out.push(c);
    }
    out
}

/// SQL text and bind values for a course search.
struct SearchQuery {
    select: String,
    count: String,
    binds: Vec<String>,
    /// Binds used only by the SELECT (the ranking expression), placed first
    rank_binds: Vec<String>,
}

impl SearchQuery {
    fn build(search: &CourseSearch) -> Self {
        let query = search
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(&q.to_lowercase())));
        let tag = search
            .tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        let mut where_sql = String::from("c.status = 'public'");
        let mut binds = Vec::new();

        if let Some(pattern) = &query {
            where_sql.push_str(
                " AND (LOWER(c.title) LIKE ? ESCAPE '!' OR LOWER(t.name) LIKE ? ESCAPE '!' \
                 OR LOWER(c.description) LIKE ? ESCAPE '!')",
            );
            binds.extend(std::iter::repeat(pattern.clone()).take(3));
        }
        if let Some(tag) = tag {
            where_sql.push_str(
                " AND EXISTS (SELECT 1 FROM course_tags ct2 INNER JOIN tags t2 ON t2.id = ct2.tag_id \
                 WHERE ct2.course_id = c.id AND LOWER(t2.name) = ?)",
            );
            binds.push(tag);
        }

        match query {
            Some(pattern) => {
                let from = "FROM courses c \
                            LEFT JOIN course_tags ct ON ct.course_id = c.id \
                            LEFT JOIN tags t ON t.id = ct.tag_id";
                Self {
                    select: format!(
                        "SELECT {cols}, MIN(CASE \
                             WHEN LOWER(c.title) LIKE ? ESCAPE '!' THEN 1 \
                             WHEN LOWER(t.name) LIKE ? ESCAPE '!' THEN 2 \
                             WHEN LOWER(c.description) LIKE ? ESCAPE '!' THEN 3 \
                             ELSE 4 END) AS priority \
                         {from} WHERE {where_sql} \
                         GROUP BY {cols} \
                         ORDER BY priority, c.title, c.id LIMIT ? OFFSET ?",
                        cols = COURSE_COLUMNS,
                    ),
                    count: format!("SELECT COUNT(DISTINCT c.id) {from} WHERE {where_sql}"),
                    binds,
                    rank_binds: vec![pattern; 3],
                }
            }
            None => Self {
                select: format!(
                    "SELECT {} FROM courses c WHERE {} \
                     ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
                    COURSE_COLUMNS, where_sql
                ),
                count: format!("SELECT COUNT(*) FROM courses c WHERE {}", where_sql),
                binds,
                rank_binds: Vec::new(),
            },
        }
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &Course) -> Result<Course> {
        let now = Utc::now();
        let sql = "INSERT INTO courses (title, description, status, creator_id, category_id, cover_url, created_at, updated_at) \
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)";
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(sql)
                .bind(&course.title)
                .bind(&course.description)
                .bind(course.status.to_string())
                .bind(course.creator_id)
                .bind(course.category_id)
                .bind(&course.cover_url)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to insert course")?
                .inserted_id()
        });
        Ok(Course {
            id,
            created_at: now,
            updated_at: now,
            ..course.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses c WHERE c.id = ?", COURSE_COLUMNS);
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, CourseRow>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get course")?
        });
        row.map(Course::try_from).transpose()
    }

    async fn find_by_title_status(&self, title: &str, status: CourseStatus) -> Result<Option<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c WHERE c.title = ? AND c.status = ?",
            COURSE_COLUMNS
        );
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, CourseRow>(&sql)
                .bind(title)
                .bind(status.to_string())
                .fetch_optional(pool)
                .await
                .context("Failed to find course by title")?
        });
        row.map(Course::try_from).transpose()
    }

    async fn update(&self, course: &Course) -> Result<Course> {
        let now = Utc::now();
        let sql = "UPDATE courses SET title = ?, description = ?, status = ?, category_id = ?, cover_url = ?, updated_at = ? \
                   WHERE id = ?";
        with_pool!(self.pool, |pool| {
            sqlx::query(sql)
                .bind(&course.title)
                .bind(&course.description)
                .bind(course.status.to_string())
                .bind(course.category_id)
                .bind(&course.cover_url)
                .bind(now)
                .bind(course.id)
                .execute(pool)
                .await
                .context("Failed to update course")?
                .rows_affected()
        });
        Ok(Course {
            updated_at: now,
            ..course.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM courses WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete course")?
                .rows_affected()
        });
        Ok(())
    }

    async fn search(&self, search: &CourseSearch, params: &ListParams) -> Result<(Vec<Course>, i64)> {
        let q = SearchQuery::build(search);

        let rows = with_pool!(self.pool, |pool| {
            let mut query = sqlx::query_as::<_, CourseRow>(&q.select);
            for value in q.rank_binds.iter().chain(q.binds.iter()) {
                query = query.bind(value.as_str());
            }
            query
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to search courses")?
        });

        let total = with_pool!(self.pool, |pool| {
            let mut query = sqlx::query_scalar::<_, i64>(&q.count);
            for value in &q.binds {
                query = query.bind(value.as_str());
            }
            query
                .fetch_one(pool)
                .await
                .context("Failed to count courses")?
        });

        let courses = rows.into_iter().map(Course::try_from).collect::<Result<Vec<_>>>()?;
        Ok((courses, total))
    }

    async fn list_by_creator(&self, user_id: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c WHERE c.creator_id = ? ORDER BY c.created_at DESC, c.id DESC",
            COURSE_COLUMNS
        );
        self.list_for_user(&sql, user_id).await
    }

    async fn list_enrolled(&self, user_id: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c INNER JOIN course_students s ON s.course_id = c.id \
             WHERE s.user_id = ? ORDER BY s.enrolled_at DESC, c.id DESC",
            COURSE_COLUMNS
        );
        self.list_for_user(&sql, user_id).await
    }

    async fn list_favorites(&self, user_id: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c INNER JOIN course_favorites f ON f.course_id = c.id \
             WHERE f.user_id = ? ORDER BY f.created_at DESC, c.id DESC",
            COURSE_COLUMNS
        );
        self.list_for_user(&sql, user_id).await
    }

    async fn related(&self, course: &Course, limit: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT DISTINCT {} FROM courses c \
             LEFT JOIN course_tags ct ON ct.course_id = c.id \
             WHERE c.status = 'public' AND c.id <> ? \
             AND (c.creator_id = ? OR ct.tag_id IN (SELECT tag_id FROM course_tags WHERE course_id = ?)) \
             ORDER BY c.created_at DESC, c.id DESC LIMIT ?",
            COURSE_COLUMNS
        );
        let rows = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, CourseRow>(&sql)
                .bind(course.id)
                .bind(course.creator_id)
                .bind(course.id)
                .bind(limit)
                .fetch_all(pool)
                .await
                .context("Failed to get related courses")?
        });
        rows.into_iter().map(Course::try_from).collect()
    }

    async fn is_enrolled(&self, course_id: i64, user_id: i64) -> Result<bool> {
        self.membership_exists("course_students", course_id, user_id).await
    }

    async fn enroll(&self, course_id: i64, user_id: i64) -> Result<bool> {
        self.membership_insert("course_students", course_id, user_id).await
    }

    async fn unenroll(&self, course_id: i64, user_id: i64) -> Result<bool> {
        self.membership_delete("course_students", course_id, user_id).await
    }

    async fn count_students(&self, course_id: i64) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM course_students WHERE course_id = ?")
                .bind(course_id)
                .fetch_one(pool)
                .await
                .context("Failed to count students")?
        });
        Ok(count)
    }

    async fn is_favorite(&self, course_id: i64, user_id: i64) -> Result<bool> {
        self.membership_exists("course_favorites", course_id, user_id).await
    }

    async fn add_favorite(&self, course_id: i64, user_id: i64) -> Result<()> {
        self.membership_insert("course_favorites", course_id, user_id).await?;
        Ok(())
    }

    async fn remove_favorite(&self, course_id: i64, user_id: i64) -> Result<()> {
        self.membership_delete("course_favorites", course_id, user_id).await?;
        Ok(())
    }

    async fn is_collaborator(&self, course_id: i64, user_id: i64) -> Result<bool> {
        self.membership_exists("course_collaborators", course_id, user_id).await
    }

    async fn add_collaborator(&self, course_id: i64, user_id: i64) -> Result<()> {
        self.membership_insert("course_collaborators", course_id, user_id).await?;
        Ok(())
    }

    async fn remove_collaborator(&self, course_id: i64, user_id: i64) -> Result<bool> {
        self.membership_delete("course_collaborators", course_id, user_id).await
    }

    async fn list_collaborator_ids(&self, course_id: i64) -> Result<Vec<i64>> {
        let ids = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                "SELECT user_id FROM course_collaborators WHERE course_id = ? ORDER BY created_at, user_id",
            )
            .bind(course_id)
            .fetch_all(pool)
            .await
            .context("Failed to list collaborators")?
        });
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxTagRepository, SqlxUserRepository, TagRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Tag, User, UserRole};

    struct Fixture {
        courses: SqlxCourseRepository,
        tags: SqlxTagRepository,
        users: SqlxUserRepository,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        Fixture {
            courses: SqlxCourseRepository::new(pool.clone()),
            tags: SqlxTagRepository::new(pool.clone()),
            users: SqlxUserRepository::new(pool),
        }
    }

    impl Fixture {
        async fn user(&self, email: &str) -> User {
            self.users
                .create(&User::new(email.into(), "u".into(), "h".into(), UserRole::Student))
                .await
                .unwrap()
        }

        async fn course(&self, title: &str, description: &str, status: CourseStatus, creator: i64) -> Course {
            self.courses
                .create(&Course::new(title.into(), description.into(), status, creator))
                .await
                .unwrap()
        }

        async fn tag(&self, course: &Course, name: &str) {
            let tag = match self.tags.get_by_name(name).await.unwrap() {
                Some(tag) => tag,
                None => self.tags.create(&Tag::new(name.into(), name.into())).await.unwrap(),
            };
            let mut ids: Vec<i64> = self
                .tags
                .get_for_course(course.id)
                .await
                .unwrap()
                .into_iter()
                .map(|t| t.id)
                .collect();
            ids.push(tag.id);
            self.tags.set_for_course(course.id, &ids).await.unwrap();
        }
    }

    fn titles(courses: &[Course]) -> Vec<&str> {
        courses.iter().map(|c| c.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let f = setup().await;
        let user = f.user("a@example.com").await;
        let mut course = f.course("Rust", "Systems", CourseStatus::Draft, user.id).await;

        course.status = CourseStatus::Public;
        course.cover_url = Some("https://example.com/c.png".into());
        f.courses.update(&course).await.unwrap();

        let found = f.courses.get_by_id(course.id).await.unwrap().unwrap();
        assert_eq!(found.status, CourseStatus::Public);
        assert_eq!(found.cover_url.as_deref(), Some("https://example.com/c.png"));
        assert!(f
            .courses
            .find_by_title_status("Rust", CourseStatus::Public)
            .await
            .unwrap()
            .is_some());

        f.courses.delete(course.id).await.unwrap();
        assert!(f.courses.get_by_id(course.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_ranks_title_then_tag_then_description() {
        let f = setup().await;
        let user = f.user("a@example.com").await;

        f.course("Cooking", "Learn rust removal", CourseStatus::Public, user.id).await;
        let by_tag = f.course("Metalwork", "Welding basics", CourseStatus::Public, user.id).await;
        f.tag(&by_tag, "rust").await;
        f.course("Rust Basics", "Ownership", CourseStatus::Public, user.id).await;
        f.course("Advanced Rust", "Async", CourseStatus::Public, user.id).await;
        f.course("Rust Drafts", "Hidden", CourseStatus::Draft, user.id).await;
        f.course("Python", "Snakes", CourseStatus::Public, user.id).await;

        let search = CourseSearch { query: Some("RUST".into()), tag: None };
        let (courses, total) = f.courses.search(&search, &ListParams::default()).await.unwrap();

        assert_eq!(total, 4);
        assert_eq!(titles(&courses), vec!["Advanced Rust", "Rust Basics", "Metalwork", "Cooking"]);
    }

    #[tokio::test]
    async fn test_search_by_tag_and_pagination() {
        let f = setup().await;
        let user = f.user("a@example.com").await;
        for title in ["A", "B", "C"] {
            let course = f.course(title, "", CourseStatus::Public, user.id).await;
            f.tag(&course, "web").await;
        }
        f.course("D", "", CourseStatus::Public, user.id).await;

        let search = CourseSearch { query: None, tag: Some("WEB".into()) };
        let (page, total) = f.courses.search(&search, &ListParams::new(1, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);

        let (all, total) = f.courses.search(&CourseSearch::default(), &ListParams::default()).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let f = setup().await;
        let user = f.user("a@example.com").await;
        f.course("Rust basics", "", CourseStatus::Public, user.id).await;
        f.course("Über Rust", "", CourseStatus::Public, user.id).await;
        f.course("100% Rust", "snake_case names", CourseStatus::Public, user.id).await;

        let query = |q: &str| CourseSearch { query: Some(q.into()), tag: None };
        let (_, total) = f.courses.search(&query("%"), &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        let (_, total) = f.courses.search(&query("_"), &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        let (courses, _) = f.courses.search(&query("0%"), &ListParams::default()).await.unwrap();
        assert_eq!(titles(&courses), vec!["100% Rust"]);
        let (_, total) = f.courses.search(&query("!"), &ListParams::default()).await.unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off!"), "50!%!_off!!");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn test_search_does_not_duplicate_multi_tag_matches() {
        let f = setup().await;
        let user = f.user("a@example.com").await;
        let course = f.course("Web", "", CourseStatus::Public, user.id).await;
        f.tag(&course, "webdev").await;
        f.tag(&course, "webassembly").await;

        let search = CourseSearch { query: Some("web".into()), tag: None };
        let (courses, total) = f.courses.search(&search, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(courses.len(), 1);
    }

    #[tokio::test]
    async fn test_related_courses() {
        let f = setup().await;
        let alice = f.user("alice@example.com").await;
        let bob = f.user("bob@example.com").await;

        let main = f.course("Main", "", CourseStatus::Public, alice.id).await;
        f.tag(&main, "rust").await;
        let same_creator = f.course("Same creator", "", CourseStatus::Public, alice.id).await;
        let shared_tag = f.course("Shared tag", "", CourseStatus::Public, bob.id).await;
        f.tag(&shared_tag, "rust").await;
        f.course("Unrelated", "", CourseStatus::Public, bob.id).await;
        f.course("Hidden", "", CourseStatus::Private, alice.id).await;

        let related = f.courses.related(&main, 5).await.unwrap();
        let mut ids: Vec<i64> = related.iter().map(|c| c.id).collect();
        ids.sort();
        assert_eq!(ids, vec![same_creator.id, shared_tag.id]);
    }

    #[tokio::test]
    async fn test_memberships() {
        let f = setup().await;
        let owner = f.user("o@example.com").await;
        let student = f.user("s@example.com").await;
        let course = f.course("Rust", "", CourseStatus::Public, owner.id).await;

        assert!(!f.courses.is_enrolled(course.id, student.id).await.unwrap());
        assert!(f.courses.enroll(course.id, student.id).await.unwrap());
        assert!(f.courses.is_enrolled(course.id, student.id).await.unwrap());
        assert!(!f.courses.enroll(course.id, student.id).await.unwrap());
        assert_eq!(f.courses.count_students(course.id).await.unwrap(), 1);
        assert_eq!(titles(&f.courses.list_enrolled(student.id).await.unwrap()), vec!["Rust"]);
        assert!(f.courses.unenroll(course.id, student.id).await.unwrap());
        assert!(!f.courses.unenroll(course.id, student.id).await.unwrap());

        f.courses.add_favorite(course.id, student.id).await.unwrap();
        f.courses.add_favorite(course.id, student.id).await.unwrap();
        assert_eq!(f.courses.list_favorites(student.id).await.unwrap().len(), 1);
        f.courses.remove_favorite(course.id, student.id).await.unwrap();
        assert!(!f.courses.is_favorite(course.id, student.id).await.unwrap());

        f.courses.add_collaborator(course.id, student.id).await.unwrap();
        f.courses.add_collaborator(course.id, student.id).await.unwrap();
        assert_eq!(f.courses.list_collaborator_ids(course.id).await.unwrap(), vec![student.id]);
        assert!(f.courses.remove_collaborator(course.id, student.id).await.unwrap());
        assert_eq!(titles(&f.courses.list_by_creator(owner.id).await.unwrap()), vec!["Rust"]);
    }
}
