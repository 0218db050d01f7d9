//! Data models
//!
//! Database entities, service inputs and the small value types shared by
//! services and the API layer.

mod category;
mod course;
mod invitation;
mod lesson;
mod note;
mod session;
mod tag;
mod user;

pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use course::{
    Course, CourseAccess, CourseSearch, CourseStatus, CourseWithTags, CreateCourseInput,
    ListParams, PagedResult, UpdateCourseInput,
};
pub use invitation::PendingCollaborator;
pub use lesson::{CreateLessonInput, Lesson, LessonWindow, UpdateLessonInput};
pub use note::{Note, NoteInput};
pub use session::Session;
pub use tag::{slugify, Tag, TagWithCount};
pub use user::{CreateUserInput, PublicProfile, UpdateUserInput, User, UserRole};
