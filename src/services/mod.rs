//! Services layer - Business logic
//!
//! This module contains all business logic services for CourseTrackr.
//! Services are responsible for:
//! - Enforcing access rules and validation
//! - Coordinating between repositories and cache
//! - Mapping storage failures into typed service errors

pub mod category;
pub mod course;
pub mod email;
pub mod invitation;
pub mod lesson;
pub mod markdown;
pub mod note;
pub mod password;
pub mod rate_limiter;
pub mod tag;
pub mod token;
pub mod user;
pub mod validation;

pub use category::{CategoryService, CategoryServiceError};
pub use course::{CourseDetail, CourseService, CourseServiceError, ViewerFlags};
pub use email::{Delivery, EmailService};
pub use invitation::{InvitationService, InvitationServiceError, InviteOutcome};
pub use lesson::{LessonService, LessonServiceError, LessonView};
pub use markdown::MarkdownRenderer;
pub use note::{NoteService, NoteServiceError, NoteView};
pub use password::{hash_password, verify_password};
pub use rate_limiter::RateLimiter;
pub use tag::{TagService, TagServiceError};
pub use token::{TokenError, TokenSigner};
pub use user::{Authenticated, LoginOutcome, UserService, UserServiceError};
pub use validation::FieldError;
