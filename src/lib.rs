//! CourseTrackr - course management service
//!
//! Users publish courses made of ordered markdown lessons, students enroll
//! and keep private notes, and course owners invite collaborators by email.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
