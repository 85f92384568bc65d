//! Lessons and courses as read from the authoring catalog

use crate::{CourseId, LessonId, UserId};
use serde::{Deserialize, Serialize};

/// Top-level topic authored by a teacher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub teacher_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Sub-topic of a lesson holding the five PRIMM stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub lesson_id: LessonId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order_index: i32,
    /// One-time bonus credited when every stage of the course is complete
    pub coin_reward: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
