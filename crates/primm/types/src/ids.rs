//! Strongly-typed identifiers for PRIMM entities
//!
//! Identifiers are the numeric keys handed out by the relational store, wrapped
//! in newtypes so a stage id can never be passed where a course id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

numeric_id!(
    /// Authenticated user (student or teacher) identity
    UserId,
    "user"
);
numeric_id!(
    /// Lesson identifier
    LessonId,
    "lesson"
);
numeric_id!(
    /// Course identifier
    CourseId,
    "course"
);
numeric_id!(
    /// PRIMM stage identifier
    StageId,
    "stage"
);
