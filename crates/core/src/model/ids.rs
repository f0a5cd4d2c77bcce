use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

/// Numeric catalog identifier shared by courses, modules, lessons and questions.
///
/// Lets relation code stay generic over which side of a link it is handling.
pub trait EntityId:
    Copy
    + Eq
    + Ord
    + Hash
    + fmt::Debug
    + fmt::Display
    + Serialize
    + for<'de> Deserialize<'de>
    + FromStr<Err = ParseIdError>
    + Send
    + Sync
    + 'static
{
    /// Human-readable entity kind, used in error messages.
    const KIND: &'static str;

    fn from_value(value: u64) -> Self;

    fn value(&self) -> u64;
}

/// Largest id that round-trips through a signed 64-bit database column.
pub const MAX_CATALOG_ID: u64 = i64::MAX.unsigned_abs();

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl EntityId for $name {
            const KIND: &'static str = $kind;

            fn from_value(value: u64) -> Self {
                Self(value)
            }

            fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|value| *value <= MAX_CATALOG_ID)
                    .map(Self::new)
                    .ok_or(ParseIdError { kind: $kind })
            }
        }
    };
}

catalog_id!(
    /// Unique identifier for a Course
    CourseId,
    "course"
);
catalog_id!(
    /// Unique identifier for a Module
    ModuleId,
    "module"
);
catalog_id!(
    /// Unique identifier for a Lesson
    LessonId,
    "lesson"
);
catalog_id!(
    /// Unique identifier for a quiz question
    QuestionId,
    "question"
);

/// Identifier of a learner, as resolved by the external auth layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generates a fresh random user id.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ParseIdError { kind: "user" })
    }
}

// ─── Parse Errors ──────────────────────────────────────────────────────────────

/// Error type for parsing an id from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl ParseIdError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} id from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_id_display() {
        let id = CourseId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "CourseId(42)");
    }

    #[test]
    fn lesson_id_from_str_trims() {
        let id: LessonId = " 123 ".parse().unwrap();
        assert_eq!(id, LessonId::new(123));
    }

    #[test]
    fn ids_beyond_signed_range_do_not_parse() {
        let max = i64::MAX.to_string();
        assert_eq!(max.parse::<CourseId>().unwrap(), CourseId::new(MAX_CATALOG_ID));
        let err = "9223372036854775808".parse::<CourseId>().unwrap_err();
        assert_eq!(err.kind(), "course");
        assert!(u64::MAX.to_string().parse::<LessonId>().is_err());
    }

    #[test]
    fn module_id_from_str_invalid() {
        let err = "not-a-number".parse::<ModuleId>().unwrap_err();
        assert_eq!(err.kind(), "module");
        assert_eq!(err.to_string(), "failed to parse module id from string");
    }

    #[test]
    fn user_id_parses_uuid() {
        let raw = "6f1c2c1e-8f4e-4a53-9b4e-3f0b2a9d7c11";
        let id: UserId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert!("42".parse::<UserId>().is_err());
    }

    #[test]
    fn entity_id_kind_and_value() {
        let id = QuestionId::from_value(9);
        assert_eq!(EntityId::value(&id), 9);
        assert_eq!(QuestionId::KIND, "question");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&LessonId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
