use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares an opaque, string-backed identifier.
///
/// Identifiers are supplied by the catalog and the quiz pipeline; the engine
/// never parses or validates their contents, it only compares them.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of one content module within a lesson.
    ModuleId
);
string_id!(
    /// Identifier of a lesson (an ordered list of modules).
    LessonId
);
string_id!(
    /// Identifier of a tested concept shared by differently formatted questions.
    ConceptId
);
string_id!(
    /// Identifier of a single quiz question.
    QuestionId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_id_display_is_raw_value() {
        let id = ModuleId::new("reading-1");
        assert_eq!(id.to_string(), "reading-1");
        assert_eq!(id.as_str(), "reading-1");
    }

    #[test]
    fn concept_id_debug_names_the_type() {
        let id = ConceptId::from("concept-budget");
        assert_eq!(format!("{id:?}"), "ConceptId(\"concept-budget\")");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = QuestionId::new("q1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"q1\"");

        let back: QuestionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn distinct_id_types_with_same_text_compare_by_value() {
        let a = LessonId::from(String::from("lesson-1"));
        let b = LessonId::new("lesson-1");
        assert_eq!(a, b);
    }
}
