use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::{ConceptId, LessonId, QuestionId};

//
// ─── QUESTION FORMAT ───────────────────────────────────────────────────────────
//

/// Interaction family of a quiz question.
///
/// A remediation prompt must come from a different family than the question
/// that was failed, so the tag is stored with every remediation entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillBlank,
    Matching,
    Scenario,
    Slider,
    Other(String),
}

impl QuestionType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::MultipleChoice => "mcq",
            Self::TrueFalse => "true_false",
            Self::FillBlank => "fill_blank",
            Self::Matching => "matching",
            Self::Scenario => "scenario",
            Self::Slider => "slider",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for QuestionType {
    fn from(tag: &str) -> Self {
        match tag {
            "mcq" => Self::MultipleChoice,
            "true_false" => Self::TrueFalse,
            "fill_blank" => Self::FillBlank,
            "matching" => Self::Matching,
            "scenario" => Self::Scenario,
            "slider" => Self::Slider,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for QuestionType {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<QuestionType> for String {
    fn from(kind: QuestionType) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── FAILURE REPORT ────────────────────────────────────────────────────────────
//

/// An incorrect answer on a tested concept, as reported by the quiz pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptFailure {
    pub question_id: QuestionId,
    pub concept_id: ConceptId,
    pub question_type: QuestionType,
    pub lesson_id: LessonId,
    pub variant_question_id: Option<QuestionId>,
}

impl ConceptFailure {
    #[must_use]
    pub fn new(
        question_id: impl Into<QuestionId>,
        concept_id: impl Into<ConceptId>,
        question_type: impl Into<QuestionType>,
        lesson_id: impl Into<LessonId>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            concept_id: concept_id.into(),
            question_type: question_type.into(),
            lesson_id: lesson_id.into(),
            variant_question_id: None,
        }
    }

    /// Point the remediation at a specific follow-up question.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<QuestionId>) -> Self {
        self.variant_question_id = Some(variant.into());
        self
    }
}

//
// ─── REMEDIATION ENTRY ─────────────────────────────────────────────────────────
//

/// Outstanding (or settled) remediation obligation for one concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationEntry {
    concept_id: ConceptId,
    question_id: QuestionId,
    question_type: QuestionType,
    lesson_id: LessonId,
    timestamp: DateTime<Utc>,
    requires_remediation: bool,
    remediation_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variant_question_id: Option<QuestionId>,
}

impl RemediationEntry {
    /// Open a new obligation from a first failure on a concept.
    #[must_use]
    pub fn open(failure: ConceptFailure, now: DateTime<Utc>) -> Self {
        Self {
            concept_id: failure.concept_id,
            question_id: failure.question_id,
            question_type: failure.question_type,
            lesson_id: failure.lesson_id,
            timestamp: now,
            requires_remediation: true,
            remediation_complete: false,
            variant_question_id: failure.variant_question_id,
        }
    }

    /// Overwrite this entry with a later failure on the same concept.
    ///
    /// Every field comes from `failure` except the variant pointer, which is
    /// kept when the new report leaves it out. The obligation is reopened even
    /// if it had been settled.
    pub fn refresh(&mut self, failure: ConceptFailure, now: DateTime<Utc>) {
        debug_assert_eq!(self.concept_id, failure.concept_id);
        self.question_id = failure.question_id;
        self.question_type = failure.question_type;
        self.lesson_id = failure.lesson_id;
        self.timestamp = now;
        self.requires_remediation = true;
        self.remediation_complete = false;
        if let Some(variant) = failure.variant_question_id {
            self.variant_question_id = Some(variant);
        }
    }

    /// Record that a qualifying variant was answered correctly.
    pub fn settle(&mut self) {
        self.requires_remediation = false;
        self.remediation_complete = true;
    }

    /// True while the learner still owes a correct answer on this concept.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.requires_remediation && !self.remediation_complete
    }

    #[must_use]
    pub fn concept_id(&self) -> &ConceptId {
        &self.concept_id
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn question_type(&self) -> &QuestionType {
        &self.question_type
    }

    #[must_use]
    pub fn lesson_id(&self) -> &LessonId {
        &self.lesson_id
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn requires_remediation(&self) -> bool {
        self.requires_remediation
    }

    #[must_use]
    pub fn remediation_complete(&self) -> bool {
        self.remediation_complete
    }

    #[must_use]
    pub fn variant_question_id(&self) -> Option<&QuestionId> {
        self.variant_question_id.as_ref()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
