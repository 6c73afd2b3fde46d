// SPDX-License-Identifier: Apache-2.0

use crate::field_type::FieldType;
use crate::ids::{FormId, OptionId, ParseError, QuestionId, UserId};
use serde::{Deserialize, Serialize};

pub const NAME_MAX_LEN: usize = 256;
pub const DESCRIPTION_MAX_LEN: usize = 2000;
pub const QUESTION_TEXT_MAX_LEN: usize = 2000;
pub const OPTION_TEXT_MAX_LEN: usize = 256;
pub const MAX_QUESTIONS_PER_FORM: usize = 200;
pub const MAX_OPTIONS_PER_QUESTION: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FieldOptionDraft {
    pub text: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FieldOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    pub text: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QuestionDraft {
    pub text: String,
    pub field_type: FieldType,
    pub required: bool,
    pub options: Vec<FieldOptionDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Question {
    pub id: QuestionId,
    pub form_id: FormId,
    pub text: String,
    pub field_type: FieldType,
    pub required: bool,
    pub position: u32,
    pub options: Vec<FieldOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FormDraft {
    pub name: String,
    pub description: String,
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Form {
    pub id: FormId,
    pub owner: UserId,
    pub name: String,
    pub description: String,
    pub published: bool,
    pub created_at: i64,
}

fn check_text(name: &'static str, value: &str, max: usize) -> Result<(), ParseError> {
    if value.trim().is_empty() {
        return Err(ParseError::Empty(name));
    }
    if value.len() > max {
        return Err(ParseError::TooLong(name, max));
    }
    Ok(())
}

impl FieldOptionDraft {
    pub fn validate(&self) -> Result<(), ParseError> {
        check_text("option text", &self.text, OPTION_TEXT_MAX_LEN)?;
        check_text("option value", &self.value, OPTION_TEXT_MAX_LEN)
    }
}

impl QuestionDraft {
    pub fn validate(&self) -> Result<(), ParseError> {
        check_text("question text", &self.text, QUESTION_TEXT_MAX_LEN)?;
        if self.field_type.is_choice() {
            if self.options.is_empty() {
                return Err(ParseError::InvalidFormat(
                    "choice questions need at least one option",
                ));
            }
            if self.options.len() > MAX_OPTIONS_PER_QUESTION {
                return Err(ParseError::TooLong("options", MAX_OPTIONS_PER_QUESTION));
            }
            for option in &self.options {
                option.validate()?;
            }
        } else if !self.options.is_empty() {
            return Err(ParseError::InvalidFormat(
                "only Select and RadioGroup questions carry options",
            ));
        }
        Ok(())
    }
}

impl FormDraft {
    pub fn validate(&self) -> Result<(), ParseError> {
        check_text("form name", &self.name, NAME_MAX_LEN)?;
        check_text("form description", &self.description, DESCRIPTION_MAX_LEN)?;
        if self.questions.is_empty() {
            return Err(ParseError::InvalidFormat(
                "a form needs at least one question",
            ));
        }
        if self.questions.len() > MAX_QUESTIONS_PER_FORM {
            return Err(ParseError::TooLong("questions", MAX_QUESTIONS_PER_FORM));
        }
        for question in &self.questions {
            question.validate()?;
        }
        Ok(())
    }
}

impl Question {
    /// Checks a loaded question set for dense zero-based positions.
    pub fn validate_positions(questions: &[Question]) -> Result<(), ParseError> {
        let mut positions: Vec<u32> = questions.iter().map(|q| q.position).collect();
        positions.sort_unstable();
        for (expected, actual) in positions.iter().enumerate() {
            if *actual != expected as u32 {
                return Err(ParseError::InvalidFormat(
                    "question positions must be dense starting at zero",
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn option_by_id(&self, option_id: OptionId) -> Option<&FieldOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}