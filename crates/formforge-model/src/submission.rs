use crate::field_type::ValueError;
use crate::form::Question;
use crate::ids::{AnswerId, FormId, OptionId, QuestionId, SubmissionId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AnswerDraft {
    pub question_id: QuestionId,
    pub value: Option<String>,
    pub option_id: Option<OptionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Answer {
    pub id: AnswerId,
    pub submission_id: SubmissionId,
    pub question_id: QuestionId,
    pub value: Option<String>,
    pub option_id: Option<OptionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Submission {
    pub id: SubmissionId,
    pub form_id: FormId,
    pub respondent: Option<UserId>,
    pub submitted_at: i64,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    UnknownQuestion(QuestionId),
    DuplicateAnswer(QuestionId),
    MissingRequired(QuestionId),
    OptionNotOnQuestion(QuestionId, OptionId),
    ChoiceNeedsOption(QuestionId),
    ValueExpected(QuestionId),
    InvalidValue(QuestionId, ValueError),
}

impl Display for AnswerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownQuestion(q) => write!(f, "answer references unknown question {q}"),
            Self::DuplicateAnswer(q) => write!(f, "question {q} answered more than once"),
            Self::MissingRequired(q) => write!(f, "required question {q} has no answer"),
            Self::OptionNotOnQuestion(q, o) => {
                write!(f, "option {o} does not belong to question {q}")
            }
            Self::ChoiceNeedsOption(q) => {
                write!(f, "question {q} takes an option reference, not free text")
            }
            Self::ValueExpected(q) => write!(f, "question {q} takes a text value"),
            Self::InvalidValue(q, e) => write!(f, "invalid value for question {q}: {e}"),
        }
    }
}

impl std::error::Error for AnswerError {}

/// Validates a respondent's answers against a form's questions.
///
/// Every answer must target a question of the form, each question at most
/// once; required questions must be answered; choice answers must reference
/// an option belonging to their question; text answers must pass the field
/// type's value check. Optional questions may be omitted or carry an empty
/// answer row (both value and option absent).
pub fn validate_answers(questions: &[Question], answers: &[AnswerDraft]) -> Result<(), AnswerError> {
    let by_id: HashMap<QuestionId, &Question> =
        questions.iter().map(|q| (q.id, q)).collect();

    let mut seen: HashSet<QuestionId> = HashSet::new();
    let mut answered: HashSet<QuestionId> = HashSet::new();

    for answer in answers {
        let question = by_id
            .get(&answer.question_id)
            .ok_or(AnswerError::UnknownQuestion(answer.question_id))?;
        if !seen.insert(answer.question_id) {
            return Err(AnswerError::DuplicateAnswer(answer.question_id));
        }

        let empty = answer.option_id.is_none()
            && answer.value.as_deref().map_or(true, str::is_empty);
        if empty {
            continue;
        }

        if question.field_type.is_choice() {
            let option_id = answer
                .option_id
                .ok_or(AnswerError::ChoiceNeedsOption(question.id))?;
            if question.option_by_id(option_id).is_none() {
                return Err(AnswerError::OptionNotOnQuestion(question.id, option_id));
            }
        } else {
            if answer.option_id.is_some() {
                return Err(AnswerError::ValueExpected(question.id));
            }
            let value = answer
                .value
                .as_deref()
                .ok_or(AnswerError::ValueExpected(question.id))?;
            question
                .field_type
                .validate_value(value)
                .map_err(|e| AnswerError::InvalidValue(question.id, e))?;
        }
        answered.insert(answer.question_id);
    }

    for question in questions {
        if question.required && !answered.contains(&question.id) {
            return Err(AnswerError::MissingRequired(question.id));
        }
    }
    Ok(())
}
