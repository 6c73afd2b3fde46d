// SPDX-License-Identifier: Apache-2.0

use crate::dto::{AnswerDto, FieldOptionDto, QuestionDto, SaveFormRequestDto};
use crate::errors::ApiError;
use formforge_model::{
    AnswerDraft, FieldOptionDraft, Form, FormDraft, OptionId, Question, QuestionDraft, QuestionId,
};
use serde_json::json;

pub fn form_draft_from_request(req: &SaveFormRequestDto) -> Result<FormDraft, ApiError> {
    let draft = FormDraft {
        name: req.name.clone(),
        description: req.description.clone(),
        questions: req.questions.iter().map(question_draft).collect(),
    };
    draft
        .validate()
        .map_err(|e| ApiError::validation_failed(json!([{"reason": e.to_string()}])))?;
    Ok(draft)
}

fn question_draft(dto: &QuestionDto) -> QuestionDraft {
    QuestionDraft {
        text: dto.text.clone(),
        field_type: dto.field_type,
        required: dto.required,
        options: dto.options.iter().map(option_draft).collect(),
    }
}

fn option_draft(dto: &FieldOptionDto) -> FieldOptionDraft {
    FieldOptionDraft {
        text: dto.text.clone(),
        value: dto.value.clone(),
    }
}

/// For updates the incoming question ids matter: present ids mark surviving
/// questions, absent ids mark inserts. Ids must be positive when present.
pub fn question_updates_from_request(
    req: &SaveFormRequestDto,
) -> Result<Vec<(Option<QuestionId>, QuestionDraft)>, ApiError> {
    let mut out = Vec::with_capacity(req.questions.len());
    for dto in &req.questions {
        let id = match dto.id {
            Some(raw) => Some(QuestionId::new(raw).map_err(|e| {
                ApiError::validation_failed(json!([{"reason": e.to_string()}]))
            })?),
            None => None,
        };
        out.push((id, question_draft(dto)));
    }
    Ok(out)
}

pub fn answer_drafts_from_request(answers: &[AnswerDto]) -> Result<Vec<AnswerDraft>, ApiError> {
    let mut out = Vec::with_capacity(answers.len());
    for dto in answers {
        let question_id = QuestionId::new(dto.question_id)
            .map_err(|e| ApiError::validation_failed(json!([{"reason": e.to_string()}])))?;
        let option_id = match dto.option_id {
            Some(raw) => Some(OptionId::new(raw).map_err(|e| {
                ApiError::validation_failed(json!([{"reason": e.to_string()}]))
            })?),
            None => None,
        };
        out.push(AnswerDraft {
            question_id,
            value: dto.value.clone(),
            option_id,
        });
    }
    Ok(out)
}

#[must_use]
pub fn question_dto(question: &Question) -> QuestionDto {
    QuestionDto {
        id: Some(question.id.get()),
        text: question.text.clone(),
        field_type: question.field_type,
        required: question.required,
        options: question
            .options
            .iter()
            .map(|o| FieldOptionDto {
                id: Some(o.id.get()),
                text: o.text.clone(),
                value: o.value.clone(),
            })
            .collect(),
    }
}

#[must_use]
pub fn form_detail_dto(form: &Form, questions: &[Question]) -> crate::dto::FormDetailDto {
    crate::dto::FormDetailDto {
        id: form.id.get(),
        name: form.name.clone(),
        description: form.description.clone(),
        published: form.published,
        created_at: form.created_at,
        questions: questions.iter().map(question_dto).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formforge_model::FieldType;

    fn save_request(questions: Vec<QuestionDto>) -> SaveFormRequestDto {
        SaveFormRequestDto {
            name: "Feedback".to_string(),
            description: "Tell us".to_string(),
            questions,
        }
    }

    #[test]
    fn form_draft_conversion_validates() {
        let req = save_request(vec![QuestionDto {
            id: None,
            text: "How was it?".to_string(),
            field_type: FieldType::Select,
            required: true,
            options: vec![],
        }]);
        assert!(form_draft_from_request(&req).is_err());

        let req = save_request(vec![QuestionDto {
            id: None,
            text: "How was it?".to_string(),
            field_type: FieldType::Select,
            required: true,
            options: vec![FieldOptionDto {
                id: None,
                text: "Great".to_string(),
                value: "great".to_string(),
            }],
        }]);
        assert!(form_draft_from_request(&req).is_ok());
    }

    #[test]
    fn update_conversion_rejects_non_positive_ids() {
        let req = save_request(vec![QuestionDto {
            id: Some(0),
            text: "q".to_string(),
            field_type: FieldType::Input,
            required: false,
            options: vec![],
        }]);
        assert!(question_updates_from_request(&req).is_err());
    }

    #[test]
    fn answer_conversion_keeps_optional_fields() {
        let drafts = answer_drafts_from_request(&[AnswerDto {
            question_id: 3,
            value: None,
            option_id: Some(9),
        }])
        .expect("convert");
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].value.is_none());
        assert_eq!(drafts[0].option_id.map(|o| o.get()), Some(9));
    }
}