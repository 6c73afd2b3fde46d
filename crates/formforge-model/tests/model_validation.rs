use formforge_model::{
    validate_answers, AnswerDraft, FieldOption, FieldOptionDraft, FieldType, FormDraft, FormId,
    OptionId, Question, QuestionDraft, QuestionId,
};

fn draft_question(text: &str, field_type: FieldType, options: Vec<(&str, &str)>) -> QuestionDraft {
    QuestionDraft {
        text: text.to_string(),
        field_type,
        required: false,
        options: options
            .into_iter()
            .map(|(t, v)| FieldOptionDraft {
                text: t.to_string(),
                value: v.to_string(),
            })
            .collect(),
    }
}

fn stored_question(
    id: i64,
    field_type: FieldType,
    required: bool,
    position: u32,
    option_ids: &[i64],
) -> Question {
    Question {
        id: QuestionId::new(id).expect("question id"),
        form_id: FormId::new(1).expect("form id"),
        text: format!("question {id}"),
        field_type,
        required,
        position,
        options: option_ids
            .iter()
            .map(|oid| FieldOption {
                id: OptionId::new(*oid).expect("option id"),
                question_id: QuestionId::new(id).expect("question id"),
                text: format!("option {oid}"),
                value: format!("value-{oid}"),
            })
            .collect(),
    }
}

#[test]
fn form_draft_requires_name_description_and_questions() {
    let draft = FormDraft {
        name: "  ".to_string(),
        description: "d".to_string(),
        questions: vec![draft_question("q", FieldType::Input, vec![])],
    };
    assert!(draft.validate().is_err());

    let draft = FormDraft {
        name: "Customer survey".to_string(),
        description: "How did we do?".to_string(),
        questions: vec![],
    };
    assert!(draft.validate().is_err());

    let draft = FormDraft {
        name: "Customer survey".to_string(),
        description: "How did we do?".to_string(),
        questions: vec![draft_question("q", FieldType::Input, vec![])],
    };
    assert!(draft.validate().is_ok());
}

#[test]
fn choice_questions_need_options_and_others_must_not_have_them() {
    let q = draft_question("pick one", FieldType::Select, vec![]);
    assert!(q.validate().is_err());

    let q = draft_question("pick one", FieldType::Select, vec![("Yes", "yes")]);
    assert!(q.validate().is_ok());

    let q = draft_question("free text", FieldType::Input, vec![("Yes", "yes")]);
    assert!(q.validate().is_err());
}

#[test]
fn option_drafts_reject_empty_text_or_value() {
    let q = draft_question("pick", FieldType::RadioGroup, vec![("", "yes")]);
    assert!(q.validate().is_err());
    let q = draft_question("pick", FieldType::RadioGroup, vec![("Yes", "")]);
    assert!(q.validate().is_err());
}

#[test]
fn dense_positions_are_enforced() {
    let questions = vec![
        stored_question(1, FieldType::Input, false, 0, &[]),
        stored_question(2, FieldType::Input, false, 2, &[]),
    ];
    assert!(Question::validate_positions(&questions).is_err());

    let questions = vec![
        stored_question(1, FieldType::Input, false, 1, &[]),
        stored_question(2, FieldType::Input, false, 0, &[]),
    ];
    assert!(Question::validate_positions(&questions).is_ok());
}

#[test]
fn answers_must_target_known_questions_once() {
    let questions = vec![stored_question(1, FieldType::Input, false, 0, &[])];
    let unknown = AnswerDraft {
        question_id: QuestionId::new(99).expect("id"),
        value: Some("hi".to_string()),
        option_id: None,
    };
    assert!(validate_answers(&questions, &[unknown]).is_err());

    let dup = AnswerDraft {
        question_id: QuestionId::new(1).expect("id"),
        value: Some("hi".to_string()),
        option_id: None,
    };
    assert!(validate_answers(&questions, &[dup.clone(), dup]).is_err());
}

#[test]
fn required_questions_reject_missing_or_empty_answers() {
    let questions = vec![stored_question(1, FieldType::Input, true, 0, &[])];
    assert!(validate_answers(&questions, &[]).is_err());

    let empty = AnswerDraft {
        question_id: QuestionId::new(1).expect("id"),
        value: Some(String::new()),
        option_id: None,
    };
    assert!(validate_answers(&questions, &[empty]).is_err());

    let filled = AnswerDraft {
        question_id: QuestionId::new(1).expect("id"),
        value: Some("answered".to_string()),
        option_id: None,
    };
    assert!(validate_answers(&questions, &[filled]).is_ok());
}

#[test]
fn optional_questions_may_be_skipped() {
    let questions = vec![stored_question(1, FieldType::Email, false, 0, &[])];
    assert!(validate_answers(&questions, &[]).is_ok());
}

#[test]
fn choice_answers_must_reference_an_option_of_the_question() {
    let questions = vec![stored_question(1, FieldType::RadioGroup, true, 0, &[10, 11])];

    let foreign = AnswerDraft {
        question_id: QuestionId::new(1).expect("id"),
        value: None,
        option_id: Some(OptionId::new(42).expect("id")),
    };
    assert!(validate_answers(&questions, &[foreign]).is_err());

    let text_instead = AnswerDraft {
        question_id: QuestionId::new(1).expect("id"),
        value: Some("Yes".to_string()),
        option_id: None,
    };
    assert!(validate_answers(&questions, &[text_instead]).is_err());

    let valid = AnswerDraft {
        question_id: QuestionId::new(1).expect("id"),
        value: None,
        option_id: Some(OptionId::new(11).expect("id")),
    };
    assert!(validate_answers(&questions, &[valid]).is_ok());
}

#[test]
fn typed_answers_pass_field_type_checks() {
    let questions = vec![
        stored_question(1, FieldType::Email, true, 0, &[]),
        stored_question(2, FieldType::Number, false, 1, &[]),
    ];

    let bad_email = AnswerDraft {
        question_id: QuestionId::new(1).expect("id"),
        value: Some("not-an-email".to_string()),
        option_id: None,
    };
    assert!(validate_answers(&questions, &[bad_email]).is_err());

    let answers = vec![
        AnswerDraft {
            question_id: QuestionId::new(1).expect("id"),
            value: Some("a@b.co".to_string()),
            option_id: None,
        },
        AnswerDraft {
            question_id: QuestionId::new(2).expect("id"),
            value: Some("12.5".to_string()),
            option_id: None,
        },
    ];
    assert!(validate_answers(&questions, &answers).is_ok());
}
