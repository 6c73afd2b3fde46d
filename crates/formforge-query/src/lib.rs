// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use formforge_model::{Form, Question, QuestionId, Submission};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

pub const CRATE_NAME: &str = "formforge-query";

#[derive(Debug)]
pub struct QueryError(pub String);

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for QueryError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultsRow {
    pub submission_id: i64,
    pub submitted_at: i64,
    pub respondent: Option<String>,
    pub values: Vec<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultsTable {
    pub columns: Vec<String>,
    pub rows: Vec<ResultsRow>,
}

/// Flattens submissions into a table with one column per question, in
/// question order. Choice answers are resolved to the option's label;
/// everything else keeps its stored text. Unanswered cells stay empty.
#[must_use]
pub fn build_results_table(questions: &[Question], submissions: &[Submission]) -> ResultsTable {
    let columns: Vec<String> = questions.iter().map(|q| q.text.clone()).collect();

    let rows = submissions
        .iter()
        .map(|submission| {
            let values = questions
                .iter()
                .map(|question| {
                    submission
                        .answers
                        .iter()
                        .find(|a| a.question_id == question.id)
                        .and_then(|answer| match answer.option_id {
                            Some(option_id) => question
                                .option_by_id(option_id)
                                .map(|o| o.text.clone()),
                            None => answer.value.clone(),
                        })
                })
                .collect();
            ResultsRow {
                submission_id: submission.id.get(),
                submitted_at: submission.submitted_at,
                respondent: submission.respondent.as_ref().map(|u| u.as_str().to_string()),
                values,
            }
        })
        .collect();

    ResultsTable { columns, rows }
}

/// Per-option answer frequencies for the selected questions.
///
/// Only choice questions (Select, RadioGroup) participate; other selected
/// ids are silently dropped, matching how the results UI offers only choice
/// questions for charting. Every option of a participating question appears
/// in the histogram, zero-counted when nobody picked it. One pass over all
/// answers.
pub fn option_frequencies(
    form: &Form,
    questions: &[Question],
    submissions: &[Submission],
    selected: &[QuestionId],
) -> Result<BTreeMap<String, BTreeMap<String, u64>>, QueryError> {
    if selected.is_empty() {
        return Err(QueryError("no questions selected".to_string()));
    }
    let selected: HashSet<QuestionId> = selected.iter().copied().collect();

    let mut histogram: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    let mut option_slots: BTreeMap<(QuestionId, i64), (String, String)> = BTreeMap::new();

    for question in questions {
        if question.form_id != form.id
            || !selected.contains(&question.id)
            || !question.field_type.is_choice()
        {
            continue;
        }
        let buckets = histogram.entry(question.text.clone()).or_default();
        for option in &question.options {
            buckets.insert(option.text.clone(), 0);
            option_slots.insert(
                (question.id, option.id.get()),
                (question.text.clone(), option.text.clone()),
            );
        }
    }

    for submission in submissions {
        for answer in &submission.answers {
            let Some(option_id) = answer.option_id else {
                continue;
            };
            if let Some((question_text, option_text)) =
                option_slots.get(&(answer.question_id, option_id.get()))
            {
                if let Some(count) = histogram
                    .get_mut(question_text)
                    .and_then(|buckets| buckets.get_mut(option_text))
                {
                    *count += 1;
                }
            }
        }
    }

    Ok(histogram)
}
