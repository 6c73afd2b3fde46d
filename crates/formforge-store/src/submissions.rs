use crate::forms::load_questions;
use crate::{Store, StoreError, StoreErrorCode};
use formforge_model::{
    Answer, AnswerDraft, AnswerId, Form, FormId, OptionId, Question, QuestionId, Submission,
    SubmissionId, UserId,
};
use rusqlite::params;

impl Store {
    /// Inserts one submission row plus an answer row per provided answer,
    /// all-or-nothing. The form must exist and be published.
    pub fn insert_submission(
        &mut self,
        form_id: FormId,
        respondent: Option<&UserId>,
        answers: &[AnswerDraft],
        submitted_at: i64,
    ) -> Result<SubmissionId, StoreError> {
        let tx = self.conn.transaction()?;

        let published: Option<i64> = {
            use rusqlite::OptionalExtension;
            tx.query_row(
                "SELECT published FROM forms WHERE id = ?1",
                params![form_id.get()],
                |r| r.get(0),
            )
            .optional()?
        };
        match published {
            None => return Err(StoreError::new(StoreErrorCode::NotFound, "form not found")),
            Some(flag) if flag == 0 => {
                return Err(StoreError::new(
                    StoreErrorCode::Validation,
                    "form is not published",
                ))
            }
            Some(_) => {}
        }

        tx.execute(
            "INSERT INTO submissions (form_id, respondent_id, submitted_at) VALUES (?1, ?2, ?3)",
            params![
                form_id.get(),
                respondent.map(UserId::as_str),
                submitted_at
            ],
        )?;
        let submission_id =
            SubmissionId::new(tx.last_insert_rowid()).map_err(StoreError::internal)?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO answers (submission_id, question_id, value, option_id)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for answer in answers {
                stmt.execute(params![
                    submission_id.get(),
                    answer.question_id.get(),
                    answer.value,
                    answer.option_id.map(OptionId::get)
                ])?;
            }
        }

        tx.commit()?;
        Ok(submission_id)
    }

    pub fn count_submissions(&self, form_id: FormId) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM submissions WHERE form_id = ?1",
            params![form_id.get()],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    /// Loads everything the read side needs for one form: the form row, its
    /// questions in position order (options attached), and every submission
    /// with its answers.
    pub fn load_form_results(
        &self,
        form_id: FormId,
    ) -> Result<Option<(Form, Vec<Question>, Vec<Submission>)>, StoreError> {
        let Some(form) = self.get_form(form_id)? else {
            return Ok(None);
        };
        let questions = load_questions(&self.conn, form_id)?;

        let mut stmt = self.conn.prepare(
            "SELECT id, respondent_id, submitted_at FROM submissions
             WHERE form_id = ?1 ORDER BY id",
        )?;
        let raw_submissions = stmt
            .query_map(params![form_id.get()], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut submissions = Vec::with_capacity(raw_submissions.len());
        for (raw_id, raw_respondent, submitted_at) in raw_submissions {
            let respondent = raw_respondent
                .as_deref()
                .map(UserId::parse)
                .transpose()
                .map_err(StoreError::internal)?;
            submissions.push(Submission {
                id: SubmissionId::new(raw_id).map_err(StoreError::internal)?,
                form_id,
                respondent,
                submitted_at,
                answers: Vec::new(),
            });
        }

        let mut ans_stmt = self.conn.prepare(
            "SELECT a.id, a.submission_id, a.question_id, a.value, a.option_id
             FROM answers a
             JOIN submissions s ON s.id = a.submission_id
             WHERE s.form_id = ?1 ORDER BY a.id",
        )?;
        let raw_answers = ans_stmt
            .query_map(params![form_id.get()], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, Option<i64>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (raw_id, raw_submission, raw_question, value, raw_option) in raw_answers {
            let answer = Answer {
                id: AnswerId::new(raw_id).map_err(StoreError::internal)?,
                submission_id: SubmissionId::new(raw_submission).map_err(StoreError::internal)?,
                question_id: QuestionId::new(raw_question).map_err(StoreError::internal)?,
                value,
                option_id: raw_option
                    .map(OptionId::new)
                    .transpose()
                    .map_err(StoreError::internal)?,
            };
            if let Some(submission) = submissions
                .iter_mut()
                .find(|s| s.id == answer.submission_id)
            {
                submission.answers.push(answer);
            }
        }

        Ok(Some((form, questions, submissions)))
    }
}
