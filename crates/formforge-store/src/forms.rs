// SPDX-License-Identifier: Apache-2.0

use crate::{Store, StoreError, StoreErrorCode};
use formforge_model::{
    FieldOption, FieldType, Form, FormDraft, FormId, OptionId, Question, QuestionDraft,
    QuestionId, UserId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

fn read_form(row: &Row<'_>) -> rusqlite::Result<Form> {
    let raw_id: i64 = row.get(0)?;
    let raw_owner: String = row.get(1)?;
    let conv = |e: formforge_model::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Integer, Box::new(e))
    };
    Ok(Form {
        id: FormId::new(raw_id).map_err(conv)?,
        owner: UserId::parse(&raw_owner).map_err(conv)?,
        name: row.get(2)?,
        description: row.get(3)?,
        published: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
    })
}

const FORM_COLUMNS: &str = "id, owner_id, name, description, published, created_at";

pub(crate) fn load_questions(conn: &Connection, form_id: FormId) -> Result<Vec<Question>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, form_id, text, field_type, required, position
         FROM questions WHERE form_id = ?1 ORDER BY position",
    )?;
    let mut questions = stmt
        .query_map(params![form_id.get()], |r| {
            let raw_id: i64 = r.get(0)?;
            let raw_form: i64 = r.get(1)?;
            let raw_type: String = r.get(3)?;
            Ok((
                raw_id,
                raw_form,
                r.get::<_, String>(2)?,
                raw_type,
                r.get::<_, i64>(4)? != 0,
                r.get::<_, i64>(5)? as u32,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|(id, form, text, field_type, required, position)| {
            Ok(Question {
                id: QuestionId::new(id).map_err(StoreError::internal)?,
                form_id: FormId::new(form).map_err(StoreError::internal)?,
                text,
                field_type: FieldType::parse(&field_type).map_err(StoreError::internal)?,
                required,
                position,
                options: Vec::new(),
            })
        })
        .collect::<Result<Vec<Question>, StoreError>>()?;

    let mut opt_stmt = conn.prepare(
        "SELECT o.id, o.question_id, o.text, o.value
         FROM field_options o
         JOIN questions q ON q.id = o.question_id
         WHERE q.form_id = ?1
         ORDER BY o.id",
    )?;
    let options = opt_stmt
        .query_map(params![form_id.get()], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (id, question_id, text, value) in options {
        let option = FieldOption {
            id: OptionId::new(id).map_err(StoreError::internal)?,
            question_id: QuestionId::new(question_id).map_err(StoreError::internal)?,
            text,
            value,
        };
        if let Some(question) = questions.iter_mut().find(|q| q.id == option.question_id) {
            question.options.push(option);
        }
    }
    Ok(questions)
}

fn insert_question(
    conn: &Connection,
    form_id: FormId,
    draft: &QuestionDraft,
    position: u32,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO questions (form_id, text, field_type, required, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            form_id.get(),
            draft.text,
            draft.field_type.as_str(),
            draft.required as i64,
            position as i64
        ],
    )?;
    let question_id = conn.last_insert_rowid();
    insert_options(conn, question_id, draft)?;
    Ok(question_id)
}

fn insert_options(
    conn: &Connection,
    question_id: i64,
    draft: &QuestionDraft,
) -> Result<(), StoreError> {
    let mut stmt =
        conn.prepare("INSERT INTO field_options (question_id, text, value) VALUES (?1, ?2, ?3)")?;
    for option in &draft.options {
        stmt.execute(params![question_id, option.text, option.value])?;
    }
    Ok(())
}

impl Store {
    pub fn insert_form(
        &mut self,
        owner: &UserId,
        draft: &FormDraft,
        created_at: i64,
    ) -> Result<FormId, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO forms (owner_id, name, description, published, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![owner.as_str(), draft.name, draft.description, created_at],
        )?;
        let form_id = FormId::new(tx.last_insert_rowid()).map_err(StoreError::internal)?;
        for (index, question) in draft.questions.iter().enumerate() {
            insert_question(&tx, form_id, question, index as u32)?;
        }
        tx.commit()?;
        Ok(form_id)
    }

    pub fn get_form(&self, id: FormId) -> Result<Option<Form>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = ?1"),
                params![id.get()],
                read_form,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn get_form_with_questions(
        &self,
        id: FormId,
    ) -> Result<Option<(Form, Vec<Question>)>, StoreError> {
        let Some(form) = self.get_form(id)? else {
            return Ok(None);
        };
        let questions = load_questions(&self.conn, id)?;
        Ok(Some((form, questions)))
    }

    /// Caller's forms, newest first, with question and submission counts.
    pub fn list_forms_by_user(
        &self,
        owner: &UserId,
    ) -> Result<Vec<(Form, u64, u64)>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FORM_COLUMNS},
                    (SELECT COUNT(*) FROM questions q WHERE q.form_id = forms.id),
                    (SELECT COUNT(*) FROM submissions s WHERE s.form_id = forms.id)
             FROM forms WHERE owner_id = ?1 ORDER BY id DESC"
        ))?;
        let rows = stmt
            .query_map(params![owner.as_str()], |r| {
                let form = read_form(r)?;
                Ok((form, r.get::<_, i64>(6)? as u64, r.get::<_, i64>(7)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_forms_by_user(&self, owner: &UserId) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM forms WHERE owner_id = ?1",
            params![owner.as_str()],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    /// Structural update of a draft form: surviving questions (id present and
    /// known) are updated in place with their options replaced, removed ones
    /// are deleted together with their options and answers, and the rest are
    /// inserted. Positions follow the input order. Published forms refuse the
    /// update inside the transaction.
    pub fn update_form(
        &mut self,
        id: FormId,
        name: &str,
        description: &str,
        questions: &[(Option<QuestionId>, QuestionDraft)],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        let published: Option<i64> = tx
            .query_row(
                "SELECT published FROM forms WHERE id = ?1",
                params![id.get()],
                |r| r.get(0),
            )
            .optional()?;
        match published {
            None => return Err(StoreError::new(StoreErrorCode::NotFound, "form not found")),
            Some(flag) if flag != 0 => {
                return Err(StoreError::new(
                    StoreErrorCode::Conflict,
                    "published forms are immutable",
                ))
            }
            Some(_) => {}
        }

        tx.execute(
            "UPDATE forms SET name = ?1, description = ?2 WHERE id = ?3",
            params![name, description, id.get()],
        )?;

        let existing: HashSet<i64> = tx
            .prepare("SELECT id FROM questions WHERE form_id = ?1")?
            .query_map(params![id.get()], |r| r.get::<_, i64>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        let incoming: HashSet<i64> = questions
            .iter()
            .filter_map(|(qid, _)| qid.map(QuestionId::get))
            .collect();

        for removed in existing.difference(&incoming) {
            tx.execute("DELETE FROM answers WHERE question_id = ?1", params![removed])?;
            tx.execute(
                "DELETE FROM field_options WHERE question_id = ?1",
                params![removed],
            )?;
            tx.execute("DELETE FROM questions WHERE id = ?1", params![removed])?;
        }

        for (index, (qid, draft)) in questions.iter().enumerate() {
            let position = index as u32;
            match qid {
                Some(qid) if existing.contains(&qid.get()) => {
                    tx.execute(
                        "UPDATE questions SET text = ?1, field_type = ?2, required = ?3, position = ?4
                         WHERE id = ?5",
                        params![
                            draft.text,
                            draft.field_type.as_str(),
                            draft.required as i64,
                            position as i64,
                            qid.get()
                        ],
                    )?;
                    tx.execute(
                        "DELETE FROM field_options WHERE question_id = ?1",
                        params![qid.get()],
                    )?;
                    insert_options(&tx, qid.get(), draft)?;
                }
                _ => {
                    insert_question(&tx, id, draft, position)?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn publish_form(&mut self, id: FormId) -> Result<(), StoreError> {
        let published: Option<i64> = self
            .conn
            .query_row(
                "SELECT published FROM forms WHERE id = ?1",
                params![id.get()],
                |r| r.get(0),
            )
            .optional()?;
        match published {
            None => Err(StoreError::new(StoreErrorCode::NotFound, "form not found")),
            Some(flag) if flag != 0 => Err(StoreError::new(
                StoreErrorCode::Conflict,
                "form is already published",
            )),
            Some(_) => {
                self.conn.execute(
                    "UPDATE forms SET published = 1 WHERE id = ?1",
                    params![id.get()],
                )?;
                Ok(())
            }
        }
    }

    /// Cascade delete: answers first, then submissions, options, questions,
    /// and finally the form row.
    pub fn delete_form(&mut self, id: FormId) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM forms WHERE id = ?1",
                params![id.get()],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::new(StoreErrorCode::NotFound, "form not found"));
        }
        tx.execute(
            "DELETE FROM answers WHERE submission_id IN
               (SELECT id FROM submissions WHERE form_id = ?1)",
            params![id.get()],
        )?;
        tx.execute(
            "DELETE FROM submissions WHERE form_id = ?1",
            params![id.get()],
        )?;
        tx.execute(
            "DELETE FROM field_options WHERE question_id IN
               (SELECT id FROM questions WHERE form_id = ?1)",
            params![id.get()],
        )?;
        tx.execute(
            "DELETE FROM questions WHERE form_id = ?1",
            params![id.get()],
        )?;
        tx.execute("DELETE FROM forms WHERE id = ?1", params![id.get()])?;
        tx.commit()?;
        Ok(())
    }
}