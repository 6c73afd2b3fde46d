#![forbid(unsafe_code)]

pub mod field_type;
pub mod form;
pub mod ids;
pub mod submission;
pub mod user;

pub use field_type::{FieldType, ValueError};
pub use form::{FieldOption, FieldOptionDraft, Form, FormDraft, Question, QuestionDraft};
pub use ids::{AnswerId, FormId, OptionId, ParseError, QuestionId, SubmissionId, UserId};
pub use submission::{validate_answers, Answer, AnswerDraft, AnswerError, Submission};
pub use user::{validate_email_address, User};

pub const CRATE_NAME: &str = "formforge-model";
