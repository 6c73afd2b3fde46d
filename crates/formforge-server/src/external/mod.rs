use std::fmt::{Display, Formatter};

pub mod assistant;
pub mod billing;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalError(pub String);

impl Display for ExternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ExternalError {}
