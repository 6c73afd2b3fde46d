use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const TEXT_VALUE_MAX_LEN: usize = 10_000;

/// Tag selecting how a question is rendered and how its answer is validated.
///
/// The set is closed: storage, the wire format, and the generation prompt all
/// agree on these nine tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum FieldType {
    Input,
    Textarea,
    Switch,
    Select,
    RadioGroup,
    Email,
    Number,
    Date,
    Phone,
}

pub const ALL_FIELD_TYPES: [FieldType; 9] = [
    FieldType::Input,
    FieldType::Textarea,
    FieldType::Switch,
    FieldType::Select,
    FieldType::RadioGroup,
    FieldType::Email,
    FieldType::Number,
    FieldType::Date,
    FieldType::Phone,
];

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValueError {
    Empty,
    TooLong(usize),
    NotAnEmail,
    NotANumber,
    NotADate,
    NotAPhoneNumber,
    NotABool,
    UnknownFieldType(String),
}

impl Display for ValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("value must not be empty"),
            Self::TooLong(max) => write!(f, "value exceeds max length {max}"),
            Self::NotAnEmail => f.write_str("value is not a valid email address"),
            Self::NotANumber => f.write_str("value is not a finite number"),
            Self::NotADate => f.write_str("value is not a YYYY-MM-DD date"),
            Self::NotAPhoneNumber => f.write_str("value is not a valid phone number"),
            Self::NotABool => f.write_str("value must be 'true' or 'false'"),
            Self::UnknownFieldType(raw) => write!(f, "unknown field type: {raw}"),
        }
    }
}

impl std::error::Error for ValueError {}

impl FieldType {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        match raw {
            "Input" => Ok(Self::Input),
            "Textarea" => Ok(Self::Textarea),
            "Switch" => Ok(Self::Switch),
            "Select" => Ok(Self::Select),
            "RadioGroup" => Ok(Self::RadioGroup),
            "Email" => Ok(Self::Email),
            "Number" => Ok(Self::Number),
            "Date" => Ok(Self::Date),
            "Phone" => Ok(Self::Phone),
            other => Err(ValueError::UnknownFieldType(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Textarea => "Textarea",
            Self::Switch => "Switch",
            Self::Select => "Select",
            Self::RadioGroup => "RadioGroup",
            Self::Email => "Email",
            Self::Number => "Number",
            Self::Date => "Date",
            Self::Phone => "Phone",
        }
    }

    /// Choice types answer by referencing one of the question's options.
    #[must_use]
    pub const fn is_choice(self) -> bool {
        matches!(self, Self::Select | Self::RadioGroup)
    }

    /// Validates a free-text answer value against this field type. Choice
    /// types never reach here; their answers are option references.
    pub fn validate_value(self, value: &str) -> Result<(), ValueError> {
        if value.is_empty() {
            return Err(ValueError::Empty);
        }
        if value.len() > TEXT_VALUE_MAX_LEN {
            return Err(ValueError::TooLong(TEXT_VALUE_MAX_LEN));
        }
        match self {
            Self::Input | Self::Textarea | Self::Select | Self::RadioGroup => Ok(()),
            Self::Switch => match value {
                "true" | "false" => Ok(()),
                _ => Err(ValueError::NotABool),
            },
            Self::Email => validate_email(value),
            Self::Number => {
                let parsed = value.parse::<f64>().map_err(|_| ValueError::NotANumber)?;
                if parsed.is_finite() {
                    Ok(())
                } else {
                    Err(ValueError::NotANumber)
                }
            }
            Self::Date => validate_date(value),
            Self::Phone => validate_phone(value),
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn validate_email(value: &str) -> Result<(), ValueError> {
    let (local, domain) = value.split_once('@').ok_or(ValueError::NotAnEmail)?;
    if local.is_empty() || domain.is_empty() {
        return Err(ValueError::NotAnEmail);
    }
    if domain.contains('@') {
        return Err(ValueError::NotAnEmail);
    }
    let (host, tld) = domain.rsplit_once('.').ok_or(ValueError::NotAnEmail)?;
    if host.is_empty() || tld.is_empty() {
        return Err(ValueError::NotAnEmail);
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ValueError::NotAnEmail);
    }
    Ok(())
}

fn validate_date(value: &str) -> Result<(), ValueError> {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 3 || parts[0].len() != 4 || parts[1].len() != 2 || parts[2].len() != 2 {
        return Err(ValueError::NotADate);
    }
    let year = parts[0].parse::<u32>().map_err(|_| ValueError::NotADate)?;
    let month = parts[1].parse::<u32>().map_err(|_| ValueError::NotADate)?;
    let day = parts[2].parse::<u32>().map_err(|_| ValueError::NotADate)?;
    if year == 0 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(ValueError::NotADate);
    }
    Ok(())
}

fn validate_phone(value: &str) -> Result<(), ValueError> {
    let compact: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValueError::NotAPhoneNumber);
    }
    if !(7..=15).contains(&digits.len()) {
        return Err(ValueError::NotAPhoneNumber);
    }
    Ok(())
}
