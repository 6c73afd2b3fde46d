use crate::config::ApiConfig;
use crate::external::ExternalError;
use async_trait::async_trait;
use formforge_api::dto::{FieldOptionDto, QuestionDto, SaveFormRequestDto};
use formforge_model::FieldType;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

const PROMPT_EXPLANATION: &str = "Based on the description, generate a survey object with 3 fields: \
name(string) for the form, description(string) of the form and a questions array where every \
element has 2 fields: text and the fieldType and fieldType can be of these options RadioGroup, \
Select, Input, Textarea, Switch, Email, Number, Date, Phone; and return it in json format. For \
RadioGroup and Select types also return fieldOptions array with text and value fields, for \
example [{\"text\": \"Yes\", \"value\": \"yes\"}, {\"text\": \"No\", \"value\": \"no\"}]. For all \
other types the fieldOptions array must be empty.";

/// Outbound surface of the text-generation provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalError>;
}

pub struct HttpTextGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpTextGenerator {
    pub fn from_config(api: &ApiConfig) -> Result<Self, ExternalError> {
        let api_key = api
            .assistant_api_key
            .clone()
            .ok_or_else(|| ExternalError("assistant API key is not configured".to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: api.assistant_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: api.assistant_model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{"parts": [{"text": prompt}]}]
            }))
            .send()
            .await
            .map_err(|e| ExternalError(format!("generation request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ExternalError(format!(
                "generation returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| ExternalError(format!("generation decode failed: {e}")))?;
        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ExternalError("generation response carried no text".to_string()))
    }
}

/// Stand-in used when no generation credentials are configured.
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ExternalError> {
        Err(ExternalError("form generation is not configured".to_string()))
    }
}

#[must_use]
pub fn build_prompt(description: &str) -> String {
    format!("{description} {PROMPT_EXPLANATION}")
}

/// Pulls the first-to-last brace span out of free text; models wrap JSON in
/// prose or code fences more often than not.
fn extract_json_object(text: &str) -> Result<&str, ExternalError> {
    let pattern = Regex::new(r"(?s)\{.*\}").map_err(|e| ExternalError(e.to_string()))?;
    pattern
        .find(text)
        .map(|m| m.as_str())
        .ok_or_else(|| ExternalError("no JSON object in generated text".to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedOption {
    text: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
    text: String,
    field_type: String,
    #[serde(default)]
    field_options: Vec<GeneratedOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedForm {
    name: String,
    description: String,
    questions: Vec<GeneratedQuestion>,
}

/// Turns raw generated text into a save request: extract the JSON object,
/// decode it, and map the loose field-type strings onto the closed tag set.
pub fn parse_generated_form(text: &str) -> Result<SaveFormRequestDto, ExternalError> {
    let raw = extract_json_object(text)?;
    let generated: GeneratedForm = serde_json::from_str(raw)
        .map_err(|e| ExternalError(format!("generated form decode failed: {e}")))?;

    let mut questions = Vec::with_capacity(generated.questions.len());
    for question in generated.questions {
        let field_type = FieldType::parse(&question.field_type)
            .map_err(|e| ExternalError(format!("generated question rejected: {e}")))?;
        let options = if field_type.is_choice() {
            question
                .field_options
                .into_iter()
                .map(|o| FieldOptionDto {
                    id: None,
                    text: o.text,
                    value: o.value,
                })
                .collect()
        } else {
            Vec::new()
        };
        questions.push(QuestionDto {
            id: None,
            text: question.text,
            field_type,
            required: false,
            options,
        });
    }

    Ok(SaveFormRequestDto {
        name: generated.name,
        description: generated.description,
        questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generated_json_wrapped_in_prose() {
        let text = r#"Sure! Here is your survey:
```json
{"name":"Pet survey","description":"About pets","questions":[
  {"text":"Do you have a pet?","fieldType":"RadioGroup",
   "fieldOptions":[{"text":"Yes","value":"yes"},{"text":"No","value":"no"}]},
  {"text":"Tell us more","fieldType":"Textarea","fieldOptions":[]}
]}
```
Let me know if you need anything else."#;

        let parsed = parse_generated_form(text).expect("parse");
        assert_eq!(parsed.name, "Pet survey");
        assert_eq!(parsed.questions.len(), 2);
        assert_eq!(parsed.questions[0].field_type, FieldType::RadioGroup);
        assert_eq!(parsed.questions[0].options.len(), 2);
        assert!(parsed.questions[1].options.is_empty());
    }

    #[test]
    fn stray_options_on_non_choice_questions_are_dropped() {
        let text = r#"{"name":"n","description":"d","questions":[
            {"text":"Your email","fieldType":"Email",
             "fieldOptions":[{"text":"x","value":"y"}]}
        ]}"#;
        let parsed = parse_generated_form(text).expect("parse");
        assert!(parsed.questions[0].options.is_empty());
    }

    #[test]
    fn unknown_field_types_are_rejected() {
        let text = r#"{"name":"n","description":"d","questions":[
            {"text":"q","fieldType":"Checkbox","fieldOptions":[]}
        ]}"#;
        assert!(parse_generated_form(text).is_err());
    }

    #[test]
    fn text_without_json_is_an_error() {
        assert!(parse_generated_form("I cannot help with that.").is_err());
    }
}
