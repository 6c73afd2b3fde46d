use formforge_model::{FieldType, FormId, UserId};
use proptest::prelude::*;
use proptest::test_runner::Config;

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn user_id_round_trips_through_as_str(raw in "[A-Za-z0-9-]{1,64}") {
        let parsed = UserId::parse(&raw);
        prop_assume!(parsed.is_ok());
        let id = parsed.expect("user id");
        prop_assert_eq!(id.as_str(), raw.as_str());
    }

    #[test]
    fn row_ids_reject_non_positive(raw in i64::MIN..=0_i64) {
        prop_assert!(FormId::new(raw).is_err());
    }

    #[test]
    fn date_values_with_valid_components_pass(
        year in 1_u32..=9999,
        month in 1_u32..=12,
        day in 1_u32..=31
    ) {
        let value = format!("{year:04}-{month:02}-{day:02}");
        prop_assert!(FieldType::Date.validate_value(&value).is_ok());
    }

    #[test]
    fn phone_digit_runs_within_bounds_pass(digits in "[0-9]{7,15}") {
        prop_assert!(FieldType::Phone.validate_value(&digits).is_ok());
        prop_assert!(FieldType::Phone.validate_value(&format!("+{digits}")).is_ok());
    }
}

#[test]
fn user_id_rejects_whitespace_wrapped_input() {
    assert!(UserId::parse(" u1").is_err());
    assert!(UserId::parse("u1 ").is_err());
    assert!(UserId::parse("").is_err());
}

#[test]
fn field_type_serde_uses_pascal_case_tags() {
    let json = serde_json::to_string(&FieldType::RadioGroup).expect("serialize");
    assert_eq!(json, "\"RadioGroup\"");
    let back: FieldType = serde_json::from_str("\"Textarea\"").expect("deserialize");
    assert_eq!(back, FieldType::Textarea);
}
