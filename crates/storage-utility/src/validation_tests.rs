//! Tests for required-field validation.

use super::*;
use serde_json::json;

fn populated_entity() -> Entity {
    Entity::new("partitionvalue", "1111111111")
        .with("FieldName1", "ValField1Entity1")
        .with("FieldName2", "ValField2Entity1")
        .with("FieldName3", "ValField3Entity1")
}

fn expected_fields() -> FieldSet {
    REQUIRED_FIELDS.into_iter().collect()
}

mod missing_fields {
    use super::*;

    /// An empty entity is missing every required field.
    #[test]
    fn test_empty_entity_reports_all_fields_missing() {
        let result = EntityValidator::default().validate(&Entity::default());

        match result {
            Err(ValidationError::MissingFields { expected, missing }) => {
                assert_eq!(expected, expected_fields());
                assert_eq!(missing, expected_fields());
            }
            other => panic!("Expected MissingFields, got: {:?}", other),
        }
    }

    /// The message carries both sets.
    #[test]
    fn test_missing_fields_message() {
        let error = EntityValidator::default()
            .validate(&Entity::default())
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "One of the required fields is missing. \
             Expected=FieldName1 FieldName2 FieldName3 missing=FieldName1 FieldName2 FieldName3"
        );
    }

    /// Every single missing field is reported exactly.
    #[test]
    fn test_each_missing_field_is_reported() {
        for field in REQUIRED_FIELDS {
            let mut entity = populated_entity();
            entity.remove(field);

            match EntityValidator::default().validate(&entity) {
                Err(ValidationError::MissingFields { expected, missing }) => {
                    assert_eq!(expected, expected_fields());
                    assert_eq!(missing, [field].into_iter().collect::<FieldSet>());
                }
                other => panic!("Expected MissingFields for {}, got: {:?}", field, other),
            }
        }
    }

    /// Missing takes precedence over empty values.
    #[test]
    fn test_missing_reported_before_empty() {
        let mut entity = populated_entity().with("FieldName1", "");
        entity.remove("FieldName3");

        match EntityValidator::default().validate(&entity) {
            Err(ValidationError::MissingFields { missing, .. }) => {
                assert_eq!(missing, ["FieldName3"].into_iter().collect::<FieldSet>());
            }
            other => panic!("Expected MissingFields, got: {:?}", other),
        }
    }
}

mod empty_values {
    use super::*;

    #[test]
    fn test_empty_string_names_field() {
        let entity = populated_entity().with("FieldName2", "");

        let error = EntityValidator::default().validate(&entity).unwrap_err();

        assert_eq!(
            error,
            ValidationError::NotPopulated {
                field: "FieldName2".to_string()
            }
        );
        assert_eq!(
            error.to_string(),
            "The required field FieldName2 is not populated"
        );
    }

    #[test]
    fn test_falsy_values_are_rejected() {
        for value in [json!(null), json!(0), json!(0.0), json!(false), json!([]), json!({})] {
            let entity = populated_entity().with("FieldName3", value.clone());

            assert!(
                matches!(
                    EntityValidator::default().validate(&entity),
                    Err(ValidationError::NotPopulated { ref field }) if field == "FieldName3"
                ),
                "{} should count as not populated",
                value
            );
        }
    }

    #[test]
    fn test_truthy_non_string_values_pass() {
        let entity = populated_entity()
            .with("FieldName1", 7)
            .with("FieldName2", true)
            .with("FieldName3", json!(["x"]));

        assert!(EntityValidator::default().validate(&entity).is_ok());
    }
}

mod passing_entities {
    use super::*;

    #[test]
    fn test_fully_populated_entity_passes() {
        assert!(EntityValidator::default()
            .validate(&populated_entity())
            .is_ok());
    }

    #[test]
    fn test_extra_fields_are_allowed() {
        let entity = populated_entity().with("ID", "1111111111");
        assert!(EntityValidator::default().validate(&entity).is_ok());
    }

    #[test]
    fn test_custom_required_fields() {
        let validator = EntityValidator::new(["ID", "ID", "Name"]);
        assert_eq!(validator.required_fields(), ["ID", "Name"]);

        let entity = Entity::new("pk", "rk").with("ID", "1").with("Name", "n");
        assert!(validator.validate(&entity).is_ok());

        let missing_name = Entity::new("pk", "rk").with("ID", "1");
        assert!(validator.validate(&missing_name).is_err());
    }
}
