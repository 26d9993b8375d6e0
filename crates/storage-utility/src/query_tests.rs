//! Tests for filter construction and query pages.

use super::*;

mod operator_tests {
    use super::*;

    #[test]
    fn test_parse_operators() {
        assert_eq!("eq".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::Eq);
        assert_eq!("NE".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::Ne);
        assert_eq!(" gt ".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::Gt);
        assert_eq!("ge".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::Ge);
        assert_eq!("lt".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::Lt);
        assert_eq!("le".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::Le);
    }

    #[test]
    fn test_parse_rejects_unknown_operator() {
        let result = "==".parse::<ComparisonOperator>();
        assert!(matches!(result, Err(ValidationError::InvalidFormat { .. })));
    }

    #[test]
    fn test_accepts_orderings() {
        use std::cmp::Ordering::*;

        assert!(ComparisonOperator::Eq.accepts(Equal));
        assert!(!ComparisonOperator::Eq.accepts(Less));
        assert!(ComparisonOperator::Ne.accepts(Greater));
        assert!(ComparisonOperator::Gt.accepts(Greater));
        assert!(!ComparisonOperator::Gt.accepts(Equal));
        assert!(ComparisonOperator::Ge.accepts(Equal));
        assert!(ComparisonOperator::Lt.accepts(Less));
        assert!(!ComparisonOperator::Lt.accepts(Equal));
        assert!(ComparisonOperator::Le.accepts(Equal));
        assert!(!ComparisonOperator::Le.accepts(Greater));
    }
}

mod odata_rendering {
    use super::*;

    #[test]
    fn test_partition_key_filter() {
        let filter = EntityFilter::partition_key(ComparisonOperator::Eq, "partitionvalue");
        assert_eq!(filter.to_odata(), "PartitionKey eq 'partitionvalue'");
    }

    #[test]
    fn test_row_key_between_filter() {
        let filter = EntityFilter::row_key_between("partitionvalue", "1111111111", "8888888888");

        assert_eq!(
            filter.to_string(),
            "PartitionKey eq 'partitionvalue' and (RowKey gt '1111111111' and RowKey lt '8888888888')"
        );
    }

    #[test]
    fn test_quotes_are_doubled() {
        let filter = EntityFilter::partition_key(ComparisonOperator::Eq, "o'brien");
        assert_eq!(filter.to_odata(), "PartitionKey eq 'o''brien'");
    }

    #[test]
    fn test_injection_attempt_stays_inside_literal() {
        let filter = EntityFilter::partition_key(ComparisonOperator::Eq, "x' or RowKey ne '");

        assert_eq!(
            filter.to_odata(),
            "PartitionKey eq 'x'' or RowKey ne '''"
        );
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal(""), "''");
        assert_eq!(quote_literal("plain"), "'plain'");
        assert_eq!(quote_literal("''"), "''''''");
    }
}

mod evaluation {
    use super::*;

    fn entity(pk: &str, rk: &str) -> Entity {
        Entity::new(pk, rk)
    }

    #[test]
    fn test_row_key_bounds_are_exclusive() {
        let filter = EntityFilter::row_key_between("partitionvalue", "1111111111", "8888888888");

        assert!(!filter.matches(&entity("partitionvalue", "1111111111")));
        assert!(filter.matches(&entity("partitionvalue", "5555555555")));
        assert!(!filter.matches(&entity("partitionvalue", "8888888888")));
        assert!(!filter.matches(&entity("partitionvalue", "9999999999")));
    }

    #[test]
    fn test_partition_must_match() {
        let filter = EntityFilter::row_key_between("partitionvalue", "1", "9");
        assert!(!filter.matches(&entity("otherpartition", "5")));
    }

    #[test]
    fn test_missing_or_non_string_property_never_matches() {
        let filter = EntityFilter::property("Name", ComparisonOperator::Ne, "x");

        assert!(!filter.matches(&entity("pk", "rk")));
        assert!(!filter.matches(&entity("pk", "rk").with("Name", 3)));
        assert!(filter.matches(&entity("pk", "rk").with("Name", "y")));
    }

    #[test]
    fn test_ordinal_comparison() {
        let filter = EntityFilter::row_key(ComparisonOperator::Lt, "b");

        assert!(filter.matches(&entity("pk", "a")));
        assert!(filter.matches(&entity("pk", "B")));
        assert!(!filter.matches(&entity("pk", "ba")));
    }
}

mod pages {
    use super::*;

    #[test]
    fn test_last_page_has_no_marker() {
        let page = QueryPage::new(vec![Entity::new("pk", "1")], None);

        assert!(page.is_last());
        assert_eq!(page.len(), 1);
        assert!(!page.is_empty());
    }

    #[test]
    fn test_page_with_marker_is_not_last() {
        let marker = ContinuationMarker::new("pk", Some("5".to_string()));
        let page = QueryPage::new(Vec::new(), Some(marker.clone()));

        assert!(!page.is_last());
        assert!(page.is_empty());
        assert_eq!(page.next_marker.as_ref().unwrap().next_partition_key(), "pk");
        assert_eq!(page.next_marker.as_ref().unwrap().next_row_key(), Some("5"));
    }

    #[test]
    fn test_page_iterates_entities_in_order() {
        let page = QueryPage::new(
            vec![Entity::new("pk", "1"), Entity::new("pk", "2")],
            None,
        );

        let row_keys: Vec<String> = page
            .into_iter()
            .map(|e| e.row_key().unwrap().to_string())
            .collect();
        assert_eq!(row_keys, vec!["1", "2"]);
    }

    #[test]
    fn test_table_query_builder() {
        let marker = ContinuationMarker::new("pk", None);
        let query = TableQuery::new(EntityFilter::partition_key(ComparisonOperator::Eq, "pk"))
            .with_top(10)
            .with_marker(Some(marker.clone()));

        assert_eq!(query.top, Some(10));
        assert_eq!(query.marker, Some(marker));
        assert!(query.filter.is_some());
    }
}
