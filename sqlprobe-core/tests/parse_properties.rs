//! Property tests for the parser's totality and dialect rules.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use sqlprobe_core::{ConnectionConfig, ConnectionString, DEFAULT_DATABASE, Dialect, Port, parse};

proptest! {
    #[test]
    fn parse_is_total_for_non_empty_input(raw in ".{1,200}") {
        let config = parse(Some(&raw));
        prop_assert!(config.is_some());
    }

    #[test]
    fn dialect_is_decided_by_prefix(suffix in ".{0,50}") {
        let url = format!("mssql{suffix}");
        prop_assert_eq!(Dialect::detect(&url), Dialect::Url);
        prop_assert_eq!(ConnectionString::tokenize(&url).dialect(), Dialect::Url);

        let other = format!("x{suffix}");
        prop_assert_eq!(Dialect::detect(&other), Dialect::KeyValue);
    }

    #[test]
    fn input_without_equals_or_prefix_is_all_defaults(raw in "[a-zA-Z0-9 _.,-]{1,80}") {
        prop_assume!(!raw.starts_with("mssql"));
        prop_assert_eq!(parse(Some(&raw)).unwrap(), ConnectionConfig::default());
    }

    #[test]
    fn url_query_only_accepts_yes(value in "[a-zA-Z]{1,6}") {
        let config = parse(Some(&format!("mssql://u:p@h?Encrypt={value}"))).unwrap();
        prop_assert_eq!(config.encrypt, value.eq_ignore_ascii_case("yes"));
    }

    #[test]
    fn key_value_accepts_true_or_yes(value in "[a-zA-Z]{1,6}") {
        let config = parse(Some(&format!("Server=h;Encrypt={value}"))).unwrap();
        let expected = value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("true");
        prop_assert_eq!(config.encrypt, expected);
    }

    #[test]
    fn url_fields_round_out(
        user in "[a-z]{1,10}",
        password in "[a-zA-Z0-9!#$%]{1,12}",
        host in "[a-z][a-z0-9.-]{0,20}",
        port in 1u16..=u16::MAX,
        database in proptest::option::of("[a-z]{1,10}"),
    ) {
        let path = database.as_deref().map(|db| format!("/{db}")).unwrap_or_default();
        let raw = format!("mssql://{user}:{password}@{host}:{port}{path}");
        let config = parse(Some(&raw)).unwrap();

        prop_assert_eq!(config.user, user);
        prop_assert_eq!(config.password.as_str(), password.as_str());
        prop_assert_eq!(config.server, host);
        prop_assert_eq!(config.port, Port::Number(u32::from(port)));
        prop_assert_eq!(config.database, database.unwrap_or_else(|| DEFAULT_DATABASE.to_string()));
    }
}
