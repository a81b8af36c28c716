// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use promptscraper::domain::models::scrape_request::OutputFormat;
use promptscraper::domain::models::Record;
use promptscraper::domain::services::result_normalizer::ResultNormalizer;
use serde_json::{json, Value};

fn records(values: Value) -> Vec<Record> {
    values
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

/// 规范化是幂等的
#[test]
fn test_normalization_is_idempotent() {
    let normalizer = ResultNormalizer::new();
    let input = records(json!([
        {"name": "  Desk\n lamp ", "price": 12.5, "stock": null},
        {"name": "Chair", "sku": "C-1", "on_sale": true},
        {"name": "Chair", "sku": "C-1", "on_sale": true}
    ]));

    for format in [OutputFormat::Json, OutputFormat::Csv] {
        let once = normalizer.normalize(input.clone(), format).unwrap();
        let twice = normalizer.normalize(once.records.clone(), format).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.total_results, 3, "duplicates are kept");
        assert_eq!(once.records[0]["name"], json!("Desk lamp"));
    }
}

#[test]
fn test_csv_columns_follow_first_appearance() {
    let normalized = ResultNormalizer::new()
        .normalize(
            records(json!([
                {"name": "Lamp", "price": 10},
                {"sku": "X", "name": "Desk"}
            ])),
            OutputFormat::Csv,
        )
        .unwrap();

    assert_eq!(
        normalized.columns,
        Some(vec![
            "name".to_string(),
            "price".to_string(),
            "sku".to_string()
        ])
    );
}

#[test]
fn test_nested_values_are_rejected() {
    let err = ResultNormalizer::new()
        .normalize(
            records(json!([{"name": "Lamp"}, {"tags": ["a", "b"]}])),
            OutputFormat::Json,
        )
        .unwrap_err();

    assert!(err.to_string().contains("tags"));
}
