use serde_json::{Value, json};

use super::catalog::Website;
use crate::tasks::ResultRow;

const CITIES: [&str; 5] = ["New York", "San Francisco", "Austin", "Miami", "Chicago"];

/// Stand-in rows for a finished run: `id = "result-N"` followed by the
/// selected fields in selection order. Values depend only on the row index
/// and the field name.
pub fn placeholder_results(website: &Website, fields: &[String], count: usize) -> Vec<ResultRow> {
    (1..=count)
        .map(|n| {
            let mut row = ResultRow::new();
            row.insert("id".into(), json!(format!("result-{n}")));
            for field in fields {
                row.insert(field.clone(), placeholder_value(website, field, n));
            }
            row
        })
        .collect()
}

fn placeholder_value(website: &Website, field: &str, n: usize) -> Value {
    match field {
        "title" | "name" => json!(format!("{} Item {n}", website.name)),
        "price" => json!(format!("${}.{:02}", 10 + (n * 137) % 990, (n * 37) % 99)),
        "rating" => json!(format!("{:.1} / 5.0", ((n * 7) % 50) as f64 / 10.0)),
        "reviews" => json!((n * 131) % 1000),
        "description" => json!(format!(
            "This is a sample description for item {n} from {}.",
            website.name
        )),
        "company" => {
            let letter = char::from(b'A' + ((n - 1) % 26) as u8);
            json!(format!("Company {letter} Inc."))
        }
        "location" => json!(CITIES[(n - 1) % CITIES.len()]),
        other => json!(format!("Sample {other} data")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::catalog;

    #[test]
    fn test_rows_follow_selection() {
        let amazon = catalog::find("amazon").unwrap();
        let rows = placeholder_results(amazon, &["price".into(), "title".into()], 3);

        assert_eq!(rows.len(), 3);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["id", "price", "title"]);
        assert_eq!(rows[2]["id"], json!("result-3"));
        assert_eq!(rows[0]["title"], json!("Amazon Item 1"));
    }

    #[test]
    fn test_values_by_field_kind() {
        let linkedin = catalog::find("linkedin").unwrap();
        let fields: Vec<String> = ["company", "location", "requirements", "reviews", "rating"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = placeholder_results(linkedin, &fields, 6);

        assert_eq!(rows[0]["company"], json!("Company A Inc."));
        assert_eq!(rows[1]["company"], json!("Company B Inc."));
        assert_eq!(rows[5]["location"], json!("New York"));
        assert_eq!(rows[0]["requirements"], json!("Sample requirements data"));
        assert!(rows[0]["reviews"].is_number());
        assert!(rows[0]["rating"].as_str().unwrap().ends_with(" / 5.0"));
    }

    #[test]
    fn test_deterministic() {
        let etsy = catalog::find("etsy").unwrap();
        let fields = vec!["price".to_string()];
        assert_eq!(
            placeholder_results(etsy, &fields, 5),
            placeholder_results(etsy, &fields, 5)
        );
    }
}
