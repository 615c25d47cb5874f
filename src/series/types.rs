use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const STATUS_SUCCEEDED: &str = "REQUEST_SUCCEEDED";
pub const STATUS_NOT_PROCESSED: &str = "REQUEST_NOT_PROCESSED";

/// Top-level response envelope. `Results` stays untyped until the status is known.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct Envelope {
    pub status: String,
    #[serde(default)]
    pub message: Vec<String>,
    #[serde(rename = "Results")]
    pub results: Option<Value>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct Results {
    pub series: Vec<WireSeries>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct WireSeries {
    #[serde(rename = "seriesID")]
    pub series_id: String,
    pub catalog: Option<Catalog>,
    pub data: Vec<Observation>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct Observation {
    pub year: String,
    pub period: String,
    #[serde(rename = "periodName")]
    pub period_name: Option<String>,
    pub value: String,
    pub footnotes: Option<Vec<Option<Footnote>>>,
    pub aspects: Option<Value>,
    pub calculations: Option<BTreeMap<String, BTreeMap<String, Value>>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct Footnote {
    pub code: Option<String>,
    pub text: Option<String>,
}

/// Catalog fields copied onto each record when catalog data is requested.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub series_title: Option<String>,
    pub seasonality: Option<String>,
    pub measure_data_type: Option<String>,
    pub commerce_industry: Option<String>,
    pub commerce_sector: Option<String>,
}

/// One observation of one series, flattened for tabular output.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub series_id: String,
    pub year: String,
    /// Human-readable period name, e.g. "January".
    pub period: String,
    /// Raw period code, e.g. "M01" or "M13".
    pub period_code: String,
    pub value: String,
    pub footnotes: String,
    #[serde(flatten)]
    pub catalog: Option<Catalog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspects: Option<Value>,
    /// `"{calculation_type}_{period}"` to value.
    #[serde(flatten)]
    pub calculations: BTreeMap<String, String>,
}

/// Joins footnote texts; `[{}]` and missing footnotes give an empty string.
pub(crate) fn footnote_text(footnotes: Option<&[Option<Footnote>]>) -> String {
    footnotes
        .unwrap_or_default()
        .iter()
        .flatten()
        .filter_map(|f| f.text.as_deref().or(f.code.as_deref()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Calculation values are usually strings but occasionally arrive as numbers.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footnote_text() {
        assert_eq!(footnote_text(None), "");
        assert_eq!(footnote_text(Some(&[Some(Footnote::default())][..])), "");

        let notes = [
            Some(Footnote {
                code: Some("P".to_string()),
                text: Some("preliminary".to_string()),
            }),
            None,
            Some(Footnote {
                code: Some("R".to_string()),
                text: None,
            }),
        ];
        assert_eq!(footnote_text(Some(&notes[..])), "preliminary; R");
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&Value::String("0.3".to_string())), "0.3");
        assert_eq!(value_text(&serde_json::json!(1.5)), "1.5");
        assert_eq!(value_text(&Value::Null), "");
    }

    #[test]
    fn test_observation_tolerates_empty_footnote_objects() {
        let obs: Observation = serde_json::from_str(
            r#"{"year":"2024","period":"M01","periodName":"January","latest":"true","value":"4.0","footnotes":[{}]}"#,
        )
        .unwrap();
        assert_eq!(obs.period_name.as_deref(), Some("January"));
        assert_eq!(footnote_text(obs.footnotes.as_deref()), "");
    }

    #[test]
    fn test_record_serialization_shape() {
        let mut calculations = BTreeMap::new();
        calculations.insert("net_changes_1".to_string(), "0.1".to_string());

        let record = SeriesRecord {
            series_id: "LNS14000000".to_string(),
            year: "2024".to_string(),
            period: "January".to_string(),
            period_code: "M01".to_string(),
            value: "3.7".to_string(),
            footnotes: String::new(),
            catalog: Some(Catalog {
                series_title: Some("Unemployment Rate".to_string()),
                ..Default::default()
            }),
            aspects: None,
            calculations,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["series_title"], "Unemployment Rate");
        assert_eq!(json["net_changes_1"], "0.1");
        assert_eq!(json["period"], "January");
        assert!(json.get("aspects").is_none());
        assert!(json.get("catalog").is_none());
    }
}
