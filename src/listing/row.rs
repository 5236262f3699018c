//! Listing rows and the JSON envelope returned by the listing endpoint.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Placeholder used when a row lacks its series or number.
pub const MISSING_FIELD: &str = "NA";

/// One page of the listing: `{"records": int, "rows": [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingEnvelope {
    /// Total rows matching the filters, across all pages.
    #[serde(default, deserialize_with = "lenient_count")]
    pub records: u64,
    /// Rows of the requested page, in server order.
    #[serde(default)]
    pub rows: Vec<DocumentRow>,
}

/// One invoice-like document listed by the portal.
///
/// Unknown fields are ignored. Text fields accept JSON strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DocumentRow {
    /// Document series (`serie`).
    #[serde(rename = "serie", default, deserialize_with = "lenient_text")]
    pub series: Option<String>,
    /// Document number within the series (`numero`).
    #[serde(rename = "numero", default, deserialize_with = "lenient_text")]
    pub number: Option<String>,
    /// Link to the PDF rendition (`urlpdf`).
    #[serde(rename = "urlpdf", default, deserialize_with = "lenient_text")]
    pub pdf_link: Option<String>,
    /// Link to the signed XML (`urlxml`).
    #[serde(rename = "urlxml", default, deserialize_with = "lenient_text")]
    pub xml_link: Option<String>,
    /// Emission date as shown by the portal (`f_emision`).
    #[serde(rename = "f_emision", default, deserialize_with = "lenient_text")]
    pub emission_date: Option<String>,
    /// Customer name (`razonsocial`).
    #[serde(rename = "razonsocial", default, deserialize_with = "lenient_text")]
    pub party_name: Option<String>,
    /// Document total (`total`).
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub total: Option<f64>,
    /// Voided marker (`estbaja`).
    #[serde(rename = "estbaja", default, deserialize_with = "lenient_text")]
    pub voided_flag: Option<String>,
}

impl DocumentRow {
    /// Human identifier `"{series}-{number}"`, with `NA` for missing parts.
    #[must_use]
    pub fn identifier(&self) -> String {
        format!(
            "{}-{}",
            self.series.as_deref().unwrap_or(MISSING_FIELD),
            self.number.as_deref().unwrap_or(MISSING_FIELD)
        )
    }

    /// PDF link when present and non-empty.
    #[must_use]
    pub fn pdf(&self) -> Option<&str> {
        self.pdf_link.as_deref().filter(|link| !link.is_empty())
    }

    /// XML link when present and non-empty.
    #[must_use]
    pub fn xml(&self) -> Option<&str> {
        self.xml_link.as_deref().filter(|link| !link.is_empty())
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    })
}
