use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::{DATA_FAMILY, FileBatch, FileMetadata, Row};
use crate::error::LandingError;

const PROPERTY_CODE: &str = "propertyCode";
const DISTRICT: &str = "district";
const NEIGHBORHOOD: &str = "neighborhood";
const PROPERTY_INFO: &str = "property_info";

const MISSING_KEY_PART: &str = "None";

static DATE_IN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}_\d{2}_\d{2}").expect("date pattern compiles"));

/// Unix seconds at UTC midnight of the `YYYY_MM_DD` date embedded in a listings file name.
pub fn timestamp_from_file_name(file_name: &str) -> Result<i64, LandingError> {
    let invalid = |reason: String| LandingError::InvalidFileName {
        file: file_name.to_string(),
        reason,
    };
    let date = DATE_IN_NAME
        .find(file_name)
        .ok_or_else(|| invalid("no YYYY_MM_DD date".to_string()))?;
    let date = NaiveDate::parse_from_str(date.as_str(), "%Y_%m_%d")
        .map_err(|err| invalid(format!("{}: {err}", date.as_str())))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| invalid("date has no midnight".to_string()))?;
    Ok(midnight.and_utc().timestamp())
}

fn key_part(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING_KEY_PART.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn row_key(record: &Map<String, Value>, timestamp: i64) -> Option<String> {
    let code = record.get(PROPERTY_CODE).filter(|value| !value.is_null())?;
    Some(format!(
        "{}_{}_{}_{timestamp}",
        key_part(Some(code)),
        key_part(record.get(DISTRICT)),
        key_part(record.get(NEIGHBORHOOD)),
    ))
}

pub fn property_info(record: &Map<String, Value>) -> Result<Vec<u8>, serde_json::Error> {
    let remainder = record
        .iter()
        .filter(|(name, _)| !matches!(name.as_str(), PROPERTY_CODE | DISTRICT | NEIGHBORHOOD))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect::<Map<_, _>>();
    serde_json::to_vec(&Value::Object(remainder))
}

pub fn transform(
    table: &str,
    file_name: &str,
    content: &[u8],
    ingested_at: &str,
) -> Result<FileBatch, LandingError> {
    let timestamp = timestamp_from_file_name(file_name)?;
    let malformed = |message: String| LandingError::MalformedJson {
        file: file_name.to_string(),
        message,
    };
    let records: Vec<Map<String, Value>> =
        serde_json::from_slice(content).map_err(|err| malformed(err.to_string()))?;

    let mut rows = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let key = row_key(record, timestamp).ok_or_else(|| LandingError::MissingField {
            file: file_name.to_string(),
            index,
            field: PROPERTY_CODE.to_string(),
        })?;
        let info = property_info(record).map_err(|err| malformed(err.to_string()))?;
        rows.push(Row::new(key).cell(DATA_FAMILY, PROPERTY_INFO, info));
    }

    let column_names = records
        .first()
        .map(|record| record.keys().cloned().collect())
        .unwrap_or_default();
    Ok(FileBatch {
        rows,
        metadata: FileMetadata {
            key: format!("{table}_{timestamp}_metadata"),
            num_rows: records.len(),
            column_names,
            ingested_at: ingested_at.to_string(),
        },
    })
}
