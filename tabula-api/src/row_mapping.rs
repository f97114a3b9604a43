//! Generic result-row mapping.
//!
//! Rows are decoded by the driver-reported column type. Timestamps, dates
//! and times are formatted as text, `bytea` is decoded as lossy UTF-8, and
//! other natively decoded values are passed through as JSON scalars. Types
//! outside that set reach the mapper already cast to text.

use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::BTreeMap;
use tabula_core::ColumnMeta;
use tokio_postgres::types::Type;
use tokio_postgres::{Column, Row};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Response envelope for one browse page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseResponse {
    /// Column names in the order the executed statement reported them.
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, JsonValue>>,
    pub column_meta: BTreeMap<String, ColumnMeta>,
    pub page_size: i64,
}

/// How one result column is read off a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Oid,
    Text,
    Json,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Bytea,
}

/// Pick the decoder for a driver-reported type. Unlisted types are read as text.
pub fn decoder_for(ty: &Type) -> Decoder {
    match *ty {
        Type::BOOL => Decoder::Bool,
        Type::INT2 => Decoder::Int2,
        Type::INT4 => Decoder::Int4,
        Type::INT8 => Decoder::Int8,
        Type::FLOAT4 => Decoder::Float4,
        Type::FLOAT8 => Decoder::Float8,
        Type::OID => Decoder::Oid,
        Type::JSON | Type::JSONB => Decoder::Json,
        Type::UUID => Decoder::Uuid,
        Type::TIMESTAMP => Decoder::Timestamp,
        Type::TIMESTAMPTZ => Decoder::TimestampTz,
        Type::DATE => Decoder::Date,
        Type::TIME => Decoder::Time,
        Type::BYTEA => Decoder::Bytea,
        _ => Decoder::Text,
    }
}

fn float_value(value: f64) -> JsonValue {
    // NaN and infinities have no JSON number form.
    Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(value.to_string()))
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_timestamptz(value: DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_date(value: NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn format_time(value: NaiveTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

pub fn decode_bytes(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn decode_failed(column: &Column, err: tokio_postgres::Error) -> ApiError {
    tracing::error!(column = %column.name(), ty = %column.type_(), error = ?err, "Row decoding failed");
    ApiError::internal_error("Failed to decode result row")
}

impl Decoder {
    /// Read the value at `idx`. SQL `NULL` becomes JSON `null`.
    pub fn read(self, row: &Row, idx: usize) -> Result<JsonValue, tokio_postgres::Error> {
        let value = match self {
            Decoder::Bool => row.try_get::<_, Option<bool>>(idx)?.map(JsonValue::Bool),
            Decoder::Int2 => row.try_get::<_, Option<i16>>(idx)?.map(JsonValue::from),
            Decoder::Int4 => row.try_get::<_, Option<i32>>(idx)?.map(JsonValue::from),
            Decoder::Int8 => row.try_get::<_, Option<i64>>(idx)?.map(JsonValue::from),
            Decoder::Float4 => row
                .try_get::<_, Option<f32>>(idx)?
                .map(|v| float_value(f64::from(v))),
            Decoder::Float8 => row.try_get::<_, Option<f64>>(idx)?.map(float_value),
            Decoder::Oid => row.try_get::<_, Option<u32>>(idx)?.map(JsonValue::from),
            Decoder::Text => row.try_get::<_, Option<String>>(idx)?.map(JsonValue::String),
            Decoder::Json => row.try_get::<_, Option<JsonValue>>(idx)?,
            Decoder::Uuid => row
                .try_get::<_, Option<uuid::Uuid>>(idx)?
                .map(|v| JsonValue::String(v.to_string())),
            Decoder::Timestamp => row
                .try_get::<_, Option<NaiveDateTime>>(idx)?
                .map(|v| JsonValue::String(format_timestamp(v))),
            Decoder::TimestampTz => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)?
                .map(|v| JsonValue::String(format_timestamptz(v))),
            Decoder::Date => row
                .try_get::<_, Option<NaiveDate>>(idx)?
                .map(|v| JsonValue::String(format_date(v))),
            Decoder::Time => row
                .try_get::<_, Option<NaiveTime>>(idx)?
                .map(|v| JsonValue::String(format_time(v))),
            Decoder::Bytea => row
                .try_get::<_, Option<Vec<u8>>>(idx)?
                .map(|v| JsonValue::String(decode_bytes(&v))),
        };
        Ok(value.unwrap_or(JsonValue::Null))
    }
}

/// Decoders for a statement's result columns, built once per statement.
#[derive(Debug, Clone)]
pub struct RowMapper {
    names: Vec<String>,
    decoders: Vec<Decoder>,
}

impl RowMapper {
    pub fn new(columns: &[Column]) -> Self {
        Self {
            names: columns.iter().map(|c| c.name().to_string()).collect(),
            decoders: columns.iter().map(|c| decoder_for(c.type_())).collect(),
        }
    }

    /// Result column names in statement order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn map_row(&self, row: &Row) -> ApiResult<Map<String, JsonValue>> {
        let mut object = Map::with_capacity(self.names.len());
        for (idx, (name, decoder)) in self.names.iter().zip(&self.decoders).enumerate() {
            let value = decoder
                .read(row, idx)
                .map_err(|err| decode_failed(&row.columns()[idx], err))?;
            object.insert(name.clone(), value);
        }
        Ok(object)
    }

    pub fn map_rows(&self, rows: &[Row]) -> ApiResult<Vec<Map<String, JsonValue>>> {
        rows.iter().map(|row| self.map_row(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decoder_for_known_types() {
        assert_eq!(decoder_for(&Type::INT8), Decoder::Int8);
        assert_eq!(decoder_for(&Type::JSONB), Decoder::Json);
        assert_eq!(decoder_for(&Type::TIMESTAMPTZ), Decoder::TimestampTz);
        assert_eq!(decoder_for(&Type::BYTEA), Decoder::Bytea);
        assert_eq!(decoder_for(&Type::VARCHAR), Decoder::Text);
    }

    #[test]
    fn test_unlisted_types_read_as_text() {
        assert_eq!(decoder_for(&Type::NUMERIC), Decoder::Text);
        assert_eq!(decoder_for(&Type::INET), Decoder::Text);
        assert_eq!(decoder_for(&Type::INTERVAL), Decoder::Text);
    }

    #[test]
    fn test_timestamp_formats() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .and_then(|d| d.and_hms_micro_opt(13, 5, 9, 123_456))
            .unwrap();
        assert_eq!(format_timestamp(ts), "2024-02-29 13:05:09");

        let tz = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 58).unwrap();
        assert_eq!(format_timestamptz(tz), "2023-12-31 23:59:58");

        assert_eq!(format_date(ts.date()), "2024-02-29");
        assert_eq!(format_time(ts.time()), "13:05:09");
    }

    #[test]
    fn test_bytes_decoded_lossily() {
        assert_eq!(decode_bytes(b"plain"), "plain");
        assert_eq!(decode_bytes(&[0x66, 0xff, 0x6f]), "f\u{fffd}o");
    }

    #[test]
    fn test_non_finite_floats_become_strings() {
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
        assert_eq!(float_value(f64::NAN), JsonValue::String("NaN".to_string()));
        assert_eq!(float_value(f64::INFINITY), JsonValue::String("inf".to_string()));
    }

    #[test]
    fn test_response_envelope_shape() {
        let mut meta = BTreeMap::new();
        meta.insert(
            "author_id".to_string(),
            ColumnMeta {
                data_type: "integer".to_string(),
                label_table: Some("authors".to_string()),
                label_column: Some("name".to_string()),
            },
        );
        let mut row = Map::new();
        row.insert("id".to_string(), JsonValue::from(1));
        row.insert("author_id".to_string(), JsonValue::from(7));
        row.insert("author_name".to_string(), JsonValue::from("Knuth"));

        let response = BrowseResponse {
            columns: vec!["id".into(), "author_id".into(), "author_name".into()],
            rows: vec![row],
            column_meta: meta,
            page_size: 50,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["page_size"], 50);
        assert_eq!(json["column_meta"]["author_id"]["label_table"], "authors");
        let keys: Vec<&String> = json["rows"][0].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["id", "author_id", "author_name"]);
    }
}
