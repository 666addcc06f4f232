//! Converting between a body and its prose plus metadata table.

use crate::error::{Error, Result};
use crate::region::{MARKER_CLOSE, MARKER_OPEN, locate};
use crate::table::MetadataTable;
use serde_json::Value;

/// A body split into its human-authored prose and the decoded metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// The body with the marker removed.
    pub prose: String,
    /// The tenant table carried by the marker, empty when there was none.
    pub table: MetadataTable,
}

impl Decoded {
    /// Renders the prose and table back into a body.
    ///
    /// # Errors
    ///
    /// See [`encode`].
    pub fn to_body(&self) -> Result<String> {
        encode(&self.prose, &self.table)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Splits `body` into prose and metadata table.
///
/// An absent body is treated as empty. A body without a marker decodes to
/// itself as prose and an empty table.
///
/// # Errors
///
/// - [`Error::MalformedMetadata`] if the marker payload is not valid JSON
/// - [`Error::InvalidPayload`] if the payload is not a JSON object
///
/// # Examples
///
/// ```
/// use issue_metadata_marker::decode;
///
/// let decoded = decode(Some("text\n\n<!-- probot = {\"1\":{\"a\":1}} -->")).unwrap();
/// assert_eq!(decoded.prose, "text");
/// assert_eq!(decoded.table.tenants().collect::<Vec<_>>(), ["1"]);
/// ```
pub fn decode(body: Option<&str>) -> Result<Decoded> {
    let body = body.unwrap_or_default();
    let Some(region) = locate(body) else {
        return Ok(Decoded {
            prose: body.to_string(),
            table: MetadataTable::new(),
        });
    };

    let payload: Value =
        serde_json::from_str(region.payload(body)).map_err(Error::MalformedMetadata)?;
    let map = match payload {
        Value::Object(map) => map,
        other => {
            return Err(Error::InvalidPayload {
                found: type_name(&other),
            });
        }
    };

    Ok(Decoded {
        prose: region.strip(body),
        table: MetadataTable::from(map),
    })
}

/// Renders `prose` and `table` into a body.
///
/// An empty table yields `prose` unchanged; no empty marker is ever
/// written. Otherwise the marker is appended to the end of the prose.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the table cannot be serialized.
pub fn encode(prose: &str, table: &MetadataTable) -> Result<String> {
    if table.is_empty() {
        return Ok(prose.to_string());
    }

    let payload = serde_json::to_string(table).map_err(Error::Encode)?;
    let mut body =
        String::with_capacity(prose.len() + MARKER_OPEN.len() + payload.len() + MARKER_CLOSE.len());
    body.push_str(prose);
    body.push_str(MARKER_OPEN);
    body.push_str(&payload);
    body.push_str(MARKER_CLOSE);
    Ok(body)
}
