use serde_json::{Map, Value};

/// A single application-defined record.
///
/// Records are JSON objects. The sink never inspects their fields; they are handed to
/// the backend as they arrived.
pub type Record = Map<String, Value>;

/// Parses one line of newline-delimited JSON into a [`Record`].
///
/// Fails when the line is not valid JSON or is valid JSON but not an object.
pub fn parse_record(line: &str) -> Result<Record, serde_json::Error> {
    serde_json::from_str::<Record>(line)
}
