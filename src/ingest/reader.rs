use crate::error::MalformedInput;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone)]
pub struct JsonFile {
    pub value: Value,
    pub sha256: String,
}

pub fn read_json_file(path: &Path) -> Result<JsonFile, MalformedInput> {
    let bytes = std::fs::read(path).map_err(|source| MalformedInput::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = parse_json_bytes(path, &bytes)?;
    Ok(JsonFile {
        value,
        sha256: sha256_hex(&bytes),
    })
}

/// Strict UTF-8 first; on failure retry once with a leading byte-order mark
/// stripped. The first error is reported when both attempts fail.
pub fn parse_json_bytes(path: &Path, bytes: &[u8]) -> Result<Value, MalformedInput> {
    match decode_and_parse(path, bytes) {
        Ok(value) => Ok(value),
        Err(first) => match bytes.strip_prefix(UTF8_BOM) {
            Some(rest) => decode_and_parse(path, rest).map_err(|_| first),
            None => Err(first),
        },
    }
}

fn decode_and_parse(path: &Path, bytes: &[u8]) -> Result<Value, MalformedInput> {
    let text = std::str::from_utf8(bytes).map_err(|source| MalformedInput::Utf8 {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(text).map_err(|source| MalformedInput::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
