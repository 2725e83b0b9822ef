pub mod ndjson;
