use crate::error::MalformedInput;
use crate::store::{ActorRow, EventRow, FileBatch};
use serde_json::{Map, Value};

/// Wrapper keys checked, in order, when a file's top level is an object.
const WRAPPER_KEYS: [&str; 2] = ["items", "events"];
const ISSUE_COMMENT_EVENT: &str = "IssueCommentEvent";

/// Schema-less view over one event object. Every accessor tolerates a missing
/// key; `null` counts as missing.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> RawRecord<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn text_or_default(&self, key: &str) -> String {
        text(self.get(key))
    }

    /// A nested object; anything that is not an object reads as absent.
    pub fn nested(&self, key: &str) -> Option<RawRecord<'a>> {
        self.get(key).and_then(Value::as_object).map(RawRecord::new)
    }

    pub fn event_id(&self) -> String {
        self.text_or_default("id")
    }

    pub fn event_type(&self) -> String {
        self.text_or_default("type")
    }

    pub fn actor_id(&self) -> Option<&'a Value> {
        self.nested("actor").and_then(|actor| actor.get("id"))
    }

    pub fn actor_login(&self) -> String {
        self.nested("actor")
            .map(|actor| actor.text_or_default("login"))
            .unwrap_or_default()
    }

    pub fn repo_id(&self) -> Option<&'a Value> {
        self.nested("repo").and_then(|repo| repo.get("id"))
    }

    pub fn repo_name(&self) -> Option<&'a Value> {
        self.nested("repo").and_then(|repo| repo.get("name"))
    }

    pub fn created_at(&self) -> Option<&'a Value> {
        self.get("created_at")
    }

    /// `payload.issue.url`, only for issue comment events.
    pub fn issue_url(&self) -> Option<String> {
        if self.event_type() != ISSUE_COMMENT_EVENT {
            return None;
        }
        Some(
            self.nested("payload")
                .and_then(|payload| payload.nested("issue"))
                .map(|issue| issue.text_or_default("url"))
                .unwrap_or_default(),
        )
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Empty containers, `false`, zero, `""` and `null` carry no records.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Yields the event objects of a parsed file: the elements of a top-level
/// array, or of the first non-blank `items`/`events` value of a top-level
/// object when that value is an array. Non-object elements are skipped.
pub fn records(value: &Value) -> impl Iterator<Item = RawRecord<'_>> {
    let items: &[Value] = match value {
        Value::Array(items) => items,
        Value::Object(map) => WRAPPER_KEYS
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !is_blank(v)))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };
    items.iter().filter_map(Value::as_object).map(RawRecord::new)
}

/// Absent or null is `Ok(None)`. A present value that is not an integer is an
/// error rather than a skip.
pub fn coerce_actor_id(
    event_id: &str,
    value: Option<&Value>,
) -> Result<Option<i64>, MalformedInput> {
    let invalid = |raw: &Value| MalformedInput::ActorId {
        event_id: event_id.to_string(),
        raw: raw.to_string(),
    };
    let raw = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(raw) => raw,
    };
    let id = match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    id.map(Some).ok_or_else(|| invalid(raw))
}

/// Applies the admission gate: a record needs a non-empty event id and an
/// actor id. Rejected records are `Ok(None)`.
pub fn normalize_record(
    record: &RawRecord<'_>,
) -> Result<Option<(ActorRow, EventRow)>, MalformedInput> {
    let event_id = record.event_id();
    let event_type = record.event_type();
    let login = record.actor_login();
    let issue_url = record.issue_url();

    tracing::debug!(
        event_id = %event_id,
        event_type = %event_type,
        actor_id = %text(record.actor_id()),
        actor_login = %login,
        repo_id = %text(record.repo_id()),
        repo_name = %text(record.repo_name()),
        created_at = %text(record.created_at()),
        issue_url = issue_url.as_deref(),
        "record"
    );

    if event_id.is_empty() {
        tracing::debug!("skipping record without event id");
        return Ok(None);
    }
    let Some(actor_id) = coerce_actor_id(&event_id, record.actor_id())? else {
        tracing::debug!(event_id = %event_id, "skipping record without actor id");
        return Ok(None);
    };

    Ok(Some((
        ActorRow {
            id: actor_id,
            login,
        },
        EventRow {
            id: event_id,
            event_type,
            actor_id,
        },
    )))
}

pub fn normalize_file(value: &Value) -> Result<FileBatch, MalformedInput> {
    let mut batch = FileBatch::default();
    for record in records(value) {
        match normalize_record(&record)? {
            Some((actor, event)) => batch.push(actor, event),
            None => batch.skipped += 1,
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn admitted(value: Value) -> Vec<(ActorRow, EventRow)> {
        records(&value)
            .filter_map(|r| normalize_record(&r).unwrap())
            .collect()
    }

    #[test]
    fn bare_array_and_wrapped_objects_yield_same_records() {
        let elems = json!([
            {"id": "1", "type": "PushEvent", "actor": {"id": 1, "login": "a"}},
            "not an object",
            {"id": "2", "type": "ForkEvent", "actor": {"id": 2, "login": "b"}}
        ]);
        let bare = admitted(elems.clone());
        assert_eq!(bare.len(), 2);
        assert_eq!(admitted(json!({"events": elems.clone()})), bare);
        assert_eq!(admitted(json!({"items": elems})), bare);
    }

    #[test]
    fn items_wins_over_events() {
        let value = json!({
            "items": [{"id": "i", "actor": {"id": 1}}],
            "events": [{"id": "e", "actor": {"id": 1}}]
        });
        let got = admitted(value);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].1.id, "i");
    }

    #[test]
    fn blank_items_falls_through_to_events() {
        for items in [json!(null), json!([]), json!({}), json!(""), json!(false), json!(0)] {
            let value = json!({"items": items, "events": [{"id": "e", "actor": {"id": 1}}]});
            let got = admitted(value);
            assert_eq!(got.len(), 1, "items = {items}");
            assert_eq!(got[0].1.id, "e");
        }
    }

    #[test]
    fn non_array_items_hides_events() {
        let value = json!({"items": {"id": "x"}, "events": [{"id": "e", "actor": {"id": 1}}]});
        assert_eq!(records(&value).count(), 0);
    }

    #[test]
    fn unsupported_shapes_yield_nothing() {
        assert_eq!(records(&json!({"items": {"id": "1"}})).count(), 0);
        assert_eq!(records(&json!({"data": []})).count(), 0);
        assert_eq!(records(&json!("text")).count(), 0);
        assert_eq!(records(&json!(42)).count(), 0);
        assert_eq!(records(&Value::Null).count(), 0);
    }

    #[test]
    fn missing_optional_fields_default() {
        let got = admitted(json!([{"id": "9", "actor": {"id": 5}}]));
        assert_eq!(
            got,
            vec![(
                ActorRow {
                    id: 5,
                    login: String::new()
                },
                EventRow {
                    id: "9".to_string(),
                    event_type: String::new(),
                    actor_id: 5
                }
            )]
        );
    }

    #[test]
    fn admission_gate_requires_event_id_and_actor_id() {
        let value = json!([
            {"type": "PushEvent", "actor": {"id": 1}},
            {"id": "", "actor": {"id": 1}},
            {"id": null, "actor": {"id": 1}},
            {"id": "a"},
            {"id": "b", "actor": null},
            {"id": "c", "actor": "octocat"},
            {"id": "d", "actor": {"login": "x"}},
            {"id": "e", "actor": {"id": null}},
            {"id": "ok", "actor": {"id": 3}}
        ]);
        let batch = normalize_file(&value).unwrap();
        assert_eq!(batch.skipped, 8);
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].id, "ok");
        for event in &batch.events {
            assert!(!event.id.is_empty());
        }
    }

    #[test]
    fn numeric_event_id_is_stringified() {
        let got = admitted(json!([{"id": 12345, "actor": {"id": 1}}]));
        assert_eq!(got[0].1.id, "12345");
    }

    #[test]
    fn actor_id_coercion() {
        assert_eq!(coerce_actor_id("e", Some(&json!(42))).unwrap(), Some(42));
        assert_eq!(coerce_actor_id("e", Some(&json!("42"))).unwrap(), Some(42));
        assert_eq!(coerce_actor_id("e", Some(&json!(" 7 "))).unwrap(), Some(7));
        assert_eq!(coerce_actor_id("e", Some(&json!(3.0))).unwrap(), Some(3));
        assert_eq!(coerce_actor_id("e", Some(&json!(-1))).unwrap(), Some(-1));
        assert_eq!(coerce_actor_id("e", None).unwrap(), None);
        assert_eq!(coerce_actor_id("e", Some(&Value::Null)).unwrap(), None);

        for bad in [
            json!("octocat"),
            json!(1.5),
            json!(true),
            json!([1]),
            json!({"id": 1}),
            json!(u64::MAX),
        ] {
            let err = coerce_actor_id("e", Some(&bad)).unwrap_err();
            assert!(matches!(err, MalformedInput::ActorId { .. }), "{bad}");
        }
    }

    #[test]
    fn non_integer_actor_id_fails_the_file() {
        let value = json!([
            {"id": "1", "actor": {"id": 1}},
            {"id": "2", "actor": {"id": "not-a-number"}}
        ]);
        let err = normalize_file(&value).unwrap_err();
        assert!(format!("{err}").contains("event '2'"));
    }

    #[test]
    fn empty_event_id_is_skipped_before_actor_id_is_checked() {
        let value = json!([{"id": "", "actor": {"id": "garbage"}}]);
        let batch = normalize_file(&value).unwrap();
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn extracts_trace_fields() {
        let value = json!({
            "id": "77",
            "type": "IssueCommentEvent",
            "actor": {"id": 4, "login": "dev"},
            "repo": {"id": 10, "name": "org/repo"},
            "created_at": "2024-01-01T00:00:00Z",
            "payload": {"issue": {"url": "https://api.github.com/repos/org/repo/issues/1"}}
        });
        let record = RawRecord::new(value.as_object().unwrap());
        assert_eq!(record.repo_id(), Some(&json!(10)));
        assert_eq!(record.repo_name(), Some(&json!("org/repo")));
        assert_eq!(record.created_at(), Some(&json!("2024-01-01T00:00:00Z")));
        assert_eq!(
            record.issue_url().as_deref(),
            Some("https://api.github.com/repos/org/repo/issues/1")
        );
        assert_eq!(record.actor_login(), "dev");
    }

    #[test]
    fn issue_url_defaults_and_is_scoped_to_comment_events() {
        let comment = json!({"id": "1", "type": "IssueCommentEvent", "payload": {}});
        let push = json!({"id": "2", "type": "PushEvent", "payload": {"issue": {"url": "u"}}});
        assert_eq!(
            RawRecord::new(comment.as_object().unwrap()).issue_url(),
            Some(String::new())
        );
        assert_eq!(RawRecord::new(push.as_object().unwrap()).issue_url(), None);
    }
}
