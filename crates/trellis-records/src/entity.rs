//! Entity descriptors and field rules.

use trellis_types::{AssetPayload, Node, Record, RecordId};

use crate::error::{RecordError, RecordResult};

/// How a category-keyed entity gets its id on create.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdSource {
    /// A fresh UUID v7.
    Generated,
    /// The slug of a text field (e.g. a sponsor's name).
    SlugOf(&'static str),
}

/// Field layout of one entity type.
#[derive(Debug)]
pub struct EntitySpec {
    /// Name used in logs and messages.
    pub name: &'static str,
    /// Field whose value is the category key. Empty for roster members.
    pub category_field: &'static str,
    pub asset_field: &'static str,
    pub thumb_field: &'static str,
    /// Fields that must be non-empty text on create.
    pub required: &'static [&'static str],
    pub id_source: IdSource,
    /// Create rejects an id already present in the category.
    pub unique: bool,
    /// Stamp `createdAt` on create.
    pub stamp_created: bool,
}

pub const CREATED_AT: &str = "createdAt";

pub static SPONSOR: EntitySpec = EntitySpec {
    name: "sponsor",
    category_field: "tier",
    asset_field: "logo",
    thumb_field: "logoThumb",
    required: &["name", "tier"],
    id_source: IdSource::SlugOf("name"),
    unique: true,
    stamp_created: false,
};

pub static LECTURE: EntitySpec = EntitySpec {
    name: "lecture",
    category_field: "track",
    asset_field: "image",
    thumb_field: "imageThumb",
    required: &["title", "speaker", "track"],
    id_source: IdSource::Generated,
    unique: false,
    stamp_created: false,
};

pub static NOTIFICATION: EntitySpec = EntitySpec {
    name: "notification",
    category_field: "audience",
    asset_field: "image",
    thumb_field: "imageThumb",
    required: &["title", "body", "audience"],
    id_source: IdSource::Generated,
    unique: false,
    stamp_created: true,
};

pub static USER: EntitySpec = EntitySpec {
    name: "user",
    category_field: "role",
    asset_field: "avatar",
    thumb_field: "avatarThumb",
    required: &["name", "email", "role"],
    id_source: IdSource::Generated,
    unique: false,
    stamp_created: true,
};

pub static EVENT: EntitySpec = EntitySpec {
    name: "event",
    category_field: "category",
    asset_field: "poster",
    thumb_field: "posterThumb",
    required: &["name", "category", "startTime"],
    id_source: IdSource::Generated,
    unique: false,
    stamp_created: false,
};

pub static MEMBER: EntitySpec = EntitySpec {
    name: "member",
    category_field: "",
    asset_field: "photo",
    thumb_field: "photoThumb",
    required: &["name", "role"],
    id_source: IdSource::Generated,
    unique: false,
    stamp_created: false,
};

/// Event fields stored in the summary projection.
pub const EVENT_SUMMARY_FIELDS: &[&str] = &[
    "name", "category", "startTime", "endTime", "venue", "poster", "posterThumb",
];

/// Event fields stored in the detail projection. Fields in neither list
/// also go to the detail projection.
pub const EVENT_DETAIL_FIELDS: &[&str] = &[
    "name", "category", "startTime", "endTime", "description", "rules", "contact", "poster",
    "posterThumb",
];

/// A create or update request: record fields plus an optional asset.
///
/// An attached asset takes precedence over a payload string placed in the
/// asset field itself.
#[derive(Clone, Debug, Default)]
pub struct Change {
    pub fields: Record,
    pub asset: Option<AssetPayload>,
}

impl Change {
    pub fn new(fields: Record) -> Self {
        Self {
            fields,
            asset: None,
        }
    }

    pub fn with_asset(mut self, payload: AssetPayload) -> Self {
        self.asset = Some(payload);
        self
    }

    /// Build from a JSON node, which must be a mapping.
    pub fn from_node(node: Node) -> RecordResult<Self> {
        match node {
            Node::Object(fields) => Ok(Self::new(fields)),
            other => Err(RecordError::invalid(format!(
                "expected a mapping of fields, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Node::as_str)
    }
}

impl From<Record> for Change {
    fn from(fields: Record) -> Self {
        Self::new(fields)
    }
}

impl EntitySpec {
    /// Check every required field on a full record.
    pub fn validate_new(&self, fields: &Record) -> RecordResult<()> {
        for field in self.required {
            require_text(self.name, fields, field)?;
        }
        Ok(())
    }

    /// Check the required fields a patch touches: they may change but not
    /// be cleared. The thumbnail may only be set together with its asset,
    /// either as a field or as an attached payload.
    pub fn validate_patch(&self, change: &Change) -> RecordResult<()> {
        let fields = &change.fields;
        for field in self.required {
            if fields.contains_key(*field) {
                require_text(self.name, fields, field)?;
            }
        }
        if fields.contains_key(self.thumb_field)
            && !fields.contains_key(self.asset_field)
            && change.asset.is_none()
        {
            return Err(RecordError::invalid(format!(
                "{}: {} is derived from {} and cannot be set alone",
                self.name, self.thumb_field, self.asset_field
            )));
        }
        Ok(())
    }

    /// Id for a new record.
    pub fn new_id(&self, fields: &Record) -> RecordResult<RecordId> {
        match self.id_source {
            IdSource::Generated => Ok(RecordId::generate()),
            IdSource::SlugOf(field) => {
                let name = require_text(self.name, fields, field)?;
                RecordId::from_name(name).map_err(|e| RecordError::invalid(e.to_string()))
            }
        }
    }

    /// The category a full record belongs to.
    pub fn category_of<'a>(&self, fields: &'a Record) -> RecordResult<&'a str> {
        require_text(self.name, fields, self.category_field)
    }
}

fn require_text<'a>(entity: &str, fields: &'a Record, field: &str) -> RecordResult<&'a str> {
    match fields.get(field) {
        Some(Node::String(text)) if !text.trim().is_empty() => Ok(text.as_str()),
        Some(Node::String(_)) | Some(Node::Null) | None => Err(RecordError::invalid(format!(
            "{entity}: required field {field} is missing"
        ))),
        Some(other) => Err(RecordError::invalid(format!(
            "{entity}: field {field} must be text, got {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(node: &Node) -> &'static str {
    match node {
        Node::Null => "null",
        Node::Bool(_) => "a boolean",
        Node::Number(_) => "a number",
        Node::String(_) => "text",
        Node::Array(_) => "a sequence",
        Node::Object(_) => "a mapping",
    }
}

/// Split an event record into summary and detail parts.
pub fn split_event(fields: &Record) -> (Record, Record) {
    let mut summary = Record::new();
    let mut detail = Record::new();
    for (key, value) in fields {
        let in_summary = EVENT_SUMMARY_FIELDS.contains(&key.as_str());
        if in_summary {
            summary.insert(key.clone(), value.clone());
        }
        if EVENT_DETAIL_FIELDS.contains(&key.as_str()) || !in_summary {
            detail.insert(key.clone(), value.clone());
        }
    }
    (summary, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Node) -> Record {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn missing_and_blank_required_fields_are_rejected() {
        assert!(SPONSOR.validate_new(&rec(json!({"name": "Acme", "tier": "gold"}))).is_ok());
        let err = SPONSOR.validate_new(&rec(json!({"name": "Acme"}))).unwrap_err();
        assert_eq!(err.to_string(), "invalid record: sponsor: required field tier is missing");
        assert!(SPONSOR.validate_new(&rec(json!({"name": " ", "tier": "gold"}))).is_err());
        assert!(SPONSOR.validate_new(&rec(json!({"name": 4, "tier": "gold"}))).is_err());
    }

    #[test]
    fn patches_may_omit_but_not_clear_required_fields() {
        assert!(LECTURE.validate_patch(&Change::new(rec(json!({"room": "B2"})))).is_ok());
        assert!(LECTURE.validate_patch(&Change::new(rec(json!({"title": null})))).is_err());
        let thumb_only = Change::new(rec(json!({"imageThumb": "https://x/t.png"})));
        assert!(LECTURE.validate_patch(&thumb_only).is_err());
        // An attached upload replaces the thumbnail anyway.
        let with_upload = thumb_only.with_asset(AssetPayload::from(b"png".to_vec()));
        assert!(LECTURE.validate_patch(&with_upload).is_ok());
    }

    #[test]
    fn sponsor_ids_are_name_slugs() {
        let id = SPONSOR.new_id(&rec(json!({"name": "Acme Corp."}))).unwrap();
        assert_eq!(id.as_str(), "acme-corp");
        assert!(SPONSOR.new_id(&rec(json!({"name": "!!!"}))).is_err());
        assert_ne!(
            LECTURE.new_id(&Record::new()).unwrap(),
            LECTURE.new_id(&Record::new()).unwrap()
        );
    }

    #[test]
    fn event_split_shares_identity_fields() {
        let (summary, detail) = split_event(&rec(json!({
            "name": "Hackathon",
            "category": "tech",
            "startTime": "2026-03-01T09:00:00Z",
            "venue": "Hall A",
            "description": "24h build",
            "prizes": "swag"
        })));
        assert_eq!(
            summary,
            rec(json!({"name": "Hackathon", "category": "tech", "startTime": "2026-03-01T09:00:00Z", "venue": "Hall A"}))
        );
        assert_eq!(detail["name"], "Hackathon");
        assert_eq!(detail["description"], "24h build");
        assert_eq!(detail["prizes"], "swag");
        assert!(!detail.contains_key("venue"));
    }

    #[test]
    fn change_from_non_mapping_is_invalid() {
        assert!(Change::from_node(json!({"a": 1})).is_ok());
        assert!(matches!(
            Change::from_node(json!([1, 2])),
            Err(RecordError::InvalidRecord(_))
        ));
    }
}
