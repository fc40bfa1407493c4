//! Collection schemas and pre-persist hooks.
//!
//! A [`CollectionSchema`] declares the fields of one collection and the
//! hooks a store must run before persisting a candidate record. Stores call
//! [`CollectionSchema::prepare`] on every `create` and `update`, so the
//! rules also hold for writes that bypass the query layer.
//!
//! # Write pipeline
//!
//! 1. Defaults fill missing fields (create only).
//! 2. Field checks: required, value kind, select options, date normalization.
//! 3. The collection's `validate` hook inspects the full candidate record.
//! 4. If no errors were collected, the `before_change` hook may mutate it.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{collections, timestamp};
use crate::store::Record;

/// Field value kinds understood by the write pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Number,
    Checkbox,
    Date,
    Json,
    Select(Vec<&'static str>),
    /// Id of a record in another collection.
    Relationship(&'static str),
    /// Id of a record in an upload collection.
    Upload(&'static str),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            unique: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Whether a write creates a record or modifies an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Create,
    Update,
}

/// Structured validation result: field name to message.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("validation failed: {}", self.summary())]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error for `field`. The first message per field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, message) in other.errors {
            self.add(field, message);
        }
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub type ValidateHook = fn(&Record) -> ValidationErrors;
pub type BeforeChangeHook = fn(WriteOperation, &mut Record);

#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub slug: &'static str,
    pub fields: Vec<FieldSpec>,
    /// Backed by binary uploads (metadata only is stored here).
    pub upload: bool,
    /// Hidden from admin listings.
    pub hidden: bool,
    pub validate: Option<ValidateHook>,
    pub before_change: Option<BeforeChangeHook>,
}

impl CollectionSchema {
    pub fn new(slug: &'static str) -> Self {
        Self {
            slug,
            fields: Vec::new(),
            upload: false,
            hidden: false,
            validate: None,
            before_change: None,
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn upload(mut self) -> Self {
        self.upload = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn validate(mut self, hook: ValidateHook) -> Self {
        self.validate = Some(hook);
        self
    }

    pub fn before_change(mut self, hook: BeforeChangeHook) -> Self {
        self.before_change = Some(hook);
        self
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// Runs the write pipeline over a full candidate record.
    pub fn prepare(
        &self,
        operation: WriteOperation,
        record: &mut Record,
    ) -> Result<(), ValidationErrors> {
        if operation == WriteOperation::Create {
            for field in &self.fields {
                if let Some(default) = &field.default {
                    if is_missing(record.get(field.name)) {
                        record.insert(field.name.to_string(), default.clone());
                    }
                }
            }
        }

        let mut errors = ValidationErrors::new();
        for field in &self.fields {
            check_field(field, record, &mut errors);
        }
        if let Some(validate) = self.validate {
            errors.merge(validate(record));
        }
        errors.into_result()?;

        if let Some(hook) = self.before_change {
            hook(operation, record);
        }
        Ok(())
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn check_field(field: &FieldSpec, record: &mut Record, errors: &mut ValidationErrors) {
    let value = record.get(field.name);
    if is_missing(value) {
        if field.required {
            errors.add(field.name, "This field is required");
        }
        return;
    }
    let Some(value) = value else { return };

    match &field.kind {
        FieldKind::Text
        | FieldKind::Textarea
        | FieldKind::Relationship(_)
        | FieldKind::Upload(_) => {
            if !value.is_string() {
                errors.add(field.name, "Expected a string");
            }
        }
        FieldKind::Email => match value.as_str() {
            Some(s) if s.contains('@') => {}
            _ => errors.add(field.name, "Expected an email address"),
        },
        FieldKind::Number => {
            if !value.is_number() {
                errors.add(field.name, "Expected a number");
            }
        }
        FieldKind::Checkbox => {
            if !value.is_boolean() {
                errors.add(field.name, "Expected a boolean");
            }
        }
        FieldKind::Select(options) => match value.as_str() {
            Some(s) if options.contains(&s) => {}
            _ => errors.add(
                field.name,
                format!("Must be one of: {}", options.join(", ")),
            ),
        },
        FieldKind::Date => match value.as_str().map(timestamp::normalize) {
            Some(Ok(normalized)) => {
                record.insert(field.name.to_string(), Value::String(normalized));
            }
            _ => errors.add(field.name, "Expected an RFC 3339 timestamp"),
        },
        FieldKind::Json => {}
    }
}

// ============ Registry ============

/// The set of collections a store serves.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    schemas: Vec<CollectionSchema>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the first-party chat collections.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(users());
        registry.register(chats());
        registry.register(chat_messages());
        registry.register(chat_votes());
        registry.register(chat_documents());
        registry.register(chat_suggestions());
        registry.register(streams());
        registry
    }

    /// Adds a schema, replacing any previous schema with the same slug.
    pub fn register(&mut self, schema: CollectionSchema) {
        self.schemas.retain(|s| s.slug != schema.slug);
        self.schemas.push(schema);
    }

    pub fn get(&self, slug: &str) -> Option<&CollectionSchema> {
        self.schemas.iter().find(|s| s.slug == slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.get(slug).is_some()
    }

    pub fn slugs(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.iter().map(|s| s.slug)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

// ============ First-party collections ============

pub fn users() -> CollectionSchema {
    CollectionSchema::new(collections::USERS)
        .field(FieldSpec::new("email", FieldKind::Email).required().unique())
        .field(FieldSpec::new("password", FieldKind::Text).required())
}

pub fn chats() -> CollectionSchema {
    CollectionSchema::new(collections::CHATS)
        .field(FieldSpec::new("userId", FieldKind::Relationship(collections::USERS)).required())
        .field(FieldSpec::new("title", FieldKind::Text).required())
        .field(
            FieldSpec::new("visibility", FieldKind::Select(vec!["private", "public"]))
                .required()
                .default_value(json!("private")),
        )
}

pub fn chat_messages() -> CollectionSchema {
    CollectionSchema::new(collections::MESSAGES)
        .field(FieldSpec::new("chatId", FieldKind::Relationship(collections::CHATS)).required())
        .field(FieldSpec::new("userId", FieldKind::Relationship(collections::USERS)))
        .field(
            FieldSpec::new(
                "role",
                FieldKind::Select(vec!["user", "assistant", "system", "tool"]),
            )
            .required(),
        )
        .field(FieldSpec::new("content", FieldKind::Json).required())
        .field(FieldSpec::new("attachments", FieldKind::Json).default_value(json!([])))
}

pub fn chat_votes() -> CollectionSchema {
    CollectionSchema::new(collections::VOTES)
        .field(FieldSpec::new("chatId", FieldKind::Relationship(collections::CHATS)).required())
        .field(
            FieldSpec::new("messageId", FieldKind::Relationship(collections::MESSAGES)).required(),
        )
        .field(FieldSpec::new("isUpvoted", FieldKind::Checkbox).required())
}

pub fn chat_documents() -> CollectionSchema {
    CollectionSchema::new(collections::DOCUMENTS)
        .field(FieldSpec::new("documentId", FieldKind::Text).required())
        .field(FieldSpec::new("title", FieldKind::Text).required())
        .field(
            FieldSpec::new(
                "kind",
                FieldKind::Select(vec!["text", "image", "code", "sheet"]),
            )
            .required()
            .default_value(json!("text")),
        )
        .field(FieldSpec::new("content", FieldKind::Textarea))
        .field(FieldSpec::new("userId", FieldKind::Relationship(collections::USERS)).required())
        .field(FieldSpec::new("chatId", FieldKind::Relationship(collections::CHATS)))
}

pub fn chat_suggestions() -> CollectionSchema {
    CollectionSchema::new(collections::SUGGESTIONS)
        .field(FieldSpec::new("documentId", FieldKind::Text).required())
        .field(FieldSpec::new("documentCreatedAt", FieldKind::Date).required())
        .field(FieldSpec::new("originalText", FieldKind::Textarea).required())
        .field(FieldSpec::new("suggestedText", FieldKind::Textarea).required())
        .field(FieldSpec::new("description", FieldKind::Text))
        .field(FieldSpec::new("isResolved", FieldKind::Checkbox).default_value(json!(false)))
        .field(FieldSpec::new("userId", FieldKind::Relationship(collections::USERS)).required())
}

pub fn streams() -> CollectionSchema {
    CollectionSchema::new(collections::STREAMS)
        .field(FieldSpec::new("chat", FieldKind::Relationship(collections::CHATS)).required())
}

// ============ Knowledge documents ============

pub fn knowledge_docs() -> CollectionSchema {
    CollectionSchema::new(collections::KNOWLEDGE_DOCS)
        .field(
            FieldSpec::new("type", FieldKind::Select(vec!["raw", "webpage", "document"]))
                .default_value(json!("raw")),
        )
        .field(FieldSpec::new("url", FieldKind::Text))
        .field(FieldSpec::new(
            "file",
            FieldKind::Upload(collections::KNOWLEDGE_UPLOADS),
        ))
        .field(FieldSpec::new("title", FieldKind::Text))
        .field(
            FieldSpec::new(
                "status",
                FieldKind::Select(vec!["pending", "fulfilled", "indexed", "error"]),
            )
            .default_value(json!("pending")),
        )
        .field(FieldSpec::new("content", FieldKind::Textarea))
        .validate(validate_knowledge_doc)
        .before_change(promote_raw_knowledge_doc)
}

pub fn knowledge_docs_upload() -> CollectionSchema {
    CollectionSchema::new(collections::KNOWLEDGE_UPLOADS)
        .upload()
        .hidden()
        .field(FieldSpec::new("filename", FieldKind::Text).required())
        .field(FieldSpec::new("mimeType", FieldKind::Text))
        .field(FieldSpec::new("filesize", FieldKind::Number))
}

fn is_raw(record: &Record) -> bool {
    record.get("type").and_then(Value::as_str) == Some("raw")
}

/// Raw documents carry their text inline, so both title and content are
/// required. Each field is checked on its own.
fn validate_knowledge_doc(record: &Record) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if is_raw(record) {
        if is_missing(record.get("title")) {
            errors.add("title", "A raw knowledge document must have a title");
        }
        if is_missing(record.get("content")) {
            errors.add("content", "A raw knowledge document must have content");
        }
    }
    errors
}

/// Raw documents need no fetching, so `pending` advances to `fulfilled`.
fn promote_raw_knowledge_doc(_operation: WriteOperation, record: &mut Record) {
    if is_raw(record) && record.get("status").and_then(Value::as_str) == Some("pending") {
        record.insert("status".to_string(), json!("fulfilled"));
    }
}
