//! Typed records for every collection.
//!
//! Field names follow the collection wire contract (camelCase JSON), so a
//! record read from any [`DocumentStore`](crate::store::DocumentStore)
//! deserializes directly into these types. `New*` types carry the data of a
//! create call; `id` and `createdAt` are optional there and filled in by the
//! store when absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection slugs.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CHATS: &str = "chats";
    pub const MESSAGES: &str = "chat-messages";
    pub const VOTES: &str = "chat-votes";
    pub const DOCUMENTS: &str = "chat-documents";
    pub const SUGGESTIONS: &str = "chat-suggestions";
    pub const STREAMS: &str = "stream";
    pub const KNOWLEDGE_DOCS: &str = "knowledge-docs";
    pub const KNOWLEDGE_UPLOADS: &str = "knowledge-docs-upload";
}

/// Name of the creation timestamp carried by every record.
pub const CREATED_AT: &str = "createdAt";
/// Name of the last-write timestamp carried by every record.
pub const UPDATED_AT: &str = "updatedAt";

/// Fixed-precision RFC 3339 timestamps.
///
/// Every timestamp is written as UTC with exactly six fractional digits so
/// that string comparison in either backend matches chronological order.
pub mod timestamp {
    use anyhow::Result;
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse(s: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
    }

    /// Re-renders any RFC 3339 string in the canonical form.
    pub fn normalize(s: &str) -> Result<String> {
        Ok(format(&parse(s)?))
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

// ============ Users ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    /// Password hash (PHC string), never the plaintext.
    pub password: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewUser<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

// ============ Chats ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Visibility::Private),
            "public" => Ok(Visibility::Public),
            other => anyhow::bail!("invalid visibility '{}': must be private or public", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub visibility: Visibility,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

// ============ Messages ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub role: Role,
    /// Message parts as produced by the chat UI.
    pub content: serde_json::Value,
    #[serde(default)]
    pub attachments: serde_json::Value,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub role: Role,
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<serde_json::Value>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

// ============ Votes ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    pub chat_id: String,
    pub message_id: String,
    pub is_upvoted: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewVote<'a> {
    pub chat_id: &'a str,
    pub message_id: &'a str,
    pub is_upvoted: bool,
}

// ============ Documents ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    #[default]
    Text,
    Image,
    Code,
    Sheet,
}

/// One version of a generated artifact. Versions share `document_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub document_id: String,
    pub title: String,
    pub kind: ArtifactKind,
    #[serde(default)]
    pub content: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub document_id: String,
    pub title: String,
    #[serde(default)]
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

// ============ Suggestions ============

/// An edit suggestion against one document version, identified by the
/// document's external id and that version's creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub document_id: String,
    #[serde(with = "timestamp")]
    pub document_created_at: DateTime<Utc>,
    pub original_text: String,
    pub suggested_text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
    pub user_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSuggestion {
    pub document_id: String,
    #[serde(with = "timestamp")]
    pub document_created_at: DateTime<Utc>,
    pub original_text: String,
    pub suggested_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub user_id: String,
}

// ============ Streams ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub id: String,
    pub chat: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewStream<'a> {
    pub id: &'a str,
    pub chat: &'a str,
}

// ============ Knowledge documents ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeDocType {
    #[default]
    Raw,
    Webpage,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeDocStatus {
    #[default]
    Pending,
    Fulfilled,
    Indexed,
    Error,
}

impl KnowledgeDocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeDocStatus::Pending => "pending",
            KnowledgeDocStatus::Fulfilled => "fulfilled",
            KnowledgeDocStatus::Indexed => "indexed",
            KnowledgeDocStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for KnowledgeDocStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(KnowledgeDocStatus::Pending),
            "fulfilled" => Ok(KnowledgeDocStatus::Fulfilled),
            "indexed" => Ok(KnowledgeDocStatus::Indexed),
            "error" => Ok(KnowledgeDocStatus::Error),
            other => anyhow::bail!(
                "invalid status '{}': must be pending, fulfilled, indexed, or error",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDoc {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: KnowledgeDocType,
    #[serde(default)]
    pub url: Option<String>,
    /// Id of the record in the upload collection.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub status: KnowledgeDocStatus,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Create payload for a knowledge document. Missing `type` and `status`
/// fall back to the schema defaults (`raw`, `pending`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewKnowledgeDoc {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<KnowledgeDocType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<KnowledgeDocStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
