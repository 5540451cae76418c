use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// A file uploaded alongside a create/update request (receipt, transfer voucher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    /// Form field the backend expects the file under (e.g. "receipt").
    pub field_name: String,
    pub file_name: String,
    pub mime_type: String,
    #[serde(skip_serializing, default)]
    pub bytes: Vec<u8>,
}

impl FileAttachment {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Request body of a create/update call.
///
/// The encoding is decided once, by which variant the caller constructs:
/// a JSON document, or multipart form fields plus exactly one file. Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationBody {
    Json(serde_json::Value),
    Multipart {
        fields: Vec<(String, String)>,
        file: FileAttachment,
    },
}

impl MutationBody {
    /// Build the body for a draft: multipart when a file is attached, JSON otherwise.
    ///
    /// Multipart fields are the draft's top-level JSON members rendered as text;
    /// nulls are omitted.
    pub fn from_draft<S: Serialize>(
        draft: &S,
        attachment: Option<&FileAttachment>,
    ) -> Result<Self, CoreError> {
        let value = serde_json::to_value(draft)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;

        let Some(file) = attachment else {
            return Ok(MutationBody::Json(value));
        };

        let fields = match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .filter(|(name, v)| !v.is_null() && name != &file.field_name)
                .map(|(name, v)| {
                    let text = match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (name, text)
                })
                .collect(),
            _ => {
                return Err(CoreError::Serialization(
                    "multipart drafts must serialize to a JSON object".into(),
                ))
            }
        };

        Ok(MutationBody::Multipart {
            fields,
            file: file.clone(),
        })
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, MutationBody::Multipart { .. })
    }
}
