use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::AtlasError;

/// A normalized phrase extracted from text with an importance weight.
///
/// Names are lowercased with whitespace collapsed; within one extraction
/// pass names are unique (collisions keep the higher importance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
    pub importance: f64,
}

impl Concept {
    pub fn new(name: impl Into<String>, importance: f64) -> Self {
        Self {
            name: normalize_concept_name(&name.into()),
            importance: importance.clamp(0.0, 1.0),
        }
    }
}

/// Lowercase + collapse internal whitespace. The canonical form used for
/// deduplication everywhere in the pipeline.
pub fn normalize_concept_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One output unit of the pipeline: a set of near-duplicate concepts unified
/// by the merger, positioned in 3D space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptGroup {
    /// Member concept names, largest-importance first.
    pub concepts: Vec<String>,
    /// 3D position; every coordinate is finite.
    pub reduced_embedding: [f64; 3],
    /// Indices of other groups with above-threshold centroid similarity,
    /// sorted strictly ascending, never self-referential.
    pub connections: Vec<usize>,
    /// Blended member-importance / connectivity score in [0, 1].
    pub importance_score: f64,
    /// Index of this group in the output array.
    pub group_id: usize,
}

/// Pointer to an uploaded text persisted through the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextReference {
    pub text_id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    /// Blob-store URL of the uploaded text.
    pub url: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub concepts: Vec<String>,
    pub upload_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Input to the pipeline, parsed at the HTTP boundary. Downstream code only
/// ever sees this tagged form.
#[derive(Debug, Clone)]
pub enum Source {
    Text(String),
    Url(String),
}

// ---------------------------------------------------------------------------
// HTTP surface DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct VectorizeRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Parsed by hand so a missing or malformed UUID maps to
    /// `InvalidRequest` instead of a deserialization rejection.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl VectorizeRequest {
    /// Exactly one of `text` / `url` must be present; empty strings count as
    /// absent.
    pub fn into_source(self) -> Result<(Source, Uuid, Option<String>), AtlasError> {
        let user_id = parse_user_id(self.user_id.as_deref().unwrap_or_default())?;
        let text = self.text.filter(|t| !t.trim().is_empty());
        let url = self.url.filter(|u| !u.trim().is_empty());
        let source = match (text, url) {
            (Some(t), None) => Source::Text(t),
            (None, Some(u)) => Source::Url(u),
            (Some(_), Some(_)) => {
                return Err(AtlasError::InvalidRequest(
                    "request must carry either 'text' or 'url', not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(AtlasError::InvalidRequest(
                    "request must carry a non-empty 'text' or 'url'".to_string(),
                ))
            }
        };
        Ok((source, user_id, self.filename))
    }
}

pub fn parse_user_id(raw: &str) -> Result<Uuid, AtlasError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AtlasError::InvalidRequest(format!("'{raw}' is not a valid user id")))
}

#[derive(Debug, Deserialize)]
pub struct TextsByConceptQuery {
    pub concept: String,
    pub user_id: String,
}

/// Success envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_concept_name() {
        assert_eq!(
            normalize_concept_name("  Neural   Networks "),
            "neural networks"
        );
        assert_eq!(normalize_concept_name("PCA"), "pca");
    }

    #[test]
    fn test_concept_clamps_importance() {
        assert_eq!(Concept::new("x", 1.7).importance, 1.0);
        assert_eq!(Concept::new("x", -0.2).importance, 0.0);
    }

    #[test]
    fn test_vectorize_request_source_selection() {
        let user_id = Some(Uuid::new_v4().to_string());
        let req = VectorizeRequest {
            text: Some("hello".into()),
            url: None,
            user_id: user_id.clone(),
            filename: None,
        };
        assert!(matches!(req.into_source(), Ok((Source::Text(_), _, _))));

        let req = VectorizeRequest {
            text: Some("  ".into()),
            url: None,
            user_id: user_id.clone(),
            filename: None,
        };
        assert!(req.into_source().is_err());

        let req = VectorizeRequest {
            text: Some("a".into()),
            url: Some("http://x".into()),
            user_id,
            filename: None,
        };
        assert!(req.into_source().is_err());
    }

    #[test]
    fn test_bad_or_missing_uuid_is_invalid_request() {
        for user_id in [Some("not-a-uuid".to_string()), None] {
            let req = VectorizeRequest {
                text: Some("hello".into()),
                url: None,
                user_id,
                filename: None,
            };
            match req.into_source() {
                Err(AtlasError::InvalidRequest(_)) => {}
                other => panic!("expected InvalidRequest, got {other:?}"),
            }
        }
    }
}
