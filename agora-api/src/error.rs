use anyhow::{anyhow, Context};
use serde_json::json;

use crate::{CommentId, PostId};

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Post not found {0}")]
    PostNotFound(PostId),

    #[error("Comment not found {0}")]
    CommentNotFound(CommentId),

    #[error("Invalid parent comment {0}")]
    InvalidParent(CommentId),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::PostNotFound(_) => StatusCode::NOT_FOUND,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidParent(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::PostNotFound(p) => json!({
                "message": "post not found",
                "type": "post-not-found",
                "post_id": p,
            }),
            Error::CommentNotFound(c) => json!({
                "message": "comment not found",
                "type": "comment-not-found",
                "comment_id": c,
            }),
            Error::InvalidParent(c) => json!({
                "message": "invalid parent_id",
                "type": "invalid-parent",
                "parent_id": c,
            }),
        })
        .expect("serializing error")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let id_field = |field: &str| {
            data.get(field)
                .and_then(|id| id.as_i64())
                .ok_or_else(|| anyhow!("error contents is missing integer field {field:?}"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "post-not-found" => Error::PostNotFound(PostId(id_field("post_id")?)),
                "comment-not-found" => Error::CommentNotFound(CommentId(id_field("comment_id")?)),
                "invalid-parent" => Error::InvalidParent(CommentId(id_field("parent_id")?)),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_back_what_it_serializes() {
        for err in [
            Error::Unknown(String::from("oops")),
            Error::PermissionDenied,
            Error::PostNotFound(PostId(4)),
            Error::CommentNotFound(CommentId(12)),
            Error::InvalidParent(CommentId(9)),
        ] {
            assert_eq!(Error::parse(&err.contents()).unwrap(), err);
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(Error::parse(b"not json").is_err());
        assert!(Error::parse(br#"{"type": "comment-not-found"}"#).is_err());
        assert!(Error::parse(br#"{"type": "teapot"}"#).is_err());
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            Error::InvalidParent(CommentId(1)).status_code(),
            http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::PermissionDenied.status_code(),
            http::StatusCode::FORBIDDEN
        );
    }
}
