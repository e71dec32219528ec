use agora_api::{
    Comment, CommentId, CommentService, Error, LikeStatus, NewComment, PostId, UpdateComment,
};
use anyhow::Context;
use reqwest::{Method, RequestBuilder, Response, StatusCode};

/// `CommentService` talking to the comments REST api
pub struct HttpService {
    client: reqwest::Client,
    host: String,
    token: Option<String>,
}

impl HttpService {
    pub fn new(host: String, token: Option<String>) -> HttpService {
        HttpService {
            client: reqwest::Client::new(),
            host,
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, format!("{}{path}", self.host));
        match &self.token {
            Some(tok) => req.bearer_auth(tok),
            None => req,
        }
    }
}

/// Turns non-success answers into an `Error`.
///
/// Bodies that are not a serialized `Error` are interpreted from their status code, with
/// `interpret` given the first chance.
async fn check(
    resp: Response,
    interpret: impl FnOnce(StatusCode) -> Option<Error>,
) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await.context("reading error body")?;
    let err = match Error::parse(&body) {
        Ok(err) => err,
        Err(_) => match interpret(status) {
            Some(err) => err,
            None if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
                Error::PermissionDenied
            }
            None => Error::Unknown(format!("{status}: {}", String::from_utf8_lossy(&body))),
        },
    };
    Err(err.into())
}

#[async_trait::async_trait]
impl CommentService for HttpService {
    async fn fetch_comments(&self, post: PostId) -> anyhow::Result<Vec<Comment>> {
        let resp = self
            .request(Method::GET, &format!("/posts/{post}/comments"))
            .send()
            .await
            .with_context(|| format!("fetching comments of post {post}"))?;
        check(resp, |s| (s == StatusCode::NOT_FOUND).then(|| Error::PostNotFound(post)))
            .await?
            .json()
            .await
            .context("parsing comments")
    }

    async fn create_comment(&self, post: PostId, comment: NewComment) -> anyhow::Result<Comment> {
        let parent = comment.parent_id;
        let resp = self
            .request(Method::POST, &format!("/posts/{post}/comments"))
            .json(&comment)
            .send()
            .await
            .with_context(|| format!("submitting comment on post {post}"))?;
        check(resp, |s| match (s, parent) {
            (StatusCode::NOT_FOUND, _) => Some(Error::PostNotFound(post)),
            (StatusCode::BAD_REQUEST, Some(p)) => Some(Error::InvalidParent(p)),
            _ => None,
        })
        .await?
        .json()
        .await
        .context("parsing created comment")
    }

    async fn update_comment(&self, id: CommentId, content: String) -> anyhow::Result<Comment> {
        let resp = self
            .request(Method::PUT, &format!("/comments/{id}"))
            .json(&UpdateComment { content })
            .send()
            .await
            .with_context(|| format!("editing comment {id}"))?;
        check(resp, |s| (s == StatusCode::NOT_FOUND).then(|| Error::CommentNotFound(id)))
            .await?
            .json()
            .await
            .context("parsing edited comment")
    }

    async fn delete_comment(&self, id: CommentId) -> anyhow::Result<()> {
        let resp = self
            .request(Method::DELETE, &format!("/comments/{id}"))
            .send()
            .await
            .with_context(|| format!("deleting comment {id}"))?;
        check(resp, |s| (s == StatusCode::NOT_FOUND).then(|| Error::CommentNotFound(id))).await?;
        Ok(())
    }

    async fn toggle_like(&self, id: CommentId) -> anyhow::Result<LikeStatus> {
        let resp = self
            .request(Method::POST, &format!("/comments/{id}/like"))
            .send()
            .await
            .with_context(|| format!("toggling like on comment {id}"))?;
        check(resp, |s| (s == StatusCode::NOT_FOUND).then(|| Error::CommentNotFound(id)))
            .await?
            .json()
            .await
            .context("parsing like status")
    }
}
