use reqwest::{
  blocking::{Client, RequestBuilder},
  header::{ACCEPT, AUTHORIZATION},
};
use serde::{Deserialize, Serialize};

use crate::{
  config::PullRequest,
  error::{Error, Result},
  ext::ResponseExt,
  format::REPORT_PREFIX,
};

/// Login of the token GitHub hands to workflow runs.
pub const BOT_LOGIN: &str = "github-actions[bot]";

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
  pub id: u64,
  pub author_login: String,
  pub body: String,
}

/// The issue-comment calls the publisher needs.
pub trait CommentApi {
  fn list_comments(&self, pr: &PullRequest) -> Result<Vec<Comment>>;
  fn create_comment(&self, pr: &PullRequest, body: &str) -> Result<()>;
  fn update_comment(&self, pr: &PullRequest, comment_id: u64, body: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
  Created,
  Updated(u64),
}

/// Whether `body` is a report titled exactly `title`. The heading reads
/// `## <status> \t <title>`, where the status may be empty.
pub fn is_report(body: &str, title: &str) -> bool {
  let Some(rest) = body.strip_prefix(REPORT_PREFIX) else {
    return false;
  };
  let heading = rest.lines().next().unwrap_or_default().trim_end();

  heading
    .strip_suffix(title)
    .is_some_and(|status| status.ends_with(" \t "))
}

pub fn find_report<'a>(comments: &'a [Comment], title: &str) -> Option<&'a Comment> {
  comments
    .iter()
    .find(|comment| comment.author_login == BOT_LOGIN && is_report(&comment.body, title))
}

/// Updates the bot's earlier report on `pr`, or creates one.
pub fn publish<A: CommentApi>(api: &A, pr: &PullRequest, title: &str, body: &str) -> Result<Published> {
  let comments = api.list_comments(pr)?;
  log::debug!("found {} comments on #{}", comments.len(), pr.number);

  match find_report(&comments, title) {
    Some(comment) => {
      api.update_comment(pr, comment.id, body)?;
      Ok(Published::Updated(comment.id))
    }
    None => {
      api.create_comment(pr, body)?;
      Ok(Published::Created)
    }
  }
}

#[derive(Deserialize)]
struct WireUser {
  login: String,
}

#[derive(Deserialize)]
struct WireComment {
  id: u64,
  user: Option<WireUser>,
  body: Option<String>,
}

impl From<WireComment> for Comment {
  fn from(wire: WireComment) -> Self {
    Self {
      id: wire.id,
      author_login: wire.user.map(|user| user.login).unwrap_or_default(),
      body: wire.body.unwrap_or_default(),
    }
  }
}

#[derive(Serialize)]
struct CommentBody<'a> {
  body: &'a str,
}

/// GitHub REST client for issue comments.
pub struct GithubClient {
  http: Client,
  api_url: String,
  token: String,
}

impl GithubClient {
  pub fn new(api_url: &str, token: String) -> Result<Self> {
    let http = Client::builder()
      .user_agent(USER_AGENT)
      .build()
      .map_err(|err| Error::remote("client", err))?;

    Ok(Self {
      http,
      api_url: api_url.trim_end_matches('/').to_string(),
      token,
    })
  }

  fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
    request
      .header(AUTHORIZATION, format!("Bearer {}", self.token))
      .header(ACCEPT, "application/vnd.github+json")
      .header("X-GitHub-Api-Version", API_VERSION)
  }

  fn issue_comments_url(&self, pr: &PullRequest) -> String {
    format!(
      "{}/repos/{}/{}/issues/{}/comments",
      self.api_url, pr.owner, pr.repo, pr.number
    )
  }

  fn list_request(&self, pr: &PullRequest) -> RequestBuilder {
    self
      .authorized(self.http.get(self.issue_comments_url(pr)))
      .query(&[("per_page", "100")])
  }

  fn create_request(&self, pr: &PullRequest, body: &str) -> RequestBuilder {
    self
      .authorized(self.http.post(self.issue_comments_url(pr)))
      .json(&CommentBody { body })
  }

  fn update_request(&self, pr: &PullRequest, comment_id: u64, body: &str) -> RequestBuilder {
    let url = format!(
      "{}/repos/{}/{}/issues/comments/{comment_id}",
      self.api_url, pr.owner, pr.repo
    );

    self.authorized(self.http.patch(url)).json(&CommentBody { body })
  }
}

impl CommentApi for GithubClient {
  fn list_comments(&self, pr: &PullRequest) -> Result<Vec<Comment>> {
    const CALL: &str = "list comments";

    let comments: Vec<WireComment> = self
      .list_request(pr)
      .send()
      .map_err(|err| Error::remote(CALL, err))?
      .check_success(CALL)?
      .json()
      .map_err(|err| Error::remote(CALL, err))?;

    Ok(comments.into_iter().map(Comment::from).collect())
  }

  fn create_comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
    const CALL: &str = "create comment";

    self
      .create_request(pr, body)
      .send()
      .map_err(|err| Error::remote(CALL, err))?
      .check_success(CALL)?;

    Ok(())
  }

  fn update_comment(&self, pr: &PullRequest, comment_id: u64, body: &str) -> Result<()> {
    const CALL: &str = "update comment";

    self
      .update_request(pr, comment_id, body)
      .send()
      .map_err(|err| Error::remote(CALL, err))?
      .check_success(CALL)?;

    Ok(())
  }
}
