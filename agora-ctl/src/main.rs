use std::path::PathBuf;

use agora_api::{Comment, CommentId, CommentService, NewComment, PostId};
use agora_client::{render, CommentTree, Driver, Notice, ThreadSession, UserAction};
use anyhow::{anyhow, Context};
use futures::{channel::mpsc, stream, StreamExt};
use tokio::io::AsyncBufReadExt;

mod http;
mod ws;

use http::HttpService;
use ws::WsConnector;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, default_value = "http://127.0.0.1:8000")]
    host: String,

    /// Name displayed on your comments until the server confirms them
    #[structopt(short, long)]
    username: Option<String>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Follow a thread live, reading actions from stdin (type `help` to list them)
    Watch { post: i64 },

    /// Post a comment
    Comment {
        post: i64,

        content: String,

        /// Comment to reply to
        #[structopt(short, long)]
        parent: Option<i64>,
    },

    /// Edit one of your comments
    Edit { id: i64, content: String },

    /// Delete one of your comments
    Delete { id: i64 },

    /// Like or unlike a comment
    Like { id: i64 },

    /// Print a thread, either fetched from the server or from a JSON file of comments
    Render {
        #[structopt(long, required_unless = "file")]
        post: Option<i64>,

        #[structopt(conflicts_with = "post")]
        file: Option<PathBuf>,
    },
}

const HELP: &str = "\
comment <text>           post a top-level comment
reply <id> <text>        reply to comment <id>
edit <id> <text>         edit your comment <id>
delete <id>              delete your comment <id>
like <id>                like or unlike comment <id>
view <post>              switch to another thread
leave                    stop following the thread";

fn auth_token() -> Option<String> {
    std::env::var("AGORA_TOKEN").ok()
}

fn required_auth_token() -> anyhow::Result<String> {
    std::env::var("AGORA_TOKEN").context("retrieving AGORA_TOKEN environment variable")
}

fn parse_id(s: &str) -> anyhow::Result<i64> {
    s.parse().with_context(|| format!("parsing {s:?} as an id"))
}

/// Parses one line of the `watch` prompt
fn parse_action(line: &str) -> anyhow::Result<Option<UserAction>> {
    let line = line.trim();
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let id_and_text = || -> anyhow::Result<(CommentId, String)> {
        let (id, text) = rest
            .split_once(' ')
            .ok_or_else(|| anyhow!("expected an id followed by some text"))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(anyhow!("comment text cannot be empty"));
        }
        Ok((CommentId(parse_id(id)?), String::from(text)))
    };
    Ok(Some(match verb {
        "" => return Ok(None),
        "comment" if !rest.is_empty() => UserAction::Submit {
            content: String::from(rest),
            parent_id: None,
        },
        "comment" => return Err(anyhow!("comment text cannot be empty")),
        "reply" => {
            let (parent, content) = id_and_text()?;
            UserAction::Submit {
                content,
                parent_id: Some(parent),
            }
        }
        "edit" => {
            let (id, content) = id_and_text()?;
            UserAction::Edit { id, content }
        }
        "delete" => UserAction::Delete(CommentId(parse_id(rest)?)),
        "like" => UserAction::ToggleLike(CommentId(parse_id(rest)?)),
        "view" => UserAction::View(PostId(parse_id(rest)?)),
        "leave" => UserAction::Leave,
        verb => return Err(anyhow!("unknown action {verb:?}, type `help` for a list")),
    }))
}

async fn watch(opt: &Opt, post: PostId) -> anyhow::Result<()> {
    let token = auth_token();
    let author = opt.username.clone().unwrap_or_else(whoami::username);
    let driver = Driver::new(
        HttpService::new(opt.host.clone(), token.clone()),
        WsConnector::new(&opt.host, token)?,
        ThreadSession::new(author),
    );

    let lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let typed = stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line, lines)),
            Ok(None) => None,
            Err(err) => {
                tracing::error!(?err, "failed reading stdin");
                None
            }
        }
    })
    .filter_map(|line| async move {
        if line.trim() == "help" {
            println!("{HELP}");
            return None;
        }
        match parse_action(&line) {
            Ok(action) => action,
            Err(err) => {
                eprintln!("{err:#}");
                None
            }
        }
    });
    let actions = stream::once(async move { UserAction::View(post) })
        .chain(typed)
        .boxed_local()
        .fuse();

    let (notices, mut notices_rx) = mpsc::unbounded();
    let printer = async move {
        while let Some(notice) = notices_rx.next().await {
            match notice {
                Notice::Snapshot(views) => println!("----\n{}", render(&views)),
                Notice::ChannelOpened(post) => eprintln!("following thread {post} live"),
                Notice::ChannelClosed(post) => eprintln!("stopped following thread {post}"),
                Notice::Failed { op, error } => eprintln!("{op:?} failed: {error}"),
            }
        }
    };
    tokio::join!(driver.run(actions, notices), printer);
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serializing answer")?
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    match opt.cmd {
        Command::Watch { post } => watch(&opt, PostId(post)).await?,
        Command::Comment {
            post,
            ref content,
            parent,
        } => {
            let service = HttpService::new(opt.host.clone(), Some(required_auth_token()?));
            let c = service
                .create_comment(
                    PostId(post),
                    NewComment {
                        content: content.clone(),
                        parent_id: parent.map(CommentId),
                    },
                )
                .await?;
            print_json(&c)?;
        }
        Command::Edit { id, ref content } => {
            let service = HttpService::new(opt.host.clone(), Some(required_auth_token()?));
            print_json(&service.update_comment(CommentId(id), content.clone()).await?)?;
        }
        Command::Delete { id } => {
            let service = HttpService::new(opt.host.clone(), Some(required_auth_token()?));
            service.delete_comment(CommentId(id)).await?;
        }
        Command::Like { id } => {
            let service = HttpService::new(opt.host.clone(), Some(required_auth_token()?));
            print_json(&service.toggle_like(CommentId(id)).await?)?;
        }
        Command::Render { post, ref file } => {
            let records = match (post, file) {
                (Some(post), _) => {
                    HttpService::new(opt.host.clone(), auth_token())
                        .fetch_comments(PostId(post))
                        .await?
                }
                (None, Some(file)) => {
                    let data = std::fs::read(file)
                        .with_context(|| format!("reading {}", file.display()))?;
                    serde_json::from_slice::<Vec<Comment>>(&data)
                        .with_context(|| format!("parsing comments from {}", file.display()))?
                }
                (None, None) => return Err(anyhow!("either --post or a file is required")),
            };
            let mut tree = CommentTree::new();
            tree.seed(records);
            print!("{}", render(&tree.snapshot()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions() {
        assert_eq!(parse_action("   ").unwrap(), None);
        assert_eq!(
            parse_action("reply 12  hello there").unwrap(),
            Some(UserAction::Submit {
                content: String::from("hello there"),
                parent_id: Some(CommentId(12)),
            })
        );
        assert_eq!(
            parse_action("comment first!").unwrap(),
            Some(UserAction::Submit {
                content: String::from("first!"),
                parent_id: None,
            })
        );
        assert_eq!(
            parse_action("edit 3 fixed typo").unwrap(),
            Some(UserAction::Edit {
                id: CommentId(3),
                content: String::from("fixed typo"),
            })
        );
        assert_eq!(
            parse_action("delete 4").unwrap(),
            Some(UserAction::Delete(CommentId(4)))
        );
        assert_eq!(
            parse_action("like 5").unwrap(),
            Some(UserAction::ToggleLike(CommentId(5)))
        );
        assert_eq!(
            parse_action("view 2").unwrap(),
            Some(UserAction::View(PostId(2)))
        );
        assert_eq!(parse_action("leave").unwrap(), Some(UserAction::Leave));
    }

    #[test]
    fn rejects_bad_actions() {
        assert!(parse_action("reply 12").is_err());
        assert!(parse_action("reply twelve hi").is_err());
        assert!(parse_action("comment").is_err());
        assert!(parse_action("delete").is_err());
        assert!(parse_action("shout hi").is_err());
    }
}
