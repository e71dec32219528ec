use agora_api::{Comment, CommentId, FeedMessage, NewComment, DELETED_CONTENT};
use agora_client::{CommentTree, CommentView};
use agora_mock_server::MockServer;
use chrono::{Duration, TimeZone, Utc};

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
struct GenComment {
    /// Taken modulo the number of previously generated comments
    parent: Option<u16>,
    deleted: bool,
    #[generator(bolero::generator::gen_with::<String>().len(0..20usize))]
    content: String,
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
struct Delivery {
    #[generator(bolero::generator::gen_with::<Vec<GenComment>>().len(1..40usize))]
    comments: Vec<GenComment>,

    /// Sort keys deciding the order in which records reach the client
    #[generator(bolero::generator::gen_with::<Vec<u16>>().len(0..100usize))]
    order: Vec<u16>,

    /// Records delivered a second time, at arbitrary points
    #[generator(bolero::generator::gen_with::<Vec<(u16, u16)>>().len(0..20usize))]
    replays: Vec<(u16, u16)>,
}

fn final_records(comments: &[GenComment]) -> Vec<Comment> {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    comments
        .iter()
        .enumerate()
        .map(|(i, c)| Comment {
            id: CommentId(i as i64 + 1),
            parent_id: match (i, c.parent) {
                (0, _) | (_, None) => None,
                (i, Some(p)) => Some(CommentId(p as i64 % i as i64 + 1)),
            },
            author_name: format!("user{}", i % 3),
            created_at: start + Duration::minutes(i as i64),
            content: match c.deleted {
                true => String::from(DELETED_CONTENT),
                false => c.content.clone(),
            },
            like_count: 0,
            deleted: c.deleted,
            children: Vec::new(),
        })
        .collect()
}

/// Sorts siblings by id, so that forests built in different orders can be compared
fn normalize(mut views: Vec<CommentView>) -> Vec<CommentView> {
    views.sort_by_key(|v| v.id);
    views
        .into_iter()
        .map(|mut v| {
            v.children = normalize(std::mem::take(&mut v.children));
            v
        })
        .collect()
}

#[test]
fn any_delivery_order_converges() {
    bolero::check!()
        .with_type::<Delivery>()
        .cloned()
        .for_each(|d| {
            let records = final_records(&d.comments);

            // Deleted comments are also seen alive first, although not necessarily delivered first
            let mut msgs = records.clone();
            msgs.extend(records.iter().filter(|r| r.deleted).map(|r| Comment {
                deleted: false,
                content: String::from("soon gone"),
                ..r.clone()
            }));
            let mut keyed = msgs
                .into_iter()
                .enumerate()
                .map(|(i, m)| (d.order.get(i).copied().unwrap_or(i as u16), i, m))
                .collect::<Vec<_>>();
            keyed.sort_by_key(|(k, i, _)| (*k, *i));
            let mut msgs = keyed.into_iter().map(|(_, _, m)| m).collect::<Vec<_>>();
            for (what, at) in d.replays {
                let m = msgs[what as usize % msgs.len()].clone();
                let at = at as usize % (msgs.len() + 1);
                msgs.insert(at, m);
            }

            let mut tree = CommentTree::new();
            for m in msgs.iter() {
                tree.upsert(m.clone());
            }
            tree.validate().unwrap();
            assert_eq!(tree.orphan_count(), 0);
            assert_eq!(tree.len(), records.len());
            for r in records.iter() {
                let node = tree.get(&r.id).unwrap();
                assert_eq!(node.parent_id, r.parent_id);
                assert_eq!(node.deleted, r.deleted);
            }

            let mut expected = CommentTree::new();
            expected.seed(records.clone());
            let snapshot = tree.snapshot();
            assert_eq!(normalize(snapshot.clone()), normalize(expected.snapshot()));

            // Everything has been seen already, replaying it all must be a no-op
            let mut again = tree.clone();
            for r in records {
                again.upsert(r);
            }
            assert_eq!(again.snapshot(), snapshot);
        });
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum ServerOp {
    Comment { parent: Option<u16> },
    Edit { target: u16 },
    Delete { target: u16 },
}

#[test]
fn live_feed_matches_refetch() {
    bolero::check!()
        .with_generator(bolero::generator::gen_with::<Vec<ServerOp>>().len(1..60usize))
        .cloned()
        .for_each(|ops| {
            let mut server = MockServer::new();
            let user = server.create_user(String::from("alice"));
            let post = server.create_post();
            let mut feed = server.action_feed(post).unwrap();

            let mut ids = Vec::new();
            for (i, op) in ops.into_iter().enumerate() {
                let pick = |t: u16| ids.get(t as usize % ids.len().max(1)).copied();
                // rejected operations, eg. replies to unknown parents, are fine
                let _ = match op {
                    ServerOp::Comment { parent } => {
                        let parent_id = parent.and_then(pick);
                        server
                            .create_comment(
                                user,
                                post,
                                NewComment {
                                    content: format!("comment {i}"),
                                    parent_id,
                                },
                            )
                            .map(|c| ids.push(c.id))
                    }
                    ServerOp::Edit { target } => match pick(target) {
                        Some(id) => server
                            .update_comment(user, id, format!("edit {i}"))
                            .map(|_| ()),
                        None => Ok(()),
                    },
                    ServerOp::Delete { target } => match pick(target) {
                        Some(id) => server.delete_comment(user, id),
                        None => Ok(()),
                    },
                };
            }

            let mut live = CommentTree::new();
            while let Ok(Some(frame)) = feed.try_next() {
                let msg: FeedMessage = serde_json::from_str(&frame).unwrap();
                live.upsert(msg.into_comment());
            }
            live.validate().unwrap();

            let mut fetched = CommentTree::new();
            fetched.seed(server.fetch_comments(post).unwrap());
            assert_eq!(normalize(live.snapshot()), normalize(fetched.snapshot()));
        });
}

#[test]
fn replayed_seed_is_stable() {
    bolero::check!()
        .with_type::<Vec<GenComment>>()
        .cloned()
        .for_each(|comments| {
            let records = final_records(&comments);
            let mut tree = CommentTree::new();
            tree.seed(records.clone());
            let first = tree.snapshot();
            tree.seed(records);
            assert_eq!(tree.snapshot(), first);
        });
}

