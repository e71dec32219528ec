use agora_api::{Comment, CommentId, DELETED_CONTENT};
use chrono::{Duration, TimeZone, Utc};
use rand::Rng;

#[cfg(test)]
mod convergence;

const AUTHORS: &[&str] = &["alice", "bob", "carol", "dave", "eve"];

const ROOT_PROBABILITY: f64 = 0.3;
const DELETED_PROBABILITY: f64 = 0.1;
const MAX_WORDS: usize = 30;
const MAX_LIKES: u64 = 20;

/// Generates a flat list of the `n` comments of a thread, parents before their replies
pub fn gen_thread(rng: &mut impl Rng, n: usize) -> Vec<Comment> {
    let mut res = Vec::with_capacity(n);
    let mut time = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    for i in 1..=n {
        time += Duration::seconds(rng.gen_range(1..3600));
        let parent_id = match i == 1 || rng.gen_bool(ROOT_PROBABILITY) {
            true => None,
            false => Some(CommentId(rng.gen_range(1..i as i64))),
        };
        let deleted = rng.gen_bool(DELETED_PROBABILITY);
        let words = rng.gen_range(1..=MAX_WORDS);
        res.push(Comment {
            id: CommentId(i as i64),
            parent_id,
            author_name: String::from(AUTHORS[rng.gen_range(0..AUTHORS.len())]),
            created_at: time,
            content: match deleted {
                true => String::from(DELETED_CONTENT),
                false => lipsum::lipsum_words_with_rng(&mut *rng, words),
            },
            like_count: rng.gen_range(0..=MAX_LIKES),
            deleted,
            children: Vec::new(),
        });
    }
    res
}

#[cfg(test)]
mod tests {
    use agora_client::CommentTree;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn generated_threads_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(42);
        let thread = gen_thread(&mut rng, 200);
        let mut tree = CommentTree::new();
        tree.seed(thread.clone());
        tree.validate().unwrap();
        assert_eq!(tree.len(), 200);
        assert_eq!(tree.orphan_count(), 0);
        assert!(thread.iter().all(|c| c.deleted == (c.content == DELETED_CONTENT)));
        let json = serde_json::to_string(&thread).unwrap();
        assert_eq!(serde_json::from_str::<Vec<Comment>>(&json).unwrap(), thread);
    }
}
