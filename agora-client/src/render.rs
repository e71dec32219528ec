use std::fmt::Write;

use crate::CommentView;

pub const DELETED_PLACEHOLDER: &str = "[This comment has been deleted]";

/// Renders a snapshot as indented text, one comment per line, children under their parent
pub fn render(views: &[CommentView]) -> String {
    let mut res = String::new();
    let mut stack = views.iter().rev().map(|v| (0, v)).collect::<Vec<_>>();
    while let Some((depth, v)) = stack.pop() {
        let indent = "  ".repeat(depth);
        // writing to a String cannot fail
        let _ = match (&v.author_name, &v.content) {
            (Some(author), Some(content)) if !v.deleted => writeln!(
                res,
                "{indent}#{} {author} ({} {}): {content}",
                v.id,
                v.like_count,
                if v.like_count == 1 { "like" } else { "likes" },
            ),
            _ => writeln!(res, "{indent}#{} {DELETED_PLACEHOLDER}", v.id),
        };
        stack.extend(v.children.iter().rev().map(|c| (depth + 1, c)));
    }
    res
}
