//! Candidate download addresses found in a post.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::store::{Post, Submission};

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Bare links and markdown `[text](link)` targets both start with a scheme.
        Regex::new(r#"https?://[^\s()\[\]<>"'`]+"#).expect("link pattern is valid")
    })
}

/// Addresses linked anywhere in a block of text, in order of appearance.
pub fn links_in_text(text: &str) -> Vec<String> {
    link_pattern()
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?', '*', '_'])
                .replace("&amp;", "&")
        })
        .filter(|link| Url::parse(link).is_ok())
        .collect()
}

/// Whether `address` is the thread page of the given post itself.
fn is_own_permalink(address: &str, submission_id: &str) -> bool {
    let bare_id = submission_id.trim_start_matches("t3_");
    let Ok(parsed) = Url::parse(address) else {
        return false;
    };
    let host = parsed.host_str().unwrap_or_default();
    if !(host == "redd.it" || host == "reddit.com" || host.ends_with(".reddit.com")) {
        return false;
    }
    let mut segments = parsed.path_segments().into_iter().flatten();
    if host == "redd.it" {
        return segments.next() == Some(bare_id);
    }
    segments
        .skip_while(|s| *s != "comments")
        .nth(1)
        .is_some_and(|s| s == bare_id)
}

fn submission_candidates(submission: &Submission) -> Vec<String> {
    if !submission.gallery.is_empty() {
        return submission.gallery.clone();
    }
    if submission.is_self {
        return links_in_text(&submission.self_text);
    }
    vec![submission.url.replace("&amp;", "&")]
}

/// Ordered, de-duplicated candidate addresses for `post`.
///
/// Galleries yield their members, self posts and comments the links in
/// their text, link posts their target. A post's own thread page is never
/// a candidate.
pub fn extract_urls(post: &Post) -> Vec<String> {
    let (candidates, thread_id) = match post {
        Post::Submission(s) => (submission_candidates(s), s.id.as_str()),
        Post::Comment(c) => (links_in_text(&c.body), c.parent_submission_id.as_str()),
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .filter(|a| !is_own_permalink(a, thread_id))
        .filter(|a| seen.insert(a.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{comment, submission};

    #[test]
    fn test_link_post_yields_target() {
        let post = Post::Submission(submission("t3_a"));
        assert_eq!(extract_urls(&post), vec!["https://i.redd.it/test.jpg"]);
    }

    #[test]
    fn test_self_post_links_deduped_in_order() {
        let mut s = submission("t3_abc");
        s.is_self = true;
        s.url = "https://www.reddit.com/r/test_sub/comments/abc/title/".to_string();
        s.self_text = "see [this](https://i.imgur.com/x.png), and https://v.redd.it/vid. \
                       Again: https://i.imgur.com/x.png"
            .to_string();
        assert_eq!(
            extract_urls(&Post::Submission(s)),
            vec!["https://i.imgur.com/x.png", "https://v.redd.it/vid"]
        );
    }

    #[test]
    fn test_self_post_without_links_is_empty() {
        let mut s = submission("t3_abc");
        s.is_self = true;
        s.url = "https://www.reddit.com/r/test_sub/comments/abc/title/".to_string();
        s.self_text = "just words".to_string();
        assert!(extract_urls(&Post::Submission(s)).is_empty());
    }

    #[test]
    fn test_own_permalink_excluded() {
        let mut s = submission("t3_abc");
        s.url = "https://www.reddit.com/r/test_sub/comments/abc/title/".to_string();
        assert!(extract_urls(&Post::Submission(s)).is_empty());

        let mut other = submission("t3_abc");
        other.url = "https://www.reddit.com/r/videos/comments/zzz/other/".to_string();
        assert_eq!(extract_urls(&Post::Submission(other)).len(), 1);
    }

    #[test]
    fn test_gallery_members_in_order() {
        let mut s = submission("t3_g");
        s.url = "https://www.reddit.com/gallery/g".to_string();
        s.gallery = vec![
            "https://i.redd.it/2.jpg".to_string(),
            "https://i.redd.it/1.jpg".to_string(),
        ];
        assert_eq!(
            extract_urls(&Post::Submission(s)),
            vec!["https://i.redd.it/2.jpg", "https://i.redd.it/1.jpg"]
        );
    }

    #[test]
    fn test_comment_body_links() {
        let mut c = comment("t1_c", "t3_abc");
        c.body = "mirror: https://i.redd.it/m.gif &amp; thread https://reddit.com/comments/abc/".to_string();
        assert_eq!(extract_urls(&Post::Comment(c)), vec!["https://i.redd.it/m.gif"]);
    }

    #[test]
    fn test_escaped_ampersands_are_unescaped() {
        let links = links_in_text("https://example.com/a?x=1&amp;y=2");
        assert_eq!(links, vec!["https://example.com/a?x=1&y=2"]);
    }
}
