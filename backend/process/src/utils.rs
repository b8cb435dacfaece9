use std::sync::LazyLock;

use chrono::prelude::*;
use regex::Regex;

static AD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid ad id pattern"));

pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Strips comments and whitespace. `None` for blank lines, `Err` for ids that
/// cannot be a live ad id.
pub fn sanitize(input: &str) -> Option<Result<String, String>> {
    let id = input.split('#').next().unwrap_or_default().trim();

    if id.is_empty() {
        return None;
    }

    if AD_ID.is_match(id) {
        Some(Ok(id.to_string()))
    } else {
        Some(Err(id.to_string()))
    }
}

/// Ids from the command line first, then the file, in order. Returns the valid
/// ids and the rejected ones.
pub fn collect_ids(args: Vec<String>, file: Option<&str>) -> (Vec<String>, Vec<String>) {
    let lines = file.map(str::lines).into_iter().flatten().map(str::to_string);

    let mut valid = Vec::new();
    let mut rejected = Vec::new();

    for raw in args.into_iter().chain(lines) {
        match sanitize(&raw) {
            Some(Ok(id)) => valid.push(id),
            Some(Err(id)) => rejected.push(id),
            None => {}
        }
    }

    (valid, rejected)
}

#[cfg(test)]
mod tests {
    use super::{collect_ids, sanitize};

    #[test]
    fn test_basic() {
        assert_eq!(sanitize("ad-1"), Some(Ok("ad-1".to_string())));
        assert_eq!(
            sanitize("  9b1de2c4_live  "),
            Some(Ok("9b1de2c4_live".to_string()))
        );
    }

    #[test]
    fn test_comments_and_blanks() {
        assert_eq!(sanitize(""), None);
        assert_eq!(sanitize("     "), None);
        assert_eq!(sanitize("# all ads for acme"), None);
        assert_eq!(sanitize("ad-7 # paused last week"), Some(Ok("ad-7".to_string())));
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(sanitize("ad 1"), Some(Err("ad 1".to_string())));
        assert_eq!(sanitize("ad;drop"), Some(Err("ad;drop".to_string())));
        assert_eq!(sanitize("eq.ad-1"), Some(Err("eq.ad-1".to_string())));
    }

    #[test]
    fn test_collect_ids() {
        let file = "# acme\nad-2\n\nad-3 # new\nbad id\n";
        let (valid, rejected) = collect_ids(vec!["ad-1".to_string()], Some(file));

        assert_eq!(valid, vec!["ad-1", "ad-2", "ad-3"]);
        assert_eq!(rejected, vec!["bad id"]);
    }
}
