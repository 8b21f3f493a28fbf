//! `Link` response header parsing for cursor-linked pages.

/// Forward and backward cursors of a page. A cursor is the link target as sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Parse an RFC 8288 style header such as
/// `<http://host/api/announcements?page=2>; rel="next"`.
///
/// Entries with other relations or malformed targets are ignored.
pub fn parse_link_header(value: &str) -> PageLinks {
    let mut links = PageLinks::default();
    for entry in value.split(',') {
        let mut parts = entry.split(';');
        let target = parts.next().map(str::trim).unwrap_or_default();
        let Some(target) = target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
        else {
            continue;
        };

        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            if key.trim() != "rel" {
                continue;
            }
            match value.trim().trim_matches('"') {
                "next" => links.next = Some(target.to_string()),
                "prev" => links.prev = Some(target.to_string()),
                _ => {}
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_next_and_prev() {
        let links = parse_link_header(
            r#"<http://localhost/api/announcements?page=1>; rel="prev", <http://localhost/api/announcements?page=3>; rel="next""#,
        );
        assert_eq!(
            links.prev.as_deref(),
            Some("http://localhost/api/announcements?page=1")
        );
        assert_eq!(
            links.next.as_deref(),
            Some("http://localhost/api/announcements?page=3")
        );
    }

    #[test]
    fn missing_relations_stay_none() {
        let links = parse_link_header(r#"</api/courses?page=2>; rel="next""#);
        assert_eq!(links.next.as_deref(), Some("/api/courses?page=2"));
        assert!(links.prev.is_none());
    }

    #[test]
    fn garbage_is_ignored() {
        assert_eq!(parse_link_header(""), PageLinks::default());
        assert_eq!(
            parse_link_header("no brackets; rel=next, <x>; foo=bar"),
            PageLinks::default()
        );
    }
}
