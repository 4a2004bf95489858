//! Post identifiers: `<site><number>`, e.g. `d1437880` or `gelbooru.com1525416`.
//!
//! The site part is everything before the first ASCII digit and is matched
//! against each registered site's short code or domain, ignoring case. The
//! rest must be all digits, and the site part must not contain whitespace.

use crate::error::{NoteCopyError, Result};
use crate::models::Mode;
use crate::traits::{Post, SiteRegistry};

/// Split a post identifier into its site part and post number.
pub fn parse_token(token: &str) -> Result<(&str, u64)> {
    let token = token.trim();
    let invalid = || NoteCopyError::InvalidPostToken(token.to_string());

    let split = token
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (site, number) = token.split_at(split);
    if site.is_empty()
        || site.contains(char::is_whitespace)
        || !number.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    let post_id = number.parse::<u64>().map_err(|_| invalid())?;
    Ok((site, post_id))
}

/// Open the post named by `token` on whichever registered site it names.
pub fn locate(registry: &SiteRegistry, token: &str, mode: Mode) -> Result<Box<dyn Post>> {
    if registry.is_empty() {
        return Err(NoteCopyError::NoSites);
    }
    let (prefix, post_id) = parse_token(token)?;
    let site = registry
        .find(prefix)
        .ok_or_else(|| NoteCopyError::UnsupportedSite(prefix.to_string()))?;
    tracing::debug!(site = site.name(), post_id, %mode, "located post");
    Ok(site.open(post_id, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::tests::fake_registry;

    #[test]
    fn parse_short_code_and_domain() {
        assert_eq!(parse_token("d1437880").unwrap(), ("d", 1437880));
        assert_eq!(
            parse_token("gelbooru.com1525416").unwrap(),
            ("gelbooru.com", 1525416)
        );
        assert_eq!(parse_token(" G42 ").unwrap(), ("G", 42));
    }

    #[test]
    fn parse_rejects_malformed_tokens() {
        for token in ["", "d", "1234", "d12x", "d1.5", "d 12"] {
            assert!(
                matches!(parse_token(token), Err(NoteCopyError::InvalidPostToken(_))),
                "accepted {:?}",
                token
            );
        }
    }

    #[test]
    fn locate_opens_matching_site() {
        let registry = fake_registry();
        let post = locate(&registry, "a1", Mode::Write).unwrap();
        assert_eq!(post.site_name(), "Alpha");
        assert_eq!(post.post_id(), 1);
        assert_eq!(post.mode(), Mode::Write);

        let post = locate(&registry, "BETA.EXAMPLE77", Mode::Read).unwrap();
        assert_eq!(post.site_name(), "Beta");
        assert_eq!(post.post_id(), 77);
    }

    #[test]
    fn locate_unknown_site() {
        let err = locate(&fake_registry(), "e1", Mode::Read).unwrap_err();
        assert!(matches!(err, NoteCopyError::UnsupportedSite(ref s) if s == "e"));
    }

    #[test]
    fn locate_with_no_sites() {
        let err = locate(&SiteRegistry::new(), "d1", Mode::Read).unwrap_err();
        assert!(matches!(err, NoteCopyError::NoSites));
    }
}
