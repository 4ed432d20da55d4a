use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{CatalogError, Result};

/// Path shapes that identify an item page, as consecutive segments.
const MARKERS: [&[&str]; 2] = [&["dp"], &["gp", "product"]];
const MAX_SLUG_LEN: usize = 48;
const ASSET_EXTENSION: &str = "jpg";
const ID_DIGEST_LEN: usize = 8;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern compiles"));
static UNSAFE_TOKEN_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("token pattern compiles"));

/// Reduce an item-page URL to `scheme://host/<marker>/<token>`.
///
/// Anything before the marker, after the token, the query and the fragment
/// are dropped, so tracking variants of the same page map to one key.
pub fn canonicalize(raw: &str) -> Result<String> {
    let invalid = || CatalogError::InvalidIdentifierFormat(raw.to_string());

    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    let segments: Vec<&str> = url
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|s| !s.is_empty())
        .collect();

    let (marker, token) = (0..segments.len())
        .find_map(|i| {
            MARKERS.iter().find_map(|marker| {
                let rest = &segments[i..];
                if rest.len() > marker.len() && rest.starts_with(marker) {
                    Some((marker.join("/"), rest[marker.len()]))
                } else {
                    None
                }
            })
        })
        .ok_or_else(invalid)?;

    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Ok(format!("{}://{}/{}/{}", url.scheme(), authority, marker, token))
}

/// Final path segment of a canonical id, e.g. the `B001` of `/dp/B001`.
pub fn item_token(id: &str) -> &str {
    id.trim_end_matches('/').rsplit('/').next().unwrap_or(id)
}

/// Deterministic asset file name for a record: `<slug>-<token>-<digest>.jpg`.
///
/// The digest covers the whole canonical id, so the same token under a
/// different host or marker still gets its own file.
pub fn asset_file_name(display_name: &str, id: &str) -> String {
    let token = UNSAFE_TOKEN_CHARS.replace_all(item_token(id), "");
    format!(
        "{}-{}-{}.{}",
        slugify(display_name),
        token,
        id_digest(id),
        ASSET_EXTENSION
    )
}

fn id_digest(id: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(id.as_bytes()));
    digest.truncate(ID_DIGEST_LEN);
    digest
}

fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let dashed = NON_ALNUM.replace_all(&lower, "-");
    let mut slug: String = dashed.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_fragment_and_trailing_segments() {
        let a = canonicalize("https://x.com/dp/B001/ref=abc?tag=1").unwrap();
        let b = canonicalize("https://x.com/dp/B001").unwrap();
        let c = canonicalize("https://x.com/dp/B001#reviews").unwrap();
        assert_eq!(a, "https://x.com/dp/B001");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn drops_product_name_prefix() {
        let id = canonicalize("https://www.amazon.com/Some-Widget-Deluxe/dp/B07XYZ1234/ref=sr_1_3?crid=1").unwrap();
        assert_eq!(id, "https://www.amazon.com/dp/B07XYZ1234");
    }

    #[test]
    fn accepts_gp_product_shape() {
        let id = canonicalize("https://www.amazon.co.uk/gp/product/B00ABC/ref=ppx_yo_dt?ie=UTF8").unwrap();
        assert_eq!(id, "https://www.amazon.co.uk/gp/product/B00ABC");
    }

    #[test]
    fn keeps_explicit_port() {
        let id = canonicalize("http://localhost:8080/dp/B1?x=y").unwrap();
        assert_eq!(id, "http://localhost:8080/dp/B1");
    }

    #[test]
    fn is_idempotent() {
        for raw in [
            "https://x.com/dp/B001/ref=abc?tag=1",
            "https://x.com/Name/gp/product/B002/extra/more#frag",
            " https://X.com/dp/B003 ",
        ] {
            let once = canonicalize(raw).unwrap();
            assert_eq!(canonicalize(&once).unwrap(), once);
        }
    }

    #[test]
    fn rejects_unrecognized_shapes() {
        for raw in [
            "https://x.com/product/B001",
            "https://x.com/dp",
            "https://x.com/dp/",
            "https://x.com/gp/B001",
            "not a url",
            "mailto:someone@example.com",
        ] {
            let err = canonicalize(raw).unwrap_err();
            assert!(
                matches!(err, CatalogError::InvalidIdentifierFormat(ref u) if u == raw),
                "{raw} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn asset_name_is_slug_token_and_digest() {
        let id = "https://x.com/dp/B001";
        assert_eq!(
            asset_file_name("Widget", id),
            format!("widget-B001-{}.jpg", id_digest(id))
        );
        let id = "https://x.com/gp/product/B9";
        assert_eq!(
            asset_file_name("  Étagère: 3 Shelves!! ", id),
            format!("tag-re-3-shelves-B9-{}.jpg", id_digest(id))
        );
        let id = "https://x.com/dp/B1";
        assert_eq!(asset_file_name("???", id), format!("item-B1-{}.jpg", id_digest(id)));
    }

    #[test]
    fn digest_is_short_stable_hex() {
        let digest = id_digest("https://x.com/dp/B001");
        assert_eq!(digest.len(), ID_DIGEST_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, id_digest("https://x.com/dp/B001"));
    }

    #[test]
    fn same_token_under_other_shape_or_host_gets_own_file() {
        let names: std::collections::HashSet<_> = [
            "https://x.com/dp/B001",
            "https://x.com/gp/product/B001",
            "https://x.de/dp/B001",
        ]
        .iter()
        .map(|id| asset_file_name("Widget", id))
        .collect();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn long_names_are_truncated() {
        let name = "a".repeat(100);
        let id = "https://x.com/dp/B1";
        let file = asset_file_name(&name, id);
        assert_eq!(file, format!("{}-B1-{}.jpg", "a".repeat(MAX_SLUG_LEN), id_digest(id)));
    }
}
