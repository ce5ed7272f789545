//! PyPI simple-index link rewriting.
//!
//! The upstream index points package links at `files.pythonhosted.org`;
//! those must be rerouted through this proxy's own `/pypi/packages/...`
//! prefix before the page is cached, so installers download files through
//! the cache too. Query strings and fragments (`#sha256=...`) are
//! preserved verbatim.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use url::Url;

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href="([^"]*)""#).expect("static href pattern"))
}

/// Rewrite every `href` in a simple-index page to route through the proxy
/// mounted at `base_url` (e.g. `/pypi`). Links to unrelated hosts are left
/// untouched.
pub fn rewrite_index_html(html: &str, base_url: &str) -> String {
    href_re()
        .replace_all(html, |caps: &Captures| {
            format!(r#"href="{}""#, rewrite_href(&caps[1], base_url))
        })
        .into_owned()
}

fn rewrite_href(orig: &str, base_url: &str) -> String {
    match Url::parse(orig) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let host = url.host_str().unwrap_or("").to_ascii_lowercase();
            let rewritten = if host.ends_with("files.pythonhosted.org") {
                url.path()
                    .split_once("/packages/")
                    .map(|(_, suffix)| format!("{base_url}/packages/{suffix}"))
            } else if host.ends_with("pypi.org") {
                let path = url.path().trim_start_matches('/');
                Some(if path.is_empty() {
                    format!("{base_url}/")
                } else {
                    format!("{base_url}/{path}")
                })
            } else {
                None
            };

            match rewritten {
                Some(mut href) => {
                    if let Some(query) = url.query() {
                        href.push('?');
                        href.push_str(query);
                    }
                    if let Some(fragment) = url.fragment() {
                        href.push('#');
                        href.push_str(fragment);
                    }
                    href
                }
                None => orig.to_string(),
            }
        }
        // Other schemes (mailto:, data:) stay untouched.
        Ok(_) => orig.to_string(),
        // Relative link.
        Err(_) => {
            let split_at = orig.find(['?', '#']).unwrap_or(orig.len());
            let (path, suffix) = orig.split_at(split_at);
            let rel = path.trim_start_matches('/');

            if let Some(tail) = rel.strip_prefix("packages/") {
                format!("{base_url}/packages/{tail}{suffix}")
            } else if rel.starts_with("pypi/") {
                format!("{base_url}/{rel}{suffix}")
            } else {
                orig.to_string()
            }
        }
    }
}
