//! Allow-list policy: is this hostname a distraction during the session?
//!
//! # Rules (in order)
//!
//! 1. An empty hostname, or a URL we cannot extract one from, is allowed.
//!    Internal pages (`about:blank`, `data:`) have no host and must never be
//!    blocked.
//! 2. Hostnames containing `localhost` or `127.0.0.1` are allowed, so local
//!    development stays reachable whatever the list says.
//! 3. Otherwise the hostname is allowed iff some entry `s` satisfies
//!    `hostname.contains(s) || s.contains(hostname)`. The bidirectional match
//!    lets `docs.github.com` pass an entry of `github.com`, and the reverse.

use url::Url;

const LOCAL_HOST_MARKERS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Extracts the hostname of a URL. Returns `None` for unparsable URLs and
/// URLs without a host.
pub fn extract_hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_string())
}

/// Pure policy check. Total: never fails, never has side effects.
pub fn is_allowed(hostname: &str, allow_list: &[String]) -> bool {
    if hostname.is_empty() {
        return true;
    }

    if LOCAL_HOST_MARKERS
        .iter()
        .any(|marker| hostname.contains(marker))
    {
        return true;
    }

    allow_list
        .iter()
        .any(|site| hostname.contains(site.as_str()) || site.contains(hostname))
}

/// Fail-open wrapper over [`is_allowed`] for raw URLs.
pub fn is_url_allowed(url: &str, allow_list: &[String]) -> bool {
    match extract_hostname(url) {
        Some(hostname) => is_allowed(&hostname, allow_list),
        None => true,
    }
}

/// Allow-list entries, fixed for the lifetime of a session.
///
/// Entries are kept exactly as given. Only exact duplicates are dropped
/// (first-seen order kept), since a repeated entry never changes a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.as_ref();
            if !unique.iter().any(|seen| seen == entry) {
                unique.push(entry.to_string());
            }
        }
        Self { entries: unique }
    }

    pub fn allows(&self, hostname: &str) -> bool {
        is_allowed(hostname, &self.entries)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<String> {
        self.entries
    }
}
