use serde::{Deserialize, Serialize};
use url::Url;

/// One named symbol from the search data (e.g. "vector") and its documentation pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Search id exactly as emitted, e.g. "va_5flist_2889"
    pub slug: String,
    /// Decoded search id used for matching, e.g. "va_list"
    pub sort_key: String,
    /// Numeric suffix of the slug, e.g. 2889
    pub ordinal: Option<u32>,
    /// Symbol name with HTML entities decoded, e.g. "vector< c_int >"
    pub display_name: String,
    /// Index section the entry came from, e.g. "classes", "functions"
    pub section: String,
    /// Documentation pages for this name, in source order. Never empty.
    pub targets: Vec<Target>,
}

/// A single documentation page for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    /// Qualifier distinguishing overloads, e.g. "std::pmr::vector". Empty when absent.
    pub scope: String,
    pub link_target: LinkTarget,
}

/// Where the search page opens a result link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkTarget {
    /// In place of the page hosting the search box (non-zero record flag).
    Parent,
    /// In a new window.
    Blank,
}

impl LinkTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Blank => "blank",
        }
    }
}

impl Target {
    /// The target URL resolved against `base`, following browser rules: rooted
    /// paths replace the base path, `../` segments are collapsed and absolute
    /// URLs are kept. Without a base, or when joining fails, the stored URL is
    /// returned as is.
    pub fn resolved_url(&self, base: Option<&Url>) -> String {
        match base {
            Some(base) => base
                .join(&self.url)
                .map(String::from)
                .unwrap_or_else(|_| self.url.clone()),
            None => self.url.clone(),
        }
    }
}

/// A search index section (e.g. "classes": "Classes") and how many entries it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub name: String,
    pub label: String,
    pub entry_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str) -> Target {
        Target {
            url: url.to_string(),
            scope: String::new(),
            link_target: LinkTarget::Parent,
        }
    }

    fn base(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn absolute_urls_ignore_base() {
        let t = target("https://en.cppreference.com/w/cpp/container/vector.html");
        assert_eq!(
            t.resolved_url(Some(&base("https://docs.example.org/api/"))),
            "https://en.cppreference.com/w/cpp/container/vector.html"
        );
    }

    #[test]
    fn relative_urls_join_base() {
        let api = base("https://docs.example.org/api/");
        assert_eq!(
            target("classstd_1_1vector.html#a1").resolved_url(Some(&api)),
            "https://docs.example.org/api/classstd_1_1vector.html#a1"
        );
        assert_eq!(
            target("./page.html").resolved_url(Some(&api)),
            "https://docs.example.org/api/page.html"
        );
    }

    #[test]
    fn rooted_and_parent_paths_resolve_against_base() {
        let api = base("https://docs.example.org/api/");
        assert_eq!(
            target("/w/cpp/vector.html").resolved_url(Some(&api)),
            "https://docs.example.org/w/cpp/vector.html"
        );
        assert_eq!(
            target("../html/vector.html").resolved_url(Some(&api)),
            "https://docs.example.org/html/vector.html"
        );
        assert_eq!(
            target("//cdn.example.org/vector.html").resolved_url(Some(&api)),
            "https://cdn.example.org/vector.html"
        );
    }

    #[test]
    fn no_base_keeps_url() {
        assert_eq!(target("page.html").resolved_url(None), "page.html");
        assert_eq!(target("/w/page.html").resolved_url(None), "/w/page.html");
    }

    #[test]
    fn link_target_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LinkTarget::Blank).unwrap(), "\"blank\"");
        assert_eq!(LinkTarget::Parent.as_str(), "parent");
    }
}
