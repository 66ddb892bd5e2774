//! Path scopes and rule selection by request path

use globset::{GlobBuilder, GlobMatcher};

use super::node::RuleNode;

/// Scope used when the rules declare no `path:` block
pub const CATCH_ALL: &str = "/**";

/// Rules that apply to request paths matching one glob pattern.
///
/// `*` stays within a path segment and `**` spans segments. A trailing `/**`
/// also matches the bare prefix, so `/vod/**` covers `/vod`.
#[derive(Debug, Clone)]
pub struct PathScope {
    pattern: String,
    matcher: Matcher,
    rules: Vec<RuleNode>,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// `/**`, every path
    Any,
    Glob(GlobMatcher),
}

impl PathScope {
    pub fn new(pattern: impl Into<String>, rules: Vec<RuleNode>) -> Result<Self, globset::Error> {
        let pattern = pattern.into();
        if pattern == CATCH_ALL {
            return Ok(Self::catch_all(rules));
        }
        let matcher = GlobBuilder::new(&pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        Ok(Self {
            pattern,
            matcher: Matcher::Glob(matcher),
            rules,
        })
    }

    pub fn catch_all(rules: Vec<RuleNode>) -> Self {
        Self {
            pattern: CATCH_ALL.to_string(),
            matcher: Matcher::Any,
            rules,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn rules(&self) -> &[RuleNode] {
        &self.rules
    }

    pub fn matches(&self, path: &str) -> bool {
        let Matcher::Glob(glob) = &self.matcher else {
            return true;
        };
        glob.is_match(path)
            || self
                .pattern
                .strip_suffix("/**")
                .is_some_and(|prefix| prefix == path || (prefix.is_empty() && path == "/"))
    }
}

impl PartialEq for PathScope {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.rules == other.rules
    }
}

impl Eq for PathScope {}

/// Rules of the first scope, in declaration order, whose pattern matches.
/// No match is not an error; it yields an empty slice.
pub fn select_rules<'a>(scopes: &'a [PathScope], path: &str) -> &'a [RuleNode] {
    match scopes.iter().find(|scope| scope.matches(path)) {
        Some(scope) => {
            tracing::debug!(pattern = scope.pattern(), path, "path scope selected");
            scope.rules()
        }
        None => {
            tracing::debug!(path, "no path scope matches");
            &[]
        }
    }
}

/// Request path of a page URL. Inputs that are not absolute URLs are treated
/// as paths, with any query or fragment removed.
pub fn request_path(url_or_path: &str) -> String {
    if let Ok(url) = url::Url::parse(url_or_path) {
        return url.path().to_string();
    }
    let path = url_or_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(pattern: &str, name: &str) -> PathScope {
        PathScope::new(pattern, vec![RuleNode::builder(name, ".x").build()]).unwrap()
    }

    fn selected<'a>(scopes: &'a [PathScope], path: &str) -> Vec<&'a str> {
        select_rules(scopes, path).iter().map(RuleNode::name).collect()
    }

    #[test]
    fn test_glob_semantics() {
        let s = scope("/vod/*", "vod");
        assert!(s.matches("/vod/123"));
        assert!(!s.matches("/vod/123/play"));

        let s = scope("/vod/**", "vod");
        assert!(s.matches("/vod/123"));
        assert!(s.matches("/vod/123/play"));
        assert!(s.matches("/vod"));
        assert!(!s.matches("/vodtype/1"));

        let s = scope("/vodtype/*.html", "type");
        assert!(s.matches("/vodtype/index.html"));
        assert!(!s.matches("/vodtype/a/index.html"));
    }

    #[test]
    fn test_catch_all_matches_everything() {
        let s = PathScope::catch_all(vec![]);
        assert!(s.matches("/"));
        assert!(s.matches("/a"));
        assert!(s.matches("/a/b/c.html"));
    }

    #[test]
    fn test_catch_all_pattern_needs_no_glob() {
        let built = PathScope::new(CATCH_ALL, vec![RuleNode::builder("a", ".a").build()]).unwrap();
        let direct = PathScope::catch_all(vec![RuleNode::builder("a", ".a").build()]);
        assert_eq!(built, direct);
        assert_eq!(direct.pattern(), "/**");
        assert!(built.matches(""));
        assert!(direct.matches("/vod/1/play/2.html"));
    }

    #[test]
    fn test_declaration_order_wins_over_specificity() {
        let scopes = vec![scope("/**", "any"), scope("/vod/**", "vod")];
        assert_eq!(selected(&scopes, "/vod/123"), vec!["any"]);

        let scopes = vec![scope("/vod/**", "vod"), scope("/**", "any")];
        assert_eq!(selected(&scopes, "/vod/123"), vec!["vod"]);
        assert_eq!(selected(&scopes, "/search"), vec!["any"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let scopes = vec![scope("/vod/**", "vod")];
        assert!(select_rules(&scopes, "/search").is_empty());
        assert!(select_rules(&[], "/").is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PathScope::new("/vod/[", vec![]).is_err());
    }

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("https://www.example.com/vod/1.html?x=1#top"), "/vod/1.html");
        assert_eq!(request_path("https://www.example.com"), "/");
        assert_eq!(request_path("/vod/2?page=3"), "/vod/2");
        assert_eq!(request_path("vod/2"), "/vod/2");
        assert_eq!(request_path(""), "/");
    }
}
