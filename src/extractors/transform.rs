//! Value transforms
//!
//! Applied left to right after the raw value has been read. Unknown names are
//! skipped so that newer rule files still run on older builds.

use std::str::FromStr;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Trim,
    Upper,
    Lower,
    /// Resolve a relative reference against the base URL
    UrlJoin,
}

impl FromStr for Transform {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trim" => Ok(Transform::Trim),
            "upper" | "uppercase" => Ok(Transform::Upper),
            "lower" | "lowercase" => Ok(Transform::Lower),
            "url-join" | "urljoin" => Ok(Transform::UrlJoin),
            other => Err(format!("unknown transform '{}'", other)),
        }
    }
}

impl Transform {
    pub fn apply(self, value: String, base: Option<&Url>) -> String {
        match self {
            Transform::Trim => value.trim().to_string(),
            Transform::Upper => value.to_uppercase(),
            Transform::Lower => value.to_lowercase(),
            Transform::UrlJoin => url_join(value, base),
        }
    }
}

fn url_join(value: String, base: Option<&Url>) -> String {
    let Some(base) = base else {
        return value;
    };
    if value.is_empty() || Url::parse(&value).is_ok() {
        return value;
    }
    match base.join(&value) {
        Ok(joined) => joined.to_string(),
        Err(e) => {
            tracing::debug!(value = %value, error = %e, "url-join failed; value kept");
            value
        }
    }
}

/// Apply named transforms in order.
pub fn apply_transforms(value: String, names: &[String], base: Option<&Url>) -> String {
    names.iter().fold(value, |value, name| match name.parse::<Transform>() {
        Ok(transform) => transform.apply(value, base),
        Err(reason) => {
            tracing::debug!(transform = %name, %reason, "transform ignored");
            value
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_case_transforms() {
        assert_eq!(apply_transforms("Hello".into(), &names(&["upper"]), None), "HELLO");
        assert_eq!(apply_transforms("Hello".into(), &names(&["lowercase"]), None), "hello");
        assert_eq!(apply_transforms("  x ".into(), &names(&["trim", "upper"]), None), "X");
    }

    #[test]
    fn test_unknown_transform_is_ignored() {
        assert_eq!(
            apply_transforms("abc".into(), &names(&["parse_price", "upper"]), None),
            "ABC"
        );
    }

    #[test]
    fn test_url_join() {
        let base = Url::parse("https://www.example.com/vod/1.html").unwrap();
        let join = |v: &str| apply_transforms(v.into(), &names(&["url-join"]), Some(&base));

        assert_eq!(join("/img/a.jpg"), "https://www.example.com/img/a.jpg");
        assert_eq!(join("2.html"), "https://www.example.com/vod/2.html");
        assert_eq!(join("//cdn.example.com/a.jpg"), "https://cdn.example.com/a.jpg");
        assert_eq!(join("https://other.org/x"), "https://other.org/x");
    }

    #[test]
    fn test_url_join_without_base_is_noop() {
        assert_eq!(
            apply_transforms("/img/a.jpg".into(), &names(&["url-join"]), None),
            "/img/a.jpg"
        );
    }

    proptest! {
        #[test]
        fn url_join_is_idempotent(path in "[a-z0-9/._-]{0,24}") {
            let base = Url::parse("https://example.com/a/b").unwrap();
            let list = names(&["url-join"]);
            let once = apply_transforms(path, &list, Some(&base));
            let twice = apply_transforms(once.clone(), &list, Some(&base));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn trim_is_idempotent(value in "\\PC{0,32}") {
            let list = names(&["trim"]);
            let once = apply_transforms(value, &list, None);
            prop_assert_eq!(apply_transforms(once.clone(), &list, None), once);
        }
    }
}
