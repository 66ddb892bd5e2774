//! Rule-driven extraction
//!
//! Every element under `<body>` (body included) is visited in document order
//! and tested against every section rule. Each rule's matches are narrowed by
//! its section-level `index`/`limit` before records are built, and records come
//! out in document order, ties broken by rule order.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::css_extractor::{
    body, first_attr, link_target, parse_selector, select_scoped, slice, text_of,
};
use super::record::{Extracted, FieldValues, Item, Record, Tagged};
use super::transform::apply_transforms;
use crate::error::Result;
use crate::rules::{Field, OptionSet, RuleNode, TRANSFORM};

/// A rule with its selectors parsed once per extraction
struct Prepared<'r> {
    rule: &'r RuleNode,
    selector: Option<Selector>,
    fields: Vec<(Field, Option<Selector>, Option<&'r OptionSet>)>,
    items: Option<Box<Prepared<'r>>>,
}

impl<'r> Prepared<'r> {
    fn new(rule: &'r RuleNode) -> Self {
        let fields = rule
            .field_selectors()
            .map(|(field, selector)| {
                (
                    field,
                    parse_selector(selector, rule.name()),
                    rule.field_options(field),
                )
            })
            .collect();
        Self {
            rule,
            selector: parse_selector(rule.selector(), rule.name()),
            fields,
            items: rule.item_template().map(|t| Box::new(Prepared::new(t))),
        }
    }
}

/// Extracts records from documents with a fixed set of rules
pub struct Extractor<'r> {
    rules: Vec<Prepared<'r>>,
    base_url: Option<Url>,
}

impl<'r> Extractor<'r> {
    pub fn new(rules: &'r [RuleNode]) -> Self {
        Self {
            rules: rules.iter().map(Prepared::new).collect(),
            base_url: None,
        }
    }

    /// Base for `url-join`; without one that transform does nothing.
    pub fn with_base_url(mut self, base_url: Option<Url>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn extract(&self, document: &Html) -> Result<Vec<Record>> {
        let elements: Vec<ElementRef<'_>> = body(document)
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();

        let mut hits: Vec<(usize, usize)> = Vec::new();
        for (rule_idx, prepared) in self.rules.iter().enumerate() {
            let Some(selector) = &prepared.selector else {
                continue;
            };
            let positions: Vec<usize> = elements
                .iter()
                .enumerate()
                .filter(|(_, el)| selector.matches(el))
                .map(|(pos, _)| pos)
                .collect();
            let positions = slice(positions, Some(prepared.rule.section_options()));
            hits.extend(positions.into_iter().map(|pos| (pos, rule_idx)));
        }
        hits.sort_unstable();

        let mut records = Vec::with_capacity(hits.len());
        for (pos, rule_idx) in hits {
            records.push(self.record(elements[pos], &self.rules[rule_idx])?);
        }
        tracing::debug!(
            elements = elements.len(),
            records = records.len(),
            "extraction finished"
        );
        Ok(records)
    }

    /// Every matched element yields a record, even one with no values.
    fn record(&self, el: ElementRef<'_>, prepared: &Prepared<'_>) -> Result<Record> {
        let rule = prepared.rule;
        let fields = self.fields(el, prepared)?;
        let items = match &prepared.items {
            Some(template) => self.items(el, template)?,
            None => None,
        };
        if fields.is_empty() && items.is_none() {
            tracing::trace!(section = rule.name(), "matched element has no values");
        }

        let mut metadata = Vec::new();
        for (key, value) in rule.section_options().passthrough() {
            if Record::is_reserved_key(key) {
                tracing::debug!(section = rule.name(), key, "section option shadows a record key; dropped");
                continue;
            }
            metadata.push((key.to_string(), value.clone()));
        }

        Ok(Record {
            section: rule.name().to_string(),
            metadata,
            fields,
            items,
        })
    }

    fn fields(&self, scope: ElementRef<'_>, prepared: &Prepared<'_>) -> Result<FieldValues> {
        let mut out: FieldValues = Vec::new();
        for (field, selector, options) in &prepared.fields {
            if out.iter().any(|(f, _)| f == field) {
                continue;
            }
            let Some(selector) = selector else {
                continue;
            };
            let candidates = slice(select_scoped(scope, selector), *options);
            let value = match candidates.as_slice() {
                [] => None,
                [one] => self.value(*one, *field, *options).map(Extracted::One),
                many => {
                    let values: Vec<String> = many
                        .iter()
                        .filter_map(|el| self.value(*el, *field, *options))
                        .collect();
                    (!values.is_empty()).then_some(Extracted::Many(values))
                }
            };
            let Some(value) = value else {
                continue;
            };
            let tagged = match options {
                Some(options) => Tagged::with_passthrough(value, options)?,
                None => Tagged::new(value),
            };
            out.push((*field, tagged));
        }
        Ok(out)
    }

    fn items(
        &self,
        scope: ElementRef<'_>,
        template: &Prepared<'_>,
    ) -> Result<Option<Tagged<Vec<Item>>>> {
        let Some(selector) = &template.selector else {
            return Ok(None);
        };
        let options = template.rule.section_options();
        let mut items = Vec::new();
        for child in slice(select_scoped(scope, selector), Some(options)) {
            items.push(Item {
                fields: self.fields(child, template)?,
            });
        }
        if items.is_empty() {
            return Ok(None);
        }
        Ok(Some(Tagged::with_passthrough(items, options)?))
    }

    /// Read one value from an element. Blank values count as absent.
    fn value(&self, el: ElementRef<'_>, field: Field, options: Option<&OptionSet>) -> Option<String> {
        let chain = options.and_then(OptionSet::attr_chain);
        let raw = match (field, chain) {
            (Field::Text, None) => Some(text_of(el)),
            (Field::Link, chain) => {
                let anchor = link_target(el);
                first_attr(anchor, chain.as_deref().unwrap_or(&["href"][..]))
            }
            (_, Some(chain)) => first_attr(el, &chain),
            (Field::Img, None) => first_attr(el, &["src"]),
        }?;
        let transforms = options
            .and_then(|o| o.get_list(TRANSFORM))
            .unwrap_or_default();
        let value = apply_transforms(raw, transforms, self.base_url.as_ref());
        (!value.is_empty()).then_some(value)
    }
}

/// Extract with no base URL.
pub fn extract(document: &Html, rules: &[RuleNode]) -> Result<Vec<Record>> {
    Extractor::new(rules).extract(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::compile;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(dsl: &str, html: &str) -> Vec<Record> {
        let compiled = compile(dsl);
        assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);
        extract(&Html::parse_document(html), compiled.select("/")).unwrap()
    }

    fn json(records: &[Record]) -> serde_json::Value {
        serde_json::to_value(records).unwrap()
    }

    #[test]
    fn test_basic_section() {
        let records = run(
            "section: info .box { text: .title }",
            r#"<div class="box"><h1 class="title">Hello</h1></div>"#,
        );
        assert_eq!(json(&records), json!([{"type": "info", "text": "Hello"}]));
    }

    #[test]
    fn test_multiple_matches_become_list() {
        let records = run(
            "section: tags .tags { text: span }",
            r#"<div class="tags"><span>a</span><span> </span><span>b</span></div>"#,
        );
        assert_eq!(json(&records), json!([{"type": "tags", "text": ["a", "b"]}]));
    }

    #[test]
    fn test_items_and_passthrough() {
        let records = run(
            r#"section: list .list {
                text: h2
                items: li {
                    text: a
                    link: a
                } [limit: 2]
            } [img-ratio: 16/9]"#,
            r#"<div class="list"><h2>Eps</h2><ul>
                <li><a href="/1">E1</a></li>
                <li><a href="/2">E2</a></li>
                <li><a href="/3">E3</a></li>
            </ul></div>"#,
        );
        assert_eq!(
            json(&records),
            json!([{
                "type": "list",
                "img-ratio": "16/9",
                "text": "Eps",
                "items": [
                    {"text": "E1", "link": "/1"},
                    {"text": "E2", "link": "/2"}
                ]
            }])
        );
    }

    #[test]
    fn test_no_match_produces_no_record() {
        let records = run(
            "section: info .box { text: p }",
            r#"<div class="other"><p>x</p></div>"#,
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_matched_element_without_values_keeps_type_and_metadata() {
        let records = run(
            "section: info .box { text: .missing }",
            r#"<div class="box"><p>x</p></div>"#,
        );
        assert_eq!(json(&records), json!([{"type": "info"}]));

        let records = run(
            "section: banner .banner { text: .missing } [img-ratio: 16/9]",
            r#"<div class="banner"><p>x</p></div>"#,
        );
        assert_eq!(json(&records), json!([{"type": "banner", "img-ratio": "16/9"}]));
    }

    #[test]
    fn test_empty_items_are_kept_after_slicing() {
        let records = run(
            "section: eps .eps {\n items: .ep {\n text: .name\n } [limit: 1]\n}",
            r#"<div class="eps">
                <div class="ep"><span class="other">A</span></div>
                <div class="ep"><span class="name">B</span></div>
                <div class="ep"><span class="name">C</span></div>
            </div>"#,
        );
        assert_eq!(json(&records), json!([{"type": "eps", "items": [{}]}]));
        let items = records[0].items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text(Field::Text), None);
    }

    #[test]
    fn test_section_index_and_limit() {
        let html = r#"<p class="a">1</p><p class="a">2</p><p class="a">3</p>"#;
        let texts = |records: Vec<Record>| -> Vec<String> {
            records
                .iter()
                .filter_map(|r| r.text(Field::Text).map(String::from))
                .collect()
        };
        assert_eq!(texts(run("section: p .a { text: .a } [limit: 2]", html)), vec!["1", "2"]);
        assert_eq!(texts(run("section: p .a { text: .a } [index: 2]", html)), vec!["3"]);
        assert_eq!(texts(run("section: p .a { text: .a } [index: 7]", html)), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_document_order_across_rules() {
        let records = run(
            "section: b .b { text: .b }\nsection: a .a { text: .a }",
            r#"<p class="a">1</p><p class="b">2</p><p class="a b">3</p>"#,
        );
        let order: Vec<&str> = records.iter().map(|r| r.section.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "b", "a"]);
    }

    #[test]
    fn test_attr_chain_and_defaults() {
        let records = run(
            r#"section: card .card {
                img: img [attr: data-src|src]
                link: .more
                text: .t [attr: title]
            }"#,
            r#"<div class="card">
                <img src="/small.jpg" data-src="/big.jpg">
                <div class="more"><a href="/detail">More</a></div>
                <span class="t" title="Named">ignored text</span>
            </div>"#,
        );
        assert_eq!(records[0].text(Field::Img), Some("/big.jpg"));
        assert_eq!(records[0].text(Field::Link), Some("/detail"));
        assert_eq!(records[0].text(Field::Text), Some("Named"));
    }

    #[test]
    fn test_url_join_with_base() {
        let compiled = compile("section: pic .pic { img: img [transform: url-join] }");
        let base = Url::parse("https://example.com/vod/1.html").ok();
        let records = Extractor::new(compiled.select("/"))
            .with_base_url(base)
            .extract(&Html::parse_document(r#"<div class="pic"><img src="a.jpg"></div>"#))
            .unwrap();
        assert_eq!(records[0].text(Field::Img), Some("https://example.com/vod/a.jpg"));
    }

    #[test]
    fn test_bad_selector_is_isolated() {
        let records = run(
            "section: bad div[ { text: p }\nsection: good .g {\n text: p\n img: img:nth(\n}",
            r#"<div class="g"><p>ok</p></div>"#,
        );
        assert_eq!(json(&records), json!([{"type": "good", "text": "ok"}]));
    }
}
