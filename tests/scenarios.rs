use pretty_assertions::assert_eq;
use proptest::prelude::*;
use scraper::Html;
use serde_json::json;
use tvlike::{compile, extract, scrape, Config, Field, Record};

fn run(dsl: &str, path: &str, html: &str) -> Vec<Record> {
    let compiled = compile(dsl);
    extract(&Html::parse_document(html), compiled.select(path)).unwrap()
}

#[test]
fn test_trimmed_title() {
    let records = run(
        "section: info .box { text: .title [transform: trim] }",
        "/",
        r#"<div class="box"><h1 class="title">  Hello  </h1></div>"#,
    );
    assert_eq!(
        serde_json::to_value(&records).unwrap(),
        json!([{"type": "info", "text": "Hello"}])
    );
}

#[test]
fn test_items_in_document_order() {
    let dsl = r#"
        section: list .list {
            items: .ep-item { text: .name }
        }
    "#;
    let html = r#"
        <div class="list">
            <div class="ep-item"><span class="name">Ep1</span></div>
            <div class="ep-item"><span class="name">Ep2</span></div>
        </div>
    "#;
    let records = run(dsl, "/", html);
    assert_eq!(
        serde_json::to_value(&records).unwrap(),
        json!([{"type": "list", "items": [{"text": "Ep1"}, {"text": "Ep2"}]}])
    );
}

#[test]
fn test_item_limit_keeps_first() {
    let dsl = "section: list .list {\n items: .ep { text: a } [limit: 1]\n}";
    let html = r#"<ul class="list">
        <li class="ep"><a>1</a></li><li class="ep"><a>2</a></li><li class="ep"><a>3</a></li>
        <li class="ep"><a>4</a></li><li class="ep"><a>5</a></li>
    </ul>"#;
    let records = run(dsl, "/", html);
    let items = records[0].items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text(Field::Text), Some("1"));
}

#[test]
fn test_path_declaration_order() {
    let html = r#"<div class="any">any</div><div class="vod">vod</div>"#;
    let sections = |dsl: &str| -> Vec<String> {
        run(dsl, "/vod/123", html)
            .into_iter()
            .map(|r| r.section)
            .collect()
    };

    let any_first = r#"
        path: /** { section: any .any { text: .any } }
        path: /vod/** { section: vod .vod { text: .vod } }
    "#;
    assert_eq!(sections(any_first), vec!["any"]);

    let vod_first = r#"
        path: /vod/** { section: vod .vod { text: .vod } }
        path: /** { section: any .any { text: .any } }
    "#;
    assert_eq!(sections(vod_first), vec!["vod"]);
}

#[test]
fn test_bad_selector_does_not_affect_other_rules() {
    let dsl = "section: broken .a:unknown-pseudo { text: p }\nsection: fine .b { text: p }";
    let records = run(dsl, "/", r#"<div class="a b"><p>kept</p></div>"#);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].section, "fine");
}

#[test]
fn test_full_page() {
    let dsl = r#"
        /* detail pages */
        page-type: vod-detail
        path: /vod/** {
            section: detail .detail {
                text: h1 [transform: trim]
                img: .poster img [attr: data-src|src, transform: url-join]
                link: .play [transform: url-join]
                items: .eps li {
                    text: a
                    link: a [transform: url-join]
                } [limit: 2]
            } [img-ratio: 2/3]
        }
    "#;
    let html = r#"
        <html><body>
            <div class="detail">
                <h1> The Movie </h1>
                <div class="poster"><img src="/s.jpg" data-src="/big.jpg"></div>
                <div class="play"><a href="play/1">Play</a></div>
                <ul class="eps">
                    <li><a href="/ep/1">Ep1</a></li>
                    <li><a href="/ep/2">Ep2</a></li>
                    <li><a href="/ep/3">Ep3</a></li>
                </ul>
            </div>
        </body></html>
    "#;
    let result = scrape(html, "https://tv.example.com/vod/9/", dsl, &Config::default()).unwrap();
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({
            "page-type": "vod-detail",
            "path": "/vod/9/",
            "records": [{
                "type": "detail",
                "img-ratio": "2/3",
                "text": "The Movie",
                "img": "https://tv.example.com/big.jpg",
                "link": "https://tv.example.com/vod/9/play/1",
                "items": [
                    {"text": "Ep1", "link": "https://tv.example.com/ep/1"},
                    {"text": "Ep2", "link": "https://tv.example.com/ep/2"}
                ]
            }],
            "diagnostics": []
        })
    );
}

proptest! {
    #[test]
    fn empty_matches_keep_only_the_type(classes in proptest::collection::vec("[a-c]", 0..12)) {
        let dsl = "section: info .box {\n text: .title\n img: img\n}";
        let html: String = classes
            .iter()
            .map(|c| format!(r#"<div class="box {c}"><span class="{c}"></span></div>"#))
            .collect();
        let records = run(dsl, "/", &html);
        prop_assert_eq!(records.len(), classes.len());
        for record in &records {
            prop_assert_eq!(record.section.as_str(), "info");
            prop_assert!(record.fields.is_empty());
            prop_assert!(record.items.is_none());
        }

        // no `.box` at all, so no record
        let unmatched = run(dsl, "/", &html.replace("box", "card"));
        prop_assert!(unmatched.is_empty());
    }

    #[test]
    fn limit_keeps_a_prefix(count in 0usize..8, limit in 1i64..10) {
        let html: String = (0..count)
            .map(|i| format!("<li class=\"ep\">{i}</li>"))
            .collect();
        let html = format!("<ul class=\"list\">{html}</ul>");
        let dsl = format!("section: list .list {{\n items: .ep {{ text: .ep }} [limit: {limit}]\n}}");
        let records = run(&dsl, "/", &html);

        let texts: Vec<String> = records
            .iter()
            .flat_map(|r| r.items())
            .filter_map(|item| item.text(Field::Text).map(String::from))
            .collect();
        let expected: Vec<String> = (0..count.min(limit as usize)).map(|i| i.to_string()).collect();
        prop_assert_eq!(texts, expected);
    }

    #[test]
    fn compiling_twice_extracts_the_same(texts in proptest::collection::vec("[a-z]{1,6}", 0..6)) {
        let dsl = "section: s .s { text: .t [transform: upper] }";
        let html: String = texts
            .iter()
            .map(|t| format!(r#"<div class="s"><b class="t">{t}</b></div>"#))
            .collect();
        prop_assert_eq!(run(dsl, "/", &html), run(dsl, "/", &html));
    }
}
