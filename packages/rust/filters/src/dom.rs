//! Small DOM utilities on top of `scraper`.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use folio_shared::{FolioError, ParserConfig, Result};

/// Elements serialized as self-closing tags in XHTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parse raw source markup into a chapter document.
///
/// With `decode_entities` off, character references are escaped before
/// parsing so they survive into the text verbatim; the `unescape` filter
/// decodes them later.
pub fn parse_source(html: &str, parser: ParserConfig) -> Html {
    static CHAR_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").expect("valid regex")
    });

    if parser.decode_entities {
        Html::parse_document(html)
    } else {
        Html::parse_document(&CHAR_REF_RE.replace_all(html, "&amp;$1;"))
    }
}

/// Parse a CSS selector, reporting failures as config errors.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| FolioError::config(format!("invalid selector {css:?}: {e}")))
}

/// Remove every element matching `selector`. Returns how many were removed.
pub fn purge(dom: &mut Html, selector: &Selector) -> usize {
    let ids: Vec<_> = dom.select(selector).map(|el| el.id()).collect();
    for id in &ids {
        if let Some(mut node) = dom.tree.get_mut(*id) {
            node.detach();
        }
    }
    ids.len()
}

/// Remove every comment node.
pub fn purge_comments(dom: &mut Html) -> usize {
    let ids: Vec<_> = dom
        .tree
        .nodes()
        .filter(|n| n.value().is_comment())
        .map(|n| n.id())
        .collect();
    for id in &ids {
        if let Some(mut node) = dom.tree.get_mut(*id) {
            node.detach();
        }
    }
    ids.len()
}

/// Rewrite every text node through `f`.
pub fn map_text(dom: &mut Html, f: impl Fn(&str) -> String) {
    let ids: Vec<_> = dom
        .tree
        .nodes()
        .filter(|n| n.value().is_text())
        .map(|n| n.id())
        .collect();
    for id in ids {
        let Some(mut node) = dom.tree.get_mut(id) else {
            continue;
        };
        if let Node::Text(text) = node.value() {
            let rewritten = f(text);
            if rewritten != **text {
                text.text = rewritten.into();
            }
        }
    }
}

/// The `<body>` element, or the root element for documents without one.
pub fn body(dom: &Html) -> ElementRef<'_> {
    static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid selector"));
    dom.select(&BODY).next().unwrap_or_else(|| dom.root_element())
}

/// Inner HTML of the document body.
pub fn body_html(dom: &Html) -> String {
    body(dom).inner_html()
}

/// Serialize the children of `el` as well-formed XHTML.
pub fn inner_xhtml(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    write_children(el, &mut out);
    out
}

fn write_children(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_xml(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(el: ElementRef<'_>, out: &mut String) {
    let name = el.value().name();
    out.push('<');
    out.push_str(name);
    for (attr, value) in el.value().attrs() {
        if attr == "xmlns" || attr.contains(':') {
            continue;
        }
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        out.push_str(&escape_xml(value));
        out.push('"');
    }

    if VOID_ELEMENTS.contains(&name) {
        out.push_str("/>");
        return;
    }

    out.push('>');
    write_children(el, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Escape text for XML content and attribute values.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_removes_all_matches() {
        let mut dom = Html::parse_document(
            "<body><p>keep</p><script>x()</script><div><script>y()</script></div></body>",
        );
        let removed = purge(&mut dom, &selector("script").unwrap());
        assert_eq!(removed, 2);
        assert_eq!(body_html(&dom), "<p>keep</p><div></div>");
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        assert!(selector("p[").unwrap_err().is_config());
    }

    #[test]
    fn source_refs_survive_when_decoding_is_off() {
        let raw = "<p>it&#39;s &amp; more</p>";

        let decoded = parse_source(raw, ParserConfig { decode_entities: true });
        assert_eq!(body(&decoded).text().collect::<String>(), "it's & more");

        let verbatim = parse_source(raw, ParserConfig { decode_entities: false });
        assert_eq!(body(&verbatim).text().collect::<String>(), "it&#39;s &amp; more");
    }

    #[test]
    fn map_text_rewrites_text_only() {
        let mut dom = Html::parse_document(r#"<p title="a">a <b>a</b></p>"#);
        map_text(&mut dom, |t| t.replace('a', "z"));
        assert_eq!(body_html(&dom), r#"<p title="a">z <b>z</b></p>"#);
    }

    #[test]
    fn xhtml_closes_void_elements_and_escapes() {
        let dom = Html::parse_document(r#"<p>1 < 2<br><img alt='"q"'></p>"#);
        assert_eq!(
            inner_xhtml(body(&dom)),
            r#"<p>1 &lt; 2<br/><img alt="&quot;q&quot;"/></p>"#
        );
    }

    #[test]
    fn comments_are_purged() {
        let mut dom = Html::parse_document("<p>a<!-- note -->b</p>");
        assert_eq!(purge_comments(&mut dom), 1);
        assert_eq!(body_html(&dom), "<p>ab</p>");
    }
}
