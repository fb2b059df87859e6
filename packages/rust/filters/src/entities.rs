//! HTML character reference helpers.
//!
//! Some sources escape their markup twice (`&amp;#39;`), or the document was
//! parsed with entity decoding off; these helpers turn such text back into
//! plain Unicode.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::Html;

/// Decode numeric character references (`&#39;`, `&#x27;`).
///
/// References that do not name a valid code point are left untouched.
pub fn decode_char_refs(s: &str) -> String {
    static CHAR_REF_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"&#(?:([0-9]{1,7})|[xX]([0-9a-fA-F]{1,6}));").expect("valid regex"));

    CHAR_REF_RE
        .replace_all(s, |caps: &Captures<'_>| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(dec), _) => dec.as_str().parse::<u32>().ok(),
                (None, Some(hex)) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (None, None) => None,
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Undo (possibly double) HTML escaping in text.
///
/// `&amp;` is collapsed first so `&amp;#39;` becomes `'`. `&nbsp;` turns into
/// a plain space. Every other reference, named or numeric, is decoded with the
/// HTML parser's own entity table.
pub fn unescape_html(s: &str) -> String {
    let collapsed = s.replace("&amp;", "&").replace("&nbsp;", " ");
    decode_references(&collapsed)
}

/// Decode all character references in a run of text.
///
/// Literal `<` is escaped before parsing so the text can never open a tag.
fn decode_references(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let fragment = Html::parse_fragment(&s.replace('<', "&lt;"));
    fragment.root_element().text().collect()
}
