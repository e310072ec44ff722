use regex::Regex;

/// Turns rendered MediaWiki HTML into readable plain text.
pub fn clean_html(raw_html: &str) -> String {
    lazy_static! {
        static ref RE_COMMENT: Regex =
            Regex::new(r"(?s)<!--.*?-->").expect("RE_COMMENT does not parse");
        static ref RE_TAG: Regex = Regex::new(r"<.*?>").expect("RE_TAG does not parse");
        static ref RE_MULTI_NEWLINE: Regex =
            Regex::new(r"\n\n+").expect("RE_MULTI_NEWLINE does not parse");
    }
    let text = RE_COMMENT.replace_all(raw_html, "");
    let text = RE_TAG.replace_all(&text, "");

    // Lines that only held markup are whitespace now
    let text = text
        .split('\n')
        .map(|line| line.trim())
        .collect::<Vec<&str>>()
        .join("\n");
    let text = RE_MULTI_NEWLINE.replace_all(&text, "\n\n");

    let text = text.replace("[edit]", "").replace("(edit)", "");
    html_escape::decode_html_entities(&text).into_owned()
}
