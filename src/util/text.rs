use std::borrow::Cow;

/// Removes HTML markup from feed text.
///
/// Anything shaped like a tag (`<p>`, `</a>`, `<br/>`, `<!DOCTYPE ..>`,
/// `<?xml ..?>`) is dropped, as are `<!-- .. -->` comments. A `<` that does
/// not open a tag (`a < b`) is kept, and so is an unterminated tag at the end
/// of the input. Entities are left untouched.
///
/// Returns `Cow::Borrowed` when the input contains no `<` at all.
///
/// # Examples
///
/// ```
/// use feedmill::util::strip_html_tags;
///
/// assert_eq!(strip_html_tags("<p>Hello <b>world</b></p>"), "Hello world");
/// assert_eq!(strip_html_tags("1 < 2"), "1 < 2");
/// ```
pub fn strip_html_tags(s: &str) -> Cow<'_, str> {
    if !s.contains('<') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let opens_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        if !opens_tag {
            out.push('<');
            rest = after;
            continue;
        }

        if let Some(comment) = after.strip_prefix("!--") {
            rest = match comment.find("-->") {
                Some(end) => &comment[end + 3..],
                None => "",
            };
            continue;
        }

        match find_tag_end(after) {
            Some(end) => rest = &after[end + 1..],
            None => {
                out.push('<');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    Cow::Owned(out)
}

/// Byte offset of the `>` closing a tag body, skipping quoted attribute values.
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, c) in tag.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(idx),
            (None, _) => {}
        }
    }
    None
}

/// Turns an HTML fragment from a feed into plain text.
///
/// Strips tags, then turns non-breaking spaces (the `&nbsp;` entity or an
/// already decoded U+00A0) into plain spaces. Other entities are kept as they
/// appear in the source.
///
/// ```
/// use feedmill::util::clean_text;
///
/// assert_eq!(clean_text("<p>this&nbsp;&nbsp;string</p>"), "this  string");
/// assert_eq!(clean_text("Fish &amp; Chips\u{a0}today"), "Fish &amp; Chips today");
/// ```
pub fn clean_text(s: &str) -> String {
    strip_html_tags(s).replace("&nbsp;", " ").replace('\u{a0}', " ")
}

/// Strip terminal control characters and ANSI escape sequences.
///
/// Feed titles and summaries are printed straight to the terminal by the CLI,
/// so anything that could drive the terminal is removed first. Tab, newline
/// and carriage return survive. CSI sequences (`ESC [` .. final byte) and OSC
/// sequences (`ESC ]` .. BEL or `ESC \`) are dropped as a whole.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_control = |c: char| c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'));

    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_control(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}
