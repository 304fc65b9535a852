/// Sanitizes free text supplied by authors (descriptions, remarks, question
/// statements) with ammonia's whitelist.
///
/// Safe inline markup such as `<b>` survives; `<script>` (with its content),
/// `<iframe>` and event-handler attributes are removed. Text that ammonia
/// would only entity-escape (`x < 5 & y > 2`) is stored as typed.
pub fn clean_html(input: &str) -> String {
    let cleaned = ammonia::clean(input);
    if unescape(&cleaned) == input {
        input.to_string()
    } else {
        cleaned
    }
}

/// Reverses the escaping the HTML serializer applies to text nodes.
fn unescape(html: &str) -> String {
    const ENTITIES: [(&str, char); 5] = [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&nbsp;", '\u{a0}'),
    ];

    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
