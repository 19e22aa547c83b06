/// Value of cookie `name` in a `Cookie` header, first match wins.
///
/// Surrounding whitespace and a single pair of double quotes are removed.
#[must_use]
pub fn find_cookie<'h>(header: &'h str, name: &str) -> Option<&'h str> {
    for pair in header.split(';') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key.trim() != name {
            continue;
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(value);
        return Some(value);
    }
    None
}
