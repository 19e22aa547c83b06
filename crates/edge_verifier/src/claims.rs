//! Time-bound extraction from a decoded claims payload.
//!
//! The payload must be a single well-formed JSON object. Only the top-level `exp` and
//! `nbf` members are read; they must be integers (epoch seconds) or `null`. Everything
//! else is validated and skipped.

/// `exp` / `nbf` in epoch seconds. `None` means no constraint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    pub exp: Option<i64>,
    pub nbf: Option<i64>,
}

/// Every container costs at least one byte, so the payload bound is also a depth bound.
const MAX_DEPTH: usize = crate::MAX_PAYLOAD_LEN;

/// Open containers, one bit each: 1 for object, 0 for array.
struct Nesting {
    bits: [u64; MAX_DEPTH / 64],
    depth: usize,
}

impl Nesting {
    const fn new() -> Self {
        Self {
            bits: [0; MAX_DEPTH / 64],
            depth: 0,
        }
    }

    fn push(&mut self, object: bool) -> Option<()> {
        if self.depth == MAX_DEPTH {
            return None;
        }
        let word = &mut self.bits[self.depth / 64];
        let mask = 1u64 << (self.depth % 64);
        if object {
            *word |= mask;
        } else {
            *word &= !mask;
        }
        self.depth += 1;
        Some(())
    }

    fn pop(&mut self) {
        self.depth -= 1;
    }

    /// Whether the innermost open container is an object.
    fn in_object(&self) -> bool {
        let top = self.depth - 1;
        (self.bits[top / 64] >> (top % 64)) & 1 == 1
    }
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn skip_ws(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        if self.bump()? == byte {
            Some(())
        } else {
            None
        }
    }

    fn literal(&mut self, word: &[u8]) -> Option<()> {
        let end = self.pos.checked_add(word.len())?;
        if self.input.get(self.pos..end)? == word {
            self.pos = end;
            Some(())
        } else {
            None
        }
    }

    /// Raw bytes between the quotes, escapes validated but not decoded.
    fn string(&mut self) -> Option<&'a [u8]> {
        let input = self.input;
        self.expect(b'"')?;
        let start = self.pos;
        loop {
            match self.bump()? {
                b'"' => return Some(&input[start..self.pos - 1]),
                b'\\' => match self.bump()? {
                    b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => {}
                    b'u' => {
                        for _ in 0..4 {
                            if !self.bump()?.is_ascii_hexdigit() {
                                return None;
                            }
                        }
                    }
                    _ => return None,
                },
                byte if byte < 0x20 => return None,
                _ => {}
            }
        }
    }

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Any JSON number; returns whether it had a fraction or exponent.
    fn number(&mut self) -> Option<bool> {
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let first = self.peek()?;
        let count = self.digits();
        if count == 0 || (first == b'0' && count > 1) {
            return None;
        }

        let mut real = false;
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if self.digits() == 0 {
                return None;
            }
            real = true;
        }
        if let Some(b'e' | b'E') = self.peek() {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if self.digits() == 0 {
                return None;
            }
            real = true;
        }
        Some(real)
    }

    /// Integer or `null` for a time claim.
    fn time_value(&mut self) -> Option<Option<i64>> {
        if self.peek() == Some(b'n') {
            self.literal(b"null")?;
            return Some(None);
        }

        let start = self.pos;
        if self.number()? {
            return None;
        }
        let text = core::str::from_utf8(&self.input[start..self.pos]).ok()?;
        // `-0` reads as a float, not an integer
        if text == "-0" {
            return None;
        }
        text.parse::<i64>().ok().map(Some)
    }

    /// Validate and skip one value of any shape without recursion.
    fn skip_value(&mut self) -> Option<()> {
        let mut nesting = Nesting::new();

        loop {
            self.skip_ws();
            // a scalar or the opening of a container
            match self.peek()? {
                b'{' | b'[' => {
                    let object = self.bump()? == b'{';
                    nesting.push(object)?;
                    self.skip_ws();
                    let close = if object { b'}' } else { b']' };
                    if self.peek() == Some(close) {
                        self.pos += 1;
                        nesting.pop();
                    } else {
                        if object {
                            self.string()?;
                            self.skip_ws();
                            self.expect(b':')?;
                        }
                        continue;
                    }
                }
                b'"' => {
                    self.string()?;
                }
                b't' => self.literal(b"true")?,
                b'f' => self.literal(b"false")?,
                b'n' => self.literal(b"null")?,
                _ => {
                    self.number()?;
                }
            }

            // after a complete value: separators and closers
            loop {
                if nesting.depth == 0 {
                    return Some(());
                }
                self.skip_ws();
                let object = nesting.in_object();
                match self.bump()? {
                    b',' => {
                        if object {
                            self.skip_ws();
                            self.string()?;
                            self.skip_ws();
                            self.expect(b':')?;
                        }
                        break;
                    }
                    b'}' if object => nesting.pop(),
                    b']' if !object => nesting.pop(),
                    _ => return None,
                }
            }
        }
    }
}

fn hex_value(byte: u8) -> Option<u32> {
    match byte {
        b'0'..=b'9' => Some(u32::from(byte - b'0')),
        b'a'..=b'f' => Some(u32::from(byte - b'a') + 10),
        b'A'..=b'F' => Some(u32::from(byte - b'A') + 10),
        _ => None,
    }
}

fn hex4(digits: &[u8]) -> Option<u32> {
    let mut code = 0u32;
    for digit in digits {
        code = (code << 4) | hex_value(*digit)?;
    }
    Some(code)
}

/// Whether a raw member name spells the ASCII `name` once escapes are decoded,
/// e.g. `"\u0065xp"` is `exp`.
fn key_is(raw: &[u8], name: &[u8]) -> bool {
    let mut i = 0;
    let mut matched = 0;
    while i < raw.len() {
        let byte = if raw[i] == b'\\' {
            let Some(&escape) = raw.get(i + 1) else {
                return false;
            };
            if escape == b'u' {
                let Some(code) = raw.get(i + 2..i + 6).and_then(hex4) else {
                    return false;
                };
                i += 6;
                match u8::try_from(code) {
                    Ok(byte) if byte.is_ascii() => byte,
                    _ => return false,
                }
            } else {
                i += 2;
                match escape {
                    b'b' => 0x08,
                    b'f' => 0x0c,
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    other => other,
                }
            }
        } else {
            i += 1;
            raw[i - 1]
        };

        if name.get(matched) != Some(&byte) {
            return false;
        }
        matched += 1;
    }
    matched == name.len()
}

/// Whether every surrogate escape in a raw member name is part of a proper pair.
fn surrogates_paired(raw: &[u8]) -> bool {
    let mut i = 0;
    let mut high = false;
    while i < raw.len() {
        if raw[i] != b'\\' || raw.get(i + 1) != Some(&b'u') {
            if high {
                return false;
            }
            i += if raw[i] == b'\\' { 2 } else { 1 };
            continue;
        }
        let Some(code) = raw.get(i + 2..i + 6).and_then(hex4) else {
            return false;
        };
        i += 6;
        match code {
            0xD800..=0xDBFF if !high => high = true,
            0xDC00..=0xDFFF if high => high = false,
            0xD800..=0xDFFF => return false,
            _ if high => return false,
            _ => {}
        }
    }
    !high
}

/// Read `exp` and `nbf` from a claims object.
///
/// Returns `None` for anything that is not exactly one JSON object, for duplicate
/// time members, for time members that are not integers or `null`, and for member
/// names holding an unpaired surrogate escape.
#[must_use]
pub fn scan(json: &[u8]) -> Option<TimeBounds> {
    core::str::from_utf8(json).ok()?;

    let mut scanner = Scanner {
        input: json,
        pos: 0,
    };
    let mut bounds = TimeBounds::default();
    let mut seen_exp = false;
    let mut seen_nbf = false;

    scanner.skip_ws();
    scanner.expect(b'{')?;
    scanner.skip_ws();

    if scanner.peek() == Some(b'}') {
        scanner.pos += 1;
    } else {
        loop {
            scanner.skip_ws();
            let key = scanner.string()?;
            if !surrogates_paired(key) {
                return None;
            }
            scanner.skip_ws();
            scanner.expect(b':')?;
            scanner.skip_ws();

            if key_is(key, b"exp") {
                if seen_exp {
                    return None;
                }
                seen_exp = true;
                bounds.exp = scanner.time_value()?;
            } else if key_is(key, b"nbf") {
                if seen_nbf {
                    return None;
                }
                seen_nbf = true;
                bounds.nbf = scanner.time_value()?;
            } else {
                scanner.skip_value()?;
            }

            scanner.skip_ws();
            match scanner.bump()? {
                b',' => {}
                b'}' => break,
                _ => return None,
            }
        }
    }

    scanner.skip_ws();
    if scanner.pos == json.len() {
        Some(bounds)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{scan, TimeBounds};

    #[test]
    fn reads_integer_bounds() {
        let bounds = scan(br#"{"sub":"user-42","iat":1,"exp":3600,"nbf":10}"#);
        assert_eq!(
            bounds,
            Some(TimeBounds {
                exp: Some(3600),
                nbf: Some(10)
            })
        );
    }

    #[test]
    fn absent_and_null_mean_no_constraint() {
        assert_eq!(scan(br#"{"sub":"a"}"#), Some(TimeBounds::default()));
        assert_eq!(
            scan(br#"{"sub":"a","exp":null,"nbf":null}"#),
            Some(TimeBounds::default())
        );
        assert_eq!(scan(b" { } "), Some(TimeBounds::default()));
    }

    #[test]
    fn deep_nesting_is_skipped() {
        let mut json = br#"{"deep":"#.to_vec();
        for level in 0..300 {
            json.push(if level % 2 == 0 { b'[' } else { b'{' });
            if level % 2 == 1 {
                json.extend_from_slice(br#""k":"#);
            }
        }
        json.push(b'1');
        for level in (0..300).rev() {
            json.push(if level % 2 == 0 { b']' } else { b'}' });
        }
        json.extend_from_slice(br#","exp":7}"#);
        assert_eq!(
            scan(&json),
            Some(TimeBounds {
                exp: Some(7),
                nbf: None
            })
        );

        // unbalanced closer at depth
        let bad = json.iter().position(|&b| b == b'1').map(|at| {
            let mut bad = json.clone();
            bad[at + 1] = b']';
            bad
        });
        assert_eq!(bad.and_then(|bad| scan(&bad)), None);
    }

    #[test]
    fn skips_nested_values() {
        let json = br#"{"groups":["a",{"b":[1,2.5e3,true,false,null]}],"x":{},"y":[],"exp":-5}"#;
        assert_eq!(
            scan(json),
            Some(TimeBounds {
                exp: Some(-5),
                nbf: None
            })
        );
    }

    #[test]
    fn accepts_escaped_strings() {
        let json = r#"{"name":"a \"quoted\" é \\ value \u00e9"}"#;
        assert!(scan(json.as_bytes()).is_some());
    }

    #[test]
    fn rejects_non_integer_times() {
        assert_eq!(scan(br#"{"exp":1.5}"#), None);
        assert_eq!(scan(br#"{"exp":1e9}"#), None);
        assert_eq!(scan(br#"{"exp":"1700000000"}"#), None);
        assert_eq!(scan(br#"{"exp":99999999999999999999}"#), None);
        assert_eq!(scan(br#"{"nbf":-0}"#), None);
        assert_eq!(scan(br#"{"nbf":0}"#).map(|b| b.nbf), Some(Some(0)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert_eq!(scan(b""), None);
        assert_eq!(scan(b"[]"), None);
        assert_eq!(scan(b"not json"), None);
        assert_eq!(scan(br#"{"exp":1,}"#), None);
        assert_eq!(scan(br#"{"exp":1} x"#), None);
        assert_eq!(scan(br#"{"a":[1,]}"#), None);
        assert_eq!(scan(br#"{"a":01}"#), None);
        assert_eq!(scan(br#"{"a":{"b"}}"#), None);
        assert_eq!(scan(br#"{"a":"unterminated}"#), None);
        assert_eq!(scan(&[b'{', b'"', 0xff, b'"', b':', b'1', b'}']), None);
    }

    #[test]
    fn rejects_duplicate_time_members() {
        assert_eq!(scan(br#"{"exp":1,"exp":2}"#), None);
        assert_eq!(scan(br#"{"nbf":1,"nbf":2}"#), None);
        assert_eq!(scan(br#"{"exp":1,"\u0065xp":2}"#), None);
    }

    #[test]
    fn member_names_need_paired_surrogates() {
        let paired = br#"{"\ud83d\ude00":1,"exp":5}"#;
        assert_eq!(scan(paired).map(|b| b.exp), Some(Some(5)));
        assert_eq!(scan(br#"{"\ud83d":1}"#), None);
        assert_eq!(scan(br#"{"\ude00x":1}"#), None);
        assert_eq!(scan(br#"{"\ud83dx":1}"#), None);
        // values are only checked for escape syntax
        assert_eq!(scan(br#"{"v":"\ud83d","exp":5}"#).map(|b| b.exp), Some(Some(5)));
    }

    #[test]
    fn escaped_member_names_are_decoded() {
        assert_eq!(
            scan(br#"{"\u0065xp":7,"n\u0062f":3}"#),
            Some(TimeBounds {
                exp: Some(7),
                nbf: Some(3)
            })
        );
        assert_eq!(scan(br#"{"ex":7,"expp":8}"#), Some(TimeBounds::default()));
    }
}
