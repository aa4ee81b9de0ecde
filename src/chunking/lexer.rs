//! C# lexical state machine.
//!
//! Tracks just enough of the token grammar to know, for every byte, whether
//! it is live code or sits inside a string, char literal, comment or
//! preprocessor line. The result is a *code mask*: the source with every
//! non-code byte replaced by a space (newlines kept), byte-aligned with the
//! original so offsets and line numbers carry over unchanged.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrKind {
    Regular,
    Verbatim,
    Interpolated,
    InterpolatedVerbatim,
    /// `"""…"""`, closed by the same number of quotes. `dollars` is the
    /// count of `$` prefixes; zero means no interpolation.
    Raw { quotes: usize, dollars: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    Str(StrKind),
    Char,
    /// Interpolation hole `{…}` inside a string; `depth` counts nested braces.
    Hole { depth: usize },
}

/// Code mask of one text.
#[derive(Debug, Clone)]
pub struct LexicalMap {
    /// Source with non-code bytes blanked.
    pub masked: String,
    /// Per byte: true when the byte is live code.
    pub in_code: Vec<bool>,
    /// Byte offset of the start of each line.
    pub line_starts: Vec<usize>,
}

impl LexicalMap {
    pub fn len(&self) -> usize {
        self.in_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_code.is_empty()
    }

    pub fn is_code(&self, offset: usize) -> bool {
        self.in_code.get(offset).copied().unwrap_or(false)
    }

    /// 1-based line of a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&s| s <= offset).max(1)
    }

    /// Offset of the `}` closing the `{` at `open`, counted over code bytes.
    pub fn matching_brace(&self, open: usize) -> Option<usize> {
        let bytes = self.masked.as_bytes();
        if bytes.get(open) != Some(&b'{') {
            return None;
        }
        let mut depth = 0usize;
        for (i, &b) in bytes.iter().enumerate().skip(open) {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Code braces still open just before byte `end`.
    pub fn brace_depth(&self, end: usize) -> usize {
        let end = end.min(self.masked.len());
        self.masked.as_bytes()[..end]
            .iter()
            .fold(0usize, |depth, &b| match b {
                b'{' => depth + 1,
                b'}' => depth.saturating_sub(1),
                _ => depth,
            })
    }
}

/// Run the state machine over `source`.
pub fn scan(source: &str) -> LexicalMap {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut masked = bytes.to_vec();
    let mut in_code = vec![false; len];
    let mut line_starts = vec![0];
    let mut stack = vec![Mode::Code];
    let mut line_has_code = false;
    let mut i = 0;

    while i < len {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        if b == b'\n' {
            line_starts.push(i + 1);
        }
        let mode = *stack.last().unwrap_or(&Mode::Code);
        match mode {
            Mode::Code | Mode::Hole { .. } => {
                let in_hole = matches!(mode, Mode::Hole { .. });
                if b == b'/' && next == Some(b'/') {
                    stack.push(Mode::LineComment);
                    i += blank(&mut masked, i, 2);
                    continue;
                }
                if b == b'/' && next == Some(b'*') {
                    stack.push(Mode::BlockComment);
                    i += blank(&mut masked, i, 2);
                    continue;
                }
                if b == b'#' && !line_has_code && !in_hole {
                    stack.push(Mode::LineComment);
                    i += blank(&mut masked, i, 1);
                    continue;
                }
                if let Some((kind, prefix)) = string_start(bytes, i) {
                    stack.push(Mode::Str(kind));
                    i += blank(&mut masked, i, prefix);
                    line_has_code = true;
                    continue;
                }
                if b == b'\'' {
                    stack.push(Mode::Char);
                    i += blank(&mut masked, i, 1);
                    line_has_code = true;
                    continue;
                }
                if let Mode::Hole { depth } = mode {
                    let top = stack.len() - 1;
                    match b {
                        b'{' => stack[top] = Mode::Hole { depth: depth + 1 },
                        b'}' if depth == 0 => {
                            stack.pop();
                        }
                        b'}' => stack[top] = Mode::Hole { depth: depth - 1 },
                        _ => {}
                    }
                    if b != b'\n' {
                        masked[i] = b' ';
                    }
                    i += 1;
                    continue;
                }
                in_code[i] = true;
                if b == b'\n' {
                    line_has_code = false;
                } else if !b.is_ascii_whitespace() {
                    line_has_code = true;
                }
                i += 1;
            }
            Mode::LineComment => {
                if b == b'\n' {
                    stack.pop();
                    in_code[i] = stack.len() == 1;
                    line_has_code = false;
                } else {
                    masked[i] = b' ';
                }
                i += 1;
            }
            Mode::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    stack.pop();
                    i += blank(&mut masked, i, 2);
                    continue;
                }
                if b == b'\n' {
                    line_has_code = false;
                } else {
                    masked[i] = b' ';
                }
                i += 1;
            }
            Mode::Char => {
                if b == b'\\' && next.is_some_and(|n| n != b'\n') {
                    i += blank(&mut masked, i, 2);
                    continue;
                }
                if b == b'\n' {
                    // Unterminated literal; recover at the line end.
                    stack.pop();
                    in_code[i] = stack.len() == 1;
                    line_has_code = false;
                    i += 1;
                    continue;
                }
                if b == b'\'' {
                    stack.pop();
                }
                masked[i] = b' ';
                i += 1;
            }
            Mode::Str(kind) => {
                i += string_step(bytes, i, kind, &mut stack, &mut masked, &mut in_code);
                if b == b'\n' {
                    line_has_code = false;
                }
            }
        }
    }

    if line_starts.last() == Some(&len) && len > 0 {
        line_starts.pop();
    }
    let masked = String::from_utf8(masked)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    LexicalMap {
        masked,
        in_code,
        line_starts,
    }
}

/// Blank `count` bytes at `at` (never a newline). Returns `count`.
fn blank(masked: &mut [u8], at: usize, count: usize) -> usize {
    for b in masked.iter_mut().skip(at).take(count) {
        if *b != b'\n' {
            *b = b' ';
        }
    }
    count
}

/// Detect a string literal opening at `i`: returns its kind and the length
/// of the opening delimiter including prefixes.
fn string_start(bytes: &[u8], i: usize) -> Option<(StrKind, usize)> {
    let mut j = i;
    let mut dollars = 0;
    let mut verbatim = false;
    while j < bytes.len() && (bytes[j] == b'$' || bytes[j] == b'@') {
        if bytes[j] == b'$' {
            dollars += 1;
        } else {
            if verbatim {
                return None;
            }
            verbatim = true;
        }
        j += 1;
    }
    if bytes.get(j) != Some(&b'"') {
        return None;
    }
    // An identifier ending right before `@"` or `$"` isn't a prefix.
    if j > i && i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_') {
        return None;
    }
    let quotes = bytes[j..].iter().take_while(|&&b| b == b'"').count();
    if quotes >= 3 && !verbatim {
        return Some((StrKind::Raw { quotes, dollars }, j - i + quotes));
    }
    let kind = match (dollars > 0, verbatim) {
        (false, false) => StrKind::Regular,
        (false, true) => StrKind::Verbatim,
        (true, false) => StrKind::Interpolated,
        (true, true) => StrKind::InterpolatedVerbatim,
    };
    Some((kind, j - i + 1))
}

/// Advance one step inside a string. Returns how many bytes were consumed.
fn string_step(
    bytes: &[u8],
    i: usize,
    kind: StrKind,
    stack: &mut Vec<Mode>,
    masked: &mut [u8],
    in_code: &mut [bool],
) -> usize {
    let b = bytes[i];
    let next = bytes.get(i + 1).copied();
    let interpolated = matches!(
        kind,
        StrKind::Interpolated | StrKind::InterpolatedVerbatim
    );
    let verbatim = matches!(kind, StrKind::Verbatim | StrKind::InterpolatedVerbatim);

    match kind {
        StrKind::Raw { quotes, dollars } => {
            if b == b'"' {
                let run = bytes[i..].iter().take_while(|&&c| c == b'"').count();
                if run >= quotes {
                    stack.pop();
                    return blank(masked, i, run);
                }
                return blank(masked, i, run);
            }
            if dollars > 0 && b == b'{' {
                let run = bytes[i..].iter().take_while(|&&c| c == b'{').count();
                if run >= dollars {
                    stack.push(Mode::Hole { depth: 0 });
                }
                return blank(masked, i, run);
            }
            blank(masked, i, 1)
        }
        _ => {
            if !verbatim && b == b'\\' && next.is_some_and(|n| n != b'\n') {
                return blank(masked, i, 2);
            }
            if verbatim && b == b'"' && next == Some(b'"') {
                return blank(masked, i, 2);
            }
            if interpolated && b == b'{' {
                if next == Some(b'{') {
                    return blank(masked, i, 2);
                }
                stack.push(Mode::Hole { depth: 0 });
                return blank(masked, i, 1);
            }
            if b == b'"' {
                stack.pop();
                return blank(masked, i, 1);
            }
            if b == b'\n' && !verbatim {
                // Unterminated regular string; recover at the line end.
                stack.pop();
                in_code[i] = stack.len() == 1;
                return 1;
            }
            blank(masked, i, 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_only(source: &str) -> String {
        scan(source).masked.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_strings_and_comments_are_blanked() {
        assert_eq!(
            code_only("var s = \"a { b\"; // c }\nint x; /* { */ y();"),
            "var s = ; int x; y();"
        );
    }

    #[test]
    fn test_verbatim_and_escaped_quotes() {
        assert_eq!(code_only(r#"a(@"x ""}"" y"); b("\"}");"#), "a( ); b( );");
    }

    #[test]
    fn test_interpolation_holes_with_nested_strings() {
        let src = r#"var s = $"v={(ok ? "}" : "{")} end"; f();"#;
        assert_eq!(code_only(src), "var s = ; f();");
    }

    #[test]
    fn test_raw_strings() {
        let src = "var j = \"\"\"\n  { \"k\": 1 }\n  \"\"\";\ng();";
        assert_eq!(code_only(src), "var j = ; g();");
        let interp = "var j = $$\"\"\"{\"a\": {{x}}}\"\"\"; h();";
        assert_eq!(code_only(interp), "var j = ; h();");
    }

    #[test]
    fn test_char_literals_and_preprocessor() {
        let src = "#region X {\nchar c = '{'; char q = '\\'';\n#endregion\nz();";
        assert_eq!(code_only(src), "char c = ; char q = ; z();");
    }

    #[test]
    fn test_mask_is_byte_aligned() {
        let src = "// héllo\nint a; \"ünï\"\n";
        let map = scan(src);
        assert_eq!(map.masked.len(), src.len());
        assert_eq!(map.line_starts, vec![0, 10]);
        assert_eq!(map.line_of(11), 2);
        assert!(map.is_code(src.find("int").unwrap()));
        assert!(!map.is_code(src.find('ü').unwrap()));
        // The newline ending a line comment is code again.
        assert!(map.is_code(src.find('\n').unwrap()));
    }

    #[test]
    fn test_matching_brace_skips_masked_braces() {
        let src = "class A { string s = \"}\"; }";
        let map = scan(src);
        let open = src.find('{').unwrap();
        assert_eq!(map.matching_brace(open), Some(src.len() - 1));
    }

    #[test]
    fn test_brace_depth_counts_code_braces_only() {
        let src = "class A {\n  void F() { var s = $\"{x} }\"; }\n}\n";
        let map = scan(src);
        assert_eq!(map.brace_depth(0), 0);
        assert_eq!(map.brace_depth(src.find("void").unwrap()), 1);
        assert_eq!(map.brace_depth(src.find("var").unwrap()), 2);
        assert_eq!(map.brace_depth(src.rfind('}').unwrap()), 1);
        assert_eq!(map.brace_depth(src.len()), 0);
    }
}
