//! CMap programs: code space ranges, code to CID mappings and ToUnicode
//! tables.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodespaceRange {
    len: usize,
    low: u32,
    high: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CMap {
    codespace: Vec<CodespaceRange>,
    cid_ranges: Vec<(u32, u32, u32)>,
    unicode: HashMap<u32, String>,
    identity: bool,
    pub(crate) vertical: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Int(i64),
    Name(String),
    Word(String),
    ArrayStart,
    ArrayEnd,
}

impl CMap {
    /// Two-byte codes mapping straight to CIDs (`Identity-H` / `Identity-V`).
    pub(crate) fn identity(vertical: bool) -> CMap {
        CMap {
            codespace: vec![CodespaceRange {
                len: 2,
                low: 0,
                high: 0xFFFF,
            }],
            identity: true,
            vertical,
            ..CMap::default()
        }
    }

    pub(crate) fn parse(data: &[u8]) -> CMap {
        let tokens = tokenize(data);
        let mut cmap = CMap::default();
        let mut idx = 0usize;
        while idx < tokens.len() {
            match &tokens[idx] {
                Token::Word(word) if word == "begincodespacerange" => {
                    idx += 1;
                    while let (Some(Token::Hex(low)), Some(Token::Hex(high))) =
                        (tokens.get(idx), tokens.get(idx + 1))
                    {
                        if (1..=4).contains(&low.len()) {
                            cmap.codespace.push(CodespaceRange {
                                len: low.len(),
                                low: bytes_to_u32(low),
                                high: bytes_to_u32(high),
                            });
                        }
                        idx += 2;
                    }
                }
                Token::Word(word) if word == "begincidrange" => {
                    idx += 1;
                    while let (Some(Token::Hex(low)), Some(Token::Hex(high)), Some(Token::Int(cid))) =
                        (tokens.get(idx), tokens.get(idx + 1), tokens.get(idx + 2))
                    {
                        cmap.cid_ranges
                            .push((bytes_to_u32(low), bytes_to_u32(high), *cid as u32));
                        idx += 3;
                    }
                }
                Token::Word(word) if word == "begincidchar" => {
                    idx += 1;
                    while let (Some(Token::Hex(code)), Some(Token::Int(cid))) =
                        (tokens.get(idx), tokens.get(idx + 1))
                    {
                        let code = bytes_to_u32(code);
                        cmap.cid_ranges.push((code, code, *cid as u32));
                        idx += 2;
                    }
                }
                Token::Word(word) if word == "beginbfchar" => {
                    idx += 1;
                    while let (Some(Token::Hex(src)), Some(dst)) = (tokens.get(idx), tokens.get(idx + 1)) {
                        let text = match dst {
                            Token::Hex(bytes) => utf16_be_to_string(bytes),
                            Token::Name(name) => crate::encoding::glyph_name_to_unicode(name)
                                .map(|c| c.to_string())
                                .unwrap_or_default(),
                            _ => break,
                        };
                        cmap.unicode.insert(bytes_to_u32(src), text);
                        idx += 2;
                    }
                }
                Token::Word(word) if word == "beginbfrange" => {
                    idx += 1;
                    while let (Some(Token::Hex(low)), Some(Token::Hex(high))) =
                        (tokens.get(idx), tokens.get(idx + 1))
                    {
                        let low = bytes_to_u32(low);
                        let high = bytes_to_u32(high).max(low);
                        idx += 2;
                        match tokens.get(idx) {
                            Some(Token::Hex(dst)) => {
                                let mut units = utf16_units(dst);
                                for code in low..=high.min(low.saturating_add(0xFFFF)) {
                                    cmap.unicode
                                        .insert(code, String::from_utf16_lossy(&units));
                                    if let Some(last) = units.last_mut() {
                                        *last = last.wrapping_add(1);
                                    }
                                }
                                idx += 1;
                            }
                            Some(Token::ArrayStart) => {
                                idx += 1;
                                let mut code = low;
                                while let Some(Token::Hex(dst)) = tokens.get(idx) {
                                    if code <= high {
                                        cmap.unicode.insert(code, utf16_be_to_string(dst));
                                    }
                                    code = code.saturating_add(1);
                                    idx += 1;
                                }
                                if tokens.get(idx) == Some(&Token::ArrayEnd) {
                                    idx += 1;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                Token::Name(name) if name == "WMode" => {
                    if let Some(Token::Int(mode)) = tokens.get(idx + 1) {
                        cmap.vertical = *mode == 1;
                    }
                    idx += 1;
                }
                _ => idx += 1,
            }
        }
        cmap
    }

    /// Reads one character code starting at `pos`; returns the code and its
    /// length in bytes.
    pub(crate) fn next_code(&self, bytes: &[u8], pos: usize) -> (u32, usize) {
        let remaining = bytes.len().saturating_sub(pos);
        if self.codespace.is_empty() {
            return (bytes.get(pos).copied().unwrap_or(0) as u32, 1);
        }
        let mut code = 0u32;
        for len in 1..=4usize.min(remaining) {
            code = (code << 8) | bytes[pos + len - 1] as u32;
            if self
                .codespace
                .iter()
                .any(|r| r.len == len && r.low <= code && code <= r.high)
            {
                return (code, len);
            }
        }
        // No range matched: consume the shortest declared length.
        let len = self
            .codespace
            .iter()
            .map(|r| r.len)
            .min()
            .unwrap_or(1)
            .min(remaining.max(1));
        let code = bytes
            .get(pos..pos + len)
            .map(bytes_to_u32)
            .unwrap_or(0);
        (code, len)
    }

    pub(crate) fn cid(&self, code: u32) -> u32 {
        if self.identity || self.cid_ranges.is_empty() {
            return code;
        }
        self.cid_ranges
            .iter()
            .find(|(low, high, _)| *low <= code && code <= *high)
            .map(|(low, _, start)| start + (code - low))
            .unwrap_or(0)
    }

    pub(crate) fn unicode(&self, code: u32) -> Option<&str> {
        self.unicode.get(&code).map(String::as_str)
    }

    pub(crate) fn has_unicode(&self) -> bool {
        !self.unicode.is_empty()
    }
}

fn bytes_to_u32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() == 1 {
        return vec![bytes[0] as u16];
    }
    bytes
        .chunks(2)
        .map(|pair| {
            let hi = pair[0] as u16;
            let lo = pair.get(1).copied().unwrap_or(0) as u16;
            (hi << 8) | lo
        })
        .collect()
}

fn utf16_be_to_string(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0usize;
    while i < data.len() {
        let b = data[i];
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                i += 1;
                let mut nibbles = Vec::new();
                while i < data.len() && data[i] != b'>' {
                    if let Some(v) = (data[i] as char).to_digit(16) {
                        nibbles.push(v as u8);
                    }
                    i += 1;
                }
                i += 1;
                if nibbles.len() % 2 != 0 {
                    nibbles.push(0);
                }
                let bytes = nibbles.chunks_exact(2).map(|p| (p[0] << 4) | p[1]).collect();
                tokens.push(Token::Hex(bytes));
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings carry registry names only; skip them.
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
            }
            b'/' => {
                i += 1;
                let start = i;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                tokens.push(Token::Name(
                    String::from_utf8_lossy(&data[start..i]).to_string(),
                ));
            }
            _ if b.is_ascii_whitespace() || b == b'{' || b == b'}' || b == b'>' || b == b')' => {
                i += 1;
            }
            _ => {
                let start = i;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                let word = String::from_utf8_lossy(&data[start..i]).to_string();
                match word.parse::<i64>() {
                    Ok(v) => tokens.push(Token::Int(v)),
                    Err(_) => tokens.push(Token::Word(word)),
                }
            }
        }
    }
    tokens
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(b, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'/' | b'{' | b'}' | b'%')
}
