//! Built-in simple-font encodings and glyph-name lookups.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
}

impl BaseEncoding {
    pub(crate) fn from_name(name: &[u8]) -> Option<BaseEncoding> {
        match name {
            b"StandardEncoding" | b"MacExpertEncoding" => Some(BaseEncoding::Standard),
            b"WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            b"MacRomanEncoding" => Some(BaseEncoding::MacRoman),
            _ => None,
        }
    }

    pub(crate) fn glyph_name(self, code: u8) -> Option<&'static str> {
        match code {
            0x27 => Some(match self {
                BaseEncoding::Standard => "quoteright",
                _ => "quotesingle",
            }),
            0x60 => Some(match self {
                BaseEncoding::Standard => "quoteleft",
                _ => "grave",
            }),
            0x20..=0x7E => Some(ASCII_NAMES[(code - 0x20) as usize]),
            0x80..=0xFF => {
                let table = match self {
                    BaseEncoding::Standard => &STANDARD_HIGH,
                    BaseEncoding::WinAnsi => &WIN_ANSI_HIGH,
                    BaseEncoding::MacRoman => &MAC_ROMAN_HIGH,
                };
                let name = table[(code - 0x80) as usize];
                (!name.is_empty()).then_some(name)
            }
            _ => None,
        }
    }
}

/// Maps a glyph name to its Unicode value: the Latin names used by the
/// built-in encodings plus `uniXXXX` and `uXXXX[XX]` forms.
pub(crate) fn glyph_name_to_unicode(name: &str) -> Option<char> {
    let base = name.split('.').next().unwrap_or(name);
    if let Some(idx) = ASCII_NAMES.iter().position(|n| *n == base) {
        return char::from_u32(0x20 + idx as u32);
    }
    if let Some(idx) = WIN_ANSI_HIGH.iter().position(|n| !n.is_empty() && *n == base) {
        return char::from_u32(WIN_ANSI_UNICODE[idx] as u32);
    }
    if let Some((_, cp)) = EXTRA_NAMES.iter().find(|(n, _)| *n == base) {
        return char::from_u32(*cp);
    }
    if let Some(hex) = base.strip_prefix("uni") {
        if hex.len() >= 4 {
            return u32::from_str_radix(&hex[..4], 16).ok().and_then(char::from_u32);
        }
    }
    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
        }
    }
    None
}

const ASCII_NAMES: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand",
    "quotesingle", "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period",
    "slash", "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    "colon", "semicolon", "less", "equal", "greater", "question", "at", "A", "B", "C", "D",
    "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V",
    "W", "X", "Y", "Z", "bracketleft", "backslash", "bracketright", "asciicircum",
    "underscore", "grave", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m",
    "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar",
    "braceright", "asciitilde",
];

const WIN_ANSI_HIGH: [&str; 128] = [
    // 0x80
    "Euro", "", "quotesinglbase", "florin", "quotedblbase", "ellipsis", "dagger", "daggerdbl",
    "circumflex", "perthousand", "Scaron", "guilsinglleft", "OE", "", "Zcaron", "",
    // 0x90
    "", "quoteleft", "quoteright", "quotedblleft", "quotedblright", "bullet", "endash",
    "emdash", "tilde", "trademark", "scaron", "guilsinglright", "oe", "", "zcaron",
    "Ydieresis",
    // 0xA0
    "space", "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar", "section",
    "dieresis", "copyright", "ordfeminine", "guillemotleft", "logicalnot", "hyphen",
    "registered", "macron",
    // 0xB0
    "degree", "plusminus", "twosuperior", "threesuperior", "acute", "mu", "paragraph",
    "periodcentered", "cedilla", "onesuperior", "ordmasculine", "guillemotright",
    "onequarter", "onehalf", "threequarters", "questiondown",
    // 0xC0
    "Agrave", "Aacute", "Acircumflex", "Atilde", "Adieresis", "Aring", "AE", "Ccedilla",
    "Egrave", "Eacute", "Ecircumflex", "Edieresis", "Igrave", "Iacute", "Icircumflex",
    "Idieresis",
    // 0xD0
    "Eth", "Ntilde", "Ograve", "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply",
    "Oslash", "Ugrave", "Uacute", "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls",
    // 0xE0
    "agrave", "aacute", "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla",
    "egrave", "eacute", "ecircumflex", "edieresis", "igrave", "iacute", "icircumflex",
    "idieresis",
    // 0xF0
    "eth", "ntilde", "ograve", "oacute", "ocircumflex", "otilde", "odieresis", "divide",
    "oslash", "ugrave", "uacute", "ucircumflex", "udieresis", "yacute", "thorn", "ydieresis",
];

const WIN_ANSI_UNICODE: [u16; 128] = {
    let mut table = [0u16; 128];
    let cp1252: [u16; 32] = [
        0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160,
        0x2039, 0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013,
        0x2014, 0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
    ];
    let mut i = 0;
    while i < 128 {
        table[i] = if i < 32 { cp1252[i] } else { 0x80 + i as u16 };
        i += 1;
    }
    table
};

const STANDARD_HIGH: [&str; 128] = [
    // 0x80
    "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "",
    // 0x90
    "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "",
    // 0xA0
    "", "exclamdown", "cent", "sterling", "fraction", "yen", "florin", "section", "currency",
    "quotesingle", "quotedblleft", "guillemotleft", "guilsinglleft", "guilsinglright", "fi",
    "fl",
    // 0xB0
    "", "endash", "dagger", "daggerdbl", "periodcentered", "", "paragraph", "bullet",
    "quotesinglbase", "quotedblbase", "quotedblright", "guillemotright", "ellipsis",
    "perthousand", "", "questiondown",
    // 0xC0
    "", "grave", "acute", "circumflex", "tilde", "macron", "breve", "dotaccent", "dieresis",
    "", "ring", "cedilla", "", "hungarumlaut", "ogonek", "caron",
    // 0xD0
    "emdash", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "",
    // 0xE0
    "", "AE", "", "ordfeminine", "", "", "", "", "Lslash", "Oslash", "OE", "ordmasculine",
    "", "", "", "",
    // 0xF0
    "", "ae", "", "", "", "dotlessi", "", "", "lslash", "oslash", "oe", "germandbls", "", "",
    "", "",
];

const MAC_ROMAN_HIGH: [&str; 128] = [
    // 0x80
    "Adieresis", "Aring", "Ccedilla", "Eacute", "Ntilde", "Odieresis", "Udieresis", "aacute",
    "agrave", "acircumflex", "adieresis", "atilde", "aring", "ccedilla", "eacute", "egrave",
    // 0x90
    "ecircumflex", "edieresis", "iacute", "igrave", "icircumflex", "idieresis", "ntilde",
    "oacute", "ograve", "ocircumflex", "odieresis", "otilde", "uacute", "ugrave",
    "ucircumflex", "udieresis",
    // 0xA0
    "dagger", "degree", "cent", "sterling", "section", "bullet", "paragraph", "germandbls",
    "registered", "copyright", "trademark", "acute", "dieresis", "notequal", "AE", "Oslash",
    // 0xB0
    "infinity", "plusminus", "lessequal", "greaterequal", "yen", "mu", "partialdiff",
    "summation", "product", "pi", "integral", "ordfeminine", "ordmasculine", "Omega", "ae",
    "oslash",
    // 0xC0
    "questiondown", "exclamdown", "logicalnot", "radical", "florin", "approxequal", "Delta",
    "guillemotleft", "guillemotright", "ellipsis", "space", "Agrave", "Atilde", "Otilde", "OE",
    "oe",
    // 0xD0
    "endash", "emdash", "quotedblleft", "quotedblright", "quoteleft", "quoteright", "divide",
    "lozenge", "ydieresis", "Ydieresis", "fraction", "currency", "guilsinglleft",
    "guilsinglright", "fi", "fl",
    // 0xE0
    "daggerdbl", "periodcentered", "quotesinglbase", "quotedblbase", "perthousand",
    "Acircumflex", "Ecircumflex", "Aacute", "Edieresis", "Egrave", "Iacute", "Icircumflex",
    "Idieresis", "Igrave", "Oacute", "Ocircumflex",
    // 0xF0
    "apple", "Ograve", "Uacute", "Ucircumflex", "Ugrave", "dotlessi", "circumflex", "tilde",
    "macron", "breve", "dotaccent", "ring", "cedilla", "hungarumlaut", "ogonek", "caron",
];

const EXTRA_NAMES: [(&str, u32); 26] = [
    ("fi", 0xFB01),
    ("fl", 0xFB02),
    ("fraction", 0x2044),
    ("dotlessi", 0x0131),
    ("breve", 0x02D8),
    ("dotaccent", 0x02D9),
    ("ring", 0x02DA),
    ("hungarumlaut", 0x02DD),
    ("ogonek", 0x02DB),
    ("caron", 0x02C7),
    ("Lslash", 0x0141),
    ("lslash", 0x0142),
    ("minus", 0x2212),
    ("notequal", 0x2260),
    ("infinity", 0x221E),
    ("lessequal", 0x2264),
    ("greaterequal", 0x2265),
    ("partialdiff", 0x2202),
    ("summation", 0x2211),
    ("product", 0x220F),
    ("pi", 0x03C0),
    ("integral", 0x222B),
    ("Omega", 0x2126),
    ("radical", 0x221A),
    ("approxequal", 0x2248),
    ("Delta", 0x2206),
];
