//! Substitute fonts for PDF fonts that carry no usable embedded program.
//!
//! Base font names are reduced to a family plus a style (`Helvetica-BoldOblique`
//! becomes helvetica, bold italic) and matched against well-known file names
//! in the platform font directories and `PAGESNAP_FONT_DIR`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

pub const FONT_DIR_ENV: &str = "PAGESNAP_FONT_DIR";

const MAX_DIR_DEPTH: usize = 4;

static SYSTEM_FONT_CACHE: OnceLock<Mutex<HashMap<String, Option<Arc<Vec<u8>>>>>> = OnceLock::new();
static FONT_FILE_INDEX: OnceLock<HashMap<String, PathBuf>> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FontStyleVariant {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

/// Font bytes for the best available substitute of `font_name`, falling
/// back to a generic sans-serif face.
pub(crate) fn resolve_substitute_font(font_name: &str, serif: bool, fixed_pitch: bool) -> Option<Arc<Vec<u8>>> {
    let cache = SYSTEM_FONT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let (family, style) = parse_system_font_request(font_name);
    let generic = if fixed_pitch {
        "monospace"
    } else if serif {
        "serif"
    } else {
        "sans-serif"
    };

    for family in [family.as_str(), generic, "sans-serif"] {
        let key = format!("{family}/{style:?}");
        if let Ok(guard) = cache.lock() {
            if let Some(entry) = guard.get(&key) {
                if let Some(bytes) = entry {
                    return Some(bytes.clone());
                }
                continue;
            }
        }

        let loaded = load_from_candidates(family, style);
        if let Ok(mut guard) = cache.lock() {
            guard.insert(key, loaded.clone());
        }
        if let Some(bytes) = loaded {
            log::debug!("substitute font for {font_name}: {family} {style:?}");
            return Some(bytes);
        }
    }
    log::warn!("no substitute font available for {font_name}");
    None
}

fn load_from_candidates(family: &str, style: FontStyleVariant) -> Option<Arc<Vec<u8>>> {
    let mut candidates = system_font_file_candidates(family, style);
    if candidates.is_empty() {
        // Guess file names from the compacted family name.
        let compact = family.replace(' ', "");
        if !compact.is_empty() {
            match style {
                FontStyleVariant::Regular => {
                    candidates.push(format!("{compact}.ttf"));
                    candidates.push(format!("{compact}-Regular.ttf"));
                }
                FontStyleVariant::Bold => {
                    candidates.push(format!("{compact}-Bold.ttf"));
                    candidates.push(format!("{compact}Bold.ttf"));
                    candidates.push(format!("{compact}.ttf"));
                }
                FontStyleVariant::Italic => {
                    candidates.push(format!("{compact}-Italic.ttf"));
                    candidates.push(format!("{compact}Italic.ttf"));
                    candidates.push(format!("{compact}.ttf"));
                }
                FontStyleVariant::BoldItalic => {
                    candidates.push(format!("{compact}-BoldItalic.ttf"));
                    candidates.push(format!("{compact}BoldItalic.ttf"));
                    candidates.push(format!("{compact}-BoldOblique.ttf"));
                    candidates.push(format!("{compact}.ttf"));
                }
            }
        }
    }

    let index = FONT_FILE_INDEX.get_or_init(build_font_file_index);
    for file_name in &candidates {
        let Some(path) = index.get(&file_name.to_ascii_lowercase()) else {
            continue;
        };
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        if ttf_parser::Face::parse(&bytes, 0).is_ok() {
            return Some(Arc::new(bytes));
        }
    }
    None
}

/// Lower-cased file name to path for every font file under the font
/// directories. Earlier directories win.
fn build_font_file_index() -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    for dir in system_font_dirs() {
        index_dir(&dir, 0, &mut index);
    }
    log::debug!("indexed {} font files", index.len());
    index
}

fn index_dir(dir: &std::path::Path, depth: usize, index: &mut HashMap<String, PathBuf>) {
    if depth > MAX_DIR_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            index_dir(&path, depth + 1, index);
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".ttf") || lower.ends_with(".otf") {
            index.entry(lower).or_insert(path);
        }
    }
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(extra) = std::env::var(FONT_DIR_ENV) {
        for path in std::env::split_paths(&extra) {
            if !path.as_os_str().is_empty() {
                dirs.push(path);
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    dirs
}

/// File names per canonical family, grouped regular, bold, italic and bold
/// italic. Within a group, earlier names win.
struct FamilyFiles {
    families: &'static [&'static str],
    files: [&'static [&'static str]; 4],
}

const FAMILY_FILES: &[FamilyFiles] = &[
    FamilyFiles {
        families: &["sans-serif", "helvetica", "arial"],
        files: [
            &["LiberationSans-Regular.ttf", "arial.ttf", "NimbusSans-Regular.otf", "DejaVuSans.ttf"],
            &["LiberationSans-Bold.ttf", "arialbd.ttf", "NimbusSans-Bold.otf", "DejaVuSans-Bold.ttf"],
            &["LiberationSans-Italic.ttf", "ariali.ttf", "NimbusSans-Italic.otf", "DejaVuSans-Oblique.ttf"],
            &[
                "LiberationSans-BoldItalic.ttf",
                "arialbi.ttf",
                "NimbusSans-BoldItalic.otf",
                "DejaVuSans-BoldOblique.ttf",
            ],
        ],
    },
    FamilyFiles {
        families: &["arial narrow"],
        files: [
            &["LiberationSansNarrow-Regular.ttf", "arialn.ttf", "LiberationSans-Regular.ttf"],
            &["LiberationSansNarrow-Bold.ttf", "arialnb.ttf", "LiberationSans-Bold.ttf"],
            &["LiberationSansNarrow-Italic.ttf", "arialni.ttf", "LiberationSans-Italic.ttf"],
            &["LiberationSansNarrow-BoldItalic.ttf", "arialnbi.ttf", "LiberationSans-BoldItalic.ttf"],
        ],
    },
    FamilyFiles {
        families: &["serif", "times"],
        files: [
            &["LiberationSerif-Regular.ttf", "times.ttf", "NimbusRoman-Regular.otf", "DejaVuSerif.ttf"],
            &["LiberationSerif-Bold.ttf", "timesbd.ttf", "NimbusRoman-Bold.otf", "DejaVuSerif-Bold.ttf"],
            &["LiberationSerif-Italic.ttf", "timesi.ttf", "NimbusRoman-Italic.otf", "DejaVuSerif-Italic.ttf"],
            &[
                "LiberationSerif-BoldItalic.ttf",
                "timesbi.ttf",
                "NimbusRoman-BoldItalic.otf",
                "DejaVuSerif-BoldItalic.ttf",
            ],
        ],
    },
    FamilyFiles {
        families: &["century schoolbook"],
        files: [
            &["C059-Roman.otf", "SCHLBK.TTF", "LiberationSerif-Regular.ttf"],
            &["C059-Bold.otf", "SCHLBKB.TTF", "LiberationSerif-Bold.ttf"],
            &["C059-Italic.otf", "SCHLBKI.TTF", "LiberationSerif-Italic.ttf"],
            &["C059-BdIta.otf", "SCHLBKBI.TTF", "LiberationSerif-BoldItalic.ttf"],
        ],
    },
    FamilyFiles {
        families: &["monospace", "courier"],
        files: [
            &["LiberationMono-Regular.ttf", "cour.ttf", "NimbusMonoPS-Regular.otf", "DejaVuSansMono.ttf"],
            &["LiberationMono-Bold.ttf", "courbd.ttf", "NimbusMonoPS-Bold.otf", "DejaVuSansMono-Bold.ttf"],
            &[
                "LiberationMono-Italic.ttf",
                "couri.ttf",
                "NimbusMonoPS-Italic.otf",
                "DejaVuSansMono-Oblique.ttf",
            ],
            &[
                "LiberationMono-BoldItalic.ttf",
                "courbi.ttf",
                "NimbusMonoPS-BoldItalic.otf",
                "DejaVuSansMono-BoldOblique.ttf",
            ],
        ],
    },
    FamilyFiles {
        families: &["calibri"],
        files: [
            &["Carlito-Regular.ttf", "calibri.ttf"],
            &["Carlito-Bold.ttf", "calibrib.ttf"],
            &["Carlito-Italic.ttf", "calibrii.ttf"],
            &["Carlito-BoldItalic.ttf", "calibriz.ttf"],
        ],
    },
    FamilyFiles {
        families: &["cambria"],
        files: [
            &["Caladea-Regular.ttf"],
            &["Caladea-Bold.ttf", "cambriab.ttf"],
            &["Caladea-Italic.ttf", "cambriai.ttf"],
            &["Caladea-BoldItalic.ttf", "cambriaz.ttf"],
        ],
    },
];

/// Candidate file names for `family`, the requested style first and the
/// nearest styles after it.
fn system_font_file_candidates(family: &str, style: FontStyleVariant) -> Vec<String> {
    let Some(entry) = FAMILY_FILES.iter().find(|entry| entry.families.contains(&family)) else {
        return Vec::new();
    };
    let [regular, bold, italic, bold_italic] = entry.files;
    let groups = match style {
        FontStyleVariant::Regular => [regular, bold, italic, bold_italic],
        FontStyleVariant::Bold => [bold, regular, bold_italic, italic],
        FontStyleVariant::Italic => [italic, regular, bold_italic, bold],
        FontStyleVariant::BoldItalic => [bold_italic, bold, italic, regular],
    };
    let mut out: Vec<String> = Vec::new();
    for name in groups.into_iter().flatten().copied() {
        if !out.iter().any(|existing| existing.eq_ignore_ascii_case(name)) {
            out.push(name.to_string());
        }
    }
    out
}

fn normalize_font_family(name: &str) -> String {
    name.trim()
        .trim_start_matches('/')
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

/// Splits a PDF base font name into a canonical family and a style.
pub(crate) fn parse_system_font_request(font_name: &str) -> (String, FontStyleVariant) {
    let normalized = normalize_font_family(font_name).replace('_', " ");
    let without_subset = strip_pdf_subset_prefix(&normalized);
    let style_source = without_subset
        .replace(',', " ")
        .replace("boldoblique", "bold oblique")
        .replace("bolditalic", "bold italic")
        .replace("semi-bold", "semibold")
        .replace("demi-bold", "demibold");

    let mut bold = false;
    let mut italic = false;
    let mut condensed = false;
    let mut kept: Vec<&str> = Vec::new();
    for token in style_source.split(|c: char| c == '-' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        // PostScript names often glue "MT" onto the style: ItalicMT, BoldMT.
        let token = match token.strip_suffix("mt") {
            Some(rest) if matches!(rest, "bold" | "italic" | "oblique") => rest,
            _ => token,
        };
        let mut consumed = false;
        if matches!(token, "bold" | "semibold" | "demibold" | "black" | "heavy" | "bd")
            || token.contains("black")
        {
            bold = true;
            consumed = true;
        }
        if matches!(token, "italic" | "oblique" | "it") {
            italic = true;
            consumed = true;
        }
        if token == "bi" {
            bold = true;
            italic = true;
            consumed = true;
        }
        if matches!(token, "cn" | "condensed" | "narrow") || token.contains("condensed") {
            condensed = true;
            consumed = true;
        }
        if matches!(
            token,
            "regular" | "normal" | "book" | "medium" | "roman" | "mt" | "psmt"
        ) {
            consumed = true;
        }
        if consumed {
            continue;
        }
        kept.push(token);
    }

    let style = match (bold, italic) {
        (true, true) => FontStyleVariant::BoldItalic,
        (true, false) => FontStyleVariant::Bold,
        (false, true) => FontStyleVariant::Italic,
        (false, false) => FontStyleVariant::Regular,
    };

    let family = if kept.is_empty() {
        style_source.clone()
    } else {
        kept.join(" ")
    };
    let mut family = canonical_font_family_alias(&family);
    if condensed && matches!(family.as_str(), "helvetica" | "arial") {
        family = "arial narrow".to_string();
    }
    (family, style)
}

/// Drops the `ABCDEF+` tag that marks a subset font.
pub(crate) fn strip_pdf_subset_prefix(name: &str) -> &str {
    if let Some((prefix, rest)) = name.split_once('+') {
        if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return rest;
        }
    }
    name
}

fn canonical_font_family_alias(name: &str) -> String {
    let normalized = normalize_font_family(name);
    let compact: String = normalized
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect();
    if compact.starts_with("helvetica") {
        return "helvetica".to_string();
    }
    if compact.starts_with("newcenturyschlbk") || compact.starts_with("centuryschoolbook") {
        return "century schoolbook".to_string();
    }
    if compact.starts_with("notosans") || compact.starts_with("dejavusans") {
        return "sans-serif".to_string();
    }
    match compact.as_str() {
        "arial" | "arialmt" => "arial".to_string(),
        "times" | "timesroman" | "timesnewroman" | "timesnewromanps" | "timesnewromanpsmt" => {
            "times".to_string()
        }
        "courier" | "couriernew" | "couriernewps" | "couriernewpsmt" => "courier".to_string(),
        "sansserif" | "segoeui" | "liberationsans" => "sans-serif".to_string(),
        "liberationserif" => "serif".to_string(),
        "liberationmono" => "monospace".to_string(),
        _ => normalized,
    }
}
