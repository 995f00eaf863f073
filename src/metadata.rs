use crate::document::PdfDocument;
use crate::objects::{dict_get, resolve_dict};
use lopdf::Object as LoObject;
use std::collections::BTreeMap;

/// The document-level fields read from the trailer `/Info` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKey {
    Title,
    Author,
    Subject,
    Creator,
    Producer,
    CreationDate,
    ModDate,
}

impl MetadataKey {
    pub const ALL: [MetadataKey; 7] = [
        MetadataKey::Title,
        MetadataKey::Author,
        MetadataKey::Subject,
        MetadataKey::Creator,
        MetadataKey::Producer,
        MetadataKey::CreationDate,
        MetadataKey::ModDate,
    ];

    /// The `/Info` dictionary key.
    pub fn pdf_key(self) -> &'static str {
        match self {
            MetadataKey::Title => "Title",
            MetadataKey::Author => "Author",
            MetadataKey::Subject => "Subject",
            MetadataKey::Creator => "Creator",
            MetadataKey::Producer => "Producer",
            MetadataKey::CreationDate => "CreationDate",
            MetadataKey::ModDate => "ModDate",
        }
    }

    /// Label used by the info report.
    pub fn label(self) -> &'static str {
        match self {
            MetadataKey::CreationDate => "Created",
            MetadataKey::ModDate => "Modified",
            other => other.pdf_key(),
        }
    }
}

/// Present metadata fields, ordered by [`MetadataKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    fields: BTreeMap<MetadataKey, String>,
}

impl Metadata {
    pub fn get(&self, key: MetadataKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &str)> + '_ {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Reads the document information dictionary. Missing or malformed `/Info`
/// yields empty metadata; values are returned undecoded beyond the PDF text
/// string encoding, so dates keep their `D:` form.
pub fn extract_metadata(doc: &PdfDocument) -> Metadata {
    let lo = doc.lo();
    let mut fields = BTreeMap::new();
    let Ok(info_obj) = lo.trailer.get(b"Info") else {
        return Metadata { fields };
    };
    let Some(info) = resolve_dict(lo, info_obj) else {
        log::debug!("trailer /Info is not a dictionary");
        return Metadata { fields };
    };
    for key in MetadataKey::ALL {
        let Some(value) = dict_get(lo, info, key.pdf_key().as_bytes()) else {
            continue;
        };
        let Some(text) = decode_info_value(value) else {
            log::debug!("ignoring non-text /Info entry {}", key.pdf_key());
            continue;
        };
        if !text.is_empty() {
            fields.insert(key, text);
        }
    }
    Metadata { fields }
}

fn decode_info_value(obj: &LoObject) -> Option<String> {
    match obj {
        LoObject::String(..) => lopdf::decode_text_string(obj)
            .ok()
            .or_else(|| obj.as_str().ok().map(|b| String::from_utf8_lossy(b).to_string())),
        LoObject::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
        _ => None,
    }
}
