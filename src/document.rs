use crate::error::SnapError;
use lopdf::{Document as LoDocument, ObjectId};
use std::path::Path;

/// An opened PDF container. Pages are fixed for the lifetime of the handle.
///
/// The decoded object graph is never mutated after [`PdfDocument::open`], so
/// `&PdfDocument` can be shared across rendering workers.
pub struct PdfDocument {
    inner: LoDocument,
    page_ids: Vec<ObjectId>,
}

/// One page of a [`PdfDocument`], identified by its 1-based number.
#[derive(Clone, Copy)]
pub struct PageHandle<'doc> {
    doc: &'doc PdfDocument,
    number: u32,
    id: ObjectId,
}

impl PdfDocument {
    /// Decodes a complete PDF byte stream.
    pub fn open(bytes: &[u8]) -> Result<Self, SnapError> {
        let mut inner = LoDocument::load_mem(bytes)
            .map_err(|err| SnapError::MalformedDocument(err.to_string()))?;

        if inner.is_encrypted() {
            // Documents protected only by an owner password open with the
            // empty user password.
            inner.decrypt("").map_err(|err| {
                SnapError::MalformedDocument(format!(
                    "encrypted document cannot be opened without a password: {err}"
                ))
            })?;
        }

        let page_ids: Vec<ObjectId> = inner.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(SnapError::MalformedDocument(
                "document has no pages".to_string(),
            ));
        }
        if u32::try_from(page_ids.len()).is_err() {
            return Err(SnapError::MalformedDocument(
                "page tree is too large".to_string(),
            ));
        }
        log::debug!(
            "opened pdf {} with {} pages ({} bytes)",
            inner.version,
            page_ids.len(),
            bytes.len()
        );
        Ok(Self { inner, page_ids })
    }

    /// Reads the whole file into memory, then opens it. Decode failures name
    /// the file.
    pub fn open_path(path: &Path) -> Result<Self, SnapError> {
        let bytes = read_input(path)?;
        Self::open(&bytes).map_err(|err| match err {
            SnapError::MalformedDocument(message) => {
                SnapError::MalformedDocument(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    pub fn page(&self, number: u32) -> Result<PageHandle<'_>, SnapError> {
        let out_of_range = || SnapError::OutOfRange {
            page: number,
            page_count: self.page_count(),
        };
        if number == 0 {
            return Err(out_of_range());
        }
        let id = *self
            .page_ids
            .get((number - 1) as usize)
            .ok_or_else(out_of_range)?;
        Ok(PageHandle {
            doc: self,
            number,
            id,
        })
    }

    pub fn pages(&self) -> impl Iterator<Item = PageHandle<'_>> + '_ {
        self.page_ids
            .iter()
            .enumerate()
            .map(move |(idx, id)| PageHandle {
                doc: self,
                number: idx as u32 + 1,
                id: *id,
            })
    }

    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// Releases the decoded container and every cache derived from it.
    pub fn close(self) {
        log::debug!("closing pdf with {} pages", self.page_ids.len());
    }

    pub(crate) fn lo(&self) -> &LoDocument {
        &self.inner
    }
}

impl<'doc> PageHandle<'doc> {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn document(&self) -> &'doc PdfDocument {
        self.doc
    }

    pub(crate) fn object_id(&self) -> ObjectId {
        self.id
    }

    pub(crate) fn lo(&self) -> &'doc LoDocument {
        &self.doc.inner
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.inner.version)
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for PageHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("number", &self.number)
            .field("id", &self.id)
            .finish()
    }
}

pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>, SnapError> {
    std::fs::read(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            SnapError::InputNotFound(path.to_path_buf())
        } else {
            SnapError::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PdfBuilder, single_page_pdf};

    fn three_page_pdf() -> Vec<u8> {
        let mut builder = PdfBuilder::new();
        for _ in 0..3 {
            builder.add_simple_page(b"", 200, 100);
        }
        builder.finish()
    }

    #[test]
    fn page_count_matches_enumerable_pages() {
        let doc = PdfDocument::open(&three_page_pdf()).expect("open");
        assert_eq!(doc.page_count(), 3);
        for number in 1..=doc.page_count() {
            let page = doc.page(number).expect("page in range");
            assert_eq!(page.number(), number);
        }
        let numbers: Vec<u32> = doc.pages().map(|p| p.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn page_zero_and_past_end_are_out_of_range() {
        let doc = PdfDocument::open(&three_page_pdf()).expect("open");
        for number in [0, doc.page_count() + 1] {
            match doc.page(number) {
                Err(SnapError::OutOfRange { page, page_count }) => {
                    assert_eq!(page, number);
                    assert_eq!(page_count, 3);
                }
                other => panic!("expected OutOfRange for {number}, got {other:?}"),
            }
        }
    }

    #[test]
    fn open_rejects_non_pdf_bytes() {
        let err = PdfDocument::open(b"not a pdf").err().expect("must fail");
        assert!(matches!(err, SnapError::MalformedDocument(_)));
    }

    #[test]
    fn open_rejects_truncated_document() {
        let bytes = single_page_pdf(b"0 0 10 10 re f", 100, 100);
        let err = PdfDocument::open(&bytes[..bytes.len() / 3])
            .err()
            .expect("truncated must fail");
        assert!(matches!(err, SnapError::MalformedDocument(_)));
    }

    #[test]
    fn open_path_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.pdf");
        match PdfDocument::open_path(&missing) {
            Err(SnapError::InputNotFound(path)) => assert_eq!(path, missing),
            other => panic!("expected InputNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn open_path_names_the_malformed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").expect("write");
        match PdfDocument::open_path(&path) {
            Err(SnapError::MalformedDocument(message)) => {
                assert!(message.contains("broken.pdf"), "{message}");
            }
            other => panic!("expected MalformedDocument, got {:?}", other.err()),
        }
    }

    #[test]
    fn debug_shows_version_and_page_count() {
        let doc = PdfDocument::open(&three_page_pdf()).expect("open");
        let text = format!("{doc:?}");
        assert!(text.starts_with("PdfDocument"), "{text}");
        assert!(text.contains("page_count: 3"), "{text}");
        assert!(text.contains(doc.version()), "{text}");
    }

    #[test]
    fn close_consumes_the_handle() {
        let doc = PdfDocument::open(&three_page_pdf()).expect("open");
        assert!(!doc.version().is_empty());
        doc.close();
    }
}
