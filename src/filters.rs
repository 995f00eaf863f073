//! Stream filter decoding. Flate data is inflated strictly: a corrupt
//! stream is an error, never an empty or cut-short result.

use crate::error::RenderError;
use lopdf::{Dictionary as LoDictionary, Object as LoObject, Stream as LoStream, dictionary};
use std::io::Read;

/// Long form of an abbreviated (inline image) filter name.
pub(crate) fn full_filter_name(name: &[u8]) -> &[u8] {
    match name {
        b"AHx" => b"ASCIIHexDecode",
        b"A85" => b"ASCII85Decode",
        b"LZW" => b"LZWDecode",
        b"Fl" => b"FlateDecode",
        b"RL" => b"RunLengthDecode",
        b"CCF" => b"CCITTFaxDecode",
        b"DCT" => b"DCTDecode",
        other => other,
    }
}

/// Applies every filter of `stream` in order. Image codecs (DCT, JPX,
/// JBIG2, CCITT) are decoded elsewhere and rejected here.
pub(crate) fn decode_stream(stream: &LoStream) -> Result<Vec<u8>, RenderError> {
    let filters = stream.filters().unwrap_or_default();
    if filters.is_empty() {
        return Ok(stream.content.clone());
    }
    let params = decode_params(&stream.dict, filters.len());
    let mut data = stream.content.clone();
    for (filter, params) in filters.iter().zip(params) {
        data = match full_filter_name(filter) {
            b"FlateDecode" => apply_predictor(inflate(&data)?, params)?,
            name @ (b"LZWDecode" | b"ASCII85Decode") => lopdf_filter(name, data, params)?,
            b"ASCIIHexDecode" => ascii_hex(&data)?,
            b"RunLengthDecode" => run_length(&data),
            other => {
                return Err(RenderError::new(format!(
                    "unsupported stream filter {}",
                    String::from_utf8_lossy(other)
                )));
            }
        };
    }
    Ok(data)
}

/// One entry per filter. A lone dictionary applies to every filter.
fn decode_params(dict: &LoDictionary, count: usize) -> Vec<Option<&LoDictionary>> {
    match dict.get(b"DecodeParms") {
        Ok(LoObject::Dictionary(params)) => vec![Some(params); count],
        Ok(LoObject::Array(items)) => (0..count)
            .map(|idx| items.get(idx).and_then(|item| item.as_dict().ok()))
            .collect(),
        _ => vec![None; count],
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, RenderError> {
    let mut out = Vec::new();
    let zlib_err = match flate2::read::ZlibDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => return Ok(out),
        Err(err) => err,
    };
    // Some producers omit the zlib header.
    out.clear();
    flate2::read::DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|_| RenderError::new(format!("corrupt FlateDecode data: {zlib_err}")))?;
    Ok(out)
}

fn apply_predictor(data: Vec<u8>, params: Option<&LoDictionary>) -> Result<Vec<u8>, RenderError> {
    let Some(params) = params else {
        return Ok(data);
    };
    let int = |key: &[u8], default: i64| params.get(key).and_then(LoObject::as_i64).unwrap_or(default);
    let colors = int(b"Colors", 1).max(1) as usize;
    let bpc = int(b"BitsPerComponent", 8).max(1) as usize;
    let columns = int(b"Columns", 1).max(1) as usize;
    let row_bytes = (colors * bpc * columns).div_ceil(8);
    match int(b"Predictor", 1) {
        1 => Ok(data),
        2 if bpc == 8 => Ok(tiff_predictor(data, colors, row_bytes)),
        10..=15 => {
            let bpp = (colors * bpc / 8).max(1);
            lopdf::filters::png::decode_frame(&data, bpp, row_bytes / bpp).map_err(|err| RenderError::new(err.to_string()))
        }
        other => Err(RenderError::new(format!(
            "unsupported predictor {other} at {bpc} bits per component"
        ))),
    }
}

fn tiff_predictor(mut data: Vec<u8>, colors: usize, row_bytes: usize) -> Vec<u8> {
    for row in data.chunks_mut(row_bytes) {
        for idx in colors..row.len() {
            row[idx] = row[idx].wrapping_add(row[idx - colors]);
        }
    }
    data
}

fn lopdf_filter(name: &[u8], data: Vec<u8>, params: Option<&LoDictionary>) -> Result<Vec<u8>, RenderError> {
    let mut dict = dictionary! { "Filter" => LoObject::Name(name.to_vec()) };
    if let Some(params) = params {
        dict.set("DecodeParms", params.clone());
    }
    LoStream::new(dict, data)
        .decompressed_content()
        .map_err(|err| RenderError::new(format!("{} data: {err}", String::from_utf8_lossy(name))))
}

fn ascii_hex(data: &[u8]) -> Result<Vec<u8>, RenderError> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        if byte.is_ascii_whitespace() || byte == 0 {
            continue;
        }
        let nibble = (byte as char)
            .to_digit(16)
            .ok_or_else(|| RenderError::new(format!("invalid ASCIIHex digit {:?}", byte as char)))?
            as u8;
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

fn run_length(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(&len) = data.get(pos) {
        pos += 1;
        match len {
            128 => break,
            0..=127 => {
                let end = (pos + len as usize + 1).min(data.len());
                out.extend_from_slice(&data[pos..end]);
                pos = end;
            }
            _ => {
                if let Some(&byte) = data.get(pos) {
                    out.resize(out.len() + 257 - len as usize, byte);
                }
                pos += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).expect("write");
        encoder.finish().expect("finish")
    }

    #[test]
    fn flate_streams_inflate() {
        let stream = LoStream::new(dictionary! { "Filter" => "FlateDecode" }, zlib(b"0 0 10 10 re f"));
        assert_eq!(decode_stream(&stream).expect("decode"), b"0 0 10 10 re f");
    }

    #[test]
    fn corrupt_flate_data_is_an_error() {
        // Block type 3 is reserved, so neither zlib nor raw deflate accepts it.
        let stream = LoStream::new(dictionary! { "Filter" => "FlateDecode" }, b"\x07garbage".to_vec());
        let err = decode_stream(&stream).expect_err("corrupt");
        assert!(err.message.contains("corrupt FlateDecode data"), "{}", err.message);
    }

    #[test]
    fn png_up_predictor_is_undone() {
        // Two rows of three bytes, the second stored as a delta from the first.
        let raw = [2, 1, 2, 3, 2, 1, 1, 1];
        let stream = LoStream::new(
            dictionary! {
                "Filter" => "FlateDecode",
                "DecodeParms" => dictionary! { "Predictor" => 12, "Columns" => 3 },
            },
            zlib(&raw),
        );
        assert_eq!(decode_stream(&stream).expect("decode"), vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn filter_chains_apply_in_order() {
        let hex: String = zlib(b"BT ET").iter().map(|b| format!("{b:02X}")).collect();
        let stream = LoStream::new(
            dictionary! {
                "Filter" => vec![LoObject::Name(b"AHx".to_vec()), LoObject::Name(b"Fl".to_vec())],
            },
            format!("{hex}>").into_bytes(),
        );
        assert_eq!(decode_stream(&stream).expect("decode"), b"BT ET");
    }

    #[test]
    fn ascii_hex_pads_an_odd_final_digit() {
        assert_eq!(ascii_hex(b"48 65 6C\n6C 6F 7>").expect("hex"), b"Hello\x70");
        assert!(ascii_hex(b"4G").is_err());
    }

    #[test]
    fn run_length_copies_and_repeats() {
        // Literal "ab", then 'z' three times, then end of data.
        assert_eq!(run_length(&[1, b'a', b'b', 254, b'z', 128, b'x']), b"abzzz");
    }

    #[test]
    fn image_codecs_are_not_stream_filters() {
        let stream = LoStream::new(dictionary! { "Filter" => "JBIG2Decode" }, vec![0; 4]);
        let err = decode_stream(&stream).expect_err("jbig2");
        assert!(err.message.contains("JBIG2Decode"));
    }
}
