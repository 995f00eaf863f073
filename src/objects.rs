//! Small helpers for walking lopdf object graphs.

use crate::error::RenderError;
use crate::types::Matrix;
use lopdf::content::Operation;
use lopdf::{Dictionary as LoDictionary, Document as LoDocument, Object as LoObject};

/// Follows indirect references until a direct object is reached.
pub(crate) fn resolve_object<'a>(
    doc: &'a LoDocument,
    mut obj: &'a LoObject,
) -> Result<&'a LoObject, RenderError> {
    // Bounded so reference cycles cannot spin forever.
    for _ in 0..32 {
        match obj {
            LoObject::Reference(id) => {
                obj = doc.get_object(*id)?;
            }
            _ => return Ok(obj),
        }
    }
    Err(RenderError::new("reference chain too deep"))
}

pub(crate) fn resolve_dict<'a>(
    doc: &'a LoDocument,
    obj: &'a LoObject,
) -> Option<&'a LoDictionary> {
    match resolve_object(doc, obj).ok()? {
        LoObject::Dictionary(d) => Some(d),
        LoObject::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub(crate) fn dict_get<'a>(
    doc: &'a LoDocument,
    dict: &'a LoDictionary,
    key: &[u8],
) -> Option<&'a LoObject> {
    let obj = dict.get(key).ok()?;
    resolve_object(doc, obj).ok()
}

pub(crate) fn dict_f32(doc: &LoDocument, dict: &LoDictionary, key: &[u8]) -> Option<f32> {
    dict_get(doc, dict, key).and_then(obj_to_f32)
}

pub(crate) fn dict_i64(doc: &LoDocument, dict: &LoDictionary, key: &[u8]) -> Option<i64> {
    let obj = dict_get(doc, dict, key)?;
    if let Ok(v) = obj.as_i64() {
        return Some(v);
    }
    obj_to_f32(obj).map(|v| v.round() as i64)
}

pub(crate) fn dict_name(doc: &LoDocument, dict: &LoDictionary, key: &[u8]) -> Option<String> {
    dict_get(doc, dict, key)
        .and_then(|o| o.as_name().ok())
        .map(name_bytes_to_string)
}

pub(crate) fn dict_bool(doc: &LoDocument, dict: &LoDictionary, key: &[u8]) -> Option<bool> {
    match dict_get(doc, dict, key)? {
        LoObject::Boolean(v) => Some(*v),
        _ => None,
    }
}

pub(crate) fn dict_f32_array(doc: &LoDocument, dict: &LoDictionary, key: &[u8]) -> Option<Vec<f32>> {
    let arr = dict_get(doc, dict, key)?.as_array().ok()?;
    arr.iter()
        .map(|item| resolve_object(doc, item).ok().and_then(obj_to_f32))
        .collect()
}

pub(crate) fn obj_to_f32(obj: &LoObject) -> Option<f32> {
    if let Ok(v) = obj.as_float() {
        return Some(v);
    }
    obj.as_i64().ok().map(|v| v as f32)
}

pub(crate) fn name_bytes_to_string(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_string()
}

pub(crate) fn parse_matrix_object(doc: &LoDocument, obj: &LoObject) -> Option<Matrix> {
    let arr = resolve_object(doc, obj).ok()?.as_array().ok()?;
    if arr.len() < 6 {
        return None;
    }
    let mut v = [0.0f32; 6];
    for (slot, item) in v.iter_mut().zip(arr.iter()) {
        *slot = resolve_object(doc, item).ok().and_then(obj_to_f32)?;
    }
    Some(Matrix::from_operands(v[0], v[1], v[2], v[3], v[4], v[5]))
}

/// A normalized `[x0 y0 x1 y1]` rectangle.
pub(crate) fn parse_rect_object(doc: &LoDocument, obj: &LoObject) -> Option<[f32; 4]> {
    let arr = resolve_object(doc, obj).ok()?.as_array().ok()?;
    if arr.len() < 4 {
        return None;
    }
    let mut v = [0.0f32; 4];
    for (slot, item) in v.iter_mut().zip(arr.iter()) {
        *slot = resolve_object(doc, item).ok().and_then(obj_to_f32)?;
    }
    Some([
        v[0].min(v[2]),
        v[1].min(v[3]),
        v[0].max(v[2]),
        v[1].max(v[3]),
    ])
}

pub(crate) fn op_name(op: &Operation, idx: usize) -> Option<String> {
    let obj = op.operands.get(idx)?;
    let name = obj.as_name().ok()?;
    Some(name_bytes_to_string(name))
}

pub(crate) fn op_f32(op: &Operation, idx: usize) -> Option<f32> {
    obj_to_f32(op.operands.get(idx)?)
}

pub(crate) fn op_i64(op: &Operation, idx: usize) -> Option<i64> {
    let obj = op.operands.get(idx)?;
    if let Ok(v) = obj.as_i64() {
        return Some(v);
    }
    obj_to_f32(obj).map(|v| v.round() as i64)
}

pub(crate) fn op_f32_n<const N: usize>(op: &Operation) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    for (idx, slot) in out.iter_mut().enumerate() {
        *slot = op_f32(op, idx)?;
    }
    Some(out)
}

/// All numeric operands, in order; non-numeric operands are skipped.
pub(crate) fn op_numbers(op: &Operation) -> Vec<f32> {
    op.operands.iter().filter_map(obj_to_f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn resolve_object_follows_references() {
        let mut doc = LoDocument::with_version("1.7");
        let inner = doc.add_object(LoObject::Integer(42));
        let outer = doc.add_object(LoObject::Reference(inner));
        let obj = LoObject::Reference(outer);
        let resolved = resolve_object(&doc, &obj).expect("resolve");
        assert_eq!(resolved.as_i64().ok(), Some(42));
    }

    #[test]
    fn parse_rect_object_normalizes_corners() {
        let doc = LoDocument::with_version("1.7");
        let obj = LoObject::Array(vec![
            612.into(),
            792.into(),
            0.into(),
            LoObject::Real(10.5),
        ]);
        assert_eq!(parse_rect_object(&doc, &obj), Some([0.0, 10.5, 612.0, 792.0]));
    }

    #[test]
    fn dict_helpers_resolve_indirect_values() {
        let mut doc = LoDocument::with_version("1.7");
        let width_id = doc.add_object(LoObject::Integer(250));
        let dict = dictionary! {
            "Width" => width_id,
            "Name" => "DeviceRGB",
            "Flag" => true,
        };
        assert_eq!(dict_f32(&doc, &dict, b"Width"), Some(250.0));
        assert_eq!(dict_name(&doc, &dict, b"Name").as_deref(), Some("DeviceRGB"));
        assert_eq!(dict_bool(&doc, &dict, b"Flag"), Some(true));
        assert_eq!(dict_i64(&doc, &dict, b"Missing"), None);
    }
}
