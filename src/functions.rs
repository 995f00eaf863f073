//! PDF function objects (types 0, 2, 3 and 4) used by tint transforms and
//! shadings.

use crate::filters::decode_stream;
use crate::objects::{dict_f32, dict_f32_array, dict_get, dict_i64, resolve_object};
use lopdf::{Dictionary as LoDictionary, Document as LoDocument, Object as LoObject};

const MAX_FUNCTION_DEPTH: usize = 8;
const MAX_SAMPLES: usize = 1 << 20;
const PS_STACK_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub(crate) enum Function {
    Sampled(SampledFunction),
    Exponential(ExponentialFunction),
    Stitching(StitchingFunction),
    PostScript(PostScriptFunction),
    /// An array of single-output functions evaluated side by side.
    Array(Vec<Function>),
}

#[derive(Debug, Clone)]
pub(crate) struct SampledFunction {
    domain: Vec<[f32; 2]>,
    range: Vec<[f32; 2]>,
    size: Vec<usize>,
    encode: Vec<[f32; 2]>,
    decode: Vec<[f32; 2]>,
    samples: Vec<f32>,
}

#[derive(Debug, Clone)]
pub(crate) struct ExponentialFunction {
    domain: [f32; 2],
    range: Option<Vec<[f32; 2]>>,
    c0: Vec<f32>,
    c1: Vec<f32>,
    n: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct StitchingFunction {
    domain: [f32; 2],
    range: Option<Vec<[f32; 2]>>,
    functions: Vec<Function>,
    bounds: Vec<f32>,
    encode: Vec<[f32; 2]>,
}

#[derive(Debug, Clone)]
pub(crate) struct PostScriptFunction {
    domain: Vec<[f32; 2]>,
    range: Vec<[f32; 2]>,
    program: Vec<PsOp>,
}

impl Function {
    pub(crate) fn parse(doc: &LoDocument, obj: &LoObject) -> Option<Function> {
        parse_function(doc, obj, 0)
    }

    pub(crate) fn evaluate(&self, inputs: &[f32]) -> Vec<f32> {
        match self {
            Function::Sampled(f) => f.evaluate(inputs),
            Function::Exponential(f) => f.evaluate(inputs.first().copied().unwrap_or(0.0)),
            Function::Stitching(f) => f.evaluate(inputs.first().copied().unwrap_or(0.0)),
            Function::PostScript(f) => f.evaluate(inputs),
            Function::Array(fns) => fns
                .iter()
                .map(|f| f.evaluate(inputs).first().copied().unwrap_or(0.0))
                .collect(),
        }
    }
}

fn parse_function(doc: &LoDocument, obj: &LoObject, depth: usize) -> Option<Function> {
    if depth > MAX_FUNCTION_DEPTH {
        return None;
    }
    let resolved = resolve_object(doc, obj).ok()?;
    if let LoObject::Array(items) = resolved {
        let fns: Option<Vec<Function>> = items
            .iter()
            .map(|item| parse_function(doc, item, depth + 1))
            .collect();
        return fns.map(Function::Array);
    }
    let (dict, stream) = match resolved {
        LoObject::Dictionary(d) => (d, None),
        LoObject::Stream(s) => (&s.dict, Some(s)),
        _ => return None,
    };
    match dict_i64(doc, dict, b"FunctionType")? {
        0 => {
            let data = decode_stream(stream?).ok()?;
            parse_sampled(doc, dict, &data).map(Function::Sampled)
        }
        2 => parse_exponential(doc, dict).map(Function::Exponential),
        3 => parse_stitching(doc, dict, depth).map(Function::Stitching),
        4 => {
            let data = decode_stream(stream?).ok()?;
            parse_postscript(doc, dict, &data).map(Function::PostScript)
        }
        other => {
            log::warn!("unsupported function type {other}");
            None
        }
    }
}

fn pairs(values: &[f32]) -> Vec<[f32; 2]> {
    values.chunks_exact(2).map(|p| [p[0], p[1]]).collect()
}

fn interpolate(x: f32, x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> f32 {
    if (x_max - x_min).abs() < f32::EPSILON {
        return y_min;
    }
    y_min + (x - x_min) * (y_max - y_min) / (x_max - x_min)
}

fn clip_to(value: f32, bounds: [f32; 2]) -> f32 {
    let (lo, hi) = if bounds[0] <= bounds[1] {
        (bounds[0], bounds[1])
    } else {
        (bounds[1], bounds[0])
    };
    if value.is_nan() { lo } else { value.clamp(lo, hi) }
}

fn clip_outputs(mut out: Vec<f32>, range: Option<&[[f32; 2]]>) -> Vec<f32> {
    if let Some(range) = range {
        for (v, bounds) in out.iter_mut().zip(range.iter()) {
            *v = clip_to(*v, *bounds);
        }
    }
    out
}

fn parse_sampled(doc: &LoDocument, dict: &LoDictionary, data: &[u8]) -> Option<SampledFunction> {
    let domain = pairs(&dict_f32_array(doc, dict, b"Domain")?);
    let range = pairs(&dict_f32_array(doc, dict, b"Range")?);
    let size: Vec<usize> = dict_f32_array(doc, dict, b"Size")?
        .into_iter()
        .map(|v| v.max(1.0) as usize)
        .collect();
    if domain.is_empty() || domain.len() > 8 || range.is_empty() || size.len() != domain.len() {
        return None;
    }
    let bps = dict_i64(doc, dict, b"BitsPerSample")?;
    if !matches!(bps, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
        return None;
    }
    let encode = dict_f32_array(doc, dict, b"Encode")
        .map(|v| pairs(&v))
        .filter(|v| v.len() == domain.len())
        .unwrap_or_else(|| size.iter().map(|s| [0.0, (*s as f32) - 1.0]).collect());
    let decode = dict_f32_array(doc, dict, b"Decode")
        .map(|v| pairs(&v))
        .filter(|v| v.len() == range.len())
        .unwrap_or_else(|| range.clone());

    let count = size
        .iter()
        .try_fold(range.len(), |acc, s| acc.checked_mul(*s))?;
    if count > MAX_SAMPLES {
        return None;
    }
    let max_value = ((1u64 << bps) - 1) as f32;
    let mut reader = BitReader::new(data);
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        let raw = reader.read(bps as u32)?;
        samples.push(raw as f32 / max_value);
    }
    Some(SampledFunction {
        domain,
        range,
        size,
        encode,
        decode,
        samples,
    })
}

impl SampledFunction {
    fn evaluate(&self, inputs: &[f32]) -> Vec<f32> {
        let m = self.domain.len();
        let n = self.range.len();
        // Multilinear interpolation over the 2^m corners of the sample cell.
        let mut floor_idx = vec![0usize; m];
        let mut frac = vec![0.0f32; m];
        for i in 0..m {
            let x = clip_to(inputs.get(i).copied().unwrap_or(0.0), self.domain[i]);
            let e = interpolate(
                x,
                self.domain[i][0],
                self.domain[i][1],
                self.encode[i][0],
                self.encode[i][1],
            );
            let max_index = (self.size[i] - 1) as f32;
            let e = e.clamp(0.0, max_index);
            let base = e.floor().min((max_index - 1.0).max(0.0));
            floor_idx[i] = base as usize;
            frac[i] = if self.size[i] > 1 { e - base } else { 0.0 };
        }

        let mut out = vec![0.0f32; n];
        for corner in 0..(1usize << m) {
            let mut weight = 1.0f32;
            let mut offset = 0usize;
            let mut stride = 1usize;
            for i in 0..m {
                let high = corner & (1 << i) != 0;
                let idx = if high {
                    weight *= frac[i];
                    (floor_idx[i] + 1).min(self.size[i] - 1)
                } else {
                    weight *= 1.0 - frac[i];
                    floor_idx[i]
                };
                offset += idx * stride;
                stride *= self.size[i];
            }
            if weight == 0.0 {
                continue;
            }
            for (j, slot) in out.iter_mut().enumerate() {
                if let Some(sample) = self.samples.get(offset * n + j) {
                    *slot += weight * sample;
                }
            }
        }
        for (j, slot) in out.iter_mut().enumerate() {
            let decoded = self.decode[j][0] + *slot * (self.decode[j][1] - self.decode[j][0]);
            *slot = clip_to(decoded, self.range[j]);
        }
        out
    }
}

fn parse_exponential(doc: &LoDocument, dict: &LoDictionary) -> Option<ExponentialFunction> {
    let domain = dict_f32_array(doc, dict, b"Domain")
        .and_then(|v| pairs(&v).first().copied())
        .unwrap_or([0.0, 1.0]);
    let c0 = dict_f32_array(doc, dict, b"C0").unwrap_or_else(|| vec![0.0]);
    let c1 = dict_f32_array(doc, dict, b"C1").unwrap_or_else(|| vec![1.0]);
    if c0.len() != c1.len() {
        return None;
    }
    let n = dict_f32(doc, dict, b"N")?;
    let range = dict_f32_array(doc, dict, b"Range").map(|v| pairs(&v));
    Some(ExponentialFunction {
        domain,
        range,
        c0,
        c1,
        n,
    })
}

impl ExponentialFunction {
    fn evaluate(&self, x: f32) -> Vec<f32> {
        let x = clip_to(x, self.domain);
        let xn = x.powf(self.n);
        let xn = if xn.is_finite() { xn } else { 0.0 };
        let out = self
            .c0
            .iter()
            .zip(self.c1.iter())
            .map(|(c0, c1)| c0 + xn * (c1 - c0))
            .collect();
        clip_outputs(out, self.range.as_deref())
    }
}

fn parse_stitching(doc: &LoDocument, dict: &LoDictionary, depth: usize) -> Option<StitchingFunction> {
    let domain = dict_f32_array(doc, dict, b"Domain")
        .and_then(|v| pairs(&v).first().copied())?;
    let fn_array = dict_get(doc, dict, b"Functions")?.as_array().ok()?;
    let functions: Vec<Function> = fn_array
        .iter()
        .map(|item| parse_function(doc, item, depth + 1))
        .collect::<Option<_>>()?;
    if functions.is_empty() {
        return None;
    }
    let bounds = dict_f32_array(doc, dict, b"Bounds").unwrap_or_default();
    if bounds.len() + 1 != functions.len() {
        return None;
    }
    let encode = dict_f32_array(doc, dict, b"Encode")
        .map(|v| pairs(&v))
        .filter(|v| v.len() == functions.len())
        .unwrap_or_else(|| vec![[0.0, 1.0]; functions.len()]);
    let range = dict_f32_array(doc, dict, b"Range").map(|v| pairs(&v));
    Some(StitchingFunction {
        domain,
        range,
        functions,
        bounds,
        encode,
    })
}

impl StitchingFunction {
    fn evaluate(&self, x: f32) -> Vec<f32> {
        let x = clip_to(x, self.domain);
        let idx = self
            .bounds
            .iter()
            .position(|bound| x < *bound)
            .unwrap_or(self.bounds.len());
        let low = if idx == 0 {
            self.domain[0]
        } else {
            self.bounds[idx - 1]
        };
        let high = self.bounds.get(idx).copied().unwrap_or(self.domain[1]);
        let [e0, e1] = self.encode[idx];
        let t = interpolate(x, low, high, e0, e1);
        let out = self.functions[idx].evaluate(&[t]);
        clip_outputs(out, self.range.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PsOp {
    Number(f32),
    Operator(String),
    If(Vec<PsOp>),
    IfElse(Vec<PsOp>, Vec<PsOp>),
}

fn parse_postscript(doc: &LoDocument, dict: &LoDictionary, data: &[u8]) -> Option<PostScriptFunction> {
    let domain = pairs(&dict_f32_array(doc, dict, b"Domain")?);
    let range = pairs(&dict_f32_array(doc, dict, b"Range")?);
    let text = String::from_utf8_lossy(data);
    let tokens = tokenize_postscript(&text);
    let mut pos = 0usize;
    // The program is a single top-level procedure.
    if tokens.first().map(String::as_str) != Some("{") {
        return None;
    }
    pos += 1;
    let program = parse_ps_block(&tokens, &mut pos)?;
    Some(PostScriptFunction {
        domain,
        range,
        program,
    })
}

fn tokenize_postscript(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '{' | '}' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parses tokens up to the matching `}`; `pos` starts after the opening brace.
fn parse_ps_block(tokens: &[String], pos: &mut usize) -> Option<Vec<PsOp>> {
    let mut ops = Vec::new();
    let mut pending: Vec<Vec<PsOp>> = Vec::new();
    while *pos < tokens.len() {
        let token = tokens[*pos].as_str();
        *pos += 1;
        match token {
            "{" => pending.push(parse_ps_block(tokens, pos)?),
            "}" => return Some(ops),
            "if" => {
                let body = pending.pop()?;
                ops.push(PsOp::If(body));
            }
            "ifelse" => {
                let else_body = pending.pop()?;
                let then_body = pending.pop()?;
                ops.push(PsOp::IfElse(then_body, else_body));
            }
            "true" => ops.push(PsOp::Number(1.0)),
            "false" => ops.push(PsOp::Number(0.0)),
            other => match other.parse::<f32>() {
                Ok(v) => ops.push(PsOp::Number(v)),
                Err(_) => ops.push(PsOp::Operator(other.to_string())),
            },
        }
    }
    None
}

impl PostScriptFunction {
    fn evaluate(&self, inputs: &[f32]) -> Vec<f32> {
        let mut stack: Vec<f32> = self
            .domain
            .iter()
            .enumerate()
            .map(|(i, bounds)| clip_to(inputs.get(i).copied().unwrap_or(0.0), *bounds))
            .collect();
        if run_ps(&self.program, &mut stack).is_none() {
            log::debug!("postscript function failed; using range minimum");
            return self.range.iter().map(|r| r[0]).collect();
        }
        let n = self.range.len();
        let start = stack.len().saturating_sub(n);
        let mut out: Vec<f32> = stack[start..].to_vec();
        while out.len() < n {
            out.insert(0, 0.0);
        }
        clip_outputs(out, Some(&self.range))
    }
}

fn run_ps(program: &[PsOp], stack: &mut Vec<f32>) -> Option<()> {
    for op in program {
        if stack.len() > PS_STACK_LIMIT {
            return None;
        }
        match op {
            PsOp::Number(v) => stack.push(*v),
            PsOp::If(body) => {
                if stack.pop()? != 0.0 {
                    run_ps(body, stack)?;
                }
            }
            PsOp::IfElse(then_body, else_body) => {
                if stack.pop()? != 0.0 {
                    run_ps(then_body, stack)?;
                } else {
                    run_ps(else_body, stack)?;
                }
            }
            PsOp::Operator(name) => run_ps_operator(name, stack)?,
        }
    }
    Some(())
}

fn bool_value(v: bool) -> f32 {
    if v { 1.0 } else { 0.0 }
}

fn run_ps_operator(name: &str, stack: &mut Vec<f32>) -> Option<()> {
    macro_rules! unary {
        ($f:expr) => {{
            let a = stack.pop()?;
            stack.push($f(a));
        }};
    }
    macro_rules! binary {
        ($f:expr) => {{
            let b = stack.pop()?;
            let a = stack.pop()?;
            stack.push($f(a, b));
        }};
    }
    match name {
        "add" => binary!(|a, b| a + b),
        "sub" => binary!(|a, b| a - b),
        "mul" => binary!(|a, b| a * b),
        "div" => binary!(|a: f32, b: f32| if b == 0.0 { 0.0 } else { a / b }),
        "idiv" => binary!(|a: f32, b: f32| if b as i64 == 0 {
            0.0
        } else {
            ((a as i64) / (b as i64)) as f32
        }),
        "mod" => binary!(|a: f32, b: f32| if b as i64 == 0 {
            0.0
        } else {
            ((a as i64) % (b as i64)) as f32
        }),
        "neg" => unary!(|a: f32| -a),
        "abs" => unary!(|a: f32| a.abs()),
        "ceiling" => unary!(|a: f32| a.ceil()),
        "floor" => unary!(|a: f32| a.floor()),
        "round" => unary!(|a: f32| (a + 0.5).floor()),
        "truncate" => unary!(|a: f32| a.trunc()),
        "sqrt" => unary!(|a: f32| a.max(0.0).sqrt()),
        "sin" => unary!(|a: f32| a.to_radians().sin()),
        "cos" => unary!(|a: f32| a.to_radians().cos()),
        "atan" => binary!(|num: f32, den: f32| {
            let deg = num.atan2(den).to_degrees();
            if deg < 0.0 { deg + 360.0 } else { deg }
        }),
        "exp" => binary!(|base: f32, exp: f32| base.powf(exp)),
        "ln" => unary!(|a: f32| if a > 0.0 { a.ln() } else { 0.0 }),
        "log" => unary!(|a: f32| if a > 0.0 { a.log10() } else { 0.0 }),
        "cvi" => unary!(|a: f32| a.trunc()),
        "cvr" => {}
        "eq" => binary!(|a, b| bool_value(a == b)),
        "ne" => binary!(|a, b| bool_value(a != b)),
        "gt" => binary!(|a, b| bool_value(a > b)),
        "ge" => binary!(|a, b| bool_value(a >= b)),
        "lt" => binary!(|a, b| bool_value(a < b)),
        "le" => binary!(|a, b| bool_value(a <= b)),
        "and" => binary!(|a: f32, b: f32| ((a as i64) & (b as i64)) as f32),
        "or" => binary!(|a: f32, b: f32| ((a as i64) | (b as i64)) as f32),
        "xor" => binary!(|a: f32, b: f32| ((a as i64) ^ (b as i64)) as f32),
        "not" => unary!(|a: f32| if a == 0.0 {
            1.0
        } else if a == 1.0 {
            0.0
        } else {
            !(a as i64) as f32
        }),
        "bitshift" => binary!(|a: f32, shift: f32| {
            let (a, shift) = (a as i64, shift as i64);
            if shift >= 0 {
                (a << shift.min(62)) as f32
            } else {
                (a >> (-shift).min(62)) as f32
            }
        }),
        "pop" => {
            stack.pop()?;
        }
        "dup" => {
            let a = *stack.last()?;
            stack.push(a);
        }
        "exch" => {
            let len = stack.len();
            if len < 2 {
                return None;
            }
            stack.swap(len - 1, len - 2);
        }
        "copy" => {
            let n = stack.pop()? as usize;
            if n > stack.len() {
                return None;
            }
            let start = stack.len() - n;
            let copied: Vec<f32> = stack[start..].to_vec();
            stack.extend(copied);
        }
        "index" => {
            let n = stack.pop()? as usize;
            let len = stack.len();
            if n >= len {
                return None;
            }
            stack.push(stack[len - 1 - n]);
        }
        "roll" => {
            let j = stack.pop()? as i64;
            let n = stack.pop()? as usize;
            if n > stack.len() {
                return None;
            }
            if n > 0 {
                let start = stack.len() - n;
                let shift = j.rem_euclid(n as i64) as usize;
                stack[start..].rotate_right(shift);
            }
        }
        other => {
            log::debug!("unknown postscript operator {other}");
            return None;
        }
    }
    Some(())
}

/// Reads big-endian bit-packed unsigned samples.
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    pub(crate) fn read(&mut self, bits: u32) -> Option<u32> {
        let mut value: u64 = 0;
        for _ in 0..bits {
            let byte = *self.data.get(self.bit_pos / 8)?;
            let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
            value = (value << 1) | bit as u64;
            self.bit_pos += 1;
        }
        Some(value as u32)
    }

    /// Skips to the next byte boundary.
    pub(crate) fn align(&mut self) {
        self.bit_pos = self.bit_pos.div_ceil(8) * 8;
    }
}
