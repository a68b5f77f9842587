use std::io::IsTerminal;

use clap::ValueEnum;
use plotbridge_bridge::{ReturnValue, SessionStats, StopReason};
use plotbridge_protocol::{ArrayData, Buffer, Scalar};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReturnOutput<'a> {
    symbol: &'a str,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    element_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shape: Option<&'a [usize]>,
    value: Value,
}

/// Print one returned value. `decoded` is `None` when the bytes did not
/// match the declaration; the raw size is still reported.
pub fn print_return(value: &ReturnValue, decoded: Option<&Buffer>, format: OutputFormat) {
    let shape = match decoded {
        Some(Buffer::Array(array)) => Some(array.shape()),
        Some(Buffer::Scalar(_)) => Some(&[][..]),
        _ => None,
    };
    let out = ReturnOutput {
        symbol: &value.symbol,
        size: value.bytes.len(),
        element_type: decoded.and_then(Buffer::element_type).map(|ty| ty.name()),
        shape,
        value: decoded.map_or(Value::Null, buffer_json),
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Pretty => match decoded {
            Some(buffer) => println!("{} = {} {}", out.symbol, buffer, out.value),
            None => println!("{} = <{} bytes>", out.symbol, out.size),
        },
    }
}

#[derive(Serialize)]
struct ServeSummary {
    reason: &'static str,
    frames: u64,
    dispatched: u64,
    failed: u64,
    discarded: u64,
    dropped: u64,
}

pub fn print_summary(reason: StopReason, totals: SessionStats, format: OutputFormat) {
    let out = ServeSummary {
        reason: match reason {
            StopReason::ExitFrame => "exit",
            StopReason::Interrupted => "interrupted",
        },
        frames: totals.frames,
        dispatched: totals.dispatched,
        failed: totals.failed,
        discarded: totals.discarded,
        dropped: totals.dropped,
    };
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Pretty => println!(
            "stopped ({}): frames={} dispatched={} failed={} discarded={} dropped={}",
            out.reason, out.frames, out.dispatched, out.failed, out.discarded, out.dropped
        ),
    }
}

fn scalar_json(scalar: &Scalar) -> Value {
    match *scalar {
        Scalar::I16(v) => v.into(),
        Scalar::U16(v) => v.into(),
        Scalar::I32(v) => v.into(),
        Scalar::U32(v) => v.into(),
        Scalar::I64(v) => v.into(),
        Scalar::U64(v) => v.into(),
        Scalar::F32(v) => v.into(),
        Scalar::F64(v) => v.into(),
    }
}

fn array_json(data: &ArrayData) -> Value {
    match data {
        ArrayData::I16(v) => v.clone().into(),
        ArrayData::U16(v) => v.clone().into(),
        ArrayData::I32(v) => v.clone().into(),
        ArrayData::U32(v) => v.clone().into(),
        ArrayData::I64(v) => v.clone().into(),
        ArrayData::U64(v) => v.clone().into(),
        ArrayData::F32(v) => v.clone().into(),
        ArrayData::F64(v) => v.clone().into(),
    }
}

/// Flat row-major values; the shape travels alongside.
pub fn buffer_json(buffer: &Buffer) -> Value {
    match buffer {
        Buffer::Scalar(scalar) => scalar_json(scalar),
        Buffer::Array(array) => array_json(array.data()),
        Buffer::Text(text) => Value::String(text.clone()),
    }
}
