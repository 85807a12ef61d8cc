//! JSON record sinks.
//!
//! Commands stream API results as they arrive. Each record is serialized in
//! full and written with a trailing newline before the next one starts, so a
//! failure halfway through a traversal still leaves valid JSON Lines behind.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

/// How records are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    /// One compact JSON document per line.
    #[default]
    Lines,
    /// Indented JSON, for single-document responses.
    Pretty,
}

/// Destination for JSON records produced by paging and bulk drivers.
pub trait ItemSink {
    fn emit(&mut self, item: &Value) -> io::Result<()>;
}

impl ItemSink for Vec<Value> {
    fn emit(&mut self, item: &Value) -> io::Result<()> {
        self.push(item.clone());
        Ok(())
    }
}

impl<S: ItemSink + ?Sized> ItemSink for &mut S {
    fn emit(&mut self, item: &Value) -> io::Result<()> {
        (**self).emit(item)
    }
}

/// Writes records to any [`Write`] (usually locked stdout).
pub struct JsonLines<W: Write> {
    out: W,
    style: OutputStyle,
    written: u64,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self::with_style(out, OutputStyle::Lines)
    }

    pub fn with_style(out: W, style: OutputStyle) -> Self {
        Self {
            out,
            style,
            written: 0,
        }
    }

    /// Serialize any value, not just [`Value`], with the configured style.
    pub fn write<T: Serialize + ?Sized>(&mut self, item: &T) -> io::Result<()> {
        let mut buf = match self.style {
            OutputStyle::Lines => serde_json::to_vec(item)?,
            OutputStyle::Pretty => serde_json::to_vec_pretty(item)?,
        };
        buf.push(b'\n');
        self.out.write_all(&buf)?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ItemSink for JsonLines<W> {
    fn emit(&mut self, item: &Value) -> io::Result<()> {
        self.write(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lines_are_compact_and_newline_terminated() {
        let mut sink = JsonLines::new(Vec::new());
        sink.emit(&json!({"a": 1})).unwrap();
        sink.emit(&json!({"b": [1, 2]})).unwrap();
        assert_eq!(sink.written(), 2);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "{\"a\":1}\n{\"b\":[1,2]}\n");
    }

    #[test]
    fn pretty_style_indents() {
        let mut sink = JsonLines::with_style(Vec::new(), OutputStyle::Pretty);
        sink.write(&json!({"a": 1})).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn vec_sink_keeps_order() {
        let mut sink: Vec<Value> = Vec::new();
        for i in 0..3 {
            sink.emit(&json!(i)).unwrap();
        }
        assert_eq!(sink, vec![json!(0), json!(1), json!(2)]);
    }
}
