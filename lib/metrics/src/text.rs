use std::fmt::Write;

use crate::attributes::Attributes;
use crate::observer::{Kind, Observation};
use crate::registry::Reporter;

/// Renders reported metrics in the Prometheus text exposition format (0.0.4).
#[derive(Debug, Default)]
pub struct TextEncoder {
    buf: String,
    current: Option<&'static str>,
}

impl TextEncoder {
    pub fn finish(self) -> String {
        self.buf
    }

    fn write_sample(
        &mut self,
        name: &str,
        suffix: &str,
        attrs: &Attributes,
        le: Option<f64>,
        value: impl std::fmt::Display,
    ) {
        self.buf.push_str(name);
        self.buf.push_str(suffix);

        if !attrs.is_empty() || le.is_some() {
            self.buf.push('{');

            let mut first = true;
            for (key, value) in attrs.iter() {
                if !first {
                    self.buf.push(',');
                }
                first = false;

                self.buf.push_str(key);
                self.buf.push_str("=\"");
                escape_label_value(&mut self.buf, value);
                self.buf.push('"');
            }

            if let Some(le) = le {
                if !first {
                    self.buf.push(',');
                }

                self.buf.push_str("le=\"");
                if le.is_infinite() {
                    self.buf.push_str("+Inf");
                } else {
                    let _ = write!(self.buf, "{le}");
                }
                self.buf.push('"');
            }

            self.buf.push('}');
        }

        let _ = writeln!(self.buf, " {value}");
    }
}

impl Reporter for TextEncoder {
    fn start_metric(&mut self, name: &'static str, description: &'static str, kind: Kind) {
        let _ = writeln!(self.buf, "# HELP {name} {}", escape_help(description));
        let _ = writeln!(self.buf, "# TYPE {name} {}", kind.as_str());

        self.current = Some(name);
    }

    fn report(&mut self, attrs: &Attributes, observation: Observation) {
        let Some(name) = self.current else {
            return;
        };

        match observation {
            Observation::Counter(value) | Observation::Gauge(value) => {
                self.write_sample(name, "", attrs, None, value);
            }
            Observation::Histogram(histogram) => {
                let mut cumulative = 0;
                for bucket in &histogram.buckets {
                    cumulative += bucket.count;
                    self.write_sample(name, "_bucket", attrs, Some(bucket.le), cumulative);
                }

                self.write_sample(name, "_sum", attrs, None, histogram.sum);
                self.write_sample(name, "_count", attrs, None, histogram.count);
            }
        }
    }

    fn finish_metric(&mut self) {
        self.current = None;
    }
}

fn escape_help(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(buf: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => buf.push_str("\\\\"),
            '"' => buf.push_str("\\\""),
            '\n' => buf.push_str("\\n"),
            c => buf.push(c),
        }
    }
}
