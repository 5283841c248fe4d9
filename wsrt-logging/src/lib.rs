//! Process-wide tracing setup.
//!
//! Everything is driven by environment variables so the CLI and embedding
//! services behave the same way:
//!
//! | variable             | values                          | default            |
//! |----------------------|---------------------------------|--------------------|
//! | `WSRT_LOG_LEVEL`     | any `EnvFilter` directive        | `info`             |
//! | `WSRT_LOG_OUTPUT`    | `console`, `file`, `both`, `none` | `console`        |
//! | `WSRT_LOG_FORMAT`    | `human`, `json`                 | `human`            |
//! | `WSRT_LOG_TAGS`      | `key:value,key:*`               | empty              |
//! | `WSRT_LOG_FILE_PATH` | path of the rolling log file    | `/tmp/wsrt.log`    |
//!
//! Console output goes to stderr; stdout belongs to command results.

use std::{
    collections::HashMap,
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{field::Visit, span, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::MakeWriter,
    layer::{Context, Layer},
    prelude::*,
    registry::LookupSpan,
    EnvFilter,
};

const DEFAULT_LOG_FILE: &str = "/tmp/wsrt.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
    pub tags: Vec<Tag>,
    pub file_path: PathBuf,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let output = match lookup("WSRT_LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            Some("none") => LogOutput::None,
            _ => LogOutput::Console,
        };
        let format = match lookup("WSRT_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };

        Self {
            level: lookup("WSRT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            output,
            format,
            tags: parse_tags(&lookup("WSRT_LOG_TAGS").unwrap_or_default()),
            file_path: lookup("WSRT_LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}

/// Parses `key:value` pairs separated by commas; `*` matches any value.
pub fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some(Tag {
                key: key.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}

// Writes every record to two sinks.
struct Tee<A, B> {
    primary: A,
    secondary: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let primary = self.primary.write(buf);
        let secondary = self.secondary.write(buf);
        primary.or(secondary)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    primary: A,
    secondary: B,
}

impl<'a, A, B> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a>,
    B: MakeWriter<'a>,
{
    type Writer = Tee<A::Writer, B::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            primary: self.primary.make_writer(),
            secondary: self.secondary.make_writer(),
        }
    }
}

/// Drops events that are not inside a span carrying every configured tag.
struct TagFilterLayer {
    filters: Vec<Tag>,
}

type SpanFields = HashMap<String, String>;

impl<S> Layer<S> for TagFilterLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut fields = SpanFields::new();
            attrs.record(&mut FieldVisitor(&mut fields));
            span.extensions_mut().insert(fields);
        }
    }

    fn enabled(&self, _meta: &Metadata<'_>, ctx: Context<'_, S>) -> bool {
        if self.filters.is_empty() {
            return true;
        }

        let Some(scope) = ctx.current_span().id().and_then(|id| ctx.span_scope(id)) else {
            return false;
        };

        let mut visible = SpanFields::new();
        for span in scope {
            if let Some(fields) = span.extensions().get::<SpanFields>() {
                for (key, value) in fields {
                    visible.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }

        self.filters.iter().all(|tag| {
            visible
                .get(&tag.key)
                .is_some_and(|value| tag.value == "*" || value.contains(&tag.value))
        })
    }
}

struct FieldVisitor<'a>(&'a mut SpanFields);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn formatted<S, W>(writer: W, format: LogFormat) -> BoxedLayer<S>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Human => layer.pretty().boxed(),
    }
}

fn file_writer(path: &Path) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let dir = path.parent().unwrap_or_else(|| Path::new("/tmp"));
    let file_name = path.file_name().unwrap_or("wsrt.log".as_ref());
    tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name))
}

/// Initializes the global tracing subscriber from `WSRT_LOG_*` variables.
///
/// Keep the returned guard alive for as long as file output should be flushed.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(LogSettings::from_env())
}

pub fn init_with(settings: LogSettings) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_new(&settings.level)
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(noisy_crate_directive("tokio"))
        .add_directive(noisy_crate_directive("mio"));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(TagFilterLayer {
        filters: settings.tags.clone(),
    });

    let mut guard = None;
    let output = match settings.output {
        LogOutput::Console => Some(formatted(io::stderr, settings.format)),
        LogOutput::File => {
            let (writer, file_guard) = file_writer(&settings.file_path);
            guard = Some(file_guard);
            Some(formatted(writer, settings.format))
        }
        LogOutput::Both => {
            let (writer, file_guard) = file_writer(&settings.file_path);
            guard = Some(file_guard);
            let tee = MakeTee {
                primary: io::stderr,
                secondary: writer,
            };
            Some(formatted(tee, settings.format))
        }
        LogOutput::None => None,
    };

    // A subscriber may already be installed by an embedding process.
    let _ = subscriber.with(output).try_init();
    guard
}

fn noisy_crate_directive(krate: &str) -> tracing_subscriber::filter::Directive {
    format!("{krate}=warn")
        .parse()
        .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::WARN.into())
}
