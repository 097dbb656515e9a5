// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log output for hosts that have no subscriber of their own.
//!
//! Lines are prefixed so pipeline diagnostics can be told apart from the host
//! application's logs:
//!
//! ```text
//! DD_REQUEST_LOGS | WARN | REQUEST_LOGS | Queue full (10000 items), dropping oldest event
//! DD_REQUEST_LOGS | DEBUG | flush{batch=3}: REQUEST_LOGS | Delivered batch ...
//! ```

use std::env;
use std::fmt;

use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "DD_REQUEST_LOGS | {} | ", metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Filter directives for the given verbosity, honoring `DD_LOG_LEVEL`.
fn filter_directives(debug: bool) -> String {
    let log_level = env::var("DD_LOG_LEVEL")
        .ok()
        .map(|level| level.trim().to_lowercase())
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| if debug { "debug" } else { "info" }.to_string());
    format!("h2=off,hyper=off,rustls=off,{log_level}")
}

/// Installs a global subscriber writing pipeline logs to stdout.
///
/// Fails, without panicking, if the level is unparsable or a global subscriber
/// is already set.
pub fn init(debug: bool) -> Result<(), PipelineError> {
    let env_filter = EnvFilter::try_new(filter_directives(debug))
        .map_err(|e| PipelineError::Configuration(format!("Invalid log level: {e}")))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .event_format(Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        PipelineError::Configuration(format!("Unable to install log subscriber: {e}"))
    })?;

    tracing::debug!("REQUEST_LOGS | Logging subsystem enabled");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn output(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture<F: FnOnce()>(f: F) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .event_format(Formatter)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        capture.output()
    }

    #[test]
    fn test_format_prefix_and_level() {
        let output = capture(|| tracing::warn!("REQUEST_LOGS | Queue full"));
        assert_eq!(output, "DD_REQUEST_LOGS | WARN | REQUEST_LOGS | Queue full\n");
    }

    #[test]
    fn test_format_includes_fields() {
        let output = capture(|| tracing::info!(count = 3, "Flushing"));
        assert_eq!(output, "DD_REQUEST_LOGS | INFO | Flushing count=3\n");
    }

    #[test]
    fn test_format_includes_spans() {
        let output = capture(|| {
            let span = tracing::debug_span!("flush", batch = 7);
            let _guard = span.enter();
            tracing::debug!("sending");
        });
        assert_eq!(output, "DD_REQUEST_LOGS | DEBUG | flush{batch=7}: sending\n");
    }

    #[test]
    #[serial]
    fn test_filter_directives() {
        env::remove_var("DD_LOG_LEVEL");
        assert_eq!(filter_directives(false), "h2=off,hyper=off,rustls=off,info");
        assert_eq!(filter_directives(true), "h2=off,hyper=off,rustls=off,debug");

        env::set_var("DD_LOG_LEVEL", "WARN");
        assert_eq!(filter_directives(true), "h2=off,hyper=off,rustls=off,warn");
        env::remove_var("DD_LOG_LEVEL");
    }
}
