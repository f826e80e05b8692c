use tracing_subscriber::EnvFilter;

/// Filter directives for the bridge, e.g. `EXO_BRIDGE_LOG=webview_exo_wasm=debug`.
pub const LOG_ENV: &str = "EXO_BRIDGE_LOG";

pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(not(target_arch = "wasm32"))]
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    // No clock and no stdout inside the page: lines go to the browser console.
    #[cfg(target_arch = "wasm32")]
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .without_time()
        .with_writer(console::ConsoleWriter)
        .try_init();
}

#[cfg(target_arch = "wasm32")]
mod console {
    use std::io;
    use tracing_subscriber::fmt::MakeWriter;

    pub struct ConsoleWriter;

    pub struct ConsoleLine(Vec<u8>);

    impl<'a> MakeWriter<'a> for ConsoleWriter {
        type Writer = ConsoleLine;

        fn make_writer(&'a self) -> Self::Writer {
            ConsoleLine(Vec::new())
        }
    }

    impl io::Write for ConsoleLine {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for ConsoleLine {
        fn drop(&mut self) {
            if self.0.is_empty() {
                return;
            }
            let line = String::from_utf8_lossy(&self.0);
            web_sys::console::log_1(&line.trim_end().into());
        }
    }
}
