//! Structured logging setup. The default mode is a human-readable format on
//! stderr; `--syslog` drops timestamps and writes to stdout, matching the
//! unbuffered, timestamp-less style expected when a process supervisor
//! already timestamps each line.

pub fn init(syslog_mode: bool) {
    if syslog_mode {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .with_writer(std::io::stdout)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
