pub mod server;

/// Actions the CLI can dispatch to.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        /// Absent means in-memory stores (single-process mode).
        dsn: Option<String>,
        cors_origin: Option<String>,
        cookie_secure: bool,
    },
}
