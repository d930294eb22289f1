use crate::cli::actions::Action;
use anyhow::Result;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one::<String>("dsn")
            .map(ToString::to_string),
        cors_origin: matches
            .get_one::<String>("cors-origin")
            .map(ToString::to_string),
        cookie_secure: !matches.get_flag("cookie-insecure"),
    })
}
