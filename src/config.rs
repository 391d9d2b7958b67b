use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::error::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Colombo;
const DEFAULT_EVENT_BUFFER: usize = 1024;

#[derive(Clone, Debug)]
pub struct Config {
    /// No URL means state is kept in process memory.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub listen_addr: SocketAddr,
    /// Zone whose calendar days bound every rider's daily ride budget.
    pub timezone: Tz,
    pub event_buffer: usize,
    pub daily_reset: bool,
}

impl Config {
    /// Reads `RIDEBID_*` variables, after loading `.env` when one exists.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("RIDEBID_DATABASE_URL").filter(|url| !url.trim().is_empty());

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "RIDEBID_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            listen_addr: match lookup("RIDEBID_LISTEN_ADDR") {
                Some(value) => parse("RIDEBID_LISTEN_ADDR", &value)?,
                None => parse("RIDEBID_LISTEN_ADDR", DEFAULT_LISTEN_ADDR)?,
            },
            timezone: match lookup("RIDEBID_TIMEZONE") {
                Some(value) => value
                    .parse::<Tz>()
                    .map_err(|err| Error::Config(format!("RIDEBID_TIMEZONE: {}", err)))?,
                None => DEFAULT_TIMEZONE,
            },
            event_buffer: parse_or(&lookup, "RIDEBID_EVENT_BUFFER", DEFAULT_EVENT_BUFFER)?,
            daily_reset: parse_or(&lookup, "RIDEBID_DAILY_RESET", true)?,
        })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| Error::Config(format!("{}: {}", key, err)))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => parse(key, &value),
        None => Ok(default),
    }
}
