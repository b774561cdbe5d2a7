//! Configuration surface: the recognised CLI/properties options and their
//! merge precedence.
//!
//! Ordinary glue rather than hard algorithmic work, but its behaviour
//! (merge precedence, `${var}` interpolation, `-check`/`-help`) is part of
//! the external interface and is implemented in full.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::path::Path;

/// Every option name the parser recognises. Anything else is a fatal,
/// unknown option.
const RECOGNISED_OPTIONS: &[&str] = &[
    "url", "user", "password", "threads", "time", "batch", "rate", "load",
    "report", "data", "iterate", "sql", "params", "config", "check", "help",
];

/// An ordered key=value bag (`BTreeMap` for deterministic `-check` output).
/// Also tracks which keys were explicitly set (by a config file or the
/// command line) as opposed to merely carrying their built-in default, so
/// validation can tell "load=95 was typed" from "load=95 because nothing
/// else was said".
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    values: BTreeMap<String, String>,
    explicit: std::collections::BTreeSet<String>,
}

impl PropertyBag {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.explicit.insert(key.clone());
        self.values.insert(key, value.into());
    }

    fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// True if `key` was set by a config file or the command line, as
    /// opposed to only carrying its built-in default.
    pub fn contains_explicit(&self, key: &str) -> bool {
        self.explicit.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn defaults() -> PropertyBag {
        let mut bag = PropertyBag::default();
        bag.set_default("threads", "10");
        bag.set_default("time", "1");
        bag.set_default("batch", "1");
        bag.set_default("load", "95");
        bag.set_default("report", "1");
        bag.set_default("iterate", "false");
        bag.set_default("sql", "SELECT * FROM User.Teams WHERE year < ?{int,1910,2010}");
        bag
    }

    /// Single-pass `${name}` resolution against this bag. Deliberately
    /// non-recursive: a substituted value is never itself re-scanned.
    fn interpolate(&mut self) {
        let snapshot = self.values.clone();
        for value in self.values.values_mut() {
            *value = resolve_vars(value, &snapshot);
        }
    }

    /// Merge a `key=value` / `key:value` properties file, line by line.
    /// `#`-prefixed lines and blank lines are skipped.
    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ConfigFileIo {
            path: path.display().to_string(),
            source,
        })?;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((k, v)) = split_kv(line) {
                self.set(k.trim(), v.trim());
            }
        }
        Ok(())
    }
}

fn split_kv(line: &str) -> Option<(&str, &str)> {
    line.split_once('=').or_else(|| line.split_once(':'))
}

fn resolve_vars(value: &str, bag: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;
    while i < value.len() {
        if value[i..].starts_with("${") {
            if let Some(close) = value[i..].find('}') {
                let name = &value[i + 2..i + close];
                if let Some(resolved) = bag.get(name) {
                    out.push_str(resolved);
                } else {
                    out.push_str(&value[i..i + close + 1]);
                }
                i += close + 1;
                continue;
            }
        }
        let ch = value[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Outcome of parsing the command line: either a resolved bag ready to run,
/// or a request to print something and exit without running the workload.
pub enum ParseOutcome {
    Run(PropertyBag),
    PrintHelp,
    PrintCheck(PropertyBag),
}

/// Parses `-opt[=|]value`, bare `-opt` (=> `true`), `-property name=value`
/// (or `name:value`), `-config path`, `-check`, `-help`.
/// Unknown option names are fatal. The config file (if any) is merged
/// first so the command line always wins on conflict.
pub fn parse_args(args: &[String]) -> Result<ParseOutcome, ConfigError> {
    let mut cli_overrides = PropertyBag::default();
    let mut config_path: Option<String> = None;
    let mut want_check = false;
    let mut want_help = false;

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let Some(stripped) = arg.strip_prefix('-') else {
            i += 1;
            continue;
        };

        if stripped == "check" {
            want_check = true;
            i += 1;
            continue;
        }
        if stripped == "help" {
            want_help = true;
            i += 1;
            continue;
        }
        if stripped == "property" {
            let pair = args
                .get(i + 1)
                .ok_or_else(|| ConfigError::UnknownOption("-property requires an argument".into()))?;
            let (k, v) = split_kv(pair).ok_or_else(|| ConfigError::UnknownOption(pair.clone()))?;
            cli_overrides.set(k.trim(), v.trim());
            i += 2;
            continue;
        }
        if stripped == "config" {
            let path = args
                .get(i + 1)
                .ok_or_else(|| ConfigError::UnknownOption("-config requires a path".into()))?;
            config_path = Some(path.clone());
            i += 2;
            continue;
        }

        let (name, value) = match split_kv(stripped) {
            Some((k, v)) => (k, v.to_string()),
            None => (stripped, "true".to_string()),
        };
        if !RECOGNISED_OPTIONS.contains(&name) {
            return Err(ConfigError::UnknownOption(name.to_string()));
        }
        cli_overrides.set(name, value);
        i += 1;
    }

    if want_help {
        return Ok(ParseOutcome::PrintHelp);
    }

    let mut bag = PropertyBag::defaults();
    if let Some(path) = config_path {
        bag.merge_file(Path::new(&path))?;
    }
    for (k, v) in cli_overrides.iter() {
        bag.set(k, v);
    }
    bag.interpolate();

    if want_check {
        return Ok(ParseOutcome::PrintCheck(bag));
    }
    Ok(ParseOutcome::Run(bag))
}

pub const HELP_TEXT: &str = "\
sqlload - configurable multi-worker SQL load driver

USAGE:
    sqlload -url=<connection-url> -user=<user> -password=<password> [options]

OPTIONS:
    -url=VALUE        database connection string (required)
    -user=VALUE       database user (required)
    -password=VALUE   database password (required)
    -threads=N        worker count (default 10)
    -time=N           run duration in seconds (default 1)
    -batch=N          statements per transaction (default 1)
    -rate=N           target transactions/sec (optional)
    -load=N           target database load percent, 1-100 (default 95)
    -report=N         report period in seconds (default 1)
    -data=PATH        data table file (CSV or whitespace-delimited)
    -iterate=BOOL     iterate SELECT result rows (default false)
    -sql=TEXT         parameterised SQL statement
    -params=SPEC;...  semicolon-separated parameter spec override
    -property k=v     merge an arbitrary key into the property bag
    -config PATH      load a key=value file (command line wins on conflict)
    -check            print the resolved property bag and exit
    -help             print this message and exit
";

/// Fully resolved, validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub user: String,
    pub password: String,
    pub threads: u32,
    pub time_secs: u64,
    pub batch: u32,
    pub rate: Option<f64>,
    pub load: u32,
    pub report_secs: u64,
    pub data_path: Option<String>,
    pub iterate: bool,
    pub sql: String,
    pub params: Option<String>,
    pub bag: PropertyBag,
}

impl Config {
    pub fn from_bag(bag: PropertyBag) -> Result<Config, ConfigError> {
        let url = require(&bag, "url")?;
        let user = require(&bag, "user")?;
        let password = require(&bag, "password")?;

        let threads = parse_num::<u32>(&bag, "threads", 10)?;
        let time_secs = parse_num::<u64>(&bag, "time", 1)?;
        let batch = parse_num::<u32>(&bag, "batch", 1)?;
        let load = parse_num::<u32>(&bag, "load", 95)?;
        let report_secs = parse_num::<u64>(&bag, "report", 1)?;
        let iterate = bag.get("iterate").map(|v| v == "true").unwrap_or(false);
        let rate = match bag.get("rate") {
            Some(v) => Some(v.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
                name: "rate",
                value: v.to_string(),
                reason: "not a number",
            })?),
            None => None,
        };

        let config = Config {
            url,
            user,
            password,
            threads,
            time_secs,
            batch,
            rate,
            load,
            report_secs,
            data_path: bag.get("data").map(str::to_string),
            iterate,
            sql: bag
                .get("sql")
                .map(str::to_string)
                .unwrap_or_else(|| "SELECT * FROM User.Teams WHERE year < ?{int,1910,2010}".to_string()),
            params: bag.get("params").map(str::to_string),
            bag,
        };
        config.validate()?;
        Ok(config)
    }

    /// Startup validation: catches impossible rate/threads/time combinations
    /// and out-of-range load percentages before any connection is opened.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rate) = self.rate {
            if rate <= 0.0 || rate * self.time_secs as f64 < 2.0 * self.threads as f64 {
                return Err(ConfigError::RateTooLow {
                    rate,
                    time: self.time_secs,
                    threads: self.threads,
                });
            }
        }
        if !(1..=100).contains(&self.load) {
            return Err(ConfigError::LoadOutOfRange(self.load));
        }
        if self.rate.is_some() && self.bag.contains_explicit("load") {
            tracing::warn!("both rate and load are set; load is ignored");
        }
        Ok(())
    }
}

fn require(bag: &PropertyBag, name: &'static str) -> Result<String, ConfigError> {
    bag.get(name).map(str::to_string).ok_or(ConfigError::MissingRequired(name))
}

fn parse_num<T: std::str::FromStr>(bag: &PropertyBag, name: &'static str, default: T) -> Result<T, ConfigError> {
    match bag.get(name) {
        Some(v) => v.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name,
            value: v.to_string(),
            reason: "not a valid number",
        }),
        None => Ok(default),
    }
}
