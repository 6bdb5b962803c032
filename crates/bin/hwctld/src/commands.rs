//! Line commands read by the daemon.
//!
//! ```text
//! on <device> <channel> <value>
//! off <device> <channel>
//! reset <device> <channel>
//! pulse <device> <channel> [ms]
//! status <device>
//! zone <device> <channel>
//! quit
//! ```

use std::str::FromStr;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    On {
        device: String,
        channel: usize,
        value: f64,
    },
    Off {
        device: String,
        channel: usize,
    },
    Reset {
        device: String,
        channel: usize,
    },
    Pulse {
        device: String,
        channel: usize,
        ms: Option<u64>,
    },
    Status {
        device: String,
    },
    Zone {
        device: String,
        channel: usize,
    },
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {name} {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("unexpected argument {0:?}")]
    Trailing(String),
}

struct Args<'a> {
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn next(&mut self, name: &'static str) -> Result<&'a str, ParseError> {
        self.words.next().ok_or(ParseError::Missing(name))
    }

    fn parse<T: FromStr>(&mut self, name: &'static str) -> Result<T, ParseError> {
        let word = self.next(name)?;
        word.parse().map_err(|_| ParseError::Invalid {
            name,
            value: word.to_string(),
        })
    }

    fn parse_opt<T: FromStr>(&mut self, name: &'static str) -> Result<Option<T>, ParseError> {
        match self.words.next() {
            None => Ok(None),
            Some(word) => word.parse().map(Some).map_err(|_| ParseError::Invalid {
                name,
                value: word.to_string(),
            }),
        }
    }

    fn device(&mut self) -> Result<String, ParseError> {
        self.next("device").map(str::to_string)
    }

    fn finish(mut self) -> Result<(), ParseError> {
        match self.words.next() {
            None => Ok(()),
            Some(word) => Err(ParseError::Trailing(word.to_string())),
        }
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ParseError::Empty)?;
        let mut args = Args { words };

        let command = match verb {
            "on" => Self::On {
                device: args.device()?,
                channel: args.parse("channel")?,
                value: args.parse("value")?,
            },
            "off" => Self::Off {
                device: args.device()?,
                channel: args.parse("channel")?,
            },
            "reset" => Self::Reset {
                device: args.device()?,
                channel: args.parse("channel")?,
            },
            "pulse" => Self::Pulse {
                device: args.device()?,
                channel: args.parse("channel")?,
                ms: args.parse_opt("duration")?,
            },
            "status" => Self::Status {
                device: args.device()?,
            },
            "zone" => Self::Zone {
                device: args.device()?,
                channel: args.parse("channel")?,
            },
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        args.finish()?;
        Ok(command)
    }
}
