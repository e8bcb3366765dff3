#![allow(clippy::module_name_repetitions)]

//! Operator command grammar.
//!
//! The front-end's input line accepts a handful of short commands. Keywords
//! are matched case-insensitively with `winnow`; numeric arguments are kept as
//! raw text so a malformed number surfaces as the matching [`InputError`]
//! instead of a syntax error, and the stored setting stays untouched.

use core::fmt;

use winnow::ascii::{Caseless, multispace1};
use winnow::combinator::{alt, eof};
use winnow::error::ContextError;
use winnow::prelude::*;

use crate::channel::{ChannelId, InputError, validate_pulse_width, validate_target};

/// Help lines shown by the front-end, one per command.
pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("target", "target <1|2> <watts>  - set the power target of a channel"),
    ("width", "width <ms>            - set the flash width (1-1000 ms)"),
    ("start", "start                 - begin pulsing both channels"),
    ("stop", "stop                  - stop pulsing and reset the rates"),
    ("status", "status                - show targets, width, and run state"),
    ("help", "help                  - list commands"),
    ("quit", "quit | exit           - stop and leave the tester"),
];

/// Parsed operator command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command<'a> {
    SetTarget { channel: ChannelId, watts: &'a str },
    SetPulseWidth { width_ms: &'a str },
    Start,
    Stop,
    Status,
    Help,
    Quit,
}

/// Reasons a command line could not be understood.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandError {
    UnknownCommand,
    UnknownChannel,
    MissingArgument(&'static str),
    TrailingInput,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownCommand => f.write_str("unknown command (try `help`)"),
            CommandError::UnknownChannel => f.write_str("channel must be 1 or 2"),
            CommandError::MissingArgument(name) => write!(f, "missing <{name}>"),
            CommandError::TrailingInput => f.write_str("unexpected extra input"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Keyword {
    Target,
    Width,
    Start,
    Stop,
    Status,
    Help,
    Quit,
}

fn keyword<'a>() -> impl Parser<&'a str, Keyword, ContextError> {
    move |input: &mut &'a str| {
        let keyword = alt((
            Caseless("target").value(Keyword::Target),
            Caseless("width").value(Keyword::Width),
            Caseless("start").value(Keyword::Start),
            Caseless("stop").value(Keyword::Stop),
            Caseless("status").value(Keyword::Status),
            Caseless("help").value(Keyword::Help),
            Caseless("quit").value(Keyword::Quit),
            Caseless("exit").value(Keyword::Quit),
        ))
        .parse_next(input)?;

        alt((multispace1.void(), eof.void())).parse_next(input)?;
        Ok(keyword)
    }
}

/// Parses one input line.
pub fn parse_command(line: &str) -> Result<Command<'_>, CommandError> {
    let mut input = line.trim();
    let keyword = keyword()
        .parse_next(&mut input)
        .map_err(|_| CommandError::UnknownCommand)?;

    let mut args = input.split_whitespace();
    let command = match keyword {
        Keyword::Target => {
            let channel = args
                .next()
                .ok_or(CommandError::MissingArgument("channel"))?
                .parse::<u8>()
                .ok()
                .and_then(ChannelId::from_number)
                .ok_or(CommandError::UnknownChannel)?;
            let watts = args.next().ok_or(CommandError::MissingArgument("watts"))?;
            Command::SetTarget { channel, watts }
        }
        Keyword::Width => {
            let width_ms = args.next().ok_or(CommandError::MissingArgument("ms"))?;
            Command::SetPulseWidth { width_ms }
        }
        Keyword::Start => Command::Start,
        Keyword::Stop => Command::Stop,
        Keyword::Status => Command::Status,
        Keyword::Help => Command::Help,
        Keyword::Quit => Command::Quit,
    };

    if args.next().is_some() {
        return Err(CommandError::TrailingInput);
    }
    Ok(command)
}

/// Parses and validates a target power entered as text.
pub fn parse_watts(text: &str) -> Result<f64, InputError> {
    let watts = text
        .trim()
        .parse::<f64>()
        .map_err(|_| InputError::InvalidTarget)?;
    validate_target(watts)
}

/// Parses and validates a pulse width entered as text.
pub fn parse_pulse_width(text: &str) -> Result<u16, InputError> {
    let width = text
        .trim()
        .parse::<i64>()
        .map_err(|_| InputError::InvalidPulseWidth)?;
    validate_pulse_width(width)
}
