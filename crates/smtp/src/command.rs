use std::str::FromStr;

use nom::{
    bytes::complete::tag_no_case,
    character::complete::{char, space0, space1},
    combinator::rest,
    IResult,
};

/// One client command, decoded from a single line.
///
/// Dispatch mirrors the wire protocol: `HELO`/`EHLO` match as a prefix of
/// the line, `MAIL`/`RCPT` carry their path argument, and the remaining
/// verbs must make up the whole line. Matching is ASCII-case-insensitive
/// throughout.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Helo,
    Mail { reverse_path: String },
    Rcpt { forward_path: String },
    Data,
    Rset,
    Noop,
    Quit,
}

/// Line did not match any command in the grammar.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized command")]
pub struct Unrecognized;

/// `MAIL FROM : <path>`. The colon is located rather than assumed at a
/// fixed offset, and spaces around it are tolerated.
fn mail_args(i: &str) -> IResult<&str, &str> {
    let (i, _) = tag_no_case("MAIL")(i)?;
    let (i, _) = space1(i)?;
    let (i, _) = tag_no_case("FROM")(i)?;
    let (i, _) = space0(i)?;
    let (i, _) = char(':')(i)?;
    rest(i)
}

/// `RCPT TO : <path>`, same grammar as [`mail_args`].
fn rcpt_args(i: &str) -> IResult<&str, &str> {
    let (i, _) = tag_no_case("RCPT")(i)?;
    let (i, _) = space1(i)?;
    let (i, _) = tag_no_case("TO")(i)?;
    let (i, _) = space0(i)?;
    let (i, _) = char(':')(i)?;
    rest(i)
}

impl FromStr for Command {
    type Err = Unrecognized;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let verb = line.get(..4).unwrap_or("");
        if verb.eq_ignore_ascii_case("HELO") || verb.eq_ignore_ascii_case("EHLO") {
            return Ok(Command::Helo);
        }

        if let Ok((_, path)) = mail_args(line) {
            return Ok(Command::Mail {
                reverse_path: path.trim().to_owned(),
            });
        }

        if let Ok((_, path)) = rcpt_args(line) {
            return Ok(Command::Rcpt {
                forward_path: path.trim().to_owned(),
            });
        }

        match line.trim() {
            l if l.eq_ignore_ascii_case("DATA") => Ok(Command::Data),
            l if l.eq_ignore_ascii_case("RSET") => Ok(Command::Rset),
            l if l.eq_ignore_ascii_case("NOOP") => Ok(Command::Noop),
            l if l.eq_ignore_ascii_case("QUIT") => Ok(Command::Quit),
            _ => Err(Unrecognized),
        }
    }
}
