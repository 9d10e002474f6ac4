//! Line grammar of the step-pattern language, as `nom` combinators.
//!
//! Parsing only checks shape. Names, generators and value counts are
//! resolved by [`crate::pattern`].

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, space0, space1},
    combinator::{all_consuming, cut, map, opt},
    multi::{many0, many1, separated_list1},
    number::complete::float,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

/// `name;param=value;...`
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EventSyntax<'a> {
    pub name: &'a str,
    pub params: Vec<(&'a str, f32)>,
}

impl EventSyntax<'_> {
    pub fn is_rest(&self) -> bool {
        self.name == "~"
    }
}

/// `@param: gen >> v1 v2 ...`; the generator is optional.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SeqSyntax<'a> {
    pub param: &'a str,
    pub generator: Option<&'a str>,
    pub values: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Line<'a> {
    Let {
        name: &'a str,
        event: EventSyntax<'a>,
    },
    Lane {
        generator: Option<&'a str>,
        steps: Vec<EventSyntax<'a>>,
        params: Vec<SeqSyntax<'a>>,
    },
    /// Sequences for the lane above.
    Params(Vec<SeqSyntax<'a>>),
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn param_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)
}

fn arrow(input: &str) -> IResult<&str, &str> {
    delimited(space0, tag(">>"), space0)(input)
}

/// `gen >>`
fn generator(input: &str) -> IResult<&str, &str> {
    terminated(ident, arrow)(input)
}

fn assignment(input: &str) -> IResult<&str, (&str, f32)> {
    separated_pair(
        take_while1(|c: char| c != '=' && c != ';' && !c.is_whitespace()),
        char('='),
        float,
    )(input)
}

fn event(input: &str) -> IResult<&str, EventSyntax<'_>> {
    map(
        pair(
            take_while1(|c: char| !c.is_whitespace() && c != ';' && c != '@'),
            many0(preceded(char(';'), assignment)),
        ),
        |(name, params)| EventSyntax { name, params },
    )(input)
}

fn sequence(input: &str) -> IResult<&str, SeqSyntax<'_>> {
    map(
        preceded(
            char('@'),
            cut(tuple((
                param_name,
                opt(preceded(space0, char(':'))),
                space0,
                opt(generator),
                separated_list1(space1, float),
            ))),
        ),
        |(param, _, _, generator, values)| SeqSyntax {
            param,
            generator,
            values,
        },
    )(input)
}

fn sequences(input: &str) -> IResult<&str, Vec<SeqSyntax<'_>>> {
    many1(preceded(space0, sequence))(input)
}

fn let_line(input: &str) -> IResult<&str, Line<'_>> {
    map(
        preceded(
            pair(tag("let"), space1),
            cut(separated_pair(ident, delimited(space0, char('='), space0), event)),
        ),
        |(name, event)| Line::Let { name, event },
    )(input)
}

fn lane_line(input: &str) -> IResult<&str, Line<'_>> {
    map(
        tuple((
            opt(generator),
            separated_list1(space1, event),
            many0(preceded(space0, sequence)),
        )),
        |(generator, steps, params)| Line::Lane {
            generator,
            steps,
            params,
        },
    )(input)
}

/// Parse one trimmed, comment-free, non-empty line.
pub(crate) fn line(input: &str) -> Result<Line<'_>, String> {
    let parsed = all_consuming(terminated(
        alt((let_line, map(sequences, Line::Params), lane_line)),
        space0,
    ))(input);
    match parsed {
        Ok((_, line)) => Ok(line),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) if e.input.is_empty() => {
            Err("unexpected end of line".into())
        }
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(format!("unexpected `{}`", e.input))
        }
        Err(nom::Err::Incomplete(_)) => Err("incomplete line".into()),
    }
}
