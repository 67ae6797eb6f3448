//! Textual path grammar.
//!
//! A compact way to write a set of paths that share prefixes:
//!
//! ```text
//! paths   := chain | list
//! list    := '[' chain (',' chain)* ']'
//! chain   := term ('.' term)*
//! term    := segment | list
//! segment := name ( '(' name ')' )?
//! ```
//!
//! A chain denotes the cartesian product of its terms, so
//! `[pet, partner.[pet, owners]]` expands to
//! `[["pet"], ["partner", "pet"], ["partner", "owners"]]`.
//! Whitespace between tokens is ignored. The empty string (and a top-level
//! `[]`) denotes the empty path set; an empty group anywhere else is an error.
//!
//! The array-of-paths form (`Vec<Path>`) is canonical; this syntax is sugar
//! for CLIs and config files.

use std::collections::BTreeSet;

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char as pchar, multispace0},
    combinator::{all_consuming, map, opt},
    multi::separated_list1,
    sequence::{delimited, pair},
    IResult,
};
use thiserror::Error;

use crate::Path;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("unbalanced brackets at offset {offset}")]
    UnbalancedBrackets { offset: usize },
    #[error("invalid path expression `{input}` (expected e.g. `[pet, partner.[pet, owners]]`)")]
    Syntax { input: String },
}

type Alternatives = Vec<Vec<String>>;

/// Parse a path expression into its list of paths, in first-seen order with
/// duplicates removed.
pub fn parse_paths(text: &str) -> Result<Vec<Path>, PathParseError> {
    check_brackets(text)?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let empty = map(pair(token('['), token(']')), |_| Vec::new());
    let (_, alternatives) = all_consuming(delimited(multispace0, alt((empty, chain)), multispace0))(text)
        .map_err(|_| PathParseError::Syntax {
            input: text.trim().to_string(),
        })?;

    let mut seen = BTreeSet::new();
    Ok(alternatives
        .into_iter()
        .filter(|segments| seen.insert(segments.clone()))
        .map(Path::from)
        .collect())
}

/// Render paths in the canonical `[a.b, c]` form accepted by `parse_paths`.
pub fn format_paths(paths: &[Path]) -> String {
    let body = paths
        .iter()
        .map(Path::dotted)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{body}]")
}

fn check_brackets(text: &str) -> Result<(), PathParseError> {
    let mut open = Vec::new();
    for (offset, ch) in text.char_indices() {
        match ch {
            '[' => open.push(offset),
            ']' => {
                if open.pop().is_none() {
                    return Err(PathParseError::UnbalancedBrackets { offset });
                }
            }
            _ => {}
        }
    }

    match open.pop() {
        Some(offset) => Err(PathParseError::UnbalancedBrackets { offset }),
        None => Ok(()),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '$')
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char)(input)
}

fn token<'a>(c: char) -> impl FnMut(&'a str) -> IResult<&'a str, char> {
    delimited(multispace0, pchar(c), multispace0)
}

fn segment(input: &str) -> IResult<&str, String> {
    let (input, relation) = name(input)?;
    let (input, variant) = opt(delimited(token('('), name, token(')')))(input)?;
    let segment = match variant {
        Some(tag) => format!("{relation}({tag})"),
        None => relation.to_string(),
    };
    Ok((input, segment))
}

fn term(input: &str) -> IResult<&str, Alternatives> {
    alt((list, map(segment, |s| vec![vec![s]])))(input)
}

fn list(input: &str) -> IResult<&str, Alternatives> {
    let (input, chains) =
        delimited(token('['), separated_list1(token(','), chain), token(']'))(input)?;
    Ok((input, chains.into_iter().flatten().collect()))
}

fn chain(input: &str) -> IResult<&str, Alternatives> {
    let (input, terms) = separated_list1(token('.'), term)(input)?;
    Ok((input, product(terms)))
}

fn product(terms: Vec<Alternatives>) -> Alternatives {
    terms.into_iter().fold(vec![Vec::new()], |prefixes, alternatives| {
        prefixes
            .iter()
            .flat_map(|prefix| {
                alternatives.iter().map(move |tail| {
                    let mut joined = prefix.clone();
                    joined.extend(tail.iter().cloned());
                    joined
                })
            })
            .collect()
    })
}
