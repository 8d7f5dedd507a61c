use crate::types::Value;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, one_of, satisfy},
    combinator::{map, map_res, not, opt, recognize, verify},
    error::{Error, ErrorKind},
    sequence::{delimited, pair, terminated, tuple},
    IResult,
};

/// Words that terminate identifiers, aliases and bareword literals
pub const KEYWORDS: &[&str] = &[
    "SELECT", "DISTINCT", "FROM", "WHERE", "GROUP", "BY", "HAVING", "ORDER", "LIMIT",
    "OFFSET", "AND", "OR", "NOT", "AS", "IS", "NULL", "BETWEEN", "LIKE", "ASC", "DESC",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that must not run into a following word character
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(satisfy(is_word_char)))
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(is_word_char),
    ))(input)
}

fn bare_identifier(input: &str) -> IResult<&str, String> {
    map(verify(word, |w: &str| !is_keyword(w)), str::to_string)(input)
}

/// Double-quoted name; `""` inside stands for one quote
pub fn quoted_identifier(input: &str) -> IResult<&str, String> {
    quoted('"')(input)
}

pub fn identifier(input: &str) -> IResult<&str, String> {
    alt((quoted_identifier, bare_identifier))(input)
}

/// Table names admit path characters: `./data/sample`, `sample-2008`
pub fn table_name(input: &str) -> IResult<&str, String> {
    alt((
        quoted_identifier,
        map(
            verify(
                take_while1(|c: char| is_word_char(c) || matches!(c, '.' | '-' | '/' | '\\')),
                |w: &str| !is_keyword(w),
            ),
            str::to_string,
        ),
    ))(input)
}

pub fn string_literal(input: &str) -> IResult<&str, String> {
    quoted('\'')(input)
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    move |input: &'a str| {
        let (mut rest, _) = char(quote)(input)?;
        let mut out = String::new();
        loop {
            let Some(end) = rest.find(quote) else {
                return Err(nom::Err::Error(Error::new(input, ErrorKind::Char)));
            };
            out.push_str(&rest[..end]);
            let after = &rest[end + quote.len_utf8()..];
            if let Some(escaped) = after.strip_prefix(quote) {
                out.push(quote);
                rest = escaped;
            } else {
                return Ok((after, out));
            }
        }
    }
}

pub fn number_literal(input: &str) -> IResult<&str, Value> {
    map_res(
        terminated(
            recognize(tuple((
                opt(char('-')),
                digit1,
                opt(pair(char('.'), digit1)),
                opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
            ))),
            not(satisfy(is_word_char)),
        ),
        |s: &str| {
            if s.contains(['.', 'e', 'E']) {
                s.parse::<f64>().map(Value::Double).map_err(|e| e.to_string())
            } else {
                s.parse::<i64>().map(Value::Integer).map_err(|e| e.to_string())
            }
        },
    )(input)
}

pub fn literal(input: &str) -> IResult<&str, Value> {
    alt((
        map(string_literal, Value::Text),
        number_literal,
        map(keyword("NULL"), |_| Value::Null),
    ))(input)
}

/// Unquoted words on the right of `=`, read up to the next keyword:
/// `WHERE Job = Project Manager` compares against the text "Project Manager"
pub fn bareword(input: &str) -> IResult<&str, Value> {
    let (mut rest, _) = verify(word, |w: &str| !is_keyword(w))(input)?;
    let mut end = input.len() - rest.len();
    loop {
        let next = pair(
            take_while1(|c: char| c == ' ' || c == '\t'),
            verify(word, |w: &str| !is_keyword(w)),
        )(rest);
        match next {
            Ok((after, _)) => {
                rest = after;
                end = input.len() - rest.len();
            }
            Err(_) => break,
        }
    }
    // A bareword must not be the start of a qualified name or an expression
    if rest.starts_with(['.', '(', '+']) {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Verify)));
    }
    Ok((rest, Value::Text(input[..end].to_string())))
}

pub fn usize_literal(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}

pub fn comparison_operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag("<="),
        tag(">="),
        tag("<>"),
        tag("="),
        tag("<"),
        tag(">"),
    ))(input)
}
