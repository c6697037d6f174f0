use std::ops::Range;

use arcstr::ArcStr;
use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use chumsky::{error::SimpleReason, prelude::*, text::whitespace};
use itertools::Itertools;

use m0::{Term, TermList};

type ParseError = Simple<char>;

/// The earliest point at which the source stops being a term.
#[derive(Debug, thiserror::Error)]
#[error("Syntax error at {position}: {message}")]
pub struct SyntaxError {
    pub position: usize,
    message: String,
    span: Range<usize>,
    found: Option<char>,
    unclosed: Option<(Range<usize>, char)>,
}

impl SyntaxError {
    fn new(error: ParseError) -> Self {
        let message = if let SimpleReason::Custom(message) = error.reason() {
            message.clone()
        } else {
            format!(
                "{}{}, expected {}",
                if error.found().is_some() {
                    "Unexpected token"
                } else {
                    "Unexpected end of input"
                },
                if let Some(label) = error.label() {
                    format!(" while parsing {label}")
                } else {
                    String::new()
                },
                if error.expected().len() == 0 {
                    "something else".to_string()
                } else {
                    error
                        .expected()
                        .map(|expected| match expected {
                            Some(expected) => format!("'{expected}'"),
                            None => "end of input".to_string(),
                        })
                        .sorted()
                        .join(", ")
                },
            )
        };

        let unclosed = match error.reason() {
            SimpleReason::Unclosed { span, delimiter } => Some((span.clone(), *delimiter)),
            SimpleReason::Unexpected | SimpleReason::Custom(_) => None,
        };

        Self {
            position: error.span().start,
            message,
            span: error.span(),
            found: error.found().copied(),
            unclosed,
        }
    }

    fn from_errors(errors: Vec<ParseError>) -> Self {
        errors
            .into_iter()
            .min_by_key(|error| error.span().start)
            .map(Self::new)
            .unwrap_or_else(|| Self {
                position: 0,
                message: "Not a term".to_string(),
                span: 0..0,
                found: None,
                unclosed: None,
            })
    }

    /// Render the error against its source with the offending span highlighted.
    pub fn write_report(&self, id: &str, source: &str, w: impl std::io::Write) -> std::io::Result<()> {
        let report = Report::build(ReportKind::Error, id, self.position)
            .with_message(&self.message)
            .with_label(
                Label::new((id, self.span.clone()))
                    .with_message(format!(
                        "Unexpected {}",
                        self.found
                            .map(|c| format!("token {}", c.fg(Color::Red)))
                            .unwrap_or_else(|| "end of input".to_string())
                    ))
                    .with_color(Color::Red),
            );

        let report = match &self.unclosed {
            Some((span, delimiter)) => report.with_label(
                Label::new((id, span.clone()))
                    .with_message(format!("Unclosed delimiter {}", delimiter.fg(Color::Yellow)))
                    .with_color(Color::Yellow),
            ),
            None => report,
        };

        report.finish().write((id, Source::from(source)), w)
    }
}

fn lowercase(c: &char) -> bool {
    c.is_ascii_lowercase()
}

fn variable_start(c: &char) -> bool {
    c.is_ascii_uppercase() || *c == '_'
}

fn ident(c: &char) -> bool {
    c.is_ascii_alphanumeric() || *c == '_'
}

fn name() -> impl Parser<char, ArcStr, Error = ParseError> + Clone {
    filter(lowercase)
        .chain(filter(ident).repeated())
        .collect::<String>()
        .map(ArcStr::from)
        .labelled("name")
}

fn variable() -> impl Parser<char, Term, Error = ParseError> + Clone {
    filter(variable_start)
        .chain(filter(ident).repeated())
        .collect::<String>()
        .map(|name| Term::Variable {
            name: ArcStr::from(name),
        })
        .labelled("variable")
}

fn term() -> impl Parser<char, Term, Error = ParseError> {
    recursive(|term| {
        let arguments = term
            .separated_by(just(',').padded())
            .at_least(1)
            .padded()
            .delimited_by(just('('), just(')'));

        let structure = name()
            .then_ignore(whitespace())
            .then(arguments.or_not())
            .map(|(name, terms)| match terms {
                Some(terms) => Term::Structure {
                    name,
                    terms: TermList::from(terms),
                },
                None => Term::Atom { name },
            })
            .labelled("structure");

        variable().or(structure)
    })
}

/// Parse a single term, surrounded by optional whitespace.
///
/// An atom is written as a bare name. A structure must have at least one argument, so `f()` is rejected.
pub fn parse(source: &str) -> Result<Term, SyntaxError> {
    term()
        .padded()
        .then_ignore(end())
        .parse(source)
        .map_err(SyntaxError::from_errors)
}
