use std::{fmt, io::Stdout};

use anyhow::Context;
use arcstr::ArcStr;
use clap::Parser;
use crossterm::{
    style::{Print, Stylize},
    ExecutableCommand, QueueableCommand,
};

use m0::{Capacities, Machine, Term};

mod parser;

struct Answer {
    unified: bool,
    bindings: Vec<(ArcStr, Term)>,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.unified {
            return fmt::Display::fmt(&"false".bold(), f);
        }

        let printed_answers_count =
            self.bindings
                .iter()
                .try_fold(0, |printed_answers_count, (name, term)| {
                    if matches!(term, Term::Variable { name: bound } if bound == name) {
                        return Ok(printed_answers_count);
                    }

                    if printed_answers_count > 0 {
                        writeln!(f, ",")?;
                    }

                    write!(f, "{name} = {term}").map(|()| printed_answers_count + 1)
                })?;

        match printed_answers_count {
            0 => fmt::Display::fmt(&"true".bold(), f),
            _ => Ok(()),
        }
    }
}

struct EndOfLine;

impl fmt::Display for EndOfLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)
    }
}

struct PrintLn<T>(T);

impl<T: fmt::Display> crossterm::Command for PrintLn<T> {
    fn write_ansi(&self, f: &mut impl fmt::Write) -> fmt::Result {
        Print(&self.0).write_ansi(f)?;
        Print(EndOfLine).write_ansi(f)
    }

    #[cfg(windows)]
    fn execute_winapi(&self) -> crossterm::Result<()> {
        Print(&self.0).execute_winapi()?;
        Print(EndOfLine).execute_winapi()
    }

    #[cfg(windows)]
    fn is_ansi_code_supported(&self) -> bool {
        Print(&self.0).is_ansi_code_supported()
    }
}

/// Unify a query term with a program term on an M0 machine.
///
/// With no terms given, read query and program pairs interactively.
#[derive(Parser)]
struct Cli {
    /// The query term, built on the heap first
    query: Option<String>,

    /// The program term, matched against the query
    program: Option<String>,

    /// Print the compiled instructions before running them
    #[arg(short, long)]
    listing: bool,

    /// Print the registers, code, heap and functors after each run
    #[arg(short, long)]
    dump: bool,

    /// Number of argument registers
    #[arg(long, default_value_t = Capacities::default().registers)]
    registers: usize,

    /// Number of instructions the code zone holds
    #[arg(long, default_value_t = Capacities::default().code)]
    code: usize,

    /// Number of heap cells
    #[arg(long, default_value_t = Capacities::default().heap)]
    heap: usize,

    /// Number of distinct functors
    #[arg(long, default_value_t = Capacities::default().functors)]
    functors: usize,
}

struct Options {
    listing: bool,
    dump: bool,
}

/// Parse a term, reporting any syntax error to stderr.
fn parse_term(id: &str, source: &str) -> anyhow::Result<Option<Term>> {
    match parser::parse(source) {
        Ok(term) => Ok(Some(term)),
        Err(error) => {
            log::debug!("{error}");
            error.write_report(id, source, std::io::stderr())?;
            Ok(None)
        }
    }
}

fn run_pair(
    stdout: &mut Stdout,
    machine: &mut Machine,
    options: &Options,
    query: &Term,
    program: &Term,
) -> anyhow::Result<()> {
    machine.reset();

    log::info!("Unifying {query} with {program}");

    let query = machine
        .compile_query(query)
        .context("Failed to compile query")?;
    let program = machine
        .compile_program(program)
        .context("Failed to compile program")?;

    if options.listing {
        stdout
            .queue(PrintLn("% query"))?
            .queue(Print(query.display(machine.functors())))?
            .queue(PrintLn("% program"))?
            .queue(Print(program.display(machine.functors())))?;
    }

    let unified = machine.run(&query, &program)?;

    let bindings = if unified {
        machine.bindings()?
    } else {
        Vec::new()
    };

    stdout
        .queue(Print(Answer { unified, bindings }))?
        .queue(PrintLn('.'))?;

    if options.dump {
        stdout.queue(Print(machine.dump()))?;
    }

    std::io::Write::flush(stdout)?;

    Ok(())
}

/// Read a non-blank line, or `None` at the end of input.
fn read_term_line(stdout: &mut Stdout, prompt: &str) -> anyhow::Result<Option<String>> {
    loop {
        stdout.execute(Print(prompt))?;

        let mut line = String::new();

        if std::io::stdin().read_line(&mut line)? == 0 {
            stdout.execute(Print(EndOfLine))?;
            return Ok(None);
        }

        let line = line.trim();

        if !line.is_empty() {
            return Ok(Some(line.to_string()));
        }
    }
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let Cli {
        query,
        program,
        listing,
        dump,
        registers,
        code,
        heap,
        functors,
    } = Cli::parse();

    let mut stdout = std::io::stdout();
    let options = Options { listing, dump };

    let mut machine = Machine::with_capacities(Capacities {
        registers,
        code,
        heap,
        functors,
    });

    match (query, program) {
        (Some(query_source), Some(program_source)) => {
            let query = parse_term("query", &query_source)?;
            let program = parse_term("program", &program_source)?;

            let (Some(query), Some(program)) = (query, program) else {
                anyhow::bail!("Invalid term");
            };

            run_pair(&mut stdout, &mut machine, &options, &query, &program)
        }
        (Some(_), None) => anyhow::bail!("A query needs a program to unify with"),
        (None, _) => loop {
            let Some(query_source) = read_term_line(&mut stdout, "?- ")? else {
                return Ok(());
            };

            let Some(query) = parse_term("query", &query_source)? else {
                continue;
            };

            let Some(program_source) = read_term_line(&mut stdout, ":- ")? else {
                return Ok(());
            };

            let Some(program) = parse_term("program", &program_source)? else {
                continue;
            };

            if let Err(error) = run_pair(&mut stdout, &mut machine, &options, &query, &program) {
                match error.downcast_ref::<m0::CompileError>() {
                    Some(_) => {
                        stdout.execute(PrintLn(format_args!("{error:#}")))?;
                    }
                    None => return Err(error),
                }
            }
        },
    }
}
