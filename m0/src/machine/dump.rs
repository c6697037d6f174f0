use std::fmt;

use super::Machine;
use crate::Address;

/// Diagnostic listing of the live registers, the code zone, the heap and the functor table.
pub struct Dump<'a>(&'a Machine);

fn write_section<T>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    entries: impl IntoIterator<Item = T>,
    mut write_entry: impl FnMut(&mut fmt::Formatter<'_>, T) -> fmt::Result,
) -> fmt::Result {
    writeln!(f, "{title}:")?;

    let mut is_empty = true;

    for entry in entries {
        is_empty = false;
        f.write_str("  ")?;
        write_entry(f, entry)?;
        f.write_str("\n")?;
    }

    if is_empty {
        writeln!(f, "  (empty)")?;
    }

    Ok(())
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let machine = self.0;
        let functors = &machine.functors;

        write_section(f, "registers", machine.registers.live(), |f, (xn, address)| {
            write!(f, "{xn} = {address}")
        })?;

        write_section(f, "code", (0..).zip(&machine.code), |f, (pc, instruction)| {
            write!(f, "{} {}", Address(pc), instruction.display(functors))
        })?;

        write_section(f, "heap", (0..).zip(machine.memory.cells()), |f, (address, cell)| {
            write!(f, "{} {}", Address(address), cell.display(functors))
        })?;

        write_section(f, "functors", functors.iter(), |f, (functor, name, arity)| {
            write!(f, "{functor} {name}/{arity}")
        })
    }
}

impl Machine {
    pub fn dump(&self) -> String {
        Dump(self).to_string()
    }
}
