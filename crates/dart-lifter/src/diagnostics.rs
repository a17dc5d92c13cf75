//! Structured analysis diagnostics. This is data, not a side-effecting log
//! call — the teacher workspace has no logging crate dependency anywhere;
//! it reports problems as typed `Diagnostic`/`LintDiagnostic` values and
//! lets the CLI decide how to render them (`termcolor`, matching
//! `raya-cli`'s colored output). See `SPEC_FULL.md` §10.

use crate::asm_text::AsmText;

/// A non-fatal-to-the-run analysis problem: a function was abandoned
/// because a pattern handler raised [`crate::error::InsnException`] or
/// [`crate::error::FatalAnalysis`].
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub function_name: String,
    pub address: u64,
    pub message: String,
    pub raised_at: String,
    pub context: Vec<AsmText>,
}

impl Diagnostic {
    pub fn new(function_name: impl Into<String>, address: u64, message: impl Into<String>, raised_at: impl Into<String>) -> Self {
        Diagnostic {
            function_name: function_name.into(),
            address,
            message: message.into(),
            raised_at: raised_at.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<AsmText>) -> Self {
        self.context = context;
        self
    }
}

/// Render diagnostics to a `termcolor` stream: the function name and
/// address in bold, the message plain, each context line indented.
pub fn render(diagnostics: &[Diagnostic], out: &mut dyn termcolor::WriteColor) -> std::io::Result<()> {
    use std::io::Write;
    use termcolor::{Color, ColorSpec};

    for d in diagnostics {
        out.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Yellow)))?;
        write!(out, "{}", d.function_name)?;
        out.reset()?;
        writeln!(out, " @0x{:x}: {} ({})", d.address, d.message, d.raised_at)?;
        for line in &d.context {
            writeln!(out, "    0x{:x}  {}", line.address, line.rendered())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_does_not_fail_on_empty_context() {
        let mut buf = termcolor::Buffer::no_color();
        let diagnostics = vec![Diagnostic::new("Foo.bar", 0x1000, "bad template", "fields.rs:42")];
        render(&diagnostics, &mut buf).unwrap();
        let text = String::from_utf8(buf.into_inner()).unwrap();
        assert!(text.contains("Foo.bar"));
        assert!(text.contains("bad template"));
    }
}
