use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use quarry::{CliError, Context, Item, Node, Registry, XmlDocument, run};

/// Evaluates XPath-family expressions, optionally against an XML document.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// XML document that becomes the context item
    #[arg(short, long)]
    doc: Option<PathBuf>,

    /// Binds a string variable, e.g. `--var limit=10`
    #[arg(short, long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,

    /// Expression to evaluate; starts a REPL when omitted
    expr: Option<String>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = execute(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn execute(args: Args) -> Result<(), CliError> {
    let text = match &args.doc {
        Some(path) => {
            log::info!("Loading document from {}", path.display());
            Some(fs::read_to_string(path)?)
        }
        None => None,
    };
    let document = text.as_deref().map(XmlDocument::parse).transpose()?;

    let registry = Registry::with_builtins();
    let mut ctx = Context::new(&registry);
    if let Some(document) = &document {
        ctx.set_document(document.root());
    }
    for binding in &args.vars {
        let (name, value) = binding
            .split_once('=')
            .ok_or_else(|| CliError::InvalidBinding(binding.clone()))?;
        ctx.set_variable(name, Item::String(value.to_string()))
            .map_err(|_| CliError::InvalidBinding(binding.clone()))?;
    }

    match &args.expr {
        Some(expr) => {
            println!("{}", run(expr, &mut ctx)?.inspect());
            Ok(())
        }
        None => repl(&mut ctx),
    }
}

/// Reads one expression per line. `:set $name := expr` binds a variable for
/// the rest of the session and `:quit` leaves.
fn repl<N: Node>(ctx: &mut Context<'_, N>) -> Result<(), CliError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "quarry> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" => return Ok(()),
            _ => {}
        }
        let outcome = match line.strip_prefix(":set ") {
            Some(rest) => set_variable(ctx, rest),
            None => run(line, ctx).map(|item| item.inspect()),
        };
        match outcome {
            Ok(text) => writeln!(stdout, "{}", text)?,
            Err(e) => writeln!(stdout, "error: {}", e)?,
        }
    }
}

fn set_variable<N: Node>(ctx: &mut Context<'_, N>, binding: &str) -> Result<String, quarry::XPathError> {
    let Some((name, expr)) = binding.split_once(":=") else {
        return Err(quarry::EvalError::type_error("expected ':set $name := expr'").into());
    };
    let value = run(expr.trim(), ctx)?;
    let text = value.inspect();
    ctx.set_variable(name.trim(), value)?;
    Ok(text)
}
