//! Command parsing for the debugging session
//!
//! The interactive dispatcher lives outside this crate; these are the
//! argument contracts it feeds into [`Session::execute`](crate::Session).

/// A parsed debugger command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Set a breakpoint at a location (`module.func` or `file:line`)
    Break(String),
    /// Delete a breakpoint by number
    Delete(u32),
    /// Step one source line, descending into callees
    Step,
    /// Step one source line, stepping over every call
    Next,
    /// Continue execution
    Continue,
    /// Show locals of the current logical frame
    Locals,
    /// Show globals of the current logical frame
    Globals,
    /// Print one variable
    Print(String),
    /// Show the classified call stack (optionally capped)
    Backtrace(Option<usize>),
    /// Change a setting
    Set { name: String, value: String },
    /// Show all settings
    ShowSettings,
    /// Quit the debugger
    Quit,
    /// Empty line (repeat last command)
    Empty,
    /// Unknown command
    Unknown(String),
}

/// Parse a command line into a [`Command`]
pub fn parse(line: &str) -> Command {
    let line = line.trim();

    if line.starts_with('#') || line.is_empty() {
        return Command::Empty;
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();

    match cmd {
        "break" | "b" => parse_break(args),
        "delete" | "d" => parse_delete(args),
        "step" | "s" => Command::Step,
        "next" | "n" => Command::Next,
        "continue" | "c" => Command::Continue,
        "locals" => Command::Locals,
        "globals" => Command::Globals,
        "print" | "p" => parse_print(args),
        "backtrace" | "bt" => parse_backtrace(args),
        "set" => parse_set(args),
        "show" => Command::ShowSettings,
        "quit" | "q" => Command::Quit,
        _ => Command::Unknown(cmd.to_string()),
    }
}

fn parse_break(args: &str) -> Command {
    if args.is_empty() {
        return Command::Unknown("break requires a location".to_string());
    }
    Command::Break(args.to_string())
}

fn parse_delete(args: &str) -> Command {
    match args.parse::<u32>() {
        Ok(n) => Command::Delete(n),
        Err(_) => Command::Unknown("delete requires a breakpoint number".to_string()),
    }
}

fn parse_print(args: &str) -> Command {
    if args.is_empty() {
        return Command::Unknown("print requires a variable name".to_string());
    }
    Command::Print(args.to_string())
}

fn parse_backtrace(args: &str) -> Command {
    if args.is_empty() {
        return Command::Backtrace(None);
    }
    match args.parse::<usize>() {
        Ok(n) => Command::Backtrace(Some(n)),
        Err(_) => Command::Unknown(format!("invalid backtrace limit: {}", args)),
    }
}

fn parse_set(args: &str) -> Command {
    let mut parts = args.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let value = parts.next().unwrap_or("").trim();
    if name.is_empty() || value.is_empty() {
        return Command::Unknown("set requires a name and a value".to_string());
    }
    Command::Set {
        name: name.to_string(),
        value: value.to_string(),
    }
}
