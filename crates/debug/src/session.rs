//! Debugging session: the context object behind every command
//!
//! A [`Session`] owns the debug store, the host debugger handle, the Quill
//! decoder, the settings, the breakpoint registry, and the last-resolved
//! logical frame. It is generic over the host and decoder so the whole
//! command surface can be driven by scripted mocks.

use crate::classify::{classify, LogicalFrame, Regime};
use crate::commands::Command;
use crate::config::Settings;
use crate::host::{HostDebugger, HostError, QuillDecoder, StopEvent};
use crate::inspect::Inspector;
use crate::resolve;
use crate::stepping::{StepController, StepError, StepKind, StepOutcome};
use debuginfo::DebugStore;

/// A registered breakpoint
#[derive(Debug, Clone)]
pub struct BreakpointRecord {
    /// Breakpoint number, as shown to the user
    pub id: u32,
    /// The location text the breakpoint was created from
    pub location: String,
    /// Native targets the location resolved to
    pub targets: Vec<String>,
}

/// A debugging session generic over the host debugger and Quill decoder.
pub struct Session<H: HostDebugger, D: QuillDecoder> {
    /// Loaded debug metadata
    store: DebugStore,
    /// The host debugger
    host: H,
    /// The Quill object decoder
    decoder: D,
    /// Live settings
    settings: Settings,
    /// Registered breakpoints
    breakpoints: Vec<BreakpointRecord>,
    /// Next breakpoint number
    next_breakpoint_id: u32,
    /// The last-resolved logical frame
    current: Option<LogicalFrame>,
    /// Last command (for repeat on empty line)
    last_command: Option<Command>,
    /// Captured output lines (for testing)
    output: Vec<String>,
}

impl<H: HostDebugger, D: QuillDecoder> Session<H, D> {
    /// Create a new session over a loaded store.
    pub fn new(store: DebugStore, host: H, decoder: D) -> Self {
        Self {
            store,
            host,
            decoder,
            settings: Settings::new(),
            breakpoints: Vec::new(),
            next_breakpoint_id: 1,
            current: None,
            last_command: None,
            output: Vec::new(),
        }
    }

    /// The loaded debug metadata.
    pub fn store(&self) -> &DebugStore {
        &self.store
    }

    /// The live settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The last-resolved logical frame, if any.
    pub fn current_frame(&self) -> Option<&LogicalFrame> {
        self.current.as_ref()
    }

    /// Registered breakpoints.
    pub fn breakpoints(&self) -> &[BreakpointRecord] {
        &self.breakpoints
    }

    /// Print a line (captures to output buffer for testing)
    fn println(&mut self, msg: impl AsRef<str>) {
        let s = msg.as_ref().to_string();
        println!("{}", s);
        self.output.push(s);
    }

    /// Get captured output (for testing)
    pub fn get_output(&self) -> &[String] {
        &self.output
    }

    /// Clear captured output (for testing)
    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    /// Execute a command. Returns `Ok(true)` if the session should quit.
    pub fn execute(&mut self, cmd: Command) -> Result<bool, String> {
        if cmd != Command::Empty {
            self.last_command = Some(cmd.clone());
        }

        match cmd {
            Command::Break(location) => self.cmd_break(&location),
            Command::Delete(n) => self.cmd_delete(n),
            Command::Step => self.cmd_step(StepKind::Step),
            Command::Next => self.cmd_step(StepKind::Next),
            Command::Continue => self.cmd_continue(),
            Command::Locals => self.cmd_locals(),
            Command::Globals => self.cmd_globals(),
            Command::Print(name) => self.cmd_print(&name),
            Command::Backtrace(limit) => self.cmd_backtrace(limit),
            Command::Set { name, value } => self.cmd_set(&name, &value),
            Command::ShowSettings => self.cmd_show_settings(),
            Command::Quit => return Ok(true),
            Command::Empty => {
                if let Some(last) = self.last_command.clone() {
                    return self.execute(last);
                }
                Ok(false)
            }
            Command::Unknown(s) => {
                self.println(format!("Unknown command: {}", s));
                Ok(false)
            }
        }
    }

    fn cmd_break(&mut self, location: &str) -> Result<bool, String> {
        let targets = resolve::resolve(&self.store, location).map_err(|e| e.to_string())?;
        for target in &targets {
            self.host
                .insert_breakpoint(target)
                .map_err(|e| e.to_string())?;
        }

        let id = self.next_breakpoint_id;
        self.next_breakpoint_id += 1;
        self.breakpoints.push(BreakpointRecord {
            id,
            location: location.to_string(),
            targets: targets.clone(),
        });

        self.println(format!("Breakpoint {} at {}", id, targets.join(", ")));
        Ok(false)
    }

    fn cmd_delete(&mut self, n: u32) -> Result<bool, String> {
        let pos = self.breakpoints.iter().position(|bp| bp.id == n);
        match pos {
            Some(pos) => {
                let record = self.breakpoints.remove(pos);
                for target in &record.targets {
                    let _ = self.host.remove_breakpoint(target);
                }
                self.println(format!("Deleted breakpoint {}", n));
            }
            None => {
                self.println(format!("No breakpoint number {}", n));
            }
        }
        Ok(false)
    }

    fn cmd_step(&mut self, kind: StepKind) -> Result<bool, String> {
        let outcome = StepController::run(&mut self.host, &self.store, &self.settings, kind);
        match outcome {
            Ok(StepOutcome::Stopped(frame)) => {
                self.report_stop(&frame);
                self.current = Some(frame);
                Ok(false)
            }
            Ok(StepOutcome::Exited(code)) => {
                self.current = None;
                self.println(format!("Program exited with code {}", code));
                Ok(false)
            }
            Err(StepError::NoActiveFrame) => Err("No active frame".to_string()),
            Err(StepError::Host(e)) => Err(e.to_string()),
        }
    }

    fn cmd_continue(&mut self) -> Result<bool, String> {
        match self.host.continue_execution() {
            Ok(StopEvent::Stopped(handle)) => {
                let frame = classify(&self.store, &handle);
                self.report_stop(&frame);
                self.current = Some(frame);
                Ok(false)
            }
            Ok(StopEvent::Exited(code)) => {
                self.current = None;
                self.println(format!("Program exited with code {}", code));
                Ok(false)
            }
            Err(HostError::NoProcess) => Err("No active frame".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn cmd_locals(&mut self) -> Result<bool, String> {
        let frame = self.refresh_frame()?;
        let locals =
            Inspector::locals(&self.store, &self.host, &self.decoder, &self.settings, &frame)
                .map_err(|e| e.to_string())?;
        if locals.is_empty() {
            self.println("No locals.");
        }
        for (name, value) in locals {
            self.println(format!("{} = {}", name, value));
        }
        self.current = Some(frame);
        Ok(false)
    }

    fn cmd_globals(&mut self) -> Result<bool, String> {
        let frame = self.refresh_frame()?;
        let globals =
            Inspector::globals(&self.store, &self.host, &self.decoder, &self.settings, &frame)
                .map_err(|e| e.to_string())?;
        if globals.is_empty() {
            self.println("No globals.");
        }
        for (name, value) in globals {
            self.println(format!("{} = {}", name, value));
        }
        self.current = Some(frame);
        Ok(false)
    }

    fn cmd_print(&mut self, name: &str) -> Result<bool, String> {
        let frame = self.refresh_frame()?;
        let value = Inspector::variable(
            &self.store,
            &self.host,
            &self.decoder,
            &self.settings,
            &frame,
            name,
        )
        .map_err(|e| e.to_string())?;
        self.println(format!("{} = {}", name, value));
        self.current = Some(frame);
        Ok(false)
    }

    fn cmd_backtrace(&mut self, limit: Option<usize>) -> Result<bool, String> {
        let handles = self
            .host
            .frames(limit.unwrap_or(64))
            .map_err(|e| match e {
                HostError::NoProcess => "No active frame".to_string(),
                other => other.to_string(),
            })?;

        let mut lines = Vec::new();
        for (index, handle) in handles.iter().enumerate() {
            let frame = classify(&self.store, handle);
            let text = match frame.regime {
                Regime::Compiled => format!(
                    "#{:<2} {} at line {}",
                    index,
                    frame.function.as_deref().unwrap_or("??"),
                    frame.line.map(|l| l.to_string()).unwrap_or_else(|| "?".to_string())
                ),
                Regime::Interpreted => {
                    let name = self
                        .decoder
                        .decode_frame(handle)
                        .map(|f| f.name)
                        .unwrap_or_else(|_| handle.symbol.clone());
                    format!("#{:<2} [Quill] {}", index, name)
                }
                Regime::Native => {
                    format!("#{:<2} 0x{:016x} in {}", index, handle.pc, handle.symbol)
                }
            };
            lines.push(text);
        }
        for line in lines {
            self.println(line);
        }
        Ok(false)
    }

    fn cmd_set(&mut self, name: &str, value: &str) -> Result<bool, String> {
        self.settings.set(name, value).map_err(|e| e.to_string())?;
        match self.settings.get(name) {
            Some(current) => self.println(format!("{} = {}", name, current)),
            None => {}
        }
        Ok(false)
    }

    fn cmd_show_settings(&mut self) -> Result<bool, String> {
        for (name, value) in self.settings.list() {
            self.println(format!("{} = {}", name, value));
        }
        Ok(false)
    }

    /// Classify the host's current frame from scratch.
    fn refresh_frame(&mut self) -> Result<LogicalFrame, String> {
        match self.host.current_frame() {
            Ok(handle) => Ok(classify(&self.store, &handle)),
            Err(HostError::NoProcess) => Err("No active frame".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn report_stop(&mut self, frame: &LogicalFrame) {
        match frame.regime {
            Regime::Compiled => {
                let name = frame.function.as_deref().unwrap_or("??").to_string();
                let line = frame
                    .line
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "?".to_string());
                self.println(format!("Stopped in {} at line {}", name, line));
            }
            Regime::Interpreted => {
                let name = self
                    .decoder
                    .decode_frame(&frame.handle)
                    .map(|f| f.name)
                    .unwrap_or_else(|_| frame.handle.symbol.clone());
                self.println(format!("Stopped in Quill function {}", name));
            }
            Regime::Native => {
                self.println(format!("Stopped in native {}", frame.handle.symbol));
            }
        }
    }
}
