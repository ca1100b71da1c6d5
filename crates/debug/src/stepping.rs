//! Source-granularity stepping over native single steps
//!
//! `step` and `next` are built from one primitive: the host debugger's
//! native single step. After every stop the frame is reclassified and a pure
//! transition function decides whether the logical operation has finished.
//! The transition function takes no host and no session, so the whole state
//! machine is testable by feeding it classified frames directly.

use crate::classify::{classify, LogicalFrame, Regime};
use crate::config::Settings;
use crate::host::{HostDebugger, HostError, StopEvent};
use debuginfo::{DebugStore, Function};
use log::{debug, trace};

/// Which logical operation is being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// May descend into callees (compiled ones, step-into-set native
    /// helpers, and the Quill evaluator)
    Step,
    /// Never descends: every call is stepped over
    Next,
}

/// State of the stepping state machine after a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Still inside the starting line of the starting function
    InsideLine,
    /// Reached a different line (or function) at the starting depth
    LeftLine,
    /// Entered a callee below the starting frame
    EnteredCallee,
    /// Control unwound past the starting frame
    ExitedToCaller,
}

/// What the controller does after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Issue another native single step
    KeepStepping,
    /// The logical operation is complete; report this frame
    Stop,
}

/// Terminal result of a step or next operation
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Stopped at a frame satisfying the operation's terminal condition
    Stopped(LogicalFrame),
    /// The inferior exited while stepping; a valid outcome, not a failure
    Exited(i32),
}

/// Errors from stepping
#[derive(Debug)]
pub enum StepError {
    /// Invoked with no running process
    NoActiveFrame,
    /// A host call failed; surfaced verbatim, never retried
    Host(HostError),
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepError::NoActiveFrame => write!(f, "no active frame"),
            StepError::Host(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StepError::Host(e) => Some(e),
            StepError::NoActiveFrame => None,
        }
    }
}

/// Where the logical operation began
#[derive(Debug)]
pub struct StartPoint<'a> {
    /// The compiled function stepping started in
    pub function: &'a Function,
    /// The logical line stepping started at
    pub line: u32,
    /// The call depth stepping started at
    pub depth: u32,
}

/// Decide what to do about one classified stop.
///
/// `step_into_native` is the live value of the `step_into_native_code`
/// setting, read by the caller at this decision point.
pub fn transition(
    kind: StepKind,
    start: &StartPoint<'_>,
    frame: &LogicalFrame,
    step_into_native: bool,
) -> (StepState, StepAction) {
    let depth = frame.handle.depth;
    match frame.regime {
        Regime::Compiled => {
            if depth < start.depth {
                // Unwound past the starting frame into a compiled caller
                return (StepState::ExitedToCaller, StepAction::Stop);
            }
            if depth > start.depth {
                // A compiled callee was entered (possibly a recursive call)
                return match kind {
                    StepKind::Step => (StepState::EnteredCallee, StepAction::Stop),
                    StepKind::Next => (StepState::EnteredCallee, StepAction::KeepStepping),
                };
            }
            let same_function =
                frame.function.as_deref() == Some(start.function.qualified_name.as_str());
            if same_function && frame.line == Some(start.line) {
                (StepState::InsideLine, StepAction::KeepStepping)
            } else {
                (StepState::LeftLine, StepAction::Stop)
            }
        }
        Regime::Interpreted => {
            if depth > start.depth {
                // Descent into the Quill evaluator is unconditional for
                // step: it is dynamic-language-level code, not opaque
                // native code.
                match kind {
                    StepKind::Step => (StepState::EnteredCallee, StepAction::Stop),
                    StepKind::Next => (StepState::EnteredCallee, StepAction::KeepStepping),
                }
            } else if depth < start.depth {
                // Control is back at Quill level
                (StepState::ExitedToCaller, StepAction::Stop)
            } else {
                (StepState::LeftLine, StepAction::Stop)
            }
        }
        Regime::Native => {
            if kind == StepKind::Step
                && depth > start.depth
                && step_into_native
                && start.function.step_into.contains(&frame.handle.symbol)
            {
                return (StepState::EnteredCallee, StepAction::Stop);
            }
            // Native frames are stepped through in every other case: next
            // never stops in them, and neither does step outside the
            // step-into set.
            let state = if depth > start.depth {
                StepState::EnteredCallee
            } else if depth < start.depth {
                StepState::ExitedToCaller
            } else {
                StepState::InsideLine
            };
            (state, StepAction::KeepStepping)
        }
    }
}

/// Drives step and next against a live host.
pub struct StepController;

impl StepController {
    /// Run one logical step or next operation to completion.
    pub fn run<H: HostDebugger>(
        host: &mut H,
        store: &DebugStore,
        settings: &Settings,
        kind: StepKind,
    ) -> Result<StepOutcome, StepError> {
        let start_handle = match host.current_frame() {
            Ok(handle) => handle,
            Err(HostError::NoProcess) => return Err(StepError::NoActiveFrame),
            Err(e) => return Err(StepError::Host(e)),
        };
        let start_frame = classify(store, &start_handle);

        let start_function = start_frame
            .function
            .as_deref()
            .and_then(|name| store.function_by_qualified_name(name));
        let start_function = match start_function {
            Some(func) => func,
            None => {
                // Not stopped in compiled code: one native step, then stop
                // wherever that lands.
                debug!(
                    "stepping from non-compiled frame {}; single step only",
                    start_handle.symbol
                );
                return match host.single_step().map_err(StepError::Host)? {
                    StopEvent::Stopped(handle) => {
                        Ok(StepOutcome::Stopped(classify(store, &handle)))
                    }
                    StopEvent::Exited(code) => Ok(StepOutcome::Exited(code)),
                };
            }
        };

        let start = StartPoint {
            function: start_function,
            line: start_frame.line.unwrap_or(start_function.lineno),
            depth: start_handle.depth,
        };
        debug!(
            "{:?} from {} line {} depth {}",
            kind, start.function.qualified_name, start.line, start.depth
        );

        loop {
            let handle = match host.single_step().map_err(StepError::Host)? {
                StopEvent::Stopped(handle) => handle,
                StopEvent::Exited(code) => {
                    debug!("inferior exited with code {}", code);
                    return Ok(StepOutcome::Exited(code));
                }
            };
            let frame = classify(store, &handle);
            // Read the live setting at every decision point so a change
            // takes effect mid-operation.
            let step_into_native = settings.step_into_native_code();
            let (state, action) = transition(kind, &start, &frame, step_into_native);
            trace!(
                "stop at {} depth {} -> {:?}/{:?}",
                handle.symbol,
                handle.depth,
                state,
                action
            );
            if action == StepAction::Stop {
                debug!(
                    "{:?} finished: {:?} at {} line {:?}",
                    kind, state, frame.handle.symbol, frame.line
                );
                return Ok(StepOutcome::Stopped(frame));
            }
        }
    }
}
