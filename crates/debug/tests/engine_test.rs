//! Integration tests for the debugging engine
//!
//! These drive the full session (breakpoints, stepping, inspection,
//! settings) against a scripted host that replays (symbol, pc, depth) stop
//! sequences, and a table-backed Quill decoder. No live process is involved.

use debug::{
    parse, DecodeError, DecodedFrame, DecodedValue, FrameHandle, HostDebugger, HostError,
    QuillDecoder, Regime, Session, StopEvent,
};
use debuginfo::{
    DebugInfoBuilder, DebugStore, LineFlags, NativeType, StorageLocation, TypeTag, VarType,
};
use std::collections::{HashMap, VecDeque};

/// One scripted stop: the event plus storage writes that "executed" on the
/// way to it.
struct ScriptStep {
    event: StopEvent,
    writes: Vec<(StorageLocation, u64)>,
}

fn at(symbol: &str, pc: u64, depth: u32) -> ScriptStep {
    ScriptStep {
        event: StopEvent::Stopped(FrameHandle::new(symbol, pc, depth)),
        writes: Vec::new(),
    }
}

fn at_with(symbol: &str, pc: u64, depth: u32, writes: Vec<(StorageLocation, u64)>) -> ScriptStep {
    ScriptStep {
        event: StopEvent::Stopped(FrameHandle::new(symbol, pc, depth)),
        writes,
    }
}

fn exited(code: i32) -> ScriptStep {
    ScriptStep {
        event: StopEvent::Exited(code),
        writes: Vec::new(),
    }
}

/// Host replaying a scripted sequence of stops with a live storage map.
struct ScriptedHost {
    current: Option<FrameHandle>,
    script: VecDeque<ScriptStep>,
    values: HashMap<StorageLocation, u64>,
    inserted: Vec<String>,
}

impl ScriptedHost {
    fn new(current: FrameHandle, script: Vec<ScriptStep>) -> Self {
        Self {
            current: Some(current),
            script: script.into(),
            values: HashMap::new(),
            inserted: Vec::new(),
        }
    }

    fn with_values(mut self, values: Vec<(StorageLocation, u64)>) -> Self {
        self.values = values.into_iter().collect();
        self
    }

    fn advance(&mut self) -> Result<StopEvent, HostError> {
        let step = self
            .script
            .pop_front()
            .ok_or_else(|| HostError::Failed("script exhausted".to_string()))?;
        for (location, value) in step.writes {
            self.values.insert(location, value);
        }
        match &step.event {
            StopEvent::Stopped(handle) => self.current = Some(handle.clone()),
            StopEvent::Exited(_) => self.current = None,
        }
        Ok(step.event)
    }
}

impl HostDebugger for ScriptedHost {
    fn single_step(&mut self) -> Result<StopEvent, HostError> {
        self.advance()
    }

    fn continue_execution(&mut self) -> Result<StopEvent, HostError> {
        self.advance()
    }

    fn current_frame(&self) -> Result<FrameHandle, HostError> {
        self.current.clone().ok_or(HostError::NoProcess)
    }

    fn frames(&self, max: usize) -> Result<Vec<FrameHandle>, HostError> {
        match &self.current {
            Some(frame) => Ok(vec![frame.clone()].into_iter().take(max).collect()),
            None => Err(HostError::NoProcess),
        }
    }

    fn insert_breakpoint(&mut self, target: &str) -> Result<(), HostError> {
        self.inserted.push(target.to_string());
        Ok(())
    }

    fn remove_breakpoint(&mut self, target: &str) -> Result<bool, HostError> {
        Ok(self.inserted.iter().any(|t| t == target))
    }

    fn read_location(
        &self,
        _frame: &FrameHandle,
        location: &StorageLocation,
    ) -> Result<u64, HostError> {
        Ok(self.values.get(location).copied().unwrap_or(0))
    }
}

/// Decoder backed by fixed tables.
struct MapDecoder {
    objects: HashMap<u64, DecodedValue>,
    frames: HashMap<String, DecodedFrame>,
}

impl MapDecoder {
    fn new() -> Self {
        Self {
            objects: HashMap::new(),
            frames: HashMap::new(),
        }
    }

    fn object(mut self, raw: u64, kind: &str, value: &str) -> Self {
        self.objects.insert(
            raw,
            DecodedValue {
                kind: kind.to_string(),
                fields: vec![("value".to_string(), value.to_string())],
            },
        );
        self
    }

    fn frame(mut self, symbol: &str, decoded: DecodedFrame) -> Self {
        self.frames.insert(symbol.to_string(), decoded);
        self
    }
}

impl QuillDecoder for MapDecoder {
    fn decode(&self, raw: u64) -> Result<DecodedValue, DecodeError> {
        self.objects
            .get(&raw)
            .cloned()
            .ok_or(DecodeError::BadHandle(raw))
    }

    fn decode_frame(&self, frame: &FrameHandle) -> Result<DecodedFrame, DecodeError> {
        self.frames
            .get(&frame.symbol)
            .cloned()
            .ok_or_else(|| DecodeError::Failed(format!("no frame for {}", frame.symbol)))
    }
}

/// The codefile module used throughout, in the shape of the stepping
/// scenarios:
///
/// ```text
///  4  def spam(a=0):          region 0x1000..0x1010 (line 5: b = 0)
///  5      b = 0               region 0x1010..0x1020 (line 6: b = 1)
///  6      b = 1               region 0x1020..0x1030 (line 7: c = 2)
///  7      c = 2               region 0x1030..0x1040 (line 8: int(10))
///  8      int(10)             region 0x1040..0x1050 (line 9: puts)
///  9      puts("spam")        region 0x1050..0x1060 (line 10: quill call)
/// 10      quill_join(...)
/// ```
fn make_store() -> DebugStore {
    let mut builder = DebugInfoBuilder::new();
    let file = builder.add_source("codefile.sbl");
    builder.begin_module("codefile");
    builder.add_global(
        "c_var",
        VarType::Native(NativeType::Int64),
        StorageLocation::Absolute(0x6000),
    );
    builder.add_global("quill_var", VarType::Dynamic, StorageLocation::Absolute(0x6008));
    builder
        .add_function("codefile.spam", "__sbl_codefile_spam", TypeTag::Native, 4)
        .local("a", VarType::Native(NativeType::Int64), StorageLocation::Register(0))
        .local("b", VarType::Native(NativeType::Int64), StorageLocation::Register(1))
        .local("c", VarType::Native(NativeType::Int64), StorageLocation::Register(2))
        .local("d", VarType::Native(NativeType::Int64), StorageLocation::Register(3))
        .step_into("puts")
        .step_into("some_native_function");
    builder
        .add_function("codefile.eggs", "__sbl_codefile_eggs", TypeTag::Dynamic, 20)
        .quill_entry("__sblq_codefile_eggs");
    builder.add_function("codefile.ham", "__sbl_codefile_ham", TypeTag::Native, 30);

    for (line, start) in [(5u32, 0x1000u64), (6, 0x1010), (7, 0x1020), (8, 0x1030), (9, 0x1040), (10, 0x1050)] {
        builder.add_line_region(file, line, start, start + 0x10, LineFlags::STATEMENT);
    }
    // eggs body: line 21 owns two disjoint regions (loop body)
    builder.add_line_region(file, 21, 0x2000, 0x2010, LineFlags::STATEMENT);
    builder.add_line_region(file, 21, 0x2030, 0x2040, LineFlags::STATEMENT);

    let mut buf = Vec::new();
    debuginfo::write_sabledbg(&builder.finish(), &mut buf).unwrap();
    let mut store = DebugStore::new();
    store.load(&mut buf.as_slice()).unwrap();
    store
}

fn assert_line(session: &Session<ScriptedHost, MapDecoder>, line: u32) {
    let frame = session.current_frame().expect("no current frame");
    assert_eq!(frame.regime, Regime::Compiled);
    assert_eq!(frame.line, Some(line));
}

fn assert_local(session: &mut Session<ScriptedHost, MapDecoder>, name: &str, value: &str) {
    session.clear_output();
    session.execute(parse("locals")).unwrap();
    let expected = format!("{} = {}", name, value);
    assert!(
        session.get_output().iter().any(|l| l == &expected),
        "expected `{}` in locals output {:?}",
        expected,
        session.get_output()
    );
}

#[test]
fn test_break_prefers_secondary_entry_and_is_deterministic() {
    let store = make_store();
    let host = ScriptedHost::new(FrameHandle::new("__sbl_codefile_spam", 0x1000, 1), vec![]);
    let mut session = Session::new(store, host, MapDecoder::new());

    session.execute(parse("break codefile.eggs")).unwrap();
    session.execute(parse("break codefile.eggs")).unwrap();
    session.execute(parse("break codefile.spam")).unwrap();

    // Secondary entry preferred when present, primary otherwise; identical
    // resolution on every call.
    assert_eq!(
        session.get_output(),
        &[
            "Breakpoint 1 at __sblq_codefile_eggs".to_string(),
            "Breakpoint 2 at __sblq_codefile_eggs".to_string(),
            "Breakpoint 3 at __sbl_codefile_spam".to_string(),
        ]
    );
}

#[test]
fn test_break_on_line_with_multiple_regions() {
    let store = make_store();
    let host = ScriptedHost::new(FrameHandle::new("__sbl_codefile_spam", 0x1000, 1), vec![]);
    let mut session = Session::new(store, host, MapDecoder::new());

    session.execute(parse("break codefile.sbl:21")).unwrap();
    // Both disjoint regions of the line get a breakpoint
    assert!(session
        .get_output()
        .iter()
        .any(|l| l.contains("*0x2000") && l.contains("*0x2030")));
}

#[test]
fn test_stepping_scenario_through_assignments() {
    let store = make_store();
    // Stopped at spam's first statement (line 5), as after `break` + `run`
    let host = ScriptedHost::new(
        FrameHandle::new("__sbl_codefile_spam", 0x1000, 1),
        vec![
            // step 1: b = 0 executes, lands on line 6
            at_with(
                "__sbl_codefile_spam",
                0x1010,
                1,
                vec![(StorageLocation::Register(1), 0)],
            ),
            // step 2: b = 1 executes, lands on line 7
            at_with(
                "__sbl_codefile_spam",
                0x1020,
                1,
                vec![(StorageLocation::Register(1), 1)],
            ),
            // step 3: c = 2 executes, lands on line 8
            at_with(
                "__sbl_codefile_spam",
                0x1030,
                1,
                vec![(StorageLocation::Register(2), 2)],
            ),
            // step 4: int(10) is a call to a plain native helper, stepped
            // through without stopping
            at("int_from_word", 0x7000, 2),
            at("int_from_word", 0x7004, 2),
            at_with(
                "__sbl_codefile_spam",
                0x1040,
                1,
                vec![(StorageLocation::Register(3), 10)],
            ),
            // continue: runs to exit
            exited(0),
        ],
    );
    let mut session = Session::new(store, host, MapDecoder::new());

    // At the first statement nothing is assigned yet
    assert_local(&mut session, "b", "0");
    assert_line(&session, 5);

    session.execute(parse("step")).unwrap();
    assert_line(&session, 6);
    assert_local(&mut session, "b", "0");

    session.execute(parse("step")).unwrap();
    assert_line(&session, 7);
    assert_local(&mut session, "b", "1");
    assert_local(&mut session, "c", "0");

    session.execute(parse("step")).unwrap();
    assert_line(&session, 8);
    assert_local(&mut session, "c", "2");

    // Fifth step crosses a native call; with native stepping at its default
    // (off) the stop is back at compiled regime, next line
    session.execute(parse("step")).unwrap();
    assert_line(&session, 9);

    session.clear_output();
    session.execute(parse("continue")).unwrap();
    assert!(session
        .get_output()
        .iter()
        .any(|l| l.contains("Program exited with code 0")));
}

#[test]
fn test_locals_include_every_declared_name() {
    let store = make_store();
    let host = ScriptedHost::new(FrameHandle::new("__sbl_codefile_spam", 0x1000, 1), vec![])
        .with_values(vec![
            (StorageLocation::Register(0), 0),
            (StorageLocation::Register(1), 7),
        ]);
    let mut session = Session::new(store, host, MapDecoder::new());

    session.execute(parse("locals")).unwrap();
    let names: Vec<String> = session
        .get_output()
        .iter()
        .filter_map(|l| l.split(" = ").next().map(str::to_string))
        .collect();
    // Every declared local, sorted, and nothing else
    assert_eq!(names, vec!["a", "b", "c", "d"]);
}

#[test]
fn test_globals_merge_native_and_dynamic() {
    let store = make_store();
    let host = ScriptedHost::new(FrameHandle::new("__sbl_codefile_spam", 0x1000, 1), vec![])
        .with_values(vec![
            (StorageLocation::Absolute(0x6000), 12),
            (StorageLocation::Absolute(0x6008), 0xcafe),
        ]);
    let decoder = MapDecoder::new().object(0xcafe, "int", "13");
    let mut session = Session::new(store, host, decoder);

    session.execute(parse("globals")).unwrap();
    assert_eq!(
        session.get_output(),
        &["c_var = 12".to_string(), "quill_var = 13".to_string()]
    );
}

#[test]
fn test_step_into_native_helper_when_enabled() {
    let store = make_store();
    // Stopped at the call to some_native_function (a step-into member)
    let host = ScriptedHost::new(
        FrameHandle::new("__sbl_codefile_spam", 0x1040, 1),
        vec![at("some_native_function", 0x7100, 2)],
    );
    let mut session = Session::new(store, host, MapDecoder::new());

    session
        .execute(parse("set step_into_native_code on"))
        .unwrap();
    session.clear_output();
    session.execute(parse("step")).unwrap();

    assert!(session
        .get_output()
        .iter()
        .any(|l| l.contains("Stopped in native some_native_function")));
    let frame = session.current_frame().unwrap();
    assert_eq!(frame.regime, Regime::Native);
    assert_eq!(frame.handle.symbol, "some_native_function");

    // No source-level variable view in a native frame
    assert!(session.execute(parse("locals")).is_err());
}

#[test]
fn test_step_never_stops_native_when_disabled() {
    let store = make_store();
    let host = ScriptedHost::new(
        FrameHandle::new("__sbl_codefile_spam", 0x1040, 1),
        vec![
            at("some_native_function", 0x7100, 2),
            at("some_native_function", 0x7104, 2),
            at("__sbl_codefile_spam", 0x1050, 1),
        ],
    );
    let mut session = Session::new(store, host, MapDecoder::new());

    // step_into_native_code is off by default; membership in the step-into
    // set changes nothing
    session.execute(parse("step")).unwrap();
    let frame = session.current_frame().unwrap();
    assert_eq!(frame.regime, Regime::Compiled);
    assert_eq!(frame.line, Some(10));
}

#[test]
fn test_setting_change_applies_to_next_step() {
    let store = make_store();
    let host = ScriptedHost::new(
        FrameHandle::new("__sbl_codefile_spam", 0x1030, 1),
        vec![
            // first step: over the helper (setting off)
            at("some_native_function", 0x7100, 2),
            at("__sbl_codefile_spam", 0x1040, 1),
            // second step: into the helper (setting on)
            at("some_native_function", 0x7100, 2),
        ],
    );
    let mut session = Session::new(store, host, MapDecoder::new());

    session.execute(parse("step")).unwrap();
    assert_eq!(session.current_frame().unwrap().regime, Regime::Compiled);

    session
        .execute(parse("set step_into_native_code on"))
        .unwrap();
    session.execute(parse("step")).unwrap();
    assert_eq!(session.current_frame().unwrap().regime, Regime::Native);
}

#[test]
fn test_step_into_quill_call_reports_decoded_name() {
    let store = make_store();
    // Stopped at the line calling a Quill function
    let host = ScriptedHost::new(
        FrameHandle::new("__sbl_codefile_spam", 0x1050, 1),
        vec![at("quill_eval_frame", 0x9000, 2)],
    );
    let decoder = MapDecoder::new().frame(
        "quill_eval_frame",
        DecodedFrame {
            name: "join".to_string(),
            locals: vec![(
                "sep".to_string(),
                DecodedValue {
                    kind: "str".to_string(),
                    fields: vec![("value".to_string(), "'/'".to_string())],
                },
            )],
            globals: vec![(
                "__name__".to_string(),
                DecodedValue {
                    kind: "str".to_string(),
                    fields: vec![("value".to_string(), "'quillpath'".to_string())],
                },
            )],
        },
    );
    let mut session = Session::new(store, host, decoder);

    // Descent into the interpreter is unconditional: the native-code
    // setting stays off
    session.execute(parse("step")).unwrap();
    assert!(session
        .get_output()
        .iter()
        .any(|l| l.contains("Stopped in Quill function join")));
    assert_eq!(session.current_frame().unwrap().regime, Regime::Interpreted);

    // Inspection is fully delegated to the decoded frame
    session.clear_output();
    session.execute(parse("locals")).unwrap();
    assert_eq!(session.get_output(), &["sep = '/'".to_string()]);

    session.clear_output();
    session.execute(parse("globals")).unwrap();
    assert_eq!(session.get_output(), &["__name__ = 'quillpath'".to_string()]);
}

#[test]
fn test_next_line_reports_are_monotonic() {
    let store = make_store();
    let host = ScriptedHost::new(
        FrameHandle::new("__sbl_codefile_spam", 0x1000, 1),
        vec![
            at("__sbl_codefile_spam", 0x1010, 1),
            at("__sbl_codefile_spam", 0x1014, 1), // still line 6
            at("__sbl_codefile_spam", 0x1020, 1),
            at("__sbl_codefile_spam", 0x1030, 1),
        ],
    );
    let mut session = Session::new(store, host, MapDecoder::new());

    let mut last_line = 0;
    for _ in 0..3 {
        session.execute(parse("next")).unwrap();
        let frame = session.current_frame().unwrap();
        assert_eq!(frame.regime, Regime::Compiled);
        let line = frame.line.unwrap();
        assert!(line >= last_line, "line {} went backwards", line);
        last_line = line;
    }
    assert_eq!(last_line, 8);
}

#[test]
fn test_print_falls_back_from_locals_to_globals() {
    let store = make_store();
    let host = ScriptedHost::new(FrameHandle::new("__sbl_codefile_spam", 0x1020, 1), vec![])
        .with_values(vec![
            (StorageLocation::Register(1), 1),
            (StorageLocation::Absolute(0x6000), 12),
        ]);
    let mut session = Session::new(store, host, MapDecoder::new());

    session.execute(parse("print b")).unwrap();
    session.execute(parse("print c_var")).unwrap();
    assert_eq!(
        session.get_output(),
        &["b = 1".to_string(), "c_var = 12".to_string()]
    );

    assert!(session.execute(parse("print nonexistent")).is_err());
}

#[test]
fn test_backtrace_classifies_mixed_stack() {
    let store = make_store();
    let mut host = ScriptedHost::new(FrameHandle::new("__sbl_codefile_spam", 0x1020, 1), vec![]);
    // Hand the host a mixed stack to enumerate
    let stack = vec![
        FrameHandle::new("some_native_function", 0x7100, 3),
        FrameHandle::new("__sbl_codefile_spam", 0x1020, 2),
        FrameHandle::new("quill_eval_frame", 0x9000, 1),
    ];
    host.current = Some(stack[0].clone());

    struct StackHost {
        inner: ScriptedHost,
        stack: Vec<FrameHandle>,
    }
    impl HostDebugger for StackHost {
        fn single_step(&mut self) -> Result<StopEvent, HostError> {
            self.inner.single_step()
        }
        fn continue_execution(&mut self) -> Result<StopEvent, HostError> {
            self.inner.continue_execution()
        }
        fn current_frame(&self) -> Result<FrameHandle, HostError> {
            self.inner.current_frame()
        }
        fn frames(&self, max: usize) -> Result<Vec<FrameHandle>, HostError> {
            Ok(self.stack.iter().take(max).cloned().collect())
        }
        fn insert_breakpoint(&mut self, target: &str) -> Result<(), HostError> {
            self.inner.insert_breakpoint(target)
        }
        fn remove_breakpoint(&mut self, target: &str) -> Result<bool, HostError> {
            self.inner.remove_breakpoint(target)
        }
        fn read_location(
            &self,
            frame: &FrameHandle,
            location: &StorageLocation,
        ) -> Result<u64, HostError> {
            self.inner.read_location(frame, location)
        }
    }

    let decoder = MapDecoder::new().frame(
        "quill_eval_frame",
        DecodedFrame {
            name: "main".to_string(),
            locals: vec![],
            globals: vec![],
        },
    );
    let mut session = Session::new(store, StackHost { inner: host, stack }, decoder);

    session.execute(parse("backtrace")).unwrap();
    let output = session.get_output();
    assert_eq!(output.len(), 3);
    assert!(output[0].contains("in some_native_function"));
    assert!(output[1].contains("codefile.spam at line 7"));
    assert!(output[2].contains("[Quill] main"));
}
