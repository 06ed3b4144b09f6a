//! Tests for the process image backend and the session commands on top of it

use serde_json::json;
use strand_core::error::{StrandError, UsageError};
use strand_core::layout::RuntimeLayout;
use strand_core::platform::ImageDebugger;
use strand_core::snapshot;
use strand_core::switch::SwitchOutcome;
use strand_core::types::{Address, CalleeSaved, Expr, FrameStatus, KernelThreadId, RegisterId};
use strand_core::{Session, TargetDebugger};

const LOADED: u64 = 0x1_0000;
const FOREIGN: u64 = 0x2_0000;
const OCCUPANCY: u64 = 0x3_0000;

/// Two occupied slots: slot 0 is running on kernel thread 1, slot 2 is
/// suspended in `Arachne::yield` called from `worker`.
fn fixture() -> serde_json::Value
{
    json!({
        "selected_thread": 1,
        "threads": [
            { "id": 1, "registers": { "sp": 0x7000, "pc": 0x40_1010, "rbp": 0x7010, "rbx": 7 } },
            { "id": 2, "registers": { "sp": 0xc000, "pc": 0 } }
        ],
        "variables": {
            "Arachne::core.loadedContext": { "type": "Arachne::ThreadContext *", "value": LOADED },
            "Arachne::core.localOccupiedAndCount": { "type": "std::atomic<Arachne::MaskAndCount> *", "value": OCCUPANCY }
        },
        "arrays": {
            "Arachne::core.localThreadContexts": [
                { "type": "Arachne::ThreadContext *", "value": LOADED },
                { "type": "Arachne::ThreadContext *", "value": 0 },
                { "type": "Arachne::ThreadContext *", "value": FOREIGN }
            ]
        },
        "objects": [
            {
                "address": OCCUPANCY,
                "type": "std::atomic<Arachne::MaskAndCount>",
                "fields": { "_M_i.occupied": { "type": "uint64_t", "value": 0b101 } }
            },
            {
                "address": LOADED,
                "type": "Arachne::ThreadContext",
                "fields": {
                    "sp": { "type": "void *", "value": 0x6000 },
                    "stack": { "type": "void *", "value": 0x5000 }
                }
            },
            {
                "address": FOREIGN,
                "type": "Arachne::ThreadContext",
                "fields": {
                    "sp": { "type": "void *", "value": 0x9000 },
                    "stack": { "type": "void *", "value": 0x8800 }
                }
            }
        ],
        "memory": [
            { "address": 0x7010, "value": 0 },
            { "address": 0x7018, "value": 0 },
            { "address": 0x9000, "value": 0x9100 },
            { "address": 0x9008, "value": 0xb1 },
            { "address": 0x9010, "value": 0xf15 },
            { "address": 0x9018, "value": 0xf14 },
            { "address": 0x9020, "value": 0xf13 },
            { "address": 0x9028, "value": 0xf12 },
            { "address": 0x9030, "value": 0x40_2010 },
            { "address": 0x9100, "value": 0 },
            { "address": 0x9108, "value": 0x40_3020 }
        ],
        "symbols": [
            { "start": 0x40_1000, "end": 0x40_1100, "name": "Arachne::schedulerMainLoop" },
            { "start": 0x40_2000, "end": 0x40_2100, "name": "Arachne::yield" },
            { "start": 0x40_3000, "end": 0x40_3100, "name": "worker" }
        ]
    })
}

fn image() -> ImageDebugger
{
    ImageDebugger::new(serde_json::from_value(fixture()).unwrap()).unwrap()
}

fn frame_names(backtrace: &strand_core::types::Backtrace) -> Vec<String>
{
    backtrace
        .frames
        .iter()
        .map(|frame| frame.symbol.as_ref().map_or("??".to_string(), |s| s.display_name().to_string()))
        .collect()
}

#[test]
fn test_evaluates_every_expression_form()
{
    let image = image();

    let loaded = image.evaluate(&Expr::Symbol("Arachne::core.loadedContext".into())).unwrap();
    assert_eq!(loaded.raw(), LOADED);
    assert!(loaded.has_type("Arachne::ThreadContext*"));

    let slot = image
        .evaluate(&Expr::Element {
            array: "Arachne::core.localThreadContexts".into(),
            index: 2,
        })
        .unwrap();
    assert_eq!(slot.raw(), FOREIGN);

    let mask = image
        .evaluate(&Expr::Member {
            base: Address::from(OCCUPANCY),
            pointer_type: "std::atomic<Arachne::MaskAndCount> *".into(),
            path: "_M_i.occupied".into(),
        })
        .unwrap();
    assert_eq!(mask.raw(), 0b101);

    let word = image.evaluate(&Expr::Word(Address::from(0x9030))).unwrap();
    assert_eq!(word.raw(), 0x40_2010);
}

#[test]
fn test_evaluates_operator_text()
{
    let image = image();

    let literal = image.evaluate(&Expr::Text("0x20000".into())).unwrap();
    assert_eq!(literal.type_name(), "long");
    assert_eq!(literal.raw(), FOREIGN);

    let cast = image
        .evaluate(&Expr::Text("(Arachne::ThreadContext *) 0x20000".into()))
        .unwrap();
    assert_eq!(cast.type_name(), "Arachne::ThreadContext *");
    assert_eq!(cast.raw(), FOREIGN);

    let wrapped = image
        .evaluate(&Expr::Text("((Arachne::ThreadContext *)0x20000)".into()))
        .unwrap();
    assert_eq!(wrapped.type_name(), "Arachne::ThreadContext *");
    assert_eq!(wrapped.raw(), FOREIGN);

    let element = image
        .evaluate(&Expr::Text(" Arachne::core.localThreadContexts[0] ".into()))
        .unwrap();
    assert_eq!(element.raw(), LOADED);

    assert_eq!(image.evaluate(&Expr::Text("$rsp".into())).unwrap().raw(), 0x7000);
    assert_eq!(image.evaluate(&Expr::Text("$rbx".into())).unwrap().raw(), 7);
}

#[test]
fn test_evaluation_errors()
{
    let image = image();

    let err = image.evaluate(&Expr::Word(Address::from(0xdead_0000))).unwrap_err();
    assert!(err.to_string().contains("Cannot access memory at address 0xdead0000"));

    let err = image.evaluate(&Expr::Text("nope".into())).unwrap_err();
    assert!(err.to_string().contains("No symbol \"nope\""));

    let err = image
        .evaluate(&Expr::Text("Arachne::core.localThreadContexts[9]".into()))
        .unwrap_err();
    assert!(matches!(err, StrandError::Evaluation { .. }));

    let err = image
        .evaluate(&Expr::Member {
            base: Address::from(FOREIGN),
            pointer_type: "Arachne::ThreadContext *".into(),
            path: "missing".into(),
        })
        .unwrap_err();
    assert!(err.to_string().contains("no member named missing"));
}

#[test]
fn test_native_backtrace_follows_frame_pointers()
{
    let image = image();
    let backtrace = image.native_backtrace().unwrap();

    assert_eq!(backtrace.thread, KernelThreadId(1));
    assert_eq!(frame_names(&backtrace), vec!["Arachne::schedulerMainLoop"]);
    assert_eq!(backtrace.frames[0].status, FrameStatus::Registers);
}

#[test]
fn test_null_pc_cannot_be_unwound()
{
    let mut image = image();
    image.select_thread(KernelThreadId(2)).unwrap();
    assert!(matches!(image.native_backtrace(), Err(StrandError::Backtrace(_))));
    assert!(image.select_thread(KernelThreadId(9)).is_err());
}

#[test]
fn test_session_backtraces_all_occupied_slots()
{
    let mut session = Session::new(image(), RuntimeLayout::arachne()).unwrap();
    let before = snapshot::capture(session.debugger()).unwrap();

    let report = session.backtrace_thread(None).unwrap();

    assert_eq!(report.threads.len(), 2);
    let loaded = &report.threads[0];
    assert_eq!(loaded.slot, Some(0));
    assert!(!loaded.emulated);
    assert_eq!(
        frame_names(loaded.outcome.as_ref().unwrap()),
        vec!["Arachne::schedulerMainLoop"]
    );

    let suspended = &report.threads[1];
    assert_eq!(suspended.slot, Some(2));
    assert!(suspended.emulated);
    let backtrace = suspended.outcome.as_ref().unwrap();
    assert_eq!(frame_names(backtrace), vec!["Arachne::yield", "worker"]);
    assert_eq!(backtrace.frames[0].sp, Address::from(0x9030));
    assert_eq!(backtrace.frames[0].fp, Address::from(0x9100));
    assert_eq!(backtrace.frames[1].status, FrameStatus::FramePointer);

    assert_eq!(snapshot::capture(session.debugger()).unwrap(), before);
}

#[test]
fn test_session_backtraces_one_thread()
{
    let mut session = Session::new(image(), RuntimeLayout::arachne()).unwrap();

    let report = session
        .backtrace_thread(Some("(Arachne::ThreadContext *) 0x20000"))
        .unwrap();

    assert_eq!(report.threads.len(), 1);
    assert!(report.threads[0].emulated);
    assert_eq!(report.threads[0].slot, None);
    assert_eq!(
        frame_names(report.threads[0].outcome.as_ref().unwrap()),
        vec!["Arachne::yield", "worker"]
    );
}

#[test]
fn test_session_rejects_bad_arguments()
{
    let mut session = Session::new(image(), RuntimeLayout::arachne()).unwrap();

    let err = session
        .backtrace_thread(Some("(Arachne::ThreadContext *) 0"))
        .unwrap_err();
    assert!(matches!(err, StrandError::Usage(UsageError::NullPointer)));

    let err = session.switch_thread(Some("0x20000")).unwrap_err();
    assert!(matches!(err, StrandError::Usage(UsageError::WrongType { .. })));
    assert!(!session.switcher().is_diverted(KernelThreadId(1)));
}

#[test]
fn test_blank_argument_means_none()
{
    let session = Session::new(image(), RuntimeLayout::arachne()).unwrap();
    assert_eq!(session.resolve_context("   ").unwrap(), None);
}

#[test]
fn test_session_switch_round_trip()
{
    let mut session = Session::new(image(), RuntimeLayout::arachne()).unwrap();

    let outcome = session
        .switch_thread(Some("Arachne::core.localThreadContexts[2]"))
        .unwrap();
    assert!(matches!(
        outcome,
        SwitchOutcome::Emulating {
            first_divergence: true,
            ..
        }
    ));
    assert_eq!(session.debugger().read_register(RegisterId::Sp).unwrap(), 0x9030);
    assert_eq!(session.debugger().read_register(RegisterId::Pc).unwrap(), 0x40_2010);
    // Callee-saved registers stay native; rbp was not switched.
    assert_eq!(
        session
            .debugger()
            .read_register(RegisterId::CalleeSaved(CalleeSaved::Rbp))
            .unwrap(),
        0x7010
    );

    let outcome = session.switch_thread(None).unwrap();
    assert!(matches!(outcome, SwitchOutcome::RestoredNative(_)));
    assert_eq!(session.debugger().read_register(RegisterId::Sp).unwrap(), 0x7000);
    assert_eq!(session.debugger().read_register(RegisterId::Pc).unwrap(), 0x40_1010);
    assert_eq!(session.switch_thread(Some("")).unwrap(), SwitchOutcome::AlreadyNative);
}

#[test]
fn test_session_diff_stack()
{
    let session = Session::new(image(), RuntimeLayout::arachne()).unwrap();

    let report = session.diff_stack().unwrap();

    assert_eq!(report.slots.len(), 56);
    assert_eq!(report.slots[0].slot, 0);
    assert!(report.slots[0].occupied);
    assert!(report.slots[0].loaded);
    assert_eq!(*report.slots[0].outcome.as_ref().unwrap(), 0x1000);

    assert!(!report.slots[1].occupied);
    assert!(matches!(
        report.slots[1].outcome,
        Err(StrandError::Usage(UsageError::NullPointer))
    ));

    assert_eq!(report.slots[2].slot, 2);
    assert!(report.slots[2].occupied);
    assert!(!report.slots[2].loaded);
    assert_eq!(*report.slots[2].outcome.as_ref().unwrap(), 0x800);

    // The slot table in the image stops at index 2.
    assert!(matches!(report.slots[3].outcome, Err(StrandError::Evaluation { .. })));
}

#[test]
fn test_diff_stack_reports_idle_slots()
{
    const IDLE: u64 = 0x4_0000;

    let mut fixture = fixture();
    fixture["arrays"]["Arachne::core.localThreadContexts"][1] =
        json!({ "type": "Arachne::ThreadContext *", "value": IDLE });
    fixture["objects"].as_array_mut().unwrap().push(json!({
        "address": IDLE,
        "type": "Arachne::ThreadContext",
        "fields": {
            "sp": { "type": "void *", "value": 0xa100 },
            "stack": { "type": "void *", "value": 0xa000 }
        }
    }));
    let image = ImageDebugger::new(serde_json::from_value(fixture).unwrap()).unwrap();
    let layout = RuntimeLayout {
        occupancy_width: 3,
        ..RuntimeLayout::arachne()
    };
    let session = Session::new(image, layout).unwrap();

    let report = session.diff_stack().unwrap();

    let slots: Vec<usize> = report.slots.iter().map(|entry| entry.slot).collect();
    assert_eq!(slots, vec![0, 1, 2]);
    let idle = &report.slots[1];
    assert!(!idle.occupied);
    assert!(!idle.loaded);
    assert_eq!(idle.context, Address::from(IDLE));
    assert_eq!(*idle.outcome.as_ref().unwrap(), 0x100);
}

#[test]
fn test_invalid_images_are_rejected()
{
    let missing_thread = ImageDebugger::from_json(r#"{ "selected_thread": 3, "threads": [] }"#);
    assert!(matches!(missing_thread, Err(StrandError::Image(_))));

    let not_json = ImageDebugger::from_json("{");
    assert!(matches!(not_json, Err(StrandError::Json(_))));

    let bad_layout = ImageDebugger::from_json(
        r#"{
            "selected_thread": 1,
            "threads": [{ "id": 1, "registers": {} }],
            "layout": { "saved_region_words": 4 }
        }"#,
    );
    assert!(matches!(bad_layout, Err(StrandError::InvalidLayout(_))));
}

#[test]
fn test_image_layout_overrides_defaults()
{
    let image = ImageDebugger::from_json(
        r#"{
            "selected_thread": 1,
            "threads": [{ "id": 1, "registers": {} }],
            "layout": { "runtime_name": "Fibers", "occupancy_width": 8 }
        }"#,
    )
    .unwrap();

    let layout = image.layout().unwrap();
    assert_eq!(layout.runtime_name, "Fibers");
    assert_eq!(layout.occupancy_width, 8);
    assert_eq!(layout.saved_region_words, 6);
}
