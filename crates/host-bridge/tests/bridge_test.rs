//! Integration tests running real guest modules through the bridge
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

mod common;

use common::util::*;
use host_bridge::{
    execute,
    scene::{math::Vector3, register_node, Node3D, NodeRegistry, SpatialNode},
    BridgeError, Options,
};
use std::sync::Arc;

/// Writes "hi" and a lone line feed to `fd`, storing the byte count at 100
/// and the status at 104.
fn hello_program(fd: i32) -> String {
    format!(
        r#"(module
            (import "wasi_snapshot_preview1" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "\40\00\00\00\02\00\00\00\46\00\00\00\01\00\00\00")
            (data (i32.const 64) "hi")
            (data (i32.const 70) "\0a")
            (func (export "_start")
                (i32.store (i32.const 104)
                    (call $fd_write (i32.const {}) (i32.const 0) (i32.const 2) (i32.const 100)))))"#,
        fd
    )
}

const EXIT_PROGRAM: &str = r#"(module
    (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
    (memory (export "memory") 1)
    (func (export "_start")
        (call $proc_exit (i32.const 7))
        unreachable))"#;

/// Moves the node whose handle is the argument to (1, 2, 3) and reads its
/// position back into offset 32.
const MOVE_PROGRAM: &str = r#"(module
    (import "godot" "node3D_set_position" (func $set_position (param i64 i64)))
    (import "godot" "node3D_get_position" (func $get_position (param i64 i64)))
    (import "godot" "node3D_set_rotation_order" (func $set_order (param i64 i64)))
    (memory (export "memory") 1)
    (data (i32.const 0) "\00\00\80\3f\00\00\00\40\00\00\40\40")
    (func (export "move") (param $node i64)
        (call $set_position (local.get $node) (i64.const 0))
        (call $get_position (local.get $node) (i64.const 32)))
    (func (export "move_far") (param $node i64)
        (call $set_position (local.get $node) (i64.const 65534)))
    (func (export "bad_order") (param $node i64)
        (call $set_order (local.get $node) (i64.const 9))))"#;

#[test]
fn fd_write_counts_line_feed_but_prints_text_only() {
    setup();
    let options = options(r#"{"capabilities": ["print"]}"#);
    let (mut guest, transcript) = Guest::new(&hello_program(1), options, Arc::new(NodeRegistry::new()));
    guest.call("_start").unwrap();

    assert_eq!(guest.read_u32(100), 3);
    assert_eq!(guest.read_u32(104), 0);
    let transcript = transcript.lock().unwrap();
    assert_eq!(transcript.stdout, vec!["hi"]);
    assert!(transcript.stderr.is_empty());
}

#[test]
fn fd_write_to_other_descriptors_goes_to_errors() {
    setup();
    let options = options(r#"{"capabilities": ["print"]}"#);
    let (mut guest, transcript) = Guest::new(&hello_program(2), options, Arc::new(NodeRegistry::new()));
    guest.call("_start").unwrap();

    let transcript = transcript.lock().unwrap();
    assert!(transcript.stdout.is_empty());
    assert_eq!(transcript.stderr, vec!["hi"]);
}

#[test]
fn fd_write_without_print_traps() {
    setup();
    let (mut guest, transcript) =
        Guest::new(&hello_program(1), Options::default(), Arc::new(NodeRegistry::new()));
    let error = guest.call("_start").unwrap_err();

    assert!(matches!(bridge_error(&error), Some(BridgeError::PermissionDenied)));
    assert_eq!(guest.read_u32(100), 0);
    assert!(transcript.lock().unwrap().stdout.is_empty());
}

#[test]
fn execute_returns_the_exit_code() {
    setup();
    let (services, _) = RecordingServices::new();
    let code = execute(
        EXIT_PROGRAM.as_bytes(),
        options(r#"{"capabilities": ["exit"]}"#),
        Box::new(services),
        Arc::new(NodeRegistry::new()),
    )
    .unwrap();
    assert_eq!(code, 7);
}

#[test]
fn execute_without_exit_capability_fails() {
    setup();
    let (services, _) = RecordingServices::new();
    let error = execute(
        EXIT_PROGRAM.as_bytes(),
        Options::default(),
        Box::new(services),
        Arc::new(NodeRegistry::new()),
    )
    .unwrap_err();
    assert!(matches!(bridge_error(&error), Some(BridgeError::PermissionDenied)));
}

#[test]
fn execute_prints_and_returns_zero() {
    setup();
    let (services, transcript) = RecordingServices::new();
    let code = execute(
        hello_program(1).as_bytes(),
        options(r#"{"capabilities": ["print"]}"#),
        Box::new(services),
        Arc::new(NodeRegistry::new()),
    )
    .unwrap();
    assert_eq!(code, 0);
    assert_eq!(transcript.lock().unwrap().stdout, vec!["hi"]);
}

#[test]
fn unknown_import_fails_before_running() {
    setup();
    let (services, transcript) = RecordingServices::new();
    let program = r#"(module
        (import "wasi_snapshot_preview1" "path_open" (func (param i32)))
        (func (export "_start")))"#;
    let error = execute(
        program.as_bytes(),
        Options::default(),
        Box::new(services),
        Arc::new(NodeRegistry::new()),
    )
    .unwrap_err();
    match bridge_error(&error) {
        Some(BridgeError::UnknownHostFunction(name)) => {
            assert_eq!(name, "wasi_snapshot_preview1.path_open")
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(transcript.lock().unwrap().stdout.is_empty());
}

#[test]
fn argument_sizes_agree_with_arguments() {
    setup();
    let program = r#"(module
        (import "wasi_snapshot_preview1" "args_sizes_get"
            (func $args_sizes_get (param i32 i32) (result i32)))
        (import "wasi_snapshot_preview1" "args_get"
            (func $args_get (param i32 i32) (result i32)))
        (memory (export "memory") 1)
        (func (export "_start")
            (i32.store (i32.const 8) (call $args_sizes_get (i32.const 0) (i32.const 4)))
            (i32.store (i32.const 12) (call $args_get (i32.const 16) (i32.const 64)))))"#;
    let options = options(
        r#"{"program_arguments": ["--foo", "bar", "--a=1", "baz", "--x"],
            "capabilities": ["args"]}"#,
    );
    let (mut guest, _) = Guest::new(program, options, Arc::new(NodeRegistry::new()));
    guest.call("_start").unwrap();

    assert_eq!(guest.read_u32(8), 0);
    assert_eq!(guest.read_u32(12), 0);
    assert_eq!(guest.read_u32(0), 2);
    assert_eq!(guest.read_u32(4), 12);
    assert_eq!(guest.read_u32(16), 64);
    assert_eq!(guest.read_u32(20), 72);
    assert_eq!(guest.read_memory(64, 12), b"foo=bar\0a=1\0".to_vec());
}

#[test]
fn environment_is_empty_without_capabilities() {
    setup();
    let program = r#"(module
        (import "wasi_snapshot_preview1" "environ_sizes_get"
            (func $environ_sizes_get (param i32 i32) (result i32)))
        (import "wasi_snapshot_preview1" "environ_get"
            (func $environ_get (param i32 i32) (result i32)))
        (memory (export "memory") 1)
        (data (i32.const 0) "\ff\ff\ff\ff\ff\ff\ff\ff")
        (func (export "_start")
            (i32.store (i32.const 8) (call $environ_sizes_get (i32.const 0) (i32.const 4)))
            (i32.store (i32.const 12) (call $environ_get (i32.const 16) (i32.const 32)))))"#;
    let (mut guest, _) = Guest::new(program, Options::default(), Arc::new(NodeRegistry::new()));
    guest.call("_start").unwrap();

    assert_eq!(guest.read_memory(0, 16), vec![0u8; 16]);
}

#[test]
fn clocks_and_randomness_come_from_the_services() {
    setup();
    let program = r#"(module
        (import "wasi_snapshot_preview1" "clock_time_get"
            (func $clock_time_get (param i32 i64 i32) (result i32)))
        (import "wasi_snapshot_preview1" "random_get"
            (func $random_get (param i32 i32) (result i32)))
        (memory (export "memory") 1)
        (func (export "_start")
            (drop (call $clock_time_get (i32.const 0) (i64.const 1000) (i32.const 16)))
            (drop (call $clock_time_get (i32.const 1) (i64.const 0) (i32.const 24)))
            (drop (call $clock_time_get (i32.const 3) (i64.const 0) (i32.const 32)))
            (i32.store (i32.const 8) (call $random_get (i32.const 40) (i32.const 8)))))"#;
    let options = options(r#"{"capabilities": ["time", "random"]}"#);
    let (mut guest, _) = Guest::new(program, options, Arc::new(NodeRegistry::new()));
    guest.call("_start").unwrap();

    assert_eq!(guest.read_u64(16), REALTIME_NANOS);
    assert_eq!(guest.read_u64(24), MONOTONIC_NANOS);
    assert_eq!(guest.read_u64(32), MONOTONIC_NANOS);
    assert_eq!(guest.read_u32(8), 0);
    assert_eq!(guest.read_memory(40, 8), vec![1, 8, 15, 22, 29, 36, 43, 50]);
}

#[test]
fn denied_calls_trap_without_writing() {
    setup();
    let program = r#"(module
        (import "wasi_snapshot_preview1" "random_get"
            (func $random_get (param i32 i32) (result i32)))
        (import "wasi_snapshot_preview1" "clock_time_get"
            (func $clock_time_get (param i32 i64 i32) (result i32)))
        (import "wasi_snapshot_preview1" "args_sizes_get"
            (func $args_sizes_get (param i32 i32) (result i32)))
        (memory (export "memory") 1)
        (data (i32.const 0) "\5a\5a\5a\5a\5a\5a\5a\5a\5a\5a\5a\5a\5a\5a\5a\5a")
        (func (export "random")
            (drop (call $random_get (i32.const 0) (i32.const 8))))
        (func (export "clock")
            (drop (call $clock_time_get (i32.const 0) (i64.const 0) (i32.const 0))))
        (func (export "args")
            (drop (call $args_sizes_get (i32.const 0) (i32.const 4)))))"#;
    let options = options(
        r#"{"program_arguments": ["--k=v"], "capabilities": ["print", "exit"]}"#,
    );
    let (mut guest, _) = Guest::new(program, options, Arc::new(NodeRegistry::new()));

    for name in &["random", "clock", "args"] {
        let error = guest.call(name).unwrap_err();
        assert!(
            matches!(bridge_error(&error), Some(BridgeError::PermissionDenied)),
            "{} was not denied",
            name
        );
    }
    assert_eq!(guest.read_memory(0, 16), vec![0x5a; 16]);
}

#[test]
fn guest_moves_a_host_node() {
    setup();
    let nodes = Arc::new(NodeRegistry::new());
    let (handle, node) = register_node(&nodes, SpatialNode::new());
    let (mut guest, _) = Guest::new(MOVE_PROGRAM, Options::default(), Arc::clone(&nodes));
    guest.call_with("move", handle.into_raw() as i64).unwrap();

    assert_eq!(node.lock().unwrap().get_position(), Vector3::new(1.0, 2.0, 3.0));
    assert_eq!(guest.read_f32s(32, 3), vec![1.0, 2.0, 3.0]);
}

#[test]
fn released_handles_are_ignored() {
    setup();
    let nodes = Arc::new(NodeRegistry::new());
    let (handle, node) = register_node(&nodes, SpatialNode::new());
    nodes.remove(handle).unwrap();
    let (mut guest, _) = Guest::new(MOVE_PROGRAM, Options::default(), Arc::clone(&nodes));

    guest.call_with("move", handle.into_raw() as i64).unwrap();
    guest.call_with("move", 0).unwrap();
    assert_eq!(node.lock().unwrap().get_position(), Vector3::ZERO);
    assert_eq!(guest.read_memory(32, 12), vec![0u8; 12]);
}

#[test]
fn bad_node_arguments_trap() {
    setup();
    let nodes = Arc::new(NodeRegistry::new());
    let (handle, node) = register_node(&nodes, SpatialNode::new());
    let (mut guest, _) = Guest::new(MOVE_PROGRAM, Options::default(), Arc::clone(&nodes));

    let error = guest.call_with("move_far", handle.into_raw() as i64).unwrap_err();
    assert!(matches!(bridge_error(&error), Some(BridgeError::OutOfBounds { .. })));
    let error = guest.call_with("bad_order", handle.into_raw() as i64).unwrap_err();
    assert!(matches!(bridge_error(&error), Some(BridgeError::InvalidArgument)));
    assert_eq!(node.lock().unwrap().get_position(), Vector3::ZERO);
}

#[test]
fn node_calls_need_guest_memory() {
    setup();
    let nodes = Arc::new(NodeRegistry::new());
    let (handle, node) = register_node(&nodes, SpatialNode::new());
    let program = r#"(module
        (import "godot" "node3D_hide" (func $hide (param i64)))
        (func (export "hide") (param $node i64)
            (call $hide (local.get $node))))"#;
    let (mut guest, _) = Guest::new(program, Options::default(), Arc::clone(&nodes));

    let error = guest.call_with("hide", handle.into_raw() as i64).unwrap_err();
    assert!(matches!(bridge_error(&error), Some(BridgeError::InvalidMemory)));
    assert!(node.lock().unwrap().is_visible());
}

#[test]
fn guest_sees_the_parent_and_global_position() {
    setup();
    let nodes = Arc::new(NodeRegistry::new());
    let (parent_handle, parent) = register_node(&nodes, SpatialNode::new());
    parent
        .lock()
        .unwrap()
        .set_position(Vector3::new(10.0, 0.0, 0.0));
    let mut child = SpatialNode::new();
    child.set_parent(parent_handle, &parent);
    child.set_position(Vector3::new(1.0, 0.0, 0.0));
    let (child_handle, _child) = register_node(&nodes, child);

    let program = r#"(module
        (import "godot" "node3D_get_parent_node_3d" (func $get_parent (param i64) (result i64)))
        (import "godot" "node3D_get_global_position" (func $get_global_position (param i64 i64)))
        (memory (export "memory") 1)
        (func (export "inspect") (param $node i64)
            (i64.store (i32.const 0) (call $get_parent (local.get $node)))
            (i64.store (i32.const 8) (call $get_parent (call $get_parent (local.get $node))))
            (call $get_global_position (local.get $node) (i64.const 16))))"#;
    let (mut guest, _) = Guest::new(program, Options::default(), Arc::clone(&nodes));
    guest.call_with("inspect", child_handle.into_raw() as i64).unwrap();

    assert_eq!(guest.read_u64(0), parent_handle.into_raw());
    assert_eq!(guest.read_u64(8), 0);
    assert_eq!(guest.read_f32s(16, 3), vec![11.0, 0.0, 0.0]);
}
