use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn tmp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("tonelink-cli-tests");
    fs::create_dir_all(&dir).ok();
    dir.join(name)
}

fn run_tonelink(args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_tonelink"))
        .args(args)
        .output()
        .expect("Failed to execute tonelink");

    String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout)
}

#[test]
fn test_send_writes_wav() {
    let output = tmp_path("send_basic.wav");

    let output_text = run_tonelink(&["send", "Test message", output.to_str().unwrap()]);

    assert!(
        output_text.contains("Encoded"),
        "Expected successful encoding but got: {}",
        output_text
    );
    assert!(output.exists(), "Output file was not created");

    // A short message is under a hundred symbol windows at 48kHz/16-bit
    let file_size = fs::metadata(&output).expect("Output file not created").len();
    assert!(file_size > 50_000, "File too small: {} bytes", file_size);
    assert!(file_size < 500_000, "File too large: {} bytes", file_size);
}

#[test]
fn test_send_recv_roundtrip() {
    let wav = tmp_path("roundtrip.wav");

    run_tonelink(&["send", "Hello, World!", wav.to_str().unwrap()]);
    let recv_output = run_tonelink(&["recv", wav.to_str().unwrap()]);

    assert!(
        recv_output.contains("Hello, World!"),
        "Decoded text missing. Got: {}",
        recv_output
    );
    assert!(
        recv_output.contains("1 packets"),
        "Expected exactly one packet. Got: {}",
        recv_output
    );
}

#[test]
fn test_recv_direct_message_addressing() {
    let wav = tmp_path("direct.wav");

    run_tonelink(&[
        "send",
        "--from",
        "3",
        "--to",
        "7",
        "meet at 8",
        wav.to_str().unwrap(),
    ]);
    let recv_output = run_tonelink(&["recv", wav.to_str().unwrap()]);

    assert!(
        recv_output.contains("3 -> 7"),
        "Addressing missing from output: {}",
        recv_output
    );
    assert!(
        recv_output.contains("meet at 8"),
        "Decoded text missing. Got: {}",
        recv_output
    );
}

#[test]
fn test_recv_symbols_flag() {
    let wav = tmp_path("symbols.wav");

    run_tonelink(&["send", "hi", wav.to_str().unwrap()]);
    let recv_output = run_tonelink(&["recv", "--symbols", wav.to_str().unwrap()]);

    assert!(
        recv_output.contains("symbols: 02020202130"),
        "Expected preamble and sync at the start of the symbol stream. Got: {}",
        recv_output
    );
}
