use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("ember").unwrap();
    cmd.assert().success();
}

#[test]
fn runs_factorial_from_source() {
    let mut cmd = Command::cargo_bin("ember").unwrap();
    cmd.arg("run").arg("tests/files/factorial.asm");

    cmd.assert()
        .success()
        .stdout(contains("120"))
        .stdout(contains("R0=0x0078"))
        .stdout(contains("SP=0xffff"))
        .stdout(contains("Halted"));
}

#[test]
fn runs_hello_world() {
    let mut cmd = Command::cargo_bin("ember").unwrap();
    cmd.arg("run").arg("tests/files/hello.asm");

    cmd.assert()
        .success()
        .stdout(contains("Hello, world!"))
        .stdout(contains("Halted"));
}

#[test]
fn assembles_then_runs_binary() {
    let bin = std::env::temp_dir().join("ember_factorial.bin");

    let mut cmd = Command::cargo_bin("ember").unwrap();
    cmd.arg("assemble")
        .arg("tests/files/factorial.asm")
        .arg(&bin);
    cmd.assert().success().stdout(contains("Saved"));

    let mut cmd = Command::cargo_bin("ember").unwrap();
    cmd.arg("run").arg(&bin);
    cmd.assert().success().stdout(contains("120"));
}

#[test]
fn memdump_shows_code_bytes() {
    let mut cmd = Command::cargo_bin("ember").unwrap();
    cmd.arg("run").arg("tests/files/hello.asm").arg("--memdump");

    cmd.assert().success().stdout(contains("0x0000:"));
}

#[test]
fn check_reports_success() {
    let mut cmd = Command::cargo_bin("ember").unwrap();
    cmd.arg("check").arg("tests/files/hello.asm");

    cmd.assert().success().stdout(contains("0 errors"));
}

#[test]
fn missing_file_fails() {
    let mut cmd = Command::cargo_bin("ember").unwrap();
    cmd.arg("check").arg("tests/files/does_not_exist.asm");

    cmd.assert().failure();
}

#[test]
fn bad_source_fails() {
    let bad = std::env::temp_dir().join("ember_bad.asm");
    std::fs::write(&bad, "MOVI R0, 200\n").unwrap();

    let mut cmd = Command::cargo_bin("ember").unwrap();
    cmd.arg("check").arg(&bad);

    cmd.assert().failure();
}
