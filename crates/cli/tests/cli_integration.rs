//! CLI integration tests.
//!
//! Every test runs the `provchain` binary inside its own temporary directory
//! so the default `provchain.toml` lookup and ledger file never leak between
//! tests.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

fn provchain(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("provchain");
    cmd.current_dir(dir)
        .env_remove("PROVCHAIN_LEDGER")
        .env_remove("PROVCHAIN_LOG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_json(dir: &Path, name: &str, value: &Value) -> String {
    fs::write(dir.join(name), serde_json::to_vec_pretty(value).unwrap()).unwrap();
    name.to_string()
}

fn stdout_json(cmd: &mut Command) -> Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

fn cultivate(supplier: &str, name: &str) -> Value {
    json!({
        "operation": "cultivate",
        "user": {"id": supplier, "role": "supplier"},
        "request": {"name": name, "price": "3.10", "amount": "250", "unit": "kg"}
    })
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_lists_subcommands() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Supply-chain provenance ledger"))
        .stdout(predicate::str::contains("invoke"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn version_exits_0() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("provchain"));
}

// ──────────────────────────────────────────────
// 2. init / invoke / list
// ──────────────────────────────────────────────

#[test]
fn init_creates_counters_and_ledger_file() {
    let tmp = TempDir::new().unwrap();
    let counters = stdout_json(provchain(tmp.path()).arg("init"));
    assert_eq!(
        counters,
        json!({"GoodSequence": 0, "LotSequence": 0, "OrderSequence": 0})
    );
    assert!(tmp.path().join("provchain-ledger.json").exists());

    // Second init leaves the counters alone.
    let again = stdout_json(provchain(tmp.path()).arg("init"));
    assert_eq!(again, counters);
}

#[test]
fn invoke_cultivate_then_list_goods() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path()).arg("init").assert().success();
    let file = write_json(tmp.path(), "cultivate.json", &cultivate("S1", "Cardamom"));

    let good = stdout_json(provchain(tmp.path()).args(["invoke", &file]));
    assert_eq!(good["id"], "Good1");
    assert_eq!(good["stage"], "CULTIVATED");
    assert_eq!(good["price"], "3.10");
    assert_eq!(good["supplier"]["id"], "S1");

    let goods = stdout_json(provchain(tmp.path()).args(["list", "goods"]));
    assert_eq!(goods.as_array().map(Vec::len), Some(1));
    assert_eq!(goods[0]["name"], "Cardamom");

    let counter = stdout_json(provchain(tmp.path()).args(["counter", "goods"]));
    assert_eq!(counter["value"], 1);
}

#[test]
fn invoke_reads_stdin() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path())
        .args(["invoke", "-"])
        .write_stdin(cultivate("S1", "Saffron").to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Good1\""));
}

#[test]
fn batch_invocation_runs_a_whole_order() {
    let tmp = TempDir::new().unwrap();
    let batch = json!([
        {"operation": "init"},
        cultivate("S1", "Vanilla"),
        {
            "operation": "harvest",
            "user": {"id": "S1", "role": "supplier"},
            "request": {"id": "Good1", "amount": "200"}
        },
        {
            "operation": "createOrder",
            "user": {"id": "R1", "role": "retailer"},
            "request": {
                "lines": [{"goodId": "Good1", "quantity": "10", "qrCode": "QR-1"}],
                "address": "R1 Store"
            }
        },
        {
            "operation": "approveOrder",
            "user": {"id": "M1", "role": "manufacturer", "address": "M1 Plant"},
            "request": {"orderId": "Order1"}
        }
    ]);
    let file = write_json(tmp.path(), "batch.json", &batch);

    let results = stdout_json(provchain(tmp.path()).args(["invoke", &file]));
    assert_eq!(results.as_array().map(Vec::len), Some(5));
    assert_eq!(results[4]["stage"], "APPROVED");

    let lot = stdout_json(provchain(tmp.path()).args(["get", "Lot1"]));
    assert_eq!(lot["stage"], "EXPORTED");
    assert_eq!(lot["goodId"], "Good1");

    let approved =
        stdout_json(provchain(tmp.path()).args(["list", "orders", "--status", "APPROVED"]));
    assert_eq!(approved.as_array().map(Vec::len), Some(1));

    let mine = stdout_json(provchain(tmp.path()).args([
        "list",
        "orders",
        "--owner-role",
        "manufacturer",
        "--owner-id",
        "M1",
    ]));
    assert_eq!(mine[0]["id"], "Order1");

    let history = stdout_json(provchain(tmp.path()).args(["history", "Order1"]));
    assert_eq!(history.as_array().map(Vec::len), Some(2));
    assert_eq!(history[0]["isDelete"], false);
    assert_eq!(history[1]["record"]["stage"], "APPROVED");
}

// ──────────────────────────────────────────────
// 3. Errors
// ──────────────────────────────────────────────

#[test]
fn role_mismatch_exits_1_with_json_error() {
    let tmp = TempDir::new().unwrap();
    let inv = json!({
        "operation": "cultivate",
        "user": {"id": "D1", "role": "distributor"},
        "request": {"name": "x", "price": "1", "amount": "1"}
    });
    let file = write_json(tmp.path(), "bad.json", &inv);

    provchain(tmp.path())
        .args(["--output", "json", "invoke", &file])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("RoleMismatch"));

    let goods = stdout_json(provchain(tmp.path()).args(["list", "goods"]));
    assert_eq!(goods, json!([]));
}

#[test]
fn get_missing_key_fails() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path())
        .args(["get", "Good9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));
}

#[test]
fn unknown_kind_fails() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path())
        .args(["list", "widgets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown entity kind"));
}

#[test]
fn owner_role_requires_owner_id() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path())
        .args(["list", "orders", "--owner-role", "retailer"])
        .assert()
        .failure();
}

#[test]
fn malformed_invocation_fails() {
    let tmp = TempDir::new().unwrap();
    let file = write_json(tmp.path(), "bad.json", &json!({"operation": "teleport"}));
    provchain(tmp.path())
        .args(["invoke", &file])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("InvalidPayload:"))
        .stderr(predicate::str::contains("invalid invocation"));
}

#[test]
fn malformed_decimal_is_invalid_payload() {
    let tmp = TempDir::new().unwrap();
    let mut inv = cultivate("S1", "Pepper");
    inv["request"]["price"] = json!("three");
    let file = write_json(tmp.path(), "price.json", &inv);
    provchain(tmp.path())
        .args(["--output", "json", "invoke", &file])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("InvalidPayload:"));

    fs::write(tmp.path().join("broken.json"), "{not json").unwrap();
    provchain(tmp.path())
        .args(["invoke", "broken.json"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("InvalidPayload:"));
}

#[test]
fn quiet_suppresses_errors() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path())
        .args(["--quiet", "get", "Good1"])
        .assert()
        .failure()
        .stderr(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 4. Configuration
// ──────────────────────────────────────────────

#[test]
fn config_file_selects_ledger_path() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("provchain.toml"),
        "[ledger]\npath = \"chain.json\"\n",
    )
    .unwrap();
    provchain(tmp.path()).arg("init").assert().success();
    assert!(tmp.path().join("chain.json").exists());
    assert!(!tmp.path().join("provchain-ledger.json").exists());
}

#[test]
fn env_and_flag_override_ledger_path() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path())
        .env("PROVCHAIN_LEDGER", "from-env.json")
        .arg("init")
        .assert()
        .success();
    assert!(tmp.path().join("from-env.json").exists());

    provchain(tmp.path())
        .env("PROVCHAIN_LEDGER", "from-env.json")
        .args(["--ledger", "from-flag.json", "init"])
        .assert()
        .success();
    assert!(tmp.path().join("from-flag.json").exists());
}

#[test]
fn explicit_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    provchain(tmp.path())
        .args(["--config", "nope.toml", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn json_logs_go_to_stderr() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("provchain.toml"),
        "[log]\nlevel = \"info\"\njson = true\n",
    )
    .unwrap();
    let file = write_json(tmp.path(), "c.json", &cultivate("S1", "Clove"));
    let output = provchain(tmp.path())
        .args(["invoke", &file])
        .assert()
        .success()
        .get_output()
        .clone();

    let good: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(good["id"], "Good1");
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("committed"));
    assert!(stderr.lines().all(|l| serde_json::from_str::<Value>(l).is_ok()));
}
