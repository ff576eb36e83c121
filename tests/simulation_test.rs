use std::process::Command;

fn run_headless(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_vending_tycoon"))
        .args(args)
        .env("RUST_LOG", "warn,vending_tycoon=info")
        .output()
        .expect("Failed to execute simulation")
}

/// Test that the simulation runs in headless mode without crashing
#[test]
fn test_headless_simulation_runs() {
    let output = run_headless(&["--ticks", "300"]);

    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
}

/// Test that the summary is logged and the map is drawn
#[test]
fn test_simulation_summary_logged() {
    let output = run_headless(&["--ticks", "200", "--seed", "7"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    for needle in ["Simulation Summary", "Warehouse:", "Road tiles:", "Cash: $"] {
        assert!(stderr.contains(needle), "Missing '{}' in log", needle);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Legend:"), "Map was not drawn");
    assert!(stdout.contains('W'));
}

/// Test that the trucks leave the warehouse during the run
#[test]
fn test_trucks_dispatched_during_simulation() {
    let output = run_headless(&["--ticks", "100"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Dispatching"),
        "No truck was dispatched. stderr: {}",
        stderr
    );
}

/// Test that a save written by the binary loads back
#[test]
fn test_save_file_written() {
    let path = std::env::temp_dir().join(format!("vending_tycoon_{}.sav", std::process::id()));
    let path_arg = path.to_string_lossy().to_string();

    let output = run_headless(&["--ticks", "50", "--save", &path_arg]);
    assert!(output.status.success(), "Simulation failed to run");

    let bytes = std::fs::read(&path).expect("save file missing");
    let snapshot = vending_tycoon::simulation::load(&bytes).expect("save should load");
    assert_eq!(snapshot.engine.tick_count, 50);
    let _ = std::fs::remove_file(&path);
}

/// Test that a bad config file is reported instead of ignored
#[test]
fn test_invalid_config_fails() {
    let path = std::env::temp_dir().join(format!("vending_tycoon_{}.toml", std::process::id()));
    std::fs::write(&path, "truck_capacity = 0\n").expect("write config");
    let path_arg = path.to_string_lossy().to_string();

    let output = run_headless(&["--ticks", "1", "--config", &path_arg]);
    assert!(!output.status.success());
    let _ = std::fs::remove_file(&path);
}
