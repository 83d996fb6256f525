//! End-to-end tests over the assembled stack: simulated board behind the
//! gpio service, control loop talking RPC, supervisor running the real
//! `tankd core` child.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tankd_control::{Controller, NullSink, Params, Phase, RemoteGpio};
use tankd_periph::{PeripheralService, Registry, SimRelay, SimSensor, SimSensorHandle};
use tankd_rpc::{RpcClient, RpcServer, ServerConfig, ServerHandle};
use tankd_supervisor::{ChildCommand, Instance, ParamsStore, RunReason};
use tankd_transport::BindScope;

fn spawn_gpio_service(initial_temp: f64) -> (ServerHandle, SimSensorHandle) {
    let sensor = SimSensor::new(initial_temp);
    let handle = sensor.handle();

    let mut registry = Registry::new();
    registry.register_sensor("tank_temp", Box::new(sensor));
    registry.register_device("peltier", Box::new(SimRelay::new()));
    registry.register_device("fan", Box::new(SimRelay::new()));

    let service = PeripheralService::new(registry, Duration::ZERO);
    let server = RpcServer::bind(
        ServerConfig {
            scope: BindScope::Loopback,
            port: 0,
        },
        service.handler(),
    )
    .expect("gpio service should bind");

    (server.spawn(), handle)
}

fn device_is_on(client: &RpcClient, name: &str) -> bool {
    let value = client
        .call(&json!({"name": name, "operation": "is_on"}))
        .expect("is_on should succeed");
    value.as_bool().expect("is_on should return a bool")
}

fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..600 {
        if check() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

#[test]
fn control_loop_regulates_the_simulated_board() {
    let (gpio, temperature) = spawn_gpio_service(25.0);
    let target = gpio.local_addr().to_string();

    let params = Params {
        low: 20.0,
        high: 24.0,
        fan_retain: 60.0,
        tick_time: 1.0,
    };
    let controller = Arc::new(Controller::new(
        params,
        RemoteGpio::new(RpcClient::new(target.clone())),
    ));

    let runner = {
        let controller = Arc::clone(&controller);
        std::thread::spawn(move || controller.run(&mut NullSink))
    };

    let observer = RpcClient::new(target);

    // Initial phase is cool and the tank is warm: the peltier engages.
    wait_until("peltier on", || device_is_on(&observer, "peltier"));
    assert_eq!(controller.snapshot().expect("running").phase, Phase::Cool);

    // Cool the tank below `low`: the loop goes idle, the peltier stops,
    // and the fan keeps running inside the retain window.
    temperature.set(15.0);
    wait_until("peltier off", || !device_is_on(&observer, "peltier"));
    wait_until("fan retained", || device_is_on(&observer, "fan"));
    assert_eq!(controller.snapshot().expect("running").phase, Phase::Idle);

    // Warm it past `high`: cooling resumes.
    temperature.set(24.5);
    wait_until("peltier back on", || device_is_on(&observer, "peltier"));

    controller.stop();
    runner
        .join()
        .expect("runner should finish")
        .expect("run should succeed");
    gpio.shutdown();
}

#[test]
fn supervised_child_regulates_and_mirrors() {
    let (gpio, temperature) = spawn_gpio_service(25.0);
    let gpio_port = gpio.local_addr().port();

    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let settings_path = dir.path().join("settings.yaml");
    let mut settings = std::fs::File::create(&settings_path).expect("settings file");
    writeln!(settings, "gpio:\n  addr: \"127.0.0.1\"\n  port: {gpio_port}")
        .expect("settings write");
    drop(settings);

    let store = ParamsStore::new(dir.path().join("params.yaml"));
    store
        .save(&Params {
            low: 20.0,
            high: 24.0,
            fan_retain: 60.0,
            tick_time: 1.0,
        })
        .expect("params should save");

    let instance = Instance::new(ChildCommand {
        program: PathBuf::from(env!("CARGO_BIN_EXE_tankd")),
        args: vec![
            "--config".to_string(),
            settings_path.display().to_string(),
            "core".to_string(),
        ],
    });

    instance
        .start(&store.load().expect("params should load"))
        .expect("start should succeed");

    // The side-channel delivers params first, then per-tick state.
    wait_until("mirrored params", || {
        instance.live_mirror().params.is_some()
    });
    wait_until("mirrored state", || instance.live_mirror().state.is_some());

    let mirrored = instance.live_mirror();
    assert_eq!(mirrored.params.expect("params").tick_time, 1.0);

    // The child actually drives the board through the gpio service.
    let observer = RpcClient::new(format!("127.0.0.1:{gpio_port}"));
    wait_until("peltier on", || device_is_on(&observer, "peltier"));

    temperature.set(15.0);
    wait_until("mirrored idle phase", || {
        instance.live_mirror().state.map(|s| s.phase) == Some(Phase::Idle)
    });
    wait_until("peltier off", || !device_is_on(&observer, "peltier"));

    instance.stop().expect("stop should succeed");
    let (running, run_info) = instance.status();
    assert!(!running);
    assert_eq!(run_info.reason, RunReason::Stopped);
    assert_eq!(instance.live_mirror(), Default::default());

    gpio.shutdown();
}

#[test]
fn unreachable_gpio_service_degrades_but_does_not_kill_the_loop() {
    // Bind then shut down immediately so the port is dead.
    let (gpio, _temperature) = spawn_gpio_service(25.0);
    let target = gpio.local_addr().to_string();
    gpio.shutdown();

    let params = Params {
        low: 20.0,
        high: 24.0,
        fan_retain: 60.0,
        tick_time: 1.0,
    };
    let controller = Arc::new(Controller::new(
        params,
        RemoteGpio::new(RpcClient::new(target)),
    ));

    let runner = {
        let controller = Arc::clone(&controller);
        std::thread::spawn(move || controller.run(&mut NullSink))
    };

    // The loop keeps ticking in degraded mode rather than halting.
    wait_until("loop armed", || controller.is_running());
    std::thread::sleep(Duration::from_millis(1200));
    assert!(controller.is_running());

    controller.stop();
    runner
        .join()
        .expect("runner should finish")
        .expect("run should succeed");
}
