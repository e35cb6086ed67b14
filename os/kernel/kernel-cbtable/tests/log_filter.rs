mod common;

use common::*;
use kernel_cbtable::{CbTableDevice, LogCategories, LogConfig, RegionKind};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::{Mutex, MutexGuard, Once};

struct CaptureLogger {
    records: Mutex<Vec<(String, Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if record.target().starts_with("cbtable::") {
            self.records.lock().unwrap().push((
                record.target().to_owned(),
                record.level(),
                record.args().to_string(),
            ));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};
static SERIAL: Mutex<()> = Mutex::new(());

/// Installs the capture logger once and serializes the tests of this file.
fn capture() -> MutexGuard<'static, ()> {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    let guard = SERIAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    LOGGER.records.lock().unwrap().clear();
    guard
}

fn captured() -> Vec<(String, Level, String)> {
    LOGGER.records.lock().unwrap().clone()
}

fn exercise(mem: &FakePhysMemory, log: LogConfig) {
    let mut dev = CbTableDevice::prepare_hardware(mem, root(), log).unwrap();
    dev.power_up().unwrap();
    dev.write(&RegionKind::Timestamps.as_u32().to_le_bytes())
        .unwrap();
    let mut buf = [0u8; 64];
    dev.read(&mut buf).unwrap();
    dev.release_hardware();
}

#[test]
fn every_category_logs_under_its_own_target() {
    let _guard = capture();
    let mem = standard_image().into_memory();
    exercise(&mem, LogConfig::new(LevelFilter::Trace, LogCategories::all()));

    let records = captured();
    for target in ["cbtable::init", "cbtable::pnp", "cbtable::io"] {
        assert!(
            records.iter().any(|(t, _, _)| t == target),
            "no records for {target}: {records:?}"
        );
    }
    assert!(
        records
            .iter()
            .any(|(_, level, msg)| *level == Level::Info && msg.contains("found cbmem console"))
    );
}

#[test]
fn disabled_categories_stay_silent() {
    let _guard = capture();
    let mem = standard_image().into_memory();
    exercise(
        &mem,
        LogConfig::new(LevelFilter::Trace, LogCategories::new().with_io(true)),
    );

    let records = captured();
    assert!(!records.is_empty());
    assert!(records.iter().all(|(t, _, _)| t == "cbtable::io"));
}

#[test]
fn level_limit_applies_to_every_category() {
    let _guard = capture();
    let mem = standard_image().into_memory();
    exercise(&mem, LogConfig::new(LevelFilter::Info, LogCategories::all()));

    let records = captured();
    assert!(!records.is_empty());
    assert!(records.iter().all(|(_, level, _)| *level <= Level::Info));
}

#[test]
fn quiet_config_emits_nothing() {
    let _guard = capture();
    let mem = standard_image().into_memory();
    exercise(&mem, LogConfig::quiet());

    assert!(captured().is_empty());
}
