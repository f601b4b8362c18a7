use chrono::Local;
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the process-wide logger.
///
/// `RUST_LOG` overrides `level`. Each line is stamped with the local time.
/// Calling this more than once is harmless.
pub fn init(level: LevelFilter) {
    INIT.call_once(|| {
        let result = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    Local::now().to_rfc3339(),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .try_init();

        match result {
            Ok(()) => log::info!("Logging initialized"),
            Err(e) => eprintln!("Failed to initialize logger: {}", e),
        }
    });
}
