use std::io::Write;

/// Initialise env_logger. `RUST_LOG` wins when set.
pub fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        })
        .init();
}

/// Measures an operation; slow ones are logged when the timer drops.
pub struct Timer {
    name: String,
    start: std::time::Instant,
}

impl Timer {
    pub const SLOW_THRESHOLD_MS: u128 = 1000;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: std::time::Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    pub fn debug(&self, request_id: &str) {
        log::debug!(
            "[{}] {} completed in {}ms",
            request_id,
            self.name,
            self.elapsed_ms()
        );
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        if elapsed > Self::SLOW_THRESHOLD_MS {
            log::warn!("{} took {}ms (slow!)", self.name, elapsed);
        }
    }
}
