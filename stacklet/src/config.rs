use std::env::var;

/// Sets a configuration field based on an environment variable.
macro_rules! set_from_env {
    ($config:expr, $field:ident, $key:expr, $value_type:ty) => {{
        if let Ok(raw_value) = var(concat!("STACKLET_", $key)) {
            if let Ok(value) = raw_value.parse::<$value_type>() {
                if value > 0 {
                    $config.$field = value;
                }
            }
        };
    }};
}

/// The default size of the stacks used by tests, in bytes.
///
/// This size excludes the guard page.
const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// The default number of switches performed by the tests that switch back and
/// forth repeatedly.
const DEFAULT_SWITCHES: usize = 10_000;

/// The minimum number of switches to perform when switching repeatedly.
const MIN_SWITCHES: usize = 1000;

/// The default number of threads to use for tests that switch concurrently.
const DEFAULT_THREADS: usize = 4;

/// Settings used when testing stack switching.
pub(crate) struct Config {
    /// The size of each stack in bytes.
    pub(crate) stack_size: usize,

    /// The number of times to switch back and forth between two stacks.
    pub(crate) switches: usize,

    /// The number of threads to switch stacks on at the same time.
    pub(crate) threads: usize,
}

impl Config {
    pub(crate) fn new() -> Config {
        Config {
            stack_size: DEFAULT_STACK_SIZE,
            switches: DEFAULT_SWITCHES,
            threads: DEFAULT_THREADS,
        }
    }

    pub(crate) fn from_env() -> Config {
        let mut config = Config::new();

        set_from_env!(config, stack_size, "STACK_SIZE", usize);
        set_from_env!(config, switches, "SWITCHES", usize);
        set_from_env!(config, threads, "THREADS", usize);

        config.verify();
        config
    }

    fn verify(&mut self) {
        if self.switches < MIN_SWITCHES {
            self.switches = MIN_SWITCHES;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(key: &str) -> Result<&str, ()> {
        match key {
            "STACKLET_FOO" => Ok("8"),
            "STACKLET_BAR" => Ok("0"),
            "STACKLET_BAZ" => Ok("nope"),
            _ => Err(()),
        }
    }

    #[test]
    fn test_new() {
        let config = Config::new();

        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(config.switches, DEFAULT_SWITCHES);
        assert_eq!(config.threads, DEFAULT_THREADS);
    }

    #[test]
    fn test_set_from_env() {
        let mut cfg = Config::new();

        set_from_env!(cfg, threads, "FOO", usize);
        assert_eq!(cfg.threads, 8);

        set_from_env!(cfg, threads, "BAR", usize);
        assert_eq!(cfg.threads, 8);

        set_from_env!(cfg, threads, "BAZ", usize);
        assert_eq!(cfg.threads, 8);
    }

    #[test]
    fn test_verify() {
        let mut cfg = Config::new();

        cfg.switches = 5000;
        cfg.verify();
        assert_eq!(cfg.switches, 5000);

        cfg.switches = 10;
        cfg.verify();
        assert_eq!(cfg.switches, MIN_SWITCHES);
    }
}
