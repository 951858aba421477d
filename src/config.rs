use std::fs;
use std::path::Path;

use thiserror::Error;

/// Scheduling policy, fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPolicy {
    Fcfs,
    RoundRobin,
}

impl SchedulerPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            SchedulerPolicy::Fcfs => "First Come First Serve",
            SchedulerPolicy::RoundRobin => "Round Robin",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0}: {1}")]
    Unreadable(String, std::io::Error),
    #[error("missing config key: {0}")]
    MissingKey(&'static str),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{0}")]
    Invalid(String),
}

/// Emulator configuration, read from a flat whitespace-separated
/// key/value file (one pair per line).
#[derive(Debug, Clone)]
pub struct Config {
    pub num_cpu: usize,
    pub scheduler: SchedulerPolicy,
    pub quantum_cycles: u64,
    pub batch_process_freq: u64,
    pub min_ins: u64,
    pub max_ins: u64,
    pub delay_per_exec: u64,
    pub max_overall_mem: u64,
    pub mem_per_frame: u64,
    pub min_mem_per_proc: u64,
    pub max_mem_per_proc: u64,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(path.display().to_string(), e))?;
        Config::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Config, ConfigError> {
        let mut num_cpu = None;
        let mut scheduler = None;
        let mut quantum_cycles = None;
        let mut batch_process_freq = None;
        let mut min_ins = None;
        let mut max_ins = None;
        let mut delay_per_exec = None;
        let mut max_overall_mem = None;
        let mut mem_per_frame = None;
        let mut min_mem_per_proc = None;
        let mut max_mem_per_proc = None;

        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let key = match parts.next() {
                Some(k) => k,
                None => continue,
            };
            let value = parts.next().unwrap_or("");

            match key {
                "num-cpu" => num_cpu = Some(parse_int("num-cpu", value)? as usize),
                "scheduler" => scheduler = Some(parse_policy(value)?),
                "quantum-cycles" => quantum_cycles = Some(parse_int("quantum-cycles", value)?),
                "batch-process-freq" => {
                    batch_process_freq = Some(parse_int("batch-process-freq", value)?)
                }
                "min-ins" => min_ins = Some(parse_int("min-ins", value)?),
                "max-ins" => max_ins = Some(parse_int("max-ins", value)?),
                "delay-per-exec" => delay_per_exec = Some(parse_int("delay-per-exec", value)?),
                "max-overall-mem" => max_overall_mem = Some(parse_int("max-overall-mem", value)?),
                "mem-per-frame" => mem_per_frame = Some(parse_int("mem-per-frame", value)?),
                "min-mem-per-proc" => {
                    min_mem_per_proc = Some(parse_int("min-mem-per-proc", value)?)
                }
                "max-mem-per-proc" => {
                    max_mem_per_proc = Some(parse_int("max-mem-per-proc", value)?)
                }
                _ => {} // unrecognized keys are ignored
            }
        }

        let config = Config {
            num_cpu: num_cpu.ok_or(ConfigError::MissingKey("num-cpu"))?,
            scheduler: scheduler.ok_or(ConfigError::MissingKey("scheduler"))?,
            quantum_cycles: quantum_cycles.ok_or(ConfigError::MissingKey("quantum-cycles"))?,
            batch_process_freq: batch_process_freq
                .ok_or(ConfigError::MissingKey("batch-process-freq"))?,
            min_ins: min_ins.ok_or(ConfigError::MissingKey("min-ins"))?,
            max_ins: max_ins.ok_or(ConfigError::MissingKey("max-ins"))?,
            delay_per_exec: delay_per_exec.ok_or(ConfigError::MissingKey("delay-per-exec"))?,
            max_overall_mem: max_overall_mem.ok_or(ConfigError::MissingKey("max-overall-mem"))?,
            mem_per_frame: mem_per_frame.ok_or(ConfigError::MissingKey("mem-per-frame"))?,
            min_mem_per_proc: min_mem_per_proc
                .ok_or(ConfigError::MissingKey("min-mem-per-proc"))?,
            max_mem_per_proc: max_mem_per_proc
                .ok_or(ConfigError::MissingKey("max-mem-per-proc"))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// True when main memory is managed as a single flat region instead of
    /// fixed-size frames.
    pub fn is_flat(&self) -> bool {
        self.max_overall_mem == self.mem_per_frame
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cpu == 0 {
            return Err(ConfigError::Invalid(String::from(
                "num-cpu must be at least 1",
            )));
        }
        if self.scheduler == SchedulerPolicy::RoundRobin && self.quantum_cycles == 0 {
            return Err(ConfigError::Invalid(String::from(
                "quantum-cycles must be at least 1 for the rr scheduler",
            )));
        }
        if self.batch_process_freq == 0 {
            return Err(ConfigError::Invalid(String::from(
                "batch-process-freq must be at least 1",
            )));
        }
        if self.min_ins == 0 || self.min_ins > self.max_ins {
            return Err(ConfigError::Invalid(String::from(
                "instruction range must satisfy 1 <= min-ins <= max-ins",
            )));
        }
        if self.mem_per_frame == 0 || self.max_overall_mem % self.mem_per_frame != 0 {
            return Err(ConfigError::Invalid(String::from(
                "mem-per-frame must be nonzero and divide max-overall-mem",
            )));
        }
        if !self.min_mem_per_proc.is_power_of_two() || !self.max_mem_per_proc.is_power_of_two() {
            return Err(ConfigError::Invalid(String::from(
                "min-mem-per-proc and max-mem-per-proc must be powers of two",
            )));
        }
        if self.min_mem_per_proc > self.max_mem_per_proc {
            return Err(ConfigError::Invalid(String::from(
                "min-mem-per-proc must not exceed max-mem-per-proc",
            )));
        }
        Ok(())
    }
}

fn parse_int(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: String::from(value),
    })
}

fn parse_policy(value: &str) -> Result<SchedulerPolicy, ConfigError> {
    // The config file carries the policy quoted, e.g. scheduler "rr".
    match value.trim_matches('"') {
        "fcfs" => Ok(SchedulerPolicy::Fcfs),
        "rr" => Ok(SchedulerPolicy::RoundRobin),
        other => Err(ConfigError::InvalidValue {
            key: "scheduler",
            value: String::from(other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "\
num-cpu 4
scheduler \"rr\"
quantum-cycles 5
batch-process-freq 1
min-ins 1000
max-ins 2000
delay-per-exec 0
max-overall-mem 16384
mem-per-frame 16
min-mem-per-proc 64
max-mem-per-proc 4096
";

    #[test]
    fn parses_a_full_config() {
        let config = Config::parse(FULL).unwrap();
        assert_eq!(config.num_cpu, 4);
        assert_eq!(config.scheduler, SchedulerPolicy::RoundRobin);
        assert_eq!(config.quantum_cycles, 5);
        assert_eq!(config.max_overall_mem, 16384);
        assert!(!config.is_flat());
    }

    #[test]
    fn flat_mode_when_frame_covers_all_memory() {
        let text = FULL.replace("mem-per-frame 16", "mem-per-frame 16384");
        let config = Config::parse(&text).unwrap();
        assert!(config.is_flat());
    }

    #[test]
    fn accepts_unquoted_scheduler_value() {
        let text = FULL.replace("\"rr\"", "fcfs");
        let config = Config::parse(&text).unwrap();
        assert_eq!(config.scheduler, SchedulerPolicy::Fcfs);
    }

    #[test]
    fn missing_key_is_an_error() {
        let text = FULL.replace("num-cpu 4\n", "");
        assert!(matches!(
            Config::parse(&text),
            Err(ConfigError::MissingKey("num-cpu"))
        ));
    }

    #[test]
    fn rejects_non_power_of_two_process_memory() {
        let text = FULL.replace("min-mem-per-proc 64", "min-mem-per-proc 65");
        assert!(Config::parse(&text).is_err());
    }

    #[test]
    fn rejects_inverted_instruction_range() {
        let text = FULL.replace("min-ins 1000", "min-ins 4000");
        assert!(Config::parse(&text).is_err());
    }

    #[test]
    fn rejects_frame_size_not_dividing_memory() {
        let text = FULL.replace("mem-per-frame 16", "mem-per-frame 100");
        assert!(Config::parse(&text).is_err());
    }
}
