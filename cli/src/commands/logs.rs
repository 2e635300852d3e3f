use std::os::unix::process::CommandExt;
use std::path::PathBuf;

use color_eyre::eyre::Result;

use crate::config;
use crate::logging::LOG_PREFIX;

fn latest_log_file() -> Option<PathBuf> {
    let prefix = format!("{}.", LOG_PREFIX);
    let mut log_files: Vec<_> = std::fs::read_dir(config::runtime_dir())
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy())
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".log"))
        })
        .collect();

    // Daily rotation suffixes sort chronologically.
    log_files.sort();
    log_files.pop()
}

pub fn run(lines: usize, follow: bool) -> Result<()> {
    let Some(path) = latest_log_file() else {
        println!("No log files found in {:?}", config::runtime_dir());
        println!("Logs are written when henkan runs with file logging.");
        return Ok(());
    };

    let mut tail = std::process::Command::new("tail");
    tail.args(["-n", &lines.to_string()]);
    if follow {
        tail.arg("-f");
        let err = tail.arg(&path).exec();
        return Err(err.into());
    }

    tail.arg(&path).status()?;
    Ok(())
}
