use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Appends a timestamped entry to `<log_dir>/<filename>`.
///
/// # Arguments
///
/// * `log_dir` - Directory holding the log files (created if missing)
/// * `filename` - The name of the log file
/// * `message` - The message to log
pub fn log_to_file(log_dir: &Path, filename: &str, message: &str) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(filename))?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

    writeln!(file, "\n--- Log entry at {} ---", timestamp)?;
    writeln!(file, "{}", message)?;
    writeln!(file, "--- End of entry ---\n")?;

    file.flush()?;

    Ok(())
}

/// Logs a message under a formatted header.
pub fn log_with_header(log_dir: &Path, filename: &str, header: &str, message: &str) -> io::Result<()> {
    let formatted_message = format!(
        "===== {} =====\n{}\n====================",
        header, message
    );
    log_to_file(log_dir, filename, &formatted_message)
}

/// Appends a row to a CSV file, writing `headers` first if the file is new.
pub fn log_csv(log_dir: &Path, filename: &str, headers: &[&str], data: &[String]) -> csv::Result<()> {
    fs::create_dir_all(log_dir)?;

    let path = log_dir.join(filename);
    let file_exists = path.exists();

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut wtr = csv::Writer::from_writer(file);

    if !file_exists && !headers.is_empty() {
        wtr.write_record(headers)?;
    }
    wtr.write_record(data)?;
    wtr.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_entries() {
        let dir = tempfile::tempdir().unwrap();
        log_to_file(dir.path(), "run.log", "first").unwrap();
        log_with_header(dir.path(), "run.log", "Summary", "second").unwrap();

        let text = fs::read_to_string(dir.path().join("run.log")).unwrap();
        assert!(text.contains("first"));
        assert!(text.contains("===== Summary =====\nsecond"));
        assert_eq!(text.matches("--- Log entry at").count(), 2);
    }

    #[test]
    fn writes_csv_headers_once() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        for run in ["1", "2"] {
            log_csv(&logs, "runs.csv", &["run", "spikes"], &[run.to_string(), "10".to_string()])
                .unwrap();
        }

        let text = fs::read_to_string(logs.join("runs.csv")).unwrap();
        assert_eq!(text, "run,spikes\n1,10\n2,10\n");
    }
}
