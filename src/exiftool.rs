use crate::error::ExifToolError;
use crate::export::{MetadataRequest, MetadataWriter};
use crate::utils::string_list;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

/// Printed on stdout by `-stay_open` after every command.
const READY: &str = "{ready}";
/// How long messages on stderr may trail the `{ready}` line.
const STDERR_GRACE: Duration = Duration::from_millis(50);
const STDERR_POLL: Duration = Duration::from_millis(5);

/// Options for every metadata write: UTF-8 IPTC strings, no `_original`
/// backup, and the file's modification time left as it was.
const WRITE_ARGS: &[&str] = &[
    "-charset",
    "iptc=UTF8",
    "-codedcharacterset=utf8",
    "-overwrite_original",
    "-P",
];

/// A long-running `exiftool -stay_open` process writing metadata into
/// exported copies.
///
/// Commands go over stdin one at a time. The process is told to exit when
/// this is dropped.
#[derive(Debug)]
pub struct ExifTool {
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr: Receiver<String>,
    child: Child,
}

#[derive(Debug, Default, Deserialize)]
struct Keywords {
    #[serde(rename = "Keywords", default, deserialize_with = "string_list")]
    keywords: Vec<String>,
}

fn pipe<T>(stream: Option<T>, name: &str) -> io::Result<T> {
    stream.ok_or_else(|| io::Error::other(format!("exiftool has no {name}")))
}

impl ExifTool {
    /// Starts `exiftool` from the `PATH`.
    pub fn new() -> Result<Self, ExifToolError> {
        Self::with_executable(Path::new("exiftool"))
    }

    pub fn with_executable(executable: &Path) -> Result<Self, ExifToolError> {
        let mut child = Command::new(executable)
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ExifToolError::ExifToolNotFound)?;
        let stdin = pipe(child.stdin.take(), "stdin")?;
        let stdout = pipe(child.stdout.take(), "stdout")?;
        let stderr = pipe(child.stderr.take(), "stderr")?;

        // A full stderr pipe would stall exiftool before it prints {ready}.
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if sender.send(line).is_err() {
                    break;
                }
            }
        });

        debug!("Started {}", executable.display());
        Ok(Self {
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            stderr: receiver,
            child,
        })
    }

    /// Runs one command, one argument per line, and returns the lines it
    /// printed before `{ready}`.
    fn command(&mut self, args: &[String]) -> Result<Vec<String>, ExifToolError> {
        // Leftovers from an earlier command would be blamed on this one.
        while self.stderr.try_recv().is_ok() {}

        for arg in args {
            writeln!(self.stdin, "{arg}")?;
        }
        writeln!(self.stdin, "-execute")?;
        self.stdin.flush()?;

        let output = self.read_until_ready()?;
        let stderr = self.stderr_lines()?;
        match check_stderr(&stderr, &args.join(" ")) {
            Some(err) => Err(err),
            None => Ok(output),
        }
    }

    fn read_until_ready(&mut self) -> Result<Vec<String>, ExifToolError> {
        let mut output = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                let stderr: Vec<String> = self.stderr.try_iter().collect();
                if stderr.is_empty() {
                    return Err(ExifToolError::ProcessTerminated);
                }
                return Err(ExifToolError::ExifToolProcess {
                    message: "process terminated".to_string(),
                    std_err: stderr.join("\n"),
                    command_args: String::new(),
                });
            }
            let line = line.trim_end();
            if line == READY {
                return Ok(output);
            }
            output.push(line.to_string());
        }
    }

    /// What arrived on stderr for the last command, waiting briefly for
    /// stragglers.
    fn stderr_lines(&mut self) -> Result<Vec<String>, ExifToolError> {
        let deadline = Instant::now() + STDERR_GRACE;
        let mut lines = Vec::new();
        loop {
            match self.stderr.try_recv() {
                Ok(line) => lines.push(line),
                Err(TryRecvError::Empty) if lines.is_empty() && Instant::now() < deadline => {
                    thread::sleep(STDERR_POLL)
                }
                Err(TryRecvError::Empty) => return Ok(lines),
                Err(TryRecvError::Disconnected) if lines.is_empty() => {
                    return Err(ExifToolError::StderrDisconnected)
                }
                Err(TryRecvError::Disconnected) => return Ok(lines),
            }
        }
    }

    /// IPTC keywords already stored in the file.
    pub fn read_keywords(&mut self, path: &Path) -> Result<Vec<String>, ExifToolError> {
        let path_arg = path.to_string_lossy().into_owned();
        let args = vec!["-json".to_string(), "-IPTC:Keywords".to_string(), path_arg.clone()];
        let output = self.command(&args)?.join("\n");

        let mut de = serde_json::Deserializer::from_str(&output);
        let found: Vec<Keywords> = serde_path_to_error::deserialize(&mut de)?;
        de.end()?;
        found
            .into_iter()
            .next()
            .map(|found| found.keywords)
            .ok_or_else(|| ExifToolError::UnexpectedFormat {
                path: path_arg,
                command_args: args.join(" "),
            })
    }
}

/// The first error exiftool reported, if any. Warnings are only logged.
fn check_stderr(lines: &[String], command_args: &str) -> Option<ExifToolError> {
    for line in lines {
        if let Some(file) = line.strip_prefix("Error: File not found - ") {
            return Some(ExifToolError::FileNotFound {
                path: PathBuf::from(file.trim()),
                command_args: command_args.to_string(),
            });
        }
        if line.contains("Error:") {
            return Some(ExifToolError::ExifToolProcess {
                message: line.clone(),
                std_err: lines.join("\n"),
                command_args: command_args.to_string(),
            });
        }
        if line.contains("Warning:") {
            warn!("ExifTool {line} ({command_args})");
        }
    }
    None
}

impl MetadataWriter for ExifTool {
    fn write_metadata(&mut self, path: &Path, request: &MetadataRequest) -> Result<(), ExifToolError> {
        let existing = if request.keywords.is_empty() {
            Vec::new()
        } else {
            self.read_keywords(path)?
        };
        let mut args: Vec<String> = WRITE_ARGS.iter().map(|arg| arg.to_string()).collect();
        args.extend(tag_assignments(request, &existing));
        args.push(path.to_string_lossy().into_owned());

        self.command(&args)?;
        debug!("Wrote metadata to {}", path.display());
        Ok(())
    }
}

/// `-TAG=value` arguments for `request`. Requested keywords are merged with
/// `existing` ones; keywords are left untouched when none are requested.
pub fn tag_assignments(request: &MetadataRequest, existing: &[String]) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(caption) = &request.caption {
        args.push(format!("-IPTC:Headline={}", one_line(caption)));
    }
    if let Some(rating) = request.rating {
        args.push(format!("-XMP:Rating={rating}"));
    }
    if let Some(comment) = &request.comment {
        args.push(format!("-IPTC:Caption-Abstract={}", one_line(comment)));
    }
    if !request.keywords.is_empty() {
        let merged: BTreeSet<&str> = existing
            .iter()
            .map(String::as_str)
            .chain(request.keywords.iter().map(String::as_str))
            .collect();
        args.extend(merged.into_iter().map(|k| format!("-IPTC:Keywords={}", one_line(k))));
    }
    args
}

/// The argument file exiftool reads from stdin is line based.
fn one_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

impl Drop for ExifTool {
    fn drop(&mut self) {
        let shutdown = writeln!(self.stdin, "-stay_open\nFalse\n-execute").and_then(|()| self.stdin.flush());
        if shutdown.is_err() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
