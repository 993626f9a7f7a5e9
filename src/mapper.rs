//! The boundary with the technology mapper.
//!
//! The mapper is a black box reading `input.blif`, `stdcells.genlib` and optionally
//! `lutdefs.txt` from a run directory, driven by the `cirkit.script` of that directory, and
//! writing `output.blif` next to them. It is either a separate program
//! ([`ExternalProcess`]) or a function linked into the caller ([`Linked`]); both are
//! called with an argv-style command line `<exe> -f <dir>/cirkit.script`.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::graph::NodeId;

/// Name of the mapper program.
pub const DEFAULT_EXE: &str = "yosys-cirkit";

/// A technology mapper.
pub trait Mapper {
    /// Runs the mapper with the command line `argv`, `argv[0]` being the program.
    ///
    /// Text printed by the mapper is handed to `output`, in chunks ending with a newline
    /// except maybe the last one. Returns the exit status, 0 meaning success.
    fn run(&mut self, argv: &[String], output: &mut dyn FnMut(&str)) -> std::io::Result<i32>;
}

/// A mapper run as a child process. Both its standard output and error are captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalProcess;

impl Mapper for ExternalProcess {
    fn run(&mut self, argv: &[String], output: &mut dyn FnMut(&str)) -> std::io::Result<i32> {
        let Some((program, args)) = argv.split_first() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command line",
            ));
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drained on the side so that a chatty stderr cannot block the child
        let stderr = child.stderr.take().map(|stderr| {
            std::thread::spawn(move || -> std::io::Result<Vec<String>> {
                let mut reader = BufReader::new(stderr);
                let mut lines = Vec::new();
                let mut chunk = Vec::new();
                while reader.read_until(b'\n', &mut chunk)? > 0 {
                    lines.push(String::from_utf8_lossy(&chunk).into_owned());
                    chunk.clear();
                }
                Ok(lines)
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut chunk = Vec::new();
            while reader.read_until(b'\n', &mut chunk)? > 0 {
                output(&String::from_utf8_lossy(&chunk));
                chunk.clear();
            }
        }

        if let Some(handle) = stderr {
            let lines = handle
                .join()
                .map_err(|_| std::io::Error::other("stderr reader panicked"))??;
            for line in &lines {
                output(line);
            }
        }

        let status = child.wait()?;
        // Killed by a signal
        Ok(status.code().unwrap_or(-1))
    }
}

/// A mapper linked into the program, called with the command line and returning a status.
///
/// ```rust
/// use blifmap::mapper::{Linked, Mapper};
/// let mut mapper = Linked(|argv: &[String]| if argv[1] == "-f" { 0 } else { 1 });
/// let argv = ["cirkit".to_string(), "-f".to_string(), "x.script".to_string()];
/// assert_eq!(mapper.run(&argv, &mut |_| {}).unwrap(), 0);
/// ```
pub struct Linked<F>(pub F)
where
    F: FnMut(&[String]) -> i32;

impl<F> Mapper for Linked<F>
where
    F: FnMut(&[String]) -> i32,
{
    fn run(&mut self, argv: &[String], _output: &mut dyn FnMut(&str)) -> std::io::Result<i32> {
        Ok((self.0)(argv))
    }
}

/// The mapper program: `yosys-cirkit` next to the running executable if there is one,
/// else whatever `yosys-cirkit` the `PATH` provides.
pub fn default_exe() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_EXE)))
        .filter(|exe| exe.exists())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXE))
}

/// The `cirkit.script` of a run in `dir`: read the input, run `user_script` (where `{D}`
/// stands for `dir`), write the output.
///
/// ```rust
/// use blifmap::mapper::script_text;
/// let script = script_text("/tmp/run".as_ref(), Some("lut_mapping\nwrite_dot {D}/g.dot\n"));
/// assert_eq!(
///     script,
///     "read_blif -l /tmp/run/input.blif\nlut_mapping\nwrite_dot /tmp/run/g.dot\nwrite_blif /tmp/run/output.blif\n"
/// );
/// ```
pub fn script_text(dir: &Path, user_script: Option<&str>) -> String {
    let dir = dir.display().to_string();
    let mut script = format!("read_blif -l {}/input.blif\n", dir);
    for line in user_script.unwrap_or_default().lines() {
        script.push_str(&line.replace("{D}", &dir));
        script.push('\n');
    }
    script.push_str(&format!("write_blif {}/output.blif\n", dir));
    script
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Started,
    Csi,
}

/// Turns the raw output of the mapper into log lines.
///
/// ANSI escape sequences are dropped, a carriage return erases the line being built,
/// the run directory is masked unless asked otherwise, and critical path reports
/// `Start-point = piN.  End-point = poM.` get the names of the signals behind `piN` and
/// `poM`.
#[derive(Debug, Clone)]
pub struct OutputFilter<'a> {
    tempdir: String,
    show_tempdir: bool,
    inputs: &'a [(NodeId, String)],
    outputs: &'a [(NodeId, String)],
    escape: Escape,
    got_cr: bool,
    line: String,
}

impl<'a> OutputFilter<'a> {
    /// `inputs` and `outputs` are the signals of the encoded netlist, in `.inputs` and
    /// `.outputs` order.
    pub fn new(
        tempdir: &Path,
        show_tempdir: bool,
        inputs: &'a [(NodeId, String)],
        outputs: &'a [(NodeId, String)],
    ) -> Self {
        OutputFilter {
            tempdir: tempdir.display().to_string(),
            show_tempdir,
            inputs,
            outputs,
            escape: Escape::None,
            got_cr: false,
            line: String::new(),
        }
    }

    /// `text` with the run directory replaced by `<temp-dir>`, unless it must be shown.
    pub fn mask(&self, text: &str) -> String {
        if self.show_tempdir || self.tempdir.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.tempdir, "<temp-dir>")
        }
    }

    fn critical_path(&self, chunk: &str) -> Option<String> {
        let rest = chunk.trim_end().strip_prefix("Start-point = pi")?;
        let (pi, rest) = rest.split_once(".  End-point = po")?;
        let po = rest.strip_suffix('.')?;
        let (pi, po): (usize, usize) = (pi.parse().ok()?, po.parse().ok()?);
        let name = |signals: &[(NodeId, String)], k: usize| {
            signals
                .get(k)
                .map_or_else(|| "???".to_string(), |(_, name)| name.clone())
        };
        Some(format!(
            "Start-point = pi{} ({}).  End-point = po{} ({}).",
            pi,
            name(self.inputs, pi),
            po,
            name(self.outputs, po)
        ))
    }

    /// Feeds a chunk of output, returns the lines it completes.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        if let Some(line) = self.critical_path(chunk) {
            return vec![line];
        }

        let mut lines = Vec::new();
        for ch in chunk.chars() {
            match self.escape {
                Escape::Started => {
                    self.escape = if ch == '[' { Escape::Csi } else { Escape::None };
                    continue;
                }
                Escape::Csi => {
                    if !ch.is_ascii_digit() && ch != ';' {
                        self.escape = Escape::None;
                    }
                    continue;
                }
                Escape::None => {}
            }
            match ch {
                '\x1b' => self.escape = Escape::Started,
                '\r' => self.got_cr = true,
                '\n' => {
                    lines.push(self.mask(&self.line));
                    self.line.clear();
                    self.got_cr = false;
                }
                _ => {
                    if self.got_cr {
                        self.line.clear();
                        self.got_cr = false;
                    }
                    self.line.push(ch);
                }
            }
        }
        lines
    }

    /// The last line, if the output did not end with a newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.line.is_empty() {
            return None;
        }
        let line = self.mask(&self.line);
        self.line.clear();
        Some(line)
    }
}
