//! The technology mapping pass: for each module, extract the gates into a graph, break its
//! combinational loops, hand it to the mapper as BLIF and bring the mapped netlist back.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use tempfile::TempDir;

use crate::blif::{BlifError, EncodedNetlist, MODEL_NAME, read_netlist, write_netlist};
use crate::design::{Design, IdAllocator, Module};
use crate::error::{Result, TechmapError};
use crate::genlib::{GateLibrary, LibraryGate, lut_definitions};
use crate::graph::dot::GraphvizStyle;
use crate::graph::{ClockDomain, Extraction, LoopCut};
use crate::mapper::{Mapper, OutputFilter, default_exe, script_text};
use crate::reintegrate::{MappingStats, Reintegration};

/// Tag of the generated names when none is given.
pub const DEFAULT_RUN_TAG: &str = "cirkit";

/// Options of the pass.
///
/// ```rust
/// use blifmap::genlib::LibraryGate;
/// use blifmap::pass::TechmapConfig;
///
/// let config = TechmapConfig::default()
///     .with_exe("/opt/cirkit/bin/cirkit")
///     .with_clock("clk,!rst_n")
///     .with_gates([LibraryGate::Nand, LibraryGate::Not])
///     .with_cleanup(false);
/// assert!(!config.keepff);
/// assert_eq!(config.run_tag, "cirkit");
/// ```
#[derive(Debug, Clone)]
pub struct TechmapConfig {
    /// The mapper program.
    pub exe: PathBuf,
    /// Mapper commands run between reading the input and writing the output. `{D}` stands
    /// for the run directory.
    pub script: Option<PathBuf>,
    /// Remove the run directory when done. Otherwise it is created in the current
    /// directory, and kept.
    pub cleanup: bool,
    /// Log the run directory as is instead of `<temp-dir>`.
    pub show_tempdir: bool,
    /// `[!]clk[,[!]en]`: only flip-flops on this clock and enable are extracted.
    pub clock: Option<String>,
    /// Put `keep` on the outputs of extracted flip-flops.
    pub keepff: bool,
    /// Tag the created wires and cells with the run index.
    pub markgroups: bool,
    pub library: GateLibrary,
    /// Cost of LUTs, by number of inputs starting at 1.
    pub lut_costs: Vec<u32>,
    pub run_tag: String,
    /// Write a Graphviz slide of every step of the loop breaker to this file.
    pub loop_dot: Option<PathBuf>,
    /// Write the graph handed to the mapper, loops broken, to this file.
    pub graph_dot: Option<PathBuf>,
}

impl Default for TechmapConfig {
    fn default() -> Self {
        TechmapConfig {
            exe: default_exe(),
            script: None,
            cleanup: true,
            show_tempdir: false,
            clock: None,
            keepff: false,
            markgroups: false,
            library: GateLibrary::default(),
            lut_costs: Vec::new(),
            run_tag: DEFAULT_RUN_TAG.to_string(),
            loop_dot: None,
            graph_dot: None,
        }
    }
}

impl TechmapConfig {
    pub fn with_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.exe = exe.into();
        self
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_show_tempdir(mut self, show_tempdir: bool) -> Self {
        self.show_tempdir = show_tempdir;
        self
    }

    pub fn with_clock(mut self, descriptor: impl Into<String>) -> Self {
        self.clock = Some(descriptor.into());
        self
    }

    pub fn with_keepff(mut self, keepff: bool) -> Self {
        self.keepff = keepff;
        self
    }

    pub fn with_markgroups(mut self, markgroups: bool) -> Self {
        self.markgroups = markgroups;
        self
    }

    /// Restricts the optional gates of the library to `gates`.
    pub fn with_gates(mut self, gates: impl IntoIterator<Item = LibraryGate>) -> Self {
        self.library.enabled = gates.into_iter().collect();
        self
    }

    pub fn with_library(mut self, library: GateLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn with_lut_costs(mut self, lut_costs: Vec<u32>) -> Self {
        self.lut_costs = lut_costs;
        self
    }

    pub fn with_run_tag(mut self, run_tag: impl Into<String>) -> Self {
        self.run_tag = run_tag.into();
        self
    }

    pub fn with_loop_dot(mut self, path: impl Into<PathBuf>) -> Self {
        self.loop_dot = Some(path.into());
        self
    }

    pub fn with_graph_dot(mut self, path: impl Into<PathBuf>) -> Self {
        self.graph_dot = Some(path.into());
        self
    }
}

/// What happened to one module.
#[derive(Debug, Clone)]
pub struct ModuleReport {
    /// Index of the run, part of every generated name.
    pub run_idx: usize,
    /// Number of cells moved out of the module.
    pub extracted: usize,
    pub cuts: Vec<LoopCut>,
    /// What was sent to the mapper.
    pub netlist: EncodedNetlist,
    /// `None` when there was nothing to map.
    pub stats: Option<MappingStats>,
    /// The run directory, when asked to keep it.
    pub kept_dir: Option<PathBuf>,
}

fn write(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(TechmapError::io(path))
}

/// Creates the run directory. The guard removes it when dropped, even on failure; no guard
/// is returned when the directory must be kept.
fn run_dir(cleanup: bool) -> Result<(Option<TempDir>, PathBuf)> {
    if cleanup {
        let dir = tempfile::Builder::new()
            .prefix("blifmap-")
            .tempdir()
            .map_err(TechmapError::io(std::env::temp_dir()))?;
        let path = dir.path().to_path_buf();
        Ok((Some(dir), path))
    } else {
        let dir = tempfile::Builder::new()
            .prefix("_tmp_blifmap-")
            .tempdir_in(".")
            .map_err(TechmapError::io("."))?;
        Ok((None, dir.keep()))
    }
}

fn log_clock(module: &Module, clock: Option<&ClockDomain>) {
    let Some(clock) = clock else {
        info!("No matching clock domain found. Not extracting any FF cells.");
        return;
    };
    let edge = if clock.clk_pol { "posedge" } else { "negedge" };
    match clock.en {
        None => info!(
            "Found matching {} clock domain: {}",
            edge,
            module.describe(clock.clk)
        ),
        Some((en, en_pol)) => info!(
            "Found matching {} clock domain: {}, enabled by {}{}",
            edge,
            module.describe(clock.clk),
            if en_pol { "" } else { "!" },
            module.describe(en)
        ),
    }
}

fn call_mapper(
    mapper: &mut dyn Mapper,
    config: &TechmapConfig,
    dir: &Path,
    netlist: &EncodedNetlist,
) -> Result<()> {
    let script = dir.join("cirkit.script");
    let argv = vec![
        config.exe.display().to_string(),
        "-f".to_string(),
        script.display().to_string(),
    ];
    let command = argv.join(" ");

    let mut filter = OutputFilter::new(dir, config.show_tempdir, &netlist.inputs, &netlist.outputs);
    info!("Running mapper command: {}", filter.mask(&command));
    let status = mapper
        .run(&argv, &mut |chunk: &str| {
            for line in filter.feed(chunk) {
                info!("MAPPER: {}", line);
            }
        })
        .map_err(|source| TechmapError::MapperSpawn {
            command: command.clone(),
            source,
        })?;
    if let Some(line) = filter.finish() {
        info!("MAPPER: {}", line);
    }

    if status != 0 {
        return Err(TechmapError::MapperFailed { command, status });
    }
    Ok(())
}

/// Maps the gates of `module` with `mapper`.
///
/// Returns `None` when the module is skipped because it has processes. `ids` hands out
/// the run index and the indices of the loop breaking wires.
pub fn techmap_module(
    module: &mut Module,
    ids: &mut IdAllocator,
    config: &TechmapConfig,
    mapper: &mut dyn Mapper,
) -> Result<Option<ModuleReport>> {
    if module.processes > 0 {
        info!("Skipping module {} as it contains processes.", module.name());
        return Ok(None);
    }

    let run_idx = ids.next_index();
    let mut extraction = Extraction::new(module, None, config.keepff);
    if let Some(descriptor) = &config.clock {
        extraction.clock = ClockDomain::parse(descriptor, module, &extraction.sigmap);
        log_clock(module, extraction.clock.as_ref());
    }

    let (guard, dir) = run_dir(config.cleanup)?;
    let masking = OutputFilter::new(&dir, config.show_tempdir, &[], &[]);
    info!(
        "Extracting gate netlist of module {} to {}/input.blif",
        module.name(),
        masking.mask(&dir.display().to_string())
    );

    let user_script = match &config.script {
        Some(path) => Some(fs::read_to_string(path).map_err(TechmapError::io(path))?),
        None => None,
    };
    write(
        &dir.join("cirkit.script"),
        &script_text(&dir, user_script.as_deref()),
    )?;

    let extracted = extraction.extract_all(module)?;
    extraction.mark_boundaries(module);
    let clock = extraction.clock;
    let mut graph = extraction.graph;

    let cuts = match &config.loop_dot {
        None => graph.break_loops(module, ids, &config.run_tag)?,
        Some(path) => {
            let (cuts, slides) = graph.break_loops_with_slides(module, ids, &config.run_tag)?;
            write(path, &slides.concat())?;
            cuts
        }
    };
    graph.check_integrity()?;
    if let Some(path) = &config.graph_dot {
        write(path, &graph.to_dot(module, GraphvizStyle::default()))?;
    }

    let netlist = write_netlist(&graph, module);
    write(&dir.join("input.blif"), &netlist.text)?;
    info!(
        "Extracted {} gates and {} wires to a netlist network with {} inputs and {} outputs.",
        netlist.gate_count,
        graph.len(),
        netlist.inputs.len(),
        netlist.outputs.len()
    );

    let stats = if netlist.outputs.is_empty() {
        info!("Don't call the mapper as there is nothing to map.");
        None
    } else {
        write(&dir.join("stdcells.genlib"), &config.library.to_genlib())?;
        if !config.lut_costs.is_empty() {
            write(&dir.join("lutdefs.txt"), &lut_definitions(&config.lut_costs))?;
        }
        call_mapper(mapper, config, &dir, &netlist)?;

        let output = dir.join("output.blif");
        let mapped = read_netlist(&output).map_err(|err| match err {
            BlifError::IoError(source) => TechmapError::Io {
                path: output.clone(),
                source,
            },
            err => err.into(),
        })?;
        info!("Re-integrating mapper results.");
        let reintegration = Reintegration {
            graph: &graph,
            clock,
            tag: &config.run_tag,
            run_idx,
            markgroups: config.markgroups,
            recover_init: netlist.has_init,
        };
        Some(reintegration.reintegrate(module, mapped.model(MODEL_NAME)?)?)
    };

    if let Some(guard) = guard {
        info!("Removing temp directory.");
        guard.close().map_err(TechmapError::io(&dir))?;
    }

    Ok(Some(ModuleReport {
        run_idx,
        extracted,
        cuts,
        netlist,
        stats,
        kept_dir: if config.cleanup { None } else { Some(dir) },
    }))
}

/// Maps every module of `design`, in order. Stops at the first failing module.
pub fn techmap_design(
    design: &mut Design,
    config: &TechmapConfig,
    mapper: &mut dyn Mapper,
) -> Result<Vec<ModuleReport>> {
    let mut reports = Vec::new();
    for module in &mut design.modules {
        if let Some(report) = techmap_module(module, &mut design.autoidx, config, mapper)? {
            reports.push(report);
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::design::{Cell, CellKind, SigBit};
    use crate::mapper::Linked;

    #[test]
    fn config_test() {
        let config = TechmapConfig::default();
        assert!(config.cleanup);
        assert!(!config.show_tempdir);
        assert!(config.library.enabled.is_empty());
        assert_eq!(config.run_tag, DEFAULT_RUN_TAG);
        assert!(config.exe.ends_with("yosys-cirkit"));

        let config = config
            .with_gates([LibraryGate::Xor])
            .with_lut_costs(vec![1, 2])
            .with_run_tag("tm");
        assert_eq!(config.library.gates().len(), 3);
        assert_eq!(config.lut_costs, vec![1, 2]);
        assert_eq!(config.run_tag, "tm");
    }

    #[test]
    fn skip_processes_test() {
        let mut m = Module::new("m");
        m.processes = 1;
        let mut ids = IdAllocator::new();
        let mut mapper = Linked(|_: &[String]| -> i32 { panic!("mapper called") });
        let report = techmap_module(&mut m, &mut ids, &TechmapConfig::default(), &mut mapper);
        assert!(report.unwrap().is_none());
        // No run index spent
        assert_eq!(ids.next_index(), 1);
    }

    #[test]
    fn nothing_to_map_test() {
        let mut m = Module::new("m");
        let a = SigBit::wire(m.add_wire("a", 1).unwrap(), 0);
        let y = SigBit::wire(m.add_wire("y", 1).unwrap(), 0);
        m.add_cell(
            Cell::new("g", CellKind::Not)
                .with_port("A", a)
                .with_port("Y", y),
        )
        .unwrap();

        let mut ids = IdAllocator::new();
        let mut mapper = Linked(|_: &[String]| -> i32 { panic!("mapper called") });
        let report = techmap_module(&mut m, &mut ids, &TechmapConfig::default(), &mut mapper)
            .unwrap()
            .unwrap();
        // Nothing is a port: the gate is extracted but nothing is left to map
        assert_eq!(report.extracted, 1);
        assert!(report.netlist.outputs.is_empty());
        assert!(report.stats.is_none());
        assert!(report.kept_dir.is_none());
        assert_eq!(m.cells().count(), 0);
    }

    #[test]
    fn mapper_failure_test() {
        let mut m = Module::new("m");
        let a = SigBit::wire(m.add_port("a", 1).unwrap(), 0);
        let y = SigBit::wire(m.add_port("y", 1).unwrap(), 0);
        m.add_cell(
            Cell::new("g", CellKind::Not)
                .with_port("A", a)
                .with_port("Y", y),
        )
        .unwrap();

        let mut seen = None;
        let mut mapper = Linked(|argv: &[String]| {
            seen = Some(argv.to_vec());
            2
        });
        let config = TechmapConfig::default().with_exe("mapper");
        let res = techmap_module(&mut m, &mut IdAllocator::new(), &config, &mut mapper);
        assert!(matches!(res, Err(TechmapError::MapperFailed { status: 2, .. })));

        let argv = seen.unwrap();
        assert_eq!(argv[0], "mapper");
        assert_eq!(argv[1], "-f");
        assert!(argv[2].ends_with("cirkit.script"));
        // The run directory is gone
        assert!(!Path::new(&argv[2]).exists());
    }
}
