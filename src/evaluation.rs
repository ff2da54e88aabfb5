//! Wiring of the evaluation tooling (plot scripts and notebooks) into the experiment tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use failure::ResultExt;

use serde::{Serialize, Serializer};

use crate::{
    artifact::ArtifactDescriptor,
    paths,
    spec::{CycleConversion, Specification, Target},
};

/// Entries of the tooling tree that are never copied.
const BLACKLIST: &[&str] = &["sample_data", "venv3", "figures", "data", "build"];

/// Marker in the plot scripts that is replaced by the configuration literal.
const CONFIGURATION_MARKER: &str = "#$configuration";

/// Plot scripts and notebooks that receive the configuration.
const PLOT_FILES: &[&str] = &[
    "plot_throughput.ipynb",
    "plot_throughput.py",
    "plot_latency.ipynb",
    "plot_latency.py",
    "plot_perf_stat.ipynb",
    "plot_perf_stat.py",
];

/// Copies a file or directory tree.
pub trait Copier {
    fn copy(&self, from: &Path, to: &Path) -> Result<(), failure::Error>;
}

/// Copies with `cp -r`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpCopier;

impl Copier for CpCopier {
    fn copy(&self, from: &Path, to: &Path) -> Result<(), failure::Error> {
        let status = Command::new("cp").arg("-r").arg(from).arg(to).status()?;

        if !status.success() {
            failure::bail!(
                "cp {} {} failed. Exit code: {:?}",
                from.display(),
                to.display(),
                status.code()
            );
        }

        Ok(())
    }
}

/// Python truthiness: `'True'` or `''`.
fn python_bool<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "True" } else { "" })
}

/// How the plot scripts convert CPU load to cycles: a frequency, `'from_loop'` or `''`.
fn python_cycles<S: Serializer>(
    value: &CycleConversion,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        CycleConversion::Disabled => serializer.serialize_str(""),
        CycleConversion::Frequency(mhz) => serializer.serialize_u64(*mhz),
        CycleConversion::FromLoop => serializer.serialize_str("from_loop"),
    }
}

/// A core id, or `''` if unset.
fn python_core<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(core) => serializer.serialize_u32(*core),
        None => serializer.serialize_str(""),
    }
}

/// Configuration of the plot scripts, emitted as a Python dict literal.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationConfig<'a> {
    /// File the orchestrator writes the result directory to.
    pub result_dir_file: PathBuf,
    pub loop_x_axis: &'a str,
    pub loop_plot_per: &'a [String],
    pub loadgen: &'a str,
    pub dut: &'a str,
    pub target: Target,
    pub experiment_name: &'a str,
    pub latency_rates: Vec<&'static str>,
    #[serde(serialize_with = "python_bool")]
    pub log_scale: bool,
    #[serde(serialize_with = "python_cycles")]
    pub convert_to_cycles: CycleConversion,
    pub repetitions: u32,
    pub model_parts: Vec<u32>,
    pub model_start: usize,
    pub model_end: usize,
    #[serde(serialize_with = "python_core")]
    pub only_core_id: Option<u32>,
    pub perf_stat_events: Vec<(&'a str, &'a str)>,
}

impl<'a> EvaluationConfig<'a> {
    pub fn new(spec: &'a Specification, result_dir_file: PathBuf) -> Self {
        let model = &spec.model;

        EvaluationConfig {
            result_dir_file,
            loop_x_axis: &model.x_axis,
            loop_plot_per: &model.plot_per,
            loadgen: &spec.node_config.loadgen.name,
            dut: &spec.node_config.dut.name,
            target: spec.meta.target,
            experiment_name: &spec.meta.feature,
            latency_rates: if spec.meta.feature == "load_rate" {
                vec!["rate"]
            } else {
                vec![]
            },
            log_scale: model.log_scale,
            convert_to_cycles: model.convert_to_cycles,
            repetitions: spec.meta.max_load_repetitions,
            model_parts: (1..=model.model_max_parts).collect(),
            model_start: model.model_start,
            model_end: model.model_end,
            only_core_id: spec.node_config.measurement_core_id,
            perf_stat_events: spec
                .metrics
                .perf
                .iter()
                .map(|(event, name)| (event.as_str(), name.as_str()))
                .collect(),
        }
    }

    /// `configuration = {...}` with single-quoted strings.
    pub fn to_python(&self) -> Result<String, failure::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("configuration = {}", json).replace('"', "'"))
    }
}

/// Whether `name` is copied from the tooling tree.
fn copied(name: &str) -> bool {
    if name == ".gitignore" {
        return true;
    }
    !name.starts_with('.') && !BLACKLIST.iter().any(|blocked| name.contains(blocked))
}

/// Copy the top-level entries of `src` into `dst`, except for blacklisted ones.
pub fn copy_tooling(src: &Path, dst: &Path, copier: &dyn Copier) -> Result<(), failure::Error> {
    fs::create_dir_all(dst).with_context(|_| format!("creating directory {}", dst.display()))?;

    let mut entries = fs::read_dir(src)
        .with_context(|_| format!("reading evaluation tooling {}", src.display()))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        if !copied(&name.to_string_lossy()) {
            log::debug!("skipping {}", entry.path().display());
            continue;
        }
        copier.copy(&entry.path(), dst)?;
    }

    Ok(())
}

/// Remove `path` and everything below it. A missing directory is not an error.
fn remove_stale(path: &Path) -> Result<(), failure::Error> {
    match fs::remove_dir_all(path) {
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        res => Ok(res.with_context(|_| format!("removing {}", path.display()))?),
    }
}

/// Replace the configuration marker in each of the plot files in `dir`.
fn insert_configuration(dir: &Path, configuration: &str) -> Result<(), failure::Error> {
    for file in PLOT_FILES {
        let path = dir.join(file);
        let content =
            fs::read_to_string(&path).with_context(|_| format!("reading {}", path.display()))?;
        fs::write(&path, content.replace(CONFIGURATION_MARKER, configuration))
            .with_context(|_| format!("writing {}", path.display()))?;
    }

    Ok(())
}

/// Copy and configure the evaluation tooling. Returns the helper scripts still to be rendered.
pub fn wire(
    spec: &Specification,
    tooling: &Path,
    copier: &dyn Copier,
) -> Result<Vec<ArtifactDescriptor>, failure::Error> {
    log::info!("Copying evaluation scripts");

    let dst = spec.meta.outdir.join(paths::EVALUATION);
    copy_tooling(tooling, &dst, copier)?;
    remove_stale(&dst.join("util").join("__pycache__"))?;

    log::info!("Inserting evaluation configuration");

    let outdir = fs::canonicalize(&spec.meta.outdir)
        .with_context(|_| format!("resolving {}", spec.meta.outdir.display()))?;
    let config = EvaluationConfig::new(spec, outdir.join("result_directory.txt"));
    insert_configuration(&dst, &config.to_python()?)?;

    let evaluation_dir = Path::new(paths::EVALUATION);

    Ok(vec![
        ArtifactDescriptor::template("evaluation/run.sh", evaluation_dir.join("run_evaluation.sh")),
        ArtifactDescriptor::template(
            "evaluation/setup.sh",
            evaluation_dir.join("setup_evaluation.sh"),
        ),
        ArtifactDescriptor::template(
            "evaluation/compress_data.sh",
            evaluation_dir.join("compress_data.sh"),
        )
        .var("data_dir", paths::DATA),
        ArtifactDescriptor::template(
            "evaluation/setup_node.sh",
            evaluation_dir.join("setup_node.sh"),
        ),
    ])
}
