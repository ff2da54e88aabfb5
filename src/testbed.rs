//! Orchestration of the two nodes: which files go where, and what the orchestrator loops over.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use failure::ResultExt;

use serde::Serialize;

use spurs_util::escape_for_bash;

use crate::{
    artifact::{ArtifactDescriptor, BootParameter, Role},
    output::Parametrize,
    paths,
    spec::Specification,
};

/// One file to copy to a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyEntry {
    /// Path relative to the experiment root.
    pub from: PathBuf,
    /// Path on the node.
    pub dest: String,
    /// The orchestrator variable holding the node name.
    pub device: &'static str,
}

/// Boot parameters in the form the orchestration script expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct NodeBootParameter {
    device: &'static str,
    parameters: String,
}

/// Files to deploy, by role and lifecycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyManifest {
    /// Copied before every run.
    pub deploy: BTreeMap<Role, Vec<CopyEntry>>,
    /// Copied once, when the node is set up.
    pub setup: BTreeMap<Role, Vec<CopyEntry>>,
}

impl CopyManifest {
    /// Partition all descriptors with a remote destination. Order within a role is preserved.
    pub fn new(descriptors: &[ArtifactDescriptor]) -> Self {
        let mut manifest = CopyManifest::default();

        for desc in descriptors {
            let (device, dest) = match (desc.device, &desc.copy) {
                (Some(device), Some(dest)) => (device, dest),
                _ => continue,
            };

            let entry = CopyEntry {
                from: desc.to.clone(),
                dest: dest.clone(),
                device: device.node_variable(),
            };

            let section = if desc.for_setup {
                &mut manifest.setup
            } else {
                &mut manifest.deploy
            };
            section.entry(device).or_insert_with(Vec::new).push(entry);
        }

        manifest
    }

    fn flatten(section: &BTreeMap<Role, Vec<CopyEntry>>) -> Vec<&CopyEntry> {
        section.values().flatten().collect()
    }
}

/// The orchestration files for the pos testbed.
pub fn assemble(
    spec: &Specification,
    descriptors: &[ArtifactDescriptor],
    boot_parameters: &[BootParameter],
) -> Vec<ArtifactDescriptor> {
    log::info!("Generating pos experiment files");

    let manifest = CopyManifest::new(descriptors);
    let boot_parameters: Vec<_> = boot_parameters
        .iter()
        .map(|boot| NodeBootParameter {
            device: boot.device.node_variable(),
            parameters: escape_for_bash(&boot.parameters),
        })
        .collect();

    let experiment_dir = Path::new(paths::EXPERIMENT);

    vec![
        ArtifactDescriptor::template("pos/experiment.sh", experiment_dir.join("experiment.sh"))
            .var("copy", CopyManifest::flatten(&manifest.deploy))
            .var("copy_setup", CopyManifest::flatten(&manifest.setup))
            .var("bootparameters", boot_parameters)
            .var("experiment_name", spec.meta.experiment_name()),
        ArtifactDescriptor::template("pos/command.sh", experiment_dir.join("command.sh"))
            .var("loadgen", &spec.node_config.loadgen.name)
            .var("dut", &spec.node_config.dut.name),
        ArtifactDescriptor::template(
            "pos/global-variables.yml",
            experiment_dir.join("global-variables.yml"),
        )
        .var("scale_load", spec.metrics.scales("load_rate"))
        .var("repetitions", spec.meta.max_load_repetitions),
    ]
}

/// Write the axes the orchestrator loops over for this measurement series.
pub fn write_loop_variables(spec: &Specification) -> Result<(), failure::Error> {
    log::info!("Generating loop variables");

    let path = spec
        .meta
        .outdir
        .join(paths::EXPERIMENT)
        .join("loop-variables.yml");

    // JSON is a subset of YAML.
    let dumped = serde_json::to_string_pretty(&spec.metrics.scale)?;
    fs::write(&path, dumped).with_context(|_| format!("writing {}", path.display()))?;

    Ok(())
}
