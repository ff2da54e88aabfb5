//! DUT setup for T4P4S: build configuration, DPDK options, perf scripts and source overrides.

use std::path::Path;

use serde::Serialize;

use crate::{
    artifact::{ArtifactDescriptor, BootParameter, Dialect, Role},
    paths,
    spec::{Specification, Testbed},
};

/// Kernel command line of the DUT: isolate the cores used by T4P4S, pin the CPU frequency and
/// reserve hugepages for DPDK.
const DUT_BOOT_PARAMETERS: &str =
    "isolcpus=0-6 intel_pstate=disable default_hugepagesz=1G hugepagesz=1G hugepages=16";

/// Table size limits compiled into T4P4S.
const MAX_TABLE_ENTRIES_SWEEP: u64 = 20_000_000;
const MAX_TABLE_ENTRIES: u64 = 1000;

/// Axes that need the deparser emit fix.
const DEPARSER_AXES: &[&str] = &["add_headers", "remove_headers", "add_headers_size"];

/// Pinned versions of T4P4S and its dependencies.
#[derive(Debug, Clone, Serialize)]
pub struct Commits {
    pub t4p4s_commit: &'static str,
    pub t4p4s_boots: &'static str,
    pub hlir16: &'static str,
    pub p4c: &'static str,
    pub p4runtime: &'static str,
    pub protobuf: &'static str,
}

pub const DEFAULT_COMMITS: Commits = Commits {
    t4p4s_commit: "0a6c455846f201432a53dc9347909ae933ec0b32",
    t4p4s_boots: "668019b8440fbbe4760194c7247492012455ae83",
    hlir16: "c9408db9b970493259e0b5cc27efc39063a73cd3",
    p4c: "ecba24ad591e719268860f66202530830d2a914e",
    p4runtime: "",
    protobuf: "v3.9.2",
};

/// Hex mask with the given bits set. Bit indices are not limited by any integer width.
fn hex_mask<'a>(bits: impl IntoIterator<Item = &'a u32>) -> String {
    // Nibbles, least significant first.
    let mut nibbles: Vec<u8> = vec![0];
    for &bit in bits {
        let (index, offset) = ((bit / 4) as usize, bit % 4);
        if nibbles.len() <= index {
            nibbles.resize(index + 1, 0);
        }
        nibbles[index] |= 1 << offset;
    }

    while nibbles.len() > 1 && nibbles.last() == Some(&0) {
        nibbles.pop();
    }

    nibbles
        .iter()
        .rev()
        .map(|nibble| format!("{:X}", nibble))
        .collect()
}

/// DPDK port mask selecting the tx and rx ports, in hex.
pub fn port_mask(tx: u32, rx: u32) -> String {
    hex_mask(&[tx, rx])
}

/// The DPDK core configuration when using the first `n` cores of the DUT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreConfig {
    /// Core mask of the first `n` cores, in hex.
    pub coremask: String,
    /// `(port,queue,core)` triples assigning one queue of each port to each core.
    pub cpq_map: String,
}

/// One `CoreConfig` for each prefix of `cores`: the first core, the first two cores, ...
pub fn core_configs(cores: &[u32], tx: u32, rx: u32) -> Vec<CoreConfig> {
    (1..=cores.len())
        .map(|n| {
            let mut cpq = Vec::with_capacity(2 * n);

            for (queue, core) in cores[..n].iter().enumerate() {
                for port in &[tx, rx] {
                    cpq.push(format!("({},{},{})", port, queue, core));
                }
            }

            CoreConfig {
                coremask: hex_mask(&cores[..n]),
                cpq_map: cpq.join(","),
            }
        })
        .collect()
}

/// All DUT artifacts and the DUT boot parameters.
pub fn artifacts(spec: &Specification) -> (Vec<ArtifactDescriptor>, Vec<BootParameter>) {
    log::info!("Generating DuT t4p4s files");

    let dut = &spec.node_config.dut;
    let (tx, rx) = (dut.port.tx, dut.port.rx);
    let scales = |axes: &[&str]| axes.iter().any(|axis| spec.metrics.scales(axis));

    let configs = core_configs(&dut.cores, tx, rx);
    let testbed_manual = spec.meta.testbed == Testbed::Manual;
    let multiple_programs = spec
        .program
        .scale
        .as_ref()
        .map(|binding| binding.with.clone());

    let dut_dir = Path::new(paths::DUT);
    let config_dir = Path::new(paths::DUT_CONFIG);

    let mut files = vec![
        ArtifactDescriptor::template("p4_t4p4s/testbed/measurement.sh", dut_dir.join("measurement.sh"))
            .var("testbed_manual", testbed_manual)
            .var("multiple_programs", multiple_programs)
            .var("scale_frequency", spec.metrics.scales("cpu_frequency"))
            .var(
                "update_controlplane",
                scales(&["tables", "table_entries", "action_data"]),
            )
            .var("increase_max_wait", scales(&["tables", "meta_field_writes"]))
            .var("increase_wait", scales(&["tables", "table_entries"])),
        ArtifactDescriptor::template("p4_t4p4s/testbed/setup.sh", dut_dir.join("setup.sh"))
            .var("testbed_manual", testbed_manual),
        ArtifactDescriptor::template("p4_t4p4s/testbed/variables.yml", dut_dir.join("variables.yml"))
            .var("port", dut.port)
            .var("cpu_frequency", dut.cpu_frequencies.iter().max())
            .var(
                "events",
                spec.metrics.perf.keys().cloned().collect::<Vec<_>>().join(","),
            )
            .var("commits", DEFAULT_COMMITS),
        ArtifactDescriptor::template("p4_t4p4s/t4p4s/examples.cfg", config_dir.join("examples.cfg"))
            .deploy(Role::Dut, "/root/t4p4s/t4p4s/"),
        ArtifactDescriptor::template("p4_t4p4s/t4p4s/opts_dpdk.cfg", config_dir.join("opts_dpdk.cfg"))
            .deploy(Role::Dut, "/root/t4p4s/t4p4s/")
            .var(
                "coremasks",
                configs.iter().map(|c| &c.coremask).collect::<Vec<_>>(),
            )
            .var("portmask", port_mask(tx, rx))
            .var(
                "cpq_maps",
                configs.iter().map(|c| &c.cpq_map).collect::<Vec<_>>(),
            ),
        ArtifactDescriptor::template(
            "p4_t4p4s/t4p4s/rte.sdkinstall.mk",
            config_dir.join("rte.sdkinstall.mk"),
        )
        .deploy(Role::Dut, "/root/")
        .setup_only(),
    ];

    for n in 1..=dut.cores.len() {
        let cores: Vec<String> = dut.cores[..n].iter().map(|c| c.to_string()).collect();
        files.push(
            ArtifactDescriptor::template(
                "p4_t4p4s/testbed/run_perf_stat.sh",
                dut_dir.join(format!("run_perf_stat_{}.sh", n)),
            )
            .deploy(Role::Dut, format!("/root/run_perf_stat_{}.sh", n))
            .var("cores", cores.join(",")),
        );
    }

    // Fill tables from the control plane in bulk, and raise the table size limit.
    if spec.program.args.skip_filling_tables {
        let table_entries = if spec.metrics.scales("table_entries") {
            MAX_TABLE_ENTRIES_SWEEP
        } else {
            MAX_TABLE_ENTRIES
        };

        files.push(
            ArtifactDescriptor::template("p4_t4p4s/t4p4s/dpdk_tables.h", config_dir.join("dpdk_tables.h"))
                .deploy(
                    Role::Dut,
                    "/root/t4p4s/t4p4s/src/hardware_dep/dpdk/includes/dpdk_tables.h",
                )
                .var("table_entries", table_entries),
        );
        files.push(
            ArtifactDescriptor::template(
                "p4_t4p4s/t4p4s/dpdk_lib_change_tables.c",
                config_dir.join("dpdk_lib_change_tables.c"),
            )
            .deploy(
                Role::Dut,
                "/root/t4p4s/t4p4s/src/hardware_dep/dpdk/data_plane/dpdk_lib_change_tables.c",
            ),
        );
    }

    // T4P4S does not perform deparser modifications without this.
    if scales(DEPARSER_AXES) {
        files.push(
            ArtifactDescriptor::template("p4_t4p4s/t4p4s/dataplane.c.py", config_dir.join("dataplane.c.py"))
                .dialect(Dialect::Code)
                .deploy(Role::Dut, "/root/t4p4s/t4p4s/src/hardware_indep/dataplane.c.py")
                .var("emit_reordering", true),
        );
    }

    let boot = vec![BootParameter {
        device: Role::Dut,
        parameters: DUT_BOOT_PARAMETERS.into(),
    }];

    (files, boot)
}
