//! MoonGen scripts for the load generator.

use std::path::Path;

use serde_json::json;

use crate::{
    artifact::{ArtifactDescriptor, Role},
    paths,
    spec::{PacketSize, Specification, Testbed},
};

/// Where the load generator scripts are deployed.
const LG_HOME: &str = "/root/";

pub fn artifacts(spec: &Specification) -> Vec<ArtifactDescriptor> {
    log::info!("Generating loadgen MoonGen files");

    let testbed_manual = spec.meta.testbed == Testbed::Manual;
    let lg = &spec.node_config.loadgen;

    // Only needed if the packet size is not part of the sweep.
    let fixed_packet_size = match (&spec.traffic.packet_size, spec.metrics.scales("packet_size")) {
        (_, true) => json!(false),
        (PacketSize::Fixed(size), false) => json!(size),
        (PacketSize::Sweep(sizes), false) => json!(sizes),
    };

    let lg_dir = Path::new(paths::LG);
    let script_dir = Path::new(paths::LG_SCRIPT);
    let util_dir = Path::new(paths::LG_UTIL);

    vec![
        ArtifactDescriptor::template("moongen/testbed/measurement.sh", lg_dir.join("measurement.sh"))
            .var("testbed_manual", testbed_manual)
            .var("scale_table_entries", spec.metrics.scales("table_entries"))
            .var("scale_packet_size", spec.metrics.scales("packet_size"))
            .var("scale_load", spec.metrics.scales("load_rate"))
            .var(
                "measure_latency",
                spec.metrics.names.iter().any(|name| name == "latency"),
            ),
        ArtifactDescriptor::template("moongen/testbed/setup.sh", lg_dir.join("setup.sh")),
        ArtifactDescriptor::template("moongen/testbed/variables.yml", lg_dir.join("variables.yml"))
            .var("port", lg.port)
            .var("packet_size", fixed_packet_size)
            .var("latency_loads", &spec.traffic.load.latency),
        ArtifactDescriptor::template("moongen/lua/max-load.lua", script_dir.join("max-load.lua"))
            .deploy(Role::Loadgen, LG_HOME)
            .var("payload_u32_offset", spec.traffic.payload_u32_offset),
        ArtifactDescriptor::template("moongen/lua/latency.lua", script_dir.join("latency.lua"))
            .deploy(Role::Loadgen, LG_HOME)
            .var("payload_u32_offset", spec.traffic.payload_u32_offset),
        ArtifactDescriptor::template("moongen/util/get_max_rate.py", util_dir.join("get_max_rate.py"))
            .deploy(Role::Loadgen, LG_HOME)
            .var("repetitions", spec.meta.max_load_repetitions),
        ArtifactDescriptor::template(
            "moongen/util/multiply_floats.py",
            util_dir.join("multiply_floats.py"),
        )
        .deploy(Role::Loadgen, LG_HOME),
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::spec;
    use crate::{features::Feature, spec::Target};

    #[test]
    fn scripts_are_deployed_to_the_loadgen() {
        let spec = spec(Target::P4T4p4s, Feature::Load);
        let files = artifacts(&spec);

        assert_eq!(files.len(), 7);
        let deployed: Vec<_> = files.iter().filter(|f| f.copy.is_some()).collect();
        assert_eq!(deployed.len(), 4);
        assert!(deployed.iter().all(|f| f.device == Some(Role::Loadgen)));
        assert!(files.iter().all(|f| !f.for_setup));

        let measurement = &files[0];
        assert_eq!(measurement.variables["scale_load"], json!(true));
        assert_eq!(measurement.variables["scale_table_entries"], json!(false));
        assert_eq!(measurement.variables["measure_latency"], json!(true));
    }

    #[test]
    fn packet_size_only_when_not_swept() {
        let swept = artifacts(&spec(Target::P4T4p4s, Feature::Load));
        assert_eq!(swept[2].variables["packet_size"], json!(false));

        let mut fixed = spec(Target::P4T4p4s, Feature::AddedHeaders);
        fixed.metrics.scale.remove("packet_size");
        let fixed = artifacts(&fixed);
        assert_eq!(fixed[2].variables["packet_size"], json!(300));
        assert_eq!(fixed[2].variables["port"], json!({"tx": 0, "rx": 1}));
    }
}
