//! Turn the CLI selection and the node topology into a complete `Specification`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{
    features::Feature,
    scale::{self, ints, ScaleValue},
    spec::{
        Component, CycleConversion, Meta, Metrics, Model, NodeConfig, Program, ProgramArgs,
        Specification, Target, Testbed, Traffic,
    },
};

/// Everything the user selected on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub target: Target,
    pub testbed: Testbed,
    /// Root of all experiments; the experiment ends up in `<outdir>/<component>/<feature>`.
    pub outdir: PathBuf,
    pub max_load_repetitions: u32,
    pub feature: Feature,
}

/// Performance counter events recorded on T4P4S.
const T4P4S_PERF_EVENTS: &[(&str, &str)] = &[
    ("r08d1", "L1_cache_misses"),
    ("r10d1", "L2_cache_misses"),
    ("r20d1", "L3_cache_misses"),
    ("cycles", "CPU_cycles"),
];

/// Core counts measured on software targets, in addition to all cores of the DUT.
const CPU_CORES: &[u64] = &[1, 2, 3, 4];

/// Build the specification for `selection` on the nodes in `nodes`.
pub fn synthesize(selection: &Selection, nodes: &NodeConfig) -> Result<Specification, failure::Error> {
    let target = selection.target;
    let component = selection.feature.component();

    log::info!("Generate specification");

    let mut spec = Specification {
        meta: Meta {
            testbed: selection.testbed,
            target,
            component,
            feature: String::new(),
            outdir: selection.outdir.clone(),
            max_load_repetitions: selection.max_load_repetitions,
        },
        metrics: default_metrics(target, nodes),
        traffic: Traffic::default(),
        program: Program {
            architecture: "v1model".into(),
            target: match target {
                Target::P4T4p4s => Some("t4p4s".into()),
                Target::P4Nfp => None,
            },
            args: ProgramArgs::default(),
            scale: None,
        },
        model: default_model(target, nodes),
        node_config: nodes.clone(),
    };

    // The default packet size sweep is also a scaling axis.
    if let crate::spec::PacketSize::Sweep(sizes) = &spec.traffic.packet_size {
        spec.metrics
            .scale
            .insert("packet_size".into(), ints(sizes));
    }

    log::info!(
        "Component {}: {}",
        component.help(),
        selection.feature.help()
    );
    selection.feature.delta(target, nodes).apply(&mut spec);

    spec.meta.outdir = selection
        .outdir
        .join(component.as_str())
        .join(&spec.meta.feature);

    spec.validate()?;

    Ok(spec)
}

fn default_metrics(target: Target, nodes: &NodeConfig) -> Metrics {
    let mut names: Vec<String> = vec!["throughput".into(), "packet_rate".into(), "latency".into()];
    let mut scale = BTreeMap::new();
    let mut perf = BTreeMap::new();

    match target {
        Target::P4T4p4s => {
            names.push("cpu_load".into());
            names.push("cache_misses".into());

            perf.extend(
                T4P4S_PERF_EVENTS
                    .iter()
                    .map(|(event, name)| (event.to_string(), name.to_string())),
            );

            // for software targets we can scale cpu cores
            let mut cores = ints(CPU_CORES);
            scale::push_unique(&mut cores, ScaleValue::Int(nodes.dut.cores.len() as u64));
            scale.insert("cpu_cores".into(), cores);
        }
        Target::P4Nfp => {
            names.push("resources".into());
        }
    }

    Metrics { names, scale, perf }
}

fn default_model(target: Target, nodes: &NodeConfig) -> Model {
    let convert_to_cycles = match target {
        Target::P4T4p4s => nodes
            .dut
            .cpu_frequencies
            .iter()
            .copied()
            .max()
            .map(CycleConversion::Frequency)
            .unwrap_or(CycleConversion::Disabled),
        Target::P4Nfp => CycleConversion::Disabled,
    };

    Model {
        x_axis: String::new(),
        plot_per: vec!["packet_size".into()],
        log_scale: false,
        model_max_parts: 1,
        model_start: 0,
        model_end: 0,
        convert_to_cycles,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spec::{DeviceRole, MatchType, PacketSize, Ports, ScaleArg};

    fn nodes() -> NodeConfig {
        NodeConfig {
            loadgen: DeviceRole {
                name: "loadgen-01".into(),
                port: Ports { tx: 0, rx: 1 },
                cores: vec![1, 2, 3, 4],
                cpu_frequencies: vec![2400],
            },
            dut: DeviceRole {
                name: "dut-01".into(),
                port: Ports { tx: 1, rx: 0 },
                cores: vec![2, 3],
                cpu_frequencies: vec![1200, 2400, 1800],
            },
            measurement_core_id: None,
        }
    }

    fn selection(target: Target, feature: Feature) -> Selection {
        Selection {
            target,
            testbed: Testbed::Pos,
            outdir: "/tmp/experiments".into(),
            max_load_repetitions: 3,
            feature,
        }
    }

    #[test]
    fn baseline_load() {
        let spec = synthesize(&selection(Target::P4T4p4s, Feature::Load), &nodes()).unwrap();

        assert_eq!(spec.meta.feature, "load_rate");
        assert_eq!(spec.model.x_axis, "load_rate");
        assert_eq!(spec.metrics.scale["load_rate"], scale::load_rates());
        assert_eq!(spec.metrics.scale["load_rate"].len(), 10);
        assert_eq!(spec.model.model_end, 1);
        assert!(spec.program.args.baseline);
        assert!(spec.program.scale.is_none());
        assert_eq!(
            spec.meta.outdir,
            PathBuf::from("/tmp/experiments/baseline/load_rate")
        );
    }

    #[test]
    fn exact_entries_on_t4p4s() {
        let spec =
            synthesize(&selection(Target::P4T4p4s, Feature::EntriesExact), &nodes()).unwrap();

        assert_eq!(spec.metrics.scale["table_entries"], ints(&scale::log_scale()));
        assert_eq!(spec.program.args.match_type, MatchType::Exact);
        assert!(spec.program.args.skip_filling_tables);
        assert!(spec.model.log_scale);
        assert_eq!(spec.model.model_max_parts, 5);
        let binding = spec.program.scale.as_ref().unwrap();
        assert_eq!(binding.arg, ScaleArg::NumberTableEntries);
        assert_eq!(binding.with, "table_entries");
    }

    #[test]
    fn target_specific_metrics() {
        let t4p4s = synthesize(&selection(Target::P4T4p4s, Feature::TablesExact), &nodes()).unwrap();
        assert!(t4p4s.metrics.names.contains(&"cpu_load".to_string()));
        assert_eq!(t4p4s.metrics.perf.len(), 4);
        // the DUT has 2 cores, which is already part of the sweep
        assert_eq!(t4p4s.metrics.scale["cpu_cores"], ints(&[1, 2, 3, 4]));
        assert_eq!(
            t4p4s.model.convert_to_cycles,
            CycleConversion::Frequency(2400)
        );
        assert_eq!(t4p4s.program.target.as_deref(), Some("t4p4s"));

        let nfp = synthesize(&selection(Target::P4Nfp, Feature::TablesExact), &nodes()).unwrap();
        assert!(nfp.metrics.names.contains(&"resources".to_string()));
        assert!(nfp.metrics.perf.is_empty());
        assert!(!nfp.metrics.scales("cpu_cores"));
        assert_eq!(nfp.model.convert_to_cycles, CycleConversion::Disabled);
        assert!(!nfp.program.args.skip_filling_tables);
    }

    #[test]
    fn more_dut_cores_extend_core_sweep() {
        let mut nodes = nodes();
        nodes.dut.cores = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let spec = synthesize(&selection(Target::P4T4p4s, Feature::Load), &nodes).unwrap();
        assert_eq!(spec.metrics.scale["cpu_cores"], ints(&[1, 2, 3, 4, 8]));
    }

    #[test]
    fn deparser_uses_fixed_packet_size() {
        let spec =
            synthesize(&selection(Target::P4T4p4s, Feature::RemovedHeaders), &nodes()).unwrap();
        assert_eq!(spec.traffic.packet_size, PacketSize::Fixed(300));
        assert_eq!(spec.metrics.scale["packet_size"], ints(&[300]));
        assert_eq!(spec.model.x_axis, "remove_headers");
    }

    #[test]
    fn every_feature_synthesizes() {
        for target in &[Target::P4T4p4s, Target::P4Nfp] {
            for feature in Feature::ALL {
                let spec = synthesize(&selection(*target, *feature), &nodes()).unwrap();
                assert!(spec.metrics.scales(&spec.model.x_axis));
                assert_eq!(spec.meta.component, feature.component());
            }
        }
    }

    #[test]
    fn deterministic_snapshot() {
        let sel = selection(Target::P4T4p4s, Feature::ActionData);
        let a = serde_json::to_string_pretty(&synthesize(&sel, &nodes()).unwrap()).unwrap();
        let b = serde_json::to_string_pretty(&synthesize(&sel, &nodes()).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn snapshot_round_trips() {
        let sel = selection(Target::P4T4p4s, Feature::Load);
        let spec = synthesize(&sel, &nodes()).unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        let parsed: Specification = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, spec);
    }
}
