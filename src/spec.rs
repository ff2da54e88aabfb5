//! The experiment specification: everything the artifact generation needs to know about one
//! experiment series, resolved from the CLI selection and the node topology.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    output::Parametrize,
    scale::{self, ScaleValue},
};

/// The device under test.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// T4P4S, the DPDK-based software switch.
    P4T4p4s,
    /// Netronome NFP smart NICs.
    P4Nfp,
}

impl Target {
    pub const ALL: &'static [&'static str] = &["p4_t4p4s", "p4_nfp"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::P4T4p4s => "p4_t4p4s",
            Target::P4Nfp => "p4_nfp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "p4_t4p4s" => Some(Target::P4T4p4s),
            "p4_nfp" => Some(Target::P4Nfp),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the two nodes are operated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Testbed {
    /// Nodes are allocated, booted and driven by the pos orchestrator.
    Pos,
    /// Nodes are set up by hand; only the per-node scripts are generated.
    Manual,
}

impl Testbed {
    pub const ALL: &'static [&'static str] = &["pos", "manual"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Testbed::Pos => "pos",
            Testbed::Manual => "manual",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pos" => Some(Testbed::Pos),
            "manual" => Some(Testbed::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for Testbed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of the packet processing pipeline that is benchmarked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Baseline,
    /// Match-action tables.
    Mat,
    Parser,
    Other,
}

impl Component {
    pub const ALL: &'static [Component] = &[
        Component::Baseline,
        Component::Mat,
        Component::Parser,
        Component::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Baseline => "baseline",
            Component::Mat => "mat",
            Component::Parser => "parser",
            Component::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    pub fn help(&self) -> &'static str {
        match self {
            Component::Baseline => "baseline (default)",
            Component::Mat => "match-action tables",
            Component::Parser => "parser",
            Component::Other => "other processing",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and bookkeeping of the experiment series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Parametrize)]
pub struct Meta {
    pub testbed: Testbed,
    #[name]
    pub target: Target,
    #[name]
    pub component: Component,
    /// The resolved feature name, e.g. `number_entries_exact`.
    #[name]
    pub feature: String,
    /// Root of the generated tree: `<outdir>/<component>/<feature>`.
    pub outdir: PathBuf,
    /// How often the maximum load is measured per data point.
    pub max_load_repetitions: u32,
}

/// What is measured and what is varied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub names: Vec<String>,
    /// Axis name -> values. Every combination of values is one measurement run.
    pub scale: BTreeMap<String, Vec<ScaleValue>>,
    /// Performance counter event -> human-readable name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub perf: BTreeMap<String, String>,
}

impl Metrics {
    pub fn scales(&self, axis: &str) -> bool {
        self.scale.contains_key(axis)
    }
}

/// Either a fixed packet size or a sweep over several sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PacketSize {
    Fixed(u64),
    Sweep(Vec<u64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    /// Maximum rate in Gbit/s.
    pub max: u64,
    /// Loads (as fraction of the maximum) at which latency is measured.
    pub latency: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traffic {
    pub pattern: String,
    pub load: Load,
    pub packet_size: PacketSize,
    pub payload_u32_offset: u32,
}

impl Default for Traffic {
    fn default() -> Self {
        Traffic {
            pattern: "cbr".into(),
            load: Load {
                max: 10,
                latency: vec![0.1, 0.5, 0.7],
            },
            packet_size: PacketSize::Sweep(scale::PACKET_SIZES.to_vec()),
            payload_u32_offset: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Ternary,
    Lpm,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchType::Exact => "exact",
            MatchType::Ternary => "ternary",
            MatchType::Lpm => "lpm",
        })
    }
}

/// Structural parameters of the generated P4 program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramArgs {
    pub baseline: bool,
    pub number_header_fields: u64,
    pub header_field_size: u64,
    pub number_match_keys: u64,
    pub repeat_apply_tables: u64,
    pub number_tables: u64,
    pub number_table_apply: u64,
    pub number_table_entries: u64,
    pub action_data: u64,
    pub match_key_size: u64,
    pub match_type: MatchType,
    /// Leave the tables empty in the program and fill them from the control plane instead.
    pub skip_filling_tables: bool,
    pub no_emit: bool,
    pub add_uninteresting_header: bool,
    pub default_action: Option<String>,
    pub action: Option<String>,
    pub deparser_add_headers: u64,
    pub deparser_remove_headers: u64,
    pub deparser_add_headers_size: u64,
    pub header_field_writes: u64,
    pub meta_field_writes: u64,
    pub match_last: bool,
}

impl Default for ProgramArgs {
    fn default() -> Self {
        ProgramArgs {
            baseline: false,
            number_header_fields: 1,
            header_field_size: 8,
            number_match_keys: 1,
            repeat_apply_tables: 1,
            number_tables: 1,
            number_table_apply: 1,
            number_table_entries: 0,
            action_data: 0,
            match_key_size: 8,
            match_type: MatchType::Exact,
            skip_filling_tables: false,
            no_emit: false,
            add_uninteresting_header: false,
            default_action: None,
            action: None,
            deparser_add_headers: 0,
            deparser_remove_headers: 0,
            deparser_add_headers_size: 1,
            header_field_writes: 0,
            meta_field_writes: 0,
            match_last: false,
        }
    }
}

/// The program arguments that can be bound to a scaling axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleArg {
    NumberHeaderFields,
    NumberMatchKeys,
    NumberTables,
    NumberTableApply,
    NumberTableEntries,
    ActionData,
    DeparserAddHeaders,
    DeparserRemoveHeaders,
    DeparserAddHeadersSize,
    HeaderFieldWrites,
    MetaFieldWrites,
}

impl ProgramArgs {
    /// Overwrite the argument bound to a scaling axis.
    pub fn set(&mut self, arg: ScaleArg, value: u64) {
        let field = match arg {
            ScaleArg::NumberHeaderFields => &mut self.number_header_fields,
            ScaleArg::NumberMatchKeys => &mut self.number_match_keys,
            ScaleArg::NumberTables => &mut self.number_tables,
            ScaleArg::NumberTableApply => &mut self.number_table_apply,
            ScaleArg::NumberTableEntries => &mut self.number_table_entries,
            ScaleArg::ActionData => &mut self.action_data,
            ScaleArg::DeparserAddHeaders => &mut self.deparser_add_headers,
            ScaleArg::DeparserRemoveHeaders => &mut self.deparser_remove_headers,
            ScaleArg::DeparserAddHeadersSize => &mut self.deparser_add_headers_size,
            ScaleArg::HeaderFieldWrites => &mut self.header_field_writes,
            ScaleArg::MetaFieldWrites => &mut self.meta_field_writes,
        };
        *field = value;
    }
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

/// Binds a program argument to a scaling axis: one program is generated per axis value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleBinding {
    pub arg: ScaleArg,
    pub with: String,
    /// Added to the axis value before it is passed to the program.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: u64,
}

impl ScaleBinding {
    pub fn new(arg: ScaleArg, with: &str) -> Self {
        ScaleBinding {
            arg,
            with: with.into(),
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub architecture: String,
    /// Sub-target passed to the program generator, if any.
    pub target: Option<String>,
    pub args: ProgramArgs,
    pub scale: Option<ScaleBinding>,
}

/// How CPU load is converted to cycles during evaluation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleConversion {
    Disabled,
    /// Multiply by the given (fixed) frequency in MHz.
    Frequency(u64),
    /// Use the frequency of the current iteration of the frequency loop.
    FromLoop,
}

/// Parameters of the performance model fitted during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// The independent variable of the experiment series.
    pub x_axis: String,
    pub plot_per: Vec<String>,
    pub log_scale: bool,
    pub model_max_parts: u32,
    /// Number of leading x-axis values excluded from the model.
    pub model_start: usize,
    /// Number of trailing x-axis values excluded from the model.
    pub model_end: usize,
    pub convert_to_cycles: CycleConversion,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ports {
    pub tx: u32,
    pub rx: u32,
}

/// One node of the testbed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRole {
    /// Host name, as known to the orchestrator.
    pub name: String,
    pub port: Ports,
    /// Usable core ids, in the order in which they are added to the workload.
    pub cores: Vec<u32>,
    /// Selectable CPU frequencies in MHz.
    pub cpu_frequencies: Vec<u64>,
}

/// The pair of nodes an experiment runs on. Read from `node_config/<name>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub loadgen: DeviceRole,
    pub dut: DeviceRole,
    /// The load generator core whose measurements are evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_core_id: Option<u32>,
}

/// A fully resolved experiment specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    pub meta: Meta,
    pub metrics: Metrics,
    pub traffic: Traffic,
    pub program: Program,
    pub model: Model,
    pub node_config: NodeConfig,
}

impl Specification {
    /// Check the cross-section invariants.
    pub fn validate(&self) -> Result<(), failure::Error> {
        if !self.metrics.scales(&self.model.x_axis) {
            failure::bail!(
                "x axis `{}` is not a scaling axis of the experiment",
                self.model.x_axis
            );
        }

        if let Some(binding) = &self.program.scale {
            let values = match self.metrics.scale.get(&binding.with) {
                Some(values) => values,
                None => failure::bail!(
                    "program argument {:?} is bound to unknown axis `{}`",
                    binding.arg,
                    binding.with
                ),
            };

            if let Some(v) = values.iter().find(|v| v.as_int().is_none()) {
                failure::bail!(
                    "axis `{}` has non-integral value {} and cannot drive {:?}",
                    binding.with,
                    v,
                    binding.arg
                );
            }
        }

        for (axis, values) in self.metrics.scale.iter() {
            for (i, v) in values.iter().enumerate() {
                if values[..i].contains(v) {
                    failure::bail!("axis `{}` contains {} more than once", axis, v);
                }
            }
        }

        Ok(())
    }

    /// The values of the axis driving program generation, if any, with the binding's offset
    /// applied.
    pub fn bound_values(&self) -> Option<(&ScaleBinding, Vec<(ScaleValue, u64)>)> {
        let binding = self.program.scale.as_ref()?;
        let values = self.metrics.scale.get(&binding.with)?;
        Some((
            binding,
            values
                .iter()
                .filter_map(|v| v.as_int().map(|int| (*v, int + binding.offset)))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_bound_arg() {
        let mut args = ProgramArgs::default();
        args.set(ScaleArg::NumberTableEntries, 500);
        args.set(ScaleArg::DeparserAddHeadersSize, 7);
        assert_eq!(args.number_table_entries, 500);
        assert_eq!(args.deparser_add_headers_size, 7);
        assert_eq!(args.number_tables, 1);
    }

    #[test]
    fn binding_offset_is_omitted_when_zero() {
        let binding = ScaleBinding::new(ScaleArg::NumberTables, "tables");
        let json = serde_json::to_string(&binding).unwrap();
        assert_eq!(json, r#"{"arg":"number_tables","with":"tables"}"#);

        let parsed: ScaleBinding = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, binding);
    }

    #[test]
    fn node_config_parses() {
        let json = r#"{
            "loadgen": {"name": "lg", "port": {"tx": 0, "rx": 1}, "cores": [1, 2], "cpu_frequencies": [2400]},
            "dut": {"name": "dut", "port": {"tx": 1, "rx": 0}, "cores": [2, 3], "cpu_frequencies": [1200, 2400]}
        }"#;
        let nodes: NodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(nodes.dut.port.tx, 1);
        assert_eq!(nodes.dut.cores, vec![2, 3]);
        assert_eq!(nodes.measurement_core_id, None);
    }

    #[test]
    fn names() {
        assert_eq!(Target::from_name("p4_nfp"), Some(Target::P4Nfp));
        assert_eq!(Target::from_name("p4_bmv2"), None);
        assert_eq!(Component::from_name("mat"), Some(Component::Mat));
        assert_eq!(Component::from_name("deparser"), None);
        assert_eq!(
            serde_json::to_string(&CycleConversion::FromLoop).unwrap(),
            r#""from_loop""#
        );
    }
}
