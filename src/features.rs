//! The decision table mapping a (component, feature flag) selection to the parts of the
//! specification that depend on it.
//!
//! Each `Feature` produces a `SpecificationDelta` from the target and the node topology alone.
//! The synthesizer applies the delta on top of the defaults.

use std::collections::BTreeMap;

use crate::{
    error::ConfigError,
    scale::{self, ints, ScaleValue},
    spec::{
        Component, CycleConversion, MatchType, NodeConfig, PacketSize, ProgramArgs, ScaleArg,
        ScaleBinding, Specification, Target,
    },
};

/// DPDK can add at most ~120 bytes of headers; larger values are excluded from the model.
const DPDK_MAX_ADDED_BYTES: u64 = 120;

/// DPDK can remove at most ~110 bytes of headers.
const DPDK_MAX_REMOVED_BYTES: u64 = 110;

/// Number of model parts for the table entry experiments on T4P4S.
const TABLE_ENTRIES_MODEL_PARTS: u32 = 5;

/// Flags accepted on the command line whose feature has no benchmark yet: component, flag, help.
pub const UNSUPPORTED_FLAGS: &[(Component, &str, &str)] =
    &[(Component::Mat, "key-width", "scale key width (not yet supported)")];

/// One benchmarkable dimension, selected by a component subcommand and one of its flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Feature {
    Load,
    CpuFrequency,

    EntriesExact,
    EntriesTernary,
    EntriesLpm,
    TablesExact,
    TablesLpm,
    TablesTernary,
    SameTablesExact,
    ActionData,
    MatchKeysExact,
    MatchKeysTernary,

    ParsedFields,
    AddedHeaders,
    RemovedHeaders,
    AddedHeadersSize,

    HeaderFieldWrites,
    MetaFieldWrites,
}

impl Feature {
    pub const ALL: &'static [Feature] = &[
        Feature::Load,
        Feature::CpuFrequency,
        Feature::EntriesExact,
        Feature::EntriesTernary,
        Feature::EntriesLpm,
        Feature::TablesExact,
        Feature::SameTablesExact,
        Feature::TablesLpm,
        Feature::TablesTernary,
        Feature::ActionData,
        Feature::MatchKeysExact,
        Feature::MatchKeysTernary,
        Feature::ParsedFields,
        Feature::AddedHeaders,
        Feature::RemovedHeaders,
        Feature::AddedHeadersSize,
        Feature::HeaderFieldWrites,
        Feature::MetaFieldWrites,
    ];

    pub fn component(&self) -> Component {
        use Feature::*;

        match self {
            Load | CpuFrequency => Component::Baseline,
            EntriesExact | EntriesTernary | EntriesLpm | TablesExact | TablesLpm
            | TablesTernary | SameTablesExact | ActionData | MatchKeysExact
            | MatchKeysTernary => Component::Mat,
            ParsedFields | AddedHeaders | RemovedHeaders | AddedHeadersSize => {
                Component::Parser
            }
            HeaderFieldWrites | MetaFieldWrites => Component::Other,
        }
    }

    /// The CLI flag (without leading dashes) selecting this feature.
    pub fn flag(&self) -> &'static str {
        use Feature::*;

        match self {
            Load => "load",
            CpuFrequency => "cpu-frequency",
            EntriesExact => "number-of-entries-exact",
            EntriesTernary => "number-of-entries-ternary",
            EntriesLpm => "number-of-entries-lpm",
            TablesExact => "number-of-tables-exact",
            TablesLpm => "number-of-tables-lpm",
            TablesTernary => "number-of-tables-ternary",
            SameTablesExact => "number-of-same-tables-exact",
            ActionData => "number-action-data",
            MatchKeysExact => "number-of-match-keys-exact",
            MatchKeysTernary => "number-of-match-keys-ternary",
            ParsedFields => "number-of-parsed-fields",
            AddedHeaders => "added-headers",
            RemovedHeaders => "removed-headers",
            AddedHeadersSize => "added-headers-size",
            HeaderFieldWrites => "number-of-header-field-writes",
            MetaFieldWrites => "number-of-meta-field-writes",
        }
    }

    pub fn help(&self) -> &'static str {
        use Feature::*;

        match self {
            Load => "scale load on dut",
            CpuFrequency => "scale cpu frequency",
            EntriesExact => "scale number of table entries",
            EntriesTernary => "scale number of ternary table entries",
            EntriesLpm => "scale number of lpm table entries",
            TablesExact => "scale number of tables",
            TablesLpm => "scale number of LPM tables",
            TablesTernary => "scale number of ternary tables",
            SameTablesExact => "scale number of repeated table applies",
            ActionData => "scale number of action data entries",
            MatchKeysExact => "scale number of exact match keys",
            MatchKeysTernary => "scale number of ternary match keys",
            ParsedFields => "scale number of parsed header fields",
            AddedHeaders => "scale number of added headers",
            RemovedHeaders => "scale number of removed headers",
            AddedHeadersSize => "scale number of added headers of different size",
            HeaderFieldWrites => "scale number of header field writes",
            MetaFieldWrites => "scale number of meta field writes",
        }
    }

    /// All features of the given component, in CLI order.
    pub fn of(component: Component) -> impl Iterator<Item = Feature> {
        Self::ALL
            .iter()
            .copied()
            .filter(move |f| f.component() == component)
    }

    /// Flags of `component` that are accepted but have no benchmark.
    pub fn unsupported(component: Component) -> impl Iterator<Item = (&'static str, &'static str)> {
        UNSUPPORTED_FLAGS
            .iter()
            .filter(move |(c, _, _)| *c == component)
            .map(|(_, flag, help)| (*flag, *help))
    }

    /// Resolve the feature selected by exactly one of `flags` within `component`.
    pub fn select(component: Component, flags: &[&str]) -> Result<Feature, ConfigError> {
        let mut selected = Self::of(component).filter(|f| flags.contains(&f.flag()));
        let unsupported = Self::unsupported(component)
            .map(|(flag, _)| flag)
            .find(|flag| flags.contains(flag));

        match (selected.next(), selected.next(), unsupported) {
            (Some(feature), None, None) => Ok(feature),
            (Some(first), Some(second), _) => Err(ConfigError::AmbiguousFeature {
                component,
                first: first.flag(),
                second: second.flag(),
            }),
            (Some(first), None, Some(flag)) => Err(ConfigError::AmbiguousFeature {
                component,
                first: first.flag(),
                second: flag,
            }),
            (None, _, Some(flag)) => Err(ConfigError::UnsupportedFeature { component, flag }),
            (None, _, None) => Err(ConfigError::MissingFeature { component }),
        }
    }

    /// Compute the specification fields that depend on this feature.
    pub fn delta(&self, target: Target, nodes: &NodeConfig) -> SpecificationDelta {
        use Feature::*;

        let t4p4s = target == Target::P4T4p4s;

        match self {
            Load => {
                let mut delta = SpecificationDelta::new("load_rate", "load_rate", scale::load_rates());
                delta.args.baseline = true;
                // 100% load makes no sense to model
                delta.model_end = 1;
                delta
            }

            CpuFrequency => {
                let mut delta = SpecificationDelta::new(
                    "cpu_frequency",
                    "cpu_frequency",
                    ints(&nodes.dut.cpu_frequencies),
                );
                delta.args.baseline = true;
                delta.convert_to_cycles = Some(CycleConversion::FromLoop);
                delta
            }

            EntriesExact | EntriesTernary | EntriesLpm => {
                let (name, match_type) = match self {
                    EntriesExact => ("number_entries_exact", MatchType::Exact),
                    EntriesTernary => ("number_entries_ternary", MatchType::Ternary),
                    _ => ("number_entries_lpm", MatchType::Lpm),
                };
                let mut delta =
                    SpecificationDelta::new(name, "table_entries", ints(&scale::log_scale()));
                delta.log_scale = true;
                delta.args.match_type = match_type;
                if match_type == MatchType::Lpm {
                    delta.args.number_match_keys = 1;
                }
                delta.bind(ScaleArg::NumberTableEntries);

                if t4p4s {
                    delta.model_max_parts = Some(TABLE_ENTRIES_MODEL_PARTS);
                    delta.args.skip_filling_tables = true;
                }
                delta
            }

            TablesExact | TablesLpm | TablesTernary | SameTablesExact => {
                let (name, values, match_type, arg) = match self {
                    TablesExact => (
                        "tables",
                        scale::TABLES,
                        MatchType::Exact,
                        ScaleArg::NumberTables,
                    ),
                    TablesLpm => (
                        "tables_lpm",
                        scale::TABLES,
                        MatchType::Lpm,
                        ScaleArg::NumberTables,
                    ),
                    TablesTernary => (
                        "tables_ternary",
                        scale::TABLES,
                        MatchType::Ternary,
                        ScaleArg::NumberTables,
                    ),
                    _ => (
                        "tables_repeat",
                        scale::REPEATED_TABLES,
                        MatchType::Exact,
                        ScaleArg::NumberTableApply,
                    ),
                };
                let mut delta = SpecificationDelta::new(name, "tables", ints(values));
                delta.log_scale = true;
                delta.args.match_type = match_type;
                match match_type {
                    MatchType::Lpm => delta.args.number_match_keys = 1,
                    MatchType::Ternary => delta.args.number_table_entries = 1,
                    MatchType::Exact => {}
                }
                delta.bind(arg);

                if t4p4s {
                    delta.args.skip_filling_tables = true;
                }
                delta
            }

            ActionData => {
                let mut delta = SpecificationDelta::new(
                    "number_action_data",
                    "action_data",
                    ints(scale::ACTION_DATA),
                );
                delta.log_scale = true;
                delta.args.match_type = MatchType::Exact;
                delta.args.match_key_size = 32;
                delta.args.add_uninteresting_header = true;
                delta.args.action = Some("scale_action_data".into());
                delta.args.default_action = Some("drop".into());
                delta.args.number_header_fields = 1;
                delta.args.header_field_size = 32;
                delta.bind(ScaleArg::ActionData);

                if t4p4s {
                    delta.args.skip_filling_tables = true;
                }
                delta
            }

            MatchKeysExact | MatchKeysTernary => {
                let mut delta =
                    SpecificationDelta::new("match_keys", "match_keys", ints(scale::MATCH_KEYS));
                delta.extra_axes.insert(
                    "packet_size".into(),
                    ints(&[scale::PACKET_SIZE_LARGE]),
                );
                delta.args.match_type = if *self == MatchKeysExact {
                    MatchType::Exact
                } else {
                    MatchType::Ternary
                };
                delta.args.match_key_size = 8;
                delta.args.header_field_size = 8;
                delta.args.number_header_fields = *scale::MATCH_KEYS.last().unwrap_or(&1);
                delta.bind(ScaleArg::NumberMatchKeys);
                delta
            }

            AddedHeaders | RemovedHeaders => {
                let (name, axis, arg, max_bytes, repeat) = if *self == AddedHeaders {
                    (
                        "added_headers",
                        "add_headers",
                        ScaleArg::DeparserAddHeaders,
                        DPDK_MAX_ADDED_BYTES,
                        4,
                    )
                } else {
                    (
                        "removed_headers",
                        "remove_headers",
                        ScaleArg::DeparserRemoveHeaders,
                        DPDK_MAX_REMOVED_BYTES,
                        6,
                    )
                };
                let mut delta = SpecificationDelta::new(name, axis, scale::header_counts(0));
                delta.fixed_packet_size = Some(scale::PACKET_SIZE_DEPARSER);
                delta.bind(arg);

                if t4p4s {
                    delta.model_end = count_above(&delta.values, max_bytes);
                    // do not model the case without any header changes
                    delta.model_start = 1;
                    // add some complexity so the deparser is not the only work
                    delta.args.repeat_apply_tables = repeat;
                }
                delta
            }

            AddedHeadersSize => {
                let mut delta = SpecificationDelta::new(
                    "added_headers_size",
                    "add_headers_size",
                    scale::header_counts(1),
                );
                delta.fixed_packet_size = Some(scale::PACKET_SIZE_DEPARSER);
                delta.args.deparser_add_headers = 1;
                delta.bind(ScaleArg::DeparserAddHeadersSize);

                if t4p4s {
                    delta.model_end = count_above(&delta.values, DPDK_MAX_ADDED_BYTES);
                    delta.args.repeat_apply_tables = 4;
                }
                delta
            }

            ParsedFields => {
                let mut delta = SpecificationDelta::new(
                    "number_parsed_fields",
                    "parsed_fields",
                    ints(scale::PARSED_FIELDS),
                );
                delta.extra_axes.insert(
                    "packet_size".into(),
                    ints(&[scale::PACKET_SIZE_LARGE]),
                );
                delta.args.header_field_size = 8;
                delta.args.match_key_size = 8;
                delta.args.number_tables = 2;
                delta.args.match_last = false;
                delta.binding = Some(ScaleBinding {
                    arg: ScaleArg::NumberHeaderFields,
                    with: "parsed_fields".into(),
                    offset: 4,
                });
                delta
            }

            HeaderFieldWrites => {
                let mut delta = SpecificationDelta::new(
                    "header_field_writes",
                    "header_field_writes",
                    ints(scale::FIELD_WRITES),
                );
                delta
                    .extra_axes
                    .insert("packet_size".into(), ints(&[512, 1024, 1500]));
                delta.args.header_field_size = 8;
                delta.args.match_key_size = 8;
                delta.args.number_header_fields =
                    scale::FIELD_WRITES.iter().copied().max().unwrap_or(1);
                delta.bind(ScaleArg::HeaderFieldWrites);
                delta
            }

            MetaFieldWrites => {
                let mut delta = SpecificationDelta::new(
                    "meta_field_writes",
                    "meta_field_writes",
                    ints(scale::FIELD_WRITES),
                );
                delta.args.header_field_size = 8;
                delta.args.match_key_size = 8;
                delta.bind(ScaleArg::MetaFieldWrites);
                delta
            }
        }
    }
}

/// Number of values strictly above `limit`.
fn count_above(values: &[ScaleValue], limit: u64) -> usize {
    values
        .iter()
        .filter(|v| v.as_int().map_or(false, |v| v > limit))
        .count()
}

/// The feature-dependent part of a specification.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecificationDelta {
    /// Resolved feature name, also used as the last path component of the output directory.
    pub feature: &'static str,
    /// The independent variable.
    pub x_axis: &'static str,
    /// Values of the independent variable.
    pub values: Vec<ScaleValue>,
    /// Other axes to add or overwrite (e.g. a restricted packet size sweep).
    pub extra_axes: BTreeMap<String, Vec<ScaleValue>>,
    /// Replaces the packet size sweep with a single size.
    pub fixed_packet_size: Option<u64>,
    /// Program arguments, starting from the defaults.
    pub args: ProgramArgs,
    pub binding: Option<ScaleBinding>,
    pub log_scale: bool,
    pub model_max_parts: Option<u32>,
    pub model_start: usize,
    pub model_end: usize,
    pub convert_to_cycles: Option<CycleConversion>,
}

impl SpecificationDelta {
    fn new(feature: &'static str, x_axis: &'static str, values: Vec<ScaleValue>) -> Self {
        SpecificationDelta {
            feature,
            x_axis,
            values,
            extra_axes: BTreeMap::new(),
            fixed_packet_size: None,
            args: ProgramArgs::default(),
            binding: None,
            log_scale: false,
            model_max_parts: None,
            model_start: 0,
            model_end: 0,
            convert_to_cycles: None,
        }
    }

    /// Generate one program per value of the x axis, passing the value as `arg`.
    fn bind(&mut self, arg: ScaleArg) {
        self.binding = Some(ScaleBinding::new(arg, self.x_axis));
    }

    /// Apply this delta to a specification holding the defaults.
    pub fn apply(self, spec: &mut Specification) {
        if let Some(size) = self.fixed_packet_size {
            spec.traffic.packet_size = PacketSize::Fixed(size);
            if let Some(sizes) = spec.metrics.scale.get_mut("packet_size") {
                *sizes = vec![ScaleValue::Int(size)];
            }
        }

        spec.metrics.scale.extend(self.extra_axes);
        spec.metrics.scale.insert(self.x_axis.into(), self.values);

        spec.meta.feature = self.feature.into();
        spec.program.args = self.args;
        spec.program.scale = self.binding;

        spec.model.x_axis = self.x_axis.into();
        spec.model.log_scale = self.log_scale;
        if let Some(parts) = self.model_max_parts {
            spec.model.model_max_parts = parts;
        }
        spec.model.model_start = self.model_start;
        spec.model.model_end = self.model_end;
        if let Some(conversion) = self.convert_to_cycles {
            spec.model.convert_to_cycles = conversion;
        }
    }
}
