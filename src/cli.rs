//! Command line interface: which benchmark to generate, and where the generator finds its inputs.

use std::path::PathBuf;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

use crate::{
    error::ConfigError,
    experiment::GeneratorConfig,
    features::Feature,
    spec::{Component, Target, Testbed},
    synthesize::Selection,
};

/// Validators for argument values.
pub mod validator {
    pub fn is_u32(s: String) -> Result<(), String> {
        s.as_str()
            .parse::<u32>()
            .map(|_| ())
            .map_err(|e| format!("{:?}", e))
    }

    /// Node configurations are looked up by name, so the name must not escape the directory.
    pub fn is_node_config_name(s: String) -> Result<(), String> {
        if s.is_empty() || s.contains('/') || s.starts_with('.') {
            Err(format!("Invalid node configuration name \"{}\"", s))
        } else {
            Ok(())
        }
    }
}

/// Everything parsed from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub selection: Selection,
    /// Name of the node configuration, without extension.
    pub test_nodes: String,
    pub config: GeneratorConfig,
}

/// A feature flag. Repeating it is allowed.
fn feature_flag(flag: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(flag).long(flag).multiple(true).help(help)
}

fn component_subcommand(component: Component) -> App<'static, 'static> {
    let app = Feature::of(component).fold(
        SubCommand::with_name(component.as_str()).about(component.help()),
        |app, feature| app.arg(feature_flag(feature.flag(), feature.help())),
    );

    Feature::unsupported(component).fold(app, |app, (flag, help)| {
        app.arg(feature_flag(flag, help))
    })
}

pub fn cli_options() -> App<'static, 'static> {
    let app = App::new("benchgen")
        .about("Generate experiment configuration for benchmarking a component of a P4 target.")
        .setting(AppSettings::DisableVersion)
        .setting(AppSettings::AllowExternalSubcommands)
        .arg(
            Arg::with_name("TARGET")
                .required(true)
                .possible_values(Target::ALL)
                .help("The device target"),
        )
        .arg(
            Arg::with_name("TESTBED")
                .required(true)
                .possible_values(Testbed::ALL)
                .help("The testbed environment"),
        )
        .arg(
            Arg::with_name("OUTDIR")
                .required(true)
                .help("Output directory; the component and feature are appended"),
        )
        .arg(
            Arg::with_name("TEST_NODES")
                .long("test-nodes")
                .takes_value(true)
                .default_value("lg_dut")
                .validator(validator::is_node_config_name)
                .help("The pair of nodes for this experiment (node_config/<TEST_NODES>.json)"),
        )
        .arg(
            Arg::with_name("MAX_LOAD_REPETITIONS")
                .long("max-load-repetitions")
                .takes_value(true)
                .default_value("3")
                .validator(validator::is_u32)
                .help("Repetitions of the max load measurement"),
        )
        .arg(
            Arg::with_name("BASE_PATH")
                .long("base-path")
                .takes_value(true)
                .help("Directory holding templates, node_config and deps (default: .)"),
        )
        .arg(
            Arg::with_name("TEMPLATES")
                .long("templates")
                .takes_value(true)
                .help("Template directory (default: <BASE_PATH>/templates)"),
        )
        .arg(
            Arg::with_name("P4GEN")
                .long("p4gen")
                .takes_value(true)
                .help("The p4gen16 script (default: <BASE_PATH>/deps/p4gen16/generate.py)"),
        )
        .arg(
            Arg::with_name("EVALUATION_TOOLING")
                .long("evaluation-tooling")
                .takes_value(true)
                .help("The plot scripts (default: <BASE_PATH>/deps/plot_scripts)"),
        );

    Component::ALL
        .iter()
        .fold(app, |app, component| app.subcommand(component_subcommand(*component)))
}

/// Resolve the component subcommand and its feature flag.
fn parse_feature(matches: &ArgMatches<'_>) -> Result<Feature, ConfigError> {
    let (name, sub_m) = match matches.subcommand() {
        ("", _) => (Component::Baseline.as_str(), None),
        (name, sub_m) => (name, sub_m),
    };

    let component = Component::from_name(name)
        .ok_or_else(|| ConfigError::UnsupportedComponent(name.into()))?;

    let flags: Vec<&str> = match sub_m {
        Some(sub_m) => Feature::of(component)
            .map(|feature| feature.flag())
            .chain(Feature::unsupported(component).map(|(flag, _)| flag))
            .filter(|flag| sub_m.is_present(flag))
            .collect(),
        None => vec![],
    };

    Feature::select(component, &flags)
}

/// Turn parsed arguments into a generator invocation.
pub fn parse(matches: &ArgMatches<'_>) -> Result<Invocation, failure::Error> {
    let target = matches
        .value_of("TARGET")
        .and_then(Target::from_name)
        .ok_or_else(|| failure::format_err!("missing or unknown target"))?;
    let testbed = matches
        .value_of("TESTBED")
        .and_then(Testbed::from_name)
        .ok_or_else(|| failure::format_err!("missing or unknown testbed"))?;
    let outdir = matches
        .value_of("OUTDIR")
        .map(PathBuf::from)
        .ok_or_else(|| failure::format_err!("missing output directory"))?;
    let max_load_repetitions = matches
        .value_of("MAX_LOAD_REPETITIONS")
        .unwrap_or("3")
        .parse::<u32>()?;
    let test_nodes = matches.value_of("TEST_NODES").unwrap_or("lg_dut").to_owned();

    let feature = parse_feature(matches)?;

    let mut config = GeneratorConfig::new(matches.value_of("BASE_PATH").unwrap_or("."));
    if let Some(templates) = matches.value_of("TEMPLATES") {
        config.templates = templates.into();
    }
    if let Some(p4gen) = matches.value_of("P4GEN") {
        config.p4gen = p4gen.into();
    }
    if let Some(tooling) = matches.value_of("EVALUATION_TOOLING") {
        config.evaluation_tooling = tooling.into();
    }

    Ok(Invocation {
        selection: Selection {
            target,
            testbed,
            outdir,
            max_load_repetitions,
            feature,
        },
        test_nodes,
        config,
    })
}
