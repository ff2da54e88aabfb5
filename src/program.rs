//! Generation of the P4 programs run on the DUT.
//!
//! The programs themselves are produced by an external generator (`p4gen16`). If the
//! specification binds a program argument to a scaling axis, one program is generated per axis
//! value, each into its own subdirectory.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{
    artifact::{ArtifactDescriptor, Role},
    paths,
    spec::{ProgramArgs, Specification},
};

/// Where T4P4S expects its inputs on the DUT.
const T4P4S_EXAMPLES: &str = "/root/t4p4s/t4p4s/examples";
const T4P4S_CTRL_PLANE: &str = "/root/t4p4s/t4p4s/src/hardware_dep/shared/ctrl_plane";
const T4P4S_HARDWARE_INDEP: &str = "/root/t4p4s/t4p4s/src/hardware_indep";

/// Everything the generator needs for one program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramRequest {
    pub architecture: String,
    pub sub_target: Option<String>,
    /// The port packets are sent out of by default.
    pub default_egress_port: u32,
    /// A copy of the program arguments, with the bound argument set for this program.
    pub args: ProgramArgs,
    /// Distinguishes the files of this program from those of the other programs of the series.
    pub suffix: Option<String>,
    /// Output directory, relative to the experiment root.
    pub config_path: PathBuf,
    /// Experiment root.
    pub outdir: PathBuf,
}

impl ProgramRequest {
    /// `<name>` or `<name>_<suffix>`.
    fn suffixed(&self, name: &str) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}_{}", name, suffix),
            None => name.into(),
        }
    }

    /// The DUT artifacts the generator produces for this request.
    pub fn artifacts(&self) -> Vec<ArtifactDescriptor> {
        let mut files = vec![
            ArtifactDescriptor::generated(self.config_path.join("program.p4")).deploy(
                Role::Dut,
                format!("{}/{}.p4", T4P4S_EXAMPLES, self.suffixed("synthetic")),
            ),
            ArtifactDescriptor::generated(self.config_path.join("controller")).deploy(
                Role::Dut,
                format!(
                    "{}/{}.c",
                    T4P4S_CTRL_PLANE,
                    self.suffixed("dpdk_l2fwd_controller")
                ),
            ),
        ];

        if self.args.skip_filling_tables {
            files.push(
                ArtifactDescriptor::generated(self.config_path.join("controlplane.c.py")).deploy(
                    Role::Dut,
                    format!(
                        "{}/{}.c.py",
                        T4P4S_HARDWARE_INDEP,
                        self.suffixed("controlplane")
                    ),
                ),
            );
        }

        files
    }
}

/// Produces a data plane program and its controller.
pub trait ProgramGenerator {
    fn generate(&self, request: &ProgramRequest) -> Result<Vec<ArtifactDescriptor>, failure::Error>;
}

/// The `p4gen16` program generator, run as `python3 <script>`.
#[derive(Debug, Clone)]
pub struct P4Gen {
    pub script: PathBuf,
}

impl P4Gen {
    /// The full command line for `request`.
    pub fn command(&self, request: &ProgramRequest) -> Command {
        let mut args = request.args.clone();

        let mut dummy_ethernet = true;
        if args.baseline {
            dummy_ethernet = false;
            args.number_header_fields = 1;
            args.header_field_size = 8;
            args.number_match_keys = 1;
            args.match_key_size = 8;
        }
        if args.add_uninteresting_header {
            dummy_ethernet = false;
        }

        let mut cmd = Command::new("python3");
        cmd.arg(&self.script)
            .arg("-t")
            .arg(&request.architecture)
            .arg("-o")
            .arg(request.outdir.join(&request.config_path))
            .args(&["--default-egress-spec", &request.default_egress_port.to_string()])
            .args(&["--header-fields", &args.number_header_fields.to_string()])
            .args(&["--header-field-size", &args.header_field_size.to_string()])
            .args(&["--number-match-keys", &args.number_match_keys.to_string()])
            .args(&["--match-key-size", &args.match_key_size.to_string()])
            .args(&["--match-type", &args.match_type.to_string()])
            // p4gen16 has a single flag for repeated applies; the last occurrence wins.
            .args(&["--repeat-apply-tables", &args.repeat_apply_tables.to_string()])
            .args(&["--number-tables", &args.number_tables.to_string()])
            .args(&["--repeat-apply-tables", &args.number_table_apply.to_string()])
            .args(&["--number-table-entries", &args.number_table_entries.to_string()])
            .args(&["--number-action-data", &args.action_data.to_string()])
            .args(&["--deparser-add-headers", &args.deparser_add_headers.to_string()])
            .args(&["--deparser-remove-headers", &args.deparser_remove_headers.to_string()])
            .args(&[
                "--deparser-add-headers-size",
                &args.deparser_add_headers_size.to_string(),
            ])
            .args(&["--header-field-modifies", &args.header_field_writes.to_string()])
            .args(&["--meta-field-modifies", &args.meta_field_writes.to_string()]);

        if dummy_ethernet {
            cmd.args(&["--skip-ethernet", "--skip-ip"]);
        }
        if args.add_uninteresting_header {
            cmd.arg("--add-uninteresting-header");
        }
        if let Some(sub_target) = &request.sub_target {
            cmd.args(&["--sub-target", sub_target]);
        }
        if args.skip_filling_tables {
            cmd.arg("--skip-filling-tables");
        }
        if args.no_emit {
            cmd.arg("--no-emit");
        }
        if let Some(action) = &args.action {
            cmd.args(&["--action", action]);
        }
        if let Some(default_action) = &args.default_action {
            cmd.args(&["--default-action", default_action]);
        }
        if args.match_last {
            cmd.arg("--match-last");
        }

        cmd
    }
}

impl ProgramGenerator for P4Gen {
    fn generate(&self, request: &ProgramRequest) -> Result<Vec<ArtifactDescriptor>, failure::Error> {
        log::info!("Generating P4 data and control plane");

        let outdir = request.outdir.join(&request.config_path);
        std::fs::create_dir_all(&outdir)?;

        let mut cmd = self.command(request);
        log::debug!("{:?}", cmd);

        let status = cmd.status()?;

        // If failure, exit with an Err(..).
        if !status.success() {
            failure::bail!("p4gen16 failed. Exit code: {:?}", status.code());
        }

        Ok(request.artifacts())
    }
}

/// Generate the DUT program(s) of `spec`. Programs are generated one after the other, in the
/// order of the bound axis. `spec` itself is left untouched.
pub fn expand(
    spec: &Specification,
    generator: &dyn ProgramGenerator,
) -> Result<Vec<ArtifactDescriptor>, failure::Error> {
    let request = |args: ProgramArgs, suffix: Option<String>| {
        let config_path = match &suffix {
            Some(suffix) => Path::new(paths::DUT_CONFIG).join(suffix),
            None => PathBuf::from(paths::DUT_CONFIG),
        };

        ProgramRequest {
            architecture: spec.program.architecture.clone(),
            sub_target: spec.program.target.clone(),
            default_egress_port: spec.node_config.dut.port.tx,
            args,
            suffix,
            config_path,
            outdir: spec.meta.outdir.clone(),
        }
    };

    let bound = match spec.bound_values() {
        Some(bound) => bound,
        None if spec.program.scale.is_some() => {
            failure::bail!("program arguments are bound to an axis that does not exist")
        }
        None => return generator.generate(&request(spec.program.args.clone(), None)),
    };

    let (binding, values) = bound;
    let mut files = Vec::new();

    for (value, arg) in values {
        log::info!("Program for {} = {}", binding.with, value);

        let mut args = spec.program.args.clone();
        args.set(binding.arg, arg);

        files.extend(generator.generate(&request(args, Some(value.to_string())))?);
    }

    Ok(files)
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use super::*;
    use crate::{
        features::Feature,
        scale,
        spec::{DeviceRole, NodeConfig, Ports, Target, Testbed},
        synthesize::{synthesize, Selection},
    };

    /// Records every request instead of running p4gen16.
    #[derive(Default)]
    struct Recorder {
        requests: RefCell<Vec<ProgramRequest>>,
    }

    impl ProgramGenerator for Recorder {
        fn generate(
            &self,
            request: &ProgramRequest,
        ) -> Result<Vec<ArtifactDescriptor>, failure::Error> {
            self.requests.borrow_mut().push(request.clone());
            Ok(request.artifacts())
        }
    }

    fn spec(target: Target, feature: Feature) -> Specification {
        let nodes = NodeConfig {
            loadgen: DeviceRole {
                name: "lg".into(),
                port: Ports { tx: 0, rx: 1 },
                cores: vec![1],
                cpu_frequencies: vec![2400],
            },
            dut: DeviceRole {
                name: "dut".into(),
                port: Ports { tx: 3, rx: 2 },
                cores: vec![1, 2],
                cpu_frequencies: vec![2400],
            },
            measurement_core_id: None,
        };
        synthesize(
            &Selection {
                target,
                testbed: Testbed::Pos,
                outdir: "/out".into(),
                max_load_repetitions: 1,
                feature,
            },
            &nodes,
        )
        .unwrap()
    }

    #[test]
    fn unbound_program_is_generated_once() {
        let spec = spec(Target::P4T4p4s, Feature::Load);
        let recorder = Recorder::default();
        let files = expand(&spec, &recorder).unwrap();

        let requests = recorder.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].suffix, None);
        assert_eq!(requests[0].args, spec.program.args);
        assert_eq!(requests[0].default_egress_port, 3);

        assert_eq!(files.len(), 2);
        assert_eq!(
            files[0].copy.as_deref(),
            Some("/root/t4p4s/t4p4s/examples/synthetic.p4")
        );
        assert!(files.iter().all(|f| f.device == Some(Role::Dut)));
    }

    #[test]
    fn one_program_per_axis_value() {
        let spec = spec(Target::P4T4p4s, Feature::EntriesExact);
        let before = spec.clone();
        let recorder = Recorder::default();
        let files = expand(&spec, &recorder).unwrap();

        let entries = scale::log_scale();
        let requests = recorder.requests.borrow();
        assert_eq!(requests.len(), entries.len());

        for (request, entries) in requests.iter().zip(entries.iter()) {
            assert_eq!(request.args.number_table_entries, *entries);
            assert_eq!(request.suffix, Some(entries.to_string()));
            assert_eq!(
                request.config_path,
                Path::new("experiment/dut/config").join(entries.to_string())
            );
        }

        // program, controller and control plane per value
        assert_eq!(files.len(), 3 * entries.len());
        assert_eq!(
            files[3].copy.as_deref(),
            Some("/root/t4p4s/t4p4s/examples/synthetic_2.p4")
        );
        let mut copies: Vec<_> = files.iter().filter_map(|f| f.copy.clone()).collect();
        copies.sort();
        copies.dedup();
        assert_eq!(copies.len(), files.len());

        // the specification does not see the per-program values
        assert_eq!(spec, before);
        assert_eq!(spec.program.args.number_table_entries, 0);
    }

    #[test]
    fn binding_offset_is_applied() {
        let spec = spec(Target::P4T4p4s, Feature::ParsedFields);
        let recorder = Recorder::default();
        expand(&spec, &recorder).unwrap();

        let requests = recorder.requests.borrow();
        assert_eq!(requests[0].suffix.as_deref(), Some("0"));
        assert_eq!(requests[0].args.number_header_fields, 4);
        assert_eq!(requests.last().unwrap().args.number_header_fields, 474);
    }

    #[test]
    fn failing_generator_stops_expansion() {
        struct Failing;
        impl ProgramGenerator for Failing {
            fn generate(
                &self,
                _request: &ProgramRequest,
            ) -> Result<Vec<ArtifactDescriptor>, failure::Error> {
                failure::bail!("p4gen16 failed. Exit code: Some(1)")
            }
        }

        let spec = spec(Target::P4T4p4s, Feature::TablesExact);
        assert!(expand(&spec, &Failing).is_err());
    }

    #[test]
    fn p4gen_command_line() {
        let spec = spec(Target::P4T4p4s, Feature::ActionData);
        let gen = P4Gen {
            script: "deps/p4gen16/generate.py".into(),
        };
        let mut args = spec.program.args.clone();
        args.action_data = 8;
        let request = ProgramRequest {
            architecture: "v1model".into(),
            sub_target: Some("t4p4s".into()),
            default_egress_port: 3,
            args,
            suffix: Some("8".into()),
            config_path: "experiment/dut/config/8".into(),
            outdir: "/out".into(),
        };

        let cmd = gen.command(&request);
        let argv: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(argv[0], "deps/p4gen16/generate.py");
        assert_eq!(argv[4], "/out/experiment/dut/config/8");
        let after = |flag: &str| {
            let i = argv.iter().position(|a| a == flag).unwrap();
            argv[i + 1].clone()
        };
        assert_eq!(after("--number-action-data"), "8");
        assert_eq!(after("--match-key-size"), "32");
        assert_eq!(after("--action"), "scale_action_data");
        assert_eq!(after("--default-action"), "drop");
        assert_eq!(after("--sub-target"), "t4p4s");
        assert!(argv.contains(&"--add-uninteresting-header".to_string()));
        assert!(argv.contains(&"--skip-filling-tables".to_string()));
        // the uninteresting header keeps ethernet and ip
        assert!(!argv.contains(&"--skip-ethernet".to_string()));
    }

    #[test]
    fn baseline_command_keeps_headers() {
        let spec = spec(Target::P4T4p4s, Feature::Load);
        let gen = P4Gen {
            script: "generate.py".into(),
        };
        let request = ProgramRequest {
            architecture: "v1model".into(),
            sub_target: None,
            default_egress_port: 0,
            args: spec.program.args.clone(),
            suffix: None,
            config_path: "experiment/dut/config".into(),
            outdir: "/out".into(),
        };
        let argv: Vec<String> = gen
            .command(&request)
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(!argv.contains(&"--skip-ip".to_string()));
        assert!(!argv.contains(&"--sub-target".to_string()));
    }
}
