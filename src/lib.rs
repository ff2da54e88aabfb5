//! Generates component benchmarks for P4 targets.
//!
//! A benchmark is selected by a target, a component of the packet processing pipeline and one
//! feature of that component to scale. From this selection a complete experiment specification is
//! synthesized, and from the specification the experiment tree: P4 programs, load generator and
//! DUT scripts, the orchestration files of the testbed and the evaluation tooling.

pub mod artifact;
pub mod cli;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod features;
pub mod loadgen;
pub mod output;
pub mod program;
pub mod render;
pub mod scale;
pub mod spec;
pub mod synthesize;
pub mod t4p4s;
pub mod testbed;

/// Paths of the output tree, relative to the experiment root.
pub mod paths {
    /// Everything the orchestrator runs.
    pub const EXPERIMENT: &str = "experiment";

    /// Plot scripts and notebooks.
    pub const EVALUATION: &str = "evaluation";

    /// Measurement results.
    pub const DATA: &str = "data";

    /// Scripts run on the DUT.
    pub const DUT: &str = "experiment/dut";

    /// Files deployed to the DUT, including the generated programs.
    pub const DUT_CONFIG: &str = "experiment/dut/config";

    /// Scripts run on the load generator.
    pub const LG: &str = "experiment/lg";

    /// MoonGen scripts.
    pub const LG_SCRIPT: &str = "experiment/lg/measurement_scripts";

    /// Helpers for the load generator scripts.
    pub const LG_UTIL: &str = "experiment/lg/util_scripts";
}
