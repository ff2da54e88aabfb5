//! Generates the experiment tree for one component benchmark. See `benchgen --help`.

use benchgen::{
    error::ConfigError, evaluation::CpCopier, experiment, program::P4Gen, synthesize::synthesize,
};

fn run() -> Result<(), failure::Error> {
    let matches = benchgen::cli::cli_options().get_matches();
    let invocation = benchgen::cli::parse(&matches)?;

    let nodes = invocation.config.node_config(&invocation.test_nodes)?;

    let spec = synthesize(&invocation.selection, &nodes)?;
    log::debug!("{:#?}", spec);

    let generator = P4Gen {
        script: invocation.config.p4gen.clone(),
    };
    experiment::generate(&spec, &invocation.config, &generator, &CpCopier)?;

    log::info!("Done");

    Ok(())
}

fn main() {
    use console::style;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        // Configuration errors are expected; report them without the backtrace.
        if let Some(config) = err.downcast_ref::<ConfigError>() {
            log::error!("{}", config);
            std::process::exit(config.exit_code());
        }

        const MESSAGE: &str = r#"== ERROR ==================================================================================
`benchgen` encountered an error. The log above may offer clues. More detail is available by
setting the RUST_LOG=debug environment variable. The experiment directory may be incomplete.
"#;

        println!("{}", style(MESSAGE).red().bold());

        println!(
            "`benchgen` encountered the following error:\n{}\n{}",
            err.as_fail(),
            err.backtrace(),
        );

        std::process::exit(101);
    }
}
