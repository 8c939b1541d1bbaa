//! ffgraph-rs demo entry point
//!
//! Builds a sample graph that reuses one filter output twice, compiles it
//! with the user's config, and prints the command and the builder script.
//! Pass `--json` for machine-readable output, `--run` to execute the command.

use anyhow::Context as _;
use ffgraph_rs::{
    builder::{concat, input},
    parse, Compiler, CompilerConfig, Options, ProcessRunner, Stream,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn sample_graph() -> ffgraph_rs::GraphResult<Stream> {
    let reversed = input("A.mp4").vfilter("reverse", Options::new())?;
    let head = reversed.vfilter("trim", Options::new().with("end", 5))?;
    let tail = reversed.vfilter("trim", Options::new().with("start", 10))?;
    concat(&[head, tail], 2, 1, 0)?
        .video(0)?
        .output("out.mp4", Options::new())
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ffgraph_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let flags: Vec<String> = std::env::args().skip(1).collect();
    let json = flags.iter().any(|f| f == "--json");
    let run = flags.iter().any(|f| f == "--run");

    let config = CompilerConfig::load_or_default();
    tracing::info!("Using {} (auto_fix = {})", config.binary, config.auto_fix);

    let compiler = Compiler::from_config(config);
    let graph = sample_graph().context("Failed to build sample graph")?;
    let command = compiler.compile(&graph).context("Failed to compile sample graph")?;

    // The script must rebuild the graph that was compiled.
    let reparsed = parse(&command.source).context("Generated source did not parse")?;
    let recompiled = compiler.compile(&reparsed)?;
    anyhow::ensure!(
        recompiled.args == command.args,
        "round trip changed the arguments"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&command)?);
    } else {
        println!("{}", command.command_line().join(" "));
        println!();
        print!("{}", command.source);
    }

    if run {
        let output = compiler.run(&graph, &ProcessRunner)?;
        tracing::info!("{} finished with {:?}", command.binary, output.exit_code);
    }

    Ok(())
}
