use clap::{Arg, ArgAction, Command};
use opal_kernel::{demo_config, register_demo_apps, run_demo, DiagnosticsReport, PlatformShell};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Command::new("opal-kernel")
        .version("0.1.0")
        .about("OPAL platform kernel")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("demo")
                .about("Run the scripted demo flow against the mock adapter")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the diagnostics snapshot as JSON"),
                ),
        )
        .subcommand(
            Command::new("contracts")
                .about("List the demo app contracts")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("validate-audit")
                .about("Run the demo flow and verify the audit ledger hash chain"),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("demo", args)) => {
            let shell = PlatformShell::new(&demo_config());
            register_demo_apps(&shell);

            println!("Running demo flow...");
            println!();

            let report = run_demo(&shell).await;
            println!("{}", report.generate_text());

            if args.get_flag("json") {
                shell.query().set("debug", "1");
                if let Some(snapshot) = DiagnosticsReport::capture(&shell) {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
            }

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("contracts", args)) => {
            let shell = PlatformShell::new(&demo_config());
            register_demo_apps(&shell);

            let contracts = shell.contracts().get_all();
            if args.get_flag("json") {
                let refs: Vec<&opal_contract::AppContract> =
                    contracts.iter().map(std::sync::Arc::as_ref).collect();
                println!("{}", serde_json::to_string_pretty(&refs)?);
            } else {
                println!("Registered contracts: {}", contracts.len());
                for contract in contracts {
                    let actions: Vec<&str> =
                        contract.actions.keys().map(String::as_str).collect();
                    println!(
                        "  {} v{} ({}) actions: {}",
                        contract.id,
                        contract.version,
                        contract.name,
                        actions.join(", ")
                    );
                }
            }
        }
        Some(("validate-audit", _)) => {
            let shell = PlatformShell::new(&demo_config());
            register_demo_apps(&shell);

            println!("Running demo flow...");
            let report = run_demo(&shell).await;

            println!("Audit entries: {}", report.audit_entries);
            match shell.ledger().verify_integrity() {
                Ok(()) => {
                    println!("Audit chain: OK");
                    std::process::exit(0);
                }
                Err(err) => {
                    println!("Audit chain: BROKEN ({err})");
                    std::process::exit(1);
                }
            }
        }
        _ => unreachable!("arg_required_else_help"),
    }

    Ok(())
}
