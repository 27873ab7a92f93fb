//! Run one looking glass query from the command line.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example query -- --config looking-glass.example.yaml \
//!     --router 1 --command ping --address 192.0.2.1
//! ```
//!
//! With a VRF and its loopback as the source:
//! ```bash
//! cargo run --example query -- --config looking-glass.example.yaml \
//!     --router 1 --command traceroute --address 192.0.2.1 --vrf CUSTOMER --loopback
//! ```

use std::env;
use std::path::PathBuf;

use looking_glass::{AddressFamily, Config, LookingGlass, Operation, Query};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = Config::load(&args.config)?;
    let glass = LookingGlass::new(config)?;

    let router = glass.router(args.router)?;
    println!(
        "=== {} ({}, AS{}) ===\n",
        router.name, router.location, router.asn
    );

    let operation: Operation = args.command.parse()?;
    let mut query = Query::new(args.router, operation)
        .with_vrf(&args.vrf)
        .with_family(args.family)
        .with_loopback(args.loopback)
        .with_runtime(args.runtime);
    if let Some(address) = &args.address {
        query = query.with_address(address);
    }

    match glass.run(&query).await {
        Ok(result) => {
            println!("{} # {}", result.router, result.command);
            println!("{}", result.output);
            println!("\n--- {:.2}s ---", result.elapsed.as_secs_f64());
        }
        Err(e) => {
            eprintln!("Error ({}): {e}", e.status_code());
            std::process::exit(1);
        }
    }

    Ok(())
}

struct Args {
    config: PathBuf,
    router: usize,
    command: String,
    address: Option<String>,
    vrf: String,
    family: AddressFamily,
    loopback: bool,
    runtime: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = PathBuf::from("looking-glass.yaml");
        let mut router = 1usize;
        let mut command = "show bgp summary".to_string();
        let mut address = None;
        let mut vrf = "global".to_string();
        let mut family = AddressFamily::IPV4_UNICAST;
        let mut loopback = false;
        let mut runtime = 30u64;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = PathBuf::from(&args[i]);
                    }
                }
                "--router" | "-r" => {
                    i += 1;
                    if i < args.len() {
                        router = args[i].parse().unwrap_or(1);
                    }
                }
                "--command" => {
                    i += 1;
                    if i < args.len() {
                        command = args[i].clone();
                    }
                }
                "--address" | "-a" => {
                    i += 1;
                    if i < args.len() {
                        address = Some(args[i].clone());
                    }
                }
                "--vrf" => {
                    i += 1;
                    if i < args.len() {
                        vrf = args[i].clone();
                    }
                }
                "--ipv6" | "-6" => {
                    family = AddressFamily::IPV6_UNICAST;
                }
                "--loopback" | "-l" => {
                    loopback = true;
                }
                "--runtime" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        runtime = args[i].parse().unwrap_or(30);
                    }
                }
                "--help" | "-h" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            config,
            router,
            command,
            address,
            vrf,
            family,
            loopback,
            runtime,
        }
    }

    fn print_help() {
        println!("Looking glass query example");
        println!();
        println!("Usage: query [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -c, --config <PATH>    Configuration file [default: looking-glass.yaml]");
        println!("  -r, --router <ID>      Router id, starting at 1 [default: 1]");
        println!("      --command <NAME>   ping, traceroute, show_route, show_bgp,");
        println!("                         show_bgp_neighbors, show_bgp_summary");
        println!("                         [default: show bgp summary]");
        println!("  -a, --address <ADDR>   Target address, prefix or hostname");
        println!("      --vrf <NAME>       VRF [default: global]");
        println!("  -6, --ipv6             Use IPv6 unicast instead of IPv4");
        println!("  -l, --loopback         Source ping/traceroute from the VRF loopback");
        println!("  -t, --runtime <SECS>   Command timeout [default: 30]");
        println!("  -h, --help             Print help");
    }
}
