use r8250_core::constants::COM1_IRQ;

/// Default address for the `tcp` frontend
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:19800";

/// Where the emulated line is connected on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frontend {
    Console,
    Tcp { listen: String },
}

/// Run configuration assembled from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub irq_line: u32,
    pub frontend: Frontend,
}

/// Configures command-line interface using clap
pub fn cli_app<'a, 'b>() -> clap::App<'a, 'b> {
    let description = "8250/16450 UART emulator with a model guest echo driver";
    clap::App::new("Rust 8250 UART Emulator (r8250)")
        .version("0.1")
        .about(description)
        .arg(
            clap::Arg::with_name("irq")
                .long("irq")
                .value_name("LINE")
                .takes_value(true)
                .help("Interrupt line the port drives (default: COM1)"),
        )
        .subcommand(
            clap::SubCommand::with_name("console")
                .about("Connect the serial line to this terminal"),
        )
        .subcommand(
            clap::SubCommand::with_name("tcp")
                .about("Serve the serial line to one TCP client at a time")
                .arg(
                    clap::Arg::with_name("listen")
                        .long("listen")
                        .value_name("ADDR")
                        .takes_value(true)
                        .default_value(DEFAULT_LISTEN_ADDR),
                ),
        )
}

impl Settings {
    pub fn from_matches(matches: &clap::ArgMatches) -> Result<Settings, String> {
        let irq_line = match matches.value_of("irq") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|e| format!("Invalid interrupt line '{}': {}", raw, e))?,
            None => COM1_IRQ,
        };

        let frontend = match matches.subcommand() {
            ("console", _) => Frontend::Console,
            ("tcp", Some(sub)) => Frontend::Tcp {
                listen: sub
                    .value_of("listen")
                    .unwrap_or(DEFAULT_LISTEN_ADDR)
                    .to_string(),
            },
            _ => return Err("No frontend specified (console or tcp)".to_string()),
        };

        Ok(Settings { irq_line, frontend })
    }
}
