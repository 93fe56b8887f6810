use crossbeam_channel::{bounded, Receiver}; // Inter-thread communication
use log::{debug, error, info};

mod config;
mod guest;

// Internal project modules
use config::{Frontend, Settings};
use guest::{EchoDriver, DIVISOR_115200};
use r8250_core::periph::{ByteSink, IrqEvent};
use r8250_core::{SerialPort, UartError};
use r8250_peripherals::{console, tcp};

// Interrupt events buffered between the port and the controller side
const RUPT_QUEUE_DEPTH: usize = 64;

// Host bytes accepted per loop pass, keeps the event queue from overflowing
const INPUT_BURST: usize = 16;

/// Main entry point for the UART emulator
fn main() {
    env_logger::init();

    // Set up Ctrl-C handler with channel communication
    let (signal_sender, signal_receiver) = bounded(1);
    let handler_result = ctrlc::set_handler(move || {
        if signal_sender.is_full() {
            std::process::exit(-1); // Emergency exit if channel blocked
        }
        let _send_result = signal_sender.send(()); // Send shutdown signal
    });

    if let Err(e) = handler_result {
        error!("Signal handler failed: {:?}", e);
        return;
    }

    // Parse command-line arguments
    let cli_matches = config::cli_app().get_matches();
    let settings = match Settings::from_matches(&cli_matches) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    // Connect the serial line to the selected host frontend
    let result = match &settings.frontend {
        Frontend::Console => {
            let inbound = console::stdin_reader();
            let sink = console::ConsoleSink::new(std::io::stdout());
            run(&settings, sink, inbound, signal_receiver)
        }
        Frontend::Tcp { listen } => {
            let bridge = match tcp::TcpBridge::bind(listen) {
                Ok(b) => b,
                Err(e) => {
                    error!("Could not listen on {}: {}", listen, e);
                    return;
                }
            };
            let inbound = bridge.incoming().clone();
            run(&settings, bridge, inbound, signal_receiver)
        }
    };

    if let Err(e) = result {
        error!("Guest driver stopped: {}", e);
    }
}

/// Emulation loop: host input in, interrupts to the guest driver, echo out
fn run<B: ByteSink>(
    settings: &Settings,
    sink: B,
    inbound: Receiver<u8>,
    shutdown: Receiver<()>,
) -> Result<(), UartError> {
    // Initialize the interrupt line between port and controller
    let mut queue_instance: heapless::spsc::Queue<IrqEvent, RUPT_QUEUE_DEPTH> =
        heapless::spsc::Queue::new();
    let (rupt_line, mut rupt_rx) = queue_instance.split();

    let mut port = SerialPort::new(settings.irq_line, rupt_line, sink);
    let mut driver = EchoDriver::new(DIVISOR_115200);
    driver.init(&mut port)?;
    info!("Serial port up on interrupt line {}", settings.irq_line);

    loop {
        if !shutdown.is_empty() {
            break;
        }

        let mut activity = false;
        for byte in inbound.try_iter().take(INPUT_BURST) {
            port.receive_byte(byte);
            activity = true;
        }

        // Interrupt controller: any raise since the last pass runs the handler
        let mut raised = false;
        while let Some(event) = rupt_rx.dequeue() {
            debug!("Interrupt controller saw {:?}", event);
            if let IrqEvent::Raise(_) = event {
                raised = true;
            }
        }

        if raised {
            driver.service(&mut port)?;
        } else if !activity {
            // Prevent busy-waiting while the line is idle
            std::thread::sleep(std::time::Duration::from_micros(5000));
        }
    }

    info!("Shutting down after echoing {} bytes", driver.total_echoed);
    Ok(())
}
