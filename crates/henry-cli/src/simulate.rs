use anyhow::{Context, Result};
use clap::Args;
use henry_core::{AccessDirection, CredentialCode, constants::*};
use henry_network::{DeviceSimulator, SimulatorConfig};
use henry_protocol::{AccessEvent, EventBuilder, FrameLayout};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Bridge to connect to
    #[arg(long, default_value = "127.0.0.1:3000")]
    address: SocketAddr,

    /// Credential presented at the turnstile
    #[arg(long, default_value = "000001")]
    credential: String,

    /// Direction code (0 undefined, 1 entry, 2 exit)
    #[arg(long, default_value_t = 1)]
    direction: u8,

    /// Sequence index of the first event
    #[arg(long, default_value_t = 1)]
    sequence: u64,

    /// Number of events to send, one connection each
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Send this line verbatim instead of building an event
    #[arg(long, conflicts_with_all = ["credential", "direction", "sequence"])]
    raw: Option<String>,

    /// Per-step timeout
    #[arg(long, default_value_t = DEFAULT_DEVICE_WINDOW_MS)]
    timeout_ms: u64,

    /// Width of the credential field
    #[arg(long, default_value_t = DEFAULT_CREDENTIAL_WIDTH)]
    credential_width: usize,
}

impl SimulateArgs {
    fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            bridge_addr: self.address,
            timeout: Duration::from_millis(self.timeout_ms),
            layout: FrameLayout::henry().with_credential_width(self.credential_width),
        }
    }

    fn event(&self, offset: u32) -> Result<AccessEvent> {
        let credential = CredentialCode::new(&self.credential).context("invalid credential")?;
        let sequence = format!("{:09}", self.sequence + u64::from(offset));
        let event = EventBuilder::new(credential)
            .sequence_index(sequence)?
            .direction(AccessDirection::from_u8(self.direction))
            .build();
        Ok(event)
    }

    fn raw_line(&self) -> Option<Vec<u8>> {
        self.raw.as_ref().map(|raw| {
            let mut line = raw.clone().into_bytes();
            if line.last() != Some(&LINE_TERMINATOR) {
                line.push(LINE_TERMINATOR);
            }
            line
        })
    }
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    let simulator = DeviceSimulator::new(args.simulator_config());
    let raw = args.raw_line();

    for offset in 0..args.count {
        let started = Instant::now();
        let verdict = match &raw {
            Some(line) => simulator.send_raw(line).await,
            None => simulator.send_event(args.event(offset)?).await,
        }
        .with_context(|| format!("exchange with {} failed", args.address))?;

        println!(
            "{verdict} (0x{:02x}) in {}ms",
            verdict.as_byte(),
            started.elapsed().as_millis()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SimulateArgs,
    }

    fn parse(argv: &[&str]) -> Result<SimulateArgs, clap::Error> {
        Harness::try_parse_from(std::iter::once("simulate").chain(argv.iter().copied()))
            .map(|h| h.args)
    }

    #[test]
    fn test_builds_sequenced_events() {
        let args = parse(&["--credential", "42", "--direction", "2", "--sequence", "1597"]).unwrap();

        let first = args.event(0).unwrap();
        let third = args.event(2).unwrap();
        assert_eq!(first.credential.as_str(), "42");
        assert_eq!(first.direction, AccessDirection::Exit);
        assert_eq!(first.sequence_index, "000001597");
        assert_eq!(third.sequence_index, "000001599");
    }

    #[test]
    fn test_raw_line_gets_terminator() {
        let args = parse(&["--raw", "000001597[000"]).unwrap();
        assert_eq!(args.raw_line().unwrap(), b"000001597[000\n");

        let args = parse(&["--raw", "1[2\n"]).unwrap();
        assert_eq!(args.raw_line().unwrap(), b"1[2\n");
    }

    #[test]
    fn test_raw_conflicts_with_event_options() {
        assert!(parse(&["--raw", "1[2", "--credential", "7"]).is_err());
    }

    #[test]
    fn test_invalid_credential() {
        let args = parse(&["--credential", "12[4"]).unwrap();
        assert!(args.event(0).is_err());
    }
}
