use clap::Args;
use doseguard_core::{AlertPayload, Config, RouteOutcome};

use super::{open_engine, CmdResult};

#[derive(Args)]
pub struct DeliverArgs {
    /// Dose id carried by the alert
    #[arg(long, conflicts_with = "payload")]
    pub id: Option<i64>,
    /// Raw alert payload as JSON, e.g. '{"routeName":"ActiveAlarmScreen","doseId":7}'
    #[arg(long)]
    pub payload: Option<String>,
}

pub fn run(args: DeliverArgs) -> CmdResult {
    let engine = open_engine(None)?;

    let outcome = match (args.id, args.payload) {
        (Some(id), _) => {
            let route = Config::load()?.notifications.active_route;
            engine.deliver(&AlertPayload::new(route, id))
        }
        (None, Some(raw)) => engine.deliver_raw(&serde_json::from_str(&raw)?),
        (None, None) => return Err("pass --id or --payload".into()),
    };

    if let RouteOutcome::NotFound { dose_id } = &outcome {
        eprintln!("dose {dose_id} is no longer active");
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
