use doseguard_core::{Dose, ScheduleSummary};

use super::{open_engine, CmdResult, SessionArgs};

pub async fn sync(args: SessionArgs, json: bool) -> CmdResult {
    let engine = open_engine(None)?;
    let report = engine.refresh(&args.session()).await?;
    let summary = ScheduleSummary::from(&report.schedule);

    if json {
        let out = serde_json::json!({
            "doses": report.doses,
            "dropped": report.dropped.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            "schedule": summary,
            "pruned": report.pruned,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_doses(&report.doses);
    for reason in &report.dropped {
        eprintln!("dropped: {reason}");
    }
    println!(
        "scheduled {}, skipped {}, failed {}",
        summary.scheduled,
        summary.skipped,
        summary.failed.len()
    );
    for (dose_id, error) in &summary.failed {
        eprintln!("dose {dose_id} not scheduled: {error}");
    }
    Ok(())
}

pub fn list(json: bool) -> CmdResult {
    let engine = open_engine(None)?;
    let doses = engine.list();
    if json {
        println!("{}", serde_json::to_string_pretty(&doses)?);
    } else if doses.is_empty() {
        println!("no active doses");
    } else {
        print_doses(&doses);
    }
    Ok(())
}

pub fn status(args: SessionArgs) -> CmdResult {
    let engine = open_engine(None)?;
    let status = engine.status(&args.session())?;
    match status.last_sync_at {
        Some(at) => println!("last sync: {}", at.to_rfc3339()),
        None => println!("last sync: never"),
    }
    println!("cached doses: {}", status.cached_count);
    println!("live alerts: {}", engine.scheduler().handles()?.len());
    Ok(())
}

pub fn handles(json: bool) -> CmdResult {
    let engine = open_engine(None)?;
    let handles = engine.scheduler().handles()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&handles)?);
        return Ok(());
    }
    for h in &handles {
        println!(
            "{:>6}  {:<9}  {}  {}",
            h.dose_id,
            h.policy.as_str(),
            h.trigger_at.to_rfc3339(),
            h.token.as_str()
        );
    }
    Ok(())
}

fn print_doses(doses: &[Dose]) {
    for dose in doses {
        println!(
            "{:>6}  {:<13}  {}  {}",
            dose.id,
            dose.status.as_str(),
            dose.scheduled_at.to_rfc3339(),
            dose.medication_name
        );
    }
}
