use std::path::PathBuf;

use clap::Args;

use super::{open_engine, CmdResult, SessionArgs};

#[derive(Args)]
pub struct AckArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Dose id to acknowledge
    #[arg(long)]
    pub id: i64,
    /// JPEG photo proving the dose was taken
    #[arg(long)]
    pub photo: Option<PathBuf>,
}

pub async fn run(args: AckArgs) -> CmdResult {
    let engine = open_engine(args.photo)?;
    let submission = engine
        .submit_proof(&args.session.session(), args.id)
        .await?;
    println!("dose {} acknowledged", submission.dose_id);
    Ok(())
}
